//! Attribute transforms
//!
//! Gantree: L2_Synthesis → TransformRegistry
//!
//! One transform per tracked attribute. A transform receives the channel,
//! its current snapshot and the previous one (none on first build) and
//! writes only what changed into the working document.

use crate::correction::MixerCorrectionMatrix;
use crate::document::{
    integration_weight_name, mixer_name, output_key, port_ref, pulse_name, waveform_name,
    AnalogPortConfig, ConfigDocument, ElementConfig, MixInputs, MixerEntry, PulseConfig,
    SingleInput,
};
use crate::snapshot::{Attribute, AttributeValue, ParameterSnapshot};
use crate::validation;
use mixcal_core::channel::ControlChannel;
use mixcal_core::constants::{opx, waveform};
use mixcal_core::error::{MixcalError, MixcalResult, Warning};
use mixcal_core::pulse::{PulseDefinition, WaveformVariant};
use mixcal_core::types::{OffsetKey, PortKey, PortMap};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Registry
// ============================================================================

/// What a transform sees of one channel
pub struct TransformInput<'a> {
    /// Channel being built
    pub channel: &'a ControlChannel,
    /// Snapshot taken for this pass
    pub current: &'a ParameterSnapshot,
    /// Snapshot committed by the last successful pass
    pub previous: Option<&'a ParameterSnapshot>,
}

/// Attribute transform applied to the working document
pub type Transform =
    fn(&TransformInput<'_>, &mut ConfigDocument, &mut Vec<Warning>) -> MixcalResult<()>;

/// Transform registered for an attribute
/// Gantree: lookup(attribute) -> Option<Transform> // 변환 조회
pub fn lookup(attribute: &Attribute) -> Option<Transform> {
    match attribute {
        Attribute::LoFrequency => Some(set_lo_frequency),
        Attribute::IntermediateFrequency => Some(set_intermediate_frequency),
        Attribute::Ports => Some(set_ports),
        Attribute::Offsets => Some(set_offsets),
        Attribute::Operations => Some(set_operations),
        Attribute::TimeOfFlight => Some(set_time_of_flight),
        Attribute::Smearing => Some(set_smearing),
        Attribute::Custom(_) => None,
    }
}

/// Create the element, and the mixer entry for mixed channels
pub fn register(channel: &ControlChannel, doc: &mut ConfigDocument) {
    let name = channel.name();
    let mut element = ElementConfig::default();

    if channel.is_mixed() {
        let mixer = mixer_name(name);
        element.mix_inputs = Some(MixInputs {
            mixer: mixer.clone(),
            ..Default::default()
        });
        doc.mixers.insert(mixer.clone(), vec![MixerEntry::default()]);
        log::info!("Set '{}' for '{}'", mixer, name);
    } else {
        element.single_input = Some(SingleInput::default());
    }

    doc.elements.insert(name.to_string(), element);
}

// ============================================================================
// Document Access
// ============================================================================

fn element_mut<'d>(doc: &'d mut ConfigDocument, channel: &str) -> MixcalResult<&'d mut ElementConfig> {
    doc.elements
        .get_mut(channel)
        .ok_or_else(|| MixcalError::InternalError(format!("element '{}' not registered", channel)))
}

fn mix_inputs_mut<'d>(doc: &'d mut ConfigDocument, channel: &str) -> MixcalResult<&'d mut MixInputs> {
    element_mut(doc, channel)?
        .mix_inputs
        .as_mut()
        .ok_or_else(|| MixcalError::InternalError(format!("element '{}' has no mixInputs", channel)))
}

fn mixer_mut<'d>(doc: &'d mut ConfigDocument, channel: &str) -> MixcalResult<&'d mut MixerEntry> {
    doc.mixers
        .get_mut(&mixer_name(channel))
        .and_then(|entries| entries.first_mut())
        .ok_or_else(|| MixcalError::InternalError(format!("mixer for '{}' not registered", channel)))
}

fn missing(channel: &str, attribute: &str) -> MixcalError {
    MixcalError::InternalError(format!("snapshot of '{}' has no {}", channel, attribute))
}

fn write_dc_offset(doc: &mut ConfigDocument, key: PortKey, port: u8, offset: f64) -> MixcalResult<()> {
    validation::validate_dc_offset(key.as_str(), offset)?;
    let controller = doc.controller_mut();
    let entry = AnalogPortConfig { offset };
    if key.is_output() {
        controller.analog_outputs.insert(port, entry);
    } else {
        controller.analog_inputs.insert(port, entry);
    }
    log::debug!("Set port {} ('{}') DC offset {}", port, key, offset);
    Ok(())
}

// ============================================================================
// Frequencies
// ============================================================================

/// Write the LO frequency into the element and the mixer
fn set_lo_frequency(
    input: &TransformInput<'_>,
    doc: &mut ConfigDocument,
    _warnings: &mut Vec<Warning>,
) -> MixcalResult<()> {
    let name = input.channel.name();
    let lo = input
        .current
        .lo_frequency()
        .ok_or_else(|| missing(name, "lo_frequency"))?;

    if !input.channel.is_mixed() {
        log::warn!("'{}' has no mixer inputs, LO frequency {} not written", name, lo);
        return Ok(());
    }

    mix_inputs_mut(doc, name)?.lo_frequency = lo;
    mixer_mut(doc, name)?.lo_frequency = lo;

    let old = input.previous.and_then(|p| p.lo_frequency());
    log::debug!("Set '{}' lo frequency from {:?} to {}", name, old, lo);
    Ok(())
}

/// Write the IF into the element and, if mixed, the mixer
fn set_intermediate_frequency(
    input: &TransformInput<'_>,
    doc: &mut ConfigDocument,
    _warnings: &mut Vec<Warning>,
) -> MixcalResult<()> {
    let name = input.channel.name();
    let frequency = match input.current.get(&Attribute::IntermediateFrequency) {
        Some(AttributeValue::Frequency(f)) => *f,
        _ => return Err(missing(name, "intermediate_frequency")),
    };

    element_mut(doc, name)?.intermediate_frequency = frequency;
    if input.channel.is_mixed() {
        mixer_mut(doc, name)?.intermediate_frequency = frequency;
    }

    log::debug!("Set '{}' intermediate frequency to {}", name, frequency);
    Ok(())
}

// ============================================================================
// Ports and Offsets
// ============================================================================

/// Bind new or changed ports and write their DC offsets
fn set_ports(
    input: &TransformInput<'_>,
    doc: &mut ConfigDocument,
    _warnings: &mut Vec<Warning>,
) -> MixcalResult<()> {
    let name = input.channel.name();
    let ports = input.current.ports().ok_or_else(|| missing(name, "ports"))?;
    let offsets = input.current.offsets().ok_or_else(|| missing(name, "offsets"))?;
    let previous: Option<&PortMap> = input.previous.and_then(|p| p.ports());

    if let Some(old) = previous {
        let old_keys: BTreeSet<PortKey> = old.keys().copied().collect();
        let new_keys: BTreeSet<PortKey> = ports.keys().copied().collect();
        if old_keys != new_keys {
            log::error!("Forbidden to change '{}' ports keyset", name);
            return Err(MixcalError::PortKeysetChanged {
                channel: name.to_string(),
                old: mixcal_core::types::keyset_names(&old_keys),
                new: mixcal_core::types::keyset_names(&new_keys),
            });
        }
    }

    for (&key, &port) in ports {
        let old_port = previous.and_then(|old| old.get(&key)).copied();
        if old_port == Some(port) {
            continue;
        }

        validation::validate_port(key, port)?;
        write_dc_offset(doc, key, port, offsets.get(key.offset_key()))?;

        match key {
            PortKey::I => mix_inputs_mut(doc, name)?.i = Some(port_ref(port)),
            PortKey::Q => mix_inputs_mut(doc, name)?.q = Some(port_ref(port)),
            PortKey::Single => {
                let element = element_mut(doc, name)?;
                element
                    .single_input
                    .get_or_insert_with(SingleInput::default)
                    .port = Some(port_ref(port));
            }
            PortKey::Out => {
                let element = element_mut(doc, name)?;
                if let Some(old) = old_port {
                    element.outputs.remove(&output_key(old));
                }
                element.outputs.insert(output_key(port), port_ref(port));
            }
        }
        log::debug!("Set '{}' port '{}' from {:?} to {}", name, key, old_port, port);
    }
    Ok(())
}

/// Recompute the correction matrix and rewrite changed DC offsets
fn set_offsets(
    input: &TransformInput<'_>,
    doc: &mut ConfigDocument,
    _warnings: &mut Vec<Warning>,
) -> MixcalResult<()> {
    let name = input.channel.name();
    let offsets = input.current.offsets().ok_or_else(|| missing(name, "offsets"))?;
    let ports = input.current.ports().ok_or_else(|| missing(name, "ports"))?;

    let changed = match input.previous.and_then(|p| p.offsets()) {
        Some(old) => offsets.changed_keys(old),
        None => OffsetKey::ALL.to_vec(),
    };

    let gain_phase_changed = changed
        .iter()
        .any(|key| matches!(key, OffsetKey::G | OffsetKey::P));
    if gain_phase_changed && input.channel.is_mixed() {
        let matrix = MixerCorrectionMatrix::from_offsets(offsets.g, offsets.p)?;
        mixer_mut(doc, name)?.correction = Some(matrix.as_array());
        log::debug!("Set '{}' correction matrix to {}", mixer_name(name), matrix);
    }

    for key in changed.into_iter().filter(OffsetKey::is_dc) {
        let value = offsets.get(key);
        for (&port_key, &port) in ports.iter().filter(|(k, _)| k.offset_key() == key) {
            write_dc_offset(doc, port_key, port, value)?;
        }
    }
    Ok(())
}

// ============================================================================
// Operations
// ============================================================================

/// Add, update and remove pulses to match the channel operations
fn set_operations(
    input: &TransformInput<'_>,
    doc: &mut ConfigDocument,
    _warnings: &mut Vec<Warning>,
) -> MixcalResult<()> {
    let channel = input.channel;
    let name = channel.name();
    let operations = input
        .current
        .operations()
        .ok_or_else(|| missing(name, "operations"))?;
    let previous = input.previous.and_then(|p| p.operations());

    for (operation, pulse) in operations {
        match previous.and_then(|old| old.get(operation)) {
            None => add_pulse(channel, operation, pulse, doc)?,
            Some(old) if old != pulse => update_pulse(channel, operation, old, pulse, doc)?,
            Some(_) => {}
        }
    }

    if let Some(old) = previous {
        for operation in old.keys().filter(|op| !operations.contains_key(*op)) {
            remove_pulse(name, operation, doc)?;
        }
    }
    Ok(())
}

fn add_pulse(
    channel: &ControlChannel,
    operation: &str,
    pulse: &PulseDefinition,
    doc: &mut ConfigDocument,
) -> MixcalResult<()> {
    let name = pulse_name(channel.name(), operation);
    log::info!("Adding '{}' to config", name);

    validation::validate_slots(&name, pulse.slots(), channel.input_mode())?;
    validation::validate_pulse_length(&name, pulse.length)?;
    validation::validate_sample_counts(&name, pulse)?;

    let waveforms = pulse
        .slots()
        .keys()
        .iter()
        .map(|slot| (slot.to_string(), waveform_name(&name, slot)))
        .collect();

    doc.pulses.insert(
        name.clone(),
        PulseConfig {
            operation: pulse.kind,
            length: pulse.length,
            waveforms,
            digital_marker: None,
            integration_weights: BTreeMap::new(),
        },
    );
    element_mut(doc, channel.name())?
        .operations
        .insert(operation.to_string(), name.clone());

    write_waveforms(&name, pulse, doc)?;
    if pulse.is_measurement() {
        doc.ensure_readout_marker();
        if let Some(config) = doc.pulses.get_mut(&name) {
            config.digital_marker = Some(waveform::RO_DIGITAL_MARKER.to_string());
        }
        write_integration_weights(&name, pulse, doc)?;
    }
    Ok(())
}

fn update_pulse(
    channel: &ControlChannel,
    operation: &str,
    old: &PulseDefinition,
    new: &PulseDefinition,
    doc: &mut ConfigDocument,
) -> MixcalResult<()> {
    let name = pulse_name(channel.name(), operation);

    if old.kind != new.kind {
        log::error!("Forbidden to change '{}' pulse type", name);
        return Err(MixcalError::PulseKindChanged {
            pulse: name,
            old: old.kind.to_string(),
            new: new.kind.to_string(),
        });
    }
    if old.slots() != new.slots() {
        log::error!("Forbidden to change '{}' waveform keyset", name);
        return Err(MixcalError::WaveformSlotsChanged {
            pulse: name,
            old: old.slots().to_string(),
            new: new.slots().to_string(),
        });
    }
    validation::validate_slots(&name, new.slots(), channel.input_mode())?;
    validation::validate_sample_counts(&name, new)?;

    let length_changed = old.length != new.length;
    if length_changed {
        validation::validate_pulse_length(&name, new.length)?;
        doc.pulses
            .get_mut(&name)
            .ok_or_else(|| MixcalError::InternalError(format!("pulse '{}' not in config", name)))?
            .length = new.length;
        log::debug!("Set '{}' length from {} to {}", name, old.length, new.length);
    }

    let samples_follow_length = matches!(new.waveform, WaveformVariant::Gaussian { .. });
    if old.waveform != new.waveform || (length_changed && samples_follow_length) {
        write_waveforms(&name, new, doc)?;
    }

    let weights_follow_length = new.integration_weights.is_none();
    if new.is_measurement()
        && (old.integration_weights != new.integration_weights
            || (length_changed && weights_follow_length))
    {
        write_integration_weights(&name, new, doc)?;
    }
    Ok(())
}

fn remove_pulse(channel: &str, operation: &str, doc: &mut ConfigDocument) -> MixcalResult<()> {
    let name = pulse_name(channel, operation);
    log::info!("Deleting '{}' operation '{}'", channel, operation);

    element_mut(doc, channel)?.operations.remove(operation);
    if let Some(config) = doc.pulses.remove(&name) {
        for waveform in config.waveforms.values() {
            doc.waveforms.remove(waveform);
        }
        for weight in config.integration_weights.values() {
            doc.integration_weights.remove(weight);
        }
    }
    Ok(())
}

fn write_waveforms(pulse: &str, definition: &PulseDefinition, doc: &mut ConfigDocument) -> MixcalResult<()> {
    for (slot, rendered) in definition.render() {
        let name = waveform_name(pulse, slot);
        validation::validate_amplitude(&name, &rendered)?;
        log::debug!("Set {} samples for '{}'", rendered.len(), name);
        doc.waveforms.insert(name, rendered.into());
    }
    Ok(())
}

fn write_integration_weights(
    pulse: &str,
    definition: &PulseDefinition,
    doc: &mut ConfigDocument,
) -> MixcalResult<()> {
    let config = doc
        .pulses
        .get_mut(pulse)
        .ok_or_else(|| MixcalError::InternalError(format!("pulse '{}' not in config", pulse)))?;
    let stale = std::mem::take(&mut config.integration_weights);

    let mut names = BTreeMap::new();
    for (key, weight) in definition.resolved_integration_weights() {
        let name = integration_weight_name(pulse, &key);
        doc.integration_weights.insert(name.clone(), weight);
        names.insert(key, name);
    }
    for name in stale.values().filter(|n| !names.values().any(|m| m == *n)) {
        doc.integration_weights.remove(name);
    }

    if let Some(config) = doc.pulses.get_mut(pulse) {
        config.integration_weights = names;
    }
    log::debug!("Set integration weights for '{}'", pulse);
    Ok(())
}

// ============================================================================
// Readout Timing
// ============================================================================

fn duration(input: &TransformInput<'_>, attribute: &Attribute) -> MixcalResult<i64> {
    match input.current.get(attribute) {
        Some(AttributeValue::Duration(value)) => Ok(*value),
        _ => Err(missing(input.channel.name(), attribute.name())),
    }
}

/// Write the time of flight, rounded to the clock quantum
fn set_time_of_flight(
    input: &TransformInput<'_>,
    doc: &mut ConfigDocument,
    warnings: &mut Vec<Warning>,
) -> MixcalResult<()> {
    let name = input.channel.name();
    let requested = duration(input, &Attribute::TimeOfFlight)?;
    validation::validate_timing("time_of_flight", requested)?;

    let applied = opx::round_to_clock(requested);
    if applied != requested {
        log::warn!(
            "Rounded '{}' time of flight {} to nearest multiple of {}",
            name,
            requested,
            opx::CLOCK_CYCLE_NS
        );
        warnings.push(Warning::TimeOfFlightRounded {
            channel: name.to_string(),
            requested,
            applied,
        });
    }

    element_mut(doc, name)?.time_of_flight = Some(applied);
    log::debug!("Set '{}' time of flight to {}", name, applied);
    Ok(())
}

/// Write the smearing
fn set_smearing(
    input: &TransformInput<'_>,
    doc: &mut ConfigDocument,
    _warnings: &mut Vec<Warning>,
) -> MixcalResult<()> {
    let name = input.channel.name();
    let smearing = duration(input, &Attribute::Smearing)?;
    validation::validate_timing("smearing", smearing)?;

    element_mut(doc, name)?.smearing = Some(smearing);
    log::debug!("Set '{}' smearing to {}", name, smearing);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{qubit, readout};

    fn first_build(channel: &ControlChannel) -> (ConfigDocument, Vec<Warning>) {
        let mut doc = ConfigDocument::new();
        doc.initialize();
        register(channel, &mut doc);

        let current = ParameterSnapshot::capture(channel).unwrap();
        let input = TransformInput {
            channel,
            current: &current,
            previous: None,
        };
        let mut warnings = Vec::new();
        for attribute in current.attributes() {
            if let Some(transform) = lookup(attribute) {
                transform(&input, &mut doc, &mut warnings).unwrap();
            }
        }
        (doc, warnings)
    }

    #[test]
    fn test_registry_is_exhaustive() {
        assert!(lookup(&Attribute::LoFrequency).is_some());
        assert!(lookup(&Attribute::Smearing).is_some());
        assert!(lookup(&Attribute::Custom("t1".into())).is_none());
    }

    #[test]
    fn test_register_mixed_channel() {
        let (channel, _) = qubit();
        let mut doc = ConfigDocument::new();
        register(&channel, &mut doc);
        assert_eq!(doc.element("QUBIT").unwrap().mix_inputs.as_ref().unwrap().mixer, "QUBIT.mixer");
        assert!(doc.mixer("QUBIT").is_some());
    }

    #[test]
    fn test_first_build_qubit() {
        let (channel, _) = qubit();
        let (doc, warnings) = first_build(&channel);
        assert!(warnings.is_empty());

        let mix = doc.element("QUBIT").unwrap().mix_inputs.as_ref().unwrap();
        assert_eq!(mix.i, Some(port_ref(1)));
        assert_eq!(mix.q, Some(port_ref(2)));
        assert_eq!(mix.lo_frequency, 5_000_000_000);
        assert_eq!(doc.mixer("QUBIT").unwrap().intermediate_frequency, -50_000_000);
        assert_eq!(doc.mixer_correction("QUBIT"), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(doc.output_offset(1), Some(0.0));
        assert_eq!(doc.pulses.len(), 2);
        assert_eq!(doc.waveforms.len(), 4);
    }

    #[test]
    fn test_first_build_readout() {
        let (channel, _) = readout();
        let (doc, warnings) = first_build(&channel);

        // 201ns rounds to 200ns
        assert_eq!(warnings.len(), 1);
        let element = doc.element("RR").unwrap();
        assert_eq!(element.time_of_flight, Some(200));
        assert_eq!(element.smearing, Some(0));
        assert_eq!(element.outputs.get("out1"), Some(&port_ref(1)));
        assert_eq!(doc.input_offset(1), Some(0.0));

        let pulse = doc.pulse("RR", "readout_pulse").unwrap();
        assert_eq!(pulse.digital_marker.as_deref(), Some("ON"));
        assert_eq!(pulse.integration_weights.len(), 2);
        assert_eq!(doc.integration_weights["RR.readout_pulse.iw1"].cosine.len(), 250);
        assert!(doc.digital_waveforms.contains_key("ON"));
    }

    #[test]
    fn test_out_of_range_port() {
        let (channel, _) = qubit();
        let mut doc = ConfigDocument::new();
        doc.initialize();
        register(&channel, &mut doc);

        let mut bad = channel.clone();
        bad.set_ports([(PortKey::I, 1), (PortKey::Q, 11)].into_iter().collect())
            .unwrap();
        let current = ParameterSnapshot::capture(&bad).unwrap();
        let input = TransformInput {
            channel: &bad,
            current: &current,
            previous: None,
        };
        let err = set_ports(&input, &mut doc, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, MixcalError::PortOutOfRange { port: 11, .. }));
    }

    #[test]
    fn test_remove_pulse_cleans_entries() {
        let (channel, _) = readout();
        let (mut doc, _) = first_build(&channel);
        remove_pulse("RR", "readout_pulse", &mut doc).unwrap();

        assert!(doc.pulse("RR", "readout_pulse").is_none());
        assert!(!doc.waveforms.keys().any(|k| k.starts_with("RR.readout_pulse")));
        assert!(doc.integration_weights.is_empty());
        assert!(!doc.element("RR").unwrap().operations.contains_key("readout_pulse"));
    }
}
