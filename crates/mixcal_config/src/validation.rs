//! Validation rules
//!
//! Gantree: L2_Synthesis → ValidationRules
//!
//! Numeric and structural bounds enforced before anything is written to
//! the configuration document. Values are never clamped: a violation is
//! always an error.

use mixcal_core::constants::opx;
use mixcal_core::error::{MixcalError, MixcalResult};
use mixcal_core::pulse::{PulseDefinition, RenderedWaveform, WaveformSlots, WaveformVariant};
use mixcal_core::types::{InputMode, PortKey, PortNumber};

// ============================================================================
// Ports and Offsets
// ============================================================================

/// Check a port number against the analog output or input bounds
/// Gantree: validate_port(key,port) -> MixcalResult<()> // 포트 범위 검증
pub fn validate_port(key: PortKey, port: PortNumber) -> MixcalResult<()> {
    let (min, max) = if key.is_output() {
        (opx::AO_MIN, opx::AO_MAX)
    } else {
        (opx::AI_MIN, opx::AI_MAX)
    };

    if !(min..=max).contains(&port) {
        log::error!("Port {} for '{}' out of bounds [{}, {}]", port, key, min, max);
        return Err(MixcalError::PortOutOfRange {
            key: key.to_string(),
            port,
            min,
            max,
        });
    }
    Ok(())
}

/// Check a DC offset lies strictly inside the voltage bounds
pub fn validate_dc_offset(key: &str, value: f64) -> MixcalResult<()> {
    if !(value > opx::V_MIN && value < opx::V_MAX) {
        log::error!("DC offset {} for '{}' out of bounds", value, key);
        return Err(MixcalError::OffsetOutOfRange {
            key: key.to_string(),
            value,
            min: opx::V_MIN,
            max: opx::V_MAX,
        });
    }
    Ok(())
}

/// Check every correction component lies strictly inside the matrix bounds
pub fn validate_correction(matrix: &[f64; 4]) -> MixcalResult<()> {
    for &value in matrix {
        if !(value > opx::MCM_MIN && value < opx::MCM_MAX) {
            log::error!("Mixer correction matrix value {} out of bounds", value);
            return Err(MixcalError::CorrectionOutOfRange {
                value,
                min: opx::MCM_MIN,
                max: opx::MCM_MAX,
            });
        }
    }
    Ok(())
}

// ============================================================================
// Pulses and Waveforms
// ============================================================================

/// Check a pulse length is a clock multiple and at least the minimum
pub fn validate_pulse_length(pulse: &str, length: u32) -> MixcalResult<()> {
    if !opx::is_valid_pulse_length(length) {
        log::error!(
            "Pulse '{}' length {} must be an int multiple of {} >= {}",
            pulse,
            length,
            opx::CLOCK_CYCLE_NS,
            opx::MIN_PULSE_LEN_NS
        );
        return Err(MixcalError::InvalidPulseLength {
            pulse: pulse.to_string(),
            length,
            quantum: opx::CLOCK_CYCLE_NS,
            min: opx::MIN_PULSE_LEN_NS,
        });
    }
    Ok(())
}

/// Check every sample lies strictly inside the voltage bounds
pub fn validate_amplitude(waveform: &str, samples: &RenderedWaveform) -> MixcalResult<()> {
    let (lo, hi) = samples.bounds();
    for value in [lo, hi] {
        if !(value > opx::V_MIN && value < opx::V_MAX) {
            log::error!("Waveform '{}' sample {} out of bounds", waveform, value);
            return Err(MixcalError::AmplitudeOutOfRange {
                waveform: waveform.to_string(),
                value,
                min: opx::V_MIN,
                max: opx::V_MAX,
            });
        }
    }
    Ok(())
}

/// Check user-supplied sample arrays match the pulse length
pub fn validate_sample_counts(pulse_name: &str, pulse: &PulseDefinition) -> MixcalResult<()> {
    if let WaveformVariant::Arbitrary { i, q } = &pulse.waveform {
        let expected = pulse.length as usize;
        let arrays = std::iter::once(("I", i)).chain(q.iter().map(|q| ("Q", q)));
        for (slot, samples) in arrays {
            if samples.len() != expected {
                log::error!(
                    "Waveform '{}.{}' has {} samples, pulse length is {}",
                    pulse_name,
                    slot,
                    samples.len(),
                    expected
                );
                return Err(MixcalError::SampleCountMismatch {
                    waveform: format!("{}.{}", pulse_name, slot),
                    actual: samples.len(),
                    expected,
                });
            }
        }
    }
    Ok(())
}

/// Check the waveform slot partition fits the channel input mode
pub fn validate_slots(pulse: &str, slots: WaveformSlots, input: InputMode) -> MixcalResult<()> {
    let compatible = matches!(
        (slots, input),
        (WaveformSlots::Iq, InputMode::Mixed) | (WaveformSlots::Single, InputMode::Single)
    );
    if !compatible {
        log::error!("Pulse '{}' waveforms {} do not fit {} input", pulse, slots, input);
        return Err(MixcalError::WaveformSlotMismatch {
            pulse: pulse.to_string(),
            slots: slots.to_string(),
            input: input.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// Timing
// ============================================================================

/// Check an integer timing parameter is non-negative
pub fn validate_timing(parameter: &str, value: i64) -> MixcalResult<()> {
    if value < 0 {
        log::error!("Invalid {} value {}", parameter, value);
        return Err(MixcalError::InvalidTiming {
            parameter: parameter.to_string(),
            value,
        });
    }
    Ok(())
}

/// Check a float parameter is finite
pub fn validate_finite(name: &str, value: f64) -> MixcalResult<()> {
    if !value.is_finite() {
        log::error!("Invalid {} value {}", name, value);
        return Err(MixcalError::InvalidValue {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
