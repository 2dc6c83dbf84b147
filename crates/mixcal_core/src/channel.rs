//! Control channels
//!
//! Gantree: L1_Model → ControlChannel
//!
//! A control channel is one physical drive or readout line: its local
//! oscillator, IF, port wiring, mixer calibration and named pulse
//! operations. The port keyset is checked at construction and whenever
//! ports are replaced.

use crate::error::{MixcalError, MixcalResult};
use crate::oscillator::OscillatorHandle;
use crate::pulse::{PulseDefinition, WaveformSlots};
use crate::types::{ChannelRole, InputMode, MixerOffsets, OffsetKey, PortMap};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Default Operations
// ============================================================================

/// Name of the default constant drive operation
pub const CONSTANT_PULSE: &str = "constant_pulse";

/// Name of the default gaussian drive operation
pub const GAUSSIAN_PULSE: &str = "gaussian_pulse";

/// Name of the default readout operation
pub const READOUT_PULSE: &str = "readout_pulse";

/// Default operation set for a channel role, routed to the input's slots
/// Gantree: default_operations(role,input) -> BTreeMap // 기본 연산
pub fn default_operations(role: ChannelRole, input: InputMode) -> BTreeMap<String, PulseDefinition> {
    let mut operations = BTreeMap::new();
    match role {
        ChannelRole::Drive => {
            operations.insert(
                CONSTANT_PULSE.to_string(),
                PulseDefinition::constant(1000, 1.0),
            );
            operations.insert(
                GAUSSIAN_PULSE.to_string(),
                PulseDefinition::gaussian(15, 4, 1.0, 0.0),
            );
        }
        ChannelRole::Readout => {
            operations.insert(
                CONSTANT_PULSE.to_string(),
                PulseDefinition::constant(1000, 1.0),
            );
            operations.insert(
                READOUT_PULSE.to_string(),
                PulseDefinition::constant_readout(1000, 1.0),
            );
        }
    }

    let slots = match input {
        InputMode::Mixed => WaveformSlots::Iq,
        InputMode::Single => WaveformSlots::Single,
    };
    operations
        .into_iter()
        .map(|(name, pulse)| (name, pulse.with_slots(slots)))
        .collect()
}

// ============================================================================
// Control Channel
// ============================================================================

/// One drive or readout line
/// Gantree: ControlChannel // 제어 채널
#[derive(Clone)]
pub struct ControlChannel {
    name: String,
    role: ChannelRole,
    oscillator: OscillatorHandle,
    intermediate_frequency: i64,
    ports: PortMap,
    mixer_offsets: MixerOffsets,
    operations: BTreeMap<String, PulseDefinition>,
    time_of_flight: i64,
    smearing: i64,
    attributes: BTreeMap<String, serde_json::Value>,
}

impl ControlChannel {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create a channel, validating the port keyset against the role
    /// Gantree: new(name,role,lo,ports) -> MixcalResult<Self> // 생성
    pub fn new(
        name: impl Into<String>,
        role: ChannelRole,
        oscillator: OscillatorHandle,
        ports: PortMap,
    ) -> MixcalResult<Self> {
        let name = name.into();
        if name.trim().is_empty() || name.contains('.') {
            return Err(MixcalError::InvalidName(name));
        }
        role.check_ports(&name, &ports)?;

        Ok(Self {
            name,
            role,
            oscillator,
            intermediate_frequency: 0,
            ports,
            mixer_offsets: MixerOffsets::zero(),
            operations: BTreeMap::new(),
            time_of_flight: 0,
            smearing: 0,
            attributes: BTreeMap::new(),
        })
    }

    /// Create a drive channel
    pub fn drive(
        name: impl Into<String>,
        oscillator: OscillatorHandle,
        ports: PortMap,
    ) -> MixcalResult<Self> {
        Self::new(name, ChannelRole::Drive, oscillator, ports)
    }

    /// Create a readout channel
    pub fn readout(
        name: impl Into<String>,
        oscillator: OscillatorHandle,
        ports: PortMap,
    ) -> MixcalResult<Self> {
        Self::new(name, ChannelRole::Readout, oscillator, ports)
    }

    // ========================================================================
    // Builder Methods
    // ========================================================================

    /// Set intermediate frequency (Hz)
    pub fn with_intermediate_frequency(mut self, frequency: i64) -> Self {
        self.intermediate_frequency = frequency;
        self
    }

    /// Set mixer offsets
    pub fn with_mixer_offsets(mut self, offsets: MixerOffsets) -> Self {
        self.mixer_offsets = offsets;
        self
    }

    /// Add an operation
    pub fn with_operation(mut self, name: impl Into<String>, pulse: PulseDefinition) -> Self {
        self.operations.insert(name.into(), pulse);
        self
    }

    /// Add the default operations of the channel role and input mode
    pub fn with_default_operations(mut self) -> Self {
        for (name, pulse) in default_operations(self.role, self.input_mode()) {
            self.operations.entry(name).or_insert(pulse);
        }
        self
    }

    /// Set time of flight (ns)
    pub fn with_time_of_flight(mut self, time_of_flight: i64) -> Self {
        self.time_of_flight = time_of_flight;
        self
    }

    /// Set smearing (ns)
    pub fn with_smearing(mut self, smearing: i64) -> Self {
        self.smearing = smearing;
        self
    }

    /// Attach a free-form attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Channel role
    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Input mode implied by the port keyset
    pub fn input_mode(&self) -> InputMode {
        if self.ports.contains_key(&crate::types::PortKey::I) {
            InputMode::Mixed
        } else {
            InputMode::Single
        }
    }

    /// Check if the channel is driven through an IQ mixer
    pub fn is_mixed(&self) -> bool {
        self.input_mode() == InputMode::Mixed
    }

    /// Check if the channel has an analog input
    pub fn is_readout(&self) -> bool {
        self.role == ChannelRole::Readout
    }

    /// Local oscillator handle
    pub fn oscillator(&self) -> &OscillatorHandle {
        &self.oscillator
    }

    /// Intermediate frequency (Hz)
    pub fn intermediate_frequency(&self) -> i64 {
        self.intermediate_frequency
    }

    /// Port wiring
    pub fn ports(&self) -> &PortMap {
        &self.ports
    }

    /// Mixer calibration offsets
    pub fn mixer_offsets(&self) -> &MixerOffsets {
        &self.mixer_offsets
    }

    /// Named operations
    pub fn operations(&self) -> &BTreeMap<String, PulseDefinition> {
        &self.operations
    }

    /// Operation by name
    pub fn operation(&self, name: &str) -> MixcalResult<&PulseDefinition> {
        self.operations
            .get(name)
            .ok_or_else(|| MixcalError::MissingOperation {
                channel: self.name.clone(),
                operation: name.to_string(),
            })
    }

    /// Time of flight (ns)
    pub fn time_of_flight(&self) -> i64 {
        self.time_of_flight
    }

    /// Smearing (ns)
    pub fn smearing(&self) -> i64 {
        self.smearing
    }

    /// Free-form attributes
    pub fn attributes(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.attributes
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    /// Set intermediate frequency (Hz)
    pub fn set_intermediate_frequency(&mut self, frequency: i64) {
        self.intermediate_frequency = frequency;
    }

    /// Replace the port wiring; the new keyset must be valid for the role
    pub fn set_ports(&mut self, ports: PortMap) -> MixcalResult<()> {
        self.role.check_ports(&self.name, &ports)?;
        self.ports = ports;
        Ok(())
    }

    /// Replace all mixer offsets
    pub fn set_mixer_offsets(&mut self, offsets: MixerOffsets) {
        self.mixer_offsets = offsets;
    }

    /// Set one mixer offset
    pub fn set_offset(&mut self, key: OffsetKey, value: f64) {
        self.mixer_offsets.set(key, value);
    }

    /// Set a pair of offsets, as written by one tuner evaluation
    pub fn set_offset_pair(&mut self, keys: (OffsetKey, OffsetKey), values: [f64; 2]) {
        self.mixer_offsets.set(keys.0, values[0]);
        self.mixer_offsets.set(keys.1, values[1]);
    }

    /// Add or replace an operation
    pub fn set_operation(&mut self, name: impl Into<String>, pulse: PulseDefinition) {
        self.operations.insert(name.into(), pulse);
    }

    /// Mutable access to an operation
    pub fn operation_mut(&mut self, name: &str) -> MixcalResult<&mut PulseDefinition> {
        let channel = self.name.clone();
        self.operations
            .get_mut(name)
            .ok_or_else(|| MixcalError::MissingOperation {
                channel,
                operation: name.to_string(),
            })
    }

    /// Remove an operation
    pub fn remove_operation(&mut self, name: &str) -> MixcalResult<PulseDefinition> {
        self.operations
            .remove(name)
            .ok_or_else(|| MixcalError::MissingOperation {
                channel: self.name.clone(),
                operation: name.to_string(),
            })
    }

    /// Set time of flight (ns)
    pub fn set_time_of_flight(&mut self, time_of_flight: i64) {
        self.time_of_flight = time_of_flight;
    }

    /// Set smearing (ns)
    pub fn set_smearing(&mut self, smearing: i64) {
        self.smearing = smearing;
    }

    /// Set a free-form attribute
    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }
}

impl fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlChannel")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("oscillator", &self.oscillator.name())
            .field("intermediate_frequency", &self.intermediate_frequency)
            .field("ports", &self.ports)
            .field("mixer_offsets", &self.mixer_offsets)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for ControlChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({:?}, {}, IF={}Hz, {} ops)",
            self.name,
            self.role,
            self.input_mode(),
            self.intermediate_frequency,
            self.operations.len()
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::oscillator::LocalOscillator;
    use crate::types::PortKey;
    use std::sync::{Arc, Mutex};

    /// In-memory oscillator for unit tests
    pub(crate) struct FixedOscillator {
        frequency: Mutex<f64>,
    }

    impl FixedOscillator {
        pub(crate) fn handle(frequency: f64) -> OscillatorHandle {
            Arc::new(Self {
                frequency: Mutex::new(frequency),
            })
        }
    }

    impl LocalOscillator for FixedOscillator {
        fn name(&self) -> &str {
            "fixed"
        }

        fn frequency(&self) -> MixcalResult<f64> {
            Ok(*self.frequency.lock().unwrap())
        }

        fn set_frequency(&self, frequency: f64) -> MixcalResult<()> {
            *self.frequency.lock().unwrap() = frequency;
            Ok(())
        }

        fn power(&self) -> MixcalResult<f64> {
            Ok(15.0)
        }

        fn set_power(&self, _power: f64) -> MixcalResult<()> {
            Ok(())
        }
    }

    fn iq_ports() -> PortMap {
        [(PortKey::I, 1), (PortKey::Q, 2)].into_iter().collect()
    }

    #[test]
    fn test_drive_channel() {
        let channel = ControlChannel::drive("QUBIT", FixedOscillator::handle(5e9), iq_ports())
            .unwrap()
            .with_intermediate_frequency(-50_000_000)
            .with_default_operations();

        assert!(channel.is_mixed());
        assert!(!channel.is_readout());
        assert_eq!(channel.operations().len(), 2);
        assert!(channel.operation(CONSTANT_PULSE).is_ok());
        assert!(channel.operation("missing").unwrap_err().is_structural());
    }

    #[test]
    fn test_invalid_keyset_rejected() {
        let ports: PortMap = [(PortKey::I, 1)].into_iter().collect();
        let err = ControlChannel::drive("QUBIT", FixedOscillator::handle(5e9), ports).unwrap_err();
        assert!(matches!(err, MixcalError::InvalidPortKeyset { .. }));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let err = ControlChannel::drive("a.b", FixedOscillator::handle(5e9), iq_ports()).unwrap_err();
        assert!(matches!(err, MixcalError::InvalidName(_)));
    }

    #[test]
    fn test_set_ports_checks_keyset() {
        let mut channel =
            ControlChannel::drive("QUBIT", FixedOscillator::handle(5e9), iq_ports()).unwrap();
        let bad: PortMap = [(PortKey::Q, 2)].into_iter().collect();
        assert!(channel.set_ports(bad).is_err());
        assert_eq!(channel.ports(), &iq_ports());

        let single: PortMap = [(PortKey::Single, 3)].into_iter().collect();
        channel.set_ports(single).unwrap();
        assert_eq!(channel.input_mode(), InputMode::Single);
    }

    #[test]
    fn test_readout_defaults() {
        let ports: PortMap = [(PortKey::I, 3), (PortKey::Q, 4), (PortKey::Out, 1)]
            .into_iter()
            .collect();
        let channel = ControlChannel::readout("RR", FixedOscillator::handle(8e9), ports)
            .unwrap()
            .with_default_operations()
            .with_time_of_flight(200);

        assert!(channel.is_readout());
        assert!(channel.operation(READOUT_PULSE).unwrap().is_measurement());
        assert_eq!(channel.time_of_flight(), 200);
    }

    #[test]
    fn test_single_input_defaults() {
        let ports: PortMap = [(PortKey::Single, 3)].into_iter().collect();
        let flux = ControlChannel::drive("FLUX", FixedOscillator::handle(0.0), ports)
            .unwrap()
            .with_default_operations();
        assert_eq!(flux.operations().len(), 2);
        assert!(flux
            .operations()
            .values()
            .all(|p| p.slots() == WaveformSlots::Single));

        let ports: PortMap = [(PortKey::Single, 3), (PortKey::Out, 1)].into_iter().collect();
        let rr = ControlChannel::readout("RR", FixedOscillator::handle(7e9), ports)
            .unwrap()
            .with_default_operations();
        let readout = rr.operation(READOUT_PULSE).unwrap();
        assert!(readout.is_measurement());
        assert_eq!(readout.slots(), WaveformSlots::Single);
    }

    #[test]
    fn test_remove_operation() {
        let mut channel = ControlChannel::drive("QUBIT", FixedOscillator::handle(5e9), iq_ports())
            .unwrap()
            .with_default_operations();
        assert!(channel.remove_operation(GAUSSIAN_PULSE).is_ok());
        assert!(channel.remove_operation(GAUSSIAN_PULSE).is_err());
        assert_eq!(channel.operations().len(), 1);
    }

    #[test]
    fn test_offset_pair() {
        let mut channel =
            ControlChannel::drive("QUBIT", FixedOscillator::handle(5e9), iq_ports()).unwrap();
        channel.set_offset_pair((OffsetKey::G, OffsetKey::P), [0.1, 0.05]);
        assert_eq!(channel.mixer_offsets().g, 0.1);
        assert_eq!(channel.mixer_offsets().p, 0.05);
    }
}
