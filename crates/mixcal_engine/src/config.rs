//! Stage configuration
//!
//! Gantree: L5_Integration → StageConfig
//!
//! Declarative description of a stage: channels with their wiring,
//! frequencies, calibration offsets and operations, plus tuner settings.
//! Oscillators are referenced by name and supplied at load time.

use mixcal_core::channel::ControlChannel;
use mixcal_core::error::{MixcalError, MixcalResult};
use mixcal_core::oscillator::OscillatorHandle;
use mixcal_core::pulse::PulseDefinition;
use mixcal_core::types::{ChannelRole, MixerOffsets, PortMap};
use mixcal_tuner::config::TunerConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

fn default_true() -> bool {
    true
}

/// Declarative channel
/// Gantree: ChannelSpec // 채널 명세
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Unique channel name
    pub name: String,

    /// Drive or readout
    #[serde(default)]
    pub role: ChannelRole,

    /// Name of the local oscillator
    pub oscillator: String,

    /// Port wiring
    pub ports: PortMap,

    /// Intermediate frequency (Hz)
    #[serde(default)]
    pub intermediate_frequency: i64,

    /// Calibration offsets
    #[serde(default)]
    pub mixer_offsets: MixerOffsets,

    /// Start from the role's default operations
    #[serde(default = "default_true")]
    pub default_operations: bool,

    /// Operations added on top of (or replacing) the defaults
    #[serde(default)]
    pub operations: BTreeMap<String, PulseDefinition>,

    /// Time of flight (ns), readout only
    #[serde(default)]
    pub time_of_flight: i64,

    /// Smearing (ns), readout only
    #[serde(default)]
    pub smearing: i64,

    /// Free-form metadata
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ChannelSpec {
    /// Build the channel around `oscillator`
    /// Gantree: into_channel(self,lo) -> MixcalResult<ControlChannel> // 채널 생성
    pub fn into_channel(self, oscillator: OscillatorHandle) -> MixcalResult<ControlChannel> {
        let mut channel = ControlChannel::new(self.name, self.role, oscillator, self.ports)?
            .with_intermediate_frequency(self.intermediate_frequency)
            .with_mixer_offsets(self.mixer_offsets)
            .with_time_of_flight(self.time_of_flight)
            .with_smearing(self.smearing);

        if self.default_operations {
            channel = channel.with_default_operations();
        }
        for (name, pulse) in self.operations {
            channel.set_operation(name, pulse);
        }
        for (key, value) in self.attributes {
            channel.set_attribute(key, value);
        }
        Ok(channel)
    }
}

/// Stage configuration
/// Gantree: StageConfig // 스테이지 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StageConfig {
    /// Channels in build order
    #[serde(default)]
    pub channels: Vec<ChannelSpec>,

    /// Mixer tuner settings
    #[serde(default)]
    pub tuner: TunerConfig,
}

impl StageConfig {
    /// Parse from JSON
    pub fn from_json(json: &str) -> MixcalResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> MixcalResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add a channel
    pub fn with_channel(mut self, channel: ChannelSpec) -> Self {
        self.channels.push(channel);
        self
    }

    /// Set tuner settings
    pub fn with_tuner(mut self, tuner: TunerConfig) -> Self {
        self.tuner = tuner;
        self
    }

    /// Oscillator names referenced by the channels
    pub fn oscillator_names(&self) -> BTreeSet<&str> {
        self.channels.iter().map(|c| c.oscillator.as_str()).collect()
    }

    /// Validate configuration
    /// Gantree: validate(&self) -> MixcalResult<()> // 검증
    pub fn validate(&self) -> MixcalResult<()> {
        let mut seen = BTreeSet::new();
        for spec in &self.channels {
            if !seen.insert(spec.name.as_str()) {
                return Err(MixcalError::DuplicateChannel(spec.name.clone()));
            }
            spec.role.check_ports(&spec.name, &spec.ports)?;
        }
        self.tuner.validate()
    }
}

impl fmt::Display for StageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.channels.iter().map(|c| c.name.as_str()).collect();
        write!(f, "StageConfig([{}], {})", names.join(", "), self.tuner)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mixcal_core::types::PortKey;

    const STAGE: &str = r#"{
        "channels": [
            {
                "name": "QUBIT",
                "oscillator": "lo_qubit",
                "ports": {"I": 1, "Q": 2},
                "intermediate_frequency": -50000000,
                "attributes": {"T1": 2.5e-5}
            },
            {
                "name": "RR",
                "role": "readout",
                "oscillator": "lo_rr",
                "ports": {"I": 3, "Q": 4, "out": 1},
                "intermediate_frequency": -40000000,
                "time_of_flight": 200,
                "mixer_offsets": {"i": 0.01, "q": 0.0, "g": 0.0, "p": 0.0}
            }
        ],
        "tuner": {"threshold": 3.0}
    }"#;

    #[test]
    fn test_parse_stage() {
        let config = StageConfig::from_json(STAGE).unwrap();

        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.tuner.threshold, 3.0);
        assert_eq!(config.tuner.max_iterations, 100);

        let rr = &config.channels[1];
        assert_eq!(rr.role, ChannelRole::Readout);
        assert_eq!(rr.ports.get(&PortKey::Out), Some(&1));
        assert_eq!(rr.mixer_offsets.i, 0.01);
        assert!(rr.default_operations);

        let names: Vec<&str> = config.oscillator_names().into_iter().collect();
        assert_eq!(names, vec!["lo_qubit", "lo_rr"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"{"channels": [
            {"name": "A", "oscillator": "lo", "ports": {"I": 1, "Q": 2}},
            {"name": "A", "oscillator": "lo", "ports": {"I": 3, "Q": 4}}
        ]}"#;
        let err = StageConfig::from_json(json).unwrap_err();
        assert!(matches!(err, MixcalError::DuplicateChannel(_)));
    }

    #[test]
    fn test_keyset_checked_on_load() {
        let json = r#"{"channels": [
            {"name": "A", "oscillator": "lo", "ports": {"I": 1}}
        ]}"#;
        assert!(StageConfig::from_json(json).unwrap_err().is_structural());
    }

    #[test]
    fn test_malformed_json() {
        assert!(StageConfig::from_json("{").is_err());
    }
}
