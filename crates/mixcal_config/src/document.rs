//! Configuration document
//!
//! Gantree: L2_Synthesis → ConfigDocument
//!
//! Typed wire-format tree consumed by the execution runtime. Serialized key
//! names are those the runtime expects; every section is an ordered map so
//! two builds of the same model serialize identically.

use mixcal_core::constants::{opx, waveform};
use mixcal_core::error::MixcalResult;
use mixcal_core::pulse::{IntegrationWeight, PulseKind, RenderedWaveform};
use mixcal_core::types::PortNumber;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Naming
// ============================================================================

/// Mixer entry name of a channel
pub fn mixer_name(channel: &str) -> String {
    format!("{}.mixer", channel)
}

/// Pulse entry name of a channel operation
pub fn pulse_name(channel: &str, operation: &str) -> String {
    format!("{}.{}", channel, operation)
}

/// Waveform entry name of a pulse slot
pub fn waveform_name(pulse: &str, slot: &str) -> String {
    format!("{}.waveform.{}", pulse, slot)
}

/// Integration weight entry name of a pulse
pub fn integration_weight_name(pulse: &str, key: &str) -> String {
    format!("{}.{}", pulse, key)
}

/// Element output key bound to an analog input port
pub fn output_key(port: PortNumber) -> String {
    format!("out{}", port)
}

// ============================================================================
// Sections
// ============================================================================

/// Reference to a controller port: (controller, port)
pub type PortRef = (String, PortNumber);

/// Build a reference to a port on the single controller
pub fn port_ref(port: PortNumber) -> PortRef {
    (opx::CONTROLLER_NAME.to_string(), port)
}

/// DC offset of an analog port
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalogPortConfig {
    /// DC offset (V)
    pub offset: f64,
}

/// Controller stanza
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Hardware type
    #[serde(rename = "type")]
    pub controller_type: String,
    /// Analog outputs by port number
    #[serde(default)]
    pub analog_outputs: BTreeMap<PortNumber, AnalogPortConfig>,
    /// Analog inputs by port number
    #[serde(default)]
    pub analog_inputs: BTreeMap<PortNumber, AnalogPortConfig>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller_type: opx::CONTROLLER_TYPE.to_string(),
            analog_outputs: BTreeMap::new(),
            analog_inputs: BTreeMap::new(),
        }
    }
}

/// IQ mixer inputs of an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MixInputs {
    /// I port
    #[serde(rename = "I", default, skip_serializing_if = "Option::is_none")]
    pub i: Option<PortRef>,
    /// Q port
    #[serde(rename = "Q", default, skip_serializing_if = "Option::is_none")]
    pub q: Option<PortRef>,
    /// LO frequency (Hz)
    pub lo_frequency: i64,
    /// Mixer entry name
    pub mixer: String,
}

/// Single analog output of an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SingleInput {
    /// Output port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortRef>,
}

/// Element (one per channel)
/// Gantree: ElementConfig // 요소 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ElementConfig {
    /// Mixed inputs
    #[serde(rename = "mixInputs", default, skip_serializing_if = "Option::is_none")]
    pub mix_inputs: Option<MixInputs>,
    /// Single input
    #[serde(rename = "singleInput", default, skip_serializing_if = "Option::is_none")]
    pub single_input: Option<SingleInput>,
    /// Intermediate frequency (Hz)
    pub intermediate_frequency: i64,
    /// Operation name → pulse name
    #[serde(default)]
    pub operations: BTreeMap<String, String>,
    /// Output key → analog input port
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, PortRef>,
    /// Time of flight (ns)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_flight: Option<i64>,
    /// Smearing (ns)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smearing: Option<i64>,
}

/// Mixer calibration entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MixerEntry {
    /// Intermediate frequency (Hz)
    pub intermediate_frequency: i64,
    /// LO frequency (Hz)
    pub lo_frequency: i64,
    /// Row-major correction matrix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<[f64; 4]>,
}

/// Pulse entry
/// Gantree: PulseConfig // 펄스 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Control or measurement
    pub operation: PulseKind,
    /// Length (ns)
    pub length: u32,
    /// Slot key → waveform name
    pub waveforms: BTreeMap<String, String>,
    /// Digital marker name, measurement only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital_marker: Option<String>,
    /// Weight key → integration weight name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub integration_weights: BTreeMap<String, String>,
}

/// Waveform entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WaveformConfig {
    /// Constant sample
    Constant {
        /// Sample (V)
        sample: f64,
    },
    /// Sample array
    Arbitrary {
        /// Samples (V)
        samples: Vec<f64>,
    },
}

impl From<RenderedWaveform> for WaveformConfig {
    fn from(rendered: RenderedWaveform) -> Self {
        match rendered {
            RenderedWaveform::Constant(sample) => WaveformConfig::Constant { sample },
            RenderedWaveform::Arbitrary(samples) => WaveformConfig::Arbitrary { samples },
        }
    }
}

/// Digital waveform entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalWaveformConfig {
    /// (value, duration) pairs
    pub samples: Vec<(u8, u32)>,
}

// ============================================================================
// Config Document
// ============================================================================

/// Configuration document
/// Gantree: ConfigDocument // 설정 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigDocument {
    /// Schema version, zero until initialized
    pub version: u32,
    /// Controller stanzas
    pub controllers: BTreeMap<String, ControllerConfig>,
    /// Elements by channel name
    pub elements: BTreeMap<String, ElementConfig>,
    /// Pulses by pulse name
    pub pulses: BTreeMap<String, PulseConfig>,
    /// Waveforms by waveform name
    pub waveforms: BTreeMap<String, WaveformConfig>,
    /// Digital waveforms by marker name
    pub digital_waveforms: BTreeMap<String, DigitalWaveformConfig>,
    /// Integration weights by name
    pub integration_weights: BTreeMap<String, IntegrationWeight>,
    /// Mixer entries by mixer name
    pub mixers: BTreeMap<String, Vec<MixerEntry>>,
}

impl ConfigDocument {
    /// Create an empty, uninitialized document
    pub fn new() -> Self {
        Self::default()
    }

    /// Set version and the controller stanza
    pub fn initialize(&mut self) {
        self.version = opx::CONFIG_VERSION;
        self.controllers
            .entry(opx::CONTROLLER_NAME.to_string())
            .or_default();
    }

    /// Check if `initialize` has run
    pub fn is_initialized(&self) -> bool {
        self.version != 0
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The single controller stanza
    pub fn controller(&self) -> Option<&ControllerConfig> {
        self.controllers.get(opx::CONTROLLER_NAME)
    }

    /// Mutable controller stanza, created on demand
    pub fn controller_mut(&mut self) -> &mut ControllerConfig {
        self.controllers
            .entry(opx::CONTROLLER_NAME.to_string())
            .or_default()
    }

    /// Element of a channel
    pub fn element(&self, channel: &str) -> Option<&ElementConfig> {
        self.elements.get(channel)
    }

    /// Mixer entry of a channel
    pub fn mixer(&self, channel: &str) -> Option<&MixerEntry> {
        self.mixers.get(&mixer_name(channel)).and_then(|m| m.first())
    }

    /// Correction matrix of a channel's mixer
    pub fn mixer_correction(&self, channel: &str) -> Option<[f64; 4]> {
        self.mixer(channel).and_then(|m| m.correction)
    }

    /// DC offset of an analog output port
    pub fn output_offset(&self, port: PortNumber) -> Option<f64> {
        self.controller()
            .and_then(|c| c.analog_outputs.get(&port))
            .map(|p| p.offset)
    }

    /// DC offset of an analog input port
    pub fn input_offset(&self, port: PortNumber) -> Option<f64> {
        self.controller()
            .and_then(|c| c.analog_inputs.get(&port))
            .map(|p| p.offset)
    }

    /// Pulse entry of a channel operation
    pub fn pulse(&self, channel: &str, operation: &str) -> Option<&PulseConfig> {
        self.pulses.get(&pulse_name(channel, operation))
    }

    /// Ensure the readout digital marker exists
    pub fn ensure_readout_marker(&mut self) {
        self.digital_waveforms
            .entry(waveform::RO_DIGITAL_MARKER.to_string())
            .or_insert_with(|| DigitalWaveformConfig {
                samples: waveform::RO_DIGITAL_SAMPLES.to_vec(),
            });
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Serialize to compact JSON
    pub fn to_json(&self) -> MixcalResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json_pretty(&self) -> MixcalResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> MixcalResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> MixcalResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
