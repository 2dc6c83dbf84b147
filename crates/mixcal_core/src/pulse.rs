//! Pulse definitions
//!
//! Gantree: L1_Model → PulseDefinition
//!
//! Named pulse operations and their waveform samples. A pulse occupies
//! either a single waveform slot or an I/Q pair, decided by its waveform
//! variant.

use crate::constants::{
    opx,
    waveform::{DEFAULT_AMP, DEFAULT_IW_NAMES},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Pulse Kind
// ============================================================================

/// Pulse operation type
/// Gantree: PulseKind // 펄스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PulseKind {
    /// Drive pulse
    #[default]
    Control,
    /// Readout pulse with digital marker and integration weights
    Measurement,
}

impl PulseKind {
    /// Name used in the configuration document
    pub fn as_str(&self) -> &'static str {
        match self {
            PulseKind::Control => "control",
            PulseKind::Measurement => "measurement",
        }
    }
}

impl fmt::Display for PulseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Waveform Slots
// ============================================================================

/// Waveform slot partition of a pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WaveformSlots {
    /// One "single" waveform
    Single,
    /// "I" and "Q" waveforms
    #[default]
    Iq,
}

impl WaveformSlots {
    /// Slot keys in document order
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            WaveformSlots::Single => &["single"],
            WaveformSlots::Iq => &["I", "Q"],
        }
    }
}

impl fmt::Display for WaveformSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveformSlots::Single => write!(f, "{{single}}"),
            WaveformSlots::Iq => write!(f, "{{I, Q}}"),
        }
    }
}

// ============================================================================
// Waveform Variant
// ============================================================================

/// Waveform shape of a pulse
/// Gantree: WaveformVariant // 파형 종류
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum WaveformVariant {
    /// Flat I, zero Q (or one flat single waveform)
    Constant {
        /// Multiplier of the default amplitude
        amplitude_scale: f64,
        /// Output slots
        #[serde(default)]
        slots: WaveformSlots,
    },

    /// Gaussian I with optional DRAG derivative on Q
    ///
    /// On a single slot only the envelope is played.
    Gaussian {
        /// Standard deviation (ns)
        sigma: u32,
        /// Number of sigmas spanned by the pulse
        chop: u32,
        /// Multiplier of the default amplitude
        amplitude_scale: f64,
        /// DRAG coefficient, zero disables the Q derivative
        drag: f64,
        /// Output slots
        #[serde(default)]
        slots: WaveformSlots,
    },

    /// User-supplied samples (V); Q present means an I/Q pulse
    Arbitrary {
        /// I or single samples
        i: Vec<f64>,
        /// Q samples
        #[serde(default, skip_serializing_if = "Option::is_none")]
        q: Option<Vec<f64>>,
    },
}

impl WaveformVariant {
    /// Slot partition implied by this variant
    pub fn slots(&self) -> WaveformSlots {
        match self {
            WaveformVariant::Constant { slots, .. } | WaveformVariant::Gaussian { slots, .. } => {
                *slots
            }
            WaveformVariant::Arbitrary { q: None, .. } => WaveformSlots::Single,
            WaveformVariant::Arbitrary { q: Some(_), .. } => WaveformSlots::Iq,
        }
    }
}

/// Samples of one waveform slot
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedWaveform {
    /// Single constant sample
    Constant(f64),
    /// Sample array
    Arbitrary(Vec<f64>),
}

impl RenderedWaveform {
    /// Smallest and largest sample
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            RenderedWaveform::Constant(sample) => (*sample, *sample),
            RenderedWaveform::Arbitrary(samples) => samples
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
                    (lo.min(s), hi.max(s))
                }),
        }
    }

    /// Number of samples (constant counts as one)
    pub fn len(&self) -> usize {
        match self {
            RenderedWaveform::Constant(_) => 1,
            RenderedWaveform::Arbitrary(samples) => samples.len(),
        }
    }

    /// Check if there are no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Integration Weights
// ============================================================================

/// Cosine/sine demodulation weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationWeight {
    /// Cosine weights
    pub cosine: Vec<f64>,
    /// Sine weights
    pub sine: Vec<f64>,
}

impl IntegrationWeight {
    /// Flat weights of `n` samples
    pub fn constant(cos: f64, sin: f64, n: usize) -> Self {
        Self {
            cosine: vec![cos; n],
            sine: vec![sin; n],
        }
    }
}

// ============================================================================
// Pulse Definition
// ============================================================================

/// A named operation's pulse
/// Gantree: PulseDefinition // 펄스 정의
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseDefinition {
    /// Control or measurement
    #[serde(default)]
    pub kind: PulseKind,

    /// Length in ns
    pub length: u32,

    /// Waveform shape
    pub waveform: WaveformVariant,

    /// Custom integration weights, measurement only; `None` means flat window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_weights: Option<BTreeMap<String, IntegrationWeight>>,
}

impl PulseDefinition {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Constant pulse
    pub fn constant(length: u32, amplitude_scale: f64) -> Self {
        Self {
            kind: PulseKind::Control,
            length,
            waveform: WaveformVariant::Constant {
                amplitude_scale,
                slots: WaveformSlots::Iq,
            },
            integration_weights: None,
        }
    }

    /// Gaussian pulse spanning `sigma * chop` ns
    pub fn gaussian(sigma: u32, chop: u32, amplitude_scale: f64, drag: f64) -> Self {
        Self {
            kind: PulseKind::Control,
            length: sigma * chop,
            waveform: WaveformVariant::Gaussian {
                sigma,
                chop,
                amplitude_scale,
                drag,
                slots: WaveformSlots::Iq,
            },
            integration_weights: None,
        }
    }

    /// Arbitrary pulse; length follows the I samples
    pub fn arbitrary(i: Vec<f64>, q: Option<Vec<f64>>) -> Self {
        Self {
            kind: PulseKind::Control,
            length: i.len() as u32,
            waveform: WaveformVariant::Arbitrary { i, q },
            integration_weights: None,
        }
    }

    /// Constant readout pulse with default integration weights
    pub fn constant_readout(length: u32, amplitude_scale: f64) -> Self {
        Self::constant(length, amplitude_scale).measurement()
    }

    // ========================================================================
    // Builder Methods
    // ========================================================================

    /// Mark as measurement pulse
    pub fn measurement(mut self) -> Self {
        self.kind = PulseKind::Measurement;
        self
    }

    /// Set length
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    /// Route a constant or gaussian pulse to `slots`
    ///
    /// Arbitrary pulses keep the partition given by their samples.
    pub fn with_slots(mut self, target: WaveformSlots) -> Self {
        match &mut self.waveform {
            WaveformVariant::Constant { slots, .. } | WaveformVariant::Gaussian { slots, .. } => {
                *slots = target
            }
            WaveformVariant::Arbitrary { .. } => {}
        }
        self
    }

    /// Set custom integration weights
    pub fn with_integration_weights(mut self, weights: BTreeMap<String, IntegrationWeight>) -> Self {
        self.integration_weights = Some(weights);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Slot partition
    pub fn slots(&self) -> WaveformSlots {
        self.waveform.slots()
    }

    /// Check if pulse has integration weights
    pub fn is_measurement(&self) -> bool {
        self.kind == PulseKind::Measurement
    }

    // ========================================================================
    // Sampling
    // ========================================================================

    /// Render waveforms, one entry per slot key
    /// Gantree: render(&self) -> Vec<(slot,RenderedWaveform)> // 샘플 생성
    pub fn render(&self) -> Vec<(&'static str, RenderedWaveform)> {
        match &self.waveform {
            WaveformVariant::Constant {
                amplitude_scale,
                slots,
            } => {
                let sample = RenderedWaveform::Constant(DEFAULT_AMP * amplitude_scale);
                match slots {
                    WaveformSlots::Single => vec![("single", sample)],
                    WaveformSlots::Iq => vec![("I", sample), ("Q", RenderedWaveform::Constant(0.0))],
                }
            }
            WaveformVariant::Gaussian {
                sigma,
                chop,
                amplitude_scale,
                drag,
                slots,
            } => {
                let (i, q) = gaussian_samples(self.length as usize, *sigma, *chop, *amplitude_scale, *drag);
                if *slots == WaveformSlots::Single {
                    return vec![("single", RenderedWaveform::Arbitrary(i))];
                }
                let q = match q {
                    Some(q) => RenderedWaveform::Arbitrary(q),
                    None => RenderedWaveform::Constant(0.0),
                };
                vec![("I", RenderedWaveform::Arbitrary(i)), ("Q", q)]
            }
            WaveformVariant::Arbitrary { i, q: None } => {
                vec![("single", RenderedWaveform::Arbitrary(i.clone()))]
            }
            WaveformVariant::Arbitrary { i, q: Some(q) } => vec![
                ("I", RenderedWaveform::Arbitrary(i.clone())),
                ("Q", RenderedWaveform::Arbitrary(q.clone())),
            ],
        }
    }

    /// Integration weights to write for a measurement pulse
    pub fn resolved_integration_weights(&self) -> BTreeMap<String, IntegrationWeight> {
        match &self.integration_weights {
            Some(weights) => weights.clone(),
            None => default_integration_weights(self.length),
        }
    }
}

impl fmt::Display for PulseDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match &self.waveform {
            WaveformVariant::Constant { .. } => "constant",
            WaveformVariant::Gaussian { .. } => "gaussian",
            WaveformVariant::Arbitrary { .. } => "arbitrary",
        };
        write!(f, "Pulse({}, {}, {}ns)", self.kind, shape, self.length)
    }
}

/// Flat window weights covering `length` ns
pub fn default_integration_weights(length: u32) -> BTreeMap<String, IntegrationWeight> {
    let n = (length / opx::CLOCK_CYCLE_NS) as usize;
    let mut weights = BTreeMap::new();
    let [cos_name, sin_name] = DEFAULT_IW_NAMES;
    weights.insert(cos_name.to_string(), IntegrationWeight::constant(1.0, 0.0, n));
    weights.insert(sin_name.to_string(), IntegrationWeight::constant(0.0, 1.0, n));
    weights
}

/// Gaussian envelope and optional DRAG derivative
fn gaussian_samples(
    n: usize,
    sigma: u32,
    chop: u32,
    amplitude_scale: f64,
    drag: f64,
) -> (Vec<f64>, Option<Vec<f64>>) {
    let sigma = sigma.max(1) as f64;
    let half_width = chop as f64 / 2.0 * sigma;
    let step = if n > 1 {
        2.0 * half_width / (n - 1) as f64
    } else {
        0.0
    };

    let ts: Vec<f64> = (0..n).map(|k| -half_width + k as f64 * step).collect();
    let envelope: Vec<f64> = ts
        .iter()
        .map(|t| (-(t * t) / (2.0 * sigma * sigma)).exp())
        .collect();

    let i = envelope
        .iter()
        .map(|e| DEFAULT_AMP * amplitude_scale * e)
        .collect();

    let q = if drag == 0.0 {
        None
    } else {
        Some(
            ts.iter()
                .zip(&envelope)
                .map(|(t, e)| drag * (0.25 / (sigma * sigma)) * t * e)
                .collect(),
        )
    };

    (i, q)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_render() {
        let pulse = PulseDefinition::constant(1000, 1.0);
        let rendered = pulse.render();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0], ("I", RenderedWaveform::Constant(0.25)));
        assert_eq!(rendered[1], ("Q", RenderedWaveform::Constant(0.0)));
        assert_eq!(pulse.slots(), WaveformSlots::Iq);
    }

    #[test]
    fn test_gaussian_render() {
        let pulse = PulseDefinition::gaussian(15, 4, 1.0, 0.0);
        assert_eq!(pulse.length, 60);

        let rendered = pulse.render();
        let RenderedWaveform::Arbitrary(i) = &rendered[0].1 else {
            panic!("expected sample array");
        };
        assert_eq!(i.len(), 60);

        let (lo, hi) = rendered[0].1.bounds();
        assert!(lo > 0.0);
        assert!(hi <= 0.25 + 1e-12);
        // symmetric envelope
        assert_relative_eq!(i[0], i[59], epsilon = 1e-12);
        assert_eq!(rendered[1].1, RenderedWaveform::Constant(0.0));
    }

    #[test]
    fn test_gaussian_drag() {
        let pulse = PulseDefinition::gaussian(10, 4, 0.5, 1.0);
        let rendered = pulse.render();
        let RenderedWaveform::Arbitrary(q) = &rendered[1].1 else {
            panic!("expected DRAG samples");
        };
        // antisymmetric derivative
        assert_relative_eq!(q[0], -q[39], epsilon = 1e-12);
    }

    #[test]
    fn test_arbitrary_slots() {
        let single = PulseDefinition::arbitrary(vec![0.1; 16], None);
        assert_eq!(single.slots(), WaveformSlots::Single);
        assert_eq!(single.length, 16);
        assert_eq!(single.render()[0].0, "single");

        let iq = PulseDefinition::arbitrary(vec![0.1; 16], Some(vec![0.0; 16]));
        assert_eq!(iq.slots(), WaveformSlots::Iq);
    }

    #[test]
    fn test_default_integration_weights() {
        let pulse = PulseDefinition::constant_readout(400, 1.0);
        assert!(pulse.is_measurement());

        let weights = pulse.resolved_integration_weights();
        assert_eq!(weights.len(), 2);
        assert_eq!(weights["iw1"].cosine, vec![1.0; 100]);
        assert_eq!(weights["iw1"].sine, vec![0.0; 100]);
        assert_eq!(weights["iw2"].sine, vec![1.0; 100]);
    }

    #[test]
    fn test_single_slot_render() {
        let constant = PulseDefinition::constant(100, 1.0).with_slots(WaveformSlots::Single);
        assert_eq!(constant.slots(), WaveformSlots::Single);
        assert_eq!(
            constant.render(),
            vec![("single", RenderedWaveform::Constant(0.25))]
        );

        // DRAG has no slot to play on
        let gaussian = PulseDefinition::gaussian(10, 4, 1.0, 1.0).with_slots(WaveformSlots::Single);
        let rendered = gaussian.render();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].0, "single");
        assert_eq!(rendered[0].1.len(), 40);

        // arbitrary partition follows its samples
        let arbitrary = PulseDefinition::arbitrary(vec![0.1; 16], Some(vec![0.0; 16]))
            .with_slots(WaveformSlots::Single);
        assert_eq!(arbitrary.slots(), WaveformSlots::Iq);
    }

    #[test]
    fn test_slots_default_when_absent() {
        let pulse: PulseDefinition =
            serde_json::from_str(r#"{"length": 100, "waveform": {"shape": "constant", "amplitude_scale": 1.0}}"#)
                .unwrap();
        assert_eq!(pulse.slots(), WaveformSlots::Iq);

        let pulse: PulseDefinition = serde_json::from_str(
            r#"{"length": 100, "waveform": {"shape": "constant", "amplitude_scale": 1.0, "slots": "single"}}"#,
        )
        .unwrap();
        assert_eq!(pulse.slots(), WaveformSlots::Single);
    }

    #[test]
    fn test_serde_shape_tag() {
        let pulse = PulseDefinition::gaussian(10, 4, 1.0, 0.0);
        let json = serde_json::to_string(&pulse).unwrap();
        assert!(json.contains("\"shape\":\"gaussian\""));
        let restored: PulseDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(pulse, restored);
    }
}
