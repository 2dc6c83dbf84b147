//! Spectrum probe interface
//!
//! Gantree: L3_Instruments → SpectrumProbe
//!
//! A spectrum analyzer sweeps a window around a center frequency and
//! returns one amplitude (dBm) per frequency bin.

use mixcal_core::constants::{analyzer, tuning};
use mixcal_core::error::{MixcalError, MixcalResult};
use mixcal_core::types::Hertz;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Sweep Settings
// ============================================================================

/// Sweep window and sensitivity
/// Gantree: SweepSettings // 스윕 설정
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Span (Hz)
    pub span: Hertz,
    /// Resolution bandwidth (Hz)
    pub rbw: Hertz,
    /// Reference level (dBm)
    pub ref_power: f64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            span: tuning::SPAN_HZ,
            rbw: tuning::RBW_HZ,
            ref_power: tuning::REF_POWER_DBM,
        }
    }
}

impl SweepSettings {
    /// Create with explicit values
    pub fn new(span: Hertz, rbw: Hertz, ref_power: f64) -> Self {
        Self {
            span,
            rbw,
            ref_power,
        }
    }

    /// Set span
    pub fn with_span(mut self, span: Hertz) -> Self {
        self.span = span;
        self
    }

    /// Set resolution bandwidth
    pub fn with_rbw(mut self, rbw: Hertz) -> Self {
        self.rbw = rbw;
        self
    }

    /// Set reference level
    pub fn with_ref_power(mut self, ref_power: f64) -> Self {
        self.ref_power = ref_power;
        self
    }

    /// Check the settings for a sweep centered at `center`
    /// Gantree: validate(center) -> MixcalResult<()> // 스윕 범위 검증
    pub fn validate(&self, center: Hertz) -> MixcalResult<()> {
        if !(analyzer::MIN_CENTER_HZ..=analyzer::MAX_CENTER_HZ).contains(&center) {
            return Err(out_of_range(
                "center",
                center,
                format!(
                    "must be in [{}, {}]",
                    analyzer::MIN_CENTER_HZ,
                    analyzer::MAX_CENTER_HZ
                ),
            ));
        }

        if !(self.span >= analyzer::MIN_SPAN_HZ) {
            return Err(out_of_range(
                "span",
                self.span,
                format!("must be >= {}", analyzer::MIN_SPAN_HZ),
            ));
        }

        if !(self.ref_power <= analyzer::MAX_REF_POWER_DBM) {
            return Err(out_of_range(
                "ref_power",
                self.ref_power,
                format!("must be <= {}", analyzer::MAX_REF_POWER_DBM),
            ));
        }

        self.validate_rbw(center)
    }

    fn validate_rbw(&self, center: Hertz) -> MixcalResult<()> {
        let start = center - self.span / 2.0;
        let rbw = self.rbw;

        let wide = self.span >= analyzer::WIDE_SPAN_HZ
            || (self.span > analyzer::LOW_START_SPAN_HZ && start < analyzer::LOW_START_FREQ_HZ);
        if wide && rbw < analyzer::WIDE_SPAN_MIN_RBW_HZ {
            return Err(out_of_range(
                "rbw",
                rbw,
                format!("must be >= {} for wide sweeps", analyzer::WIDE_SPAN_MIN_RBW_HZ),
            ));
        }

        let allowed = (analyzer::MIN_RBW_HZ..=analyzer::MAX_RBW_HZ).contains(&rbw)
            || rbw == analyzer::RBW_250K_HZ
            || (rbw == analyzer::RBW_6M_HZ
                && start >= analyzer::RBW_6M_MIN_HZ
                && self.span >= analyzer::RBW_6M_MIN_HZ);
        if !allowed {
            return Err(out_of_range(
                "rbw",
                rbw,
                "not an available resolution bandwidth".to_string(),
            ));
        }
        Ok(())
    }
}

fn out_of_range(parameter: &str, value: f64, reason: String) -> MixcalError {
    log::error!("Sweep {} {} out of bounds: {}", parameter, value, reason);
    MixcalError::SweepOutOfRange {
        parameter: parameter.to_string(),
        value,
        reason,
    }
}

impl fmt::Display for SweepSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sweep(span={:.3e}Hz, rbw={:.3e}Hz, ref={}dBm)",
            self.span, self.rbw, self.ref_power
        )
    }
}

// ============================================================================
// Sweep Results
// ============================================================================

/// Bin layout of the last sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepInfo {
    /// Number of bins
    pub sweep_length: usize,
    /// Frequency of the first bin (Hz)
    pub start_freq: Hertz,
    /// Bin width (Hz)
    pub bin_size: Hertz,
}

/// Amplitude spectrum
/// Gantree: Spectrum // 스펙트럼
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Bin frequencies (Hz)
    pub frequencies: Vec<Hertz>,
    /// Bin amplitudes (dBm)
    pub amplitudes: Vec<f64>,
}

impl Spectrum {
    /// Create from parallel arrays
    pub fn new(frequencies: Vec<Hertz>, amplitudes: Vec<f64>) -> MixcalResult<Self> {
        if frequencies.len() != amplitudes.len() {
            return Err(MixcalError::ProbeError(format!(
                "{} frequencies but {} amplitudes",
                frequencies.len(),
                amplitudes.len()
            )));
        }
        Ok(Self {
            frequencies,
            amplitudes,
        })
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }

    /// Index of the bin nearest `frequency`
    pub fn nearest_index(&self, frequency: Hertz) -> Option<usize> {
        self.frequencies
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - frequency)
                    .abs()
                    .total_cmp(&(*b - frequency).abs())
            })
            .map(|(i, _)| i)
    }

    /// Index of the strongest bin
    pub fn peak_index(&self) -> Option<usize> {
        self.amplitudes
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
    }
}

// ============================================================================
// Probe Trait
// ============================================================================

/// Spectrum analyzer driver
/// Gantree: SpectrumProbe // trait: sweep, sweep_info
pub trait SpectrumProbe: Send + Sync {
    /// Instrument name
    fn name(&self) -> &str;

    /// Sweep a window centered at `center`
    fn sweep(&mut self, center: Hertz, settings: &SweepSettings) -> MixcalResult<Spectrum>;

    /// Bin layout of the last sweep
    fn sweep_info(&self) -> Option<SweepInfo>;
}

// ============================================================================
// Tests
// ============================================================================
