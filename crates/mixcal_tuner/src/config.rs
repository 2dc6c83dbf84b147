//! Tuner configuration
//!
//! Gantree: L4_Tuning → TunerConfig
//!
//! Configuration for the mixer leakage minimization.

use mixcal_core::error::{MixcalError, MixcalResult};
use mixcal_core::tuning;
use mixcal_instruments::probe::SweepSettings;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mixer tuner configuration
/// Gantree: TunerConfig // 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Contrast below which leakage counts as suppressed (dB)
    /// Gantree: threshold: f64 // 허용 대비 (2.0)
    pub threshold: f64,

    /// Nelder-Mead iteration cap
    /// Gantree: max_iterations: usize // 최대 반복 (100)
    pub max_iterations: usize,

    /// Vertex spread tolerance
    /// Gantree: xatol: f64 // 정점 허용 오차 (1e-4)
    pub xatol: f64,

    /// Spectrum sweep window
    /// Gantree: sweep: SweepSettings // 스윕 설정
    pub sweep: SweepSettings,

    /// Starting simplex
    pub initial_simplex: [[f64; 2]; 3],

    /// Operation played while tuning
    pub tone_operation: String,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            threshold: tuning::THRESHOLD_DBM,
            max_iterations: tuning::MAX_ITERATIONS,
            xatol: tuning::XATOL,
            sweep: SweepSettings::default(),
            initial_simplex: tuning::INITIAL_SIMPLEX,
            tone_operation: tuning::TONE_OPERATION.to_string(),
        }
    }
}

impl TunerConfig {
    // ========================================================================
    // Builder Methods
    // ========================================================================

    /// Set contrast threshold
    /// Gantree: with_threshold(&mut,t) -> Self // 임계 설정
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set iteration cap
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set vertex spread tolerance
    pub fn with_xatol(mut self, xatol: f64) -> Self {
        self.xatol = xatol;
        self
    }

    /// Set sweep window
    pub fn with_sweep(mut self, sweep: SweepSettings) -> Self {
        self.sweep = sweep;
        self
    }

    /// Set starting simplex
    pub fn with_initial_simplex(mut self, simplex: [[f64; 2]; 3]) -> Self {
        self.initial_simplex = simplex;
        self
    }

    /// Set the operation played while tuning
    pub fn with_tone_operation(mut self, operation: impl Into<String>) -> Self {
        self.tone_operation = operation.into();
        self
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validate configuration
    /// Gantree: validate(&self) -> MixcalResult<()> // 검증
    pub fn validate(&self) -> MixcalResult<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(invalid("threshold", self.threshold));
        }

        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", 0.0));
        }

        if !(self.xatol.is_finite() && self.xatol > 0.0) {
            return Err(invalid("xatol", self.xatol));
        }

        if let Some(&value) = self.initial_simplex.iter().flatten().find(|v| !v.is_finite()) {
            return Err(invalid("initial_simplex", value));
        }

        if self.tone_operation.is_empty() {
            return Err(MixcalError::InvalidName(self.tone_operation.clone()));
        }

        Ok(())
    }
}

fn invalid(name: &str, value: f64) -> MixcalError {
    MixcalError::InvalidValue {
        name: name.to_string(),
        value,
    }
}

impl fmt::Display for TunerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TunerConfig(threshold={}dB, max_iter={}, xatol={:e}, {})",
            self.threshold, self.max_iterations, self.xatol, self.sweep
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TunerConfig::default();

        assert_eq!(config.threshold, 2.0);
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.xatol, 1e-4);
        assert_eq!(config.sweep.span, 2e6);
        assert_eq!(config.initial_simplex[1], [0.0, 0.1]);
        assert_eq!(config.tone_operation, "constant_pulse");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TunerConfig::default()
            .with_threshold(1.0)
            .with_max_iterations(50)
            .with_tone_operation("readout_pulse");

        assert_eq!(config.threshold, 1.0);
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.tone_operation, "readout_pulse");
    }

    #[test]
    fn test_validation() {
        assert!(TunerConfig::default().with_threshold(0.0).validate().is_err());
        assert!(TunerConfig::default()
            .with_max_iterations(0)
            .validate()
            .unwrap_err()
            .is_range_error());
        assert!(TunerConfig::default()
            .with_initial_simplex([[f64::NAN, 0.0], [0.0, 0.1], [0.1, 0.0]])
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: TunerConfig = serde_json::from_str(r#"{"threshold": 3.0}"#).unwrap();
        assert_eq!(config.threshold, 3.0);
        assert_eq!(config.max_iterations, 100);
    }
}
