//! # MIXCAL Tuner
//!
//! IQ mixer leakage minimization driven by spectrum measurements.
//!
//! ## Gantree Architecture
//!
//! ```text
//! mixcal_tuner // L4: Tuning (완료)
//!     L4_Tuning // 믹서 누설 보정 (완료)
//!         TunerConfig // 보정 설정 (완료)
//!         SimplexOptimizer // 넬더-미드 최소화 (완료)
//!             SimplexState // 정점/값/반복 (완료)
//!         Contrast // 피크 대 바닥 대비 (완료)
//!         MixerTuner // 보정 상태 기계 (완료)
//!             LeakageKind // 캐리어/사이드밴드 (완료)
//!             TuningReport // 결과 보고 (완료)
//!         Landscape // 격자 탐색 (완료)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use mixcal_tuner::prelude::*;
//! use mixcal_core::tuning;
//!
//! // Offset error bowl with its minimum at (0.03, -0.02)
//! let result = NelderMead::default()
//!     .minimize(tuning::INITIAL_SIMPLEX, |p| {
//!         Ok((p[0] - 0.03).powi(2) + (p[1] + 0.02).powi(2))
//!     })
//!     .unwrap();
//!
//! assert!(result.converged);
//! assert!((result.x[0] - 0.03).abs() < 1e-3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Tuner configuration (Gantree: L4_Tuning → TunerConfig)
pub mod config;

/// Nelder-Mead optimizer (Gantree: L4_Tuning → SimplexOptimizer)
pub mod simplex;

/// Contrast measurement (Gantree: L4_Tuning → Contrast)
pub mod contrast;

/// Leakage landscape (Gantree: L4_Tuning → Landscape)
pub mod landscape;

/// Mixer tuner (Gantree: L4_Tuning → MixerTuner)
pub mod tuner;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::TunerConfig;
pub use contrast::Contrast;
pub use landscape::{Landscape, LandscapeGrid};
pub use simplex::{NelderMead, Point, SimplexResult, SimplexState};
pub use tuner::{LeakageKind, MixerTuner, TuningOutcome, TuningPhase, TuningReport};

// ============================================================================
// Prelude
// ============================================================================

pub mod prelude {
    //! Convenient imports for common use cases
    //!
    //! ```rust
    //! use mixcal_tuner::prelude::*;
    //! ```

    pub use crate::config::TunerConfig;
    pub use crate::landscape::{Landscape, LandscapeGrid};
    pub use crate::simplex::{NelderMead, SimplexResult};
    pub use crate::tuner::{LeakageKind, MixerTuner, TuningOutcome, TuningReport};
}

// ============================================================================
// Version Information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::TuningPhase;
    use approx::assert_abs_diff_eq;
    use mixcal_config::prelude::*;
    use mixcal_core::prelude::*;
    use mixcal_instruments::prelude::*;

    const TRUTH: [f64; 4] = [0.03, -0.02, 0.05, 0.03];

    fn setup() -> (ControlChannel, Synthesizer, SimulatedMixerBench) {
        let lo = SimulatedOscillator::shared("lo", 5e9);
        let ports: PortMap = [(PortKey::I, 1), (PortKey::Q, 2)].into_iter().collect();
        let channel = ControlChannel::drive("QUBIT", lo, ports)
            .unwrap()
            .with_intermediate_frequency(-50_000_000)
            .with_default_operations();

        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&channel)).unwrap();

        let bench = SimulatedMixerBench::seeded(5).with_noise(0.0).with_imperfection(
            "QUBIT",
            MixerImperfection::new(TRUTH[0], TRUTH[1], TRUTH[2], TRUTH[3]),
        );
        (channel, synth, bench)
    }

    fn tuner(
        bench: &SimulatedMixerBench,
        config: TunerConfig,
    ) -> MixerTuner<SimulatedProbe, SimulatedRuntime> {
        MixerTuner::new(config, bench.probe(), bench.runtime()).unwrap()
    }

    #[test]
    fn test_tunes_carrier_and_sideband() {
        let (mut channel, mut synth, bench) = setup();
        let mut tuner = tuner(&bench, TunerConfig::default());

        let outcome = tuner.tune_channel(&mut channel, &mut synth).unwrap();
        assert_eq!(outcome.reports.len(), 2);

        let carrier = outcome.report(LeakageKind::Carrier).unwrap();
        assert!(carrier.initial_contrast > 20.0);
        assert!(carrier.final_contrast < carrier.initial_contrast - 20.0);
        assert!(carrier.iterations > 0);
        assert_abs_diff_eq!(carrier.offsets[0], TRUTH[0], epsilon = 2e-3);
        assert_abs_diff_eq!(carrier.offsets[1], TRUTH[1], epsilon = 2e-3);

        let sideband = outcome.report(LeakageKind::Sideband).unwrap();
        assert!(sideband.initial_contrast > 20.0);
        assert!(sideband.final_contrast < sideband.initial_contrast - 20.0);
        assert_abs_diff_eq!(sideband.offsets[0], TRUTH[2], epsilon = 5e-3);
        assert_abs_diff_eq!(sideband.offsets[1], TRUTH[3], epsilon = 5e-3);

        // tuned values live in the channel and the document
        let offsets = channel.mixer_offsets();
        assert_eq!([offsets.i, offsets.q], carrier.offsets);
        assert_eq!([offsets.g, offsets.p], sideband.offsets);
        assert_eq!(synth.document().output_offset(1), Some(offsets.i));
        let expected = MixerCorrectionMatrix::from_offsets(offsets.g, offsets.p).unwrap();
        assert_eq!(
            synth.document().mixer_correction("QUBIT"),
            Some(expected.as_array())
        );

        // job halted
        assert!(!bench.element_state("QUBIT").unwrap().playing);
        assert_eq!(tuner.phase(), TuningPhase::Idle);
    }

    #[test]
    fn test_calibrated_channel_skips_optimization() {
        let (mut channel, mut synth, bench) = setup();
        channel.set_mixer_offsets(MixerOffsets::new(TRUTH[0], TRUTH[1], TRUTH[2], TRUTH[3]));
        synth.build_channel(&channel).unwrap();

        let mut tuner = tuner(&bench, TunerConfig::default());
        let outcome = tuner.tune_channel(&mut channel, &mut synth).unwrap();

        assert!(outcome.is_converged());
        for report in &outcome.reports {
            assert_eq!(report.iterations, 0);
            assert!(report.final_contrast < 2.0);
        }
        assert_eq!(bench.update_count(), 0);
    }

    #[test]
    fn test_iteration_cap_warns() {
        let (mut channel, mut synth, bench) = setup();
        let config = TunerConfig::default().with_max_iterations(2);
        let mut tuner = tuner(&bench, config);

        let outcome = tuner.tune_channel(&mut channel, &mut synth).unwrap();

        assert!(!outcome.is_converged());
        assert_eq!(outcome.warnings().count(), 2);
        assert!(outcome
            .warnings()
            .all(|w| matches!(w, Warning::Convergence { iterations: 2, .. })));
    }

    #[test]
    fn test_missing_tone_operation_fails() {
        let (mut channel, mut synth, bench) = setup();
        let config = TunerConfig::default().with_tone_operation("missing");
        let mut tuner = tuner(&bench, config);

        let err = tuner.tune_channel(&mut channel, &mut synth).unwrap_err();
        assert!(err.is_collaborator_error());
    }

    /// Analyzer that stops answering after a number of sweeps
    struct FlakyAnalyzer {
        inner: SimulatedProbe,
        remaining: usize,
    }

    impl SpectrumProbe for FlakyAnalyzer {
        fn name(&self) -> &str {
            "flaky"
        }

        fn sweep(&mut self, center: Hertz, settings: &SweepSettings) -> MixcalResult<Spectrum> {
            if self.remaining == 0 {
                return Err(MixcalError::ProbeError("device disconnected".to_string()));
            }
            self.remaining -= 1;
            self.inner.sweep(center, settings)
        }

        fn sweep_info(&self) -> Option<SweepInfo> {
            self.inner.sweep_info()
        }
    }

    #[test]
    fn test_sweep_failure_during_optimization_halts_job() {
        let (mut channel, mut synth, bench) = setup();
        let analyzer = FlakyAnalyzer {
            inner: bench.probe(),
            remaining: 3,
        };
        let mut tuner = MixerTuner::new(TunerConfig::default(), analyzer, bench.runtime()).unwrap();

        let err = tuner.tune_channel(&mut channel, &mut synth).unwrap_err();
        assert!(err.is_collaborator_error());
        assert!(matches!(err, MixcalError::ProbeError(_)));

        // candidates were pushed before the failure, the tone is stopped
        assert!(bench.update_count() > 0);
        assert!(!bench.element_state("QUBIT").unwrap().playing);
        assert_eq!(tuner.phase(), TuningPhase::Idle);
    }

    #[test]
    fn test_unregistered_channel_fails() {
        let (_, mut synth, bench) = setup();
        let lo = SimulatedOscillator::shared("lo2", 6e9);
        let ports: PortMap = [(PortKey::I, 3), (PortKey::Q, 4)].into_iter().collect();
        let mut other = ControlChannel::drive("OTHER", lo, ports)
            .unwrap()
            .with_default_operations();

        let mut tuner = tuner(&bench, TunerConfig::default());
        let err = tuner.tune_channel(&mut other, &mut synth).unwrap_err();
        assert!(matches!(err, MixcalError::UnknownChannel(_)));
    }

    #[test]
    fn test_landscape_restores_offsets() {
        let (mut channel, mut synth, bench) = setup();
        let mut session = bench.runtime().open(synth.document()).unwrap();
        let mut job = session
            .execute(&Program::continuous_tone("QUBIT", tuning::TONE_OPERATION))
            .unwrap();

        let mut tuner = tuner(&bench, TunerConfig::default());
        let grid = LandscapeGrid::new([TRUTH[0], TRUTH[1]], 0.02, 5);
        let landscape = tuner
            .landscape(LeakageKind::Carrier, &mut channel, &mut synth, &mut job, &grid)
            .unwrap();

        let (point, contrast) = landscape.minimum().unwrap();
        assert_abs_diff_eq!(point[0], TRUTH[0], epsilon = 1e-9);
        assert_abs_diff_eq!(point[1], TRUTH[1], epsilon = 1e-9);
        assert!(contrast < 1.0);

        assert_eq!(channel.mixer_offsets().i, 0.0);
        assert_eq!(bench.element_state("QUBIT").unwrap().dc, [0.0, 0.0]);
    }
}
