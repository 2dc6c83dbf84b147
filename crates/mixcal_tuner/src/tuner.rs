//! Mixer tuner
//!
//! Gantree: L4_Tuning → MixerTuner
//!
//! Calibration state machine that suppresses the LO carrier (via the I/Q
//! DC offsets) and the image sideband (via the G/P correction) of a mixed
//! channel. Every objective evaluation writes the candidate offsets into the
//! channel, rebuilds that channel through the synthesizer, pushes the
//! resulting document values to the running job and re-sweeps the probe.
//! Contrast is read at the center bin against the floor of the baseline
//! sweep.

use crate::config::TunerConfig;
use crate::contrast::Contrast;
use crate::landscape::{Landscape, LandscapeGrid};
use crate::simplex::{NelderMead, Point};
use mixcal_config::document::ConfigDocument;
use mixcal_config::synthesizer::Synthesizer;
use mixcal_core::channel::ControlChannel;
use mixcal_core::error::{MixcalError, MixcalResult, Warning};
use mixcal_core::types::{Hertz, OffsetKey, PortKey};
use mixcal_instruments::probe::{SpectrumProbe, SweepSettings};
use mixcal_instruments::runtime::{ExecutionRuntime, JobHandle, Program, Session};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Leakage Kind
// ============================================================================

/// Leakage product being suppressed
/// Gantree: LeakageKind // 누설 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakageKind {
    /// LO feedthrough at the LO frequency, tuned with I/Q
    Carrier,
    /// Image at LO - IF, tuned with G/P
    Sideband,
}

impl LeakageKind {
    /// Tuning order
    pub const ALL: [LeakageKind; 2] = [LeakageKind::Carrier, LeakageKind::Sideband];

    /// Offsets tuned for this kind
    pub fn offset_keys(&self) -> (OffsetKey, OffsetKey) {
        match self {
            LeakageKind::Carrier => (OffsetKey::I, OffsetKey::Q),
            LeakageKind::Sideband => (OffsetKey::G, OffsetKey::P),
        }
    }

    /// Frequency where the leakage appears
    pub fn probe_frequency(&self, lo_frequency: Hertz, intermediate_frequency: Hertz) -> Hertz {
        match self {
            LeakageKind::Carrier => lo_frequency,
            LeakageKind::Sideband => lo_frequency - intermediate_frequency,
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            LeakageKind::Carrier => "carrier",
            LeakageKind::Sideband => "sideband",
        }
    }
}

impl fmt::Display for LeakageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Phase
// ============================================================================

/// Tuner phase
/// Gantree: TuningPhase // Idle → Measuring → Optimizing → Converged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TuningPhase {
    /// No measurement in progress
    #[default]
    Idle,
    /// Initial contrast measurement
    Measuring,
    /// Simplex search running
    Optimizing,
    /// Final offsets written
    Converged,
}

// ============================================================================
// Reports
// ============================================================================

/// Result of tuning one leakage kind
/// Gantree: TuningReport // 보정 보고서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningReport {
    /// Channel name
    pub channel: String,
    /// Leakage kind
    pub leakage: LeakageKind,
    /// Probe frequency (Hz)
    pub frequency: Hertz,
    /// Contrast before tuning (dB)
    pub initial_contrast: f64,
    /// Contrast after tuning (dB)
    pub final_contrast: f64,
    /// Final offset pair
    pub offsets: Point,
    /// Simplex iterations (0 if already below threshold)
    pub iterations: usize,
    /// Objective evaluations
    pub evaluations: usize,
    /// Non-fatal conditions
    pub warnings: Vec<Warning>,
}

impl TuningReport {
    /// Check if the final contrast is within threshold and no warning was raised
    pub fn is_converged(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Contrast reduction (dB)
    pub fn improvement(&self) -> f64 {
        self.initial_contrast - self.final_contrast
    }
}

impl fmt::Display for TuningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {:.2}dB -> {:.2}dB at [{:.6}, {:.6}] ({} iterations)",
            self.channel,
            self.leakage,
            self.initial_contrast,
            self.final_contrast,
            self.offsets[0],
            self.offsets[1],
            self.iterations
        )
    }
}

/// Results of tuning every leakage kind of one channel
/// Gantree: TuningOutcome // 채널 보정 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TuningOutcome {
    /// Channel name
    pub channel: String,
    /// One report per leakage kind, in tuning order
    pub reports: Vec<TuningReport>,
}

impl TuningOutcome {
    /// Report of one leakage kind
    pub fn report(&self, kind: LeakageKind) -> Option<&TuningReport> {
        self.reports.iter().find(|r| r.leakage == kind)
    }

    /// All warnings
    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.reports.iter().flat_map(|r| r.warnings.iter())
    }

    /// Check if every kind converged
    pub fn is_converged(&self) -> bool {
        self.reports.iter().all(TuningReport::is_converged)
    }
}

// ============================================================================
// Mixer Tuner
// ============================================================================

/// IQ mixer calibration driver
/// Gantree: MixerTuner // 믹서 보정기
pub struct MixerTuner<P: SpectrumProbe, R: ExecutionRuntime> {
    /// Configuration
    config: TunerConfig,

    /// Spectrum analyzer
    probe: P,

    /// Pulse-execution runtime
    runtime: R,

    /// Current phase
    phase: TuningPhase,
}

impl<P: SpectrumProbe, R: ExecutionRuntime> MixerTuner<P, R> {
    // ========================================================================
    // Constructor
    // ========================================================================

    /// Create a tuner
    pub fn new(config: TunerConfig, probe: P, runtime: R) -> MixcalResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            probe,
            runtime,
            phase: TuningPhase::Idle,
        })
    }

    // ========================================================================
    // Channel Tuning
    // ========================================================================

    /// Tune carrier then sideband of a registered mixed channel
    ///
    /// Opens a session with the current document, plays the tone operation
    /// continuously and halts the job when done, also on failure.
    /// Gantree: tune_channel(&mut,channel,synth) -> MixcalResult<TuningOutcome> // 채널 보정
    pub fn tune_channel(
        &mut self,
        channel: &mut ControlChannel,
        synth: &mut Synthesizer,
    ) -> MixcalResult<TuningOutcome> {
        let mut outcome = TuningOutcome {
            channel: channel.name().to_string(),
            reports: Vec::new(),
        };
        if !channel.is_mixed() {
            log::warn!("Skipping '{}': not an IQ mixer channel", channel.name());
            return Ok(outcome);
        }

        let document = synth.build_channel(channel)?;
        let mut session = self.runtime.open(document)?;
        let program = Program::continuous_tone(channel.name(), self.config.tone_operation.as_str());
        let mut job = session.execute(&program)?;
        log::info!("Tuning '{}' with {}", channel.name(), program);

        let mut failure = None;
        for kind in LeakageKind::ALL {
            match self.minimize(kind, channel, synth, &mut job) {
                Ok(report) => outcome.reports.push(report),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let halted = job.halt();
        self.phase = TuningPhase::Idle;
        if let Some(err) = failure {
            return Err(err);
        }
        halted?;
        Ok(outcome)
    }

    /// Suppress one leakage kind while `job` plays on the channel
    /// Gantree: minimize(&mut,kind,channel,synth,job) -> MixcalResult<TuningReport> // 누설 최소화
    pub fn minimize<J: JobHandle>(
        &mut self,
        kind: LeakageKind,
        channel: &mut ControlChannel,
        synth: &mut Synthesizer,
        job: &mut J,
    ) -> MixcalResult<TuningReport> {
        self.enter(TuningPhase::Measuring, channel.name(), kind);

        let frequency = probe_frequency(kind, channel)?;
        let threshold = self.config.threshold;
        let sweep = self.config.sweep;
        let keys = kind.offset_keys();
        let offsets = channel.mixer_offsets();
        let current = [offsets.get(keys.0), offsets.get(keys.1)];

        let baseline = Contrast::measure(&self.probe.sweep(frequency, &sweep)?, frequency)?;
        let initial = baseline.value();
        log::info!(
            "'{}' {} contrast {:.2}dB at {:.6e}Hz",
            channel.name(),
            kind,
            initial,
            frequency
        );

        if initial < threshold {
            self.enter(TuningPhase::Converged, channel.name(), kind);
            return Ok(TuningReport {
                channel: channel.name().to_string(),
                leakage: kind,
                frequency,
                initial_contrast: initial,
                final_contrast: initial,
                offsets: current,
                iterations: 0,
                evaluations: 0,
                warnings: Vec::new(),
            });
        }

        self.enter(TuningPhase::Optimizing, channel.name(), kind);
        let optimizer = NelderMead::new(self.config.xatol, threshold, self.config.max_iterations);
        let probe = &mut self.probe;
        let result = optimizer.minimize(self.config.initial_simplex, |point| {
            evaluate(kind, point, &baseline, frequency, &sweep, probe, channel, synth, job)
        })?;

        channel.set_offset_pair(keys, result.x);
        apply(kind, channel, synth, job)?;
        let final_contrast = baseline.resample(&self.probe.sweep(frequency, &sweep)?)?.value();

        let mut warnings = Vec::new();
        if !result.converged || final_contrast > threshold {
            let warning = Warning::Convergence {
                channel: channel.name().to_string(),
                leakage: kind.to_string(),
                contrast: final_contrast,
                threshold,
                iterations: result.iterations,
            };
            log::warn!("{}", warning);
            warnings.push(warning);
        }

        self.enter(TuningPhase::Converged, channel.name(), kind);
        let report = TuningReport {
            channel: channel.name().to_string(),
            leakage: kind,
            frequency,
            initial_contrast: initial,
            final_contrast,
            offsets: result.x,
            iterations: result.iterations,
            evaluations: result.evaluations,
            warnings,
        };
        log::info!("{}", report);
        Ok(report)
    }

    /// Sample the contrast of one leakage kind over `grid`
    ///
    /// The channel's offsets are restored and pushed back afterwards.
    /// Gantree: landscape(&mut,kind,channel,synth,job,grid) -> MixcalResult<Landscape> // 지형 탐색
    pub fn landscape<J: JobHandle>(
        &mut self,
        kind: LeakageKind,
        channel: &mut ControlChannel,
        synth: &mut Synthesizer,
        job: &mut J,
        grid: &LandscapeGrid,
    ) -> MixcalResult<Landscape> {
        let frequency = probe_frequency(kind, channel)?;
        let sweep = self.config.sweep;
        let keys = kind.offset_keys();
        let original = *channel.mixer_offsets();
        let baseline = Contrast::measure(&self.probe.sweep(frequency, &sweep)?, frequency)?;

        let probe = &mut self.probe;
        let scanned = Landscape::scan(grid, |point| {
            evaluate(kind, point, &baseline, frequency, &sweep, probe, channel, synth, job)
        });

        channel.set_offset_pair(keys, [original.get(keys.0), original.get(keys.1)]);
        apply(kind, channel, synth, job)?;
        scanned
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Get configuration
    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Current phase
    pub fn phase(&self) -> TuningPhase {
        self.phase
    }

    /// Get probe
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Get runtime
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    fn enter(&mut self, phase: TuningPhase, channel: &str, kind: LeakageKind) {
        log::info!("'{}' {}: {:?} -> {:?}", channel, kind, self.phase, phase);
        self.phase = phase;
    }
}

// ============================================================================
// Objective
// ============================================================================

fn probe_frequency(kind: LeakageKind, channel: &ControlChannel) -> MixcalResult<Hertz> {
    let lo = channel.oscillator().frequency()?;
    Ok(kind.probe_frequency(lo, channel.intermediate_frequency() as f64))
}

/// Contrast with `point` written into the channel
///
/// A candidate the synthesizer rejects as out of range scores infinity.
#[allow(clippy::too_many_arguments)]
fn evaluate<P: SpectrumProbe, J: JobHandle>(
    kind: LeakageKind,
    point: Point,
    baseline: &Contrast,
    frequency: Hertz,
    sweep: &SweepSettings,
    probe: &mut P,
    channel: &mut ControlChannel,
    synth: &mut Synthesizer,
    job: &mut J,
) -> MixcalResult<f64> {
    channel.set_offset_pair(kind.offset_keys(), point);
    match apply(kind, channel, synth, job) {
        Ok(()) => {}
        Err(err) if err.is_range_error() => {
            log::warn!("Rejected {} candidate {:?}: {}", kind, point, err);
            return Ok(f64::INFINITY);
        }
        Err(err) => return Err(err),
    }
    baseline.resample(&probe.sweep(frequency, sweep)?).map(|c| c.value())
}

/// Rebuild the channel and push the synthesized values to the job
fn apply<J: JobHandle>(
    kind: LeakageKind,
    channel: &ControlChannel,
    synth: &mut Synthesizer,
    job: &mut J,
) -> MixcalResult<()> {
    let document = synth.build_channel(channel)?;
    push(kind, channel, document, job)
}

fn push<J: JobHandle>(
    kind: LeakageKind,
    channel: &ControlChannel,
    document: &ConfigDocument,
    job: &mut J,
) -> MixcalResult<()> {
    let name = channel.name();
    match kind {
        LeakageKind::Carrier => {
            for key in [PortKey::I, PortKey::Q] {
                let offset = channel
                    .ports()
                    .get(&key)
                    .and_then(|&port| document.output_offset(port))
                    .ok_or_else(|| {
                        MixcalError::InternalError(format!(
                            "no {} output offset for '{}'",
                            key.as_str(),
                            name
                        ))
                    })?;
                job.set_output_dc_offset(name, key, offset)?;
            }
        }
        LeakageKind::Sideband => {
            let correction = document.mixer_correction(name).ok_or_else(|| {
                MixcalError::InternalError(format!("no mixer correction for '{}'", name))
            })?;
            job.set_element_correction(name, correction)?;
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_probe_frequencies() {
        assert_eq!(LeakageKind::Carrier.probe_frequency(5e9, -50e6), 5e9);
        assert_eq!(LeakageKind::Sideband.probe_frequency(5e9, -50e6), 5.05e9);
        assert_eq!(
            LeakageKind::Sideband.offset_keys(),
            (OffsetKey::G, OffsetKey::P)
        );
        assert_eq!(LeakageKind::Carrier.to_string(), "carrier");
    }

    #[test]
    fn test_outcome_accessors() {
        let report = TuningReport {
            channel: "QUBIT".into(),
            leakage: LeakageKind::Carrier,
            frequency: 5e9,
            initial_contrast: 30.0,
            final_contrast: 1.0,
            offsets: [0.03, -0.02],
            iterations: 40,
            evaluations: 80,
            warnings: Vec::new(),
        };
        assert_relative_eq!(report.improvement(), 29.0);

        let outcome = TuningOutcome {
            channel: "QUBIT".into(),
            reports: vec![report],
        };
        assert!(outcome.is_converged());
        assert!(outcome.report(LeakageKind::Carrier).is_some());
        assert!(outcome.report(LeakageKind::Sideband).is_none());
        assert_eq!(outcome.warnings().count(), 0);
    }
}
