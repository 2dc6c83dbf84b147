//! Simulated instruments
//!
//! Gantree: L3_Instruments → SimulatedBench
//!
//! An in-memory local oscillator and a mixer bench that plays the roles of
//! spectrum probe and execution runtime at once. The bench models the LO
//! leakage of an IQ mixer as quadratic in the DC offset error and the
//! image sideband as quadratic in the correction matrix error, on top of a
//! noisy floor.

use crate::probe::{Spectrum, SpectrumProbe, SweepInfo, SweepSettings};
use crate::runtime::{ExecutionRuntime, JobHandle, Program, Session};
use mixcal_config::correction::MixerCorrectionMatrix;
use mixcal_config::document::ConfigDocument;
use mixcal_core::error::{MixcalError, MixcalResult};
use mixcal_core::oscillator::LocalOscillator;
use mixcal_core::types::{Hertz, PortKey};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// Simulated Oscillator
// ============================================================================

/// In-memory local oscillator
/// Gantree: SimulatedOscillator // 가상 LO
#[derive(Debug)]
pub struct SimulatedOscillator {
    name: String,
    state: Mutex<(Hertz, f64)>,
}

impl SimulatedOscillator {
    /// Create at `frequency` with 15 dBm output power
    pub fn new(name: impl Into<String>, frequency: Hertz) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new((frequency, 15.0)),
        }
    }

    /// Create a shared handle
    pub fn shared(name: impl Into<String>, frequency: Hertz) -> Arc<Self> {
        Arc::new(Self::new(name, frequency))
    }

    fn lock(&self) -> MixcalResult<MutexGuard<'_, (Hertz, f64)>> {
        self.state.lock().map_err(|_| MixcalError::OscillatorError {
            name: self.name.clone(),
            message: "state lock poisoned".to_string(),
        })
    }
}

impl LocalOscillator for SimulatedOscillator {
    fn name(&self) -> &str {
        &self.name
    }

    fn frequency(&self) -> MixcalResult<Hertz> {
        Ok(self.lock()?.0)
    }

    fn set_frequency(&self, frequency: Hertz) -> MixcalResult<()> {
        if !(frequency.is_finite() && frequency >= 0.0) {
            return Err(MixcalError::OscillatorError {
                name: self.name.clone(),
                message: format!("invalid frequency {}", frequency),
            });
        }
        self.lock()?.0 = frequency;
        log::debug!("{} frequency set to {:.6e}", self.name, frequency);
        Ok(())
    }

    fn power(&self) -> MixcalResult<f64> {
        Ok(self.lock()?.1)
    }

    fn set_power(&self, power: f64) -> MixcalResult<()> {
        self.lock()?.1 = power;
        Ok(())
    }
}

// ============================================================================
// Mixer Model
// ============================================================================

/// Noise floor of the simulated analyzer (dBm)
pub const NOISE_FLOOR_DBM: f64 = -90.0;

/// Power of the wanted sideband (dBm)
pub const TONE_POWER_DBM: f64 = -10.0;

/// Leakage power per squared offset error (mW)
pub const LEAKAGE_GAIN_MW: f64 = 4e-3;

/// Hidden imperfection of one IQ mixer
/// Gantree: MixerImperfection // 믹서 결함
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerImperfection {
    /// DC offsets cancelling the LO leakage (V)
    pub dc: [f64; 2],
    /// Gain and phase offsets cancelling the image
    pub gain_phase: [f64; 2],
}

impl MixerImperfection {
    /// Create from the ideal offsets
    pub fn new(i: f64, q: f64, g: f64, p: f64) -> Self {
        Self {
            dc: [i, q],
            gain_phase: [g, p],
        }
    }

    /// Correction matrix that cancels the image
    pub fn ideal_correction(&self) -> [f64; 4] {
        MixerCorrectionMatrix::compute(self.gain_phase[0], self.gain_phase[1]).as_array()
    }
}

impl Default for MixerImperfection {
    fn default() -> Self {
        Self::new(0.03, -0.02, 0.05, 0.03)
    }
}

/// Observable state of one element on the bench
#[derive(Debug, Clone, PartialEq)]
pub struct ElementState {
    /// LO frequency (Hz)
    pub lo_frequency: Hertz,
    /// Intermediate frequency (Hz)
    pub intermediate_frequency: Hertz,
    /// Applied I/Q DC offsets (V)
    pub dc: [f64; 2],
    /// Applied correction matrix
    pub correction: [f64; 4],
    /// Whether the element is driven through a mixer
    pub mixed: bool,
    /// Whether a program is playing on the element
    pub playing: bool,
}

impl ElementState {
    fn from_document(config: &ConfigDocument, element: &str) -> Option<Self> {
        let entry = config.element(element)?;
        let mix = entry.mix_inputs.as_ref();
        let offset = |port: Option<&(String, u8)>| {
            port.and_then(|(_, p)| config.output_offset(*p)).unwrap_or(0.0)
        };

        Some(Self {
            lo_frequency: mix.map_or(0.0, |m| m.lo_frequency as f64),
            intermediate_frequency: entry.intermediate_frequency as f64,
            dc: [
                offset(mix.and_then(|m| m.i.as_ref())),
                offset(mix.and_then(|m| m.q.as_ref())),
            ],
            correction: config
                .mixer_correction(element)
                .unwrap_or(MixerCorrectionMatrix::IDENTITY.as_array()),
            mixed: mix.is_some(),
            playing: false,
        })
    }

    /// Tones emitted (frequency, dBm)
    fn tones(&self, imperfection: &MixerImperfection) -> Vec<(Hertz, f64)> {
        if !self.playing {
            return Vec::new();
        }

        let mut tones = vec![(
            self.lo_frequency + self.intermediate_frequency,
            TONE_POWER_DBM,
        )];

        if self.mixed {
            let dc_error: f64 = self
                .dc
                .iter()
                .zip(imperfection.dc.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            let matrix_error: f64 = self
                .correction
                .iter()
                .zip(imperfection.ideal_correction().iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();

            if dc_error > 0.0 {
                tones.push((self.lo_frequency, mw_to_dbm(LEAKAGE_GAIN_MW * dc_error)));
            }
            if matrix_error > 0.0 {
                tones.push((
                    self.lo_frequency - self.intermediate_frequency,
                    mw_to_dbm(LEAKAGE_GAIN_MW * matrix_error),
                ));
            }
        }
        tones
    }
}

fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}

// ============================================================================
// Bench State
// ============================================================================

#[derive(Debug)]
struct BenchState {
    elements: BTreeMap<String, ElementState>,
    imperfections: BTreeMap<String, MixerImperfection>,
    rng: StdRng,
    noise_db: f64,
    last_sweep: Option<SweepInfo>,
    sweeps: usize,
    updates: usize,
}

impl BenchState {
    fn element_mut(&mut self, element: &str) -> MixcalResult<&mut ElementState> {
        self.elements
            .get_mut(element)
            .ok_or_else(|| MixcalError::RuntimeError(format!("unknown element '{}'", element)))
    }

    fn imperfection(&self, element: &str) -> MixerImperfection {
        self.imperfections
            .get(element)
            .copied()
            .unwrap_or_default()
    }
}

type SharedState = Arc<Mutex<BenchState>>;

fn lock(state: &SharedState) -> MixcalResult<MutexGuard<'_, BenchState>> {
    state
        .lock()
        .map_err(|_| MixcalError::RuntimeError("bench state lock poisoned".to_string()))
}

// ============================================================================
// Simulated Mixer Bench
// ============================================================================

/// Simulated analyzer and runtime sharing one mixer model
/// Gantree: SimulatedMixerBench // 가상 믹서 벤치
#[derive(Debug, Clone)]
pub struct SimulatedMixerBench {
    state: SharedState,
}

impl Default for SimulatedMixerBench {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedMixerBench {
    /// Create a bench with an entropy-seeded noise source
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a reproducible bench
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: Arc::new(Mutex::new(BenchState {
                elements: BTreeMap::new(),
                imperfections: BTreeMap::new(),
                rng,
                noise_db: 0.2,
                last_sweep: None,
                sweeps: 0,
                updates: 0,
            })),
        }
    }

    /// Set the mixer imperfection of an element
    pub fn with_imperfection(self, element: impl Into<String>, imperfection: MixerImperfection) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.imperfections.insert(element.into(), imperfection);
        }
        self
    }

    /// Set the peak-to-peak half width of the floor noise (dB)
    pub fn with_noise(self, noise_db: f64) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.noise_db = noise_db.abs();
        }
        self
    }

    /// Spectrum probe view of the bench
    pub fn probe(&self) -> SimulatedProbe {
        SimulatedProbe {
            state: Arc::clone(&self.state),
        }
    }

    /// Execution runtime view of the bench
    pub fn runtime(&self) -> SimulatedRuntime {
        SimulatedRuntime {
            state: Arc::clone(&self.state),
        }
    }

    /// Current state of an element
    pub fn element_state(&self, element: &str) -> Option<ElementState> {
        self.state.lock().ok()?.elements.get(element).cloned()
    }

    /// Number of sweeps taken
    pub fn sweep_count(&self) -> usize {
        self.state.lock().map(|s| s.sweeps).unwrap_or(0)
    }

    /// Number of live job updates received
    pub fn update_count(&self) -> usize {
        self.state.lock().map(|s| s.updates).unwrap_or(0)
    }
}

// ============================================================================
// Simulated Probe
// ============================================================================

/// Spectrum probe backed by the bench model
#[derive(Debug, Clone)]
pub struct SimulatedProbe {
    state: SharedState,
}

impl SpectrumProbe for SimulatedProbe {
    fn name(&self) -> &str {
        "simulated-analyzer"
    }

    fn sweep(&mut self, center: Hertz, settings: &SweepSettings) -> MixcalResult<Spectrum> {
        settings.validate(center)?;

        let mut guard = lock(&self.state)?;
        let state = &mut *guard;

        let tones: Vec<(Hertz, f64)> = state
            .elements
            .iter()
            .flat_map(|(name, element)| element.tones(&state.imperfection(name)))
            .collect();
        let noise_db = state.noise_db;

        let bin_size = settings.rbw / 2.0;
        let sweep_length = (settings.span / bin_size).round() as usize + 1;
        let start_freq = center - settings.span / 2.0;

        let mut frequencies = Vec::with_capacity(sweep_length);
        let mut amplitudes = Vec::with_capacity(sweep_length);
        for k in 0..sweep_length {
            let frequency = start_freq + k as f64 * bin_size;
            let noise = if noise_db > 0.0 {
                state.rng.gen_range(-noise_db..noise_db)
            } else {
                0.0
            };

            let mut power = dbm_to_mw(NOISE_FLOOR_DBM + noise);
            for &(tone, dbm) in &tones {
                if (frequency - tone).abs() <= bin_size / 2.0 {
                    power += dbm_to_mw(dbm);
                }
            }

            frequencies.push(frequency);
            amplitudes.push(mw_to_dbm(power));
        }

        state.last_sweep = Some(SweepInfo {
            sweep_length,
            start_freq,
            bin_size,
        });
        state.sweeps += 1;

        Spectrum::new(frequencies, amplitudes)
    }

    fn sweep_info(&self) -> Option<SweepInfo> {
        self.state.lock().ok()?.last_sweep
    }
}

// ============================================================================
// Simulated Runtime
// ============================================================================

/// Execution runtime backed by the bench model
#[derive(Debug, Clone)]
pub struct SimulatedRuntime {
    state: SharedState,
}

impl ExecutionRuntime for SimulatedRuntime {
    type Session = SimulatedSession;

    fn name(&self) -> &str {
        "simulated-runtime"
    }

    fn open(&self, config: &ConfigDocument) -> MixcalResult<SimulatedSession> {
        if !config.is_initialized() {
            return Err(MixcalError::RuntimeError(
                "configuration document not initialized".to_string(),
            ));
        }

        let mut state = lock(&self.state)?;
        state.elements = config
            .elements
            .keys()
            .filter_map(|name| {
                ElementState::from_document(config, name).map(|e| (name.clone(), e))
            })
            .collect();
        log::info!("Opened simulated session with {} elements", state.elements.len());

        Ok(SimulatedSession {
            state: Arc::clone(&self.state),
            config: config.clone(),
        })
    }
}

/// Session on the simulated runtime
#[derive(Debug)]
pub struct SimulatedSession {
    state: SharedState,
    config: ConfigDocument,
}

impl Session for SimulatedSession {
    type Job = SimulatedJob;

    fn execute(&mut self, program: &Program) -> MixcalResult<SimulatedJob> {
        let Program::ContinuousTone { element, operation } = program;

        let entry = self
            .config
            .element(element)
            .ok_or_else(|| MixcalError::RuntimeError(format!("unknown element '{}'", element)))?;
        if !entry.operations.contains_key(operation) {
            return Err(MixcalError::RuntimeError(format!(
                "element '{}' has no operation '{}'",
                element, operation
            )));
        }

        lock(&self.state)?.element_mut(element)?.playing = true;
        log::info!("Executing {}", program);

        Ok(SimulatedJob {
            state: Arc::clone(&self.state),
            element: element.clone(),
            running: true,
        })
    }
}

/// Running job on the simulated runtime
#[derive(Debug)]
pub struct SimulatedJob {
    state: SharedState,
    element: String,
    running: bool,
}

impl SimulatedJob {
    fn ensure_running(&self) -> MixcalResult<()> {
        if !self.running {
            return Err(MixcalError::RuntimeError("job halted".to_string()));
        }
        Ok(())
    }
}

impl JobHandle for SimulatedJob {
    fn set_element_correction(&mut self, element: &str, correction: [f64; 4]) -> MixcalResult<()> {
        self.ensure_running()?;
        let mut state = lock(&self.state)?;
        state.element_mut(element)?.correction = correction;
        state.updates += 1;
        Ok(())
    }

    fn set_output_dc_offset(&mut self, element: &str, key: PortKey, offset: f64) -> MixcalResult<()> {
        self.ensure_running()?;
        let index = match key {
            PortKey::I | PortKey::Single => 0,
            PortKey::Q => 1,
            PortKey::Out => {
                return Err(MixcalError::RuntimeError(
                    "'out' is not an output".to_string(),
                ))
            }
        };

        let mut state = lock(&self.state)?;
        state.element_mut(element)?.dc[index] = offset;
        state.updates += 1;
        Ok(())
    }

    fn halt(&mut self) -> MixcalResult<()> {
        if self.running {
            self.running = false;
            let mut state = lock(&self.state)?;
            state.element_mut(&self.element)?.playing = false;
            log::info!("Halted job on '{}'", self.element);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

// ============================================================================
// Tests
// ============================================================================
