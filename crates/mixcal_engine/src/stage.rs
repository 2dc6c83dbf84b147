//! Stage
//!
//! Gantree: L5_Integration → Stage
//!
//! Registry of control channels by unique name. The stage owns the
//! synthesizer, hands the synthesized document to the runtime and runs the
//! mixer tuner over its channels.

use crate::config::StageConfig;
use mixcal_config::document::ConfigDocument;
use mixcal_config::synthesizer::{BuildReport, Synthesizer};
use mixcal_core::channel::ControlChannel;
use mixcal_core::error::{MixcalError, MixcalResult};
use mixcal_core::oscillator::OscillatorHandle;
use mixcal_instruments::probe::SpectrumProbe;
use mixcal_instruments::runtime::ExecutionRuntime;
use mixcal_tuner::config::TunerConfig;
use mixcal_tuner::tuner::{MixerTuner, TuningOutcome};
use std::collections::BTreeMap;
use std::fmt;

/// Channel registry and configuration owner
/// Gantree: Stage // 스테이지
#[derive(Debug)]
pub struct Stage {
    /// Channels in registration order
    channels: Vec<ControlChannel>,

    /// Document synthesizer
    synth: Synthesizer,

    /// Mixer tuner settings
    tuner_config: TunerConfig,
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create an empty stage
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            synth: Synthesizer::new(),
            tuner_config: TunerConfig::default(),
        }
    }

    /// Create from a declarative configuration
    ///
    /// Every oscillator the channels reference must be present in `oscillators`.
    /// Gantree: from_config(config,oscillators) -> MixcalResult<Self> // 설정 로드
    pub fn from_config(
        config: StageConfig,
        oscillators: &BTreeMap<String, OscillatorHandle>,
    ) -> MixcalResult<Self> {
        config.validate()?;

        let mut stage = Self::new().with_tuner_config(config.tuner);
        for spec in config.channels {
            let oscillator = oscillators.get(&spec.oscillator).cloned().ok_or_else(|| {
                MixcalError::OscillatorError {
                    name: spec.oscillator.clone(),
                    message: format!("not provided for channel '{}'", spec.name),
                }
            })?;
            stage.add_channel(spec.into_channel(oscillator)?)?;
        }
        log::info!("Loaded stage with {} channels", stage.len());
        Ok(stage)
    }

    /// Set tuner settings
    pub fn with_tuner_config(mut self, config: TunerConfig) -> Self {
        self.tuner_config = config;
        self
    }

    // ========================================================================
    // Channel Registry
    // ========================================================================

    /// Register a channel
    /// Gantree: add_channel(&mut,channel) -> MixcalResult<()> // 채널 등록
    pub fn add_channel(&mut self, channel: ControlChannel) -> MixcalResult<()> {
        if self.channel(channel.name()).is_some() {
            return Err(MixcalError::DuplicateChannel(channel.name().to_string()));
        }
        log::debug!("Registered channel {}", channel);
        self.channels.push(channel);
        Ok(())
    }

    /// Channel by name
    pub fn channel(&self, name: &str) -> Option<&ControlChannel> {
        self.channels.iter().find(|c| c.name() == name)
    }

    /// Mutable channel by name
    pub fn channel_mut(&mut self, name: &str) -> MixcalResult<&mut ControlChannel> {
        self.channels
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or_else(|| MixcalError::UnknownChannel(name.to_string()))
    }

    /// All channels in registration order
    pub fn channels(&self) -> &[ControlChannel] {
        &self.channels
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    // ========================================================================
    // Synthesis
    // ========================================================================

    /// Synthesize the document for the current channel state
    /// Gantree: config(&mut) -> MixcalResult<&ConfigDocument> // 설정 합성
    pub fn config(&mut self) -> MixcalResult<&ConfigDocument> {
        self.synth.build(&self.channels)
    }

    /// Report of the last successful synthesis
    pub fn last_report(&self) -> &BuildReport {
        self.synth.last_report()
    }

    /// Get synthesizer
    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synth
    }

    /// Get tuner settings
    pub fn tuner_config(&self) -> &TunerConfig {
        &self.tuner_config
    }

    // ========================================================================
    // Runtime
    // ========================================================================

    /// Synthesize and open a runtime session with the result
    /// Gantree: open_session(&mut,runtime) -> MixcalResult<Session> // 세션 열기
    pub fn open_session<R: ExecutionRuntime>(&mut self, runtime: &R) -> MixcalResult<R::Session> {
        let document = self.config()?;
        log::info!("Opening session on {}", runtime.name());
        runtime.open(document)
    }

    /// Tune the mixers of every mixed-input channel
    /// Gantree: tune_mixers(&mut,probe,runtime) -> MixcalResult<Vec<TuningOutcome>> // 믹서 보정
    pub fn tune_mixers<P, R>(&mut self, probe: P, runtime: R) -> MixcalResult<Vec<TuningOutcome>>
    where
        P: SpectrumProbe,
        R: ExecutionRuntime,
    {
        let names: Vec<String> = self
            .channels
            .iter()
            .filter(|c| c.is_mixed())
            .map(|c| c.name().to_string())
            .collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.tune_channels(&names, probe, runtime)
    }

    /// Tune the mixers of the named channels, in order
    pub fn tune_channels<P, R>(
        &mut self,
        names: &[&str],
        probe: P,
        runtime: R,
    ) -> MixcalResult<Vec<TuningOutcome>>
    where
        P: SpectrumProbe,
        R: ExecutionRuntime,
    {
        self.config()?;
        let mut tuner = MixerTuner::new(self.tuner_config.clone(), probe, runtime)?;

        let mut outcomes = Vec::with_capacity(names.len());
        for &name in names {
            let channel = self
                .channels
                .iter_mut()
                .find(|c| c.name() == name)
                .ok_or_else(|| MixcalError::UnknownChannel(name.to_string()))?;
            outcomes.push(tuner.tune_channel(channel, &mut self.synth)?);
        }
        Ok(outcomes)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stage ({} channels)", self.channels.len())?;
        for channel in &self.channels {
            writeln!(f, "  {}", channel)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
