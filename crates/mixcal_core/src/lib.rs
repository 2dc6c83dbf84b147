//! # MIXCAL Core
//!
//! Channel model, pulse definitions, errors and hardware constants shared by
//! the configuration synthesizer and the mixer tuner.
//!
//! ## Gantree Architecture
//!
//! ```text
//! mixcal_core // L0+L1: Foundation + Model (완료)
//!     L0_Foundation // 기반 타입/상수/에러 (완료)
//!         CoreTypes // 포트/오프셋/역할 (완료)
//!         Constants // 하드웨어/파형/보정 상수 (완료)
//!         Errors // 에러/경고 타입 (완료)
//!     L1_Model // 채널 모델 (완료)
//!         PulseDefinition // 펄스 정의 (완료)
//!         LocalOscillator // LO 인터페이스 (완료)
//!         ControlChannel // 제어 채널 (완료)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use mixcal_core::prelude::*;
//! use std::sync::{Arc, Mutex};
//!
//! struct Lo(Mutex<f64>);
//!
//! impl LocalOscillator for Lo {
//!     fn name(&self) -> &str { "lo" }
//!     fn frequency(&self) -> MixcalResult<f64> { Ok(*self.0.lock().unwrap()) }
//!     fn set_frequency(&self, f: f64) -> MixcalResult<()> { *self.0.lock().unwrap() = f; Ok(()) }
//!     fn power(&self) -> MixcalResult<f64> { Ok(15.0) }
//!     fn set_power(&self, _p: f64) -> MixcalResult<()> { Ok(()) }
//! }
//!
//! let ports: PortMap = [(PortKey::I, 1), (PortKey::Q, 2)].into_iter().collect();
//! let qubit = ControlChannel::drive("QUBIT", Arc::new(Lo(Mutex::new(5e9))), ports)
//!     .unwrap()
//!     .with_intermediate_frequency(-50_000_000)
//!     .with_default_operations();
//!
//! assert!(qubit.is_mixed());
//! println!("{}", qubit);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Core types (Gantree: L0_Foundation → CoreTypes)
pub mod types;

/// Constants (Gantree: L0_Foundation → Constants)
pub mod constants;

/// Error types (Gantree: L0_Foundation → Errors)
pub mod error;

/// Pulse definitions (Gantree: L1_Model → PulseDefinition)
pub mod pulse;

/// Local oscillator interface (Gantree: L1_Model → LocalOscillator)
pub mod oscillator;

/// Control channels (Gantree: L1_Model → ControlChannel)
pub mod channel;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{default_operations, ControlChannel};
pub use constants::{analyzer, opx, tuning, waveform};
pub use error::{ErrorKind, MixcalError, MixcalResult, Warning};
pub use oscillator::{LocalOscillator, OscillatorHandle};
pub use pulse::{
    IntegrationWeight, PulseDefinition, PulseKind, RenderedWaveform, WaveformSlots,
    WaveformVariant,
};
pub use types::{
    ChannelRole, Hertz, InputMode, MixerOffsets, OffsetKey, PortKey, PortMap, PortNumber,
};

// ============================================================================
// Prelude
// ============================================================================

pub mod prelude {
    //! Convenient imports for common use cases
    //!
    //! ```rust
    //! use mixcal_core::prelude::*;
    //! ```

    pub use crate::channel::{default_operations, ControlChannel};
    pub use crate::constants::{analyzer, opx, tuning, waveform};
    pub use crate::error::{ErrorKind, MixcalError, MixcalResult, Warning};
    pub use crate::oscillator::{LocalOscillator, OscillatorHandle};
    pub use crate::pulse::{
        IntegrationWeight, PulseDefinition, PulseKind, RenderedWaveform, WaveformSlots,
        WaveformVariant,
    };
    pub use crate::types::{
        ChannelRole, Hertz, InputMode, MixerOffsets, OffsetKey, PortKey, PortMap, PortNumber,
    };
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
    use crate::channel::tests::FixedOscillator;

    #[test]
    fn test_qubit_channel_model() {
        let ports: PortMap = [(PortKey::I, 1), (PortKey::Q, 2)].into_iter().collect();
        let lo = FixedOscillator::handle(5e9);
        let qubit = ControlChannel::drive("QUBIT", lo.clone(), ports)
            .unwrap()
            .with_intermediate_frequency(-50_000_000)
            .with_default_operations();

        // oscillator is shared with the caller
        lo.set_frequency(5.1e9).unwrap();
        assert_eq!(qubit.oscillator().frequency().unwrap(), 5.1e9);

        // every default drive pulse fits the mixed input
        for pulse in qubit.operations().values() {
            assert_eq!(pulse.slots(), WaveformSlots::Iq);
            assert!(opx::is_valid_pulse_length(pulse.length));
        }
    }

    #[test]
    fn test_default_pulse_amplitudes_in_bounds() {
        for role in [ChannelRole::Drive, ChannelRole::Readout] {
            for input in [InputMode::Mixed, InputMode::Single] {
                for pulse in default_operations(role, input).values() {
                    assert_eq!(pulse.slots().keys().len(), pulse.render().len());
                    for (_, waveform) in pulse.render() {
                        let (lo, hi) = waveform.bounds();
                        assert!(lo > opx::V_MIN && hi < opx::V_MAX);
                    }
                }
            }
        }
    }

    #[test]
    fn test_single_input_arbitrary_pulse() {
        let ports: PortMap = [(PortKey::Single, 5)].into_iter().collect();
        let channel = ControlChannel::drive("FLUX", FixedOscillator::handle(0.0), ports)
            .unwrap()
            .with_operation("step", PulseDefinition::arbitrary(vec![0.1; 32], None));

        assert_eq!(channel.input_mode(), InputMode::Single);
        assert_eq!(
            channel.operation("step").unwrap().slots(),
            WaveformSlots::Single
        );
    }

    #[test]
    fn test_tuning_constants() {
        assert_eq!(tuning::THRESHOLD_DBM, 2.0);
        assert_eq!(tuning::MAX_ITERATIONS, 100);
        assert_eq!(tuning::INITIAL_SIMPLEX[1], [0.0, 0.1]);
        assert_eq!(waveform::DEFAULT_AMP, 0.25);
    }
}
