//! Local oscillator capability
//!
//! Gantree: L1_Model → LocalOscillator
//!
//! Channels hold a shared handle to the oscillator that up-converts their
//! IF signal. Drivers implement [`LocalOscillator`]; the synthesis engine
//! only ever reads the frequency.

use crate::error::MixcalResult;
use crate::types::Hertz;
use std::sync::Arc;

/// Local oscillator driver
/// Gantree: LocalOscillator // trait: frequency, power
pub trait LocalOscillator: Send + Sync {
    /// Instrument name used in diagnostics
    fn name(&self) -> &str;

    /// Current output frequency (Hz)
    fn frequency(&self) -> MixcalResult<Hertz>;

    /// Set output frequency (Hz)
    fn set_frequency(&self, frequency: Hertz) -> MixcalResult<()>;

    /// Current output power (dBm)
    fn power(&self) -> MixcalResult<f64>;

    /// Set output power (dBm)
    fn set_power(&self, power: f64) -> MixcalResult<()>;
}

/// Handle shared between a channel and the caller
pub type OscillatorHandle = Arc<dyn LocalOscillator>;
