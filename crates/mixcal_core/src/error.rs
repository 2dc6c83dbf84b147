//! Error types for MIXCAL
//!
//! Gantree: L0_Foundation → Errors
//!
//! Fatal errors abort the enclosing `build()` / `tune()` call. Non-fatal
//! conditions are reported as [`Warning`] values instead.

// Error variant fields are self-documenting via error messages
#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for MIXCAL
/// Gantree: MixcalError // enum
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixcalError {
    // ========================================================================
    // Structural Errors
    // ========================================================================
    /// Port keyset does not match any valid keyset for the channel role
    /// Gantree: InvalidPortKeyset{{channel,keys}} // 포트 키셋
    #[error("Channel '{channel}' has invalid port keyset {keys:?}: expected one of {expected}")]
    InvalidPortKeyset {
        channel: String,
        keys: Vec<String>,
        expected: String,
    },

    /// Port keyset changed between two builds
    #[error("Forbidden to change channel '{channel}' port keyset: {old:?} -> {new:?}")]
    PortKeysetChanged {
        channel: String,
        old: Vec<String>,
        new: Vec<String>,
    },

    /// Two channels share a name
    #[error("Duplicate channel name '{0}'")]
    DuplicateChannel(String),

    /// Channel not known to the synthesizer or stage
    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),

    /// Pulse kind changed in place
    #[error("Forbidden to change pulse '{pulse}' kind: {old} -> {new}")]
    PulseKindChanged {
        pulse: String,
        old: String,
        new: String,
    },

    /// Waveform slot partition changed in place
    /// Gantree: WaveformSlotsChanged{{pulse}} // 파형 슬롯
    #[error("Forbidden to change pulse '{pulse}' waveform slots: {old} -> {new}")]
    WaveformSlotsChanged {
        pulse: String,
        old: String,
        new: String,
    },

    /// Waveform slots incompatible with the channel input mode
    #[error("Pulse '{pulse}' uses {slots} waveforms but channel input is {input}")]
    WaveformSlotMismatch {
        pulse: String,
        slots: String,
        input: String,
    },

    /// Operation referenced but not defined on the channel
    #[error("Channel '{channel}' has no operation '{operation}'")]
    MissingOperation { channel: String, operation: String },

    /// Empty or otherwise unusable name
    #[error("Invalid name '{0}'")]
    InvalidName(String),

    // ========================================================================
    // Range Errors
    // ========================================================================
    /// Analog output or input port index out of range
    /// Gantree: PortOutOfRange{{port,min,max}} // 포트 범위
    #[error("Port {port} for '{key}' out of bounds [{min}, {max}]")]
    PortOutOfRange {
        key: String,
        port: u8,
        min: u8,
        max: u8,
    },

    /// DC offset outside the open voltage interval
    #[error("DC offset {value} for '{key}' out of bounds ({min}, {max})")]
    OffsetOutOfRange {
        key: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Waveform sample amplitude outside the open voltage interval
    #[error("Waveform '{waveform}' sample {value} out of bounds ({min}, {max})")]
    AmplitudeOutOfRange {
        waveform: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Mixer correction matrix component outside the open interval
    /// Gantree: CorrectionOutOfRange{{value}} // 보정 행렬
    #[error("Mixer correction component {value} out of bounds ({min}, {max})")]
    CorrectionOutOfRange { value: f64, min: f64, max: f64 },

    /// Pulse length not a clock multiple or below minimum
    #[error("Pulse '{pulse}' length {length}ns must be a multiple of {quantum}ns and >= {min}ns")]
    InvalidPulseLength {
        pulse: String,
        length: u32,
        quantum: u32,
        min: u32,
    },

    /// Sample array length does not match the pulse length
    #[error("Waveform '{waveform}' has {actual} samples, expected {expected}")]
    SampleCountMismatch {
        waveform: String,
        actual: usize,
        expected: usize,
    },

    /// Integer timing parameter out of bounds
    #[error("Invalid {parameter} value {value}")]
    InvalidTiming { parameter: String, value: i64 },

    /// Spectrum sweep parameter out of bounds
    #[error("Sweep {parameter} {value} out of bounds: {reason}")]
    SweepOutOfRange {
        parameter: String,
        value: f64,
        reason: String,
    },

    /// Non-finite or otherwise unusable numeric value
    #[error("Invalid value for '{name}': {value}")]
    InvalidValue { name: String, value: f64 },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// Local oscillator communication failure
    #[error("Local oscillator '{name}' error: {message}")]
    OscillatorError { name: String, message: String },

    /// Spectrum probe communication failure
    /// Gantree: ProbeError(String) // 스펙트럼 분석기
    #[error("Spectrum probe error: {0}")]
    ProbeError(String),

    /// Execution runtime communication failure
    #[error("Execution runtime error: {0}")]
    RuntimeError(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for MIXCAL operations
/// Gantree: MixcalResult<T> // type alias
pub type MixcalResult<T> = Result<T, MixcalError>;

/// Error taxonomy used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Keyset, partition, naming violations; never retried
    Structural,
    /// Numeric bound violations
    Range,
    /// Instrument or runtime failure, propagated unchanged
    Collaborator,
    /// Serialization and internal failures
    Internal,
}

// ============================================================================
// Error Conversion Helpers
// ============================================================================

impl From<serde_json::Error> for MixcalError {
    fn from(err: serde_json::Error) -> Self {
        MixcalError::JsonError(err.to_string())
    }
}

// ============================================================================
// Error Helpers
// ============================================================================

impl MixcalError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MixcalError::InvalidPortKeyset { .. }
            | MixcalError::PortKeysetChanged { .. }
            | MixcalError::DuplicateChannel(_)
            | MixcalError::UnknownChannel(_)
            | MixcalError::PulseKindChanged { .. }
            | MixcalError::WaveformSlotsChanged { .. }
            | MixcalError::WaveformSlotMismatch { .. }
            | MixcalError::MissingOperation { .. }
            | MixcalError::InvalidName(_) => ErrorKind::Structural,

            MixcalError::PortOutOfRange { .. }
            | MixcalError::OffsetOutOfRange { .. }
            | MixcalError::AmplitudeOutOfRange { .. }
            | MixcalError::CorrectionOutOfRange { .. }
            | MixcalError::InvalidPulseLength { .. }
            | MixcalError::SampleCountMismatch { .. }
            | MixcalError::InvalidTiming { .. }
            | MixcalError::SweepOutOfRange { .. }
            | MixcalError::InvalidValue { .. } => ErrorKind::Range,

            MixcalError::OscillatorError { .. }
            | MixcalError::ProbeError(_)
            | MixcalError::RuntimeError(_) => ErrorKind::Collaborator,

            MixcalError::JsonError(_) | MixcalError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Check if error is a structural error
    pub fn is_structural(&self) -> bool {
        self.kind() == ErrorKind::Structural
    }

    /// Check if error is a range error
    pub fn is_range_error(&self) -> bool {
        self.kind() == ErrorKind::Range
    }

    /// Check if error came from an instrument or the runtime
    pub fn is_collaborator_error(&self) -> bool {
        self.kind() == ErrorKind::Collaborator
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Non-fatal condition collected by synthesis and tuning reports
/// Gantree: Warning // 경고
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Warning {
    /// Attribute changed but has no transform
    UnrecognizedAttribute { channel: String, attribute: String },

    /// Time of flight was rounded to the clock quantum
    TimeOfFlightRounded {
        channel: String,
        requested: i64,
        applied: i64,
    },

    /// Optimizer stopped with contrast above tolerance
    Convergence {
        channel: String,
        leakage: String,
        contrast: f64,
        threshold: f64,
        iterations: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnrecognizedAttribute { channel, attribute } => {
                write!(f, "Unrecognized attribute '{}' on '{}' ignored", attribute, channel)
            }
            Warning::TimeOfFlightRounded {
                channel,
                requested,
                applied,
            } => write!(
                f,
                "Rounded '{}' time of flight from {}ns to {}ns",
                channel, requested, applied
            ),
            Warning::Convergence {
                channel,
                leakage,
                contrast,
                threshold,
                iterations,
            } => write!(
                f,
                "'{}' {} contrast {:.3}dBm exceeds threshold {:.3}dBm by {:.3}dBm after {} iterations",
                channel,
                leakage,
                contrast,
                threshold,
                contrast - threshold,
                iterations
            ),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
