//! Execution runtime interface
//!
//! Gantree: L3_Instruments → ExecutionRuntime
//!
//! The runtime accepts a configuration document, runs programs against it
//! and exposes handles to running jobs. Running jobs accept live updates of
//! the mixer correction and output DC offsets of an element.

use mixcal_config::document::ConfigDocument;
use mixcal_core::error::MixcalResult;
use mixcal_core::types::PortKey;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Programs
// ============================================================================

/// Program executed by a session
/// Gantree: Program // 실행 프로그램
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Program {
    /// Play one operation of an element in an infinite loop
    ContinuousTone {
        /// Element (channel) name
        element: String,
        /// Operation name
        operation: String,
    },
}

impl Program {
    /// Continuous tone of `operation` on `element`
    pub fn continuous_tone(element: impl Into<String>, operation: impl Into<String>) -> Self {
        Program::ContinuousTone {
            element: element.into(),
            operation: operation.into(),
        }
    }

    /// Element the program plays on
    pub fn element(&self) -> &str {
        match self {
            Program::ContinuousTone { element, .. } => element,
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Program::ContinuousTone { element, operation } => {
                write!(f, "loop {{ play('{}', '{}') }}", operation, element)
            }
        }
    }
}

// ============================================================================
// Runtime Traits
// ============================================================================

/// Pulse-execution runtime
/// Gantree: ExecutionRuntime // trait: open
pub trait ExecutionRuntime: Send + Sync {
    /// Session type
    type Session: Session;

    /// Runtime name
    fn name(&self) -> &str;

    /// Open a session with a configuration document
    fn open(&self, config: &ConfigDocument) -> MixcalResult<Self::Session>;
}

/// Session bound to one configuration document
pub trait Session: Send {
    /// Running job type
    type Job: JobHandle;

    /// Start a program
    fn execute(&mut self, program: &Program) -> MixcalResult<Self::Job>;
}

/// Handle to a running job
/// Gantree: JobHandle // trait: set_element_correction, set_output_dc_offset, halt
pub trait JobHandle: Send {
    /// Replace the correction matrix of an element's mixer
    fn set_element_correction(&mut self, element: &str, correction: [f64; 4]) -> MixcalResult<()>;

    /// Replace the DC offset of one element output
    fn set_output_dc_offset(&mut self, element: &str, key: PortKey, offset: f64) -> MixcalResult<()>;

    /// Stop the job
    fn halt(&mut self) -> MixcalResult<()>;

    /// Check if the job is still running
    fn is_running(&self) -> bool;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_display() {
        let program = Program::continuous_tone("QUBIT", "constant_pulse");
        assert_eq!(program.element(), "QUBIT");
        assert_eq!(
            program.to_string(),
            "loop { play('constant_pulse', 'QUBIT') }"
        );
    }
}
