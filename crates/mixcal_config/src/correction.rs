//! Mixer correction matrix
//!
//! Gantree: L2_Synthesis → MixerCorrectionMatrix
//!
//! The 2x2 matrix applied to the I/Q outputs to cancel gain and phase
//! imbalance of an IQ mixer, derived from the `G` and `P` offsets.

use crate::validation;
use mixcal_core::error::MixcalResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row-major 2x2 correction matrix
/// Gantree: MixerCorrectionMatrix // [f64; 4]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixerCorrectionMatrix([f64; 4]);

impl MixerCorrectionMatrix {
    /// Identity matrix (no correction)
    pub const IDENTITY: MixerCorrectionMatrix = MixerCorrectionMatrix([1.0, 0.0, 0.0, 1.0]);

    /// Compute the matrix for gain `g` and phase `p` (rad)
    ///
    /// ```text
    /// coeff = 1 / ((1 - g^2) (2 cos^2 p - 1))
    /// M = coeff * [(1-g) cos p, (1+g) sin p, (1-g) sin p, (1+g) cos p]
    /// ```
    ///
    /// Every component must lie strictly inside the hardware bounds.
    /// Gantree: from_offsets(g,p) -> MixcalResult<Self> // 보정 행렬 계산
    pub fn from_offsets(g: f64, p: f64) -> MixcalResult<Self> {
        let matrix = Self::compute(g, p);
        matrix.validate()?;
        Ok(matrix)
    }

    /// Compute the matrix without checking bounds
    pub fn compute(g: f64, p: f64) -> Self {
        let (sin, cos) = p.sin_cos();
        let coeff = 1.0 / ((1.0 - g * g) * (2.0 * cos * cos - 1.0));

        Self([
            coeff * (1.0 - g) * cos,
            coeff * (1.0 + g) * sin,
            coeff * (1.0 - g) * sin,
            coeff * (1.0 + g) * cos,
        ])
    }

    /// Check every component against the hardware bounds
    pub fn validate(&self) -> MixcalResult<()> {
        validation::validate_correction(&self.0)
    }

    /// Components in row-major order
    pub fn as_array(&self) -> [f64; 4] {
        self.0
    }
}

impl From<MixerCorrectionMatrix> for [f64; 4] {
    fn from(matrix: MixerCorrectionMatrix) -> Self {
        matrix.0
    }
}

impl fmt::Display for MixerCorrectionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}, {:.6}, {:.6}]",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
