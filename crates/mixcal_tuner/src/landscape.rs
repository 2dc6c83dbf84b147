//! Leakage landscape
//!
//! Gantree: L4_Tuning → Landscape
//!
//! Contrast sampled over a square grid of offset pairs, for inspecting the
//! objective surface around a calibration point.

use crate::simplex::Point;
use mixcal_core::error::{MixcalError, MixcalResult};
use serde::{Deserialize, Serialize};

/// Square sampling grid
/// Gantree: LandscapeGrid // 격자 정의
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandscapeGrid {
    /// Grid center
    pub center: Point,
    /// Distance from center to edge along each axis
    pub half_width: f64,
    /// Samples per axis
    pub points: usize,
}

impl LandscapeGrid {
    /// Create a grid of `points` x `points` samples
    pub fn new(center: Point, half_width: f64, points: usize) -> Self {
        Self {
            center,
            half_width,
            points,
        }
    }

    /// Check the grid can be sampled
    pub fn validate(&self) -> MixcalResult<()> {
        if self.points < 2 {
            return Err(MixcalError::InvalidValue {
                name: "points".to_string(),
                value: self.points as f64,
            });
        }
        if !(self.half_width.is_finite() && self.half_width > 0.0) {
            return Err(MixcalError::InvalidValue {
                name: "half_width".to_string(),
                value: self.half_width,
            });
        }
        Ok(())
    }

    /// Sample positions along one axis
    pub fn axis(&self, dim: usize) -> Vec<f64> {
        let start = self.center[dim] - self.half_width;
        let step = 2.0 * self.half_width / (self.points - 1) as f64;
        (0..self.points).map(|k| start + k as f64 * step).collect()
    }
}

/// Sampled objective surface
/// Gantree: Landscape // 누설 지형
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landscape {
    /// First parameter values
    pub first: Vec<f64>,
    /// Second parameter values
    pub second: Vec<f64>,
    /// `values[i][j]` is the objective at `(first[i], second[j])`
    pub values: Vec<Vec<f64>>,
}

impl Landscape {
    /// Sample `objective` on `grid`, row by row
    /// Gantree: scan(grid,objective) -> MixcalResult<Landscape> // 격자 평가
    pub fn scan<F>(grid: &LandscapeGrid, mut objective: F) -> MixcalResult<Self>
    where
        F: FnMut(Point) -> MixcalResult<f64>,
    {
        grid.validate()?;
        let first = grid.axis(0);
        let second = grid.axis(1);

        let mut values = Vec::with_capacity(first.len());
        for &a in &first {
            let row = second
                .iter()
                .map(|&b| objective([a, b]))
                .collect::<MixcalResult<Vec<f64>>>()?;
            values.push(row);
        }

        Ok(Self {
            first,
            second,
            values,
        })
    }

    /// Lowest sample
    pub fn minimum(&self) -> Option<(Point, f64)> {
        self.values
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().enumerate().map(move |(j, &v)| (i, j, v)))
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(i, j, v)| ([self.first[i], self.second[j]], v))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis() {
        let grid = LandscapeGrid::new([0.0, 1.0], 0.5, 3);
        assert_eq!(grid.axis(0), vec![-0.5, 0.0, 0.5]);
        assert_eq!(grid.axis(1), vec![0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_scan_finds_minimum() {
        let grid = LandscapeGrid::new([0.0, 0.0], 0.1, 5);
        let landscape =
            Landscape::scan(&grid, |p| Ok((p[0] - 0.05).powi(2) + (p[1] + 0.05).powi(2))).unwrap();

        assert_eq!(landscape.values.len(), 5);
        assert!(landscape.values.iter().all(|row| row.len() == 5));

        let (point, value) = landscape.minimum().unwrap();
        assert_relative_eq!(point[0], 0.05, epsilon = 1e-12);
        assert_relative_eq!(point[1], -0.05, epsilon = 1e-12);
        assert_relative_eq!(value, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_invalid_grid() {
        let grid = LandscapeGrid::new([0.0, 0.0], 0.1, 1);
        assert!(Landscape::scan(&grid, |_| Ok(0.0)).is_err());
    }
}
