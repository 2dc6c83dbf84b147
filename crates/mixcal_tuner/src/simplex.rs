//! Nelder-Mead simplex optimizer
//!
//! Gantree: L4_Tuning → SimplexOptimizer
//!
//! Derivative-free minimizer over two real parameters. The objective is
//! fallible: an error from the objective aborts the run and propagates.
//!
//! Each iteration reflects the worst vertex through the centroid of the
//! others, then expands, contracts or shrinks depending on where the
//! reflected value ranks. The run stops when both the vertex spread and the
//! objective spread are within tolerance, or at the iteration cap.

use mixcal_core::error::MixcalResult;
use mixcal_core::tuning;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Point in parameter space
pub type Point = [f64; 2];

// ============================================================================
// Simplex State
// ============================================================================

/// Vertices ordered by objective value, best first
/// Gantree: SimplexState // 심플렉스 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplexState {
    /// Vertices
    pub vertices: [Point; 3],
    /// Objective value at each vertex
    pub values: [f64; 3],
    /// Completed iterations
    pub iterations: usize,
    /// Objective evaluations
    pub evaluations: usize,
}

impl SimplexState {
    /// Best vertex and its value
    pub fn best(&self) -> (Point, f64) {
        (self.vertices[0], self.values[0])
    }

    /// Centroid of every vertex but the worst
    pub fn centroid(&self) -> Point {
        [
            (self.vertices[0][0] + self.vertices[1][0]) / 2.0,
            (self.vertices[0][1] + self.vertices[1][1]) / 2.0,
        ]
    }

    /// Largest coordinate distance from the best vertex
    pub fn vertex_spread(&self) -> f64 {
        let best = self.vertices[0];
        self.vertices[1..]
            .iter()
            .flat_map(|v| [(v[0] - best[0]).abs(), (v[1] - best[1]).abs()])
            .fold(0.0, f64::max)
    }

    /// Largest objective distance from the best value
    pub fn value_spread(&self) -> f64 {
        self.values[1..]
            .iter()
            .map(|f| (f - self.values[0]).abs())
            .fold(0.0, f64::max)
    }

    /// Order vertices by value, keeping ties in place
    fn sort(&mut self) {
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| self.values[a].total_cmp(&self.values[b]));
        self.vertices = order.map(|i| self.vertices[i]);
        self.values = order.map(|i| self.values[i]);
    }

    fn replace_worst(&mut self, vertex: Point, value: f64) {
        self.vertices[2] = vertex;
        self.values[2] = value;
    }
}

// ============================================================================
// Result
// ============================================================================

/// Outcome of a minimization
/// Gantree: SimplexResult // 최적화 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplexResult {
    /// Best vertex
    pub x: Point,
    /// Objective at the best vertex
    pub fun: f64,
    /// Completed iterations
    pub iterations: usize,
    /// Objective evaluations
    pub evaluations: usize,
    /// Stopped on tolerance rather than the iteration cap
    pub converged: bool,
}

impl fmt::Display for SimplexResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x=[{:.6}, {:.6}] f={:.4} after {} iterations ({})",
            self.x[0],
            self.x[1],
            self.fun,
            self.iterations,
            if self.converged { "converged" } else { "cap reached" }
        )
    }
}

// ============================================================================
// Optimizer
// ============================================================================

/// Nelder-Mead minimizer
/// Gantree: NelderMead // 넬더-미드
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NelderMead {
    /// Reflection coefficient
    pub reflect: f64,
    /// Expansion coefficient
    pub expand: f64,
    /// Contraction coefficient
    pub contract: f64,
    /// Shrink coefficient
    pub shrink: f64,
    /// Vertex spread tolerance
    pub xatol: f64,
    /// Objective spread tolerance
    pub fatol: f64,
    /// Iteration cap
    pub max_iterations: usize,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            reflect: tuning::REFLECT,
            expand: tuning::EXPAND,
            contract: tuning::CONTRACT,
            shrink: tuning::SHRINK,
            xatol: tuning::XATOL,
            fatol: tuning::THRESHOLD_DBM,
            max_iterations: tuning::MAX_ITERATIONS,
        }
    }
}

impl NelderMead {
    /// Create with explicit tolerances and standard coefficients
    pub fn new(xatol: f64, fatol: f64, max_iterations: usize) -> Self {
        Self {
            xatol,
            fatol,
            max_iterations,
            ..Self::default()
        }
    }

    /// Minimize `objective` from `initial`
    /// Gantree: minimize(&self,initial,objective) -> MixcalResult<SimplexResult> // 최소화
    pub fn minimize<F>(&self, initial: [Point; 3], mut objective: F) -> MixcalResult<SimplexResult>
    where
        F: FnMut(Point) -> MixcalResult<f64>,
    {
        let mut state = SimplexState {
            vertices: initial,
            values: [0.0; 3],
            iterations: 0,
            evaluations: 0,
        };
        let mut eval = |p: Point, state: &mut SimplexState| -> MixcalResult<f64> {
            state.evaluations += 1;
            objective(p)
        };

        for k in 0..3 {
            state.values[k] = eval(state.vertices[k], &mut state)?;
        }
        state.sort();

        let mut converged = false;
        while state.iterations < self.max_iterations {
            if state.vertex_spread() <= self.xatol && state.value_spread() <= self.fatol {
                converged = true;
                break;
            }

            let xbar = state.centroid();
            let worst = state.vertices[2];
            let along = |a: f64| combine(xbar, worst, a);

            let r = self.reflect;
            let xr = along(r);
            let fxr = eval(xr, &mut state)?;

            let mut shrink = false;
            if fxr < state.values[0] {
                let xe = along(r * self.expand);
                let fxe = eval(xe, &mut state)?;
                if fxe < fxr {
                    state.replace_worst(xe, fxe);
                } else {
                    state.replace_worst(xr, fxr);
                }
            } else if fxr < state.values[1] {
                state.replace_worst(xr, fxr);
            } else if fxr < state.values[2] {
                // outside contraction
                let xc = along(self.contract * r);
                let fxc = eval(xc, &mut state)?;
                if fxc <= fxr {
                    state.replace_worst(xc, fxc);
                } else {
                    shrink = true;
                }
            } else {
                // inside contraction
                let xcc = along(-self.contract);
                let fxcc = eval(xcc, &mut state)?;
                if fxcc < state.values[2] {
                    state.replace_worst(xcc, fxcc);
                } else {
                    shrink = true;
                }
            }

            if shrink {
                let best = state.vertices[0];
                for j in 1..3 {
                    let v = state.vertices[j];
                    let shrunk = [
                        best[0] + self.shrink * (v[0] - best[0]),
                        best[1] + self.shrink * (v[1] - best[1]),
                    ];
                    state.vertices[j] = shrunk;
                    state.values[j] = eval(shrunk, &mut state)?;
                }
            }

            state.iterations += 1;
            state.sort();
            log::debug!(
                "Simplex iteration {}: best f={:.4} at [{:.6}, {:.6}]",
                state.iterations,
                state.values[0],
                state.vertices[0][0],
                state.vertices[0][1]
            );
        }

        let (x, fun) = state.best();
        Ok(SimplexResult {
            x,
            fun,
            iterations: state.iterations,
            evaluations: state.evaluations,
            converged,
        })
    }
}

/// `(1 + a) * xbar - a * worst`
fn combine(xbar: Point, worst: Point, a: f64) -> Point {
    [
        (1.0 + a) * xbar[0] - a * worst[0],
        (1.0 + a) * xbar[1] - a * worst[1],
    ]
}

// ============================================================================
// Tests
// ============================================================================
