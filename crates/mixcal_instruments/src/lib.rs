//! # MIXCAL Instruments
//!
//! Collaborator interfaces of the calibration bench and in-memory
//! simulators implementing them.
//!
//! ## Gantree Architecture
//!
//! ```text
//! mixcal_instruments // L3: Instruments (완료)
//!     L3_Instruments // 외부 장비 인터페이스 (완료)
//!         SpectrumProbe // 스펙트럼 분석기 (완료)
//!             SweepSettings // 스윕 설정 및 검증 (완료)
//!             Spectrum // 주파수/진폭 배열 (완료)
//!         ExecutionRuntime // 실행 런타임 (완료)
//!             Program // 연속 톤 프로그램 (완료)
//!             JobHandle // 실시간 보정 갱신 (완료)
//!         SimulatedBench // 가상 벤치 (완료)
//!             SimulatedOscillator // 가상 LO (완료)
//!             SimulatedMixerBench // 누설 모델 (완료)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use mixcal_instruments::prelude::*;
//!
//! let bench = SimulatedMixerBench::seeded(42);
//! let mut probe = bench.probe();
//!
//! let spectrum = probe.sweep(5e9, &SweepSettings::default()).unwrap();
//! assert_eq!(spectrum.len(), 81);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Spectrum probe (Gantree: L3_Instruments → SpectrumProbe)
pub mod probe;

/// Execution runtime (Gantree: L3_Instruments → ExecutionRuntime)
pub mod runtime;

/// Simulated instruments (Gantree: L3_Instruments → SimulatedBench)
pub mod simulated;

// ============================================================================
// Re-exports
// ============================================================================

pub use probe::{Spectrum, SpectrumProbe, SweepInfo, SweepSettings};
pub use runtime::{ExecutionRuntime, JobHandle, Program, Session};
pub use simulated::{
    ElementState, MixerImperfection, SimulatedJob, SimulatedMixerBench, SimulatedOscillator,
    SimulatedProbe, SimulatedRuntime, SimulatedSession,
};

// ============================================================================
// Prelude
// ============================================================================

pub mod prelude {
    //! Convenient imports for common use cases
    //!
    //! ```rust
    //! use mixcal_instruments::prelude::*;
    //! ```

    pub use crate::probe::{Spectrum, SpectrumProbe, SweepInfo, SweepSettings};
    pub use crate::runtime::{ExecutionRuntime, JobHandle, Program, Session};
    pub use crate::simulated::{
        MixerImperfection, SimulatedMixerBench, SimulatedOscillator, SimulatedProbe,
        SimulatedRuntime,
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
