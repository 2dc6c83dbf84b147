//! # MIXCAL Engine
//!
//! Stage orchestration: channel registry, configuration synthesis, runtime
//! sessions and mixer calibration behind one entry point.
//!
//! ## Gantree Architecture
//!
//! ```text
//! mixcal_engine // L5: Integration (완료)
//!     StageConfig // 선언적 스테이지 설정 (완료)
//!         ChannelSpec // 채널 명세 (완료)
//!         TunerConfig // 보정 설정 (완료)
//!     Stage // 스테이지 (완료)
//!         add_channel() / channel_mut() - 채널 관리
//!         config() - 차분 합성
//!         open_session() - 런타임 세션
//!         tune_mixers() - 믹서 보정
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use mixcal_engine::prelude::*;
//! use mixcal_instruments::prelude::*;
//! use std::collections::BTreeMap;
//!
//! let config = StageConfig::from_json(r#"{
//!     "channels": [{
//!         "name": "QUBIT",
//!         "oscillator": "lo",
//!         "ports": {"I": 1, "Q": 2},
//!         "intermediate_frequency": -50000000
//!     }]
//! }"#).unwrap();
//!
//! let mut oscillators: BTreeMap<String, mixcal_core::OscillatorHandle> = BTreeMap::new();
//! oscillators.insert("lo".into(), SimulatedOscillator::shared("lo", 5e9));
//!
//! let mut stage = Stage::from_config(config, &oscillators).unwrap();
//! let document = stage.config().unwrap();
//! assert!(document.element("QUBIT").is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Stage configuration (Gantree: L5_Integration → StageConfig)
pub mod config;

/// Stage (Gantree: L5_Integration → Stage)
pub mod stage;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ChannelSpec, StageConfig};
pub use stage::Stage;

// ============================================================================
// Prelude
// ============================================================================

pub mod prelude {
    //! Convenient imports for common use cases
    //!
    //! ```rust
    //! use mixcal_engine::prelude::*;
    //! ```

    pub use crate::config::{ChannelSpec, StageConfig};
    pub use crate::stage::Stage;
    pub use mixcal_tuner::prelude::{LeakageKind, TunerConfig, TuningOutcome, TuningReport};
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
