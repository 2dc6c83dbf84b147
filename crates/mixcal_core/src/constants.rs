//! Constants for MIXCAL
//!
//! Gantree: L0_Foundation → Constants
//!
//! Hardware bounds of the pulse controller, waveform defaults and
//! calibration defaults. Bounds are contractual to the execution runtime.

// ============================================================================
// Controller Constants
// Gantree: opx // 컨트롤러 상수
// ============================================================================

pub mod opx {
    //! Pulse controller bounds and names

    /// Configuration document schema version
    pub const CONFIG_VERSION: u32 = 1;

    /// Name of the single controller stanza
    pub const CONTROLLER_NAME: &str = "con1";

    /// Controller hardware type
    pub const CONTROLLER_TYPE: &str = "opx1";

    /// Analog output port bounds [min, max]
    pub const AO_MIN: u8 = 1;
    /// Analog output port bounds [min, max]
    pub const AO_MAX: u8 = 10;

    /// Analog input port bounds [min, max]
    pub const AI_MIN: u8 = 1;
    /// Analog input port bounds [min, max]
    pub const AI_MAX: u8 = 2;

    /// Voltage bounds (min, max), exclusive
    pub const V_MIN: f64 = -0.5;
    /// Voltage bounds (min, max), exclusive
    pub const V_MAX: f64 = 0.5;

    /// Mixer correction matrix component bounds (min, max), exclusive
    pub const MCM_MIN: f64 = -2.0;
    /// Mixer correction matrix component bounds (min, max), exclusive
    pub const MCM_MAX: f64 = 2.0 - 1.0 / 65536.0;

    /// Clock quantum in nanoseconds
    /// Gantree: CLOCK_CYCLE_NS: u32 = 4
    pub const CLOCK_CYCLE_NS: u32 = 4;

    /// Minimum pulse length in nanoseconds
    pub const MIN_PULSE_LEN_NS: u32 = 16;

    /// Check whether a pulse length is quantized and long enough
    #[inline]
    pub const fn is_valid_pulse_length(length_ns: u32) -> bool {
        length_ns % CLOCK_CYCLE_NS == 0 && length_ns >= MIN_PULSE_LEN_NS
    }

    /// Round a duration to the nearest clock multiple
    #[inline]
    pub fn round_to_clock(value_ns: i64) -> i64 {
        let quantum = CLOCK_CYCLE_NS as f64;
        ((value_ns as f64 / quantum).round() * quantum) as i64
    }
}

// ============================================================================
// Waveform Constants
// Gantree: waveform // 파형 상수
// ============================================================================

pub mod waveform {
    //! Waveform generation defaults

    /// Amplitude in volts corresponding to an amplitude scale of 1.0
    pub const DEFAULT_AMP: f64 = 0.25;

    /// Digital marker attached to measurement pulses
    pub const RO_DIGITAL_MARKER: &str = "ON";

    /// Digital samples of the readout marker: (value, duration) pairs
    pub const RO_DIGITAL_SAMPLES: [(u8, u32); 1] = [(1, 0)];

    /// Names of the default integration weights
    pub const DEFAULT_IW_NAMES: [&str; 2] = ["iw1", "iw2"];
}

// ============================================================================
// Tuning Constants
// Gantree: tuning // 보정 상수
// ============================================================================

pub mod tuning {
    //! Mixer tuning defaults

    /// Contrast threshold in dBm
    /// Gantree: THRESHOLD_DBM: f64 = 2.0
    pub const THRESHOLD_DBM: f64 = 2.0;

    /// Maximum Nelder-Mead iterations
    pub const MAX_ITERATIONS: usize = 100;

    /// Vertex spread tolerance of the simplex
    pub const XATOL: f64 = 1e-4;

    /// Sweep span in Hz
    pub const SPAN_HZ: f64 = 2e6;

    /// Resolution bandwidth in Hz
    pub const RBW_HZ: f64 = 50e3;

    /// Reference power in dBm
    pub const REF_POWER_DBM: f64 = 0.0;

    /// Initial simplex around the origin
    pub const INITIAL_SIMPLEX: [[f64; 2]; 3] = [[0.0, 0.0], [0.0, 0.1], [0.1, 0.0]];

    /// Operation played continuously while tuning
    pub const TONE_OPERATION: &str = "constant_pulse";

    /// Nelder-Mead coefficients
    pub const REFLECT: f64 = 1.0;
    /// Nelder-Mead coefficients
    pub const EXPAND: f64 = 2.0;
    /// Nelder-Mead coefficients
    pub const CONTRACT: f64 = 0.5;
    /// Nelder-Mead coefficients
    pub const SHRINK: f64 = 0.5;
}

// ============================================================================
// Spectrum Analyzer Constants
// Gantree: analyzer // 분석기 상수
// ============================================================================

pub mod analyzer {
    //! Sweep bounds of the spectrum analyzer

    /// Sweep center bounds in Hz
    pub const MIN_CENTER_HZ: f64 = 100e3;
    /// Sweep center bounds in Hz
    pub const MAX_CENTER_HZ: f64 = 13e9;

    /// Minimum sweep span in Hz
    pub const MIN_SPAN_HZ: f64 = 1.0;

    /// Maximum reference level in dBm
    pub const MAX_REF_POWER_DBM: f64 = 20.0;

    /// Continuous RBW range in Hz
    pub const MIN_RBW_HZ: f64 = 0.1;
    /// Continuous RBW range in Hz
    pub const MAX_RBW_HZ: f64 = 100e3;

    /// Discrete RBW values in Hz
    pub const RBW_250K_HZ: f64 = 250e3;
    /// Discrete RBW values in Hz
    pub const RBW_6M_HZ: f64 = 6e6;

    /// Smallest RBW allowed for wide sweeps
    pub const WIDE_SPAN_MIN_RBW_HZ: f64 = 6.5e3;

    /// Span at or above which a sweep is wide
    pub const WIDE_SPAN_HZ: f64 = 100e6;

    /// Sweeps starting below this frequency are wide above `LOW_START_SPAN_HZ`
    pub const LOW_START_FREQ_HZ: f64 = 16e6;
    /// Sweeps starting below this frequency are wide above `LOW_START_SPAN_HZ`
    pub const LOW_START_SPAN_HZ: f64 = 200e3;

    /// Minimum start frequency and span for the 6 MHz RBW
    pub const RBW_6M_MIN_HZ: f64 = 200e6;
}

// ============================================================================
// Tests
// ============================================================================
