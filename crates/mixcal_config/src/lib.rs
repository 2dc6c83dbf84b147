//! # MIXCAL Config
//!
//! Diff-based synthesis of the pulse-controller configuration document.
//!
//! ## Gantree Architecture
//!
//! ```text
//! mixcal_config // L2: Synthesis (완료)
//!     L2_Synthesis // 설정 문서 합성 (완료)
//!         ValidationRules // 범위/구조 검증 (완료)
//!         MixerCorrectionMatrix // 보정 행렬 (완료)
//!         ConfigDocument // 설정 문서 트리 (완료)
//!         ParameterStore // 스냅샷 (완료)
//!         TransformRegistry // 속성별 변환 (완료)
//!         Synthesizer // 차분 빌드 (완료)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use mixcal_config::prelude::*;
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
//! let mut qubit = ControlChannel::drive("QUBIT", Arc::new(Lo(Mutex::new(5e9))), ports)
//!     .unwrap()
//!     .with_intermediate_frequency(-50_000_000)
//!     .with_default_operations();
//!
//! let mut synth = Synthesizer::new();
//! synth.build(std::slice::from_ref(&qubit)).unwrap();
//!
//! // only the correction matrix is rewritten
//! qubit.set_offset(OffsetKey::G, 0.1);
//! synth.build_channel(&qubit).unwrap();
//! assert_eq!(synth.last_report().invoked_for("QUBIT"), vec!["offsets"]);
//!
//! println!("{}", synth.document().to_json_pretty().unwrap());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Validation rules (Gantree: L2_Synthesis → ValidationRules)
pub mod validation;

/// Mixer correction matrix (Gantree: L2_Synthesis → MixerCorrectionMatrix)
pub mod correction;

/// Configuration document (Gantree: L2_Synthesis → ConfigDocument)
pub mod document;

/// Parameter snapshots (Gantree: L2_Synthesis → ParameterStore)
pub mod snapshot;

/// Attribute transforms (Gantree: L2_Synthesis → TransformRegistry)
pub mod transforms;

/// Synthesizer (Gantree: L2_Synthesis → Synthesizer)
pub mod synthesizer;

// ============================================================================
// Re-exports
// ============================================================================

pub use correction::MixerCorrectionMatrix;
pub use document::{
    ConfigDocument, ControllerConfig, ElementConfig, MixerEntry, PulseConfig, WaveformConfig,
};
pub use snapshot::{Attribute, AttributeValue, ParameterSnapshot};
pub use synthesizer::{BuildReport, Synthesizer};

// ============================================================================
// Prelude
// ============================================================================

pub mod prelude {
    //! Convenient imports for common use cases
    //!
    //! ```rust
    //! use mixcal_config::prelude::*;
    //! ```

    pub use crate::correction::MixerCorrectionMatrix;
    pub use crate::document::{
        ConfigDocument, ControllerConfig, ElementConfig, MixerEntry, PulseConfig,
        WaveformConfig,
    };
    pub use crate::snapshot::{Attribute, AttributeValue, ParameterSnapshot};
    pub use crate::synthesizer::{BuildReport, Synthesizer};
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
pub(crate) mod tests {
    use super::prelude::*;
    use mixcal_core::prelude::*;

    pub(crate) mod fixtures {
        use mixcal_core::prelude::*;
        use std::sync::{Arc, Mutex};

        pub(crate) struct TestOscillator(Mutex<f64>);

        impl LocalOscillator for TestOscillator {
            fn name(&self) -> &str {
                "test-lo"
            }
            fn frequency(&self) -> MixcalResult<f64> {
                Ok(*self.0.lock().unwrap())
            }
            fn set_frequency(&self, frequency: f64) -> MixcalResult<()> {
                *self.0.lock().unwrap() = frequency;
                Ok(())
            }
            fn power(&self) -> MixcalResult<f64> {
                Ok(15.0)
            }
            fn set_power(&self, _power: f64) -> MixcalResult<()> {
                Ok(())
            }
        }

        pub(crate) fn oscillator(frequency: f64) -> OscillatorHandle {
            Arc::new(TestOscillator(Mutex::new(frequency)))
        }

        /// Mixed drive channel "QUBIT" on ports 1/2
        pub(crate) fn qubit() -> (ControlChannel, OscillatorHandle) {
            let lo = oscillator(5e9);
            let ports: PortMap = [(PortKey::I, 1), (PortKey::Q, 2)].into_iter().collect();
            let channel = ControlChannel::drive("QUBIT", lo.clone(), ports)
                .unwrap()
                .with_intermediate_frequency(-50_000_000)
                .with_default_operations();
            (channel, lo)
        }

        /// Mixed readout channel "RR" on ports 3/4, input 1
        pub(crate) fn readout() -> (ControlChannel, OscillatorHandle) {
            let lo = oscillator(8e9);
            let ports: PortMap = [(PortKey::I, 3), (PortKey::Q, 4), (PortKey::Out, 1)]
                .into_iter()
                .collect();
            let channel = ControlChannel::readout("RR", lo.clone(), ports)
                .unwrap()
                .with_intermediate_frequency(-40_000_000)
                .with_default_operations()
                .with_time_of_flight(201);
            (channel, lo)
        }
    }

    use fixtures::{oscillator, qubit, readout};

    #[test]
    fn test_idempotent_rebuild() {
        let (q, _) = qubit();
        let (rr, _) = readout();
        let channels = vec![q, rr];

        let mut synth = Synthesizer::new();
        let first = synth.build(&channels).unwrap().to_json().unwrap();
        let second = synth.build(&channels).unwrap().to_json().unwrap();

        assert_eq!(first, second);
        assert!(synth.last_report().is_noop());
        assert!(synth.last_report().warnings.is_empty());
    }

    #[test]
    fn test_minimal_diff_intermediate_frequency() {
        let (mut q, _) = qubit();
        let (rr, _) = readout();
        let mut synth = Synthesizer::new();
        synth.build(&[q.clone(), rr.clone()]).unwrap();
        let before = synth.document().clone();

        q.set_intermediate_frequency(-55_000_000);
        synth.build(&[q, rr]).unwrap();

        assert_eq!(
            synth.last_report().invoked,
            vec![("QUBIT".to_string(), "intermediate_frequency".to_string())]
        );

        let mut expected = before;
        expected.elements.get_mut("QUBIT").unwrap().intermediate_frequency = -55_000_000;
        expected.mixers.get_mut("QUBIT.mixer").unwrap()[0].intermediate_frequency = -55_000_000;
        assert_eq!(synth.document(), &expected);
    }

    #[test]
    fn test_keyset_invariant() {
        // rejected before any document exists
        let ports: PortMap = [(PortKey::I, 1), (PortKey::Out, 1)].into_iter().collect();
        assert!(ControlChannel::drive("BAD", oscillator(5e9), ports)
            .unwrap_err()
            .is_structural());

        // a valid keyset may not replace another between builds
        let (mut q, _) = qubit();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&q)).unwrap();
        let before = synth.document().clone();

        q.set_ports([(PortKey::Single, 1)].into_iter().collect()).unwrap();
        let err = synth.build(std::slice::from_ref(&q)).unwrap_err();
        assert!(matches!(err, MixcalError::PortKeysetChanged { .. }));
        assert_eq!(synth.document(), &before);
    }

    #[test]
    fn test_port_change_rebinds_only_that_port() {
        let (mut q, _) = qubit();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&q)).unwrap();

        q.set_ports([(PortKey::I, 1), (PortKey::Q, 5)].into_iter().collect())
            .unwrap();
        synth.build_channel(&q).unwrap();

        let doc = synth.document();
        let mix = doc.element("QUBIT").unwrap().mix_inputs.as_ref().unwrap();
        assert_eq!(mix.q, Some(("con1".to_string(), 5)));
        assert_eq!(doc.output_offset(5), Some(0.0));
        assert_eq!(synth.last_report().invoked_for("QUBIT"), vec!["ports"]);
    }

    #[test]
    fn test_single_input_defaults_build() {
        let ports: PortMap = [(PortKey::Single, 3)].into_iter().collect();
        let flux = ControlChannel::drive("FLUX", oscillator(0.0), ports)
            .unwrap()
            .with_default_operations();
        let ports: PortMap = [(PortKey::Single, 4), (PortKey::Out, 1)].into_iter().collect();
        let rr = ControlChannel::readout("RR", oscillator(7e9), ports)
            .unwrap()
            .with_default_operations()
            .with_time_of_flight(200);

        let mut synth = Synthesizer::new();
        let doc = synth.build(&[flux, rr]).unwrap();

        assert!(doc.mixers.is_empty());
        for (channel, operation) in [("FLUX", "constant_pulse"), ("FLUX", "gaussian_pulse"), ("RR", "readout_pulse")] {
            let pulse = doc.pulse(channel, operation).unwrap();
            let slots: Vec<&str> = pulse.waveforms.keys().map(String::as_str).collect();
            assert_eq!(slots, vec!["single"]);
            assert!(doc.waveforms.contains_key(&pulse.waveforms["single"]));
        }
        let readout = doc.pulse("RR", "readout_pulse").unwrap();
        assert!(readout.digital_marker.is_some());
        assert_eq!(readout.integration_weights.len(), 2);
        assert_eq!(doc.element("RR").unwrap().outputs.len(), 1);
    }

    #[test]
    fn test_matrix_bounds() {
        let (mut q, _) = qubit();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&q)).unwrap();
        assert_eq!(
            synth.document().mixer_correction("QUBIT"),
            Some([1.0, 0.0, 0.0, 1.0])
        );

        q.set_offset(OffsetKey::G, 0.999999);
        let err = synth.build_channel(&q).unwrap_err();
        assert!(err.is_range_error());
        assert_eq!(
            synth.document().mixer_correction("QUBIT"),
            Some([1.0, 0.0, 0.0, 1.0])
        );
    }

    #[test]
    fn test_pulse_quantization() {
        let (q, _) = qubit();
        for (length, ok) in [(17, false), (16, true), (1000, true)] {
            let channel = q
                .clone()
                .with_operation("probe", PulseDefinition::constant(length, 0.5));
            let mut synth = Synthesizer::new();
            let result = synth.build(std::slice::from_ref(&channel));
            assert_eq!(result.is_ok(), ok, "length {}", length);
            if let Err(err) = result {
                assert!(matches!(err, MixcalError::InvalidPulseLength { length: 17, .. }));
            }
        }
    }

    #[test]
    fn test_pulse_length_update() {
        let (mut q, _) = qubit();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&q)).unwrap();
        let waveforms_before = synth.document().waveforms.clone();

        q.operation_mut("constant_pulse").unwrap().length = 400;
        synth.build_channel(&q).unwrap();
        assert_eq!(synth.document().pulse("QUBIT", "constant_pulse").unwrap().length, 400);
        // constant samples do not depend on length
        assert_eq!(synth.document().waveforms, waveforms_before);

        q.operation_mut("constant_pulse").unwrap().length = 401;
        assert!(synth.build_channel(&q).is_err());
    }

    #[test]
    fn test_amplitude_out_of_range() {
        let (mut q, _) = qubit();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&q)).unwrap();

        // 0.25 * 2.0 = 0.5 V is outside the open interval
        q.set_operation("constant_pulse", PulseDefinition::constant(1000, 2.0));
        let err = synth.build_channel(&q).unwrap_err();
        assert!(matches!(err, MixcalError::AmplitudeOutOfRange { .. }));
    }

    #[test]
    fn test_slot_partition_change_rejected() {
        let lo = oscillator(0.0);
        let ports: PortMap = [(PortKey::Single, 5)].into_iter().collect();
        let mut flux = ControlChannel::drive("FLUX", lo, ports)
            .unwrap()
            .with_operation("step", PulseDefinition::arbitrary(vec![0.1; 16], None));
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&flux)).unwrap();

        let element = synth.document().element("FLUX").unwrap();
        assert_eq!(
            element.single_input.as_ref().unwrap().port,
            Some(("con1".to_string(), 5))
        );
        assert!(synth.document().waveforms.contains_key("FLUX.step.waveform.single"));

        flux.set_operation(
            "step",
            PulseDefinition::arbitrary(vec![0.1; 16], Some(vec![0.0; 16])),
        );
        let err = synth.build_channel(&flux).unwrap_err();
        assert!(matches!(err, MixcalError::WaveformSlotsChanged { .. }));
    }

    #[test]
    fn test_mixed_channel_rejects_single_waveform() {
        let (q, _) = qubit();
        let channel = q.with_operation("raw", PulseDefinition::arbitrary(vec![0.1; 16], None));
        let err = Synthesizer::new()
            .build(std::slice::from_ref(&channel))
            .unwrap_err();
        assert!(matches!(err, MixcalError::WaveformSlotMismatch { .. }));
    }

    #[test]
    fn test_lo_frequency_change() {
        let (q, lo) = qubit();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&q)).unwrap();

        lo.set_frequency(5.2e9).unwrap();
        synth.build_channel(&q).unwrap();

        let doc = synth.document();
        assert_eq!(synth.last_report().invoked_for("QUBIT"), vec!["lo_frequency"]);
        assert_eq!(doc.mixer("QUBIT").unwrap().lo_frequency, 5_200_000_000);
        assert_eq!(
            doc.element("QUBIT").unwrap().mix_inputs.as_ref().unwrap().lo_frequency,
            5_200_000_000
        );
    }

    #[test]
    fn test_operation_removal() {
        let (mut q, _) = qubit();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&q)).unwrap();

        q.remove_operation("gaussian_pulse").unwrap();
        synth.build_channel(&q).unwrap();

        let doc = synth.document();
        assert!(doc.pulse("QUBIT", "gaussian_pulse").is_none());
        assert_eq!(doc.waveforms.len(), 2);
        assert!(!doc.element("QUBIT").unwrap().operations.contains_key("gaussian_pulse"));
    }

    #[test]
    fn test_qubit_end_to_end() {
        let (mut q, _) = qubit();
        let mut synth = Synthesizer::new();
        let doc = synth.build(std::slice::from_ref(&q)).unwrap();

        let value = doc.to_value().unwrap();
        assert_eq!(value["elements"]["QUBIT"]["intermediate_frequency"], -50_000_000);
        assert_eq!(
            value["mixers"]["QUBIT.mixer"][0]["correction"],
            serde_json::json!([1.0, 0.0, 0.0, 1.0])
        );
        let before = doc.clone();

        q.set_offset(OffsetKey::G, 0.1);
        q.set_offset(OffsetKey::P, 0.05);
        let doc = synth.build(std::slice::from_ref(&q)).unwrap();

        let expected_matrix = MixerCorrectionMatrix::from_offsets(0.1, 0.05).unwrap();
        let mut expected = before;
        expected.mixers.get_mut("QUBIT.mixer").unwrap()[0].correction =
            Some(expected_matrix.as_array());
        assert_eq!(doc, &expected);
        assert_eq!(doc.element("QUBIT").unwrap().intermediate_frequency, -50_000_000);
        assert_eq!(synth.last_report().invoked_for("QUBIT"), vec!["offsets"]);
    }
}
