//! Leakage contrast
//!
//! Gantree: L4_Tuning → Contrast
//!
//! Height of the spectrum bin at the probe frequency above the noise floor
//! estimated from both flanks of the sweep window. During optimization the
//! center bin and floor of the baseline sweep stay fixed.

use mixcal_core::error::{MixcalError, MixcalResult};
use mixcal_core::types::Hertz;
use mixcal_instruments::probe::Spectrum;
use serde::{Deserialize, Serialize};

/// Contrast measurement of one sweep
/// Gantree: Contrast // 대비 측정
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contrast {
    /// Index of the bin nearest the probe frequency
    pub center_index: usize,
    /// Amplitude of that bin (dBm)
    pub peak: f64,
    /// Noise floor estimate (dBm)
    pub floor: f64,
}

impl Contrast {
    /// Measure at `frequency`
    ///
    /// With `c` the center index, the floor is the average of the mean of
    /// bins `[0, c/2)` and the mean of bins `[c + c/2, n)`.
    /// Gantree: measure(spectrum,frequency) -> MixcalResult<Contrast> // 대비 계산
    pub fn measure(spectrum: &Spectrum, frequency: Hertz) -> MixcalResult<Self> {
        let c = spectrum
            .nearest_index(frequency)
            .ok_or_else(|| MixcalError::ProbeError("empty spectrum".to_string()))?;
        let amps = &spectrum.amplitudes;

        let left = &amps[..c / 2];
        let right = &amps[(c + c / 2).min(amps.len())..];
        if left.is_empty() || right.is_empty() {
            return Err(MixcalError::ProbeError(format!(
                "probe frequency {:.6e}Hz leaves no flank in a {}-bin sweep",
                frequency,
                amps.len()
            )));
        }

        Ok(Self {
            center_index: c,
            peak: amps[c],
            floor: (mean(left) + mean(right)) / 2.0,
        })
    }

    /// Re-read the peak of a new sweep against this center bin and floor
    /// Gantree: resample(&self,spectrum) -> MixcalResult<Contrast> // 기준 대비 재측정
    pub fn resample(&self, spectrum: &Spectrum) -> MixcalResult<Self> {
        let peak = spectrum.amplitudes.get(self.center_index).copied().ok_or_else(|| {
            MixcalError::ProbeError(format!(
                "{}-bin sweep has no bin {}",
                spectrum.amplitudes.len(),
                self.center_index
            ))
        })?;
        Ok(Self { peak, ..*self })
    }

    /// Peak height above the floor (dB)
    pub fn value(&self) -> f64 {
        self.peak - self.floor
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spectrum(amplitudes: Vec<f64>) -> Spectrum {
        let frequencies = (0..amplitudes.len()).map(|k| k as f64).collect();
        Spectrum::new(frequencies, amplitudes).unwrap()
    }

    #[test]
    fn test_floor_from_flanks() {
        // c = 4: left [0, 2), right [6, 9)
        let s = spectrum(vec![-90.0, -92.0, -50.0, -50.0, -40.0, -50.0, -88.0, -88.0, -88.0]);
        let contrast = Contrast::measure(&s, 4.0).unwrap();

        assert_eq!(contrast.center_index, 4);
        assert_relative_eq!(contrast.floor, (-91.0 + -88.0) / 2.0);
        assert_relative_eq!(contrast.value(), -40.0 + 89.5);
    }

    #[test]
    fn test_below_floor_is_negative() {
        let s = spectrum(vec![-80.0, -80.0, -80.0, -80.0, -85.0, -80.0, -80.0, -80.0, -80.0]);
        assert!(Contrast::measure(&s, 4.0).unwrap().value() < 0.0);
    }

    #[test]
    fn test_resample_keeps_floor() {
        let baseline = spectrum(vec![-90.0, -92.0, -50.0, -50.0, -40.0, -50.0, -88.0, -88.0, -88.0]);
        let baseline = Contrast::measure(&baseline, 4.0).unwrap();

        // flanks moved, only the center bin counts
        let next = spectrum(vec![-70.0, -70.0, -60.0, -60.0, -60.0, -60.0, -70.0, -70.0, -70.0]);
        let resampled = baseline.resample(&next).unwrap();
        assert_eq!(resampled.center_index, 4);
        assert_eq!(resampled.floor, baseline.floor);
        assert_relative_eq!(resampled.value(), -60.0 + 89.5);

        let short = spectrum(vec![-90.0; 3]);
        assert!(baseline.resample(&short).unwrap_err().is_collaborator_error());
    }

    #[test]
    fn test_edge_probe_rejected() {
        let s = spectrum(vec![-90.0; 9]);
        assert!(Contrast::measure(&s, 0.0).unwrap_err().is_collaborator_error());
    }
}
