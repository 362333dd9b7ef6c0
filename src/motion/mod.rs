// Motion module - features shared by the detector and the repetition estimator
//
// Pipeline position: FusedWindow -> dominant axis -> {intensity, periodicity}

pub mod signal;
pub mod spectrum;

pub use signal::{coefficient_of_variation, dominant_axis, merge_channels, AxisSignal};
pub use spectrum::{Periodicity, SpectrumAnalyzer};

use serde::{Deserialize, Serialize};

use crate::fusion::FusedWindow;

/// Per-window motion summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionFeatures {
    /// Standard deviation of the dominant axis, raw sensor units
    pub intensity: f32,
    /// Dominant repetition period, when the window is periodic enough
    pub period_ms: Option<f32>,
    /// Spectral peak share behind `period_ms`, in [0, 1]
    pub periodicity: f32,
}

impl MotionFeatures {
    /// Derive features from the motion channels of `window`
    ///
    /// # Arguments
    /// * `analyzer` - FFT front end
    /// * `period_band_ms` - allowed `(min, max)` repetition period
    /// * `min_periodicity` - peak share below which no period is reported
    ///
    /// # Returns
    /// Zero intensity and no period when the window holds no usable motion data.
    pub fn extract(
        window: &FusedWindow,
        analyzer: &SpectrumAnalyzer,
        period_band_ms: (f32, f32),
        min_periodicity: f32,
    ) -> Self {
        let Some(signal) = dominant_axis(window.motion_channels()) else {
            return Self::default();
        };

        let periodicity = analyzer.periodicity(&signal, period_band_ms.0, period_band_ms.1);
        let strength = periodicity.map(|p| p.strength).unwrap_or(0.0);

        Self {
            intensity: signal.std_dev,
            period_ms: periodicity
                .filter(|p| p.strength >= min_periodicity)
                .map(|p| p.period_ms),
            periodicity: strength,
        }
    }
}
