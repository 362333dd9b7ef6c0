// Spectrum - periodicity of a motion signal via FFT
//
// Algorithm:
// 1. FFT over the whole mean-free signal (no windowing, no padding)
// 2. Power spectrum P[k] = |X[k]|^2 for k in 1..=N/2
// 3. Restrict to bins whose period lies inside the allowed band
// 4. Peak bin k*, strength = (P[k*-1] + P[k*] + P[k*+1]) / sum(P)
// 5. Cycle count = power-weighted centroid of the three peak bins

use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::{Arc, Mutex};

use crate::motion::AxisSignal;

/// Dominant repetition of a signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Periodicity {
    pub period_ms: f32,
    /// Number of cycles across the analysed signal
    pub cycles: f32,
    /// Share of the signal energy around the peak, in [0, 1]
    pub strength: f32,
}

/// FFT front end shared by the detector and the repetition estimator
#[derive(Clone)]
pub struct SpectrumAnalyzer {
    fft_planner: Arc<Mutex<FftPlanner<f32>>>,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            fft_planner: Arc::new(Mutex::new(FftPlanner::new())),
        }
    }

    /// Power spectrum for positive frequencies, DC included at index 0
    pub fn power_spectrum(&self, values: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> =
            values.iter().map(|&v| Complex::new(v, 0.0)).collect();
        if buffer.is_empty() {
            return Vec::new();
        }

        let fft = {
            let mut planner = self
                .fft_planner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            planner.plan_fft_forward(buffer.len())
        };
        fft.process(&mut buffer);

        buffer[..buffer.len() / 2 + 1]
            .iter()
            .map(|c| c.norm_sqr())
            .collect()
    }

    /// Dominant period of `signal` within `[min_period_ms, max_period_ms]`
    ///
    /// # Returns
    /// `None` when the signal is too short or flat, or when no bin of the
    /// spectrum falls inside the period band.
    pub fn periodicity(
        &self,
        signal: &AxisSignal,
        min_period_ms: f32,
        max_period_ms: f32,
    ) -> Option<Periodicity> {
        let n = signal.len();
        if n < 4 || signal.sample_rate_hz <= 0.0 {
            return None;
        }

        let spectrum = self.power_spectrum(&signal.values);
        let last_bin = n / 2;
        let total: f32 = spectrum[1..=last_bin].iter().sum();
        if total <= f32::EPSILON {
            return None;
        }

        // bin k has period n / (k * fs) seconds
        let duration_ms = n as f32 * 1000.0 / signal.sample_rate_hz;
        let low_bin = ((duration_ms / max_period_ms).ceil() as usize).max(1);
        let high_bin = ((duration_ms / min_period_ms).floor() as usize).min(last_bin);
        if low_bin > high_bin {
            return None;
        }

        let peak = (low_bin..=high_bin).max_by(|&a, &b| spectrum[a].total_cmp(&spectrum[b]))?;
        let neighbours = peak.saturating_sub(1).max(1)..=(peak + 1).min(last_bin);

        let peak_power: f32 = neighbours.clone().map(|k| spectrum[k]).sum();
        let centroid = neighbours.map(|k| k as f32 * spectrum[k]).sum::<f32>() / peak_power;

        Some(Periodicity {
            period_ms: duration_ms / centroid,
            cycles: centroid,
            strength: (peak_power / total).clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{Location, SensorType, SourceKey};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn signal(values: Vec<f32>, sample_rate_hz: f32) -> AxisSignal {
        AxisSignal {
            source: SourceKey::new(SensorType::Accelerometer, 0, Location::LeftWrist),
            axis: 0,
            values,
            sample_rate_hz,
            std_dev: 1.0,
        }
    }

    fn sinusoid(cycles: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * cycles * i as f32 / len as f32).sin()
            })
            .collect()
    }

    #[test]
    fn test_exact_sinusoid_has_integer_cycles() {
        let analyzer = SpectrumAnalyzer::new();
        let result = analyzer
            .periodicity(&signal(sinusoid(8.0, 400, 500.0), 50.0), 400.0, 8_000.0)
            .expect("sinusoid should be periodic");

        assert!((result.cycles - 8.0).abs() < 0.01);
        assert!((result.period_ms - 1_000.0).abs() < 5.0);
        assert!(result.strength > 0.99);
    }

    #[test]
    fn test_fractional_cycles_are_interpolated() {
        let analyzer = SpectrumAnalyzer::new();
        let result = analyzer
            .periodicity(&signal(sinusoid(6.5, 300, 500.0), 50.0), 400.0, 8_000.0)
            .unwrap();

        assert!((result.cycles - 6.5).abs() < 0.6);
        assert!(result.strength > 0.7);
    }

    #[test]
    fn test_white_noise_has_weak_peak() {
        let mut rng = StdRng::seed_from_u64(7);
        let values: Vec<f32> = (0..400).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let analyzer = SpectrumAnalyzer::new();
        let result = analyzer
            .periodicity(&signal(values, 50.0), 400.0, 8_000.0)
            .unwrap();
        assert!(result.strength < 0.2);
    }

    #[test]
    fn test_band_excludes_fast_oscillation() {
        // 40 cycles in 8s = 200ms period, below a 400ms band floor
        let analyzer = SpectrumAnalyzer::new();
        let result = analyzer
            .periodicity(&signal(sinusoid(40.0, 400, 500.0), 50.0), 400.0, 8_000.0)
            .unwrap();
        assert!(result.strength < 0.05);
    }

    #[test]
    fn test_flat_signal_has_no_periodicity() {
        let analyzer = SpectrumAnalyzer::new();
        assert!(analyzer
            .periodicity(&signal(vec![0.0; 64], 50.0), 400.0, 8_000.0)
            .is_none());
        assert!(analyzer
            .periodicity(&signal(vec![1.0, -1.0], 50.0), 400.0, 8_000.0)
            .is_none());
    }
}
