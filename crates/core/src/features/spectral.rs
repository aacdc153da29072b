use rustfft::{num_complex::Complex, FftPlanner};

/// Magnitudes of DFT bins `0..=N/2` for a real input of length `N`.
pub(crate) fn magnitude_spectrum(samples: &[f64], planner: &mut FftPlanner<f64>) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let fft = planner.plan_fft_forward(samples.len());
    let mut buf: Vec<Complex<f64>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft.process(&mut buf);
    buf[..samples.len() / 2 + 1]
        .iter()
        .map(|c| c.norm())
        .collect()
}

/// Magnitude-weighted mean bin index; 0 for an all-zero spectrum.
pub fn spectral_centroid(magnitudes: &[f64]) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = magnitudes
        .iter()
        .enumerate()
        .map(|(k, m)| k as f64 * m)
        .sum();
    weighted / total
}

/// Smallest bin index whose cumulative magnitude reaches `fraction` of the
/// total. Falls back to the last bin.
pub fn spectral_rolloff(magnitudes: &[f64], fraction: f64) -> f64 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let total: f64 = magnitudes.iter().sum();
    let threshold = fraction * total;
    let mut cumulative = 0.0;
    for (k, m) in magnitudes.iter().enumerate() {
        cumulative += m;
        if cumulative >= threshold {
            return k as f64;
        }
    }
    (magnitudes.len() - 1) as f64
}

/// Fraction of adjacent sample pairs whose sign differs (`>= 0` vs `< 0`).
pub fn zero_crossing_rate(signal: &[f32]) -> f64 {
    if signal.len() < 2 {
        return 0.0;
    }
    let crossings = signal
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / (signal.len() - 1) as f64
}

pub fn rms_energy(signal: &[f32]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = signal.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / signal.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(signal: &[f64]) -> Vec<f64> {
        magnitude_spectrum(signal, &mut FftPlanner::new())
    }

    fn naive_dft_magnitudes(signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        (0..=n / 2)
            .map(|k| {
                let (mut re, mut im) = (0.0, 0.0);
                for (i, x) in signal.iter().enumerate() {
                    let angle = -2.0 * std::f64::consts::PI * (k * i) as f64 / n as f64;
                    re += x * angle.cos();
                    im += x * angle.sin();
                }
                (re * re + im * im).sqrt()
            })
            .collect()
    }

    #[test]
    fn fft_magnitudes_match_direct_dft() {
        let signal: Vec<f64> = (0..50).map(|i| ((i * 7 % 13) as f64 - 6.0) / 6.0).collect();
        let fast = spectrum(&signal);
        let slow = naive_dft_magnitudes(&signal);
        assert_eq!(fast.len(), 26);
        for (a, b) in fast.iter().zip(slow.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn centroid_of_silence_is_zero() {
        assert_eq!(spectral_centroid(&[0.0; 8]), 0.0);
    }

    #[test]
    fn centroid_and_rolloff_of_single_bin() {
        let mut mags = vec![0.0; 10];
        mags[4] = 2.0;
        assert!((spectral_centroid(&mags) - 4.0).abs() < 1e-12);
        assert_eq!(spectral_rolloff(&mags, 0.85), 4.0);
    }

    #[test]
    fn rolloff_reaches_threshold_inclusively() {
        let mags = [1.0, 1.0, 1.0, 1.0];
        assert_eq!(spectral_rolloff(&mags, 0.5), 1.0);
        assert_eq!(spectral_rolloff(&mags, 1.0), 3.0);
    }

    #[test]
    fn zcr_counts_transitions_through_zero() {
        assert_eq!(zero_crossing_rate(&[0.0, 0.0, 0.0]), 0.0);
        // -1 -> 0 flips the `>= 0` test
        assert!((zero_crossing_rate(&[-1.0, 0.0, 1.0]) - 0.5).abs() < 1e-12);
        assert!((zero_crossing_rate(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rms_of_constant_signal() {
        assert!((rms_energy(&[0.5; 100]) - 0.5).abs() < 1e-9);
        assert_eq!(rms_energy(&[]), 0.0);
    }
}
