use super::framing::{frames, to_f64};

pub const MIN_PITCH_HZ: u32 = 50;
pub const MAX_PITCH_HZ: u32 = 500;
pub const PEAK_THRESHOLD_RATIO: f64 = 0.3;
/// Speaking-rate energy blocks are 10 ms regardless of the framing hop.
pub const SPEAKING_RATE_BLOCK_MS: usize = 10;

/// Autocorrelation pitch estimate in Hz.
///
/// Candidate lags cover `[sr / 500, sr / 50)`. Each lag is scored by the mean
/// product `Σ x[i]·x[i + lag] / (N - lag)`; the first lag with the strictly
/// highest positive score wins. When no lag scores above zero the estimate is
/// `sr / (sr / 500)`. An empty signal has no pitch and gives 0.
pub fn estimate_f0(samples: &[f64], sample_rate_hz: u32) -> f64 {
    if samples.is_empty() || sample_rate_hz == 0 {
        return 0.0;
    }
    let min_lag = ((sample_rate_hz / MAX_PITCH_HZ) as usize).max(1);
    let max_lag = ((sample_rate_hz / MIN_PITCH_HZ) as usize).min(samples.len());

    let mut best_lag = min_lag;
    let mut best_corr = 0.0;
    for lag in min_lag..max_lag {
        let n = samples.len() - lag;
        let sum: f64 = samples[..n]
            .iter()
            .zip(&samples[lag..])
            .map(|(a, b)| a * b)
            .sum();
        let corr = sum / n as f64;
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }
    f64::from(sample_rate_hz) / best_lag as f64
}

/// Population standard deviation of per-frame pitch estimates that fall
/// strictly inside (50, 500) Hz. Zero when fewer than two frames qualify.
pub fn pitch_variation(signal: &[f32], sample_rate_hz: u32, frame_len: usize, hop: usize) -> f64 {
    let lo = f64::from(MIN_PITCH_HZ);
    let hi = f64::from(MAX_PITCH_HZ);
    let pitches: Vec<f64> = frames(signal, frame_len, hop)
        .map(|frame| estimate_f0(&to_f64(frame), sample_rate_hz))
        .filter(|&f0| f0 > lo && f0 < hi)
        .collect();

    if pitches.len() < 2 {
        return 0.0;
    }
    let mean = pitches.iter().sum::<f64>() / pitches.len() as f64;
    let var = pitches.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / pitches.len() as f64;
    var.sqrt()
}

pub fn speaking_rate_block_len(sample_rate_hz: u32) -> usize {
    sample_rate_hz as usize * SPEAKING_RATE_BLOCK_MS / 1000
}

/// Energy peaks per second over non-overlapping blocks of `block_len`
/// samples, a rough syllable-rate proxy.
pub fn speaking_rate(signal: &[f32], sample_rate_hz: u32, block_len: usize) -> f64 {
    if signal.is_empty() || sample_rate_hz == 0 || block_len == 0 {
        return 0.0;
    }
    let energies: Vec<f64> = signal
        .chunks_exact(block_len)
        .map(super::spectral::rms_energy)
        .collect();
    if energies.len() < 3 {
        return 0.0;
    }

    let mean = energies.iter().sum::<f64>() / energies.len() as f64;
    let threshold = PEAK_THRESHOLD_RATIO * mean;
    let peaks = energies
        .windows(3)
        .filter(|w| w[1] > w[0] && w[1] > w[2] && w[1] > threshold)
        .count();

    let duration_s = signal.len() as f64 / f64::from(sample_rate_hz);
    peaks as f64 / duration_s
}
