//! Mel-frequency cepstral coefficients.
//!
//! Per frame: Hamming window, DFT magnitude, triangular mel filterbank with
//! log compression, then a DCT-II of which the first [`NUM_CEPSTRAL`]
//! coefficients are kept.

use super::framing::frames;
use super::spectral::magnitude_spectrum;
use super::NUM_CEPSTRAL;
use rustfft::FftPlanner;
use std::f64::consts::PI;

/// Guards `ln(0)` for filters that collect no energy.
const LOG_FLOOR: f64 = 1e-10;

pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// `0.54 - 0.46·cos(2πi/(N-1))`
pub fn hamming_window(len: usize) -> Vec<f64> {
    if len <= 1 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// Triangular filters spaced evenly on the mel scale between 0 Hz and
/// Nyquist, evaluated at the DFT bin frequencies of a `dft_len` transform.
#[derive(Clone, Debug)]
pub struct MelFilterbank {
    weights: Vec<Vec<f64>>,
}

impl MelFilterbank {
    pub fn new(num_filters: usize, dft_len: usize, sample_rate_hz: u32) -> Self {
        let nyquist = f64::from(sample_rate_hz) / 2.0;
        let mel_max = hz_to_mel(nyquist);
        let steps = (num_filters + 1) as f64;
        let edges: Vec<f64> = (0..num_filters + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / steps))
            .collect();

        let num_bins = dft_len / 2 + 1;
        let bin_hz = if dft_len == 0 {
            0.0
        } else {
            f64::from(sample_rate_hz) / dft_len as f64
        };

        let weights = edges
            .windows(3)
            .map(|tri| {
                let (start, center, end) = (tri[0], tri[1], tri[2]);
                (0..num_bins)
                    .map(|k| triangle_weight(k as f64 * bin_hz, start, center, end))
                    .collect()
            })
            .collect();

        Self { weights }
    }

    pub fn num_filters(&self) -> usize {
        self.weights.len()
    }

    /// `ln(Σ w·|X| + 1e-10)` for every filter.
    pub fn log_energies(&self, magnitudes: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .map(|filter| {
                let energy: f64 = filter
                    .iter()
                    .zip(magnitudes)
                    .map(|(w, m)| w * m)
                    .sum();
                (energy + LOG_FLOOR).ln()
            })
            .collect()
    }
}

fn triangle_weight(freq: f64, start: f64, center: f64, end: f64) -> f64 {
    if freq >= start && freq <= center && center > start {
        (freq - start) / (center - start)
    } else if freq > center && freq <= end && end > center {
        (end - freq) / (end - center)
    } else {
        0.0
    }
}

/// Unnormalised DCT-II, first `num_coeffs` outputs.
pub fn dct_ii(input: &[f64], num_coeffs: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..num_coeffs)
        .map(|k| {
            input
                .iter()
                .enumerate()
                .map(|(i, x)| x * (PI * k as f64 * (i as f64 + 0.5) / n).cos())
                .sum()
        })
        .collect()
}

/// One coefficient vector per full frame; empty when the signal is shorter
/// than a frame.
pub fn mfcc_frames(
    signal: &[f32],
    sample_rate_hz: u32,
    frame_len: usize,
    hop: usize,
    num_filters: usize,
) -> Vec<[f64; NUM_CEPSTRAL]> {
    if frame_len == 0 || signal.len() < frame_len {
        return Vec::new();
    }

    let window = hamming_window(frame_len);
    let filterbank = MelFilterbank::new(num_filters, frame_len, sample_rate_hz);
    let mut planner = FftPlanner::new();

    frames(signal, frame_len, hop)
        .map(|frame| {
            let windowed: Vec<f64> = frame
                .iter()
                .zip(&window)
                .map(|(&s, w)| f64::from(s) * w)
                .collect();
            let magnitudes = magnitude_spectrum(&windowed, &mut planner);
            let log_energies = filterbank.log_energies(&magnitudes);

            let mut coeffs = [0.0; NUM_CEPSTRAL];
            for (dst, src) in coeffs.iter_mut().zip(dct_ii(&log_energies, NUM_CEPSTRAL)) {
                *dst = src;
            }
            coeffs
        })
        .collect()
}

/// Time average of per-frame coefficients; zeros when there are no frames.
pub fn mean_mfcc(frames: &[[f64; NUM_CEPSTRAL]]) -> [f64; NUM_CEPSTRAL] {
    let mut mean = [0.0; NUM_CEPSTRAL];
    if frames.is_empty() {
        return mean;
    }
    for frame in frames {
        for (acc, c) in mean.iter_mut().zip(frame) {
            *acc += c;
        }
    }
    let n = frames.len() as f64;
    for acc in &mut mean {
        *acc /= n;
    }
    mean
}
