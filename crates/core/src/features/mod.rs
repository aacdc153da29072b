//! Acoustic feature extraction from mono PCM.
//!
//! Produces whole-clip spectral and prosodic scalars plus per-frame cepstral
//! coefficients, and assembles them into the fixed-order vector consumed by
//! [`crate::emotion::EmotionClassifier`].

mod framing;
pub mod mfcc;
pub mod prosody;
pub mod spectral;

use crate::config::ExtractionConfig;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

pub use framing::{frame_count, frames};
pub use mfcc::{hz_to_mel, mean_mfcc, mel_to_hz};

pub const NUM_CEPSTRAL: usize = 13;
pub const NUM_SPECTRAL: usize = 4;
pub const NUM_PROSODIC: usize = 3;
pub const FEATURE_VECTOR_LEN: usize = NUM_SPECTRAL + NUM_PROSODIC + NUM_CEPSTRAL;

/// Position `i` names element `i` of every [`FeatureVector`]. Reordering this
/// invalidates trained models.
pub const FEATURE_NAMES: [&str; FEATURE_VECTOR_LEN] = [
    "spectral_centroid",
    "spectral_rolloff",
    "zero_crossing_rate",
    "rms_energy",
    "f0",
    "pitch_variation",
    "speaking_rate",
    "mfcc_0",
    "mfcc_1",
    "mfcc_2",
    "mfcc_3",
    "mfcc_4",
    "mfcc_5",
    "mfcc_6",
    "mfcc_7",
    "mfcc_8",
    "mfcc_9",
    "mfcc_10",
    "mfcc_11",
    "mfcc_12",
];

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SpectralFeatures {
    /// Magnitude-weighted mean DFT bin index.
    pub centroid: f64,
    /// Bin index below which 85% of the magnitude lies.
    pub rolloff: f64,
    pub zero_crossing_rate: f64,
    pub rms_energy: f64,
}

impl SpectralFeatures {
    pub fn to_array(&self) -> [f64; NUM_SPECTRAL] {
        [
            self.centroid,
            self.rolloff,
            self.zero_crossing_rate,
            self.rms_energy,
        ]
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProsodicFeatures {
    pub f0: f64,
    pub pitch_variation: f64,
    /// Energy peaks per second.
    pub speaking_rate: f64,
}

impl ProsodicFeatures {
    pub fn to_array(&self) -> [f64; NUM_PROSODIC] {
        [self.f0, self.pitch_variation, self.speaking_rate]
    }
}

/// The 20-wide classifier input, in [`FEATURE_NAMES`] order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector([f64; FEATURE_VECTOR_LEN]);

impl FeatureVector {
    pub fn from_parts(
        spectral: &SpectralFeatures,
        prosodic: &ProsodicFeatures,
        mfcc_mean: &[f64; NUM_CEPSTRAL],
    ) -> Self {
        let mut values = [0.0; FEATURE_VECTOR_LEN];
        values[..NUM_SPECTRAL].copy_from_slice(&spectral.to_array());
        values[NUM_SPECTRAL..NUM_SPECTRAL + NUM_PROSODIC].copy_from_slice(&prosodic.to_array());
        values[NUM_SPECTRAL + NUM_PROSODIC..].copy_from_slice(mfcc_mean);
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}

impl From<[f64; FEATURE_VECTOR_LEN]> for FeatureVector {
    fn from(values: [f64; FEATURE_VECTOR_LEN]) -> Self {
        Self(values)
    }
}

/// Everything extracted from one clip, before flattening.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClipFeatures {
    pub spectral: SpectralFeatures,
    pub prosodic: ProsodicFeatures,
    pub mfcc_mean: [f64; NUM_CEPSTRAL],
    pub frame_count: usize,
}

impl ClipFeatures {
    pub fn vector(&self) -> FeatureVector {
        FeatureVector::from_parts(&self.spectral, &self.prosodic, &self.mfcc_mean)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FeatureExtractor {
    config: ExtractionConfig,
}

impl FeatureExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Centroid, rolloff, zero-crossing rate and RMS over the whole signal.
    pub fn spectral_features(&self, signal: &[f32], sample_rate_hz: u32) -> SpectralFeatures {
        if signal.is_empty() || sample_rate_hz == 0 {
            return SpectralFeatures::default();
        }
        let magnitudes =
            spectral::magnitude_spectrum(&framing::to_f64(signal), &mut FftPlanner::new());
        SpectralFeatures {
            centroid: spectral::spectral_centroid(&magnitudes),
            rolloff: spectral::spectral_rolloff(&magnitudes, self.config.rolloff_fraction),
            zero_crossing_rate: spectral::zero_crossing_rate(signal),
            rms_energy: spectral::rms_energy(signal),
        }
    }

    pub fn prosodic_features(&self, signal: &[f32], sample_rate_hz: u32) -> ProsodicFeatures {
        if signal.is_empty() || sample_rate_hz == 0 {
            return ProsodicFeatures::default();
        }
        let frame_len = self.config.frame_len(sample_rate_hz);
        let hop = self.config.hop_len(sample_rate_hz);
        ProsodicFeatures {
            f0: prosody::estimate_f0(&framing::to_f64(signal), sample_rate_hz),
            pitch_variation: prosody::pitch_variation(signal, sample_rate_hz, frame_len, hop),
            speaking_rate: prosody::speaking_rate(
                signal,
                sample_rate_hz,
                prosody::speaking_rate_block_len(sample_rate_hz),
            ),
        }
    }

    /// One 13-coefficient vector per 25 ms frame at 10 ms hop.
    pub fn mfcc(&self, signal: &[f32], sample_rate_hz: u32) -> Vec<[f64; NUM_CEPSTRAL]> {
        if sample_rate_hz == 0 {
            return Vec::new();
        }
        mfcc::mfcc_frames(
            signal,
            sample_rate_hz,
            self.config.frame_len(sample_rate_hz),
            self.config.hop_len(sample_rate_hz),
            self.config.mel_filters,
        )
    }

    pub fn analyze(&self, signal: &[f32], sample_rate_hz: u32) -> ClipFeatures {
        let spectral = self.spectral_features(signal, sample_rate_hz);
        let prosodic = self.prosodic_features(signal, sample_rate_hz);
        let frames = self.mfcc(signal, sample_rate_hz);
        if frames.is_empty() {
            tracing::debug!(
                samples = signal.len(),
                sample_rate_hz,
                "clip shorter than one frame; using zero cepstral mean"
            );
        }
        ClipFeatures {
            spectral,
            prosodic,
            mfcc_mean: mean_mfcc(&frames),
            frame_count: frames.len(),
        }
    }

    pub fn extract(&self, signal: &[f32], sample_rate_hz: u32) -> FeatureVector {
        self.analyze(signal, sample_rate_hz).vector()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, len: usize, amp: f64) -> Vec<f32> {
        (0..len)
            .map(|i| {
                (amp * (2.0 * std::f64::consts::PI * freq * i as f64 / f64::from(sample_rate))
                    .sin()) as f32
            })
            .collect()
    }

    #[test]
    fn silence_produces_zero_energy_features() {
        let fx = FeatureExtractor::default();
        let silent = vec![0.0f32; 16_000];

        let spectral = fx.spectral_features(&silent, 16_000);
        assert_eq!(spectral.rms_energy, 0.0);
        assert_eq!(spectral.zero_crossing_rate, 0.0);
        assert_eq!(spectral.centroid, 0.0);

        let prosodic = fx.prosodic_features(&silent, 16_000);
        assert_eq!(prosodic.f0, 500.0);
        assert_eq!(prosodic.pitch_variation, 0.0);
        assert_eq!(prosodic.speaking_rate, 0.0);
    }

    #[test]
    fn centroid_and_rolloff_survive_scaling() {
        let fx = FeatureExtractor::default();
        let base: Vec<f32> = sine(300.0, 8_000, 4_000, 0.2)
            .iter()
            .zip(sine(1_700.0, 8_000, 4_000, 0.1))
            .map(|(a, b)| a + b)
            .collect();
        let doubled: Vec<f32> = base.iter().map(|s| s * 2.0).collect();
        let tripled: Vec<f32> = base.iter().map(|s| s * 3.0).collect();

        let a = fx.spectral_features(&base, 8_000);
        let b = fx.spectral_features(&doubled, 8_000);
        let c = fx.spectral_features(&tripled, 8_000);

        assert!((a.centroid - b.centroid).abs() < 1e-6 * a.centroid.max(1.0));
        assert!((a.centroid - c.centroid).abs() < 1e-6 * a.centroid.max(1.0));
        assert_eq!(a.rolloff, b.rolloff);
        assert!((b.rms_energy - 2.0 * a.rms_energy).abs() < 1e-6);
    }

    #[test]
    fn pure_150hz_tone_end_to_end() {
        let fx = FeatureExtractor::default();
        let tone = sine(150.0, 16_000, 16_000, 0.8);

        let clip = fx.analyze(&tone, 16_000);
        assert!((clip.prosodic.f0 - 150.0).abs() <= 5.0, "f0 = {}", clip.prosodic.f0);
        assert_eq!(clip.frame_count, 98);
        assert_eq!(fx.mfcc(&tone, 16_000).len(), 98);
        // one second of tone at 1 Hz/bin puts the centroid near 150
        assert!((clip.spectral.centroid - 150.0).abs() < 50.0);
    }

    #[test]
    fn vector_layout_follows_feature_names() {
        let spectral = SpectralFeatures {
            centroid: 1.0,
            rolloff: 2.0,
            zero_crossing_rate: 3.0,
            rms_energy: 4.0,
        };
        let prosodic = ProsodicFeatures {
            f0: 5.0,
            pitch_variation: 6.0,
            speaking_rate: 7.0,
        };
        let mut mfcc = [0.0; NUM_CEPSTRAL];
        for (i, c) in mfcc.iter_mut().enumerate() {
            *c = 8.0 + i as f64;
        }
        let v = FeatureVector::from_parts(&spectral, &prosodic, &mfcc);
        let expected: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(v.as_slice(), expected.as_slice());
        assert_eq!(FEATURE_NAMES[3], "rms_energy");
        assert_eq!(FEATURE_NAMES[7], "mfcc_0");
    }

    #[test]
    fn too_short_clip_degrades_to_zero_cepstra() {
        let fx = FeatureExtractor::default();
        let clip = fx.analyze(&[0.2, -0.2, 0.1], 16_000);
        assert_eq!(clip.frame_count, 0);
        assert_eq!(clip.mfcc_mean, [0.0; NUM_CEPSTRAL]);
        assert_eq!(clip.prosodic.pitch_variation, 0.0);
    }

    #[test]
    fn empty_signal_gives_all_zero_vector() {
        let fx = FeatureExtractor::default();
        let v = fx.extract(&[], 16_000);
        assert_eq!(v.as_slice().len(), FEATURE_VECTOR_LEN);
        assert!(v.as_slice().iter().all(|&x| x == 0.0), "{v:?}");
    }

    #[test]
    fn speaking_rate_ignores_framing_hop() {
        let mut burst = vec![0.01f32; 16_000];
        for b in 0..5 {
            let start = b * 3_200 + 1_600;
            for x in &mut burst[start..start + 160] {
                *x = 0.9;
            }
        }
        let default = FeatureExtractor::default().prosodic_features(&burst, 16_000);
        let coarse = FeatureExtractor::new(ExtractionConfig::new(25, 20, 26, 0.85).unwrap())
            .prosodic_features(&burst, 16_000);
        assert!((default.speaking_rate - 5.0).abs() < 1e-9);
        assert_eq!(coarse.speaking_rate, default.speaking_rate);
    }

    #[test]
    fn zero_sample_rate_is_total() {
        let fx = FeatureExtractor::default();
        let v = fx.extract(&[0.5; 1000], 0);
        assert!(v.as_slice().iter().all(|x| *x == 0.0));
    }
}
