//! Hand-tuned scoring used while the network is untrained.
//!
//! Every class starts at [`BASE_SCORE`]; each [`Rule`] whose predicate holds
//! adds its increment to one class, and the scores are normalised into a
//! distribution. Cepstral coefficients are not consulted.

use super::{Emotion, Prediction, PredictionSource};
use std::fmt;

pub const BASE_SCORE: f64 = 0.1;

/// The seven scalar cues the rules look at, in feature-vector order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cues {
    pub spectral_centroid: f64,
    pub spectral_rolloff: f64,
    pub zero_crossing_rate: f64,
    pub rms_energy: f64,
    pub f0: f64,
    pub pitch_variation: f64,
    pub speaking_rate: f64,
}

impl Cues {
    /// Reads the first seven entries; missing trailing values read as 0.
    pub fn from_features(features: &[f64]) -> Self {
        let at = |i: usize| features.get(i).copied().unwrap_or(0.0);
        Self {
            spectral_centroid: at(0),
            spectral_rolloff: at(1),
            zero_crossing_rate: at(2),
            rms_energy: at(3),
            f0: at(4),
            pitch_variation: at(5),
            speaking_rate: at(6),
        }
    }
}

#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub when: fn(&Cues) -> bool,
    pub emotion: Emotion,
    pub increment: f64,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("emotion", &self.emotion)
            .field("increment", &self.increment)
            .finish()
    }
}

fn energetic(c: &Cues) -> bool {
    c.rms_energy > 0.1 && c.pitch_variation > 50.0
}

fn energetic_high_pitch(c: &Cues) -> bool {
    energetic(c) && c.f0 > 200.0
}

fn energetic_low_pitch(c: &Cues) -> bool {
    energetic(c) && c.f0 <= 200.0
}

fn quiet(c: &Cues) -> bool {
    !energetic(c) && c.rms_energy < 0.05
}

fn quiet_low_pitch(c: &Cues) -> bool {
    quiet(c) && c.f0 < 150.0
}

fn quiet_high_pitch(c: &Cues) -> bool {
    quiet(c) && c.f0 >= 150.0
}

fn moderate_energy(c: &Cues) -> bool {
    !energetic(c) && c.rms_energy >= 0.05
}

fn bright_spectrum(c: &Cues) -> bool {
    c.spectral_centroid > 2000.0
}

fn dark_spectrum(c: &Cues) -> bool {
    c.spectral_centroid < 1000.0
}

fn noisy(c: &Cues) -> bool {
    c.zero_crossing_rate > 0.1
}

fn fast_speech(c: &Cues) -> bool {
    c.speaking_rate > 5.0
}

fn slow_speech(c: &Cues) -> bool {
    c.speaking_rate < 3.0
}

const fn rule(name: &'static str, when: fn(&Cues) -> bool, emotion: Emotion, increment: f64) -> Rule {
    Rule {
        name,
        when,
        emotion,
        increment,
    }
}

pub const RULES: &[Rule] = &[
    rule("energetic_high_pitch", energetic_high_pitch, Emotion::Surprised, 0.3),
    rule("energetic_high_pitch", energetic_high_pitch, Emotion::Happy, 0.2),
    rule("energetic_low_pitch", energetic_low_pitch, Emotion::Angry, 0.3),
    rule("quiet_low_pitch", quiet_low_pitch, Emotion::Sad, 0.3),
    rule("quiet_high_pitch", quiet_high_pitch, Emotion::Calm, 0.3),
    rule("moderate_energy", moderate_energy, Emotion::Neutral, 0.2),
    rule("bright_spectrum", bright_spectrum, Emotion::Happy, 0.1),
    rule("bright_spectrum", bright_spectrum, Emotion::Surprised, 0.1),
    rule("dark_spectrum", dark_spectrum, Emotion::Sad, 0.1),
    rule("dark_spectrum", dark_spectrum, Emotion::Angry, 0.1),
    rule("noisy", noisy, Emotion::Fearful, 0.1),
    rule("noisy", noisy, Emotion::Disgust, 0.1),
    rule("fast_speech", fast_speech, Emotion::Happy, 0.1),
    rule("fast_speech", fast_speech, Emotion::Surprised, 0.1),
    rule("slow_speech", slow_speech, Emotion::Sad, 0.1),
    rule("slow_speech", slow_speech, Emotion::Calm, 0.1),
];

/// Raw (unnormalised) scores in [`Emotion::ALL`] order.
pub fn scores(cues: &Cues) -> [f64; Emotion::COUNT] {
    let mut scores = [BASE_SCORE; Emotion::COUNT];
    for r in RULES.iter().filter(|r| (r.when)(cues)) {
        scores[r.emotion.index()] += r.increment;
    }
    scores
}

pub fn predict(features: &[f64]) -> Prediction {
    let cues = Cues::from_features(features);
    let raw = scores(&cues);
    let total: f64 = raw.iter().sum();
    let probabilities = raw.iter().map(|s| s / total).collect();
    Prediction::from_distribution(probabilities, PredictionSource::Rules)
}
