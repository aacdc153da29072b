mod classifier;
mod params;
pub mod rules;
pub mod store;
mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use classifier::{softmax, EmotionClassifier, ModelDescription, HIDDEN_SIZE, INPUT_SIZE, OUTPUT_SIZE};
pub use params::ModelParameters;
pub use store::{FileModelStore, MemoryModelStore, ModelStore, StoreError};
pub use training::{CancelToken, TrainingReport, TrainingSample};

/// The closed label set. Declaration order is the index used by every
/// probability vector and one-hot target.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Calm,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgust,
    Surprised,
}

impl Emotion {
    pub const COUNT: usize = 8;

    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Neutral,
        Emotion::Calm,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Disgust,
        Emotion::Surprised,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Calm => "calm",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgust => "disgust",
            Emotion::Surprised => "surprised",
        }
    }

    /// Two-digit corpus code, `01` (neutral) through `08` (surprised).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Emotion::Neutral),
            "02" => Some(Emotion::Calm),
            "03" => Some(Emotion::Happy),
            "04" => Some(Emotion::Sad),
            "05" => Some(Emotion::Angry),
            "06" => Some(Emotion::Fearful),
            "07" => Some(Emotion::Disgust),
            "08" => Some(Emotion::Surprised),
            _ => None,
        }
    }

    pub fn code(self) -> String {
        format!("{:02}", self.index() + 1)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown emotion label: {0:?}")]
pub struct UnknownEmotion(pub String);

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownEmotion(s.to_owned()))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Rules,
    Network,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub label: Emotion,
    /// Probability of `label`.
    pub confidence: f64,
    /// One entry per [`Emotion::ALL`], summing to 1.
    pub probabilities: Vec<f64>,
    pub source: PredictionSource,
}

impl Prediction {
    pub(crate) fn from_distribution(probabilities: Vec<f64>, source: PredictionSource) -> Self {
        let best = argmax(&probabilities);
        Self {
            label: Emotion::from_index(best).unwrap_or(Emotion::Neutral),
            confidence: probabilities.get(best).copied().unwrap_or(0.0),
            probabilities,
            source,
        }
    }

    pub fn probability(&self, emotion: Emotion) -> f64 {
        self.probabilities
            .get(emotion.index())
            .copied()
            .unwrap_or(0.0)
    }
}

/// Index of the first maximum.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid parameter blob: {0}")]
    InvalidBlob(String),
}

impl ClassifierError {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_is_stable() {
        let names: Vec<&str> = Emotion::ALL.iter().map(|e| e.as_str()).collect();
        assert_eq!(
            names,
            ["neutral", "calm", "happy", "sad", "angry", "fearful", "disgust", "surprised"]
        );
        for (i, e) in Emotion::ALL.iter().enumerate() {
            assert_eq!(e.index(), i);
            assert_eq!(Emotion::from_index(i), Some(*e));
        }
        assert_eq!(Emotion::from_index(8), None);
    }

    #[test]
    fn corpus_codes_map_to_labels() {
        assert_eq!(Emotion::from_code("01"), Some(Emotion::Neutral));
        assert_eq!(Emotion::from_code("05"), Some(Emotion::Angry));
        assert_eq!(Emotion::from_code("08"), Some(Emotion::Surprised));
        assert_eq!(Emotion::from_code("09"), None);
        assert_eq!(Emotion::from_code("1"), None);
        assert_eq!(Emotion::Disgust.code(), "07");
    }

    #[test]
    fn parse_is_case_insensitive_and_strict() {
        assert_eq!("Happy".parse::<Emotion>(), Ok(Emotion::Happy));
        assert_eq!(" sad ".parse::<Emotion>(), Ok(Emotion::Sad));
        assert!("bored".parse::<Emotion>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Emotion::Fearful).unwrap();
        assert_eq!(json, "\"fearful\"");
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
    }
}
