use super::Emotion;
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One labelled feature vector. Labels outside the known set are skipped by
/// training rather than rejected.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrainingSample {
    pub features: Vec<f64>,
    pub label: String,
}

impl TrainingSample {
    pub fn new(features: impl Into<Vec<f64>>, label: impl Into<String>) -> Self {
        Self {
            features: features.into(),
            label: label.into(),
        }
    }

    pub fn labelled(features: &FeatureVector, emotion: Emotion) -> Self {
        Self::new(features.to_vec(), emotion.as_str())
    }
}

/// Shared stop flag, checked between epochs.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrainingReport {
    pub epochs_requested: usize,
    pub epochs_completed: usize,
    /// Samples with a known label, used once per epoch.
    pub samples_used: usize,
    pub samples_skipped: usize,
    /// Mean cross-entropy over the last completed epoch.
    pub final_loss: Option<f64>,
    pub cancelled: bool,
}
