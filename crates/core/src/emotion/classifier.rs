use super::params::ModelParameters;
use super::training::{CancelToken, TrainingReport, TrainingSample};
use super::{rules, ClassifierError, Emotion, Prediction, PredictionSource};
use crate::config::TrainingOptions;
use crate::features::FEATURE_VECTOR_LEN;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub const INPUT_SIZE: usize = FEATURE_VECTOR_LEN;
pub const HIDDEN_SIZE: usize = 64;
pub const OUTPUT_SIZE: usize = Emotion::COUNT;

const LOG_TARGET: &str = "emotion::classifier";

/// Max-subtracted softmax. Finite input always yields a distribution.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelDescription {
    pub classes: [Emotion; Emotion::COUNT],
    pub input_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub trained: bool,
}

struct Activations {
    hidden: Vec<f64>,
    logits: Vec<f64>,
}

/// 20 → 64 (ReLU) → 8 (softmax) network with a rule-based fallback while
/// untrained.
///
/// Training mutates the parameters in place; callers sharing one instance
/// must serialise `train` against `predict`.
#[derive(Clone, Debug)]
pub struct EmotionClassifier {
    params: ModelParameters,
    rng: StdRng,
    /// Schedule of the last run that completed an epoch.
    schedule: TrainingOptions,
}

impl EmotionClassifier {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Deterministic initialisation and shuffling.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(mut rng: StdRng) -> Self {
        let params = ModelParameters::random(&mut rng);
        Self {
            params,
            rng,
            schedule: TrainingOptions::default(),
        }
    }

    pub fn from_parameters(params: ModelParameters) -> Result<Self, ClassifierError> {
        params.validate()?;
        Ok(Self {
            params,
            rng: StdRng::from_os_rng(),
            schedule: TrainingOptions::default(),
        })
    }

    pub fn is_trained(&self) -> bool {
        self.params.trained
    }

    pub fn predict(&self, features: &[f64]) -> Result<Prediction, ClassifierError> {
        check_input(features)?;
        if !self.params.trained {
            return Ok(rules::predict(features));
        }
        let act = self.forward(features);
        Ok(Prediction::from_distribution(
            softmax(&act.logits),
            PredictionSource::Network,
        ))
    }

    /// Fixed schedule: 100 epochs at learning rate 0.01.
    pub fn train(&mut self, samples: &[TrainingSample]) -> Result<TrainingReport, ClassifierError> {
        self.train_with(TrainingOptions::default(), samples, &CancelToken::new())
    }

    /// Per-sample SGD on softmax cross-entropy. `cancel` is polled between
    /// epochs; a cancelled run keeps whatever the completed epochs learned.
    pub fn train_with(
        &mut self,
        options: TrainingOptions,
        samples: &[TrainingSample],
        cancel: &CancelToken,
    ) -> Result<TrainingReport, ClassifierError> {
        self.train_with_progress(options, samples, cancel, |_| {})
    }

    /// [`train_with`](Self::train_with), calling `on_epoch` with the running
    /// report after every completed epoch.
    pub fn train_with_progress(
        &mut self,
        options: TrainingOptions,
        samples: &[TrainingSample],
        cancel: &CancelToken,
        mut on_epoch: impl FnMut(&TrainingReport),
    ) -> Result<TrainingReport, ClassifierError> {
        let mut usable: Vec<(&[f64], usize)> = Vec::with_capacity(samples.len());
        for sample in samples {
            let Ok(emotion) = sample.label.parse::<Emotion>() else {
                continue;
            };
            check_input(&sample.features)?;
            usable.push((sample.features.as_slice(), emotion.index()));
        }
        let skipped = samples.len() - usable.len();
        if skipped > 0 {
            tracing::debug!(target: LOG_TARGET, skipped, "skipping samples with unknown labels");
        }
        if usable.is_empty() {
            tracing::warn!(target: LOG_TARGET, "no samples with a known label; weights stay at their initial values");
        }

        let mut report = TrainingReport {
            epochs_requested: options.epochs,
            epochs_completed: 0,
            samples_used: usable.len(),
            samples_skipped: skipped,
            final_loss: None,
            cancelled: false,
        };

        for epoch in 0..options.epochs {
            if cancel.is_cancelled() {
                report.cancelled = true;
                tracing::info!(target: LOG_TARGET, epoch, "training cancelled");
                break;
            }

            usable.shuffle(&mut self.rng);
            let mut total_loss = 0.0;
            for &(x, target) in &usable {
                total_loss += self.step(x, target, options.learning_rate);
            }

            report.epochs_completed = epoch + 1;
            if !usable.is_empty() {
                let mean_loss = total_loss / usable.len() as f64;
                report.final_loss = Some(mean_loss);
                tracing::debug!(target: LOG_TARGET, epoch, loss = mean_loss, "epoch complete");
            }
            on_epoch(&report);
        }

        if report.epochs_completed > 0 {
            self.params.trained = true;
            self.schedule = options;
        }
        tracing::info!(
            target: LOG_TARGET,
            epochs = report.epochs_completed,
            samples = report.samples_used,
            loss = ?report.final_loss,
            "training finished"
        );
        Ok(report)
    }

    pub fn export_parameters(&self) -> ModelParameters {
        self.params.clone()
    }

    /// Replaces all parameters, including the trained flag. Rejects blobs whose
    /// matrices or vectors do not match the network's shape.
    pub fn import_parameters(&mut self, params: ModelParameters) -> Result<(), ClassifierError> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Epochs and learning rate are those of the last run that completed an
    /// epoch in this instance, or the defaults.
    pub fn describe(&self) -> ModelDescription {
        ModelDescription {
            classes: Emotion::ALL,
            input_size: INPUT_SIZE,
            hidden_size: HIDDEN_SIZE,
            output_size: OUTPUT_SIZE,
            epochs: self.schedule.epochs,
            learning_rate: self.schedule.learning_rate,
            trained: self.params.trained,
        }
    }

    fn forward(&self, x: &[f64]) -> Activations {
        let p = &self.params;
        let mut hidden = p.b1.clone();
        for (xi, row) in x.iter().zip(&p.w1) {
            for (h, w) in hidden.iter_mut().zip(row) {
                *h += xi * w;
            }
        }
        for h in &mut hidden {
            *h = h.max(0.0);
        }

        let mut logits = p.b2.clone();
        for (hj, row) in hidden.iter().zip(&p.w2) {
            for (z, w) in logits.iter_mut().zip(row) {
                *z += hj * w;
            }
        }
        Activations { hidden, logits }
    }

    /// One gradient step on a single sample; returns its cross-entropy.
    fn step(&mut self, x: &[f64], target: usize, lr: f64) -> f64 {
        let act = self.forward(x);
        let probs = softmax(&act.logits);
        let loss = -probs[target].max(f64::MIN_POSITIVE).ln();

        let grad_out: Vec<f64> = probs
            .iter()
            .enumerate()
            .map(|(k, p)| if k == target { p - 1.0 } else { *p })
            .collect();

        let p = &mut self.params;
        let grad_hidden: Vec<f64> = act
            .hidden
            .iter()
            .zip(&p.w2)
            .map(|(h, row)| {
                if *h > 0.0 {
                    row.iter().zip(&grad_out).map(|(w, g)| w * g).sum()
                } else {
                    0.0
                }
            })
            .collect();

        for (hj, row) in act.hidden.iter().zip(p.w2.iter_mut()) {
            for (w, g) in row.iter_mut().zip(&grad_out) {
                *w -= lr * g * hj;
            }
        }
        for (b, g) in p.b2.iter_mut().zip(&grad_out) {
            *b -= lr * g;
        }

        for (xi, row) in x.iter().zip(p.w1.iter_mut()) {
            for (w, g) in row.iter_mut().zip(&grad_hidden) {
                *w -= lr * g * xi;
            }
        }
        for (b, g) in p.b1.iter_mut().zip(&grad_hidden) {
            *b -= lr * g;
        }

        loss
    }
}

impl Default for EmotionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn check_input(features: &[f64]) -> Result<(), ClassifierError> {
    if features.len() != INPUT_SIZE {
        return Err(ClassifierError::shape(
            "feature vector",
            INPUT_SIZE,
            features.len(),
        ));
    }
    Ok(())
}
