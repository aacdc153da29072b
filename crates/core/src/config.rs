use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_FRAME_MS: u32 = 25;
pub const DEFAULT_HOP_MS: u32 = 10;
pub const DEFAULT_MEL_FILTERS: usize = 26;
pub const DEFAULT_ROLLOFF_FRACTION: f64 = 0.85;
pub const DEFAULT_EPOCHS: usize = 100;
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_MODEL_FILE: &str = "emotion-model.json";
pub const DEFAULT_DECODE_CONCURRENCY: usize = 4;
pub const ENV_MODEL_PATH: &str = "SER_MODEL_PATH";
pub const ENV_DATASET_DIR: &str = "SER_DATASET_DIR";

/// Framing and filterbank settings shared by every feature routine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExtractionConfig {
    pub frame_ms: u32,
    pub hop_ms: u32,
    pub mel_filters: usize,
    pub rolloff_fraction: f64,
}

impl ExtractionConfig {
    pub fn new(
        frame_ms: u32,
        hop_ms: u32,
        mel_filters: usize,
        rolloff_fraction: f64,
    ) -> Result<Self, ConfigError> {
        if frame_ms == 0 {
            return Err(ConfigError::ZeroFrame);
        }
        if hop_ms == 0 {
            return Err(ConfigError::ZeroHop);
        }
        if mel_filters == 0 {
            return Err(ConfigError::NoMelFilters);
        }
        if !(rolloff_fraction > 0.0 && rolloff_fraction <= 1.0) {
            return Err(ConfigError::RolloffOutOfRange(rolloff_fraction));
        }
        Ok(Self {
            frame_ms,
            hop_ms,
            mel_filters,
            rolloff_fraction,
        })
    }

    /// Frame length in samples at `sample_rate_hz`.
    pub fn frame_len(&self, sample_rate_hz: u32) -> usize {
        samples_for_ms(self.frame_ms, sample_rate_hz)
    }

    /// Hop length in samples at `sample_rate_hz`.
    pub fn hop_len(&self, sample_rate_hz: u32) -> usize {
        samples_for_ms(self.hop_ms, sample_rate_hz)
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            frame_ms: DEFAULT_FRAME_MS,
            hop_ms: DEFAULT_HOP_MS,
            mel_filters: DEFAULT_MEL_FILTERS,
            rolloff_fraction: DEFAULT_ROLLOFF_FRACTION,
        }
    }
}

fn samples_for_ms(ms: u32, sample_rate_hz: u32) -> usize {
    let n = u64::from(ms).saturating_mul(u64::from(sample_rate_hz)) / 1000;
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrainingOptions {
    pub epochs: usize,
    pub learning_rate: f64,
}

impl TrainingOptions {
    pub fn new(epochs: usize, learning_rate: f64) -> Result<Self, ConfigError> {
        if epochs == 0 {
            return Err(ConfigError::ZeroEpochs);
        }
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(ConfigError::InvalidLearningRate(learning_rate));
        }
        Ok(Self {
            epochs,
            learning_rate,
        })
    }
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub model_path: PathBuf,
    pub dataset_dir: Option<PathBuf>,
    pub extraction: ExtractionConfig,
    pub training: TrainingOptions,
    /// Clips decoded concurrently while building a training set.
    pub decode_concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_FILE),
            dataset_dir: None,
            extraction: ExtractionConfig::default(),
            training: TrainingOptions::default(),
            decode_concurrency: DEFAULT_DECODE_CONCURRENCY,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("frame length must be > 0 ms")]
    ZeroFrame,
    #[error("hop length must be > 0 ms")]
    ZeroHop,
    #[error("mel filterbank needs at least one filter")]
    NoMelFilters,
    #[error("rolloff fraction must be in (0, 1], got {0}")]
    RolloffOutOfRange(f64),
    #[error("training needs at least one epoch")]
    ZeroEpochs,
    #[error("learning rate must be a positive finite number, got {0}")]
    InvalidLearningRate(f64),
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// CLI value, then environment, then `default`.
pub fn resolve_path_with_default(
    cli_value: Option<PathBuf>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> PathBuf {
    match cli_value {
        Some(v) => v,
        None => env
            .var(env_key)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(default)),
    }
}

pub fn resolve_optional_path(
    cli_value: Option<PathBuf>,
    env_key: &str,
    env: &impl Env,
) -> Option<PathBuf> {
    match cli_value {
        Some(v) => Some(v),
        None => env
            .var(env_key)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from),
    }
}
