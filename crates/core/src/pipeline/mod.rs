use crate::config::{AppConfig, ExtractionConfig, TrainingOptions};
use crate::corpus::LabeledClip;
use crate::decode::{AudioDecoder, DecodeError, PcmClip};
use crate::emotion::{
    CancelToken, ClassifierError, EmotionClassifier, ModelStore, Prediction, StoreError,
    TrainingReport, TrainingSample,
};
use crate::features::{ClipFeatures, FeatureExtractor};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub decode_concurrency: usize,
}

impl PipelineConfig {
    pub fn from_app(app: &AppConfig) -> Self {
        Self {
            extraction: app.extraction,
            decode_concurrency: app.decode_concurrency,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClipAnalysis {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub features: ClipFeatures,
    pub prediction: Prediction,
}

/// A training run on the blocking pool. Holds the classifier lock for the
/// whole run, so predictions on the same classifier wait for it.
pub struct TrainingTask {
    cancel: CancelToken,
    handle: JoinHandle<Result<TrainingReport, ClassifierError>>,
}

impl TrainingTask {
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stops after the epoch in progress.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> Result<TrainingReport, PipelineError> {
        let report = self
            .handle
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;
        Ok(report)
    }
}

/// Decode → extract → classify, with one classifier shared behind an async
/// mutex.
pub struct Pipeline<D> {
    decoder: D,
    extractor: FeatureExtractor,
    classifier: Arc<Mutex<EmotionClassifier>>,
    config: PipelineConfig,
}

impl<D> Pipeline<D>
where
    D: AudioDecoder,
{
    pub fn new(decoder: D, classifier: EmotionClassifier, config: PipelineConfig) -> Self {
        Self {
            decoder,
            extractor: FeatureExtractor::new(config.extraction),
            classifier: Arc::new(Mutex::new(classifier)),
            config,
        }
    }

    pub fn classifier(&self) -> Arc<Mutex<EmotionClassifier>> {
        Arc::clone(&self.classifier)
    }

    async fn features_for(&self, clip: PcmClip) -> Result<ClipFeatures, PipelineError> {
        let extractor = self.extractor.clone();
        tokio::task::spawn_blocking(move || extractor.analyze(&clip.samples, clip.sample_rate))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))
    }

    pub async fn analyze(&self, path: PathBuf) -> Result<ClipAnalysis, PipelineError> {
        let clip = self.decoder.decode_file(path.clone()).await?;
        let sample_rate = clip.sample_rate;
        let duration_secs = clip.duration().as_secs_f64();
        let features = self.features_for(clip).await?;
        let prediction = self
            .classifier
            .lock()
            .await
            .predict(features.vector().as_slice())?;

        tracing::info!(
            path = %path.display(),
            label = %prediction.label,
            confidence = prediction.confidence,
            source = ?prediction.source,
            "clip analyzed"
        );
        Ok(ClipAnalysis {
            path,
            sample_rate,
            duration_secs,
            features,
            prediction,
        })
    }

    /// Decodes and featurises every clip. Clips that fail to decode are
    /// logged and left out.
    pub async fn build_training_set(&self, clips: &[LabeledClip]) -> Vec<TrainingSample> {
        let concurrency = self.config.decode_concurrency.max(1);
        let results: Vec<Option<TrainingSample>> = stream::iter(clips)
            .map(|clip| async move {
                let pcm = match self.decoder.decode_file(clip.path.clone()).await {
                    Ok(pcm) => pcm,
                    Err(e) => {
                        tracing::warn!(
                            path = %clip.path.display(),
                            error = %e,
                            "decode failed; clip left out of training set"
                        );
                        return None;
                    }
                };
                match self.features_for(pcm).await {
                    Ok(features) => Some(TrainingSample::labelled(
                        &features.vector(),
                        clip.metadata.emotion,
                    )),
                    Err(e) => {
                        tracing::warn!(
                            path = %clip.path.display(),
                            error = %e,
                            "feature extraction failed"
                        );
                        None
                    }
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let samples: Vec<TrainingSample> = results.into_iter().flatten().collect();
        tracing::info!(
            clips = clips.len(),
            samples = samples.len(),
            "training set built"
        );
        samples
    }

    pub fn spawn_training(
        &self,
        samples: Vec<TrainingSample>,
        options: TrainingOptions,
    ) -> TrainingTask {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let classifier = Arc::clone(&self.classifier);
        let handle = tokio::task::spawn_blocking(move || {
            let mut guard = classifier.blocking_lock();
            guard.train_with(options, &samples, &token)
        });
        TrainingTask { cancel, handle }
    }

    /// Returns whether a saved model was found and imported.
    pub async fn load_model(&self, store: &dyn ModelStore) -> Result<bool, PipelineError> {
        match store.load().await? {
            Some(params) => {
                self.classifier.lock().await.import_parameters(params)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn save_model(&self, store: &dyn ModelStore) -> Result<(), PipelineError> {
        let params = self.classifier.lock().await.export_parameters();
        store.save(params).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::parse_file_name;
    use crate::emotion::{Emotion, MemoryModelStore, PredictionSource};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FixtureDecoder {
        clips: HashMap<PathBuf, PcmClip>,
    }

    impl FixtureDecoder {
        fn with_tone(mut self, name: &str, freq: f64, amp: f64) -> Self {
            let samples = (0..16_000)
                .map(|i| {
                    (amp * (2.0 * std::f64::consts::PI * freq * f64::from(i) / 16_000.0).sin())
                        as f32
                })
                .collect();
            self.clips.insert(
                PathBuf::from(name),
                PcmClip {
                    sample_rate: 16_000,
                    samples,
                },
            );
            self
        }
    }

    impl AudioDecoder for FixtureDecoder {
        fn decode_file(&self, path: PathBuf) -> BoxFuture<'_, crate::decode::Result<PcmClip>> {
            async move {
                self.clips.get(&path).cloned().ok_or(DecodeError::Io {
                    path,
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
            }
            .boxed()
        }
    }

    fn labeled(name: &str) -> LabeledClip {
        LabeledClip {
            path: PathBuf::from(name),
            metadata: parse_file_name(name).unwrap(),
        }
    }

    fn pipeline() -> Pipeline<FixtureDecoder> {
        let decoder = FixtureDecoder::default()
            .with_tone("03-01-04-01-01-01-01.wav", 150.0, 0.02)
            .with_tone("03-01-05-01-01-01-01.wav", 150.0, 0.6);
        Pipeline::new(
            decoder,
            EmotionClassifier::with_seed(17),
            PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn analyze_untrained_uses_rules() {
        let p = pipeline();
        let a = p
            .analyze(PathBuf::from("03-01-04-01-01-01-01.wav"))
            .await
            .unwrap();
        assert_eq!(a.features.frame_count, 98);
        assert!((a.duration_secs - 1.0).abs() < 1e-9);
        assert_eq!(a.prediction.source, PredictionSource::Rules);
        // quiet 150 Hz tone: rms < 0.05 and f0 just under 150
        assert_eq!(a.prediction.label, Emotion::Sad);
    }

    #[tokio::test]
    async fn analyze_missing_clip_is_decode_error() {
        let err = pipeline()
            .analyze(PathBuf::from("nope.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[tokio::test]
    async fn training_set_skips_undecodable_clips() {
        let p = pipeline();
        let clips = [
            labeled("03-01-04-01-01-01-01.wav"),
            labeled("03-01-05-01-01-01-01.wav"),
            labeled("03-01-06-01-01-01-01.wav"),
        ];
        let samples = p.build_training_set(&clips).await;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, "sad");
        assert_eq!(samples[1].label, "angry");
        assert!(samples.iter().all(|s| s.features.len() == 20));
    }

    #[tokio::test]
    async fn background_training_marks_model_trained() {
        let p = pipeline();
        let samples = p
            .build_training_set(&[
                labeled("03-01-04-01-01-01-01.wav"),
                labeled("03-01-05-01-01-01-01.wav"),
            ])
            .await;
        let report = p
            .spawn_training(samples, TrainingOptions::default())
            .join()
            .await
            .unwrap();
        assert_eq!(report.epochs_completed, 100);
        assert!(p.classifier().lock().await.is_trained());
    }

    #[tokio::test]
    async fn cancelled_training_stops_before_first_epoch() {
        let p = pipeline();
        let samples = vec![TrainingSample::new(vec![0.0; 20], "calm")];

        // hold the lock so the task cannot start an epoch before the cancel lands
        let guard = p.classifier.lock().await;
        let task = p.spawn_training(samples, TrainingOptions::default());
        task.cancel();
        drop(guard);

        let report = task.join().await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.epochs_completed, 0);
        assert!(!p.classifier().lock().await.is_trained());
    }

    #[tokio::test]
    async fn model_survives_save_and_load() {
        let store = MemoryModelStore::new();
        let trained = pipeline();
        trained
            .spawn_training(
                vec![TrainingSample::new(vec![1.0; 20], "happy")],
                TrainingOptions::new(20, 0.05).unwrap(),
            )
            .join()
            .await
            .unwrap();
        trained.save_model(&store).await.unwrap();

        let fresh = pipeline();
        assert!(fresh.load_model(&store).await.unwrap());
        let probe = vec![1.0; 20];
        let a = trained.classifier().lock().await.predict(&probe).unwrap();
        let b = fresh.classifier().lock().await.predict(&probe).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn load_from_empty_store_keeps_current_model() {
        let p = pipeline();
        assert!(!p.load_model(&MemoryModelStore::new()).await.unwrap());
        assert!(!p.classifier().lock().await.is_trained());
    }
}
