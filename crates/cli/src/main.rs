#![deny(warnings)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use speech_emotion_core::config::{
    resolve_optional_path, resolve_path_with_default, AppConfig, Env, StdEnv, TrainingOptions,
    DEFAULT_DECODE_CONCURRENCY, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE, DEFAULT_MODEL_FILE,
    ENV_DATASET_DIR, ENV_MODEL_PATH,
};
use speech_emotion_core::corpus::scan_dataset;
use speech_emotion_core::decode::{AudioDecoder, SymphoniaDecoder};
use speech_emotion_core::emotion::{EmotionClassifier, FileModelStore};
use speech_emotion_core::features::{FeatureExtractor, FEATURE_NAMES};
use speech_emotion_core::pipeline::{Pipeline, PipelineConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "speech-emotion")]
#[command(about = "Speech emotion recognition from short audio clips")]
struct Args {
    /// Saved model parameters (JSON).
    #[arg(long, global = true, env = ENV_MODEL_PATH)]
    model: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict the emotion of each clip.
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the named feature vector of one clip.
    Features { file: PathBuf },
    /// Train on a RAVDESS-style corpus and save the model.
    Train {
        #[arg(long)]
        dataset: Option<PathBuf>,

        #[arg(long, default_value_t = DEFAULT_EPOCHS)]
        epochs: usize,

        #[arg(long, default_value_t = DEFAULT_LEARNING_RATE)]
        learning_rate: f64,

        #[arg(long, default_value_t = DEFAULT_DECODE_CONCURRENCY)]
        concurrency: usize,
    },
    /// Print the classifier's architecture and whether it is trained.
    Describe,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(&args, &env)?;
    tracing::debug!(model = %cfg.model_path.display(), "config loaded");

    match args.command {
        Command::Analyze { files } => run_analyze(cfg, files).await,
        Command::Features { file } => run_features(cfg, file).await,
        Command::Train { .. } => run_train(cfg).await,
        Command::Describe => run_describe(cfg).await,
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    // stdout carries JSON results
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(args: &Args, env: &impl Env) -> anyhow::Result<AppConfig> {
    let mut cfg = AppConfig {
        model_path: resolve_path_with_default(
            args.model.clone(),
            ENV_MODEL_PATH,
            env,
            DEFAULT_MODEL_FILE,
        ),
        ..AppConfig::default()
    };

    if let Command::Train {
        dataset,
        epochs,
        learning_rate,
        concurrency,
    } = &args.command
    {
        cfg.dataset_dir = resolve_optional_path(dataset.clone(), ENV_DATASET_DIR, env);
        cfg.training = TrainingOptions::new(*epochs, *learning_rate)?;
        cfg.decode_concurrency = *concurrency;
    }
    Ok(cfg)
}

async fn load_pipeline(
    cfg: &AppConfig,
) -> anyhow::Result<(Pipeline<SymphoniaDecoder>, FileModelStore)> {
    let pipeline = Pipeline::new(
        SymphoniaDecoder::new(),
        EmotionClassifier::new(),
        PipelineConfig::from_app(cfg),
    );
    let store = FileModelStore::new(&cfg.model_path);
    let loaded = pipeline
        .load_model(&store)
        .await
        .with_context(|| format!("loading model from {}", cfg.model_path.display()))?;
    if !loaded {
        tracing::info!(
            path = %cfg.model_path.display(),
            "no saved model; predictions use the rule-based fallback"
        );
    }
    Ok((pipeline, store))
}

async fn run_analyze(cfg: AppConfig, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let (pipeline, _) = load_pipeline(&cfg).await?;

    let mut failed = 0usize;
    for file in files {
        match pipeline.analyze(file.clone()).await {
            Ok(analysis) => println!("{}", serde_json::to_string(&analysis)?),
            Err(e) => {
                tracing::error!(path = %file.display(), error = %e, "analysis failed");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} clip(s) could not be analyzed");
    }
    Ok(())
}

async fn run_features(cfg: AppConfig, file: PathBuf) -> anyhow::Result<()> {
    let clip = SymphoniaDecoder::new()
        .decode_file(file.clone())
        .await
        .with_context(|| format!("decoding {}", file.display()))?;
    let extractor = FeatureExtractor::new(cfg.extraction);
    let vector =
        tokio::task::spawn_blocking(move || extractor.extract(&clip.samples, clip.sample_rate))
            .await
            .context("feature extraction task failed")?;

    let named: serde_json::Map<String, serde_json::Value> = FEATURE_NAMES
        .iter()
        .zip(vector.as_slice())
        .map(|(name, value)| ((*name).to_owned(), serde_json::Value::from(*value)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&named)?);
    Ok(())
}

async fn run_train(cfg: AppConfig) -> anyhow::Result<()> {
    let dataset = cfg
        .dataset_dir
        .clone()
        .with_context(|| format!("--dataset or {ENV_DATASET_DIR} is required for training"))?;
    let clips = tokio::task::spawn_blocking(move || scan_dataset(&dataset))
        .await
        .context("dataset scan task failed")??;
    if clips.is_empty() {
        anyhow::bail!("no labelled clips found");
    }

    let (pipeline, store) = load_pipeline(&cfg).await?;
    let samples = pipeline.build_training_set(&clips).await;

    let task = pipeline.spawn_training(samples, cfg.training);
    let cancel = task.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current epoch");
            cancel.cancel();
        }
    });
    let report = task.join().await?;
    interrupt.abort();

    if report.epochs_completed > 0 {
        pipeline
            .save_model(&store)
            .await
            .with_context(|| format!("saving model to {}", cfg.model_path.display()))?;
    } else {
        tracing::warn!("no epoch completed; model not saved");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_describe(cfg: AppConfig) -> anyhow::Result<()> {
    let (pipeline, _) = load_pipeline(&cfg).await?;
    let description = pipeline.classifier().lock().await.describe();
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use speech_emotion_core::config::MapEnv;

    #[test]
    fn train_flags_flow_into_config() {
        let args = Args::parse_from([
            "speech-emotion",
            "train",
            "--dataset",
            "/data/ravdess",
            "--epochs",
            "5",
            "--learning-rate",
            "0.1",
        ]);
        let cfg = build_config(&args, &MapEnv::default()).unwrap();
        assert_eq!(cfg.dataset_dir, Some(PathBuf::from("/data/ravdess")));
        assert_eq!(cfg.training.epochs, 5);
        assert!((cfg.training.learning_rate - 0.1).abs() < 1e-12);
    }

    #[test]
    fn dataset_falls_back_to_env() {
        let args = Args::parse_from(["speech-emotion", "train"]);
        let env = MapEnv::default().with_var(ENV_DATASET_DIR, "/env/data");
        let cfg = build_config(&args, &env).unwrap();
        assert_eq!(cfg.dataset_dir, Some(PathBuf::from("/env/data")));
    }

    #[test]
    fn zero_epochs_rejected() {
        let args = Args::parse_from(["speech-emotion", "train", "--epochs", "0"]);
        assert!(build_config(&args, &MapEnv::default()).is_err());
    }

    #[test]
    fn global_model_flag_after_subcommand() {
        let args = Args::parse_from(["speech-emotion", "describe", "--model", "/m/model.json"]);
        let cfg = build_config(&args, &MapEnv::default()).unwrap();
        assert_eq!(cfg.model_path, PathBuf::from("/m/model.json"));
    }

    #[test]
    fn analyze_requires_files() {
        assert!(Args::try_parse_from(["speech-emotion", "analyze"]).is_err());
    }
}
