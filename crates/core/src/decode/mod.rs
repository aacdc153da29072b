use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded mono PCM in [-1, 1].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PcmClip {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl PcmClip {
    pub fn duration(&self) -> Duration {
        duration_from_sample_count(self.sample_rate, 1, self.samples.len())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported audio in {path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    #[error("{path} has no decodable audio track")]
    NoTrack { path: PathBuf },

    #[error("decoding {path} failed: {reason}")]
    Codec { path: PathBuf, reason: String },

    #[error("{path} decoded to zero samples")]
    Empty { path: PathBuf },

    #[error("decode task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

pub trait AudioDecoder: Send + Sync {
    fn decode_file(&self, path: PathBuf) -> BoxFuture<'_, Result<PcmClip>>;
}

/// Container/codec decoding through symphonia, down-mixed to mono. Runs on
/// the blocking pool.
#[derive(Clone, Debug, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode_blocking(path: &Path) -> Result<PcmClip> {
        let file = std::fs::File::open(path).map_err(|source| DecodeError::Io {
            path: path.to_owned(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::Unsupported {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| DecodeError::NoTrack {
                path: path.to_owned(),
            })?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| DecodeError::Unsupported {
                path: path.to_owned(),
                reason: "unknown sample rate".to_owned(),
            })?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Unsupported {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(DecodeError::Codec {
                        path: path.to_owned(),
                        reason: e.to_string(),
                    })
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(reason)) => {
                    tracing::warn!(path = %path.display(), reason, "skipping corrupt packet");
                    continue;
                }
                Err(e) => {
                    return Err(DecodeError::Codec {
                        path: path.to_owned(),
                        reason: e.to_string(),
                    })
                }
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);
            samples.extend(downmix_interleaved(buf.samples(), channels));
        }

        if samples.is_empty() {
            return Err(DecodeError::Empty {
                path: path.to_owned(),
            });
        }

        tracing::debug!(
            path = %path.display(),
            sample_rate,
            samples = samples.len(),
            "decoded clip"
        );
        Ok(PcmClip {
            sample_rate,
            samples,
        })
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode_file(&self, path: PathBuf) -> BoxFuture<'_, Result<PcmClip>> {
        async move {
            tokio::task::spawn_blocking(move || Self::decode_blocking(&path))
                .await
                .map_err(|e| DecodeError::Task(e.to_string()))?
        }
        .boxed()
    }
}

/// Averages interleaved frames of `channels` samples into one channel.
pub fn downmix_interleaved(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

pub fn i16_to_f32_pcm(samples: &[i16]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let scale = 1.0f32 / 32768.0f32;
    samples.iter().map(|&s| f32::from(s) * scale).collect()
}

pub fn duration_from_sample_count(
    sample_rate_hz: u32,
    channels: u16,
    sample_count: usize,
) -> Duration {
    if sample_rate_hz == 0 || channels == 0 {
        return Duration::from_secs(0);
    }
    let frames = sample_count / usize::from(channels);
    let micros = (u128::from(frames as u64) * 1_000_000u128) / u128::from(sample_rate_hz);
    Duration::from_micros(micros.min(u128::from(u64::MAX)) as u64)
}
