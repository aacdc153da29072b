//! RAVDESS-style labelled corpus.
//!
//! File names carry seven dash-separated two-digit fields:
//! `modality-channel-emotion-intensity-statement-repetition-actor`, e.g.
//! `03-01-05-01-02-01-12.wav` is an audio-only speech clip of actor 12 saying
//! statement 2 with normal-intensity anger.

use crate::emotion::Emotion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg"];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Normal,
    Strong,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClipMetadata {
    pub modality: u8,
    pub vocal_channel: u8,
    pub emotion: Emotion,
    pub intensity: Intensity,
    pub statement: u8,
    pub repetition: u8,
    pub actor: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabeledClip {
    pub path: PathBuf,
    pub metadata: ClipMetadata,
}

#[derive(thiserror::Error, Debug)]
pub enum CorpusError {
    #[error("expected 7 dash-separated fields in {0:?}")]
    FieldCount(String),

    #[error("field {field} of {name:?} is not a two-digit code: {value:?}")]
    BadField {
        name: String,
        field: &'static str,
        value: String,
    },

    #[error("unknown emotion code {code:?} in {name:?}")]
    UnknownEmotion { name: String, code: String },

    #[error("unknown intensity code {code:?} in {name:?}")]
    UnknownIntensity { name: String, code: String },

    #[error("cannot scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

const FIELD_NAMES: [&str; 7] = [
    "modality",
    "vocal_channel",
    "emotion",
    "intensity",
    "statement",
    "repetition",
    "actor",
];

/// Parses the stem of `file_name` (extension optional).
pub fn parse_file_name(file_name: &str) -> Result<ClipMetadata, CorpusError> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let fields: Vec<&str> = stem.split('-').collect();
    if fields.len() != FIELD_NAMES.len() {
        return Err(CorpusError::FieldCount(file_name.to_owned()));
    }

    let mut codes = [0u8; 7];
    for ((code, raw), field) in codes.iter_mut().zip(&fields).zip(FIELD_NAMES) {
        if raw.len() != 2 {
            return Err(bad_field(file_name, field, raw));
        }
        *code = raw.parse().map_err(|_| bad_field(file_name, field, raw))?;
    }

    let emotion = Emotion::from_code(fields[2]).ok_or_else(|| CorpusError::UnknownEmotion {
        name: file_name.to_owned(),
        code: fields[2].to_owned(),
    })?;
    let intensity = match fields[3] {
        "01" => Intensity::Normal,
        "02" => Intensity::Strong,
        other => {
            return Err(CorpusError::UnknownIntensity {
                name: file_name.to_owned(),
                code: other.to_owned(),
            })
        }
    };

    Ok(ClipMetadata {
        modality: codes[0],
        vocal_channel: codes[1],
        emotion,
        intensity,
        statement: codes[4],
        repetition: codes[5],
        actor: codes[6],
    })
}

fn bad_field(name: &str, field: &'static str, value: &str) -> CorpusError {
    CorpusError::BadField {
        name: name.to_owned(),
        field,
        value: value.to_owned(),
    }
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
}

/// Recursively collects audio files under `root` whose names parse, sorted
/// by path. Files with other names are skipped.
pub fn scan_dataset(root: &Path) -> Result<Vec<LabeledClip>, CorpusError> {
    let mut clips = Vec::new();
    let mut pending = vec![root.to_owned()];

    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|source| CorpusError::Io {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| CorpusError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            if !is_audio(&path) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match parse_file_name(name) {
                Ok(metadata) => clips.push(LabeledClip { path, metadata }),
                Err(e) => tracing::debug!(error = %e, "skipping unlabelled file"),
            }
        }
    }

    clips.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!(root = %root.display(), clips = clips.len(), "dataset scanned");
    Ok(clips)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ravdess_name() {
        let m = parse_file_name("03-01-05-01-02-01-12.wav").unwrap();
        assert_eq!(
            m,
            ClipMetadata {
                modality: 3,
                vocal_channel: 1,
                emotion: Emotion::Angry,
                intensity: Intensity::Normal,
                statement: 2,
                repetition: 1,
                actor: 12,
            }
        );
    }

    #[test]
    fn every_emotion_code_maps() {
        for (i, want) in Emotion::ALL.iter().enumerate() {
            let name = format!("03-01-{:02}-02-01-02-01.wav", i + 1);
            let m = parse_file_name(&name).unwrap();
            assert_eq!(m.emotion, *want);
            assert_eq!(m.intensity, Intensity::Strong);
        }
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(matches!(
            parse_file_name("03-01-05.wav"),
            Err(CorpusError::FieldCount(_))
        ));
        assert!(matches!(
            parse_file_name("03-01-09-01-02-01-12.wav"),
            Err(CorpusError::UnknownEmotion { .. })
        ));
        assert!(matches!(
            parse_file_name("03-01-05-03-02-01-12.wav"),
            Err(CorpusError::UnknownIntensity { .. })
        ));
        assert!(matches!(
            parse_file_name("03-01-05-01-xx-01-12.wav"),
            Err(CorpusError::BadField { field: "statement", .. })
        ));
        assert!(matches!(
            parse_file_name("3-01-05-01-02-01-12.wav"),
            Err(CorpusError::BadField { field: "modality", .. })
        ));
    }

    #[test]
    fn scan_walks_subdirectories_and_skips_noise() {
        let root = std::env::temp_dir().join(format!("speech-emotion-corpus-{}", std::process::id()));
        let actor = root.join("Actor_01");
        std::fs::create_dir_all(&actor).unwrap();
        std::fs::write(actor.join("03-01-04-01-01-01-01.wav"), b"").unwrap();
        std::fs::write(actor.join("03-01-02-02-01-01-01.WAV"), b"").unwrap();
        std::fs::write(actor.join("notes.txt"), b"").unwrap();
        std::fs::write(actor.join("random.wav"), b"").unwrap();
        std::fs::write(root.join("03-01-08-01-01-01-02.mp3"), b"").unwrap();

        let clips = scan_dataset(&root).unwrap();
        let emotions: Vec<Emotion> = clips.iter().map(|c| c.metadata.emotion).collect();
        // "03-..." sorts before "Actor_01"
        assert_eq!(emotions, [Emotion::Surprised, Emotion::Calm, Emotion::Sad]);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn scan_of_missing_dir_fails() {
        let err = scan_dataset(Path::new("/no/such/dataset")).unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
    }
}
