//! Artifact persistence
//!
//! Serializes fitted feature plans and trained models to disk, wrapped in an
//! envelope that records what was stored and when.

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Artifact envelope version written by this crate
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// On-disk encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArtifactFormat {
    /// Pretty-printed JSON (portable, human-readable)
    #[default]
    Json,
    /// bincode (compact)
    Binary,
}

impl ArtifactFormat {
    /// Guess the encoding from a file extension (`.json` is JSON, anything else binary)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ArtifactFormat::Json,
            _ => ArtifactFormat::Binary,
        }
    }
}

/// What an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Preprocessor,
    Model,
}

/// Descriptive header stored alongside every payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub format_version: u32,
    pub kind: ArtifactKind,
    /// Model name from the catalog, or the plan name
    pub name: String,
    /// RFC 3339 timestamp
    pub created_at: String,
    pub crate_version: String,
    /// Held-out R² for models
    pub score: Option<f64>,
    /// Names of the matrix columns the payload consumes or produces
    pub feature_names: Vec<String>,
}

impl ArtifactMetadata {
    pub fn new(kind: ArtifactKind, name: impl Into<String>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            kind,
            name: name.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            score: None,
            feature_names: Vec::new(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }
}

/// A stored object together with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub metadata: ArtifactMetadata,
    pub payload: T,
}

impl<T> Artifact<T> {
    pub fn new(metadata: ArtifactMetadata, payload: T) -> Self {
        Self { metadata, payload }
    }
}

/// Leading part of an artifact, readable without knowing the payload type
#[derive(Deserialize)]
struct ArtifactHeader {
    metadata: ArtifactMetadata,
}

/// File-backed store for artifacts.
///
/// Writes go to a temporary sibling file that is renamed over the target,
/// so an existing artifact is replaced whole or not at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactStore {
    format: ArtifactFormat,
}

impl ArtifactStore {
    pub fn new(format: ArtifactFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    /// Serialize `object` to `path`, creating parent directories and
    /// overwriting any previous file
    pub fn store<T: Serialize>(&self, path: impl AsRef<Path>, object: &T) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = temporary_path(path);
        let written = self.write_to(&tmp_path, object);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        fs::rename(&tmp_path, path)?;

        debug!(path = %path.display(), format = ?self.format, "Stored artifact");
        Ok(())
    }

    /// Deserialize an object previously written with [`ArtifactStore::store`]
    pub fn load<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let bytes = read_all(path.as_ref())?;
        match self.format {
            ArtifactFormat::Json => Ok(serde_json::from_slice(&bytes)?),
            ArtifactFormat::Binary => Ok(bincode::deserialize(&bytes)?),
        }
    }

    /// Read only the metadata of an artifact
    pub fn load_metadata(&self, path: impl AsRef<Path>) -> Result<ArtifactMetadata> {
        let header: ArtifactHeader = self.load(path)?;
        if header.metadata.format_version > ARTIFACT_FORMAT_VERSION {
            return Err(PipelineError::SerializationError(format!(
                "artifact format version {} is newer than supported version {}",
                header.metadata.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        Ok(header.metadata)
    }

    fn write_to<T: Serialize>(&self, path: &Path, object: &T) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        match self.format {
            ArtifactFormat::Json => serde_json::to_writer_pretty(&mut writer, object)?,
            ArtifactFormat::Binary => bincode::serialize_into(&mut writer, object)?,
        }
        writer.flush()?;
        Ok(())
    }
}

fn read_all(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
