//! The deployable model unit and the directory that holds the live one.

use crate::config::ArtifactLayout;
use crate::error::{Result, RetrainError};
use crate::paths;
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

/// Token → integer id mapping written by the trainer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary(BTreeMap<String, u32>);

impl Vocabulary {
    /// Id reserved for tokens the vocabulary does not contain.
    pub const OOV_ID: u32 = 1;

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode(&self, token: &str) -> u32 {
        self.0.get(token).copied().unwrap_or(Self::OOV_ID)
    }
}

impl FromIterator<(String, u32)> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub max_sequence_length: u32,
    pub vocab_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Trainer-specific keys (embedding_dim, max_words, ...) kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// An immutable snapshot of the live artifact, loaded once.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub dir: PathBuf,
    pub payload: PathBuf,
    pub vocabulary: Vocabulary,
    pub config: ModelConfig,
    pub deployed_at: Option<DateTime<FixedOffset>>,
}

// ---------------------------------------------------------------------------
// ArtifactStore
// ---------------------------------------------------------------------------

/// Owns the on-disk directory of the one live artifact.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    layout: ArtifactLayout,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, layout: ArtifactLayout) -> Self {
        Self {
            dir: dir.into(),
            layout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    pub fn payload_path(&self) -> PathBuf {
        self.dir.join(&self.layout.model_payload)
    }

    pub fn vocabulary_path(&self) -> PathBuf {
        self.dir.join(&self.layout.vocabulary)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(&self.layout.config)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.dir.join(paths::DEPLOYED_MARKER)
    }

    /// Names of required members that are absent, in layout order.
    pub fn missing_members(&self) -> Vec<String> {
        self.layout
            .members()
            .iter()
            .filter(|m| !self.dir.join(m).exists())
            .map(|m| m.to_string())
            .collect()
    }

    pub fn read_vocabulary(&self) -> Result<Vocabulary> {
        let data = std::fs::read_to_string(self.vocabulary_path())?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn read_config(&self) -> Result<ModelConfig> {
        let data = std::fs::read_to_string(self.config_path())?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn load(&self) -> Result<Artifact> {
        if !self.exists() {
            return Err(RetrainError::NoArtifact(self.dir.clone()));
        }
        Ok(Artifact {
            dir: self.dir.clone(),
            payload: self.payload_path(),
            vocabulary: self.read_vocabulary()?,
            config: self.read_config()?,
            deployed_at: self.deployed_at()?,
        })
    }

    pub fn deployed_at(&self) -> Result<Option<DateTime<FixedOffset>>> {
        let marker = self.marker_path();
        if !marker.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(marker)?;
        let ts = raw.lines().last().unwrap_or("").trim();
        Ok(DateTime::parse_from_rfc3339(ts).ok())
    }

    /// Mark the artifact as deployed at `at`.
    ///
    /// Each stamp appends one RFC 3339 line; the last line is the current
    /// deployment time.
    pub fn stamp_deployed(&self, at: DateTime<Local>) -> Result<()> {
        if !self.exists() {
            return Err(RetrainError::NoArtifact(self.dir.clone()));
        }
        crate::io::append_text(&self.marker_path(), &format!("{}\n", at.to_rfc3339()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    /// Write a well-formed artifact into `dir`.
    pub(crate) fn write_artifact(dir: &Path, version: &str) {
        std::fs::create_dir_all(dir.join("variables")).unwrap();
        std::fs::write(dir.join("saved_model.pb"), format!("pb-{version}")).unwrap();
        std::fs::write(dir.join("variables/variables.index"), version).unwrap();
        std::fs::write(
            dir.join("vocabulary.json"),
            r#"{"<OOV>": 1, "계좌": 2, "click": 3}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("config.json"),
            format!(
                r#"{{"max_sequence_length": 100, "vocab_size": 3, "version": "{version}", "embedding_dim": 128}}"#
            ),
        )
        .unwrap();
    }

    fn store(dir: &Path) -> ArtifactStore {
        ArtifactStore::new(dir, ArtifactLayout::default())
    }

    #[test]
    fn load_complete_artifact() {
        let dir = TempDir::new().unwrap();
        write_artifact(dir.path(), "1.2.0");
        let artifact = store(dir.path()).load().unwrap();
        assert_eq!(artifact.vocabulary.len(), 3);
        assert_eq!(artifact.config.max_sequence_length, 100);
        assert_eq!(artifact.config.version.as_deref(), Some("1.2.0"));
        assert_eq!(artifact.config.extra["embedding_dim"], 128);
        assert!(artifact.deployed_at.is_none());
    }

    #[test]
    fn config_without_version_still_loads() {
        let dir = TempDir::new().unwrap();
        write_artifact(dir.path(), "x");
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"max_sequence_length": 50, "vocab_size": 9}"#,
        )
        .unwrap();
        let cfg = store(dir.path()).read_config().unwrap();
        assert!(cfg.version.is_none());
    }

    #[test]
    fn unknown_tokens_encode_as_oov() {
        let vocab: Vocabulary = [("phish".to_string(), 7)].into_iter().collect();
        assert_eq!(vocab.encode("phish"), 7);
        assert_eq!(vocab.encode("unseen"), Vocabulary::OOV_ID);
    }

    #[test]
    fn missing_members_in_layout_order() {
        let dir = TempDir::new().unwrap();
        write_artifact(dir.path(), "1");
        std::fs::remove_file(dir.path().join("config.json")).unwrap();
        std::fs::remove_file(dir.path().join("saved_model.pb")).unwrap();
        assert_eq!(
            store(dir.path()).missing_members(),
            vec!["saved_model.pb".to_string(), "config.json".to_string()]
        );
    }

    #[test]
    fn stamp_then_read_deployment_time() {
        let dir = TempDir::new().unwrap();
        write_artifact(dir.path(), "1");
        let s = store(dir.path());
        let first = Local.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap();
        let second = Local.with_ymd_and_hms(2026, 10, 2, 8, 0, 0).unwrap();
        s.stamp_deployed(first).unwrap();
        s.stamp_deployed(second).unwrap();
        assert_eq!(s.deployed_at().unwrap().unwrap(), second.fixed_offset());
    }

    #[test]
    fn stamp_requires_artifact() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir.path().join("absent"));
        assert!(matches!(
            s.stamp_deployed(Local::now()),
            Err(RetrainError::NoArtifact(_))
        ));
    }
}
