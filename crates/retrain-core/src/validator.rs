//! Structural and loadability checks on a freshly trained artifact.
//!
//! Checks run in order and the first failure decides the verdict:
//! directory exists → required members exist → payload loads →
//! vocabulary is a non-empty mapping. Model quality is not assessed.

use crate::artifact::ArtifactStore;
use crate::command::{CommandRunner, CommandSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "kebab-case")]
pub enum InvalidReason {
    MissingDirectory(PathBuf),
    MissingMember(String),
    LoadFailure(String),
    EmptyVocabulary,
}

impl InvalidReason {
    pub fn code(&self) -> &'static str {
        match self {
            InvalidReason::MissingDirectory(_) => "missing-directory",
            InvalidReason::MissingMember(_) => "missing-member",
            InvalidReason::LoadFailure(_) => "load-failure",
            InvalidReason::EmptyVocabulary => "empty-vocabulary",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::MissingDirectory(p) => {
                write!(f, "{}: {}", self.code(), p.display())
            }
            InvalidReason::MissingMember(m) => write!(f, "{}: {m}", self.code()),
            InvalidReason::LoadFailure(e) => write!(f, "{}: {e}", self.code()),
            InvalidReason::EmptyVocabulary => f.write_str(self.code()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Validation {
    Valid,
    Invalid(InvalidReason),
}

// ---------------------------------------------------------------------------
// ModelLoader
// ---------------------------------------------------------------------------

/// Proves the serving runtime can load a model payload.
pub trait ModelLoader {
    fn load(&self, payload: &Path) -> Result<(), String>;
}

/// Loader that only proves the payload is present and readable.
///
/// Used when no serving-runtime probe is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadableLoader;

impl ModelLoader for ReadableLoader {
    fn load(&self, payload: &Path) -> Result<(), String> {
        if payload.is_dir() {
            let mut entries = std::fs::read_dir(payload).map_err(|e| e.to_string())?;
            return match entries.next() {
                Some(_) => Ok(()),
                None => Err(format!("{} is an empty directory", payload.display())),
            };
        }
        let mut file = std::fs::File::open(payload).map_err(|e| e.to_string())?;
        let mut first = [0u8; 1];
        match file.read(&mut first) {
            Ok(0) => Err(format!("{} is empty", payload.display())),
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Loader that delegates to an external probe command (for example a
/// script that calls the serving runtime's load function). Exit 0 = loaded.
pub struct ProbeLoader<'a> {
    runner: &'a dyn CommandRunner,
    spec: CommandSpec,
}

impl<'a> ProbeLoader<'a> {
    pub fn new(runner: &'a dyn CommandRunner, spec: CommandSpec) -> Self {
        Self { runner, spec }
    }
}

impl ModelLoader for ProbeLoader<'_> {
    fn load(&self, _payload: &Path) -> Result<(), String> {
        let mut output = Vec::new();
        let status = self
            .runner
            .run(&self.spec, &mut output)
            .map_err(|e| e.to_string())?;
        if status.success() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&output);
        let tail: Vec<&str> = text.lines().rev().take(5).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        Err(format!("probe {status}: {}", tail.join(" | ")))
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn validate(store: &ArtifactStore, loader: &dyn ModelLoader) -> Validation {
    if !store.exists() {
        return Validation::Invalid(InvalidReason::MissingDirectory(store.dir().to_path_buf()));
    }

    if let Some(member) = store.missing_members().into_iter().next() {
        return Validation::Invalid(InvalidReason::MissingMember(member));
    }

    if let Err(e) = loader.load(&store.payload_path()) {
        return Validation::Invalid(InvalidReason::LoadFailure(e));
    }

    match store.read_vocabulary() {
        Ok(vocab) if vocab.is_empty() => Validation::Invalid(InvalidReason::EmptyVocabulary),
        Ok(_) => Validation::Valid,
        Err(e) => Validation::Invalid(InvalidReason::LoadFailure(format!("vocabulary: {e}"))),
    }
}
