use crate::error::RetrainError;
use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Position of a run in the retraining state machine.
///
/// Forward path: `Setup → Backup → Export → QualityGate → Train → Validate →
/// Deploy → Completed | Declined`. Failures end in `Failed`, or pass through
/// `RollingBack → RolledBack` when the artifact directory may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    Backup,
    Export,
    QualityGate,
    Train,
    Validate,
    Deploy,
    Completed,
    Declined,
    Failed,
    RollingBack,
    RolledBack,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Backup => "backup",
            Stage::Export => "export",
            Stage::QualityGate => "quality_gate",
            Stage::Train => "train",
            Stage::Validate => "validate",
            Stage::Deploy => "deploy",
            Stage::Completed => "completed",
            Stage::Declined => "declined",
            Stage::Failed => "failed",
            Stage::RollingBack => "rolling_back",
            Stage::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Stage::Completed | Stage::Declined | Stage::Failed | Stage::RolledBack
        )
    }

    /// Stages that may write into the artifact directory.
    pub fn mutates_artifact(self) -> bool {
        matches!(self, Stage::Train | Stage::Validate | Stage::Deploy)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
    Declined,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::Declined => "declined",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

const RUN_ID_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

static RUN_ID_RE: OnceLock<Regex> = OnceLock::new();

fn run_id_re() -> &'static Regex {
    RUN_ID_RE.get_or_init(|| Regex::new(r"^\d{8}_\d{6}_\d{3}$").unwrap())
}

/// Timestamp-derived identifier shared by a run's backup, log and report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn from_time(at: DateTime<Local>) -> Self {
        Self(at.format(RUN_ID_FORMAT).to_string())
    }

    pub fn now() -> Self {
        Self::from_time(Local::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = RetrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !run_id_re().is_match(s) {
            return Err(RetrainError::InvalidRunId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn run_id_format() {
        let at = Local.with_ymd_and_hms(2026, 10, 17, 9, 30, 5).unwrap();
        assert_eq!(RunId::from_time(at).as_str(), "20261017_093005_000");
    }

    #[test]
    fn run_id_parse_rejects_traversal() {
        for bad in ["", "../etc", "20261017_093005", "20261017_093005_000/..", "x"] {
            assert!(bad.parse::<RunId>().is_err(), "expected invalid: {bad}");
        }
        assert!("20261017_093005_123".parse::<RunId>().is_ok());
    }

    #[test]
    fn terminal_stages() {
        assert!(Stage::Completed.is_terminal());
        assert!(Stage::RolledBack.is_terminal());
        assert!(!Stage::RollingBack.is_terminal());
        assert!(!Stage::Export.is_terminal());
    }

    #[test]
    fn only_train_onward_mutates() {
        assert!(!Stage::Backup.mutates_artifact());
        assert!(!Stage::Export.mutates_artifact());
        assert!(!Stage::QualityGate.mutates_artifact());
        assert!(Stage::Train.mutates_artifact());
        assert!(Stage::Validate.mutates_artifact());
    }

    #[test]
    fn stage_serializes_snake_case() {
        let json = serde_json::to_string(&Stage::QualityGate).unwrap();
        assert_eq!(json, "\"quality_gate\"");
        let json = serde_json::to_string(&Outcome::Declined).unwrap();
        assert_eq!(json, "\"declined\"");
    }
}
