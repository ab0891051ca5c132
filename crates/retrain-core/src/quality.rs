use crate::dataset::{self, DatasetStats};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const MIN_TOTAL_ROWS: u64 = 100;
pub const MIN_CLASS_ROWS: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityIssue {
    InsufficientVolume { total: u64 },
    ClassImbalance { positive: u64, negative: u64 },
    /// The dataset could not be read, so its quality is unknown.
    Unreadable { reason: String },
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityIssue::InsufficientVolume { total } => write!(
                f,
                "insufficient volume: {total} rows (minimum {MIN_TOTAL_ROWS})"
            ),
            QualityIssue::ClassImbalance { positive, negative } => write!(
                f,
                "class imbalance: {positive} phishing / {negative} normal (minimum {MIN_CLASS_ROWS} each)"
            ),
            QualityIssue::Unreadable { reason } => write!(f, "dataset unreadable: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum QualityVerdict {
    Pass,
    Fail(QualityIssue),
}

/// Apply the fixed thresholds. The first failing rule wins.
pub fn evaluate(stats: &DatasetStats) -> QualityVerdict {
    if stats.total < MIN_TOTAL_ROWS {
        return QualityVerdict::Fail(QualityIssue::InsufficientVolume { total: stats.total });
    }
    if stats.positive < MIN_CLASS_ROWS || stats.negative < MIN_CLASS_ROWS {
        return QualityVerdict::Fail(QualityIssue::ClassImbalance {
            positive: stats.positive,
            negative: stats.negative,
        });
    }
    QualityVerdict::Pass
}

/// Read the dataset at `path` and evaluate it.
///
/// A read or parse error becomes a soft `Unreadable` failure so the caller
/// can still escalate it to a decision point.
pub fn inspect(path: &Path) -> (Option<DatasetStats>, QualityVerdict) {
    match dataset::read_stats(path) {
        Ok(stats) => (Some(stats), evaluate(&stats)),
        Err(e) => (
            None,
            QualityVerdict::Fail(QualityIssue::Unreadable {
                reason: e.to_string(),
            }),
        ),
    }
}
