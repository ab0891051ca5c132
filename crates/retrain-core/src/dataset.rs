//! Reading the exported training dataset.
//!
//! The export collaborator writes a CSV with at least a `message` column and
//! a binary `is_phishing` label, usually UTF-8 with a byte-order mark.

use crate::error::{Result, RetrainError};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

pub const MESSAGE_COLUMN: &str = "message";
pub const LABEL_COLUMN: &str = "is_phishing";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Class counts derived from a dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total: u64,
    /// Rows labelled phishing.
    pub positive: u64,
    /// Rows labelled normal.
    pub negative: u64,
}

impl DatasetStats {
    pub fn new(total: u64, positive: u64, negative: u64) -> Self {
        Self {
            total,
            positive,
            negative,
        }
    }

    pub fn positive_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.positive as f64 / self.total as f64
        }
    }
}

pub fn read_stats(path: &Path) -> Result<DatasetStats> {
    let mut data = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut data)?;
    stats_from_bytes(&data)
}

pub fn stats_from_bytes(data: &[u8]) -> Result<DatasetStats> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(data);

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| RetrainError::Dataset(format!("missing '{name}' column")))
    };
    column(MESSAGE_COLUMN)?;
    let label_idx = column(LABEL_COLUMN)?;

    let mut stats = DatasetStats::new(0, 0, 0);
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let raw = record.get(label_idx).unwrap_or("");
        match parse_label(raw) {
            Some(true) => stats.positive += 1,
            Some(false) => stats.negative += 1,
            None => {
                return Err(RetrainError::Dataset(format!(
                    "row {}: label '{raw}' is not 0 or 1",
                    row + 1
                )))
            }
        }
        stats.total += 1;
    }
    Ok(stats)
}

/// A missing label (blank or `NaN`) counts as normal.
fn parse_label(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Some(true),
        "0" | "0.0" | "false" | "" | "nan" => Some(false),
        _ => None,
    }
}
