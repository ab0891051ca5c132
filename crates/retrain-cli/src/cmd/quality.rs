use crate::output::{print_fields, print_json};
use anyhow::Context;
use retrain_core::{
    config::Config,
    quality::{self, QualityVerdict},
};
use std::path::{Path, PathBuf};

pub fn run(root: &Path, dataset: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let path: PathBuf = match dataset {
        Some(p) => p.to_path_buf(),
        None => Config::load(root)
            .context("no dataset given and no config to take the export output from")?
            .export_output_path(root),
    };

    let (stats, verdict) = quality::inspect(&path);

    if json {
        print_json(&serde_json::json!({
            "dataset": path,
            "stats": stats,
            "verdict": verdict,
        }))?;
    } else {
        let mut fields = vec![("dataset", path.display().to_string())];
        if let Some(s) = &stats {
            fields.push(("rows", s.total.to_string()));
            fields.push((
                "phishing",
                format!("{} ({:.1}%)", s.positive, s.positive_ratio() * 100.0),
            ));
            fields.push(("normal", s.negative.to_string()));
        }
        let status = match &verdict {
            QualityVerdict::Pass => "pass".to_string(),
            QualityVerdict::Fail(issue) => format!("fail ({issue})"),
        };
        fields.push(("quality", status));
        print_fields(&fields);
    }

    if let QualityVerdict::Fail(issue) = verdict {
        anyhow::bail!("dataset failed the quality gate: {issue}");
    }
    Ok(())
}
