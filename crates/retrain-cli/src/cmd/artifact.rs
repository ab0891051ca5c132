use crate::output::{print_fields, print_json};
use anyhow::Context;
use clap::Subcommand;
use retrain_core::{artifact::ArtifactStore, config::Config};
use std::path::Path;

#[derive(Subcommand)]
pub enum ArtifactSubcommand {
    /// Show version, vocabulary size and deployment time of the current artifact
    Show,
}

pub fn run(root: &Path, subcmd: ArtifactSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ArtifactSubcommand::Show => show(root, json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let store = ArtifactStore::new(config.artifact_path(root), config.artifact.clone());

    let missing = store.missing_members();
    if !missing.is_empty() && store.exists() {
        anyhow::bail!(
            "artifact at {} is incomplete: missing {}",
            store.dir().display(),
            missing.join(", ")
        );
    }
    let artifact = store.load().context("failed to load artifact")?;

    if json {
        return print_json(&serde_json::json!({
            "dir": artifact.dir,
            "payload": artifact.payload,
            "version": artifact.config.version,
            "max_sequence_length": artifact.config.max_sequence_length,
            "vocab_size": artifact.config.vocab_size,
            "vocabulary_entries": artifact.vocabulary.len(),
            "deployed_at": artifact.deployed_at,
        }));
    }

    print_fields(&[
        ("dir", artifact.dir.display().to_string()),
        (
            "version",
            artifact.config.version.clone().unwrap_or_else(|| "-".to_string()),
        ),
        (
            "max_sequence_length",
            artifact.config.max_sequence_length.to_string(),
        ),
        ("vocab_size", artifact.config.vocab_size.to_string()),
        ("vocabulary", format!("{} entries", artifact.vocabulary.len())),
        (
            "deployed_at",
            artifact
                .deployed_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        ),
    ]);
    Ok(())
}
