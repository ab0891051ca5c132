use crate::output::{print_fields, print_json};
use anyhow::Context;
use retrain_core::{
    artifact::ArtifactStore,
    command::{CommandRunner, ProcessRunner},
    config::Config,
    validator::{self, ModelLoader, ProbeLoader, ReadableLoader, Validation},
};
use std::path::Path;

/// The loader a project is configured for: a probe command when
/// `load_probe` is set, otherwise a readability check.
pub enum Loader<'a> {
    Readable(ReadableLoader),
    Probe(ProbeLoader<'a>),
}

impl<'a> Loader<'a> {
    pub fn for_config(root: &Path, config: &Config, runner: &'a dyn CommandRunner) -> Self {
        match config.probe_command(root) {
            Some(spec) => Loader::Probe(ProbeLoader::new(runner, spec)),
            None => Loader::Readable(ReadableLoader),
        }
    }
}

impl ModelLoader for Loader<'_> {
    fn load(&self, payload: &Path) -> Result<(), String> {
        match self {
            Loader::Readable(l) => l.load(payload),
            Loader::Probe(l) => l.load(payload),
        }
    }
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let store = ArtifactStore::new(config.artifact_path(root), config.artifact.clone());
    let runner = ProcessRunner;
    let loader = Loader::for_config(root, &config, &runner);

    let verdict = validator::validate(&store, &loader);

    if json {
        print_json(&serde_json::json!({
            "artifact": store.dir(),
            "validation": verdict,
        }))?;
    } else {
        let status = match &verdict {
            Validation::Valid => "valid".to_string(),
            Validation::Invalid(reason) => format!("invalid ({reason})"),
        };
        print_fields(&[
            ("artifact", store.dir().display().to_string()),
            ("status", status),
        ]);
    }

    if let Validation::Invalid(reason) = verdict {
        anyhow::bail!("artifact failed validation: {reason}");
    }
    Ok(())
}
