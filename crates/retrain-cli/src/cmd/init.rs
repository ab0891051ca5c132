use anyhow::Context;
use retrain_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing retraining pipeline in: {}", root.display());

    let dir = paths::retrain_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load existing config")?
    } else {
        let cfg = Config::default();
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    for (label, path) in [
        ("backups", config.backups_path(root)),
        ("logs", config.logs_path(root)),
    ] {
        let existed = path.is_dir();
        io::ensure_dir(&path).with_context(|| format!("failed to create {}", path.display()))?;
        let verb = if existed { "exists: " } else { "created:" };
        println!("  {verb} {label} dir {}", path.display());
    }

    for w in config.validate() {
        println!("  warning: {}", w.message);
    }
    Ok(())
}
