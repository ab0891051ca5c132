use crate::command::CommandSpec;
use crate::error::{Result, RetrainError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub message: String,
}

impl ConfigWarning {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExportConfig
// ---------------------------------------------------------------------------

/// How to invoke the production-data export collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_python")]
    pub program: String,
    #[serde(default = "default_export_args")]
    pub args: Vec<String>,
    #[serde(default = "default_working_dir")]
    pub working_dir: Option<PathBuf>,
    /// Where the exported dataset is written, relative to the project root.
    #[serde(default = "default_export_output")]
    pub output: PathBuf,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_true")]
    pub merge: bool,
    #[serde(default = "default_true")]
    pub balance: bool,
    /// `0` means wait indefinitely.
    #[serde(default)]
    pub timeout_seconds: u64,
}

fn default_python() -> String {
    "python".to_string()
}

fn default_export_args() -> Vec<String> {
    vec!["export_production_data.py".to_string()]
}

fn default_working_dir() -> Option<PathBuf> {
    Some(PathBuf::from("ml_training"))
}

fn default_export_output() -> PathBuf {
    PathBuf::from("ml_training/phishing_dataset_updated.csv")
}

fn default_lookback_days() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            program: default_python(),
            args: default_export_args(),
            working_dir: default_working_dir(),
            output: default_export_output(),
            lookback_days: default_lookback_days(),
            merge: true,
            balance: true,
            timeout_seconds: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// TrainConfig
// ---------------------------------------------------------------------------

/// How to invoke the training collaborator. It reads `dataset` and writes
/// the artifact into `Config::artifact_dir` by convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    #[serde(default = "default_python")]
    pub program: String,
    #[serde(default = "default_train_args")]
    pub args: Vec<String>,
    #[serde(default = "default_working_dir")]
    pub working_dir: Option<PathBuf>,
    /// Fixed dataset file the trainer reads, relative to the project root.
    #[serde(default = "default_train_dataset")]
    pub dataset: PathBuf,
    #[serde(default)]
    pub timeout_seconds: u64,
}

fn default_train_args() -> Vec<String> {
    vec!["train_model.py".to_string()]
}

fn default_train_dataset() -> PathBuf {
    PathBuf::from("ml_training/phishing_dataset.csv")
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            program: default_python(),
            args: default_train_args(),
            working_dir: default_working_dir(),
            dataset: default_train_dataset(),
            timeout_seconds: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// ProbeConfig
// ---------------------------------------------------------------------------

/// Optional external command that proves the serving runtime can load the
/// model payload. `{artifact_dir}` and `{payload}` in `args` are substituted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_probe_timeout")]
    pub timeout_seconds: u64,
}

fn default_probe_timeout() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// ArtifactLayout
// ---------------------------------------------------------------------------

/// File names of the three required artifact members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactLayout {
    #[serde(default = "default_model_payload")]
    pub model_payload: String,
    #[serde(default = "default_vocabulary")]
    pub vocabulary: String,
    #[serde(default = "default_model_config")]
    pub config: String,
}

fn default_model_payload() -> String {
    "saved_model.pb".to_string()
}

fn default_vocabulary() -> String {
    "vocabulary.json".to_string()
}

fn default_model_config() -> String {
    "config.json".to_string()
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            model_payload: default_model_payload(),
            vocabulary: default_vocabulary(),
            config: default_model_config(),
        }
    }
}

impl ArtifactLayout {
    pub fn members(&self) -> [&str; 3] {
        [&self.model_payload, &self.vocabulary, &self.config]
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    #[serde(default = "default_backups_dir")]
    pub backups_dir: PathBuf,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    #[serde(default = "default_data_source")]
    pub data_source: String,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub train: TrainConfig,
    #[serde(default)]
    pub artifact: ArtifactLayout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_probe: Option<ProbeConfig>,
    /// Answer to the soft quality gate when running in auto mode.
    #[serde(default)]
    pub continue_on_quality_failure: bool,
}

fn default_version() -> u32 {
    1
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("models/phishing_detection_model")
}

fn default_backups_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_data_source() -> String {
    "mongodb://localhost:27017/lovechedule".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            artifact_dir: default_artifact_dir(),
            backups_dir: default_backups_dir(),
            logs_dir: default_logs_dir(),
            data_source: default_data_source(),
            export: ExportConfig::default(),
            train: TrainConfig::default(),
            artifact: ArtifactLayout::default(),
            load_probe: None,
            continue_on_quality_failure: false,
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(RetrainError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Resolved locations
    // -----------------------------------------------------------------------

    pub fn artifact_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.artifact_dir)
    }

    pub fn backups_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.backups_dir)
    }

    pub fn logs_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.logs_dir)
    }

    pub fn export_output_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.export.output)
    }

    pub fn train_dataset_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.train.dataset)
    }

    // -----------------------------------------------------------------------
    // Command construction
    // -----------------------------------------------------------------------

    /// The export command with the data-source, lookback and output flags appended.
    pub fn export_command(&self, root: &Path, data_source: &str, lookback_days: u32) -> CommandSpec {
        let mut args = self.export.args.clone();
        args.extend([
            "--mongo-uri".to_string(),
            data_source.to_string(),
            "--days".to_string(),
            lookback_days.to_string(),
            "--output".to_string(),
            self.export_output_path(root).display().to_string(),
        ]);
        if self.export.merge {
            args.push("--merge".to_string());
        }
        if self.export.balance {
            args.push("--balance".to_string());
        }
        CommandSpec {
            name: "export".to_string(),
            program: self.export.program.clone(),
            args,
            working_dir: self.export.working_dir.as_ref().map(|d| paths::resolve(root, d)),
            timeout: timeout(self.export.timeout_seconds),
            contract: format!("dataset written to {}", self.export.output.display()),
        }
    }

    pub fn train_command(&self, root: &Path) -> CommandSpec {
        CommandSpec {
            name: "train".to_string(),
            program: self.train.program.clone(),
            args: self.train.args.clone(),
            working_dir: self.train.working_dir.as_ref().map(|d| paths::resolve(root, d)),
            timeout: timeout(self.train.timeout_seconds),
            contract: format!("artifact written to {}", self.artifact_dir.display()),
        }
    }

    pub fn probe_command(&self, root: &Path) -> Option<CommandSpec> {
        let probe = self.load_probe.as_ref()?;
        let artifact_dir = self.artifact_path(root);
        let payload = artifact_dir.join(&self.artifact.model_payload);
        let args = probe
            .args
            .iter()
            .map(|a| {
                a.replace("{artifact_dir}", &artifact_dir.display().to_string())
                    .replace("{payload}", &payload.display().to_string())
            })
            .collect();
        Some(CommandSpec {
            name: "load-probe".to_string(),
            program: probe.program.clone(),
            args,
            working_dir: Some(root.to_path_buf()),
            timeout: timeout(probe.timeout_seconds),
            contract: "exit 0 when the model loads".to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.export.program.trim().is_empty() {
            warnings.push(ConfigWarning::new("export.program is empty"));
        }
        if self.train.program.trim().is_empty() {
            warnings.push(ConfigWarning::new("train.program is empty"));
        }
        if let Some(probe) = &self.load_probe {
            if probe.program.trim().is_empty() {
                warnings.push(ConfigWarning::new("load_probe.program is empty"));
            }
        }

        if self.export.lookback_days == 0 {
            warnings.push(ConfigWarning::new(
                "export.lookback_days is 0; the export will select no reports",
            ));
        }

        if self.artifact_dir.starts_with(&self.backups_dir) {
            warnings.push(ConfigWarning::new(format!(
                "artifact_dir '{}' is inside backups_dir '{}'",
                self.artifact_dir.display(),
                self.backups_dir.display()
            )));
        }

        let members = self.artifact.members();
        for (i, m) in members.iter().enumerate() {
            if m.trim().is_empty() {
                warnings.push(ConfigWarning::new("an artifact member name is empty"));
            } else if members[..i].contains(m) {
                warnings.push(ConfigWarning::new(format!(
                    "artifact member '{m}' is listed more than once"
                )));
            }
        }

        if self.export.output == self.train.dataset {
            warnings.push(ConfigWarning::new(
                "export.output and train.dataset are the same file",
            ));
        }

        warnings
    }
}

fn timeout(seconds: u64) -> Option<Duration> {
    if seconds == 0 {
        None
    } else {
        Some(Duration::from_secs(seconds))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
