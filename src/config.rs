//! Configuration for stagehand.
//!
//! Settings are read from `.stagehand/stagehand.toml` and layered
//! file → environment → CLI:
//!
//! ```toml
//! [pipeline]
//! state_file = ".stagehand/pipeline.json"
//! docs_root = "docs"
//!
//! [processor]
//! command = "my-agent"
//! args = ["--stage-json"]
//!
//! [stages.docs]
//! require_approval = false
//! ```
//!
//! | Setting             | Environment               | CLI            |
//! |---------------------|---------------------------|----------------|
//! | `pipeline.state_file` | `STAGEHAND_STATE_FILE`  | `--state-file` |
//! | `pipeline.docs_root`  | `STAGEHAND_DOCS_ROOT`   |                |
//! | `processor.command`   | `STAGEHAND_PROCESSOR_CMD` |              |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stagehand_common::Stage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::init::get_stagehand_dir;

pub const CONFIG_FILE: &str = "stagehand.toml";

pub const ENV_STATE_FILE: &str = "STAGEHAND_STATE_FILE";
pub const ENV_DOCS_ROOT: &str = "STAGEHAND_DOCS_ROOT";
pub const ENV_PROCESSOR_CMD: &str = "STAGEHAND_PROCESSOR_CMD";

fn default_state_file() -> PathBuf {
    PathBuf::from(".stagehand/pipeline.json")
}

fn default_docs_root() -> PathBuf {
    PathBuf::from("docs")
}

/// Where the pipeline keeps its state and artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSection {
    /// State document, relative to the project directory
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Root directory for stage artifacts
    #[serde(default = "default_docs_root")]
    pub docs_root: PathBuf,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            docs_root: default_docs_root(),
        }
    }
}

/// Optional external stage processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Per-stage settings, keyed by stage name under `[stages]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOverride {
    /// Whether a successful result waits for human approval (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_approval: Option<bool>,
}

/// The complete stagehand.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagehandToml {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub processor: ProcessorSection,
    #[serde(default)]
    pub stages: BTreeMap<String, StageOverride>,
}

impl StagehandToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse stagehand.toml")
    }

    /// Load `<stagehand_dir>/stagehand.toml`, or defaults if it does not exist.
    pub fn load_or_default(stagehand_dir: &Path) -> Result<Self> {
        let config_path = stagehand_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize stagehand.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Approval overrides for stages named correctly under `[stages]`.
    pub fn approval_overrides(&self) -> BTreeMap<Stage, bool> {
        self.stages
            .iter()
            .filter_map(|(name, cfg)| {
                let stage = name.parse::<Stage>().ok()?;
                Some((stage, cfg.require_approval?))
            })
            .collect()
    }

    /// Validate the configuration and return a list of warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for name in self.stages.keys() {
            if let Err(err) = name.parse::<Stage>() {
                warnings.push(format!("[stages.{}]: {}", name, err));
            }
        }

        match &self.processor.command {
            Some(cmd) if cmd.trim().is_empty() => {
                warnings.push("[processor] command is empty; built-in agents will be used".into());
            }
            None if !self.processor.args.is_empty() => {
                warnings.push("[processor] args are set but no command is configured".into());
            }
            _ => {}
        }

        if self.pipeline.state_file.as_os_str().is_empty() {
            warnings.push("[pipeline] state_file is empty; the default will be used".into());
        }

        warnings
    }
}

/// CLI-level overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub state_file: Option<PathBuf>,
    pub verbose: bool,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub stagehand_dir: PathBuf,
    pub toml: StagehandToml,
    pub verbose: bool,
    state_file: PathBuf,
    docs_root: PathBuf,
    processor_command: Option<String>,
}

impl Config {
    /// Load configuration for a project using the process environment.
    pub fn load(project_dir: &Path, cli: CliOverrides) -> Result<Self> {
        Self::load_with_env(project_dir, cli, |key| std::env::var(key).ok())
    }

    /// Load configuration with an explicit environment lookup.
    pub fn load_with_env(
        project_dir: &Path,
        cli: CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let stagehand_dir = get_stagehand_dir(&project_dir);
        let toml = StagehandToml::load_or_default(&stagehand_dir)?;

        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let state_file = cli
            .state_file
            .clone()
            .or_else(|| env(ENV_STATE_FILE).map(PathBuf::from))
            .unwrap_or_else(|| {
                if toml.pipeline.state_file.as_os_str().is_empty() {
                    default_state_file()
                } else {
                    toml.pipeline.state_file.clone()
                }
            });
        let docs_root = env(ENV_DOCS_ROOT)
            .map(PathBuf::from)
            .unwrap_or_else(|| toml.pipeline.docs_root.clone());
        let processor_command = env(ENV_PROCESSOR_CMD).or_else(|| {
            toml.processor
                .command
                .clone()
                .filter(|cmd| !cmd.trim().is_empty())
        });

        Ok(Self {
            state_file: project_dir.join(state_file),
            docs_root: project_dir.join(docs_root),
            project_dir,
            stagehand_dir,
            toml,
            verbose: cli.verbose,
            processor_command,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.stagehand_dir.join(CONFIG_FILE)
    }

    /// Absolute path of the pipeline state document.
    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Absolute root for stage artifacts.
    pub fn docs_root(&self) -> &Path {
        &self.docs_root
    }

    pub fn processor_command(&self) -> Option<&str> {
        self.processor_command.as_deref()
    }

    pub fn processor_args(&self) -> &[String] {
        &self.toml.processor.args
    }

    pub fn approval_overrides(&self) -> BTreeMap<Stage, bool> {
        self.toml.approval_overrides()
    }
}
