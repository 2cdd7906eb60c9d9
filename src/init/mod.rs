//! Initialization of stagehand projects.
//!
//! `stagehand init` creates the `.stagehand/` directory:
//!
//! ```text
//! .stagehand/
//! ├── stagehand.toml   # Configuration (defaults written on first init)
//! └── pipeline.json    # Pipeline state (written by `stagehand start`)
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE, StagehandToml};

/// The name of the stagehand configuration directory.
pub const STAGEHAND_DIR: &str = ".stagehand";

/// Result of initializing a stagehand project.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the .stagehand directory
    pub stagehand_dir: PathBuf,
    /// Whether the directory was newly created (false if it already existed)
    pub created: bool,
    /// Whether a default stagehand.toml was written
    pub wrote_config: bool,
}

/// Initialize a stagehand project in the given directory.
///
/// Existing configuration is never overwritten, so running this twice is safe.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let stagehand_dir = get_stagehand_dir(project_dir);
    let created = !stagehand_dir.exists();

    std::fs::create_dir_all(&stagehand_dir)
        .with_context(|| format!("Failed to create directory: {}", stagehand_dir.display()))?;

    let config_path = stagehand_dir.join(CONFIG_FILE);
    let wrote_config = if config_path.exists() {
        false
    } else {
        StagehandToml::default().save(&config_path)?;
        true
    };

    tracing::debug!(dir = %stagehand_dir.display(), created, wrote_config, "project initialized");

    Ok(InitResult {
        stagehand_dir,
        created,
        wrote_config,
    })
}

/// Check if a project is already initialized.
pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(STAGEHAND_DIR).exists()
}

/// Get the path to the stagehand directory for a project.
pub fn get_stagehand_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(STAGEHAND_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_directory_and_config() {
        let dir = tempdir().unwrap();
        assert!(!is_initialized(dir.path()));

        let result = init_project(dir.path()).unwrap();
        assert!(result.created);
        assert!(result.wrote_config);
        assert!(is_initialized(dir.path()));
        assert!(result.stagehand_dir.join(CONFIG_FILE).exists());

        let toml = StagehandToml::load(&result.stagehand_dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(toml, StagehandToml::default());
    }

    #[test]
    fn test_init_is_idempotent_and_keeps_config() {
        let dir = tempdir().unwrap();
        init_project(dir.path()).unwrap();
        let config_path = get_stagehand_dir(dir.path()).join(CONFIG_FILE);
        std::fs::write(&config_path, "[processor]\ncommand = \"agent\"\n").unwrap();

        let result = init_project(dir.path()).unwrap();
        assert!(!result.created);
        assert!(!result.wrote_config);
        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("agent"));
    }

    #[test]
    fn test_get_stagehand_dir() {
        let dir = tempdir().unwrap();
        assert_eq!(get_stagehand_dir(dir.path()), dir.path().join(".stagehand"));
    }
}
