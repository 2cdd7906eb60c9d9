//! Write-only document store for stage artifacts.
//!
//! Each stage renders at most one markdown document per feature, stored at
//! `<docs-root>/<category>/<feature>.md`. The orchestrator never reads these
//! back.

use anyhow::{Context, Result};
use stagehand_common::Stage;
use std::path::{Path, PathBuf};

use crate::util::file_stem;

/// Directory under the docs root that holds a stage's artifacts.
pub fn category(stage: Stage) -> &'static str {
    match stage {
        Stage::Spec => "specs",
        Stage::Tech => "design",
        Stage::Impl => "implementation",
        Stage::Test => "testing",
        Stage::Sec => "security",
        Stage::Perf => "performance",
        Stage::Docs => "user",
        Stage::Ready => "release",
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, stage: Stage, feature: &str) -> PathBuf {
        self.root
            .join(category(stage))
            .join(format!("{}.md", file_stem(feature)))
    }

    /// Write (or overwrite) the artifact and return where it landed.
    pub fn write(&self, stage: Stage, feature: &str, content: &str) -> Result<PathBuf> {
        let path = self.path_for(stage, feature);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write artifact {}", path.display()))?;
        tracing::debug!(stage = %stage, path = %path.display(), "artifact written");
        Ok(path)
    }
}
