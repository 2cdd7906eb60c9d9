//! Stage identities and the status vocabularies attached to them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a string does not name one of the eight stages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown stage '{0}'. Valid stages: spec, tech, impl, test, sec, perf, docs, ready")]
pub struct ParseStageError(pub String);

/// One of the eight fixed phases a feature moves through.
///
/// Declaration order is pipeline order, so the derived `Ord` doubles as the
/// dependency order: every stage depends on all stages that sort before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Spec,
    Tech,
    Impl,
    Test,
    Sec,
    Perf,
    Docs,
    Ready,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 8] = [
        Stage::Spec,
        Stage::Tech,
        Stage::Impl,
        Stage::Test,
        Stage::Sec,
        Stage::Perf,
        Stage::Docs,
        Stage::Ready,
    ];

    /// Zero-based position in the pipeline.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short machine name, as used on the command line and in state files.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Spec => "spec",
            Stage::Tech => "tech",
            Stage::Impl => "impl",
            Stage::Test => "test",
            Stage::Sec => "sec",
            Stage::Perf => "perf",
            Stage::Docs => "docs",
            Stage::Ready => "ready",
        }
    }

    /// Human-readable stage name.
    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Spec => "Specification",
            Stage::Tech => "Technical Design",
            Stage::Impl => "Implementation",
            Stage::Test => "Testing",
            Stage::Sec => "Security Review",
            Stage::Perf => "Performance Review",
            Stage::Docs => "Documentation",
            Stage::Ready => "Readiness",
        }
    }

    /// The role that owns the stage.
    pub fn role(self) -> &'static str {
        match self {
            Stage::Spec => "Business Analyst",
            Stage::Tech => "Architect",
            Stage::Impl => "Developer",
            Stage::Test => "Test Engineer",
            Stage::Sec => "Security Engineer",
            Stage::Perf => "Performance Engineer",
            Stage::Docs => "Documentation Manager",
            Stage::Ready => "Release Validator",
        }
    }

    /// The stage that follows this one, or `None` for `ready`.
    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(self.index() + 1).copied()
    }

    /// Stages that must be approved before this one may be approved.
    pub fn predecessors(self) -> &'static [Stage] {
        &ORDER[..self.index()]
    }
}

static ORDER: [Stage; 8] = Stage::ALL;

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let name = name.strip_suffix("-agent").unwrap_or(&name);
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == name)
            .ok_or_else(|| ParseStageError(s.to_string()))
    }
}

/// Status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Approved,
    Failed,
}

impl StageStatus {
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::Approved => write!(f, "approved"),
            StageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What the pipeline as a whole is waiting on.
///
/// Orthogonal to [`StageStatus`]: `Pending` means the current stage has run
/// and is waiting on a human decision, `InProgress` means it is ready to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    InProgress,
    Pending,
    Approved,
    Failed,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStatus::InProgress => write!(f, "in_progress"),
            PipelineStatus::Pending => write!(f, "pending"),
            PipelineStatus::Approved => write!(f, "approved"),
            PipelineStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Pointer to the stage the pipeline is on, or the terminal `completed` marker.
///
/// Serialized as a bare string: `"spec"` … `"ready"` or `"completed"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum StageCursor {
    At(Stage),
    Completed,
}

impl StageCursor {
    pub fn stage(self) -> Option<Stage> {
        match self {
            StageCursor::At(stage) => Some(stage),
            StageCursor::Completed => None,
        }
    }

    pub fn is_completed(self) -> bool {
        matches!(self, StageCursor::Completed)
    }
}

impl Default for StageCursor {
    fn default() -> Self {
        StageCursor::At(Stage::Spec)
    }
}

impl From<Stage> for StageCursor {
    fn from(stage: Stage) -> Self {
        StageCursor::At(stage)
    }
}

impl fmt::Display for StageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageCursor::At(stage) => write!(f, "{}", stage),
            StageCursor::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for StageCursor {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("completed") {
            return Ok(StageCursor::Completed);
        }
        s.parse().map(StageCursor::At)
    }
}

impl From<StageCursor> for String {
    fn from(cursor: StageCursor) -> Self {
        cursor.to_string()
    }
}

impl TryFrom<String> for StageCursor {
    type Error = ParseStageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
