//! Typed error hierarchy for the pipeline orchestrator.
//!
//! `PipelineError` covers everything the orchestrator and its state store can
//! refuse or fail at. The command layer turns every variant into a
//! `success: false` outcome, so none of these ever reach a caller as a panic.

use stagehand_common::{ParseStageError, Stage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline is in emergency stop mode: {reason}")]
    Halted { reason: String },

    #[error("Pipeline is not in emergency stop mode")]
    NotHalted,

    #[error(transparent)]
    UnknownStage(#[from] ParseStageError),

    #[error("Cannot approve {stage} before {blocking} is approved")]
    OutOfOrder { stage: Stage, blocking: Stage },

    #[error("Stage {stage} is already approved")]
    AlreadyApproved { stage: Stage },

    #[error("Invalid feature name: {0}")]
    InvalidFeature(String),

    #[error("Failed to write pipeline state at {path}: {source}")]
    StateWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode pipeline state: {0}")]
    StateEncode(#[source] serde_json::Error),

    #[error("{stage} processor failed: {source:#}")]
    Processor {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
