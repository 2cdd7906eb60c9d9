//! Shared domain types for the stagehand feature pipeline.
//!
//! These types cross the boundary between the orchestrator and any stage
//! processor, including processors that run out of process and exchange
//! [`StageContext`] / [`StageResponse`] as JSON.

pub mod response;
pub mod stage;

pub use response::{StageContext, StageResponse};
pub use stage::{ParseStageError, PipelineStatus, Stage, StageCursor, StageStatus};
