pub mod pipeline;
pub mod state;
pub mod status;

pub use pipeline::{Approval, Orchestrator, StageRun};
pub use state::{FileStateStore, MemoryStateStore, PipelineState, StateStore};
pub use status::StatusReport;
