pub mod icons;
pub mod progress;
pub mod report;

pub use progress::PipelineUI;
pub use report::{print_outcome, print_status};
