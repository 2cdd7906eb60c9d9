//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                                          |
//! |------------|-----------------------------------------------------------|
//! | `pipeline` | `Start`, `Continue`, `Status`, `Approve`, `Input`, stage  |
//! |            | commands, `Halt`, `Resume`, `Reject`, `Select`, `Recommend` |
//! | `run`      | `Run`                                                     |
//! | `project`  | `Init`                                                    |
//! | `config`   | `Config`                                                  |

pub mod config;
pub mod pipeline;
pub mod project;
pub mod run;

pub use config::cmd_config;
pub use pipeline::{
    cmd_approve, cmd_continue, cmd_halt, cmd_input, cmd_recommend, cmd_reject, cmd_resume,
    cmd_select, cmd_stage, cmd_start, cmd_status,
};
pub use project::cmd_init;
pub use run::cmd_run;
