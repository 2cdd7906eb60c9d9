pub mod commands;
pub mod config;
pub mod errors;
pub mod gates;
pub mod init;
pub mod orchestrator;
pub mod processors;
pub mod ui;
pub mod util;
