//! Application edges
//!
//! This module contains everything around the backend proper:
//! - Error types
//! - CLI handling and the command runner
//! - The user configuration file

pub mod cli;
pub mod config_file;
pub mod errors;
pub mod platform;
pub mod runner;

pub use cli::CliArgs;
pub use config_file::ConfigFile;
pub use errors::{BackendError, BackendResult};
pub use runner::run_app;
