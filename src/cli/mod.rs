//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, signal handling,
//! and the command handlers wiring adapters into use cases.

pub mod app;
pub mod args;
pub mod commands;
pub mod config_cmd;
pub mod presenter;
pub mod signals;
pub mod watch_app;

// Re-export commonly used types
pub use app::{
    AppContext, CommandError, EXIT_ERROR, EXIT_SUCCESS, EXIT_UNAVAILABLE, EXIT_USAGE_ERROR,
};
pub use args::{Cli, Commands, ConfigAction, SessionAction, UsageAction};
pub use presenter::Presenter;
pub use watch_app::run_watch;
