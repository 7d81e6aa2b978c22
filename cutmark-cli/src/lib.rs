//! Library portion of the cutmark CLI.
//! Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod output;

pub use cli::{Cli, Commands, EncodeArgs, WatchArgs};
pub use commands::encode::run_encode;
pub use commands::watch::run_watch;
