pub mod args;
pub mod commands;
pub mod completions;
pub mod config;

pub use args::Cli;
pub use commands::{handle_command, run_pipeline};
pub use config::{FileConfig, Settings};
