//! Command-line front end for rxargs.
//!
//! ## Usage
//!
//! ```bash
//! # Count lines of every Rust file below the current directory
//! rxargs -r '\.rs$' wc -l
//!
//! # Rename *.jpeg to *.jpg, checking each command first
//! rxargs -p --resub '\.jpeg$' .jpg {new} mv {} {new}
//!
//! # Convert piped paths in four worker processes
//! find . -name '*.flac' | rxargs -l -P 4 -s 'ffmpeg -i {} {}.mp3'
//!
//! # Spread the work over three tmux windows
//! rxargs --chunks 3 -m path ./process.sh
//! ```

pub mod app;
pub mod config;
pub mod error;

#[cfg(test)]
mod app_test;


pub use app::Cli;
pub use config::Config;
pub use error::{exit_code, CliError, Result};

/// Version information for the rxargs CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
