//! # rxargs
//!
//! Build and run one command per input, like `xargs`, with directory walks,
//! regex filtering and substitution, positional formatting, worker pools and
//! chunked execution across terminal multiplexer windows.
//!
//! ```rust,no_run
//! use rxargs::core::{assemble, enumerate, BuilderConfig, CommandBuilder, EnumerateOptions, InputMode};
//! use rxargs::runtime::{DispatchOptions, Dispatcher, Namespace, ProcessExecutor, Strategy, TerminalPrompter};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> rxargs::core::Result<()> {
//! let base = Path::new(".");
//! let items = enumerate(InputMode::File, base, &EnumerateOptions::default())?;
//! let builder = CommandBuilder::new(
//!     vec!["wc".into(), "-l".into()],
//!     BuilderConfig::new(InputMode::File, base),
//! );
//! let batch = assemble(items, &builder);
//!
//! let dispatcher = Dispatcher::new(ProcessExecutor::from_env(), DispatchOptions::default());
//! let report = dispatcher
//!     .dispatch(&batch, Strategy::Sequential, &mut Namespace::new(), &mut TerminalPrompter::new())
//!     .await?;
//! println!("{} command(s) failed", report.failed());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod runtime;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::core::{Batch, CommandRecord, Error, Result};
pub use crate::runtime::{ExecutionOutcome, RunReport};
