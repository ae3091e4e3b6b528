//! Pure pipeline stages: enumeration, command construction, batch assembly.
//!
//! Nothing in here spawns processes. Enumeration only reads the filesystem
//! or the input stream.

pub mod batch;
pub mod builder;
pub mod error;
pub mod input;
pub mod template;

pub use batch::{assemble, Batch, ChunkAssignment, CommandRecord, RejectedInput};
pub use builder::{
    BuilderConfig, CommandBuilder, CommandLine, ExecutionStyle, Filter, FilterTarget, Placement,
    Rejection, Resub, DEFAULT_REPLACE_STR,
};
pub use error::{Error, Result};
pub use input::{
    enumerate, Delimiter, EnumerateOptions, InputItem, InputMode, StreamOptions, StreamSource,
    WalkOptions,
};
pub use template::Splitter;
