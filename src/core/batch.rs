//! Batch assembly and chunk partitioning

use crate::core::builder::{CommandBuilder, CommandLine, Rejection};
use crate::core::error::{Error, Result};
use crate::core::input::{InputItem, InputMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// One constructed command, consumed exactly once by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Directory the command runs in
    pub dir: PathBuf,
    pub command: CommandLine,
    /// Resolved input the command was built from
    pub input: String,
    /// Positional parts when formatting was used
    pub parts: Option<Vec<String>>,
}

/// An input the builder turned down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedInput {
    pub item: String,
    pub reason: Rejection,
}

/// All command records for a run, in enumeration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub mode: InputMode,
    pub records: Vec<CommandRecord>,
    /// Accepted inputs, parallel to `records`
    pub inputs: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<RejectedInput>,
}

impl Batch {
    pub fn new(mode: InputMode) -> Self {
        Self {
            mode,
            records: Vec::new(),
            inputs: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: CommandRecord) {
        self.inputs.push(record.input.clone());
        self.records.push(record);
    }

    /// Accepted inputs before and after the given global index
    pub fn neighbours(&self, index: usize) -> (Option<&str>, Option<&str>) {
        let prev = index
            .checked_sub(1)
            .and_then(|i| self.inputs.get(i))
            .map(String::as_str);
        let next = self.inputs.get(index + 1).map(String::as_str);
        (prev, next)
    }

    /// Global indices of every record
    pub fn all_indices(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }
}

/// Drive enumeration through the builder, keeping enumeration order.
///
/// A rejected input only drops that input; the batch always completes.
pub fn assemble<I>(items: I, builder: &CommandBuilder) -> Batch
where
    I: IntoIterator<Item = InputItem>,
{
    let mut batch = Batch::new(builder.mode());
    for item in items {
        match builder.build(&item) {
            Ok(record) => batch.push(record),
            Err(reason) => {
                let label = item
                    .text
                    .clone()
                    .or_else(|| item.name.clone())
                    .unwrap_or_default();
                debug!("Skipping input '{}': {}", label, reason);
                batch.rejected.push(RejectedInput {
                    item: label,
                    reason,
                });
            }
        }
    }
    debug!(
        "Assembled {} record(s), {} rejected",
        batch.len(),
        batch.rejected.len()
    );
    batch
}

/// Membership of records in chunk `index` of `count`: `global % count == index`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAssignment {
    index: usize,
    count: usize,
}

impl ChunkAssignment {
    pub fn new(index: usize, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::protocol("chunk count must be greater than zero"));
        }
        if index >= count {
            return Err(Error::protocol(format!(
                "chunk index {} out of range for {} chunk(s)",
                index, count
            )));
        }
        Ok(Self { index, count })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn contains(&self, global_index: usize) -> bool {
        global_index % self.count == self.index
    }

    /// Global indices of this chunk's records, in batch order
    pub fn select(&self, batch: &Batch) -> Vec<usize> {
        (self.index..batch.len()).step_by(self.count).collect()
    }
}
