//! Execution dispatch
//!
//! The strategy is chosen once per run. Within one unit (the whole batch,
//! one chunk, or one pool worker) records run strictly in batch order; pool
//! workers are independent and only their results are put back in order.

use crate::core::{Batch, ChunkAssignment, CommandRecord, Error, Result};
use crate::runtime::executor::{ExecutionOutcome, Executor};
use crate::runtime::namespace::{LoopPosition, Namespace};
use crate::runtime::prompt::{Prompter, Response};
use colored::Colorize;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// How a batch is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    Interactive,
    WorkerPool(usize),
    MultiplexedChunks(usize),
}

/// Flags orthogonal to the strategy
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Print commands instead of running them
    pub dry_run: bool,
    /// Echo each command to stderr before running it
    pub verbose: bool,
}

/// Outcome of one record, tagged with its global batch index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordResult {
    pub index: usize,
    pub command: String,
    pub input: String,
    pub outcome: ExecutionOutcome,
}

/// An input the builder turned down, reported with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedResult {
    pub input: String,
    pub outcome: ExecutionOutcome,
}

/// Results gathered by one dispatch unit
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub results: Vec<RecordResult>,
    /// Inputs dropped during construction; only whole-batch runs carry them
    pub rejected: Vec<RejectedResult>,
    /// The user quit an interactive run early
    pub aborted: bool,
}

impl RunReport {
    fn push(&mut self, index: usize, record: &CommandRecord, outcome: ExecutionOutcome) {
        self.results.push(RecordResult {
            index,
            command: record.command.text(),
            input: record.input.clone(),
            outcome,
        });
    }

    fn add_rejections(&mut self, batch: &Batch) {
        self.rejected.extend(batch.rejected.iter().map(|r| RejectedResult {
            input: r.item.clone(),
            outcome: ExecutionOutcome::from(&r.reason),
        }));
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ExecutionOutcome::Success))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ExecutionOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(ExecutionOutcome::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }

    fn count(&self, pred: impl Fn(&ExecutionOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Executes batches under one [`Strategy`]
pub struct Dispatcher<E> {
    executor: Arc<E>,
    options: DispatchOptions,
}

impl<E: Executor + 'static> Dispatcher<E> {
    pub fn new(executor: E, options: DispatchOptions) -> Self {
        Self::with_shared(Arc::new(executor), options)
    }

    pub fn with_shared(executor: Arc<E>, options: DispatchOptions) -> Self {
        Self { executor, options }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Run a whole batch locally.
    ///
    /// `namespace` is the unit context for sequential and interactive runs;
    /// pool workers each start from an empty one.
    pub async fn dispatch(
        &self,
        batch: &Batch,
        strategy: Strategy,
        namespace: &mut Namespace,
        prompter: &mut dyn Prompter,
    ) -> Result<RunReport> {
        info!("Dispatching {} record(s) with {:?}", batch.len(), strategy);
        let all = batch.all_indices();
        let mut report = match strategy {
            Strategy::Sequential => self.run_unit(batch, &all, namespace, None).await,
            Strategy::Interactive => self.run_unit(batch, &all, namespace, Some(prompter)).await,
            Strategy::WorkerPool(size) => self.run_pool(batch, size).await,
            Strategy::MultiplexedChunks(_) => {
                return Err(Error::protocol(
                    "multiplexed chunks are dispatched through the hand-off protocol",
                ))
            }
        };
        report.add_rejections(batch);
        Ok(report)
    }

    /// Run one chunk of the batch, sequentially or with prompts
    pub async fn run_chunk(
        &self,
        batch: &Batch,
        chunk: ChunkAssignment,
        namespace: &mut Namespace,
        prompter: Option<&mut dyn Prompter>,
    ) -> RunReport {
        let indices = chunk.select(batch);
        info!(
            "Running chunk {}/{} with {} record(s)",
            chunk.index(),
            chunk.count(),
            indices.len()
        );
        self.run_unit(batch, &indices, namespace, prompter).await
    }

    /// Run every chunk in turn inside this process, each with a fresh namespace
    pub async fn run_chunks(
        &self,
        batch: &Batch,
        count: usize,
        mut prompter: Option<&mut dyn Prompter>,
    ) -> Result<RunReport> {
        if count == 0 {
            return Err(Error::protocol("chunk count must be greater than zero"));
        }
        let mut report = RunReport::default();
        for index in 0..count {
            let chunk = ChunkAssignment::new(index, count)?;
            let part = self
                .run_chunk(
                    batch,
                    chunk,
                    &mut Namespace::new(),
                    prompter.as_deref_mut().map(|p| p as &mut dyn Prompter),
                )
                .await;
            report.results.extend(part.results);
            if part.aborted {
                report.aborted = true;
                break;
            }
        }
        report.add_rejections(batch);
        Ok(report)
    }

    /// Run the given records in order inside this process
    pub async fn run_unit(
        &self,
        batch: &Batch,
        indices: &[usize],
        namespace: &mut Namespace,
        mut prompter: Option<&mut dyn Prompter>,
    ) -> RunReport {
        let mut report = RunReport::default();
        let total = indices.len();

        for (position, &global) in indices.iter().enumerate() {
            let Some(record) = batch.records.get(global) else {
                warn!("Record {} is outside the batch", global);
                continue;
            };

            if let Some(prompter) = prompter.as_deref_mut().map(|p| p as &mut dyn Prompter) {
                let response = prompter.confirm(&record.command).unwrap_or_else(|e| {
                    warn!("Prompt failed: {}", e);
                    Response::Quit
                });
                match response {
                    Response::Yes => {}
                    Response::No => {
                        report.push(global, record, ExecutionOutcome::Skipped);
                        continue;
                    }
                    Response::Quit => {
                        info!("Run quit at record {}", global);
                        report.aborted = true;
                        break;
                    }
                }
            }

            let (prev, next) = batch.neighbours(global);
            namespace.refresh(&LoopPosition {
                index: position,
                total,
                input: &record.input,
                dir: &record.dir,
                prev,
                next,
            });
            let outcome = execute_one(self.executor.as_ref(), &self.options, record, namespace).await;
            report.push(global, record, outcome);
        }

        report
    }

    /// Run every record on a bounded pool; results come back in batch order
    pub async fn run_pool(&self, batch: &Batch, size: usize) -> RunReport {
        let semaphore = Arc::new(Semaphore::new(size.max(1)));
        let total = batch.len();

        let handles: Vec<_> = batch
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let semaphore = Arc::clone(&semaphore);
                let executor = Arc::clone(&self.executor);
                let options = self.options.clone();
                let record = record.clone();
                let (prev, next) = batch.neighbours(index);
                let (prev, next) = (prev.map(String::from), next.map(String::from));

                tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => return ExecutionOutcome::ExecutionError(e.to_string()),
                    };
                    let mut namespace = Namespace::new();
                    namespace.refresh(&LoopPosition {
                        index,
                        total,
                        input: &record.input,
                        dir: &record.dir,
                        prev: prev.as_deref(),
                        next: next.as_deref(),
                    });
                    execute_one(executor.as_ref(), &options, &record, &mut namespace).await
                })
            })
            .collect();

        let mut report = RunReport::default();
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            let outcome = joined.unwrap_or_else(|e| {
                warn!("Worker for record {} failed: {}", index, e);
                ExecutionOutcome::ExecutionError(e.to_string())
            });
            report.push(index, &batch.records[index], outcome);
        }
        report
    }
}

async fn execute_one<E: Executor + ?Sized>(
    executor: &E,
    options: &DispatchOptions,
    record: &CommandRecord,
    namespace: &mut Namespace,
) -> ExecutionOutcome {
    if options.dry_run {
        println!("{}", record.command);
        return ExecutionOutcome::DryRun;
    }
    if options.verbose {
        eprintln!("{}", record.command.to_string().green());
    }
    let outcome = executor.execute(record, namespace).await;
    debug!("Record '{}': {}", record.input, outcome);
    outcome
}
