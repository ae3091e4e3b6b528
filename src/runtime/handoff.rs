//! Chunk hand-off protocol
//!
//! The orchestrating process builds the batch once, writes it to a private
//! temporary file and re-invokes its own executable in one multiplexer
//! window per chunk. Each subordinate loads the stored batch instead of
//! enumerating again and runs only its own chunk.
//!
//! The stored batch is only ever read by a process started with a chunk
//! index.

use crate::core::{Batch, ChunkAssignment, Error, Result};
use crate::runtime::dispatch::{Dispatcher, RunReport};
use crate::runtime::executor::Executor;
use crate::runtime::mux::{inside_multiplexer, Multiplexer, MuxRunner};
use crate::runtime::namespace::Namespace;
use crate::runtime::prompt::Prompter;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Flag carrying the subordinate's chunk index
pub const CHUNK_INDEX_FLAG: &str = "--chunk-index";
/// Flag carrying the stored batch path
pub const BATCH_FILE_FLAG: &str = "--batch-file";

/// Write `batch` to a fresh private temporary file and return its path.
///
/// The file outlives this call; whoever launched the windows removes it.
pub fn store_batch(batch: &Batch) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("rxargs-")
        .suffix(".json")
        .tempfile()?;
    serde_json::to_writer(&mut file, batch)?;
    file.flush()?;
    let (_, path) = file.keep().map_err(|e| Error::Io(e.error))?;
    debug!("Stored {} record(s) in {}", batch.len(), path.display());
    Ok(path)
}

/// Read a batch written by [`store_batch`]
pub fn load_batch(path: &Path) -> Result<Batch> {
    let file = File::open(path).map_err(|e| {
        Error::protocol(format!("cannot read batch file {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Unique session name for one multiplexed run
pub fn session_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("rxargs-{}", &id[..8])
}

/// How this process was started, reused verbatim for every window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub exe: PathBuf,
    /// Original arguments, without the program name
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(exe: impl Into<PathBuf>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            args,
            cwd: cwd.into(),
        }
    }

    /// The running executable with the given arguments
    pub fn current(args: Vec<String>) -> Result<Self> {
        Ok(Self::new(
            std::env::current_exe()?,
            args,
            std::env::current_dir()?,
        ))
    }

    /// Command line for the window running chunk `index`
    pub fn for_chunk(&self, index: usize, batch_file: &Path) -> Vec<String> {
        let mut argv = vec![
            self.exe.to_string_lossy().into_owned(),
            CHUNK_INDEX_FLAG.to_string(),
            index.to_string(),
            BATCH_FILE_FLAG.to_string(),
            batch_file.to_string_lossy().into_owned(),
        ];
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// What a launch left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub session: String,
    pub batch_file: PathBuf,
    /// False when the batch file was left for still-starting windows
    pub cleaned_up: bool,
}

/// Spread `batch` over `chunks` windows and attach the user to them.
///
/// Blocks until the user detaches from the session.
pub fn launch<R: MuxRunner + ?Sized>(
    batch: &Batch,
    chunks: usize,
    invocation: &Invocation,
    mux: &Multiplexer,
    runner: &mut R,
) -> Result<Launch> {
    launch_in(batch, chunks, invocation, mux, runner, inside_multiplexer())
}

/// [`launch`] with the nesting decided by the caller
fn launch_in<R: MuxRunner + ?Sized>(
    batch: &Batch,
    chunks: usize,
    invocation: &Invocation,
    mux: &Multiplexer,
    runner: &mut R,
    nested: bool,
) -> Result<Launch> {
    ChunkAssignment::new(0, chunks)?;

    let batch_file = store_batch(batch)?;
    let session = session_name();
    info!(
        "Launching {} chunk(s) of {} record(s) in {} session {}",
        chunks,
        batch.len(),
        mux.name(),
        session
    );

    let first = invocation.for_chunk(0, &batch_file);
    if let Err(e) = runner.run(
        mux.program(),
        &mux.new_session(&session, &invocation.cwd, &first),
    ) {
        remove_batch_file(&batch_file);
        return Err(e);
    }

    if let Err(e) = enter_session(chunks, invocation, mux, runner, &session, &batch_file, nested) {
        abandon_session(mux, runner, &session);
        remove_batch_file(&batch_file);
        return Err(e);
    }

    // switch-client returns at once, so windows may not have read the file yet
    let cleaned_up = !nested;
    if cleaned_up {
        remove_batch_file(&batch_file);
    }
    Ok(Launch {
        session,
        batch_file,
        cleaned_up,
    })
}

/// Windows for chunks `1..chunks` in a session already holding chunk 0
fn open_windows<R: MuxRunner + ?Sized>(
    chunks: usize,
    invocation: &Invocation,
    mux: &Multiplexer,
    runner: &mut R,
    session: &str,
    batch_file: &Path,
) -> Result<()> {
    for index in 1..chunks {
        let command = invocation.for_chunk(index, batch_file);
        runner.run(
            mux.program(),
            &mux.new_window(session, index, &invocation.cwd, &command),
        )?;
    }
    Ok(())
}

fn enter_session<R: MuxRunner + ?Sized>(
    chunks: usize,
    invocation: &Invocation,
    mux: &Multiplexer,
    runner: &mut R,
    session: &str,
    batch_file: &Path,
    nested: bool,
) -> Result<()> {
    open_windows(chunks, invocation, mux, runner, session, batch_file)?;
    runner.claim_terminal()?;
    runner.attach(mux.program(), &mux.attach(session, nested))
}

fn abandon_session<R: MuxRunner + ?Sized>(mux: &Multiplexer, runner: &mut R, session: &str) {
    if let Err(e) = runner.run(mux.program(), &mux.kill_session(session)) {
        warn!("Could not kill session {}: {}", session, e);
    }
}

fn remove_batch_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Could not remove {}: {}", path.display(), e);
    }
}

/// Run one subordinate's chunk of a stored batch.
///
/// With `pause` set the window waits for the user before closing.
pub async fn run_subordinate<E: Executor + 'static>(
    dispatcher: &Dispatcher<E>,
    batch: &Batch,
    chunk: ChunkAssignment,
    interactive: bool,
    pause: bool,
    prompter: &mut dyn Prompter,
) -> RunReport {
    let mut namespace = Namespace::new();
    let confirm = if interactive {
        Some(&mut *prompter as &mut dyn Prompter)
    } else {
        None
    };
    let report = dispatcher
        .run_chunk(batch, chunk, &mut namespace, confirm)
        .await;

    if pause {
        let message = format!(
            "Chunk {}/{} finished: {} succeeded, {} failed, {} skipped. Press Enter to close.",
            chunk.index() + 1,
            chunk.count(),
            report.succeeded(),
            report.failed(),
            report.skipped()
        );
        if let Err(e) = prompter.acknowledge(&message) {
            warn!("Acknowledgment prompt failed: {}", e);
        }
    }
    report
}
