use crate::cli::config::Config;
use crate::cli::error::{CliError, Result};
use crate::core::{
    assemble, enumerate, Batch, BuilderConfig, ChunkAssignment, CommandBuilder, Delimiter,
    EnumerateOptions, ExecutionStyle, Filter, FilterTarget, InputMode, Resub, Splitter,
    StreamOptions, StreamSource, WalkOptions,
};
use crate::runtime::handoff::{self, Invocation};
use crate::runtime::{
    DispatchOptions, Dispatcher, Multiplexer, Namespace, ProcessExecutor, ProcessRunner, Prompter,
    RunReport, Strategy, TerminalPrompter,
};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use colored::Colorize;
use regex::Regex;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Build and execute command lines from directory walks or standard input
#[derive(Parser, Debug)]
#[command(name = "rxargs", author, version, about, long_about = None)]
pub struct Cli {
    /// Input mode; standard input when it is piped and non-empty, else file
    #[arg(short = 'm', long, value_enum)]
    pub mode: Option<InputMode>,

    /// Enumerate directories instead of files
    #[arg(long)]
    pub folders: bool,

    /// Base directory (default: current directory)
    #[arg(short = 'b', long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Do not recurse below the base directory
    #[arg(short = 't', long)]
    pub top: bool,

    /// Follow symbolic links to directories
    #[arg(long)]
    pub sym: bool,

    /// Input items are separated by NUL characters
    #[arg(short = '0', long)]
    pub null: bool,

    /// Input items are separated by newlines
    #[arg(short = 'l', long)]
    pub lines: bool,

    /// Input items are separated by this string
    #[arg(short = 'd', long, value_name = "DELIM")]
    pub delim: Option<String>,

    /// Read items from this file instead of standard input
    #[arg(short = 'a', long, value_name = "FILE")]
    pub arg_file: Option<PathBuf>,

    /// Ignore input after the first occurrence of this string
    #[arg(short = 'E', long, value_name = "EOF")]
    pub eof_str: Option<String>,

    /// Only build commands for inputs matching this regex
    #[arg(short = 'r', long, value_name = "REGEX")]
    pub regex: Option<String>,

    /// Keep inputs that do not match the regex instead
    #[arg(short = 'o', long)]
    pub omit: bool,

    /// Match the regex against the file name only
    #[arg(short = 'f', long)]
    pub fname: bool,

    /// Placeholder replaced by each input (default: {})
    #[arg(short = 'I', long, value_name = "STR")]
    pub replace_str: Option<String>,

    /// Replace PLACEHOLDER with the input rewritten by PATTERN -> REPL
    #[arg(long, num_args = 3, value_names = ["PATTERN", "REPL", "PLACEHOLDER"])]
    pub resub: Option<Vec<String>>,

    /// Format {0}, {1}, ... positions from parts of the input
    #[arg(long)]
    pub format: bool,

    /// Split the input on this regex for --format
    #[arg(long, value_name = "REGEX")]
    pub split: Option<String>,

    /// Use the capture groups of this regex for --format
    #[arg(long, value_name = "REGEX")]
    pub groups: Option<String>,

    /// Skip commands longer than this many characters
    #[arg(long, value_name = "N")]
    pub max_chars: Option<usize>,

    /// Run each command through the shell
    #[arg(short = 's', long)]
    pub shell: bool,

    /// Print commands without running them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Ask before running each command
    #[arg(short = 'p', long)]
    pub interactive: bool,

    /// Run up to N commands at once (0: one per CPU)
    #[arg(short = 'P', long, value_name = "N")]
    pub max_procs: Option<usize>,

    /// Split the batch into N chunks, one multiplexer window each
    #[arg(long, value_name = "N")]
    pub chunks: Option<usize>,

    /// Run the chunks here instead of in multiplexer windows
    #[arg(long)]
    pub no_mux: bool,

    #[arg(long, hide = true, value_name = "I")]
    pub chunk_index: Option<usize>,

    #[arg(long, hide = true, value_name = "PATH")]
    pub batch_file: Option<PathBuf>,

    /// Print commands and report skipped inputs and failures
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file (default: <config dir>/rxargs/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print a shell completion script and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,

    /// Command and initial arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Execute the run described by the arguments
    pub async fn execute(self) -> Result<()> {
        if let Some(shell) = self.completions {
            generate_completion(shell);
            return Ok(());
        }
        if self.command.is_empty() {
            return Err(CliError::NoCommand);
        }
        self.validate()?;

        let config = Config::load(self.config.as_deref())?.merge_with_cli_args(&self);
        config.validate()?;
        let dispatcher = Dispatcher::new(
            self.executor(&config),
            DispatchOptions {
                dry_run: self.dry_run,
                verbose: config.verbose,
            },
        );
        let mut prompter = TerminalPrompter::new();

        if let (Some(index), Some(batch_file)) = (self.chunk_index, self.batch_file.as_deref()) {
            let chunk = ChunkAssignment::new(index, self.chunks.unwrap_or_default())?;
            let batch = handoff::load_batch(batch_file)?;
            let report = handoff::run_subordinate(
                &dispatcher,
                &batch,
                chunk,
                self.interactive,
                true,
                &mut prompter,
            )
            .await;
            return finish(&report, config.verbose);
        }

        let strategy = self.strategy(&config);
        let mux = match strategy {
            Strategy::MultiplexedChunks(_) if self.launches_windows() => {
                Some(Multiplexer::detect(config.multiplexers.as_slice())?)
            }
            _ => None,
        };

        let base_dir = self.base_dir()?;
        let batch = self.build_batch(&base_dir, &config)?;
        if config.verbose {
            for rejected in &batch.rejected {
                eprintln!(
                    "{}",
                    format!("skipped '{}': {}", rejected.item, rejected.reason).yellow()
                );
            }
        }
        info!(
            "Built {} command(s) in {} mode, {} input(s) skipped",
            batch.len(),
            batch.mode,
            batch.rejected.len()
        );

        let report = match (strategy, mux) {
            (Strategy::MultiplexedChunks(chunks), Some(mux)) => {
                let invocation = Invocation::current(original_args())?;
                let launch = handoff::launch(&batch, chunks, &invocation, &mux, &mut ProcessRunner)?;
                info!("Session {} finished", launch.session);
                return Ok(());
            }
            (Strategy::MultiplexedChunks(chunks), None) => match self.chunk_index {
                Some(index) => {
                    let chunk = ChunkAssignment::new(index, chunks)?;
                    dispatcher
                        .run_chunk(&batch, chunk, &mut Namespace::new(), confirmer(self.interactive, &mut prompter))
                        .await
                }
                None => {
                    dispatcher
                        .run_chunks(&batch, chunks, confirmer(self.interactive, &mut prompter))
                        .await?
                }
            },
            (strategy, _) => {
                dispatcher
                    .dispatch(&batch, strategy, &mut Namespace::new(), &mut prompter)
                    .await?
            }
        };

        finish(&report, config.verbose)
    }

    /// Reject flag combinations before any input is read
    pub fn validate(&self) -> Result<()> {
        let delimiters = [self.null, self.lines, self.delim.is_some()];
        if delimiters.iter().filter(|set| **set).count() > 1 {
            return Err(CliError::configuration(
                "--null, --lines and --delim are mutually exclusive",
            ));
        }
        if self.split.is_some() && self.groups.is_some() {
            return Err(CliError::configuration(
                "--split and --groups are mutually exclusive",
            ));
        }
        if self.delim.as_deref() == Some("") {
            return Err(CliError::configuration("--delim must not be empty"));
        }
        if self.replace_str.as_deref() == Some("") {
            return Err(CliError::configuration("--replace-str must not be empty"));
        }
        if let Some([_, _, placeholder]) = self.resub.as_deref() {
            if placeholder.is_empty() {
                return Err(CliError::configuration("--resub placeholder must not be empty"));
            }
        }
        if let Some(ref base) = self.base_dir {
            if !base.is_dir() {
                return Err(CliError::configuration(format!(
                    "base directory {} is not a directory",
                    base.display()
                )));
            }
        }

        let pool = self.max_procs.map(|n| if n == 0 { num_cpus::get() } else { n });
        let parallel = pool.is_some_and(|n| n > 1);
        if parallel && self.interactive {
            return Err(CliError::configuration(
                "--interactive cannot be combined with --max-procs greater than 1",
            ));
        }

        match self.chunks {
            Some(0) => {
                return Err(CliError::configuration("--chunks must be greater than zero"));
            }
            Some(_) if parallel => {
                return Err(CliError::configuration(
                    "--chunks cannot be combined with --max-procs greater than 1",
                ));
            }
            Some(_) if self.interactive && self.no_mux && self.chunk_index.is_none() => {
                return Err(CliError::configuration(
                    "--interactive with --chunks and --no-mux needs a --chunk-index",
                ));
            }
            Some(chunks) => {
                if let Some(index) = self.chunk_index {
                    if index >= chunks {
                        return Err(CliError::configuration(format!(
                            "--chunk-index {} out of range for {} chunk(s)",
                            index, chunks
                        )));
                    }
                }
            }
            None => {
                if self.chunk_index.is_some() {
                    return Err(CliError::configuration("--chunk-index requires --chunks"));
                }
                if self.no_mux {
                    return Err(CliError::configuration("--no-mux requires --chunks"));
                }
            }
        }
        if self.batch_file.is_some() && self.chunk_index.is_none() {
            return Err(CliError::configuration("--batch-file requires --chunk-index"));
        }
        Ok(())
    }

    /// Dispatch strategy for this run
    pub fn strategy(&self, config: &Config) -> Strategy {
        if let Some(chunks) = self.chunks {
            return Strategy::MultiplexedChunks(chunks);
        }
        if self.interactive {
            return Strategy::Interactive;
        }
        match config.pool_size() {
            1 => Strategy::Sequential,
            n => Strategy::WorkerPool(n),
        }
    }

    fn launches_windows(&self) -> bool {
        !self.no_mux && self.chunk_index.is_none()
    }

    fn executor(&self, config: &Config) -> ProcessExecutor {
        match config.shell {
            Some(ref shell) => ProcessExecutor::new(shell.clone()),
            None => ProcessExecutor::from_env(),
        }
    }

    fn base_dir(&self) -> Result<PathBuf> {
        let base = match self.base_dir {
            Some(ref dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(base.canonicalize()?)
    }

    fn stream_flag_given(&self) -> bool {
        self.null
            || self.lines
            || self.delim.is_some()
            || self.arg_file.is_some()
            || self.eof_str.is_some()
    }

    /// Resolve the input mode, draining standard input when auto-detecting
    pub fn resolve_mode(&self) -> Result<(InputMode, StreamSource)> {
        let source = match self.arg_file {
            Some(ref path) => StreamSource::File(path.clone()),
            None => StreamSource::Stdin,
        };
        if self.stream_flag_given() {
            if self.mode.is_some_and(|m| m.is_walk()) {
                debug!("Stream options given, using stdin mode");
            }
            return Ok((InputMode::Stdin, source));
        }
        if let Some(mode) = self.mode {
            return Ok((mode, source));
        }

        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Ok((InputMode::File, source));
        }
        let mut buf = Vec::new();
        stdin.lock().read_to_end(&mut buf)?;
        let text = String::from_utf8_lossy(&buf).into_owned();
        if text.trim().is_empty() {
            debug!("Standard input is empty, walking the base directory");
            Ok((InputMode::File, source))
        } else {
            Ok((InputMode::Stdin, StreamSource::Text(text)))
        }
    }

    fn delimiter(&self) -> Result<Delimiter> {
        Ok(if self.null {
            Delimiter::Null
        } else if self.lines {
            Delimiter::Newline
        } else if let Some(ref delim) = self.delim {
            Delimiter::literal(delim.clone())?
        } else {
            Delimiter::Whitespace
        })
    }

    /// Construction settings for this run
    pub fn builder_config(
        &self,
        mode: InputMode,
        base_dir: &Path,
        config: &Config,
    ) -> Result<BuilderConfig> {
        let mut builder = BuilderConfig::new(mode, base_dir);
        builder.replace_str = config.replace_str.clone();
        builder.max_chars = self.max_chars;
        builder.style = if self.shell {
            ExecutionStyle::ShellString
        } else {
            ExecutionStyle::ArgVector
        };

        if let Some(ref pattern) = self.regex {
            let mut filter = Filter::new(compile(pattern)?);
            filter.omit = self.omit;
            if self.fname {
                filter.target = FilterTarget::Basename;
            }
            builder.filter = Some(filter);
        }

        if let Some(ref resub) = self.resub {
            if let [pattern, replacement, placeholder] = resub.as_slice() {
                builder.resub = Some(Resub {
                    pattern: compile(pattern)?,
                    replacement: replacement.clone(),
                    placeholder: placeholder.clone(),
                });
            }
        }

        builder.format = match (&self.split, &self.groups) {
            (Some(pattern), _) => Some(Splitter::Split(compile(pattern)?)),
            (None, Some(pattern)) => Some(Splitter::Groups(compile(pattern)?)),
            (None, None) if self.format => Some(Splitter::Whole),
            (None, None) => None,
        };
        Ok(builder)
    }

    fn build_batch(&self, base_dir: &Path, config: &Config) -> Result<Batch> {
        let (mode, source) = self.resolve_mode()?;
        let options = EnumerateOptions {
            walk: WalkOptions {
                folders: self.folders,
                top_level_only: self.top,
                follow_symlinks: self.sym,
            },
            stream: StreamOptions {
                source,
                delimiter: self.delimiter()?,
                eof_str: self.eof_str.clone(),
            },
        };
        let builder = CommandBuilder::new(
            self.command.clone(),
            self.builder_config(mode, base_dir, config)?,
        );
        debug!("Placement for this run: {:?}", builder.placement());
        let items = enumerate(mode, base_dir, &options)?;
        Ok(assemble(items, &builder))
    }
}

fn confirmer(interactive: bool, prompter: &mut TerminalPrompter) -> Option<&mut dyn Prompter> {
    if interactive {
        Some(prompter as &mut dyn Prompter)
    } else {
        None
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| CliError::Core(e.into()))
}

/// Arguments this process was started with, minus the program name
fn original_args() -> Vec<String> {
    std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

fn finish(report: &RunReport, verbose: bool) -> Result<()> {
    info!(
        "{} succeeded, {} failed, {} skipped, {} rejected",
        report.succeeded(),
        report.failed(),
        report.skipped(),
        report.rejected.len()
    );
    if verbose {
        for failure in report.failures() {
            eprintln!(
                "{}",
                format!("{}: {}", failure.command, failure.outcome).red()
            );
        }
    }
    if report.aborted {
        return Err(CliError::Aborted);
    }
    Ok(())
}

/// Usage line printed when no command is given
pub fn usage() -> String {
    Cli::command().render_usage().to_string()
}

/// Generate shell completion script
fn generate_completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
