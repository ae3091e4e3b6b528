//! Terminal multiplexer command builder and runner.
//!
//! [`Multiplexer`] only builds argument vectors; a [`MuxRunner`] executes
//! them. The tool never implements session management itself.

use crate::core::builder::shell_join;
use crate::core::{Error, Result};
use std::collections::VecDeque;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Multiplexer programs tried in order when none is configured
pub const CANDIDATES: &[&str] = &["tmux", "byobu"];

/// Window name for chunk `index`
pub fn window_name(index: usize) -> String {
    format!("chunk-{}", index)
}

/// A resolved multiplexer executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multiplexer {
    name: String,
    program: PathBuf,
}

impl Multiplexer {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
        }
    }

    /// First candidate found on `PATH`
    pub fn detect<S: AsRef<str>>(preferences: &[S]) -> Result<Self> {
        for name in preferences {
            let name = name.as_ref();
            if let Ok(program) = which::which(name) {
                debug!("Using multiplexer {} at {}", name, program.display());
                return Ok(Self::new(name, program));
            }
        }
        let tried: Vec<&str> = preferences.iter().map(AsRef::as_ref).collect();
        Err(Error::multiplexer(format!(
            "no terminal multiplexer found (tried: {})",
            tried.join(", ")
        )))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `new-session -d -s <session> -n chunk-0 -c <cwd> <command>`
    pub fn new_session(&self, session: &str, cwd: &Path, command: &[String]) -> Vec<String> {
        vec![
            "new-session".to_string(),
            "-d".to_string(),
            "-s".to_string(),
            session.to_string(),
            "-n".to_string(),
            window_name(0),
            "-c".to_string(),
            cwd.to_string_lossy().into_owned(),
            shell_join(command),
        ]
    }

    /// `new-window -t <session>: -n chunk-<index> -c <cwd> <command>`
    pub fn new_window(
        &self,
        session: &str,
        index: usize,
        cwd: &Path,
        command: &[String],
    ) -> Vec<String> {
        vec![
            "new-window".to_string(),
            "-t".to_string(),
            format!("{}:", session),
            "-n".to_string(),
            window_name(index),
            "-c".to_string(),
            cwd.to_string_lossy().into_owned(),
            shell_join(command),
        ]
    }

    /// `attach-session -t <session>`, or `switch-client -t <session>` when
    /// already running inside a multiplexer client
    pub fn attach(&self, session: &str, nested: bool) -> Vec<String> {
        let verb = if nested { "switch-client" } else { "attach-session" };
        vec![verb.to_string(), "-t".to_string(), session.to_string()]
    }

    /// `kill-session -t <session>`
    pub fn kill_session(&self, session: &str) -> Vec<String> {
        vec!["kill-session".to_string(), "-t".to_string(), session.to_string()]
    }
}

/// True when this process runs inside a tmux client
pub fn inside_multiplexer() -> bool {
    std::env::var_os("TMUX").is_some_and(|v| !v.is_empty())
}

/// Executes multiplexer commands
pub trait MuxRunner {
    /// Run to completion; non-zero exit is an error
    fn run(&mut self, program: &Path, args: &[String]) -> Result<()>;

    /// Make sure standard input is a terminal the attach can take over
    fn claim_terminal(&mut self) -> Result<()>;

    /// Hand the terminal over until the user detaches
    fn attach(&mut self, program: &Path, args: &[String]) -> Result<()>;
}

/// Production runner spawning the multiplexer directly
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl MuxRunner for ProcessRunner {
    fn run(&mut self, program: &Path, args: &[String]) -> Result<()> {
        debug!("{} {}", program.display(), args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::multiplexer(format!("failed to run {}: {}", program.display(), e)))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::multiplexer(format!(
                "{} {} failed: {}",
                program.display(),
                args.first().map(String::as_str).unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn claim_terminal(&mut self) -> Result<()> {
        if std::io::stdin().is_terminal() {
            return Ok(());
        }
        rebind_stdin_to_tty()
    }

    fn attach(&mut self, program: &Path, args: &[String]) -> Result<()> {
        debug!("{} {}", program.display(), args.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| Error::multiplexer(format!("failed to run {}: {}", program.display(), e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::multiplexer(format!(
                "{} exited with {} while attaching",
                program.display(),
                status
            )))
        }
    }
}

/// Point standard input at the controlling terminal
#[cfg(unix)]
fn rebind_stdin_to_tty() -> Result<()> {
    use std::os::unix::io::AsRawFd;

    let tty = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")
        .map_err(|e| Error::multiplexer(format!("no controlling terminal to attach to: {}", e)))?;
    let ret = unsafe { libc::dup2(tty.as_raw_fd(), libc::STDIN_FILENO) };
    if ret < 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }
    debug!("Standard input rebound to /dev/tty");
    Ok(())
}

#[cfg(not(unix))]
fn rebind_stdin_to_tty() -> Result<()> {
    Err(Error::multiplexer(
        "multiplexed chunks need a unix controlling terminal",
    ))
}

/// Test double recording every command; answers from preset queues
#[derive(Debug, Default)]
pub struct RecordingRunner {
    responses: VecDeque<Result<()>>,
    attach_responses: VecDeque<Result<()>>,
    terminal_error: Option<String>,
    pub commands: Vec<String>,
    pub attached: Vec<String>,
    pub terminal_claims: usize,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: impl IntoIterator<Item = Result<()>>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Answer the next `attach` calls from `responses`
    pub fn with_attach_responses(mut self, responses: impl IntoIterator<Item = Result<()>>) -> Self {
        self.attach_responses = responses.into_iter().collect();
        self
    }

    /// Fail every terminal claim with `message`
    pub fn without_terminal(mut self, message: impl Into<String>) -> Self {
        self.terminal_error = Some(message.into());
        self
    }

    fn record(program: &Path, args: &[String]) -> String {
        let mut line = program.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl MuxRunner for RecordingRunner {
    fn run(&mut self, program: &Path, args: &[String]) -> Result<()> {
        self.commands.push(Self::record(program, args));
        self.responses.pop_front().unwrap_or(Ok(()))
    }

    fn claim_terminal(&mut self) -> Result<()> {
        self.terminal_claims += 1;
        match &self.terminal_error {
            Some(message) => Err(Error::multiplexer(message.clone())),
            None => Ok(()),
        }
    }

    fn attach(&mut self, program: &Path, args: &[String]) -> Result<()> {
        self.attached.push(Self::record(program, args));
        self.attach_responses.pop_front().unwrap_or(Ok(()))
    }
}
