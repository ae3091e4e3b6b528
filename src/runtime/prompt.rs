//! Interactive confirmation prompts

use crate::core::CommandLine;
use colored::Colorize;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};

/// Answer to a confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Yes,
    No,
    Quit,
}

impl Response {
    /// `y...` runs, `n...` skips, anything else quits (case-insensitive)
    pub fn parse(answer: &str) -> Self {
        match answer.trim_start().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('y') => Self::Yes,
            Some('n') => Self::No,
            _ => Self::Quit,
        }
    }
}

/// Asks the user about records and end-of-chunk acknowledgment
pub trait Prompter {
    fn confirm(&mut self, command: &CommandLine) -> io::Result<Response>;

    /// Block until the user acknowledges `message`
    fn acknowledge(&mut self, message: &str) -> io::Result<()>;
}

/// Where a [`TerminalPrompter`] reads its answers from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Stdin,
    /// The controlling terminal, used when stdin carried the input items
    Tty,
}

impl AnswerSource {
    pub fn for_stdin(stdin_is_terminal: bool) -> Self {
        if stdin_is_terminal {
            Self::Stdin
        } else {
            Self::Tty
        }
    }

    fn open(self) -> io::Result<Box<dyn BufRead>> {
        match self {
            Self::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
            #[cfg(unix)]
            Self::Tty => Ok(Box::new(BufReader::new(File::open("/dev/tty")?))),
            #[cfg(not(unix))]
            Self::Tty => Ok(Box::new(BufReader::new(io::stdin()))),
        }
    }
}

/// Prompts on stderr and reads answers from the terminal.
///
/// The answer stream is opened on the first question, after enumeration
/// has finished with stdin.
#[derive(Default)]
pub struct TerminalPrompter {
    answers: Option<Box<dyn BufRead>>,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read answers from `reader` instead of the terminal
    pub fn with_answers(reader: impl BufRead + 'static) -> Self {
        Self {
            answers: Some(Box::new(reader)),
        }
    }

    fn read_answer(&mut self) -> io::Result<Option<String>> {
        if self.answers.is_none() {
            let source = AnswerSource::for_stdin(io::stdin().is_terminal());
            self.answers = Some(source.open()?);
        }
        let Some(answers) = self.answers.as_mut() else {
            return Ok(None);
        };
        let mut line = String::new();
        let read = answers.read_line(&mut line)?;
        Ok((read > 0).then_some(line))
    }
}

impl std::fmt::Debug for TerminalPrompter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalPrompter")
            .field("opened", &self.answers.is_some())
            .finish()
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, command: &CommandLine) -> io::Result<Response> {
        let mut stderr = io::stderr();
        writeln!(stderr, "{}", command.to_string().green())?;
        write!(stderr, "{} ", "Run command (Yes/No/QUIT)? >".yellow())?;
        stderr.flush()?;

        Ok(self
            .read_answer()?
            .map(|answer| Response::parse(&answer))
            .unwrap_or(Response::Quit))
    }

    fn acknowledge(&mut self, message: &str) -> io::Result<()> {
        let mut stderr = io::stderr();
        write!(stderr, "{}", message.cyan())?;
        stderr.flush()?;
        self.read_answer()?;
        Ok(())
    }
}

/// Test double answering from a fixed script; runs out as `Quit`
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Response>,
    pub asked: Vec<String>,
    pub acknowledged: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Response>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
            acknowledged: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, command: &CommandLine) -> io::Result<Response> {
        self.asked.push(command.text());
        Ok(self.answers.pop_front().unwrap_or(Response::Quit))
    }

    fn acknowledge(&mut self, message: &str) -> io::Result<()> {
        self.acknowledged.push(message.to_string());
        Ok(())
    }
}
