//! Command construction
//!
//! Turns one enumerated input plus the shared command template into a
//! concrete [`CommandRecord`], or a [`Rejection`] that skips the input.
//! Steps run in a fixed order: resolve, filter, copy the template, regex
//! substitution, placement, length guard, shape normalization.

use crate::core::batch::CommandRecord;
use crate::core::input::{InputItem, InputMode};
use crate::core::template::{format_positional, FormatError, Splitter};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default replace-string marker
pub const DEFAULT_REPLACE_STR: &str = "{}";

/// A constructed command, either an argument vector or a shell string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CommandLine {
    Argv(Vec<String>),
    Shell(String),
}

impl CommandLine {
    /// Shell-parsable text for display or script evaluation
    pub fn text(&self) -> String {
        match self {
            Self::Shell(s) => s.clone(),
            Self::Argv(tokens) => shell_join(tokens),
        }
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

/// How constructed commands are shaped, chosen once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionStyle {
    /// Run the tokens directly, no shell interpretation
    #[default]
    ArgVector,
    /// Hand a single string to a shell or evaluator
    ShellString,
}

/// Why an input produced no command
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    #[error("filtered out by regex")]
    Filtered,

    #[error("command is {length} characters, limit is {limit}")]
    TooLong { length: usize, limit: usize },

    #[error("substitution failed: {0}")]
    Substitution(String),
}

impl From<FormatError> for Rejection {
    fn from(err: FormatError) -> Self {
        Self::Substitution(err.to_string())
    }
}

/// What the filter regex is searched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterTarget {
    /// Path relative to the base directory for walks, the token for streams
    #[default]
    RelativePath,
    /// Entry name only
    Basename,
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub regex: Regex,
    /// Keep inputs that do not match instead
    pub omit: bool,
    pub target: FilterTarget,
}

impl Filter {
    pub fn new(regex: Regex) -> Self {
        Self {
            regex,
            omit: false,
            target: FilterTarget::default(),
        }
    }

    fn accepts(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack) != self.omit
    }
}

/// Regex find/replace applied to the input, injected at its own placeholder
#[derive(Debug, Clone)]
pub struct Resub {
    pub pattern: Regex,
    /// Replacement in `regex` syntax (`$1`, `${name}`)
    pub replacement: String,
    pub placeholder: String,
}

impl Resub {
    fn apply(&self, input: &str) -> String {
        self.pattern
            .replace_all(input, self.replacement.as_str())
            .into_owned()
    }
}

/// Placement strategy, decided once from the raw template
#[derive(Debug, Clone)]
pub enum Placement {
    /// Input becomes one trailing token
    Append,
    /// Every replace-string occurrence becomes the input
    Replace(String),
    /// Input is split and formatted into `{N}` positions
    Positional(Splitter),
}

impl Placement {
    /// Decide the strategy for a whole run.
    ///
    /// Positional formatting and regex substitution always disable append,
    /// as does any placeholder in any template token.
    pub fn decide(
        template: &[String],
        replace_str: &str,
        format: Option<Splitter>,
        resub: Option<&Resub>,
    ) -> Self {
        if let Some(splitter) = format {
            return Self::Positional(splitter);
        }
        let has_placeholder = template.iter().any(|t| t.contains(replace_str));
        if has_placeholder || resub.is_some() {
            Self::Replace(replace_str.to_string())
        } else {
            Self::Append
        }
    }
}

/// Per-run construction settings
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub mode: InputMode,
    pub base_dir: PathBuf,
    pub filter: Option<Filter>,
    pub resub: Option<Resub>,
    pub replace_str: String,
    /// Positional formatting when set
    pub format: Option<Splitter>,
    pub max_chars: Option<usize>,
    pub style: ExecutionStyle,
}

impl BuilderConfig {
    pub fn new(mode: InputMode, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            base_dir: base_dir.into(),
            filter: None,
            resub: None,
            replace_str: DEFAULT_REPLACE_STR.to_string(),
            format: None,
            max_chars: None,
            style: ExecutionStyle::default(),
        }
    }
}

/// Builds command records from a read-only template
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    template: Vec<String>,
    placement: Placement,
    config: BuilderConfig,
}

impl CommandBuilder {
    pub fn new(template: Vec<String>, config: BuilderConfig) -> Self {
        let placement = Placement::decide(
            &template,
            &config.replace_str,
            config.format.clone(),
            config.resub.as_ref(),
        );
        Self {
            template,
            placement,
            config,
        }
    }

    pub fn template(&self) -> &[String] {
        &self.template
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn mode(&self) -> InputMode {
        self.config.mode
    }

    /// Build the command for one input
    pub fn build(&self, item: &InputItem) -> Result<CommandRecord, Rejection> {
        let input = self.resolve(item);

        if let Some(filter) = &self.config.filter {
            let haystack = self.filter_haystack(item, &input);
            if !filter.accepts(&haystack) {
                return Err(Rejection::Filtered);
            }
        }

        let mut tokens = self.template.clone();

        if let Some(resub) = &self.config.resub {
            let derived = resub.apply(&input);
            for token in tokens.iter_mut() {
                *token = token.replace(&resub.placeholder, &derived);
            }
        }

        let mut parts = None;
        match &self.placement {
            Placement::Positional(splitter) => {
                let split = splitter.split(&input)?;
                for token in tokens.iter_mut() {
                    *token = format_positional(token, &split)?;
                }
                parts = Some(split);
            }
            Placement::Append => tokens.push(input.clone()),
            Placement::Replace(marker) => {
                for token in tokens.iter_mut() {
                    *token = token.replace(marker.as_str(), &input);
                }
            }
        }

        if let Some(limit) = self.config.max_chars {
            let length = tokens.join(" ").chars().count();
            if length > limit {
                return Err(Rejection::TooLong { length, limit });
            }
        }

        let command = match self.config.style {
            ExecutionStyle::ArgVector => CommandLine::Argv(tokens),
            ExecutionStyle::ShellString => CommandLine::Shell(self.shell_text(tokens)?),
        };

        Ok(CommandRecord {
            dir: self.working_dir(item),
            command,
            input,
            parts,
        })
    }

    /// One shell string from the built tokens.
    ///
    /// A single template token is already shell text and is kept verbatim;
    /// several tokens are one word each. An appended input is always quoted
    /// as a word of its own.
    fn shell_text(&self, mut tokens: Vec<String>) -> Result<String, Rejection> {
        let appended = match self.placement {
            Placement::Append => tokens.pop(),
            _ => None,
        };
        let mut text = match tokens.len() {
            0 => String::new(),
            1 => tokens.remove(0),
            _ => shlex::try_join(tokens.iter().map(String::as_str))
                .map_err(|e| Rejection::Substitution(e.to_string()))?,
        };
        if let Some(input) = appended {
            let quoted =
                shlex::try_quote(&input).map_err(|e| Rejection::Substitution(e.to_string()))?;
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&quoted);
        }
        Ok(text)
    }

    fn resolve(&self, item: &InputItem) -> String {
        if let Some(text) = &item.text {
            return text.clone();
        }
        let name = item.name.as_deref().unwrap_or_default();
        let path = item.path().unwrap_or_else(|| item.dir.clone());
        match self.config.mode {
            InputMode::File | InputMode::Stdin => name.to_string(),
            InputMode::Path => self.relative_path(&path),
            InputMode::Abspath => path.to_string_lossy().into_owned(),
        }
    }

    fn filter_haystack(&self, item: &InputItem, resolved: &str) -> String {
        let target = self
            .config
            .filter
            .as_ref()
            .map(|f| f.target)
            .unwrap_or_default();
        match (&item.name, item.path(), target) {
            (Some(name), _, FilterTarget::Basename) => name.clone(),
            (_, Some(path), FilterTarget::RelativePath) => self.relative_path(&path),
            _ => resolved.to_string(),
        }
    }

    /// Path below the base directory; the base itself is `.`
    fn relative_path(&self, full: &Path) -> String {
        let relative = full.strip_prefix(&self.config.base_dir).unwrap_or(full);
        if relative.as_os_str().is_empty() {
            return ".".to_string();
        }
        relative.to_string_lossy().into_owned()
    }

    fn working_dir(&self, item: &InputItem) -> PathBuf {
        match self.config.mode {
            InputMode::File => item.dir.clone(),
            _ => self.config.base_dir.clone(),
        }
    }
}

/// Join tokens so a POSIX shell parses them back unchanged
pub fn shell_join(tokens: &[String]) -> String {
    shlex::try_join(tokens.iter().map(String::as_str))
        .unwrap_or_else(|_| tokens.join(" "))
}
