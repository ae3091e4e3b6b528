//! Positional formatting of command tokens.
//!
//! Tokens use `{}` (next position), `{N}` (explicit position) and `{{` / `}}`
//! for literal braces. The parts come from splitting the resolved input.

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("position {index} requested but only {available} part(s) available")]
    MissingPart { index: usize, available: usize },

    #[error("invalid replacement field '{{{0}}}'")]
    InvalidField(String),

    #[error("unmatched '{0}' in format token")]
    Unmatched(char),

    #[error("cannot mix automatic and manual field numbering")]
    MixedNumbering,

    #[error("groups pattern did not match input '{0}'")]
    NoMatch(String),
}

/// How the resolved input is broken into positional parts
#[derive(Debug, Clone)]
pub enum Splitter {
    /// The whole input is part `{0}`
    Whole,
    /// Split on every match of the pattern
    Split(Regex),
    /// Take the capture groups of the first match
    Groups(Regex),
}

impl Splitter {
    pub fn split(&self, input: &str) -> Result<Vec<String>, FormatError> {
        match self {
            Self::Whole => Ok(vec![input.to_string()]),
            Self::Split(re) => Ok(re.split(input).map(String::from).collect()),
            Self::Groups(re) => {
                let caps = re
                    .captures(input)
                    .ok_or_else(|| FormatError::NoMatch(input.to_string()))?;
                Ok(caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect())
            }
        }
    }
}

/// Substitute positional parts into one token
pub fn format_positional(token: &str, parts: &[String]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars().peekable();
    let mut next_auto = 0usize;
    let mut used_auto = false;
    let mut used_manual = false;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(FormatError::Unmatched('}')),
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err(FormatError::Unmatched('{')),
                    }
                }

                let index = if field.is_empty() {
                    used_auto = true;
                    next_auto += 1;
                    next_auto - 1
                } else {
                    used_manual = true;
                    field
                        .parse::<usize>()
                        .map_err(|_| FormatError::InvalidField(field.clone()))?
                };
                if used_auto && used_manual {
                    return Err(FormatError::MixedNumbering);
                }

                let part = parts.get(index).ok_or(FormatError::MissingPart {
                    index,
                    available: parts.len(),
                })?;
                out.push_str(part);
            }
            c => out.push(c),
        }
    }

    Ok(out)
}
