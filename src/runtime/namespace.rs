//! Per-unit execution context.
//!
//! A [`Namespace`] lives for exactly one dispatch unit: the whole run for
//! sequential and interactive dispatch, one record for a pool worker, one
//! chunk for a subordinate window. Values set by one record stay visible to
//! later records of the same unit; loop variables are refreshed before each.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Loop-position variable names
pub mod vars {
    pub const INDEX: &str = "i";
    pub const REMAINING: &str = "remaining";
    pub const TOTAL: &str = "total";
    pub const INPUT: &str = "input";
    pub const DIR: &str = "dir";
    pub const PREV: &str = "prev";
    pub const NEXT: &str = "next";
}

/// Position of the current record within its unit
#[derive(Debug, Clone)]
pub struct LoopPosition<'a> {
    pub index: usize,
    pub total: usize,
    pub input: &'a str,
    pub dir: &'a Path,
    pub prev: Option<&'a str>,
    pub next: Option<&'a str>,
}

impl LoopPosition<'_> {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.index + 1)
    }
}

/// Mutable key-value store shared by the records of one unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    values: BTreeMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Overwrite the loop variables for the record about to run
    pub fn refresh(&mut self, position: &LoopPosition<'_>) {
        self.set(vars::INDEX, position.index);
        self.set(vars::REMAINING, position.remaining());
        self.set(vars::TOTAL, position.total);
        self.set(vars::INPUT, position.input);
        self.set(vars::DIR, position.dir.to_string_lossy().into_owned());
        self.set(vars::PREV, position.prev.unwrap_or_default());
        self.set(vars::NEXT, position.next.unwrap_or_default());
    }

    /// Loop variables as environment variables for child processes
    pub fn loop_env(&self) -> Vec<(String, String)> {
        [
            (vars::INDEX, "RXARGS_INDEX"),
            (vars::REMAINING, "RXARGS_REMAINING"),
            (vars::TOTAL, "RXARGS_TOTAL"),
            (vars::INPUT, "RXARGS_INPUT"),
            (vars::DIR, "RXARGS_DIR"),
        ]
        .iter()
        .filter_map(|(key, env)| {
            self.get(key).map(|value| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (env.to_string(), text)
            })
        })
        .collect()
    }
}
