//! Execution primitives
//!
//! This module handles:
//! - Argument-vector execution (no shell interpretation)
//! - Shell-string execution through the configured shell
//! - Routing command text into an embedded evaluator
//!
//! The working directory is passed to each child process; the parent never
//! changes its own directory.

use crate::core::{CommandLine, CommandRecord, Rejection};
use crate::runtime::namespace::Namespace;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::process::Command;
use tracing::debug;

/// Result of handling one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Declined at an interactive prompt
    Skipped,
    /// Displayed but not run
    DryRun,
    Success,
    /// Child exited unsuccessfully; `None` when killed by a signal
    ChildNonZeroExit(Option<i32>),
    BuilderRejected(String),
    SubstitutionError(String),
    /// Spawn failure or evaluator exception
    ExecutionError(String),
}

impl ExecutionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ChildNonZeroExit(_) | Self::SubstitutionError(_) | Self::ExecutionError(_)
        )
    }
}

impl std::fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::DryRun => write!(f, "dry run"),
            Self::Success => write!(f, "success"),
            Self::ChildNonZeroExit(Some(code)) => write!(f, "exited with status {}", code),
            Self::ChildNonZeroExit(None) => write!(f, "terminated by signal"),
            Self::BuilderRejected(reason) => write!(f, "rejected: {}", reason),
            Self::SubstitutionError(reason) => write!(f, "substitution error: {}", reason),
            Self::ExecutionError(reason) => write!(f, "execution error: {}", reason),
        }
    }
}

impl From<&Rejection> for ExecutionOutcome {
    fn from(rejection: &Rejection) -> Self {
        match rejection {
            Rejection::Substitution(reason) => Self::SubstitutionError(reason.clone()),
            other => Self::BuilderRejected(other.to_string()),
        }
    }
}

/// Runs one command record
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, record: &CommandRecord, namespace: &mut Namespace) -> ExecutionOutcome;
}

/// Runs commands as child processes
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    shell: String,
}

impl ProcessExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Use `$SHELL`, falling back to `/bin/sh`
    pub fn from_env() -> Self {
        Self::new(std::env::var("SHELL").unwrap_or_else(|_| DEFAULT_SHELL.to_string()))
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    fn command_for(&self, line: &CommandLine) -> Option<Command> {
        match line {
            CommandLine::Argv(tokens) => {
                let (program, args) = tokens.split_first()?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                Some(cmd)
            }
            CommandLine::Shell(script) => {
                let mut cmd = Command::new(&self.shell);
                cmd.arg("-c").arg(script);
                Some(cmd)
            }
        }
    }
}

pub const DEFAULT_SHELL: &str = "/bin/sh";

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, record: &CommandRecord, namespace: &mut Namespace) -> ExecutionOutcome {
        let Some(mut cmd) = self.command_for(&record.command) else {
            return ExecutionOutcome::ExecutionError("empty command".to_string());
        };
        cmd.current_dir(&record.dir).envs(namespace.loop_env());

        debug!("Running `{}` in {}", record.command, record.dir.display());
        match cmd.status().await {
            Ok(status) if status.success() => ExecutionOutcome::Success,
            Ok(status) => {
                debug!("`{}` exited with {}", record.command, status);
                ExecutionOutcome::ChildNonZeroExit(status.code())
            }
            Err(e) => {
                debug!("Failed to start `{}`: {}", record.command, e);
                ExecutionOutcome::ExecutionError(e.to_string())
            }
        }
    }
}

/// In-process interpreter for command text.
///
/// Implementations evaluate `code` against the unit's namespace and may
/// read or mutate any value in it.
pub trait Evaluator: Send + Sync {
    fn eval(&self, code: &str, namespace: &mut Namespace) -> Result<serde_json::Value, String>;
}

/// Routes command text into an [`Evaluator`]
pub struct ScriptExecutor<E> {
    evaluator: E,
    last_value: Mutex<Option<serde_json::Value>>,
}

impl<E: Evaluator> ScriptExecutor<E> {
    pub fn new(evaluator: E) -> Self {
        Self {
            evaluator,
            last_value: Mutex::new(None),
        }
    }

    /// Value produced by the most recent successful evaluation
    pub fn last_value(&self) -> Option<serde_json::Value> {
        self.last_value.lock().ok().and_then(|v| v.clone())
    }
}

#[async_trait]
impl<E: Evaluator> Executor for ScriptExecutor<E> {
    async fn execute(&self, record: &CommandRecord, namespace: &mut Namespace) -> ExecutionOutcome {
        let code = record.command.text();
        match self.evaluator.eval(&code, namespace) {
            Ok(value) => {
                if let Ok(mut last) = self.last_value.lock() {
                    *last = Some(value);
                }
                ExecutionOutcome::Success
            }
            Err(e) => {
                debug!("Evaluation of `{}` failed: {}", code, e);
                ExecutionOutcome::ExecutionError(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::namespace::{vars, LoopPosition};
    use serde_json::Value;
    use std::path::{Path, PathBuf};

    fn record(dir: &Path, command: CommandLine) -> CommandRecord {
        CommandRecord {
            dir: dir.to_path_buf(),
            command,
            input: "x".to_string(),
            parts: None,
        }
    }

    fn argv(tokens: &[&str]) -> CommandLine {
        CommandLine::Argv(tokens.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_rejections_become_outcomes() {
        let filtered = ExecutionOutcome::from(&Rejection::Filtered);
        assert_eq!(filtered, ExecutionOutcome::BuilderRejected("filtered out by regex".into()));
        assert!(!filtered.is_failure());

        let too_long = ExecutionOutcome::from(&Rejection::TooLong { length: 7, limit: 5 });
        assert!(matches!(too_long, ExecutionOutcome::BuilderRejected(_)));

        let substitution = ExecutionOutcome::from(&Rejection::Substitution("no {3}".into()));
        assert_eq!(substitution, ExecutionOutcome::SubstitutionError("no {3}".into()));
        assert!(substitution.is_failure());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_executor_outcomes() {
        let executor = ProcessExecutor::new(DEFAULT_SHELL);
        let dir = std::env::temp_dir();
        let mut ns = Namespace::new();

        let ok = executor.execute(&record(&dir, argv(&["true"])), &mut ns).await;
        assert_eq!(ok, ExecutionOutcome::Success);

        let failed = executor
            .execute(&record(&dir, CommandLine::Shell("exit 3".into())), &mut ns)
            .await;
        assert_eq!(failed, ExecutionOutcome::ChildNonZeroExit(Some(3)));

        let missing = executor
            .execute(&record(&dir, argv(&["definitely-not-a-real-program-rx"])), &mut ns)
            .await;
        assert!(matches!(missing, ExecutionOutcome::ExecutionError(_)));

        let empty = executor.execute(&record(&dir, argv(&[])), &mut ns).await;
        assert!(matches!(empty, ExecutionOutcome::ExecutionError(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_executor_uses_record_dir_and_env() {
        let temp = tempfile::TempDir::new().unwrap();
        let executor = ProcessExecutor::new(DEFAULT_SHELL);
        let mut ns = Namespace::new();
        ns.refresh(&LoopPosition {
            index: 0,
            total: 1,
            input: "x",
            dir: temp.path(),
            prev: None,
            next: None,
        });

        let script = "pwd > where.txt && printf %s \"$RXARGS_TOTAL\" > total.txt";
        let outcome = executor
            .execute(&record(temp.path(), CommandLine::Shell(script.into())), &mut ns)
            .await;
        assert_eq!(outcome, ExecutionOutcome::Success);

        let where_ = std::fs::read_to_string(temp.path().join("where.txt")).unwrap();
        assert_eq!(
            PathBuf::from(where_.trim()).canonicalize().unwrap(),
            temp.path().canonicalize().unwrap()
        );
        let total = std::fs::read_to_string(temp.path().join("total.txt")).unwrap();
        assert_eq!(total, "1");
    }

    struct Counter;

    impl Evaluator for Counter {
        fn eval(&self, code: &str, ns: &mut Namespace) -> Result<Value, String> {
            if code == "fail" {
                return Err("boom".to_string());
            }
            let count = ns.get("count").and_then(Value::as_i64).unwrap_or(0) + 1;
            ns.set("count", count);
            Ok(ns.get(vars::INPUT).cloned().unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn test_script_executor_shares_namespace() {
        let executor = ScriptExecutor::new(Counter);
        let mut ns = Namespace::new();
        ns.set(vars::INPUT, "first");
        let dir = std::env::temp_dir();

        let line = CommandLine::Shell("count += 1".into());
        assert_eq!(
            executor.execute(&record(&dir, line.clone()), &mut ns).await,
            ExecutionOutcome::Success
        );
        assert_eq!(
            executor.execute(&record(&dir, line), &mut ns).await,
            ExecutionOutcome::Success
        );
        assert_eq!(ns.get("count"), Some(&Value::from(2)));
        assert_eq!(executor.last_value(), Some(Value::from("first")));

        let failed = executor
            .execute(&record(&dir, CommandLine::Shell("fail".into())), &mut ns)
            .await;
        assert_eq!(failed, ExecutionOutcome::ExecutionError("boom".to_string()));
    }

    #[test]
    fn test_outcome_display_and_failure() {
        assert_eq!(
            ExecutionOutcome::ChildNonZeroExit(Some(2)).to_string(),
            "exited with status 2"
        );
        assert!(ExecutionOutcome::ExecutionError("x".into()).is_failure());
        assert!(!ExecutionOutcome::Skipped.is_failure());
        assert!(!ExecutionOutcome::DryRun.is_failure());
    }
}
