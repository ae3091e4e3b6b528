//! Side-effecting half of a run: executing records, dispatching them under a
//! strategy, and handing chunks off to multiplexer windows.

pub mod dispatch;
pub mod executor;
pub mod handoff;
pub mod mux;
pub mod namespace;
pub mod prompt;


pub use dispatch::{
    DispatchOptions, Dispatcher, RecordResult, RejectedResult, RunReport, Strategy,
};
pub use executor::{
    Evaluator, ExecutionOutcome, Executor, ProcessExecutor, ScriptExecutor, DEFAULT_SHELL,
};
pub use handoff::{launch, load_batch, run_subordinate, store_batch, Invocation, Launch};
pub use mux::{Multiplexer, MuxRunner, ProcessRunner, RecordingRunner, CANDIDATES};
pub use namespace::{LoopPosition, Namespace};
pub use prompt::{AnswerSource, Prompter, Response, ScriptedPrompter, TerminalPrompter};
