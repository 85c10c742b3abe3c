//! Error types for script function calls

use std::fmt;

use scripthook_sdk::{ErrorCode, ExecutionState, TypeId};

/// Stage of a call at which a callable rejected it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStage {
    /// Before arguments were pushed
    SetArguments,
    /// After arguments were pushed, before execution
    Execute,
    /// After execution
    Completion,
}

impl fmt::Display for CallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallStage::SetArguments => "argument setup",
            CallStage::Execute => "execution",
            CallStage::Completion => "completion",
        })
    }
}

/// Error type for script function calls
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The callable failed its own validity check
    #[error("Invalid callable for '{0}'")]
    InvalidCallable(String),

    /// No context could be borrowed from the engine pool
    #[error("Failed to acquire a script context: {0}")]
    ContextUnavailable(ErrorCode),

    /// The context refused to prepare the function
    #[error("Failed to prepare '{function}': {code}")]
    Prepare { function: String, code: ErrorCode },

    /// A callable stage hook aborted the call
    #[error("Call to '{function}' rejected during {stage}")]
    Rejected { function: String, stage: CallStage },

    /// Wrong number of arguments for the function
    #[error("'{function}' expects {expected} arguments, got {actual}")]
    ArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// An argument could not be pushed into the call frame
    #[error("Failed to set argument {index} ({kind}) of '{function}': {code}")]
    Argument {
        function: String,
        index: usize,
        kind: &'static str,
        code: ErrorCode,
    },

    /// The script raised an exception
    #[error("Script exception in '{function}': {message}")]
    Exception { function: String, message: String },

    /// Execution ended in a state other than finished
    #[error("Execution of '{function}' ended in state {state:?}")]
    Execution {
        function: String,
        state: ExecutionState,
    },

    /// The context produced no return value of the declared type
    #[error("'{function}' returned no value of type {type_id:#x}")]
    ReturnValue { function: String, type_id: TypeId },

    /// The return value could not be converted to the requested type
    #[error("Expected return value of type {expected}, found {found}")]
    ReturnType {
        expected: &'static str,
        found: &'static str,
    },
}
