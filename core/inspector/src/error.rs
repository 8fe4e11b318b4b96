//! Error taxonomy of the debugger agent.
//!
//! The `Display` text of each variant is the message clients see in protocol
//! error responses, so it must stay stable.

use crate::{AsyncTaskId, ContextGroupId, ScriptId, SessionId};
use thiserror::Error;

/// Result type for inspector operations.
pub type InspectorResult<T> = Result<T, InspectorError>;

/// Errors returned by inspector commands and engine hooks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectorError {
    /// The command requires `Debugger.enable` first.
    #[error("Debugger agent is not enabled")]
    NotEnabled,

    /// The command requires a live pause.
    #[error("Can only perform operation while paused.")]
    NotPaused,

    /// The call frame id belongs to a pause that has already ended.
    #[error("Could not find call frame with given id")]
    StaleFrame,

    /// A frame between the target and the top of the stack cannot be unwound.
    #[error("Restarting frame failed")]
    RestartNotAllowed,

    /// The script id is unknown or its source has been evicted.
    #[error("No script for id: {0}")]
    ScriptNotFound(ScriptId),

    /// A blackbox pattern or url regex failed to compile.
    #[error("Pattern parser error: {0}")]
    InvalidPattern(String),

    /// Evaluation inside the paused context failed.
    #[error("{0}")]
    EvalError(String),

    /// The session was stopped and can no longer be used.
    #[error("Session has been stopped")]
    SessionStopped,

    /// No session with the given id was ever connected.
    #[error("No session with id: {0}")]
    UnknownSession(SessionId),

    /// No context group with the given id exists.
    #[error("No context group with id: {0}")]
    UnknownContextGroup(ContextGroupId),

    /// No async task with the given id is tracked.
    #[error("No async task with id: {0}")]
    UnknownAsyncTask(AsyncTaskId),

    /// A breakpoint with the same id is already set in this session.
    #[error("Breakpoint at specified location already exists.")]
    BreakpointExists,

    /// `Debugger.setBreakpoint` found no statement at or after the location.
    #[error("Could not resolve breakpoint")]
    UnresolvedBreakpoint,

    /// Request parameters failed validation.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// The protocol method does not exist.
    #[error("'{0}' wasn't found")]
    UnknownMethod(String),

    /// An internal invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InspectorError {
    /// JSON-RPC error code used when this error is sent over the wire.
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Self::UnknownMethod(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Internal(_) => -32603,
            _ => -32000,
        }
    }
}
