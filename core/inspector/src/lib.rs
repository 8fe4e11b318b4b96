//! Vigil's source-level debugger agent
//!
//! This crate implements the session side of an inspector-style debugging
//! protocol for JavaScript engines. The engine itself (parser, interpreter,
//! garbage collector) is an external collaborator: it reports what it is doing
//! through the hook methods on [`Inspector`] (or through [`InspectorHostHooks`]
//! when it runs on its own thread), and it answers frame-level questions through
//! the [`Runtime`] trait.
//!
//! # Overview
//!
//! - [`ScriptRegistry`]: parsed scripts per context group, with a source-text budget
//! - [`BreakpointStore`]: per-session breakpoint definitions and their resolved locations
//! - [`BlackboxFilter`]: url patterns and script ranges that stepping skips over
//! - [`PauseController`]: the running/paused state machine of one context group
//! - [`StepController`]: step-into/over/out target computation
//! - [`AsyncTaskTracker`]: scheduled continuations and async stack traces
//! - [`Inspector`]: the session manager tying the above together
//! - [`protocol`]: the JSON wire surface (`Debugger.*` methods and events)
//!
//! # Example
//!
//! ```rust,ignore
//! use vigil_inspector::{ContextGroupId, Inspector, InspectorConfig, ScriptInfo, ScriptedRuntime};
//!
//! let mut inspector = Inspector::new(InspectorConfig::default());
//! let group = ContextGroupId(1);
//! inspector.add_context_group(group, ScriptedRuntime::default());
//!
//! let session = inspector.connect(group)?;
//! inspector.enable(session, None)?;
//! inspector.script_parsed(group, ScriptInfo::new("app.js", "debugger;\n"))?;
//! ```

pub mod async_tasks;
pub mod blackbox;
pub mod breakpoint;
pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod host_hooks;
pub mod inspector;
pub mod pause;
pub mod protocol;
pub mod runtime;
pub mod script;
pub mod session;
pub mod step;

pub use async_tasks::{AsyncTask, AsyncTaskKind, AsyncTaskTracker};
pub use blackbox::BlackboxFilter;
pub use breakpoint::{Breakpoint, BreakpointId, BreakpointStore, UrlSpec};
pub use config::{ConditionErrorPolicy, InspectorConfig};
pub use error::{InspectorError, InspectorResult};
pub use event::{Event, EventSubscriptions, Listener, PausedEvent};
pub use frame::{CallFrame, CallFrameId, Location, Position, RemoteObject, Scope, ScopeType, StackTrace};
pub use host_hooks::{DebuggerHooks, InspectorHostHooks};
pub use inspector::{BreakDecision, EvaluateOutcome, Inspector, Scheduled};
pub use pause::{Pause, PauseCause, PauseController, PauseReason, PauseState, ResumeAction};
pub use runtime::{EvalException, Runtime, ScriptedRuntime};
pub use script::{Script, ScriptInfo, ScriptRegistry};
pub use session::{Instrumentation, PauseOnExceptions, Session, SessionState};
pub use step::{StepAction, StepController};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a parsed script.
///
/// Ids are allocated from one counter shared by every context group, so a
/// script id never collides across groups. On the wire it is a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ScriptId(pub u32);

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ScriptId> for String {
    fn from(id: ScriptId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ScriptId {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map(Self)
    }
}

/// Identifier of an isolated execution environment (a page, a worker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextGroupId(pub i32);

impl fmt::Display for ContextGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one debugging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a tracked asynchronous continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AsyncTaskId(pub u64);

impl fmt::Display for AsyncTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
