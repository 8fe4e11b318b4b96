//! Per-session debugger state.
//!
//! A session is one client connection to a context group. Everything a client
//! configures (breakpoints, blackboxing, exception pausing) lives here and is
//! invisible to other sessions.

use crate::{
    ContextGroupId, SessionId,
    blackbox::BlackboxFilter,
    breakpoint::BreakpointStore,
    error::{InspectorError, InspectorResult},
};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Whether a session currently receives events and may pause execution.
///
/// A stopped session has no state: the inspector drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, but neither receiving events nor pausing.
    Disabled,
    /// `Debugger.enable` was called.
    Enabled,
}

/// Which exceptions pause execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseOnExceptions {
    /// Never pause on exceptions.
    #[default]
    None,
    /// Pause on exceptions a handler will catch.
    Caught,
    /// Pause on exceptions nothing catches.
    Uncaught,
    /// Pause on every exception.
    All,
}

impl PauseOnExceptions {
    /// Whether an exception, caught or not, pauses under this state.
    pub fn matches(self, uncaught: bool) -> bool {
        match self {
            Self::None => false,
            Self::Caught => !uncaught,
            Self::Uncaught => uncaught,
            Self::All => true,
        }
    }
}

/// Engine-level pause points not tied to a source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Instrumentation {
    /// Before any script runs.
    BeforeScriptExecution,
    /// Before a script with a source map runs.
    BeforeScriptWithSourceMapExecution,
}

impl Instrumentation {
    /// Name used on the wire and in breakpoint ids.
    pub fn name(self) -> &'static str {
        match self {
            Self::BeforeScriptExecution => "beforeScriptExecution",
            Self::BeforeScriptWithSourceMapExecution => "beforeScriptWithSourceMapExecution",
        }
    }

    pub(crate) fn from_breakpoint_id(id: &str) -> Option<Self> {
        match id.strip_prefix("instrumentation:")? {
            "beforeScriptExecution" => Some(Self::BeforeScriptExecution),
            "beforeScriptWithSourceMapExecution" => Some(Self::BeforeScriptWithSourceMapExecution),
            _ => None,
        }
    }

    pub(crate) fn breakpoint_id(self) -> String {
        format!("instrumentation:{}", self.name())
    }
}

/// One client's view of a context group.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    context_group: ContextGroupId,
    pub(crate) state: SessionState,
    pub(crate) breakpoints: BreakpointStore,
    pub(crate) blackbox: BlackboxFilter,
    pub(crate) pause_on_exceptions: PauseOnExceptions,
    pub(crate) skip_all_pauses: bool,
    pub(crate) async_call_stack_depth: u32,
    pub(crate) instrumentation: FxHashSet<Instrumentation>,
}

impl Session {
    pub(crate) fn new(id: SessionId, context_group: ContextGroupId) -> Self {
        Self {
            id,
            context_group,
            state: SessionState::Disabled,
            breakpoints: BreakpointStore::new(),
            blackbox: BlackboxFilter::new(),
            pause_on_exceptions: PauseOnExceptions::None,
            skip_all_pauses: false,
            async_call_stack_depth: 0,
            instrumentation: FxHashSet::default(),
        }
    }

    /// Id of the session.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Context group the session debugs.
    pub fn context_group(&self) -> ContextGroupId {
        self.context_group
    }

    /// Whether the session is enabled.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Shorthand for `state() == SessionState::Enabled`.
    pub fn is_enabled(&self) -> bool {
        self.state == SessionState::Enabled
    }

    /// Breakpoints set by this session.
    pub fn breakpoints(&self) -> &BreakpointStore {
        &self.breakpoints
    }

    /// Url patterns and ranges stepping skips for this session.
    pub fn blackbox(&self) -> &BlackboxFilter {
        &self.blackbox
    }

    /// Which exceptions pause this session.
    pub fn pause_on_exceptions(&self) -> PauseOnExceptions {
        self.pause_on_exceptions
    }

    /// Whether `Debugger.setSkipAllPauses` is on.
    pub fn skips_all_pauses(&self) -> bool {
        self.skip_all_pauses
    }

    /// Requested depth of async stack traces; 0 when off.
    pub fn async_call_stack_depth(&self) -> u32 {
        self.async_call_stack_depth
    }

    pub(crate) fn ensure_enabled(&self) -> InspectorResult<()> {
        match self.state {
            SessionState::Enabled => Ok(()),
            SessionState::Disabled => Err(InspectorError::NotEnabled),
        }
    }

    /// Whether breakpoints and `debugger` statements can pause for this session.
    pub(crate) fn pauses_on_breakpoints(&self) -> bool {
        self.is_enabled() && self.breakpoints.is_active() && !self.skip_all_pauses
    }

    pub(crate) fn pauses_on_exception(&self, uncaught: bool) -> bool {
        self.is_enabled() && !self.skip_all_pauses && self.pause_on_exceptions.matches(uncaught)
    }
}
