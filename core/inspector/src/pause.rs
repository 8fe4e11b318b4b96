//! The running/paused state machine of one context group.
//!
//! ```text
//!            statement with causes
//!  Running ──────────────────────────▶ Paused{causes, frames}
//!     ▲                                   │
//!     └──── resume / step / restart ──────┘
//! ```
//!
//! Every cause that holds at one program point is merged into a single pause.
//! Causes that must wait for the next statement (an explicit pause request, an
//! instrumentation point, the start of an awaited async task) are armed here
//! and drained when the engine reports that statement.

use crate::{
    AsyncTaskId, ScriptId, SessionId,
    breakpoint::BreakpointId,
    error::{InspectorError, InspectorResult},
    frame::{CallFrame, CallFrameId, RemoteObject, StackTrace},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;

/// Protocol-level reason reported with a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PauseReason {
    /// A breakpoint of the session was hit.
    Breakpoint,
    /// An exception matched the session's exception filter.
    Exception,
    /// A step completed.
    Step,
    /// An instrumentation breakpoint fired.
    Instrumentation,
    /// The engine is about to run out of memory.
    #[serde(rename = "OOM")]
    OutOfMemory,
    /// Pause requests, `debugger` statements and async task pauses.
    Other,
    /// More than one distinct reason applies; see the pause data.
    Ambiguous,
}

/// One reason to stop at a program point.
#[derive(Debug, Clone, PartialEq)]
pub enum PauseCause {
    /// Breakpoints of one session resolved at the location.
    Breakpoint {
        /// Session owning the breakpoints.
        session: SessionId,
        /// The breakpoints hit, in the order they were set.
        breakpoints: Vec<BreakpointId>,
    },
    /// A `debugger` statement.
    DebuggerStatement,
    /// `Debugger.pause`.
    PauseRequest,
    /// A step reached its target.
    Step,
    /// An exception is being thrown.
    Exception {
        /// The thrown value.
        value: RemoteObject,
        /// Whether no handler will catch it.
        uncaught: bool,
    },
    /// An instrumentation breakpoint.
    Instrumentation {
        /// Wire name of the instrumentation.
        name: String,
        /// Script about to run.
        script_id: ScriptId,
        /// Url of that script.
        url: String,
    },
    /// Memory is nearly exhausted.
    OutOfMemory,
    /// An awaited async task began running.
    AsyncTask(AsyncTaskId),
    /// A step-into with `breakOnAsyncCall` reached a scheduling point.
    ScheduledAsyncCall(AsyncTaskId),
}

impl PauseCause {
    /// The protocol reason this cause reports.
    pub fn reason(&self) -> PauseReason {
        match self {
            Self::Breakpoint { .. } => PauseReason::Breakpoint,
            Self::Exception { .. } => PauseReason::Exception,
            Self::Step => PauseReason::Step,
            Self::Instrumentation { .. } => PauseReason::Instrumentation,
            Self::OutOfMemory => PauseReason::OutOfMemory,
            Self::DebuggerStatement
            | Self::PauseRequest
            | Self::AsyncTask(_)
            | Self::ScheduledAsyncCall(_) => PauseReason::Other,
        }
    }

    fn aux_data(&self) -> Option<Value> {
        match self {
            Self::Exception { value, uncaught } => Some(json!({
                "exception": value,
                "uncaught": uncaught,
            })),
            Self::Instrumentation {
                name,
                script_id,
                url,
            } => Some(json!({
                "instrumentation": name,
                "scriptId": script_id,
                "url": url,
            })),
            Self::Breakpoint { breakpoints, .. } => Some(json!({ "breakpointIds": breakpoints })),
            Self::DebuggerStatement => Some(json!({ "debuggerStatement": true })),
            Self::AsyncTask(id) => Some(json!({ "asyncTaskId": id })),
            Self::ScheduledAsyncCall(id) => Some(json!({ "scheduledAsyncTaskId": id })),
            Self::PauseRequest | Self::Step | Self::OutOfMemory => None,
        }
    }
}

/// A cause together with the session responsible for it, if any single one is.
pub type Trigger = (PauseCause, Option<SessionId>);

/// A live pause.
#[derive(Debug, Clone)]
pub struct Pause {
    ordinal: u64,
    causes: Vec<PauseCause>,
    frames: Vec<CallFrame>,
    owners: BTreeSet<SessionId>,
    shared: bool,
    async_stack_trace: Option<StackTrace>,
}

impl Pause {
    /// Sequence number of the pause; call frame ids carry it.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Every cause that held at the pause point, without duplicates.
    pub fn causes(&self) -> &[PauseCause] {
        &self.causes
    }

    /// Frames with their call frame ids stamped, top first.
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Sessions responsible for the pause.
    pub fn owners(&self) -> &BTreeSet<SessionId> {
        &self.owners
    }

    /// Whether some cause belongs to no single session.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Async callers of the task running at the pause.
    pub fn async_stack_trace(&self) -> Option<&StackTrace> {
        self.async_stack_trace.as_ref()
    }

    /// `ambiguous` when distinct reasons coincide, the single reason otherwise.
    pub fn reason(&self) -> PauseReason {
        let reasons: BTreeSet<PauseReason> = self.causes.iter().map(PauseCause::reason).collect();
        match reasons.len() {
            1 => reasons.into_iter().next().unwrap_or(PauseReason::Other),
            0 => PauseReason::Other,
            _ => PauseReason::Ambiguous,
        }
    }

    /// Auxiliary data. For an ambiguous pause every cause is listed under
    /// `reasons` so that none is hidden.
    pub fn data(&self) -> Option<Value> {
        if self.reason() == PauseReason::Ambiguous {
            let reasons: Vec<Value> = self
                .causes
                .iter()
                .map(|cause| match cause.aux_data() {
                    Some(aux) => json!({ "reason": cause.reason(), "auxData": aux }),
                    None => json!({ "reason": cause.reason() }),
                })
                .collect();
            return Some(json!({ "reasons": reasons }));
        }
        let mut merged = serde_json::Map::new();
        for cause in &self.causes {
            if let Some(Value::Object(aux)) = cause.aux_data() {
                merged.extend(aux);
            }
        }
        (!merged.is_empty()).then_some(Value::Object(merged))
    }

    /// Breakpoints of `session` that caused this pause.
    pub fn hit_breakpoints(&self, session: SessionId) -> Vec<BreakpointId> {
        self.causes
            .iter()
            .filter_map(|cause| match cause {
                PauseCause::Breakpoint {
                    session: owner,
                    breakpoints,
                } if *owner == session => Some(breakpoints.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// The task a step into an async call stopped at, if any.
    pub fn scheduled_async_task(&self) -> Option<AsyncTaskId> {
        self.causes.iter().find_map(|cause| match cause {
            PauseCause::ScheduledAsyncCall(id) => Some(*id),
            _ => None,
        })
    }
}

/// Whether execution of a context group is parked.
#[derive(Debug, Clone, Default)]
pub enum PauseState {
    /// The engine runs.
    #[default]
    Running,
    /// The engine is parked at a pause.
    Paused(Pause),
}

/// What the engine should do when it is released from a pause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResumeAction {
    /// Carry on from the pause point.
    #[default]
    Continue,
    /// Unwind to a frame and re-enter it.
    RestartFrame {
        /// Depth of the frame, 0 being the top.
        index: usize,
    },
}

/// Pause state machine of one context group.
#[derive(Debug, Default)]
pub struct PauseController {
    state: PauseState,
    next_ordinal: u64,
    armed: Vec<Trigger>,
    /// Async tasks sessions asked to pause in, in request order.
    awaited_tasks: Vec<(AsyncTaskId, SessionId)>,
    resume_action: ResumeAction,
}

impl PauseController {
    /// A running controller with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Running or paused.
    pub fn state(&self) -> &PauseState {
        &self.state
    }

    /// Whether the group is parked.
    pub fn is_paused(&self) -> bool {
        matches!(self.state, PauseState::Paused(_))
    }

    /// The current pause, if paused.
    pub fn pause(&self) -> Option<&Pause> {
        match &self.state {
            PauseState::Paused(pause) => Some(pause),
            PauseState::Running => None,
        }
    }

    fn paused(&self) -> InspectorResult<&Pause> {
        self.pause().ok_or(InspectorError::NotPaused)
    }

    /// Arms a pause at the next statement on behalf of `session`.
    ///
    /// Returns `false` (and does nothing) when already paused.
    pub fn request_pause(&mut self, session: SessionId) -> bool {
        if self.is_paused() {
            return false;
        }
        let already = self
            .armed
            .iter()
            .any(|(cause, owner)| *cause == PauseCause::PauseRequest && *owner == Some(session));
        if !already {
            self.arm(PauseCause::PauseRequest, Some(session));
        }
        true
    }

    /// Arms a cause that fires at the next reported statement.
    pub fn arm(&mut self, cause: PauseCause, owner: Option<SessionId>) {
        log::debug!("armed {:?} for the next statement", cause.reason());
        self.armed.push((cause, owner));
    }

    pub(crate) fn take_armed(&mut self) -> Vec<Trigger> {
        std::mem::take(&mut self.armed)
    }

    /// Whether anything is armed for the next statement.
    pub fn has_armed(&self) -> bool {
        !self.armed.is_empty()
    }

    /// Drops whatever `session` armed.
    pub fn disarm(&mut self, session: SessionId) {
        self.armed.retain(|(_, owner)| *owner != Some(session));
        self.awaited_tasks.retain(|(_, owner)| *owner != session);
    }

    /// Pause when `task` starts running. A session may await several tasks.
    pub fn await_task(&mut self, task: AsyncTaskId, session: SessionId) {
        if !self.awaited_tasks.contains(&(task, session)) {
            self.awaited_tasks.push((task, session));
        }
    }

    /// Called when an async task starts; arms a pause for every session
    /// awaiting it.
    pub fn task_started(&mut self, task: AsyncTaskId) {
        let mut started = Vec::new();
        self.awaited_tasks.retain(|&(awaited, session)| {
            let matches = awaited == task;
            if matches {
                started.push(session);
            }
            !matches
        });
        for session in started {
            self.arm(PauseCause::AsyncTask(task), Some(session));
        }
    }

    /// Stops awaiting a task that will never run.
    pub fn forget_task(&mut self, task: AsyncTaskId) {
        self.awaited_tasks.retain(|(awaited, _)| *awaited != task);
    }

    /// `Running -> Paused`. Stamps call frame ids onto `frames`.
    pub fn enter(
        &mut self,
        triggers: Vec<Trigger>,
        mut frames: Vec<CallFrame>,
        async_stack_trace: Option<StackTrace>,
    ) -> InspectorResult<&Pause> {
        if self.is_paused() {
            return Err(InspectorError::Internal(
                "pause reported while already paused".to_string(),
            ));
        }
        self.next_ordinal += 1;
        let ordinal = self.next_ordinal;
        for (index, frame) in frames.iter_mut().enumerate() {
            frame.call_frame_id = Some(CallFrameId { ordinal, index });
        }
        let mut causes = Vec::with_capacity(triggers.len());
        let mut owners = BTreeSet::new();
        let mut shared = false;
        for (cause, owner) in triggers {
            match owner {
                Some(session) => {
                    owners.insert(session);
                }
                None => shared = true,
            }
            if !causes.contains(&cause) {
                causes.push(cause);
            }
        }
        log::debug!("paused (ordinal {ordinal}) with {} cause(s)", causes.len());
        self.resume_action = ResumeAction::Continue;
        self.state = PauseState::Paused(Pause {
            ordinal,
            causes,
            frames,
            owners,
            shared,
            async_stack_trace,
        });
        self.paused()
    }

    /// `Paused -> Running`.
    pub fn resume(&mut self, action: ResumeAction) -> InspectorResult<Pause> {
        match std::mem::take(&mut self.state) {
            PauseState::Paused(pause) => {
                log::debug!("resumed from pause {} with {action:?}", pause.ordinal);
                self.resume_action = action;
                Ok(pause)
            }
            PauseState::Running => Err(InspectorError::NotPaused),
        }
    }

    /// Releases `session`'s claim on the current pause. Resumes when nobody
    /// responsible is left, or when the pause is shared. Returns whether it resumed.
    pub fn release(&mut self, session: SessionId) -> bool {
        let PauseState::Paused(pause) = &mut self.state else {
            return false;
        };
        let owned = pause.owners.remove(&session);
        let release = pause.shared || (owned && pause.owners.is_empty());
        release && self.resume(ResumeAction::Continue).is_ok()
    }

    /// Looks up a frame of the current pause.
    pub fn frame(&self, id: CallFrameId) -> InspectorResult<&CallFrame> {
        let pause = self.paused()?;
        if id.ordinal != pause.ordinal {
            return Err(InspectorError::StaleFrame);
        }
        pause.frames.get(id.index).ok_or(InspectorError::StaleFrame)
    }

    /// Validates a restart of the frame `id`: it and every frame above it must
    /// be restartable. Returns the frame index.
    pub fn check_restart(&self, id: CallFrameId) -> InspectorResult<usize> {
        self.frame(id)?;
        let pause = self.paused()?;
        if pause.frames[..=id.index].iter().all(|f| f.can_be_restarted) {
            Ok(id.index)
        } else {
            Err(InspectorError::RestartNotAllowed)
        }
    }

    /// Consumes the action chosen by the last resume.
    pub fn take_resume_action(&mut self) -> ResumeAction {
        std::mem::take(&mut self.resume_action)
    }
}
