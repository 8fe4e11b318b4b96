//! The session manager.
//!
//! [`Inspector`] owns every context group and every session. Clients drive it
//! through the command methods (one per protocol method, each taking the
//! issuing [`SessionId`]); the engine drives it through the hook methods (each
//! taking the [`ContextGroupId`] it is running). Events flow back to sessions
//! through the listeners registered with [`Inspector::subscribe`].

use crate::{
    AsyncTaskId, ContextGroupId, ScriptId, SessionId,
    async_tasks::{AsyncTaskKind, AsyncTaskTracker},
    breakpoint::{Breakpoint, BreakpointId, UrlSpec},
    config::{ConditionErrorPolicy, InspectorConfig},
    error::{InspectorError, InspectorResult},
    event::{BreakpointResolvedEvent, Event, EventSubscriptions, Listener, PausedEvent},
    frame::{CallFrame, CallFrameId, Location, Position, RemoteObject, StackEntry},
    pause::{Pause, PauseCause, PauseController, ResumeAction, Trigger},
    runtime::{EvalException, Runtime},
    script::{ScriptIdAllocator, ScriptInfo, ScriptRegistry},
    session::{Instrumentation, PauseOnExceptions, Session, SessionState},
    step::{StepAction, StepController},
};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

/// Answer to an engine hook: keep running, or park until resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakDecision {
    /// Keep running.
    Continue,
    /// The group is paused. The engine must wait until
    /// [`Inspector::is_paused`] turns false, then honor
    /// [`Inspector::take_resume_action`].
    Pause,
}

/// Result of [`Inspector::async_task_scheduled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    /// Id of the tracked task, `None` while async stacks are disabled.
    pub task: Option<AsyncTaskId>,
    /// What the engine must do now.
    pub decision: BreakDecision,
}

/// Result of evaluating an expression on a paused frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateOutcome {
    /// The completion value.
    pub result: RemoteObject,
    /// Present when the expression threw; `result` is then the thrown value.
    pub exception: Option<EvalException>,
}

struct ContextGroup {
    scripts: ScriptRegistry,
    pause: PauseController,
    step: StepController,
    async_tasks: AsyncTaskTracker,
    runtime: Box<dyn Runtime>,
}

impl fmt::Debug for ContextGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGroup")
            .field("scripts", &self.scripts)
            .field("pause", &self.pause)
            .field("step", &self.step)
            .field("async_tasks", &self.async_tasks)
            .finish_non_exhaustive()
    }
}

/// Debugger agent for any number of context groups and sessions.
#[derive(Debug)]
pub struct Inspector {
    config: InspectorConfig,
    script_ids: ScriptIdAllocator,
    groups: FxHashMap<ContextGroupId, ContextGroup>,
    sessions: IndexMap<SessionId, Session>,
    subscriptions: EventSubscriptions,
    next_session: u32,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new(InspectorConfig::default())
    }
}

impl Inspector {
    /// Creates an inspector with no context groups.
    pub fn new(config: InspectorConfig) -> Self {
        Self {
            config,
            script_ids: ScriptIdAllocator::default(),
            groups: FxHashMap::default(),
            sessions: IndexMap::new(),
            subscriptions: EventSubscriptions::default(),
            next_session: 0,
        }
    }

    /// The limits the inspector was created with.
    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    /// Adds a context group served by `runtime`. Returns `false`, keeping the
    /// existing group, if the id is taken.
    pub fn add_context_group<R>(&mut self, id: ContextGroupId, runtime: R) -> bool
    where
        R: Runtime + 'static,
    {
        if self.groups.contains_key(&id) {
            log::warn!("context group {id} already exists");
            return false;
        }
        self.groups.insert(
            id,
            ContextGroup {
                scripts: ScriptRegistry::new(
                    self.script_ids.clone(),
                    self.config.max_collected_scripts_size,
                ),
                pause: PauseController::new(),
                step: StepController::new(),
                async_tasks: AsyncTaskTracker::new(self.config.max_async_task_stacks),
                runtime: Box::new(runtime),
            },
        );
        log::debug!("added context group {id}");
        true
    }

    /// Opens a new, disabled session on `group`.
    pub fn connect(&mut self, group: ContextGroupId) -> InspectorResult<SessionId> {
        self.group(group)?;
        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.sessions.insert(id, Session::new(id, group));
        log::debug!("session {id} connected to context group {group}");
        Ok(id)
    }

    /// Appends a listener for `session`'s events.
    pub fn subscribe(&mut self, session: SessionId, listener: Listener) -> InspectorResult<()> {
        self.session(session)?;
        self.subscriptions.subscribe(session, listener);
        Ok(())
    }

    /// The state of a live session.
    ///
    /// Fails with [`InspectorError::SessionStopped`] for a session that was
    /// stopped and with [`InspectorError::UnknownSession`] for an id never
    /// handed out.
    pub fn session(&self, id: SessionId) -> InspectorResult<&Session> {
        self.sessions.get(&id).ok_or_else(|| self.missing(id))
    }

    /// Why `id` has no session. Ids are handed out in order and stopped
    /// sessions are dropped, so a missing id below the counter was stopped.
    fn missing(&self, id: SessionId) -> InspectorError {
        if (1..=self.next_session).contains(&id.0) {
            InspectorError::SessionStopped
        } else {
            InspectorError::UnknownSession(id)
        }
    }

    /// Live sessions, in connection order.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Parsed scripts of `group`.
    pub fn scripts(&self, group: ContextGroupId) -> InspectorResult<&ScriptRegistry> {
        Ok(&self.group(group)?.scripts)
    }

    /// Async tasks tracked for `group`.
    pub fn async_tasks(&self, group: ContextGroupId) -> InspectorResult<&AsyncTaskTracker> {
        Ok(&self.group(group)?.async_tasks)
    }

    /// The live pause of `group`, if any.
    pub fn current_pause(&self, group: ContextGroupId) -> Option<&Pause> {
        self.groups.get(&group)?.pause.pause()
    }

    fn group(&self, id: ContextGroupId) -> InspectorResult<&ContextGroup> {
        self.groups
            .get(&id)
            .ok_or(InspectorError::UnknownContextGroup(id))
    }

    fn group_mut(&mut self, id: ContextGroupId) -> InspectorResult<&mut ContextGroup> {
        self.groups
            .get_mut(&id)
            .ok_or(InspectorError::UnknownContextGroup(id))
    }

    fn session_mut(&mut self, id: SessionId) -> InspectorResult<&mut Session> {
        let missing = self.missing(id);
        self.sessions.get_mut(&id).ok_or(missing)
    }

    /// The group of an enabled session.
    fn enabled_group(&self, session: SessionId) -> InspectorResult<ContextGroupId> {
        let session = self.session(session)?;
        session.ensure_enabled()?;
        Ok(session.context_group())
    }

    fn enabled_sessions(&self, group: ContextGroupId) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| s.context_group() == group && s.is_enabled())
            .map(Session::id)
            .collect()
    }

    fn broadcast(&mut self, group: ContextGroupId, event: &Event) {
        for session in self.enabled_sessions(group) {
            self.subscriptions.dispatch(session, event);
        }
    }

    /// Recomputes what the group derives from its enabled sessions: the
    /// scripts pinned by resolved breakpoints and the async stack depth.
    fn refresh_group(&mut self, id: ContextGroupId) -> InspectorResult<()> {
        let mut pinned = FxHashSet::default();
        let mut depth = 0;
        for session in self
            .sessions
            .values()
            .filter(|s| s.context_group() == id && s.is_enabled())
        {
            pinned.extend(session.breakpoints.referenced_scripts());
            depth = depth.max(session.async_call_stack_depth);
        }
        let group = self.group_mut(id)?;
        group.scripts.set_pinned(pinned);
        if group.async_tasks.max_depth() != depth {
            log::debug!("async call stack depth of group {id} is now {depth}");
            group.async_tasks.set_max_depth(depth);
        }
        Ok(())
    }

    /// Re-resolves a session's breakpoints against every script of its group
    /// and replays `scriptParsed` for each.
    fn resolve_and_replay(&mut self, session: SessionId) -> InspectorResult<()> {
        let Self {
            groups,
            sessions,
            subscriptions,
            ..
        } = self;
        let session = sessions
            .get_mut(&session)
            .ok_or(InspectorError::UnknownSession(session))?;
        let group = groups
            .get(&session.context_group())
            .ok_or(InspectorError::UnknownContextGroup(session.context_group()))?;
        session.breakpoints.reset_locations();
        for script in group.scripts.scripts() {
            session.breakpoints.resolve(script);
            subscriptions.dispatch(session.id(), &Event::ScriptParsed(script.into()));
        }
        Ok(())
    }

    /// Drops whatever `session` has pending in `group` and lets go of its
    /// pause. The group resumes when nobody responsible is left.
    fn release(&mut self, id: ContextGroupId, session: SessionId) -> InspectorResult<()> {
        let nobody_left = self.enabled_sessions(id).is_empty();
        let group = self.group_mut(id)?;
        group.step.cancel_for(session);
        group.pause.disarm(session);
        let resumed = group.pause.release(session)
            || (nobody_left && group.pause.resume(ResumeAction::Continue).is_ok());
        if resumed {
            log::debug!("session {session} released the pause of group {id}");
            self.broadcast(id, &Event::Resumed);
        }
        Ok(())
    }

    // Session lifecycle

    /// `Debugger.enable`. Idempotent; a repeated call only applies the budget.
    pub fn enable(
        &mut self,
        session: SessionId,
        max_collected_scripts_size: Option<usize>,
    ) -> InspectorResult<()> {
        let state = self.session(session)?;
        let group = state.context_group();
        if !state.is_enabled() {
            self.session_mut(session)?.state = SessionState::Enabled;
            log::debug!("session {session} enabled");
            self.resolve_and_replay(session)?;
        }
        self.refresh_group(group)?;
        if let Some(bytes) = max_collected_scripts_size {
            self.group_mut(group)?
                .scripts
                .set_max_collected_scripts_size(bytes);
        }
        Ok(())
    }

    /// `Debugger.disable`. Keeps breakpoint definitions, releases pauses this
    /// session is responsible for. Idempotent.
    pub fn disable(&mut self, session: SessionId) -> InspectorResult<()> {
        let state = match self.session_mut(session) {
            Err(InspectorError::SessionStopped) => return Ok(()),
            state => state?,
        };
        if state.state != SessionState::Enabled {
            return Ok(());
        }
        state.state = SessionState::Disabled;
        let group = state.context_group();
        log::debug!("session {session} disabled");
        self.release(group, session)?;
        self.refresh_group(group)
    }

    /// Permanently disables the session and drops its state. Every later
    /// command other than `disable` fails with [`InspectorError::SessionStopped`].
    pub fn stop(&mut self, session: SessionId) -> InspectorResult<()> {
        let group = match self.session(session) {
            Err(InspectorError::SessionStopped) => return Ok(()),
            state => state?.context_group(),
        };
        self.sessions.shift_remove(&session);
        log::debug!("session {session} stopped");
        self.subscriptions.unsubscribe_all(session);
        self.release(group, session)?;
        self.refresh_group(group)
    }

    /// A client re-attached to the session. Releases its pauses and, if enabled,
    /// re-resolves breakpoints and replays scripts. Breakpoint definitions and
    /// the active mask survive.
    pub fn reconnect(&mut self, session: SessionId) -> InspectorResult<()> {
        let state = self.session(session)?;
        let group = state.context_group();
        let enabled = state.is_enabled();
        log::debug!("session {session} reconnected");
        self.release(group, session)?;
        if enabled {
            self.resolve_and_replay(session)?;
        }
        self.refresh_group(group)
    }

    // Breakpoints

    /// `Debugger.setBreakpointByUrl`.
    pub fn set_breakpoint_by_url(
        &mut self,
        session: SessionId,
        url: UrlSpec,
        line_number: u32,
        column_number: u32,
        condition: Option<String>,
    ) -> InspectorResult<(BreakpointId, Vec<Location>)> {
        let group_id = self.enabled_group(session)?;
        let Self {
            groups, sessions, ..
        } = self;
        let group = groups
            .get(&group_id)
            .ok_or(InspectorError::UnknownContextGroup(group_id))?;
        let session = sessions
            .get_mut(&session)
            .ok_or(InspectorError::UnknownSession(session))?;
        let id = session
            .breakpoints
            .set_by_url(url, line_number, column_number, condition)?;
        let locations = group
            .scripts
            .scripts()
            .filter_map(|script| session.breakpoints.resolve_breakpoint(&id, script))
            .collect();
        self.refresh_group(group_id)?;
        Ok((id, locations))
    }

    /// `Debugger.setBreakpoint`.
    pub fn set_breakpoint(
        &mut self,
        session: SessionId,
        location: Location,
        condition: Option<String>,
    ) -> InspectorResult<(BreakpointId, Location)> {
        let group_id = self.enabled_group(session)?;
        let Self {
            groups, sessions, ..
        } = self;
        let script = groups
            .get(&group_id)
            .and_then(|g| g.scripts.get(location.script_id))
            .ok_or(InspectorError::ScriptNotFound(location.script_id))?;
        let breakpoints = &mut sessions
            .get_mut(&session)
            .ok_or(InspectorError::UnknownSession(session))?
            .breakpoints;
        let id = breakpoints.set_by_id(location, condition)?;
        let Some(actual) = breakpoints.resolve_breakpoint(&id, script) else {
            breakpoints.remove(&id);
            return Err(InspectorError::UnresolvedBreakpoint);
        };
        self.refresh_group(group_id)?;
        Ok((id, actual))
    }

    /// `Debugger.removeBreakpoint`. Unknown ids are ignored.
    pub fn remove_breakpoint(&mut self, session: SessionId, id: &BreakpointId) -> InspectorResult<()> {
        let group = self.enabled_group(session)?;
        let state = self.session_mut(session)?;
        if let Some(kind) = Instrumentation::from_breakpoint_id(&id.0) {
            state.instrumentation.remove(&kind);
        } else {
            state.breakpoints.remove(id);
        }
        self.refresh_group(group)
    }

    /// `Debugger.setBreakpointsActive`.
    pub fn set_breakpoints_active(&mut self, session: SessionId, active: bool) -> InspectorResult<()> {
        self.enabled_group(session)?;
        self.session_mut(session)?.breakpoints.set_active(active);
        Ok(())
    }

    /// `Debugger.setInstrumentationBreakpoint`.
    pub fn set_instrumentation_breakpoint(
        &mut self,
        session: SessionId,
        instrumentation: Instrumentation,
    ) -> InspectorResult<BreakpointId> {
        self.enabled_group(session)?;
        self.session_mut(session)?
            .instrumentation
            .insert(instrumentation);
        Ok(BreakpointId(instrumentation.breakpoint_id()))
    }

    /// `Debugger.getPossibleBreakpoints`: statement boundaries in `[start, end)`.
    pub fn get_possible_breakpoints(
        &self,
        session: SessionId,
        start: Location,
        end: Option<Location>,
    ) -> InspectorResult<Vec<Location>> {
        let group = self.group(self.enabled_group(session)?)?;
        if end.is_some_and(|end| end.script_id != start.script_id) {
            return Err(InspectorError::InvalidParams(
                "Locations should contain the same scriptId".to_string(),
            ));
        }
        let script = group
            .scripts
            .get(start.script_id)
            .ok_or(InspectorError::ScriptNotFound(start.script_id))?;
        Ok(script.break_locations_between(start.position(), end.map(|end| end.position())))
    }

    // Execution control

    /// `Debugger.pause`. A no-op while already paused.
    pub fn pause(&mut self, session: SessionId) -> InspectorResult<()> {
        let group = self.enabled_group(session)?;
        self.group_mut(group)?.pause.request_pause(session);
        Ok(())
    }

    /// `Debugger.resume`.
    pub fn resume(&mut self, session: SessionId) -> InspectorResult<()> {
        let group = self.enabled_group(session)?;
        self.resume_group(group, ResumeAction::Continue)
    }

    fn resume_group(&mut self, id: ContextGroupId, action: ResumeAction) -> InspectorResult<()> {
        self.group_mut(id)?.pause.resume(action)?;
        self.broadcast(id, &Event::Resumed);
        Ok(())
    }

    /// `Debugger.stepInto`.
    pub fn step_into(&mut self, session: SessionId, break_on_async_call: bool) -> InspectorResult<()> {
        self.step(session, StepAction::Into { break_on_async_call })
    }

    /// `Debugger.stepOver`.
    pub fn step_over(&mut self, session: SessionId) -> InspectorResult<()> {
        self.step(session, StepAction::Over)
    }

    /// `Debugger.stepOut`.
    pub fn step_out(&mut self, session: SessionId) -> InspectorResult<()> {
        self.step(session, StepAction::Out)
    }

    fn step(&mut self, session: SessionId, action: StepAction) -> InspectorResult<()> {
        let id = self.enabled_group(session)?;
        let group = self.group_mut(id)?;
        let frames = group.pause.pause().ok_or(InspectorError::NotPaused)?.frames();
        group.step.arm(session, action, frames);
        self.resume_group(id, ResumeAction::Continue)
    }

    /// `Debugger.restartFrame`. Returns the frames from the restarted one down.
    pub fn restart_frame(
        &mut self,
        session: SessionId,
        call_frame_id: CallFrameId,
    ) -> InspectorResult<Vec<CallFrame>> {
        let id = self.enabled_group(session)?;
        let group = self.group_mut(id)?;
        let index = group.pause.check_restart(call_frame_id)?;
        let frames = group
            .pause
            .pause()
            .ok_or(InspectorError::NotPaused)?
            .frames()
            .get(index..)
            .map(<[CallFrame]>::to_vec)
            .unwrap_or_default();
        let target = frames.first().ok_or(InspectorError::StaleFrame)?;
        group.runtime.restart_frame(target).map_err(|e| {
            log::debug!("engine refused to restart '{}': {e}", target.function_name);
            InspectorError::RestartNotAllowed
        })?;
        group.step.arm(
            session,
            StepAction::Into {
                break_on_async_call: false,
            },
            &frames,
        );
        self.resume_group(id, ResumeAction::RestartFrame { index })?;
        Ok(frames)
    }

    /// `Debugger.pauseOnAsyncTask`: pause once the task starts running.
    pub fn pause_on_async_task(&mut self, session: SessionId, task: AsyncTaskId) -> InspectorResult<()> {
        let group = self.group_mut(self.enabled_group(session)?)?;
        if !group.async_tasks.contains(task) {
            return Err(InspectorError::UnknownAsyncTask(task));
        }
        group.pause.await_task(task, session);
        Ok(())
    }

    // Paused-frame inspection

    /// `Debugger.evaluateOnCallFrame`. An expression that throws is not an
    /// error; the outcome carries the exception.
    pub fn evaluate_on_call_frame(
        &mut self,
        session: SessionId,
        call_frame_id: CallFrameId,
        expression: &str,
    ) -> InspectorResult<EvaluateOutcome> {
        let group = self.group_mut(self.enabled_group(session)?)?;
        let frame = group.pause.frame(call_frame_id)?;
        Ok(match group.runtime.evaluate_on_frame(frame, expression) {
            Ok(result) => EvaluateOutcome {
                result,
                exception: None,
            },
            Err(exception) => EvaluateOutcome {
                result: exception
                    .exception
                    .clone()
                    .unwrap_or_else(|| RemoteObject::error(exception.text.clone())),
                exception: Some(exception),
            },
        })
    }

    /// `Debugger.setVariableValue`.
    pub fn set_variable_value(
        &mut self,
        session: SessionId,
        call_frame_id: CallFrameId,
        scope_number: usize,
        variable_name: &str,
        new_value: &RemoteObject,
    ) -> InspectorResult<()> {
        let group = self.group_mut(self.enabled_group(session)?)?;
        let frame = group.pause.frame(call_frame_id)?;
        if scope_number >= frame.scope_chain.len() {
            return Err(InspectorError::InvalidParams(format!(
                "Could not find scope with given number: {scope_number}"
            )));
        }
        group
            .runtime
            .set_variable_value(frame, scope_number, variable_name, new_value)
            .map_err(InspectorError::EvalError)
    }

    /// `Debugger.getScriptSource`.
    pub fn get_script_source(&self, session: SessionId, script_id: ScriptId) -> InspectorResult<String> {
        let group = self.group(self.enabled_group(session)?)?;
        group.scripts.source(script_id).map(str::to_string)
    }

    // Per-session settings

    /// `Debugger.setBlackboxPatterns`.
    pub fn set_blackbox_patterns(&mut self, session: SessionId, patterns: Vec<String>) -> InspectorResult<()> {
        self.enabled_group(session)?;
        self.session_mut(session)?.blackbox.set_patterns(patterns)
    }

    /// `Debugger.setBlackboxedRanges`.
    pub fn set_blackboxed_ranges(
        &mut self,
        session: SessionId,
        script_id: ScriptId,
        positions: Vec<Position>,
    ) -> InspectorResult<()> {
        let group = self.enabled_group(session)?;
        if self.group(group)?.scripts.get(script_id).is_none() {
            return Err(InspectorError::ScriptNotFound(script_id));
        }
        self.session_mut(session)?
            .blackbox
            .set_ranges(script_id, positions)
    }

    /// `Debugger.setAsyncCallStackDepth`. Clamped to the configured maximum;
    /// zero turns async stacks off.
    pub fn set_async_call_stack_depth(&mut self, session: SessionId, max_depth: u32) -> InspectorResult<()> {
        let group = self.enabled_group(session)?;
        let depth = max_depth.min(self.config.max_async_call_stack_depth);
        self.session_mut(session)?.async_call_stack_depth = depth;
        self.refresh_group(group)
    }

    /// `Debugger.setPauseOnExceptions`.
    pub fn set_pause_on_exceptions(&mut self, session: SessionId, state: PauseOnExceptions) -> InspectorResult<()> {
        self.enabled_group(session)?;
        self.session_mut(session)?.pause_on_exceptions = state;
        Ok(())
    }

    /// `Debugger.setSkipAllPauses`.
    pub fn set_skip_all_pauses(&mut self, session: SessionId, skip: bool) -> InspectorResult<()> {
        self.enabled_group(session)?;
        self.session_mut(session)?.skip_all_pauses = skip;
        Ok(())
    }

    // Engine hooks

    /// The engine compiled a script.
    pub fn script_parsed(&mut self, id: ContextGroupId, info: ScriptInfo) -> InspectorResult<ScriptId> {
        let Self {
            groups,
            sessions,
            subscriptions,
            ..
        } = self;
        let group = groups
            .get_mut(&id)
            .ok_or(InspectorError::UnknownContextGroup(id))?;
        let script_id = group.scripts.register(info);
        if let Some(script) = group.scripts.get(script_id) {
            for session in sessions
                .values_mut()
                .filter(|s| s.context_group() == id && s.is_enabled())
            {
                subscriptions.dispatch(session.id(), &Event::ScriptParsed(script.into()));
                for resolved in session.breakpoints.resolve(script) {
                    let event = BreakpointResolvedEvent {
                        breakpoint_id: resolved.breakpoint_id,
                        location: resolved.location,
                    };
                    subscriptions.dispatch(session.id(), &Event::BreakpointResolved(event));
                }
            }
        }
        self.refresh_group(id)?;
        Ok(script_id)
    }

    /// The engine is about to run a script. Arms the instrumentation pauses
    /// sessions asked for; they fire at the script's first statement.
    pub fn before_script_execution(&mut self, id: ContextGroupId, script_id: ScriptId) -> InspectorResult<()> {
        let Self {
            groups, sessions, ..
        } = self;
        let group = groups
            .get_mut(&id)
            .ok_or(InspectorError::UnknownContextGroup(id))?;
        let script = group
            .scripts
            .get(script_id)
            .ok_or(InspectorError::ScriptNotFound(script_id))?;
        let mut armed = Vec::new();
        for session in sessions
            .values()
            .filter(|s| s.context_group() == id && s.is_enabled())
        {
            for kind in [
                Instrumentation::BeforeScriptExecution,
                Instrumentation::BeforeScriptWithSourceMapExecution,
            ] {
                let applies = match kind {
                    Instrumentation::BeforeScriptExecution => true,
                    Instrumentation::BeforeScriptWithSourceMapExecution => {
                        script.source_map_url().is_some()
                    }
                };
                if applies && session.instrumentation.contains(&kind) {
                    let cause = PauseCause::Instrumentation {
                        name: kind.name().to_string(),
                        script_id,
                        url: script.url().to_string(),
                    };
                    armed.push((cause, Some(session.id())));
                }
            }
        }
        for (cause, owner) in armed {
            group.pause.arm(cause, owner);
        }
        Ok(())
    }

    /// The engine reached a statement boundary. `frames[0]` is the top frame.
    pub fn statement(&mut self, id: ContextGroupId, mut frames: Vec<CallFrame>) -> InspectorResult<BreakDecision> {
        self.group(id)?.scripts.stamp_urls(&mut frames);
        let triggers = self.statement_triggers(id, &frames)?;
        self.decide(id, triggers, frames)
    }

    /// The engine reached a `debugger` statement. It pauses for every session
    /// whose breakpoints are active, merged with anything else due here.
    pub fn debugger_statement(
        &mut self,
        id: ContextGroupId,
        mut frames: Vec<CallFrame>,
    ) -> InspectorResult<BreakDecision> {
        self.group(id)?.scripts.stamp_urls(&mut frames);
        let mut triggers = self.statement_triggers(id, &frames)?;
        triggers.extend(
            self.sessions
                .values()
                .filter(|s| s.context_group() == id && s.pauses_on_breakpoints())
                .map(|s| (PauseCause::DebuggerStatement, Some(s.id()))),
        );
        self.decide(id, triggers, frames)
    }

    /// An exception is being thrown. Sessions skip exceptions thrown from
    /// code they blackbox.
    pub fn exception(
        &mut self,
        id: ContextGroupId,
        mut frames: Vec<CallFrame>,
        value: RemoteObject,
        uncaught: bool,
    ) -> InspectorResult<BreakDecision> {
        self.ensure_running(id)?;
        let scripts = &self.group(id)?.scripts;
        scripts.stamp_urls(&mut frames);
        let triggers = self
            .sessions
            .values()
            .filter(|s| s.context_group() == id && s.pauses_on_exception(uncaught))
            .filter(|s| {
                frames
                    .first()
                    .is_none_or(|top| !s.blackbox.is_blackboxed(scripts.frame_url(top), &top.location))
            })
            .map(|s| {
                let cause = PauseCause::Exception {
                    value: value.clone(),
                    uncaught,
                };
                (cause, Some(s.id()))
            })
            .collect();
        self.decide(id, triggers, frames)
    }

    /// The heap is close to its limit. The pause belongs to no single session.
    pub fn out_of_memory(&mut self, id: ContextGroupId, mut frames: Vec<CallFrame>) -> InspectorResult<BreakDecision> {
        self.ensure_running(id)?;
        self.group(id)?.scripts.stamp_urls(&mut frames);
        let triggers = if self.enabled_sessions(id).is_empty() {
            Vec::new()
        } else {
            vec![(PauseCause::OutOfMemory, None)]
        };
        self.decide(id, triggers, frames)
    }

    /// The code at `frames` scheduled a continuation.
    ///
    /// While a step-into with `break_on_async_call` is pending, this pauses at
    /// the scheduling point and reports the new task's id.
    pub fn async_task_scheduled(
        &mut self,
        id: ContextGroupId,
        kind: AsyncTaskKind,
        description: &str,
        mut frames: Vec<CallFrame>,
        recurring: bool,
    ) -> InspectorResult<Scheduled> {
        let group = self.group_mut(id)?;
        group.scripts.stamp_urls(&mut frames);
        let stack = frames.iter().map(StackEntry::from).collect();
        let Some(task) = group.async_tasks.schedule(kind, description, stack, recurring) else {
            return Ok(Scheduled {
                task: None,
                decision: BreakDecision::Continue,
            });
        };
        let decision = match group.step.breaks_on_async_call() {
            Some(session) if !group.pause.is_paused() && !frames.is_empty() => {
                log::debug!("step into async call stopped at scheduling of task {task}");
                let trigger = (PauseCause::ScheduledAsyncCall(task), Some(session));
                self.decide(id, vec![trigger], frames)?
            }
            _ => BreakDecision::Continue,
        };
        Ok(Scheduled {
            task: Some(task),
            decision,
        })
    }

    /// A continuation began running.
    pub fn async_task_started(&mut self, id: ContextGroupId, task: AsyncTaskId) -> InspectorResult<()> {
        let group = self.group_mut(id)?;
        group.async_tasks.started(task);
        group.pause.task_started(task);
        Ok(())
    }

    /// A continuation returned.
    pub fn async_task_finished(&mut self, id: ContextGroupId, task: AsyncTaskId) -> InspectorResult<()> {
        self.group_mut(id)?.async_tasks.finished(task);
        Ok(())
    }

    /// A continuation will never run.
    pub fn async_task_canceled(&mut self, id: ContextGroupId, task: AsyncTaskId) -> InspectorResult<()> {
        let group = self.group_mut(id)?;
        group.async_tasks.canceled(task);
        group.pause.forget_task(task);
        Ok(())
    }

    /// A garbage collection ran. `obsolete` lists pending tasks whose
    /// continuation became unreachable. Returns how many script sources were
    /// evicted.
    pub fn collect_garbage(&mut self, id: ContextGroupId, obsolete: &[AsyncTaskId]) -> InspectorResult<usize> {
        let group = self.group_mut(id)?;
        group
            .async_tasks
            .collect_obsolete(|_, task| obsolete.contains(&task));
        for &task in obsolete {
            group.pause.forget_task(task);
        }
        Ok(group.scripts.collect_garbage())
    }

    /// A top-level run ended; pending steps are dropped.
    pub fn execution_finished(&mut self, id: ContextGroupId) -> InspectorResult<()> {
        self.group_mut(id)?.step.finish_execution();
        Ok(())
    }

    /// Whether the engine running `id` must stay parked.
    pub fn is_paused(&self, id: ContextGroupId) -> bool {
        self.groups.get(&id).is_some_and(|g| g.pause.is_paused())
    }

    /// What the engine should do now that it is released.
    pub fn take_resume_action(&mut self, id: ContextGroupId) -> InspectorResult<ResumeAction> {
        Ok(self.group_mut(id)?.pause.take_resume_action())
    }

    fn ensure_running(&self, id: ContextGroupId) -> InspectorResult<()> {
        if self.group(id)?.pause.is_paused() {
            return Err(InspectorError::Internal(format!(
                "context group {id} reported execution while paused"
            )));
        }
        Ok(())
    }

    /// Causes that hold at the statement on top of `frames`: armed causes,
    /// breakpoints resolved there, and the step target.
    fn statement_triggers(&mut self, id: ContextGroupId, frames: &[CallFrame]) -> InspectorResult<Vec<Trigger>> {
        self.ensure_running(id)?;
        let Some(top) = frames.first() else {
            return Err(InspectorError::InvalidParams(
                "a statement must be reported with its call frames".to_string(),
            ));
        };
        let Self {
            groups,
            sessions,
            config,
            ..
        } = self;
        let group = groups
            .get_mut(&id)
            .ok_or(InspectorError::UnknownContextGroup(id))?;

        let mut triggers = group.pause.take_armed();

        for session in sessions
            .values()
            .filter(|s| s.context_group() == id && s.pauses_on_breakpoints())
        {
            let hits: Vec<BreakpointId> = session
                .breakpoints
                .hits_at(&top.location)
                .filter(|bp| {
                    condition_holds(
                        group.runtime.as_mut(),
                        top,
                        bp,
                        config.condition_error_policy,
                    )
                })
                .map(|bp| bp.id().clone())
                .collect();
            if !hits.is_empty() {
                let cause = PauseCause::Breakpoint {
                    session: session.id(),
                    breakpoints: hits,
                };
                triggers.push((cause, Some(session.id())));
            }
        }

        if let Some(stepper) = group.step.active_session() {
            let blackbox = sessions.get(&stepper).map(|s| &s.blackbox);
            let scripts = &group.scripts;
            let reached = group.step.check(frames, |frame| {
                blackbox.is_some_and(|b| b.is_blackboxed(scripts.frame_url(frame), &frame.location))
            });
            if let Some(session) = reached {
                triggers.push((PauseCause::Step, Some(session)));
            }
        }
        Ok(triggers)
    }

    /// Pauses if any trigger survives: causes owned by a session only count
    /// while that session is enabled and not skipping pauses.
    fn decide(
        &mut self,
        id: ContextGroupId,
        mut triggers: Vec<Trigger>,
        frames: Vec<CallFrame>,
    ) -> InspectorResult<BreakDecision> {
        triggers.retain(|(_, owner)| {
            owner.is_none_or(|owner| {
                self.sessions
                    .get(&owner)
                    .is_some_and(|s| s.is_enabled() && !s.skip_all_pauses)
            })
        });
        if triggers.is_empty() {
            return Ok(BreakDecision::Continue);
        }
        let group = self.group_mut(id)?;
        group.step.cancel();
        let async_stack_trace = group.async_tasks.async_stack_trace();
        let pause = group.pause.enter(triggers, frames, async_stack_trace)?.clone();
        log::debug!("group {id} paused: {:?}", pause.reason());
        for session in self.enabled_sessions(id) {
            let event = Event::Paused(Box::new(PausedEvent::new(&pause, session)));
            self.subscriptions.dispatch(session, &event);
        }
        Ok(BreakDecision::Pause)
    }
}

fn condition_holds(
    runtime: &mut dyn Runtime,
    frame: &CallFrame,
    breakpoint: &Breakpoint,
    policy: ConditionErrorPolicy,
) -> bool {
    let Some(condition) = breakpoint.condition() else {
        return true;
    };
    match runtime.evaluate_on_frame(frame, condition) {
        Ok(value) => value.is_truthy(),
        Err(e) => {
            log::warn!(
                "condition of breakpoint {} threw: {}",
                breakpoint.id(),
                e.text
            );
            policy == ConditionErrorPolicy::Pause
        }
    }
}
