//! Blocking hook adapter for engines running on their own thread.
//!
//! The engine thread calls the [`DebuggerHooks`] methods; when one of them
//! pauses the context group the call parks until a client resumes it, then
//! returns what the engine should do next. Clients issue their commands
//! through [`InspectorHostHooks::command`] from any other thread.

use crate::{
    AsyncTaskId, ContextGroupId, ScriptId,
    async_tasks::AsyncTaskKind,
    error::{InspectorError, InspectorResult},
    frame::{CallFrame, RemoteObject},
    inspector::{BreakDecision, Inspector},
    pause::ResumeAction,
    script::ScriptInfo,
};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Engine-side notifications for one context group.
///
/// Methods that can pause return the action to take once execution may go on.
pub trait DebuggerHooks {
    /// A script was compiled.
    fn on_script_parsed(&self, info: ScriptInfo) -> InspectorResult<ScriptId>;

    /// A script is about to run.
    fn on_before_script_execution(&self, script_id: ScriptId) -> InspectorResult<()>;

    /// Execution reached a statement boundary.
    fn on_step(&self, frames: Vec<CallFrame>) -> InspectorResult<ResumeAction>;

    /// Execution reached a `debugger` statement.
    fn on_debugger_statement(&self, frames: Vec<CallFrame>) -> InspectorResult<ResumeAction>;

    /// An exception is being thrown.
    fn on_exception_unwind(
        &self,
        frames: Vec<CallFrame>,
        exception: RemoteObject,
        uncaught: bool,
    ) -> InspectorResult<ResumeAction>;

    /// A continuation was scheduled. Returns its id when async stacks are on.
    fn on_async_task_scheduled(
        &self,
        kind: AsyncTaskKind,
        description: &str,
        frames: Vec<CallFrame>,
        recurring: bool,
    ) -> InspectorResult<Option<AsyncTaskId>>;

    /// A continuation began running.
    fn on_async_task_started(&self, task: AsyncTaskId) -> InspectorResult<()>;

    /// A continuation returned.
    fn on_async_task_finished(&self, task: AsyncTaskId) -> InspectorResult<()>;

    /// A top-level run ended.
    fn on_execution_finished(&self) -> InspectorResult<()>;
}

/// [`DebuggerHooks`] over a shared [`Inspector`], parking the calling thread
/// while its context group is paused.
///
/// Clones share the inspector, so one clone can go to the engine thread and
/// another to the client side.
///
/// # Example
///
/// ```rust,ignore
/// use vigil_inspector::{ContextGroupId, Inspector, InspectorHostHooks, ScriptedRuntime};
/// use std::sync::{Arc, Mutex};
///
/// let mut inspector = Inspector::default();
/// inspector.add_context_group(ContextGroupId(1), ScriptedRuntime::new());
/// let hooks = InspectorHostHooks::new(Arc::new(Mutex::new(inspector)), ContextGroupId(1));
///
/// let session = hooks.command(|inspector| inspector.connect(ContextGroupId(1)))??;
/// ```
#[derive(Debug, Clone)]
pub struct InspectorHostHooks {
    inspector: Arc<Mutex<Inspector>>,
    resumed: Arc<Condvar>,
    group: ContextGroupId,
}

impl InspectorHostHooks {
    /// Creates hooks reporting for `group`.
    pub fn new(inspector: Arc<Mutex<Inspector>>, group: ContextGroupId) -> Self {
        Self {
            inspector,
            resumed: Arc::new(Condvar::new()),
            group,
        }
    }

    /// Hooks for another context group of the same inspector.
    #[must_use]
    pub fn for_group(&self, group: ContextGroupId) -> Self {
        Self {
            inspector: self.inspector.clone(),
            resumed: self.resumed.clone(),
            group,
        }
    }

    /// The context group these hooks report for.
    pub fn group(&self) -> ContextGroupId {
        self.group
    }

    /// Gets a reference to the shared inspector.
    pub fn inspector(&self) -> Arc<Mutex<Inspector>> {
        self.inspector.clone()
    }

    fn lock(&self) -> InspectorResult<MutexGuard<'_, Inspector>> {
        self.inspector
            .lock()
            .map_err(|_| InspectorError::Internal("inspector lock poisoned".to_string()))
    }

    /// Runs a client command, then wakes parked engine threads so they can
    /// notice a resume.
    pub fn command<T, F>(&self, f: F) -> InspectorResult<T>
    where
        F: FnOnce(&mut Inspector) -> T,
    {
        let result = f(&mut *self.lock()?);
        self.resumed.notify_all();
        Ok(result)
    }

    /// Whether this hook's group is paused right now.
    pub fn is_paused(&self) -> InspectorResult<bool> {
        Ok(self.lock()?.is_paused(self.group))
    }

    /// Parks while the group is paused and returns the resume action.
    fn wait_if_paused<F>(&self, report: F) -> InspectorResult<ResumeAction>
    where
        F: FnOnce(&mut Inspector) -> InspectorResult<BreakDecision>,
    {
        let mut inspector = self.lock()?;
        if report(&mut *inspector)? == BreakDecision::Continue {
            return Ok(ResumeAction::Continue);
        }
        log::debug!("engine thread of group {} parked", self.group);
        while inspector.is_paused(self.group) {
            inspector = self
                .resumed
                .wait(inspector)
                .map_err(|_| InspectorError::Internal("inspector lock poisoned".to_string()))?;
        }
        log::debug!("engine thread of group {} unparked", self.group);
        inspector.take_resume_action(self.group)
    }
}

impl DebuggerHooks for InspectorHostHooks {
    fn on_script_parsed(&self, info: ScriptInfo) -> InspectorResult<ScriptId> {
        self.lock()?.script_parsed(self.group, info)
    }

    fn on_before_script_execution(&self, script_id: ScriptId) -> InspectorResult<()> {
        self.lock()?.before_script_execution(self.group, script_id)
    }

    fn on_step(&self, frames: Vec<CallFrame>) -> InspectorResult<ResumeAction> {
        self.wait_if_paused(|inspector| inspector.statement(self.group, frames))
    }

    fn on_debugger_statement(&self, frames: Vec<CallFrame>) -> InspectorResult<ResumeAction> {
        self.wait_if_paused(|inspector| inspector.debugger_statement(self.group, frames))
    }

    fn on_exception_unwind(
        &self,
        frames: Vec<CallFrame>,
        exception: RemoteObject,
        uncaught: bool,
    ) -> InspectorResult<ResumeAction> {
        self.wait_if_paused(|inspector| inspector.exception(self.group, frames, exception, uncaught))
    }

    fn on_async_task_scheduled(
        &self,
        kind: AsyncTaskKind,
        description: &str,
        frames: Vec<CallFrame>,
        recurring: bool,
    ) -> InspectorResult<Option<AsyncTaskId>> {
        let mut task = None;
        self.wait_if_paused(|inspector| {
            let scheduled =
                inspector.async_task_scheduled(self.group, kind, description, frames, recurring)?;
            task = scheduled.task;
            Ok(scheduled.decision)
        })?;
        Ok(task)
    }

    fn on_async_task_started(&self, task: AsyncTaskId) -> InspectorResult<()> {
        self.lock()?.async_task_started(self.group, task)
    }

    fn on_async_task_finished(&self, task: AsyncTaskId) -> InspectorResult<()> {
        self.lock()?.async_task_finished(self.group, task)
    }

    fn on_execution_finished(&self) -> InspectorResult<()> {
        self.lock()?.execution_finished(self.group)
    }
}
