//! Async continuation tracking for async stack traces.
//!
//! The engine reports when it schedules a continuation (a promise reaction, a
//! timer), when the continuation starts running and when it finishes. Each
//! task remembers the synchronous stack that scheduled it and the task that
//! was running at the time, which is enough to rebuild a causal chain of
//! stacks whenever execution pauses inside a continuation.
//!
//! Parent links are plain ids into the tracker's arena. A parent that has been
//! collected simply ends the chain.

use crate::{
    AsyncTaskId,
    frame::{StackEntry, StackTrace},
};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// What kind of continuation a task is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AsyncTaskKind {
    /// A promise reaction job.
    Promise,
    /// A timer callback.
    Timer,
    /// Any other host callback.
    Other,
}

/// Lifecycle of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Scheduled and not yet running.
    Pending,
    /// Its continuation is on the stack.
    Running,
    /// Finished, canceled or found obsolete; kept only while a live chain needs it.
    Settled,
}

/// A scheduled continuation.
#[derive(Debug, Clone)]
pub struct AsyncTask {
    id: AsyncTaskId,
    kind: AsyncTaskKind,
    description: String,
    stack: Vec<StackEntry>,
    parent: Option<AsyncTaskId>,
    state: TaskState,
    recurring: bool,
}

impl AsyncTask {
    /// Id of the task.
    pub fn id(&self) -> AsyncTaskId {
        self.id
    }

    /// What kind of continuation the task is.
    pub fn kind(&self) -> AsyncTaskKind {
        self.kind
    }

    /// What scheduled the task, e.g. `Promise.then` or `setTimeout`.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The stack that scheduled this task, top first.
    pub fn stack(&self) -> &[StackEntry] {
        &self.stack
    }

    /// The task that was running when this one was scheduled.
    pub fn parent(&self) -> Option<AsyncTaskId> {
        self.parent
    }

    /// Where the task is in its lifecycle.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Whether the task may run more than once, as an interval does.
    pub fn is_recurring(&self) -> bool {
        self.recurring
    }
}

/// Arena of tracked async tasks for one context group.
#[derive(Debug)]
pub struct AsyncTaskTracker {
    tasks: IndexMap<AsyncTaskId, AsyncTask>,
    current: Vec<AsyncTaskId>,
    max_depth: u32,
    max_stacks: usize,
    next_id: u64,
}

impl AsyncTaskTracker {
    /// Creates a disabled tracker keeping at most `max_stacks` tasks.
    pub fn new(max_stacks: usize) -> Self {
        Self {
            tasks: IndexMap::new(),
            current: Vec::new(),
            max_depth: 0,
            max_stacks,
            next_id: 0,
        }
    }

    /// Depth of reported async stack traces. Zero disables tracking and drops
    /// every tracked task.
    pub fn set_max_depth(&mut self, depth: u32) {
        self.max_depth = depth;
        if depth == 0 {
            self.clear();
        }
    }

    /// Depth of reported async stack traces.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Whether tasks are tracked at all.
    pub fn is_enabled(&self) -> bool {
        self.max_depth > 0
    }

    /// Changes the task cap, dropping the oldest tasks no live chain needs.
    pub fn set_max_async_task_stacks(&mut self, max_stacks: usize) {
        self.max_stacks = max_stacks;
        self.prune();
    }

    /// Records a continuation scheduled by the code running at `stack`.
    ///
    /// Returns `None` while tracking is disabled.
    pub fn schedule(
        &mut self,
        kind: AsyncTaskKind,
        description: impl Into<String>,
        stack: Vec<StackEntry>,
        recurring: bool,
    ) -> Option<AsyncTaskId> {
        if !self.is_enabled() {
            return None;
        }
        self.next_id += 1;
        let id = AsyncTaskId(self.next_id);
        self.tasks.insert(
            id,
            AsyncTask {
                id,
                kind,
                description: description.into(),
                stack,
                parent: self.current.last().copied(),
                state: TaskState::Pending,
                recurring,
            },
        );
        self.prune();
        Some(id)
    }

    /// The continuation began running. Unknown ids are ignored.
    pub fn started(&mut self, id: AsyncTaskId) -> bool {
        let Some(task) = self.tasks.get_mut(&id) else {
            return false;
        };
        task.state = TaskState::Running;
        self.current.push(id);
        true
    }

    /// The continuation returned. Recurring tasks go back to pending.
    pub fn finished(&mut self, id: AsyncTaskId) {
        self.leave(id);
        if let Some(task) = self.tasks.get_mut(&id) {
            task.state = if task.recurring {
                TaskState::Pending
            } else {
                TaskState::Settled
            };
        }
        self.collect_unreachable();
    }

    /// The continuation will never run.
    pub fn canceled(&mut self, id: AsyncTaskId) {
        self.leave(id);
        if let Some(task) = self.tasks.get_mut(&id) {
            task.state = TaskState::Settled;
        }
        self.collect_unreachable();
    }

    fn leave(&mut self, id: AsyncTaskId) {
        if let Some(index) = self.current.iter().rposition(|t| *t == id) {
            self.current.remove(index);
        }
    }

    /// Settles every pending task for which `is_obsolete` answers true, then
    /// drops the tasks no live chain needs. Returns how many were settled.
    ///
    /// Iteration runs over a snapshot of ids, so `is_obsolete` may itself
    /// cancel or finish other tasks.
    pub fn collect_obsolete<F>(&mut self, mut is_obsolete: F) -> usize
    where
        F: FnMut(&mut Self, AsyncTaskId) -> bool,
    {
        let snapshot: Vec<AsyncTaskId> = self.tasks.keys().copied().collect();
        let mut settled = 0;
        for id in snapshot {
            let pending = self
                .tasks
                .get(&id)
                .is_some_and(|t| t.state == TaskState::Pending);
            if !pending || !is_obsolete(self, id) {
                continue;
            }
            if let Some(task) = self.tasks.get_mut(&id) {
                if task.state != TaskState::Settled {
                    task.state = TaskState::Settled;
                    settled += 1;
                }
            }
        }
        self.collect_unreachable();
        settled
    }

    /// Ids reachable from a live task: every pending or running task and all
    /// of their ancestors.
    fn live_chains(&self) -> FxHashSet<AsyncTaskId> {
        let mut live = FxHashSet::default();
        for task in self.tasks.values().filter(|t| t.state != TaskState::Settled) {
            let mut next = Some(task.id);
            while let Some(id) = next {
                if !live.insert(id) {
                    break;
                }
                next = self.tasks.get(&id).and_then(|t| t.parent);
            }
        }
        live
    }

    fn collect_unreachable(&mut self) {
        let live = self.live_chains();
        let before = self.tasks.len();
        self.tasks.retain(|id, _| live.contains(id));
        if self.tasks.len() != before {
            log::trace!("collected {} async tasks", before - self.tasks.len());
        }
    }

    /// Drops the oldest tasks beyond the bound. Running tasks and ancestors of
    /// other live tasks are kept even if that leaves the tracker over the bound.
    fn prune(&mut self) {
        if self.tasks.len() <= self.max_stacks {
            return;
        }
        let mut ancestors = FxHashSet::default();
        for task in self.tasks.values().filter(|t| t.state != TaskState::Settled) {
            let mut next = task.parent;
            while let Some(id) = next {
                if !ancestors.insert(id) {
                    break;
                }
                next = self.tasks.get(&id).and_then(|t| t.parent);
            }
        }
        let excess = self.tasks.len() - self.max_stacks;
        let doomed: Vec<AsyncTaskId> = self
            .tasks
            .values()
            .filter(|t| t.state != TaskState::Running && !ancestors.contains(&t.id))
            .map(|t| t.id)
            .take(excess)
            .collect();
        for id in &doomed {
            self.tasks.shift_remove(id);
        }
        log::debug!("pruned {} async tasks over the limit of {}", doomed.len(), self.max_stacks);
        self.collect_unreachable();
    }

    /// The async stack trace of the code currently running, if it runs inside
    /// a tracked continuation.
    pub fn async_stack_trace(&self) -> Option<StackTrace> {
        self.stack_trace_from(*self.current.last()?)
    }

    /// The chain of scheduling stacks starting at `id`, at most `max_depth` long.
    pub fn stack_trace_from(&self, id: AsyncTaskId) -> Option<StackTrace> {
        let mut levels = Vec::new();
        let mut next = Some(id);
        while let Some(id) = next {
            if levels.len() >= self.max_depth as usize {
                break;
            }
            let Some(task) = self.tasks.get(&id) else {
                break;
            };
            levels.push(task);
            next = task.parent;
        }
        levels.into_iter().rev().fold(None, |parent, task| {
            Some(StackTrace {
                description: Some(task.description.clone()),
                call_frames: task.stack.clone(),
                parent: parent.map(Box::new),
            })
        })
    }

    /// A tracked task.
    pub fn get(&self, id: AsyncTaskId) -> Option<&AsyncTask> {
        self.tasks.get(&id)
    }

    /// Whether `id` is still tracked.
    pub fn contains(&self, id: AsyncTaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// The innermost task whose continuation is running.
    pub fn current_task(&self) -> Option<AsyncTaskId> {
        self.current.last().copied()
    }

    /// Number of tasks currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of tracked promise reactions that have not run yet.
    pub fn pending_promise_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.kind == AsyncTaskKind::Promise && t.state == TaskState::Pending)
            .count()
    }

    /// Forgets every task.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.current.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptId;

    fn stack(name: &str) -> Vec<StackEntry> {
        vec![StackEntry {
            function_name: name.to_string(),
            script_id: ScriptId(1),
            url: "test.js".to_string(),
            line_number: 0,
            column_number: 0,
        }]
    }

    fn tracker(depth: u32) -> AsyncTaskTracker {
        let mut tracker = AsyncTaskTracker::new(128);
        tracker.set_max_depth(depth);
        tracker
    }

    #[test]
    fn disabled_tracker_ignores_scheduling() {
        let mut tracker = AsyncTaskTracker::new(128);
        assert_eq!(tracker.schedule(AsyncTaskKind::Promise, "then", stack("f"), false), None);
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn chains_follow_the_running_task() {
        let mut tracker = tracker(8);
        let first = tracker
            .schedule(AsyncTaskKind::Timer, "setTimeout", stack("main"), false)
            .unwrap();
        tracker.started(first);
        let second = tracker
            .schedule(AsyncTaskKind::Promise, "Promise.then", stack("onTimeout"), false)
            .unwrap();
        tracker.finished(first);

        // `first` settled but is still the parent of a pending task.
        assert_eq!(tracker.tracked_count(), 2);
        assert_eq!(tracker.pending_promise_count(), 1);

        tracker.started(second);
        let trace = tracker.async_stack_trace().unwrap();
        assert_eq!(trace.description.as_deref(), Some("Promise.then"));
        assert_eq!(trace.call_frames[0].function_name, "onTimeout");
        let parent = trace.parent.as_deref().unwrap();
        assert_eq!(parent.description.as_deref(), Some("setTimeout"));
        assert_eq!(trace.depth(), 2);

        tracker.finished(second);
        assert_eq!(tracker.tracked_count(), 0);
        assert_eq!(tracker.async_stack_trace(), None);
    }

    #[test]
    fn depth_limits_the_chain() {
        let mut tracker = tracker(1);
        let first = tracker.schedule(AsyncTaskKind::Other, "a", stack("a"), false).unwrap();
        tracker.started(first);
        let second = tracker.schedule(AsyncTaskKind::Other, "b", stack("b"), false).unwrap();
        tracker.started(second);
        assert_eq!(tracker.async_stack_trace().unwrap().depth(), 1);
    }

    #[test]
    fn recurring_tasks_survive_finishing() {
        let mut tracker = tracker(4);
        let interval = tracker
            .schedule(AsyncTaskKind::Timer, "setInterval", stack("main"), true)
            .unwrap();
        tracker.started(interval);
        tracker.finished(interval);
        assert!(tracker.contains(interval));
        tracker.canceled(interval);
        assert!(!tracker.contains(interval));
    }

    #[test]
    fn pruning_spares_ancestors_of_pending_tasks() {
        let mut tracker = tracker(4);
        tracker.set_max_async_task_stacks(2);
        let root = tracker.schedule(AsyncTaskKind::Timer, "root", stack("main"), false).unwrap();
        tracker.started(root);
        let child = tracker.schedule(AsyncTaskKind::Promise, "child", stack("root"), false).unwrap();
        tracker.finished(root);
        let other = tracker.schedule(AsyncTaskKind::Promise, "other", stack("main"), false).unwrap();

        // Over the bound: `root` is an ancestor of pending `child`, so the
        // oldest prunable task is `child` itself; its removal frees `root`.
        assert!(tracker.tracked_count() <= 2);
        assert!(tracker.contains(other));
        assert!(!tracker.contains(child));
        assert!(!tracker.contains(root));
    }

    #[test]
    fn sweep_tolerates_mutation_from_the_callback() {
        let mut tracker = tracker(4);
        let ids: Vec<_> = (0..4)
            .map(|i| {
                tracker
                    .schedule(AsyncTaskKind::Promise, format!("p{i}"), stack("main"), false)
                    .unwrap()
            })
            .collect();

        let settled = tracker.collect_obsolete(|tracker, id| {
            if id == ids[0] {
                // Settling the first task cancels the next one mid-sweep.
                tracker.canceled(ids[1]);
                true
            } else {
                id == ids[2]
            }
        });

        assert_eq!(settled, 2);
        assert_eq!(tracker.tracked_count(), 1);
        assert_eq!(tracker.pending_promise_count(), 1);
        assert!(tracker.contains(ids[3]));
    }

    #[test]
    fn disabling_drops_everything() {
        let mut tracker = tracker(4);
        let id = tracker.schedule(AsyncTaskKind::Promise, "p", stack("main"), false).unwrap();
        tracker.started(id);
        tracker.set_max_depth(0);
        assert_eq!(tracker.tracked_count(), 0);
        assert_eq!(tracker.current_task(), None);
    }
}
