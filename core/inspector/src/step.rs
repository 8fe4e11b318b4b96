//! Step target computation.
//!
//! A step is armed with the frame stack of the pause it was issued from. Each
//! statement the engine reports afterwards is checked against that origin:
//!
//! - `Into` stops at the very next statement.
//! - `Over` stops once the stack is back at the origin depth in the origin
//!   function, or shallower. Statements of callees are passed over.
//! - `Out` stops once the stack is shallower than the origin.
//!
//! A target inside blackboxed code is not a target: the step is re-anchored at
//! that statement and keeps going in the same direction.

use crate::{SessionId, frame::CallFrame};

/// Direction of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Descend into the next call.
    Into {
        /// Pause where the next call schedules an async continuation.
        break_on_async_call: bool,
    },
    /// Stay in the current frame, passing over calls.
    Over,
    /// Run until the current frame returns.
    Out,
}

#[derive(Debug, Clone)]
struct StepRequest {
    session: SessionId,
    action: StepAction,
    depth: usize,
    function: Option<CallFrame>,
}

/// Pending step of one context group.
#[derive(Debug, Default)]
pub struct StepController {
    request: Option<StepRequest>,
}

impl StepController {
    /// Creates a controller with no step pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a step from the pause whose stack is `frames`, replacing any
    /// pending one.
    pub fn arm(&mut self, session: SessionId, action: StepAction, frames: &[CallFrame]) {
        log::debug!("session {session} armed {action:?} at depth {}", frames.len());
        self.request = Some(StepRequest {
            session,
            action,
            depth: frames.len(),
            function: frames.first().cloned(),
        });
    }

    /// Drops the pending step.
    pub fn cancel(&mut self) {
        self.request = None;
    }

    /// Drops the pending step if `session` issued it.
    pub fn cancel_for(&mut self, session: SessionId) {
        if self.active_session() == Some(session) {
            self.request = None;
        }
    }

    /// The session whose step is pending.
    pub fn active_session(&self) -> Option<SessionId> {
        self.request.as_ref().map(|r| r.session)
    }

    /// The pending step, if any.
    pub fn action(&self) -> Option<StepAction> {
        self.request.as_ref().map(|r| r.action)
    }

    /// The session waiting for the next async scheduling point, if the pending
    /// step is a step-into with `break_on_async_call`.
    pub fn breaks_on_async_call(&self) -> Option<SessionId> {
        match self.request {
            Some(StepRequest {
                session,
                action: StepAction::Into {
                    break_on_async_call: true,
                },
                ..
            }) => Some(session),
            _ => None,
        }
    }

    /// Checks the statement at the top of `frames` against the pending step.
    ///
    /// Returns the stepping session when the statement is the step target.
    /// `is_blackboxed` is asked about the top frame only; a blackboxed target
    /// re-anchors the step there.
    pub fn check<F>(&mut self, frames: &[CallFrame], is_blackboxed: F) -> Option<SessionId>
    where
        F: Fn(&CallFrame) -> bool,
    {
        let request = self.request.as_mut()?;
        let top = frames.first()?;
        let depth = frames.len();
        let reached = match request.action {
            StepAction::Into { .. } => true,
            StepAction::Over => {
                depth < request.depth
                    || (depth == request.depth
                        && request.function.as_ref().is_none_or(|f| f.same_function(top)))
            }
            StepAction::Out => depth < request.depth,
        };
        if !reached {
            return None;
        }
        if is_blackboxed(top) {
            log::trace!("step target '{}' is blackboxed, continuing", top.function_name);
            request.depth = depth;
            request.function = Some(top.clone());
            return None;
        }
        Some(request.session)
    }

    /// The engine finished a top-level run; nothing is left to step through.
    pub fn finish_execution(&mut self) {
        if let Some(request) = self.request.take() {
            log::debug!("dropped {:?} of session {} at end of execution", request.action, request.session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScriptId, frame::Location};

    const S: SessionId = SessionId(1);

    fn stack(frames: &[(&str, u32)]) -> Vec<CallFrame> {
        frames
            .iter()
            .map(|(name, line)| CallFrame::new(*name, Location::new(ScriptId(1), *line, 0)))
            .collect()
    }

    fn never(_: &CallFrame) -> bool {
        false
    }

    #[test]
    fn step_into_stops_at_the_next_statement() {
        let mut steps = StepController::new();
        steps.arm(
            S,
            StepAction::Into {
                break_on_async_call: false,
            },
            &stack(&[("main", 1)]),
        );
        assert_eq!(steps.check(&stack(&[("callee", 10), ("main", 1)]), never), Some(S));
    }

    #[test]
    fn step_over_passes_callees() {
        let mut steps = StepController::new();
        steps.arm(S, StepAction::Over, &stack(&[("main", 1)]));
        assert_eq!(steps.check(&stack(&[("callee", 10), ("main", 1)]), never), None);
        assert_eq!(steps.check(&stack(&[("main", 2)]), never), Some(S));
    }

    #[test]
    fn step_over_lands_in_the_caller_after_return() {
        let mut steps = StepController::new();
        steps.arm(S, StepAction::Over, &stack(&[("callee", 10), ("main", 1)]));
        assert_eq!(steps.check(&stack(&[("main", 2)]), never), Some(S));
    }

    #[test]
    fn step_out_waits_for_a_shallower_stack() {
        let mut steps = StepController::new();
        steps.arm(S, StepAction::Out, &stack(&[("callee", 10), ("main", 1)]));
        assert_eq!(steps.check(&stack(&[("callee", 11), ("main", 1)]), never), None);
        assert_eq!(
            steps.check(&stack(&[("inner", 20), ("callee", 11), ("main", 1)]), never),
            None
        );
        assert_eq!(steps.check(&stack(&[("main", 2)]), never), Some(S));
    }

    #[test]
    fn blackboxed_targets_are_stepped_through() {
        let mut steps = StepController::new();
        steps.arm(
            S,
            StepAction::Into {
                break_on_async_call: false,
            },
            &stack(&[("main", 1)]),
        );
        let library = |f: &CallFrame| f.function_name == "library";
        assert_eq!(steps.check(&stack(&[("library", 5), ("main", 1)]), library), None);
        assert_eq!(
            steps.check(&stack(&[("callback", 30), ("library", 5), ("main", 1)]), library),
            Some(S)
        );
    }

    #[test]
    fn step_out_into_blackboxed_callers_runs_to_completion() {
        let mut steps = StepController::new();
        steps.arm(S, StepAction::Out, &stack(&[("user", 3), ("library", 5), ("library", 1)]));
        let library = |f: &CallFrame| f.function_name == "library";
        assert_eq!(steps.check(&stack(&[("library", 6), ("library", 1)]), library), None);
        assert_eq!(steps.check(&stack(&[("library", 2)]), library), None);
        steps.finish_execution();
        assert_eq!(steps.active_session(), None);
    }

    #[test]
    fn only_the_stepping_session_cancels() {
        let mut steps = StepController::new();
        steps.arm(
            S,
            StepAction::Into {
                break_on_async_call: true,
            },
            &stack(&[("main", 1)]),
        );
        assert_eq!(steps.breaks_on_async_call(), Some(S));
        steps.cancel_for(SessionId(2));
        assert_eq!(steps.active_session(), Some(S));
        steps.cancel_for(S);
        assert_eq!(steps.active_session(), None);
    }
}
