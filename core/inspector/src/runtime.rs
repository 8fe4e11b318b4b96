//! The engine side of frame-level operations.
//!
//! While a context group is paused, the inspector answers `evaluateOnCallFrame`,
//! `setVariableValue` and `restartFrame` by calling into the engine that owns
//! the parked frames. [`Runtime`] is that seam.

use crate::frame::{CallFrame, RemoteObject};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

/// An exception thrown by code evaluated in a paused frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalException {
    /// Summary such as `ReferenceError: x is not defined`.
    pub text: String,
    /// The thrown value.
    pub exception: Option<RemoteObject>,
}

impl EvalException {
    /// An exception with only a summary.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exception: None,
        }
    }
}

/// Frame-level services of the engine hosting one context group.
pub trait Runtime: Send {
    /// Evaluates `expression` in the context of `frame`.
    fn evaluate_on_frame(
        &mut self,
        frame: &CallFrame,
        expression: &str,
    ) -> Result<RemoteObject, EvalException>;

    /// Assigns `value` to `name` in the scope at `scope_number` of `frame`'s chain.
    fn set_variable_value(
        &mut self,
        frame: &CallFrame,
        scope_number: usize,
        name: &str,
        value: &RemoteObject,
    ) -> Result<(), String>;

    /// Prepares the engine to unwind to `frame` and re-enter it once resumed.
    fn restart_frame(&mut self, frame: &CallFrame) -> Result<(), String> {
        let _ = frame;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ScriptedState {
    values: FxHashMap<String, RemoteObject>,
    throwing: FxHashMap<String, String>,
    assignments: Vec<(String, usize, String, RemoteObject)>,
    restarted: Vec<String>,
    refuse_restart: bool,
}

/// A [`Runtime`] answering from a table of canned results.
///
/// Expressions resolve, in order, to: a programmed exception, a variable
/// assigned through `set_variable_value`, a programmed value, or a JSON
/// literal. Anything else throws a `ReferenceError`. Clones share state, so a
/// test can keep a handle after moving one into the inspector.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRuntime {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedRuntime {
    /// A runtime with nothing programmed.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        // The state holds plain data; a panic elsewhere cannot leave it torn.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Makes `expression` evaluate to `value`.
    pub fn set_value(&self, expression: impl Into<String>, value: Value) {
        self.state()
            .values
            .insert(expression.into(), RemoteObject::from_json(value));
    }

    /// Makes `expression` throw with `message`.
    pub fn set_throwing(&self, expression: impl Into<String>, message: impl Into<String>) {
        self.state().throwing.insert(expression.into(), message.into());
    }

    /// Makes every `restart_frame` call fail.
    pub fn refuse_restarts(&self) {
        self.state().refuse_restart = true;
    }

    /// Function names of the frames restarted so far.
    pub fn restarted_frames(&self) -> Vec<String> {
        self.state().restarted.clone()
    }

    /// `(function, scope, name, value)` of every assignment so far.
    pub fn assignments(&self) -> Vec<(String, usize, String, RemoteObject)> {
        self.state().assignments.clone()
    }
}

impl Runtime for ScriptedRuntime {
    fn evaluate_on_frame(
        &mut self,
        frame: &CallFrame,
        expression: &str,
    ) -> Result<RemoteObject, EvalException> {
        let state = self.state();
        let expression = expression.trim();
        if let Some(message) = state.throwing.get(expression) {
            return Err(EvalException::new(message.clone()));
        }
        let assigned = state
            .assignments
            .iter()
            .rev()
            .find(|(function, _, name, _)| *function == frame.function_name && name == expression);
        if let Some((_, _, _, value)) = assigned {
            return Ok(value.clone());
        }
        if let Some(value) = state.values.get(expression) {
            return Ok(value.clone());
        }
        if expression == "undefined" {
            return Ok(RemoteObject::undefined());
        }
        serde_json::from_str::<Value>(expression)
            .map(RemoteObject::from_json)
            .map_err(|_| {
                EvalException::new(format!("ReferenceError: {expression} is not defined"))
            })
    }

    fn set_variable_value(
        &mut self,
        frame: &CallFrame,
        scope_number: usize,
        name: &str,
        value: &RemoteObject,
    ) -> Result<(), String> {
        self.state().assignments.push((
            frame.function_name.clone(),
            scope_number,
            name.to_string(),
            value.clone(),
        ));
        Ok(())
    }

    fn restart_frame(&mut self, frame: &CallFrame) -> Result<(), String> {
        let mut state = self.state();
        if state.refuse_restart {
            return Err(format!("cannot restart '{}'", frame.function_name));
        }
        state.restarted.push(frame.function_name.clone());
        Ok(())
    }
}
