//! Events sent to sessions, and the per-session subscription table.

use crate::{
    AsyncTaskId, ScriptId, SessionId,
    breakpoint::BreakpointId,
    frame::{CallFrame, Location, StackTrace},
    pause::{Pause, PauseReason},
    script::Script,
};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// `Debugger.scriptParsed` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedEvent {
    /// Id of the new script.
    pub script_id: ScriptId,
    /// Url the script was loaded from; may be empty.
    pub url: String,
    /// Always 0: scripts start at their first line.
    pub start_line: u32,
    /// Always 0.
    pub start_column: u32,
    /// Line of the last character.
    pub end_line: u32,
    /// Column just past the last character on `end_line`.
    pub end_column: u32,
    /// Context the script was compiled in.
    pub execution_context_id: i32,
    /// Source length in bytes.
    pub length: usize,
    /// `sourceMappingURL` of the script, if any.
    #[serde(rename = "sourceMapURL", skip_serializing_if = "Option::is_none")]
    pub source_map_url: Option<String>,
}

impl From<&Script> for ScriptParsedEvent {
    fn from(script: &Script) -> Self {
        let end = script.end();
        Self {
            script_id: script.id(),
            url: script.url().to_string(),
            start_line: 0,
            start_column: 0,
            end_line: end.line_number,
            end_column: end.column_number,
            execution_context_id: script.execution_context_id(),
            length: script.length(),
            source_map_url: script.source_map_url().map(str::to_string),
        }
    }
}

/// `Debugger.breakpointResolved` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointResolvedEvent {
    /// Breakpoint that resolved.
    pub breakpoint_id: BreakpointId,
    /// Where it resolved.
    pub location: Location,
}

/// `Debugger.paused` payload, as seen by one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedEvent {
    /// Stack at the pause, innermost first.
    pub call_frames: Vec<CallFrame>,
    /// Why execution stopped.
    pub reason: PauseReason,
    /// Reason-specific details, such as the exception value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Breakpoints of this session at the pause location.
    pub hit_breakpoints: Vec<BreakpointId>,
    /// Async callers of the current task, if tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_stack_trace: Option<StackTrace>,
    /// Task whose scheduling a step into an async call stopped at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_async_task_id: Option<AsyncTaskId>,
}

impl PausedEvent {
    pub(crate) fn new(pause: &Pause, session: SessionId) -> Self {
        Self {
            call_frames: pause.frames().to_vec(),
            reason: pause.reason(),
            data: pause.data(),
            hit_breakpoints: pause.hit_breakpoints(session),
            async_stack_trace: pause.async_stack_trace().cloned(),
            scheduled_async_task_id: pause.scheduled_async_task(),
        }
    }
}

/// A notification for one session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `Debugger.scriptParsed`
    ScriptParsed(ScriptParsedEvent),
    /// `Debugger.breakpointResolved`
    BreakpointResolved(BreakpointResolvedEvent),
    /// `Debugger.paused`
    Paused(Box<PausedEvent>),
    /// `Debugger.resumed`
    Resumed,
}

impl Event {
    /// Protocol method name of the event.
    pub fn method(&self) -> &'static str {
        match self {
            Self::ScriptParsed(_) => "Debugger.scriptParsed",
            Self::BreakpointResolved(_) => "Debugger.breakpointResolved",
            Self::Paused(_) => "Debugger.paused",
            Self::Resumed => "Debugger.resumed",
        }
    }

    /// Protocol params of the event.
    pub fn params(&self) -> Value {
        let params = match self {
            Self::ScriptParsed(event) => serde_json::to_value(event),
            Self::BreakpointResolved(event) => serde_json::to_value(event),
            Self::Paused(event) => serde_json::to_value(event),
            Self::Resumed => return Value::Object(serde_json::Map::new()),
        };
        // The payloads hold only strings, numbers and json values.
        params.unwrap_or(Value::Null)
    }
}

/// Callback receiving a session's events.
pub type Listener = Box<dyn FnMut(&Event) + Send>;

/// Ordered event callbacks per session.
///
/// Listeners run while the inspector is borrowed, so they must not call back
/// into it; queue the event instead.
#[derive(Default)]
pub struct EventSubscriptions {
    listeners: FxHashMap<SessionId, Vec<Listener>>,
}

impl fmt::Debug for EventSubscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.listeners.iter().map(|(id, l)| (id, l.len())))
            .finish()
    }
}

impl EventSubscriptions {
    /// Appends a listener for `session`.
    pub fn subscribe(&mut self, session: SessionId, listener: Listener) {
        self.listeners.entry(session).or_default().push(listener);
    }

    /// Drops every listener of `session`.
    pub fn unsubscribe_all(&mut self, session: SessionId) {
        self.listeners.remove(&session);
    }

    /// Calls `session`'s listeners in subscription order.
    pub fn dispatch(&mut self, session: SessionId, event: &Event) {
        log::trace!("session {session} <- {}", event.method());
        if let Some(listeners) = self.listeners.get_mut(&session) {
            for listener in listeners {
                listener(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn listeners_only_see_their_session() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut subscriptions = EventSubscriptions::default();
        for tag in ["first", "second"] {
            let seen = seen.clone();
            subscriptions.subscribe(
                SessionId(1),
                Box::new(move |event| seen.lock().unwrap().push((tag, event.method()))),
            );
        }

        subscriptions.dispatch(SessionId(1), &Event::Resumed);
        subscriptions.dispatch(SessionId(2), &Event::Resumed);
        subscriptions.unsubscribe_all(SessionId(1));
        subscriptions.dispatch(SessionId(1), &Event::Resumed);

        assert_eq!(
            *seen.lock().unwrap(),
            [("first", "Debugger.resumed"), ("second", "Debugger.resumed")]
        );
    }

    #[test]
    fn resumed_has_empty_params() {
        assert_eq!(Event::Resumed.params(), serde_json::json!({}));
    }
}
