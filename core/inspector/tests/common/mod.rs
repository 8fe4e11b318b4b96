#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use vigil_inspector::{
    CallFrame, ContextGroupId, Event, Inspector, InspectorConfig, Location, PausedEvent,
    ScriptId, ScriptInfo, ScriptedRuntime, SessionId,
};

pub const GROUP: ContextGroupId = ContextGroupId(1);

type EventLog = Arc<Mutex<Vec<(SessionId, Event)>>>;

/// An inspector with one context group backed by a [`ScriptedRuntime`], and
/// a log of every event each session received.
pub struct Harness {
    pub inspector: Inspector,
    pub runtime: ScriptedRuntime,
    log: EventLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(InspectorConfig::default())
    }

    pub fn with_config(config: InspectorConfig) -> Self {
        let mut inspector = Inspector::new(config);
        let runtime = ScriptedRuntime::new();
        inspector.add_context_group(GROUP, runtime.clone());
        Self {
            inspector,
            runtime,
            log: EventLog::default(),
        }
    }

    pub fn add_group(&mut self, group: ContextGroupId) -> ScriptedRuntime {
        let runtime = ScriptedRuntime::new();
        assert!(self.inspector.add_context_group(group, runtime.clone()));
        runtime
    }

    /// Connects a logged, disabled session.
    pub fn connect_to(&mut self, group: ContextGroupId) -> SessionId {
        let session = self.inspector.connect(group).unwrap();
        let log = self.log.clone();
        self.inspector
            .subscribe(
                session,
                Box::new(move |event| log.lock().unwrap().push((session, event.clone()))),
            )
            .unwrap();
        session
    }

    pub fn connect(&mut self) -> SessionId {
        self.connect_to(GROUP)
    }

    pub fn enabled_session(&mut self) -> SessionId {
        let session = self.connect();
        self.inspector.enable(session, None).unwrap();
        session
    }

    pub fn load(&mut self, url: &str, source: &str) -> ScriptId {
        self.inspector
            .script_parsed(GROUP, ScriptInfo::new(url, source))
            .unwrap()
    }

    pub fn events(&self, session: SessionId) -> Vec<Event> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == session)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn count(&self, session: SessionId, method: &str) -> usize {
        self.events(session)
            .iter()
            .filter(|event| event.method() == method)
            .count()
    }

    pub fn paused_events(&self, session: SessionId) -> Vec<PausedEvent> {
        self.events(session)
            .into_iter()
            .filter_map(|event| match event {
                Event::Paused(paused) => Some(*paused),
                _ => None,
            })
            .collect()
    }

    pub fn last_paused(&self, session: SessionId) -> PausedEvent {
        self.paused_events(session)
            .pop()
            .expect("session saw no Debugger.paused")
    }

    pub fn clear_events(&self) {
        self.log.lock().unwrap().clear();
    }
}

pub fn frame(name: &str, script: ScriptId, line: u32, column: u32) -> CallFrame {
    CallFrame::new(name, Location::new(script, line, column))
}
