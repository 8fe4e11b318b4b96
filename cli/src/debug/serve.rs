//! Message loop of the `vigil` server.
//!
//! The server reads a stream of JSON objects. Each one is either a session
//! control message (`connect`, `disconnect`, `reconnect`), an engine report
//! (`engine`), or a protocol request addressed to a session. Events raised
//! while a message is handled are written out before its reply.

use super::engine;
use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{
    collections::BTreeMap,
    io,
    net::TcpListener,
    sync::mpsc::{self, Receiver, Sender},
};
use vigil_inspector::{
    ContextGroupId, Event, Inspector, InspectorConfig, InspectorError, InspectorResult, SessionId,
    ScriptedRuntime,
    protocol::{self, ErrorObject, Notification, Request, StreamTransport},
};

/// Where the server reads messages from.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Transport {
    /// Standard input/output (default)
    Stdio,
    /// A single client on 127.0.0.1:PORT
    Tcp(u16),
}

/// One incoming message.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Message {
    Connect {
        connect: ContextGroupId,
    },
    Disconnect {
        disconnect: SessionId,
    },
    Reconnect {
        reconnect: SessionId,
    },
    Engine {
        engine: Value,
    },
    Command {
        session: SessionId,
        #[serde(flatten)]
        request: Request,
    },
}

/// JSON-RPC code for input that is not JSON.
const PARSE_ERROR: i64 = -32700;
/// JSON-RPC code for a message that is none of the above.
const INVALID_REQUEST: i64 = -32600;

fn error_reply(error: ErrorObject) -> Value {
    json!({ "error": error })
}

pub(crate) struct Server {
    inspector: Inspector,
    runtimes: BTreeMap<ContextGroupId, ScriptedRuntime>,
    sender: Sender<(SessionId, Event)>,
    events: Receiver<(SessionId, Event)>,
}

impl Server {
    pub(crate) fn new(config: InspectorConfig) -> Self {
        let (sender, events) = mpsc::channel();
        Self {
            inspector: Inspector::new(config),
            runtimes: BTreeMap::new(),
            sender,
            events,
        }
    }

    /// Serves one client until it closes its side of the stream.
    pub(crate) fn serve(mut self, transport: Transport) -> Result<()> {
        match transport {
            Transport::Stdio => {
                log::info!("serving on stdio");
                self.run(&mut StreamTransport::stdio())
            }
            Transport::Tcp(port) => {
                let listener = TcpListener::bind(("127.0.0.1", port))
                    .wrap_err_with(|| format!("could not listen on port {port}"))?;
                log::info!("listening on {}", listener.local_addr()?);
                let (stream, peer) = listener.accept()?;
                log::info!("client connected from {peer}");
                self.run(&mut StreamTransport::new(stream.try_clone()?, stream))
            }
        }
    }

    fn run<T: protocol::Transport>(&mut self, transport: &mut T) -> Result<()> {
        loop {
            let reply = match transport.read_message() {
                Ok(Some(message)) => self.handle(message),
                Ok(None) => break,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    log::debug!("skipping malformed message: {e}");
                    error_reply(ErrorObject {
                        code: PARSE_ERROR,
                        message: format!("Parse error: {e}"),
                    })
                }
                Err(e) => return Err(e).wrap_err("could not read message"),
            };
            self.flush_events(transport)?;
            transport.write_message(&reply)?;
        }
        log::info!("client closed the stream");
        Ok(())
    }

    fn flush_events<T: protocol::Transport>(&mut self, transport: &mut T) -> Result<()> {
        while let Ok((session, event)) = self.events.try_recv() {
            let Notification { method, params } = Notification::from(&event);
            transport.write_message(&json!({
                "session": session,
                "method": method,
                "params": params,
            }))?;
        }
        Ok(())
    }

    fn handle(&mut self, message: Value) -> Value {
        log::trace!("message: {message}");
        let message = match Message::deserialize(message) {
            Ok(message) => message,
            Err(e) => {
                return error_reply(ErrorObject {
                    code: INVALID_REQUEST,
                    message: format!("Invalid request: {e}"),
                });
            }
        };
        match message {
            Message::Connect { connect } => match self.connect(connect) {
                Ok(session) => json!({ "connected": session }),
                Err(e) => error_reply((&e).into()),
            },
            Message::Disconnect { disconnect } => match self.inspector.stop(disconnect) {
                Ok(()) => json!({ "disconnected": disconnect }),
                Err(e) => error_reply((&e).into()),
            },
            Message::Reconnect { reconnect } => match self.inspector.reconnect(reconnect) {
                Ok(()) => json!({ "reconnected": reconnect }),
                Err(e) => error_reply((&e).into()),
            },
            Message::Engine { engine } => {
                let reply = self.engine(engine).unwrap_or_else(|e| {
                    log::debug!("engine message failed: {e}");
                    error_reply((&e).into())
                });
                json!({ "engine": reply })
            }
            Message::Command { session, request } => {
                let response = protocol::dispatch(&mut self.inspector, session, request);
                let mut reply = json!(response);
                reply["session"] = json!(session);
                reply
            }
        }
    }

    /// Opens a session on `group`, creating the group on first use.
    fn connect(&mut self, group: ContextGroupId) -> InspectorResult<SessionId> {
        if !self.runtimes.contains_key(&group) {
            let runtime = ScriptedRuntime::new();
            self.inspector.add_context_group(group, runtime.clone());
            self.runtimes.insert(group, runtime);
        }
        let session = self.inspector.connect(group)?;
        let sender = self.sender.clone();
        self.inspector.subscribe(
            session,
            Box::new(move |event| {
                sender.send((session, event.clone())).ok();
            }),
        )?;
        log::debug!("session {session} connected to context group {group}");
        Ok(session)
    }

    fn engine(&mut self, message: Value) -> InspectorResult<Value> {
        let (group, event) = engine::parse(message)?;
        let runtime = self
            .runtimes
            .get(&group)
            .ok_or(InspectorError::UnknownContextGroup(group))?;
        engine::apply(&mut self.inspector, runtime, group, event)
    }
}
