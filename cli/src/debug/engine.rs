//! `engine` messages: a client standing in for the JavaScript engine.
//!
//! Each message names a context group (default `1`) and one engine hook to
//! call. The reply is a small JSON object describing what the hook returned,
//! so that the sender can honor pauses the same way a real engine would.

use serde::Deserialize;
use serde_json::{Value, json};
use vigil_inspector::{
    AsyncTaskId, AsyncTaskKind, BreakDecision, CallFrame, ContextGroupId, Inspector,
    InspectorError, InspectorResult, RemoteObject, ResumeAction, ScriptId, ScriptInfo,
    ScriptedRuntime,
};

/// The group an engine message is addressed to.
#[derive(Debug, Deserialize)]
struct Target {
    #[serde(default = "default_group")]
    group: ContextGroupId,
}

fn default_group() -> ContextGroupId {
    ContextGroupId(1)
}

/// One engine hook call.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub(crate) enum EngineEvent {
    ScriptParsed {
        url: String,
        source: String,
        #[serde(default)]
        source_map_url: Option<String>,
        #[serde(default)]
        execution_context_id: Option<i32>,
    },
    BeforeScriptExecution {
        script_id: ScriptId,
    },
    Statement {
        frames: Vec<CallFrame>,
    },
    DebuggerStatement {
        frames: Vec<CallFrame>,
    },
    Exception {
        frames: Vec<CallFrame>,
        /// A thrown plain value.
        #[serde(default)]
        value: Option<Value>,
        /// A thrown `Error` with this message.
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        uncaught: bool,
    },
    OutOfMemory {
        frames: Vec<CallFrame>,
    },
    AsyncTaskScheduled {
        kind: AsyncTaskKind,
        description: String,
        frames: Vec<CallFrame>,
        #[serde(default)]
        recurring: bool,
    },
    AsyncTaskStarted {
        task: AsyncTaskId,
    },
    AsyncTaskFinished {
        task: AsyncTaskId,
    },
    AsyncTaskCanceled {
        task: AsyncTaskId,
    },
    CollectGarbage {
        #[serde(default)]
        obsolete: Vec<AsyncTaskId>,
    },
    ExecutionFinished,
    TakeResumeAction,
    /// Programs the scripted runtime: `expression` evaluates to `value`.
    SetValue {
        expression: String,
        value: Value,
    },
    /// Programs the scripted runtime: `expression` throws `message`.
    SetThrowing {
        expression: String,
        message: String,
    },
}

/// Parses an engine message into its group and hook call.
pub(crate) fn parse(message: Value) -> InspectorResult<(ContextGroupId, EngineEvent)> {
    let invalid = |e: serde_json::Error| InspectorError::InvalidParams(e.to_string());
    let Target { group } = Target::deserialize(&message).map_err(invalid)?;
    let event = EngineEvent::deserialize(message).map_err(invalid)?;
    Ok((group, event))
}

fn decision(decision: BreakDecision) -> Value {
    match decision {
        BreakDecision::Continue => json!({"decision": "continue"}),
        BreakDecision::Pause => json!({"decision": "pause"}),
    }
}

/// Calls the hook `event` names and describes its result.
pub(crate) fn apply(
    inspector: &mut Inspector,
    runtime: &ScriptedRuntime,
    group: ContextGroupId,
    event: EngineEvent,
) -> InspectorResult<Value> {
    log::trace!("engine event for group {group}: {event:?}");
    Ok(match event {
        EngineEvent::ScriptParsed {
            url,
            source,
            source_map_url,
            execution_context_id,
        } => {
            let mut info = ScriptInfo::new(url, source);
            if let Some(url) = source_map_url {
                info = info.with_source_map_url(url);
            }
            if let Some(id) = execution_context_id {
                info = info.with_execution_context(id);
            }
            let script_id = inspector.script_parsed(group, info)?;
            json!({ "scriptId": script_id })
        }
        EngineEvent::BeforeScriptExecution { script_id } => {
            inspector.before_script_execution(group, script_id)?;
            json!({})
        }
        EngineEvent::Statement { frames } => decision(inspector.statement(group, frames)?),
        EngineEvent::DebuggerStatement { frames } => {
            decision(inspector.debugger_statement(group, frames)?)
        }
        EngineEvent::Exception {
            frames,
            value,
            message,
            uncaught,
        } => {
            let thrown = match (message, value) {
                (Some(message), _) => RemoteObject::error(message),
                (None, Some(value)) => RemoteObject::from_json(value),
                (None, None) => RemoteObject::undefined(),
            };
            decision(inspector.exception(group, frames, thrown, uncaught)?)
        }
        EngineEvent::OutOfMemory { frames } => decision(inspector.out_of_memory(group, frames)?),
        EngineEvent::AsyncTaskScheduled {
            kind,
            description,
            frames,
            recurring,
        } => {
            let scheduled =
                inspector.async_task_scheduled(group, kind, &description, frames, recurring)?;
            let mut reply = decision(scheduled.decision);
            reply["taskId"] = json!(scheduled.task);
            reply
        }
        EngineEvent::AsyncTaskStarted { task } => {
            inspector.async_task_started(group, task)?;
            json!({})
        }
        EngineEvent::AsyncTaskFinished { task } => {
            inspector.async_task_finished(group, task)?;
            json!({})
        }
        EngineEvent::AsyncTaskCanceled { task } => {
            inspector.async_task_canceled(group, task)?;
            json!({})
        }
        EngineEvent::CollectGarbage { obsolete } => {
            let evicted = inspector.collect_garbage(group, &obsolete)?;
            json!({ "evicted": evicted })
        }
        EngineEvent::ExecutionFinished => {
            inspector.execution_finished(group)?;
            json!({})
        }
        EngineEvent::TakeResumeAction => {
            if inspector.is_paused(group) {
                return Err(InspectorError::Internal(format!(
                    "context group {group} is still paused"
                )));
            }
            match inspector.take_resume_action(group)? {
                ResumeAction::Continue => json!({ "action": "continue" }),
                ResumeAction::RestartFrame { index } => {
                    json!({ "action": "restartFrame", "index": index })
                }
            }
        }
        EngineEvent::SetValue { expression, value } => {
            runtime.set_value(expression, value);
            json!({})
        }
        EngineEvent::SetThrowing {
            expression,
            message,
        } => {
            runtime.set_throwing(expression, message);
            json!({})
        }
    })
}
