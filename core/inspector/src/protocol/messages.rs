//! `Debugger.*` method params and results.

use crate::{
    AsyncTaskId, ScriptId,
    breakpoint::BreakpointId,
    frame::{CallFrame, CallFrameId, Location, Position, RemoteObject},
    runtime::EvalException,
    session::{Instrumentation, PauseOnExceptions},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Params
// ============================================================================

/// `Debugger.enable`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableParams {
    /// Source-text budget of the group, in bytes. Accepts fractional and
    /// exponent forms such as `10e6`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_collected_scripts_size: Option<f64>,
}

/// `Debugger.setBreakpointByUrl`. Exactly one of `url` and `url_regex` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlParams {
    /// Requested line, 0-based.
    pub line_number: u32,
    /// Exact script url.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Regular expression matched against script urls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_regex: Option<String>,
    /// Requested column, 0-based.
    #[serde(default)]
    pub column_number: u32,
    /// Expression that must be truthy for the breakpoint to pause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// `Debugger.setBreakpoint`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointParams {
    /// Requested location in a known script.
    pub location: Location,
    /// Expression that must be truthy for the breakpoint to pause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// `Debugger.removeBreakpoint`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBreakpointParams {
    /// Id returned when the breakpoint was set.
    pub breakpoint_id: BreakpointId,
}

/// `Debugger.setBreakpointsActive`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsActiveParams {
    /// New value of the session's global breakpoint mask.
    pub active: bool,
}

/// `Debugger.setInstrumentationBreakpoint`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInstrumentationBreakpointParams {
    /// Engine event to pause at.
    pub instrumentation: Instrumentation,
}

/// `Debugger.stepInto`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepIntoParams {
    /// Pause where the next async task is scheduled.
    #[serde(default)]
    pub break_on_async_call: bool,
}

/// `Debugger.restartFrame`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartFrameParams {
    /// Frame of the current pause to re-enter.
    pub call_frame_id: CallFrameId,
    /// Only `StepInto` is supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// `Debugger.evaluateOnCallFrame`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOnCallFrameParams {
    /// Frame of the current pause to evaluate in.
    pub call_frame_id: CallFrameId,
    /// Source text to evaluate.
    pub expression: String,
}

/// A value sent by the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
    /// A JSON-representable value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// `NaN`, `Infinity`, `-Infinity`, `-0` or a bigint literal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
}

impl CallArgument {
    /// The debuggee-side mirror of the argument. An empty argument is `undefined`.
    pub fn to_remote_object(&self) -> RemoteObject {
        if let Some(value) = &self.value {
            return RemoteObject::from_json(value.clone());
        }
        match &self.unserializable_value {
            Some(literal) => {
                let kind = if literal.ends_with('n') { "bigint" } else { "number" };
                RemoteObject {
                    kind: kind.to_string(),
                    description: Some(literal.clone()),
                    ..RemoteObject::undefined()
                }
            }
            None => RemoteObject::undefined(),
        }
    }
}

/// `Debugger.setVariableValue`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariableValueParams {
    /// Frame of the current pause owning the scope.
    pub call_frame_id: CallFrameId,
    /// Index into the frame's scope chain.
    pub scope_number: usize,
    /// Variable to assign.
    pub variable_name: String,
    /// The value to assign.
    pub new_value: CallArgument,
}

/// `Debugger.setBlackboxPatterns`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBlackboxPatternsParams {
    /// Url regular expressions; replaces the previous set.
    pub patterns: Vec<String>,
}

/// `Debugger.setBlackboxedRanges`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBlackboxedRangesParams {
    /// Script the ranges apply to.
    pub script_id: ScriptId,
    /// Sorted range boundaries; even entries open a range, odd ones close it.
    pub positions: Vec<Position>,
}

/// `Debugger.setAsyncCallStackDepth`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAsyncCallStackDepthParams {
    /// Maximum number of async parents reported; 0 turns tracking off.
    pub max_depth: u32,
}

/// `Debugger.pauseOnAsyncTask`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseOnAsyncTaskParams {
    /// Task to pause in once it starts running.
    pub async_task_id: AsyncTaskId,
}

/// `Debugger.getScriptSource`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceParams {
    /// Script whose text is returned.
    pub script_id: ScriptId,
}

/// `Debugger.getPossibleBreakpoints`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPossibleBreakpointsParams {
    /// Start of the range, inclusive.
    pub start: Location,
    /// End of the range, exclusive. Defaults to the end of the script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<Location>,
}

/// `Debugger.setPauseOnExceptions`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPauseOnExceptionsParams {
    /// Which exceptions pause.
    pub state: PauseOnExceptions,
}

/// `Debugger.setSkipAllPauses`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSkipAllPausesParams {
    /// Whether every pause of the session is suppressed.
    pub skip: bool,
}

// ============================================================================
// Results
// ============================================================================

/// Result of `Debugger.enable`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableResult {
    /// Identifies this debugger among sessions, as `group.session`.
    pub debugger_id: String,
}

/// Result of `Debugger.setBreakpointByUrl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlResult {
    /// Id of the new breakpoint.
    pub breakpoint_id: BreakpointId,
    /// Where it resolved in the scripts known so far.
    pub locations: Vec<Location>,
}

/// Result of `Debugger.setBreakpoint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointResult {
    /// Id of the new breakpoint.
    pub breakpoint_id: BreakpointId,
    /// The break location the request snapped to.
    pub actual_location: Location,
}

/// Result of `Debugger.setInstrumentationBreakpoint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInstrumentationBreakpointResult {
    /// Id of the instrumentation breakpoint.
    pub breakpoint_id: BreakpointId,
}

/// Result of `Debugger.restartFrame`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartFrameResult {
    /// Frames of the pause at the time of the restart.
    pub call_frames: Vec<CallFrame>,
}

/// An exception thrown while evaluating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Human-readable summary.
    pub text: String,
    /// The thrown value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteObject>,
}

impl From<EvalException> for ExceptionDetails {
    fn from(exception: EvalException) -> Self {
        Self {
            text: exception.text,
            exception: exception.exception,
        }
    }
}

/// Result of `Debugger.evaluateOnCallFrame`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOnCallFrameResult {
    /// The completion value, or the thrown value on failure.
    pub result: RemoteObject,
    /// Set when the evaluation threw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

/// Result of `Debugger.getScriptSource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceResult {
    /// Full source text.
    pub script_source: String,
}

/// Result of `Debugger.getPossibleBreakpoints`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPossibleBreakpointsResult {
    /// Break locations in the requested range, in source order.
    pub locations: Vec<Location>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exponent_budget_is_accepted() {
        let params: EnableParams =
            serde_json::from_str(r#"{"maxCollectedScriptsSize": 10e6}"#).unwrap();
        assert_eq!(params.max_collected_scripts_size, Some(10_000_000.0));
    }

    #[test]
    fn unserializable_arguments() {
        let nan = CallArgument {
            value: None,
            unserializable_value: Some("NaN".into()),
        };
        assert_eq!(nan.to_remote_object().kind, "number");
        assert_eq!(CallArgument::default().to_remote_object(), RemoteObject::undefined());
        let big: CallArgument = serde_json::from_value(json!({"unserializableValue": "12n"})).unwrap();
        assert_eq!(big.to_remote_object().kind, "bigint");
    }
}
