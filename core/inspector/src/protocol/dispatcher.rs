//! Routes protocol requests to inspector commands.

use super::{Request, Response, messages::*};
use crate::{
    SessionId,
    breakpoint::UrlSpec,
    error::{InspectorError, InspectorResult},
    inspector::Inspector,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

/// Handles one request issued by `session`. Errors become error responses.
pub fn dispatch(inspector: &mut Inspector, session: SessionId, request: Request) -> Response {
    let Request { id, method, params } = request;
    log::trace!("session {session} -> {method} (#{id})");
    match handle(inspector, session, &method, params) {
        Ok(result) => Response::success(id, result),
        Err(error) => {
            log::debug!("{method} (#{id}) failed: {error}");
            Response::failure(id, &error)
        }
    }
}

fn handle(
    inspector: &mut Inspector,
    session: SessionId,
    method: &str,
    params: Value,
) -> InspectorResult<Value> {
    match method {
        "Debugger.enable" => {
            let args: EnableParams = parse(params)?;
            let budget = args
                .max_collected_scripts_size
                .map(budget_bytes)
                .transpose()?;
            inspector.enable(session, budget)?;
            let group = inspector.session(session)?.context_group();
            result(EnableResult {
                debugger_id: format!("{group}.{session}"),
            })
        }
        "Debugger.disable" => {
            inspector.disable(session)?;
            ack()
        }
        "Debugger.setBreakpointByUrl" => {
            let args: SetBreakpointByUrlParams = parse(params)?;
            let url = match (args.url, args.url_regex) {
                (Some(url), None) => UrlSpec::Exact(url),
                (None, Some(regex)) => UrlSpec::Regex(regex),
                _ => {
                    return Err(InspectorError::InvalidParams(
                        "Either url or urlRegex must be specified.".to_string(),
                    ));
                }
            };
            let (breakpoint_id, locations) = inspector.set_breakpoint_by_url(
                session,
                url,
                args.line_number,
                args.column_number,
                args.condition,
            )?;
            result(SetBreakpointByUrlResult {
                breakpoint_id,
                locations,
            })
        }
        "Debugger.setBreakpoint" => {
            let args: SetBreakpointParams = parse(params)?;
            let (breakpoint_id, actual_location) =
                inspector.set_breakpoint(session, args.location, args.condition)?;
            result(SetBreakpointResult {
                breakpoint_id,
                actual_location,
            })
        }
        "Debugger.removeBreakpoint" => {
            let args: RemoveBreakpointParams = parse(params)?;
            inspector.remove_breakpoint(session, &args.breakpoint_id)?;
            ack()
        }
        "Debugger.setBreakpointsActive" => {
            let args: SetBreakpointsActiveParams = parse(params)?;
            inspector.set_breakpoints_active(session, args.active)?;
            ack()
        }
        "Debugger.setInstrumentationBreakpoint" => {
            let args: SetInstrumentationBreakpointParams = parse(params)?;
            let breakpoint_id = inspector.set_instrumentation_breakpoint(session, args.instrumentation)?;
            result(SetInstrumentationBreakpointResult { breakpoint_id })
        }
        "Debugger.getPossibleBreakpoints" => {
            let args: GetPossibleBreakpointsParams = parse(params)?;
            let locations = inspector.get_possible_breakpoints(session, args.start, args.end)?;
            result(GetPossibleBreakpointsResult { locations })
        }
        "Debugger.pause" => {
            inspector.pause(session)?;
            ack()
        }
        "Debugger.resume" => {
            inspector.resume(session)?;
            ack()
        }
        "Debugger.stepInto" => {
            let args: StepIntoParams = parse(params)?;
            inspector.step_into(session, args.break_on_async_call)?;
            ack()
        }
        "Debugger.stepOver" => {
            inspector.step_over(session)?;
            ack()
        }
        "Debugger.stepOut" => {
            inspector.step_out(session)?;
            ack()
        }
        "Debugger.restartFrame" => {
            let args: RestartFrameParams = parse(params)?;
            if args.mode.as_deref().is_some_and(|mode| mode != "StepInto") {
                return Err(InspectorError::InvalidParams(
                    "Restarting frame failed: mode must be StepInto".to_string(),
                ));
            }
            let call_frames = inspector.restart_frame(session, args.call_frame_id)?;
            result(RestartFrameResult { call_frames })
        }
        "Debugger.pauseOnAsyncTask" => {
            let args: PauseOnAsyncTaskParams = parse(params)?;
            inspector.pause_on_async_task(session, args.async_task_id)?;
            ack()
        }
        "Debugger.evaluateOnCallFrame" => {
            let args: EvaluateOnCallFrameParams = parse(params)?;
            let outcome =
                inspector.evaluate_on_call_frame(session, args.call_frame_id, &args.expression)?;
            result(EvaluateOnCallFrameResult {
                result: outcome.result,
                exception_details: outcome.exception.map(ExceptionDetails::from),
            })
        }
        "Debugger.setVariableValue" => {
            let args: SetVariableValueParams = parse(params)?;
            inspector.set_variable_value(
                session,
                args.call_frame_id,
                args.scope_number,
                &args.variable_name,
                &args.new_value.to_remote_object(),
            )?;
            ack()
        }
        "Debugger.getScriptSource" => {
            let args: GetScriptSourceParams = parse(params)?;
            let script_source = inspector.get_script_source(session, args.script_id)?;
            result(GetScriptSourceResult { script_source })
        }
        "Debugger.setBlackboxPatterns" => {
            let args: SetBlackboxPatternsParams = parse(params)?;
            inspector.set_blackbox_patterns(session, args.patterns)?;
            ack()
        }
        "Debugger.setBlackboxedRanges" => {
            let args: SetBlackboxedRangesParams = parse(params)?;
            inspector.set_blackboxed_ranges(session, args.script_id, args.positions)?;
            ack()
        }
        "Debugger.setAsyncCallStackDepth" => {
            let args: SetAsyncCallStackDepthParams = parse(params)?;
            inspector.set_async_call_stack_depth(session, args.max_depth)?;
            ack()
        }
        "Debugger.setPauseOnExceptions" => {
            let args: SetPauseOnExceptionsParams = parse(params)?;
            inspector.set_pause_on_exceptions(session, args.state)?;
            ack()
        }
        "Debugger.setSkipAllPauses" => {
            let args: SetSkipAllPausesParams = parse(params)?;
            inspector.set_skip_all_pauses(session, args.skip)?;
            ack()
        }
        _ => Err(InspectorError::UnknownMethod(method.to_string())),
    }
}

/// Absent params are read as an empty object.
fn parse<T: DeserializeOwned>(params: Value) -> InspectorResult<T> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| InspectorError::InvalidParams(e.to_string()))
}

fn result<T: Serialize>(value: T) -> InspectorResult<Value> {
    serde_json::to_value(value).map_err(|e| InspectorError::Internal(e.to_string()))
}

fn ack() -> InspectorResult<Value> {
    Ok(json!({}))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn budget_bytes(bytes: f64) -> InspectorResult<usize> {
    if !bytes.is_finite() || bytes < 0.0 {
        return Err(InspectorError::InvalidParams(
            "maxCollectedScriptsSize should be a non-negative number".to_string(),
        ));
    }
    Ok(bytes as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContextGroupId, ScriptedRuntime};

    fn enabled() -> (Inspector, SessionId) {
        let mut inspector = Inspector::default();
        inspector.add_context_group(ContextGroupId(1), ScriptedRuntime::new());
        let session = inspector.connect(ContextGroupId(1)).unwrap();
        let response = dispatch(
            &mut inspector,
            session,
            Request {
                id: 1,
                method: "Debugger.enable".into(),
                params: Value::Null,
            },
        );
        assert_eq!(response.result.unwrap()["debuggerId"], "1.1");
        (inspector, session)
    }

    fn call(inspector: &mut Inspector, session: SessionId, method: &str, params: Value) -> Response {
        dispatch(
            inspector,
            session,
            Request {
                id: 7,
                method: method.into(),
                params,
            },
        )
    }

    #[test]
    fn unknown_methods_are_reported() {
        let (mut inspector, session) = enabled();
        let response = call(&mut inspector, session, "Debugger.frobnicate", Value::Null);
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "'Debugger.frobnicate' wasn't found");
    }

    #[test]
    fn malformed_params_are_invalid() {
        let (mut inspector, session) = enabled();
        let response = call(
            &mut inspector,
            session,
            "Debugger.setBreakpointByUrl",
            json!({"url": "a.js"}),
        );
        assert_eq!(response.error.unwrap().code, -32602);

        let response = call(
            &mut inspector,
            session,
            "Debugger.setBreakpointByUrl",
            json!({"lineNumber": 1}),
        );
        assert_eq!(
            response.error.unwrap().message,
            "Invalid parameters: Either url or urlRegex must be specified."
        );
    }

    #[test]
    fn resume_while_running_is_an_error() {
        let (mut inspector, session) = enabled();
        let response = call(&mut inspector, session, "Debugger.resume", Value::Null);
        assert_eq!(
            response.error.unwrap().message,
            "Can only perform operation while paused."
        );
    }

    #[test]
    fn invalid_blackbox_pattern_carries_the_parser_message() {
        let (mut inspector, session) = enabled();
        let response = call(
            &mut inspector,
            session,
            "Debugger.setBlackboxPatterns",
            json!({"patterns": ["(unclosed"]}),
        );
        let message = response.error.unwrap().message;
        assert!(message.starts_with("Pattern parser error: "), "{message}");
    }

    #[test]
    fn url_breakpoint_result_shape() {
        let (mut inspector, session) = enabled();
        let response = call(
            &mut inspector,
            session,
            "Debugger.setBreakpointByUrl",
            json!({"url": "a.js", "lineNumber": 3}),
        );
        assert_eq!(
            response.result.unwrap(),
            json!({"breakpointId": "1:3:0:a.js", "locations": []})
        );
    }
}
