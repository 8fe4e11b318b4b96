//! Pause causes, their merging, and the operations only valid while paused.

mod common;

use common::{GROUP, Harness, frame};
use serde_json::json;
use vigil_inspector::{
    BreakDecision, CallFrame, CallFrameId, ConditionErrorPolicy, Instrumentation, InspectorConfig,
    InspectorError, PauseOnExceptions, PauseReason, RemoteObject, ResumeAction, ScopeType,
    ScriptId, ScriptInfo, UrlSpec,
};

const SOURCE: &str = "function add(a, b) {\n  return a + b;\n}\nadd(1, 2);\n";

fn top_frame_id(h: &Harness, session: vigil_inspector::SessionId) -> CallFrameId {
    h.last_paused(session).call_frames[0].call_frame_id.unwrap()
}

fn paused_in_add(h: &mut Harness, script: ScriptId) -> Vec<CallFrame> {
    let frames = vec![
        frame("add", script, 1, 2)
            .with_scope(ScopeType::Local, RemoteObject::from_json(json!({"a": 1, "b": 2})))
            .with_scope(ScopeType::Global, RemoteObject::from_json(json!({}))),
        frame("", script, 3, 0),
    ];
    assert_eq!(
        h.inspector.debugger_statement(GROUP, frames.clone()).unwrap(),
        BreakDecision::Pause
    );
    frames
}

#[test]
fn debugger_statement_pauses_with_stamped_frames() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    paused_in_add(&mut h, script);

    let paused = h.last_paused(session);
    assert_eq!(paused.reason, PauseReason::Other);
    assert_eq!(paused.data, Some(json!({"debuggerStatement": true})));
    let ids: Vec<_> = paused
        .call_frames
        .iter()
        .map(|f| f.call_frame_id.unwrap().index)
        .collect();
    assert_eq!(ids, [0, 1]);
}

#[test]
fn pause_request_fires_at_the_next_statement_and_is_a_no_op_while_paused() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();

    h.inspector.pause(session).unwrap();
    h.inspector.pause(session).unwrap();
    let decision = h
        .inspector
        .statement(GROUP, vec![frame("", script, 3, 0)])
        .unwrap();
    assert_eq!(decision, BreakDecision::Pause);
    assert_eq!(h.inspector.current_pause(GROUP).unwrap().causes().len(), 1);

    h.inspector.pause(session).unwrap();
    h.inspector.resume(session).unwrap();
    let decision = h
        .inspector
        .statement(GROUP, vec![frame("add", script, 1, 2)])
        .unwrap();
    assert_eq!(decision, BreakDecision::Continue);
}

#[test]
fn resume_while_running_fails() {
    let mut h = Harness::new();
    let session = h.enabled_session();
    let error = h.inspector.resume(session).unwrap_err();
    assert_eq!(error, InspectorError::NotPaused);
    assert_eq!(error.to_string(), "Can only perform operation while paused.");
}

#[test]
fn coinciding_causes_are_reported_as_ambiguous() {
    let mut h = Harness::new();
    let session = h.enabled_session();
    let script = h.load("main.js", SOURCE);
    let instrumentation = h
        .inspector
        .set_instrumentation_breakpoint(session, Instrumentation::BeforeScriptExecution)
        .unwrap();
    assert_eq!(instrumentation.0, "instrumentation:beforeScriptExecution");
    let (breakpoint, locations) = h
        .inspector
        .set_breakpoint_by_url(session, UrlSpec::Exact("main.js".into()), 3, 0, None)
        .unwrap();
    assert_eq!(locations.len(), 1);

    h.inspector.before_script_execution(GROUP, script).unwrap();
    let decision = h
        .inspector
        .statement(GROUP, vec![frame("", script, 3, 0)])
        .unwrap();
    assert_eq!(decision, BreakDecision::Pause);

    let paused = h.last_paused(session);
    assert_eq!(paused.reason, PauseReason::Ambiguous);
    assert_eq!(
        paused.data,
        Some(json!({"reasons": [
            {
                "reason": "instrumentation",
                "auxData": {"instrumentation": "beforeScriptExecution", "scriptId": script.to_string(), "url": "main.js"},
            },
            {"reason": "breakpoint", "auxData": {"breakpointIds": [breakpoint.0.clone()]}},
        ]}))
    );
    assert_eq!(paused.hit_breakpoints, vec![breakpoint]);
}

#[test]
fn source_map_instrumentation_needs_a_source_map() {
    let mut h = Harness::new();
    let session = h.enabled_session();
    h.inspector
        .set_instrumentation_breakpoint(session, Instrumentation::BeforeScriptWithSourceMapExecution)
        .unwrap();
    let plain = h.load("plain.js", SOURCE);
    let mapped = h
        .inspector
        .script_parsed(
            GROUP,
            ScriptInfo::new("mapped.js", SOURCE).with_source_map_url("mapped.js.map"),
        )
        .unwrap();

    h.inspector.before_script_execution(GROUP, plain).unwrap();
    assert_eq!(
        h.inspector
            .statement(GROUP, vec![frame("", plain, 3, 0)])
            .unwrap(),
        BreakDecision::Continue
    );

    h.inspector.before_script_execution(GROUP, mapped).unwrap();
    assert_eq!(
        h.inspector
            .statement(GROUP, vec![frame("", mapped, 3, 0)])
            .unwrap(),
        BreakDecision::Pause
    );
    assert_eq!(h.last_paused(session).reason, PauseReason::Instrumentation);

    h.inspector.resume(session).unwrap();
    h.inspector
        .remove_breakpoint(
            session,
            &vigil_inspector::BreakpointId(
                "instrumentation:beforeScriptWithSourceMapExecution".into(),
            ),
        )
        .unwrap();
    h.inspector.before_script_execution(GROUP, mapped).unwrap();
    assert_eq!(
        h.inspector
            .statement(GROUP, vec![frame("", mapped, 3, 0)])
            .unwrap(),
        BreakDecision::Continue
    );
}

#[test]
fn exceptions_follow_the_session_filter() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    let thrown = RemoteObject::error("Error: nope");

    let at = || vec![frame("add", script, 1, 2)];
    assert_eq!(
        h.inspector.exception(GROUP, at(), thrown.clone(), true).unwrap(),
        BreakDecision::Continue
    );

    h.inspector
        .set_pause_on_exceptions(session, PauseOnExceptions::Uncaught)
        .unwrap();
    assert_eq!(
        h.inspector.exception(GROUP, at(), thrown.clone(), false).unwrap(),
        BreakDecision::Continue
    );
    assert_eq!(
        h.inspector.exception(GROUP, at(), thrown.clone(), true).unwrap(),
        BreakDecision::Pause
    );
    let paused = h.last_paused(session);
    assert_eq!(paused.reason, PauseReason::Exception);
    let data = paused.data.unwrap();
    assert_eq!(data["uncaught"], json!(true));
    assert_eq!(data["exception"]["description"], json!("Error: nope"));
}

#[test]
fn exceptions_in_blackboxed_code_do_not_pause() {
    let mut h = Harness::new();
    let script = h.load("vendor/lib.js", SOURCE);
    let session = h.enabled_session();
    h.inspector
        .set_pause_on_exceptions(session, PauseOnExceptions::All)
        .unwrap();
    h.inspector
        .set_blackbox_patterns(session, vec!["^vendor/".into()])
        .unwrap();

    let frames = vec![frame("add", script, 1, 2).with_url("vendor/lib.js")];
    assert_eq!(
        h.inspector
            .exception(GROUP, frames, RemoteObject::error("Error"), false)
            .unwrap(),
        BreakDecision::Continue
    );
    let unnamed = vec![frame("add", script, 1, 2)];
    assert_eq!(
        h.inspector
            .exception(GROUP, unnamed, RemoteObject::error("Error"), true)
            .unwrap(),
        BreakDecision::Continue
    );
}

#[test]
fn conditions_gate_breakpoints() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    h.runtime.set_value("hot", json!(1));
    h.runtime.set_value("cold", json!(""));
    h.runtime.set_throwing("broken()", "TypeError: broken is not a function");

    let at_return = || vec![frame("add", script, 1, 2), frame("", script, 3, 0)];
    for (condition, expected) in [
        ("cold", BreakDecision::Continue),
        ("broken()", BreakDecision::Continue),
        ("hot", BreakDecision::Pause),
    ] {
        let (id, _) = h
            .inspector
            .set_breakpoint_by_url(
                session,
                UrlSpec::Exact("a.js".into()),
                1,
                0,
                Some(condition.into()),
            )
            .unwrap();
        assert_eq!(
            h.inspector.statement(GROUP, at_return()).unwrap(),
            expected,
            "condition {condition}"
        );
        if expected == BreakDecision::Pause {
            h.inspector.resume(session).unwrap();
        }
        h.inspector.remove_breakpoint(session, &id).unwrap();
    }
}

#[test]
fn throwing_conditions_can_be_configured_to_pause() {
    let mut h = Harness::with_config(InspectorConfig {
        condition_error_policy: ConditionErrorPolicy::Pause,
        ..InspectorConfig::default()
    });
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    h.runtime.set_throwing("broken()", "TypeError");
    h.inspector
        .set_breakpoint_by_url(
            session,
            UrlSpec::Exact("a.js".into()),
            1,
            0,
            Some("broken()".into()),
        )
        .unwrap();
    assert_eq!(
        h.inspector
            .statement(GROUP, vec![frame("add", script, 1, 2)])
            .unwrap(),
        BreakDecision::Pause
    );
}

#[test]
fn skip_all_pauses_silences_every_cause_of_the_session() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    h.inspector
        .set_pause_on_exceptions(session, PauseOnExceptions::All)
        .unwrap();
    h.inspector
        .set_breakpoint_by_url(session, UrlSpec::Exact("a.js".into()), 1, 0, None)
        .unwrap();
    h.inspector.set_skip_all_pauses(session, true).unwrap();

    let at = || vec![frame("add", script, 1, 2)];
    h.inspector.pause(session).unwrap();
    assert_eq!(h.inspector.statement(GROUP, at()).unwrap(), BreakDecision::Continue);
    assert_eq!(
        h.inspector.debugger_statement(GROUP, at()).unwrap(),
        BreakDecision::Continue
    );
    assert_eq!(
        h.inspector
            .exception(GROUP, at(), RemoteObject::error("Error"), true)
            .unwrap(),
        BreakDecision::Continue
    );

    h.inspector.set_skip_all_pauses(session, false).unwrap();
    assert_eq!(h.inspector.statement(GROUP, at()).unwrap(), BreakDecision::Pause);
}

#[test]
fn evaluation_reports_exceptions_as_results() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    paused_in_add(&mut h, script);
    let top = top_frame_id(&h, session);

    h.runtime.set_value("a + b", json!(3));
    let outcome = h.inspector.evaluate_on_call_frame(session, top, "a + b").unwrap();
    assert_eq!(outcome.result.value, Some(json!(3)));
    assert!(outcome.exception.is_none());

    h.runtime.set_throwing("boom()", "Error: boom");
    let outcome = h.inspector.evaluate_on_call_frame(session, top, "boom()").unwrap();
    assert_eq!(outcome.exception.unwrap().text, "Error: boom");
    assert_eq!(outcome.result.subtype.as_deref(), Some("error"));
    assert_eq!(outcome.result.description.as_deref(), Some("Error: boom"));
}

#[test]
fn set_variable_value_checks_the_scope_number() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    paused_in_add(&mut h, script);
    let top = top_frame_id(&h, session);

    let seven = RemoteObject::from_json(json!(7));
    h.inspector
        .set_variable_value(session, top, 0, "a", &seven)
        .unwrap();
    assert_eq!(
        h.runtime.assignments(),
        vec![("add".to_string(), 0, "a".to_string(), seven.clone())]
    );
    let outcome = h.inspector.evaluate_on_call_frame(session, top, "a").unwrap();
    assert_eq!(outcome.result.value, Some(json!(7)));

    let error = h
        .inspector
        .set_variable_value(session, top, 2, "a", &seven)
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Invalid parameters: Could not find scope with given number: 2"
    );
}

#[test]
fn frame_ids_go_stale_when_the_pause_ends() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    paused_in_add(&mut h, script);
    let old = top_frame_id(&h, session);
    h.inspector.resume(session).unwrap();

    let error = h
        .inspector
        .evaluate_on_call_frame(session, old, "1")
        .unwrap_err();
    assert_eq!(error, InspectorError::NotPaused);

    paused_in_add(&mut h, script);
    assert_ne!(top_frame_id(&h, session), old);
    assert_eq!(
        h.inspector.evaluate_on_call_frame(session, old, "1").unwrap_err(),
        InspectorError::StaleFrame
    );
}

#[test]
fn restart_frame_unwinds_restartable_frames_only() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    let frames = vec![
        frame("breaker", script, 1, 2),
        frame("entrypoint", script, 3, 0).restartable(false),
        frame("", script, 3, 0).restartable(false),
    ];
    assert_eq!(
        h.inspector.debugger_statement(GROUP, frames).unwrap(),
        BreakDecision::Pause
    );
    let ordinal = top_frame_id(&h, session).ordinal;

    assert_eq!(
        h.inspector
            .restart_frame(session, CallFrameId { ordinal, index: 1 })
            .unwrap_err(),
        InspectorError::RestartNotAllowed
    );
    assert!(h.inspector.is_paused(GROUP));

    let restarted = h
        .inspector
        .restart_frame(session, CallFrameId { ordinal, index: 0 })
        .unwrap();
    assert_eq!(restarted.len(), 3);
    assert_eq!(h.runtime.restarted_frames(), ["breaker"]);
    assert!(!h.inspector.is_paused(GROUP));
    assert_eq!(
        h.inspector.take_resume_action(GROUP).unwrap(),
        ResumeAction::RestartFrame { index: 0 }
    );

    // The restarted function stops at its first statement.
    assert_eq!(
        h.inspector
            .statement(GROUP, vec![frame("breaker", script, 1, 2), frame("", script, 3, 0)])
            .unwrap(),
        BreakDecision::Pause
    );
    assert_eq!(h.last_paused(session).reason, PauseReason::Step);
}

#[test]
fn restart_frame_refused_by_the_engine() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    paused_in_add(&mut h, script);
    h.runtime.refuse_restarts();

    let top = top_frame_id(&h, session);
    assert_eq!(
        h.inspector.restart_frame(session, top).unwrap_err(),
        InspectorError::RestartNotAllowed
    );
    assert!(h.inspector.is_paused(GROUP));
}

#[test]
fn out_of_memory_needs_an_enabled_session() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.connect();
    assert_eq!(
        h.inspector
            .out_of_memory(GROUP, vec![frame("add", script, 1, 2)])
            .unwrap(),
        BreakDecision::Continue
    );

    h.inspector.enable(session, None).unwrap();
    assert_eq!(
        h.inspector
            .out_of_memory(GROUP, vec![frame("add", script, 1, 2)])
            .unwrap(),
        BreakDecision::Pause
    );
    assert_eq!(h.last_paused(session).reason, PauseReason::OutOfMemory);
}

#[test]
fn engine_reports_while_paused_are_rejected() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    h.enabled_session();
    paused_in_add(&mut h, script);
    assert!(matches!(
        h.inspector.statement(GROUP, vec![frame("add", script, 1, 2)]),
        Err(InspectorError::Internal(_))
    ));
}
