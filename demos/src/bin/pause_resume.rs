//! Drives an engine thread through a breakpoint, a step and a resume.
//!
//! The engine thread reports statements through [`InspectorHostHooks`] and
//! parks whenever the context group pauses. The main thread plays the client:
//! it watches `Debugger.paused` events and answers each with a command.
//!
//! Verbosity follows `RUST_LOG`, e.g. `RUST_LOG=debug cargo run --bin pause_resume`.

use color_eyre::eyre::{Result, eyre};
use std::{
    sync::{Arc, Mutex, mpsc},
    thread,
    time::Duration,
};
use vigil_inspector::{
    CallFrame, CallFrameId, ContextGroupId, DebuggerHooks, Inspector, InspectorError,
    InspectorHostHooks, InspectorResult, Location, ResumeAction, ScriptId, ScriptInfo,
    ScriptedRuntime, UrlSpec,
};

const GROUP: ContextGroupId = ContextGroupId(1);

const SOURCE: &str = "function add(a, b) {\n  return a + b;\n}\nadd(1, 2);\nadd(3, 4);\n";

fn at(name: &str, script: ScriptId, line: u32, column: u32) -> CallFrame {
    CallFrame::new(name, Location::new(script, line, column)).with_url("main.js")
}

/// The statements `SOURCE` executes, innermost frame first.
fn program(script: ScriptId) -> Vec<Vec<CallFrame>> {
    vec![
        vec![at("", script, 3, 0)],
        vec![at("add", script, 1, 2), at("", script, 3, 0)],
        vec![at("", script, 4, 0)],
        vec![at("add", script, 1, 2), at("", script, 4, 0)],
    ]
}

fn run_engine(hooks: &InspectorHostHooks, script: ScriptId) -> InspectorResult<()> {
    hooks.on_before_script_execution(script)?;
    for frames in program(script) {
        let line = frames[0].location.line_number;
        match hooks.on_step(frames)? {
            ResumeAction::Continue => log::info!("[engine] line {line} done"),
            ResumeAction::RestartFrame { index } => {
                log::warn!("[engine] frame {index} restart requested, not supported here");
            }
        }
    }
    hooks.on_execution_finished()
}

fn main() -> Result<()> {
    color_eyre::install()?;
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;

    let runtime = ScriptedRuntime::new();
    runtime.set_value("a + b", 3.into());
    let mut inspector = Inspector::default();
    inspector.add_context_group(GROUP, runtime);
    let hooks = InspectorHostHooks::new(Arc::new(Mutex::new(inspector)), GROUP);

    let (events_tx, events) = mpsc::channel();
    let session = hooks.command(|inspector| {
        let session = inspector.connect(GROUP)?;
        inspector.subscribe(
            session,
            Box::new(move |event| {
                events_tx.send((event.method(), event.params())).ok();
            }),
        )?;
        inspector.enable(session, None)?;
        inspector.set_breakpoint_by_url(session, UrlSpec::Exact("main.js".into()), 1, 0, None)?;
        Ok::<_, InspectorError>(session)
    })??;

    let script = hooks.on_script_parsed(ScriptInfo::new("main.js", SOURCE))?;
    let engine = hooks.clone();
    let handle = thread::spawn(move || run_engine(&engine, script));

    let mut pauses = 0;
    loop {
        let (method, params) = match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(mpsc::RecvTimeoutError::Timeout) if !handle.is_finished() => continue,
            Err(_) => break,
        };
        if method != "Debugger.paused" {
            log::info!("[client] {method}");
            continue;
        }
        pauses += 1;
        let frame = &params["callFrames"][0];
        log::info!(
            "[client] paused ({}) in '{}' at line {}",
            params["reason"],
            frame["functionName"].as_str().unwrap_or_default(),
            frame["location"]["lineNumber"],
        );
        let frame_id = frame["callFrameId"]
            .as_str()
            .ok_or_else(|| eyre!("paused frame without an id"))?
            .parse::<CallFrameId>()
            .map_err(|e| eyre!(e))?;
        hooks.command(|inspector| match pauses {
            1 => {
                log::info!("[client] step over");
                inspector.step_over(session)
            }
            _ => {
                if let Ok(outcome) = inspector.evaluate_on_call_frame(session, frame_id, "a + b") {
                    log::info!("[client] a + b = {:?}", outcome.result.value);
                }
                log::info!("[client] resume");
                inspector.resume(session)
            }
        })??;
    }

    handle
        .join()
        .map_err(|_| eyre!("engine thread panicked"))??;
    log::info!("[client] saw {pauses} pauses");
    Ok(())
}
