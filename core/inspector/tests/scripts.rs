//! Script registration, breakpoint resolution and source retention.

mod common;

use common::{GROUP, Harness};
use serde_json::json;
use vigil_inspector::{
    Event, InspectorError, Location, Position, ScriptInfo, UrlSpec, event::BreakpointResolvedEvent,
};

const SOURCE: &str = "function add(a, b) {\n  return a + b;\n}\nadd(1, 2);\n";

fn megabyte_script(url: &str) -> ScriptInfo {
    ScriptInfo::new(url, "x".repeat(1_000_000)).with_break_locations(vec![Position::new(0, 0)])
}

#[test]
fn script_parsed_describes_the_script() {
    let mut h = Harness::new();
    let session = h.enabled_session();
    let script = h
        .inspector
        .script_parsed(
            GROUP,
            ScriptInfo::new("app.js", SOURCE)
                .with_execution_context(3)
                .with_source_map_url("app.js.map"),
        )
        .unwrap();

    let events = h.events(session);
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].params(),
        json!({
            "scriptId": script.to_string(),
            "url": "app.js",
            "startLine": 0,
            "startColumn": 0,
            "endLine": 4,
            "endColumn": 0,
            "executionContextId": 3,
            "length": SOURCE.len(),
            "sourceMapURL": "app.js.map",
        })
    );
}

#[test]
fn script_ids_are_unique_across_groups() {
    let mut h = Harness::new();
    let other = vigil_inspector::ContextGroupId(2);
    h.add_group(other);
    let first = h.load("a.js", SOURCE);
    let second = h
        .inspector
        .script_parsed(other, ScriptInfo::new("a.js", SOURCE))
        .unwrap();
    assert_ne!(first, second);
}

#[test]
fn breakpoints_resolve_to_the_next_statement() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();

    let (id, actual) = h
        .inspector
        .set_breakpoint(session, Location::new(script, 1, 0), None)
        .unwrap();
    assert_eq!(actual, Location::new(script, 1, 2));
    assert_eq!(id.0, format!("{script}:1:0"));

    assert_eq!(
        h.inspector
            .set_breakpoint(session, Location::new(script, 1, 0), None),
        Err(InspectorError::BreakpointExists)
    );

    // Nothing follows the last line.
    assert_eq!(
        h.inspector
            .set_breakpoint(session, Location::new(script, 10, 0), None),
        Err(InspectorError::UnresolvedBreakpoint)
    );
    assert_eq!(h.inspector.session(session).unwrap().breakpoints().len(), 1);

    let (_, locations) = h
        .inspector
        .set_breakpoint_by_url(session, UrlSpec::Exact("a.js".into()), 10, 0, None)
        .unwrap();
    assert!(locations.is_empty());
}

#[test]
fn url_breakpoints_resolve_in_scripts_loaded_later() {
    let mut h = Harness::new();
    let session = h.enabled_session();
    let (id, locations) = h
        .inspector
        .set_breakpoint_by_url(session, UrlSpec::Regex(r"\.js$".into()), 1, 0, None)
        .unwrap();
    assert!(locations.is_empty());

    let first = h.load("a.js", SOURCE);
    let second = h.load("b.js", SOURCE);
    h.load("c.ts", SOURCE);

    let resolved: Vec<BreakpointResolvedEvent> = h
        .events(session)
        .into_iter()
        .filter_map(|event| match event {
            Event::BreakpointResolved(resolved) => Some(resolved),
            _ => None,
        })
        .collect();
    assert_eq!(
        resolved,
        vec![
            BreakpointResolvedEvent {
                breakpoint_id: id.clone(),
                location: Location::new(first, 1, 2),
            },
            BreakpointResolvedEvent {
                breakpoint_id: id,
                location: Location::new(second, 1, 2),
            },
        ]
    );
}

#[test]
fn invalid_url_regex_is_rejected() {
    let mut h = Harness::new();
    let session = h.enabled_session();
    let error = h
        .inspector
        .set_breakpoint_by_url(session, UrlSpec::Regex("(".into()), 1, 0, None)
        .unwrap_err();
    assert!(matches!(error, InspectorError::InvalidPattern(_)));
}

#[test]
fn possible_breakpoints_are_statement_starts() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();

    let all = h
        .inspector
        .get_possible_breakpoints(session, Location::new(script, 0, 0), None)
        .unwrap();
    assert_eq!(
        all,
        vec![
            Location::new(script, 0, 0),
            Location::new(script, 1, 2),
            Location::new(script, 2, 0),
            Location::new(script, 3, 0),
        ]
    );

    let body = h
        .inspector
        .get_possible_breakpoints(
            session,
            Location::new(script, 1, 0),
            Some(Location::new(script, 3, 0)),
        )
        .unwrap();
    assert_eq!(
        body,
        vec![Location::new(script, 1, 2), Location::new(script, 2, 0)]
    );

    let other = h.load("b.js", SOURCE);
    assert!(matches!(
        h.inspector.get_possible_breakpoints(
            session,
            Location::new(script, 0, 0),
            Some(Location::new(other, 1, 0)),
        ),
        Err(InspectorError::InvalidParams(_))
    ));
}

#[test]
fn old_sources_are_evicted_over_budget() {
    let mut h = Harness::new();
    let session = h.enabled_session();
    let ids: Vec<_> = (0..35)
        .map(|i| {
            h.inspector
                .script_parsed(GROUP, megabyte_script(&format!("chunk{i}.js")))
                .unwrap()
        })
        .collect();
    h.inspector.collect_garbage(GROUP, &[]).unwrap();

    let first = ids[0];
    let error = h.inspector.get_script_source(session, first).unwrap_err();
    assert_eq!(error.to_string(), format!("No script for id: {first}"));
    let last = ids[34];
    assert_eq!(
        h.inspector.get_script_source(session, last).unwrap().len(),
        1_000_000
    );
    assert!(h.inspector.scripts(GROUP).unwrap().retained_bytes() <= 10_000_000);
    // Evicted scripts keep their metadata.
    assert_eq!(h.inspector.scripts(GROUP).unwrap().len(), 35);
}

#[test]
fn scripts_with_resolved_breakpoints_are_kept() {
    let mut h = Harness::new();
    let session = h.enabled_session();
    let pinned = h.inspector.script_parsed(GROUP, megabyte_script("pinned.js")).unwrap();
    let loose = h.inspector.script_parsed(GROUP, megabyte_script("loose.js")).unwrap();
    h.inspector
        .set_breakpoint(session, Location::new(pinned, 0, 0), None)
        .unwrap();

    for i in 0..12 {
        h.inspector
            .script_parsed(GROUP, megabyte_script(&format!("chunk{i}.js")))
            .unwrap();
    }
    assert!(h.inspector.get_script_source(session, pinned).is_ok());
    assert_eq!(
        h.inspector.get_script_source(session, loose),
        Err(InspectorError::ScriptNotFound(loose))
    );
}

#[test]
fn enable_applies_a_smaller_budget() {
    let mut h = Harness::new();
    let session = h.connect();
    let first = h.inspector.script_parsed(GROUP, megabyte_script("a.js")).unwrap();
    let second = h.inspector.script_parsed(GROUP, megabyte_script("b.js")).unwrap();

    h.inspector.enable(session, Some(1_500_000)).unwrap();
    assert_eq!(
        h.inspector.scripts(GROUP).unwrap().max_collected_scripts_size(),
        1_500_000
    );
    assert!(h.inspector.get_script_source(session, first).is_err());
    assert!(h.inspector.get_script_source(session, second).is_ok());
}

#[test]
fn blackboxed_ranges_need_a_known_script() {
    let mut h = Harness::new();
    let script = h.load("a.js", SOURCE);
    let session = h.enabled_session();
    let missing = vigil_inspector::ScriptId(999);

    assert_eq!(
        h.inspector.set_blackboxed_ranges(session, missing, Vec::new()),
        Err(InspectorError::ScriptNotFound(missing))
    );
    assert!(matches!(
        h.inspector.set_blackboxed_ranges(
            session,
            script,
            vec![Position::new(2, 0), Position::new(1, 0)],
        ),
        Err(InspectorError::InvalidParams(_))
    ));
    h.inspector
        .set_blackboxed_ranges(session, script, vec![Position::new(1, 0), Position::new(2, 0)])
        .unwrap();
    assert!(
        h.inspector
            .session(session)
            .unwrap()
            .blackbox()
            .is_blackboxed("", &Location::new(script, 1, 2))
    );
}
