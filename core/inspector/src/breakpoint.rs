//! Breakpoint definitions and their resolution against scripts.
//!
//! A session's [`BreakpointStore`] keeps the breakpoints the client asked for,
//! independent of which scripts are loaded. Whenever a script is registered the
//! store is asked to [`resolve`](BreakpointStore::resolve) it, which turns every
//! matching definition into a concrete statement location.

use crate::{
    ScriptId,
    error::{InspectorError, InspectorResult},
    frame::{Location, Position},
    script::Script,
};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a breakpoint within one session.
///
/// Derived from the definition, so setting the same breakpoint twice collides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakpointId(pub String);

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a url breakpoint selects scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlSpec {
    /// Scripts whose url equals the string.
    Exact(String),
    /// Scripts whose url matches the regular expression.
    Regex(String),
}

#[derive(Debug, Clone)]
enum Target {
    Url(String),
    UrlRegex(Regex),
    Script(ScriptId),
}

impl Target {
    fn matches(&self, script: &Script) -> bool {
        match self {
            Self::Url(url) => script.url() == url,
            Self::UrlRegex(regex) => regex.is_match(script.url()),
            Self::Script(id) => script.id() == *id,
        }
    }
}

/// A breakpoint definition plus the locations it currently resolves to.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    id: BreakpointId,
    target: Target,
    position: Position,
    condition: Option<String>,
    locations: Vec<Location>,
}

impl Breakpoint {
    /// Protocol id of the breakpoint.
    pub fn id(&self) -> &BreakpointId {
        &self.id
    }

    /// Requested line and column.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Expression that must be truthy for the breakpoint to pause. `None` always pauses.
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// Where the breakpoint resolved, in resolution order.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    fn resolve(&mut self, script: &Script) -> Option<Location> {
        if !self.target.matches(script) {
            return None;
        }
        let location = script.resolve_position(self.position)?;
        if self.locations.contains(&location) {
            return None;
        }
        self.locations.push(location);
        Some(location)
    }
}

/// A location newly produced by resolving a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    /// Breakpoint that resolved.
    pub breakpoint_id: BreakpointId,
    /// The new location.
    pub location: Location,
}

/// The breakpoints of one session.
#[derive(Debug, Clone)]
pub struct BreakpointStore {
    breakpoints: IndexMap<BreakpointId, Breakpoint>,
    active: bool,
}

impl Default for BreakpointStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointStore {
    /// An empty, active store.
    pub fn new() -> Self {
        Self {
            breakpoints: IndexMap::new(),
            active: true,
        }
    }

    /// Defines a breakpoint on every script whose url matches `url`.
    pub fn set_by_url(
        &mut self,
        url: UrlSpec,
        line_number: u32,
        column_number: u32,
        condition: Option<String>,
    ) -> InspectorResult<BreakpointId> {
        let (id, target) = match url {
            UrlSpec::Exact(url) => (
                format!("1:{line_number}:{column_number}:{url}"),
                Target::Url(url),
            ),
            UrlSpec::Regex(pattern) => {
                let regex = Regex::new(&pattern)
                    .map_err(|e| InspectorError::InvalidPattern(e.to_string()))?;
                (
                    format!("4:{line_number}:{column_number}:{pattern}"),
                    Target::UrlRegex(regex),
                )
            }
        };
        self.insert(
            BreakpointId(id),
            target,
            Position::new(line_number, column_number),
            condition,
        )
    }

    /// Defines a breakpoint on one script.
    pub fn set_by_id(
        &mut self,
        location: Location,
        condition: Option<String>,
    ) -> InspectorResult<BreakpointId> {
        let id = format!(
            "{}:{}:{}",
            location.script_id, location.line_number, location.column_number
        );
        self.insert(
            BreakpointId(id),
            Target::Script(location.script_id),
            location.position(),
            condition,
        )
    }

    fn insert(
        &mut self,
        id: BreakpointId,
        target: Target,
        position: Position,
        condition: Option<String>,
    ) -> InspectorResult<BreakpointId> {
        if self.breakpoints.contains_key(&id) {
            return Err(InspectorError::BreakpointExists);
        }
        let condition = condition.filter(|c| !c.trim().is_empty());
        self.breakpoints.insert(
            id.clone(),
            Breakpoint {
                id: id.clone(),
                target,
                position,
                condition,
                locations: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Removes a breakpoint. Unknown ids are ignored.
    pub fn remove(&mut self, id: &BreakpointId) -> Option<Breakpoint> {
        self.breakpoints.shift_remove(id)
    }

    /// A breakpoint by id.
    pub fn get(&self, id: &BreakpointId) -> Option<&Breakpoint> {
        self.breakpoints.get(id)
    }

    /// Breakpoints in the order they were set.
    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    /// Number of breakpoint definitions.
    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    /// Whether the session has no breakpoints.
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Resolves one breakpoint against `script`, returning the new location if any.
    pub fn resolve_breakpoint(&mut self, id: &BreakpointId, script: &Script) -> Option<Location> {
        self.breakpoints.get_mut(id)?.resolve(script)
    }

    /// Resolves every breakpoint against a (re)registered script.
    ///
    /// A requested position at or past the end of the script yields nothing.
    pub fn resolve(&mut self, script: &Script) -> Vec<ResolvedLocation> {
        self.breakpoints
            .values_mut()
            .filter_map(|bp| {
                bp.resolve(script).map(|location| ResolvedLocation {
                    breakpoint_id: bp.id.clone(),
                    location,
                })
            })
            .collect()
    }

    /// Forgets every resolved location, keeping the definitions.
    pub fn reset_locations(&mut self) {
        for bp in self.breakpoints.values_mut() {
            bp.locations.clear();
        }
    }

    /// Breakpoints resolved at exactly `location`, regardless of the active mask.
    pub fn hits_at<'a>(&'a self, location: &'a Location) -> impl Iterator<Item = &'a Breakpoint> {
        self.breakpoints
            .values()
            .filter(move |bp| bp.locations.contains(location))
    }

    /// Scripts referenced by any resolved location.
    pub fn referenced_scripts(&self) -> impl Iterator<Item = ScriptId> + '_ {
        self.breakpoints
            .values()
            .flat_map(|bp| bp.locations.iter().map(|l| l.script_id))
    }

    /// Global mask: while inactive, breakpoints still resolve but never pause.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// The global mask; see [`Self::set_active`].
    pub fn is_active(&self) -> bool {
        self.active
    }
}
