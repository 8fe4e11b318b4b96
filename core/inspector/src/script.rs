//! Parsed scripts and the per-group script registry.

use crate::{
    ScriptId,
    error::{InspectorError, InspectorResult},
    frame::{CallFrame, Location, Position},
};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

/// What the engine reports when it has compiled a script.
#[derive(Debug, Clone)]
pub struct ScriptInfo {
    /// Url the script was loaded from; may be empty for eval code.
    pub url: String,
    /// Full source text.
    pub source: String,
    /// Context the script was compiled in.
    pub execution_context_id: i32,
    /// `sourceMappingURL` of the script, if any.
    pub source_map_url: Option<String>,
    /// Statement boundaries computed by the engine. When absent the registry
    /// scans the source for them.
    pub break_locations: Option<Vec<Position>>,
}

impl ScriptInfo {
    /// Script in the default execution context with scanned break locations.
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
            execution_context_id: 1,
            source_map_url: None,
            break_locations: None,
        }
    }

    /// Sets the source map url.
    #[must_use]
    pub fn with_source_map_url(mut self, url: impl Into<String>) -> Self {
        self.source_map_url = Some(url.into());
        self
    }

    /// Sets the execution context.
    #[must_use]
    pub fn with_execution_context(mut self, execution_context_id: i32) -> Self {
        self.execution_context_id = execution_context_id;
        self
    }

    /// Supplies the statement boundaries instead of scanning for them.
    #[must_use]
    pub fn with_break_locations(mut self, locations: Vec<Position>) -> Self {
        self.break_locations = Some(locations);
        self
    }
}

/// A registered script. The source may have been evicted; the id stays valid.
#[derive(Debug, Clone)]
pub struct Script {
    id: ScriptId,
    url: String,
    execution_context_id: i32,
    source_map_url: Option<String>,
    source: Option<String>,
    length: usize,
    end: Position,
    break_locations: Vec<Position>,
}

impl Script {
    /// Id of the script, unique across context groups.
    pub fn id(&self) -> ScriptId {
        self.id
    }

    /// Url the script was loaded from; may be empty.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Context the script was compiled in.
    pub fn execution_context_id(&self) -> i32 {
        self.execution_context_id
    }

    /// `sourceMappingURL` of the script, if any.
    pub fn source_map_url(&self) -> Option<&str> {
        self.source_map_url.as_deref()
    }

    /// The source text, unless it has been evicted.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Source length in bytes, kept after eviction.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Position just past the last character.
    pub fn end(&self) -> Position {
        self.end
    }

    /// Whether the source text was dropped to stay within the budget.
    pub fn is_evicted(&self) -> bool {
        self.source.is_none()
    }

    /// Statement boundaries, sorted.
    pub fn break_locations(&self) -> &[Position] {
        &self.break_locations
    }

    /// The first statement boundary at or after `requested`, if any.
    pub fn resolve_position(&self, requested: Position) -> Option<Location> {
        let index = self.break_locations.partition_point(|p| *p < requested);
        self.break_locations
            .get(index)
            .map(|p| Location::new(self.id, p.line_number, p.column_number))
    }

    /// Statement boundaries in `[start, end)`; an absent end means the rest of the script.
    pub fn break_locations_between(&self, start: Position, end: Option<Position>) -> Vec<Location> {
        self.break_locations
            .iter()
            .filter(|p| **p >= start && end.is_none_or(|end| **p < end))
            .map(|p| Location::new(self.id, p.line_number, p.column_number))
            .collect()
    }
}

/// Hands out script ids from one counter shared by every context group.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptIdAllocator(Arc<AtomicU32>);

impl ScriptIdAllocator {
    pub(crate) fn next(&self) -> ScriptId {
        ScriptId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Scripts of one context group, retaining source text under a byte budget.
#[derive(Debug)]
pub struct ScriptRegistry {
    scripts: IndexMap<ScriptId, Script>,
    ids: ScriptIdAllocator,
    retained_bytes: usize,
    max_collected_scripts_size: usize,
    pinned: FxHashSet<ScriptId>,
}

impl ScriptRegistry {
    pub(crate) fn new(ids: ScriptIdAllocator, max_collected_scripts_size: usize) -> Self {
        Self {
            scripts: IndexMap::new(),
            ids,
            retained_bytes: 0,
            max_collected_scripts_size,
            pinned: FxHashSet::default(),
        }
    }

    /// Stores the script and evicts older sources if the budget is exceeded.
    pub fn register(&mut self, info: ScriptInfo) -> ScriptId {
        let id = self.ids.next();
        let break_locations = match info.break_locations {
            Some(mut locations) => {
                locations.sort_unstable();
                locations.dedup();
                locations
            }
            None => scan_break_locations(&info.source),
        };
        let script = Script {
            id,
            end: end_position(&info.source),
            length: info.source.len(),
            url: info.url,
            execution_context_id: info.execution_context_id,
            source_map_url: info.source_map_url.filter(|url| !url.is_empty()),
            source: Some(info.source),
            break_locations,
        };
        self.retained_bytes += script.length;
        log::debug!("registered script {id} ({} bytes) '{}'", script.length, script.url);
        self.scripts.insert(id, script);
        self.evict();
        id
    }

    /// A registered script, evicted or not.
    pub fn get(&self, id: ScriptId) -> Option<&Script> {
        self.scripts.get(&id)
    }

    /// Url of the script `frame` runs in. The registered script is
    /// authoritative; the frame's own url only stands in for scripts the
    /// registry does not know or that were registered without one.
    pub fn frame_url<'a>(&'a self, frame: &'a CallFrame) -> &'a str {
        self.get(frame.location.script_id)
            .map(Script::url)
            .filter(|url| !url.is_empty())
            .unwrap_or(&frame.url)
    }

    /// Fills in the url of frames reported without one.
    pub fn stamp_urls(&self, frames: &mut [CallFrame]) {
        for frame in frames.iter_mut().filter(|f| f.url.is_empty()) {
            if let Some(script) = self.get(frame.location.script_id) {
                frame.url = script.url().to_string();
            }
        }
    }

    /// Source text of a script that has not been evicted.
    pub fn source(&self, id: ScriptId) -> InspectorResult<&str> {
        self.scripts
            .get(&id)
            .and_then(Script::source)
            .ok_or(InspectorError::ScriptNotFound(id))
    }

    /// Scripts in registration order, evicted ones included.
    pub fn scripts(&self) -> impl Iterator<Item = &Script> {
        self.scripts.values()
    }

    /// Number of registered scripts, evicted ones included.
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether no script was registered.
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Bytes of source text currently retained.
    pub fn retained_bytes(&self) -> usize {
        self.retained_bytes
    }

    /// The source-text budget in bytes.
    pub fn max_collected_scripts_size(&self) -> usize {
        self.max_collected_scripts_size
    }

    /// Changes the budget, evicting sources over it.
    pub fn set_max_collected_scripts_size(&mut self, bytes: usize) {
        self.max_collected_scripts_size = bytes;
        self.evict();
    }

    /// Replaces the set of scripts referenced by active breakpoint resolutions.
    pub fn set_pinned(&mut self, pinned: FxHashSet<ScriptId>) {
        self.pinned = pinned;
    }

    /// Runs eviction as a garbage-collection pass would. Returns how many
    /// sources were discarded.
    pub fn collect_garbage(&mut self) -> usize {
        self.evict()
    }

    /// Discards sources oldest-first until the budget holds. The most recently
    /// registered script and pinned scripts are never evicted.
    fn evict(&mut self) -> usize {
        if self.retained_bytes <= self.max_collected_scripts_size {
            return 0;
        }
        let newest = self.scripts.last().map(|(id, _)| *id);
        let mut evicted = 0;
        for script in self.scripts.values_mut() {
            if self.retained_bytes <= self.max_collected_scripts_size {
                break;
            }
            if Some(script.id) == newest || self.pinned.contains(&script.id) {
                continue;
            }
            if script.source.take().is_some() {
                self.retained_bytes -= script.length;
                evicted += 1;
                log::debug!("evicted source of script {}", script.id);
            }
        }
        evicted
    }
}

fn end_position(source: &str) -> Position {
    let mut end = Position::default();
    for ch in source.chars() {
        if ch == '\n' {
            end.line_number += 1;
            end.column_number = 0;
        } else {
            end.column_number += 1;
        }
    }
    end
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lexical {
    Code,
    LineComment,
    BlockComment,
    Quoted(char),
    Template,
}

/// Computes statement boundaries: the first token of every line and every
/// token following `;`, `{` or `}`. Strings, template literals and comments
/// are skipped.
pub fn scan_break_locations(source: &str) -> Vec<Position> {
    let mut locations = Vec::new();
    let mut state = Lexical::Code;
    let mut at_boundary = true;
    let mut pos = Position::default();
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        let here = pos;
        if ch == '\n' {
            pos.line_number += 1;
            pos.column_number = 0;
        } else {
            pos.column_number += 1;
        }

        match state {
            Lexical::LineComment => {
                if ch == '\n' {
                    state = Lexical::Code;
                    at_boundary = true;
                }
                continue;
            }
            Lexical::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    pos.column_number += 1;
                    state = Lexical::Code;
                } else if ch == '\n' {
                    at_boundary = true;
                }
                continue;
            }
            Lexical::Quoted(quote) => {
                if ch == '\\' {
                    if let Some(escaped) = chars.next() {
                        if escaped == '\n' {
                            pos.line_number += 1;
                            pos.column_number = 0;
                        } else {
                            pos.column_number += 1;
                        }
                    }
                } else if ch == quote || ch == '\n' {
                    state = Lexical::Code;
                }
                continue;
            }
            Lexical::Template => {
                if ch == '\\' {
                    if let Some(escaped) = chars.next() {
                        if escaped == '\n' {
                            pos.line_number += 1;
                            pos.column_number = 0;
                        } else {
                            pos.column_number += 1;
                        }
                    }
                } else if ch == '`' {
                    state = Lexical::Code;
                }
                continue;
            }
            Lexical::Code => {}
        }

        if ch == '\n' {
            at_boundary = true;
            continue;
        }
        if ch.is_whitespace() {
            continue;
        }
        if ch == '/' {
            match chars.peek() {
                Some('/') => {
                    state = Lexical::LineComment;
                    continue;
                }
                Some('*') => {
                    chars.next();
                    pos.column_number += 1;
                    state = Lexical::BlockComment;
                    continue;
                }
                _ => {}
            }
        }

        if at_boundary {
            locations.push(here);
            at_boundary = false;
        }
        match ch {
            ';' | '{' | '}' => at_boundary = true,
            '"' | '\'' => state = Lexical::Quoted(ch),
            '`' => state = Lexical::Template,
            _ => {}
        }
    }
    locations
}
