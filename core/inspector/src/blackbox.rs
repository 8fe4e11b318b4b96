//! Blackboxing: code that stepping treats as uninteresting.

use crate::{
    ScriptId,
    error::{InspectorError, InspectorResult},
    frame::{Location, Position},
};
use regex::Regex;
use rustc_hash::FxHashMap;

/// Url patterns and per-script position ranges skipped by step logic.
#[derive(Debug, Clone, Default)]
pub struct BlackboxFilter {
    patterns: Vec<String>,
    combined: Option<Regex>,
    ranges: FxHashMap<ScriptId, Vec<Position>>,
}

impl BlackboxFilter {
    /// Creates a filter that blackboxes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the url patterns. On error the previous patterns stay in place.
    pub fn set_patterns(&mut self, patterns: Vec<String>) -> InspectorResult<()> {
        for pattern in &patterns {
            Regex::new(pattern).map_err(|e| InspectorError::InvalidPattern(e.to_string()))?;
        }
        self.combined = if patterns.is_empty() {
            None
        } else {
            let joined = patterns
                .iter()
                .map(|p| format!("(?:{p})"))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&joined).map_err(|e| InspectorError::InvalidPattern(e.to_string()))?)
        };
        self.patterns = patterns;
        Ok(())
    }

    /// The url patterns, as given.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Sets the blackboxed ranges of one script.
    ///
    /// `positions` alternate between range starts and range ends; a position is
    /// blackboxed when an odd number of them lie at or before it. They must be
    /// strictly ascending. An empty list clears the script's ranges.
    pub fn set_ranges(&mut self, script_id: ScriptId, positions: Vec<Position>) -> InspectorResult<()> {
        if positions.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(InspectorError::InvalidParams(
                "Input positions array is not sorted or contains duplicate values.".to_string(),
            ));
        }
        if positions.is_empty() {
            self.ranges.remove(&script_id);
        } else {
            self.ranges.insert(script_id, positions);
        }
        Ok(())
    }

    /// Whether a non-empty `url` matches one of the patterns.
    pub fn is_url_blackboxed(&self, url: &str) -> bool {
        !url.is_empty() && self.combined.as_ref().is_some_and(|re| re.is_match(url))
    }

    /// Whether a frame at `location` in a script loaded from `url` is blackboxed.
    pub fn is_blackboxed(&self, url: &str, location: &Location) -> bool {
        if self.is_url_blackboxed(url) {
            return true;
        }
        self.ranges.get(&location.script_id).is_some_and(|positions| {
            let at_or_before = positions.partition_point(|p| *p <= location.position());
            at_or_before % 2 == 1
        })
    }

    /// Whether nothing is blackboxed.
    pub fn is_empty(&self) -> bool {
        self.combined.is_none() && self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("lib/framework.js", true ; "first pattern")]
    #[test_case("vendor.min.js", true ; "second pattern")]
    #[test_case("app.js", false ; "not matched")]
    #[test_case("", false ; "anonymous script")]
    fn url_patterns(url: &str, expected: bool) {
        let mut filter = BlackboxFilter::new();
        filter
            .set_patterns(vec!["framework\\.js$".into(), "\\.min\\.js$".into()])
            .unwrap();
        assert_eq!(filter.is_url_blackboxed(url), expected);
    }

    #[test]
    fn invalid_pattern_keeps_previous_state() {
        let mut filter = BlackboxFilter::new();
        filter.set_patterns(vec!["lib".into()]).unwrap();
        let err = filter.set_patterns(vec!["ok".into(), "[".into()]).unwrap_err();
        assert!(err.to_string().starts_with("Pattern parser error:"));
        assert_eq!(filter.patterns(), ["lib"]);
        assert!(filter.is_url_blackboxed("lib.js"));
    }

    #[test_case(0, 0, false ; "before first range")]
    #[test_case(1, 0, true ; "range start is inclusive")]
    #[test_case(2, 5, true ; "inside range")]
    #[test_case(3, 0, false ; "range end is exclusive")]
    #[test_case(5, 1, true ; "open ended last range")]
    fn position_ranges(line: u32, column: u32, expected: bool) {
        let script = ScriptId(9);
        let mut filter = BlackboxFilter::new();
        filter
            .set_ranges(
                script,
                vec![Position::new(1, 0), Position::new(3, 0), Position::new(5, 0)],
            )
            .unwrap();
        assert_eq!(
            filter.is_blackboxed("app.js", &Location::new(script, line, column)),
            expected
        );
        assert!(!filter.is_blackboxed("app.js", &Location::new(ScriptId(10), line, column)));
    }

    #[test]
    fn unsorted_ranges_are_rejected() {
        let mut filter = BlackboxFilter::new();
        let err = filter
            .set_ranges(ScriptId(1), vec![Position::new(2, 0), Position::new(1, 0)])
            .unwrap_err();
        assert!(matches!(err, InspectorError::InvalidParams(_)));
        assert!(filter.is_empty());
    }
}
