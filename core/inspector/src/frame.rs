//! Call frames, source locations and remote values.
//!
//! These are the shapes the engine hands to the inspector when it reports a
//! pause-able point, and the shapes the inspector hands back to clients.

use crate::ScriptId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

/// A zero-based line/column position inside one script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Zero-based line.
    pub line_number: u32,
    /// Zero-based column.
    pub column_number: u32,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub const fn new(line_number: u32, column_number: u32) -> Self {
        Self {
            line_number,
            column_number,
        }
    }
}

/// A position qualified by the script it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Script the position is in.
    pub script_id: ScriptId,
    /// Zero-based line.
    pub line_number: u32,
    /// Zero-based column; 0 when omitted on the wire.
    #[serde(default)]
    pub column_number: u32,
}

impl Location {
    /// Creates a location.
    #[must_use]
    pub const fn new(script_id: ScriptId, line_number: u32, column_number: u32) -> Self {
        Self {
            script_id,
            line_number,
            column_number,
        }
    }

    /// The in-script part of the location.
    #[must_use]
    pub const fn position(&self) -> Position {
        Position::new(self.line_number, self.column_number)
    }
}

/// Identifier of a call frame within one pause.
///
/// The ordinal is the pause it was issued for; once that pause ends the id is
/// stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CallFrameId {
    /// Ordinal of the pause the frame belongs to.
    pub ordinal: u64,
    /// Depth of the frame, 0 being the top.
    pub index: usize,
}

impl fmt::Display for CallFrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.ordinal, self.index)
    }
}

impl FromStr for CallFrameId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ordinal, index) = s
            .split_once('.')
            .ok_or_else(|| format!("malformed call frame id '{s}'"))?;
        Ok(Self {
            ordinal: ordinal.parse().map_err(|e| format!("{e}"))?,
            index: index.parse().map_err(|e| format!("{e}"))?,
        })
    }
}

impl From<CallFrameId> for String {
    fn from(id: CallFrameId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for CallFrameId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Mirror of a value living in the debuggee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// JavaScript type: `object`, `number`, `undefined`, ...
    #[serde(rename = "type")]
    pub kind: String,
    /// Object subtype such as `array`, `null` or `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Constructor name of an object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// The value itself when it is JSON-representable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Display string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Handle of a non-primitive value in the debuggee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl RemoteObject {
    /// The `undefined` value.
    #[must_use]
    pub fn undefined() -> Self {
        Self {
            kind: "undefined".to_string(),
            subtype: None,
            class_name: None,
            value: None,
            description: None,
            object_id: None,
        }
    }

    /// An error object with the given description.
    #[must_use]
    pub fn error(description: impl Into<String>) -> Self {
        Self {
            kind: "object".to_string(),
            subtype: Some("error".to_string()),
            class_name: Some("Error".to_string()),
            value: None,
            description: Some(description.into()),
            object_id: None,
        }
    }

    /// Mirrors a plain JSON value.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        let (kind, subtype, class_name, description) = match &value {
            Value::Null => ("object", Some("null"), None, None),
            Value::Bool(b) => ("boolean", None, None, Some(b.to_string())),
            Value::Number(n) => ("number", None, None, Some(n.to_string())),
            Value::String(_) => ("string", None, None, None),
            Value::Array(items) => (
                "object",
                Some("array"),
                Some("Array"),
                Some(format!("Array({})", items.len())),
            ),
            Value::Object(_) => ("object", None, Some("Object"), Some("Object".to_string())),
        };
        Self {
            kind: kind.to_string(),
            subtype: subtype.map(str::to_string),
            class_name: class_name.map(str::to_string),
            value: Some(value),
            description,
            object_id: None,
        }
    }

    /// JavaScript truthiness of the mirrored value.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match (self.kind.as_str(), &self.value) {
            ("undefined", _) => false,
            ("object", _) => self.subtype.as_deref() != Some("null"),
            (_, Some(Value::Bool(b))) => *b,
            (_, Some(Value::Number(n))) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
            (_, Some(Value::String(s))) => !s.is_empty(),
            (_, Some(Value::Null)) => false,
            _ => true,
        }
    }
}

/// Kind of a scope in a frame's scope chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    /// The global object.
    Global,
    /// Locals of the function.
    Local,
    /// Object of a `with` statement.
    With,
    /// Captured variables.
    Closure,
    /// Binding of a `catch` clause.
    Catch,
    /// Lexical bindings of a block.
    Block,
    /// Top-level lexical bindings of a script.
    Script,
    /// Variables of direct `eval` code.
    Eval,
    /// Top-level bindings of a module.
    Module,
}

/// One entry of a frame's scope chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Kind of scope.
    #[serde(rename = "type")]
    pub kind: ScopeType,
    /// Object holding the scope's variables.
    pub object: RemoteObject,
    /// Name of the function for closures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

const fn restartable_by_default() -> bool {
    true
}

/// A frame of the paused call stack, index 0 being the top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Assigned by the inspector when the pause is entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_frame_id: Option<CallFrameId>,
    /// Name of the running function; empty for top-level code.
    pub function_name: String,
    /// Where the function starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_location: Option<Location>,
    /// Where the frame is executing.
    pub location: Location,
    /// Url of the script. Left empty, the inspector fills it in from the script registry.
    #[serde(default)]
    pub url: String,
    /// Innermost scope first.
    #[serde(default)]
    pub scope_chain: Vec<Scope>,
    /// Receiver of the call.
    #[serde(default = "RemoteObject::undefined")]
    pub this: RemoteObject,
    /// Computed by the engine; `false` for frames whose unwind is not observable.
    #[serde(default = "restartable_by_default")]
    pub can_be_restarted: bool,
}

impl CallFrame {
    /// Creates a restartable frame with an empty scope chain.
    #[must_use]
    pub fn new(function_name: impl Into<String>, location: Location) -> Self {
        Self {
            call_frame_id: None,
            function_name: function_name.into(),
            function_location: None,
            location,
            url: String::new(),
            scope_chain: Vec::new(),
            this: RemoteObject::undefined(),
            can_be_restarted: true,
        }
    }

    /// Sets the url of the frame's script.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets where the running function starts.
    #[must_use]
    pub fn with_function_location(mut self, location: Location) -> Self {
        self.function_location = Some(location);
        self
    }

    /// Appends a scope to the chain.
    #[must_use]
    pub fn with_scope(mut self, kind: ScopeType, object: RemoteObject) -> Self {
        self.scope_chain.push(Scope {
            kind,
            object,
            name: None,
        });
        self
    }

    /// Sets whether `Debugger.restartFrame` may re-enter this frame.
    #[must_use]
    pub fn restartable(mut self, can_be_restarted: bool) -> Self {
        self.can_be_restarted = can_be_restarted;
        self
    }

    /// Whether two frames belong to the same function activation site.
    pub(crate) fn same_function(&self, other: &Self) -> bool {
        match (self.function_location, other.function_location) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.function_name == other.function_name
                    && self.location.script_id == other.location.script_id
            }
        }
    }
}

/// A frame of an async stack trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackEntry {
    /// Name of the function; empty for top-level code.
    pub function_name: String,
    /// Script of the call site.
    pub script_id: ScriptId,
    /// Url of that script.
    pub url: String,
    /// Zero-based line of the call site.
    pub line_number: u32,
    /// Zero-based column of the call site.
    pub column_number: u32,
}

impl From<&CallFrame> for StackEntry {
    fn from(frame: &CallFrame) -> Self {
        Self {
            function_name: frame.function_name.clone(),
            script_id: frame.location.script_id,
            url: frame.url.clone(),
            line_number: frame.location.line_number,
            column_number: frame.location.column_number,
        }
    }
}

/// A chain of stacks linked through the async continuations that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    /// What scheduled the continuation, e.g. `Promise.then`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The stack that scheduled it, top first.
    pub call_frames: Vec<StackEntry>,
    /// The stack that scheduled the code above, if tracked that deep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<StackTrace>>,
}

impl StackTrace {
    /// Number of linked stacks, this one included.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.depth())
    }
}
