//! The JSON wire surface of the inspector.
//!
//! # Architecture
//!
//! - [`messages`]: params and results of every `Debugger.*` method
//! - [`dispatcher`]: routes a [`Request`] to the matching [`Inspector`](crate::Inspector) command
//! - [`transport`]: reads a newline-agnostic stream of JSON values and writes one value per line
//!
//! A request is `{id, method, params}`, answered by `{id, result}` or
//! `{id, error: {code, message}}`. Events are `{method, params}` without an id.

pub mod dispatcher;
pub mod messages;
pub mod transport;

pub use dispatcher::dispatch;
pub use messages::*;
pub use transport::{StreamTransport, Transport};

use crate::{error::InspectorError, event::Event};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A protocol request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Echoed in the response.
    pub id: i64,
    /// Method name such as `Debugger.enable`.
    pub method: String,
    /// Method params; `null` when omitted.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// The error object of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

impl From<&InspectorError> for ErrorObject {
    fn from(error: &InspectorError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// A protocol response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request answered.
    pub id: i64,
    /// Result of a successful request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Why the request failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// A successful response.
    pub fn success(id: i64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A failed response.
    pub fn failure(id: i64, error: &InspectorError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Whether the request succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A protocol event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Event name such as `Debugger.paused`.
    pub method: String,
    /// Event payload.
    pub params: Value,
}

impl From<&Event> for Notification {
    fn from(event: &Event) -> Self {
        Self {
            method: event.method().to_string(),
            params: event.params(),
        }
    }
}
