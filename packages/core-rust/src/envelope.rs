//! Uniform failure envelope surfaced by the dispatch router.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status code used when a failure carries no code of its own.
pub const DEFAULT_ERROR_CODE: u16 = 500;

/// `{ code, error }` failure shape handed to the error-rendering stage.
///
/// `error` is either the original error value (structured details) or the
/// error message as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: u16,
    pub error: Value,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(code: u16, error: Value) -> Self {
        Self { code, error }
    }

    /// Envelope carrying a plain message.
    #[must_use]
    pub fn message(code: u16, message: impl Into<String>) -> Self {
        Self::new(code, Value::String(message.into()))
    }

    /// Stringified JSON form passed to the error-rendering stage.
    #[must_use]
    pub fn to_payload(&self) -> String {
        // Serializing a u16 and a `Value` cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":null}}"#, self.code)
        })
    }

    /// Parses a payload produced by [`ErrorEnvelope::to_payload`].
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the payload is not an envelope.
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
