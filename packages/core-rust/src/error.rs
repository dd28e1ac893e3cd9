//! Errors raised by controllers and services.

use serde_json::Value;

use crate::envelope::{ErrorEnvelope, DEFAULT_ERROR_CODE};

/// Status codes a handler may report as its own.
const ERROR_STATUS_RANGE: std::ops::RangeInclusive<u16> = 400..=599;

/// Error raised while a controller handles an operation.
///
/// `code` is optional: a handler may pick the HTTP status, otherwise the
/// dispatcher falls back to [`DEFAULT_ERROR_CODE`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub code: Option<u16>,
    pub message: String,
    /// Original error value, reported instead of `message` when present.
    pub details: Option<Value>,
}

impl HandlerError {
    /// Error without a status code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            details: None,
        }
    }

    /// Error carrying its own status code.
    #[must_use]
    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            ..Self::new(message)
        }
    }

    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The operation id does not name an operation of the controller.
    #[must_use]
    pub fn operation_not_found(controller: &str, operation_id: &str) -> Self {
        Self::new(format!(
            "{controller} has no operation named {operation_id}"
        ))
    }

    /// Effective status code.
    ///
    /// Codes outside the 4xx/5xx error range fall back to
    /// [`DEFAULT_ERROR_CODE`], so the envelope code is always a valid error status.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.code
            .filter(|code| ERROR_STATUS_RANGE.contains(code))
            .unwrap_or(DEFAULT_ERROR_CODE)
    }

    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let error = self
            .details
            .clone()
            .unwrap_or_else(|| Value::String(self.message.clone()));
        ErrorEnvelope::new(self.status(), error)
    }
}

/// Default rejection message of a stub service.
pub const DEFAULT_REJECT_MESSAGE: &str = "Invalid input";

/// Default rejection status of a stub service.
pub const DEFAULT_REJECT_CODE: u16 = 405;

/// Rejection returned by a resource service.
///
/// Controllers turn this into a response with `code` as the status; it is not
/// a dispatch failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({code})")]
pub struct ServiceError {
    pub code: u16,
    pub message: String,
}

impl ServiceError {
    #[must_use]
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Rejection built from optional parts, defaulting to
    /// `"Invalid input"` / 405.
    #[must_use]
    pub fn reject(message: Option<String>, code: Option<u16>) -> Self {
        Self::new(
            code.unwrap_or(DEFAULT_REJECT_CODE),
            message.unwrap_or_else(|| DEFAULT_REJECT_MESSAGE.to_string()),
        )
    }
}
