//! Dispatch failure taxonomy.

use pantry_core::{ErrorEnvelope, HandlerError};

/// Status used for descriptors the router cannot act on.
pub const BAD_DESCRIPTOR_CODE: u16 = 400;

/// Errors produced while dispatching an annotated request.
///
/// Every variant maps to exactly one [`ErrorEnvelope`] via [`DispatchError::to_envelope`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("controller not registered: '{name}'")]
    UnresolvedController { name: String },
    #[error("no operationId for controller '{controller}'")]
    MissingOperation { controller: String },
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error("handler panicked: {message}")]
    Panicked { message: String },
}

impl DispatchError {
    /// HTTP status for this failure. Handler errors keep their own code.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::UnresolvedController { .. } | Self::MissingOperation { .. } => {
                BAD_DESCRIPTOR_CODE
            }
            Self::Handler(err) => err.status(),
            Self::Panicked { .. } => pantry_core::DEFAULT_ERROR_CODE,
        }
    }

    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        match self {
            Self::Handler(err) => err.to_envelope(),
            other => ErrorEnvelope::message(other.code(), other.to_string()),
        }
    }
}
