use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collected request parameters handed to a service: path params, query
/// params and the JSON body under `"body"`.
pub type OperationParams = Map<String, Value>;

/// Status of a successful service call unless stated otherwise.
pub const DEFAULT_SUCCESS_CODE: u16 = 200;

/// Successful result of a service call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub code: u16,
    pub payload: Value,
}

impl ServiceResponse {
    /// 200 response carrying `payload`.
    #[must_use]
    pub fn success(payload: Value) -> Self {
        Self::with_code(payload, DEFAULT_SUCCESS_CODE)
    }

    #[must_use]
    pub fn with_code(payload: Value, code: u16) -> Self {
        Self { code, payload }
    }
}
