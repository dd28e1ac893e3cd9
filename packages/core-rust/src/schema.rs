use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata identifying the API operation a request matched.
///
/// Attached to a request by the OpenAPI annotation stage. A request without a
/// descriptor did not match any documented operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Name of the controller that owns the operation. May be empty when the
    /// document omits the extension.
    #[serde(rename = "x-openapi-router-controller", default)]
    pub controller_name: String,
    /// Name of the service injected into the controller, if any.
    #[serde(
        rename = "x-openapi-router-service",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_name: Option<String>,
    /// Operation to invoke on the controller.
    #[serde(rename = "operationId", default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

impl SchemaDescriptor {
    /// Descriptor naming a controller and operation, without a service.
    #[must_use]
    pub fn new(controller_name: impl Into<String>, operation_id: impl Into<String>) -> Self {
        Self {
            controller_name: controller_name.into(),
            service_name: None,
            operation_id: Some(operation_id.into()),
        }
    }

    /// Sets the injected service name.
    #[must_use]
    pub fn with_service(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Operation id for logging; `"<none>"` when absent.
    #[must_use]
    pub fn operation_label(&self) -> &str {
        self.operation_id.as_deref().unwrap_or("<none>")
    }
}

/// Raw path template parameters extracted while matching a route,
/// keyed by the template's parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(pub BTreeMap<String, String>);

impl PathParams {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}
