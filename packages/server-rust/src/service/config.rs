use std::path::PathBuf;

use pantry_core::{DocumentError, OpenApiDocument};

use super::domain::bundled_document;

/// Server-level configuration for the API dispatch framework.
///
/// Network settings live in [`crate::network::NetworkConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name reported in logs and handed to services on init.
    pub instance_name: String,
    /// OpenAPI document to route against. `None` uses the bundled document.
    pub openapi_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance_name: "pantry".to_string(),
            openapi_path: None,
        }
    }
}

impl ServerConfig {
    /// Loads the configured OpenAPI document, falling back to the bundled one.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured file cannot be read or parsed.
    pub fn load_document(&self) -> Result<OpenApiDocument, DocumentError> {
        match &self.openapi_path {
            Some(path) => OpenApiDocument::load(path),
            None => bundled_document(),
        }
    }
}
