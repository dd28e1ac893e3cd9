//! The subset of an OpenAPI 3 document needed to route requests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::schema::SchemaDescriptor;

/// Errors from loading an OpenAPI document or compiling its paths.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read OpenAPI document {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid OpenAPI JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid OpenAPI YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid path template {template}: {reason}")]
    InvalidTemplate { template: String, reason: String },
}

/// An OpenAPI document reduced to servers and path operations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenApiDocument {
    #[serde(default)]
    pub servers: Vec<ServerObject>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerObject {
    pub url: String,
}

/// Operations declared under one path template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    pub get: Option<OperationObject>,
    pub put: Option<OperationObject>,
    pub post: Option<OperationObject>,
    pub delete: Option<OperationObject>,
    pub patch: Option<OperationObject>,
    pub head: Option<OperationObject>,
    pub options: Option<OperationObject>,
    pub trace: Option<OperationObject>,
}

impl PathItem {
    /// Declared operations with their upper-case HTTP method.
    pub fn operations(&self) -> impl Iterator<Item = (&'static str, &OperationObject)> {
        [
            ("GET", self.get.as_ref()),
            ("PUT", self.put.as_ref()),
            ("POST", self.post.as_ref()),
            ("DELETE", self.delete.as_ref()),
            ("PATCH", self.patch.as_ref()),
            ("HEAD", self.head.as_ref()),
            ("OPTIONS", self.options.as_ref()),
            ("TRACE", self.trace.as_ref()),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.map(|op| (method, op)))
    }
}

/// A single operation. Only the router extensions and `operationId` are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationObject {
    #[serde(flatten)]
    pub descriptor: SchemaDescriptor,
}

impl OpenApiDocument {
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] when the text is not a valid document.
    pub fn from_json_str(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::Yaml`] when the text is not a valid document.
    pub fn from_yaml_str(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Loads a document from disk. Files ending in `.json` are parsed as JSON,
    /// everything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    /// Path component of the first server URL, without a trailing slash.
    /// Empty when no server is declared.
    #[must_use]
    pub fn base_path(&self) -> &str {
        let Some(server) = self.servers.first() else {
            return "";
        };
        let url = server.url.as_str();
        let path = match url.find("://") {
            Some(scheme_end) => {
                let rest = &url[scheme_end + 3..];
                rest.find('/').map_or("", |slash| &rest[slash..])
            }
            None => url,
        };
        path.trim_end_matches('/')
    }
}
