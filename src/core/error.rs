//! Error types for framarama.
//!
//! Uses thiserror for structured errors with context. The split follows the
//! stages a render or an import passes through:
//! - Expression evaluation (template syntax, script failures, per-field attribution)
//! - Plugin lookup and configuration
//! - Tree editing and import reconciliation
//! - Image adapter operations

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a persisted record (finishing, context, frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Create a new random record ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a record ID from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Top-level error type for framarama.
#[derive(Error, Debug)]
pub enum FramaramaError {
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Import error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while rendering templates or evaluating model fields.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum EvalError {
    #[error("Template syntax error at offset {offset}: {reason}")]
    Template { offset: usize, reason: String },

    #[error("Expression '{expr}' failed: {reason}")]
    Script { expr: String, reason: String },

    #[error("Field '{field}' of {model_type}: {source}")]
    Field {
        model_type: String,
        field: String,
        #[source]
        source: Box<EvalError>,
    },
}

/// Errors from plugin lookup, configuration and execution.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin '{name}' not found")]
    NotFound { name: String },

    #[error("Imported node at '{path}' references unknown plugin '{plugin}'")]
    ImportUnknownPlugin { path: String, plugin: String },

    #[error("Document version {found} is not compatible with {expected}")]
    IncompatibleVersion { expected: String, found: String },

    #[error("Invalid configuration for field '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Plugin '{plugin}' failed: {reason}")]
    Execution { plugin: String, reason: String },

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

/// Errors from nested-set tree editing.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum TreeError {
    #[error("Node {0} not found")]
    NodeNotFound(RecordId),

    #[error("The synthetic root can not be {0}")]
    RootImmutable(String),

    #[error("Invalid move of node {node}: {reason}")]
    InvalidMove { node: RecordId, reason: String },
}

/// Errors during import reconciliation. Any of these aborts the whole import.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ReconcileError {
    #[error("Parent of '{path}' does not exist")]
    MissingParent { path: String },

    #[error("Path '{path}' occurs more than once")]
    PathCollision { path: String },

    #[error("Tree operation failed: {0}")]
    Tree(#[from] TreeError),
}

/// Errors from the image processing adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Can not open '{url}': {reason}")]
    Open { url: String, reason: String },

    #[error("HTTP request for '{url}' failed: {reason}")]
    Http { url: String, reason: String },

    #[error("Decoding failed: {0}")]
    Decode(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Image container holds no frames")]
    EmptyContainer,

    #[error("Invalid color '{0}'")]
    InvalidColor(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Error raised by a single finishing step; aborts the whole render.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Step '{step}' could not be evaluated: {source}")]
    Evaluate {
        step: String,
        #[source]
        source: EvalError,
    },

    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: PluginError,
    },

    #[error("Source image could not be loaded: {0}")]
    Open(#[source] AdapterError),

    #[error("Finalizing output failed: {0}")]
    Finalize(#[source] AdapterError),
}

// ============================================================================
// Error Utilities
// ============================================================================

impl EvalError {
    /// Attribute this error to a field of a model type.
    pub fn in_field(self, model_type: impl Into<String>, field: impl Into<String>) -> Self {
        EvalError::Field {
            model_type: model_type.into(),
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Name of the offending field, if the error was attributed to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            EvalError::Field { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl RenderError {
    /// Title of the step that aborted the render, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            RenderError::Evaluate { step, .. } | RenderError::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Result type alias for framarama operations.
pub type FramaramaResult<T> = Result<T, FramaramaError>;

/// Result type alias for expression evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Result type alias for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Result type alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_display() {
        let id = RecordId::new();
        assert_eq!(format!("{}", id).len(), 8);
    }

    #[test]
    fn test_field_attribution() {
        let error = EvalError::Template {
            offset: 3,
            reason: "unbalanced brace".to_string(),
        }
        .in_field("Finishing", "start_x");

        assert_eq!(error.field(), Some("start_x"));
        let message = error.to_string();
        assert!(message.contains("start_x"));
        assert!(message.contains("Finishing"));
    }

    #[test]
    fn test_render_error_step() {
        let error = RenderError::Step {
            step: "Logo".to_string(),
            source: PluginError::NotFound {
                name: "logo".to_string(),
            },
        };
        assert_eq!(error.step(), Some("Logo"));
        assert!(RenderError::Open(AdapterError::EmptyContainer).step().is_none());
    }
}
