//! Error types for Conduit.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Conduit operations.
pub type Result<T> = std::result::Result<T, ConduitError>;

/// Stage at which a template operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStage {
    /// The environment-variable template (`.env`).
    Environment,
    /// The compose-file template (`docker-compose.yaml`).
    Compose,
}

impl std::fmt::Display for TemplateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Environment => write!(f, "environment"),
            Self::Compose => write!(f, "compose"),
        }
    }
}

/// Main error type for Conduit.
#[derive(Error, Debug)]
pub enum ConduitError {
    // Profile / database selection errors, caught before side effects
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    // Template fetch or render errors, tagged by stage
    #[error("Template error ({stage}): {reason}")]
    Template { stage: TemplateStage, reason: String },

    // Manifest file errors (missing, corrupt, unwritable)
    #[error("Manifest error at {path:?}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    // Lifecycle verbs received service names the project does not define
    #[error("Undefined services: {}", services.join(", "))]
    UndefinedServices { services: Vec<String> },

    // The external compose engine returned a failure
    #[error("Engine {operation} failed: {reason}")]
    Engine { operation: String, reason: String },

    // Upward manifest search exhausted without finding conduit.json
    #[error("Not a Conduit project: no conduit.json found from {start:?} upward")]
    NotAProject { start: PathBuf },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConduitError {
    /// Create a `Configuration` error from any displayable reason.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration { reason: reason.into() }
    }

    /// Create a `Template` error for the given stage.
    pub fn template(stage: TemplateStage, reason: impl Into<String>) -> Self {
        Self::Template { stage, reason: reason.into() }
    }

    /// Create an `Engine` error for the given operation.
    pub fn engine(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Engine { operation: operation.into(), reason: reason.into() }
    }
}
