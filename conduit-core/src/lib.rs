//! Conduit Core Library
//!
//! Deployment state reconciliation and configuration materialization for a
//! local Conduit platform stack: manifest persistence, profile
//! reconciliation, template materialization and a thin façade over the
//! external compose engine.

pub mod compose;
pub mod engine;
pub mod envfile;
pub mod error;
pub mod logs;
pub mod manifest;
pub mod profiles;
pub mod project;
pub mod template;

// Re-export commonly used items
pub use compose::ComposeProject;
pub use engine::{ComposeEngine, DockerComposeEngine, UpOptions};
pub use envfile::EnvFile;
pub use error::{ConduitError, Result, TemplateStage};
pub use logs::{LogConsumer, MultiplexedLogConsumer, SilentLogConsumer};
pub use manifest::{find_project_root, ProjectManifest, MANIFEST_FILE};
pub use profiles::{block_profiles, reconcile, select_database, Database};
pub use project::{BootstrapOptions, Conduit, StartOptions};

/// Tool version recorded in freshly bootstrapped manifests.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rendered environment file name, relative to the project root.
pub const ENV_FILE: &str = ".env";

/// Rendered compose file name, relative to the project root.
pub const COMPOSE_FILE: &str = "docker-compose.yaml";
