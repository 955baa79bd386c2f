//! Project manifest persistence.
//!
//! The manifest (`conduit.json`) is what marks a directory as a Conduit
//! project, the same way a `package.json` marks an npm package. It records
//! the project identity, the database engine chosen at bootstrap, and the
//! service profiles that have been durably enabled.

use crate::error::{ConduitError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the persisted manifest, relative to the project root.
pub const MANIFEST_FILE: &str = "conduit.json";

/// Persisted project identity.
///
/// `database` is set once at bootstrap and never changed afterward.
/// `profiles` never contains a database-engine name (those are tracked via
/// `database`) and never contains duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    /// Unique project identifier, immutable after creation.
    pub project_name: String,

    /// Tool version recorded at bootstrap.
    pub version: String,

    /// Selected database engine: "mongodb", "postgres" or "".
    pub database: String,

    /// Optional service profiles durably enabled for this project,
    /// in insertion order.
    pub profiles: Vec<String>,
}

impl ProjectManifest {
    /// Create a new manifest for a freshly bootstrapped project.
    pub fn new(
        project_name: impl Into<String>,
        version: impl Into<String>,
        database: impl Into<String>,
        profiles: Vec<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            version: version.into(),
            database: database.into(),
            profiles,
        }
    }

    /// Load the manifest from a project root directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| ConduitError::Manifest {
            path: path.clone(),
            reason: format!("failed to read: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| ConduitError::Manifest {
            path,
            reason: format!("failed to parse: {}", e),
        })
    }

    /// Write the manifest to a project root directory.
    ///
    /// Uses stable pretty indentation so the file stays readable in diffs.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let content = serde_json::to_string_pretty(self).map_err(|e| ConduitError::Manifest {
            path: path.clone(),
            reason: format!("failed to serialize: {}", e),
        })?;
        debug!("Writing manifest to {:?}", path);
        std::fs::write(&path, content).map_err(|e| ConduitError::Manifest {
            path,
            reason: format!("failed to write: {}", e),
        })
    }
}

/// Find the nearest ancestor directory (including `start` itself) that
/// contains a `conduit.json`.
///
/// Stops at the filesystem root and fails with `NotAProject` if the search
/// is exhausted.
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    let mut dir = start;
    loop {
        if dir.join(MANIFEST_FILE).is_file() {
            debug!("Found project root at {:?}", dir);
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Err(ConduitError::NotAProject { start: start.to_path_buf() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ProjectManifest::new(
            "acme",
            "0.1.0",
            "mongodb",
            vec!["search".to_string(), "metrics".to_string()],
        );
        manifest.save(dir.path()).unwrap();

        let loaded = ProjectManifest::load(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
        // Profile order must survive the round trip.
        assert_eq!(loaded.profiles, vec!["search", "metrics"]);
    }

    #[test]
    fn test_manifest_uses_camel_case_keys() {
        let manifest = ProjectManifest::new("acme", "0.1.0", "", vec![]);
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"projectName\""));
        assert!(json.contains("\"database\""));
        assert!(json.contains("\"profiles\""));
    }

    #[test]
    fn test_load_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConduitError::Manifest { .. }));
    }

    #[test]
    fn test_load_corrupt_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "{not json").unwrap();
        let err = ProjectManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConduitError::Manifest { .. }));
    }

    #[test]
    fn test_find_project_root_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        ProjectManifest::new("acme", "0.1.0", "", vec![]).save(dir.path()).unwrap();

        let root = find_project_root(&nested).unwrap();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn test_find_project_root_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_project_root(dir.path()).unwrap_err();
        assert!(matches!(err, ConduitError::NotAProject { .. }));
    }
}
