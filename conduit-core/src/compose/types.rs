//! Compose file format types.
//!
//! A deliberately small model of the compose schema: enough to enumerate
//! services, their profile tags and their volumes. Unknown service keys are
//! preserved through a flattened map so a parsed document can be written
//! back without losing fields this tool does not interpret.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root structure of a docker-compose.yaml file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeFile {
    /// Compose file format version (legacy, optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Services to be created.
    pub services: BTreeMap<String, Service>,

    /// Named volumes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, serde_yaml::Value>,

    /// Networks.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, serde_yaml::Value>,
}

/// A service in a compose file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    /// Container image to use.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    /// Port mappings (e.g., ["8080:80"]).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,

    /// Environment variables, map or list form.
    #[serde(default, skip_serializing_if = "Environment::is_empty")]
    pub environment: Environment,

    /// Volume mounts (e.g., ["./data:/data", "db:/var/lib/db"]).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    /// Dependencies, short or long form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<serde_yaml::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<serde_yaml::Value>,

    /// Metadata labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Profile tags gating this service.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,

    /// Any service keys this tool does not interpret, carried verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Environment variables can be specified as a map or list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Environment {
    /// Environment as key-value map
    Map(BTreeMap<String, String>),
    /// Environment as list of KEY=value strings
    List(Vec<String>),
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Map(BTreeMap::new())
    }
}

impl Environment {
    pub fn is_empty(&self) -> bool {
        match self {
            Environment::Map(map) => map.is_empty(),
            Environment::List(list) => list.is_empty(),
        }
    }
}
