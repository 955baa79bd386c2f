//! Compose project model.
//!
//! Loads a compose document plus an environment mapping into a queryable
//! project: profile filtering is applied once, synchronously, at load time,
//! and every retained service is stamped with the standard compose
//! provenance labels so external tooling (docker desktop, `docker compose
//! ls`) recognizes the deployment as a normal compose project.

pub mod types;

use crate::envfile::EnvFile;
use crate::error::{ConduitError, Result, TemplateStage};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use types::{ComposeFile, Environment, Service};

/// Compose label keys, matching what the reference compose CLI stamps.
pub const PROJECT_LABEL: &str = "com.docker.compose.project";
pub const SERVICE_LABEL: &str = "com.docker.compose.service";
pub const VERSION_LABEL: &str = "com.docker.compose.version";
pub const WORKING_DIR_LABEL: &str = "com.docker.compose.project.working_dir";
pub const CONFIG_FILES_LABEL: &str = "com.docker.compose.project.config_files";
pub const ONEOFF_LABEL: &str = "com.docker.compose.oneoff";

/// Compose spec version recorded in the version label.
pub const COMPOSE_VERSION: &str = "2.24.6";

/// The fixed set of provenance labels stamped on every service.
///
/// The label set is closed and known at design time, so it is a struct of
/// named fields rather than an open string-keyed map.
#[derive(Debug, Clone)]
pub struct ProvenanceLabels {
    pub project: String,
    pub service: String,
    pub version: String,
    pub working_dir: String,
    pub config_files: String,
    pub one_off: bool,
}

impl ProvenanceLabels {
    /// Insert the labels into a service's label map.
    pub fn apply(&self, labels: &mut BTreeMap<String, String>) {
        labels.insert(PROJECT_LABEL.to_string(), self.project.clone());
        labels.insert(SERVICE_LABEL.to_string(), self.service.clone());
        labels.insert(VERSION_LABEL.to_string(), self.version.clone());
        labels.insert(WORKING_DIR_LABEL.to_string(), self.working_dir.clone());
        labels.insert(CONFIG_FILES_LABEL.to_string(), self.config_files.clone());
        let one_off = if self.one_off { "True" } else { "False" };
        labels.insert(ONEOFF_LABEL.to_string(), one_off.to_string());
    }
}

/// A loaded compose project: the parsed document after profile application
/// and label injection, plus the environment it runs with.
#[derive(Debug, Clone)]
pub struct ComposeProject {
    name: String,
    working_dir: PathBuf,
    config_files: Vec<String>,
    file: ComposeFile,
    env: EnvFile,
    active_profiles: Vec<String>,
    declared_profiles: Vec<String>,
}

impl ComposeProject {
    /// Load a project from raw compose bytes and an environment.
    ///
    /// Applies the profile filter (services gated behind profiles not in
    /// `profiles` are dropped; retained services have their gate cleared)
    /// and stamps provenance labels on every retained service. Profile
    /// application is not re-appliable afterward without reloading.
    pub fn load(
        name: &str,
        working_dir: &Path,
        yaml: &[u8],
        env: EnvFile,
        profiles: &[String],
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(ConduitError::configuration("project name must not be empty"));
        }

        let mut file: ComposeFile = serde_yaml::from_slice(yaml)
            .map_err(|e| ConduitError::template(TemplateStage::Compose, e.to_string()))?;
        if file.services.is_empty() {
            return Err(ConduitError::template(
                TemplateStage::Compose,
                "no services defined",
            ));
        }

        // Profiles declared anywhere in the document, before filtering.
        let mut declared_profiles: Vec<String> = Vec::new();
        for service in file.services.values() {
            for profile in &service.profiles {
                if !declared_profiles.contains(profile) {
                    declared_profiles.push(profile.clone());
                }
            }
        }

        // Apply the profile filter once: keep ungated services and services
        // whose gate intersects the active set.
        file.services.retain(|_, service| {
            service.profiles.is_empty() || service.profiles.iter().any(|p| profiles.contains(p))
        });
        for service in file.services.values_mut() {
            service.profiles.clear();
        }
        debug!(
            "Loaded project {} with {} active service(s)",
            name,
            file.services.len()
        );

        let config_files = vec![working_dir
            .join(crate::COMPOSE_FILE)
            .to_string_lossy()
            .to_string()];

        // Stamp provenance labels on every retained service.
        let service_names: Vec<String> = file.services.keys().cloned().collect();
        for service_name in &service_names {
            let labels = ProvenanceLabels {
                project: name.to_string(),
                service: service_name.clone(),
                version: COMPOSE_VERSION.to_string(),
                working_dir: working_dir.to_string_lossy().to_string(),
                config_files: config_files.join(","),
                one_off: false,
            };
            if let Some(service) = file.services.get_mut(service_name) {
                labels.apply(&mut service.labels);
            }
        }

        Ok(Self {
            name: name.to_string(),
            working_dir: working_dir.to_path_buf(),
            config_files,
            file,
            env,
            active_profiles: profiles.to_vec(),
            declared_profiles,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn config_files(&self) -> &[String] {
        &self.config_files
    }

    pub fn env(&self) -> &EnvFile {
        &self.env
    }

    /// Names of all active services, in document order.
    pub fn service_names(&self) -> Vec<String> {
        self.file.services.keys().cloned().collect()
    }

    /// Profiles declared in the document before filtering.
    pub fn declared_profiles(&self) -> &[String] {
        &self.declared_profiles
    }

    /// The profile set this project was loaded with.
    pub fn active_profiles(&self) -> &[String] {
        &self.active_profiles
    }

    /// Keep only the profiles that actually exist in the loaded document,
    /// preserving input order.
    pub fn filter_profiles(&self, profiles: &[String]) -> Vec<String> {
        profiles
            .iter()
            .filter(|p| self.declared_profiles.contains(p))
            .cloned()
            .collect()
    }

    /// Validate that every requested service name is defined in the project.
    ///
    /// Unknown names are collected and reported together rather than failing
    /// fast on the first one.
    pub fn check_services(&self, services: &[String]) -> Result<()> {
        let unknown: Vec<String> = services
            .iter()
            .filter(|s| !self.file.services.contains_key(s.as_str()))
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ConduitError::UndefinedServices { services: unknown })
        }
    }

    /// The fully-resolved document (after profile application and label
    /// injection) serialized as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.file)
            .map_err(|e| ConduitError::template(TemplateStage::Compose, e.to_string()))
    }

    /// Look up a loaded service by name.
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.file.services.get(name)
    }
}
