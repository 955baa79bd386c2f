//! Template materialization.
//!
//! Produces the two artifacts a stack needs to run: the environment file and
//! the compose document. Both start life as remote templates; the
//! environment template is keyed by the selected database engine and has its
//! `{{Variable}}` placeholders replaced with generated secrets and run
//! parameters, and the compose template can optionally be rewritten to bind
//! the database's data directory to a local path.

use crate::compose::ComposeFile;
use crate::error::{ConduitError, Result, TemplateStage};
use crate::profiles::Database;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Environment template, one canonical URL per database engine.
pub const MONGO_ENV_TEMPLATE_URL: &str =
    "https://raw.githubusercontent.com/conduit-deploy/conduit-cli/main/content/env-mongo-template.env";
pub const POSTGRES_ENV_TEMPLATE_URL: &str =
    "https://raw.githubusercontent.com/conduit-deploy/conduit-cli/main/content/env-postgres-template.env";

/// Compose template; one template serves all profile/database combinations.
pub const COMPOSE_TEMPLATE_URL: &str =
    "https://raw.githubusercontent.com/conduit-deploy/conduit-cli/main/content/docker-compose.yml";

/// Conventional secret lengths.
pub const MASTER_KEY_LENGTH: usize = 64;
pub const PASSWORD_LENGTH: usize = 32;

/// Remote fetches fail fast rather than hang; no retries are performed.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Generate a random string drawn uniformly from the alphanumeric alphabet
/// (digits + uppercase + lowercase).
pub fn generate_secret(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// An ordered set of `{{Name}}` substitution variables.
#[derive(Debug, Clone, Default)]
pub struct VariableMap {
    entries: Vec<(String, String)>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable; a later insert for the same name wins.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(k, _)| *k != name);
        self.entries.push((name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every occurrence of every `{{Name}}` token present in the map.
    ///
    /// Plain literal replacement, not template-language evaluation. Keys are
    /// applied longest-first so a key that is a prefix of another key cannot
    /// corrupt the longer token. Tokens not present in the map are left
    /// untouched verbatim.
    pub fn substitute(&self, input: &str) -> String {
        let mut keys: Vec<&(String, String)> = self.entries.iter().collect();
        keys.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut out = input.to_string();
        for (name, value) in keys {
            out = out.replace(&format!("{{{{{}}}}}", name), value);
        }
        out
    }
}

/// HTTP client for fetching remote templates.
///
/// Every failure surfaces as a `Template` error tagged with the stage; no
/// partial file is ever written on a fetch failure because fetching happens
/// strictly before any disk write.
pub struct TemplateClient {
    http: reqwest::Client,
}

impl TemplateClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ConduitError::configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// Fetch the environment template for the selected database engine.
    pub async fn fetch_env_template(&self, database: Database) -> Result<Vec<u8>> {
        let url = match database {
            Database::Mongodb => MONGO_ENV_TEMPLATE_URL,
            Database::Postgres => POSTGRES_ENV_TEMPLATE_URL,
        };
        self.fetch(url, TemplateStage::Environment).await
    }

    /// Fetch the compose template.
    pub async fn fetch_compose_template(&self) -> Result<Vec<u8>> {
        self.fetch(COMPOSE_TEMPLATE_URL, TemplateStage::Compose).await
    }

    async fn fetch(&self, url: &str, stage: TemplateStage) -> Result<Vec<u8>> {
        debug!("Fetching {} template from {}", stage, url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ConduitError::template(stage, format!("fetch failed: {}", e)))?;
        let response = response
            .error_for_status()
            .map_err(|e| ConduitError::template(stage, format!("fetch failed: {}", e)))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConduitError::template(stage, format!("failed to read body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// Rewrite the compose template so the selected database engine stores its
/// data under a local `./database/` bind mount.
///
/// The named database volumes and the non-selected engine's service are
/// deleted entirely; the selected engine's service has its volume list
/// replaced with a single bind mount at that engine's data directory.
pub fn bind_database_mount(yaml: &[u8], database: Database) -> Result<Vec<u8>> {
    let mut file: ComposeFile = serde_yaml::from_slice(yaml)
        .map_err(|e| ConduitError::template(TemplateStage::Compose, e.to_string()))?;

    file.volumes.remove("mongo");
    file.volumes.remove("postgres");

    let other = match database {
        Database::Mongodb => Database::Postgres,
        Database::Postgres => Database::Mongodb,
    };
    file.services.remove(other.as_str());

    let service = file.services.get_mut(database.as_str()).ok_or_else(|| {
        ConduitError::template(
            TemplateStage::Compose,
            format!("service {} not present in compose template", database),
        )
    })?;
    service.volumes = vec![format!("./database/:{}", database.data_dir())];

    serde_yaml::to_string(&file)
        .map(String::into_bytes)
        .map_err(|e| ConduitError::template(TemplateStage::Compose, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secret_length_and_alphabet() {
        let secret = generate_secret(MASTER_KEY_LENGTH);
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));

        let password = generate_secret(PASSWORD_LENGTH);
        assert_eq!(password.len(), 32);
    }

    #[test]
    fn test_generate_secret_not_constant() {
        assert_ne!(generate_secret(32), generate_secret(32));
    }

    #[test]
    fn test_substitution_totality() {
        let mut vars = VariableMap::new();
        vars.insert("MasterKey", "abc");
        vars.insert("MongoPassword", "xyz");

        let out = vars.substitute("k={{MasterKey}} p={{MongoPassword}} again={{MasterKey}}");
        assert_eq!(out, "k=abc p=xyz again=abc");
        assert!(!out.contains("{{"));
    }

    #[test]
    fn test_unknown_tokens_left_verbatim() {
        let mut vars = VariableMap::new();
        vars.insert("Known", "v");

        let out = vars.substitute("{{Known}} {{Unknown}}");
        assert_eq!(out, "v {{Unknown}}");
    }

    #[test]
    fn test_prefix_keys_do_not_corrupt_longer_tokens() {
        let mut vars = VariableMap::new();
        vars.insert("Password", "short");
        vars.insert("PasswordSalt", "long");

        let out = vars.substitute("{{PasswordSalt}}/{{Password}}");
        assert_eq!(out, "long/short");
    }

    #[test]
    fn test_later_insert_wins() {
        let mut vars = VariableMap::new();
        vars.insert("Key", "first");
        vars.insert("Key", "second");
        assert_eq!(vars.get("Key"), Some("second"));
        assert_eq!(vars.substitute("{{Key}}"), "second");
    }

    const COMPOSE_TEMPLATE: &str = r#"
services:
  api:
    image: conduit/api:latest
  mongodb:
    image: mongo:6
    profiles: [mongodb]
    volumes:
      - mongo:/data/db
  postgres:
    image: postgres:16
    profiles: [postgres]
    volumes:
      - postgres:/var/lib/postgresql/data
volumes:
  mongo:
  postgres:
"#;

    #[test]
    fn test_bind_mount_mongodb() {
        let out = bind_database_mount(COMPOSE_TEMPLATE.as_bytes(), Database::Mongodb).unwrap();
        let file: ComposeFile = serde_yaml::from_slice(&out).unwrap();

        assert!(!file.services.contains_key("postgres"));
        assert!(file.volumes.is_empty());
        assert_eq!(
            file.services["mongodb"].volumes,
            vec!["./database/:/data/db"]
        );
        // Unrelated services are untouched.
        assert!(file.services["api"].volumes.is_empty());
    }

    #[test]
    fn test_bind_mount_postgres() {
        let out = bind_database_mount(COMPOSE_TEMPLATE.as_bytes(), Database::Postgres).unwrap();
        let file: ComposeFile = serde_yaml::from_slice(&out).unwrap();

        assert!(!file.services.contains_key("mongodb"));
        assert_eq!(
            file.services["postgres"].volumes,
            vec!["./database/:/var/lib/postgresql/data"]
        );
    }

    #[test]
    fn test_bind_mount_missing_service() {
        let yaml = "services:\n  api:\n    image: a:1\n";
        let err = bind_database_mount(yaml.as_bytes(), Database::Mongodb).unwrap_err();
        assert!(matches!(
            err,
            ConduitError::Template { stage: TemplateStage::Compose, .. }
        ));
    }
}
