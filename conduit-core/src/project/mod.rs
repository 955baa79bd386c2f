//! Project orchestration.
//!
//! Ties the pieces together: bootstrap fetches and renders the templates,
//! writes the three project files and persists the manifest; `from_project`
//! reloads an existing project and reconciles its profiles. Lifecycle verbs
//! are forwarded to the external engine after validation.
//!
//! Bootstrap is guarded: before any resource is created a background
//! listener is armed that removes the partially-created project directory on
//! interrupt, and the same cleanup runs on any bootstrap-stage failure after
//! directory creation. The listener is disarmed once the project files are
//! fully written, right before the final `up`.

use crate::compose::ComposeProject;
use crate::engine::{ComposeEngine, UpOptions};
use crate::envfile::EnvFile;
use crate::error::{ConduitError, Result, TemplateStage};
use crate::logs::{LogConsumer, MultiplexedLogConsumer, SilentLogConsumer};
use crate::manifest::{find_project_root, ProjectManifest};
use crate::profiles::{block_profiles, reconcile, select_database, Database};
use crate::template::{
    bind_database_mount, generate_secret, TemplateClient, VariableMap, MASTER_KEY_LENGTH,
    PASSWORD_LENGTH,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Options for bootstrapping a new project.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub project_name: String,
    pub profiles: Vec<String>,
    pub image_tag: String,
    pub ui_image_tag: String,
    /// Bind the database's data directory to `./database/` instead of a
    /// named volume.
    pub mount_database: bool,
    pub detach: bool,
}

/// Options for starting an existing project.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub profiles: Vec<String>,
    pub detach: bool,
}

/// A loaded Conduit deployment, ready for lifecycle verbs.
pub struct Conduit {
    project: ComposeProject,
    manifest: ProjectManifest,
    root: PathBuf,
    engine: Arc<dyn ComposeEngine>,
    consumer: Arc<dyn LogConsumer>,
    detach: bool,
}

impl std::fmt::Debug for Conduit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conduit")
            .field("project", &self.project)
            .field("manifest", &self.manifest)
            .field("root", &self.root)
            .field("detach", &self.detach)
            .finish_non_exhaustive()
    }
}

impl Conduit {
    /// Assemble a deployment from preloaded parts.
    ///
    /// The log consumer is selected by configuration: silent when detached,
    /// colorized multiplexing otherwise.
    pub fn new(
        project: ComposeProject,
        manifest: ProjectManifest,
        root: PathBuf,
        engine: Arc<dyn ComposeEngine>,
        detach: bool,
    ) -> Self {
        let consumer: Arc<dyn LogConsumer> = if detach {
            Arc::new(SilentLogConsumer)
        } else {
            Arc::new(MultiplexedLogConsumer::new())
        };
        Self { project, manifest, root, engine, consumer, detach }
    }

    /// Bootstrap a new project under `base_dir`.
    ///
    /// Creates `<base_dir>/<project_name>/` containing `.env`,
    /// `docker-compose.yaml` and `conduit.json`. The database selector runs
    /// first so a configuration mistake is caught before any directory or
    /// network side effect.
    pub async fn bootstrap(
        engine: Arc<dyn ComposeEngine>,
        base_dir: &Path,
        options: BootstrapOptions,
    ) -> Result<Self> {
        let database = select_database(&options.profiles)?
            .ok_or_else(|| ConduitError::configuration("a database profile has not been given"))?;

        let project_dir = base_dir.join(&options.project_name);
        if project_dir.exists() {
            return Err(ConduitError::configuration(format!(
                "directory {:?} already exists",
                project_dir
            )));
        }

        // Armed before the directory is created; disarmed once the project
        // files are fully written.
        let guard = CleanupGuard::arm(project_dir.clone());

        std::fs::create_dir_all(&project_dir).map_err(|e| ConduitError::Io {
            path: project_dir.clone(),
            source: e,
        })?;

        let result = Self::materialize(engine, database, &project_dir, &options).await;
        guard.disarm();

        match result {
            Ok(conduit) => Ok(conduit),
            Err(e) => {
                remove_project_dir(&project_dir);
                Err(e)
            }
        }
    }

    /// Fetch, render and write the project files. Runs with the cleanup
    /// guard armed; any error here triggers directory removal in the caller.
    async fn materialize(
        engine: Arc<dyn ComposeEngine>,
        database: Database,
        project_dir: &Path,
        options: &BootstrapOptions,
    ) -> Result<Self> {
        let mut vars = VariableMap::new();
        vars.insert("MasterKey", generate_secret(MASTER_KEY_LENGTH));
        vars.insert(database.password_variable(), generate_secret(PASSWORD_LENGTH));
        vars.insert("ImageTag", options.image_tag.clone());
        vars.insert("UiImageTag", options.ui_image_tag.clone());
        vars.insert("ProjectName", options.project_name.clone());

        let client = TemplateClient::new()?;

        let env_template = client.fetch_env_template(database).await?;
        let env = render_env(&vars, env_template)?;

        let mut yaml = client.fetch_compose_template().await?;
        if options.mount_database {
            yaml = bind_database_mount(&yaml, database)?;
        }

        let project = ComposeProject::load(
            &options.project_name,
            project_dir,
            &yaml,
            env,
            &options.profiles,
        )?;

        // Persist only the ordinary profiles that actually exist in the
        // compose document; the database is tracked separately.
        let requested = block_profiles(&options.profiles, &[]);
        let persisted = project.filter_profiles(&requested);
        warn_dropped_profiles(&requested, &persisted);

        let manifest = ProjectManifest::new(
            &options.project_name,
            crate::TOOL_VERSION,
            database.as_str(),
            persisted,
        );

        // Writes are the last steps of the stage, minimizing the window for
        // partial state.
        project.env().write(&project_dir.join(crate::ENV_FILE))?;
        std::fs::write(project_dir.join(crate::COMPOSE_FILE), &yaml).map_err(|e| {
            ConduitError::Io { path: project_dir.join(crate::COMPOSE_FILE), source: e }
        })?;
        manifest.save(project_dir)?;
        info!("Bootstrapped project {} at {:?}", options.project_name, project_dir);

        Ok(Self::new(project, manifest, project_dir.to_path_buf(), engine, options.detach))
    }

    /// Load an existing project, searching upward from `start_dir` for the
    /// nearest manifest.
    ///
    /// Newly requested profiles are merged into the persisted set
    /// (persisted-first order, database names blocked) and the manifest is
    /// rewritten with the merged set filtered against the profiles the
    /// compose document actually declares.
    pub async fn from_project(
        engine: Arc<dyn ComposeEngine>,
        start_dir: &Path,
        options: StartOptions,
    ) -> Result<Self> {
        let root = find_project_root(start_dir)?;
        let mut manifest = ProjectManifest::load(&root)?;

        let updated = reconcile(&manifest.profiles, &options.profiles);
        debug!("Reconciled profiles: {:?}", updated);

        let env = EnvFile::from_file(&root.join(crate::ENV_FILE))?;
        let compose_path = root.join(crate::COMPOSE_FILE);
        let yaml = std::fs::read(&compose_path)
            .map_err(|e| ConduitError::Io { path: compose_path, source: e })?;

        let project = ComposeProject::load(&manifest.project_name, &root, &yaml, env, &updated)?;

        let persisted = project.filter_profiles(&updated);
        warn_dropped_profiles(&updated, &persisted);

        // Rewrite the manifest only when the persisted set actually changed,
        // so read-only verbs leave the file untouched.
        if manifest.profiles != persisted {
            manifest.profiles = persisted;
            manifest.save(&root)?;
        }

        Ok(Self::new(project, manifest, root, engine, options.detach))
    }

    /// Recreate and start the full stack.
    pub async fn up(&self) -> Result<()> {
        self.engine
            .up(
                &self.project,
                UpOptions { detach: self.detach },
                Arc::clone(&self.consumer),
            )
            .await
    }

    /// Halt the named services. Every name is validated against the loaded
    /// project before the engine is involved.
    pub async fn stop(&self, services: &[String]) -> Result<()> {
        self.project.check_services(services)?;
        self.engine.stop(&self.project, services).await
    }

    /// Remove the named services' containers and volumes. Every name is
    /// validated against the loaded project before the engine is involved.
    pub async fn remove(&self, services: &[String]) -> Result<()> {
        self.project.check_services(services)?;
        self.engine.remove(&self.project, services).await
    }

    /// The fully-resolved compose document as YAML, for diagnostic/export use.
    pub fn config(&self) -> Result<String> {
        self.project.to_yaml()
    }

    pub fn project(&self) -> &ComposeProject {
        &self.project
    }

    pub fn manifest(&self) -> &ProjectManifest {
        &self.manifest
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Background interrupt listener for the bootstrap window.
///
/// On SIGINT/SIGTERM while armed, removes the partially-created project
/// directory and exits. Disarming cancels the listener; the cancellation
/// signal and the interrupt race through a `select!`, so the cleanup
/// callback and the main flow never run concurrently against a completed
/// bootstrap.
struct CleanupGuard {
    disarm_tx: Option<oneshot::Sender<()>>,
}

impl CleanupGuard {
    fn arm(project_dir: PathBuf) -> Self {
        let (disarm_tx, disarm_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let interrupted = async {
                let ctrl_c = tokio::signal::ctrl_c();

                #[cfg(unix)]
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut terminate) => {
                        tokio::select! {
                            _ = ctrl_c => {}
                            _ = terminate.recv() => {}
                        }
                    }
                    Err(_) => {
                        let _ = ctrl_c.await;
                    }
                }

                #[cfg(not(unix))]
                {
                    let _ = ctrl_c.await;
                }
            };

            tokio::select! {
                _ = interrupted => {
                    warn!("Interrupted during bootstrap, cleaning up {:?}", project_dir);
                    remove_project_dir(&project_dir);
                    std::process::exit(130);
                }
                _ = disarm_rx => {}
            }
        });

        Self { disarm_tx: Some(disarm_tx) }
    }

    fn disarm(mut self) {
        if let Some(tx) = self.disarm_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Substitute variables into a fetched environment template and parse the
/// result. A template body that is not valid UTF-8 is malformed input, not
/// something to transliterate.
fn render_env(vars: &VariableMap, template: Vec<u8>) -> Result<EnvFile> {
    let body = String::from_utf8(template).map_err(|e| {
        ConduitError::template(TemplateStage::Environment, format!("not valid UTF-8: {}", e))
    })?;
    EnvFile::parse(vars.substitute(&body).into_bytes())
}

/// Best-effort recursive removal of a partially-created project directory.
/// A cleanup failure is reported but never masks the original error.
fn remove_project_dir(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        warn!("Failed to clean up project directory {:?}: {}", dir, e);
    }
}

fn warn_dropped_profiles(requested: &[String], kept: &[String]) {
    for profile in requested {
        if !kept.contains(profile) {
            warn!(
                "Profile {:?} is not declared in the compose document and will not be persisted",
                profile
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ComposeProject;
    use async_trait::async_trait;

    struct NoopEngine;

    #[async_trait]
    impl ComposeEngine for NoopEngine {
        async fn up(
            &self,
            _project: &ComposeProject,
            _options: UpOptions,
            _consumer: Arc<dyn LogConsumer>,
        ) -> Result<()> {
            Ok(())
        }
        async fn stop(&self, _project: &ComposeProject, _services: &[String]) -> Result<()> {
            Ok(())
        }
        async fn remove(&self, _project: &ComposeProject, _services: &[String]) -> Result<()> {
            Ok(())
        }
    }

    const COMPOSE: &str = r#"
services:
  api:
    image: conduit/api:latest
  ui:
    image: conduit/ui:latest
  mongodb:
    image: mongo:6
    profiles: [mongodb]
  search:
    image: conduit/search:latest
    profiles: [search]
  metrics:
    image: conduit/metrics:latest
    profiles: [metrics]
"#;

    fn write_project(dir: &Path, profiles: &[&str]) {
        std::fs::write(dir.join(crate::ENV_FILE), "MASTER_KEY=abc\n").unwrap();
        std::fs::write(dir.join(crate::COMPOSE_FILE), COMPOSE).unwrap();
        ProjectManifest::new(
            "acme",
            crate::TOOL_VERSION,
            "mongodb",
            profiles.iter().map(|s| s.to_string()).collect(),
        )
        .save(dir)
        .unwrap();
    }

    fn start_options(profiles: &[&str]) -> StartOptions {
        StartOptions {
            profiles: profiles.iter().map(|s| s.to_string()).collect(),
            detach: true,
        }
    }

    #[tokio::test]
    async fn test_from_project_merges_and_persists_profiles() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), &["search"]);

        let conduit = Conduit::from_project(
            Arc::new(NoopEngine),
            dir.path(),
            start_options(&["metrics", "mongodb"]),
        )
        .await
        .unwrap();

        // mongodb blocked, search preserved, metrics appended.
        assert_eq!(conduit.manifest().profiles, vec!["search", "metrics"]);
        assert_eq!(conduit.manifest().database, "mongodb");

        let reloaded = ProjectManifest::load(dir.path()).unwrap();
        assert_eq!(reloaded.profiles, vec!["search", "metrics"]);
    }

    #[tokio::test]
    async fn test_from_project_drops_profiles_missing_from_document() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), &[]);

        let conduit = Conduit::from_project(
            Arc::new(NoopEngine),
            dir.path(),
            start_options(&["ghost", "search"]),
        )
        .await
        .unwrap();

        assert_eq!(conduit.manifest().profiles, vec!["search"]);
    }

    #[tokio::test]
    async fn test_from_project_repeat_start_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), &["search"]);

        let engine: Arc<dyn ComposeEngine> = Arc::new(NoopEngine);
        let first = Conduit::from_project(
            Arc::clone(&engine),
            dir.path(),
            start_options(&["metrics"]),
        )
        .await
        .unwrap();
        let second = Conduit::from_project(
            Arc::clone(&engine),
            dir.path(),
            start_options(&["metrics"]),
        )
        .await
        .unwrap();

        assert_eq!(first.manifest().profiles, second.manifest().profiles);
    }

    #[tokio::test]
    async fn test_from_project_without_new_profiles_leaves_manifest_untouched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(crate::ENV_FILE), "MASTER_KEY=abc\n").unwrap();
        std::fs::write(dir.path().join(crate::COMPOSE_FILE), COMPOSE).unwrap();
        // Hand-written compact JSON; a rewrite would re-indent it.
        let raw = r#"{"projectName":"acme","version":"0.1.0","database":"mongodb","profiles":["search"]}"#;
        std::fs::write(dir.path().join(crate::MANIFEST_FILE), raw).unwrap();

        Conduit::from_project(Arc::new(NoopEngine), dir.path(), start_options(&[]))
            .await
            .unwrap();
        let after = std::fs::read_to_string(dir.path().join(crate::MANIFEST_FILE)).unwrap();
        assert_eq!(after, raw);

        // A genuinely new profile does rewrite the file.
        Conduit::from_project(Arc::new(NoopEngine), dir.path(), start_options(&["metrics"]))
            .await
            .unwrap();
        let after = std::fs::read_to_string(dir.path().join(crate::MANIFEST_FILE)).unwrap();
        assert_ne!(after, raw);
        assert!(after.contains("metrics"));
    }

    #[test]
    fn test_render_env_rejects_invalid_utf8_template() {
        let vars = VariableMap::new();
        let err = render_env(&vars, vec![0x4d, 0x3d, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(
            err,
            ConduitError::Template { stage: TemplateStage::Environment, .. }
        ));
    }

    #[test]
    fn test_render_env_substitutes_before_parsing() {
        let mut vars = VariableMap::new();
        vars.insert("MasterKey", "abc123");
        let env = render_env(&vars, b"MASTER_KEY={{MasterKey}}\n".to_vec()).unwrap();
        assert_eq!(env.get("MASTER_KEY"), Some("abc123"));
    }

    #[tokio::test]
    async fn test_from_project_searches_upward() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), &[]);
        let nested = dir.path().join("sub").join("dir");
        std::fs::create_dir_all(&nested).unwrap();

        let conduit =
            Conduit::from_project(Arc::new(NoopEngine), &nested, start_options(&[]))
                .await
                .unwrap();
        assert_eq!(conduit.root(), dir.path());
    }

    #[tokio::test]
    async fn test_from_project_outside_any_project() {
        let dir = tempfile::tempdir().unwrap();
        let err = Conduit::from_project(Arc::new(NoopEngine), dir.path(), start_options(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ConduitError::NotAProject { .. }));
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_two_databases_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let options = BootstrapOptions {
            project_name: "acme".to_string(),
            profiles: vec!["mongodb".to_string(), "postgres".to_string()],
            image_tag: "latest".to_string(),
            ui_image_tag: "latest".to_string(),
            mount_database: false,
            detach: true,
        };

        let err = Conduit::bootstrap(Arc::new(NoopEngine), dir.path(), options)
            .await
            .unwrap_err();
        assert!(matches!(err, ConduitError::Configuration { .. }));
        // The gate runs before any resource is created.
        assert!(!dir.path().join("acme").exists());
    }

    #[tokio::test]
    async fn test_bootstrap_requires_a_database_profile() {
        let dir = tempfile::tempdir().unwrap();
        let options = BootstrapOptions {
            project_name: "acme".to_string(),
            profiles: vec!["search".to_string()],
            image_tag: "latest".to_string(),
            ui_image_tag: "latest".to_string(),
            mount_database: false,
            detach: true,
        };

        let err = Conduit::bootstrap(Arc::new(NoopEngine), dir.path(), options)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("database profile has not been given"));
        assert!(!dir.path().join("acme").exists());
    }
}
