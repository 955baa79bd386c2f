//! External compose engine abstraction.
//!
//! The actual container lifecycle work is delegated entirely to an external
//! engine; this module defines the seam (`ComposeEngine`) and the default
//! implementation that drives the `docker compose` plugin, feeding it the
//! resolved project document over stdin so profile application and label
//! injection performed at load time are what the engine actually runs.

use crate::compose::ComposeProject;
use crate::error::{ConduitError, Result};
use crate::logs::LogConsumer;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Options for the `up` operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpOptions {
    /// When set, return as soon as containers are scheduled instead of
    /// attaching to their log streams.
    pub detach: bool,
}

/// The external compose engine the core drives.
///
/// Implementations must replace existing containers for services in scope
/// on `up` (force-recreate, dependencies included) and remove orphaned
/// containers not present in the current service list.
#[async_trait]
pub trait ComposeEngine: Send + Sync {
    /// Recreate and start every service in the project.
    async fn up(
        &self,
        project: &ComposeProject,
        options: UpOptions,
        consumer: Arc<dyn LogConsumer>,
    ) -> Result<()>;

    /// Halt the named services.
    async fn stop(&self, project: &ComposeProject, services: &[String]) -> Result<()>;

    /// Force-remove the named services' stopped containers and volumes.
    async fn remove(&self, project: &ComposeProject, services: &[String]) -> Result<()>;
}

/// Arguments for the `up` invocation: replace containers for services in
/// scope and their dependencies, and remove orphans.
const UP_ARGS: [&str; 5] = [
    "up",
    "--detach",
    "--force-recreate",
    "--always-recreate-deps",
    "--remove-orphans",
];

/// Engine implementation backed by the `docker compose` CLI plugin.
pub struct DockerComposeEngine;

impl DockerComposeEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one `docker compose` invocation with the resolved project YAML
    /// piped over stdin.
    async fn run(&self, project: &ComposeProject, operation: &str, args: &[&str]) -> Result<()> {
        let yaml = project.to_yaml()?;

        debug!("docker compose -p {} {} {:?}", project.name(), operation, args);
        let mut child = Command::new("docker")
            .args(["compose", "-p", project.name(), "-f", "-"])
            .args(args)
            .current_dir(project.working_dir())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ConduitError::engine(operation, format!("failed to spawn docker: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConduitError::engine(operation, "stdin unavailable"))?;
        stdin
            .write_all(yaml.as_bytes())
            .await
            .map_err(|e| ConduitError::engine(operation, e.to_string()))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ConduitError::engine(operation, e.to_string()))?;
        if !output.status.success() {
            return Err(ConduitError::engine(
                operation,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }

    /// Follow every service's log stream, one task per service, forwarding
    /// lines to the consumer until the containers exit or the user
    /// interrupts.
    async fn follow_logs(&self, project: &ComposeProject, consumer: Arc<dyn LogConsumer>) {
        let yaml = match project.to_yaml() {
            Ok(yaml) => yaml,
            Err(e) => {
                warn!("Cannot attach to logs: {}", e);
                return;
            }
        };

        let mut tasks = JoinSet::new();
        for service in project.service_names() {
            let name = project.name().to_string();
            let working_dir = project.working_dir().to_path_buf();
            let yaml = yaml.clone();
            let consumer = Arc::clone(&consumer);
            tasks.spawn(async move {
                if let Err(e) = stream_service_logs(&name, &working_dir, &yaml, &service, consumer).await {
                    warn!("Log stream for {} ended: {}", service, e);
                }
            });
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tasks.abort_all();
            }
            _ = async {
                while tasks.join_next().await.is_some() {}
            } => {}
        }
    }
}

impl Default for DockerComposeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComposeEngine for DockerComposeEngine {
    async fn up(
        &self,
        project: &ComposeProject,
        options: UpOptions,
        consumer: Arc<dyn LogConsumer>,
    ) -> Result<()> {
        self.run(project, "up", &UP_ARGS).await?;

        if !options.detach {
            self.follow_logs(project, consumer).await;
        }
        Ok(())
    }

    async fn stop(&self, project: &ComposeProject, services: &[String]) -> Result<()> {
        let mut args = vec!["stop"];
        args.extend(services.iter().map(String::as_str));
        self.run(project, "stop", &args).await
    }

    async fn remove(&self, project: &ComposeProject, services: &[String]) -> Result<()> {
        // --stop halts running containers first, --volumes drops anonymous
        // volumes attached to them.
        let mut args = vec!["rm", "--force", "--stop", "--volumes"];
        args.extend(services.iter().map(String::as_str));
        self.run(project, "remove", &args).await
    }
}

/// Stream one service's logs to the consumer.
async fn stream_service_logs(
    project_name: &str,
    working_dir: &std::path::Path,
    yaml: &str,
    service: &str,
    consumer: Arc<dyn LogConsumer>,
) -> Result<()> {
    let operation = "logs";
    let mut child = Command::new("docker")
        .args(["compose", "-p", project_name, "-f", "-"])
        .args(["logs", "--follow", "--no-color", "--no-log-prefix", service])
        .current_dir(working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ConduitError::engine(operation, format!("failed to spawn docker: {}", e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ConduitError::engine(operation, "stdin unavailable"))?;
    stdin
        .write_all(yaml.as_bytes())
        .await
        .map_err(|e| ConduitError::engine(operation, e.to_string()))?;
    drop(stdin);

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ConduitError::engine(operation, "stdout unavailable"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ConduitError::engine(operation, "stderr unavailable"))?;

    let out_consumer = Arc::clone(&consumer);
    let out_service = service.to_string();
    let out_task = async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            out_consumer.log(&out_service, &line);
        }
    };

    let err_consumer = Arc::clone(&consumer);
    let err_service = service.to_string();
    let err_task = async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            err_consumer.err(&err_service, &line);
        }
    };

    tokio::join!(out_task, err_task);

    consumer.status(service, "stream closed");
    let _ = child.wait().await;
    Ok(())
}
