//! `conduit stop`: halt services of the current deployment.

use anyhow::{Context, Result};
use conduit_core::project::StartOptions;
use conduit_core::{Conduit, DockerComposeEngine};
use std::sync::Arc;

pub async fn run(services: Vec<String>) -> Result<()> {
    let services = super::sanitize_list(services);

    let start_dir = std::env::current_dir().context("cannot determine the current directory")?;
    let engine = Arc::new(DockerComposeEngine::new());
    let conduit = Conduit::from_project(engine, &start_dir, StartOptions { detach: true, ..Default::default() })
        .await
        .context("stop failed")?;

    let services = if services.is_empty() {
        conduit.project().service_names()
    } else {
        services
    };

    conduit.stop(&services).await.context("stop failed")?;
    super::success(&format!("Stopped: {}", services.join(", ")));
    Ok(())
}
