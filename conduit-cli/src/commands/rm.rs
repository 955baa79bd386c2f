//! `conduit rm`: remove services' containers and volumes.

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
        .context("rm failed")?;

    let services = if services.is_empty() {
        conduit.project().service_names()
    } else {
        services
    };

    conduit.remove(&services).await.context("rm failed")?;
    super::success(&format!("Removed: {}", services.join(", ")));
    Ok(())
}
