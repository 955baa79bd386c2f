//! `conduit start`: bring an existing deployment up, merging in any newly
//! requested profiles.

use anyhow::{Context, Result};
use colored::Colorize;
use conduit_core::project::StartOptions;
use conduit_core::{Conduit, DockerComposeEngine};
use std::sync::Arc;

pub async fn run(profiles: Vec<String>, detach: bool) -> Result<()> {
    let profiles = super::sanitize_list(profiles);

    let start_dir = std::env::current_dir().context("cannot determine the current directory")?;
    let engine = Arc::new(DockerComposeEngine::new());
    let conduit = Conduit::from_project(engine, &start_dir, StartOptions { profiles, detach })
        .await
        .context("start failed")?;

    println!(
        "{} Starting {} ({})",
        "→".cyan().bold(),
        conduit.manifest().project_name.bold(),
        conduit.project().service_names().join(", ").dimmed()
    );

    conduit.up().await.context("start failed")?;
    super::success("Deployment is up");
    Ok(())
}
