//! `conduit setup`: bootstrap a fresh deployment and bring it up.

use anyhow::{Context, Result};
use colored::Colorize;
use conduit_core::project::BootstrapOptions;
use conduit_core::{Conduit, DockerComposeEngine};
use std::sync::Arc;

pub async fn run(
    profiles: Vec<String>,
    project_name: String,
    image_tag: String,
    ui_image_tag: String,
    mount_database: bool,
    detach: bool,
) -> Result<()> {
    let profiles = super::sanitize_list(profiles);

    println!(
        "{} Bootstrapping {} with profiles: {}",
        "→".cyan().bold(),
        project_name.bold(),
        if profiles.is_empty() {
            "(none)".dimmed().to_string()
        } else {
            profiles.join(", ").dimmed().to_string()
        }
    );

    let base_dir = std::env::current_dir().context("cannot determine the current directory")?;
    let engine = Arc::new(DockerComposeEngine::new());
    let conduit = Conduit::bootstrap(
        engine,
        &base_dir,
        BootstrapOptions {
            project_name,
            profiles,
            image_tag,
            ui_image_tag,
            mount_database,
            detach,
        },
    )
    .await
    .context("setup failed")?;

    super::success(&format!(
        "Project created at {}",
        conduit.root().display()
    ));

    conduit.up().await.context("setup failed")?;
    super::success("Deployment is up");
    Ok(())
}
