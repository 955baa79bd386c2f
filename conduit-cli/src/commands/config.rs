//! `conduit config`: print the resolved compose document.

use anyhow::{Context, Result};
use conduit_core::project::StartOptions;
use conduit_core::{Conduit, DockerComposeEngine};
use std::sync::Arc;

pub async fn run() -> Result<()> {
    let start_dir = std::env::current_dir().context("cannot determine the current directory")?;
    let engine = Arc::new(DockerComposeEngine::new());
    let conduit = Conduit::from_project(engine, &start_dir, StartOptions { detach: true, ..Default::default() })
        .await
        .context("config failed")?;

    print!("{}", conduit.config()?);
    Ok(())
}
