use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::app::App;

/// Serve the REST API on the configured address until ctrl-c
pub fn run(app: App, port: Option<u16>, public_dir: Option<PathBuf>) -> Result<()> {
    let mut config = app.config;
    if let Some(port) = port {
        config.port = port;
    }
    if public_dir.is_some() {
        config.public_dir = public_dir;
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    runtime.block_on(flashcards_lib::serve(&config, app.storage))
}
