//! `dw docs` helpers

use super::workflow::discovery;
use crate::config::Settings;
use crate::orchestration::{MkDocsCommand, ProcessRunner};
use crate::workflow::docs::write_markdown;
use eyre::Result;
use std::path::PathBuf;

pub async fn serve(settings: &Settings, host: &str, port: u16) -> Result<()> {
    log::info!("Serving documentation at http://{}:{} ...", host, port);
    ProcessRunner::new()
        .run(&MkDocsCommand::new(&settings.root).serve(host, port))
        .await
}

pub async fn build(settings: &Settings) -> Result<()> {
    log::info!("Building static documentation site ...");
    ProcessRunner::new()
        .run(&MkDocsCommand::new(&settings.root).build())
        .await?;
    log::info!("Documentation built successfully.");
    Ok(())
}

/// Generate the workflow reference page, defaulting to the MkDocs docs dir
pub fn workflows(settings: &Settings, output: Option<PathBuf>) -> Result<PathBuf> {
    let (definitions, errors) = discovery(settings).definitions()?;
    for (path, error) in &errors {
        log::warn!("Skipped {}: {}", path.display(), error);
    }
    let output = output.unwrap_or_else(|| MkDocsCommand::new(&settings.root).docs_dir());
    let path = write_markdown(&definitions, &output)?;
    log::info!("✓ Documented {} workflow(s) in {}", definitions.len(), path.display());
    Ok(path)
}
