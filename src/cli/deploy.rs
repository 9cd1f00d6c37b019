//! `dw deploy` helpers, docker compose runs as a child process

use super::confirm;
use crate::config::Settings;
use crate::orchestration::{ComposeCommand, ProcessRunner};
use clap::ValueEnum;
use eyre::Result;
use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeployEnvironment {
    Development,
    Testing,
    Production,
}

impl DeployEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }
}

fn compose(settings: &Settings, environment: Option<DeployEnvironment>) -> ComposeCommand {
    ComposeCommand::new(settings, environment.map(|e| e.as_str()))
}

pub async fn init(settings: &Settings, environment: DeployEnvironment) -> Result<()> {
    let compose = compose(settings, Some(environment));
    log::info!("Initializing deployment for {} environment...", compose.environment().cyan());
    ProcessRunner::new().run(&compose.up(None)).await?;
    log::info!("{}", "Deployment initialized".green());
    Ok(())
}

pub async fn status(settings: &Settings, environment: Option<DeployEnvironment>) -> Result<()> {
    let compose = compose(settings, environment);
    log::info!("Checking deployment status for {} environment...", compose.environment().cyan());
    ProcessRunner::new().run(&compose.status()).await
}

pub async fn upgrade(
    settings: &Settings,
    environment: Option<DeployEnvironment>,
    version: Option<String>,
) -> Result<()> {
    let compose = compose(settings, environment);
    log::info!(
        "Upgrading deployment in {} environment to version {}...",
        compose.environment().cyan(),
        version.as_deref().unwrap_or("latest").cyan()
    );
    let runner = ProcessRunner::new();
    for step in compose.upgrade(version.as_deref()) {
        runner.run(&step).await?;
    }
    log::info!("{}", "Upgrade complete".green());
    Ok(())
}

/// Production rollbacks ask for confirmation
pub async fn rollback(
    settings: &Settings,
    version: &str,
    environment: Option<DeployEnvironment>,
    assume_yes: bool,
) -> Result<()> {
    let compose = compose(settings, environment);
    log::info!(
        "Rolling back deployment in {} environment to version {}...",
        compose.environment().cyan(),
        version.cyan()
    );
    if compose.environment() == DeployEnvironment::Production.as_str()
        && !confirm("Rollback in production environment. Are you sure?", assume_yes)?
    {
        log::warn!("Rollback cancelled.");
        return Ok(());
    }
    ProcessRunner::new().run(&compose.rollback(version)).await?;
    log::info!("{}", "Rollback complete".green());
    Ok(())
}
