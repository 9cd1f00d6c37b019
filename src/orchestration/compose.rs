//! docker compose deployment commands

use super::ProcessCommand;
use crate::config::Settings;
use std::path::PathBuf;

/// Image tag used when no version is given
pub const LATEST: &str = "latest";

/// Builds `docker compose` invocations for one environment
///
/// The compose file reads the image tag from `DW_VERSION`, and each environment
/// runs as its own compose project.
#[derive(Debug, Clone)]
pub struct ComposeCommand {
    file: PathBuf,
    root: PathBuf,
    environment: String,
}

impl ComposeCommand {
    pub fn new(settings: &Settings, environment: Option<&str>) -> Self {
        Self {
            file: settings.root.join("docker-compose.yml"),
            root: settings.root.clone(),
            environment: environment.unwrap_or(&settings.environment).to_string(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn project_name(&self) -> String {
        format!("data-warehouse-{}", self.environment)
    }

    fn base(&self) -> ProcessCommand {
        ProcessCommand::new("docker")
            .arg("compose")
            .arg("-f")
            .path_arg(&self.file)
            .args(["-p", self.project_name().as_str()])
            .env("ENVIRONMENT", self.environment.as_str())
            .current_dir(&self.root)
    }

    pub fn up(&self, version: Option<&str>) -> ProcessCommand {
        self.base()
            .env("DW_VERSION", version.unwrap_or(LATEST))
            .args(["up", "-d", "--remove-orphans"])
    }

    pub fn status(&self) -> ProcessCommand {
        self.base().args(["ps", "--all"])
    }

    /// Pull new images then recreate the services
    pub fn upgrade(&self, version: Option<&str>) -> Vec<ProcessCommand> {
        let version = version.unwrap_or(LATEST);
        vec![
            self.base().env("DW_VERSION", version).arg("pull"),
            self.up(Some(version)),
        ]
    }

    pub fn rollback(&self, version: &str) -> ProcessCommand {
        self.up(Some(version))
    }
}
