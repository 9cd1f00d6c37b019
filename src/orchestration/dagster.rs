use super::ProcessCommand;
use crate::config::Settings;
use eyre::{Context, Result};
use std::path::Path;

/// Dagster CLI invocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DagsterCommand {
    Ui {
        host: String,
        port: u16,
        reload: bool,
    },
    Daemon,
    Materialize {
        /// Empty selects every asset
        assets: Vec<String>,
        tags: Option<String>,
    },
    Run {
        job: String,
        tags: Option<String>,
        config: Option<String>,
    },
    ListAssets,
    ListJobs,
    ListSchedules,
    Wipe,
}

impl DagsterCommand {
    pub fn build(&self, settings: &Settings) -> ProcessCommand {
        let module = settings.dagster_module.as_str();
        let cmd = match self {
            Self::Ui { host, port, reload } => {
                let cmd = ProcessCommand::new("dagster")
                    .args(["dev", "-m", module, "--host", host.as_str()])
                    .arg("--port")
                    .arg(port.to_string());
                if *reload { cmd } else { cmd.arg("--no-reload") }
            }
            Self::Daemon => ProcessCommand::new("dagster-daemon").arg("run"),
            Self::Materialize { assets, tags } => {
                let selection = if assets.is_empty() {
                    "*".to_string()
                } else {
                    assets.join(",")
                };
                let cmd = ProcessCommand::new("dagster")
                    .args(["asset", "materialize", "-m", module, "--select"])
                    .arg(selection);
                with_optional(cmd, "--tags", tags)
            }
            Self::Run { job, tags, config } => {
                let cmd = ProcessCommand::new("dagster")
                    .args(["job", "execute", "-m", module, "-j", job.as_str()]);
                let cmd = with_optional(cmd, "--tags", tags);
                with_optional(cmd, "--config", config)
            }
            Self::ListAssets => ProcessCommand::new("dagster").args(["asset", "list", "-m", module]),
            Self::ListJobs => ProcessCommand::new("dagster").args(["job", "list", "-m", module]),
            Self::ListSchedules => {
                ProcessCommand::new("dagster").args(["schedule", "list", "-m", module])
            }
            Self::Wipe => ProcessCommand::new("dagster").args(["instance", "wipe", "--yes"]),
        };
        cmd.env("DAGSTER_HOME", settings.dagster_home.to_string_lossy())
            .current_dir(&settings.root)
    }
}

fn with_optional(cmd: ProcessCommand, flag: &str, value: &Option<String>) -> ProcessCommand {
    match value {
        Some(value) => cmd.arg(flag).arg(value.as_str()),
        None => cmd,
    }
}

/// Create `DAGSTER_HOME` and seed it with the project's `dagster.yaml`
///
/// Returns true when the file was copied. An existing instance config is never
/// overwritten.
pub fn prepare_dagster_home(settings: &Settings) -> Result<bool> {
    let home = &settings.dagster_home;
    std::fs::create_dir_all(home)
        .with_context(|| format!("Failed to create DAGSTER_HOME at {}", home.display()))?;

    let instance_config = home.join("dagster.yaml");
    if instance_config.exists() {
        return Ok(false);
    }
    let project_config = settings.root.join("dagster.yaml");
    if !project_config.exists() {
        log::warn!("No dagster.yaml found, using Dagster defaults");
        return Ok(false);
    }
    copy_config(&project_config, &instance_config)?;
    log::info!("Copied dagster.yaml into {}", home.display());
    Ok(true)
}

fn copy_config(from: &Path, to: &Path) -> Result<()> {
    std::fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}
