//! `dw dagster` helpers

use super::confirm;
use crate::config::Settings;
use crate::error::WarehouseError;
use crate::orchestration::{DagsterCommand, ProcessRunner, prepare_dagster_home};
use eyre::Result;
use owo_colors::OwoColorize;

/// Build the materialize command, requiring assets or `--all`
pub fn materialize_command(
    assets: Vec<String>,
    all: bool,
    tags: Option<String>,
) -> Result<DagsterCommand> {
    if assets.is_empty() && !all {
        return Err(WarehouseError::Configuration(
            "You must specify asset names or use --all to materialize all assets".to_string(),
        )
        .into());
    }
    let assets = if all { Vec::new() } else { assets };
    Ok(DagsterCommand::Materialize { assets, tags })
}

/// Run a Dagster command with `DAGSTER_HOME` prepared
pub async fn run_dagster(settings: &Settings, command: DagsterCommand, assume_yes: bool) -> Result<()> {
    match &command {
        DagsterCommand::Ui { host, port, .. } => {
            log::info!("Starting Dagster UI server on {}", format!("http://{}:{}", host, port).cyan());
        }
        DagsterCommand::Daemon => {
            prepare_dagster_home(settings)?;
            log::info!("Starting Dagster daemon process");
        }
        DagsterCommand::Materialize { assets, .. } => {
            let label = if assets.is_empty() {
                "all".to_string()
            } else {
                assets.join(", ")
            };
            log::info!("Materializing {} assets...", label);
        }
        DagsterCommand::Run { job, .. } => log::info!("Executing job: {}", job.cyan()),
        DagsterCommand::Wipe => {
            if !confirm(
                "This will delete all Dagster run history and cannot be undone. Are you sure?",
                assume_yes,
            )? {
                log::warn!("Wipe cancelled");
                return Ok(());
            }
        }
        DagsterCommand::ListAssets | DagsterCommand::ListJobs | DagsterCommand::ListSchedules => {}
    }

    std::fs::create_dir_all(&settings.dagster_home)?;
    ProcessRunner::new().run(&command.build(settings)).await?;

    match command {
        DagsterCommand::Materialize { .. } => log::info!("{}", "Successfully materialized assets".green()),
        DagsterCommand::Run { job, .. } => {
            log::info!("{} {}", "Successfully executed job:".green(), job)
        }
        DagsterCommand::Wipe => log::info!("{}", "Successfully wiped Dagster storage.".green()),
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_requires_selection() {
        let err = materialize_command(vec![], false, None).unwrap_err();
        assert_eq!(crate::error::exit_code(&err), 2);

        assert_eq!(
            materialize_command(vec!["raw_sales".into()], true, None).unwrap(),
            DagsterCommand::Materialize {
                assets: vec![],
                tags: None
            }
        );
    }
}
