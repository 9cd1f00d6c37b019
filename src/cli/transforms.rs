//! `dw transforms` helpers, dbt runs as a child process

use super::monitor::log_dbt_results;
use crate::config::Settings;
use crate::orchestration::{DbtAction, DbtCommand, ProcessRunner};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use walkdir::WalkDir;

/// Model names found under `<dbt project>/models`
pub fn list_models(project_dir: &Path) -> Result<Vec<String>> {
    let models_dir = project_dir.join("models");
    if !models_dir.is_dir() {
        log::warn!("No dbt models directory at {}", models_dir.display());
        return Ok(Vec::new());
    }
    let mut models = Vec::new();
    for entry in WalkDir::new(&models_dir) {
        let entry = entry.with_context(|| format!("Failed to walk {}", models_dir.display()))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "sql")
            && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
        {
            models.push(stem.to_string());
        }
    }
    models.sort();
    Ok(models)
}

pub async fn run_models(settings: &Settings, model: Option<String>, full_refresh: bool) -> Result<()> {
    match &model {
        Some(model) => log::info!("Running transformation for model: {}", model.cyan()),
        None => log::info!("Running all transformations"),
    }
    if full_refresh {
        log::info!("Using full refresh mode");
    }
    let command = DbtCommand::new(DbtAction::Run, settings)
        .select(model)
        .full_refresh(full_refresh)
        .build();
    ProcessRunner::new().run(&command).await
}

/// Run dbt tests, optionally recording the results even when tests fail
pub async fn test_models(settings: &Settings, model: Option<String>, log_results: bool) -> Result<()> {
    match &model {
        Some(model) => log::info!("Running tests for model: {}", model.cyan()),
        None => log::info!("Running all tests"),
    }
    let dbt = DbtCommand::new(DbtAction::Test, settings).select(model);
    let outcome = ProcessRunner::new().run(&dbt.build()).await;

    if log_results {
        let summary = log_dbt_results(settings, Some(dbt.run_results_path()), None, None).await?;
        log::info!("Recorded {} test result(s)", summary.total);
    }
    outcome
}

/// Scaffold one dbt project per adapter plus a shared macros directory
///
/// Existing files are left alone. Returns the `profiles.yml` snippet to print.
pub fn init_dbt_projects(
    base_dir: &Path,
    postgres_name: &str,
    duckdb_name: &str,
    common_name: &str,
) -> Result<String> {
    for (project, adapter) in [(postgres_name, "postgres"), (duckdb_name, "duckdb")] {
        let project_dir = base_dir.join(project);
        create_dir(&project_dir)?;
        write_new(
            &project_dir.join("dbt_project.yml"),
            &format!(
                "name: '{project}'\nversion: '1.0.0'\nconfig-version: 2\nprofile: '{project}'\n\nmodel-paths: ['models']\nseed-paths: ['seeds']\nmacro-paths: ['macros']\ntest-paths: ['tests']\n"
            ),
        )?;
        for sub in ["models", "macros", "tests", "seeds", "snapshots", "analyses"] {
            std::fs::create_dir_all(project_dir.join(sub))?;
        }
        write_new(
            &project_dir.join("README.md"),
            &format!("# {}\n\ndbt project for {}.\n", project, adapter),
        )?;
    }

    let common_dir = base_dir.join(common_name);
    create_dir(&common_dir)?;
    write_new(
        &common_dir.join("README.md"),
        "# Shared dbt macros and tests\n\nPlace common macros and tests here. Symlink or copy into each dbt project as needed.\n",
    )?;

    Ok(format!(
        r#"{postgres_name}:
  target: dev
  outputs:
    dev:
      type: postgres
      host: localhost
      user: postgres
      password: yourpassword
      port: 5432
      dbname: data_warehouse
      schema: public
      threads: 4
      connect_timeout: 10
      sslmode: prefer

{duckdb_name}:
  target: dev
  outputs:
    dev:
      type: duckdb
      path: ./data_warehouse.duckdb
      threads: 4
      schema: main
"#
    ))
}

fn create_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        log::info!("Created directory: {}", dir.display().bright_black());
    }
    Ok(())
}

fn write_new(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Created {}", path.display().bright_black());
    Ok(())
}
