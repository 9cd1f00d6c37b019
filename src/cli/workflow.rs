//! `dw workflow` helpers

use crate::config::Settings;
use crate::error::WarehouseError;
use crate::workflow::{
    DiscoveryReport, WorkflowContext, WorkflowDiscovery, WorkflowExecutor, WorkflowMonitor,
    WorkflowRegistry, WorkflowResources, WorkflowValidator, WorkflowWatcher,
};
use eyre::Result;
use owo_colors::OwoColorize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Discovery over the configured workflows directory
pub fn discovery(settings: &Settings) -> WorkflowDiscovery {
    let resources = Arc::new(WorkflowResources::new(settings.clone()));
    WorkflowDiscovery::new(&settings.workflows_dir, resources)
}

fn report_errors(report: &DiscoveryReport) {
    for (path, error) in &report.errors {
        log::warn!("Skipped {}: {}", path.display().bright_black(), error);
    }
}

/// Discover and register every workflow definition
pub fn load_registry(settings: &Settings) -> Result<(WorkflowDiscovery, WorkflowRegistry)> {
    let mut discovery = discovery(settings);
    let mut registry = WorkflowRegistry::new();
    let report = discovery.discover(&mut registry)?;
    report_errors(&report);
    log::debug!(
        "Loaded {} workflow(s) from {}",
        registry.len(),
        settings.workflows_dir.display()
    );
    Ok((discovery, registry))
}

fn executor(settings: &Settings, registry: WorkflowRegistry) -> WorkflowExecutor {
    WorkflowExecutor::new(
        Arc::new(RwLock::new(registry)),
        Arc::new(WorkflowMonitor::persistent(settings.workflow_runs_path())),
    )
}

pub fn list_workflows(settings: &Settings) -> Result<usize> {
    let (_, registry) = load_registry(settings)?;
    if registry.is_empty() {
        println!("No workflows found in {}", settings.workflows_dir.display());
        return Ok(0);
    }

    for domain in registry.domains() {
        println!("{}", domain.bold());
        for workflow in registry.by_domain(&domain) {
            let config = workflow.config();
            let state = if config.enabled {
                "enabled".green().to_string()
            } else {
                "disabled".yellow().to_string()
            };
            println!(
                "  {:<36} {:<8} {:<10} {}",
                workflow.id().cyan(),
                config.version,
                state,
                config.description.bright_black()
            );
        }
    }
    Ok(registry.len())
}

/// Check every definition file, failing if any is invalid
pub fn validate_workflows(settings: &Settings) -> Result<usize> {
    let (definitions, parse_errors) = discovery(settings).definitions()?;
    let mut invalid = parse_errors.len();

    for (path, error) in &parse_errors {
        println!("{} {}: {}", "✗".red(), path.display(), error);
    }
    for located in &definitions {
        let problems = WorkflowValidator::problems(&located.definition);
        if problems.is_empty() {
            println!(
                "{} {}.{}",
                "✓".green(),
                located.domain(),
                located.definition.name.to_lowercase()
            );
        } else {
            invalid += 1;
            println!("{} {}", "✗".red(), located.path.display());
            for problem in problems {
                println!("    {}", problem.bright_black());
            }
        }
    }

    if invalid > 0 {
        return Err(WarehouseError::Validation(format!(
            "{} of {} workflow definition(s) are invalid",
            invalid,
            definitions.len() + parse_errors.len()
        ))
        .into());
    }
    Ok(definitions.len())
}

pub async fn run_workflow(settings: &Settings, workflow_id: &str) -> Result<WorkflowContext> {
    let (_, registry) = load_registry(settings)?;
    let ctx = executor(settings, registry).execute(workflow_id).await?;
    log::info!("✓ {} loaded {} record(s)", workflow_id, ctx.loaded);
    Ok(ctx)
}

/// Run a whole domain, failing afterwards if any workflow failed
pub async fn run_domain(
    settings: &Settings,
    domain: &str,
) -> Result<BTreeMap<String, Option<WorkflowContext>>> {
    let (_, registry) = load_registry(settings)?;
    if registry.by_domain(domain).is_empty() {
        return Err(WarehouseError::WorkflowNotFound(format!("no workflows in domain '{}'", domain)).into());
    }
    let results = executor(settings, registry).execute_domain(domain).await;

    for (id, ctx) in &results {
        match ctx {
            Some(ctx) => println!("{} {} ({} loaded)", "✓".green(), id, ctx.loaded),
            None => println!("{} {}", "✗".red(), id),
        }
    }
    let failed = results.values().filter(|ctx| ctx.is_none()).count();
    if failed > 0 {
        return Err(WarehouseError::Workflow(format!(
            "{} of {} workflow(s) in '{}' did not complete",
            failed,
            results.len(),
            domain
        ))
        .into());
    }
    Ok(results)
}

/// Reload definitions on change until Ctrl-C
pub async fn watch_workflows(settings: &Settings, interval: Duration) -> Result<()> {
    let (discovery, registry) = load_registry(settings)?;
    log::info!("{} workflow(s) registered", registry.len());

    let registry = Arc::new(RwLock::new(registry));
    let watcher = WorkflowWatcher::new(discovery, registry, interval);
    let (stop_tx, stop_rx) = watch::channel(false);

    let handle = tokio::spawn(watcher.run(stop_rx, |report: &DiscoveryReport| {
        for id in &report.registered {
            log::info!("  {} {}", "+".green(), id);
        }
        for id in &report.removed {
            log::info!("  {} {}", "-".red(), id);
        }
        report_errors(report);
    }));

    tokio::signal::ctrl_c().await?;
    log::info!("Stopping workflow watcher...");
    let _ = stop_tx.send(true);
    handle
        .await
        .map_err(|e| WarehouseError::Workflow(format!("watcher task failed: {}", e)))?
}
