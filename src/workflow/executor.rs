use super::{Workflow, WorkflowContext, WorkflowMonitor, WorkflowRegistry, WorkflowStatus};
use crate::error::WarehouseError;
use eyre::Result;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Runs registered workflows and reports every transition to the monitor
pub struct WorkflowExecutor {
    registry: Arc<RwLock<WorkflowRegistry>>,
    monitor: Arc<WorkflowMonitor>,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<RwLock<WorkflowRegistry>>, monitor: Arc<WorkflowMonitor>) -> Self {
        Self { registry, monitor }
    }

    pub fn registry(&self) -> &Arc<RwLock<WorkflowRegistry>> {
        &self.registry
    }

    pub fn monitor(&self) -> &Arc<WorkflowMonitor> {
        &self.monitor
    }

    /// Run one workflow by id
    pub async fn execute(&self, workflow_id: &str) -> Result<WorkflowContext> {
        let workflow = self.registry.read().await.get(workflow_id)?;
        self.run(workflow, Map::new()).await
    }

    /// Run one workflow with run parameters in its context
    pub async fn execute_with(
        &self,
        workflow_id: &str,
        config: Map<String, Value>,
    ) -> Result<WorkflowContext> {
        let workflow = self.registry.read().await.get(workflow_id)?;
        self.run(workflow, config).await
    }

    /// Run every workflow in a domain
    ///
    /// A failing or disabled workflow maps to `None` and the rest still run.
    pub async fn execute_domain(&self, domain: &str) -> BTreeMap<String, Option<WorkflowContext>> {
        let workflows = self.registry.read().await.by_domain(domain);
        if workflows.is_empty() {
            log::warn!("No workflows registered for domain '{}'", domain);
        }

        let mut results = BTreeMap::new();
        for workflow in workflows {
            let id = workflow.id();
            match self.run(workflow, Map::new()).await {
                Ok(ctx) => {
                    results.insert(id, Some(ctx));
                }
                Err(e) => {
                    log::error!("{:#}", e);
                    results.insert(id, None);
                }
            }
        }
        results
    }

    async fn run(
        &self,
        workflow: Arc<dyn Workflow>,
        config: Map<String, Value>,
    ) -> Result<WorkflowContext> {
        let id = workflow.id();

        if !workflow.config().enabled {
            log::info!("Skipping disabled workflow {}", id);
            self.monitor
                .record(&id, WorkflowStatus::Cancelled, meta("reason", json!("disabled")));
            return Err(WarehouseError::Workflow(format!("workflow {} is disabled", id)).into());
        }

        log::info!("Running workflow {}", id);
        self.monitor.record(&id, WorkflowStatus::Running, Map::new());
        let started = Instant::now();
        let mut ctx = WorkflowContext::new(&id).with_config(config);

        if let Err((step, e)) = run_steps(workflow.as_ref(), &mut ctx).await {
            let message = format!("workflow {} failed during {}: {:#}", id, step, e);
            let mut details = meta("error", json!(format!("{:#}", e)));
            details.insert("step".into(), json!(step));
            self.monitor.record(&id, WorkflowStatus::Failed, details);
            return Err(WarehouseError::Workflow(message).into());
        }

        let elapsed = started.elapsed();
        let mut details = meta("loaded", json!(ctx.loaded));
        details.insert("elapsed_ms".into(), json!(elapsed.as_millis() as u64));
        self.monitor.record(&id, WorkflowStatus::Completed, details);
        log::info!(
            "Workflow {} completed: {} records loaded in {:.2?}",
            id,
            ctx.loaded,
            elapsed
        );
        Ok(ctx)
    }
}

async fn run_steps(
    workflow: &dyn Workflow,
    ctx: &mut WorkflowContext,
) -> std::result::Result<(), (&'static str, eyre::Report)> {
    workflow.extract(ctx).await.map_err(|e| ("extract", e))?;
    workflow.transform(ctx).await.map_err(|e| ("transform", e))?;
    workflow.load(ctx).await.map_err(|e| ("load", e))?;
    Ok(())
}

fn meta(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}
