use super::Workflow;
use crate::error::WarehouseError;
use eyre::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Workflows by id, with a domain index
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, Arc<dyn Workflow>>,
    domains: BTreeMap<String, BTreeSet<String>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a workflow, replacing any registered under the same id
    pub fn register(&mut self, workflow: Arc<dyn Workflow>) -> String {
        let id = workflow.id();
        let domain = workflow.config().domain.clone();

        if let Some(previous) = self.workflows.insert(id.clone(), workflow) {
            log::warn!("Workflow {} already registered, replacing it", id);
            let old_domain = previous.config().domain.clone();
            if old_domain != domain {
                self.remove_from_domain(&old_domain, &id);
            }
        }
        self.domains.entry(domain).or_default().insert(id.clone());
        log::debug!("Registered workflow {}", id);
        id
    }

    pub fn unregister(&mut self, id: &str) -> Option<Arc<dyn Workflow>> {
        let workflow = self.workflows.remove(id)?;
        let domain = workflow.config().domain.clone();
        self.remove_from_domain(&domain, id);
        log::debug!("Unregistered workflow {}", id);
        Some(workflow)
    }

    fn remove_from_domain(&mut self, domain: &str, id: &str) {
        if let Some(ids) = self.domains.get_mut(domain) {
            ids.remove(id);
            if ids.is_empty() {
                self.domains.remove(domain);
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Workflow>> {
        self.workflows
            .get(id)
            .cloned()
            .ok_or_else(|| WarehouseError::WorkflowNotFound(id.to_string()).into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.workflows.contains_key(id)
    }

    /// Workflows of one domain, ordered by id
    pub fn by_domain(&self, domain: &str) -> Vec<Arc<dyn Workflow>> {
        self.domains
            .get(domain)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.workflows.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workflows.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn domains(&self) -> Vec<String> {
        self.domains.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn clear(&mut self) {
        self.workflows.clear();
        self.domains.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::workflow::{WorkflowConfig, WorkflowContext};
    use async_trait::async_trait;
    use serde_json::json;

    /// Scripted workflow for registry and executor tests
    pub(crate) struct StubWorkflow {
        pub config: WorkflowConfig,
        pub records: usize,
        pub fail_in: Option<&'static str>,
    }

    impl StubWorkflow {
        pub fn new(domain: &str, name: &str) -> Self {
            Self {
                config: WorkflowConfig::new(name, domain).unwrap(),
                records: 3,
                fail_in: None,
            }
        }

        pub fn failing(mut self, step: &'static str) -> Self {
            self.fail_in = Some(step);
            self
        }

        pub fn disabled(mut self) -> Self {
            self.config.enabled = false;
            self
        }

        fn step(&self, name: &str) -> Result<()> {
            if self.fail_in == Some(name) {
                eyre::bail!("{} blew up", name);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Workflow for StubWorkflow {
        fn config(&self) -> &WorkflowConfig {
            &self.config
        }

        async fn extract(&self, ctx: &mut WorkflowContext) -> Result<()> {
            self.step("extract")?;
            ctx.records = (0..self.records).map(|i| json!({"id": i})).collect();
            Ok(())
        }

        async fn transform(&self, ctx: &mut WorkflowContext) -> Result<()> {
            self.step("transform")?;
            ctx.metadata
                .insert("transformed".into(), json!(ctx.records.len()));
            Ok(())
        }

        async fn load(&self, ctx: &mut WorkflowContext) -> Result<()> {
            self.step("load")?;
            ctx.loaded = std::mem::take(&mut ctx.records).len();
            Ok(())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = WorkflowRegistry::new();
        registry.register(Arc::new(StubWorkflow::new("crm", "customers")));
        registry.register(Arc::new(StubWorkflow::new("crm", "accounts")));
        registry.register(Arc::new(StubWorkflow::new("health", "glucose")));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.domains(), vec!["crm", "health"]);
        assert_eq!(
            registry.ids(),
            vec!["crm.accounts", "crm.customers", "health.glucose"]
        );
        let crm: Vec<String> = registry.by_domain("crm").iter().map(|w| w.id()).collect();
        assert_eq!(crm, vec!["crm.accounts", "crm.customers"]);
        assert!(registry.by_domain("finance").is_empty());
        assert_eq!(registry.get("health.glucose").unwrap().config().name, "glucose");
    }

    #[test]
    fn test_get_missing() {
        let registry = WorkflowRegistry::new();
        let err = registry.get("crm.nope").err().unwrap();
        assert!(matches!(
            err.downcast_ref::<WarehouseError>(),
            Some(WarehouseError::WorkflowNotFound(id)) if id == "crm.nope"
        ));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = WorkflowRegistry::new();
        registry.register(Arc::new(StubWorkflow::new("crm", "customers")));
        let mut replacement = StubWorkflow::new("crm", "customers");
        replacement.records = 7;
        registry.register(Arc::new(replacement));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.by_domain("crm").len(), 1);
    }

    #[test]
    fn test_unregister_cleans_domain() {
        let mut registry = WorkflowRegistry::new();
        registry.register(Arc::new(StubWorkflow::new("crm", "customers")));
        registry.register(Arc::new(StubWorkflow::new("health", "glucose")));

        assert!(registry.unregister("crm.customers").is_some());
        assert!(registry.unregister("crm.customers").is_none());
        assert_eq!(registry.domains(), vec!["health"]);
        assert!(!registry.contains("crm.customers"));
    }
}
