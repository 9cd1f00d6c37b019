use crate::etl::Record;
use serde_json::{Map, Value};

/// State carried through one workflow execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowContext {
    pub workflow_id: String,
    /// Run parameters
    pub config: Map<String, Value>,
    /// Free-form values produced by the steps
    pub data: Map<String, Value>,
    /// Records moving from extract to load
    pub records: Vec<Record>,
    pub metadata: Map<String, Value>,
    /// Rows written by the load step
    pub loaded: usize,
}

impl WorkflowContext {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            ..Default::default()
        }
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    pub fn update_data(&mut self, data: Map<String, Value>) {
        self.data.extend(data);
    }

    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}
