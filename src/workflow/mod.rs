//! Declarative workflows
//!
//! A workflow is one extract, transform, load unit identified as
//! `domain.name`. Definitions are YAML files discovered on disk
//! ([`WorkflowDiscovery`]), held in a [`WorkflowRegistry`] and run by a
//! [`WorkflowExecutor`] that reports every transition to a [`WorkflowMonitor`].

mod base;
mod config;
mod context;
pub mod definition;
pub mod discovery;
pub mod docs;
mod executor;
pub mod monitor;
mod registry;
mod status;
mod validator;
mod watcher;

pub use base::Workflow;
pub use config::WorkflowConfig;
pub use context::WorkflowContext;
pub use definition::{DefinedWorkflow, WorkflowDefinition, WorkflowResources};
pub use discovery::{DiscoveryReport, LocatedDefinition, WorkflowDiscovery};
pub use executor::WorkflowExecutor;
pub use monitor::{ExecutionEvent, WorkflowMonitor, read_history};
pub use registry::WorkflowRegistry;
pub use status::WorkflowStatus;
pub use validator::WorkflowValidator;
pub use watcher::WorkflowWatcher;
