use super::{WorkflowConfig, WorkflowContext};
use async_trait::async_trait;
use eyre::Result;

/// A named extract, transform, load unit
///
/// The executor calls the three steps in order on one [`WorkflowContext`].
#[async_trait]
pub trait Workflow: Send + Sync {
    fn config(&self) -> &WorkflowConfig;

    /// `domain.name`
    fn id(&self) -> String {
        self.config().id()
    }

    async fn extract(&self, ctx: &mut WorkflowContext) -> Result<()>;

    async fn transform(&self, ctx: &mut WorkflowContext) -> Result<()>;

    async fn load(&self, ctx: &mut WorkflowContext) -> Result<()>;
}
