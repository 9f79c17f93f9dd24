use async_trait::async_trait;

use crate::services::BaselineModel;

/// Persistence for the shared anomaly baseline artifact. Implementations must
/// publish atomically so scoring never observes a partially written model.
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<BaselineModel>>;
    async fn save(&self, model: &BaselineModel) -> anyhow::Result<()>;
}
