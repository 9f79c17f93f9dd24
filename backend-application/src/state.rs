use std::sync::Arc;

use backend_domain::ports::{
    AnomalyRepository, CaseRepository, EventRepository, FindingRepository, GraphRepository,
    ModelStore, RiskRepository,
};
use backend_domain::services::BaselineModel;
use backend_domain::RuntimeConfig;
use tokio::sync::{Mutex, RwLock};

use crate::Metrics;

/// Versioned handle to the shared baseline model: scoring clones the inner
/// Arc snapshot, training publishes a replacement atomically.
pub type BaselineHandle = Arc<RwLock<Option<Arc<BaselineModel>>>>;

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub case_repo: Arc<dyn CaseRepository>,
    pub event_repo: Arc<dyn EventRepository>,
    pub finding_repo: Arc<dyn FindingRepository>,
    pub anomaly_repo: Arc<dyn AnomalyRepository>,
    pub graph_repo: Arc<dyn GraphRepository>,
    pub risk_repo: Arc<dyn RiskRepository>,
    pub model_store: Arc<dyn ModelStore>,
    pub baseline: BaselineHandle,
    pub training_lock: Arc<Mutex<()>>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Current baseline snapshot, if any; never blocks on training.
    pub async fn baseline_snapshot(&self) -> Option<Arc<BaselineModel>> {
        self.baseline.read().await.clone()
    }
}
