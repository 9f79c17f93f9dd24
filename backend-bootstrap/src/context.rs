use std::sync::Arc;

use anyhow::Result;
use clickhouse::Client;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use backend_application::{AppState, Metrics};
use backend_domain::ports::{EventRepository, ModelStore};
use backend_infrastructure::{AppConfig, ClickhouseRepo, FileModelStore};

pub struct AppContext {
    pub state: AppState,
}

impl AppContext {
    pub async fn new() -> Result<Self> {
        let config = AppConfig::load().await?;
        let runtime_config = config.to_runtime_config();
        let db_config = config.to_db_config();

        let mut clickhouse = Client::default()
            .with_url(&db_config.clickhouse_url)
            .with_database(&db_config.clickhouse_database);
        if let Some(user) = &db_config.clickhouse_user {
            clickhouse = clickhouse.with_user(user);
        }
        if let Some(password) = &db_config.clickhouse_password {
            clickhouse = clickhouse.with_password(password);
        }

        let repo = Arc::new(ClickhouseRepo::new(
            clickhouse,
            db_config.clickhouse_database.clone(),
        ));
        repo.ensure_schema().await?;

        let model_store = Arc::new(FileModelStore::new(runtime_config.model_path.clone()));
        // A corrupt artifact is reported and scoring runs in ephemeral
        // fallback mode; a missing one is simply absent.
        let baseline = match model_store.load().await {
            Ok(model) => model.map(Arc::new),
            Err(err) => {
                warn!("failed to load baseline model: {}", err);
                None
            }
        };

        let state = AppState {
            config: runtime_config,
            case_repo: repo.clone(),
            event_repo: repo.clone(),
            finding_repo: repo.clone(),
            anomaly_repo: repo.clone(),
            graph_repo: repo.clone(),
            risk_repo: repo,
            model_store,
            baseline: Arc::new(RwLock::new(baseline)),
            training_lock: Arc::new(Mutex::new(())),
            metrics: Arc::new(Metrics::default()),
        };

        Ok(Self { state })
    }
}
