use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use backend_domain::{DbConfig, RuntimeConfig};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
    pub model_path: String,
    pub training_dataset_path: String,
    pub high_value_threshold: f64,
    pub burst_threshold: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            clickhouse_url: "http://127.0.0.1:8123".to_string(),
            clickhouse_database: "caseline".to_string(),
            clickhouse_user: None,
            clickhouse_password: None,
            model_path: "./models/anomaly_model.json".to_string(),
            training_dataset_path: "./training_dataset.json".to_string(),
            high_value_threshold: 10_000.0,
            burst_threshold: 10,
        }
    }
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var("CASELINE_CONFIG").unwrap_or_else(|_| "./config.toml".to_string());
        let file_path = Path::new(&path);
        let base_dir = file_path.parent();
        if !file_path.exists() {
            warn!("config.toml not found, using defaults");
            let mut config = AppConfig::default();
            config.apply_env_overrides();
            config.resolve_paths(base_dir);
            config.normalize();
            config.validate()?;
            return Ok(config);
        }
        let content = fs::read_to_string(file_path).await?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.resolve_paths(base_dir);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn normalize(&mut self) {
        if let Some(user) = &self.clickhouse_user {
            if user.trim().is_empty() {
                self.clickhouse_user = None;
            }
        }
        if let Some(password) = &self.clickhouse_password {
            if password.trim().is_empty() {
                self.clickhouse_password = None;
            }
        }
    }

    fn resolve_paths(&mut self, base_dir: Option<&Path>) {
        let Some(base) = base_dir else {
            return;
        };
        self.model_path = resolve_path(base, &self.model_path);
        self.training_dataset_path = resolve_path(base, &self.training_dataset_path);
    }

    pub fn validate(&self) -> Result<()> {
        if self.clickhouse_url.trim().is_empty() {
            return Err(anyhow!("clickhouse_url must not be empty"));
        }
        if self.clickhouse_database.trim().is_empty() {
            return Err(anyhow!("clickhouse_database must not be empty"));
        }
        if self.model_path.trim().is_empty() {
            return Err(anyhow!("model_path must not be empty"));
        }
        if self.high_value_threshold <= 0.0 {
            return Err(anyhow!("high_value_threshold must be greater than 0"));
        }
        if self.burst_threshold == 0 {
            return Err(anyhow!("burst_threshold must be greater than 0"));
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            model_path: self.model_path.clone(),
            training_dataset_path: self.training_dataset_path.clone(),
            high_value_threshold: self.high_value_threshold,
            burst_threshold: self.burst_threshold,
        }
    }

    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            clickhouse_url: self.clickhouse_url.clone(),
            clickhouse_database: self.clickhouse_database.clone(),
            clickhouse_user: self.clickhouse_user.clone(),
            clickhouse_password: self.clickhouse_password.clone(),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("CASELINE_CLICKHOUSE_URL") {
            self.clickhouse_url = value;
        }
        if let Ok(value) = env::var("CASELINE_CLICKHOUSE_DATABASE") {
            self.clickhouse_database = value;
        }
        if let Ok(value) = env::var("CASELINE_CLICKHOUSE_USER") {
            self.clickhouse_user = Some(value);
        }
        if let Ok(value) = env::var("CASELINE_CLICKHOUSE_PASSWORD") {
            self.clickhouse_password = Some(value);
        }
        if let Ok(value) = env::var("CASELINE_MODEL_PATH") {
            self.model_path = value;
        }
        if let Ok(value) = env::var("CASELINE_TRAINING_DATASET_PATH") {
            self.training_dataset_path = value;
        }
        if let Ok(value) = env::var("CASELINE_HIGH_VALUE_THRESHOLD") {
            self.high_value_threshold = value.parse().unwrap_or(self.high_value_threshold);
        }
        if let Ok(value) = env::var("CASELINE_BURST_THRESHOLD") {
            self.burst_threshold = value.parse().unwrap_or(self.burst_threshold);
        }
    }
}

fn resolve_path(base: &Path, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        trimmed.to_string()
    } else {
        base.join(path).to_string_lossy().to_string()
    }
}
