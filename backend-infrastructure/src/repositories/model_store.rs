use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use backend_domain::ports::ModelStore;
use backend_domain::services::BaselineModel;

/// File-backed store for the baseline artifact. Publishing writes a sibling
/// temp file first and renames it into place, so a concurrent load never
/// observes a partially written model.
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "model".to_string());
        name.push_str(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn load(&self) -> anyhow::Result<Option<BaselineModel>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read(&self.path).await?;
        let model: BaselineModel = serde_json::from_slice(&content)?;
        Ok(Some(model))
    }

    async fn save(&self, model: &BaselineModel) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_vec(model)?;
        let temp = self.temp_path();
        fs::write(&temp, content).await?;
        fs::rename(&temp, &self.path).await?;
        info!(path = %self.path.display(), version = %model.version, "model artifact published");
        Ok(())
    }
}

impl FileModelStore {
    pub fn path(&self) -> &Path {
        &self.path
    }
}
