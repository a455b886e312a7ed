use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{Position, ResultSink};
use crate::models::{Device, Operation, OperationKind};
use crate::utils::safe_path_component;

pub const FACTS_DIR: &str = "facts";
pub const CONFIGS_DIR: &str = "configs";

/// Where the artifact of one operation lives under `root`:
/// `facts/<host>/<getter>.json` or `configs/<host>/<slice>.txt`
pub fn artifact_path(root: &Path, hostname: &str, operation: &Operation) -> PathBuf {
    let (category, ext) = match operation.kind {
        OperationKind::Getter => (FACTS_DIR, "json"),
        OperationKind::ConfigSlice => (CONFIGS_DIR, "txt"),
    };
    root.join(category)
        .join(safe_path_component(hostname))
        .join(format!("{}.{}", safe_path_component(operation.name), ext))
}

/// FileTreeSink writes one file per (device, operation)
pub struct FileTreeSink {
    root: PathBuf,
}

impl FileTreeSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write `content` to the artifact path, creating directories on demand.
    /// An existing file is replaced.
    pub async fn write_artifact(&self, hostname: &str, operation: &Operation, content: &str) -> Result<PathBuf> {
        let path = artifact_path(&self.root, hostname, operation);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[async_trait]
impl ResultSink for FileTreeSink {
    fn accepts(&self, _operation: &Operation) -> bool {
        true
    }

    async fn persist(
        &self,
        _position: Position,
        device: &Device,
        operation: &Operation,
        payload: &Value,
    ) -> Result<()> {
        let content = match (operation.kind, payload) {
            (OperationKind::ConfigSlice, Value::String(text)) => text.clone(),
            (OperationKind::ConfigSlice, other) => other.to_string(),
            (OperationKind::Getter, value) => serde_json::to_string_pretty(value)?,
        };
        let path = self.write_artifact(&device.hostname, operation, &content).await?;
        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn finalize(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}
