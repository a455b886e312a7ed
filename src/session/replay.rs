use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use super::{DeviceSession, Driver};
use crate::models::{Device, Operation, OperationKind, Retrieval};
use crate::sink::file_tree::artifact_path;

/// ReplayDriver serves artifacts recorded by an earlier discovery run
/// (`facts/<host>/<getter>.json`, `configs/<host>/<slice>.txt`) instead of
/// contacting devices.
pub struct ReplayDriver {
    root: PathBuf,
}

impl ReplayDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Driver for ReplayDriver {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn open(&self, device: &Device) -> Result<Box<dyn DeviceSession>> {
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            bail!("Replay directory {} does not exist", self.root.display());
        }
        Ok(Box::new(ReplaySession {
            root: self.root.clone(),
            hostname: device.hostname.clone(),
        }))
    }
}

struct ReplaySession {
    root: PathBuf,
    hostname: String,
}

#[async_trait]
impl DeviceSession for ReplaySession {
    async fn retrieve(&mut self, operation: &Operation) -> Retrieval {
        let path = artifact_path(&self.root, &self.hostname, operation);

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Retrieval::Failed(format!("no recorded artifact at {}", path.display()));
            }
            Err(e) => return Retrieval::Failed(format!("Failed to read {}: {}", path.display(), e)),
        };

        match operation.kind {
            OperationKind::ConfigSlice => Retrieval::Success(serde_json::Value::String(text)),
            OperationKind::Getter => match serde_json::from_str(&text) {
                Ok(value) => Retrieval::Success(value),
                Err(e) => Retrieval::Failed(format!("Malformed artifact {}: {}", path.display(), e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credentials;
    use serde_json::json;

    fn device(name: &str) -> Device {
        Device {
            hostname: name.to_string(),
            address: name.to_string(),
            port: 22,
            platform_tag: "ios".to_string(),
            credentials: Credentials::default(),
        }
    }

    #[tokio::test]
    async fn test_replays_recorded_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("facts/r1")).unwrap();
        std::fs::create_dir_all(dir.path().join("configs/r1")).unwrap();
        std::fs::write(dir.path().join("facts/r1/facts.json"), r#"{"vendor": "Cisco"}"#).unwrap();
        std::fs::write(dir.path().join("configs/r1/running.txt"), "hostname r1\n").unwrap();

        let driver = ReplayDriver::new(dir.path());
        let mut session = tokio_test::assert_ok!(driver.open(&device("r1")).await);

        assert_eq!(
            session.retrieve(&Operation::getter("facts")).await,
            Retrieval::Success(json!({"vendor": "Cisco"}))
        );
        assert_eq!(
            session.retrieve(&Operation::config("running")).await,
            Retrieval::Success(json!("hostname r1\n"))
        );
    }

    #[tokio::test]
    async fn test_missing_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ReplayDriver::new(dir.path());
        let mut session = driver.open(&device("r1")).await.unwrap();

        let result = session.retrieve(&Operation::getter("users")).await;
        assert!(matches!(result, Retrieval::Failed(msg) if msg.contains("no recorded artifact")));
    }

    #[tokio::test]
    async fn test_malformed_json_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("facts/r1")).unwrap();
        std::fs::write(dir.path().join("facts/r1/interfaces.json"), "{not json").unwrap();

        let driver = ReplayDriver::new(dir.path());
        let mut session = driver.open(&device("r1")).await.unwrap();
        let result = session.retrieve(&Operation::getter("interfaces")).await;
        assert!(matches!(result, Retrieval::Failed(msg) if msg.contains("Malformed artifact")));
    }

    #[tokio::test]
    async fn test_missing_root_fails_open() {
        let driver = ReplayDriver::new("/nonexistent/netsurvey-replay");
        assert!(driver.open(&device("r1")).await.is_err());
    }
}
