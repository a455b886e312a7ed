use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{commands, DeviceSession, Driver};
use crate::models::{Device, Operation, Platform, Retrieval};

/// SshDriver runs vendor CLI commands over SSH (ssh2/libssh2)
pub struct SshDriver {
    timeout_secs: u64,
}

impl SshDriver {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl Driver for SshDriver {
    fn name(&self) -> &'static str {
        "ssh"
    }

    async fn open(&self, device: &Device) -> Result<Box<dyn DeviceSession>> {
        let platform = device
            .platform()
            .ok_or_else(|| anyhow!("No driver for platform '{}'", device.platform_tag))?;

        let host = device.address.clone();
        let port = device.port;
        let user = device.credentials.username.clone();
        let pass = device.credentials.password.clone();
        let timeout_secs = self.timeout_secs;

        tracing::debug!("Connecting to {} ({}:{}) as {}", device.hostname, host, port, user);

        let session = tokio::task::spawn_blocking(move || {
            crate::utils::ssh_connect(&host, port, &user, &pass, timeout_secs)
        })
        .await
        .map_err(|e| anyhow!("Task join error: {}", e))?
        .map_err(|e| anyhow!(e))?;

        Ok(Box::new(SshSession {
            hostname: device.hostname.clone(),
            platform,
            session,
        }))
    }
}

/// One authenticated SSH connection, reused for every operation on the device
struct SshSession {
    hostname: String,
    platform: Platform,
    session: ssh2::Session,
}

#[async_trait]
impl DeviceSession for SshSession {
    async fn retrieve(&mut self, operation: &Operation) -> Retrieval {
        let Some(command) = commands::command_for(self.platform, operation) else {
            return Retrieval::NotImplemented(format!(
                "{} is not available on {}",
                operation, self.platform
            ));
        };

        let session = self.session.clone();
        let result = tokio::task::spawn_blocking(move || crate::utils::ssh_exec(&session, command)).await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Retrieval::Failed(e),
            Err(e) => return Retrieval::Failed(format!("Task join error: {}", e)),
        };

        if crate::utils::is_cli_rejection(&output) {
            tracing::debug!("{} rejected '{}': {}", self.hostname, command, output.trim());
            return Retrieval::NotImplemented(format!("device rejected '{}'", command));
        }

        Retrieval::Success(commands::normalize(self.platform, operation, command, &output))
    }

    async fn close(&mut self) {
        let session = self.session.clone();
        let _ = tokio::task::spawn_blocking(move || session.disconnect(None, "collection complete", None)).await;
    }
}
