//! Device sessions.
//!
//! A [`Driver`] opens one [`DeviceSession`] per device; the collector then
//! asks the session for each planned operation in turn. Sessions never raise
//! for ordinary conditions: every call comes back as a [`Retrieval`].

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Device, Operation, Retrieval};

pub mod commands;
pub mod replay;
pub mod ssh;

pub use replay::ReplayDriver;
pub use ssh::SshDriver;

/// Opens sessions to devices
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Connect to a device. An error here fails every operation planned for it.
    async fn open(&self, device: &Device) -> Result<Box<dyn DeviceSession>>;
}

/// An open connection to one device
#[async_trait]
pub trait DeviceSession: Send {
    async fn retrieve(&mut self, operation: &Operation) -> Retrieval;

    /// Release the connection; called once after the last operation
    async fn close(&mut self) {}
}
