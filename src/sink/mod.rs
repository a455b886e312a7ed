//! Result sinks.
//!
//! A sink receives every successful payload of a run and turns it into the
//! run's artifact: a multi-section workbook ([`TabularSink`]) or a directory
//! of per-device files ([`FileTreeSink`]).

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

use crate::models::{Device, Operation};

pub mod file_tree;
pub mod tabular;

pub use file_tree::FileTreeSink;
pub use tabular::TabularSink;

/// The sink has no representation for this payload. The collector records
/// the operation as NotImplemented rather than Failed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Unsupported(pub String);

/// Place of one (device, operation) pair in the processing order.
/// Devices are numbered across platform groups, so sorting by position
/// reproduces the sequential order no matter when a worker finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub device: usize,
    pub operation: usize,
}

impl Position {
    pub fn new(device: usize, operation: usize) -> Self {
        Self { device, operation }
    }
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Whether this sink persists the given operation; the collector only
    /// plans operations a sink accepts.
    fn accepts(&self, operation: &Operation) -> bool;

    async fn persist(
        &self,
        position: Position,
        device: &Device,
        operation: &Operation,
        payload: &Value,
    ) -> Result<()>;

    /// Flush buffered output. Returns the path of the produced document, if
    /// the sink produces a single one.
    async fn finalize(&self) -> Result<Option<PathBuf>>;
}
