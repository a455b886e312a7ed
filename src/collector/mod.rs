//! Collection orchestrator.
//!
//! Walks the inventory platform group by platform group in a fixed sequence.
//! Devices of a group are driven concurrently through a bounded pool, each on
//! its own session with its operations run one after another. Results are
//! consumed in inventory order, so sink rows and run log lines come out the
//! same as a sequential run would produce them.

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::inventory::Inventory;
use crate::models::{Device, Operation, Outcome, OutcomeStatus, Retrieval, RunSummary};
use crate::runlog::RunLog;
use crate::session::Driver;
use crate::sink::{Position, ResultSink, Unsupported};

pub const DEFAULT_WORKERS: usize = 10;

/// What a finished (or interrupted) run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    /// One entry per attempted (device, operation), in processing order
    pub outcomes: Vec<Outcome>,
    /// Devices left out because their platform tag has no catalog entry
    pub skipped: Vec<String>,
    pub interrupted: bool,
    /// Document written by the sink, if it produces one
    pub artifact: Option<PathBuf>,
    /// Set when the sink could not write its final output
    pub output_error: Option<String>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.summary.fail_count > 0 || self.output_error.is_some()
    }
}

struct PlannedDevice {
    position: usize,
    device: Device,
    operations: Vec<Operation>,
}

struct DeviceResult {
    planned: PlannedDevice,
    retrievals: Vec<(Operation, Retrieval)>,
}

pub struct Collector {
    catalog: Catalog,
    driver: Arc<dyn Driver>,
    sink: Arc<dyn ResultSink>,
    log: Arc<RunLog>,
    num_workers: usize,
}

impl Collector {
    pub fn new(catalog: Catalog, driver: Arc<dyn Driver>, sink: Arc<dyn ResultSink>, log: Arc<RunLog>) -> Self {
        Self {
            catalog,
            driver,
            sink,
            log,
            num_workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    /// Run to completion
    pub async fn run(&self, inventory: &Inventory) -> RunReport {
        self.run_until(inventory, std::future::pending()).await
    }

    /// Run until done or until `shutdown` resolves. On shutdown, devices not
    /// yet consumed are dropped and the log gets an interruption marker plus
    /// the summary of what completed.
    pub async fn run_until<F>(&self, inventory: &Inventory, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let started = chrono::Local::now();
        self.log.run_started(started);
        tracing::info!(
            "Collecting from {} devices with {} workers via {} driver",
            inventory.len(),
            self.num_workers,
            self.driver.name()
        );

        let mut report = RunReport {
            summary: RunSummary::default(),
            outcomes: Vec::new(),
            skipped: Vec::new(),
            interrupted: false,
            artifact: None,
            output_error: None,
        };

        for device in inventory.devices() {
            if self.catalog.entry_for_tag(&device.platform_tag).is_none() {
                self.log.device_skipped(device);
                report.skipped.push(device.hostname.clone());
            }
        }

        tokio::pin!(shutdown);
        let mut next_position = 0;

        'groups: for platform in self.catalog.platforms() {
            let Some(entry) = self.catalog.entry(platform) else {
                continue;
            };
            let planned_ops: Vec<Operation> = entry
                .operations()
                .into_iter()
                .filter(|op| self.sink.accepts(op))
                .collect();

            let group: Vec<PlannedDevice> = inventory
                .devices()
                .iter()
                .filter(|d| d.platform() == Some(platform))
                .map(|device| {
                    let planned = PlannedDevice {
                        position: next_position,
                        device: device.clone(),
                        operations: planned_ops.clone(),
                    };
                    next_position += 1;
                    planned
                })
                .collect();

            if group.is_empty() {
                continue;
            }
            self.log.platform_started(platform, group.len());

            let mut results = stream::iter(group)
                .map(|planned| self.collect_device(planned))
                .buffered(self.num_workers);

            loop {
                tokio::select! {
                    next = results.next() => match next {
                        Some(result) => self.record_device(result, &mut report).await,
                        None => break,
                    },
                    _ = &mut shutdown => {
                        report.interrupted = true;
                        break 'groups;
                    }
                }
            }
        }

        if report.interrupted {
            self.log.interrupted();
        }

        match self.sink.finalize().await {
            Ok(Some(path)) => {
                self.log.artifact(&path);
                report.artifact = Some(path);
            }
            Ok(None) => {}
            Err(e) => {
                let message = format!("{:#}", e);
                self.log.line(&format!("FAILED : writing output - {}", message));
                report.output_error = Some(message);
            }
        }

        self.log.summary(&report.summary);
        report
    }

    /// Open one session and run every planned operation on it in order
    async fn collect_device(&self, planned: PlannedDevice) -> DeviceResult {
        let mut retrievals = Vec::with_capacity(planned.operations.len());

        match self.driver.open(&planned.device).await {
            Ok(mut session) => {
                for operation in &planned.operations {
                    tracing::debug!("{}: retrieving {}", planned.device.hostname, operation);
                    let retrieval = session.retrieve(operation).await;
                    retrievals.push((*operation, retrieval));
                }
                session.close().await;
            }
            Err(e) => {
                let reason = format!("connection failed: {:#}", e);
                tracing::warn!("{}: {}", planned.device.hostname, reason);
                retrievals.extend(
                    planned
                        .operations
                        .iter()
                        .map(|op| (*op, Retrieval::Failed(reason.clone()))),
                );
            }
        }

        DeviceResult { planned, retrievals }
    }

    /// Classify, persist, log and count every retrieval of one device
    async fn record_device(&self, result: DeviceResult, report: &mut RunReport) {
        let DeviceResult { planned, retrievals } = result;
        let device = &planned.device;
        self.log.host_started(&device.hostname);

        for (index, (operation, retrieval)) in retrievals.into_iter().enumerate() {
            let (status, detail) = match retrieval {
                Retrieval::Success(payload) => {
                    let position = Position::new(planned.position, index);
                    match self.sink.persist(position, device, &operation, &payload).await {
                        Ok(()) => (OutcomeStatus::Success, None),
                        Err(e) if e.downcast_ref::<Unsupported>().is_some() => {
                            (OutcomeStatus::NotImplemented, Some(e.to_string()))
                        }
                        Err(e) => (OutcomeStatus::Failed, Some(format!("could not persist result: {:#}", e))),
                    }
                }
                Retrieval::Failed(reason) => (OutcomeStatus::Failed, Some(reason)),
                Retrieval::NotImplemented(reason) => (OutcomeStatus::NotImplemented, Some(reason)),
            };

            let outcome = Outcome {
                hostname: device.hostname.clone(),
                operation,
                status,
                detail,
            };
            self.log.outcome(&outcome);
            report.summary.record(status);
            report.outcomes.push(outcome);
        }

        self.log.host_finished(&device.hostname);
    }
}
