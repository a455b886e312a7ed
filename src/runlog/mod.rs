//! Append-only run log.
//!
//! One file per run under `logs/`. Every line carries a timestamp, is
//! written whole and flushed immediately, and is mirrored to the console
//! through tracing.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::{Device, Outcome, OutcomeStatus, Platform, RunSummary};

/// Which kind of run produced the log; names the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Discovery,
    Collection,
}

impl RunKind {
    pub fn label(&self) -> &'static str {
        match self {
            RunKind::Discovery => "DISCOVERY",
            RunKind::Collection => "COLLECTION",
        }
    }
}

pub fn log_file_name(kind: RunKind, started: DateTime<Local>) -> String {
    format!("{}-LOG-{}.txt", kind.label(), started.format("%Y-%m-%d-%H-%M-%S"))
}

pub struct RunLog {
    kind: RunKind,
    path: PathBuf,
    file: Mutex<File>,
}

impl RunLog {
    /// Create the log file under `logs_dir`, creating the directory if needed
    pub fn create(logs_dir: &Path, kind: RunKind, started: DateTime<Local>) -> Result<Self> {
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

        let path = logs_dir.join(log_file_name(kind, started));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open run log {}", path.display()))?;

        Ok(Self {
            kind,
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line. A failed write is reported on the
    /// console but never interrupts the run.
    pub fn line(&self, message: &str) {
        tracing::info!("{}", message);

        let stamped = format!("{} {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = file.write_all(stamped.as_bytes()).and_then(|_| file.flush()) {
            tracing::warn!("Failed to write run log {}: {}", self.path.display(), e);
        }
    }

    pub fn run_started(&self, started: DateTime<Local>) {
        self.line(&format!(
            "STARTING {}: {}",
            self.kind.label(),
            started.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    pub fn platform_started(&self, platform: Platform, devices: usize) {
        self.line(&format!("Processing platform: {} ({} devices)", platform, devices));
    }

    pub fn device_skipped(&self, device: &Device) {
        self.line(&format!(
            "SKIPPED : {} (unknown platform '{}')",
            device.hostname, device.platform_tag
        ));
    }

    pub fn host_started(&self, hostname: &str) {
        self.line(&format!("** Start Processing Host: {}", hostname));
    }

    pub fn outcome(&self, outcome: &Outcome) {
        let mut message = format!("{} : {}", outcome.status.label(), outcome.operation);
        if outcome.status != OutcomeStatus::Success {
            if let Some(detail) = &outcome.detail {
                message.push_str(" - ");
                message.push_str(detail);
            }
        }
        self.line(&message);
    }

    pub fn host_finished(&self, hostname: &str) {
        self.line(&format!("** End Processing Host: {}", hostname));
    }

    pub fn interrupted(&self) {
        self.line("RUN INTERRUPTED - summary covers completed devices only");
    }

    pub fn artifact(&self, path: &Path) {
        self.line(&format!("OUTPUT : {}", path.display()));
    }

    pub fn summary(&self, summary: &RunSummary) {
        self.line("SUMMARY");
        self.line(&format!("SUCCESS COUNT : {}", summary.success_count));
        self.line(&format!("FAILURE COUNT : {}", summary.fail_count));
        self.line(&format!("NOT IMPLEMENTED COUNT : {}", summary.not_implemented_count));
        self.line(&format!("TOTAL COUNT : {}", summary.total_count()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operation;
    use chrono::TimeZone;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap()
    }

    #[test]
    fn test_log_file_name() {
        assert_eq!(
            log_file_name(RunKind::Discovery, started()),
            "DISCOVERY-LOG-2024-03-07-14-05-09.txt"
        );
        assert_eq!(
            log_file_name(RunKind::Collection, started()),
            "COLLECTION-LOG-2024-03-07-14-05-09.txt"
        );
    }

    #[test]
    fn test_lines_are_timestamped_and_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::create(&dir.path().join("logs"), RunKind::Discovery, started()).unwrap();

        log.run_started(started());
        log.host_started("r1");
        log.outcome(&Outcome {
            hostname: "r1".to_string(),
            operation: Operation::getter("interfaces"),
            status: OutcomeStatus::NotImplemented,
            detail: Some("device rejected 'show interfaces'".to_string()),
        });
        log.host_finished("r1");

        // Read without dropping the log: every line must already be on disk
        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("STARTING DISCOVERY: 2024-03-07 14:05:09"));
        assert!(lines[1].ends_with("** Start Processing Host: r1"));
        assert!(lines[2].contains("NOT IMPLEMENTED : interfaces"));
        assert!(lines[3].ends_with("** End Processing Host: r1"));
        for line in lines {
            // "YYYY-MM-DD HH:MM:SS " prefix
            assert_eq!(&line[4..5], "-");
            assert_eq!(&line[13..14], ":");
        }
    }

    #[test]
    fn test_summary_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::create(dir.path(), RunKind::Collection, started()).unwrap();

        let summary = RunSummary {
            success_count: 3,
            fail_count: 1,
            not_implemented_count: 2,
        };
        log.interrupted();
        log.summary(&summary);

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert!(contents.contains("RUN INTERRUPTED"));
        assert!(contents.contains("SUCCESS COUNT : 3"));
        assert!(contents.contains("FAILURE COUNT : 1"));
        assert!(contents.contains("NOT IMPLEMENTED COUNT : 2"));
        assert!(contents.contains("TOTAL COUNT : 6"));
    }
}
