use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod payloads;

/// Platform is the closed set of device operating system families we collect from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Eos,
    Nxos,
    Junos,
    Iosxr,
}

impl Platform {
    /// Fixed processing sequence across platform groups
    pub const SEQUENCE: [Platform; 5] = [
        Platform::Ios,
        Platform::Eos,
        Platform::Nxos,
        Platform::Junos,
        Platform::Iosxr,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Eos => "eos",
            Platform::Nxos => "nxos",
            Platform::Junos => "junos",
            Platform::Iosxr => "iosxr",
        }
    }

    /// Vendor name reported in facts when the device output doesn't carry one
    pub fn vendor(&self) -> &'static str {
        match self {
            Platform::Ios | Platform::Nxos | Platform::Iosxr => "Cisco",
            Platform::Eos => "Arista",
            Platform::Junos => "Juniper",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "eos" => Ok(Platform::Eos),
            "nxos" | "nxos_ssh" => Ok(Platform::Nxos),
            "junos" => Ok(Platform::Junos),
            "iosxr" => Ok(Platform::Iosxr),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// Platform tag that is not part of the getter catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform tag: {0}")]
pub struct UnknownPlatform(pub String);

/// Login credentials for a device
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Device represents one inventory host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Inventory name, unique across the run
    pub hostname: String,
    /// Address used to connect (the inventory `hostname` field, falling back to the name)
    pub address: String,
    pub port: u16,
    /// Raw platform tag as written in the inventory
    pub platform_tag: String,
    pub credentials: Credentials,
}

impl Device {
    /// The catalog platform for this device, if its tag is one we know
    pub fn platform(&self) -> Option<Platform> {
        self.platform_tag.parse().ok()
    }
}

/// Whether an operation retrieves a getter or a configuration slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    ConfigSlice,
    Getter,
}

/// A single named retrieval against a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: &'static str,
}

impl Operation {
    pub const fn getter(name: &'static str) -> Self {
        Self {
            kind: OperationKind::Getter,
            name,
        }
    }

    pub const fn config(name: &'static str) -> Self {
        Self {
            kind: OperationKind::ConfigSlice,
            name,
        }
    }

    pub fn is_config(&self) -> bool {
        self.kind == OperationKind::ConfigSlice
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OperationKind::ConfigSlice => write!(f, "{} config", self.name),
            OperationKind::Getter => f.write_str(self.name),
        }
    }
}

/// What a device session hands back for one operation
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    Success(serde_json::Value),
    Failed(String),
    NotImplemented(String),
}

/// Classified status of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeStatus {
    Success,
    Failed,
    NotImplemented,
}

impl OutcomeStatus {
    /// Label used in the run log
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "SUCCESS",
            OutcomeStatus::Failed => "FAILED",
            OutcomeStatus::NotImplemented => "NOT IMPLEMENTED",
        }
    }
}

/// Outcome of one (device, operation) pair
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub hostname: String,
    pub operation: Operation,
    pub status: OutcomeStatus,
    pub detail: Option<String>,
}

/// Success/failure tally for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub success_count: u64,
    pub fail_count: u64,
    pub not_implemented_count: u64,
}

impl RunSummary {
    pub fn record(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Success => self.success_count += 1,
            OutcomeStatus::Failed => self.fail_count += 1,
            OutcomeStatus::NotImplemented => self.not_implemented_count += 1,
        }
    }

    pub fn total_count(&self) -> u64 {
        self.success_count + self.fail_count + self.not_implemented_count
    }
}
