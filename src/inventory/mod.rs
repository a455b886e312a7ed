use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::config::ConfigError;
use crate::models::{Credentials, Device};

pub const HOSTS_FILE: &str = "hosts.yaml";
pub const GROUPS_FILE: &str = "groups.yaml";
pub const DEFAULTS_FILE: &str = "defaults.yaml";

const DEFAULT_SSH_PORT: u16 = 22;

/// Attributes shared by host, group and defaults definitions.
/// Anything not listed (e.g. `data`) is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Definition {
    hostname: Option<String>,
    platform: Option<String>,
    username: Option<String>,
    password: Option<String>,
    port: Option<u16>,
    groups: Vec<String>,
}

/// Inventory is the ordered set of devices for one run
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    devices: Vec<Device>,
}

impl Inventory {
    /// Load `hosts.yaml` (required) plus optional `groups.yaml` and `defaults.yaml` from `dir`.
    /// `fallback` credentials apply only where no host, group or defaults entry sets them.
    pub fn load(dir: &Path, fallback: Option<&Credentials>) -> Result<Self, ConfigError> {
        let hosts_path = dir.join(HOSTS_FILE);
        let hosts = read_required(&hosts_path)?;
        let groups = read_optional(&dir.join(GROUPS_FILE))?;
        let defaults = read_optional(&dir.join(DEFAULTS_FILE))?;

        let inventory = Self::parse(&hosts, groups.as_deref(), defaults.as_deref(), fallback)
            .map_err(|message| ConfigError::InventoryMalformed {
                path: dir.to_path_buf(),
                message,
            })?;

        tracing::info!(
            "Loaded {} devices from {}",
            inventory.devices.len(),
            hosts_path.display()
        );
        Ok(inventory)
    }

    /// Build an inventory from already-read YAML documents
    fn parse(
        hosts: &str,
        groups: Option<&str>,
        defaults: Option<&str>,
        fallback: Option<&Credentials>,
    ) -> Result<Self, String> {
        let hosts = parse_mapping(hosts, HOSTS_FILE)?;
        let groups: HashMap<String, Definition> = parse_mapping(groups.unwrap_or(""), GROUPS_FILE)?
            .into_iter()
            .collect();
        let defaults: Definition = match defaults.map(str::trim).filter(|s| !s.is_empty()) {
            Some(text) => serde_yaml::from_str(text).map_err(|e| format!("{}: {}", DEFAULTS_FILE, e))?,
            None => Definition::default(),
        };

        let mut devices = Vec::with_capacity(hosts.len());
        for (name, host) in hosts {
            let chain = resolve_chain(&name, &host, &groups)?;
            let pick = |field: fn(&Definition) -> Option<&String>| {
                chain
                    .iter()
                    .copied()
                    .chain(std::iter::once(&defaults))
                    .find_map(field)
                    .cloned()
            };

            let username = pick(|d| d.username.as_ref());
            let password = pick(|d| d.password.as_ref());
            let credentials = match (username, password) {
                (None, None) => fallback.cloned().unwrap_or_default(),
                (username, password) => Credentials::new(
                    username
                        .or_else(|| fallback.map(|c| c.username.clone()))
                        .unwrap_or_default(),
                    password
                        .or_else(|| fallback.map(|c| c.password.clone()))
                        .unwrap_or_default(),
                ),
            };

            let port = chain
                .iter()
                .copied()
                .chain(std::iter::once(&defaults))
                .find_map(|d| d.port)
                .unwrap_or(DEFAULT_SSH_PORT);

            devices.push(Device {
                address: pick(|d| d.hostname.as_ref()).unwrap_or_else(|| name.clone()),
                platform_tag: pick(|d| d.platform.as_ref()).unwrap_or_default(),
                hostname: name,
                port,
                credentials,
            });
        }

        Ok(Self { devices })
    }

    /// Devices in inventory file order
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl From<Vec<Device>> for Inventory {
    fn from(devices: Vec<Device>) -> Self {
        Self { devices }
    }
}

/// Host first, then its groups depth-first in listed order
fn resolve_chain<'a>(
    name: &str,
    host: &'a Definition,
    groups: &'a HashMap<String, Definition>,
) -> Result<Vec<&'a Definition>, String> {
    let mut chain = vec![host];
    let mut seen = HashSet::new();
    let mut pending: Vec<&str> = host.groups.iter().rev().map(String::as_str).collect();

    while let Some(group_name) = pending.pop() {
        if !seen.insert(group_name) {
            continue;
        }
        let group = groups
            .get(group_name)
            .ok_or_else(|| format!("host {} references unknown group {}", name, group_name))?;
        chain.push(group);
        pending.extend(group.groups.iter().rev().map(String::as_str));
    }

    Ok(chain)
}

/// Parse a top-level mapping of name -> definition, preserving file order
fn parse_mapping(text: &str, file: &str) -> Result<Vec<(String, Definition)>, String> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| format!("{}: {}", file, e))?;
    let mapping = match value {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Mapping(m) => m,
        _ => return Err(format!("{}: expected a mapping of names", file)),
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = match key {
            serde_yaml::Value::String(s) => s,
            other => return Err(format!("{}: entry name {:?} is not a string", file, other)),
        };
        let definition = if value.is_null() {
            Definition::default()
        } else {
            serde_yaml::from_value(value).map_err(|e| format!("{}: {}: {}", file, name, e))?
        };
        entries.push((name, definition));
    }
    Ok(entries)
}

fn read_required(path: &Path) -> Result<String, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ConfigError::InventoryMissing(path.to_path_buf()))
        }
        Err(e) => Err(ConfigError::InventoryMalformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match read_required(path) {
        Ok(text) => Ok(Some(text)),
        Err(ConfigError::InventoryMissing(_)) => {
            tracing::debug!("{} not present, skipping", path.display());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOSTS: &str = r#"
r1:
  hostname: 10.0.0.1
  groups: [core]
sw1:
  hostname: 10.0.0.2
  platform: eos
  username: local
  port: 2222
edge1:
  groups: [edge]
"#;

    const GROUPS: &str = r#"
core:
  platform: ios
  groups: [site]
edge:
  platform: junos
site:
  username: siteuser
  password: sitepass
"#;

    const DEFAULTS: &str = r#"
password: defaultpass
"#;

    #[test]
    fn test_preserves_file_order() {
        let inv = Inventory::parse(HOSTS, Some(GROUPS), Some(DEFAULTS), None).unwrap();
        let names: Vec<_> = inv.devices().iter().map(|d| d.hostname.as_str()).collect();
        assert_eq!(names, vec!["r1", "sw1", "edge1"]);
    }

    #[test]
    fn test_group_inheritance() {
        let inv = Inventory::parse(HOSTS, Some(GROUPS), Some(DEFAULTS), None).unwrap();
        let r1 = &inv.devices()[0];
        assert_eq!(r1.address, "10.0.0.1");
        assert_eq!(r1.platform_tag, "ios");
        assert_eq!(r1.credentials, Credentials::new("siteuser", "sitepass"));
        assert_eq!(r1.port, 22);
    }

    #[test]
    fn test_host_overrides_and_defaults() {
        let inv = Inventory::parse(HOSTS, Some(GROUPS), Some(DEFAULTS), None).unwrap();
        let sw1 = &inv.devices()[1];
        assert_eq!(sw1.port, 2222);
        assert_eq!(sw1.credentials, Credentials::new("local", "defaultpass"));
    }

    #[test]
    fn test_address_falls_back_to_name() {
        let inv = Inventory::parse(HOSTS, Some(GROUPS), None, None).unwrap();
        let edge1 = &inv.devices()[2];
        assert_eq!(edge1.address, "edge1");
        assert_eq!(edge1.platform_tag, "junos");
    }

    #[test]
    fn test_env_credentials_fill_gaps_only() {
        let fallback = Credentials::new("envuser", "envpass");
        let inv = Inventory::parse(HOSTS, Some(GROUPS), None, Some(&fallback)).unwrap();
        assert_eq!(inv.devices()[0].credentials, Credentials::new("siteuser", "sitepass"));
        assert_eq!(inv.devices()[1].credentials, Credentials::new("local", "envpass"));
        assert_eq!(inv.devices()[2].credentials, fallback);
    }

    #[test]
    fn test_missing_credentials_are_empty() {
        let inv = Inventory::parse("r9:\n  platform: ios\n", None, None, None).unwrap();
        assert!(inv.devices()[0].credentials.is_empty());
    }

    #[test]
    fn test_unknown_group_is_an_error() {
        let err = Inventory::parse("r1:\n  groups: [nope]\n", None, None, None).unwrap_err();
        assert!(err.contains("unknown group nope"));
    }

    #[test]
    fn test_group_cycle_terminates() {
        let groups = "a:\n  groups: [b]\nb:\n  groups: [a]\n  platform: nxos\n";
        let inv = Inventory::parse("r1:\n  groups: [a]\n", Some(groups), None, None).unwrap();
        assert_eq!(inv.devices()[0].platform_tag, "nxos");
    }

    #[test]
    fn test_load_requires_hosts_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Inventory::load(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::InventoryMissing(_)));
    }

    #[test]
    fn test_load_reports_malformed_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HOSTS_FILE), "- just\n- a list\n").unwrap();
        let err = Inventory::load(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::InventoryMalformed { .. }));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HOSTS_FILE), HOSTS).unwrap();
        std::fs::write(dir.path().join(GROUPS_FILE), GROUPS).unwrap();
        let inv = Inventory::load(dir.path(), None).unwrap();
        assert_eq!(inv.len(), 3);
    }
}
