use std::collections::HashMap;

use crate::models::{Operation, Platform};

/// Getters supported per platform, following the driver support matrix
const IOS_GETTERS: &[&str] = &[
    "arp_table",
    "bgp_neighbors",
    "bgp_neighbors_detail",
    "environment",
    "facts",
    "interfaces",
    "interfaces_counters",
    "interfaces_ip",
    "ipv6_neighbors_table",
    "lldp_neighbors",
    "lldp_neighbors_detail",
    "mac_address_table",
    "network_instances",
    "ntp_peers",
    "ntp_servers",
    "ntp_stats",
    "optics",
    "snmp_information",
    "users",
];

const JUNOS_GETTERS: &[&str] = &[
    "arp_table",
    "bgp_config",
    "bgp_neighbors",
    "bgp_neighbors_detail",
    "environment",
    "facts",
    "interfaces",
    "interfaces_counters",
    "interfaces_ip",
    "ipv6_neighbors_table",
    "lldp_neighbors",
    "lldp_neighbors_detail",
    "mac_address_table",
    "network_instances",
    "ntp_peers",
    "ntp_servers",
    "ntp_stats",
    "optics",
    "snmp_information",
    "users",
];

const EOS_GETTERS: &[&str] = &[
    "arp_table",
    "bgp_config",
    "bgp_neighbors",
    "bgp_neighbors_detail",
    "environment",
    "facts",
    "interfaces",
    "interfaces_counters",
    "interfaces_ip",
    "lldp_neighbors",
    "lldp_neighbors_detail",
    "mac_address_table",
    "network_instances",
    "ntp_servers",
    "ntp_stats",
    "optics",
    "snmp_information",
    "users",
];

const NXOS_GETTERS: &[&str] = &[
    "arp_table",
    "bgp_neighbors",
    "facts",
    "interfaces",
    "interfaces_ip",
    "lldp_neighbors",
    "lldp_neighbors_detail",
    "mac_address_table",
    "ntp_peers",
    "ntp_servers",
    "ntp_stats",
    "snmp_information",
    "users",
];

const IOSXR_GETTERS: &[&str] = &[
    "arp_table",
    "bgp_config",
    "bgp_neighbors",
    "bgp_neighbors_detail",
    "environment",
    "facts",
    "interfaces",
    "interfaces_counters",
    "interfaces_ip",
    "lldp_neighbors",
    "lldp_neighbors_detail",
    "mac_address_table",
    "ntp_peers",
    "ntp_servers",
    "ntp_stats",
    "snmp_information",
    "users",
];

const STARTUP_SLICES: &[&str] = &["running", "startup"];
const CANDIDATE_SLICES: &[&str] = &["running", "candidate"];

/// CatalogEntry lists what is attempted for one platform, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub platform: Platform,
    pub getters: Vec<&'static str>,
    pub config_slices: Vec<&'static str>,
}

impl CatalogEntry {
    /// Config slices first, then getters
    pub fn operations(&self) -> Vec<Operation> {
        self.config_slices
            .iter()
            .copied()
            .map(Operation::config)
            .chain(self.getters.iter().copied().map(Operation::getter))
            .collect()
    }
}

/// Catalog maps platforms to their entries. Never mutated once a run starts.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<Platform, CatalogEntry>,
}

impl Catalog {
    /// The built-in catalog for all supported platforms
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        for platform in Platform::SEQUENCE {
            let (getters, config_slices) = match platform {
                Platform::Ios => (IOS_GETTERS, STARTUP_SLICES),
                Platform::Eos => (EOS_GETTERS, STARTUP_SLICES),
                Platform::Nxos => (NXOS_GETTERS, STARTUP_SLICES),
                Platform::Junos => (JUNOS_GETTERS, CANDIDATE_SLICES),
                Platform::Iosxr => (IOSXR_GETTERS, STARTUP_SLICES),
            };
            catalog = catalog.with_entry(platform, getters, config_slices);
        }
        catalog
    }

    /// Add or replace the entry for a platform
    pub fn with_entry(
        mut self,
        platform: Platform,
        getters: &[&'static str],
        config_slices: &[&'static str],
    ) -> Self {
        self.entries.insert(
            platform,
            CatalogEntry {
                platform,
                getters: getters.to_vec(),
                config_slices: config_slices.to_vec(),
            },
        );
        self
    }

    pub fn entry(&self, platform: Platform) -> Option<&CatalogEntry> {
        self.entries.get(&platform)
    }

    /// Look up by raw inventory tag; unknown tags have no entry
    pub fn entry_for_tag(&self, tag: &str) -> Option<&CatalogEntry> {
        tag.parse::<Platform>().ok().and_then(|p| self.entry(p))
    }

    /// Platforms with an entry, in the fixed processing sequence
    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        Platform::SEQUENCE
            .into_iter()
            .filter(|p| self.entries.contains_key(p))
    }
}
