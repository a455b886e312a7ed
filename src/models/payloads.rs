//! Structured getter payloads.
//!
//! These mirror the shapes normalized drivers emit for the getters that feed
//! spreadsheet sections. Every field is optional on the wire; absent keys
//! deserialize to defaults so a partial payload still produces a row.
//! Keyed collections keep the order the device reported them in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `facts` getter payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Facts {
    pub hostname: String,
    pub fqdn: String,
    pub vendor: String,
    pub model: String,
    pub os_version: String,
    pub serial_number: String,
    /// Seconds as a number from normalized drivers, or free text scraped from CLI output
    pub uptime: serde_json::Value,
    pub interface_list: Vec<String>,
}

impl Facts {
    pub fn uptime_text(&self) -> String {
        match &self.uptime {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// One entry of the `interfaces` getter payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceState {
    pub is_up: Option<bool>,
    pub is_enabled: Option<bool>,
    pub description: String,
    pub mac_address: String,
    pub speed: Option<f64>,
    pub mtu: Option<u32>,
}

pub type Interfaces = IndexMap<String, InterfaceState>;

/// Prefix attributes of one address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressPrefix {
    pub prefix_length: Option<u8>,
}

/// One entry of the `interfaces_ip` getter payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceAddressing {
    pub ipv4: Option<IndexMap<String, AddressPrefix>>,
    pub ipv6: Option<IndexMap<String, AddressPrefix>>,
}

pub type InterfacesIp = IndexMap<String, InterfaceAddressing>;

/// One neighbor from the `lldp_neighbors` getter payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LldpNeighbor {
    pub hostname: String,
    pub port: String,
}

pub type LldpNeighbors = IndexMap<String, Vec<LldpNeighbor>>;

/// One local account from the `users` getter payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserAccount {
    pub level: Option<u32>,
    pub password: String,
    pub sshkeys: Vec<String>,
}

pub type Users = IndexMap<String, UserAccount>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_facts_partial_payload() {
        let facts: Facts = serde_json::from_value(json!({
            "vendor": "Cisco",
            "uptime": 3600
        }))
        .unwrap();
        assert_eq!(facts.vendor, "Cisco");
        assert_eq!(facts.model, "");
        assert_eq!(facts.uptime_text(), "3600");
    }

    #[test]
    fn test_interfaces_ip_without_ipv6() {
        let payload: InterfacesIp = serde_json::from_value(json!({
            "GigabitEthernet1": {
                "ipv4": { "10.0.0.1": { "prefix_length": 24 } }
            }
        }))
        .unwrap();
        let entry = &payload["GigabitEthernet1"];
        assert!(entry.ipv6.is_none());
        assert_eq!(
            entry.ipv4.as_ref().unwrap()["10.0.0.1"].prefix_length,
            Some(24)
        );
    }

    #[test]
    fn test_interfaces_keep_device_order() {
        let payload: Interfaces = serde_json::from_str(
            r#"{"Ethernet2": {}, "Ethernet10": {}, "Ethernet1": {}}"#,
        )
        .unwrap();
        let names: Vec<_> = payload.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Ethernet2", "Ethernet10", "Ethernet1"]);
    }
}
