//! Vendor CLI commands behind each operation, and the light normalization
//! applied to their output.

use indexmap::IndexMap;
use regex_lite::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::models::payloads::{
    AddressPrefix, Facts, InterfaceAddressing, InterfaceState, Interfaces, InterfacesIp, LldpNeighbor,
    LldpNeighbors, Users,
};
use crate::models::{Operation, OperationKind, Platform};

/// The CLI command that serves an operation on a platform, if there is one
pub fn command_for(platform: Platform, operation: &Operation) -> Option<&'static str> {
    use Platform::*;

    match operation.kind {
        OperationKind::ConfigSlice => match (operation.name, platform) {
            ("running", Junos) => Some("show configuration | no-more"),
            ("running", _) => Some("show running-config"),
            ("startup", Ios | Eos | Nxos) => Some("show startup-config"),
            _ => None,
        },
        OperationKind::Getter => match (operation.name, platform) {
            ("facts", _) => Some("show version"),
            ("interfaces", Junos) => Some("show interfaces | no-more"),
            ("interfaces", _) => Some("show interfaces"),
            ("interfaces_ip", Iosxr) => Some("show ipv4 interface"),
            ("interfaces_ip", Junos) => Some("show interfaces terse | no-more"),
            ("interfaces_ip", _) => Some("show ip interface"),
            ("interfaces_counters", Ios | Eos) => Some("show interfaces counters"),
            ("interfaces_counters", Iosxr) => Some("show interfaces accounting"),
            ("interfaces_counters", Junos) => Some("show interfaces statistics | no-more"),
            ("lldp_neighbors", _) => Some("show lldp neighbors"),
            ("lldp_neighbors_detail", _) => Some("show lldp neighbors detail"),
            ("arp_table", Iosxr) => Some("show arp"),
            ("arp_table", Junos) => Some("show arp no-resolve"),
            ("arp_table", _) => Some("show ip arp"),
            ("ipv6_neighbors_table", Ios | Junos) => Some("show ipv6 neighbors"),
            ("mac_address_table", Junos) => Some("show ethernet-switching table"),
            ("mac_address_table", Ios | Eos | Nxos) => Some("show mac address-table"),
            ("bgp_neighbors", Iosxr) => Some("show bgp summary"),
            ("bgp_neighbors", Junos) => Some("show bgp summary"),
            ("bgp_neighbors", _) => Some("show ip bgp summary"),
            ("bgp_neighbors_detail", Iosxr) => Some("show bgp neighbors"),
            ("bgp_neighbors_detail", Junos) => Some("show bgp neighbor"),
            ("bgp_neighbors_detail", Ios | Eos) => Some("show ip bgp neighbors"),
            ("bgp_config", Junos) => Some("show configuration protocols bgp"),
            ("bgp_config", Eos) => Some("show running-config section router bgp"),
            ("bgp_config", Iosxr) => Some("show running-config router bgp"),
            ("environment", Junos) => Some("show chassis environment"),
            ("environment", Iosxr) => Some("show environment"),
            ("environment", Ios | Eos) => Some("show environment all"),
            ("network_instances", Junos) => Some("show route instance detail"),
            ("network_instances", Ios) => Some("show vrf detail"),
            ("network_instances", Eos) => Some("show vrf"),
            ("ntp_peers" | "ntp_stats", _) => Some("show ntp associations"),
            ("ntp_servers", Junos) => Some("show configuration system ntp"),
            ("ntp_servers", Iosxr) => Some("show running-config ntp"),
            ("ntp_servers", _) => Some("show running-config | include ntp server"),
            ("optics", Junos) => Some("show interfaces diagnostics optics"),
            ("optics", Ios | Eos) => Some("show interfaces transceiver"),
            ("snmp_information", Junos) => Some("show configuration snmp"),
            ("snmp_information", Iosxr) => Some("show running-config snmp-server"),
            ("snmp_information", _) => Some("show running-config | include snmp-server"),
            ("users", Junos) => Some("show configuration system login"),
            ("users", Iosxr) => Some("show running-config username"),
            ("users", Eos) => Some("show running-config section username"),
            ("users", Ios | Nxos) => Some("show running-config | include username"),
            _ => None,
        },
    }
}

/// Turn raw command output into the payload recorded for the operation.
/// Config slices stay raw text. The spreadsheet getters are normalized where
/// the output format is known; everything else keeps the command and its output.
pub fn normalize(platform: Platform, operation: &Operation, command: &str, output: &str) -> Value {
    if operation.is_config() {
        return Value::String(output.to_string());
    }

    match operation.name {
        "facts" => structured(Some(parse_facts(platform, output)), command, output),
        "interfaces" => structured(parse_interfaces(platform, output), command, output),
        "interfaces_ip" => structured(parse_interfaces_ip(platform, output), command, output),
        "lldp_neighbors" => structured(parse_lldp(platform, output), command, output),
        "users" => structured(parse_users(platform, output), command, output),
        _ => raw(command, output),
    }
}

fn raw(command: &str, output: &str) -> Value {
    json!({ "command": command, "output": output })
}

fn structured<T: Serialize>(parsed: Option<T>, command: &str, output: &str) -> Value {
    parsed
        .and_then(|p| serde_json::to_value(p).ok())
        .unwrap_or_else(|| raw(command, output))
}

/// IOS, EOS and NX-OS print the tabular `show` output the parsers below understand
fn is_line_based(platform: Platform) -> bool {
    matches!(platform, Platform::Ios | Platform::Eos | Platform::Nxos)
}

/// True for payloads that carry unparsed command output
pub fn is_raw_capture(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => {
            map.len() == 2
                && map.get("command").is_some_and(Value::is_string)
                && map.get("output").is_some_and(Value::is_string)
        }
        None => false,
    }
}

fn capture(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_capture(patterns: &[&str], text: &str) -> String {
    patterns
        .iter()
        .find_map(|p| capture(p, text))
        .unwrap_or_default()
}

/// Regexes for each facts field; the first capture group of the first match wins
struct FactPatterns {
    hostname: &'static [&'static str],
    model: &'static [&'static str],
    os_version: &'static [&'static str],
    serial: &'static [&'static str],
    uptime: &'static [&'static str],
}

fn fact_patterns(platform: Platform) -> FactPatterns {
    match platform {
        Platform::Ios => FactPatterns {
            hostname: &[r"(?m)^(\S+) uptime is "],
            model: &[r"(?mi)^cisco (\S+) .*bytes of .*memory"],
            os_version: &[r"(?i)Version ([^,\s]+)"],
            serial: &[r"(?i)Processor board ID (\S+)"],
            uptime: &[r"(?m)^\S+ uptime is (.+)$"],
        },
        Platform::Iosxr => FactPatterns {
            hostname: &[r"(?m)^(\S+) uptime is "],
            model: &[r"(?mi)^cisco (\S+) .*bytes of .*memory"],
            os_version: &[r"(?i)Version ([^\s\[,]+)"],
            serial: &[],
            uptime: &[r"(?m)^\S+ uptime is (.+)$", r"(?mi)^System uptime is (.+)$"],
        },
        Platform::Nxos => FactPatterns {
            hostname: &[r"(?mi)Device name:\s*(\S+)"],
            model: &[r"(?mi)^\s*cisco (Nexus\s?\S+)"],
            os_version: &[r"(?mi)NXOS:\s+version\s+(\S+)", r"(?mi)system:\s+version\s+(\S+)"],
            serial: &[r"(?i)Processor Board ID (\S+)"],
            uptime: &[r"(?mi)Kernel uptime is (.+)$"],
        },
        Platform::Eos => FactPatterns {
            hostname: &[],
            model: &[r"(?m)^Arista (\S+)"],
            os_version: &[r"(?mi)Software image version:\s*(\S+)"],
            serial: &[r"(?mi)Serial number:\s*(\S+)"],
            uptime: &[r"(?mi)^Uptime:\s*(.+)$"],
        },
        Platform::Junos => FactPatterns {
            hostname: &[r"(?mi)^Hostname:\s*(\S+)"],
            model: &[r"(?mi)^Model:\s*(\S+)"],
            os_version: &[r"(?mi)^Junos:\s*(\S+)", r"(?mi)^JUNOS .*\[([^\]]+)\]"],
            serial: &[],
            uptime: &[],
        },
    }
}

/// Extract facts from `show version` output
pub fn parse_facts(platform: Platform, output: &str) -> Facts {
    let patterns = fact_patterns(platform);
    let hostname = first_capture(patterns.hostname, output);
    let uptime = first_capture(patterns.uptime, output);

    Facts {
        fqdn: hostname.clone(),
        hostname,
        vendor: platform.vendor().to_string(),
        model: first_capture(patterns.model, output),
        os_version: first_capture(patterns.os_version, output),
        serial_number: first_capture(patterns.serial, output),
        uptime: if uptime.is_empty() { Value::Null } else { Value::String(uptime) },
        interface_list: Vec::new(),
    }
}

/// Extract local accounts from `username ...` configuration lines.
/// Returns None for platforms whose user configuration isn't line based.
pub fn parse_users(platform: Platform, output: &str) -> Option<Users> {
    if !is_line_based(platform) {
        return None;
    }

    let line_re = Regex::new(r"(?m)^username (\S+)(.*)$").ok()?;
    let level_re = Regex::new(r"(?:privilege|priv-lvl) (\d+)").ok()?;
    let secret_re = Regex::new(r"(?:secret|password) (?:sha512 |\d+ )?(\S+)").ok()?;
    let sshkey_re = Regex::new(r"^\s*sshkey (.+)$").ok()?;

    let mut users = Users::new();
    for caps in line_re.captures_iter(output) {
        let (Some(name), Some(rest)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let rest = rest.as_str();
        let account = users.entry(name.as_str().to_string()).or_default();

        if let Some(key) = sshkey_re.captures(rest).and_then(|c| c.get(1)) {
            account.sshkeys.push(key.as_str().trim().to_string());
            continue;
        }
        if let Some(level) = level_re
            .captures(rest)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
        {
            account.level = Some(level);
        }
        if let Some(secret) = secret_re.captures(rest).and_then(|c| c.get(1)) {
            account.password = secret.as_str().to_string();
        }
    }

    Some(users)
}

/// Output lines grouped under the interface header that opens them
struct Block<'a> {
    name: String,
    header: &'a str,
    body: Vec<&'a str>,
}

fn split_blocks<'a>(header: &Regex, output: &'a str) -> Vec<Block<'a>> {
    let mut blocks: Vec<Block<'a>> = Vec::new();
    for line in output.lines().map(str::trim_end) {
        if let Some(name) = header.captures(line).and_then(|c| c.get(1)) {
            blocks.push(Block {
                name: name.as_str().to_string(),
                header: line,
                body: Vec::new(),
            });
        } else if let Some(block) = blocks.last_mut() {
            block.body.push(line);
        }
    }
    blocks
}

/// Extract interface state from `show interfaces` output
pub fn parse_interfaces(platform: Platform, output: &str) -> Option<Interfaces> {
    if !is_line_based(platform) {
        return None;
    }

    let header_re = Regex::new(r"^(\S+) is (?:administratively )?(?:up|down)").ok()?;
    let description_re = Regex::new(r"^\s*Description: (.+)$").ok()?;
    let mac_re = Regex::new(r"address(?: is|:) ([0-9a-fA-F]{4}\.[0-9a-fA-F]{4}\.[0-9a-fA-F]{4})").ok()?;
    let mtu_re = Regex::new(r"MTU (\d+) bytes").ok()?;
    let bw_re = Regex::new(r"(?i)BW (\d+) Kbit").ok()?;

    let mut interfaces = Interfaces::new();
    for block in split_blocks(&header_re, output) {
        let header = block.header.to_lowercase();
        let admin_down = header.contains("administratively down")
            || block.body.iter().any(|l| l.trim_start().starts_with("admin state is down"));
        let is_up = match header.split_once("line protocol is ") {
            Some((_, protocol)) => protocol.starts_with("up"),
            None => header.starts_with(&format!("{} is up", block.name.to_lowercase())),
        };

        let mut state = InterfaceState {
            is_up: Some(is_up),
            is_enabled: Some(!admin_down),
            ..InterfaceState::default()
        };
        for line in &block.body {
            if let Some(d) = description_re.captures(line).and_then(|c| c.get(1)) {
                state.description = d.as_str().trim().to_string();
            }
            if let Some(m) = mac_re.captures(line).and_then(|c| c.get(1)) {
                state.mac_address = m.as_str().to_string();
            }
            if let Some(mtu) = mtu_re.captures(line).and_then(|c| c.get(1)) {
                state.mtu = mtu.as_str().parse().ok();
            }
            if let Some(kbit) = bw_re
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
            {
                state.speed = Some(kbit / 1000.0);
            }
        }
        interfaces.insert(block.name, state);
    }

    Some(interfaces)
}

/// Extract IPv4 addressing from `show ip interface` output. Interfaces
/// without an address are left out.
pub fn parse_interfaces_ip(platform: Platform, output: &str) -> Option<InterfacesIp> {
    let (header, address) = match platform {
        Platform::Ios | Platform::Eos => (
            r"^(\S+) is ",
            r"^\s*(?:Internet address is|Secondary address(?: is)?) (\d+\.\d+\.\d+\.\d+)/(\d+)",
        ),
        Platform::Nxos => (
            r"^(\S+), Interface status",
            r"^\s*IP address: (\d+\.\d+\.\d+\.\d+), IP subnet: \S+/(\d+)",
        ),
        _ => return None,
    };
    let header_re = Regex::new(header).ok()?;
    let address_re = Regex::new(address).ok()?;

    let mut interfaces = InterfacesIp::new();
    for block in split_blocks(&header_re, output) {
        let mut ipv4 = IndexMap::new();
        for caps in block.body.iter().filter_map(|l| address_re.captures(l)) {
            let (Some(ip), Some(len)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            ipv4.insert(
                ip.as_str().to_string(),
                AddressPrefix {
                    prefix_length: len.as_str().parse().ok(),
                },
            );
        }
        if !ipv4.is_empty() {
            interfaces.insert(
                block.name,
                InterfaceAddressing {
                    ipv4: Some(ipv4),
                    ipv6: None,
                },
            );
        }
    }

    Some(interfaces)
}

/// Extract neighbors from the `show lldp neighbors` table
pub fn parse_lldp(platform: Platform, output: &str) -> Option<LldpNeighbors> {
    // (pattern, local interface group, neighbor group, port group)
    let (pattern, local_group, hostname_group, port_group) = match platform {
        Platform::Eos => (r"^(\S+)\s+(\S+)\s+(\S+)\s+(\d+)\s*$", 1, 2, 3),
        Platform::Ios | Platform::Nxos => (r"^(\S+)\s+(\S+)\s+(\d+)\s+(?:(\S+)\s+)?(\S+)\s*$", 2, 1, 5),
        _ => return None,
    };
    let row_re = Regex::new(pattern).ok()?;

    let mut neighbors = LldpNeighbors::new();
    for caps in output.lines().filter_map(|l| row_re.captures(l.trim_end())) {
        let (Some(local), Some(hostname), Some(port)) =
            (caps.get(local_group), caps.get(hostname_group), caps.get(port_group))
        else {
            continue;
        };
        neighbors
            .entry(local.as_str().to_string())
            .or_default()
            .push(LldpNeighbor {
                hostname: hostname.as_str().to_string(),
                port: port.as_str().to_string(),
            });
    }

    Some(neighbors)
}
