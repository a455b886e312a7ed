use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{Position, ResultSink, Unsupported};
use crate::models::payloads::{Facts, Interfaces, InterfacesIp, LldpNeighbors, Users};
use crate::models::{Device, Operation};
use crate::session::commands::is_raw_capture;
use crate::utils::safe_path_component;

/// Written when an interface has no address of a family
pub const NOT_CONFIGURED: &str = "NOT CONFIGURED";

/// Longest text an `.xlsx` cell holds
pub const MAX_CELL_CHARS: usize = 32_767;

/// Named sections of the workbook, in sheet order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Facts,
    Interfaces,
    InterfacesIp,
    Lldp,
    Users,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Facts,
        Section::Interfaces,
        Section::InterfacesIp,
        Section::Lldp,
        Section::Users,
    ];

    pub fn sheet_name(&self) -> &'static str {
        match self {
            Section::Facts => "Facts",
            Section::Interfaces => "Interfaces",
            Section::InterfacesIp => "Interfaces_IP",
            Section::Lldp => "LLDP",
            Section::Users => "Users",
        }
    }

    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            Section::Facts => &["Hostname", "Vendor", "Model", "OS Version", "Serial Number", "Uptime"],
            Section::Interfaces => &[
                "Name",
                "Interface Name",
                "Interface Description",
                "Interface Up",
                "Interface Enabled",
            ],
            Section::InterfacesIp => &[
                "Name",
                "Interface Name",
                "IPv4 Address",
                "IPv4 Prefix Length",
                "IPv6 Address",
                "IPv6 Prefix Length",
            ],
            Section::Lldp => &["Name", "Local Interface", "Remote Hostname", "Remote Port"],
            Section::Users => &["Name", "Username", "Level", "Password", "SSH Keys"],
        }
    }

    /// The section fed by a getter, if any
    pub fn for_getter(name: &str) -> Option<Section> {
        match name {
            "facts" => Some(Section::Facts),
            "interfaces" => Some(Section::Interfaces),
            "interfaces_ip" => Some(Section::InterfacesIp),
            "lldp_neighbors" => Some(Section::Lldp),
            "users" => Some(Section::Users),
            _ => None,
        }
    }
}

/// One spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Bool(bool),
    Number(f64),
}

impl CellValue {
    fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    fn opt_bool(value: Option<bool>) -> Self {
        value.map(CellValue::Bool).unwrap_or(CellValue::Empty)
    }

    fn opt_number<N: Into<f64>>(value: Option<N>) -> Self {
        value.map(|n| CellValue::Number(n.into())).unwrap_or(CellValue::Empty)
    }
}

type SectionRows = BTreeMap<(Position, String), Vec<CellValue>>;

/// TabularSink buffers rows per section and writes one `.xlsx` workbook on finalize
pub struct TabularSink {
    path: PathBuf,
    rows: Mutex<BTreeMap<Section, SectionRows>>,
}

impl TabularSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    /// Sink writing `Diagnostics-<customer>-<year>-<DD-MM-HH-MM>.xlsx` under `output_dir`
    pub fn for_customer(output_dir: &Path, customer: &str, now: DateTime<Local>) -> Self {
        Self::new(output_dir.join(workbook_name(customer, now)))
    }

    /// Buffer one row. The row's first cell is the device name; rows are
    /// ordered by position, then entity key, regardless of arrival order.
    pub fn record(&self, section: Section, position: Position, hostname: &str, entity_key: &str, fields: Vec<CellValue>) {
        let mut row = Vec::with_capacity(fields.len() + 1);
        row.push(CellValue::text(hostname));
        row.extend(fields);

        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.entry(section)
            .or_default()
            .insert((position, entity_key.to_string()), row);
    }

    /// Buffered rows of a section, in output order
    pub fn rows(&self, section: Section) -> Vec<Vec<CellValue>> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.get(&section)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResultSink for TabularSink {
    fn accepts(&self, operation: &Operation) -> bool {
        !operation.is_config() && Section::for_getter(operation.name).is_some()
    }

    async fn persist(
        &self,
        position: Position,
        device: &Device,
        operation: &Operation,
        payload: &Value,
    ) -> Result<()> {
        let section = Section::for_getter(operation.name)
            .filter(|_| !operation.is_config())
            .ok_or_else(|| anyhow!("{} has no spreadsheet section", operation))?;

        if is_raw_capture(payload) {
            return Err(Unsupported(format!("{} returned unparsed CLI output", operation)).into());
        }

        let extracted = extract_rows(section, payload)
            .with_context(|| format!("Unexpected {} payload from {}", operation, device.hostname))?;

        // Rows of one payload keep the device's order, not name order
        for (ordinal, (entity_key, fields)) in extracted.into_iter().enumerate() {
            let key = format!("{:06}/{}", ordinal, entity_key);
            self.record(section, position, &device.hostname, &key, fields);
        }
        Ok(())
    }

    async fn finalize(&self) -> Result<Option<PathBuf>> {
        let sections: Vec<(Section, Vec<Vec<CellValue>>)> =
            Section::ALL.iter().map(|s| (*s, self.rows(*s))).collect();
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_workbook(&path, &sections))
            .await
            .map_err(|e| anyhow!("Task join error: {}", e))??;

        tracing::info!("Workbook written to {}", self.path.display());
        Ok(Some(self.path.clone()))
    }
}

pub fn workbook_name(customer: &str, now: DateTime<Local>) -> String {
    format!(
        "Diagnostics-{}-{}.xlsx",
        safe_path_component(customer),
        now.format("%Y-%d-%m-%H-%M")
    )
}

/// Turn a getter payload into (entity key, cells) pairs, excluding the leading name cell
pub fn extract_rows(section: Section, payload: &Value) -> Result<Vec<(String, Vec<CellValue>)>> {
    let rows = match section {
        Section::Facts => {
            let facts: Facts = serde_json::from_value(payload.clone())?;
            let uptime = match &facts.uptime {
                Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Empty),
                Value::Null => CellValue::Empty,
                _ => CellValue::text(facts.uptime_text()),
            };
            vec![(
                String::new(),
                vec![
                    CellValue::text(facts.vendor),
                    CellValue::text(facts.model),
                    CellValue::text(facts.os_version),
                    CellValue::text(facts.serial_number),
                    uptime,
                ],
            )]
        }
        Section::Interfaces => {
            let interfaces: Interfaces = serde_json::from_value(payload.clone())?;
            interfaces
                .into_iter()
                .map(|(name, state)| {
                    let cells = vec![
                        CellValue::text(name.clone()),
                        CellValue::text(state.description),
                        CellValue::opt_bool(state.is_up),
                        CellValue::opt_bool(state.is_enabled),
                    ];
                    (name, cells)
                })
                .collect()
        }
        Section::InterfacesIp => {
            let interfaces: InterfacesIp = serde_json::from_value(payload.clone())?;
            let mut rows = Vec::new();
            for (name, addressing) in interfaces {
                let ipv4: Vec<_> = addressing.ipv4.unwrap_or_default().into_iter().collect();
                let ipv6: Vec<_> = addressing.ipv6.unwrap_or_default().into_iter().collect();
                let count = ipv4.len().max(ipv6.len()).max(1);

                for i in 0..count {
                    let mut cells = vec![CellValue::text(name.clone())];
                    for family in [&ipv4, &ipv6] {
                        match family.get(i) {
                            Some((address, prefix)) => {
                                cells.push(CellValue::text(address.clone()));
                                cells.push(CellValue::opt_number(prefix.prefix_length));
                            }
                            None => {
                                cells.push(CellValue::text(NOT_CONFIGURED));
                                cells.push(CellValue::text(NOT_CONFIGURED));
                            }
                        }
                    }
                    rows.push((format!("{}#{:04}", name, i), cells));
                }
            }
            rows
        }
        Section::Lldp => {
            let neighbors: LldpNeighbors = serde_json::from_value(payload.clone())?;
            let mut rows = Vec::new();
            for (local, entries) in neighbors {
                for (i, neighbor) in entries.into_iter().enumerate() {
                    let cells = vec![
                        CellValue::text(local.clone()),
                        CellValue::text(neighbor.hostname),
                        CellValue::text(neighbor.port),
                    ];
                    rows.push((format!("{}#{:04}", local, i), cells));
                }
            }
            rows
        }
        Section::Users => {
            let users: Users = serde_json::from_value(payload.clone())?;
            users
                .into_iter()
                .map(|(username, account)| {
                    let cells = vec![
                        CellValue::text(username.clone()),
                        CellValue::opt_number(account.level),
                        CellValue::text(account.password),
                        CellValue::text(account.sshkeys.join("\n")),
                    ];
                    (username, cells)
                })
                .collect()
        }
    };
    Ok(rows)
}

/// Cut text to what one cell can hold, at a char boundary
fn cell_text(s: &str) -> &str {
    match s.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

fn write_workbook(path: &Path, sections: &[(Section, Vec<Vec<CellValue>>)]) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for (section, rows) in sections {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(section.sheet_name())?;

        for (col, header) in section.headers().iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }

        for (r, row) in rows.iter().enumerate() {
            let r = r as u32 + 1;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    CellValue::Empty => {}
                    CellValue::Text(s) => {
                        worksheet.write_string(r, c, cell_text(s))?;
                    }
                    CellValue::Bool(b) => {
                        worksheet.write_boolean(r, c, *b)?;
                    }
                    CellValue::Number(n) => {
                        worksheet.write_number(r, c, *n)?;
                    }
                }
            }
        }
        worksheet.autofit();
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save workbook {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credentials;
    use chrono::TimeZone;
    use serde_json::json;

    fn device(name: &str) -> Device {
        Device {
            hostname: name.to_string(),
            address: name.to_string(),
            port: 22,
            platform_tag: "ios".to_string(),
            credentials: Credentials::default(),
        }
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_workbook_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 7, 14, 5, 0).unwrap();
        assert_eq!(workbook_name("Acme", now), "Diagnostics-Acme-2024-07-03-14-05.xlsx");
        assert_eq!(workbook_name("Acme/EU", now), "Diagnostics-Acme_EU-2024-07-03-14-05.xlsx");
    }

    #[test]
    fn test_accepts_only_section_getters() {
        let sink = TabularSink::new("/unused.xlsx");
        assert!(sink.accepts(&Operation::getter("facts")));
        assert!(sink.accepts(&Operation::getter("lldp_neighbors")));
        assert!(!sink.accepts(&Operation::getter("arp_table")));
        assert!(!sink.accepts(&Operation::config("running")));
    }

    #[test]
    fn test_missing_ipv6_marks_not_configured() {
        let payload = json!({
            "GigabitEthernet1": { "ipv4": { "10.0.0.1": { "prefix_length": 24 } } }
        });
        let rows = extract_rows(Section::InterfacesIp, &payload).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].1,
            vec![
                text("GigabitEthernet1"),
                text("10.0.0.1"),
                CellValue::Number(24.0),
                text(NOT_CONFIGURED),
                text(NOT_CONFIGURED),
            ]
        );
    }

    #[test]
    fn test_address_pairs_one_row_each() {
        let payload = json!({
            "Vlan10": {
                "ipv4": { "10.0.0.1": { "prefix_length": 24 }, "10.0.1.1": { "prefix_length": 24 } },
                "ipv6": { "2001:db8::1": { "prefix_length": 64 } }
            }
        });
        let rows = extract_rows(Section::InterfacesIp, &payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "Vlan10#0000");
        assert_eq!(rows[0].1[3], text("2001:db8::1"));
        assert_eq!(rows[1].1[1], text("10.0.1.1"));
        assert_eq!(rows[1].1[3], text(NOT_CONFIGURED));
    }

    #[test]
    fn test_absent_subfields_become_empty_cells() {
        let payload = json!({ "Ethernet1": { "description": "uplink" } });
        let rows = extract_rows(Section::Interfaces, &payload).unwrap();
        assert_eq!(
            rows[0].1,
            vec![text("Ethernet1"), text("uplink"), CellValue::Empty, CellValue::Empty]
        );
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(extract_rows(Section::Interfaces, &json!("not a mapping")).is_err());
    }

    #[tokio::test]
    async fn test_raw_capture_is_unsupported() {
        let sink = TabularSink::new("/unused.xlsx");
        let err = sink
            .persist(
                Position::new(0, 0),
                &device("r1"),
                &Operation::getter("interfaces"),
                &json!({"command": "show interfaces", "output": "Gi1 is up"}),
            )
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<Unsupported>().is_some());
        assert!(sink.rows(Section::Interfaces).is_empty());
    }

    #[tokio::test]
    async fn test_rows_follow_position_not_arrival() {
        let sink = TabularSink::new("/unused.xlsx");
        let facts = Operation::getter("facts");

        sink.persist(Position::new(1, 0), &device("B"), &facts, &json!({"vendor": "Arista"}))
            .await
            .unwrap();
        sink.persist(Position::new(0, 0), &device("A"), &facts, &json!({"vendor": "Cisco"}))
            .await
            .unwrap();

        let rows = sink.rows(Section::Facts);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], text("A"));
        assert_eq!(rows[0][1], text("Cisco"));
        assert_eq!(rows[1][0], text("B"));
    }

    #[test]
    fn test_lldp_rows_per_neighbor_in_order() {
        let payload = json!({
            "Ethernet1": [
                { "hostname": "spine1", "port": "Ethernet7" },
                { "hostname": "spine2", "port": "Ethernet8" }
            ]
        });
        let rows = extract_rows(Section::Lldp, &payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, vec![text("Ethernet1"), text("spine1"), text("Ethernet7")]);
        assert_eq!(rows[1].1, vec![text("Ethernet1"), text("spine2"), text("Ethernet8")]);
    }

    #[test]
    fn test_users_row_cells() {
        let payload = json!({
            "admin": {
                "level": 15,
                "password": "$6$salt$hash",
                "sshkeys": ["ssh-rsa AAAA one", "ssh-ed25519 BBBB two"]
            }
        });
        let rows = extract_rows(Section::Users, &payload).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].1,
            vec![
                text("admin"),
                CellValue::Number(15.0),
                text("$6$salt$hash"),
                text("ssh-rsa AAAA one\nssh-ed25519 BBBB two"),
            ]
        );
    }

    #[test]
    fn test_missing_ipv4_marks_not_configured() {
        let payload = json!({
            "Loopback0": { "ipv6": { "2001:db8::1": { "prefix_length": 128 } } }
        });
        let rows = extract_rows(Section::InterfacesIp, &payload).unwrap();
        assert_eq!(
            rows[0].1,
            vec![
                text("Loopback0"),
                text(NOT_CONFIGURED),
                text(NOT_CONFIGURED),
                text("2001:db8::1"),
                CellValue::Number(128.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_rows_keep_payload_order_within_device() {
        let sink = TabularSink::new("/unused.xlsx");
        let payload: Value = serde_json::from_str(
            r#"{"Ethernet2": {"description": "a"}, "Ethernet10": {"description": "b"}}"#,
        )
        .unwrap();
        sink.persist(Position::new(0, 0), &device("leaf1"), &Operation::getter("interfaces"), &payload)
            .await
            .unwrap();

        let rows = sink.rows(Section::Interfaces);
        assert_eq!(rows[0][1], text("Ethernet2"));
        assert_eq!(rows[1][1], text("Ethernet10"));
    }

    #[tokio::test]
    async fn test_parsed_eos_lldp_fills_rows() {
        let output = "\
Port          Neighbor Device ID       Neighbor Port ID    TTL
---------- ------------------------ ---------------------- ---
Et1           spine1.lab               Ethernet2           120
Et2           spine2.lab               Ethernet2           120
";
        let op = Operation::getter("lldp_neighbors");
        let payload = crate::session::commands::normalize(
            crate::models::Platform::Eos,
            &op,
            "show lldp neighbors",
            output,
        );
        let sink = TabularSink::new("/unused.xlsx");
        sink.persist(Position::new(0, 0), &device("leaf1"), &op, &payload)
            .await
            .unwrap();

        let rows = sink.rows(Section::Lldp);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![text("leaf1"), text("Et1"), text("spine1.lab"), text("Ethernet2")]);
        assert_eq!(rows[1][2], text("spine2.lab"));
    }

    #[test]
    fn test_cell_text_cut_at_char_boundary() {
        assert_eq!(cell_text("short"), "short");

        let long = "é".repeat(MAX_CELL_CHARS + 10);
        let cut = cell_text(&long);
        assert_eq!(cut.chars().count(), MAX_CELL_CHARS);
        assert!(long.starts_with(cut));
    }

    #[tokio::test]
    async fn test_oversized_cell_still_writes_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let sink = TabularSink::new(&path);

        let description = "x".repeat(MAX_CELL_CHARS * 2);
        sink.persist(
            Position::new(0, 0),
            &device("r1"),
            &Operation::getter("interfaces"),
            &json!({ "Gi1": { "description": description } }),
        )
        .await
        .unwrap();

        tokio_test::assert_ok!(sink.finalize().await);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_finalize_writes_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let sink = TabularSink::new(&path);

        sink.persist(
            Position::new(0, 0),
            &device("r1"),
            &Operation::getter("users"),
            &json!({"admin": {"level": 15, "password": "$1$x", "sshkeys": []}}),
        )
        .await
        .unwrap();

        let written = tokio_test::assert_ok!(sink.finalize().await);
        assert_eq!(written, Some(path.clone()));
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
