use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

pub const DEFAULT_SNMP_PORT: u16 = 161;

/// Printer MIB level sentinels: -2 is "unknown", -3 is "some remaining".
const UNKNOWN_LEVEL_SENTINELS: [i64; 2] = [-2, -3];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpAddress {
    pub host: String,
    pub port: u16,
}

impl SnmpAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn with_default_port(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SNMP_PORT,
        }
    }
}

impl From<Ipv4Addr> for SnmpAddress {
    fn from(value: Ipv4Addr) -> Self {
        Self::with_default_port(value.to_string())
    }
}

impl fmt::Display for SnmpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Immutable code-to-name table for `hrPrinterStatus`.
#[derive(Debug, Clone, Copy)]
pub struct StatusTable {
    entries: &'static [(i64, &'static str)],
}

impl StatusTable {
    pub const fn new(entries: &'static [(i64, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn name(&self, code: i64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, name)| *name)
    }

    pub fn resolve(&self, code: i64) -> PrinterStatus {
        PrinterStatus {
            code,
            name: self.name(code),
        }
    }
}

pub const HOST_RESOURCES_PRINTER_STATUS: StatusTable = StatusTable::new(&[
    (1, "other"),
    (2, "unknown"),
    (3, "idle"),
    (4, "printing"),
    (5, "warmup"),
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterStatus {
    pub code: i64,
    pub name: Option<&'static str>,
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{} (unknown)", self.code),
        }
    }
}

/// Integer percentage of capacity, floored. `None` when capacity is not
/// positive or the level is a negative sentinel.
pub fn capacity_percent(level: i64, capacity: i64) -> Option<i64> {
    if capacity > 0 && level >= 0 {
        Some(level.saturating_mul(100) / capacity)
    } else {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplyRecord {
    pub description: Option<String>,
    pub level: Option<i64>,
    pub max_capacity: Option<i64>,
}

impl SupplyRecord {
    pub fn percent(&self) -> Option<i64> {
        capacity_percent(self.level?, self.max_capacity?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrayRecord {
    pub name: Option<String>,
    pub level: Option<i64>,
    pub max_capacity: Option<i64>,
}

impl TrayRecord {
    pub fn percent(&self) -> Option<i64> {
        capacity_percent(self.level?, self.max_capacity?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableReport<T> {
    Entries(BTreeMap<u32, T>),
    NoData { reason: String },
}

impl<T> TableReport<T> {
    pub fn entries(&self) -> Option<&BTreeMap<u32, T>> {
        match self {
            TableReport::Entries(entries) => Some(entries),
            TableReport::NoData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPrinter {
    pub address: Ipv4Addr,
    pub name: Option<String>,
}

impl fmt::Display for DiscoveredPrinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref() {
            Some(name) => write!(f, "Found printer: {} -> {}", self.address, name),
            None => write!(f, "Found printer: {} -> (unnamed)", self.address),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub address: Ipv4Addr,
    pub sys_descr: Option<String>,
    pub printer_name: Option<String>,
    pub status: Option<PrinterStatus>,
    pub total_pages: Option<i64>,
    pub supplies: TableReport<SupplyRecord>,
    pub trays: TableReport<TrayRecord>,
}

impl DeviceReport {
    pub fn new(address: Ipv4Addr) -> Self {
        Self {
            address,
            sys_descr: None,
            printer_name: None,
            status: None,
            total_pages: None,
            supplies: TableReport::NoData {
                reason: "not collected".to_string(),
            },
            trays: TableReport::NoData {
                reason: "not collected".to_string(),
            },
        }
    }
}

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Printer Report for {}:", self.address)?;
        if let Some(descr) = self.sys_descr.as_deref() {
            writeln!(f, "  System Description: {descr}")?;
        }
        if let Some(name) = self.printer_name.as_deref() {
            writeln!(f, "  Printer Name: {name}")?;
        }
        if let Some(status) = self.status {
            writeln!(f, "  Printer Status: {status}")?;
        }
        if let Some(pages) = self.total_pages {
            writeln!(f, "  Total Pages Printed: {pages}")?;
        }

        match &self.supplies {
            TableReport::Entries(entries) if !entries.is_empty() => {
                writeln!(f, "  Supplies:")?;
                for supply in entries.values() {
                    let label = supply.description.as_deref().unwrap_or("Unknown Supply");
                    write_level_line(f, label, supply.level, supply.max_capacity)?;
                }
            }
            TableReport::Entries(_) => writeln!(f, "  Supplies: (No data available: empty table)")?,
            TableReport::NoData { reason } => {
                writeln!(f, "  Supplies: (No data available: {reason})")?
            }
        }

        match &self.trays {
            TableReport::Entries(entries) if !entries.is_empty() => {
                writeln!(f, "  Paper Trays:")?;
                for tray in entries.values() {
                    let label = tray.name.as_deref().unwrap_or("Unknown Tray");
                    write_level_line(f, label, tray.level, tray.max_capacity)?;
                }
            }
            TableReport::Entries(_) => {
                writeln!(f, "  Paper Trays: (No data available: empty table)")?
            }
            TableReport::NoData { reason } => {
                writeln!(f, "  Paper Trays: (No data available: {reason})")?
            }
        }

        Ok(())
    }
}

fn write_level_line(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    level: Option<i64>,
    capacity: Option<i64>,
) -> fmt::Result {
    let Some(level) = level else {
        return writeln!(f, "    - {label}: (unknown)");
    };

    write!(f, "    - {label}: {level}")?;
    match capacity.and_then(|capacity| capacity_percent(level, capacity).map(|pct| (pct, capacity)))
    {
        Some((pct, capacity)) => write!(f, " ({pct}% of {capacity})")?,
        None if UNKNOWN_LEVEL_SENTINELS.contains(&level) => f.write_str(" (unknown)")?,
        None => {}
    }
    writeln!(f)
}
