pub mod collector;
pub mod discovery;
pub mod error;
pub mod model;
pub mod oids;
pub mod range;
pub mod scan;
pub mod settings;
pub mod snmp;
pub mod targets;

pub use collector::DetailCollector;
pub use discovery::{
    DiscoveryOutcome, DiscoveryPool, PrinterProbe, ProbeFuture, ProbeOutcome, SnmpPrinterProbe,
    DEFAULT_WORKERS,
};
pub use error::Error;
pub use model::{
    capacity_percent, DeviceReport, DiscoveredPrinter, PrinterStatus, SnmpAddress, StatusTable,
    SupplyRecord, TableReport, TrayRecord, DEFAULT_SNMP_PORT, HOST_RESOURCES_PRINTER_STATUS,
};
pub use range::{default_discovery_cidr, CidrIter, CidrRange};
pub use scan::{ScanSummary, Scanner};
pub use settings::{ScanSettings, SettingsOverrides, AUTO_CIDR, DEFAULT_CIDR, DEFAULT_COMMUNITY};
pub use snmp::{
    DecodedValue, MockAgent, MockSnmpClient, Oid, OidParseError, SnmpClient, SnmpConfig,
    SnmpFuture, SnmpRequest, SnmpResponse, SnmpV2cClient, SnmpValue, SnmpVarBind,
    SnmpWalkRequest, TOKIO_WORKER_STACK_SIZE_BYTES,
};
