use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::model::{
    DeviceReport, SnmpAddress, StatusTable, SupplyRecord, TableReport, TrayRecord,
    HOST_RESOURCES_PRINTER_STATUS,
};
use crate::oids::{
    report_oids, HR_PRINTER_STATUS_OID, INPUT_LEVEL_COLUMN, INPUT_MAX_CAPACITY_COLUMN,
    INPUT_NAME_COLUMN, PRT_GENERAL_PRINTER_NAME_OID, PRT_INPUT_ENTRY_OID,
    PRT_MARKER_LIFECOUNT_OID, PRT_MARKER_SUPPLIES_ENTRY_OID, SUPPLIES_DESCRIPTION_COLUMN,
    SUPPLIES_LEVEL_COLUMN, SUPPLIES_MAX_CAPACITY_COLUMN, SYS_DESCR_OID,
};
use crate::snmp::{DecodedValue, Oid, SnmpClient, SnmpRequest, SnmpVarBind, SnmpWalkRequest};
use crate::{targets, Error};

/// Builds a [`DeviceReport`] for one confirmed printer: a batch GET of the
/// scalar objects followed by walks of the supplies and input tables.
#[derive(Debug, Clone)]
pub struct DetailCollector<C> {
    client: C,
    status_table: StatusTable,
}

impl<C: SnmpClient> DetailCollector<C> {
    pub fn new(client: C) -> Self {
        Self::with_status_table(client, HOST_RESOURCES_PRINTER_STATUS)
    }

    pub fn with_status_table(client: C, status_table: StatusTable) -> Self {
        Self {
            client,
            status_table,
        }
    }

    /// Fails only when the scalar fetch fails. Table problems degrade the
    /// affected section to [`TableReport::NoData`].
    pub async fn collect(&self, ip: Ipv4Addr) -> Result<DeviceReport, Error> {
        let address = SnmpAddress::from(ip);
        let response = self
            .client
            .get(SnmpRequest::new(address.clone(), report_oids()))
            .await?;

        let mut report = DeviceReport::new(ip);
        for varbind in &response.varbinds {
            self.apply_scalar(&address, &mut report, varbind);
        }

        report.supplies = self
            .walk_table(&address, &PRT_MARKER_SUPPLIES_ENTRY_OID, apply_supply_column)
            .await;
        report.trays = self
            .walk_table(&address, &PRT_INPUT_ENTRY_OID, apply_input_column)
            .await;

        debug!(
            target: targets::REPORT,
            address = %address,
            supplies = report.supplies.entries().map_or(0, BTreeMap::len),
            trays = report.trays.entries().map_or(0, BTreeMap::len),
            "Device report collected"
        );
        Ok(report)
    }

    fn apply_scalar(&self, address: &SnmpAddress, report: &mut DeviceReport, varbind: &SnmpVarBind) {
        let oid = varbind.oid.as_slice();
        let decoded = varbind.value.decode();

        if oid == SYS_DESCR_OID {
            report.sys_descr = expect_text(address, &varbind.oid, decoded);
        } else if oid == PRT_GENERAL_PRINTER_NAME_OID {
            report.printer_name = expect_text(address, &varbind.oid, decoded);
        } else if oid == HR_PRINTER_STATUS_OID {
            report.status = expect_integer(address, &varbind.oid, decoded)
                .map(|code| self.status_table.resolve(code));
        } else if oid == PRT_MARKER_LIFECOUNT_OID {
            report.total_pages = expect_integer(address, &varbind.oid, decoded);
        } else {
            debug!(
                target: targets::REPORT,
                address = %address,
                oid = %varbind.oid,
                "Unrequested object in response"
            );
        }
    }

    async fn walk_table<T: Default>(
        &self,
        address: &SnmpAddress,
        root: &[u32],
        apply: fn(&SnmpAddress, &mut T, u32, &SnmpVarBind),
    ) -> TableReport<T> {
        let root = Oid::from_slice(root);
        let request = SnmpWalkRequest::new(address.clone(), root.clone());
        let response = match self.client.walk(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    target: targets::REPORT,
                    address = %address,
                    root = %root,
                    error = %error.technical_detail(),
                    "Table walk failed"
                );
                return TableReport::NoData {
                    reason: error.technical_detail(),
                };
            }
        };

        let rows = collect_rows(address, &root, &response.varbinds, apply);
        if rows.is_empty() {
            return TableReport::NoData {
                reason: "table is empty".to_string(),
            };
        }
        TableReport::Entries(rows)
    }
}

/// Groups walked entries by row index (final arc). Every row index seen
/// gets a record; the column arc picks the field to fill.
fn collect_rows<T: Default>(
    address: &SnmpAddress,
    root: &Oid,
    varbinds: &[SnmpVarBind],
    apply: fn(&SnmpAddress, &mut T, u32, &SnmpVarBind),
) -> BTreeMap<u32, T> {
    let mut rows = BTreeMap::new();
    for varbind in varbinds {
        let (Some(column), Some(index)) = (varbind.oid.column_under(root), varbind.oid.last_arc())
        else {
            continue;
        };
        // A bare column OID has no row index below it.
        if varbind.oid.as_slice().len() <= root.as_slice().len() + 1 {
            continue;
        }
        let row = rows.entry(index).or_insert_with(T::default);
        apply(address, row, column, varbind);
    }
    rows
}

fn apply_supply_column(
    address: &SnmpAddress,
    supply: &mut SupplyRecord,
    column: u32,
    varbind: &SnmpVarBind,
) {
    let decoded = varbind.value.decode();
    match column {
        SUPPLIES_DESCRIPTION_COLUMN => {
            if let Some(text) = expect_text(address, &varbind.oid, decoded) {
                supply.description = Some(text);
            }
        }
        SUPPLIES_LEVEL_COLUMN => {
            if let Some(level) = expect_integer(address, &varbind.oid, decoded) {
                supply.level = Some(level);
            }
        }
        SUPPLIES_MAX_CAPACITY_COLUMN => {
            if let Some(capacity) = expect_integer(address, &varbind.oid, decoded) {
                supply.max_capacity = Some(capacity);
            }
        }
        _ => {}
    }
}

fn apply_input_column(address: &SnmpAddress, tray: &mut TrayRecord, column: u32, varbind: &SnmpVarBind) {
    let decoded = varbind.value.decode();
    match column {
        INPUT_NAME_COLUMN => {
            if let Some(text) = expect_text(address, &varbind.oid, decoded) {
                tray.name = Some(text);
            }
        }
        INPUT_LEVEL_COLUMN => {
            if let Some(level) = expect_integer(address, &varbind.oid, decoded) {
                tray.level = Some(level);
            }
        }
        INPUT_MAX_CAPACITY_COLUMN => {
            if let Some(capacity) = expect_integer(address, &varbind.oid, decoded) {
                tray.max_capacity = Some(capacity);
            }
        }
        _ => {}
    }
}

fn expect_text(address: &SnmpAddress, oid: &Oid, decoded: DecodedValue) -> Option<String> {
    match decoded {
        DecodedValue::Text(text) if !text.is_empty() => Some(text),
        DecodedValue::Text(_) | DecodedValue::NotPresent => None,
        DecodedValue::Integer(_) | DecodedValue::WrongType => {
            log_mismatch(address, oid, "text");
            None
        }
    }
}

fn expect_integer(address: &SnmpAddress, oid: &Oid, decoded: DecodedValue) -> Option<i64> {
    match decoded {
        DecodedValue::Integer(value) => Some(value),
        DecodedValue::NotPresent => None,
        DecodedValue::Text(_) | DecodedValue::WrongType => {
            log_mismatch(address, oid, "integer");
            None
        }
    }
}

fn log_mismatch(address: &SnmpAddress, oid: &Oid, expected: &'static str) {
    debug!(
        target: targets::REPORT,
        address = %address,
        oid = %oid,
        expected,
        "Ignoring value of unexpected type"
    );
}
