//! Printer-MIB and MIB-II objects read by discovery and report collection.

use crate::snmp::Oid;

pub const SYS_DESCR_OID: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 1, 0];
pub const SYS_NAME_OID: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 5, 0];
pub const HR_PRINTER_STATUS_OID: [u32; 12] = [1, 3, 6, 1, 2, 1, 25, 3, 5, 1, 1, 1];
pub const PRT_GENERAL_PRINTER_NAME_OID: [u32; 12] = [1, 3, 6, 1, 2, 1, 43, 5, 1, 1, 16, 1];
pub const PRT_MARKER_LIFECOUNT_OID: [u32; 12] = [1, 3, 6, 1, 2, 1, 43, 10, 2, 1, 4, 1];

pub const PRT_MARKER_SUPPLIES_ENTRY_OID: [u32; 10] = [1, 3, 6, 1, 2, 1, 43, 11, 1, 1];
pub const SUPPLIES_DESCRIPTION_COLUMN: u32 = 6;
pub const SUPPLIES_MAX_CAPACITY_COLUMN: u32 = 8;
pub const SUPPLIES_LEVEL_COLUMN: u32 = 9;

pub const PRT_INPUT_ENTRY_OID: [u32; 10] = [1, 3, 6, 1, 2, 1, 43, 8, 2, 1];
pub const INPUT_NAME_COLUMN: u32 = 2;
pub const INPUT_MAX_CAPACITY_COLUMN: u32 = 8;
pub const INPUT_LEVEL_COLUMN: u32 = 9;

/// Naming objects tried in order once a printer answers the status probe.
pub fn naming_oids() -> Vec<Oid> {
    vec![
        Oid::from_slice(&PRT_GENERAL_PRINTER_NAME_OID),
        Oid::from_slice(&SYS_DESCR_OID),
        Oid::from_slice(&SYS_NAME_OID),
    ]
}

/// Single-value objects fetched in one request for a device report.
pub fn report_oids() -> Vec<Oid> {
    vec![
        Oid::from_slice(&SYS_DESCR_OID),
        Oid::from_slice(&HR_PRINTER_STATUS_OID),
        Oid::from_slice(&PRT_GENERAL_PRINTER_NAME_OID),
        Oid::from_slice(&PRT_MARKER_LIFECOUNT_OID),
    ]
}
