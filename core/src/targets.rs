pub const DISCOVERY: &str = "printscan::discovery";
pub const SNMP: &str = "printscan::snmp";
pub const REPORT: &str = "printscan::report";
pub const CLI: &str = "printscan::cli";
