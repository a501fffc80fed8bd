#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid CIDR: {input}")]
    InvalidCidr { input: String, details: String },
    #[error("SNMP authentication failed for {address}")]
    SnmpAuth {
        address: String,
        details: Option<String>,
    },
    #[error("SNMP timeout for {address}")]
    SnmpTimeout { address: String, timeout_ms: u64 },
    #[error("SNMP failure for {address}")]
    SnmpFailure { address: String, details: String },
    #[error("Settings parse error")]
    Settings {
        path: Option<String>,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("Settings read error")]
    SettingsIo {
        path: Option<String>,
        #[source]
        source: std::io::Error,
    },
    #[error("Report output error")]
    Output {
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Configuration errors abort the run before any network activity.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidCidr { .. } | Error::Settings { .. } | Error::SettingsIo { .. }
        )
    }

    pub fn user_summary(&self) -> String {
        match self {
            Error::InvalidCidr { input, .. } => format!("Invalid CIDR: {input}."),
            Error::SnmpAuth { address, .. } => {
                format!("SNMP authentication failed for {address}.")
            }
            Error::SnmpTimeout { address, .. } => {
                format!("SNMP request timed out for {address}.")
            }
            Error::SnmpFailure { address, .. } => {
                format!("SNMP error for {address}.")
            }
            Error::Settings { .. } => "Failed to parse settings file.".to_string(),
            Error::SettingsIo { .. } => "Failed to read settings file.".to_string(),
            Error::Output { .. } => "Failed to write report.".to_string(),
        }
    }

    pub fn technical_detail(&self) -> String {
        match self {
            Error::InvalidCidr { input, details } => {
                format!("Invalid CIDR {input:?}: {details}.")
            }
            Error::SnmpAuth { address, details } => {
                let extra = details
                    .as_ref()
                    .map(|text| format!(" ({text})"))
                    .unwrap_or_default();
                format!("SNMP auth failed for {address}{extra}.")
            }
            Error::SnmpTimeout {
                address,
                timeout_ms,
            } => format!("SNMP timeout after {timeout_ms}ms for {address}."),
            Error::SnmpFailure { address, details } => {
                format!("SNMP failure for {address}: {details}")
            }
            Error::Settings { path, source } => {
                let path = path
                    .as_ref()
                    .map(|value| format!(" path={value}."))
                    .unwrap_or_default();
                format!("Settings parse error.{path} {source}")
            }
            Error::SettingsIo { path, source } => {
                let path = path
                    .as_ref()
                    .map(|value| format!(" path={value}."))
                    .unwrap_or_default();
                format!("Settings read error.{path} {source}")
            }
            Error::Output { source } => format!("Report output error: {source}"),
        }
    }
}
