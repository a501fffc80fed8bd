use std::path::PathBuf;

use clap::Parser;

use printscan_core::SettingsOverrides;

use crate::logging::LogLevel;

/// Discover SNMP printers in a network range and report their status,
/// page counts, supplies and paper trays.
#[derive(Debug, Parser)]
#[command(name = "printscan", version)]
pub struct CommandLine {
    /// Network CIDR to scan, or `auto` for the local network [default: 192.168.1.0/24]
    #[arg(long)]
    pub cidr: Option<String>,

    /// SNMP v2c community string [default: public]
    #[arg(long)]
    pub community: Option<String>,

    /// Number of concurrent discovery workers [default: 10]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: Option<u32>,

    /// RON settings file; flags override its values
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log verbosity on stderr (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value_t)]
    pub log_level: LogLevel,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            cidr: self.cidr.clone(),
            community: self.community.clone(),
            workers: self.workers.map(|workers| workers as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_become_overrides() {
        let cli = CommandLine::try_parse_from([
            "printscan",
            "--cidr",
            "10.0.0.0/24",
            "--workers",
            "32",
            "--log-level",
            "debug",
        ])
        .expect("parse");

        assert_eq!(cli.log_level, LogLevel::Debug);
        assert_eq!(
            cli.overrides(),
            SettingsOverrides {
                cidr: Some("10.0.0.0/24".to_string()),
                community: None,
                workers: Some(32),
            }
        );
    }

    #[test]
    fn no_flags_means_no_overrides() {
        let cli = CommandLine::try_parse_from(["printscan"]).expect("parse");
        assert_eq!(cli.overrides(), SettingsOverrides::default());
        assert_eq!(cli.log_level, LogLevel::Warn);
        assert!(cli.config.is_none());
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(CommandLine::try_parse_from(["printscan", "--workers", "0"]).is_err());
    }
}
