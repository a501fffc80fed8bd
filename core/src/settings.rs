use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::discovery::DEFAULT_WORKERS;
use crate::range::default_discovery_cidr;
use crate::{targets, Error};

pub const DEFAULT_CIDR: &str = "192.168.1.0/24";
pub const DEFAULT_COMMUNITY: &str = "public";
/// `--cidr auto` resolves the network of the first usable local interface.
pub const AUTO_CIDR: &str = "auto";

/// Scan parameters. Loaded from an optional RON file and then overridden
/// field by field by command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub cidr: String,
    pub community: String,
    pub workers: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            cidr: DEFAULT_CIDR.to_string(),
            community: DEFAULT_COMMUNITY.to_string(),
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub cidr: Option<String>,
    pub community: Option<String>,
    pub workers: Option<usize>,
}

impl ScanSettings {
    pub fn from_ron(contents: &str) -> Result<Self, Error> {
        ron::from_str(contents).map_err(|source| Error::Settings { path: None, source })
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let label = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| Error::SettingsIo {
            path: Some(label.clone()),
            source,
        })?;
        let settings = ron::from_str(&contents).map_err(|source| Error::Settings {
            path: Some(label.clone()),
            source,
        })?;
        debug!(target: targets::CLI, path = %label, "Settings loaded");
        Ok(settings)
    }

    pub fn apply(mut self, overrides: SettingsOverrides) -> Self {
        if let Some(cidr) = overrides.cidr {
            self.cidr = cidr;
        }
        if let Some(community) = overrides.community {
            self.community = community;
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        self
    }

    /// The CIDR to scan, with `auto` expanded. An `auto` that cannot be
    /// resolved is a configuration error.
    pub fn resolved_cidr(&self) -> Result<String, Error> {
        let cidr = self.cidr.trim();
        if !cidr.eq_ignore_ascii_case(AUTO_CIDR) {
            return Ok(cidr.to_string());
        }
        default_discovery_cidr().ok_or_else(|| Error::InvalidCidr {
            input: self.cidr.clone(),
            details: "no local IPv4 network found".to_string(),
        })
    }
}
