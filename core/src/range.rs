use std::net::Ipv4Addr;

use get_if_addrs::{get_if_addrs, IfAddr};
use tracing::{debug, warn};

use crate::{targets, Error};

/// An IPv4 CIDR block. Iteration covers every address in the block,
/// network and broadcast included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    network: u32,
    prefix: u8,
}

impl CidrRange {
    pub fn parse(value: &str) -> Result<Self, Error> {
        let input = value.trim();
        let invalid = |details: String| Error::InvalidCidr {
            input: value.to_string(),
            details,
        };

        let (addr, prefix) = input
            .split_once('/')
            .ok_or_else(|| invalid("CIDR must include a /prefix".to_string()))?;
        let ip: Ipv4Addr = addr
            .parse()
            .map_err(|_| invalid(format!("Invalid IPv4 address: {addr}")))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| invalid(format!("Invalid prefix length: {prefix}")))?;
        if prefix > 32 {
            return Err(invalid(format!("Prefix length out of range: {prefix}")));
        }

        Ok(Self {
            network: ipv4_to_u32(ip) & prefix_to_mask(prefix),
            prefix,
        })
    }

    pub fn iter(&self) -> CidrIter {
        CidrIter {
            next: Some(self.network),
            last: self.broadcast_u32(),
        }
    }

    /// `2^(32 - prefix)`; a `/0` block holds 2^32 addresses.
    pub fn host_count(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    pub fn network(&self) -> Ipv4Addr {
        u32_to_ipv4(self.network)
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        u32_to_ipv4(self.broadcast_u32())
    }

    fn broadcast_u32(&self) -> u32 {
        self.network | !prefix_to_mask(self.prefix)
    }
}

impl IntoIterator for CidrRange {
    type Item = Ipv4Addr;
    type IntoIter = CidrIter;

    fn into_iter(self) -> CidrIter {
        self.iter()
    }
}

impl std::fmt::Display for CidrRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix)
    }
}

#[derive(Debug, Clone)]
pub struct CidrIter {
    next: Option<u32>,
    last: u32,
}

impl Iterator for CidrIter {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current == self.last {
            None
        } else {
            current.checked_add(1)
        };
        Some(u32_to_ipv4(current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(current) => {
                let remaining = u64::from(self.last - current) + 1;
                match usize::try_from(remaining) {
                    Ok(remaining) => (remaining, Some(remaining)),
                    Err(_) => (usize::MAX, None),
                }
            }
            None => (0, Some(0)),
        }
    }
}

/// Network of the first non-loopback, non-link-local IPv4 interface.
pub fn default_discovery_cidr() -> Option<String> {
    let interfaces = match get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(error) => {
            warn!(target: targets::DISCOVERY, error = %error, "Interface lookup failed");
            return None;
        }
    };

    for iface in interfaces {
        let addr = match iface.addr {
            IfAddr::V4(v4) => v4,
            _ => continue,
        };
        if addr.ip.is_loopback() || addr.ip.is_link_local() {
            continue;
        }

        let Some(prefix) = netmask_to_prefix(addr.netmask) else {
            continue;
        };
        if prefix == 32 {
            continue;
        }
        let network = ipv4_to_u32(addr.ip) & prefix_to_mask(prefix);
        let cidr = format!("{}/{}", u32_to_ipv4(network), prefix);
        debug!(
            target: targets::DISCOVERY,
            interface = %iface.name,
            cidr = %cidr,
            "Resolved local network"
        );
        return Some(cidr);
    }
    None
}

fn netmask_to_prefix(mask: Ipv4Addr) -> Option<u8> {
    let mask_u32 = ipv4_to_u32(mask);
    let prefix = u8::try_from(mask_u32.count_ones()).ok()?;
    if mask_u32 == prefix_to_mask(prefix) {
        Some(prefix)
    } else {
        warn!(
            target: targets::DISCOVERY,
            mask = %mask,
            "Non-contiguous netmask ignored"
        );
        None
    }
}

fn prefix_to_mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    }
}

fn ipv4_to_u32(ip: Ipv4Addr) -> u32 {
    u32::from_be_bytes(ip.octets())
}

fn u32_to_ipv4(value: u32) -> Ipv4Addr {
    Ipv4Addr::from(value)
}
