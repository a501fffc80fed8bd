use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snmp2::{AsyncSession, Error as Snmp2Error, Oid as Snmp2Oid, Value as Snmp2Value};

use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::targets;
use crate::{Error, SnmpAddress};

const MAX_OIDS_PER_GET: usize = 24;
const DEFAULT_WALK_LIMIT: usize = 512;

/// Worker stack size for runtimes that drive [`SnmpV2cClient`]. snmp2 session
/// futures overflow tokio's 2 MiB default in unoptimized builds.
pub const TOKIO_WORKER_STACK_SIZE_BYTES: usize = 8 * 1024 * 1024;

/// Transport settings for SNMP v2c. Only the community is user-facing; the
/// timeout and retry count are fixed for scans.
#[derive(Debug, Clone)]
pub struct SnmpConfig {
    pub community: String,
    pub timeout: Duration,
    pub retries: u32,
}

impl SnmpConfig {
    pub fn with_community(community: impl Into<String>) -> Self {
        Self {
            community: community.into(),
            ..Self::default()
        }
    }
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            community: "public".to_string(),
            timeout: Duration::from_secs(3),
            retries: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnmpRequest {
    pub address: SnmpAddress,
    pub community: Option<String>,
    pub oids: Vec<Oid>,
}

impl SnmpRequest {
    pub fn new(address: SnmpAddress, oids: Vec<Oid>) -> Self {
        Self {
            address,
            community: None,
            oids,
        }
    }

    pub fn with_community(mut self, community: impl Into<String>) -> Self {
        self.community = Some(community.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SnmpWalkRequest {
    pub address: SnmpAddress,
    pub community: Option<String>,
    pub root_oid: Oid,
    /// Upper bound on returned entries; `0` means unbounded.
    pub max_results: usize,
}

impl SnmpWalkRequest {
    pub fn new(address: SnmpAddress, root_oid: Oid) -> Self {
        Self {
            address,
            community: None,
            root_oid,
            max_results: DEFAULT_WALK_LIMIT,
        }
    }

    pub fn with_community(mut self, community: impl Into<String>) -> Self {
        self.community = Some(community.into());
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SnmpResponse {
    pub address: SnmpAddress,
    pub varbinds: Vec<SnmpVarBind>,
}

impl SnmpResponse {
    pub fn value_of(&self, oid: &Oid) -> Option<&SnmpValue> {
        self.varbinds
            .iter()
            .find(|varbind| varbind.oid == *oid)
            .map(|varbind| &varbind.value)
    }
}

#[derive(Debug, Clone)]
pub struct SnmpVarBind {
    pub oid: Oid,
    pub value: SnmpValue,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Oid(pub Vec<u32>);

impl Oid {
    pub fn from_slice(slice: &[u32]) -> Self {
        Self(slice.to_vec())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn starts_with(&self, root: &Oid) -> bool {
        self.0.len() >= root.0.len() && self.0[..root.0.len()] == root.0[..]
    }

    /// Table column directly below `root`, e.g. `9` for `root.9.1.3`.
    pub fn column_under(&self, root: &Oid) -> Option<u32> {
        if !self.starts_with(root) {
            return None;
        }
        self.0.get(root.0.len()).copied()
    }

    /// Row index of a table entry: the final arc.
    pub fn last_arc(&self) -> Option<u32> {
        self.0.last().copied()
    }
}

impl From<Vec<u32>> for Oid {
    fn from(value: Vec<u32>) -> Self {
        Self(value)
    }
}

impl From<&[u32]> for Oid {
    fn from(value: &[u32]) -> Self {
        Self::from_slice(value)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            first = false;
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidParseError {
    pub component: String,
}

impl fmt::Display for OidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid OID component: {}", self.component)
    }
}

impl std::error::Error for OidParseError {}

impl FromStr for Oid {
    type Err = OidParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = Vec::new();
        for part in value.split('.') {
            if part.is_empty() {
                continue;
            }
            let parsed = part.parse::<u32>().map_err(|_| OidParseError {
                component: part.to_string(),
            })?;
            parts.push(parsed);
        }

        if parts.is_empty() {
            return Err(OidParseError {
                component: value.to_string(),
            });
        }

        Ok(Oid(parts))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Null,
    Integer(i64),
    Unsigned32(u32),
    Counter32(u32),
    Counter64(u64),
    Timeticks(u32),
    OctetString(Vec<u8>),
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Opaque(Vec<u8>),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    Other(String),
}

/// A raw value narrowed to what report fields can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    Text(String),
    Integer(i64),
    NotPresent,
    WrongType,
}

impl SnmpValue {
    /// True for the v2c exception markers an agent returns in place of a value.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance | SnmpValue::EndOfMibView
        )
    }

    pub fn decode(&self) -> DecodedValue {
        match self {
            value if value.is_missing() => DecodedValue::NotPresent,
            SnmpValue::Integer(value) => DecodedValue::Integer(*value),
            SnmpValue::Unsigned32(value) | SnmpValue::Counter32(value) => {
                DecodedValue::Integer(i64::from(*value))
            }
            SnmpValue::Counter64(value) => match i64::try_from(*value) {
                Ok(value) => DecodedValue::Integer(value),
                Err(_) => DecodedValue::WrongType,
            },
            SnmpValue::OctetString(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                let text = text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
                DecodedValue::Text(text.to_string())
            }
            _ => DecodedValue::WrongType,
        }
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpValue::Null => f.write_str("null"),
            SnmpValue::Integer(value) => write!(f, "{value}"),
            SnmpValue::Unsigned32(value) => write!(f, "{value}"),
            SnmpValue::Counter32(value) => write!(f, "{value}"),
            SnmpValue::Counter64(value) => write!(f, "{value}"),
            SnmpValue::Timeticks(value) => write!(f, "{value} ticks"),
            SnmpValue::OctetString(bytes) | SnmpValue::Opaque(bytes) => {
                f.write_str(&String::from_utf8_lossy(bytes))
            }
            SnmpValue::ObjectIdentifier(oid) => write!(f, "{oid}"),
            SnmpValue::IpAddress(bytes) => {
                write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
            }
            SnmpValue::NoSuchObject => f.write_str("noSuchObject"),
            SnmpValue::NoSuchInstance => f.write_str("noSuchInstance"),
            SnmpValue::EndOfMibView => f.write_str("endOfMibView"),
            SnmpValue::Other(value) => f.write_str(value),
        }
    }
}

pub type SnmpFuture<'a> =
    Pin<Box<dyn Future<Output = Result<SnmpResponse, Error>> + Send + 'a>>;

pub trait SnmpClient: Send + Sync {
    fn get<'a>(&'a self, request: SnmpRequest) -> SnmpFuture<'a>;

    fn walk<'a>(&'a self, request: SnmpWalkRequest) -> SnmpFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct SnmpV2cClient {
    config: SnmpConfig,
}

impl SnmpV2cClient {
    pub fn new(config: SnmpConfig) -> Self {
        Self { config }
    }

    pub async fn get(&self, request: SnmpRequest) -> Result<SnmpResponse, Error> {
        let SnmpRequest {
            address,
            community,
            oids,
        } = request;

        let config = self.config.clone();
        let community = community.unwrap_or_else(|| config.community.clone());
        let address_label = address.to_string();

        debug!(
            target: targets::SNMP,
            address = %address_label,
            count = oids.len(),
            timeout_ms = config.timeout.as_millis(),
            retries = config.retries,
            "SNMP GET"
        );
        for oid in &oids {
            trace!(target: targets::SNMP, address = %address_label, oid = %oid, "SNMP OID");
        }

        match Box::pin(async_get(address, community, oids, config)).await {
            Ok(response) => {
                for varbind in &response.varbinds {
                    trace!(
                        target: targets::SNMP,
                        address = %address_label,
                        oid = %varbind.oid,
                        value = %varbind.value,
                        "SNMP value"
                    );
                }
                Ok(response)
            }
            Err(error) => {
                debug!(
                    target: targets::SNMP,
                    address = %address_label,
                    error = %error.technical_detail(),
                    "SNMP GET failed"
                );
                Err(error)
            }
        }
    }

    pub async fn walk(&self, request: SnmpWalkRequest) -> Result<SnmpResponse, Error> {
        let SnmpWalkRequest {
            address,
            community,
            root_oid,
            max_results,
        } = request;

        let config = self.config.clone();
        let community = community.unwrap_or_else(|| config.community.clone());
        let address_label = address.to_string();

        debug!(
            target: targets::SNMP,
            address = %address_label,
            root = %root_oid,
            max_results,
            "SNMP WALK"
        );

        match Box::pin(async_walk(address, community, root_oid, max_results, config)).await {
            Ok(response) => {
                debug!(
                    target: targets::SNMP,
                    address = %address_label,
                    count = response.varbinds.len(),
                    "SNMP WALK ok"
                );
                for varbind in &response.varbinds {
                    trace!(
                        target: targets::SNMP,
                        address = %address_label,
                        oid = %varbind.oid,
                        value = %varbind.value,
                        "SNMP walk value"
                    );
                }
                Ok(response)
            }
            Err(error) => {
                warn!(
                    target: targets::SNMP,
                    address = %address_label,
                    error = %error.technical_detail(),
                    "SNMP WALK failed"
                );
                Err(error)
            }
        }
    }
}

impl SnmpClient for SnmpV2cClient {
    fn get<'a>(&'a self, request: SnmpRequest) -> SnmpFuture<'a> {
        Box::pin(async move { SnmpV2cClient::get(self, request).await })
    }

    fn walk<'a>(&'a self, request: SnmpWalkRequest) -> SnmpFuture<'a> {
        Box::pin(async move { SnmpV2cClient::walk(self, request).await })
    }
}

/// Scripted agent state for one host of a [`MockSnmpClient`].
#[derive(Debug, Clone, Default)]
pub struct MockAgent {
    values: HashMap<Oid, SnmpValue>,
    failing_walks: HashSet<Oid>,
    community: Option<String>,
    unreachable: bool,
}

impl MockAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_value(mut self, oid: impl Into<Oid>, value: SnmpValue) -> Self {
        self.values.insert(oid.into(), value);
        self
    }

    pub fn with_text(self, oid: impl Into<Oid>, text: &str) -> Self {
        self.with_value(oid, SnmpValue::OctetString(text.as_bytes().to_vec()))
    }

    /// Requests carrying any other community are rejected.
    pub fn with_community(mut self, community: impl Into<String>) -> Self {
        self.community = Some(community.into());
        self
    }

    pub fn with_failing_walk(mut self, root: impl Into<Oid>) -> Self {
        self.failing_walks.insert(root.into());
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    agents: HashMap<String, MockAgent>,
    requests: usize,
}

/// In-memory [`SnmpClient`]. Hosts without an agent behave like silent
/// addresses and time out.
#[derive(Debug, Clone)]
pub struct MockSnmpClient {
    config: SnmpConfig,
    state: Arc<Mutex<MockState>>,
}

impl MockSnmpClient {
    pub fn new() -> Self {
        Self::with_config(SnmpConfig::default())
    }

    pub fn with_config(config: SnmpConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn add_agent(&self, host: impl Into<String>, agent: MockAgent) {
        if let Ok(mut state) = self.state.lock() {
            state.agents.insert(host.into(), agent);
        }
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().map(|state| state.requests).unwrap_or(0)
    }

    fn agent_for(&self, address: &SnmpAddress, community: Option<&str>) -> Result<MockAgent, Error> {
        let agent = match self.state.lock() {
            Ok(mut state) => {
                state.requests += 1;
                state.agents.get(&address.host).cloned()
            }
            Err(_) => None,
        };

        let agent = match agent {
            Some(agent) if !agent.unreachable => agent,
            _ => {
                return Err(Error::SnmpTimeout {
                    address: address.to_string(),
                    timeout_ms: duration_ms(self.config.timeout),
                });
            }
        };

        let community = community.unwrap_or(&self.config.community);
        match agent.community.as_deref() {
            Some(expected) if expected != community => Err(Error::SnmpAuth {
                address: address.to_string(),
                details: Some("community mismatch".to_string()),
            }),
            _ => Ok(agent),
        }
    }
}

impl Default for MockSnmpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SnmpClient for MockSnmpClient {
    fn get<'a>(&'a self, request: SnmpRequest) -> SnmpFuture<'a> {
        Box::pin(async move {
            let agent = self.agent_for(&request.address, request.community.as_deref())?;
            let varbinds = request
                .oids
                .into_iter()
                .map(|oid| {
                    let value = agent
                        .values
                        .get(&oid)
                        .cloned()
                        .unwrap_or(SnmpValue::NoSuchObject);
                    SnmpVarBind { oid, value }
                })
                .collect();
            Ok(SnmpResponse {
                address: request.address,
                varbinds,
            })
        })
    }

    fn walk<'a>(&'a self, request: SnmpWalkRequest) -> SnmpFuture<'a> {
        Box::pin(async move {
            let agent = self.agent_for(&request.address, request.community.as_deref())?;
            if agent.failing_walks.contains(&request.root_oid) {
                return Err(Error::SnmpFailure {
                    address: request.address.to_string(),
                    details: format!("walk of {} rejected", request.root_oid),
                });
            }

            let mut varbinds: Vec<SnmpVarBind> = agent
                .values
                .iter()
                .filter(|(oid, _)| oid.starts_with(&request.root_oid) && **oid != request.root_oid)
                .map(|(oid, value)| SnmpVarBind {
                    oid: oid.clone(),
                    value: value.clone(),
                })
                .collect();
            varbinds.sort_by(|left, right| left.oid.cmp(&right.oid));
            if request.max_results > 0 {
                varbinds.truncate(request.max_results);
            }

            Ok(SnmpResponse {
                address: request.address,
                varbinds,
            })
        })
    }
}

async fn async_get(
    address: SnmpAddress,
    community: String,
    oids: Vec<Oid>,
    config: SnmpConfig,
) -> Result<SnmpResponse, Error> {
    let address_label = address.to_string();
    let mut session = open_session(&address, &community, &config).await?;
    let snmp_oids = to_snmp2_oids(&address, &oids)?;
    let mut varbinds = Vec::new();

    for chunk in snmp_oids.chunks(MAX_OIDS_PER_GET) {
        let oid_refs: Vec<&Snmp2Oid> = chunk.iter().collect();
        varbinds.extend(
            get_many_with_retries(
                session.as_mut(),
                &address,
                &address_label,
                &config,
                oid_refs.as_slice(),
            )
            .await?,
        );
    }

    Ok(SnmpResponse { address, varbinds })
}

async fn async_walk(
    address: SnmpAddress,
    community: String,
    root_oid: Oid,
    max_results: usize,
    config: SnmpConfig,
) -> Result<SnmpResponse, Error> {
    let address_label = address.to_string();
    let mut session = open_session(&address, &community, &config).await?;
    let mut current = to_snmp2_oid(&address, &root_oid)?;
    let mut last_seen = root_oid.clone();
    let mut results = Vec::new();
    let timeout_ms = duration_ms(config.timeout);

    loop {
        if max_results > 0 && results.len() >= max_results {
            debug!(
                target: targets::SNMP,
                address = %address_label,
                root = %root_oid,
                max_results,
                "SNMP WALK truncated"
            );
            break;
        }

        let mut attempts = 0;
        let pdu = loop {
            match timeout(config.timeout, session.getnext(&current)).await {
                Ok(Ok(pdu)) => break pdu,
                Ok(Err(error)) => {
                    if attempts < config.retries {
                        attempts += 1;
                        continue;
                    }
                    return Err(map_snmp2_error(&address, error));
                }
                Err(_) => {
                    if attempts < config.retries {
                        attempts += 1;
                        continue;
                    }
                    return Err(Error::SnmpTimeout {
                        address: address.to_string(),
                        timeout_ms,
                    });
                }
            }
        };

        let Some((oid, value)) = pdu.varbinds.into_iter().next() else {
            break;
        };

        let mapped_oid = map_snmp2_oid(&address_label, &oid);
        let mapped_value = map_snmp2_value(&address_label, value);
        // The subtree ends at the first OID outside the root, at an
        // endOfMibView marker, or when the agent stops advancing.
        if mapped_oid.0.is_empty()
            || !mapped_oid.starts_with(&root_oid)
            || mapped_value.is_missing()
            || mapped_oid <= last_seen
        {
            break;
        }

        results.push(SnmpVarBind {
            oid: mapped_oid.clone(),
            value: mapped_value,
        });
        current = oid.to_owned();
        last_seen = mapped_oid;
    }

    Ok(SnmpResponse {
        address,
        varbinds: results,
    })
}

async fn open_session(
    address: &SnmpAddress,
    community: &str,
    config: &SnmpConfig,
) -> Result<Box<AsyncSession>, Error> {
    let timeout_ms = duration_ms(config.timeout);
    let target = format!("{}:{}", address.host, address.port);
    match timeout(
        config.timeout,
        AsyncSession::new_v2c(target.as_str(), community.as_bytes(), 0),
    )
    .await
    {
        Ok(Ok(session)) => Ok(Box::new(session)),
        Ok(Err(error)) => Err(map_snmp2_io_error(address, timeout_ms, error)),
        Err(_) => Err(Error::SnmpTimeout {
            address: address.to_string(),
            timeout_ms,
        }),
    }
}

async fn get_many_with_retries(
    session: &mut AsyncSession,
    address: &SnmpAddress,
    address_label: &str,
    config: &SnmpConfig,
    oids: &[&Snmp2Oid<'_>],
) -> Result<Vec<SnmpVarBind>, Error> {
    let timeout_ms = duration_ms(config.timeout);
    let mut attempts = 0;
    loop {
        match timeout(config.timeout, session.get_many(oids)).await {
            Ok(Ok(pdu)) => return Ok(map_snmp2_varbinds(address_label, pdu)),
            Ok(Err(error)) => {
                if attempts < config.retries {
                    attempts += 1;
                    continue;
                }
                return Err(map_snmp2_error(address, error));
            }
            Err(_) => {
                if attempts < config.retries {
                    attempts += 1;
                    trace!(
                        target: targets::SNMP,
                        address = %address_label,
                        attempt = attempts,
                        "SNMP GET retry"
                    );
                    continue;
                }
                return Err(Error::SnmpTimeout {
                    address: address.to_string(),
                    timeout_ms,
                });
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}

fn to_snmp2_oids(address: &SnmpAddress, oids: &[Oid]) -> Result<Vec<Snmp2Oid<'static>>, Error> {
    oids.iter().map(|oid| to_snmp2_oid(address, oid)).collect()
}

fn to_snmp2_oid(address: &SnmpAddress, oid: &Oid) -> Result<Snmp2Oid<'static>, Error> {
    let arcs: Vec<u64> = oid.as_slice().iter().map(|value| u64::from(*value)).collect();
    Snmp2Oid::from(arcs.as_slice()).map_err(|error| Error::SnmpFailure {
        address: address.to_string(),
        details: format!("Invalid OID {oid}: {error:?}"),
    })
}

fn map_snmp2_io_error(address: &SnmpAddress, timeout_ms: u64, error: io::Error) -> Error {
    if error.kind() == io::ErrorKind::TimedOut {
        Error::SnmpTimeout {
            address: address.to_string(),
            timeout_ms,
        }
    } else {
        Error::SnmpFailure {
            address: address.to_string(),
            details: error.to_string(),
        }
    }
}

fn map_snmp2_error(address: &SnmpAddress, error: Snmp2Error) -> Error {
    match error {
        Snmp2Error::CommunityMismatch => Error::SnmpAuth {
            address: address.to_string(),
            details: Some(format!("{error}")),
        },
        other => Error::SnmpFailure {
            address: address.to_string(),
            details: other.to_string(),
        },
    }
}

fn map_snmp2_oid(address: &str, oid: &Snmp2Oid<'_>) -> Oid {
    let Some(iter) = oid.iter() else {
        warn!(
            target: targets::SNMP,
            address = %address,
            "Failed to parse SNMP OID"
        );
        return Oid(Vec::new());
    };

    let mut arcs = Vec::new();
    for arc in iter {
        match u32::try_from(arc) {
            Ok(value) => arcs.push(value),
            Err(_) => {
                warn!(
                    target: targets::SNMP,
                    address = %address,
                    arc = arc,
                    "SNMP OID component out of range"
                );
                return Oid(Vec::new());
            }
        }
    }

    Oid(arcs)
}

fn map_snmp2_value(address: &str, value: Snmp2Value<'_>) -> SnmpValue {
    match value {
        Snmp2Value::Null => SnmpValue::Null,
        Snmp2Value::Integer(value) => SnmpValue::Integer(value),
        Snmp2Value::OctetString(value) => SnmpValue::OctetString(value.to_vec()),
        Snmp2Value::ObjectIdentifier(value) => {
            SnmpValue::ObjectIdentifier(map_snmp2_oid(address, &value))
        }
        Snmp2Value::IpAddress(value) => SnmpValue::IpAddress(value),
        Snmp2Value::Counter32(value) => SnmpValue::Counter32(value),
        Snmp2Value::Unsigned32(value) => SnmpValue::Unsigned32(value),
        Snmp2Value::Timeticks(value) => SnmpValue::Timeticks(value),
        Snmp2Value::Counter64(value) => SnmpValue::Counter64(value),
        Snmp2Value::Opaque(value) => SnmpValue::Opaque(value.to_vec()),
        Snmp2Value::EndOfMibView => SnmpValue::EndOfMibView,
        Snmp2Value::NoSuchObject => SnmpValue::NoSuchObject,
        Snmp2Value::NoSuchInstance => SnmpValue::NoSuchInstance,
        Snmp2Value::Boolean(value) => SnmpValue::Other(format!("Boolean({value})")),
        Snmp2Value::Constructed(tag, _) => SnmpValue::Other(format!("Constructed({tag})")),
        other => SnmpValue::Other(pdu_kind(&other).to_string()),
    }
}

fn pdu_kind(value: &Snmp2Value<'_>) -> &'static str {
    match value {
        Snmp2Value::Sequence(_) => "Sequence",
        Snmp2Value::Set(_) => "Set",
        Snmp2Value::GetRequest(_) => "GetRequest",
        Snmp2Value::GetNextRequest(_) => "GetNextRequest",
        Snmp2Value::GetBulkRequest(_) => "GetBulkRequest",
        Snmp2Value::Response(_) => "Response",
        Snmp2Value::SetRequest(_) => "SetRequest",
        Snmp2Value::InformRequest(_) => "InformRequest",
        Snmp2Value::Trap(_) => "Trap",
        Snmp2Value::Report(_) => "Report",
        _ => "Unsupported",
    }
}

fn map_snmp2_varbinds(address: &str, pdu: snmp2::Pdu<'_>) -> Vec<SnmpVarBind> {
    pdu.varbinds
        .map(|(oid, value)| SnmpVarBind {
            oid: map_snmp2_oid(address, &oid),
            value: map_snmp2_value(address, value),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(value: &str) -> Oid {
        value.parse().expect("oid")
    }

    fn run_future<T>(future: impl std::future::Future<Output = T>) -> T {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("tokio runtime");
        runtime.block_on(future)
    }

    #[test]
    fn oid_parses_and_formats() {
        let parsed = oid(".1.3.6.1.2.1.1.1.0");
        assert_eq!(parsed.to_string(), "1.3.6.1.2.1.1.1.0");
        assert_eq!(parsed.as_slice(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        assert!("1.3.x".parse::<Oid>().is_err());
    }

    #[test]
    fn oid_table_helpers() {
        let root = oid("1.3.6.1.2.1.43.11.1.1");
        let entry = oid("1.3.6.1.2.1.43.11.1.1.9.1.4");
        assert!(entry.starts_with(&root));
        assert_eq!(entry.column_under(&root), Some(9));
        assert_eq!(entry.last_arc(), Some(4));
        assert_eq!(oid("1.3.6.1.2.1.43.8.2.1.9.1.1").column_under(&root), None);
    }

    #[test]
    fn decode_narrows_values() {
        assert_eq!(SnmpValue::Integer(-3).decode(), DecodedValue::Integer(-3));
        assert_eq!(SnmpValue::Counter32(42).decode(), DecodedValue::Integer(42));
        assert_eq!(
            SnmpValue::OctetString(b"Tray 1\0".to_vec()).decode(),
            DecodedValue::Text("Tray 1".to_string())
        );
        assert_eq!(SnmpValue::NoSuchObject.decode(), DecodedValue::NotPresent);
        assert_eq!(SnmpValue::NoSuchInstance.decode(), DecodedValue::NotPresent);
        assert_eq!(SnmpValue::Timeticks(100).decode(), DecodedValue::WrongType);
        assert_eq!(SnmpValue::Counter64(u64::MAX).decode(), DecodedValue::WrongType);
    }

    #[test]
    fn mock_get_marks_missing_objects() {
        let mock = MockSnmpClient::new();
        mock.add_agent(
            "192.168.1.10",
            MockAgent::new().with_value(oid("1.3.6.1.2.1.1.3.0"), SnmpValue::Timeticks(123)),
        );
        let address = SnmpAddress::with_default_port("192.168.1.10");
        let request = SnmpRequest::new(
            address,
            vec![oid("1.3.6.1.2.1.1.3.0"), oid("1.3.6.1.2.1.1.5.0")],
        );

        let response = run_future(mock.get(request)).expect("mock response");
        assert_eq!(response.varbinds.len(), 2);
        assert_eq!(
            response.value_of(&oid("1.3.6.1.2.1.1.3.0")),
            Some(&SnmpValue::Timeticks(123))
        );
        assert_eq!(
            response.value_of(&oid("1.3.6.1.2.1.1.5.0")),
            Some(&SnmpValue::NoSuchObject)
        );
    }

    #[test]
    fn mock_unknown_host_times_out() {
        let mock = MockSnmpClient::new();
        let address = SnmpAddress::with_default_port("192.168.1.99");
        let request = SnmpRequest::new(address.clone(), vec![oid("1.3.6.1.2.1.1.1.0")]);

        let error = run_future(mock.get(request)).expect_err("expected error");
        match error {
            Error::SnmpTimeout {
                address: error_address,
                timeout_ms,
            } => {
                assert_eq!(error_address, address.to_string());
                assert_eq!(timeout_ms, 3000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn mock_walk_returns_sorted_subtree() {
        let mock = MockSnmpClient::new();
        mock.add_agent(
            "10.0.0.1",
            MockAgent::new()
                .with_value(oid("1.3.6.1.2.1.43.8.2.1.9.1.2"), SnmpValue::Integer(10))
                .with_value(oid("1.3.6.1.2.1.43.8.2.1.8.1.1"), SnmpValue::Integer(500))
                .with_value(oid("1.3.6.1.2.1.43.11.1.1.9.1.1"), SnmpValue::Integer(5)),
        );
        let request = SnmpWalkRequest::new(
            SnmpAddress::with_default_port("10.0.0.1"),
            oid("1.3.6.1.2.1.43.8.2.1"),
        );

        let response = run_future(mock.walk(request)).expect("walk");
        let oids: Vec<String> = response
            .varbinds
            .iter()
            .map(|varbind| varbind.oid.to_string())
            .collect();
        assert_eq!(
            oids,
            vec!["1.3.6.1.2.1.43.8.2.1.8.1.1", "1.3.6.1.2.1.43.8.2.1.9.1.2"]
        );
    }

    #[test]
    fn mock_rejects_wrong_community() {
        let mock = MockSnmpClient::with_config(SnmpConfig::with_community("public"));
        mock.add_agent(
            "10.0.0.2",
            MockAgent::new()
                .with_community("secret")
                .with_value(oid("1.3.6.1.2.1.1.5.0"), SnmpValue::OctetString(b"lab".to_vec())),
        );
        let address = SnmpAddress::with_default_port("10.0.0.2");

        let denied = SnmpRequest::new(address.clone(), vec![oid("1.3.6.1.2.1.1.5.0")]);
        let error = run_future(mock.get(denied)).expect_err("auth failure");
        assert!(matches!(error, Error::SnmpAuth { .. }));

        let allowed = SnmpRequest::new(address, vec![oid("1.3.6.1.2.1.1.5.0")])
            .with_community("secret");
        let response = run_future(mock.get(allowed)).expect("response");
        assert_eq!(
            response.varbinds[0].value.decode(),
            DecodedValue::Text("lab".to_string())
        );
    }

    #[test]
    fn mock_walk_honours_result_cap() {
        let mock = MockSnmpClient::new();
        let mut agent = MockAgent::new();
        for index in 1..=5 {
            agent = agent.with_value(
                Oid(vec![1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 9, 1, index]),
                SnmpValue::Integer(i64::from(index)),
            );
        }
        mock.add_agent("10.0.0.3", agent);
        let request = SnmpWalkRequest::new(
            SnmpAddress::with_default_port("10.0.0.3"),
            oid("1.3.6.1.2.1.43.11.1.1"),
        )
        .with_community("public")
        .with_max_results(3);

        let response = run_future(mock.walk(request)).expect("walk");
        assert_eq!(response.varbinds.len(), 3);
        assert_eq!(response.varbinds[2].value, SnmpValue::Integer(3));
    }

    #[test]
    fn default_config_is_fixed_v2c_profile() {
        let config = SnmpConfig::with_community("private");
        assert_eq!(config.community, "private");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.retries, 2);
    }

    mod transport {
        use std::future::Future;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::{Duration, Instant};

        use snmp2::{MessageType, Pdu, Varbinds};
        use tokio::net::UdpSocket;
        use tokio::task::JoinHandle;

        use super::oid;
        use crate::error::Error;
        use crate::model::SnmpAddress;
        use crate::snmp::{
            DecodedValue, Oid, SnmpConfig, SnmpRequest, SnmpResponse, SnmpV2cClient, SnmpValue,
            SnmpWalkRequest, TOKIO_WORKER_STACK_SIZE_BYTES,
        };

        const SUPPLIES_ROOT: &str = "1.3.6.1.2.1.43.11.1.1";

        enum Reply {
            Integer(i64),
            Text(&'static str),
            EndOfMibView,
        }

        fn ber(tag: u8, body: &[u8]) -> Vec<u8> {
            assert!(body.len() < 128, "short-form length");
            let mut out = vec![tag, body.len() as u8];
            out.extend_from_slice(body);
            out
        }

        fn ber_oid(arcs: &[u32]) -> Vec<u8> {
            let mut body = vec![(arcs[0] * 40 + arcs[1]) as u8];
            for &arc in &arcs[2..] {
                let mut encoded = vec![(arc & 0x7f) as u8];
                let mut rest = arc >> 7;
                while rest > 0 {
                    encoded.push((rest & 0x7f) as u8 | 0x80);
                    rest >>= 7;
                }
                encoded.reverse();
                body.extend(encoded);
            }
            ber(0x06, &body)
        }

        fn ber_integer(value: i64) -> Vec<u8> {
            let bytes = value.to_be_bytes();
            let mut start = 0;
            while start < 7
                && ((bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                    || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0))
            {
                start += 1;
            }
            ber(0x02, &bytes[start..])
        }

        /// Contents of a varbind list, without the outer SEQUENCE header.
        fn ber_varbinds(varbinds: &[(Oid, Reply)]) -> Vec<u8> {
            let mut out = Vec::new();
            for (oid, reply) in varbinds {
                let mut pair = ber_oid(oid.as_slice());
                pair.extend(match reply {
                    Reply::Integer(value) => ber_integer(*value),
                    Reply::Text(text) => ber(0x04, text.as_bytes()),
                    Reply::EndOfMibView => ber(0x82, &[]),
                });
                out.extend(ber(0x30, &pair));
            }
            out
        }

        fn response_for(request: &[u8], varbinds: &[(Oid, Reply)]) -> Vec<u8> {
            let encoded = ber_varbinds(varbinds);
            let mut reply = Pdu::from_bytes(request).expect("request pdu");
            reply.message_type = MessageType::Response;
            reply.varbinds = Varbinds::from_bytes(&encoded);
            reply.to_bytes().expect("response pdu")
        }

        /// Loopback v2c agent. Each request is answered with the next
        /// scripted varbind list; once the script runs out it stays silent.
        struct ScriptedAgent {
            port: u16,
            requests: Arc<AtomicUsize>,
            task: JoinHandle<()>,
        }

        impl ScriptedAgent {
            async fn start(script: Vec<Vec<(Oid, Reply)>>) -> Self {
                let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind agent");
                let port = socket.local_addr().expect("agent address").port();
                let requests = Arc::new(AtomicUsize::new(0));
                let counter = Arc::clone(&requests);

                let task = tokio::spawn(async move {
                    let mut script = script.into_iter();
                    let mut buf = vec![0u8; 4096];
                    while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
                        counter.fetch_add(1, Ordering::SeqCst);
                        let Some(varbinds) = script.next() else {
                            continue;
                        };
                        let response = response_for(&buf[..len], &varbinds);
                        if socket.send_to(&response, peer).await.is_err() {
                            break;
                        }
                    }
                });

                Self {
                    port,
                    requests,
                    task,
                }
            }

            fn address(&self) -> SnmpAddress {
                SnmpAddress::new("127.0.0.1", self.port)
            }

            fn requests(&self) -> usize {
                self.requests.load(Ordering::SeqCst)
            }
        }

        impl Drop for ScriptedAgent {
            fn drop(&mut self) {
                self.task.abort();
            }
        }

        fn fast_config() -> SnmpConfig {
            SnmpConfig {
                community: "public".to_string(),
                timeout: Duration::from_millis(150),
                retries: 2,
            }
        }

        /// Runs on a thread sized like the scanner's runtime workers.
        fn run_on_worker_stack<T, F, Fut>(make: F) -> T
        where
            T: Send + 'static,
            F: FnOnce() -> Fut + Send + 'static,
            Fut: Future<Output = T>,
        {
            std::thread::Builder::new()
                .stack_size(TOKIO_WORKER_STACK_SIZE_BYTES)
                .spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .expect("tokio runtime");
                    runtime.block_on(make())
                })
                .expect("spawn test thread")
                .join()
                .expect("test thread")
        }

        fn supply(suffix: &str) -> Oid {
            oid(&format!("{SUPPLIES_ROOT}.{suffix}"))
        }

        fn walk_supplies(
            script: Vec<Vec<(Oid, Reply)>>,
            max_results: usize,
        ) -> (Result<SnmpResponse, Error>, usize) {
            run_on_worker_stack(move || async move {
                let agent = ScriptedAgent::start(script).await;
                let client = SnmpV2cClient::new(fast_config());
                let request = SnmpWalkRequest::new(agent.address(), oid(SUPPLIES_ROOT))
                    .with_max_results(max_results);
                let result = client.walk(request).await;
                (result, agent.requests())
            })
        }

        #[test]
        fn get_reads_values_from_agent() {
            let (result, requests) = run_on_worker_stack(|| async {
                let agent = ScriptedAgent::start(vec![vec![
                    (oid("1.3.6.1.2.1.1.1.0"), Reply::Text("ACME LaserWriter")),
                    (oid("1.3.6.1.2.1.25.3.5.1.1.1"), Reply::Integer(3)),
                ]])
                .await;
                let client = SnmpV2cClient::new(fast_config());
                let request = SnmpRequest::new(
                    agent.address(),
                    vec![oid("1.3.6.1.2.1.1.1.0"), oid("1.3.6.1.2.1.25.3.5.1.1.1")],
                );
                let result = client.get(request).await;
                (result, agent.requests())
            });

            let response = result.expect("get response");
            assert_eq!(requests, 1);
            assert_eq!(
                response.value_of(&oid("1.3.6.1.2.1.1.1.0")).map(SnmpValue::decode),
                Some(DecodedValue::Text("ACME LaserWriter".to_string()))
            );
            assert_eq!(
                response.value_of(&oid("1.3.6.1.2.1.25.3.5.1.1.1")).map(SnmpValue::decode),
                Some(DecodedValue::Integer(3))
            );
        }

        #[test]
        fn walk_stops_at_first_oid_outside_root() {
            let (result, requests) = walk_supplies(
                vec![
                    vec![(supply("6.1.1"), Reply::Text("Black Toner"))],
                    vec![(supply("6.1.2"), Reply::Text("Cyan Toner"))],
                    vec![(oid("1.3.6.1.2.1.43.12.1.1.2.1.1"), Reply::Integer(1))],
                ],
                512,
            );

            let response = result.expect("walk");
            assert_eq!(requests, 3);
            let oids: Vec<Oid> = response.varbinds.into_iter().map(|vb| vb.oid).collect();
            assert_eq!(oids, vec![supply("6.1.1"), supply("6.1.2")]);
        }

        #[test]
        fn walk_stops_when_agent_repeats_an_oid() {
            let (result, requests) = walk_supplies(
                vec![
                    vec![(supply("9.1.1"), Reply::Integer(80))],
                    vec![(supply("9.1.1"), Reply::Integer(80))],
                ],
                512,
            );

            let response = result.expect("walk");
            assert_eq!(requests, 2);
            assert_eq!(response.varbinds.len(), 1);
            assert_eq!(response.varbinds[0].value, SnmpValue::Integer(80));
        }

        #[test]
        fn walk_stops_at_end_of_mib_view() {
            let (result, requests) = walk_supplies(
                vec![
                    vec![(supply("9.1.1"), Reply::Integer(80))],
                    vec![(supply("9.1.2"), Reply::EndOfMibView)],
                ],
                512,
            );

            let response = result.expect("walk");
            assert_eq!(requests, 2);
            assert_eq!(response.varbinds.len(), 1);
        }

        #[test]
        fn walk_stops_at_result_cap() {
            let script = (1..=5)
                .map(|index| vec![(supply(&format!("9.1.{index}")), Reply::Integer(index))])
                .collect();
            let (result, requests) = walk_supplies(script, 3);

            let response = result.expect("walk");
            assert_eq!(requests, 3);
            assert_eq!(response.varbinds.len(), 3);
            assert_eq!(response.varbinds[2].oid, supply("9.1.3"));
        }

        #[test]
        fn silent_agent_times_out_after_retries() {
            let (result, requests, elapsed) = run_on_worker_stack(|| async {
                let agent = ScriptedAgent::start(Vec::new()).await;
                let client = SnmpV2cClient::new(fast_config());
                let started = Instant::now();
                let result = client
                    .get(SnmpRequest::new(agent.address(), vec![oid("1.3.6.1.2.1.1.1.0")]))
                    .await;
                (result, agent.requests(), started.elapsed())
            });

            assert!(matches!(
                result,
                Err(Error::SnmpTimeout {
                    timeout_ms: 150,
                    ..
                })
            ));
            assert_eq!(requests, 3);
            assert!(elapsed >= Duration::from_millis(450));
            assert!(elapsed < Duration::from_secs(5));
        }

        #[test]
        fn closed_port_fails_promptly() {
            let (result, elapsed) = run_on_worker_stack(|| async {
                let port = {
                    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
                    socket.local_addr().expect("address").port()
                };
                let client = SnmpV2cClient::new(fast_config());
                let started = Instant::now();
                let result = client
                    .get(SnmpRequest::new(
                        SnmpAddress::new("127.0.0.1", port),
                        vec![oid("1.3.6.1.2.1.25.3.5.1.1.1")],
                    ))
                    .await;
                (result, started.elapsed())
            });

            assert!(matches!(
                result,
                Err(Error::SnmpTimeout { .. } | Error::SnmpFailure { .. })
            ));
            assert!(elapsed < Duration::from_secs(5));
        }
    }
}
