//! Typed view of the monitor configuration.
//!
//! ```yaml
//! l1:
//!   start_number: 18306000
//!   contracts:
//!     scroll_messenger: "0x6774bcbd5cecef1336b5300fb5186a12ddd8b367"
//!     standard_erc20_gateway: "0xd8a791fe2be73eb6e6cf1eb0cb3f36adc9b3f8f9"
//! l2:
//!   contracts:
//!     scroll_messenger: "0x781e90f1c8fc4611c9b7497c3b47f99ef6969cbc"
//! monitor:
//!   batch_size: 500
//!   tick_interval_ms: 1000
//! daemon:
//!   addr: "127.0.0.1:8899"
//! ```
//!
//! Addresses are checked when the config is loaded; a malformed address is
//! a startup error. The all-zero address means "not deployed" and is
//! reported as unconfigured rather than rejected.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_DAEMON_ADDR: &str = "127.0.0.1:8899";
const DEFAULT_BATCH_SIZE: u64 = 500;

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    MissingPrefix,
    WrongLength { got: usize },
    NonHex { position: usize, ch: char },
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::MissingPrefix => write!(f, "address must start with 0x"),
            AddressError::WrongLength { got } => {
                write!(f, "address must have 40 hex digits after 0x, got {got}")
            }
            AddressError::NonHex { position, ch } => {
                write!(f, "address has non-hex character {ch:?} at position {position}")
            }
        }
    }
}

impl std::error::Error for AddressError {}

/// A 20-byte account address, stored lowercase with its `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractAddress(String);

impl ContractAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }
}

impl FromStr for ContractAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let body = t
            .strip_prefix("0x")
            .or_else(|| t.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;
        if body.len() != 40 {
            return Err(AddressError::WrongLength { got: body.len() });
        }
        if let Some((position, ch)) = body.chars().enumerate().find(|(_, c)| !c.is_ascii_hexdigit())
        {
            return Err(AddressError::NonHex { position, ch });
        }
        Ok(ContractAddress(format!("0x{}", body.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for ContractAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContractAddress> for String {
    fn from(value: ContractAddress) -> Self {
        value.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Contract tables
// ---------------------------------------------------------------------------

/// Bridge contracts deployed on one chain. Every entry is optional; a
/// missing or zero entry leaves that gateway unwatched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayContracts {
    #[serde(default)]
    pub scroll_messenger: Option<ContractAddress>,
    #[serde(default)]
    pub eth_gateway: Option<ContractAddress>,
    #[serde(default)]
    pub weth_gateway: Option<ContractAddress>,
    #[serde(default)]
    pub standard_erc20_gateway: Option<ContractAddress>,
    #[serde(default)]
    pub custom_erc20_gateway: Option<ContractAddress>,
    #[serde(default)]
    pub dai_gateway: Option<ContractAddress>,
    #[serde(default)]
    pub usdc_gateway: Option<ContractAddress>,
    #[serde(default)]
    pub lido_gateway: Option<ContractAddress>,
    #[serde(default)]
    pub puffer_gateway: Option<ContractAddress>,
    #[serde(default)]
    pub erc721_gateway: Option<ContractAddress>,
    #[serde(default)]
    pub erc1155_gateway: Option<ContractAddress>,
}

pub type L1Contracts = GatewayContracts;
pub type L2Contracts = GatewayContracts;

impl GatewayContracts {
    fn entries(&self) -> [(&'static str, Option<&ContractAddress>); 11] {
        [
            ("scroll_messenger", self.scroll_messenger.as_ref()),
            ("eth_gateway", self.eth_gateway.as_ref()),
            ("weth_gateway", self.weth_gateway.as_ref()),
            ("standard_erc20_gateway", self.standard_erc20_gateway.as_ref()),
            ("custom_erc20_gateway", self.custom_erc20_gateway.as_ref()),
            ("dai_gateway", self.dai_gateway.as_ref()),
            ("usdc_gateway", self.usdc_gateway.as_ref()),
            ("lido_gateway", self.lido_gateway.as_ref()),
            ("puffer_gateway", self.puffer_gateway.as_ref()),
            ("erc721_gateway", self.erc721_gateway.as_ref()),
            ("erc1155_gateway", self.erc1155_gateway.as_ref()),
        ]
    }

    /// `(name, address)` for every entry with a non-zero address.
    pub fn configured(&self) -> Vec<(&'static str, &ContractAddress)> {
        self.entries()
            .into_iter()
            .filter_map(|(name, addr)| addr.filter(|a| !a.is_zero()).map(|a| (name, a)))
            .collect()
    }

    /// Names of entries that are absent or zero.
    pub fn unconfigured(&self) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .filter(|(_, addr)| addr.map(|a| a.is_zero()).unwrap_or(true))
            .map(|(name, _)| name)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1Section {
    /// Cold-start block for L1 when no valid message match exists yet.
    #[serde(default)]
    pub start_number: u64,
    #[serde(default)]
    pub contracts: L1Contracts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Section {
    #[serde(default)]
    pub contracts: L2Contracts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSection {
    #[serde(default = "default_daemon_addr")]
    pub addr: String,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            addr: default_daemon_addr(),
        }
    }
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_daemon_addr() -> String {
    DEFAULT_DAEMON_ADDR.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub l1: L1Section,
    #[serde(default)]
    pub l2: L2Section,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub daemon: DaemonSection,
}

impl MonitorConfig {
    /// Deserialize from merged config JSON and validate.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: MonitorConfig =
            serde_json::from_value(config_json.clone()).context("invalid monitor config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.monitor.batch_size == 0 {
            bail!("CONFIG_INVALID /monitor/batch_size must be > 0");
        }
        if self.monitor.tick_interval_ms == 0 {
            bail!("CONFIG_INVALID /monitor/tick_interval_ms must be > 0");
        }
        Ok(())
    }
}
