use ethers::types::Address;
use secrecy::SecretString;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::swap_engine::SwapMode;

/// Slots `PRIVATE_KEY_1` and `PRIVATE_KEY_2` must always be present.
pub const MANDATORY_KEY_SLOTS: usize = 2;
pub const MAX_KEY_SLOTS: usize = 10;

/// Upper bound for `MAX_BALANCE`, in native units.
pub const MAX_TRANSFER_AMOUNT: f64 = 1_000_000.0;

pub const DEFAULT_RPC_URL: &str = "https://evmrpc-testnet.0g.ai";
pub const DEFAULT_CHAIN_ID: u64 = 80087;
pub const DEFAULT_TOKEN_USD: &str = "0xa8f030218d7c26869cadd46c5f10129e635cd565";
pub const DEFAULT_TOKEN_ETH: &str = "0x2619090fcfdb99a8ccf51c76c9467f7375040eeb";
pub const DEFAULT_TOKEN_BTC: &str = "0x6dc29491a8396Bd52376b4f6dA1f3E889C16cA85";

pub const DEFAULT_MIN_BALANCE: f64 = 0.000001;
pub const DEFAULT_MAX_BALANCE: f64 = 0.00001;
pub const DEFAULT_SWAP_PERCENT: f64 = 1.0;

pub const DEFAULT_RECIPIENTS: [&str; 5] = [
    "0x23eAb9DF00E86bB594220441dD50FA9Cee79c12C",
    "0x1991240D205A448d24b3ef938022D444ba67De2A",
    "0x5b6c42f5501929b0726af823f8f4002fd6419d7f",
    "0x41446af8e24ce658e73C208c32b56219387cAD97",
    "0xD1969e0C12E16efD9de7A74d98156B526006b202",
];

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub tokens: TokenAddresses,
    pub router: RouterConfig,
    pub transfer: TransferConfig,
    pub supervisor: SupervisorConfig,
    pub logging: LoggingConfig,
    pub pacing: Pacing,
    /// Values that were rejected and replaced by a default while loading.
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
}

/// The three well-known tokens the bot trades between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenAddresses {
    pub usd: Address,
    pub eth: Address,
    pub btc: Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterConfig {
    /// Swaps are skipped entirely while this is unset.
    pub router_address: Option<Address>,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub swap_percent: f64,
    pub swap_mode: SwapMode,
    pub cycle_duration_ms: u64,
}

impl RouterConfig {
    pub fn cycle_duration(&self) -> Duration {
        Duration::from_millis(self.cycle_duration_ms)
    }

    /// Worst-case fee of one transaction at the base gas settings, in native units.
    pub fn base_fee_native(&self) -> f64 {
        (self.gas_price as f64 * self.gas_limit as f64) / 1e18
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferConfig {
    pub min_balance: f64,
    pub max_balance: f64,
    pub recipients: Vec<Address>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorConfig {
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: PathBuf,
}

/// Fixed delays used to pace nonces and RPC load.
#[derive(Debug, Clone, Serialize)]
pub struct Pacing {
    pub between_transfers: Duration,
    pub between_wallets: Duration,
    pub between_directions: Duration,
    pub approval_settle: Duration,
    pub confirmation_timeout: Duration,
    pub swap_deadline: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            between_transfers: Duration::from_secs(2),
            between_wallets: Duration::from_secs(3),
            between_directions: Duration::from_secs(2),
            approval_settle: Duration::from_secs(5),
            confirmation_timeout: Duration::from_secs(120),
            swap_deadline: Duration::from_secs(900),
        }
    }
}

/// One configured secret key together with the env slot it came from.
pub struct WalletKey {
    pub slot: usize,
    pub secret: SecretString,
}

impl std::fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKey")
            .field("slot", &self.slot)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl AppConfig {
    /// Builds the configuration from a key/value source. Empty values count as
    /// unset. Values that do not parse or validate fall back to their defaults
    /// and are recorded in `warnings`; loading itself never fails.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut warnings = Vec::new();

        let chain = ChainConfig {
            rpc_url: get("OG_LABS_RPC_URL")
                .or_else(|| get("RPC_URL"))
                .unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            chain_id: match get("OG_LABS_CHAIN_ID") {
                Some(_) => parse_or(&get, &mut warnings, "OG_LABS_CHAIN_ID", DEFAULT_CHAIN_ID),
                None => parse_or(&get, &mut warnings, "CHAIN_ID", DEFAULT_CHAIN_ID),
            },
        };

        let tokens = TokenAddresses {
            usd: address_or(&get, &mut warnings, "TOKEN_USD", DEFAULT_TOKEN_USD),
            eth: address_or(&get, &mut warnings, "TOKEN_ETH", DEFAULT_TOKEN_ETH),
            btc: address_or(&get, &mut warnings, "TOKEN_BTC", DEFAULT_TOKEN_BTC),
        };

        let swap_mode = match get("SWAP_MODE") {
            Some(raw) => {
                let raw = raw.trim().to_string();
                raw.parse::<SwapMode>().unwrap_or_else(|_| {
                    warnings.push(format!("Unknown SWAP_MODE {raw:?}, swaps will be skipped"));
                    SwapMode::Unknown(raw)
                })
            }
            None => SwapMode::All,
        };

        let router_address = get("SWAP_ROUTER").and_then(|raw| match parse_address(&raw) {
            Some(address) => Some(address),
            None => {
                warnings.push(format!("Invalid SWAP_ROUTER {raw:?}, swaps will be skipped"));
                None
            }
        });

        let router = RouterConfig {
            router_address,
            gas_price: parse_or(&get, &mut warnings, "GAS_PRICE", 1_000_000_000),
            gas_limit: parse_or(&get, &mut warnings, "GAS_LIMIT", 300_000),
            swap_percent: parse_or(&get, &mut warnings, "SWAP_PERCENT", DEFAULT_SWAP_PERCENT),
            swap_mode,
            cycle_duration_ms: parse_or(&get, &mut warnings, "DURATION", 30_000),
        };

        let recipients = match get("TRANSFER_RECIPIENTS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| {
                    let parsed = parse_address(s);
                    if parsed.is_none() {
                        warnings.push(format!("Ignoring invalid transfer recipient {s:?}"));
                    }
                    parsed
                })
                .collect(),
            None => default_recipients(),
        };

        let transfer = TransferConfig {
            min_balance: parse_or(&get, &mut warnings, "MIN_BALANCE", DEFAULT_MIN_BALANCE),
            max_balance: parse_or(&get, &mut warnings, "MAX_BALANCE", DEFAULT_MAX_BALANCE),
            recipients,
        };

        let mut config = Self {
            chain,
            tokens,
            router,
            transfer,
            supervisor: SupervisorConfig {
                max_consecutive_failures: parse_or(&get, &mut warnings, "MAX_CONSECUTIVE_FAILURES", 5),
            },
            logging: LoggingConfig {
                level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                dir: get("LOG_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            },
            pacing: Pacing::default(),
            warnings,
        };

        config.validate();
        config
    }

    /// Replaces out-of-range values with their defaults, recording a warning for each.
    pub fn validate(&mut self) {
        let (min, max) = (self.transfer.min_balance, self.transfer.max_balance);
        if !(min >= 0.0 && min < max && max <= MAX_TRANSFER_AMOUNT) {
            self.warnings.push(format!(
                "Invalid transfer range MIN_BALANCE={min} MAX_BALANCE={max}, using {DEFAULT_MIN_BALANCE}..{DEFAULT_MAX_BALANCE}"
            ));
            self.transfer.min_balance = DEFAULT_MIN_BALANCE;
            self.transfer.max_balance = DEFAULT_MAX_BALANCE;
        }

        let percent = self.router.swap_percent;
        if !(percent > 0.0 && percent <= 100.0) {
            self.warnings.push(format!(
                "SWAP_PERCENT {percent} is outside (0, 100], using {DEFAULT_SWAP_PERCENT}"
            ));
            self.router.swap_percent = DEFAULT_SWAP_PERCENT;
        }

        if self.transfer.recipients.is_empty() {
            self.warnings
                .push("No valid transfer recipients, using the built-in list".to_string());
            self.transfer.recipients = default_recipients();
        }
    }

    /// Logs every value that was replaced while loading.
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }
    }
}

/// Only key loading is fatal; everything else falls back to defaults.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Private keys not found: set PRIVATE_KEY_1 and PRIVATE_KEY_2 (found {found} key(s))")]
    MissingPrivateKeys { found: usize },

    #[error("PRIVATE_KEY_{slot} is not a valid secp256k1 private key")]
    InvalidPrivateKey { slot: usize },
}

fn parse_or<T, G>(get: &G, warnings: &mut Vec<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warnings.push(format!("Invalid value for {key}: {raw:?}, using {default}"));
            default
        }),
        None => default,
    }
}

fn address_or<G>(get: &G, warnings: &mut Vec<String>, key: &str, default: &str) -> Address
where
    G: Fn(&str) -> Option<String>,
{
    let fallback = || Address::from_str(default).unwrap_or_default();
    match get(key) {
        Some(raw) => parse_address(&raw).unwrap_or_else(|| {
            warnings.push(format!("Invalid address for {key}: {raw:?}, using {default}"));
            fallback()
        }),
        None => fallback(),
    }
}

fn parse_address(raw: &str) -> Option<Address> {
    raw.trim().parse::<Address>().ok()
}

fn default_recipients() -> Vec<Address> {
    DEFAULT_RECIPIENTS.iter().filter_map(|s| parse_address(s)).collect()
}

/// Collects `PRIVATE_KEY_1..=10` in slot order. Gaps after slot 2 are skipped.
pub fn private_keys_from_lookup<F>(lookup: F) -> Result<Vec<WalletKey>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let keys: Vec<WalletKey> = (1..=MAX_KEY_SLOTS)
        .filter_map(|slot| {
            lookup(&format!("PRIVATE_KEY_{slot}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| WalletKey {
                    slot,
                    secret: SecretString::new(v),
                })
        })
        .collect();

    let mandatory_present = keys.iter().filter(|k| k.slot <= MANDATORY_KEY_SLOTS).count();
    if mandatory_present < MANDATORY_KEY_SLOTS {
        return Err(ConfigError::MissingPrivateKeys { found: keys.len() });
    }

    Ok(keys)
}

pub fn load_config() -> AppConfig {
    AppConfig::from_lookup(|key| std::env::var(key).ok())
}

pub fn load_private_keys() -> Result<Vec<WalletKey>, ConfigError> {
    private_keys_from_lookup(|key| std::env::var(key).ok())
}
