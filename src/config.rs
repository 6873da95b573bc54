use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{LedgerLayout, RewardFilter};

/// Default reporting currency.
fn default_currency() -> String {
    "EUR".to_string()
}

/// Default dust threshold: rewards below this quantity are ignored.
fn default_dust_threshold() -> Decimal {
    Decimal::new(1, 6) // 0.000001
}

/// Asset being priced: the ledger symbol plus an optional explicit
/// CoinGecko id for symbols the built-in mapping doesn't cover.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coingecko_id: Option<String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            symbol: "DOT".to_string(),
            coingecko_id: None,
        }
    }
}

/// Retry pacing for transient price-service failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total lookup attempts per reward, including the first.
    pub max_attempts: u32,
    /// Seconds to wait between attempts.
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            backoff_secs: 1,
        }
    }
}

/// Ledger parsing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub layout: LedgerLayout,
    pub filter: RewardFilter,
}

/// On-disk configuration (`rewardbook.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fiat currency all prices and totals are denominated in.
    pub currency: String,

    /// Rewards below this quantity are excluded from aggregation.
    pub dust_threshold: Decimal,

    /// Where the price cache lives. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,

    pub asset: AssetConfig,
    pub ledger: LedgerConfig,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            dust_threshold: default_dust_threshold(),
            data_dir: None,
            asset: AssetConfig::default(),
            ledger: LedgerConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Configuration after defaults and cross-field resolution are applied.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub currency: String,
    pub dust_threshold: Decimal,
    pub data_dir: PathBuf,
    pub asset: AssetConfig,
    pub layout: LedgerLayout,
    pub filter: RewardFilter,
    pub retry: RetryConfig,
}

impl ResolvedConfig {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Config::default()
        };
        Ok(Self::resolve(config))
    }

    fn resolve(config: Config) -> Self {
        let data_dir = config.data_dir.unwrap_or_else(default_data_dir);

        let mut filter = config.ledger.filter;
        // With no explicit filter asset, filter on the deployment asset.
        if filter.asset.is_none() {
            filter.asset = Some(config.asset.symbol.clone());
        }

        Self {
            currency: config.currency.trim().to_uppercase(),
            dust_threshold: config.dust_threshold,
            data_dir,
            asset: config.asset,
            layout: config.ledger.layout,
            filter,
            retry: config.retry,
        }
    }

    /// Switch the deployment asset, keeping filter and oracle mapping in
    /// sync (used by the `--asset` CLI override).
    pub fn set_asset(&mut self, symbol: &str) {
        let symbol = symbol.trim().to_uppercase();
        if !symbol.eq_ignore_ascii_case(&self.asset.symbol) {
            self.asset.coingecko_id = None;
        }
        self.filter.asset = Some(symbol.clone());
        self.asset.symbol = symbol;
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("rewardbook"))
        .unwrap_or_else(|| PathBuf::from(".rewardbook"))
}
