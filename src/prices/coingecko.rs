//! CoinGecko historical-price oracle.
//!
//! Uses CoinGecko's free API to fetch daily prices for cryptocurrencies.
//! The `/coins/{id}/history` endpoint returns price data for a specific date.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::oracle::{OracleError, PriceOracle};

const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
const USER_AGENT: &str = concat!("rewardbook/", env!("CARGO_PKG_VERSION"));

/// CoinGecko API response for historical coin data.
#[derive(Debug, Deserialize)]
struct CoinHistoryResponse {
    #[allow(dead_code)]
    id: String,
    market_data: Option<MarketData>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    current_price: HashMap<String, f64>,
}

/// CoinGecko price oracle.
///
/// No API key is required for basic usage; the free tier rate-limits
/// aggressively, which surfaces as [`OracleError::RateLimited`].
pub struct CoinGeckoOracle {
    client: reqwest::Client,
    base_url: String,
    /// Custom symbol to CoinGecko ID mappings (override the defaults)
    custom_mappings: HashMap<String, String>,
}

impl CoinGeckoOracle {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: COINGECKO_API_BASE.to_string(),
            custom_mappings: HashMap::new(),
        }
    }

    /// Overrides the API base URL (used by tests to point at a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Adds a custom mapping from symbol to CoinGecko ID.
    pub fn with_mapping(
        mut self,
        symbol: impl Into<String>,
        coingecko_id: impl Into<String>,
    ) -> Self {
        self.custom_mappings
            .insert(symbol.into().to_uppercase(), coingecko_id.into());
        self
    }

    /// Maps an asset symbol to a CoinGecko coin ID.
    ///
    /// Custom mappings win over the built-in table; unknown symbols fall
    /// back to the lowercased symbol, which CoinGecko accepts for some
    /// coins whose id matches their ticker.
    fn coin_id(&self, symbol: &str) -> String {
        let symbol_upper = symbol.trim().to_uppercase();

        if let Some(id) = self.custom_mappings.get(&symbol_upper) {
            return id.clone();
        }

        let id = match symbol_upper.as_str() {
            "BTC" => "bitcoin",
            "ETH" => "ethereum",
            "DOT" => "polkadot",
            "KSM" => "kusama",
            "SOL" => "solana",
            "ADA" => "cardano",
            "ATOM" => "cosmos",
            "XTZ" => "tezos",
            "NEAR" => "near",
            "AVAX" => "avalanche-2",
            "MATIC" | "POL" => "matic-network",
            "TRX" => "tron",
            "ALGO" => "algorand",
            "MINA" => "mina-protocol",
            _ => return symbol_upper.to_lowercase(),
        };

        id.to_string()
    }
}

impl Default for CoinGeckoOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PriceOracle for CoinGeckoOracle {
    async fn historical_price(
        &self,
        asset: &str,
        date: NaiveDate,
        currency: &str,
    ) -> Result<Decimal, OracleError> {
        let coin_id = self.coin_id(asset);
        // CoinGecko expects the date in dd-mm-yyyy format
        let date_str = date.format("%d-%m-%Y").to_string();

        let url = format!(
            "{}/coins/{}/history?date={}&localization=false",
            self.base_url, coin_id, date_str
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::RateLimited(format!("{status} - {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Unavailable(format!(
                "{coin_id}: {status} - {body}"
            )));
        }

        let history: CoinHistoryResponse = response.json().await.map_err(|err| {
            OracleError::Unavailable(format!("malformed response for {coin_id}: {err}"))
        })?;

        let market_data = history.market_data.ok_or_else(|| {
            OracleError::Unavailable(format!("no market data for {coin_id} on {date}"))
        })?;

        let raw = market_data
            .current_price
            .get(&currency.to_lowercase())
            .copied()
            .ok_or_else(|| {
                OracleError::Unavailable(format!(
                    "no {currency} price for {coin_id} on {date}"
                ))
            })?;

        // Round-trip through the shortest f64 representation rather than the
        // raw float bits, so 42850.12 stays 42850.12.
        let price = Decimal::from_str(&raw.to_string()).map_err(|err| {
            OracleError::Unavailable(format!("unrepresentable price {raw}: {err}"))
        })?;

        debug!(asset, %date, %price, currency, "historical price fetched");
        Ok(price)
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
