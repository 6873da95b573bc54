use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::models::PricePoint;
use super::oracle::{OracleError, PriceOracle};
use super::store::{PriceStore, StoreError};

/// Errors surfaced by [`PriceCache::lookup`].
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    /// The oracle is temporarily unable to answer. Nothing was persisted;
    /// the same lookup may succeed later.
    #[error("price temporarily unavailable for {asset} on {date}: {reason}")]
    Transient {
        asset: String,
        date: NaiveDate,
        reason: String,
    },

    /// The oracle will never answer for this (asset, date).
    #[error("no price for {asset} on {date}: {reason}")]
    Permanent {
        asset: String,
        date: NaiveDate,
        reason: String,
    },

    /// The persistent store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Get-or-fetch-and-store price resolution.
///
/// Serves cached reads from the store; on miss asks the oracle once and
/// persists the answer, so each distinct (asset, date) is priced exactly
/// once for the lifetime of the store. Performs no retries and never
/// sleeps; transient oracle failures are handed straight back to the
/// caller, and retry pacing lives in the aggregator.
pub struct PriceCache {
    store: Arc<dyn PriceStore>,
    oracle: Arc<dyn PriceOracle>,
    currency: String,
}

impl PriceCache {
    pub fn new(store: Arc<dyn PriceStore>, oracle: Arc<dyn PriceOracle>, currency: &str) -> Self {
        Self {
            store,
            oracle,
            currency: currency.trim().to_uppercase(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Fiat price of one unit of `asset` on `date`.
    pub async fn lookup(&self, asset: &str, date: NaiveDate) -> Result<Decimal, PriceError> {
        let asset = asset.trim().to_uppercase();

        if let Some(cached) = self.store.get(&asset, date).await? {
            debug!(asset = %asset, date = %date, price = %cached.price, "price found in cache");
            return Ok(cached.price);
        }

        let price = match self.oracle.historical_price(&asset, date, &self.currency).await {
            Ok(price) => price,
            Err(OracleError::Unavailable(reason)) => {
                return Err(PriceError::Permanent {
                    asset,
                    date,
                    reason,
                })
            }
            Err(err @ (OracleError::RateLimited(_) | OracleError::Http(_))) => {
                return Err(PriceError::Transient {
                    asset,
                    date,
                    reason: err.to_string(),
                });
            }
        };

        let point = PricePoint {
            asset: asset.clone(),
            date,
            price,
            currency: self.currency.clone(),
            fetched_at: Utc::now(),
            source: self.oracle.name().to_string(),
        };
        self.store.put(&point).await?;
        info!(
            asset = %asset,
            date = %date,
            price = %price,
            source = %point.source,
            "price fetched and stored"
        );
        Ok(price)
    }
}
