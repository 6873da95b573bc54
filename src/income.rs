//! Per-year income aggregation.
//!
//! The aggregator is the only place in the pipeline that waits: transient
//! price failures are retried here with a fixed backoff, bounded by
//! [`RetryPolicy::max_attempts`].

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::ledger::LedgerError;
use crate::models::RewardEvent;
use crate::prices::{PriceCache, PriceError};

/// Bounded retry for transient price-service failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total lookup attempts per reward, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            backoff: Duration::from_secs(1),
        }
    }
}

/// One reward priced in fiat; kept for auditability alongside the totals.
#[derive(Debug, Clone, Serialize)]
pub struct PricedReward {
    pub date: NaiveDate,
    pub asset: String,
    pub quantity: Decimal,
    pub fiat_value: Decimal,
    pub currency: String,
}

#[derive(Debug, Default)]
pub struct IncomeReport {
    /// One entry per accepted reward, in ledger order.
    pub rewards: Vec<PricedReward>,
    /// Year -> total fiat value. BTreeMap, so iteration is in increasing
    /// year order.
    pub totals: BTreeMap<i32, Decimal>,
}

/// Price every reward through the cache and accumulate per-year fiat totals.
///
/// Transient price failures are retried per `policy`; a permanent failure,
/// a store failure, or a malformed ledger row aborts the whole run. Prices
/// cached before an abort stay persisted.
pub async fn aggregate<I>(
    rewards: I,
    cache: &PriceCache,
    policy: &RetryPolicy,
) -> Result<IncomeReport>
where
    I: IntoIterator<Item = Result<RewardEvent, LedgerError>>,
{
    let mut report = IncomeReport::default();

    for event in rewards {
        let event = event?;
        let price = resolve_price(cache, &event, policy).await?;
        let fiat_value = price * event.quantity;

        info!(
            quantity = %event.quantity,
            asset = %event.asset,
            fiat = %fiat_value,
            currency = cache.currency(),
            date = %event.date,
            "reward priced"
        );

        *report.totals.entry(event.date.year()).or_default() += fiat_value;
        report.rewards.push(PricedReward {
            date: event.date,
            asset: event.asset,
            quantity: event.quantity,
            fiat_value,
            currency: cache.currency().to_string(),
        });
    }

    Ok(report)
}

async fn resolve_price(
    cache: &PriceCache,
    event: &RewardEvent,
    policy: &RetryPolicy,
) -> Result<Decimal> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match cache.lookup(&event.asset, event.date).await {
            Ok(price) => return Ok(price),
            Err(PriceError::Transient { ref reason, .. }) if attempt < policy.max_attempts => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    reason = %reason,
                    asset = %event.asset,
                    date = %event.date,
                    "price unavailable, retrying after backoff"
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(err @ PriceError::Transient { .. }) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("gave up after {} attempts", policy.max_attempts)));
            }
            Err(err) => return Err(err.into()),
        }
    }
}
