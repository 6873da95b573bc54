#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use rewardbook::prices::{OracleError, PriceOracle};
use rust_decimal::Decimal;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Oracle backed by a fixed (date -> price) table; counts calls.
pub struct TableOracle {
    prices: HashMap<NaiveDate, Decimal>,
    calls: AtomicUsize,
}

impl TableOracle {
    pub fn new(prices: impl IntoIterator<Item = (NaiveDate, Decimal)>) -> Self {
        Self {
            prices: prices.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new([])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for TableOracle {
    async fn historical_price(
        &self,
        _asset: &str,
        date: NaiveDate,
        _currency: &str,
    ) -> Result<Decimal, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prices
            .get(&date)
            .copied()
            .ok_or_else(|| OracleError::Unavailable(format!("no canned price for {date}")))
    }

    fn name(&self) -> &str {
        "table"
    }
}
