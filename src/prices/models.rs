use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The fiat value of one unit of an asset on one calendar day.
///
/// `asset` and `date` together form the store key. The date is a plain
/// calendar date serialized as ISO `YYYY-MM-DD`, so the key is identical no
/// matter when or where it was computed. `fetched_at` and `source` are
/// provenance only and never participate in key identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub asset: String,
    pub date: NaiveDate,
    pub price: Decimal,
    pub currency: String,
    pub fetched_at: DateTime<Utc>,
    pub source: String,
}
