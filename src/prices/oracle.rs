use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Errors surfaced by a historical-price oracle.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The service asked us to back off (HTTP 429 or a 5xx). Retryable.
    #[error("price service rate limited: {0}")]
    RateLimited(String),

    /// Transport-level failure. Retryable.
    #[error("price service unreachable")]
    Http(#[from] reqwest::Error),

    /// The service answered, but has no usable price for this asset/date.
    /// Not retryable.
    #[error("no price available: {0}")]
    Unavailable(String),
}

impl OracleError {
    /// True for failures expected to resolve if the lookup is retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::RateLimited(_) | OracleError::Http(_))
    }
}

/// Thin interface to an external service returning the fiat price of one
/// unit of an asset on a given calendar date.
#[async_trait::async_trait]
pub trait PriceOracle: Send + Sync {
    async fn historical_price(
        &self,
        asset: &str,
        date: NaiveDate,
        currency: &str,
    ) -> Result<Decimal, OracleError>;

    fn name(&self) -> &str;
}
