use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One staking reward receipt, attributed to a calendar day.
///
/// Produced by the ledger reader, consumed once by the income aggregator.
/// Quantities below the configured dust threshold never leave the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEvent {
    pub date: NaiveDate,
    pub asset: String,
    pub quantity: Decimal,
}

impl RewardEvent {
    pub fn new(date: NaiveDate, asset: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            date,
            asset: asset.into(),
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn reward_event_serialization() {
        let event = RewardEvent::new(
            NaiveDate::from_ymd_opt(2021, 5, 1).unwrap(),
            "DOT",
            dec!(2.0),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"date":"2021-05-01","asset":"DOT","quantity":"2.0"}"#
        );
    }

    #[test]
    fn reward_event_equality() {
        let date = NaiveDate::from_ymd_opt(2021, 5, 1).unwrap();
        assert_eq!(
            RewardEvent::new(date, "DOT", dec!(1)),
            RewardEvent::new(date, "DOT", dec!(1))
        );
    }
}
