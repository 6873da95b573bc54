//! Reward extraction from ledger exports.
//!
//! A ledger export is a comma-delimited file with one header row. Column
//! positions vary by exchange/wallet, so the layout is configuration, not
//! code; the same reader serves a Ledger Live export (time, asset, type,
//! amount) and a bare two-column reward dump.

use std::path::Path;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::RewardEvent;

/// Column positions of the fields read from a ledger export. 0-based.
///
/// A config that names a layout explicitly starts from an empty one:
/// omitted optional columns stay absent rather than inheriting the
/// Ledger Live positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerLayout {
    #[serde(default)]
    pub date_column: usize,
    #[serde(default)]
    pub asset_column: Option<usize>,
    #[serde(default)]
    pub type_column: Option<usize>,
    pub amount_column: usize,
}

impl Default for LedgerLayout {
    /// Ledger Live staking export: timestamp, asset, operation type, amount.
    fn default() -> Self {
        Self {
            date_column: 0,
            asset_column: Some(1),
            type_column: Some(2),
            amount_column: 3,
        }
    }
}

/// Row-selection rules. Rows failing a configured match are skipped
/// silently; an unset rule matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardFilter {
    /// Transaction-type labels that count as rewards (e.g. "REWARD_PAYOUT").
    pub transaction_types: Vec<String>,
    /// Asset symbol to keep. Doubles as the attributed symbol when the
    /// layout has no asset column.
    pub asset: Option<String>,
}

impl RewardFilter {
    fn matches_type(&self, value: &str) -> bool {
        self.transaction_types.is_empty()
            || self.transaction_types.iter().any(|t| t == value.trim())
    }

    fn matches_asset(&self, value: &str) -> bool {
        match &self.asset {
            Some(asset) => asset.eq_ignore_ascii_case(value.trim()),
            None => true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A structurally broken data row. Fatal; row indices are 1-based and
    /// count data rows only (the header is row 0).
    #[error("malformed ledger row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    #[error("invalid ledger configuration: {0}")]
    Config(String),

    #[error("failed to read ledger")]
    Csv(#[from] csv::Error),
}

/// Lazy, single-pass reader producing [`RewardEvent`]s from a ledger export.
///
/// The header row is consumed on open. Rows filtered out by type/asset, and
/// rewards below the dust threshold, are skipped silently; structurally
/// broken rows abort iteration with [`LedgerError::MalformedRecord`].
pub struct LedgerReader {
    records: csv::StringRecordsIntoIter<std::fs::File>,
    layout: LedgerLayout,
    filter: RewardFilter,
    dust_threshold: Decimal,
    date_prefix: Regex,
    row: usize,
}

impl std::fmt::Debug for LedgerReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerReader")
            .field("layout", &self.layout)
            .field("filter", &self.filter)
            .field("dust_threshold", &self.dust_threshold)
            .field("date_prefix", &self.date_prefix)
            .field("row", &self.row)
            .finish_non_exhaustive()
    }
}

impl LedgerReader {
    pub fn open(
        path: impl AsRef<Path>,
        layout: LedgerLayout,
        filter: RewardFilter,
        dust_threshold: Decimal,
    ) -> Result<Self, LedgerError> {
        if layout.asset_column.is_none() && filter.asset.is_none() {
            return Err(LedgerError::Config(
                "layout has no asset column and no asset filter to attribute rewards to"
                    .to_string(),
            ));
        }

        // The first three dash-separated numeric groups of the date field
        // are year, month, day; anything after (time of day, zone) is
        // ignored.
        let date_prefix = Regex::new(r"^(\d+)-(\d+)-(\d+)")
            .map_err(|e| LedgerError::Config(format!("date prefix pattern: {e}")))?;

        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        Ok(Self {
            records: reader.into_records(),
            layout,
            filter,
            dust_threshold,
            date_prefix,
            row: 0,
        })
    }

    fn malformed(&self, reason: String) -> LedgerError {
        LedgerError::MalformedRecord {
            row: self.row,
            reason,
        }
    }

    fn field<'r>(
        &self,
        record: &'r csv::StringRecord,
        idx: usize,
        name: &str,
    ) -> Result<&'r str, LedgerError> {
        record
            .get(idx)
            .ok_or_else(|| self.malformed(format!("missing {name} column {idx}")))
    }

    fn parse_date(&self, raw: &str) -> Result<NaiveDate, LedgerError> {
        let caps = self
            .date_prefix
            .captures(raw.trim())
            .ok_or_else(|| self.malformed(format!("unparsable date {raw:?}")))?;

        let year: i32 = caps[1]
            .parse()
            .map_err(|e| self.malformed(format!("bad year in {raw:?}: {e}")))?;
        let month: u32 = caps[2]
            .parse()
            .map_err(|e| self.malformed(format!("bad month in {raw:?}: {e}")))?;
        let day: u32 = caps[3]
            .parse()
            .map_err(|e| self.malformed(format!("bad day in {raw:?}: {e}")))?;

        NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| self.malformed(format!("impossible calendar date {raw:?}")))
    }

    fn parse_record(&self, record: &csv::StringRecord) -> Result<Option<RewardEvent>, LedgerError> {
        if let Some(idx) = self.layout.type_column {
            let row_type = self.field(record, idx, "type")?;
            if !self.filter.matches_type(row_type) {
                return Ok(None);
            }
        }

        let asset = match self.layout.asset_column {
            Some(idx) => {
                let symbol = self.field(record, idx, "asset")?.trim().to_uppercase();
                if !self.filter.matches_asset(&symbol) {
                    return Ok(None);
                }
                symbol
            }
            // Checked at open: filter.asset is present when the column isn't.
            None => match &self.filter.asset {
                Some(symbol) => symbol.trim().to_uppercase(),
                None => return Err(self.malformed("no asset column".to_string())),
            },
        };

        let raw_date = self.field(record, self.layout.date_column, "date")?;
        let date = self.parse_date(raw_date)?;

        let raw_amount = self.field(record, self.layout.amount_column, "amount")?;
        let quantity: Decimal = raw_amount
            .trim()
            .parse()
            .map_err(|e| self.malformed(format!("non-numeric quantity {raw_amount:?}: {e}")))?;

        if quantity < self.dust_threshold {
            debug!(row = self.row, %quantity, %date, "skipping dust reward");
            return Ok(None);
        }

        Ok(Some(RewardEvent::new(date, asset, quantity)))
    }
}

impl Iterator for LedgerReader {
    type Item = Result<RewardEvent, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e.into())),
            };
            self.row += 1;

            match self.parse_record(&record) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
