use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::models::PricePoint;
use super::store::{PriceStore, StoreError};

/// Durable price store: one JSONL file per fiat currency under `base_path`,
/// one line per (asset, date).
///
/// ```text
/// <base_path>/
///   EUR.jsonl
///   USD.jsonl
/// ```
///
/// Each put is a single appended line, so a concurrent reader sees either
/// no entry or a complete one. If two runs race on the same key, both
/// lines land in the file and reads resolve to the earliest: first writer
/// wins per (asset, date).
pub struct JsonlPriceStore {
    base_path: PathBuf,
    currency: String,
}

impl JsonlPriceStore {
    pub fn new(base_path: impl AsRef<Path>, currency: &str) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            currency: currency.trim().to_uppercase(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    fn price_file(&self) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", self.currency))
    }

    fn io_err(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn json_err(path: &Path, source: serde_json::Error) -> StoreError {
        StoreError::Json {
            path: path.display().to_string(),
            source,
        }
    }

    async fn read_all(&self) -> Result<Vec<PricePoint>, StoreError> {
        let path = self.price_file();
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_err(&path, e)),
        };

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut points = Vec::new();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Self::io_err(&path, e))?
        {
            if line.trim().is_empty() {
                continue;
            }
            let point: PricePoint =
                serde_json::from_str(&line).map_err(|e| Self::json_err(&path, e))?;
            points.push(point);
        }

        Ok(points)
    }

    async fn append(&self, point: &PricePoint) -> Result<(), StoreError> {
        let path = self.price_file();
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| Self::io_err(&self.base_path, e))?;

        let mut line = serde_json::to_string(point).map_err(|e| Self::json_err(&path, e))?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Self::io_err(&path, e))?;
        // One write call per line; appends never interleave mid-line.
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Self::io_err(&path, e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PriceStore for JsonlPriceStore {
    async fn get(&self, asset: &str, date: NaiveDate) -> Result<Option<PricePoint>, StoreError> {
        let points = self.read_all().await?;
        // Earliest line wins if the file somehow carries duplicates.
        Ok(points
            .into_iter()
            .find(|p| p.asset == asset && p.date == date))
    }

    async fn put(&self, point: &PricePoint) -> Result<(), StoreError> {
        let points = self.read_all().await?;
        if points
            .iter()
            .any(|p| p.asset == point.asset && p.date == point.date)
        {
            return Ok(());
        }
        self.append(point).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn point(asset: &str, date: &str, price: rust_decimal::Decimal) -> PricePoint {
        PricePoint {
            asset: asset.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            price,
            currency: "EUR".to_string(),
            fetched_at: Utc::now(),
            source: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = JsonlPriceStore::new(dir.path(), "EUR");

        store.put(&point("DOT", "2021-05-01", dec!(10.5))).await.unwrap();

        let found = store
            .get("DOT", NaiveDate::from_ymd_opt(2021, 5, 1).unwrap())
            .await
            .unwrap()
            .expect("expected stored point");
        assert_eq!(found.price, dec!(10.5));
        assert_eq!(found.currency, "EUR");
    }

    #[tokio::test]
    async fn file_is_keyed_by_currency() {
        let dir = TempDir::new().unwrap();
        let store = JsonlPriceStore::new(dir.path(), "eur");

        store.put(&point("DOT", "2021-05-01", dec!(10))).await.unwrap();

        assert!(dir.path().join("EUR.jsonl").exists());
        assert_eq!(store.currency(), "EUR");
    }

    #[tokio::test]
    async fn duplicate_put_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let store = JsonlPriceStore::new(dir.path(), "EUR");

        store.put(&point("DOT", "2021-05-01", dec!(10))).await.unwrap();
        store.put(&point("DOT", "2021-05-01", dec!(99))).await.unwrap();

        let found = store
            .get("DOT", NaiveDate::from_ymd_opt(2021, 5, 1).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.price, dec!(10));

        let contents = std::fs::read_to_string(dir.path().join("EUR.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn puts_append_one_line_each() {
        let dir = TempDir::new().unwrap();
        let store = JsonlPriceStore::new(dir.path(), "EUR");

        store.put(&point("DOT", "2022-01-02", dec!(8))).await.unwrap();
        store.put(&point("DOT", "2021-05-01", dec!(10))).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("EUR.jsonl")).unwrap();
        let lines: Vec<PricePoint> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].date, NaiveDate::from_ymd_opt(2022, 1, 2).unwrap());
        assert_eq!(lines[1].date, NaiveDate::from_ymd_opt(2021, 5, 1).unwrap());
    }

    #[tokio::test]
    async fn duplicate_lines_resolve_to_the_earliest() {
        // Two racing runs can both append the same key; the first line in
        // the file is the one that counts.
        let dir = TempDir::new().unwrap();
        let store = JsonlPriceStore::new(dir.path(), "EUR");
        let first = serde_json::to_string(&point("DOT", "2021-05-01", dec!(10))).unwrap();
        let second = serde_json::to_string(&point("DOT", "2021-05-01", dec!(99))).unwrap();
        std::fs::write(
            dir.path().join("EUR.jsonl"),
            format!("{first}\n{second}\n"),
        )
        .unwrap();

        let found = store
            .get("DOT", NaiveDate::from_ymd_opt(2021, 5, 1).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.price, dec!(10));
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonlPriceStore::new(dir.path(), "EUR");

        let found = store
            .get("DOT", NaiveDate::from_ymd_opt(2021, 5, 1).unwrap())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn corrupt_line_surfaces_as_json_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("EUR.jsonl"), "not json\n").unwrap();
        let store = JsonlPriceStore::new(dir.path(), "EUR");

        let err = store
            .get("DOT", NaiveDate::from_ymd_opt(2021, 5, 1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[tokio::test]
    async fn blank_lines_are_ignored() {
        let dir = TempDir::new().unwrap();
        let line = serde_json::to_string(&point("DOT", "2021-05-01", dec!(10))).unwrap();
        std::fs::write(dir.path().join("EUR.jsonl"), format!("\n{line}\n\n")).unwrap();
        let store = JsonlPriceStore::new(dir.path(), "EUR");

        let found = store
            .get("DOT", NaiveDate::from_ymd_opt(2021, 5, 1).unwrap())
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
