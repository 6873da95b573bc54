use std::collections::HashMap;

use chrono::NaiveDate;

use super::models::PricePoint;

/// Failures in the persistence layer backing the price cache. Always fatal;
/// the cache never retries a broken store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("price store io failure: {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("price store entry in {path} is not valid JSON")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Date-keyed persistence for resolved prices.
///
/// Keys are exact (asset, date) pairs; callers are responsible for
/// normalizing the asset symbol before storing or looking up.
#[async_trait::async_trait]
pub trait PriceStore: Send + Sync {
    async fn get(&self, asset: &str, date: NaiveDate) -> Result<Option<PricePoint>, StoreError>;

    /// First-writer-wins upsert: putting a point for an already-priced
    /// (asset, date) leaves the existing entry untouched.
    async fn put(&self, point: &PricePoint) -> Result<(), StoreError>;
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryPriceStore {
    points: tokio::sync::Mutex<HashMap<(String, NaiveDate), PricePoint>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.points.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl PriceStore for MemoryPriceStore {
    async fn get(&self, asset: &str, date: NaiveDate) -> Result<Option<PricePoint>, StoreError> {
        let points = self.points.lock().await;
        Ok(points.get(&(asset.to_string(), date)).cloned())
    }

    async fn put(&self, point: &PricePoint) -> Result<(), StoreError> {
        let mut points = self.points.lock().await;
        points
            .entry((point.asset.clone(), point.date))
            .or_insert_with(|| point.clone());
        Ok(())
    }
}
