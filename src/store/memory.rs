use crate::core::{RateReading, RateStore, StoreError, normalize_rate};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory store implementation using a Vec behind a Mutex.
///
/// Readings live only as long as the process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Vec<RateReading>>>,
}

impl MemoryStore {
    /// Creates a new, empty MemoryStore
    pub fn new() -> Self {
        Self::default()
    }

    /// Readings ordered newest first; insertion order breaks timestamp ties.
    async fn newest_first(&self, limit: usize) -> Vec<RateReading> {
        let readings = self.inner.lock().await;
        let mut indexed: Vec<(usize, &RateReading)> = readings.iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| b.recorded_at.cmp(&a.recorded_at).then(ib.cmp(ia)));
        indexed
            .into_iter()
            .take(limit)
            .map(|(_, reading)| reading.clone())
            .collect()
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert(&self, value: Decimal) -> Result<(), StoreError> {
        let rate = normalize_rate(value).ok_or(StoreError::InvalidValue(value))?;
        let mut readings = self.inner.lock().await;
        readings.push(RateReading {
            value: rate,
            recorded_at: Utc::now(),
        });
        debug!(%rate, "Memory store INSERT");
        Ok(())
    }

    async fn latest(&self) -> Result<Option<RateReading>, StoreError> {
        Ok(self.newest_first(1).await.into_iter().next())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<RateReading>, StoreError> {
        Ok(self.newest_first(limit as usize).await)
    }
}
