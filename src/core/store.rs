//! Persistence abstraction for rate readings

use crate::core::rate::RateReading;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("failed to decode stored reading: {0}")]
    Decode(String),
    #[error("database operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid rate value: {0}")]
    InvalidValue(Decimal),
}

/// Append-only log of rate readings.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Creates the readings table when it does not exist yet.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Appends a reading; the timestamp is assigned by the backend.
    async fn insert(&self, value: Decimal) -> Result<(), StoreError>;

    /// Newest reading, or `None` when nothing has been stored.
    async fn latest(&self) -> Result<Option<RateReading>, StoreError>;

    /// Up to `limit` newest readings, newest first.
    async fn recent(&self, limit: u32) -> Result<Vec<RateReading>, StoreError>;
}
