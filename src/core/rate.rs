//! Rate readings and the source abstraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Number of fractional digits kept for every stored rate.
pub const RATE_SCALE: u32 = 4;

/// One persisted exchange-rate observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateReading {
    #[serde(rename = "rate", with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub recorded_at: DateTime<Utc>,
}

/// Rounds a raw value to the stored precision.
///
/// Returns `None` for zero or negative values, which are never valid rates.
pub fn normalize_rate(value: Decimal) -> Option<Decimal> {
    let rounded = value.round_dp(RATE_SCALE);
    (rounded > Decimal::ZERO).then_some(rounded)
}

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetches the current rate. Failures are logged by the implementation
    /// and reported as `None`.
    async fn fetch_rate(&self) -> Option<Decimal>;
}
