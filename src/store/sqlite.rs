use crate::core::{RateReading, RateStore, StoreError, normalize_rate};
use crate::store::{bounded, release};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

// SQLite has no decimal type, so rates are kept as text to stay exact.
const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS rate_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rate TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
"#;

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_rate_readings_recorded_at ON rate_readings (recorded_at)";

const INSERT_READING: &str = "INSERT INTO rate_readings (rate) VALUES (?)";

const SELECT_RECENT: &str = r#"
SELECT rate, recorded_at
FROM rate_readings
ORDER BY recorded_at DESC, id DESC
LIMIT ?
"#;

/// SQLite-backed store for local runs and tests.
pub struct SqliteStore {
    options: SqliteConnectOptions,
    timeout: Duration,
}

impl SqliteStore {
    pub fn new(path: &Path, timeout: Duration) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(timeout);
        Self { options, timeout }
    }

    async fn connect(&self) -> Result<SqliteConnection, StoreError> {
        SqliteConnection::connect_with(&self.options)
            .await
            .map_err(StoreError::Connect)
    }

    async fn select_recent(&self, limit: u32) -> Result<Vec<RateReading>, StoreError> {
        bounded(self.timeout, async {
            let mut conn = self.connect().await?;
            let rows = sqlx::query_as::<_, (String, String)>(SELECT_RECENT)
                .bind(i64::from(limit))
                .fetch_all(&mut conn)
                .await;
            release(conn).await;

            rows?
                .into_iter()
                .map(|(rate, recorded_at)| decode_reading(&rate, &recorded_at))
                .collect::<Result<Vec<_>, StoreError>>()
        })
        .await
    }
}

fn decode_reading(rate: &str, recorded_at: &str) -> Result<RateReading, StoreError> {
    let value = Decimal::from_str(rate)
        .map_err(|e| StoreError::Decode(format!("rate '{rate}': {e}")))?;
    let recorded_at = DateTime::parse_from_rfc3339(recorded_at)
        .map_err(|e| StoreError::Decode(format!("recorded_at '{recorded_at}': {e}")))?
        .with_timezone(&Utc);
    Ok(RateReading { value, recorded_at })
}

#[async_trait]
impl RateStore for SqliteStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        bounded(self.timeout, async {
            let mut conn = self.connect().await?;
            let mut result = sqlx::query(CREATE_TABLE).execute(&mut conn).await;
            if result.is_ok() {
                result = sqlx::query(CREATE_INDEX).execute(&mut conn).await;
            }
            release(conn).await;
            result?;
            debug!("Ensured table rate_readings exists");
            Ok(())
        })
        .await
    }

    async fn insert(&self, value: Decimal) -> Result<(), StoreError> {
        let rate = normalize_rate(value).ok_or(StoreError::InvalidValue(value))?;

        bounded(self.timeout, async {
            let mut conn = self.connect().await?;
            let result = sqlx::query(INSERT_READING)
                .bind(rate.to_string())
                .execute(&mut conn)
                .await;
            release(conn).await;
            result?;
            debug!(%rate, "Inserted rate reading");
            Ok(())
        })
        .await
    }

    async fn latest(&self) -> Result<Option<RateReading>, StoreError> {
        Ok(self.select_recent(1).await?.into_iter().next())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<RateReading>, StoreError> {
        self.select_recent(limit).await
    }
}
