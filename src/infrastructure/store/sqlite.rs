//! SQLite data store adapter

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use crate::application::ports::{EntitlementStore, StoreError, UsageStore};
use crate::domain::entitlement::{Entitlement, EntitlementPatch, EntitlementStatus};
use crate::domain::usage::{UsageCounter, UsageKind, UsageSnapshot};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS usage_counters (
  user_id TEXT PRIMARY KEY,
  day TEXT NOT NULL,
  transcription_count INTEGER NOT NULL DEFAULT 0,
  natural_input_count INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS entitlements (
  user_id TEXT PRIMARY KEY,
  status TEXT NOT NULL,
  external_customer_id TEXT NOT NULL,
  external_subscription_id TEXT,
  external_price_id TEXT,
  current_period_start TEXT,
  current_period_end TEXT,
  updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS entitlements_subscription
  ON entitlements (external_subscription_id);
";

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Counters and entitlements in a local SQLite file.
///
/// Every counter increment runs in its own `BEGIN IMMEDIATE` transaction,
/// so concurrent callers (threads or processes sharing the file) serialize
/// on the write lock and cannot both pass the daily cap.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .map_err(db_err)
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn conversion_err(
    column: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e))
}

fn load_counter(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<UsageCounter>> {
    conn.query_row(
        "SELECT day, transcription_count, natural_input_count
         FROM usage_counters WHERE user_id = ?1",
        params![user_id],
        |row| {
            let day: String = row.get(0)?;
            Ok(UsageCounter {
                day: NaiveDate::parse_from_str(&day, DAY_FORMAT).map_err(|e| conversion_err(0, e))?,
                transcription_count: row.get(1)?,
                natural_input_count: row.get(2)?,
            })
        },
    )
    .optional()
}

fn save_counter(conn: &Connection, user_id: &str, counter: &UsageCounter) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO usage_counters (user_id, day, transcription_count, natural_input_count)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (user_id) DO UPDATE SET
           day = excluded.day,
           transcription_count = excluded.transcription_count,
           natural_input_count = excluded.natural_input_count",
        params![
            user_id,
            counter.day.format(DAY_FORMAT).to_string(),
            counter.transcription_count,
            counter.natural_input_count
        ],
    )?;
    Ok(())
}

fn has_active_access(conn: &Connection, user_id: &str) -> rusqlite::Result<bool> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM entitlements WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(status
        .and_then(|s| s.parse::<EntitlementStatus>().ok())
        .is_some_and(|s| s.grants_access()))
}

fn increment_and_check(
    conn: &mut Connection,
    user_id: &str,
    kind: UsageKind,
    today: NaiveDate,
) -> rusqlite::Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let unlimited = has_active_access(&tx, user_id)?;
    let stored = load_counter(&tx, user_id)?;
    let mut counter = stored.unwrap_or_else(|| UsageCounter::new(today));
    let allowed = counter.try_increment(kind, today, unlimited);

    if stored != Some(counter) {
        save_counter(&tx, user_id, &counter)?;
    }
    tx.commit()?;

    Ok(allowed)
}

fn parse_timestamp(column: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| conversion_err(column, e))
        })
        .transpose()
}

fn entitlement_from_row(row: &Row<'_>) -> rusqlite::Result<Entitlement> {
    let status: String = row.get(1)?;
    Ok(Entitlement {
        user_id: row.get(0)?,
        status: status.parse().map_err(|e| conversion_err(1, e))?,
        external_customer_id: row.get(2)?,
        external_subscription_id: row.get(3)?,
        external_price_id: row.get(4)?,
        current_period_start: parse_timestamp(5, row.get(5)?)?,
        current_period_end: parse_timestamp(6, row.get(6)?)?,
    })
}

#[async_trait]
impl UsageStore for SqliteStore {
    async fn usage(&self, user_id: &str, today: NaiveDate) -> Result<UsageSnapshot, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let counter = load_counter(conn, &user_id)?
                .map(|c| c.as_of(today))
                .unwrap_or_else(|| UsageCounter::new(today));
            Ok(UsageSnapshot {
                counter,
                has_subscription: has_active_access(conn, &user_id)?,
            })
        })
        .await
    }

    async fn increment_and_check(
        &self,
        user_id: &str,
        kind: UsageKind,
        today: NaiveDate,
    ) -> Result<bool, StoreError> {
        let user_id = user_id.to_string();
        let allowed = self
            .with_conn(move |conn| increment_and_check(conn, &user_id, kind, today))
            .await?;
        debug!(%kind, allowed, "usage increment");
        Ok(allowed)
    }
}

#[async_trait]
impl EntitlementStore for SqliteStore {
    async fn entitlement(&self, user_id: &str) -> Result<Option<Entitlement>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT user_id, status, external_customer_id, external_subscription_id,
                        external_price_id, current_period_start, current_period_end
                 FROM entitlements WHERE user_id = ?1",
                params![user_id],
                entitlement_from_row,
            )
            .optional()
        })
        .await
    }

    async fn upsert(&self, entitlement: &Entitlement) -> Result<(), StoreError> {
        let e = entitlement.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO entitlements (user_id, status, external_customer_id,
                   external_subscription_id, external_price_id, current_period_start,
                   current_period_end, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (user_id) DO UPDATE SET
                   status = excluded.status,
                   external_customer_id = excluded.external_customer_id,
                   external_subscription_id = excluded.external_subscription_id,
                   external_price_id = excluded.external_price_id,
                   current_period_start = excluded.current_period_start,
                   current_period_end = excluded.current_period_end,
                   updated_at = excluded.updated_at",
                params![
                    e.user_id,
                    e.status.as_str(),
                    e.external_customer_id,
                    e.external_subscription_id,
                    e.external_price_id,
                    e.current_period_start.map(|t| t.to_rfc3339()),
                    e.current_period_end.map(|t| t.to_rfc3339()),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_by_subscription(
        &self,
        subscription_id: &str,
        patch: &EntitlementPatch,
    ) -> Result<bool, StoreError> {
        let subscription_id = subscription_id.to_string();
        let patch = patch.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE entitlements SET
                   status = ?1,
                   current_period_start = COALESCE(?2, current_period_start),
                   current_period_end = COALESCE(?3, current_period_end),
                   updated_at = ?4
                 WHERE external_subscription_id = ?5",
                params![
                    patch.status.as_str(),
                    patch.current_period_start.map(|t| t.to_rfc3339()),
                    patch.current_period_end.map(|t| t.to_rfc3339()),
                    Utc::now().to_rfc3339(),
                    subscription_id,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }
}
