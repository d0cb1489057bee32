use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::model::{NewObservation, Observation};

/// Append-only product history.
pub trait SnapshotStore {
    /// Insert rows in order; returns how many were written.
    fn append(&self, observations: &[NewObservation]) -> Result<usize, StoreError>;

    /// Every observation, newest (highest id) first.
    fn read_all_by_recency_desc(&self) -> Result<Vec<Observation>, StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
            // A missing directory surfaces as the open error below.
            let _ = std::fs::create_dir_all(dir);
        }
        let open_err = |source: rusqlite::Error| StoreError::Open {
            path: path.to_string(),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(open_err)?;
        Ok(SqliteStore { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".to_string(),
            source,
        })?;
        Ok(SqliteStore { conn })
    }

    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS price (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    name        TEXT NOT NULL,
                    price       TEXT NOT NULL,
                    product_url TEXT NOT NULL,
                    observed_at TEXT NOT NULL DEFAULT (datetime('now'))
                );
                CREATE INDEX IF NOT EXISTS idx_price_name ON price(name);
                ",
            )
            .map_err(StoreError::Write)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let observations: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM price", [], |r| r.get(0))
            .map_err(StoreError::Read)?;
        let products: usize = self
            .conn
            .query_row("SELECT COUNT(DISTINCT name) FROM price", [], |r| r.get(0))
            .map_err(StoreError::Read)?;
        let comparable: usize = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM (SELECT name FROM price GROUP BY name HAVING COUNT(*) >= 2)",
                [],
                |r| r.get(0),
            )
            .map_err(StoreError::Read)?;
        let last_observed_at: Option<NaiveDateTime> = self
            .conn
            .query_row("SELECT MAX(observed_at) FROM price", [], |r| r.get(0))
            .map_err(StoreError::Read)?;
        Ok(StoreStats {
            observations,
            products,
            comparable,
            last_observed_at,
        })
    }
}

impl SnapshotStore for SqliteStore {
    fn append(&self, observations: &[NewObservation]) -> Result<usize, StoreError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(StoreError::Write)?;
        let mut count = 0;
        {
            let mut stmt = tx
                .prepare("INSERT INTO price (name, price, product_url) VALUES (?1, ?2, ?3)")
                .map_err(StoreError::Write)?;
            for o in observations {
                count += stmt
                    .execute(rusqlite::params![o.name, o.price.to_string(), o.detail_url])
                    .map_err(StoreError::Write)?;
            }
        }
        tx.commit().map_err(StoreError::Write)?;
        Ok(count)
    }

    fn read_all_by_recency_desc(&self) -> Result<Vec<Observation>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, price, product_url, observed_at
                 FROM price
                 ORDER BY id DESC",
            )
            .map_err(StoreError::Read)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<NaiveDateTime>>(4)?,
                ))
            })
            .map_err(StoreError::Read)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Read)?;

        rows.into_iter()
            .map(|(id, name, raw, detail_url, observed_at)| {
                // Stored prices are never negative.
                let price = match Decimal::from_str(&raw) {
                    Ok(price) if !price.is_sign_negative() => price,
                    _ => return Err(StoreError::Corrupt { id, raw }),
                };
                Ok(Observation {
                    id,
                    name,
                    price,
                    detail_url,
                    observed_at,
                })
            })
            .collect()
    }
}

pub struct StoreStats {
    pub observations: usize,
    pub products: usize,
    pub comparable: usize,
    pub last_observed_at: Option<NaiveDateTime>,
}
