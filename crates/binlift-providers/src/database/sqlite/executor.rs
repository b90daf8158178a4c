//! `SQLite` implementation of the database executor port.
//!
//! Uses the domain port [`DatabaseExecutor`] and [`SqlRow`]; repositories
//! depend on these traits and do not use sqlx directly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{DatabaseExecutor, SqlParam, SqlRow};
use sqlx::Column;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// Row adapter that copies column values from a `SQLite` row so it can be
/// returned as `Arc<dyn SqlRow>` without holding a reference to the
/// connection.
#[derive(Debug)]
struct SqliteMappedRow {
    strings: HashMap<String, Option<String>>,
    i64s: HashMap<String, Option<i64>>,
    f64s: HashMap<String, Option<f64>>,
}

impl SqliteMappedRow {
    fn from_sqlite_row(row: &SqliteRow) -> Self {
        let mut strings = HashMap::new();
        let mut i64s = HashMap::new();
        let mut f64s = HashMap::new();
        for (i, col) in row.columns().iter().enumerate() {
            let name = col.name().to_owned();
            if let Ok(v) = row.try_get::<String, _>(i) {
                strings.insert(name.clone(), Some(v));
            } else if let Ok(v) = row.try_get::<i64, _>(i) {
                i64s.insert(name.clone(), Some(v));
            } else if let Ok(v) = row.try_get::<f64, _>(i) {
                f64s.insert(name.clone(), Some(v));
            } else if let Ok(opt) = row.try_get::<Option<String>, _>(i) {
                strings.insert(name.clone(), opt);
            } else if let Ok(opt) = row.try_get::<Option<i64>, _>(i) {
                i64s.insert(name.clone(), opt);
            } else if let Ok(opt) = row.try_get::<Option<f64>, _>(i) {
                f64s.insert(name.clone(), opt);
            } else {
                strings.insert(name, None);
            }
        }
        Self {
            strings,
            i64s,
            f64s,
        }
    }
}

impl SqlRow for SqliteMappedRow {
    fn try_get_string(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .strings
            .get(name)
            .cloned()
            .flatten()
            .or_else(|| self.i64s.get(name).and_then(|n| n.map(|v| v.to_string()))))
    }

    fn try_get_i64(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.i64s.get(name).copied().flatten().or_else(|| {
            self.strings
                .get(name)
                .and_then(|s| s.as_ref().and_then(|s| s.parse().ok()))
        }))
    }

    fn try_get_f64(&self, name: &str) -> Result<Option<f64>> {
        Ok(self.f64s.get(name).copied().flatten().or_else(|| {
            self.i64s
                .get(name)
                .and_then(|n| n.map(|v| v as f64))
                .or_else(|| {
                    self.strings
                        .get(name)
                        .and_then(|s| s.as_ref().and_then(|s| s.parse().ok()))
                })
        }))
    }
}

fn bind_params<'q>(
    mut q: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    params: &'q [SqlParam],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for p in params {
        q = match p {
            SqlParam::String(s) => q.bind(s.as_str()),
            SqlParam::I64(n) => q.bind(*n),
            SqlParam::F64(f) => q.bind(*f),
            SqlParam::Null => q.bind(Option::<String>::None),
        };
    }
    q
}

/// `SQLite` implementation of the database executor port.
pub struct SqliteExecutor {
    pool: sqlx::SqlitePool,
}

impl SqliteExecutor {
    /// Create an executor that uses the given pool.
    #[must_use]
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Get reference to inner pool
    #[must_use]
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        let q = bind_params(sqlx::query(sql), params);
        let done = q
            .execute(&self.pool)
            .await
            .map_err(|e| Error::storage_tx_with_source(format!("SQL execute failed: {sql}"), e))?;
        Ok(done.rows_affected())
    }

    async fn query_one(&self, sql: &str, params: &[SqlParam]) -> Result<Option<Arc<dyn SqlRow>>> {
        let q = bind_params(sqlx::query(sql), params);
        let row = q
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::storage_tx_with_source(format!("SQL query_one failed: {sql}"), e))?;
        Ok(row.map(|r| Arc::new(SqliteMappedRow::from_sqlite_row(&r)) as Arc<dyn SqlRow>))
    }

    async fn query_all(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Arc<dyn SqlRow>>> {
        let q = bind_params(sqlx::query(sql), params);
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::storage_tx_with_source(format!("SQL query_all failed: {sql}"), e))?;
        Ok(rows
            .iter()
            .map(|r| Arc::new(SqliteMappedRow::from_sqlite_row(r)) as Arc<dyn SqlRow>)
            .collect())
    }
}
