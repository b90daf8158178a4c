//! Shared query helpers for the `SQLite` repositories.

use std::sync::Arc;

use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{DatabaseExecutor, SqlParam, SqlRow};

/// Query a single row and convert it to an entity.
pub async fn query_one<T, F>(
    executor: &Arc<dyn DatabaseExecutor>,
    sql: &str,
    params: &[SqlParam],
    convert: F,
) -> Result<Option<T>>
where
    F: FnOnce(&dyn SqlRow) -> Result<T>,
{
    match executor.query_one(sql, params).await? {
        Some(r) => Ok(Some(convert(r.as_ref())?)),
        None => Ok(None),
    }
}

/// Query multiple rows and convert them to entities.
pub async fn query_all<T, F>(
    executor: &Arc<dyn DatabaseExecutor>,
    sql: &str,
    params: &[SqlParam],
    convert: F,
    entity_name: &str,
) -> Result<Vec<T>>
where
    F: Fn(&dyn SqlRow) -> Result<T>,
{
    let rows = executor.query_all(sql, params).await?;
    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        result.push(
            convert(row.as_ref())
                .map_err(|e| Error::storage_tx(format!("decode {entity_name}: {e}")))?,
        );
    }
    Ok(result)
}

/// Read a required column, surfacing a decode error when absent.
pub fn required_string(row: &dyn SqlRow, name: &str) -> Result<String> {
    row.try_get_string(name)?
        .ok_or_else(|| Error::storage_tx(format!("missing column '{name}'")))
}

/// Read a required integer column.
pub fn required_i64(row: &dyn SqlRow, name: &str) -> Result<i64> {
    row.try_get_i64(name)?
        .ok_or_else(|| Error::storage_tx(format!("missing column '{name}'")))
}

/// Read a required float column.
pub fn required_f64(row: &dyn SqlRow, name: &str) -> Result<f64> {
    row.try_get_f64(name)?
        .ok_or_else(|| Error::storage_tx(format!("missing column '{name}'")))
}
