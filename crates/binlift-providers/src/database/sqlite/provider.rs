//! `SQLite` database provider.
//!
//! # Overview
//! The `SqliteDatabaseProvider` is the factory and lifecycle manager for the
//! structured store: it configures the connection pool (WAL mode for file
//! databases), applies the schema at connect time, and hands out a shared
//! [`DatabaseExecutor`] the repositories run against.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{DatabaseExecutor, DatabaseProvider};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use super::ddl::DDL;
use super::executor::SqliteExecutor;

/// `SQLite` implementation of the database provider port.
pub struct SqliteDatabaseProvider;

impl SqliteDatabaseProvider {
    async fn apply_ddl(executor: &SqliteExecutor) -> Result<()> {
        for stmt in DDL {
            executor.execute(stmt, &[]).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseProvider for SqliteDatabaseProvider {
    async fn connect(&self, url: &str) -> Result<Arc<dyn DatabaseExecutor>> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::config_with_source(format!("invalid store URL '{url}'"), e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| Error::storage_tx_with_source(format!("connect to '{url}'"), e))?;
        let executor = SqliteExecutor::new(pool);
        Self::apply_ddl(&executor).await?;
        Ok(Arc::new(executor))
    }

    async fn connect_in_memory(&self) -> Result<Arc<dyn DatabaseExecutor>> {
        // A pool larger than one connection would hand each connection its
        // own empty in-memory database.
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::config_with_source("in-memory store options", e))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::storage_tx_with_source("connect in-memory store", e))?;
        let executor = SqliteExecutor::new(pool);
        Self::apply_ddl(&executor).await?;
        Ok(Arc::new(executor))
    }
}
