//! libSQL/Turso backend for the Database trait.
//!
//! Every operation opens its own connection; writes wrap their statements in
//! `BEGIN IMMEDIATE` / `COMMIT` on that connection.

mod matrix;

use std::path::Path;

use libsql::{Connection, Row, Value};

use crate::db::Database;
use crate::db::libsql_migrations::SCHEMA;
use crate::error::DatabaseError;

/// Milliseconds a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// libSQL database backend.
pub struct LibSqlBackend {
    db: libsql::Database,
}

impl LibSqlBackend {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        ensure_parent_dir(path)?;
        let db = libsql::Builder::new_local(path).build().await?;
        Ok(Self { db })
    }

    /// Open a local replica synced from a remote libSQL server.
    pub async fn new_remote_replica(
        path: &Path,
        url: &str,
        auth_token: &str,
    ) -> Result<Self, DatabaseError> {
        ensure_parent_dir(path)?;
        let db = libsql::Builder::new_remote_replica(path, url.to_string(), auth_token.to_string())
            .build()
            .await?;
        Ok(Self { db })
    }

    /// Open a connection with a busy timeout and foreign keys enforced.
    pub(crate) async fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = self.db.connect()?;
        // The pragma answers with the new value, so it goes through query and
        // the row is stepped to apply it.
        conn.query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"), ())
            .await?
            .next()
            .await?;
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        Ok(conn)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), DatabaseError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            DatabaseError::Pool(format!(
                "failed to create database directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    Ok(())
}

pub(crate) fn get_i64(row: &Row, idx: i32) -> i64 {
    row.get::<i64>(idx).unwrap_or_default()
}

pub(crate) fn get_opt_i64(row: &Row, idx: i32) -> Option<i64> {
    row.get::<Option<i64>>(idx).ok().flatten()
}

pub(crate) fn get_text(row: &Row, idx: i32) -> String {
    row.get::<String>(idx).unwrap_or_default()
}

pub(crate) fn get_opt_text(row: &Row, idx: i32) -> Option<String> {
    row.get::<Option<String>>(idx).ok().flatten()
}

pub(crate) fn opt_i64(value: Option<i64>) -> Value {
    match value {
        Some(v) => Value::Integer(v),
        None => Value::Null,
    }
}

#[async_trait::async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        tracing::debug!("libsql schema is up to date");
        Ok(())
    }
}
