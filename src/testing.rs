//! Test helpers.

use std::sync::Arc;

use crate::db::Database;
use crate::db::libsql::LibSqlBackend;

/// Fresh libSQL database with the schema applied, in a temp directory that
/// lives as long as the returned guard.
pub(crate) async fn test_db() -> (Arc<dyn Database>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let backend = LibSqlBackend::new_local(&dir.path().join("test.db"))
        .await
        .expect("open libsql database");
    backend.run_migrations().await.expect("run migrations");
    (Arc::new(backend), dir)
}
