use crate::error::{HandlerError, SinkError};
use crate::point::Point;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Asynchronous destination for [`Point`]s produced by the handler.
///
/// Implementations wrap a concrete time-series client (InfluxDB over HTTP
/// or UDP, a test double, stdout, ...). Dispatchers call these methods from
/// their own task; only the synchronous dispatcher awaits them on the
/// caller's task.
#[async_trait]
pub trait PointSink: Send + Sync {
    /// Write a batch of points.
    ///
    /// **Parameters**
    /// - `points`: every point built for one record, or a whole buffered
    ///   window when called from the buffering dispatcher.
    /// - `retention_policy`: optional retention policy to write into.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the batch.
    /// - `Err(..)` on connection, authentication or rejection errors. The
    ///   dispatchers never retry a failed batch.
    async fn write(&self, points: &[Point], retention_policy: Option<&str>)
        -> Result<(), SinkError>;

    /// Names of every database known to the backend.
    async fn list_databases(&self) -> Result<BTreeSet<String>, SinkError>;

    /// Create `name` on the backend.
    async fn create_database(&self, name: &str) -> Result<(), SinkError>;
}

/// Make sure `database` exists, creating it when missing.
///
/// Fails with the sink error if listing fails, and with
/// [`HandlerError::DatabaseMissing`] if the database is absent and creating
/// it fails.
pub async fn ensure_database(sink: &dyn PointSink, database: &str) -> Result<(), HandlerError> {
    let existing = sink.list_databases().await?;
    if existing.contains(database) {
        return Ok(());
    }

    tracing::debug!(database, "creating missing database");
    sink.create_database(database)
        .await
        .map_err(|source| HandlerError::DatabaseMissing {
            database: database.to_string(),
            source,
        })
}
