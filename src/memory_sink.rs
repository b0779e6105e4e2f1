use crate::error::SinkError;
use crate::point::Point;
use crate::sink::PointSink;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One recorded `write` call.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub points: Vec<Point>,
    pub retention_policy: Option<String>,
}

#[derive(Default)]
struct Inner {
    writes: Mutex<Vec<WriteCall>>,
    databases: Mutex<BTreeSet<String>>,
    fail_writes: AtomicBool,
    fail_admin: AtomicBool,
}

/// In-process sink that records every call.
///
/// Clones share state, so a test can keep one handle while the dispatcher
/// owns another. Failures can be switched on to exercise error paths.
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that already knows `databases`.
    pub fn with_databases<I, S>(databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sink = Self::default();
        lock(&sink.inner.databases).extend(databases.into_iter().map(Into::into));
        sink
    }

    /// Make every subsequent `write` fail with [`SinkError::Unavailable`].
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `list_databases` and `create_database` fail.
    pub fn fail_admin(&self, fail: bool) {
        self.inner.fail_admin.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        lock(&self.inner.writes).clone()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.inner.writes).len()
    }

    /// All written points in write order.
    pub fn points(&self) -> Vec<Point> {
        lock(&self.inner.writes)
            .iter()
            .flat_map(|w| w.points.iter().cloned())
            .collect()
    }

    pub fn databases(&self) -> BTreeSet<String> {
        lock(&self.inner.databases).clone()
    }
}

#[async_trait]
impl PointSink for MemorySink {
    async fn write(&self, points: &[Point], retention_policy: Option<&str>) -> Result<(), SinkError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("memory sink write failure".to_string()));
        }
        lock(&self.inner.writes).push(WriteCall {
            points: points.to_vec(),
            retention_policy: retention_policy.map(str::to_string),
        });
        Ok(())
    }

    async fn list_databases(&self) -> Result<BTreeSet<String>, SinkError> {
        if self.inner.fail_admin.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("memory sink admin failure".to_string()));
        }
        Ok(self.databases())
    }

    async fn create_database(&self, name: &str) -> Result<(), SinkError> {
        if self.inner.fail_admin.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected(format!("cannot create {}", name)));
        }
        lock(&self.inner.databases).insert(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::sink::ensure_database;

    #[tokio::test]
    async fn test_ensure_database_creates_missing() {
        let sink = MemorySink::new();
        ensure_database(&sink, "logs").await.unwrap();
        assert!(sink.databases().contains("logs"));
    }

    #[tokio::test]
    async fn test_ensure_database_existing_is_untouched() {
        let sink = MemorySink::with_databases(["logs", "other"]);
        ensure_database(&sink, "logs").await.unwrap();
        assert_eq!(sink.databases().len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_database_propagates_list_failure() {
        let sink = MemorySink::new();
        sink.fail_admin(true);
        let err = ensure_database(&sink, "logs").await.unwrap_err();
        assert!(matches!(err, HandlerError::Sink(SinkError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_failed_write_is_not_recorded() {
        let sink = MemorySink::new();
        sink.fail_writes(true);
        assert!(sink.write(&[], None).await.is_err());
        sink.fail_writes(false);
        sink.write(&[], Some("autogen")).await.unwrap();
        assert_eq!(sink.write_count(), 1);
        assert_eq!(sink.writes()[0].retention_policy.as_deref(), Some("autogen"));
    }
}
