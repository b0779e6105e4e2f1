use crate::config::HandlerConfig;
use crate::dispatcher::{Dispatch, DispatchStats, DispatcherState};
use crate::error::HandlerError;
use crate::point::{build_points, Point};
use crate::record::LogRecord;
use crate::sink::{ensure_database, PointSink};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Converts records and writes them immediately, on the caller's task.
///
/// This is also the write path the queue-backed dispatchers run inside
/// their worker, so all three deliver identical points.
#[derive(Clone)]
pub struct SyncDispatcher {
    sink: Arc<dyn PointSink>,
    config: Arc<HandlerConfig>,
}

impl SyncDispatcher {
    /// Wrap `sink`, making sure the target database exists first unless
    /// `config.lazy_init` is set.
    ///
    /// **Errors**
    /// - the sink error if the database list cannot be fetched
    /// - [`HandlerError::DatabaseMissing`] if the database is absent and
    ///   cannot be created
    pub async fn connect(sink: Arc<dyn PointSink>, config: HandlerConfig) -> Result<Self, HandlerError> {
        if !config.lazy_init {
            ensure_database(sink.as_ref(), &config.database).await?;
        }
        Ok(Self {
            sink,
            config: Arc::new(config),
        })
    }

    pub fn sink(&self) -> &Arc<dyn PointSink> {
        &self.sink
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn points(&self, record: &LogRecord) -> Vec<Point> {
        build_points(record, &self.config.points)
    }

    /// Build the points for `record` and write them in one call.
    pub async fn emit(&self, record: &LogRecord) -> Result<(), HandlerError> {
        let points = self.points(record);
        self.write_points(&points).await
    }

    /// Write already built points with the configured retention policy.
    pub async fn write_points(&self, points: &[Point]) -> Result<(), HandlerError> {
        self.sink
            .write(points, self.config.retention_policy.as_deref())
            .await?;
        Ok(())
    }
}

/// [`Dispatch`] adapter that writes each record before `emit` returns.
///
/// `emit` blocks the calling thread on the sink write, driven by the
/// runtime that created the dispatcher. That works from a plain thread and
/// from a multi-threaded Tokio runtime (through
/// [`block_in_place`](tokio::task::block_in_place)). Inside a current-thread
/// runtime it would deadlock, so `emit` returns
/// [`HandlerError::UnsupportedRuntime`] there instead.
///
/// Sink errors are returned from `emit`; nothing is queued or retried.
pub struct InlineDispatcher {
    writer: SyncDispatcher,
    runtime: Handle,
    stopped: AtomicBool,
    stats: DispatchStats,
}

impl InlineDispatcher {
    /// Wrap a connected writer. Must be called from a multi-threaded Tokio
    /// runtime.
    pub fn new(writer: SyncDispatcher) -> Result<Self, HandlerError> {
        let runtime = Handle::try_current().map_err(|_| HandlerError::UnsupportedRuntime)?;
        if runtime.runtime_flavor() != RuntimeFlavor::MultiThread {
            return Err(HandlerError::UnsupportedRuntime);
        }
        Ok(Self {
            writer,
            runtime,
            stopped: AtomicBool::new(false),
            stats: DispatchStats::default(),
        })
    }

    pub fn writer(&self) -> &SyncDispatcher {
        &self.writer
    }
}

fn can_block_current_thread() -> bool {
    match Handle::try_current() {
        Ok(current) => current.runtime_flavor() == RuntimeFlavor::MultiThread,
        Err(_) => true,
    }
}

#[async_trait]
impl Dispatch for InlineDispatcher {
    fn emit(&self, record: LogRecord) -> Result<(), HandlerError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(HandlerError::QueueClosed);
        }
        if !can_block_current_thread() {
            return Err(HandlerError::UnsupportedRuntime);
        }

        let points = self.writer.points(&record);
        let result = tokio::task::block_in_place(|| {
            self.runtime.block_on(self.writer.write_points(&points))
        });
        match &result {
            Ok(()) => {
                self.stats
                    .written_points
                    .fetch_add(points.len() as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.failed_writes.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    async fn flush(&self) -> Result<(), HandlerError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(HandlerError::QueueClosed);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), HandlerError> {
        self.stopped.store(true, Ordering::Release);
        Ok(())
    }

    fn state(&self) -> DispatcherState {
        if self.stopped.load(Ordering::Acquire) {
            DispatcherState::Stopped
        } else {
            DispatcherState::Running
        }
    }

    fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}
