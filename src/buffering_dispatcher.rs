use crate::config::HandlerConfig;
use crate::dispatcher::{Dispatch, DispatchStats, DispatcherState, Message, WorkerQueue};
use crate::error::HandlerError;
use crate::point::Point;
use crate::record::LogRecord;
use crate::sink::PointSink;
use crate::sync_dispatcher::SyncDispatcher;
use async_trait::async_trait;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Shortest accepted flush interval.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Flush policy for [`BufferingDispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Buffered points are written at least this often.
    pub flush_interval: Duration,
    /// Also write as soon as this many points are buffered.
    pub flush_threshold: Option<usize>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            flush_threshold: None,
        }
    }
}

impl BufferConfig {
    pub fn new(flush_interval: Duration) -> Self {
        Self {
            flush_interval,
            flush_threshold: None,
        }
    }

    pub fn with_flush_threshold(mut self, points: usize) -> Self {
        self.flush_threshold = Some(points.max(1));
        self
    }
}

/// Dispatcher that batches points into time windows.
///
/// Records are converted by the worker and appended to an in-memory
/// buffer. The whole buffer goes out in a single `write` every
/// `flush_interval`, when the optional threshold is reached, on
/// [`flush`](Dispatch::flush), and once more on [`stop`](Dispatch::stop).
///
/// The buffer has no size cap. A stalled sink under a sustained log rate
/// grows memory without bound.
pub struct BufferingDispatcher {
    queue: WorkerQueue,
    stats: Arc<DispatchStats>,
}

impl BufferingDispatcher {
    /// Connect to `sink` (see [`SyncDispatcher::connect`]) and start the
    /// worker. Must be called from within a Tokio runtime.
    pub async fn start(
        sink: Arc<dyn PointSink>,
        config: HandlerConfig,
        buffer: BufferConfig,
    ) -> Result<Self, HandlerError> {
        let writer = SyncDispatcher::connect(sink, config).await?;
        Ok(Self::spawn(writer, buffer))
    }

    /// Start a worker around an already connected writer.
    pub fn spawn(writer: SyncDispatcher, buffer: BufferConfig) -> Self {
        let flush_interval = buffer.flush_interval.max(MIN_FLUSH_INTERVAL);
        let flush_threshold = buffer.flush_threshold;

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let stats = Arc::new(DispatchStats::default());
        let stats_bg = Arc::clone(&stats);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut pending: Vec<Point> = Vec::new();

            loop {
                tokio::select! {
                    message = rx.recv() => match message {
                        Some(Message::Record(record)) => {
                            pending.extend(writer.points(&record));
                            if flush_threshold.is_some_and(|limit| pending.len() >= limit) {
                                flush_pending(&writer, &mut pending, &stats_bg).await;
                            }
                        }
                        Some(Message::Flush(ack)) => {
                            flush_pending(&writer, &mut pending, &stats_bg).await;
                            let _ = ack.send(());
                        }
                        // Records that raced with stop are still received
                        // before `None`.
                        Some(Message::Shutdown) => rx.close(),
                        None => {
                            flush_pending(&writer, &mut pending, &stats_bg).await;
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        flush_pending(&writer, &mut pending, &stats_bg).await;
                    }
                }
            }
            tracing::debug!("buffering dispatcher worker stopped");
        });

        Self {
            queue: WorkerQueue::new(tx, handle),
            stats,
        }
    }
}

async fn flush_pending(writer: &SyncDispatcher, pending: &mut Vec<Point>, stats: &DispatchStats) {
    if pending.is_empty() {
        return;
    }

    let batch = std::mem::take(pending);
    stats.flushes.fetch_add(1, Ordering::Relaxed);
    match writer.write_points(&batch).await {
        Ok(()) => {
            stats
                .written_points
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
        }
        Err(e) => {
            stats.failed_writes.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, points = batch.len(), "dropping buffered points after failed write");
        }
    }
}

#[async_trait]
impl Dispatch for BufferingDispatcher {
    fn emit(&self, record: LogRecord) -> Result<(), HandlerError> {
        self.queue.emit(record)
    }

    async fn flush(&self) -> Result<(), HandlerError> {
        self.queue.flush().await
    }

    async fn stop(&self) -> Result<(), HandlerError> {
        self.queue.stop().await
    }

    fn state(&self) -> DispatcherState {
        self.queue.state()
    }

    fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_at_least_one() {
        let config = BufferConfig::new(Duration::from_secs(2)).with_flush_threshold(0);
        assert_eq!(config.flush_threshold, Some(1));
    }
}
