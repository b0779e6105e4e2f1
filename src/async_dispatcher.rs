use crate::config::HandlerConfig;
use crate::dispatcher::{Dispatch, DispatchStats, DispatcherState, Message, WorkerQueue};
use crate::error::HandlerError;
use crate::record::LogRecord;
use crate::sink::PointSink;
use crate::sync_dispatcher::SyncDispatcher;
use async_trait::async_trait;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Dispatcher that decouples record arrival from delivery.
///
/// `emit` pushes the raw record onto an unbounded FIFO queue; a single
/// background task converts each record and writes its points, one `write`
/// per record, in exactly the order `emit` was called. A failed write is
/// reported and skipped; the worker keeps going.
///
/// On [`stop`](Dispatch::stop) the queue is closed and drained: a record
/// whose `emit` returned `Ok` is always handed to the sink.
pub struct AsyncDispatcher {
    queue: WorkerQueue,
    stats: Arc<DispatchStats>,
}

impl AsyncDispatcher {
    /// Connect to `sink` (see [`SyncDispatcher::connect`]) and start the
    /// worker. Must be called from within a Tokio runtime.
    pub async fn start(sink: Arc<dyn PointSink>, config: HandlerConfig) -> Result<Self, HandlerError> {
        let writer = SyncDispatcher::connect(sink, config).await?;
        Ok(Self::spawn(writer))
    }

    /// Start a worker around an already connected writer.
    pub fn spawn(writer: SyncDispatcher) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let stats = Arc::new(DispatchStats::default());
        let stats_bg = Arc::clone(&stats);

        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    Message::Record(record) => {
                        let points = writer.points(&record);
                        match writer.write_points(&points).await {
                            Ok(()) => {
                                stats_bg
                                    .written_points
                                    .fetch_add(points.len() as u64, Ordering::Relaxed);
                            }
                            Err(e) => {
                                stats_bg.failed_writes.fetch_add(1, Ordering::Relaxed);
                                tracing::warn!(error = %e, record = %record.name, "dropping points after failed write");
                            }
                        }
                    }
                    Message::Flush(ack) => {
                        // Everything before this message has been written already.
                        let _ = ack.send(());
                    }
                    // Refuse new sends but keep going until every record
                    // that made it into the queue has been written.
                    Message::Shutdown => rx.close(),
                }
            }
            tracing::debug!("async dispatcher worker stopped");
        });

        Self {
            queue: WorkerQueue::new(tx, handle),
            stats,
        }
    }
}

#[async_trait]
impl Dispatch for AsyncDispatcher {
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
