use crate::error::HandlerError;
use crate::record::LogRecord;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Lifecycle of a queue-backed dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Worker is consuming the queue.
    Running,
    /// Shutdown requested; the worker is finishing queued records.
    Draining,
    /// Worker has exited.
    Stopped,
}

impl DispatcherState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => DispatcherState::Running,
            1 => DispatcherState::Draining,
            _ => DispatcherState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            DispatcherState::Running => 0,
            DispatcherState::Draining => 1,
            DispatcherState::Stopped => 2,
        }
    }
}

/// Counters maintained by the dispatcher worker.
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Points accepted by the sink.
    pub written_points: AtomicU64,
    /// `write` calls that returned an error; their points are lost.
    pub failed_writes: AtomicU64,
    /// Buffer flushes performed (buffering dispatcher only).
    pub flushes: AtomicU64,
}

impl DispatchStats {
    pub fn written_points(&self) -> u64 {
        self.written_points.load(Ordering::Relaxed)
    }

    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

/// Queue entry consumed by a dispatcher worker, strictly in FIFO order.
#[derive(Debug)]
pub(crate) enum Message {
    Record(LogRecord),
    /// Acknowledged once everything queued before it has been written.
    Flush(oneshot::Sender<()>),
    /// Terminal marker. The worker closes the receiver, handles whatever
    /// was sent before the close and exits.
    Shutdown,
}

/// A queue-backed dispatcher: records go in on the caller's thread and are
/// converted and written by a single background worker.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Queue a record. Never blocks and never touches the sink.
    fn emit(&self, record: LogRecord) -> Result<(), HandlerError>;

    /// Wait until everything queued so far has reached the sink.
    async fn flush(&self) -> Result<(), HandlerError>;

    /// Drain the queue, write anything pending and stop the worker.
    ///
    /// Calling `stop` again after it returned is a no-op.
    async fn stop(&self) -> Result<(), HandlerError>;

    fn state(&self) -> DispatcherState;

    fn stats(&self) -> &DispatchStats;
}

/// Queue, worker handle and lifecycle shared by the queue-backed
/// dispatchers.
pub(crate) struct WorkerQueue {
    sender: mpsc::UnboundedSender<Message>,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: AtomicU8,
}

impl WorkerQueue {
    pub(crate) fn new(sender: mpsc::UnboundedSender<Message>, worker: JoinHandle<()>) -> Self {
        Self {
            sender,
            worker: Mutex::new(Some(worker)),
            state: AtomicU8::new(DispatcherState::Running.as_u8()),
        }
    }

    pub(crate) fn state(&self) -> DispatcherState {
        DispatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: DispatcherState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn emit(&self, record: LogRecord) -> Result<(), HandlerError> {
        // Fast path only. A send that races with `stop` is settled by the
        // worker closing the receiver.
        if self.state() != DispatcherState::Running {
            return Err(HandlerError::QueueClosed);
        }
        self.sender
            .send(Message::Record(record))
            .map_err(|_| HandlerError::QueueClosed)
    }

    pub(crate) async fn flush(&self) -> Result<(), HandlerError> {
        if self.state() != DispatcherState::Running {
            return Err(HandlerError::QueueClosed);
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        self.sender
            .send(Message::Flush(ack_tx))
            .map_err(|_| HandlerError::QueueClosed)?;
        ack_rx.await.map_err(|_| HandlerError::QueueClosed)
    }

    pub(crate) async fn stop(&self) -> Result<(), HandlerError> {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };

        self.set_state(DispatcherState::Draining);
        // The worker may already be gone if it panicked; join reports that.
        let _ = self.sender.send(Message::Shutdown);
        let joined = handle.await;
        self.set_state(DispatcherState::Stopped);
        joined.map_err(|e| HandlerError::WorkerPanicked(e.to_string()))
    }
}
