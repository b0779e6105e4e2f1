use std::error::Error;

/// Error reported by a [`PointSink`](crate::sink::PointSink) implementation.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    /// Connection or authentication failure.
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but refused the request.
    #[error("sink rejected request: {0}")]
    Rejected(String),

    #[error("sink i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

/// Error type surfaced by handlers and dispatchers.
///
/// Classification and point building never fail; every variant here comes
/// from sink I/O or from the dispatcher lifecycle.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Only raised at construction time when `lazy_init` is off.
    #[error("database {database:?} is missing and could not be created")]
    DatabaseMissing {
        database: String,
        #[source]
        source: SinkError,
    },

    /// `emit` or `flush` was called after `stop`.
    #[error("dispatcher queue is closed")]
    QueueClosed,

    /// Inline delivery cannot block the current thread.
    #[error("inline delivery needs a multi-threaded Tokio runtime or a plain thread")]
    UnsupportedRuntime,

    #[error("dispatcher worker terminated abnormally: {0}")]
    WorkerPanicked(String),
}
