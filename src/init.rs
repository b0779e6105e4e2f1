use crate::async_dispatcher::AsyncDispatcher;
use crate::buffering_dispatcher::{BufferConfig, BufferingDispatcher};
use crate::config::HandlerConfig;
use crate::dispatcher::Dispatch;
use crate::error::HandlerError;
use crate::layer::PointLayer;
use crate::sink::PointSink;
use crate::sync_dispatcher::{InlineDispatcher, SyncDispatcher};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// How the layer delivers records to the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// One `write` per record, as soon as the worker gets to it.
    Async,
    /// Time-windowed batches.
    Buffered(BufferConfig),
    /// Write on the emitting thread before the event call returns. Needs a
    /// multi-threaded Tokio runtime; see [`InlineDispatcher`].
    Inline,
}

/// Configuration of the tracing layer.
///
/// **Fields**
/// - `min_level`: least severe level that is still shipped.
/// - `delivery`: which dispatcher to run.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   installed next to the [`PointLayer`] so events also show up in the
///   console.
/// - `include_spans`: attach span fields to each event's record.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub min_level: Level,
    pub delivery: Delivery,
    pub enable_stdout: bool,
    pub include_spans: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::TRACE,
            delivery: Delivery::Async,
            enable_stdout: true,
            include_spans: true,
        }
    }
}

/// Error returned by [`init_tracing`] and [`init_tracing_with_config`].
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("failed to install global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Connect to `sink` and start the dispatcher selected by `delivery`.
pub async fn start_dispatcher(
    sink: Arc<dyn PointSink>,
    config: HandlerConfig,
    delivery: Delivery,
) -> Result<Arc<dyn Dispatch>, HandlerError> {
    let writer = SyncDispatcher::connect(sink, config).await?;
    let dispatcher: Arc<dyn Dispatch> = match delivery {
        Delivery::Async => Arc::new(AsyncDispatcher::spawn(writer)),
        Delivery::Buffered(buffer) => Arc::new(BufferingDispatcher::spawn(writer, buffer)),
        Delivery::Inline => Arc::new(InlineDispatcher::new(writer)?),
    };
    Ok(dispatcher)
}

/// Build the [`PointLayer`] for `dispatcher` as configured by `config`.
pub fn build_layer(dispatcher: Arc<dyn Dispatch>, config: &LayerConfig) -> PointLayer {
    PointLayer::new(dispatcher, config.min_level).with_spans(config.include_spans)
}

/// Initialize global `tracing` subscriber using the provided sink,
/// [`HandlerConfig`] and [`LayerConfig`].
///
/// **Parameters**
/// - `sink`: implementation of [`PointSink`] that will receive points.
/// - `handler`: database, retention policy and point-building rules.
/// - `config`: [`LayerConfig`] controlling delivery and filtering.
///
/// **Returns**
///
/// The running dispatcher. Call [`Dispatch::stop`] on it before the
/// process exits so queued records are not lost.
///
/// **Effects**
///
/// Unless `handler.lazy_init` is set the target database is checked and
/// created first; a failure there aborts initialization. Then a
/// [`Registry`] combined with [`PointLayer`] is installed as the global
/// default subscriber.
pub async fn init_tracing_with_config(
    sink: Arc<dyn PointSink>,
    handler: HandlerConfig,
    config: LayerConfig,
) -> Result<Arc<dyn Dispatch>, InitError> {
    let dispatcher = start_dispatcher(sink, handler, config.delivery).await?;
    let layer = build_layer(Arc::clone(&dispatcher), &config);

    // The fmt layer changes the subscriber type, so install each variant
    // separately.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(dispatcher)
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`]: every level, async delivery, stdout mirror on.
pub async fn init_tracing(
    sink: Arc<dyn PointSink>,
    handler: HandlerConfig,
) -> Result<Arc<dyn Dispatch>, InitError> {
    init_tracing_with_config(sink, handler, LayerConfig::default()).await
}
