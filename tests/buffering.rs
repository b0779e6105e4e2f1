//! Integration tests for time-windowed batching.
//!
//! These run on a paused Tokio clock, so the flush window elapses
//! deterministically.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing_point_sink::buffering_dispatcher::{BufferConfig, BufferingDispatcher};
use tracing_point_sink::config::{HandlerConfig, PointConfig};
use tracing_point_sink::dispatcher::{Dispatch, DispatcherState};
use tracing_point_sink::memory_sink::MemorySink;
use tracing_point_sink::record::LogRecord;

const LEVELS: [&str; 4] = ["DEBUG", "INFO", "WARN", "ERROR"];

fn record(name: &str, level: &str) -> LogRecord {
    LogRecord::new(name, Utc::now())
        .with_attribute("levelname", level)
        .with_attribute("msg", format!("{} message", level))
}

async fn start(sink: &MemorySink, points: PointConfig, buffer: BufferConfig) -> BufferingDispatcher {
    BufferingDispatcher::start(
        Arc::new(sink.clone()),
        HandlerConfig::new("logs").with_points(points),
        buffer,
    )
    .await
    .unwrap()
}

fn emit_round(dispatcher: &BufferingDispatcher, name: &str) {
    for _ in 0..8 {
        for level in LEVELS {
            dispatcher.emit(record(name, level)).unwrap();
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_window_flushes_once_after_interval() {
    let sink = MemorySink::new();
    let points = PointConfig::default().with_backpopulate(false);
    let dispatcher = start(&sink, points, BufferConfig::new(Duration::from_secs(2))).await;

    emit_round(&dispatcher, "tests.buffered");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.write_count(), 0);

    tokio::time::sleep(Duration::from_millis(2_400)).await;
    let writes = sink.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].points.len(), 32);
    assert!(writes[0].points.iter().all(|p| p.measurement == "tests:buffered"));

    dispatcher.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_window_with_backpopulation_multiplies_points() {
    let sink = MemorySink::new();
    let dispatcher = start(
        &sink,
        PointConfig::default(),
        BufferConfig::new(Duration::from_secs(2)),
    )
    .await;

    emit_round(&dispatcher, "influx.tests.buffered");
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let writes = sink.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].points.len(), 32 * 3);

    dispatcher.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_windows_accumulate() {
    let sink = MemorySink::new();
    let points = PointConfig::default().with_backpopulate(false);
    let dispatcher = start(&sink, points, BufferConfig::new(Duration::from_secs(2))).await;

    for round in 1..=3 {
        emit_round(&dispatcher, "tests.rounds");
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(sink.points().len(), 32 * round);
    }
    assert_eq!(dispatcher.stats().flushes(), 3);

    dispatcher.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_idle_window_writes_nothing() {
    let sink = MemorySink::new();
    let dispatcher = start(
        &sink,
        PointConfig::default(),
        BufferConfig::new(Duration::from_millis(500)),
    )
    .await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(sink.write_count(), 0);

    dispatcher.stop().await.unwrap();
    assert_eq!(sink.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_flushes_pending_buffer() {
    let sink = MemorySink::new();
    let points = PointConfig::default().with_backpopulate(false);
    let dispatcher = start(&sink, points, BufferConfig::new(Duration::from_secs(60))).await;

    emit_round(&dispatcher, "tests.stop");
    dispatcher.stop().await.unwrap();

    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert_eq!(sink.write_count(), 1);
    assert_eq!(sink.points().len(), 32);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_flush_writes_immediately() {
    let sink = MemorySink::new();
    let points = PointConfig::default().with_backpopulate(false);
    let dispatcher = start(&sink, points, BufferConfig::new(Duration::from_secs(60))).await;

    dispatcher.emit(record("tests.flush", "INFO")).unwrap();
    dispatcher.emit(record("tests.flush", "WARN")).unwrap();
    dispatcher.flush().await.unwrap();

    let writes = sink.writes();
    assert_eq!(writes.len(), 1);
    let levels: Vec<_> = writes[0]
        .points
        .iter()
        .map(|p| p.tags.get("level").cloned())
        .collect();
    assert_eq!(
        levels,
        vec![Some("INFO".into()), Some("WARN".into())]
    );

    dispatcher.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_threshold_triggers_early_flush() {
    let sink = MemorySink::new();
    let points = PointConfig::default().with_backpopulate(false);
    let buffer = BufferConfig::new(Duration::from_secs(60)).with_flush_threshold(10);
    let dispatcher = start(&sink, points, buffer).await;

    for _ in 0..25 {
        dispatcher.emit(record("tests.threshold", "INFO")).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    let sizes: Vec<usize> = sink.writes().iter().map(|w| w.points.len()).collect();
    assert_eq!(sizes, vec![10, 10]);

    dispatcher.stop().await.unwrap();
    assert_eq!(sink.points().len(), 25);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_drops_batch_and_continues() {
    let sink = MemorySink::new();
    let points = PointConfig::default().with_backpopulate(false);
    let dispatcher = start(&sink, points, BufferConfig::new(Duration::from_secs(1))).await;

    sink.fail_writes(true);
    emit_round(&dispatcher, "tests.failing");
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(dispatcher.stats().failed_writes(), 1);

    sink.fail_writes(false);
    emit_round(&dispatcher, "tests.failing");
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    assert_eq!(sink.points().len(), 32);
    dispatcher.stop().await.unwrap();
}
