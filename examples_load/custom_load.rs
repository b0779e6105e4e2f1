use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use tracing_point_sink::buffering_dispatcher::BufferConfig;
use tracing_point_sink::config::{HandlerConfig, PointConfig};
use tracing_point_sink::init::{init_tracing_with_config, Delivery, LayerConfig};
use tracing_point_sink::memory_sink::MemorySink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = MemorySink::new();

    let handler = HandlerConfig::new("load")
        .with_points(PointConfig::default().with_backpopulate(false));
    let layer_config = LayerConfig {
        delivery: Delivery::Buffered(
            BufferConfig::new(Duration::from_millis(200)).with_flush_threshold(5_000),
        ),
        enable_stdout: false,
        ..LayerConfig::default()
    };

    let dispatcher = init_tracing_with_config(Arc::new(sink.clone()), handler, layer_config).await?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    dispatcher.stop().await?;
    println!(
        "{} points in {} writes ({} flushes)",
        sink.points().len(),
        sink.write_count(),
        dispatcher.stats().flushes()
    );
    Ok(())
}
