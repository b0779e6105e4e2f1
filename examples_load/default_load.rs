use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use tracing_point_sink::config::HandlerConfig;
use tracing_point_sink::init::{init_tracing_with_config, LayerConfig};
use tracing_point_sink::noop_sink::NoopSink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(NoopSink);
    let layer_config = LayerConfig {
        enable_stdout: false,
        ..LayerConfig::default()
    };
    let dispatcher = init_tracing_with_config(sink, HandlerConfig::new("load"), layer_config).await?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Drain the queue before exiting.
    dispatcher.stop().await?;
    println!("written points: {}", dispatcher.stats().written_points());
    Ok(())
}
