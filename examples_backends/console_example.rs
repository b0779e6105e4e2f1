use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

use tracing_point_sink::buffering_dispatcher::BufferConfig;
use tracing_point_sink::config::{HandlerConfig, PointConfig};
use tracing_point_sink::console::ConsoleSink;
use tracing_point_sink::init::{init_tracing_with_config, Delivery, LayerConfig};

#[derive(Debug)]
struct ConfigError;

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("config file not found")
    }
}

impl std::error::Error for ConfigError {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let points = PointConfig::default()
        .with_include_tag("service", "service.name")
        .with_exclude_tag("threadName");
    let handler = HandlerConfig::new("dev").with_points(points);
    let layer_config = LayerConfig {
        delivery: Delivery::Buffered(BufferConfig::new(Duration::from_secs(1))),
        enable_stdout: false,
        ..LayerConfig::default()
    };

    let dispatcher =
        init_tracing_with_config(Arc::new(ConsoleSink::stdout()), handler, layer_config).await?;

    info!(service = "billing", "service started");
    warn!(service = "billing", queue_depth = 120_u64, "queue is filling up");
    let err = ConfigError;
    error!(service = "billing", error = &err as &(dyn std::error::Error + 'static), "cannot load config");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    dispatcher.stop().await?;
    Ok(())
}
