use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{error, info, info_span};
use tracing_point_sink::{
    client::{ClientOptions, Transport},
    config::HandlerConfig,
    env::{env_or, LOG_SINK_INFLUX_DB_ENV},
    error::SinkError,
    init::init_tracing,
    point::Point,
    sink::PointSink,
};

/// Example of integrating a completely custom backend by implementing
/// the `PointSink` trait directly. Imagine this wraps a client for some
/// time-series database; it receives the passthrough `ClientOptions`.
struct MyCustomDbSink {
    options: ClientOptions,
    databases: Mutex<BTreeSet<String>>,
}

#[async_trait]
impl PointSink for MyCustomDbSink {
    async fn write(&self, points: &[Point], retention_policy: Option<&str>) -> Result<(), SinkError> {
        // Here you would call your own client library for the target DB.
        for point in points {
            println!(
                "[{}:{} rp={:?}] {} tags={:?} fields={:?} t={}",
                self.options.host,
                self.options.port,
                retention_policy,
                point.measurement,
                point.tags,
                point.fields,
                point.timestamp_nanos
            );
        }
        Ok(())
    }

    async fn list_databases(&self) -> Result<BTreeSet<String>, SinkError> {
        Ok(self.databases.lock().map_err(|e| SinkError::Unavailable(e.to_string()))?.clone())
    }

    async fn create_database(&self, name: &str) -> Result<(), SinkError> {
        self.databases
            .lock()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?
            .insert(name.to_string());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut options = ClientOptions::from_env()?;
    if options.database.is_none() {
        options.database = Some(env_or(LOG_SINK_INFLUX_DB_ENV, "logs"));
    }
    if options.transport == Transport::Udp {
        println!("udp transport selected; writes are fire-and-forget");
    }

    let handler = HandlerConfig::for_client(&options)?.with_retention_policy("autogen");
    let sink: Arc<dyn PointSink> = Arc::new(MyCustomDbSink {
        options,
        databases: Mutex::new(BTreeSet::new()),
    });

    let dispatcher = init_tracing(sink, handler).await?;

    info!("custom backend example started");
    let span = info_span!("request", user_id = 42_u64, route = "/login");
    let guard = span.enter();
    error!(db = "my-custom-db", attempts = 3, "simulated error sent via custom backend");
    drop(guard);

    dispatcher.stop().await?;
    Ok(())
}
