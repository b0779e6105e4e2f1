use crate::error::SinkError;
use crate::point::Point;
use crate::sink::PointSink;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

#[derive(Serialize)]
struct ConsoleLine<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    retention_policy: Option<&'a str>,
    #[serde(flatten)]
    point: &'a Point,
}

/// Sink that prints every point as one JSON line.
///
/// Handy during development or when a log shipper already tails stdout.
/// Databases only exist in-process.
pub struct ConsoleSink<W = io::Stdout> {
    out: Mutex<W>,
    databases: Mutex<BTreeSet<String>>,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl Default for ConsoleSink<io::Stdout> {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            databases: Mutex::new(BTreeSet::new()),
        }
    }

    /// Consume the sink and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<W: Write + Send> PointSink for ConsoleSink<W> {
    async fn write(&self, points: &[Point], retention_policy: Option<&str>) -> Result<(), SinkError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        for point in points {
            let line = ConsoleLine {
                retention_policy,
                point,
            };
            serde_json::to_writer(&mut *out, &line).map_err(|e| SinkError::Other(Box::new(e)))?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }

    async fn list_databases(&self) -> Result<BTreeSet<String>, SinkError> {
        Ok(self
            .databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn create_database(&self, name: &str) -> Result<(), SinkError> {
        self.databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
        Ok(())
    }
}
