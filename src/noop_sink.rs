use crate::error::SinkError;
use crate::point::Point;
use crate::sink::PointSink;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// A sink that simply drops all points.
///
/// Useful for measuring the overhead of the layer itself without any
/// external I/O. Database creation always succeeds.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl PointSink for NoopSink {
    async fn write(&self, _points: &[Point], _retention_policy: Option<&str>) -> Result<(), SinkError> {
        Ok(())
    }

    async fn list_databases(&self) -> Result<BTreeSet<String>, SinkError> {
        Ok(BTreeSet::new())
    }

    async fn create_database(&self, _name: &str) -> Result<(), SinkError> {
        Ok(())
    }
}
