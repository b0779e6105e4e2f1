use crate::value::{Attributes, Value};
use chrono::{DateTime, Utc};

/// One log event as seen by the point builder.
///
/// `name` is the dot-separated logger hierarchy (`app.db.pool`), `created`
/// the moment the event was emitted, and `attributes` the full attribute
/// bag in emission order, including the framework attributes
/// (`levelname`, `lineno`, ...) and any extra fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub name: String,
    pub created: DateTime<Utc>,
    pub attributes: Attributes,
}

impl LogRecord {
    pub fn new(name: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// Creation time in whole nanoseconds since the Unix epoch.
    pub fn timestamp_nanos(&self) -> i64 {
        self.created.timestamp_nanos_opt().unwrap_or_else(|| {
            self.created
                .timestamp()
                .saturating_mul(1_000_000_000)
        })
    }
}
