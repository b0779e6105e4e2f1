use crate::client::{ClientOptions, DsnError};
use std::collections::{BTreeMap, BTreeSet};

/// Framework-internal attributes that never become tags or fields on their
/// own. Most of them are already mapped through the default include maps;
/// `id` is reserved by the point schema.
pub const SKIP_ATTRIBUTES: &[&str] = &[
    "args",
    "asctime",
    "created",
    "exc_text",
    "filename",
    "funcName",
    "id",
    "levelname",
    "levelno",
    "lineno",
    "module",
    "msecs",
    "message",
    "msg",
    "name",
    "pathname",
    "process",
    "processName",
    "stack_info",
    "relativeCreated",
    "thread",
    "threadName",
];

/// Attribute carrying captured error information.
pub const STACKTRACE_ATTRIBUTE: &str = "exc_info";

/// Attribute names starting with this prefix are private and never looked at.
pub const PRIVATE_PREFIX: char = '_';

const DEFAULT_TAGS: &[(&str, &str)] = &[
    ("filename", "source.fileName"),
    ("funcName", "source.methodName"),
    ("levelname", "level"),
    ("lineno", "source.lineNumber"),
    ("thread", "threadId"),
    ("threadName", "threadName"),
    ("processName", "processName"),
];

const DEFAULT_FIELDS: &[(&str, &str)] = &[("message", "message"), ("msg", "message")];

/// Rules that decide how record attributes become tags and fields, and how
/// points are named.
///
/// Every call to [`PointConfig::default`] builds its include maps from
/// scratch, so overrides applied to one instance never leak into another.
#[derive(Debug, Clone, PartialEq)]
pub struct PointConfig {
    /// Fixed measurement name; disables hierarchy naming entirely.
    pub measurement: Option<String>,
    /// attribute -> tag name
    pub include_tags: BTreeMap<String, String>,
    /// attribute -> field name
    pub include_fields: BTreeMap<String, String>,
    pub exclude_tags: BTreeSet<String>,
    pub exclude_fields: BTreeSet<String>,
    pub extra_tags: bool,
    pub extra_fields: bool,
    pub include_stacktrace: bool,
    /// Emit one point per prefix of the record's hierarchical name.
    pub backpopulate: bool,
}

impl Default for PointConfig {
    fn default() -> Self {
        Self {
            measurement: None,
            include_tags: DEFAULT_TAGS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            include_fields: DEFAULT_FIELDS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            exclude_tags: BTreeSet::new(),
            exclude_fields: BTreeSet::new(),
            extra_tags: true,
            extra_fields: true,
            include_stacktrace: true,
            backpopulate: true,
        }
    }
}

impl PointConfig {
    pub fn with_measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = Some(measurement.into());
        self
    }

    /// Map `attribute` to the tag `tag`, overriding any default mapping.
    pub fn with_include_tag(mut self, attribute: impl Into<String>, tag: impl Into<String>) -> Self {
        self.include_tags.insert(attribute.into(), tag.into());
        self
    }

    /// Map `attribute` to the field `field`, overriding any default mapping.
    pub fn with_include_field(
        mut self,
        attribute: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.include_fields.insert(attribute.into(), field.into());
        self
    }

    pub fn with_exclude_tag(mut self, attribute: impl Into<String>) -> Self {
        self.exclude_tags.insert(attribute.into());
        self
    }

    pub fn with_exclude_field(mut self, attribute: impl Into<String>) -> Self {
        self.exclude_fields.insert(attribute.into());
        self
    }

    pub fn with_extra_tags(mut self, enabled: bool) -> Self {
        self.extra_tags = enabled;
        self
    }

    pub fn with_extra_fields(mut self, enabled: bool) -> Self {
        self.extra_fields = enabled;
        self
    }

    pub fn with_stacktrace(mut self, enabled: bool) -> Self {
        self.include_stacktrace = enabled;
        self
    }

    pub fn with_backpopulate(mut self, enabled: bool) -> Self {
        self.backpopulate = enabled;
        self
    }
}

/// Handler-level configuration: where points go plus how they are built.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerConfig {
    /// Target database; checked (and created) at construction unless
    /// `lazy_init` is set.
    pub database: String,
    pub retention_policy: Option<String>,
    pub lazy_init: bool,
    pub points: PointConfig,
}

impl HandlerConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            retention_policy: None,
            lazy_init: false,
            points: PointConfig::default(),
        }
    }

    /// Build a config targeting the database named in `client`.
    pub fn for_client(client: &ClientOptions) -> Result<Self, DsnError> {
        client
            .database
            .as_deref()
            .map(Self::new)
            .ok_or(DsnError::MissingDatabase)
    }

    pub fn with_retention_policy(mut self, policy: impl Into<String>) -> Self {
        self.retention_policy = Some(policy.into());
        self
    }

    pub fn with_lazy_init(mut self, lazy: bool) -> Self {
        self.lazy_init = lazy;
        self
    }

    pub fn with_points(mut self, points: PointConfig) -> Self {
        self.points = points;
        self
    }
}
