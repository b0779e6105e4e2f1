use crate::classify::{classify, Disposition};
use crate::config::{PointConfig, PRIVATE_PREFIX};
use crate::record::LogRecord;
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// Measurement name used when the record's hierarchy name is empty.
pub const ROOT_MEASUREMENT: &str = "root";

/// Scalar stored as a tag or field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Int(i) => FieldValue::Int(*i),
            Value::UInt(u) => FieldValue::UInt(*u),
            Value::Float(x) => FieldValue::Float(*x),
            Value::Str(s) => FieldValue::Str(s.clone()),
            other => FieldValue::Str(other.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// One timestamped measurement ready for the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, FieldValue>,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(rename = "time")]
    pub timestamp_nanos: i64,
}

/// Tags and fields collected from one record.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TagsAndFields {
    pub tags: BTreeMap<String, FieldValue>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl TagsAndFields {
    // A key lives on one side only; the latest attribute decides which.
    fn put_tag(&mut self, key: String, value: FieldValue) {
        self.fields.remove(&key);
        self.tags.insert(key, value);
    }

    fn put_field(&mut self, key: String, value: FieldValue) {
        self.tags.remove(&key);
        self.fields.insert(key, value);
    }

    fn put_leaf(&mut self, key: &str, value: &Value, config: &PointConfig) {
        match classify(key, value, config) {
            Disposition::Tag(name) => self.put_tag(name, FieldValue::from(value)),
            Disposition::Field(name) => self.put_field(name, FieldValue::from(value)),
            Disposition::Stacktrace => {
                // Anything but captured error info is silently dropped.
                if let Value::Exception(exc) = value {
                    self.put_tag("thrown.type".to_string(), exc.type_name.as_str().into());
                    self.put_field("thrown.message".to_string(), exc.message.as_str().into());
                    self.put_field("thrown.stackTrace".to_string(), exc.trace.as_str().into());
                }
            }
            Disposition::Excluded => {}
            // Containers are expanded by the caller before reaching here.
            Disposition::Nested | Disposition::Sequence => {}
        }
    }
}

/// Flatten every public attribute of `record` into one shared tag/field
/// set.
///
/// Nested mappings are walked depth-first with `parent.child` keys;
/// sequences are space-joined and reclassified under their own key. Later
/// attributes overwrite earlier ones that resolve to the same name.
pub fn collect(record: &LogRecord, config: &PointConfig) -> TagsAndFields {
    let mut out = TagsAndFields::default();
    let mut stack: Vec<(String, &Value)> = Vec::new();

    for (name, value) in record.attributes.iter() {
        if name.starts_with(PRIVATE_PREFIX) {
            continue;
        }

        stack.push((name.to_string(), value));
        while let Some((key, value)) = stack.pop() {
            match value {
                Value::Null => {}
                Value::Map(children) => {
                    // Reversed so children pop in record order.
                    for (child, child_value) in children.iter().rev() {
                        let child_key = if key.is_empty() {
                            child.to_string()
                        } else {
                            format!("{}.{}", key, child)
                        };
                        stack.push((child_key, child_value));
                    }
                }
                Value::Seq(_) => {
                    let joined = Value::Str(value.to_string());
                    out.put_leaf(&key, &joined, config);
                }
                leaf => out.put_leaf(&key, leaf, config),
            }
        }
    }

    out
}

/// Measurement names for a record, following the configured naming policy.
pub fn measurements(record_name: &str, config: &PointConfig) -> Vec<String> {
    if let Some(measurement) = &config.measurement {
        return vec![measurement.clone()];
    }

    if !config.backpopulate {
        let name = record_name.replace('.', ":");
        return vec![if name.is_empty() {
            ROOT_MEASUREMENT.to_string()
        } else {
            name
        }];
    }

    let mut segments = record_name.split('.');
    let first = segments.next().unwrap_or_default();
    let mut current = if first.is_empty() {
        ROOT_MEASUREMENT.to_string()
    } else {
        first.to_string()
    };

    let mut names = vec![current.clone()];
    for segment in segments {
        current = format!("{}:{}", current, segment);
        names.push(current.clone());
    }
    names
}

/// Build every point for `record`. All returned points share the same tags,
/// fields and timestamp and differ only in measurement name.
pub fn build_points(record: &LogRecord, config: &PointConfig) -> Vec<Point> {
    let TagsAndFields { tags, fields } = collect(record, config);
    let timestamp_nanos = record.timestamp_nanos();

    measurements(&record.name, config)
        .into_iter()
        .map(|measurement| Point {
            measurement,
            tags: tags.clone(),
            fields: fields.clone(),
            timestamp_nanos,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Attributes, ExceptionInfo};
    use chrono::{TimeZone, Utc};

    fn record(name: &str) -> LogRecord {
        LogRecord::new(name, Utc.timestamp_opt(1_600_000_000, 500).unwrap())
    }

    #[test]
    fn test_nested_maps_flatten_with_dots() {
        let rec = record("app").with_attribute(
            "http",
            Attributes::new()
                .with("method", "GET")
                .with("timing", Attributes::new().with("total_ms", 12)),
        );
        let out = collect(&rec, &PointConfig::default());

        assert_eq!(out.tags.get("http.method"), Some(&FieldValue::from("GET")));
        assert_eq!(out.fields.get("http.timing.total_ms"), Some(&FieldValue::Int(12)));
    }

    #[test]
    fn test_include_field_matches_flattened_key() {
        let rec = record("app").with_attribute("a", Attributes::new().with("b", 1));
        let config = PointConfig::default().with_include_field("a.b", "renamed");
        let out = collect(&rec, &config);
        assert_eq!(out.fields.get("renamed"), Some(&FieldValue::Int(1)));
        assert!(!out.fields.contains_key("a.b"));
    }

    #[test]
    fn test_empty_parent_key_yields_bare_child() {
        let rec = record("app").with_attribute("", Attributes::new().with("region", "eu"));
        let out = collect(&rec, &PointConfig::default());
        assert_eq!(out.tags.get("region"), Some(&FieldValue::from("eu")));
    }

    #[test]
    fn test_sequences_are_joined_then_reclassified() {
        let rec = record("app")
            .with_attribute("labels", vec!["a", "b", "c"])
            .with_attribute("msg", vec!["hello", "world"]);
        let out = collect(&rec, &PointConfig::default());
        assert_eq!(out.tags.get("labels"), Some(&FieldValue::from("a b c")));
        assert_eq!(out.fields.get("message"), Some(&FieldValue::from("hello world")));
    }

    #[test]
    fn test_private_attributes_are_ignored() {
        let rec = record("app")
            .with_attribute("_internal", "x")
            .with_attribute("visible", "y");
        let out = collect(&rec, &PointConfig::default());
        assert!(!out.tags.contains_key("_internal"));
        assert!(out.tags.contains_key("visible"));
    }

    #[test]
    fn test_later_attribute_wins_and_moves_sides() {
        let rec = record("app")
            .with_attribute("region", "eu")
            .with_attribute("zone", 7);
        let config = PointConfig::default().with_include_field("zone", "region");
        let out = collect(&rec, &config);
        assert_eq!(out.fields.get("region"), Some(&FieldValue::Int(7)));
        assert!(!out.tags.contains_key("region"));
    }

    #[test]
    fn test_stacktrace_expansion() {
        let rec = record("app").with_attribute(
            "exc_info",
            ExceptionInfo::new("ValueError", "bad value", "Traceback: ValueError: bad value"),
        );
        let out = collect(&rec, &PointConfig::default());
        assert_eq!(out.tags.get("thrown.type"), Some(&FieldValue::from("ValueError")));
        assert_eq!(out.fields.get("thrown.message"), Some(&FieldValue::from("bad value")));
        assert_eq!(
            out.fields.get("thrown.stackTrace"),
            Some(&FieldValue::from("Traceback: ValueError: bad value"))
        );
    }

    #[test]
    fn test_malformed_stacktrace_dropped() {
        let rec = record("app")
            .with_attribute("exc_info", vec![Value::from("ValueError"), Value::from("x")])
            .with_attribute("note", "kept");
        let out = collect(&rec, &PointConfig::default());
        assert!(out.tags.keys().all(|k| !k.starts_with("thrown.")));
        assert!(out.fields.keys().all(|k| !k.starts_with("thrown.")));
        assert!(!out.tags.contains_key("exc_info"));
        assert_eq!(out.tags.get("note"), Some(&FieldValue::from("kept")));
    }

    #[test]
    fn test_measurement_policies() {
        let config = PointConfig::default();
        assert_eq!(measurements("x.y.z", &config), vec!["x", "x:y", "x:y:z"]);
        assert_eq!(measurements("", &config), vec!["root"]);

        let flat = PointConfig::default().with_backpopulate(false);
        assert_eq!(measurements("x.y.z", &flat), vec!["x:y:z"]);
        assert_eq!(measurements("", &flat), vec!["root"]);

        let fixed = PointConfig::default().with_measurement("logs");
        assert_eq!(measurements("x.y.z", &fixed), vec!["logs"]);
    }

    #[test]
    fn test_points_share_payload() {
        let rec = record("svc.api")
            .with_attribute("levelname", "INFO")
            .with_attribute("msg", "started");
        let points = build_points(&rec, &PointConfig::default());

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].measurement, "svc");
        assert_eq!(points[1].measurement, "svc:api");
        assert_eq!(points[0].tags, points[1].tags);
        assert_eq!(points[0].fields, points[1].fields);
        assert_eq!(points[0].timestamp_nanos, 1_600_000_000_000_000_500);
        assert_eq!(points[0].timestamp_nanos, points[1].timestamp_nanos);
    }
}
