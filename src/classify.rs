use crate::config::{PointConfig, SKIP_ATTRIBUTES, STACKTRACE_ATTRIBUTE};
use crate::value::Value;

/// What a single record attribute turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Store the value as a tag with this name.
    Tag(String),
    /// Store the value as a field with this name.
    Field(String),
    /// Expand the value into `thrown.*` tag and fields.
    Stacktrace,
    /// Drop the attribute.
    Excluded,
    /// Nested mapping; recurse with `key.child` keys.
    Nested,
    /// Sequence; join the elements with a space and reclassify under the
    /// same key.
    Sequence,
}

/// Classify one attribute. The first matching rule wins:
///
/// 1. null values are dropped
/// 2. mappings and 3. sequences are not leaves
/// 4. explicit tag includes, then 5. explicit field includes
/// 6. `exc_info` when stack traces are enabled
/// 7. framework-internal attributes are dropped
/// 8. anything else is an extra: numbers and booleans become fields,
///    everything else a tag, subject to the extra flags and excludes
pub fn classify(key: &str, value: &Value, config: &PointConfig) -> Disposition {
    match value {
        Value::Null => return Disposition::Excluded,
        Value::Map(_) => return Disposition::Nested,
        Value::Seq(_) => return Disposition::Sequence,
        _ => {}
    }

    if let Some(tag) = config.include_tags.get(key) {
        return if config.exclude_tags.contains(key) {
            Disposition::Excluded
        } else {
            Disposition::Tag(tag.clone())
        };
    }

    if let Some(field) = config.include_fields.get(key) {
        return if config.exclude_fields.contains(key) {
            Disposition::Excluded
        } else {
            Disposition::Field(field.clone())
        };
    }

    if key == STACKTRACE_ATTRIBUTE && config.include_stacktrace {
        return Disposition::Stacktrace;
    }

    if SKIP_ATTRIBUTES.contains(&key) {
        return Disposition::Excluded;
    }

    if value.is_numeric_or_bool() {
        if config.extra_fields && !config.exclude_fields.contains(key) {
            return Disposition::Field(key.to_string());
        }
    } else if config.extra_tags && !config.exclude_tags.contains(key) {
        return Disposition::Tag(key.to_string());
    }

    Disposition::Excluded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Attributes, ExceptionInfo};

    #[test]
    fn test_null_is_excluded_even_when_included() {
        let config = PointConfig::default().with_include_tag("user", "user");
        assert_eq!(classify("user", &Value::Null, &config), Disposition::Excluded);
    }

    #[test]
    fn test_containers_are_not_leaves() {
        let config = PointConfig::default();
        let map = Value::Map(Attributes::new().with("b", 1));
        assert_eq!(classify("levelname", &map, &config), Disposition::Nested);
        assert_eq!(
            classify("levelname", &Value::from(vec!["a"]), &config),
            Disposition::Sequence
        );
    }

    #[test]
    fn test_default_includes() {
        let config = PointConfig::default();
        assert_eq!(
            classify("levelname", &Value::from("INFO"), &config),
            Disposition::Tag("level".to_string())
        );
        assert_eq!(
            classify("lineno", &Value::from(42), &config),
            Disposition::Tag("source.lineNumber".to_string())
        );
        assert_eq!(
            classify("msg", &Value::from("hello"), &config),
            Disposition::Field("message".to_string())
        );
    }

    #[test]
    fn test_excluded_include_does_not_fall_through() {
        let config = PointConfig::default()
            .with_include_tag("user", "user.id")
            .with_include_field("user", "user.field")
            .with_exclude_tag("user");
        assert_eq!(classify("user", &Value::from("bob"), &config), Disposition::Excluded);
    }

    #[test]
    fn test_tag_include_wins_over_field_include() {
        let config = PointConfig::default()
            .with_include_tag("status", "status")
            .with_include_field("status", "status_code");
        assert_eq!(
            classify("status", &Value::from(200), &config),
            Disposition::Tag("status".to_string())
        );
    }

    #[test]
    fn test_stacktrace_attribute() {
        let exc = Value::from(ExceptionInfo::new("IoError", "boom", "trace"));
        let config = PointConfig::default();
        assert_eq!(classify("exc_info", &exc, &config), Disposition::Stacktrace);

        // Disabled: exc_info is not in the skip set, so it is an ordinary extra.
        let config = PointConfig::default().with_stacktrace(false);
        assert_eq!(
            classify("exc_info", &exc, &config),
            Disposition::Tag("exc_info".to_string())
        );
    }

    #[test]
    fn test_skip_set_always_excluded() {
        let config = PointConfig {
            include_tags: Default::default(),
            include_fields: Default::default(),
            ..PointConfig::default()
        };
        for key in SKIP_ATTRIBUTES {
            assert_eq!(classify(key, &Value::from("x"), &config), Disposition::Excluded);
            assert_eq!(classify(key, &Value::from(1), &config), Disposition::Excluded);
        }
    }

    #[test]
    fn test_extras() {
        let config = PointConfig::default();
        assert_eq!(
            classify("latency_ms", &Value::from(12.5), &config),
            Disposition::Field("latency_ms".to_string())
        );
        assert_eq!(
            classify("ok", &Value::from(true), &config),
            Disposition::Field("ok".to_string())
        );
        assert_eq!(
            classify("region", &Value::from("eu"), &config),
            Disposition::Tag("region".to_string())
        );

        let config = PointConfig::default()
            .with_extra_tags(false)
            .with_exclude_field("latency_ms");
        assert_eq!(classify("latency_ms", &Value::from(12.5), &config), Disposition::Excluded);
        assert_eq!(classify("region", &Value::from("eu"), &config), Disposition::Excluded);
        assert_eq!(
            classify("count", &Value::from(3u64), &config),
            Disposition::Field("count".to_string())
        );
    }
}
