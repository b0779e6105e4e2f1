use std::error::Error;
use std::fmt;

/// Closed set of values a log record attribute can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Map(Attributes),
    Seq(Vec<Value>),
    Exception(ExceptionInfo),
}

impl Value {
    /// `true` for the variants that become fields when seen as an extra
    /// attribute.
    pub fn is_numeric_or_bool(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::UInt(_) | Value::Float(_)
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Seq(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Exception(exc) => write!(f, "{}: {}", exc.type_name, exc.message),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Attributes> for Value {
    fn from(v: Attributes) -> Self {
        Value::Map(v)
    }
}

impl From<ExceptionInfo> for Value {
    fn from(v: ExceptionInfo) -> Self {
        Value::Exception(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Seq(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Insertion-ordered attribute bag.
///
/// Re-inserting an existing key replaces the value in place, so iteration
/// order is always the order in which keys were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, Value)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// Captured error: its type, its message and a rendered trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub type_name: String,
    pub message: String,
    pub trace: String,
}

impl ExceptionInfo {
    pub fn new(
        type_name: impl Into<String>,
        message: impl Into<String>,
        trace: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            trace: trace.into(),
        }
    }

    /// Capture a `dyn Error` together with its `source()` chain.
    ///
    /// `dyn Error` carries no type name, so the leading identifier of the
    /// `Debug` rendering is used (`ParseIntError { .. }` -> `ParseIntError`).
    /// For enums and hand-written `Debug` impls that is a variant or
    /// whatever the impl prints first: an `io::Error` yields `Custom`, `Os`
    /// or `Kind`. Use [`ExceptionInfo::from_typed_error`] when the concrete
    /// type is known.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let debug = format!("{:?}", err);
        let type_name: String = debug
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
            .collect();
        Self::with_chain(type_name, err)
    }

    /// Like [`from_error`](Self::from_error), but names the exception after
    /// `E` itself (`std::io::Error` -> `Error`, `my::ConfigError<T>` ->
    /// `ConfigError`).
    pub fn from_typed_error<E: Error + 'static>(err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let base = full.split('<').next().unwrap_or(full);
        let type_name = base.rsplit("::").next().unwrap_or(base).to_string();
        Self::with_chain(type_name, err)
    }

    fn with_chain(type_name: String, err: &(dyn Error + 'static)) -> Self {
        let type_name = if type_name.is_empty() {
            "Error".to_string()
        } else {
            type_name
        };

        let message = err.to_string();
        let mut trace = format!("{}: {}", type_name, message);
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push_str("\nCaused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }

        Self {
            type_name,
            message,
            trace,
        }
    }
}
