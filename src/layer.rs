use crate::config::STACKTRACE_ATTRIBUTE;
use crate::dispatcher::Dispatch;
use crate::record::LogRecord;
use crate::value::{Attributes, ExceptionInfo, Value};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes as SpanAttributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events from this crate's own diagnostics are never turned into points.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// hands them to a queue-backed [`Dispatch`].
///
/// Conversion to points and all sink I/O happen on the dispatcher's worker,
/// so application threads only pay for building the record and a queue
/// push.
pub struct PointLayer {
    dispatcher: Arc<dyn Dispatch>,
    min_level: Level,
    include_spans: bool,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into the dispatcher.
    pub enqueued_events: Arc<AtomicU64>,
    /// Rejected because the dispatcher was already stopped.
    pub dropped_events: Arc<AtomicU64>,
}

impl PointLayer {
    /// Create a layer that forwards every event at `min_level` or more
    /// severe to `dispatcher`.
    pub fn new(dispatcher: Arc<dyn Dispatch>, min_level: Level) -> Self {
        Self {
            dispatcher,
            min_level,
            include_spans: true,
            total_events: Arc::new(AtomicU64::new(0)),
            enqueued_events: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Attach the fields of every span in scope as nested attributes named
    /// after the span. Enabled by default.
    pub fn with_spans(mut self, include: bool) -> Self {
        self.include_spans = include;
        self
    }
}

/// Span fields stored in the span's extensions.
struct SpanFields(Attributes);

impl<S> Layer<S> for PointLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &SpanAttributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if !self.include_spans {
            return;
        }
        if let Some(span) = ctx.span(id) {
            let mut visitor = FieldVisitor::new();
            attrs.record(&mut visitor);
            span.extensions_mut().insert(SpanFields(visitor.attributes));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        if !self.include_spans {
            return;
        }
        if let Some(span) = ctx.span(id) {
            let mut extensions = span.extensions_mut();
            if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
                let mut visitor = FieldVisitor::with_attributes(std::mem::take(fields));
                values.record(&mut visitor);
                *fields = visitor.attributes;
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(OWN_TARGET) {
            return;
        }

        self.total_events.fetch_add(1, Ordering::Relaxed);
        if *meta.level() > self.min_level {
            return;
        }

        let mut attributes = Attributes::new();
        attributes.insert("name", meta.target());
        attributes.insert("levelname", meta.level().to_string());
        attributes.insert("levelno", level_number(meta.level()));
        if let Some(path) = meta.file() {
            attributes.insert("pathname", path);
            attributes.insert("filename", file_name(path));
        }
        attributes.insert("lineno", meta.line());
        attributes.insert("module", meta.module_path());

        let thread = std::thread::current();
        attributes.insert("thread", thread_id(&thread));
        attributes.insert("threadName", thread.name().unwrap_or("unnamed"));
        attributes.insert("process", std::process::id());
        attributes.insert("processName", process_name());

        if self.include_spans {
            if let Some(scope) = ctx.event_scope(event) {
                for span in scope.from_root() {
                    if let Some(SpanFields(fields)) = span.extensions().get::<SpanFields>() {
                        if !fields.is_empty() {
                            attributes.insert(span.name(), fields.clone());
                        }
                    }
                }
            }
        }

        let mut visitor = FieldVisitor::with_attributes(attributes);
        event.record(&mut visitor);

        let record = LogRecord {
            name: meta.target().replace("::", "."),
            created: Utc::now(),
            attributes: visitor.attributes,
        };

        match self.dispatcher.emit(record) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn level_number(level: &Level) -> i64 {
    match *level {
        Level::ERROR => 40,
        Level::WARN => 30,
        Level::INFO => 20,
        Level::DEBUG => 10,
        Level::TRACE => 5,
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

// `ThreadId` has no stable numeric accessor; its Debug form is `ThreadId(N)`.
fn thread_id(thread: &std::thread::Thread) -> String {
    let debug = format!("{:?}", thread.id());
    debug
        .trim_start_matches("ThreadId(")
        .trim_end_matches(')')
        .to_string()
}

fn process_name() -> &'static str {
    static NAME: OnceLock<String> = OnceLock::new();
    NAME.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "unknown".to_string())
    })
}

/// Collects `tracing` fields into typed [`Attributes`].
///
/// `message` is stored as `msg`. A field recorded as an error also
/// populates `exc_info` unless an earlier error already did.
pub struct FieldVisitor {
    pub attributes: Attributes,
}

impl FieldVisitor {
    pub fn new() -> Self {
        Self::with_attributes(Attributes::new())
    }

    pub fn with_attributes(attributes: Attributes) -> Self {
        Self { attributes }
    }

    fn key(field: &Field) -> &'static str {
        match field.name() {
            "message" => "msg",
            name => name,
        }
    }
}

impl Default for FieldVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.attributes.insert(Self::key(field), value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.attributes.insert(Self::key(field), value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.attributes.insert(Self::key(field), value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.attributes.insert(Self::key(field), value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.attributes.insert(Self::key(field), value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if !self.attributes.contains_key(STACKTRACE_ATTRIBUTE) {
            self.attributes
                .insert(STACKTRACE_ATTRIBUTE, Value::Exception(ExceptionInfo::from_error(value)));
        }
        self.attributes.insert(Self::key(field), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.attributes.insert(Self::key(field), format!("{:?}", value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("src/bin/main.rs"), "main.rs");
        assert_eq!(file_name("C:\\app\\lib.rs"), "lib.rs");
        assert_eq!(file_name("lib.rs"), "lib.rs");
    }

    #[test]
    fn test_level_numbers_are_ordered() {
        assert!(level_number(&Level::ERROR) > level_number(&Level::WARN));
        assert!(level_number(&Level::DEBUG) > level_number(&Level::TRACE));
    }

    #[test]
    fn test_thread_id_is_numeric() {
        let id = thread_id(&std::thread::current());
        assert!(id.parse::<u64>().is_ok(), "unexpected thread id {id:?}");
    }
}
