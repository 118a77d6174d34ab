use crate::config::LogFormat;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use tracing::span;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, Registry};

/// Structured log entry for testing and analysis
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
    /// Fields of the enclosing spans, outermost first.
    pub span_fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Looks a field up on the event first, then on its spans.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .chain(self.span_fields.iter())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Captures log entries in memory so tests can assert on them.
///
/// Attach to the current thread with [`TestLogSubscriber::install`].
#[derive(Debug, Clone)]
pub struct TestLogSubscriber {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Default for TestLogSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl TestLogSubscriber {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Entries at `level` whose message contains `needle`.
    pub fn matching(&self, level: Level, needle: &str) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|entry| entry.level == level && entry.message.contains(needle))
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Routes this thread's events into the subscriber until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let registry = Registry::default().with(self.clone().into_layer::<Registry>());
        tracing::subscriber::set_default(registry)
    }

    pub fn into_layer<S>(self) -> TestLayer<S>
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        TestLayer {
            subscriber: self,
            _phantom: PhantomData,
        }
    }
}

pub struct TestLayer<S> {
    subscriber: TestLogSubscriber,
    _phantom: PhantomData<S>,
}

impl<S> Layer<S> for TestLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = FieldVisitor::default();
            attrs.record(&mut visitor);
            span.extensions_mut().insert(SpanFields(visitor.fields));
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut span_fields = Vec::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    span_fields.extend(fields.0.iter().cloned());
                }
            }
        }

        let entry = LogEntry {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
            span_fields,
        };

        self.subscriber.lock().push(entry);
    }
}

struct SpanFields(Vec<(String, String)>);

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let value_str = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(value_str);
        } else {
            self.fields.push((field.name().to_string(), value_str));
        }
    }
}

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,chain_reaction_web=debug";

/// Installs the global subscriber for the server process.
///
/// `RUST_LOG` overrides [`DEFAULT_FILTER`]. JSON output carries the current
/// span, so every line of a move sequence includes its `sequence_id`.
pub fn init_logging(format: LogFormat) -> Result<(), SetGlobalDefaultError> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match format {
        LogFormat::Text => {
            let subscriber = fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Json => {
            let subscriber = fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, error, info, warn};

    #[test]
    fn test_log_subscriber_captures_entries() {
        let subscriber = TestLogSubscriber::new();
        let layer = subscriber.clone().into_layer::<Registry>();
        let registry = Registry::default().with(layer);

        tracing::subscriber::with_default(registry, || {
            info!("test info message");
            warn!("test warning message");
            error!("test error message");
        });

        let entries = subscriber.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].level, Level::INFO);
        assert!(entries[0].message.contains("test info message"));
        assert_eq!(entries[1].level, Level::WARN);
        assert!(entries[1].message.contains("test warning message"));
        assert_eq!(entries[2].level, Level::ERROR);
        assert!(entries[2].message.contains("test error message"));
    }

    #[test]
    fn test_log_subscriber_captures_fields() {
        let subscriber = TestLogSubscriber::new();
        let layer = subscriber.clone().into_layer::<Registry>();
        let registry = Registry::default().with(layer);

        tracing::subscriber::with_default(registry, || {
            info!(sequence_id = "abc123", row = 4, "human move recorded");
        });

        let entries = subscriber.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("human move recorded"));
        assert!(entries[0]
            .fields
            .iter()
            .any(|(k, v)| k == "sequence_id" && v.contains("abc123")));
        assert!(entries[0]
            .fields
            .iter()
            .any(|(k, v)| k == "row" && v == "4"));
    }

    #[test]
    fn test_log_subscriber_clear() {
        let subscriber = TestLogSubscriber::new();

        // First log
        let layer1 = subscriber.clone().into_layer::<Registry>();
        let registry1 = Registry::default().with(layer1);
        tracing::subscriber::with_default(registry1, || {
            info!("first message");
        });
        assert_eq!(subscriber.entries().len(), 1);

        // Clear logs
        subscriber.clear();
        assert_eq!(subscriber.entries().len(), 0);

        // Second log with new registry
        let layer2 = subscriber.clone().into_layer::<Registry>();
        let registry2 = Registry::default().with(layer2);
        tracing::subscriber::with_default(registry2, || {
            info!("second message");
        });
        assert_eq!(subscriber.entries().len(), 1);
    }

    #[test]
    fn test_different_log_levels() {
        let subscriber = TestLogSubscriber::new();
        let layer = subscriber.clone().into_layer::<Registry>();
        let registry = Registry::default().with(layer);

        tracing::subscriber::with_default(registry, || {
            debug!("debug message");
            info!("info message");
            warn!("warn message");
            error!("error message");
        });

        let entries = subscriber.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].level, Level::DEBUG);
        assert_eq!(entries[1].level, Level::INFO);
        assert_eq!(entries[2].level, Level::WARN);
        assert_eq!(entries[3].level, Level::ERROR);
    }

    #[test]
    fn test_log_subscriber_captures_span_fields() {
        let subscriber = TestLogSubscriber::new();
        let layer = subscriber.clone().into_layer::<Registry>();
        let registry = Registry::default().with(layer);

        tracing::subscriber::with_default(registry, || {
            let span = tracing::info_span!("move_sequence", sequence_id = "seq-1");
            let _entered = span.enter();
            info!(row = 2, "human move recorded");
        });

        let entries = subscriber.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field("row"), Some("2"));
        assert!(entries[0].field("sequence_id").unwrap().contains("seq-1"));
        assert_eq!(entries[0].field("missing"), None);
    }
}
