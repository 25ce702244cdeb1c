#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;

/// Captures tracing events emitted on the current thread.
///
/// Use with `#[tokio::test]` (current-thread runtime) so spawned tasks log
/// into the capture too.
pub struct TestLogCapture {
    logs: Arc<Mutex<Vec<CapturedLog>>>,
    _guard: tracing::subscriber::DefaultGuard,
}

#[derive(Debug, Clone)]
pub struct CapturedLog {
    pub level: tracing::Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl TestLogCapture {
    /// Start capturing. Capture stops when the value is dropped.
    pub fn start() -> Self {
        let logs = Arc::new(Mutex::new(Vec::new()));
        let layer = CaptureLayer {
            logs: Arc::clone(&logs),
        };
        let subscriber = tracing_subscriber::registry().with(layer);
        let guard = tracing::subscriber::set_default(subscriber);

        Self {
            logs,
            _guard: guard,
        }
    }

    /// Assert a message containing `needle` was logged.
    pub fn assert_logged(&self, needle: &str) {
        assert!(
            self.count(needle) > 0,
            "Expected log containing '{needle}'. Logged: {:#?}",
            self.messages()
        );
    }

    /// Assert a message containing `needle` was logged at `level`.
    pub fn assert_logged_at_level(&self, level: tracing::Level, needle: &str) {
        let logs = self.logs();
        let found = logs
            .iter()
            .any(|l| l.level == level && l.message.contains(needle));
        assert!(
            found,
            "Expected {level} log containing '{needle}'. Logged: {:#?}",
            self.messages()
        );
    }

    /// Assert a structured field was logged with a value containing `value`.
    pub fn assert_field_logged(&self, name: &str, value: &str) {
        let found = self
            .logs()
            .iter()
            .any(|l| l.fields.iter().any(|(k, v)| k == name && v.contains(value)));
        assert!(found, "Expected field {name}={value}. Logged: {:#?}", self.logs());
    }

    /// Assert nothing was logged at ERROR.
    pub fn assert_no_errors(&self) {
        let errors: Vec<_> = self
            .logs()
            .into_iter()
            .filter(|l| l.level == tracing::Level::ERROR)
            .collect();
        assert!(errors.is_empty(), "Unexpected errors: {errors:#?}");
    }

    /// Number of messages containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.logs()
            .iter()
            .filter(|l| l.message.contains(needle))
            .count()
    }

    /// All captured events.
    pub fn logs(&self) -> Vec<CapturedLog> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn messages(&self) -> Vec<String> {
        self.logs().into_iter().map(|l| l.message).collect()
    }
}

struct CaptureLayer {
    logs: Arc<Mutex<Vec<CapturedLog>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut logs) = self.logs.lock() {
            logs.push(CapturedLog {
                level: *event.metadata().level(),
                target: event.metadata().target().to_string(),
                message: visitor.message,
                fields: visitor.fields,
            });
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}
