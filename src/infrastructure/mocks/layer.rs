//! Tracing layer that records events for log assertions.

use crate::application::lock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// An event seen by [`MockCaptureLayer`], with its fields rendered to text.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Structured fields other than `message`, keyed by field name
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    /// Rendered value of a structured field.
    ///
    /// Strings are stored verbatim, everything else through `Debug`, so
    /// `warn!(failures = 3u32, ..)` yields `Some("3")`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Layer that keeps every event it sees, in order.
///
/// Clones share the same record, so one handle can be installed in a
/// subscriber while another is used for assertions.
///
/// # Examples
///
/// ```
/// use flowguard::infrastructure::mocks::MockCaptureLayer;
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let capture = MockCaptureLayer::new();
/// let subscriber = tracing_subscriber::registry().with(capture.clone());
///
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!(attempt = 2, "retrying");
/// });
///
/// let events = capture.events();
/// assert_eq!(events[0].message, "retrying");
/// assert_eq!(events[0].field("attempt"), Some("2"));
///
/// capture.clear();
/// assert_eq!(capture.count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockCaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl MockCaptureLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event recorded so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        lock(&self.events).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Events recorded at exactly `level`.
    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        lock(&self.events)
            .iter()
            .filter(|event| event.level == level)
            .cloned()
            .collect()
    }

    /// Messages of all recorded events, in order.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .map(|event| event.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl<S: Subscriber> Layer<S> for MockCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorder = FieldRecorder::default();
        event.record(&mut recorder);

        let metadata = event.metadata();
        lock(&self.events).push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: recorder.message,
            fields: recorder.fields,
        });
    }
}

#[derive(Default)]
struct FieldRecorder {
    message: String,
    fields: BTreeMap<String, String>,
}

impl FieldRecorder {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldRecorder {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info, warn};
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_records_levels_and_targets() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!("test message");
            warn!(target: "flowguard::test", "careful");
        });

        assert_eq!(capture.count(), 2);
        assert_eq!(capture.messages(), vec!["test message", "careful"]);

        let warnings = capture.at_level(Level::WARN);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].target, "flowguard::test");
        assert!(warnings[0].fields.is_empty());
    }

    #[test]
    fn test_records_structured_fields() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let keys = vec!["a", "b"];
            debug!(purged = 2usize, key = "tenant-a", ?keys, ok = true, "swept");
        });

        let event = &capture.events()[0];
        assert_eq!(event.message, "swept");
        assert_eq!(event.field("purged"), Some("2"));
        assert_eq!(event.field("key"), Some("tenant-a"));
        assert_eq!(event.field("keys"), Some(r#"["a", "b"]"#));
        assert_eq!(event.field("ok"), Some("true"));
        assert_eq!(event.field("message"), None);
        assert_eq!(event.field("missing"), None);
    }
}
