//! In-memory log capture for asserting on what the driver reports.
//!
//! ```ignore
//! let (logs, _guard) = capture_logs();
//! dispatcher.on_inbound_frame(b"not json");
//! assert!(logs.has_event(Level::WARN, "malformed response"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Level it was emitted at.
    pub level: Level,
    /// Module path of the call site.
    pub target: String,
    /// The message text.
    pub message: String,
    /// Structured fields, rendered with `Display` or `Debug`.
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    /// A structured field's rendered value.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Shared buffer of captured events.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    /// Snapshot of everything captured so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// First event at `level` whose message contains `needle`.
    pub fn find(&self, level: Level, needle: &str) -> Option<CapturedEvent> {
        self.events
            .lock()
            .iter()
            .find(|e| e.level == level && e.message.contains(needle))
            .cloned()
    }

    /// Whether any event at `level` mentions `needle`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.find(level, needle).is_some()
    }

    /// Whether any event, at any level, mentions `needle`.
    pub fn has_message(&self, needle: &str) -> bool {
        self.events.lock().iter().any(|e| e.message.contains(needle))
    }

    /// Number of events at exactly `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.events.lock().iter().filter(|e| e.level == level).count()
    }

    /// Forget everything captured so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[derive(Default)]
struct Recorder {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Recorder {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            let _ = self.fields.insert(field.name().to_owned(), value);
        }
    }
}

// Integer and bool fields fall through to `record_debug`.
impl Visit for Recorder {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

struct CaptureLayer(CapturedLogs);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorder = Recorder::default();
        event.record(&mut recorder);
        let meta = event.metadata();
        self.0.events.lock().push(CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: recorder.message,
            fields: recorder.fields,
        });
    }
}

/// Capture every event emitted on this thread until the guard drops.
///
/// The subscriber is thread-local, so parallel tests don't see each other's
/// logs. Async tests need the current-thread runtime (the `#[tokio::test]`
/// default) for spawned work to be captured.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(CaptureLayer(logs.clone()))
        .set_default();
    (logs, guard)
}
