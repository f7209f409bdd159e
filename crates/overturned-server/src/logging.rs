use std::{collections::VecDeque, sync::Arc};

use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// Log lines kept for clients that connect after the fact.
pub const RING_CAPACITY: usize = 500;

pub type LogRing = Arc<std::sync::Mutex<VecDeque<String>>>;

/// Mirrors every tracing event as a JSON line onto a broadcast channel and
/// a bounded ring, feeding `/api/logs`.
///
/// Line shape: `{ts, level, message, category, fields}` where `fields`
/// holds the structured event fields (`panel`, `model`, `kind`, ...).
pub struct BroadcastLayer {
    pub tx: broadcast::Sender<String>,
    pub ring: LogRing,
}

/// Collects the message and the remaining fields of one event.
#[derive(Default)]
struct EventFields {
    message: String,
    fields: Map<String, Value>,
}

impl tracing::field::Visit for EventFields {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().into(), Value::from(value));
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(field.name().into(), Value::from(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(field.name().into(), Value::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.insert(field.name().into(), Value::from(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.insert(field.name().into(), Value::from(rendered));
        }
    }
}

/// Coarse grouping shown as a filter in the log viewer.
pub(crate) fn category(target: &str) -> &'static str {
    if target.contains("dispatch") {
        "dispatch"
    } else if target.contains("chat") || target.contains("evidence") {
        "panel"
    } else if target.contains("gemini") || target.contains("agent") {
        "model"
    } else {
        "system"
    }
}

/// Append a line, evicting the oldest once the ring is full.
pub(crate) fn push_bounded(ring: &LogRing, line: String) {
    let mut ring = ring.lock().unwrap_or_else(|e| e.into_inner());
    while ring.len() >= RING_CAPACITY {
        ring.pop_front();
    }
    ring.push_back(line);
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for BroadcastLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = match *event.metadata().level() {
            tracing::Level::ERROR => "err",
            tracing::Level::WARN => "warn",
            tracing::Level::INFO => "info",
            tracing::Level::DEBUG => "debug",
            tracing::Level::TRACE => return,
        };

        let mut visited = EventFields::default();
        event.record(&mut visited);

        let line = serde_json::json!({
            "ts": chrono::Utc::now().timestamp(),
            "level": level,
            "message": visited.message,
            "category": category(event.metadata().target()),
            "fields": visited.fields,
        })
        .to_string();

        let _ = self.tx.send(line.clone());
        push_bounded(&self.ring, line);
    }
}
