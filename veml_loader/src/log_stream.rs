//! Forwards `tracing` events as structured envelopes over a channel so hosts
//! and tests can observe what a load reported.

use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

#[derive(Debug, Clone, Serialize)]
pub struct LogEnvelope {
    pub timestamp_ms: u64,
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl LogEnvelope {
    pub fn is_warning(&self) -> bool {
        self.level == Level::WARN.as_str()
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(serde_json::Value::as_str)
    }
}

#[derive(Clone)]
pub struct LogForwardLayer {
    sender: Sender<LogEnvelope>,
    min_level: Level,
}

impl LogForwardLayer {
    pub fn new(sender: Sender<LogEnvelope>) -> Self {
        Self {
            sender,
            min_level: Level::TRACE,
        }
    }

    /// Drops events less severe than `level`.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// A layer paired with the receiving end of its channel.
    pub fn channel() -> (Self, Receiver<LogEnvelope>) {
        let (sender, receiver) = unbounded();
        (Self::new(sender), receiver)
    }
}

impl<S> Layer<S> for LogForwardLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // Level ordering puts TRACE highest.
        if *metadata.level() > self.min_level {
            return;
        }
        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let message = visitor
            .message
            .unwrap_or_else(|| metadata.target().to_string());
        let envelope = LogEnvelope {
            timestamp_ms,
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message,
            fields: visitor.fields,
        };
        let _ = self.sender.send(envelope);
    }
}

#[derive(Default)]
struct LogVisitor {
    message: Option<String>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl LogVisitor {
    fn record_value(&mut self, field: &tracing::field::Field, value: serde_json::Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl tracing::field::Visit for LogVisitor {
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.record_value(field, value.into());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.record_value(field, value.into());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.record_value(field, value.into());
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.record_value(field, serde_json::Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_value(field, value.into());
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.record_value(field, value.to_string().into());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_value(field, format!("{value:?}").into());
    }
}
