use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{span, Level};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Ids that tie a record back to an ad session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Correlation {
    fn is_complete(&self) -> bool {
        self.session_id.is_some() && self.request_id.is_some()
    }

    fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.request_id.is_none()
    }

    /// Fill whatever is still missing from `outer`.
    fn inherit(&mut self, outer: &Correlation) {
        if self.session_id.is_none() {
            self.session_id.clone_from(&outer.session_id);
        }
        if self.request_id.is_none() {
            self.request_id.clone_from(&outer.request_id);
        }
    }
}

/// A warn+ record kept for host diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogRecord {
    pub seq: u64,
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    #[serde(flatten)]
    pub correlation: Correlation,
}

#[derive(Clone, Debug, Default)]
pub struct LogQuery {
    /// Keep records at least this severe.
    pub min_level: Option<Level>,
    /// Substring of the record target.
    pub target: Option<String>,
    pub session_id: Option<String>,
    /// Defaults to 100.
    pub limit: Option<usize>,
}

impl LogQuery {
    fn matches(&self, record: &LogRecord) -> bool {
        let severe_enough = self.min_level.map_or(true, |min| {
            record.level.parse::<Level>().map_or(false, |level| level <= min)
        });
        severe_enough
            && self
                .target
                .as_deref()
                .map_or(true, |t| record.target.contains(t))
            && self
                .session_id
                .as_ref()
                .map_or(true, |s| record.correlation.session_id.as_ref() == Some(s))
    }
}

/// Bounded ring of recent warn+ records, oldest evicted first.
pub struct RecentLogs {
    inner: Mutex<Ring>,
}

struct Ring {
    records: VecDeque<LogRecord>,
    capacity: usize,
    next_seq: u64,
}

impl RecentLogs {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Ring {
                records: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
                next_seq: 1,
            }),
        }
    }

    /// Append `record`, assigning its sequence number.
    fn push(&self, mut record: LogRecord) {
        let mut ring = self.inner.lock();
        if ring.records.len() == ring.capacity {
            ring.records.pop_front();
        }
        record.seq = ring.next_seq;
        ring.next_seq += 1;
        ring.records.push_back(record);
    }

    /// Matching records, most recent first.
    pub fn query(&self, q: &LogQuery) -> Vec<LogRecord> {
        self.inner
            .lock()
            .records
            .iter()
            .rev()
            .filter(|r| q.matches(r))
            .take(q.limit.unwrap_or(100))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects an event's or span's fields, pulling out the message and the
/// correlation ids.
#[derive(Default)]
struct Captured {
    message: Option<String>,
    correlation: Correlation,
    fields: Map<String, Value>,
}

impl Captured {
    fn put(&mut self, field: &Field, value: Value) {
        let text = || match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match field.name() {
            "message" => self.message = Some(text()),
            "session_id" => self.correlation.session_id = Some(text()),
            "request_id" => self.correlation.request_id = Some(text()),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for Captured {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }
}

/// `tracing` layer that copies warn+ events into a [`RecentLogs`] ring.
/// Session and request ids missing from an event are taken from the
/// nearest enclosing span that carries them.
pub struct RecentLogLayer {
    sink: Arc<RecentLogs>,
}

impl RecentLogLayer {
    pub fn new(sink: Arc<RecentLogs>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for RecentLogLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let mut captured = Captured::default();
        attrs.record(&mut captured);
        if captured.correlation.is_empty() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(captured.correlation);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > Level::WARN {
            return;
        }

        let mut captured = Captured::default();
        event.record(&mut captured);
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if captured.correlation.is_complete() {
                    break;
                }
                if let Some(outer) = span.extensions().get::<Correlation>() {
                    captured.correlation.inherit(outer);
                }
            }
        }

        self.sink.push(LogRecord {
            seq: 0,
            timestamp: Utc::now().to_rfc3339(),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message: captured.message.unwrap_or_default(),
            fields: captured.fields,
            correlation: captured.correlation,
        });
    }
}
