use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

/// Body keys whose values are never written to a request record
const SENSITIVE_KEYS: [&str; 8] = [
    "password",
    "clave",
    "token",
    "authorization",
    "auth",
    "secret",
    "api_key",
    "apikey",
];

const REDACTED: &str = "***redacted***";

/// One observed HTTP exchange
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub ts: String,
    pub method: String,
    pub url: String,
    pub request_body: Option<Value>,
    pub status: Option<u16>,
    pub response_text: Option<String>,
    pub response_json: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Observer for HTTP exchanges made by the transport.
///
/// Injected into the transport at construction time, so tests and
/// diagnostic surfaces can watch traffic without a process-wide slot.
/// Observers must not influence routing or retry decisions.
pub trait RequestObserver: Send + Sync {
    fn record(&self, record: &RequestRecord);
}

/// Observer that drops everything
pub struct NullObserver;

impl RequestObserver for NullObserver {
    fn record(&self, _record: &RequestRecord) {}
}

/// Observer that forwards each exchange to `tracing`
pub struct TracingObserver;

impl RequestObserver for TracingObserver {
    fn record(&self, record: &RequestRecord) {
        match record.status {
            Some(status) => tracing::debug!(
                method = %record.method,
                url = %record.url,
                status,
                duration_ms = record.duration_ms,
                "api call"
            ),
            None => tracing::warn!(
                method = %record.method,
                url = %record.url,
                error = record.error.as_deref().unwrap_or("unknown"),
                duration_ms = record.duration_ms,
                "api call failed"
            ),
        }
    }
}

type Subscriber = Box<dyn Fn(&RequestRecord) + Send + Sync>;

/// Observer keeping the most-recent exchange, with subscriber fan-out
/// for diagnostic overlays
#[derive(Default)]
pub struct MemoryObserver {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    last: Option<RequestRecord>,
    subscribers: Vec<Subscriber>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent record, if any exchange has been observed yet
    pub fn last(&self) -> Option<RequestRecord> {
        self.inner.lock().ok()?.last.clone()
    }

    /// Register a listener invoked on every observed exchange
    pub fn subscribe(&self, listener: impl Fn(&RequestRecord) + Send + Sync + 'static) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.push(Box::new(listener));
        }
    }
}

impl RequestObserver for MemoryObserver {
    fn record(&self, record: &RequestRecord) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.last = Some(record.clone());
            for listener in &inner.subscribers {
                listener(record);
            }
        }
    }
}

/// Replace sensitive values in a JSON body before it is observed.
/// Matching is by case-insensitive substring on object keys, recursively.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let lower = key.to_lowercase();
                    if SENSITIVE_KEYS.iter().any(|needle| lower.contains(needle)) {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact(inner))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
