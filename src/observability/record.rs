//! The structured record built from a `tracing` event.
//!
//! # Responsibilities
//! - Collect message, severity, source location and extra fields
//! - Stamp the request id at event time
//! - Render as a JSON object or a plain-text line
//!
//! # Design Decisions
//! - Field order is fixed: requestID, message, timestamp, severity, pathname,
//!   lineno, then client attributes of the request, then extras in the order
//!   the call site wrote them
//! - Values JSON cannot represent become a diagnostic string, never an error

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Number, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level};

use crate::observability::enrich::{self, REQUEST_ID_FIELD};

const RESERVED: [&str; 6] = [
    REQUEST_ID_FIELD,
    "message",
    "timestamp",
    "severity",
    "pathname",
    "lineno",
];

/// Record severity as written to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::TRACE => Severity::Trace,
            Level::DEBUG => Severity::Debug,
            Level::INFO => Severity::Info,
            Level::WARN => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One enriched log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub request_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub pathname: Option<String>,
    pub lineno: Option<u32>,
    pub extra: Map<String, Value>,
}

impl LogRecord {
    /// Builds the record for `event`, reading the calling flow's request id.
    pub fn from_event(event: &Event<'_>) -> Self {
        let metadata = event.metadata();
        let stamp = enrich::stamp();
        let mut record = Self {
            request_id: stamp.request_id,
            message: String::new(),
            timestamp: Utc::now(),
            severity: Severity::from(*metadata.level()),
            pathname: metadata.file().map(str::to_owned),
            lineno: metadata.line(),
            extra: stamp
                .attributes
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect(),
        };
        event.record(&mut RecordVisitor(&mut record));
        record
    }

    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn insert_field(&mut self, name: &str, value: Value) {
        match name {
            "message" => {
                self.message = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                }
            }
            // Location of records bridged from the `log` crate.
            "log.file" => self.pathname = value.as_str().map(str::to_owned),
            "log.line" => self.lineno = value.as_u64().and_then(|l| u32::try_from(l).ok()),
            name if name.starts_with("log.") => {}
            name if RESERVED.contains(&name) => {}
            name => {
                self.extra.insert(name.to_owned(), value);
            }
        }
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(RESERVED.len() + self.extra.len()))?;
        map.serialize_entry(REQUEST_ID_FIELD, &self.request_id)?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry("timestamp", &self.timestamp_string())?;
        map.serialize_entry("severity", self.severity.as_str())?;
        map.serialize_entry("pathname", &self.pathname)?;
        map.serialize_entry("lineno", &self.lineno)?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Plain-text rendering: `[timestamp] SEVERITY [requestID] in path:line: message`.
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} [{}] in {}:{}: {}",
            self.timestamp_string(),
            self.severity,
            self.request_id.as_deref().unwrap_or("None"),
            self.pathname.as_deref().unwrap_or("<unknown>"),
            self.lineno.unwrap_or(0),
            self.message,
        )?;
        for (key, value) in &self.extra {
            match value {
                Value::String(s) => write!(f, " {key}={s}")?,
                other => write!(f, " {key}={other}")?,
            }
        }
        Ok(())
    }
}

/// Placeholder for values JSON cannot carry.
pub fn unserializable(type_name: &str, value: impl fmt::Display) -> Value {
    Value::String(format!(
        "Object of type {type_name} is not JSON serializable {value}"
    ))
}

struct RecordVisitor<'a>(&'a mut LogRecord);

impl Visit for RecordVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| unserializable("f64", value));
        self.0.insert_field(field.name(), value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert_field(field.name(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert_field(field.name(), Value::from(value));
    }

    fn record_i128(&mut self, field: &Field, value: i128) {
        let value = i64::try_from(value)
            .map(Value::from)
            .unwrap_or_else(|_| unserializable("i128", value));
        self.0.insert_field(field.name(), value);
    }

    fn record_u128(&mut self, field: &Field, value: u128) {
        let value = u64::try_from(value)
            .map(Value::from)
            .unwrap_or_else(|_| unserializable("u128", value));
        self.0.insert_field(field.name(), value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert_field(field.name(), Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert_field(field.name(), Value::String(value.to_owned()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.0.insert_field(field.name(), Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert_field(field.name(), Value::String(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> LogRecord {
        LogRecord {
            request_id: None,
            message: "hello world 42".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            severity: Severity::Info,
            pathname: Some("src/app.rs".to_string()),
            lineno: Some(7),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_json_field_order_and_null_request_id() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            r#"{"requestID":null,"message":"hello world 42","timestamp":"2024-05-01T12:30:00.000000Z","severity":"INFO","pathname":"src/app.rs","lineno":7}"#
        );
    }

    #[test]
    fn test_plain_rendering() {
        let mut record = sample();
        assert_eq!(
            record.to_string(),
            "[2024-05-01T12:30:00.000000Z] INFO [None] in src/app.rs:7: hello world 42"
        );

        record.request_id = Some("999-888-777".to_string());
        record.severity = Severity::Warning;
        record.extra.insert("something".into(), Value::from("12345"));
        record.extra.insert("count".into(), Value::from(3));
        assert_eq!(
            record.to_string(),
            "[2024-05-01T12:30:00.000000Z] WARNING [999-888-777] in src/app.rs:7: hello world 42 something=12345 count=3"
        );
    }

    #[test]
    fn test_reserved_extra_fields_are_dropped() {
        let mut record = sample();
        record.insert_field("severity", Value::from("LOUD"));
        record.insert_field("requestID", Value::from("forged"));
        record.insert_field("log.target", Value::from("app"));
        record.insert_field("user", Value::from("alice"));

        assert_eq!(record.severity, Severity::Info);
        assert_eq!(record.request_id, None);
        assert_eq!(record.extra.len(), 1);
        assert_eq!(record.extra["user"], "alice");
    }

    #[test]
    fn test_bridged_log_location() {
        let mut record = sample();
        record.insert_field("log.file", Value::from("src/legacy.rs"));
        record.insert_field("log.line", Value::from(99u64));
        assert_eq!(record.pathname.as_deref(), Some("src/legacy.rs"));
        assert_eq!(record.lineno, Some(99));
    }

    #[test]
    fn test_unserializable_placeholder() {
        assert_eq!(
            unserializable("f64", f64::NAN),
            Value::from("Object of type f64 is not JSON serializable NaN")
        );
    }

    #[test]
    fn test_severity_names() {
        assert_eq!(Severity::from(Level::WARN).as_str(), "WARNING");
        assert_eq!(Severity::from(Level::ERROR).as_str(), "ERROR");
        assert_eq!(Severity::from(Level::DEBUG).as_str(), "DEBUG");
    }
}
