//! Event formatter that renders enriched records.

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::config::LogFormat;
use crate::observability::record::LogRecord;

/// Renders each event as one [`LogRecord`] line, JSON or plain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFormat {
    format: LogFormat,
}

impl RecordFormat {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }
}

impl<S, N> FormatEvent<S, N> for RecordFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let record = LogRecord::from_event(event);

        match self.format {
            LogFormat::Json => {
                let line = serde_json::to_string(&record).unwrap_or_else(|err| {
                    serde_json::json!({
                        "requestID": record.request_id,
                        "message": format!("Object of type LogRecord is not JSON serializable {err}"),
                        "severity": record.severity.as_str(),
                    })
                    .to_string()
                });
                writeln!(writer, "{line}")
            }
            LogFormat::Plain => writeln!(writer, "{record}"),
        }
    }
}
