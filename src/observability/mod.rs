//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! tracing::info!(...) / log::info!(...)
//!     → EnvFilter (level from config, extra directives)
//!     → format.rs (RecordFormat: one line per event)
//!         → record.rs (collect message, location, extra fields)
//!         → enrich.rs (stamp requestID from the calling flow's context)
//!     → writer (stdout / stderr / capture.rs buffer)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing, plain text for humans
//! - Request ID is read at event time, on the emitting thread
//! - Enrichment and formatting never fail the log call

pub mod capture;
pub mod enrich;
pub mod format;
pub mod logging;
pub mod record;

pub use capture::CaptureBuffer;
pub use enrich::{Stamp, REQUEST_ID_FIELD};
pub use format::RecordFormat;
pub use logging::{init_from_env, init_logging, subscriber, InitOutcome};
pub use record::{LogRecord, Severity};
