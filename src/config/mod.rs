//! Logging configuration subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (LOG_LEVEL, LOG_FORMAT, LOG_STREAM, RUST_LOG)
//!     → LoggingConfig (immutable)
//!     → observability::logging::init_logging
//! ```
//!
//! # Design Decisions
//! - All fields have defaults: info level, JSON records, stdout
//! - Environment wins over the file, so deployments can adjust without edits
//! - Unknown values are errors rather than silently falling back

pub mod loader;
pub mod schema;

pub use loader::{load, load_config, ConfigError};
pub use schema::{LogFormat, LogLevel, LoggingConfig, OutputStream, ParseValueError};
