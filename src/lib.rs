//! Request-scoped structured logging.
//!
//! Every log record emitted while a request is being handled carries that
//! request's correlation id, even when many requests share threads.

pub mod config;
pub mod context;
pub mod http;
pub mod observability;

pub use config::LoggingConfig;
pub use context::{RequestContextExt, RequestId};
pub use http::{HttpServer, RequestContextLayer};
pub use observability::{init_from_env, init_logging, InitOutcome};
