//! HTTP request boundary subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → request.rs (X-Request-ID header, or generate a UUID)
//!     → adapter.rs (bind the id to the handling thread or future)
//!     → layer.rs (tower middleware for axum; echo the id header)
//!     → handler (every log record stamped with the id)
//!     → context restored on every exit path
//! ```

pub mod adapter;
pub mod layer;
pub mod request;
pub mod server;

pub use adapter::{BoundaryAdapter, ExtractRequestId, TaskBoundary, ThreadBoundary};
pub use layer::{RequestContextLayer, RequestContextService};
pub use request::{inbound_request_id, RequestIdPolicy, CLIENT_HEADERS, X_REQUEST_ID};
pub use server::{build_router, HttpServer};
