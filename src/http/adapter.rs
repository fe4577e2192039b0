//! Boundary adapters: bind a request id to the flow that handles the request.
//!
//! Synchronous servers dedicate a thread to each request, so the id is bound
//! with a guard for the duration of a closure. Async servers interleave many
//! requests per thread, so the id is bound to the handler's future instead.

use std::future::Future;

use axum::http::{HeaderName, Request};
use tower_http::request_id::{MakeRequestId, MakeRequestUuid};

use crate::context::{self, RequestContextExt, RequestId, WithRequestContext};
use crate::http::request::RequestIdPolicy;

/// Source of the id for an inbound request: its header, or a generated one.
pub trait ExtractRequestId {
    fn extract_id<B>(&mut self, request: &Request<B>) -> RequestId;
}

/// Framework-family specific binding of request ids to units of work.
///
/// `W` is the unit of work: a closure for threaded servers, a future for
/// async ones.
pub trait BoundaryAdapter<W>: ExtractRequestId {
    type Output;

    /// Enters `id` for the duration of `work` and exits afterwards, on every
    /// exit path.
    fn bind(&self, id: RequestId, work: W) -> Self::Output;

    fn handle<B>(&mut self, request: &Request<B>, work: W) -> Self::Output {
        let id = self.extract_id(request);
        self.bind(id, work)
    }
}

/// Adapter for thread-per-request handlers.
#[derive(Debug, Clone)]
pub struct ThreadBoundary<M = MakeRequestUuid> {
    policy: RequestIdPolicy<M>,
}

impl ThreadBoundary {
    pub fn new() -> Self {
        Self::with_policy(RequestIdPolicy::new())
    }
}

impl Default for ThreadBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ThreadBoundary<M> {
    pub fn with_policy(policy: RequestIdPolicy<M>) -> Self {
        Self { policy }
    }

    pub fn header(&self) -> &HeaderName {
        self.policy.header()
    }
}

impl<M: MakeRequestId> ExtractRequestId for ThreadBoundary<M> {
    fn extract_id<B>(&mut self, request: &Request<B>) -> RequestId {
        self.policy.extract(request)
    }
}

impl<M, F, R> BoundaryAdapter<F> for ThreadBoundary<M>
where
    M: MakeRequestId,
    F: FnOnce() -> R,
{
    type Output = R;

    fn bind(&self, id: RequestId, work: F) -> R {
        context::scope(id, work)
    }
}

/// Adapter for async handlers.
#[derive(Debug, Clone)]
pub struct TaskBoundary<M = MakeRequestUuid> {
    policy: RequestIdPolicy<M>,
}

impl TaskBoundary {
    pub fn new() -> Self {
        Self::with_policy(RequestIdPolicy::new())
    }
}

impl Default for TaskBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> TaskBoundary<M> {
    pub fn with_policy(policy: RequestIdPolicy<M>) -> Self {
        Self { policy }
    }

    pub fn header(&self) -> &HeaderName {
        self.policy.header()
    }
}

impl<M: MakeRequestId> ExtractRequestId for TaskBoundary<M> {
    fn extract_id<B>(&mut self, request: &Request<B>) -> RequestId {
        self.policy.extract(request)
    }
}

impl<M, F> BoundaryAdapter<F> for TaskBoundary<M>
where
    M: MakeRequestId,
    F: Future,
{
    type Output = WithRequestContext<F>;

    fn bind(&self, id: RequestId, work: F) -> WithRequestContext<F> {
        work.with_request_id(id)
    }
}
