//! Tower middleware that runs each request inside its own request context.
//!
//! # Responsibilities
//! - Extract or generate the request id (see [`RequestIdPolicy`])
//! - Make it visible downstream: request header and `RequestId` extension
//! - Run the inner service with the id bound to the request's future
//! - Echo the id back in the response header
//!
//! # Design Decisions
//! - The inner `call` also runs inside the context, since some services do
//!   work (and log) before returning their future
//! - Handler-set response headers are not overwritten

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::http::{HeaderName, HeaderValue, Request, Response};
use pin_project::pin_project;
use tower::{Layer, Service};
use tower_http::request_id::{MakeRequestId, MakeRequestUuid};

use crate::context::{self, WithRequestContext};
use crate::http::adapter::{BoundaryAdapter, ExtractRequestId, TaskBoundary};
use crate::http::request::RequestIdPolicy;

/// Layer that applies [`RequestContextService`].
#[derive(Debug, Clone)]
pub struct RequestContextLayer<M = MakeRequestUuid> {
    boundary: TaskBoundary<M>,
}

impl RequestContextLayer {
    pub fn new() -> Self {
        Self {
            boundary: TaskBoundary::new(),
        }
    }
}

impl Default for RequestContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> RequestContextLayer<M> {
    pub fn with_policy(policy: RequestIdPolicy<M>) -> Self {
        Self {
            boundary: TaskBoundary::with_policy(policy),
        }
    }
}

impl<S, M: Clone> Layer<S> for RequestContextLayer<M> {
    type Service = RequestContextService<S, M>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextService {
            inner,
            boundary: self.boundary.clone(),
        }
    }
}

/// Middleware that binds a request id to every request it handles.
#[derive(Debug, Clone)]
pub struct RequestContextService<S, M = MakeRequestUuid> {
    inner: S,
    boundary: TaskBoundary<M>,
}

impl<S, M, ReqBody, ResBody> Service<Request<ReqBody>> for RequestContextService<S, M>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    M: MakeRequestId,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = WithRequestContext<ResponseFuture<S::Future>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let id = self.boundary.extract_id(&request);
        let header = self.boundary.header().clone();
        let value = HeaderValue::from_str(id.as_str()).ok();

        if let Some(value) = &value {
            request.headers_mut().insert(header.clone(), value.clone());
        }
        request.extensions_mut().insert(id.clone());

        let inner = context::scope(id.clone(), || self.inner.call(request));
        let future = ResponseFuture {
            inner,
            header,
            value,
        };
        self.boundary.bind(id, future)
    }
}

/// Response future for [`RequestContextService`]; echoes the id header.
#[pin_project]
#[derive(Debug)]
pub struct ResponseFuture<F> {
    #[pin]
    inner: F,
    header: HeaderName,
    value: Option<HeaderValue>,
}

impl<F, B, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut response = ready!(this.inner.poll(cx))?;

        if let Some(value) = this.value.take() {
            let headers = response.headers_mut();
            if !headers.contains_key(&*this.header) {
                headers.insert(this.header.clone(), value);
            }
        }

        Poll::Ready(Ok(response))
    }
}
