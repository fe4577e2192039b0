//! HTTP server setup for the demo application.
//!
//! # Responsibilities
//! - Create the Axum router with the demo handlers
//! - Wire up middleware (request context, request logging)
//! - Bind the server to a listener and shut down gracefully

use std::future::Future;

use axum::{
    extract::{Path, Query, Request},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;

use crate::context;
use crate::http::layer::RequestContextLayer;

/// Query string of `/items/{item_id}`.
#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub q: Option<String>,
}

/// Body returned by `/items/{item_id}`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ItemResponse {
    pub item_id: u64,
    pub q: Option<String>,
    pub request_id: Option<String>,
}

/// Builds the demo router.
///
/// Layers run outside-in: the request context is bound first, so the access
/// log written by [`log_requests`] carries the request id. Handler panics
/// become 500 responses and are logged like any other request.
pub fn build_router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/items/{item_id}", get(read_item))
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn(log_requests))
        .layer(RequestContextLayer::new())
}

async fn root() -> Json<Value> {
    tracing::info!("Hello world");
    Json(json!({ "Hello": "World" }))
}

async fn read_item(Path(item_id): Path<u64>, Query(query): Query<ItemQuery>) -> Json<ItemResponse> {
    tracing::info!(item_id, "reading item");
    Json(ItemResponse {
        item_id,
        q: query.q,
        request_id: context::current().map(|id| id.to_string()),
    })
}

/// Access log: one record per request, after the response is produced.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status().as_u16();

    tracing::info!(
        http.method = %method,
        http.path = %path,
        http.status = status,
        "{method} \"{path}\" {status}"
    );
    response
}

/// HTTP server for the demo application.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new() -> Self {
        Self::with_router(build_router())
    }

    /// Serves `router` instead of the demo routes. The caller is responsible
    /// for applying [`RequestContextLayer`].
    pub fn with_router(router: Router) -> Self {
        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run the server until `signal` completes, then drain in-flight requests.
    pub async fn run_until<S>(self, listener: TcpListener, signal: S) -> Result<(), std::io::Error>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
