//! Shared utilities for integration and load testing.

use std::net::SocketAddr;

use axum::{routing::get, Json, Router};
use request_logging::config::LoggingConfig;
use request_logging::context;
use request_logging::http::{HttpServer, RequestContextLayer};
use request_logging::observability::{subscriber, CaptureBuffer};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::subscriber::DefaultGuard;

/// Captures JSON records emitted on the current thread until the guard drops.
#[allow(dead_code)]
pub fn capture() -> (CaptureBuffer, DefaultGuard) {
    let buffer = CaptureBuffer::new();
    let guard =
        tracing::subscriber::set_default(subscriber(&LoggingConfig::default(), buffer.clone()));
    (buffer, guard)
}

/// `/testme` logs one record and returns the id it saw.
#[allow(dead_code)]
pub fn testme_router() -> Router {
    Router::new()
        .route("/testme", get(testme))
        .layer(RequestContextLayer::new())
}

async fn testme() -> Json<Value> {
    tracing::info!("testme endpoint");
    Json(json!({ "request_id": context::current().map(|id| id.to_string()) }))
}

/// A running server on an ephemeral port; stops when dropped.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start `router` on 127.0.0.1 with an OS-assigned port.
#[allow(dead_code)]
pub async fn start_server(router: Router) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = HttpServer::with_router(router)
            .run_until(listener, async {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        addr,
        shutdown: Some(tx),
    }
}

/// Records whose message equals `message`.
#[allow(dead_code)]
pub fn records_with_message(buffer: &CaptureBuffer, message: &str) -> Vec<Value> {
    buffer
        .records()
        .into_iter()
        .filter(|r| r["message"] == message)
        .collect()
}
