//! Failure injection: handlers that panic or fail must not leak their
//! request id into later work on the same thread.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{routing::get, Router};
use futures_util::FutureExt;
use request_logging::context::{self, RequestContextExt};
use request_logging::http::{BoundaryAdapter, RequestContextLayer, ThreadBoundary};
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;

mod common;

async fn panics() -> &'static str {
    tracing::error!("about to fail");
    panic!("handler failed")
}

fn failing_router() -> Router {
    Router::new()
        .route("/panic", get(panics))
        .route(
            "/error",
            get(|| async {
                tracing::warn!("returning an error");
                (StatusCode::INTERNAL_SERVER_ERROR, "boom")
            }),
        )
        .route(
            "/ok",
            get(|| async {
                tracing::info!("healthy request");
                context::current().map(|id| id.to_string()).unwrap_or_default()
            }),
        )
        .layer(CatchPanicLayer::new())
        .layer(RequestContextLayer::new())
}

async fn send(router: &Router, path: &str, id: Option<&str>) -> (StatusCode, String) {
    let mut builder = Request::get(path);
    if let Some(id) = id {
        builder = builder.header("x-request-id", id);
    }
    let response = router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test(flavor = "current_thread")]
async fn test_panicking_handler_does_not_leak_id() {
    let (buffer, _guard) = common::capture();
    let router = failing_router();

    let (status, _) = send(&router, "/panic", Some("doomed")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(context::current(), None);

    tracing::info!("between requests");

    let (status, body) = send(&router, "/ok", Some("next")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "next");

    let failed = common::records_with_message(&buffer, "about to fail");
    assert_eq!(failed[0]["requestID"], "doomed");
    assert_eq!(failed[0]["severity"], "ERROR");
    let between = common::records_with_message(&buffer, "between requests");
    assert!(between[0]["requestID"].is_null());
    let healthy = common::records_with_message(&buffer, "healthy request");
    assert_eq!(healthy[0]["requestID"], "next");
}

#[tokio::test(flavor = "current_thread")]
async fn test_error_response_does_not_leak_id() {
    let (buffer, _guard) = common::capture();
    let router = failing_router();

    let (status, body) = send(&router, "/error", Some("err-1")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "boom");
    assert_eq!(context::current(), None);

    let (_, body) = send(&router, "/ok", None).await;
    assert_ne!(body, "err-1");
    assert!(uuid::Uuid::parse_str(&body).is_ok());

    let errors = common::records_with_message(&buffer, "returning an error");
    assert_eq!(errors[0]["requestID"], "err-1");
    assert_eq!(errors[0]["severity"], "WARNING");
}

#[tokio::test(flavor = "current_thread")]
async fn test_uncaught_panic_in_bound_future_restores_context() {
    let _outer = context::enter("poller");

    let bound = async {
        tokio::task::yield_now().await;
        assert_eq!(context::current().unwrap(), "req-panic");
        panic!("inside request");
    }
    .with_request_id("req-panic");
    let result = AssertUnwindSafe(bound).catch_unwind().await;

    assert!(result.is_err());
    assert_eq!(context::current().unwrap(), "poller");
}

#[test]
fn test_worker_thread_survives_panicking_request() {
    let (tx, rx) = mpsc::channel::<(Option<&'static str>, bool)>();
    let (results_tx, results_rx) = mpsc::channel();

    let worker = thread::spawn(move || {
        let mut boundary = ThreadBoundary::new();
        for (id, fail) in rx {
            let mut builder = Request::get("/work");
            if let Some(id) = id {
                builder = builder.header("x-request-id", id);
            }
            let request = builder.body(()).unwrap();

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                boundary.handle(&request, || {
                    if fail {
                        panic!("request failed");
                    }
                    context::current()
                })
            }));
            results_tx
                .send((outcome.ok().flatten(), context::current()))
                .unwrap();
        }
    });

    tx.send((Some("first"), false)).unwrap();
    tx.send((Some("second"), true)).unwrap();
    tx.send((None, false)).unwrap();
    drop(tx);

    let results: Vec<_> = results_rx.iter().collect();
    worker.join().unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0.as_ref().unwrap(), "first");
    assert_eq!(results[1].0, None);
    let generated = results[2].0.as_ref().unwrap();
    assert_ne!(generated, "second");
    assert!(uuid::Uuid::parse_str(generated.as_str()).is_ok());
    assert!(results.iter().all(|(_, after)| after.is_none()));
}
