//! The dispatcher mounted as an axum router.

use std::thread;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;

use route_dispatch::http::POWERED_BY;
use route_dispatch::{config::parse_config, Context, Server};

mod common;
use common::{server_with_memory_log, MemoryLogSink};

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn user_routes(server: &mut Server) {
    server.get("/user/(?P<id>[0-9]+)", |ctx: &mut Context<'_>| {
        let body = format!("id={}", ctx.param("id").unwrap_or_default());
        ctx.write_str(&body);
    });
}

#[tokio::test]
async fn test_router_serves_matched_route() {
    let (mut server, log) = server_with_memory_log();
    user_routes(&mut server);

    let response = server
        .into_router()
        .oneshot(Request::get("/user/42").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-powered-by"], POWERED_BY);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(body_string(response).await, "id=42");
    assert_eq!(log.access_entries().len(), 1);
}

#[tokio::test]
async fn test_router_not_found() {
    let (mut server, log) = server_with_memory_log();
    user_routes(&mut server);

    let response = server
        .into_router()
        .oneshot(Request::get("/user/abc").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "Not Found");
    assert_eq!(log.access_entries()[0].status, 404);
}

#[tokio::test]
async fn test_forwarded_for_is_logged_as_client_ip() {
    let (mut server, log) = server_with_memory_log();
    user_routes(&mut server);

    let request = Request::get("/user/7?b=2&a=1")
        .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    server.into_router().oneshot(request).await.unwrap();

    let lines = log.access_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("200|GET|/user/7|a=1&b=2|203.0.113.9|"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let config = parse_config("[dispatch]\nmax_body_bytes = 8").unwrap();
    let log = MemoryLogSink::new();
    let mut server = Server::from_config(&config).with_log_sink(log.clone());
    server.post("/echo", |ctx: &mut Context<'_>| {
        let body = ctx.body().clone();
        ctx.write(&body);
    });
    let app = server.into_router();

    let small = app
        .clone()
        .oneshot(Request::post("/echo").body(Body::from("tiny")).unwrap())
        .await
        .unwrap();
    assert_eq!(small.status(), StatusCode::OK);
    assert_eq!(body_string(small).await, "tiny");

    let large = app
        .oneshot(
            Request::post("/echo")
                .body(Body::from(vec![b'x'; 64]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(large.status(), StatusCode::PAYLOAD_TOO_LARGE);
    // Rejected before dispatch, so only the small request was logged.
    assert_eq!(log.access_entries().len(), 1);
}

#[tokio::test]
async fn test_handler_panic_becomes_server_error() {
    let (mut server, log) = server_with_memory_log();
    server.get("/boom", |_: &mut Context<'_>| panic!("handler failure"));

    let response = server
        .into_router()
        .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(log.access_entries().len(), 1);
    assert_eq!(log.access_entries()[0].status, 500);
}

#[tokio::test]
async fn test_handler_panic_in_debug_mode_logs_server_error() {
    let (mut server, log) = server_with_memory_log();
    server.set_debug(true);
    server.get("/boom", |_: &mut Context<'_>| panic!("handler failure"));

    let response = server
        .into_router()
        .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(log.access_entries()[0].status, 500);

    let debug_lines = log.debug_lines();
    let status_line = debug_lines
        .iter()
        .find(|l| l.starts_with("< HTTP/"))
        .unwrap();
    assert_eq!(status_line, "< HTTP/1.1 500 Internal Server Error");
}

#[tokio::test]
async fn test_slow_handler_times_out() {
    let config = parse_config("[timeouts]\nrequest_secs = 1").unwrap();
    let log = MemoryLogSink::new();
    let mut server = Server::from_config(&config).with_log_sink(log.clone());
    server.get("/slow", |ctx: &mut Context<'_>| {
        thread::sleep(Duration::from_millis(1500));
        ctx.write_str("late");
    });

    let response = server
        .into_router()
        .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

    // The chain keeps running on the blocking pool; its access line lands
    // once it returns.
    for _ in 0..50 {
        if !log.access_entries().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let entries = log.access_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, 408);
}
