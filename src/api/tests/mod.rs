use super::*;
use crate::poller::test_helpers::{RecordingProcessor, create_test_poller, test_config};
use crate::session::test_helpers::MemoryRemote;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tower::ServiceExt;


/// Poller over an in-memory remote with `/out` present
fn create_test_app(configure: impl FnOnce(&mut crate::Config)) -> (SftpPoller, MemoryRemote, TempDir) {
    let dir = tempdir().unwrap();
    let remote = MemoryRemote::new();
    remote.add_dir("/out");

    let mut config = test_config(dir.path());
    configure(&mut config);
    let poller = create_test_poller(&remote, config, RecordingProcessor::new());
    (poller, remote, dir)
}

async fn send(poller: &SftpPoller, method: &str, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    create_router(poller.clone()).oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn api_server_serves_until_poller_shuts_down() {
    let (poller, _remote, _dir) = create_test_app(|config| {
        config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    });

    let handle = poller.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());

    poller.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server must stop after shutdown")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn api_server_stops_while_an_event_client_is_connected() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (poller, _remote, _dir) = create_test_app(|_| {});
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let handle = tokio::spawn(serve_api(listener, poller.clone()));

    let mut client = tokio::net::TcpStream::connect(address).await.unwrap();
    client
        .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut head = [0u8; 15];
    client.read_exact(&mut head).await.unwrap();
    assert_eq!(&head, b"HTTP/1.1 200 OK");

    poller.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server must stop with an open event stream")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn swagger_ui_is_mounted_only_when_enabled() {
    let (poller, _remote, _dir) = create_test_app(|_| {});
    let response = send(&poller, "GET", "/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (poller, _remote, _dir) = create_test_app(|config| config.api.swagger_ui = true);
    let response = send(&poller, "GET", "/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);
}
