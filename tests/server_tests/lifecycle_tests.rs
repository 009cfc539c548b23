//! Live server tests
//!
//! These tests verify:
//! - Startup failures are reported before serving
//! - The full request cycle over a socket
//! - Draining: in-flight requests finish, the grace period is enforced
//! - Storage is closed on shutdown and data survives a restart

use std::time::{Duration, Instant};

use httpkv::{KvError, Phase, Server};
use reqwest::StatusCode;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use super::{test_config, SECRET};

// =============================================================================
// Helpers
// =============================================================================

struct Running {
    base: String,
    addr: std::net::SocketAddr,
    phase: tokio::sync::watch::Receiver<Phase>,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<httpkv::Result<()>>,
}

async fn spawn_server(data_dir: &std::path::Path, grace: Duration) -> Running {
    let server = Server::start(test_config(data_dir, grace)).await.unwrap();
    let addr = server.local_addr().unwrap();
    let phase = server.phase();
    assert_eq!(*phase.borrow(), Phase::Starting);

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run(async move {
        let _ = stopped.await;
    }));

    Running {
        base: format!("http://{}", addr),
        addr,
        phase,
        stop,
        task,
    }
}

/// Open a PUT whose body has not been fully sent yet
async fn start_partial_put(addr: std::net::SocketAddr, key: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let head = format!(
        "PUT /api/{}/{} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 6\r\n\r\nabc",
        SECRET, key
    );
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.flush().await.unwrap();
    // Give the server time to route the request into the handler
    tokio::time::sleep(Duration::from_millis(200)).await;
    stream
}

// =============================================================================
// Startup Tests
// =============================================================================

#[tokio::test]
async fn test_start_without_secret_fails() {
    let temp = TempDir::new().unwrap();
    let config = httpkv::Config::builder()
        .data_dir(temp.path())
        .listen_addr("127.0.0.1:0")
        .build();

    let result = Server::start(config).await;

    assert!(matches!(result, Err(KvError::Config(_))));
}

#[tokio::test]
async fn test_start_with_bad_address_fails() {
    let temp = TempDir::new().unwrap();
    let config = httpkv::Config::builder()
        .data_dir(temp.path())
        .listen_addr("not an address")
        .auth_key(SECRET)
        .build();

    assert!(Server::start(config).await.is_err());
}

// =============================================================================
// Request Cycle Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end() {
    let temp = TempDir::new().unwrap();
    let running = spawn_server(temp.path(), Duration::from_secs(5)).await;
    let client = reqwest::Client::new();

    let put = client
        .put(format!("{}/api/{}/foo", running.base, SECRET))
        .body("bar")
        .send()
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::OK);

    let get = client
        .get(format!("{}/api/{}/foo", running.base, SECRET))
        .send()
        .await
        .unwrap();
    assert_eq!(get.status(), StatusCode::OK);
    assert_eq!(get.bytes().await.unwrap().as_ref(), b"bar");

    let wrong = client
        .get(format!("{}/api/wrong/foo", running.base))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let missing = client
        .get(format!("{}/api/{}/nope", running.base, SECRET))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    assert_eq!(*running.phase.borrow(), Phase::Serving);

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
    assert_eq!(*running.phase.borrow(), Phase::Stopped);

    // Restart over the same directory
    let running = spawn_server(temp.path(), Duration::from_secs(5)).await;
    let get = client
        .get(format!("{}/api/{}/foo", running.base, SECRET))
        .send()
        .await
        .unwrap();
    assert_eq!(get.bytes().await.unwrap().as_ref(), b"bar");

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_idle_shutdown_is_prompt() {
    let temp = TempDir::new().unwrap();
    let running = spawn_server(temp.path(), Duration::from_secs(30)).await;

    let started = Instant::now();
    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(*running.phase.borrow(), Phase::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_in_flight_request_completes_during_drain() {
    let temp = TempDir::new().unwrap();
    let mut running = spawn_server(temp.path(), Duration::from_secs(5)).await;

    let mut stream = start_partial_put(running.addr, "late").await;

    running.stop.send(()).unwrap();
    running
        .phase
        .wait_for(|phase| *phase == Phase::Draining)
        .await
        .unwrap();

    // Finish the body while draining
    stream.write_all(b"def").await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 200"), "got: {}", response);

    running.task.await.unwrap().unwrap();

    let running = spawn_server(temp.path(), Duration::from_secs(5)).await;
    let value = reqwest::get(format!("{}/api/{}/late", running.base, SECRET))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(value.as_ref(), b"abcdef");
    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_grace_period_bounds_shutdown() {
    let temp = TempDir::new().unwrap();
    let grace = Duration::from_millis(300);
    let running = spawn_server(temp.path(), grace).await;

    // Never finished: the server must not wait for it forever
    let _stalled = start_partial_put(running.addr, "stalled").await;

    let started = Instant::now();
    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();

    assert!(started.elapsed() >= grace);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(*running.phase.borrow(), Phase::Stopped);

    // The abandoned write was never acknowledged, so it is not stored
    let running = spawn_server(temp.path(), grace).await;
    let missing = reqwest::get(format!("{}/api/{}/stalled", running.base, SECRET))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}
