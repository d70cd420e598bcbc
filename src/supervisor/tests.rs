use super::*;
use crate::presence::{wire, PresenceChannel};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;

const RETRY: Duration = Duration::from_millis(10);

/// Accepts handshakes forever, counting them, holding connections open.
fn spawn_presence_host(listener: UnixListener, accepted: Arc<AtomicUsize>) {
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            accepted.fetch_add(1, Ordering::SeqCst);
            if wire::read_frame(&mut stream).await.is_ok() {
                let ready = serde_json::json!({"cmd": "DISPATCH", "evt": "READY"});
                let _ = wire::write_frame(&mut stream, wire::OP_FRAME, &ready).await;
            }
            held.push(stream);
        }
    });
}

async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

fn pipe_path() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("discord-ipc-0");
    (dir, path)
}

#[tokio::test]
async fn test_retries_until_endpoint_accepts_then_stops() {
    let (_dir, path) = pipe_path();
    let presence = Arc::new(PresenceChannel::with_endpoint("123456", &path));
    let supervisor = Arc::new(ConnectionSupervisor::new(Arc::clone(&presence), RETRY));

    // Nobody is listening yet; the loop must keep trying.
    supervisor.spawn_retry();
    tokio::time::sleep(RETRY * 5).await;
    assert!(!presence.is_connected());

    let accepted = Arc::new(AtomicUsize::new(0));
    let listener = UnixListener::bind(&path).unwrap();
    spawn_presence_host(listener, Arc::clone(&accepted));

    wait_until("presence to connect", || presence.is_connected()).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    // Connected exactly once: no further attempts while the link is up.
    tokio::time::sleep(RETRY * 10).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reconnect_after_disconnect_connects_again() {
    let (_dir, path) = pipe_path();
    let presence = Arc::new(PresenceChannel::with_endpoint("123456", &path));
    let supervisor = Arc::new(ConnectionSupervisor::new(Arc::clone(&presence), RETRY));

    let accepted = Arc::new(AtomicUsize::new(0));
    let listener = UnixListener::bind(&path).unwrap();
    spawn_presence_host(listener, Arc::clone(&accepted));

    supervisor.spawn_retry();
    wait_until("first connect", || presence.is_connected()).await;

    // Simulate a dropped peer and a fresh retry cycle.
    presence.close().await;
    supervisor.spawn_retry();
    wait_until("second connect", || presence.is_connected()).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_superseded_retry_loop_does_not_reconnect() {
    let (_dir, path) = pipe_path();
    let presence = Arc::new(PresenceChannel::with_endpoint("123456", &path));
    let supervisor = Arc::new(ConnectionSupervisor::new(Arc::clone(&presence), RETRY));

    // Two spawns back to back: only the second generation may act, so a
    // single host accept is expected once the endpoint comes up.
    supervisor.spawn_retry();
    supervisor.spawn_retry();

    let accepted = Arc::new(AtomicUsize::new(0));
    let listener = UnixListener::bind(&path).unwrap();
    spawn_presence_host(listener, Arc::clone(&accepted));

    wait_until("presence to connect", || presence.is_connected()).await;
    tokio::time::sleep(RETRY * 10).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_stops_retrying() {
    let (_dir, path) = pipe_path();
    let presence = Arc::new(PresenceChannel::with_endpoint("123456", &path));
    let supervisor = Arc::new(ConnectionSupervisor::new(Arc::clone(&presence), RETRY));

    supervisor.spawn_retry();
    supervisor.shutdown().await.unwrap();
    assert!(supervisor.is_stopped());
    assert!(presence.is_closed());

    // The endpoint coming up afterwards must not be touched.
    let accepted = Arc::new(AtomicUsize::new(0));
    let listener = UnixListener::bind(&path).unwrap();
    spawn_presence_host(listener, Arc::clone(&accepted));
    tokio::time::sleep(RETRY * 10).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 0);
    assert!(!presence.is_connected());
}
