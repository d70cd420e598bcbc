use super::*;
use crate::channel::{ChannelError, ConnectionState};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

fn bind(name: &str) -> (tempfile::TempDir, PathBuf, UnixListener) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    let listener = UnixListener::bind(&path).unwrap();
    (dir, path, listener)
}

#[derive(serde::Deserialize)]
struct Request {
    command: Vec<String>,
    request_id: u64,
}

async fn read_request<R: tokio::io::AsyncBufRead + Unpin>(reader: &mut R) -> Option<Request> {
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => serde_json::from_str(line.trim_end()).ok(),
    }
}

#[tokio::test]
async fn test_open_missing_endpoint_is_connect_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = PlayerChannel::open(&dir.path().join("nope")).await;
    assert!(matches!(result, Err(ChannelError::Connect(_))));
}

#[tokio::test]
async fn test_get_property_skips_events_and_correlates() {
    let (_dir, path, listener) = bind("mpv.sock");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let req = read_request(&mut reader).await.unwrap();
        assert_eq!(req.command, vec!["get_property", "pause"]);
        // Interleave an event line and a foreign reply before the real one.
        write_half
            .write_all(b"{\"event\":\"property-change\"}\n")
            .await
            .unwrap();
        write_half
            .write_all(b"{\"request_id\":9999,\"error\":\"success\",\"data\":true}\n")
            .await
            .unwrap();
        let reply = format!(
            "{{\"request_id\":{},\"error\":\"success\",\"data\":false}}\n",
            req.request_id
        );
        write_half.write_all(reply.as_bytes()).await.unwrap();
    });

    let mut player = PlayerChannel::open(&path).await.unwrap();
    let value = player.get_property("pause").await.unwrap();
    assert_eq!(value, PropertyValue::Boolean(false));
    assert_eq!(player.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_unavailable_property_reads_as_absent() {
    let (_dir, path, listener) = bind("mpv.sock");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let req = read_request(&mut reader).await.unwrap();
        let reply = format!(
            "{{\"request_id\":{},\"error\":\"property unavailable\"}}\n",
            req.request_id
        );
        write_half.write_all(reply.as_bytes()).await.unwrap();
    });

    let mut player = PlayerChannel::open(&path).await.unwrap();
    let value = player.get_property("metadata/by-key/Artist").await.unwrap();
    assert_eq!(value, PropertyValue::Absent);
}

#[tokio::test]
async fn test_peer_close_latches_and_fails_fast() {
    let (_dir, path, listener) = bind("mpv.sock");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let mut player = PlayerChannel::open(&path).await.unwrap();
    let err = player.get_property("pause").await.unwrap_err();
    assert!(err.is_disconnect(), "expected disconnect, got {err}");
    assert!(player.is_closed());

    // Latched: same error again, no transport involved.
    let again = player.get_property("pause").await.unwrap_err();
    assert_eq!(again, err);
    let string_call = player.get_property_string("path").await.unwrap_err();
    assert_eq!(string_call, err);
}

#[tokio::test]
async fn test_fetch_snapshot_collects_typed_and_string_values() {
    let (_dir, path, listener) = bind("mpv.sock");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        while let Some(req) = read_request(&mut reader).await {
            let name = req.command[1].as_str();
            let data = match name {
                "media-title" => serde_json::json!("Test Song"),
                "pause" => serde_json::json!(false),
                "duration" => serde_json::json!(200.0),
                "time-pos" => serde_json::json!(50.0),
                "loop-file" => serde_json::json!("no"),
                _ => {
                    let reply = format!(
                        "{{\"request_id\":{},\"error\":\"property unavailable\"}}\n",
                        req.request_id
                    );
                    write_half.write_all(reply.as_bytes()).await.unwrap();
                    continue;
                }
            };
            let reply = serde_json::json!({
                "request_id": req.request_id,
                "error": "success",
                "data": data,
            });
            let mut line = serde_json::to_vec(&reply).unwrap();
            line.push(b'\n');
            write_half.write_all(&line).await.unwrap();
        }
    });

    let mut player = PlayerChannel::open(&path).await.unwrap();
    let snapshot = player.fetch_snapshot().await.unwrap();
    assert_eq!(snapshot.string("media-title"), Some("Test Song"));
    assert_eq!(*snapshot.get("pause"), PropertyValue::Boolean(false));
    assert_eq!(*snapshot.get("duration"), PropertyValue::Number(200.0));
    assert_eq!(*snapshot.get("time-pos"), PropertyValue::Number(50.0));
    assert_eq!(snapshot.string("loop-file"), Some("no"));
    assert_eq!(*snapshot.get("metadata/by-key/Artist"), PropertyValue::Absent);
    // Unknown names read as absent too.
    assert_eq!(*snapshot.get("no-such-property"), PropertyValue::Absent);
}
