//! Shared test utilities and fixtures
//!
//! A mock event producer plus builders for the JSON frames it serves.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use slicefeed_client::{EventProducerJournal, JournalConfig, PayloadRegistry};

pub const EVENTS: &str = "/event-producer/v1/events";
pub const EVENT_TIMESTAMP: &str = "/event-producer/v1/event-timestamp";
pub const LOAD_EVENT: &str = "/event-producer/v1/load-event";

pub const ORDER_PLACED: &str = "shop.OrderPlaced";

/// 2023-11-14T22:13:20Z
pub const T0_SECONDS: i64 = 1_700_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub item: String,
}

pub fn registry() -> PayloadRegistry<OrderPlaced> {
    PayloadRegistry::new().with_json::<OrderPlaced>(ORDER_PLACED)
}

/// Registry whose payloads are the raw bytes.
pub fn raw_registry() -> PayloadRegistry<Vec<u8>> {
    PayloadRegistry::new().with_fallback(|_, bytes| Ok(bytes.to_vec()))
}

pub fn journal<E: Send + 'static>(
    server: &MockServer,
    registry: PayloadRegistry<E>,
) -> EventProducerJournal<E> {
    EventProducerJournal::new(&JournalConfig::new(server.uri()), registry)
        .expect("journal builds against mock server")
}

pub fn wire_offset(seconds: i64, nanos: i32, seen: &[(&str, i64)]) -> Value {
    let seen: Vec<Value> = seen
        .iter()
        .map(|(pid, seq_nr)| json!({ "persistence_id": pid, "seq_nr": seq_nr }))
        .collect();
    json!({ "timestamp": { "seconds": seconds, "nanos": nanos }, "seen": seen })
}

/// A full event frame. `payload` is base64-encoded here.
pub fn event_frame(
    persistence_id: &str,
    seq_nr: i64,
    slice: i32,
    offset: Value,
    type_url: &str,
    payload: &[u8],
) -> Value {
    json!({
        "type": "event",
        "persistence_id": persistence_id,
        "seq_nr": seq_nr,
        "slice": slice,
        "offset": offset,
        "payload": { "type_url": type_url, "value": STANDARD.encode(payload) },
        "source": "",
    })
}

pub fn filtered_frame(
    persistence_id: &str,
    seq_nr: i64,
    slice: i32,
    offset: Value,
    source: &str,
) -> Value {
    json!({
        "type": "filtered_event",
        "persistence_id": persistence_id,
        "seq_nr": seq_nr,
        "slice": slice,
        "offset": offset,
        "source": source,
    })
}

pub fn order_frame(persistence_id: &str, seq_nr: i64, seconds: i64, item: &str) -> Value {
    let payload = serde_json::to_vec(&json!({ "item": item })).expect("serialize payload");
    event_frame(
        persistence_id,
        seq_nr,
        slicefeed_types::slice_for(persistence_id),
        wire_offset(seconds, 0, &[(persistence_id, seq_nr)]),
        ORDER_PLACED,
        &payload,
    )
}

pub fn sse_body(frames: &[Value]) -> String {
    let mut body = String::new();
    for frame in frames {
        body.push_str(&format!("data: {frame}\n\n"));
    }
    body
}

/// Mount an event stream that serves `frames` and then ends.
pub async fn mount_event_stream(server: &MockServer, frames: &[Value]) {
    Mock::given(method("POST"))
        .and(path(EVENTS))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sse_body(frames))
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(server)
        .await;
}

pub async fn mount_timestamp(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path(EVENT_TIMESTAMP))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_load(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path(LOAD_EVENT))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// A producer that serves `frames` and then keeps the response open.
///
/// Wiremock bodies always end, so this speaks HTTP/1.1 over a raw socket.
/// The receiver resolves once the client closes the connection.
pub async fn start_open_producer(frames: &[Value]) -> (String, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind producer");
    let addr = listener.local_addr().expect("producer address");
    let body = sse_body(frames);
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };

        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&chunk[..n]),
            }
        }

        // No content-length: the body runs until the connection closes.
        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncache-control: no-cache\r\n\r\n";
        if socket.write_all(head.as_bytes()).await.is_err()
            || socket.write_all(body.as_bytes()).await.is_err()
            || socket.flush().await.is_err()
        {
            return;
        }

        loop {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = closed_tx.send(());
    });

    (format!("http://{addr}"), closed_rx)
}
