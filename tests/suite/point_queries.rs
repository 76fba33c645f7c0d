//! Timestamp lookups and single-event loads.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use slicefeed_client::{EventProducerJournal, JournalConfig, JournalError};
use slicefeed_types::{EnvelopeMetadata, EventSource, Offset};

use crate::common::{
    EVENT_TIMESTAMP, LOAD_EVENT, OrderPlaced, T0_SECONDS, filtered_frame, journal, mount_event_stream,
    mount_load, mount_timestamp, order_frame, registry, wire_offset,
};

#[tokio::test]
async fn timestamp_of_known_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENT_TIMESTAMP))
        .and(body_json(json!({ "persistence_id": "Order|abc", "seq_nr": 3 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "timestamp": { "seconds": T0_SECONDS, "nanos": 5_000_000 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let journal = journal(&server, registry());
    let timestamp = journal.timestamp_of("Order|abc", 3).await.unwrap().unwrap();
    assert_eq!(timestamp.timestamp_millis(), T0_SECONDS * 1000 + 5);
}

#[tokio::test]
async fn timestamp_of_unknown_event_is_none() {
    let server = MockServer::start().await;
    mount_timestamp(&server, json!({ "timestamp": null })).await;

    let journal = journal(&server, registry());
    assert_eq!(journal.timestamp_of("Order|nope", 1).await.unwrap(), None);
}

#[tokio::test]
async fn timestamp_with_missing_field_is_none() {
    let server = MockServer::start().await;
    mount_timestamp(&server, json!({})).await;

    let journal = journal(&server, registry());
    assert_eq!(journal.timestamp_of("Order|nope", 1).await.unwrap(), None);
}

#[tokio::test]
async fn malformed_timestamp_is_protocol_violation() {
    let server = MockServer::start().await;
    mount_timestamp(
        &server,
        json!({ "timestamp": { "seconds": T0_SECONDS, "nanos": -1 } }),
    )
    .await;

    let journal = journal(&server, registry());
    let err = journal.timestamp_of("Order|abc", 1).await.unwrap_err();
    assert!(err.is_protocol_violation(), "got {err:?}");
}

#[tokio::test]
async fn load_full_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOAD_EVENT))
        .and(body_json(json!({ "persistence_id": "Order|abc", "seq_nr": 2 })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(order_frame("Order|abc", 2, T0_SECONDS, "book")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let journal = journal(&server, registry());
    let envelope = journal.load_envelope("Order|abc", 2).await.unwrap();

    assert_eq!(
        envelope.event,
        Some(OrderPlaced {
            item: "book".to_string()
        })
    );
    assert_eq!(envelope.entity_type, "Order");
    assert_eq!(envelope.seq_nr, 2);
    assert_eq!(envelope.slice, slicefeed_types::slice_for("Order|abc"));
    assert_eq!(envelope.metadata, None);
    assert!(!envelope.filtered);
}

#[tokio::test]
async fn filtered_load_matches_streamed_filtered_event() {
    let server = MockServer::start().await;
    let frame = filtered_frame(
        "Order|abc",
        1,
        5,
        wire_offset(T0_SECONDS, 0, &[("Order|abc", 1)]),
        "BT",
    );
    mount_load(&server, frame.clone()).await;
    mount_event_stream(&server, &[frame]).await;

    let journal = journal(&server, registry());
    let loaded = journal.load_envelope("Order|abc", 1).await.unwrap();

    let mut stream = journal
        .subscribe("Order", 0, 1023, &Offset::NoOffset)
        .unwrap();
    let streamed = stream.next().await.unwrap().unwrap();

    assert_eq!(loaded, streamed);
    assert_eq!(loaded.event, None);
    assert_eq!(loaded.metadata, Some(EnvelopeMetadata::SkipProcessing));
    assert_eq!(loaded.source, EventSource::Backtracking);
}

#[tokio::test]
async fn unexpected_load_response_is_protocol_violation() {
    let server = MockServer::start().await;
    mount_load(&server, json!({ "type": "tombstone" })).await;

    let journal = journal(&server, registry());
    let err = journal.load_envelope("Order|abc", 1).await.unwrap_err();
    assert!(err.is_protocol_violation(), "got {err:?}");
}

#[tokio::test]
async fn non_json_response_is_protocol_violation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOAD_EVENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let journal = journal(&server, registry());
    let err = journal.load_envelope("Order|abc", 1).await.unwrap_err();
    assert!(err.is_protocol_violation(), "got {err:?}");
}

#[tokio::test]
async fn load_failure_status_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOAD_EVENT))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such event"))
        .mount(&server)
        .await;

    let journal = journal(&server, registry());
    match journal.load_envelope("Order|abc", 9).await {
        Err(JournalError::Status { status, body }) => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, "no such event");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn request_timeout_applies_to_queries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENT_TIMESTAMP))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "timestamp": null }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = JournalConfig::new(server.uri()).with_request_timeout(Duration::from_millis(500));
    let journal = EventProducerJournal::new(&config, registry()).unwrap();
    let err = journal.timestamp_of("Order|abc", 1).await.unwrap_err();
    assert!(matches!(err, JournalError::Transport(ref e) if e.is_timeout()), "got {err:?}");
}
