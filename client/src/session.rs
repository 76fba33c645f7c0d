//! One long-lived subscription to a slice range.
//!
//! # Protocol
//!
//! 1. The init message (entity type, slice range, starting offset) is sent once,
//!    as the request body. Nothing else is ever sent on the session.
//! 2. The response is an unbounded SSE stream; each `data:` frame is one
//!    [`StreamOut`] message, full or filtered.
//! 3. The producer keeps pushing newly committed events after the backlog is
//!    exhausted. A response that ends is a failure ([`JournalError::StreamClosed`]).
//! 4. Any frame that is not a full or filtered event is a protocol violation
//!    and ends the session.
//!
//! Delivery order is the producer's order: non-decreasing timestamps, ascending
//! sequence numbers within a timestamp. Backtracking duplicates are passed
//! through untouched.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use reqwest::header::{ACCEPT, HeaderValue};
use slicefeed_types::Envelope;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{JournalError, Result};
use crate::materialize::EnvelopeMaterializer;
use crate::wire::{InitReq, StreamIn, StreamOut};
use crate::{drain_next_sse_event, ensure_success, extract_sse_data};

const EVENT_STREAM: &str = "text/event-stream";

/// Everything a session needs, moved into its reader task.
pub(crate) struct SessionParams<E> {
    pub client: reqwest::Client,
    pub url: Url,
    pub init: InitReq,
    pub materializer: EnvelopeMaterializer<E>,
    pub buffer_size: usize,
    pub max_frame_bytes: usize,
}

/// Handle to an open subscription.
///
/// Yields `Ok(envelope)` for as long as the subscription lives. It ends only
/// after yielding exactly one `Err`, or when the caller cancels it. Dropping
/// the handle cancels the session and releases its connection.
///
/// A finished stream cannot be resumed; subscribe again from the last
/// processed offset instead.
pub struct EnvelopeStream<E> {
    rx: mpsc::Receiver<Result<Envelope<E>>>,
    task: JoinHandle<()>,
}

impl<E> fmt::Debug for EnvelopeStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeStream")
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl<E: Send + 'static> EnvelopeStream<E> {
    /// Open a session. Must be called from within a tokio runtime.
    pub(crate) fn open(params: SessionParams<E>) -> Self {
        let (tx, rx) = mpsc::channel(params.buffer_size.max(1));
        let task = tokio::spawn(run_session(params, tx));
        Self { rx, task }
    }
}

impl<E> EnvelopeStream<E> {
    /// Next envelope; `None` once the session has ended.
    pub async fn next(&mut self) -> Option<Result<Envelope<E>>> {
        self.rx.recv().await
    }

    /// Stop delivery and release the connection. Buffered envelopes are discarded.
    pub fn cancel(self) {
        drop(self);
    }
}

impl<E> Stream for EnvelopeStream<E> {
    type Item = Result<Envelope<E>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl<E> Drop for EnvelopeStream<E> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_session<E: Send + 'static>(
    params: SessionParams<E>,
    tx: mpsc::Sender<Result<Envelope<E>>>,
) {
    let entity_type = params.init.entity_type.clone();
    match read_stream(params, &tx).await {
        Ok(()) => {
            tracing::debug!(%entity_type, "Subscriber dropped, session closed");
        }
        Err(e) => {
            tracing::warn!(%entity_type, error = %e, "Event stream terminated");
            let _ = tx.send(Err(e)).await;
        }
    }
}

/// Returns `Ok(())` only when the receiving side went away.
async fn read_stream<E: Send + 'static>(
    params: SessionParams<E>,
    tx: &mpsc::Sender<Result<Envelope<E>>>,
) -> Result<()> {
    use futures_util::StreamExt;

    let SessionParams {
        client,
        url,
        init,
        materializer,
        max_frame_bytes,
        ..
    } = params;

    tracing::info!(
        entity_type = %init.entity_type,
        slice_min = init.slice_min,
        slice_max = init.slice_max,
        has_offset = init.offset.is_some(),
        "Opening event stream"
    );

    let entity_type = init.entity_type.clone();
    let response = client
        .post(url)
        .header(ACCEPT, HeaderValue::from_static(EVENT_STREAM))
        .json(&StreamIn::Init(init))
        .send()
        .await?;
    let response = ensure_success(response).await?;

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut order = DeliveryOrder::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buffer.extend_from_slice(&chunk);

        while let Some(frame) = drain_next_sse_event(&mut buffer, max_frame_bytes)? {
            let Some(message) = decode_frame(&frame)? else {
                continue;
            };

            let envelope = match message {
                StreamOut::Event(event) => materializer.materialize_full(event, &entity_type)?,
                StreamOut::FilteredEvent(event) => {
                    materializer.materialize_filtered(event, &entity_type)?
                }
                StreamOut::Unknown => {
                    return Err(JournalError::protocol(
                        "unexpected stream message: neither event nor filtered event",
                    ));
                }
            };

            order.observe(&envelope);
            tracing::trace!(
                persistence_id = %envelope.persistence_id,
                seq_nr = envelope.seq_nr,
                timestamp = envelope.timestamp,
                filtered = envelope.filtered,
                "Delivering envelope"
            );

            if tx.send(Ok(envelope)).await.is_err() {
                return Ok(());
            }
        }
    }

    Err(JournalError::StreamClosed)
}

/// Parse one SSE frame. `Ok(None)` for frames without data (keep-alives).
pub(crate) fn decode_frame(frame: &[u8]) -> Result<Option<StreamOut>> {
    if frame.is_empty() {
        return Ok(None);
    }

    let text = std::str::from_utf8(frame)
        .map_err(|_| JournalError::protocol("received invalid UTF-8 from event stream"))?;

    let Some(data) = extract_sse_data(text) else {
        return Ok(None);
    };

    serde_json::from_str::<StreamOut>(&data)
        .map(Some)
        .map_err(|e| {
            tracing::warn!(%e, payload_bytes = data.len(), "Invalid stream payload");
            JournalError::protocol(format!("invalid stream payload: {e}"))
        })
}

/// Tracks the last delivered position to flag producer-side reordering.
#[derive(Debug, Default)]
struct DeliveryOrder {
    last_timestamp: Option<i64>,
}

impl DeliveryOrder {
    fn observe<E>(&mut self, envelope: &Envelope<E>) {
        if let Some(last) = self.last_timestamp
            && envelope.timestamp < last
        {
            tracing::debug!(
                persistence_id = %envelope.persistence_id,
                seq_nr = envelope.seq_nr,
                timestamp = envelope.timestamp,
                previous = last,
                "Envelope timestamp went backwards"
            );
        }
        self.last_timestamp = Some(envelope.timestamp);
    }
}
