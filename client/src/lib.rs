//! Event-producer client with slice-range subscriptions.
//!
//! # Architecture
//!
//! Leaves first:
//!
//! - [`offset_codec`] - domain [`Offset`](slicefeed_types::Offset) <-> [`wire::WireOffset`]
//! - [`materialize`] - wire events -> [`Envelope`](slicefeed_types::Envelope), payloads decoded through a [`PayloadRegistry`]
//! - [`session`] - one long-lived subscription per `(entity type, slice range, offset)`
//! - [`queries`] - timestamp lookup and full-event load
//! - [`journal`] - [`EventProducerJournal`], the public surface composing the above
//!
//! # Streaming
//!
//! A subscription is an [`EnvelopeStream`]: a handle that yields envelopes until the
//! caller drops it or until it yields one terminal [`JournalError`]. It never ends
//! just because the producer has caught up.
//!
//! Duplicates are normal. The producer re-delivers already-seen entries without
//! payload ("backtracking") to cover commit-time skew. Deduplicating by
//! `(persistence_id, seq_nr)` against the offset's seen set is the caller's job.
//!
//! # Error Handling
//!
//! Every failure terminates the affected operation and is surfaced to the caller.
//! Nothing here retries or reconnects; restart a subscription by calling
//! [`EventProducerJournal::subscribe`] again.

pub mod config;
pub mod error;
pub mod journal;
pub mod materialize;
pub mod offset_codec;
pub mod queries;
pub mod session;
pub mod wire;

use std::time::Duration;

pub use config::{ConfigError, JournalConfig, KeepAliveConfig};
pub use error::{JournalError, Result};
pub use journal::EventProducerJournal;
pub use materialize::{EnvelopeMaterializer, PayloadRegistry};
pub use queries::PointQueries;
pub use session::EnvelopeStream;

pub use slicefeed_types;
use url::Url;

/// Path of the streaming subscription, relative to the endpoint.
pub const EVENTS_PATH: &str = "event-producer/v1/events";
/// Path of the timestamp query.
pub const EVENT_TIMESTAMP_PATH: &str = "event-producer/v1/event-timestamp";
/// Path of the event load query.
pub const LOAD_EVENT_PATH: &str = "event-producer/v1/load-event";

const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Build the HTTP client shared by all sessions and queries of one journal.
pub fn http_client(config: &JournalConfig) -> Result<reqwest::Client> {
    let keep_alive = config.keep_alive;

    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(keep_alive.interval()))
        .http2_keep_alive_interval(Some(keep_alive.interval()))
        .http2_keep_alive_timeout(keep_alive.timeout())
        .http2_keep_alive_while_idle(true)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(config.header_map()?)
        .build()?;
    Ok(client)
}

/// Absolute URLs of the producer service operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub events: Url,
    pub event_timestamp: Url,
    pub load_event: Url,
}

impl ServiceEndpoints {
    pub fn from_config(config: &JournalConfig) -> Result<Self> {
        let mut base = config.endpoint_url()?;
        // Keep any path prefix of the endpoint when joining.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let join = |path: &str| {
            base.join(path).map_err(|e| {
                JournalError::Config(ConfigError::InvalidEndpoint {
                    endpoint: config.endpoint.clone(),
                    reason: e.to_string(),
                })
            })
        };

        Ok(Self {
            events: join(EVENTS_PATH)?,
            event_timestamp: join(EVENT_TIMESTAMP_PATH)?,
            load_event: join(LOAD_EVENT_PATH)?,
        })
    }
}

pub(crate) fn find_sse_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n");
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a <= b { (a, 2) } else { (b, 4) }),
        (Some(a), None) => Some((a, 2)),
        (None, Some(b)) => Some((b, 4)),
        (None, None) => None,
    }
}

/// Take the next complete frame off `buffer`.
///
/// A complete frame longer than `max_frame_bytes` is a protocol violation.
/// So is an unterminated remainder that has already outgrown the limit,
/// which keeps the buffer bounded by one limit plus one network chunk.
pub(crate) fn drain_next_sse_event(
    buffer: &mut Vec<u8>,
    max_frame_bytes: usize,
) -> Result<Option<Vec<u8>>> {
    let Some((pos, delim_len)) = find_sse_event_boundary(buffer) else {
        if buffer.len() > max_frame_bytes {
            return Err(frame_too_large(max_frame_bytes));
        }
        return Ok(None);
    };
    if pos > max_frame_bytes {
        return Err(frame_too_large(max_frame_bytes));
    }
    let event = buffer[..pos].to_vec();
    buffer.drain(..pos + delim_len);
    Ok(Some(event))
}

fn frame_too_large(max_frame_bytes: usize) -> JournalError {
    JournalError::protocol(format!(
        "SSE frame exceeded maximum size ({max_frame_bytes} bytes)"
    ))
}

/// Joined `data:` lines of one SSE event; `None` for comments and keep-alives.
pub(crate) fn extract_sse_data(event: &str) -> Option<String> {
    let mut data = String::new();
    let mut found = false;

    for line in event.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(mut rest) = line.strip_prefix("data:") {
            if let Some(stripped) = rest.strip_prefix(' ') {
                rest = stripped;
            }

            if found {
                data.push('\n');
            }
            data.push_str(rest);
            found = true;
        }
    }

    if found { Some(data) } else { None }
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Turn a non-2xx response into [`JournalError::Status`].
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = read_capped_error_body(response).await;
    Err(JournalError::Status { status, body })
}
