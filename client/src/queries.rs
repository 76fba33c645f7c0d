//! Unary lookups that fill in what backtracking leaves out.
//!
//! Both queries are independent of any open session and of each other; a load
//! may race ahead of or behind the same event arriving on a stream.

use std::fmt;
use std::time::Duration;

use slicefeed_types::{Envelope, Timestamp, entity_type_of};
use url::Url;

use crate::error::{JournalError, Result};
use crate::materialize::EnvelopeMaterializer;
use crate::offset_codec::timestamp_from_wire;
use crate::wire::{
    EventTimestampRequest, EventTimestampResponse, LoadEventRequest, LoadEventResponse,
};
use crate::{ServiceEndpoints, ensure_success};

pub struct PointQueries<E> {
    client: reqwest::Client,
    timestamp_url: Url,
    load_url: Url,
    timeout: Option<Duration>,
    materializer: EnvelopeMaterializer<E>,
}

impl<E> fmt::Debug for PointQueries<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointQueries")
            .field("timestamp_url", &self.timestamp_url.as_str())
            .field("load_url", &self.load_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<E: 'static> PointQueries<E> {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        endpoints: &ServiceEndpoints,
        timeout: Option<Duration>,
        materializer: EnvelopeMaterializer<E>,
    ) -> Self {
        Self {
            client,
            timestamp_url: endpoints.event_timestamp.clone(),
            load_url: endpoints.load_event.clone(),
            timeout,
            materializer,
        }
    }

    /// Commit timestamp of one event, `None` if the producer has no record of it.
    pub async fn timestamp_of(&self, persistence_id: &str, seq_nr: i64) -> Result<Option<Timestamp>> {
        let request = EventTimestampRequest {
            persistence_id: persistence_id.to_string(),
            seq_nr,
        };
        let response: EventTimestampResponse = self.call(&self.timestamp_url, &request).await?;

        match response.timestamp {
            Some(timestamp) => Ok(Some(timestamp_from_wire(timestamp)?)),
            None => {
                tracing::debug!(%persistence_id, seq_nr, "No timestamp recorded for event");
                Ok(None)
            }
        }
    }

    /// Load one event by id.
    ///
    /// The producer may answer with a filtered event; it is materialized exactly
    /// like a filtered event from a stream.
    pub async fn load_envelope(&self, persistence_id: &str, seq_nr: i64) -> Result<Envelope<E>> {
        let request = LoadEventRequest {
            persistence_id: persistence_id.to_string(),
            seq_nr,
        };
        let response: LoadEventResponse = self.call(&self.load_url, &request).await?;
        let entity_type = entity_type_of(persistence_id);

        match response {
            LoadEventResponse::Event(event) => self.materializer.materialize_full(event, entity_type),
            LoadEventResponse::FilteredEvent(event) => {
                tracing::debug!(%persistence_id, seq_nr, "Load returned a filtered event");
                self.materializer.materialize_filtered(event, entity_type)
            }
            LoadEventResponse::Unknown => Err(JournalError::protocol(format!(
                "unexpected load response for {persistence_id} seq_nr {seq_nr}"
            ))),
        }
    }

    async fn call<Req, Resp>(&self, url: &Url, request: &Req) -> Result<Resp>
    where
        Req: serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let mut builder = self.client.post(url.clone()).json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = ensure_success(builder.send().await?).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| JournalError::protocol(format!("invalid response from {url}: {e}")))
    }
}
