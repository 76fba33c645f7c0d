//! [`EventProducerJournal`], the public surface of the client.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use slicefeed_types::{Envelope, Offset, Timestamp, is_valid_slice_range, slice_for, slice_ranges};

use crate::config::JournalConfig;
use crate::error::{JournalError, Result};
use crate::materialize::{EnvelopeMaterializer, PayloadRegistry};
use crate::queries::PointQueries;
use crate::session::{EnvelopeStream, SessionParams};
use crate::wire::InitReq;
use crate::{ServiceEndpoints, http_client, offset_codec};

/// Read journal backed by a remote event producer.
///
/// Owns the HTTP client, the endpoint URLs and the payload registry; every
/// subscription and query reads them, none mutates them.
///
/// ```no_run
/// use slicefeed_client::{EventProducerJournal, JournalConfig, PayloadRegistry};
/// use slicefeed_client::slicefeed_types::Offset;
///
/// # async fn run() -> slicefeed_client::Result<()> {
/// let registry = PayloadRegistry::<serde_json::Value>::new()
///     .with_json::<serde_json::Value>("shop.OrderPlaced");
/// let journal = EventProducerJournal::new(&JournalConfig::new("http://127.0.0.1:8101"), registry)?;
///
/// let mut stream = journal.subscribe("Order", 0, 1023, &Offset::NoOffset)?;
/// while let Some(envelope) = stream.next().await {
///     let envelope = envelope?;
///     println!("{} #{}", envelope.persistence_id, envelope.seq_nr);
/// }
/// # Ok(())
/// # }
/// ```
pub struct EventProducerJournal<E> {
    client: reqwest::Client,
    endpoints: ServiceEndpoints,
    materializer: EnvelopeMaterializer<E>,
    queries: PointQueries<E>,
    buffer_size: usize,
    max_frame_bytes: usize,
}

impl<E> fmt::Debug for EventProducerJournal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventProducerJournal")
            .field("endpoints", &self.endpoints)
            .field("materializer", &self.materializer)
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

impl<E: Send + 'static> EventProducerJournal<E> {
    pub fn new(config: &JournalConfig, registry: PayloadRegistry<E>) -> Result<Self> {
        let client = http_client(config)?;
        let endpoints = ServiceEndpoints::from_config(config)?;
        let materializer = EnvelopeMaterializer::new(Arc::new(registry));
        let queries = PointQueries::new(
            client.clone(),
            &endpoints,
            config.request_timeout(),
            materializer.clone(),
        );

        Ok(Self {
            client,
            endpoints,
            materializer,
            queries,
            buffer_size: config.buffer_size,
            max_frame_bytes: config.max_frame_bytes,
        })
    }

    /// Slice of an entity identifier.
    #[must_use]
    pub fn slice_for(&self, persistence_id: &str) -> i32 {
        slice_for(persistence_id)
    }

    /// `count` contiguous ranges covering every slice; `count` must divide 1024.
    pub fn slice_ranges(&self, count: usize) -> Result<Vec<RangeInclusive<i32>>> {
        Ok(slice_ranges(count)?)
    }

    /// Subscribe to `entity_type` events in `min_slice..=max_slice`, starting after `offset`.
    ///
    /// The offset kind and slice range are checked before anything is sent;
    /// connection failures arrive as the stream's terminal error. Must be called
    /// from within a tokio runtime.
    pub fn subscribe(
        &self,
        entity_type: &str,
        min_slice: i32,
        max_slice: i32,
        offset: &Offset,
    ) -> Result<EnvelopeStream<E>> {
        let offset = offset_codec::to_wire(offset)?;
        if !is_valid_slice_range(min_slice, max_slice) {
            return Err(JournalError::InvalidSliceRange {
                min: min_slice,
                max: max_slice,
            });
        }

        let init = InitReq {
            entity_type: entity_type.to_string(),
            slice_min: min_slice,
            slice_max: max_slice,
            offset,
        };

        Ok(EnvelopeStream::open(SessionParams {
            client: self.client.clone(),
            url: self.endpoints.events.clone(),
            init,
            materializer: self.materializer.clone(),
            buffer_size: self.buffer_size,
            max_frame_bytes: self.max_frame_bytes,
        }))
    }

    pub async fn timestamp_of(&self, persistence_id: &str, seq_nr: i64) -> Result<Option<Timestamp>> {
        self.queries.timestamp_of(persistence_id, seq_nr).await
    }

    pub async fn load_envelope(&self, persistence_id: &str, seq_nr: i64) -> Result<Envelope<E>> {
        self.queries.load_envelope(persistence_id, seq_nr).await
    }

    #[must_use]
    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }
}
