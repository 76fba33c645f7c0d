//! Wire event -> [`Envelope`] conversion.
//!
//! Payloads are decoded through a [`PayloadRegistry`] keyed by the payload's
//! type tag. Filtered events never touch the registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use slicefeed_types::{Envelope, EventSource, Offset};

use crate::error::{BoxError, JournalError, Result};
use crate::offset_codec;
use crate::wire::{Event, FilteredEvent, WirePayload};

type DecodeFn<E> = dyn Fn(&[u8]) -> Result<E, BoxError> + Send + Sync;
type FallbackFn<E> = dyn Fn(&str, &[u8]) -> Result<E, BoxError> + Send + Sync;

/// Type tag -> payload decoder.
pub struct PayloadRegistry<E> {
    decoders: HashMap<String, Arc<DecodeFn<E>>>,
    fallback: Option<Arc<FallbackFn<E>>>,
}

impl<E> Default for PayloadRegistry<E> {
    fn default() -> Self {
        Self {
            decoders: HashMap::new(),
            fallback: None,
        }
    }
}

impl<E> fmt::Debug for PayloadRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("PayloadRegistry")
            .field("type_tags", &tags)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl<E: 'static> PayloadRegistry<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for `type_tag`, replacing any previous one.
    #[must_use]
    pub fn with_decoder<F>(mut self, type_tag: impl Into<String>, decode: F) -> Self
    where
        F: Fn(&[u8]) -> Result<E, BoxError> + Send + Sync + 'static,
    {
        self.decoders.insert(type_tag.into(), Arc::new(decode));
        self
    }

    /// Register a serde-JSON payload type for `type_tag`.
    #[must_use]
    pub fn with_json<T>(self, type_tag: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Into<E> + 'static,
    {
        self.with_decoder(type_tag, |bytes| {
            let value: T = serde_json::from_slice(bytes)?;
            Ok(value.into())
        })
    }

    /// Decoder for tags with no registered decoder. Off unless set.
    #[must_use]
    pub fn with_fallback<F>(mut self, decode: F) -> Self
    where
        F: Fn(&str, &[u8]) -> Result<E, BoxError> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(decode));
        self
    }

    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.decoders.contains_key(type_tag)
    }

    pub fn decode(&self, type_tag: &str, bytes: &[u8]) -> Result<E> {
        let decoded = match (self.decoders.get(type_tag), &self.fallback) {
            (Some(decode), _) => decode(bytes),
            (None, Some(fallback)) => fallback(type_tag, bytes),
            (None, None) => {
                return Err(JournalError::UnknownPayloadType {
                    type_tag: type_tag.to_string(),
                });
            }
        };
        decoded.map_err(|source| JournalError::PayloadDecode {
            type_tag: type_tag.to_string(),
            source,
        })
    }
}

/// Builds envelopes from wire events.
pub struct EnvelopeMaterializer<E> {
    registry: Arc<PayloadRegistry<E>>,
}

impl<E> Clone for EnvelopeMaterializer<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> fmt::Debug for EnvelopeMaterializer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeMaterializer")
            .field("registry", &self.registry)
            .finish()
    }
}

impl<E: 'static> EnvelopeMaterializer<E> {
    #[must_use]
    pub fn new(registry: Arc<PayloadRegistry<E>>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &PayloadRegistry<E> {
        &self.registry
    }

    pub fn materialize_full(&self, event: Event, entity_type: &str) -> Result<Envelope<E>> {
        let offset = offset_codec::timestamp_offset_from_wire(&event.offset)?;
        let bytes = payload_bytes(&event.payload)?;
        let payload = self.registry.decode(&event.payload.type_url, &bytes)?;

        Ok(Envelope::full(
            Offset::Timestamp(offset.clone()),
            event.persistence_id,
            event.seq_nr,
            payload,
            offset.epoch_millis(),
            entity_type.to_string(),
            event.slice,
            EventSource::from_wire(&event.source),
            event.tags,
        ))
    }

    pub fn materialize_filtered(
        &self,
        event: FilteredEvent,
        entity_type: &str,
    ) -> Result<Envelope<E>> {
        let offset = offset_codec::timestamp_offset_from_wire(&event.offset)?;
        let timestamp = offset.epoch_millis();

        Ok(Envelope::filtered(
            Offset::Timestamp(offset),
            event.persistence_id,
            event.seq_nr,
            timestamp,
            entity_type.to_string(),
            event.slice,
            EventSource::from_wire(&event.source),
        ))
    }
}

fn payload_bytes(payload: &WirePayload) -> Result<Vec<u8>> {
    STANDARD.decode(payload.value.as_bytes()).map_err(|e| {
        JournalError::protocol(format!(
            "payload of type `{}` is not valid base64: {e}",
            payload.type_url
        ))
    })
}
