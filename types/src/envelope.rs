//! The unified, domain-facing view of a delivered event.

use serde::{Deserialize, Serialize};

use crate::offset::Offset;

/// How the producer came to deliver an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Regular delivery (empty marker on the wire).
    #[default]
    Query,
    /// Re-delivery of an already-seen entry (`"BT"`).
    Backtracking,
    /// Low-latency fan-out delivery (`"PS"`).
    PubSub,
    Other(String),
}

impl EventSource {
    #[must_use]
    pub fn from_wire(marker: &str) -> Self {
        match marker {
            "" => Self::Query,
            "BT" => Self::Backtracking,
            "PS" => Self::PubSub,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Query => "",
            Self::Backtracking => "BT",
            Self::PubSub => "PS",
            Self::Other(marker) => marker,
        }
    }
}

/// Metadata attached to envelopes that carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeMetadata {
    /// Do not run the handler, but record the offset as processed.
    SkipProcessing,
}

/// A delivered event, full or filtered.
///
/// Invariant: `event.is_none()` implies `metadata == Some(SkipProcessing)`.
/// Construct through [`Envelope::full`] and [`Envelope::filtered`] to keep it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<E> {
    pub offset: Offset,
    pub persistence_id: String,
    pub seq_nr: i64,
    pub event: Option<E>,
    /// Offset timestamp in epoch milliseconds.
    pub timestamp: i64,
    pub metadata: Option<EnvelopeMetadata>,
    pub entity_type: String,
    pub slice: i32,
    pub source: EventSource,
    #[serde(default)]
    pub tags: Vec<String>,
    pub filtered: bool,
}

impl<E> Envelope<E> {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn full(
        offset: Offset,
        persistence_id: String,
        seq_nr: i64,
        event: E,
        timestamp: i64,
        entity_type: String,
        slice: i32,
        source: EventSource,
        tags: Vec<String>,
    ) -> Self {
        Self {
            offset,
            persistence_id,
            seq_nr,
            event: Some(event),
            timestamp,
            metadata: None,
            entity_type,
            slice,
            source,
            tags,
            filtered: false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn filtered(
        offset: Offset,
        persistence_id: String,
        seq_nr: i64,
        timestamp: i64,
        entity_type: String,
        slice: i32,
        source: EventSource,
    ) -> Self {
        Self {
            offset,
            persistence_id,
            seq_nr,
            event: None,
            timestamp,
            metadata: Some(EnvelopeMetadata::SkipProcessing),
            entity_type,
            slice,
            source,
            tags: Vec::new(),
            filtered: true,
        }
    }

    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.event.is_some()
    }

    #[must_use]
    pub fn is_backtracking(&self) -> bool {
        self.source == EventSource::Backtracking
    }

    #[must_use]
    pub fn skip_processing(&self) -> bool {
        self.metadata == Some(EnvelopeMetadata::SkipProcessing)
    }

    /// Map the payload, keeping every other field.
    pub fn map<F, T>(self, f: F) -> Envelope<T>
    where
        F: FnOnce(E) -> T,
    {
        Envelope {
            offset: self.offset,
            persistence_id: self.persistence_id,
            seq_nr: self.seq_nr,
            event: self.event.map(f),
            timestamp: self.timestamp,
            metadata: self.metadata,
            entity_type: self.entity_type,
            slice: self.slice,
            source: self.source,
            tags: self.tags,
            filtered: self.filtered,
        }
    }
}
