//! Resumable stream positions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Entity id -> last sequence number observed at an offset's timestamp.
pub type SeenSet = BTreeMap<String, i64>;

/// Position in a slice-partitioned event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Offset {
    /// Start of the stream.
    NoOffset,
    Timestamp(TimestampOffset),
    /// Plain sequence position used by other journals; not accepted here.
    Sequence { value: i64 },
}

impl Offset {
    #[must_use]
    pub fn timestamp(timestamp: Timestamp, seen: SeenSet) -> Self {
        Self::Timestamp(TimestampOffset::new(timestamp, seen))
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoOffset => "no_offset",
            Self::Timestamp(_) => "timestamp",
            Self::Sequence { .. } => "sequence",
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<&TimestampOffset> {
        match self {
            Self::Timestamp(offset) => Some(offset),
            Self::NoOffset | Self::Sequence { .. } => None,
        }
    }
}

impl From<TimestampOffset> for Offset {
    fn from(value: TimestampOffset) -> Self {
        Self::Timestamp(value)
    }
}

/// Commit timestamp plus the entries already seen at exactly that timestamp.
///
/// The seen set only holds entries observed at `timestamp`; it lets a resumed
/// consumer tell apart events that share the timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampOffset {
    pub timestamp: Timestamp,
    #[serde(default)]
    pub seen: SeenSet,
}

impl TimestampOffset {
    #[must_use]
    pub fn new(timestamp: Timestamp, seen: SeenSet) -> Self {
        Self { timestamp, seen }
    }

    #[must_use]
    pub fn epoch_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Whether `(persistence_id, seq_nr)` is already covered by this offset.
    ///
    /// Events strictly before the timestamp are covered; events at the timestamp
    /// are covered when the seen set holds an equal or later sequence number.
    #[must_use]
    pub fn covers(&self, timestamp: Timestamp, persistence_id: &str, seq_nr: i64) -> bool {
        if timestamp < self.timestamp {
            return true;
        }
        timestamp == self.timestamp
            && self
                .seen
                .get(persistence_id)
                .is_some_and(|seen| *seen >= seq_nr)
    }
}
