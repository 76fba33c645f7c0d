//! Translation between domain offsets and [`WireOffset`].

use chrono::DateTime;
use slicefeed_types::{Offset, SeenSet, Timestamp, TimestampOffset};

use crate::error::{JournalError, Result};
use crate::wire::{PersistenceIdSeqNr, WireOffset, WireTimestamp};

const NANOS_PER_SECOND: i32 = 1_000_000_000;

/// Accept only the offsets this journal can resume from.
///
/// `Ok(None)` is the start of the stream.
pub fn to_domain(offset: &Offset) -> Result<Option<&TimestampOffset>> {
    match offset {
        Offset::NoOffset => Ok(None),
        Offset::Timestamp(offset) => Ok(Some(offset)),
        Offset::Sequence { .. } => Err(JournalError::InvalidOffsetKind {
            kind: offset.kind(),
        }),
    }
}

pub fn to_wire(offset: &Offset) -> Result<Option<WireOffset>> {
    Ok(to_domain(offset)?.map(timestamp_offset_to_wire))
}

#[must_use]
pub fn timestamp_offset_to_wire(offset: &TimestampOffset) -> WireOffset {
    // BTreeMap iteration keeps the seen entries in id order.
    let seen = offset
        .seen
        .iter()
        .map(|(persistence_id, seq_nr)| PersistenceIdSeqNr {
            persistence_id: persistence_id.clone(),
            seq_nr: *seq_nr,
        })
        .collect();

    WireOffset {
        timestamp: timestamp_to_wire(offset.timestamp),
        seen,
    }
}

pub fn from_wire(offset: Option<&WireOffset>) -> Result<Offset> {
    match offset {
        None => Ok(Offset::NoOffset),
        Some(offset) => Ok(Offset::Timestamp(timestamp_offset_from_wire(offset)?)),
    }
}

pub fn timestamp_offset_from_wire(offset: &WireOffset) -> Result<TimestampOffset> {
    let timestamp = timestamp_from_wire(offset.timestamp)?;
    let seen: SeenSet = offset
        .seen
        .iter()
        .map(|entry| (entry.persistence_id.clone(), entry.seq_nr))
        .collect();
    Ok(TimestampOffset::new(timestamp, seen))
}

#[must_use]
pub fn timestamp_to_wire(timestamp: Timestamp) -> WireTimestamp {
    WireTimestamp {
        seconds: timestamp.timestamp(),
        nanos: timestamp.timestamp_subsec_nanos() as i32,
    }
}

pub fn timestamp_from_wire(timestamp: WireTimestamp) -> Result<Timestamp> {
    let WireTimestamp { seconds, nanos } = timestamp;
    if !(0..NANOS_PER_SECOND).contains(&nanos) {
        return Err(JournalError::protocol(format!(
            "timestamp nanos out of range: {nanos}"
        )));
    }
    DateTime::from_timestamp(seconds, nanos as u32).ok_or_else(|| {
        JournalError::protocol(format!("timestamp seconds out of range: {seconds}"))
    })
}
