//! Typed wire messages exchanged with the event producer.
//!
//! These types enable compile-time validation of producer JSON.
//! Parse errors happen at the serde boundary, not scattered through
//! materialization logic.
//!
//! # Design
//!
//! - Server pushes and load responses are enums tagged by the `type` field
//! - Unknown tags land in an `Unknown` variant so they can be reported as
//!   protocol violations instead of generic parse errors
//! - `#[serde(default)]` for optional fields the producer may omit

use serde::{Deserialize, Serialize};

/// Protobuf-style timestamp: seconds since the epoch plus nanos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTimestamp {
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceIdSeqNr {
    pub persistence_id: String,
    pub seq_nr: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOffset {
    pub timestamp: WireTimestamp,
    #[serde(default)]
    pub seen: Vec<PersistenceIdSeqNr>,
}

/// Opaque payload bytes with the type tag that selects their decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePayload {
    pub type_url: String,
    /// Standard base64.
    #[serde(default)]
    pub value: String,
}

/// Subscription parameters, sent once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitReq {
    pub entity_type: String,
    pub slice_min: i32,
    pub slice_max: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<WireOffset>,
}

/// Client-to-server stream messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamIn {
    Init(InitReq),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub persistence_id: String,
    pub seq_nr: i64,
    pub slice: i32,
    pub offset: WireOffset,
    pub payload: WirePayload,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// An event delivered without payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredEvent {
    pub persistence_id: String,
    pub seq_nr: i64,
    pub slice: i32,
    pub offset: WireOffset,
    #[serde(default)]
    pub source: String,
}

/// Server-to-client stream messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamOut {
    Event(Event),
    FilteredEvent(FilteredEvent),
    /// Anything else - a protocol violation.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTimestampRequest {
    pub persistence_id: String,
    pub seq_nr: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTimestampResponse {
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadEventRequest {
    pub persistence_id: String,
    pub seq_nr: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadEventResponse {
    Event(Event),
    FilteredEvent(FilteredEvent),
    #[serde(other)]
    Unknown,
}
