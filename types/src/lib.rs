//! Core domain types for slicefeed.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.
//!
//! - [`Offset`] - resumable stream position (timestamp + seen set)
//! - [`slice_for`] / [`slice_ranges`] - deterministic partitioning of the id space
//! - [`PersistenceId`] - `EntityType|entityId` identifiers
//! - [`Envelope`] - the unified, domain-facing view of a delivered event

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod envelope;
mod offset;
mod persistence_id;
mod slice;

pub use envelope::{Envelope, EnvelopeMetadata, EventSource};
pub use offset::{Offset, SeenSet, TimestampOffset};
pub use persistence_id::{PersistenceId, SEPARATOR, entity_type_of};
pub use slice::{NUMBER_OF_SLICES, SliceRangeError, is_valid_slice_range, slice_for, slice_ranges};

/// Commit timestamp carried by offsets.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
