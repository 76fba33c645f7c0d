use std::fmt;

use serde::{Deserialize, Serialize};

use crate::slice::slice_for;

/// Separator between the entity type and the entity id.
pub const SEPARATOR: char = '|';

/// Entity type part of a persistence id (`Order|abc` -> `Order`).
///
/// An id without a separator is its own entity type.
#[must_use]
pub fn entity_type_of(persistence_id: &str) -> &str {
    persistence_id
        .split_once(SEPARATOR)
        .map_or(persistence_id, |(entity_type, _)| entity_type)
}

/// Identifier of a single event-sourced entity, `EntityType|entityId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistenceId(String);

impl PersistenceId {
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str) -> Self {
        Self(format!("{entity_type}{SEPARATOR}{entity_id}"))
    }

    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        entity_type_of(&self.0)
    }

    /// Entity id part; empty when the id has no separator.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        self.0.split_once(SEPARATOR).map_or("", |(_, id)| id)
    }

    #[must_use]
    pub fn slice(&self) -> i32 {
        slice_for(&self.0)
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PersistenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PersistenceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<PersistenceId> for String {
    fn from(value: PersistenceId) -> Self {
        value.0
    }
}
