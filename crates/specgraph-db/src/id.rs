//! Typed entity identifiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Opaque id of an entity of kind `E`.
///
/// Ids are dense per kind, handed out in allocation order and never reused.
/// The kind parameter keeps a resource id from being passed where a type
/// definition id is expected.
pub struct EntityId<E> {
    raw: u32,
    _kind: PhantomData<fn() -> E>,
}

impl<E> EntityId<E> {
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    pub const fn raw(self) -> u32 {
        self.raw
    }

    pub(crate) fn index(self) -> usize {
        self.raw as usize
    }
}

impl<E> Clone for EntityId<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EntityId<E> {}

impl<E> PartialEq for EntityId<E> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<E> Eq for EntityId<E> {}

impl<E> PartialOrd for EntityId<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for EntityId<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<E> Hash for EntityId<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<E> fmt::Debug for EntityId<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.raw)
    }
}

impl<E> Serialize for EntityId<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.raw)
    }
}

impl<'de, E> Deserialize<'de> for EntityId<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_raw)
    }
}
