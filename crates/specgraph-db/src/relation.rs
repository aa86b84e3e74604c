//! Typed, directed relationship kinds and the edge store.

use crate::entity::{Entity, EntityKind, LegacyTag, Region, Resource, Service, TypeDefinition};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    HasResource,
    UsesType,
    TypeUsesType,
    RegionHasResource,
    RegionHasService,
    ResourceHasLegacyTag,
    RelatesTo,
}

impl RelationKind {
    pub const ALL: [RelationKind; 7] = [
        RelationKind::HasResource,
        RelationKind::UsesType,
        RelationKind::TypeUsesType,
        RelationKind::RegionHasResource,
        RelationKind::RegionHasService,
        RelationKind::ResourceHasLegacyTag,
        RelationKind::RelatesTo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::HasResource => "hasResource",
            RelationKind::UsesType => "usesType",
            RelationKind::TypeUsesType => "typeUsesType",
            RelationKind::RegionHasResource => "regionHasResource",
            RelationKind::RegionHasService => "regionHasService",
            RelationKind::ResourceHasLegacyTag => "resourceHasLegacyTag",
            RelationKind::RelatesTo => "relatesTo",
        }
    }

    /// Source and target entity kinds.
    pub fn endpoints(self) -> (EntityKind, EntityKind) {
        match self {
            RelationKind::HasResource => (EntityKind::Service, EntityKind::Resource),
            RelationKind::UsesType => (EntityKind::Resource, EntityKind::TypeDefinition),
            RelationKind::TypeUsesType => (EntityKind::TypeDefinition, EntityKind::TypeDefinition),
            RelationKind::RegionHasResource => (EntityKind::Region, EntityKind::Resource),
            RelationKind::RegionHasService => (EntityKind::Region, EntityKind::Service),
            RelationKind::ResourceHasLegacyTag => (EntityKind::Resource, EntityKind::LegacyTag),
            RelationKind::RelatesTo => (EntityKind::Resource, EntityKind::Resource),
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compile-time description of one relationship kind.
pub trait Relationship: 'static {
    const KIND: RelationKind;
    type Source: Entity;
    type Target: Entity;
}

macro_rules! relationship {
    ($(#[$doc:meta])* $name:ident, $source:ty => $target:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;

        impl Relationship for $name {
            const KIND: RelationKind = RelationKind::$name;
            type Source = $source;
            type Target = $target;
        }
    };
}

relationship!(
    /// A service owns a resource type.
    HasResource, Service => Resource
);
relationship!(
    /// A resource declares a type definition.
    UsesType, Resource => TypeDefinition
);
relationship!(
    /// A type definition's properties reference another type definition.
    TypeUsesType, TypeDefinition => TypeDefinition
);
relationship!(RegionHasResource, Region => Resource);
relationship!(RegionHasService, Region => Service);
relationship!(ResourceHasLegacyTag, Resource => LegacyTag);
relationship!(
    /// Out-of-band "property of A references B" fact.
    RelatesTo, Resource => Resource
);

/// One directed edge. An edge has no identity beyond this triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub kind: RelationKind,
    pub source: u32,
    pub target: u32,
}

/// Edge store with forward and backward adjacency lists.
///
/// Adjacency lists keep insertion order; the set makes inserts idempotent.
#[derive(Debug, Clone, Default)]
pub struct RelationStore {
    edges: Vec<Edge>,
    present: HashSet<Edge>,
    forward: HashMap<(RelationKind, u32), Vec<u32>>,
    backward: HashMap<(RelationKind, u32), Vec<u32>>,
}

impl RelationStore {
    /// Insert an edge; `false` if it already existed.
    pub fn insert(&mut self, edge: Edge) -> bool {
        if !self.present.insert(edge) {
            return false;
        }
        self.edges.push(edge);
        self.forward
            .entry((edge.kind, edge.source))
            .or_default()
            .push(edge.target);
        self.backward
            .entry((edge.kind, edge.target))
            .or_default()
            .push(edge.source);
        true
    }

    pub fn contains(&self, edge: &Edge) -> bool {
        self.present.contains(edge)
    }

    pub fn targets(&self, kind: RelationKind, source: u32) -> &[u32] {
        self.forward
            .get(&(kind, source))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sources(&self, kind: RelationKind, target: u32) -> &[u32] {
        self.backward
            .get(&(kind, target))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn count(&self, kind: RelationKind) -> usize {
        self.edges.iter().filter(|edge| edge.kind == kind).count()
    }
}

impl Serialize for RelationStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.edges.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RelationStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let edges = Vec::<Edge>::deserialize(deserializer)?;
        let mut store = RelationStore::default();
        for edge in edges {
            store.insert(edge);
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_are_idempotent_and_ordered() {
        let mut store = RelationStore::default();
        let edge = |target| Edge {
            kind: RelationKind::UsesType,
            source: 0,
            target,
        };
        assert!(store.insert(edge(2)));
        assert!(store.insert(edge(1)));
        assert!(!store.insert(edge(2)));

        assert_eq!(store.targets(RelationKind::UsesType, 0), &[2, 1]);
        assert_eq!(store.sources(RelationKind::UsesType, 1), &[0]);
        assert!(store.targets(RelationKind::TypeUsesType, 0).is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn every_kind_has_consistent_endpoints() {
        assert_eq!(
            UsesType::KIND.endpoints(),
            (
                <<UsesType as Relationship>::Source as Entity>::KIND,
                <<UsesType as Relationship>::Target as Entity>::KIND
            )
        );
        assert_eq!(RelationKind::ALL.len(), 7);
    }
}
