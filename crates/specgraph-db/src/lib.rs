//! Specgraph DB: the canonical, typed entity-relationship model.
//!
//! The schema is small and closed: five entity kinds (service, resource,
//! type definition, region, legacy tag) and seven relationship kinds. Every
//! entity lives in an append-only per-kind table and is addressed by a typed
//! [`EntityId`]; declared attributes are indexed with Roaring bitmaps so that
//! lookups return matches in allocation order.
//!
//! ## Lifecycle
//!
//! ```text
//! Database::new() ──► importers allocate/update/link ──► freeze() ──► Snapshot
//!                                                          │
//!                                                       validate()
//! ```
//!
//! A [`Snapshot`] is read-only. Two snapshots built from different source
//! releases can be compared with [`diff::diff`].
//!
//! ## Module Organization
//!
//! - `types`: property type algebra and assignability
//! - `entity`: entity kinds and their attribute schemas
//! - `relation`: relationship kinds and the edge store
//! - `query`: lookup results and the `.only()` assertion
//! - `database`: the store itself
//! - `diff`: release-over-release comparison

pub mod database;
pub mod diff;
pub mod entity;
pub mod id;
pub mod query;
pub mod relation;
pub mod table;
pub mod types;

pub use database::{Database, Snapshot};
pub use diff::{DatabaseDiff, EntityDiff, FieldChange, UpdatedEntity};
pub use entity::{
    Entity, EntityKind, LegacyTag, LegacyTagId, PropertyDefinition, Region, RegionId,
    RelationshipRef, Resource, ResourceId, Service, ServiceId, TagVariant, TypeDefinition,
    TypeDefinitionId,
};
pub use id::EntityId;
pub use query::{Followed, Lookup, LookupViolation, Only, Operator, Ref};
pub use relation::{
    HasResource, RegionHasResource, RegionHasService, RelatesTo, RelationKind, Relationship,
    ResourceHasLegacyTag, TypeUsesType, UsesType,
};
pub use types::{assignable, reconcile, PrimitiveKind, PropertyType, TypeError};

/// Errors raised by database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("unknown {kind} #{id}")]
    UnknownEntity { kind: EntityKind, id: u32 },

    #[error("integrity violation on {relation}: {detail}")]
    Integrity { relation: RelationKind, detail: String },

    #[error(transparent)]
    Lookup(#[from] LookupViolation),

    #[error("database failed validation:\n  {}", .0.join("\n  "))]
    Invalid(Vec<String>),
}
