//! The canonical entity-relationship store and its frozen snapshot.

use crate::entity::{Entity, EntityKind, Resource, TypeDefinition};
use crate::id::EntityId;
use crate::query::{Followed, Lookup, Operator, Ref};
use crate::relation::{Edge, RelationStore, Relationship};
use crate::table::Tables;
use crate::types::PropertyType;
use crate::DbError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::ops::Deref;

/// Mutable database used while a build is in progress.
///
/// Entities are append-only: there is no delete. Relationship edges are
/// idempotent `(kind, source, target)` triples.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    entities: Tables,
    #[serde(default)]
    relationships: RelationStore,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Entities
    // ========================================================================

    pub fn allocate<E: Entity>(&mut self, entity: E) -> EntityId<E> {
        let id = E::table_mut(&mut self.entities).allocate(entity);
        tracing::trace!(kind = %E::KIND, id = id.raw(), "allocated entity");
        id
    }

    pub fn get<E: Entity>(&self, id: EntityId<E>) -> Option<&E> {
        E::table(&self.entities).get(id)
    }

    pub fn entity<E: Entity>(&self, id: EntityId<E>) -> Result<Ref<'_, E>, DbError> {
        self.get(id)
            .map(|entity| Ref::new(id, entity))
            .ok_or(DbError::UnknownEntity {
                kind: E::KIND,
                id: id.raw(),
            })
    }

    pub fn contains<E: Entity>(&self, id: EntityId<E>) -> bool {
        E::table(&self.entities).contains(id)
    }

    /// Mutate an entity in place; indexes are kept current.
    pub fn update<E: Entity, R>(
        &mut self,
        id: EntityId<E>,
        mutate: impl FnOnce(&mut E) -> R,
    ) -> Result<R, DbError> {
        E::table_mut(&mut self.entities)
            .update(id, mutate)
            .ok_or(DbError::UnknownEntity {
                kind: E::KIND,
                id: id.raw(),
            })
    }

    pub fn lookup<E: Entity>(
        &self,
        attribute: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Lookup<'_, E> {
        let value = value.into();
        let table = E::table(&self.entities);
        let matches = match operator {
            Operator::Equals => table.matching(attribute, &value),
        };
        let refs = matches
            .into_iter()
            .filter_map(|id| table.get(id).map(|entity| Ref::new(id, entity)))
            .collect();
        Lookup::new(attribute, operator, &value, refs)
    }

    /// Every entity of a kind, in allocation order.
    pub fn all<E: Entity>(&self) -> impl Iterator<Item = Ref<'_, E>> + '_ {
        E::table(&self.entities)
            .iter()
            .map(|(id, entity)| Ref::new(id, entity))
    }

    pub fn count<E: Entity>(&self) -> usize {
        E::table(&self.entities).len()
    }

    fn contains_raw(&self, kind: EntityKind, raw: u32) -> bool {
        let len = match kind {
            EntityKind::Service => self.entities.services.len(),
            EntityKind::Resource => self.entities.resources.len(),
            EntityKind::TypeDefinition => self.entities.type_definitions.len(),
            EntityKind::Region => self.entities.regions.len(),
            EntityKind::LegacyTag => self.entities.legacy_tags.len(),
        };
        (raw as usize) < len
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    /// Insert an edge. Returns `false` when the edge already existed.
    ///
    /// Both endpoints must already be allocated.
    pub fn link<R: Relationship>(
        &mut self,
        source: EntityId<R::Source>,
        target: EntityId<R::Target>,
    ) -> Result<bool, DbError> {
        for (kind, raw, role) in [
            (<R::Source as Entity>::KIND, source.raw(), "source"),
            (<R::Target as Entity>::KIND, target.raw(), "target"),
        ] {
            if !self.contains_raw(kind, raw) {
                return Err(DbError::Integrity {
                    relation: R::KIND,
                    detail: format!("{role} {kind} #{raw} was never allocated"),
                });
            }
        }
        let inserted = self.relationships.insert(Edge {
            kind: R::KIND,
            source: source.raw(),
            target: target.raw(),
        });
        if inserted {
            tracing::trace!(
                relation = %R::KIND,
                source = source.raw(),
                target = target.raw(),
                "linked"
            );
        }
        Ok(inserted)
    }

    /// Targets reachable in one hop, in edge insertion order.
    pub fn follow<R: Relationship>(&self, source: EntityId<R::Source>) -> Vec<Followed<'_, R>> {
        let table = <R::Target as Entity>::table(&self.entities);
        self.relationships
            .targets(R::KIND, source.raw())
            .iter()
            .filter_map(|raw| {
                let id = EntityId::from_raw(*raw);
                table.get(id).map(|entity| Followed {
                    relation: R::KIND,
                    entity: Ref::new(id, entity),
                })
            })
            .collect()
    }

    /// Sources that reach `target` in one hop, in edge insertion order.
    pub fn follow_back<R: Relationship>(&self, target: EntityId<R::Target>) -> Vec<Ref<'_, R::Source>> {
        let table = <R::Source as Entity>::table(&self.entities);
        self.relationships
            .sources(R::KIND, target.raw())
            .iter()
            .filter_map(|raw| {
                let id = EntityId::from_raw(*raw);
                table.get(id).map(|entity| Ref::new(id, entity))
            })
            .collect()
    }

    pub fn relationships(&self) -> &RelationStore {
        &self.relationships
    }

    // ========================================================================
    // Integrity
    // ========================================================================

    /// Check the model invariants, returning every violation found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        let mut by_type: HashMap<&str, usize> = HashMap::new();
        for resource in self.all::<Resource>() {
            *by_type.entry(resource.entity().cloud_formation_type.as_str()).or_default() += 1;
        }
        let mut duplicated: Vec<_> = by_type.into_iter().filter(|(_, n)| *n > 1).collect();
        duplicated.sort();
        for (cfn_type, count) in duplicated {
            issues.push(format!("resource type {cfn_type} is allocated {count} times"));
        }

        for resource in self.all::<Resource>() {
            let owner = resource.cloud_formation_type.as_str();
            for (name, definition) in resource.definitions() {
                self.check_refs(&definition.ty, &format!("{owner} property {name}"), &mut issues);
            }
            for name in &resource.primary_identifier {
                if !names_member(&resource, name) {
                    issues.push(format!("{owner} primaryIdentifier names unknown property {name}"));
                }
            }
            for name in resource.cfn_ref_identifier.iter().flatten() {
                if !names_member(&resource, name) {
                    issues.push(format!("{owner} cfnRefIdentifier names unknown property {name}"));
                }
            }
        }

        for definition in self.all::<TypeDefinition>() {
            for (name, property) in &definition.properties {
                let context = format!("type {} property {name}", definition.name);
                self.check_refs(&property.ty, &context, &mut issues);
            }
        }

        for edge in self.relationships.edges() {
            let (source_kind, target_kind) = edge.kind.endpoints();
            if !self.contains_raw(source_kind, edge.source) || !self.contains_raw(target_kind, edge.target) {
                issues.push(format!(
                    "{} edge #{} -> #{} references an entity that was never allocated",
                    edge.kind, edge.source, edge.target
                ));
            }
        }

        issues
    }

    fn check_refs(&self, ty: &PropertyType, context: &str, issues: &mut Vec<String>) {
        for target in ty.refs() {
            if !self.contains(target) {
                issues.push(format!("{context} references unknown type definition {target:?}"));
            }
        }
    }

    /// Validate and seal the database.
    pub fn freeze(self) -> Result<Snapshot, DbError> {
        let issues = self.validate();
        if !issues.is_empty() {
            return Err(DbError::Invalid(issues));
        }
        Ok(self.freeze_unchecked())
    }

    /// Seal the database without validating it.
    pub fn freeze_unchecked(self) -> Snapshot {
        tracing::debug!(
            resources = self.count::<Resource>(),
            type_definitions = self.count::<TypeDefinition>(),
            relationships = self.relationships.len(),
            "froze database"
        );
        Snapshot { db: self }
    }
}

/// Identifier names are property or attribute names; nested names are
/// dotted and only need their top-level segment to exist.
fn names_member(resource: &Resource, name: &str) -> bool {
    resource.has_property_or_attribute(name)
        || name
            .split('.')
            .next()
            .is_some_and(|head| resource.has_property_or_attribute(head))
}

/// A sealed, read-only database.
///
/// Only `&self` operations are reachable through [`Deref`]; there is no way
/// back to a mutable [`Database`].
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    db: Database,
}

impl Deref for Snapshot {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}
