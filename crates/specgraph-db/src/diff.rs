//! Structural comparison of two frozen databases.
//!
//! Entity ids are not stable across independent builds, so entities are
//! matched by natural key (`cloudFormationType` for resources, `name` for
//! services, `<owning resource type>.<name>` for type definitions) and
//! compared field by field. Type references are rendered by the natural key
//! of their target.

use crate::database::{Database, Snapshot};
use crate::entity::{PropertyDefinition, Resource, Service, TypeDefinition, TypeDefinitionId};
use crate::relation::{RegionHasResource, UsesType};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatabaseDiff {
    pub resources: EntityDiff,
    pub services: EntityDiff,
    pub type_definitions: EntityDiff,
}

impl DatabaseDiff {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.services.is_empty() && self.type_definitions.is_empty()
    }
}

/// Natural keys, sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<UpdatedEntity>,
}

impl EntityDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    pub fn updated_keys(&self) -> Vec<&str> {
        self.updated.iter().map(|u| u.key.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatedEntity {
    pub key: String,
    pub changes: Vec<FieldChange>,
}

/// One differing field. Nested fields are dotted, e.g. `properties.BucketName`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

pub fn diff(old: &Snapshot, new: &Snapshot) -> DatabaseDiff {
    let old: &Database = old;
    let new: &Database = new;
    DatabaseDiff {
        resources: compare(resource_rows(old), resource_rows(new)),
        services: compare(service_rows(old), service_rows(new)),
        type_definitions: compare(type_definition_rows(old), type_definition_rows(new)),
    }
}

type Rows = BTreeMap<String, BTreeMap<String, Value>>;

fn compare(old: Rows, new: Rows) -> EntityDiff {
    let mut out = EntityDiff::default();
    for key in new.keys() {
        if !old.contains_key(key) {
            out.added.push(key.clone());
        }
    }
    for (key, old_fields) in &old {
        let Some(new_fields) = new.get(key) else {
            out.removed.push(key.clone());
            continue;
        };
        let fields: BTreeSet<&String> = old_fields.keys().chain(new_fields.keys()).collect();
        let changes: Vec<FieldChange> = fields
            .into_iter()
            .filter_map(|field| {
                let (before, after) = (old_fields.get(field), new_fields.get(field));
                (before != after).then(|| FieldChange {
                    field: field.clone(),
                    old: before.cloned(),
                    new: after.cloned(),
                })
            })
            .collect();
        if !changes.is_empty() {
            out.updated.push(UpdatedEntity {
                key: key.clone(),
                changes,
            });
        }
    }
    out
}

// ============================================================================
// Canonical rows
// ============================================================================

fn type_definition_key(db: &Database, id: TypeDefinitionId) -> String {
    let name = db
        .get(id)
        .map(|definition| definition.name.clone())
        .unwrap_or_else(|| format!("{id:?}"));
    match db.follow_back::<UsesType>(id).first() {
        Some(owner) => format!("{}.{}", owner.cloud_formation_type, name),
        None => name,
    }
}

fn canonical_property(db: &Database, definition: &PropertyDefinition) -> Value {
    let name_of = |id: TypeDefinitionId| type_definition_key(db, id);
    let mut map = scalar_fields(definition, &[]);
    map.insert("type".into(), Value::String(definition.ty.render_with(&name_of)));
    if !definition.previous_types.is_empty() {
        let previous = definition
            .previous_types
            .iter()
            .map(|ty| Value::String(ty.render_with(&name_of)))
            .collect();
        map.insert("previousTypes".into(), Value::Array(previous));
    }
    Value::Object(map.into_iter().collect())
}

/// Top-level fields of a serialized entity, minus those listed in `nested`.
///
/// Entity rows hold strings, bools, string-keyed maps, plain JSON and
/// property types, so serializing one to a `Value` cannot fail.
fn scalar_fields<T: Serialize>(entity: &T, nested: &[&str]) -> BTreeMap<String, Value> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter(|(field, _)| !nested.contains(&field.as_str()))
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn expand_properties(
    db: &Database,
    fields: &mut BTreeMap<String, Value>,
    prefix: &str,
    properties: &BTreeMap<String, PropertyDefinition>,
) {
    for (name, definition) in properties {
        fields.insert(format!("{prefix}.{name}"), canonical_property(db, definition));
    }
}

fn resource_rows(db: &Database) -> Rows {
    db.all::<Resource>()
        .map(|resource| {
            let entity: &Resource = resource.entity();
            let mut fields = scalar_fields(entity, &["properties", "attributes"]);
            expand_properties(db, &mut fields, "properties", &entity.properties);
            expand_properties(db, &mut fields, "attributes", &entity.attributes);

            let mut regions: Vec<String> = db
                .follow_back::<RegionHasResource>(resource.id())
                .iter()
                .map(|region| region.entity().name.clone())
                .collect();
            if !regions.is_empty() {
                regions.sort();
                fields.insert("regions".into(), Value::from(regions));
            }
            (entity.cloud_formation_type.clone(), fields)
        })
        .collect()
}

fn service_rows(db: &Database) -> Rows {
    db.all::<Service>()
        .map(|service| {
            let entity: &Service = service.entity();
            let fields = scalar_fields(entity, &[]);
            (entity.name.clone(), fields)
        })
        .collect()
}

fn type_definition_rows(db: &Database) -> Rows {
    db.all::<TypeDefinition>()
        .map(|definition| {
            let entity: &TypeDefinition = definition.entity();
            let mut fields = scalar_fields(entity, &["properties"]);
            expand_properties(db, &mut fields, "properties", &entity.properties);
            (type_definition_key(db, definition.id()), fields)
        })
        .collect()
}
