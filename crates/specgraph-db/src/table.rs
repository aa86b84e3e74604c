//! Per-kind entity storage with bitmap attribute indexes.

use crate::entity::{Entity, LegacyTag, Region, Resource, Service, TypeDefinition};
use crate::id::EntityId;
use ahash::AHashMap;
use roaring::RoaringBitmap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Append-only rows of one entity kind.
///
/// Row `n` holds the entity with id `n`. Each attribute named in
/// [`Entity::INDEXED`] has a posting list per distinct string value;
/// iterating a bitmap yields ids in ascending, and therefore allocation,
/// order.
#[derive(Debug, Clone)]
pub struct Table<E: Entity> {
    rows: Vec<E>,
    indexes: AHashMap<&'static str, AHashMap<String, RoaringBitmap>>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            indexes: E::INDEXED
                .iter()
                .map(|attribute| (*attribute, AHashMap::new()))
                .collect(),
        }
    }
}

impl<E: Entity> Table<E> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn allocate(&mut self, entity: E) -> EntityId<E> {
        let id = EntityId::from_raw(self.rows.len() as u32);
        self.index(id, &entity);
        self.rows.push(entity);
        id
    }

    pub fn get(&self, id: EntityId<E>) -> Option<&E> {
        self.rows.get(id.index())
    }

    pub fn contains(&self, id: EntityId<E>) -> bool {
        id.index() < self.rows.len()
    }

    /// Mutate one row in place, keeping its index entries current.
    pub fn update<R>(&mut self, id: EntityId<E>, mutate: impl FnOnce(&mut E) -> R) -> Option<R> {
        let before = index_keys(self.rows.get(id.index())?);
        let row = self.rows.get_mut(id.index())?;
        let result = mutate(row);
        let after = index_keys(row);
        if after != before {
            for (attribute, key) in &before {
                self.unpost(attribute, key, id);
            }
            for (attribute, key) in after {
                self.post(attribute, key, id);
            }
        }
        Some(result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId<E>, &E)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| (EntityId::from_raw(index as u32), row))
    }

    /// Ids whose `attribute` equals `value`, in allocation order.
    ///
    /// Indexed attributes only ever hold strings, so any other `value`
    /// matches nothing there.
    pub fn matching(&self, attribute: &str, value: &Value) -> Vec<EntityId<E>> {
        if let Some(index) = self.indexes.get(attribute) {
            return value
                .as_str()
                .and_then(|key| index.get(key))
                .map(|bitmap| bitmap.iter().map(EntityId::from_raw).collect())
                .unwrap_or_default();
        }
        self.iter()
            .filter(|(_, row)| row.attribute(attribute).as_ref() == Some(value))
            .map(|(id, _)| id)
            .collect()
    }

    fn index(&mut self, id: EntityId<E>, entity: &E) {
        for (attribute, key) in index_keys(entity) {
            self.post(attribute, key, id);
        }
    }

    fn post(&mut self, attribute: &str, key: String, id: EntityId<E>) {
        if let Some(postings) = self.indexes.get_mut(attribute) {
            postings.entry(key).or_default().insert(id.raw());
        }
    }

    fn unpost(&mut self, attribute: &str, key: &str, id: EntityId<E>) {
        let Some(postings) = self.indexes.get_mut(attribute) else {
            return;
        };
        if let Some(bitmap) = postings.get_mut(key) {
            bitmap.remove(id.raw());
            if bitmap.is_empty() {
                postings.remove(key);
            }
        }
    }
}

fn index_keys<E: Entity>(entity: &E) -> Vec<(&'static str, String)> {
    E::INDEXED
        .iter()
        .filter_map(|attribute| Some((*attribute, entity.indexed(attribute)?.to_string())))
        .collect()
}

// Only rows are persisted; indexes are rebuilt on load.
impl<E: Entity> Serialize for Table<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rows.serialize(serializer)
    }
}

impl<'de, E: Entity> Deserialize<'de> for Table<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<E>::deserialize(deserializer)?;
        let mut table = Table::default();
        for row in rows {
            table.allocate(row);
        }
        Ok(table)
    }
}

/// One table per entity kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tables {
    #[serde(default)]
    pub(crate) services: Table<Service>,
    #[serde(default)]
    pub(crate) resources: Table<Resource>,
    #[serde(default)]
    pub(crate) type_definitions: Table<TypeDefinition>,
    #[serde(default)]
    pub(crate) regions: Table<Region>,
    #[serde(default)]
    pub(crate) legacy_tags: Table<LegacyTag>,
}
