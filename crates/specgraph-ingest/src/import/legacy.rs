//! The legacy resource specification, published once per region.

use super::merge::{merge_into, Generation};
use super::{allocate_resource, find_resource, link_type_refs, new_type_definition, type_definition_of, ImportError};
use crate::sources::{LegacyProperty, LegacyPropertyType, LegacyResourceType, LegacySpec, LegacyTypeShape};
use specgraph_db::{
    Database, LegacyTag, Operator, PropertyDefinition, PropertyType, Region, RegionHasResource,
    RegionHasService, RegionId, ResourceHasLegacyTag, ResourceId, ServiceId, TagVariant, TypeDefinition,
    TypeDefinitionId,
};
use std::collections::{BTreeMap, HashMap};

const MAX_ALIAS_DEPTH: usize = 16;

/// Several regional specifications folded into one.
#[derive(Debug, Clone, Default)]
pub struct MergedLegacySpec {
    pub property_types: BTreeMap<String, LegacyPropertyType>,
    pub resource_types: BTreeMap<String, LegacyResourceType>,
    /// Regions that publish each resource type, in merge order.
    pub regions: BTreeMap<String, Vec<String>>,
}

/// Fold regional specifications in the given order.
///
/// A key defined by more than one region takes the definition of the region
/// merged last, replacing the earlier one wholesale.
pub fn merge_regions<'a>(specs: impl IntoIterator<Item = (&'a str, &'a LegacySpec)>) -> MergedLegacySpec {
    let mut merged = MergedLegacySpec::default();
    for (region, spec) in specs {
        for (name, property_type) in &spec.property_types {
            merged.property_types.insert(name.clone(), property_type.clone());
        }
        for (cfn_type, resource_type) in &spec.resource_types {
            merged.resource_types.insert(cfn_type.clone(), resource_type.clone());
            let regions = merged.regions.entry(cfn_type.clone()).or_default();
            if !regions.iter().any(|r| r == region) {
                regions.push(region.to_string());
            }
        }
    }
    merged
}

/// Import a merged legacy specification, with region edges.
pub fn import_legacy(db: &mut Database, spec: &MergedLegacySpec) -> Result<(), ImportError> {
    let mut region_ids: HashMap<String, RegionId> = HashMap::new();
    for (cfn_type, resource_type) in &spec.resource_types {
        let imported = import_resource_type(db, &spec.property_types, cfn_type, resource_type)?;
        for region in spec.regions.get(cfn_type).into_iter().flatten() {
            let id = match region_ids.get(region) {
                Some(id) => *id,
                None => {
                    let id = ensure_region(db, region)?;
                    region_ids.insert(region.clone(), id);
                    id
                }
            };
            db.link::<RegionHasResource>(id, imported.resource)?;
            db.link::<RegionHasService>(id, imported.service)?;
        }
    }
    tracing::info!(
        resources = spec.resource_types.len(),
        regions = region_ids.len(),
        "imported legacy specification"
    );
    Ok(())
}

fn ensure_region(db: &mut Database, name: &str) -> Result<RegionId, ImportError> {
    let found = db
        .lookup::<Region>("name", Operator::Equals, name)
        .first()
        .map(|region| region.id());
    Ok(found.unwrap_or_else(|| db.allocate(Region::new(name))))
}

pub(crate) struct ImportedResource {
    pub resource: ResourceId,
    pub service: ServiceId,
}

/// Import one resource type of a legacy-format document.
///
/// A resource the registry already described is the newer generation: its
/// types stay, legacy types are kept as history and legacy-only members
/// fill the gaps. A resource seen for the first time is allocated here.
pub(crate) fn import_resource_type(
    db: &mut Database,
    property_types: &BTreeMap<String, LegacyPropertyType>,
    cfn_type: &str,
    resource_type: &LegacyResourceType,
) -> Result<ImportedResource, ImportError> {
    let (resource, preexisting) = match find_resource(db, cfn_type)? {
        Some(id) => (id, true),
        None => (allocate_resource(db, cfn_type)?, false),
    };
    let service = super::ensure_service(db, cfn_type)?;
    let generation = if preexisting { Generation::Older } else { Generation::Newer };

    let mut importer = ResourceTypes {
        cfn_type,
        property_types,
        resource,
        preexisting,
        known: HashMap::new(),
        pending: Vec::new(),
    };

    let properties = importer.convert_members(db, &resource_type.properties, "Properties")?;
    let attributes = importer.convert_members(db, &resource_type.attributes, "Attributes")?;
    for (section, members) in [("Properties", properties), ("Attributes", attributes)] {
        for (name, definition) in members {
            db.update(resource, |r| {
                let target = if section == "Properties" { &mut r.properties } else { &mut r.attributes };
                merge_into(target, &name, definition, generation)
            })?;
        }
    }

    importer.drain(db)?;
    if let Some(documentation) = &resource_type.documentation {
        db.update(resource, |r| {
            if r.documentation.is_none() {
                r.documentation = Some(documentation.clone());
            }
        })?;
    }

    let tagged = !db.follow::<ResourceHasLegacyTag>(resource).is_empty();
    if let Some(variant) = resource_type.properties.get("Tags").and_then(tag_variant).filter(|_| !tagged) {
        let tag = db.allocate(LegacyTag {
            tag_property_name: "Tags".into(),
            variant,
        });
        db.link::<ResourceHasLegacyTag>(resource, tag)?;
        db.update(resource, |r| {
            if r.tag_property_name.is_none() {
                r.tag_property_name = Some("Tags".into());
            }
        })?;
    }

    Ok(ImportedResource { resource, service })
}

fn tag_variant(tags: &LegacyProperty) -> Option<TagVariant> {
    let shape = &tags.shape;
    match (shape.type_name.as_deref(), shape.item_type.as_deref()) {
        (Some("List"), Some("Tag")) => Some(TagVariant::Standard),
        (Some("List"), Some("TagProperty")) => Some(TagVariant::AutoscalingGroup),
        (Some("Map"), _) => Some(TagVariant::Map),
        _ if shape.primitive_type.as_deref() == Some("Json") => Some(TagVariant::Map),
        _ => None,
    }
}

/// Resolves legacy type names for one resource, allocating its type
/// definitions on first reference.
struct ResourceTypes<'s> {
    cfn_type: &'s str,
    property_types: &'s BTreeMap<String, LegacyPropertyType>,
    resource: ResourceId,
    preexisting: bool,
    known: HashMap<String, TypeDefinitionId>,
    /// Type definitions whose members still need importing.
    pending: Vec<Pending<'s>>,
}

struct Pending<'s> {
    id: TypeDefinitionId,
    name: String,
    entry: &'s LegacyPropertyType,
    generation: Generation,
}

impl<'s> ResourceTypes<'s> {
    fn entry(&self, name: &str) -> Option<&'s LegacyPropertyType> {
        self.property_types
            .get(&format!("{}.{}", self.cfn_type, name))
            .or_else(|| self.property_types.get(name))
    }

    fn convert_members(
        &mut self,
        db: &mut Database,
        members: &BTreeMap<String, LegacyProperty>,
        section: &str,
    ) -> Result<Vec<(String, PropertyDefinition)>, ImportError> {
        let mut out = Vec::with_capacity(members.len());
        for (name, member) in members {
            let ty = self.convert(db, &member.shape, &format!("{section}/{name}"), 0)?;
            let mut definition = PropertyDefinition::new(ty);
            definition.required = member.required;
            definition.documentation = member.documentation.clone();
            out.push((name.clone(), definition));
        }
        Ok(out)
    }

    /// Import members of every type definition referenced so far, including
    /// those discovered while doing so.
    fn drain(&mut self, db: &mut Database) -> Result<(), ImportError> {
        while let Some(pending) = self.pending.pop() {
            let Some(members) = &pending.entry.properties else {
                continue;
            };
            let section = format!("PropertyTypes/{}", pending.name);
            let converted = self.convert_members(db, members, &section)?;
            for (name, definition) in converted {
                link_type_refs(db, pending.id, &definition.ty)?;
                db.update(pending.id, |t| {
                    merge_into(&mut t.properties, &name, definition, pending.generation)
                })?;
            }
            if let Some(documentation) = &pending.entry.documentation {
                db.update(pending.id, |t| {
                    if t.documentation.is_none() {
                        t.documentation = Some(documentation.clone());
                    }
                })?;
            }
        }
        Ok(())
    }

    fn convert(
        &mut self,
        db: &mut Database,
        shape: &LegacyTypeShape,
        location: &str,
        depth: usize,
    ) -> Result<PropertyType, ImportError> {
        let mut members = Vec::new();
        for primitive in shape.primitive_type.iter().chain(shape.primitive_types.iter().flatten()) {
            members.push(self.primitive(primitive, location)?);
        }
        if let Some(type_name) = &shape.type_name {
            members.push(match type_name.as_str() {
                "List" => PropertyType::array(self.item(db, shape, location, depth)?),
                "Map" => PropertyType::map(self.item(db, shape, location, depth)?),
                named => self.named(db, named, location, depth)?,
            });
        }
        for named in shape.types.iter().flatten() {
            members.push(self.named(db, named, location, depth)?);
        }
        self.one_or_union(members, location, "no type information")
    }

    fn item(
        &mut self,
        db: &mut Database,
        shape: &LegacyTypeShape,
        location: &str,
        depth: usize,
    ) -> Result<PropertyType, ImportError> {
        let mut members = Vec::new();
        for primitive in shape
            .primitive_item_type
            .iter()
            .chain(shape.primitive_item_types.iter().flatten())
        {
            members.push(self.primitive(primitive, location)?);
        }
        for named in shape.item_type.iter().chain(shape.item_types.iter().flatten()) {
            members.push(self.named(db, named, location, depth)?);
        }
        self.one_or_union(members, location, "collection without an item type")
    }

    fn one_or_union(
        &self,
        members: Vec<PropertyType>,
        location: &str,
        empty: &str,
    ) -> Result<PropertyType, ImportError> {
        match members.len() {
            0 => Err(ImportError::Unsupported {
                resource: self.cfn_type.to_string(),
                location: location.to_string(),
                detail: empty.to_string(),
            }),
            1 => Ok(PropertyType::union(members).collapse()),
            _ => Ok(PropertyType::union(members)),
        }
    }

    fn primitive(&self, name: &str, location: &str) -> Result<PropertyType, ImportError> {
        match name {
            "String" | "Timestamp" => Ok(PropertyType::STRING),
            "Long" | "Integer" | "Double" => Ok(PropertyType::NUMBER),
            "Boolean" => Ok(PropertyType::BOOLEAN),
            "Json" => Ok(PropertyType::JSON),
            other => Err(ImportError::Unsupported {
                resource: self.cfn_type.to_string(),
                location: location.to_string(),
                detail: format!("primitive type {other:?}"),
            }),
        }
    }

    /// A named property type: a struct becomes a type definition, an alias
    /// is inlined.
    fn named(
        &mut self,
        db: &mut Database,
        name: &str,
        location: &str,
        depth: usize,
    ) -> Result<PropertyType, ImportError> {
        let entry = self.entry(name).ok_or_else(|| ImportError::UnresolvedRef {
            resource: self.cfn_type.to_string(),
            location: location.to_string(),
            reference: name.to_string(),
        })?;
        if entry.properties.is_some() || entry.shape.is_empty() {
            return Ok(PropertyType::reference(self.type_definition(db, name, entry)?));
        }
        if depth >= MAX_ALIAS_DEPTH {
            return Err(ImportError::Unsupported {
                resource: self.cfn_type.to_string(),
                location: location.to_string(),
                detail: format!("alias chain through {name} does not terminate"),
            });
        }
        self.convert(db, &entry.shape, &format!("PropertyTypes/{name}"), depth + 1)
    }

    fn type_definition(
        &mut self,
        db: &mut Database,
        name: &str,
        entry: &'s LegacyPropertyType,
    ) -> Result<TypeDefinitionId, ImportError> {
        if let Some(id) = self.known.get(name) {
            return Ok(*id);
        }
        let (id, generation) = match type_definition_of(db, self.resource, name) {
            Some(id) => (id, Generation::Older),
            None => {
                let mut definition = TypeDefinition::new(name);
                // Only older generations still mention this type.
                definition.must_render_for_bw_compat = self.preexisting;
                (new_type_definition(db, self.resource, definition)?, Generation::Newer)
            }
        };
        self.known.insert(name.to_string(), id);
        self.pending.push(Pending {
            id,
            name: name.to_string(),
            entry,
            generation,
        });
        Ok(id)
    }
}
