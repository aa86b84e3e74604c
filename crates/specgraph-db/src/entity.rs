//! The closed set of entity kinds stored in the database.

use crate::id::EntityId;
use crate::table::{Table, Tables};
use crate::types::PropertyType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Entity plumbing
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Service,
    Resource,
    TypeDefinition,
    Region,
    LegacyTag,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Service => "service",
            EntityKind::Resource => "resource",
            EntityKind::TypeDefinition => "typeDefinition",
            EntityKind::Region => "region",
            EntityKind::LegacyTag => "legacyTag",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record kind with a fixed attribute schema.
///
/// Attribute names are the serialized (camelCase) field names. `INDEXED`
/// attributes are string fields read directly through [`Entity::indexed`]
/// and get a hash index; every other attribute is looked up by scan.
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + 'static {
    const KIND: EntityKind;
    const INDEXED: &'static [&'static str];

    /// The value of an `INDEXED` attribute; `None` for any other name.
    fn indexed(&self, name: &str) -> Option<&str>;

    /// Any attribute, through the serialized form.
    fn attribute(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.indexed(name) {
            return Some(Value::String(value.to_string()));
        }
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove(name),
            _ => None,
        }
    }

    #[doc(hidden)]
    fn table(tables: &Tables) -> &Table<Self>;
    #[doc(hidden)]
    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;
}

pub type ServiceId = EntityId<Service>;
pub type ResourceId = EntityId<Resource>;
pub type TypeDefinitionId = EntityId<TypeDefinition>;
pub type RegionId = EntityId<Region>;
pub type LegacyTagId = EntityId<LegacyTag>;

macro_rules! entity_kind {
    ($ty:ty, $kind:ident, $field:ident, [$($indexed:literal => $column:ident),*]) => {
        impl Entity for $ty {
            const KIND: EntityKind = EntityKind::$kind;
            const INDEXED: &'static [&'static str] = &[$($indexed),*];

            fn indexed(&self, name: &str) -> Option<&str> {
                match name {
                    $($indexed => Some(self.$column.as_str()),)*
                    _ => None,
                }
            }

            fn table(tables: &Tables) -> &Table<Self> {
                &tables.$field
            }

            fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
                &mut tables.$field
            }
        }
    };
}

entity_kind!(Service, Service, services, ["name" => name, "cloudFormationNamespace" => cloud_formation_namespace]);
entity_kind!(Resource, Resource, resources, ["cloudFormationType" => cloud_formation_type, "name" => name]);
entity_kind!(TypeDefinition, TypeDefinition, type_definitions, ["name" => name]);
entity_kind!(Region, Region, regions, ["name" => name]);
entity_kind!(LegacyTag, LegacyTag, legacy_tags, ["tagPropertyName" => tag_property_name]);

// ============================================================================
// Property definitions
// ============================================================================

/// "This property holds a reference to that resource's attribute."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRef {
    pub cloud_formation_type: String,
    pub property_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    #[serde(rename = "type")]
    pub ty: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Types this property was declared with by earlier sources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_types: Vec<PropertyType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationship_refs: Vec<RelationshipRef>,
}

impl PropertyDefinition {
    pub fn new(ty: PropertyType) -> Self {
        Self {
            ty,
            documentation: None,
            required: None,
            default_value: None,
            previous_types: Vec::new(),
            relationship_refs: Vec::new(),
        }
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }
}

// ============================================================================
// Entity kinds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// `aws-s3`
    pub name: String,
    /// `s3`
    pub short_name: String,
    /// `S3`
    pub capitalized: String,
    /// `AWS::S3`
    pub cloud_formation_namespace: String,
}

impl Service {
    /// Derive the service owning `AWS::S3::Bucket`-style resource types.
    pub fn from_cloudformation_type(cloud_formation_type: &str) -> Option<Self> {
        let mut parts = cloud_formation_type.split("::");
        let partition = parts.next().filter(|p| !p.is_empty())?;
        let service = parts.next().filter(|s| !s.is_empty())?;
        Some(Self {
            name: format!("{}-{}", partition, service).to_lowercase(),
            short_name: service.to_lowercase(),
            capitalized: service.to_string(),
            cloud_formation_namespace: format!("{partition}::{service}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub cloud_formation_type: String,
    /// Last segment of the type, e.g. `Bucket`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDefinition>,
    #[serde(default)]
    pub attributes: BTreeMap<String, PropertyDefinition>,
    #[serde(default)]
    pub primary_identifier: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfn_ref_identifier: Option<Vec<String>>,
    #[serde(default)]
    pub is_stateful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_property_name: Option<String>,
}

impl Resource {
    pub fn new(cloud_formation_type: impl Into<String>) -> Self {
        let cloud_formation_type = cloud_formation_type.into();
        let name = cloud_formation_type
            .rsplit("::")
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            cloud_formation_type,
            name,
            documentation: None,
            properties: BTreeMap::new(),
            attributes: BTreeMap::new(),
            primary_identifier: Vec::new(),
            cfn_ref_identifier: None,
            is_stateful: false,
            tag_property_name: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, definition: PropertyDefinition) -> Self {
        self.properties.insert(name.into(), definition);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, definition: PropertyDefinition) -> Self {
        self.attributes.insert(name.into(), definition);
        self
    }

    pub fn has_property_or_attribute(&self, name: &str) -> bool {
        self.properties.contains_key(name) || self.attributes.contains_key(name)
    }

    pub fn definitions(&self) -> impl Iterator<Item = (&String, &PropertyDefinition)> {
        self.properties.iter().chain(self.attributes.iter())
    }
}

/// A named structured type declared by (and scoped to) one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDefinition>,
    /// Referenced only by older source generations; kept so generated code
    /// stays backwards compatible.
    #[serde(default)]
    pub must_render_for_bw_compat: bool,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documentation: None,
            properties: BTreeMap::new(),
            must_render_for_bw_compat: false,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, definition: PropertyDefinition) -> Self {
        self.properties.insert(name.into(), definition);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
}

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagVariant {
    /// A list of `{Key, Value}` objects.
    Standard,
    /// A list of `{Key, Value, PropagateAtLaunch}` objects.
    AutoscalingGroup,
    /// A string-to-string map.
    Map,
}

/// Tagging information recovered from the legacy resource specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTag {
    pub tag_property_name: String,
    pub variant: TagVariant,
}
