//! Typed shapes of the upstream source documents.
//!
//! Only the subset of each format that the importers read is modeled;
//! unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Registry schema (one document per resource type)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySchema {
    pub type_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, SchemaNode>,
    #[serde(default)]
    pub definitions: BTreeMap<String, SchemaNode>,
    #[serde(default)]
    pub required: Vec<String>,
    /// JSON pointers such as `/properties/Arn`.
    #[serde(default)]
    pub read_only_properties: Vec<String>,
    #[serde(default)]
    pub primary_identifier: Vec<String>,
    #[serde(default)]
    pub tagging: Option<Tagging>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tagging {
    #[serde(default)]
    pub taggable: Option<bool>,
    #[serde(default)]
    pub tag_property: Option<String>,
}

/// `"type": "string"` or `"type": ["string", "object"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaTypes {
    One(String),
    Many(Vec<String>),
}

impl SchemaTypes {
    pub fn names(&self) -> Vec<&str> {
        match self {
            SchemaTypes::One(name) => vec![name.as_str()],
            SchemaTypes::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// `additionalProperties: false` or `additionalProperties: { ...schema }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(default, rename = "$ref")]
    pub reference: Option<String>,
    #[serde(default, rename = "type")]
    pub types: Option<SchemaTypes>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Option<Box<SchemaNode>>,
    #[serde(default)]
    pub properties: Option<BTreeMap<String, SchemaNode>>,
    #[serde(default)]
    pub pattern_properties: Option<BTreeMap<String, SchemaNode>>,
    #[serde(default)]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(default)]
    pub any_of: Option<Vec<SchemaNode>>,
    #[serde(default)]
    pub one_of: Option<Vec<SchemaNode>>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub default: Option<Value>,
}

// ============================================================================
// Legacy resource specification (also used by the SAM specification)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacySpec {
    #[serde(default)]
    pub resource_specification_version: Option<String>,
    /// Keyed `AWS::S3::Bucket.CorsRule`, or a bare name such as `Tag` for
    /// types shared by every resource.
    #[serde(default)]
    pub property_types: BTreeMap<String, LegacyPropertyType>,
    #[serde(default)]
    pub resource_types: BTreeMap<String, LegacyResourceType>,
}

/// The type fields shared by properties, attributes and aliased property types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyTypeShape {
    #[serde(default)]
    pub primitive_type: Option<String>,
    #[serde(default)]
    pub primitive_types: Option<Vec<String>>,
    #[serde(default, rename = "Type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub types: Option<Vec<String>>,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub item_types: Option<Vec<String>>,
    #[serde(default)]
    pub primitive_item_type: Option<String>,
    #[serde(default)]
    pub primitive_item_types: Option<Vec<String>>,
}

impl LegacyTypeShape {
    pub fn is_empty(&self) -> bool {
        self == &LegacyTypeShape::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyProperty {
    #[serde(flatten)]
    pub shape: LegacyTypeShape,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyPropertyType {
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub properties: Option<BTreeMap<String, LegacyProperty>>,
    /// Set when the "property type" is an alias for a primitive or collection.
    #[serde(flatten)]
    pub shape: LegacyTypeShape,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyResourceType {
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, LegacyProperty>,
    #[serde(default)]
    pub attributes: BTreeMap<String, LegacyProperty>,
}

// ============================================================================
// Documentation
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocsDocument {
    /// Keyed by resource type or `Resource.TypeName`.
    #[serde(default)]
    pub types: BTreeMap<String, TypeDocs>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDocs {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

// ============================================================================
// Allow-lists and overrides
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatefulResources {
    #[serde(default)]
    pub resource_types: BTreeMap<String, Value>,
}

/// `{ "AWS::S3::Bucket": ["BucketName"] }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierOverrides(pub BTreeMap<String, Vec<String>>);

/// Out-of-band relationships, keyed by the source resource type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OobRelationships(pub BTreeMap<String, ResourceRelationships>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRelationships {
    #[serde(default)]
    pub relationships: Vec<OobRelationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OobRelationship {
    /// Property on the source resource, `/`-separated when it lives inside
    /// a type definition (`VpcConfig/SubnetIds`).
    pub property_path: String,
    #[serde(alias = "cloudFormationType")]
    pub cloudformation_type: String,
    /// Attribute or property of the target being referenced.
    pub property_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_type_accepts_one_or_many() {
        let node: SchemaNode = serde_json::from_value(json!({"type": ["string", "number"]})).unwrap();
        assert_eq!(node.types.unwrap().names(), vec!["string", "number"]);
        let node: SchemaNode = serde_json::from_value(json!({"type": "object", "additionalProperties": false})).unwrap();
        assert!(matches!(node.additional_properties, Some(AdditionalProperties::Allowed(false))));
    }

    #[test]
    fn legacy_property_flattens_its_shape() {
        let prop: LegacyProperty = serde_json::from_value(json!({
            "Type": "List",
            "PrimitiveItemType": "String",
            "Required": false,
            "UpdateType": "Mutable"
        }))
        .unwrap();
        assert_eq!(prop.shape.type_name.as_deref(), Some("List"));
        assert_eq!(prop.shape.primitive_item_type.as_deref(), Some("String"));
        assert_eq!(prop.required, Some(false));
    }

    #[test]
    fn oob_type_key_has_two_spellings() {
        let a: OobRelationship = serde_json::from_value(json!({
            "propertyPath": "Role", "cloudformationType": "AWS::IAM::Role", "propertyName": "Arn"
        }))
        .unwrap();
        let b: OobRelationship = serde_json::from_value(json!({
            "propertyPath": "Role", "cloudFormationType": "AWS::IAM::Role", "propertyName": "Arn"
        }))
        .unwrap();
        assert_eq!(a.cloudformation_type, b.cloudformation_type);
    }
}
