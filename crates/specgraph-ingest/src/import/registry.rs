//! Registry schemas: the primary allocator of resources and type definitions.

use super::{allocate_resource, find_resource, link_type_refs, new_type_definition, ImportError};
use crate::sources::{AdditionalProperties, RegistrySchema, SchemaNode};
use specgraph_db::{Database, PropertyDefinition, PropertyType, ResourceId, TypeDefinition, TypeDefinitionId};
use specgraph_patch::JsonPointer;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Alias chains longer than this are treated as cyclic.
const MAX_ALIAS_DEPTH: usize = 16;

/// Import one registry schema, allocating its resource.
///
/// A definition with `properties` becomes a type definition; any other
/// definition is an alias and is inlined wherever it is referenced.
pub fn import_registry(db: &mut Database, schema: &RegistrySchema) -> Result<ResourceId, ImportError> {
    let cfn_type = schema.type_name.as_str();
    if find_resource(db, cfn_type)?.is_some() {
        return Err(ImportError::DuplicateResource(cfn_type.to_string()));
    }
    let resource = allocate_resource(db, cfn_type)?;

    let mut structs = HashMap::new();
    for (name, node) in &schema.definitions {
        if node.properties.is_some() {
            let mut definition = TypeDefinition::new(name.clone());
            definition.documentation = node.description.clone();
            structs.insert(name.clone(), new_type_definition(db, resource, definition)?);
        }
    }

    let converter = SchemaConverter {
        resource: cfn_type,
        definitions: &schema.definitions,
        structs: &structs,
    };

    for (name, node) in &schema.definitions {
        let (Some(id), Some(properties)) = (structs.get(name), node.properties.as_ref()) else {
            continue;
        };
        let location = format!("/definitions/{name}");
        let converted = converter.convert_properties(properties, &node.required, &location)?;
        for definition in converted.values() {
            link_type_refs(db, *id, &definition.ty)?;
        }
        db.update(*id, |definition| definition.properties = converted)?;
    }

    let mut converted = converter.convert_properties(&schema.properties, &schema.required, "/properties")?;
    let mut attributes = BTreeMap::new();
    for pointer in &schema.read_only_properties {
        let Some(path) = property_path(pointer) else {
            continue;
        };
        if let [name] = path.as_slice() {
            if let Some(definition) = converted.remove(name.as_str()) {
                attributes.insert(name.clone(), definition);
            }
        } else {
            let ty = converter.nested_type(&schema.properties, &path);
            attributes.insert(path.join("."), PropertyDefinition::new(ty));
        }
    }

    let primary_identifier = schema
        .primary_identifier
        .iter()
        .filter_map(|pointer| property_path(pointer))
        .map(|path| path.join("."))
        .collect();
    let tag_property_name = schema
        .tagging
        .as_ref()
        .and_then(|tagging| tagging.tag_property.as_deref())
        .and_then(property_path)
        .map(|path| path.join("."));

    let (property_count, attribute_count) = (converted.len(), attributes.len());
    db.update(resource, |r| {
        r.documentation = schema.description.clone();
        r.properties = converted;
        r.attributes = attributes;
        r.primary_identifier = primary_identifier;
        r.tag_property_name = tag_property_name;
    })?;

    tracing::debug!(
        resource = %cfn_type,
        properties = property_count,
        attributes = attribute_count,
        type_definitions = structs.len(),
        "imported registry schema"
    );
    Ok(resource)
}

/// `/properties/A/B` → `["A", "B"]`.
fn property_path(pointer: &str) -> Option<Vec<String>> {
    let pointer = JsonPointer::parse(pointer).ok()?;
    match pointer.segments() {
        [head, rest @ ..] if head == "properties" && !rest.is_empty() => Some(rest.to_vec()),
        _ => None,
    }
}

/// JSON-schema subset to type algebra.
struct SchemaConverter<'s> {
    resource: &'s str,
    definitions: &'s BTreeMap<String, SchemaNode>,
    structs: &'s HashMap<String, TypeDefinitionId>,
}

impl<'s> SchemaConverter<'s> {
    fn convert_properties(
        &self,
        properties: &BTreeMap<String, SchemaNode>,
        required: &[String],
        location: &str,
    ) -> Result<BTreeMap<String, PropertyDefinition>, ImportError> {
        let required: HashSet<&str> = required.iter().map(String::as_str).collect();
        properties
            .iter()
            .map(|(name, node)| {
                let ty = self.convert(node, &format!("{location}/{name}"), 0)?;
                let mut definition = PropertyDefinition::new(ty);
                definition.documentation = node.description.clone();
                definition.default_value = node.default.clone();
                if required.contains(name.as_str()) {
                    definition.required = Some(true);
                }
                Ok((name.clone(), definition))
            })
            .collect()
    }

    fn convert(&self, node: &SchemaNode, location: &str, depth: usize) -> Result<PropertyType, ImportError> {
        if let Some(reference) = &node.reference {
            return self.resolve(reference, location, depth);
        }
        if let Some(alternatives) = node.any_of.as_ref().or(node.one_of.as_ref()) {
            let members = alternatives
                .iter()
                .enumerate()
                .map(|(i, member)| self.convert(member, &format!("{location}/anyOf/{i}"), depth))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(PropertyType::union(members));
        }
        let names = match &node.types {
            Some(types) => types.names(),
            None if node.properties.is_some()
                || node.pattern_properties.is_some()
                || node.additional_properties.is_some() =>
            {
                vec!["object"]
            }
            None => return Ok(PropertyType::JSON),
        };
        let members = names
            .into_iter()
            .map(|name| self.convert_named(name, node, location, depth))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match members.len() {
            1 => PropertyType::union(members).collapse(),
            _ => PropertyType::union(members),
        })
    }

    fn convert_named(
        &self,
        name: &str,
        node: &SchemaNode,
        location: &str,
        depth: usize,
    ) -> Result<PropertyType, ImportError> {
        match name {
            "string" => Ok(PropertyType::STRING),
            "integer" | "number" => Ok(PropertyType::NUMBER),
            "boolean" => Ok(PropertyType::BOOLEAN),
            "array" => match &node.items {
                Some(items) => Ok(PropertyType::array(self.convert(items, &format!("{location}/items"), depth)?)),
                None => Ok(PropertyType::array(PropertyType::JSON)),
            },
            "object" => {
                if let Some((pattern, element)) = node.pattern_properties.as_ref().and_then(|p| p.iter().next()) {
                    let location = format!("{location}/patternProperties/{pattern}");
                    return Ok(PropertyType::map(self.convert(element, &location, depth)?));
                }
                if let Some(AdditionalProperties::Schema(element)) = &node.additional_properties {
                    let location = format!("{location}/additionalProperties");
                    return Ok(PropertyType::map(self.convert(element, &location, depth)?));
                }
                // Inline object shapes carry no name to hang a type definition on.
                Ok(PropertyType::JSON)
            }
            other => Err(ImportError::Unsupported {
                resource: self.resource.to_string(),
                location: location.to_string(),
                detail: format!("schema type {other:?}"),
            }),
        }
    }

    fn resolve(&self, reference: &str, location: &str, depth: usize) -> Result<PropertyType, ImportError> {
        let unresolved = || ImportError::UnresolvedRef {
            resource: self.resource.to_string(),
            location: location.to_string(),
            reference: reference.to_string(),
        };
        let name = reference.strip_prefix("#/definitions/").ok_or_else(unresolved)?;
        if let Some(id) = self.structs.get(name) {
            return Ok(PropertyType::reference(*id));
        }
        let alias = self.definitions.get(name).ok_or_else(unresolved)?;
        if depth >= MAX_ALIAS_DEPTH {
            return Err(ImportError::Unsupported {
                resource: self.resource.to_string(),
                location: location.to_string(),
                detail: format!("alias chain through {reference} does not terminate"),
            });
        }
        self.convert(alias, &format!("/definitions/{name}"), depth + 1)
    }

    /// Type of a nested property such as `Endpoint.Address`; `json` when the
    /// path cannot be followed.
    fn nested_type(&self, properties: &'s BTreeMap<String, SchemaNode>, path: &[String]) -> PropertyType {
        let mut current = Some(properties);
        let mut node = None;
        for segment in path {
            let Some(next) = current.and_then(|children| children.get(segment.as_str())) else {
                return PropertyType::JSON;
            };
            node = Some(next);
            current = self.deref_node(next).properties.as_ref();
        }
        node.and_then(|n| self.convert(n, "/readOnlyProperties", 0).ok())
            .unwrap_or(PropertyType::JSON)
    }

    fn deref_node(&self, node: &'s SchemaNode) -> &'s SchemaNode {
        let mut current = node;
        for _ in 0..MAX_ALIAS_DEPTH {
            let Some(target) = current
                .reference
                .as_deref()
                .and_then(|r| r.strip_prefix("#/definitions/"))
                .and_then(|name| self.definitions.get(name))
            else {
                break;
            };
            current = target;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use specgraph_db::{Operator, Resource, UsesType};

    fn bucket_schema() -> RegistrySchema {
        serde_json::from_value(json!({
            "typeName": "AWS::S3::Bucket",
            "description": "An S3 bucket",
            "properties": {
                "Arn": {"type": "string"},
                "BucketName": {"type": "string", "description": "Name of the bucket"},
                "ObjectLockEnabled": {"type": "boolean", "default": false},
                "Tags": {"type": "array", "items": {"$ref": "#/definitions/Tag"}},
                "Metadata": {"type": "object", "patternProperties": {".*": {"type": "string"}}},
                "Policy": {"type": ["object", "string"]},
                "Endpoint": {"$ref": "#/definitions/Endpoint"},
                "Retention": {"$ref": "#/definitions/RetentionDays"}
            },
            "definitions": {
                "Tag": {
                    "type": "object",
                    "properties": {"Key": {"type": "string"}, "Value": {"type": "string"}},
                    "required": ["Key", "Value"]
                },
                "Endpoint": {
                    "type": "object",
                    "properties": {"Address": {"type": "string"}, "Port": {"type": "integer"}}
                },
                "RetentionDays": {"type": "integer"}
            },
            "required": ["BucketName"],
            "readOnlyProperties": ["/properties/Arn", "/properties/Endpoint/Address"],
            "primaryIdentifier": ["/properties/BucketName"],
            "tagging": {"taggable": true, "tagProperty": "/properties/Tags"}
        }))
        .unwrap()
    }

    #[test]
    fn registry_schema_becomes_resource_and_types() {
        let mut db = Database::new();
        let id = import_registry(&mut db, &bucket_schema()).unwrap();
        let bucket = db.entity(id).unwrap();

        let tag = super::super::type_definition_of(&db, id, "Tag").unwrap();
        let endpoint = super::super::type_definition_of(&db, id, "Endpoint").unwrap();
        assert_eq!(db.follow::<UsesType>(id).len(), 2, "aliases do not become types");

        let prop = |name: &str| bucket.properties[name].ty.clone();
        assert_eq!(prop("BucketName"), PropertyType::STRING);
        assert_eq!(prop("ObjectLockEnabled"), PropertyType::BOOLEAN);
        assert_eq!(prop("Tags"), PropertyType::array(PropertyType::reference(tag)));
        assert_eq!(prop("Metadata"), PropertyType::map(PropertyType::STRING));
        assert_eq!(
            prop("Policy"),
            PropertyType::union([PropertyType::JSON, PropertyType::STRING])
        );
        assert_eq!(prop("Endpoint"), PropertyType::reference(endpoint));
        assert_eq!(prop("Retention"), PropertyType::NUMBER);

        assert_eq!(bucket.properties["BucketName"].required, Some(true));
        assert_eq!(bucket.properties["ObjectLockEnabled"].default_value, Some(json!(false)));
        assert_eq!(
            bucket.properties["BucketName"].documentation.as_deref(),
            Some("Name of the bucket")
        );

        assert!(!bucket.properties.contains_key("Arn"));
        assert_eq!(bucket.attributes["Arn"].ty, PropertyType::STRING);
        assert_eq!(bucket.attributes["Endpoint.Address"].ty, PropertyType::STRING);
        assert_eq!(bucket.primary_identifier, vec!["BucketName".to_string()]);
        assert_eq!(bucket.tag_property_name.as_deref(), Some("Tags"));

        let tag_def = db.get(tag).unwrap();
        assert_eq!(tag_def.properties["Key"].required, Some(true));
        assert!(db.validate().is_empty(), "{:?}", db.validate());
    }

    #[test]
    fn a_second_schema_for_the_same_type_is_rejected() {
        let mut db = Database::new();
        import_registry(&mut db, &bucket_schema()).unwrap();
        assert!(matches!(
            import_registry(&mut db, &bucket_schema()),
            Err(ImportError::DuplicateResource(_))
        ));
        assert_eq!(
            db.lookup::<Resource>("cloudFormationType", Operator::Equals, "AWS::S3::Bucket").len(),
            1
        );
    }

    #[test]
    fn dangling_refs_and_unknown_types_fail() {
        let mut db = Database::new();
        let schema: RegistrySchema = serde_json::from_value(json!({
            "typeName": "AWS::X::Y",
            "properties": {"A": {"$ref": "#/definitions/Missing"}}
        }))
        .unwrap();
        assert!(matches!(
            import_registry(&mut db, &schema),
            Err(ImportError::UnresolvedRef { .. })
        ));

        let schema: RegistrySchema = serde_json::from_value(json!({
            "typeName": "AWS::X::Z",
            "properties": {"A": {"type": "null"}}
        }))
        .unwrap();
        assert!(matches!(
            import_registry(&mut db, &schema),
            Err(ImportError::Unsupported { .. })
        ));
    }
}
