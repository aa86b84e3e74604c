//! Documentation overlays.
//!
//! Keys name either a resource (`AWS::S3::Bucket`) or one of its type
//! definitions (`AWS::S3::Bucket.CorsRule`). Keys and members that match
//! nothing in the database are ignored.

use super::{find_resource, type_definition_of, ImportError};
use crate::sources::{DocsDocument, TypeDocs};
use specgraph_db::{Database, PropertyDefinition};
use std::collections::BTreeMap;

pub fn import_documentation(db: &mut Database, docs: &DocsDocument) -> Result<(), ImportError> {
    let mut applied = 0usize;
    for (key, entry) in &docs.types {
        let (cfn_type, type_name) = match key.split_once('.') {
            Some((cfn_type, type_name)) => (cfn_type, Some(type_name)),
            None => (key.as_str(), None),
        };
        let Some(resource) = find_resource(db, cfn_type)? else {
            tracing::debug!(key = %key, "documentation for unknown resource ignored");
            continue;
        };
        match type_name {
            None => {
                db.update(resource, |r| {
                    if entry.description.is_some() {
                        r.documentation = entry.description.clone();
                    }
                    document(&mut r.properties, &entry.properties);
                    document(&mut r.attributes, &entry.attributes);
                })?;
            }
            Some(type_name) => {
                let Some(definition) = type_definition_of(db, resource, type_name) else {
                    tracing::debug!(key = %key, "documentation for unknown type ignored");
                    continue;
                };
                db.update(definition, |t| apply_type_docs(t, entry))?;
            }
        }
        applied += 1;
    }
    tracing::info!(entries = docs.types.len(), applied, "imported documentation");
    Ok(())
}

fn apply_type_docs(definition: &mut specgraph_db::TypeDefinition, entry: &TypeDocs) {
    if entry.description.is_some() {
        definition.documentation = entry.description.clone();
    }
    document(&mut definition.properties, &entry.properties);
}

fn document(members: &mut BTreeMap<String, PropertyDefinition>, docs: &BTreeMap<String, String>) {
    for (name, text) in docs {
        if let Some(member) = members.get_mut(name) {
            member.documentation = Some(text.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::import_registry;
    use serde_json::json;

    #[test]
    fn docs_attach_to_matching_members_only() {
        let mut db = Database::new();
        let schema = serde_json::from_value(json!({
            "typeName": "AWS::Some::Type",
            "definitions": {"Inner": {"type": "object", "properties": {"Flag": {"type": "boolean"}}}},
            "properties": {
                "MyProp": {"type": "string"},
                "Inner": {"$ref": "#/definitions/Inner"},
                "Arn": {"type": "string"}
            },
            "readOnlyProperties": ["/properties/Arn"]
        }))
        .unwrap();
        let id = import_registry(&mut db, &schema).unwrap();

        let docs: DocsDocument = serde_json::from_value(json!({
            "Types": {
                "AWS::Some::Type": {
                    "description": "Some type",
                    "properties": {"MyProp": "Cool prop", "OtherProp": "Ignored"},
                    "attributes": {"Arn": "The ARN"}
                },
                "AWS::Some::Type.Inner": {"properties": {"Flag": "A flag"}},
                "AWS::Some::Type.Missing": {"description": "Ignored"},
                "AWS::Other::Type": {"description": "Ignored"}
            }
        }))
        .unwrap();
        import_documentation(&mut db, &docs).unwrap();

        let resource = db.entity(id).unwrap();
        assert_eq!(resource.documentation.as_deref(), Some("Some type"));
        assert_eq!(resource.properties["MyProp"].documentation.as_deref(), Some("Cool prop"));
        assert!(!resource.properties.contains_key("OtherProp"));
        assert_eq!(resource.attributes["Arn"].documentation.as_deref(), Some("The ARN"));

        let inner = type_definition_of(&db, id, "Inner").unwrap();
        assert_eq!(
            db.get(inner).unwrap().properties["Flag"].documentation.as_deref(),
            Some("A flag")
        );
    }
}
