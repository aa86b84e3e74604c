//! Out-of-band relationships: "this property holds a reference to that
//! resource", for facts the schemas do not state.

use super::{find_resource, ImportError};
use crate::sources::OobRelationships;
use specgraph_db::{
    Database, PropertyDefinition, RelatesTo, RelationshipRef, ResourceId, TypeDefinitionId,
};

/// Where a property path ends.
#[derive(Debug, Clone, Copy)]
enum Owner {
    Resource(ResourceId),
    Type(TypeDefinitionId),
}

/// Apply every resolvable relationship, then report every unresolvable one.
pub fn import_oob_relationships(
    db: &mut Database,
    relationships: &OobRelationships,
) -> Result<(), Vec<ImportError>> {
    let mut errors = Vec::new();
    let mut linked = 0usize;
    for (source_type, entry) in &relationships.0 {
        let source = match resolve(db, source_type) {
            Ok(source) => source,
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        for relationship in &entry.relationships {
            let target = match resolve(db, &relationship.cloudformation_type) {
                Ok(target) => target,
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };
            let target_has_member = db
                .get(target)
                .is_some_and(|r| r.has_property_or_attribute(&relationship.property_name));
            if !target_has_member {
                errors.push(ImportError::UnknownProperty {
                    resource: relationship.cloudformation_type.clone(),
                    property: relationship.property_name.clone(),
                });
                continue;
            }
            let Some((owner, name)) = locate(db, source, &relationship.property_path) else {
                errors.push(ImportError::UnknownProperty {
                    resource: source_type.clone(),
                    property: relationship.property_path.clone(),
                });
                continue;
            };

            let reference = RelationshipRef {
                cloud_formation_type: relationship.cloudformation_type.clone(),
                property_name: relationship.property_name.clone(),
            };
            let updated = match owner {
                Owner::Resource(id) => db.update(id, |r| add_ref(r.properties.get_mut(&name), reference)),
                Owner::Type(id) => db.update(id, |t| add_ref(t.properties.get_mut(&name), reference)),
            };
            let linked_now = updated.and_then(|_| db.link::<RelatesTo>(source, target));
            match linked_now {
                Ok(_) => linked += 1,
                Err(err) => errors.push(err.into()),
            }
        }
    }

    tracing::info!(linked, errors = errors.len(), "imported out-of-band relationships");
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn resolve(db: &Database, cfn_type: &str) -> Result<ResourceId, ImportError> {
    find_resource(db, cfn_type)?.ok_or_else(|| ImportError::UnknownResource(cfn_type.to_string()))
}

fn add_ref(definition: Option<&mut PropertyDefinition>, reference: RelationshipRef) {
    if let Some(definition) = definition {
        if !definition.relationship_refs.contains(&reference) {
            definition.relationship_refs.push(reference);
        }
    }
}

/// Walk `Outer/Inner/Leaf` from the resource's properties through the type
/// definitions each step references.
fn locate(db: &Database, resource: ResourceId, path: &str) -> Option<(Owner, String)> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let first = segments.next()?;
    let mut owner = Owner::Resource(resource);
    let mut current = db.get(resource)?.properties.get(first)?;
    let mut name = first;
    for segment in segments {
        let (id, next) = current.ty.refs().into_iter().find_map(|id| {
            db.get(id)
                .and_then(|definition| definition.properties.get(segment))
                .map(|next| (id, next))
        })?;
        owner = Owner::Type(id);
        current = next;
        name = segment;
    }
    Some((owner, name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{import_registry, type_definition_of};
    use serde_json::json;

    fn build() -> (Database, ResourceId, ResourceId) {
        let mut db = Database::new();
        let function = import_registry(
            &mut db,
            &serde_json::from_value(json!({
                "typeName": "AWS::Lambda::Function",
                "definitions": {"VpcConfig": {"type": "object", "properties": {
                    "SubnetIds": {"type": "array", "items": {"type": "string"}}
                }}},
                "properties": {
                    "Role": {"type": "string"},
                    "VpcConfig": {"$ref": "#/definitions/VpcConfig"}
                }
            }))
            .unwrap(),
        )
        .unwrap();
        let role = import_registry(
            &mut db,
            &serde_json::from_value(json!({
                "typeName": "AWS::IAM::Role",
                "properties": {"Arn": {"type": "string"}},
                "readOnlyProperties": ["/properties/Arn"]
            }))
            .unwrap(),
        )
        .unwrap();
        db.allocate(specgraph_db::Resource::new("AWS::EC2::Subnet").with_attribute(
            "SubnetId",
            PropertyDefinition::new(specgraph_db::PropertyType::STRING),
        ));
        (db, function, role)
    }

    #[test]
    fn links_top_level_and_nested_properties() {
        let (mut db, function, role) = build();
        let relationships: OobRelationships = serde_json::from_value(json!({
            "AWS::Lambda::Function": {"relationships": [
                {"propertyPath": "Role", "cloudformationType": "AWS::IAM::Role", "propertyName": "Arn"},
                {"propertyPath": "VpcConfig/SubnetIds", "cloudformationType": "AWS::EC2::Subnet", "propertyName": "SubnetId"}
            ]}
        }))
        .unwrap();
        import_oob_relationships(&mut db, &relationships).unwrap();

        let resource = db.entity(function).unwrap();
        assert_eq!(
            resource.properties["Role"].relationship_refs,
            vec![RelationshipRef {
                cloud_formation_type: "AWS::IAM::Role".into(),
                property_name: "Arn".into(),
            }]
        );
        let vpc = type_definition_of(&db, function, "VpcConfig").unwrap();
        assert_eq!(db.get(vpc).unwrap().properties["SubnetIds"].relationship_refs.len(), 1);

        let targets: Vec<_> = db.follow::<RelatesTo>(function).iter().map(|h| h.entity.id()).collect();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0], role);

        // Re-importing is idempotent.
        import_oob_relationships(&mut db, &relationships).unwrap();
        assert_eq!(db.follow::<RelatesTo>(function).len(), 2);
        assert_eq!(db.entity(function).unwrap().properties["Role"].relationship_refs.len(), 1);
    }

    #[test]
    fn collects_unknown_sources_and_targets() {
        let (mut db, _, _) = build();
        let relationships: OobRelationships = serde_json::from_value(json!({
            "AWS::Lambda::Function": {"relationships": [
                {"propertyPath": "Role", "cloudformationType": "AWS::IAM::Nope", "propertyName": "Arn"},
                {"propertyPath": "Role", "cloudformationType": "AWS::IAM::Role", "propertyName": "Name"},
                {"propertyPath": "VpcConfig/Missing", "cloudformationType": "AWS::IAM::Role", "propertyName": "Arn"}
            ]},
            "AWS::Missing::Thing": {"relationships": []}
        }))
        .unwrap();
        let errors = import_oob_relationships(&mut db, &relationships).unwrap_err();
        let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "unknown resource type AWS::IAM::Nope",
                "AWS::IAM::Role has no property Name",
                "AWS::Lambda::Function has no property VpcConfig/Missing",
                "unknown resource type AWS::Missing::Thing",
            ]
        );
    }
}
