use serde_json::json;
use specgraph_db::diff::diff;
use specgraph_db::{
    Database, HasResource, Operator, PropertyDefinition, PropertyType, Resource, Service, TypeDefinition,
    UsesType,
};

fn add_resource(db: &mut Database, cfn_type: &str) -> specgraph_db::ResourceId {
    let derived = Service::from_cloudformation_type(cfn_type).unwrap();
    let existing = db
        .lookup::<Service>("name", Operator::Equals, derived.name.as_str())
        .first()
        .map(|service| service.id());
    let service = match existing {
        Some(id) => id,
        None => db.allocate(derived),
    };
    let resource = db.allocate(
        Resource::new(cfn_type).with_property("Name", PropertyDefinition::new(PropertyType::STRING)),
    );
    db.link::<HasResource>(service, resource).unwrap();
    resource
}

#[test]
fn added_and_removed_resources_are_reported_by_type() {
    let mut first = Database::new();
    add_resource(&mut first, "AWS::S3::Bucket");
    add_resource(&mut first, "AWS::SQS::Queue");

    let mut second = Database::new();
    // Allocation order differs on purpose; ids must not matter.
    add_resource(&mut second, "AWS::SNS::Topic");
    add_resource(&mut second, "AWS::S3::Bucket");

    let report = diff(&first.freeze().unwrap(), &second.freeze().unwrap());
    assert_eq!(report.resources.added, vec!["AWS::SNS::Topic".to_string()]);
    assert_eq!(report.resources.removed, vec!["AWS::SQS::Queue".to_string()]);
    assert!(report.resources.updated.is_empty());

    assert_eq!(report.services.added, vec!["aws-sns".to_string()]);
    assert_eq!(report.services.removed, vec!["aws-sqs".to_string()]);
}

#[test]
fn field_level_changes_compare_refs_by_name() {
    let build = |required: bool, extra_type: bool| {
        let mut db = Database::new();
        if extra_type {
            // Shifts every later type definition id by one.
            db.allocate(TypeDefinition::new("Unrelated"));
        }
        let tag = db.allocate(TypeDefinition::new("Tag").with_property(
            "Key",
            PropertyDefinition::new(PropertyType::STRING).required(required),
        ));
        let bucket = add_resource(&mut db, "AWS::S3::Bucket");
        db.update(bucket, |r| {
            r.properties.insert(
                "Tags".into(),
                PropertyDefinition::new(PropertyType::array(PropertyType::reference(tag))),
            );
        })
        .unwrap();
        db.link::<UsesType>(bucket, tag).unwrap();
        db.freeze().unwrap()
    };

    let report = diff(&build(false, false), &build(true, true));
    assert!(report.resources.is_empty(), "{report:#?}");
    assert_eq!(report.type_definitions.added, vec!["Unrelated".to_string()]);
    assert_eq!(report.type_definitions.updated_keys(), vec!["AWS::S3::Bucket.Tag"]);

    let change = &report.type_definitions.updated[0].changes[0];
    assert_eq!(change.field, "properties.Key");
    assert_eq!(change.old, Some(json!({"type": "string", "required": false})));
    assert_eq!(change.new, Some(json!({"type": "string", "required": true})));
}

#[test]
fn identical_builds_have_an_empty_diff() {
    let mut db = Database::new();
    add_resource(&mut db, "AWS::S3::Bucket");
    let snapshot = db.freeze().unwrap();
    assert!(diff(&snapshot, &snapshot.clone()).is_empty());
}
