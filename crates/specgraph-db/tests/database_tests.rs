//! Database behaviour: identity, lookup, linking, traversal and persistence.

use serde_json::json;
use specgraph_db::{
    Database, DbError, EntityId, HasResource, LookupViolation, Only, Operator, PropertyDefinition,
    PropertyType, Region, RegionHasResource, RelationKind, Resource, Service, TypeDefinition,
    UsesType,
};

fn bucket_db() -> Database {
    let mut db = Database::new();
    let s3 = db.allocate(Service::from_cloudformation_type("AWS::S3::Bucket").unwrap());
    let tag = db.allocate(
        TypeDefinition::new("Tag")
            .with_property("Key", PropertyDefinition::new(PropertyType::STRING).required(true))
            .with_property("Value", PropertyDefinition::new(PropertyType::STRING)),
    );
    let bucket = db.allocate(
        Resource::new("AWS::S3::Bucket")
            .with_property("BucketName", PropertyDefinition::new(PropertyType::STRING))
            .with_property(
                "Tags",
                PropertyDefinition::new(PropertyType::array(PropertyType::reference(tag))),
            )
            .with_attribute("Arn", PropertyDefinition::new(PropertyType::STRING)),
    );
    db.link::<HasResource>(s3, bucket).unwrap();
    db.link::<UsesType>(bucket, tag).unwrap();
    db
}

#[test]
fn allocation_hands_out_fresh_ids_in_order() {
    let mut db = Database::new();
    let a = db.allocate(Region::new("us-east-1"));
    let b = db.allocate(Region::new("us-east-1"));
    assert_ne!(a, b);
    assert!(a < b);

    let names: Vec<_> = db.all::<Region>().map(|r| r.id()).collect();
    assert_eq!(names, vec![a, b]);
}

#[test]
fn link_is_idempotent() {
    let mut db = bucket_db();
    let s3 = db.all::<Service>().next().unwrap().id();
    let bucket = db.all::<Resource>().next().unwrap().id();

    assert!(!db.link::<HasResource>(s3, bucket).unwrap());
    assert_eq!(db.relationships().count(RelationKind::HasResource), 1);

    let followed = db.follow::<HasResource>(s3);
    assert_eq!(followed.len(), 1);
    assert_eq!(followed[0].relation, RelationKind::HasResource);
    assert_eq!(followed[0].entity.cloud_formation_type, "AWS::S3::Bucket");
}

#[test]
fn follow_preserves_insertion_order() {
    let mut db = Database::new();
    let west = db.allocate(Region::new("us-west-2"));
    let queue = db.allocate(Resource::new("AWS::SQS::Queue"));
    let bucket = db.allocate(Resource::new("AWS::S3::Bucket"));
    db.link::<RegionHasResource>(west, bucket).unwrap();
    db.link::<RegionHasResource>(west, queue).unwrap();

    let types: Vec<&str> = db
        .follow::<RegionHasResource>(west)
        .iter()
        .map(|f| f.entity.entity().cloud_formation_type.as_str())
        .collect();
    assert_eq!(types, vec!["AWS::S3::Bucket", "AWS::SQS::Queue"]);

    let back: Vec<_> = db.follow_back::<RegionHasResource>(queue).iter().map(|r| r.id()).collect();
    assert_eq!(back, vec![west]);
}

#[test]
fn linking_to_an_unallocated_entity_fails_fast() {
    let mut db = bucket_db();
    let bucket = db.all::<Resource>().next().unwrap().id();
    let err = db
        .link::<UsesType>(bucket, EntityId::from_raw(99))
        .unwrap_err();
    assert!(matches!(err, DbError::Integrity { relation: RelationKind::UsesType, .. }));
    assert_eq!(db.relationships().count(RelationKind::UsesType), 1);
}

#[test]
fn only_reports_not_found_and_ambiguous() {
    let mut db = bucket_db();

    let found = db
        .lookup::<Resource>("cloudFormationType", Operator::Equals, "AWS::S3::Bucket")
        .only()
        .unwrap();
    assert_eq!(found.name, "Bucket");

    let missing = db
        .lookup::<Resource>("cloudFormationType", Operator::Equals, "AWS::Nope::Thing")
        .only()
        .unwrap_err();
    assert!(matches!(missing, LookupViolation::NotFound { .. }));
    assert!(missing.to_string().contains("AWS::Nope::Thing"));

    db.allocate(Resource::new("AWS::S3::Bucket"));
    let lookup = db.lookup::<Resource>("cloudFormationType", Operator::Equals, "AWS::S3::Bucket");
    assert_eq!(lookup.len(), 2);
    assert!(matches!(lookup.unique(), Only::Ambiguous(2)));

    let err = db
        .lookup::<Resource>("cloudFormationType", Operator::Equals, "AWS::S3::Bucket")
        .only()
        .unwrap_err();
    assert_eq!(
        err,
        LookupViolation::Ambiguous {
            kind: specgraph_db::EntityKind::Resource,
            query: "cloudFormationType equals \"AWS::S3::Bucket\"".into(),
            count: 2,
        }
    );
}

#[test]
fn updates_are_visible_to_later_lookups() {
    let mut db = bucket_db();
    let bucket = db.all::<Resource>().next().unwrap().id();
    db.update(bucket, |r| r.is_stateful = true).unwrap();

    let stateful = db.lookup::<Resource>("isStateful", Operator::Equals, true);
    assert_eq!(stateful.ids(), vec![bucket]);
}

#[test]
fn validate_collects_every_violation() {
    let mut db = bucket_db();
    db.allocate(Resource::new("AWS::S3::Bucket"));
    let queue = db.allocate(
        Resource::new("AWS::SQS::Queue").with_property(
            "Policy",
            PropertyDefinition::new(PropertyType::reference(EntityId::from_raw(42))),
        ),
    );
    db.update(queue, |r| r.cfn_ref_identifier = Some(vec!["QueueUrl".into()]))
        .unwrap();

    let issues = db.validate();
    assert_eq!(issues.len(), 3, "{issues:#?}");
    assert!(issues[0].contains("AWS::S3::Bucket is allocated 2 times"));
    assert!(issues.iter().any(|i| i.contains("Policy references unknown type definition")));
    assert!(issues.iter().any(|i| i.contains("cfnRefIdentifier names unknown property QueueUrl")));

    assert!(matches!(db.freeze(), Err(DbError::Invalid(list)) if list.len() == 3));
}

#[test]
fn snapshot_round_trips_through_json() {
    let mut db = bucket_db();
    let bucket = db.all::<Resource>().next().unwrap().id();
    let tag = db.all::<TypeDefinition>().next().unwrap().id();
    db.update(bucket, |r| {
        r.properties.insert(
            "Cors".into(),
            PropertyDefinition::new(PropertyType::map(PropertyType::union([
                PropertyType::array(PropertyType::reference(tag)),
                PropertyType::JSON,
            ]))),
        );
    })
    .unwrap();
    let snapshot = db.freeze().unwrap();

    let text = serde_json::to_string(&snapshot).unwrap();
    let loaded: Database = serde_json::from_str(&text).unwrap();
    let reloaded = loaded.freeze().unwrap();

    assert_eq!(serde_json::to_value(&reloaded).unwrap(), serde_json::to_value(&snapshot).unwrap());
    let bucket = reloaded
        .lookup::<Resource>("cloudFormationType", Operator::Equals, "AWS::S3::Bucket")
        .only()
        .unwrap();
    assert_eq!(
        bucket.properties["Cors"].ty.to_tagged()["element"]["type"],
        json!("union")
    );
    assert_eq!(reloaded.follow::<UsesType>(bucket.id()).len(), 1);
}
