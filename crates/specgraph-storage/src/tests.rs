//! Save/load tests for the snapshot store

use super::*;
use specgraph_db::{
    HasResource, Operator, PropertyDefinition, PropertyType, RegionHasResource, UsesType,
};
use tempfile::tempdir;

fn sample() -> Snapshot {
    let mut db = Database::new();
    let service = db.allocate(Service::from_cloudformation_type("AWS::S3::Bucket").unwrap());
    let tag = db.allocate(
        TypeDefinition::new("Tag").with_property("Key", PropertyDefinition::new(PropertyType::STRING)),
    );
    let bucket = db.allocate(
        Resource::new("AWS::S3::Bucket")
            .with_property(
                "Tags",
                PropertyDefinition::new(PropertyType::array(PropertyType::reference(tag))),
            )
            .with_property(
                "Mode",
                PropertyDefinition::new(PropertyType::union([PropertyType::STRING, PropertyType::NUMBER])),
            ),
    );
    let region = db.allocate(Region::new("us-east-1"));
    db.link::<HasResource>(service, bucket).unwrap();
    db.link::<UsesType>(bucket, tag).unwrap();
    db.link::<RegionHasResource>(region, bucket).unwrap();
    db.freeze().unwrap()
}

#[test]
fn test_snapshot_round_trips() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::open(dir.path().join("snapshots")).unwrap();
    let snapshot = sample();

    let manifest = store.save("nightly", &snapshot).unwrap();
    assert_eq!(manifest.counts["resource"], 1);
    assert_eq!(manifest.counts["relationships"], 3);
    assert_eq!(manifest.sha256.len(), 64);
    assert_eq!(store.manifest("nightly").unwrap(), manifest);

    let loaded = store.load("nightly").unwrap();
    assert_eq!(
        serde_json::to_value(&loaded).unwrap(),
        serde_json::to_value(&snapshot).unwrap()
    );

    // Indexes are rebuilt on load.
    let bucket = loaded
        .lookup::<Resource>("cloudFormationType", Operator::Equals, "AWS::S3::Bucket")
        .only()
        .unwrap();
    assert_eq!(loaded.follow::<UsesType>(bucket.id()).len(), 1);
}

#[test]
fn test_tampered_data_is_rejected() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::open(dir.path()).unwrap();
    store.save("base", &sample()).unwrap();

    let data = dir.path().join("base.json");
    let text = std::fs::read_to_string(&data).unwrap();
    std::fs::write(&data, text.replace("us-east-1", "us-west-2")).unwrap();

    assert!(matches!(
        store.load("base"),
        Err(StorageError::DigestMismatch { ref name, .. }) if name == "base"
    ));
}

#[test]
fn test_list_and_names() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::open(dir.path()).unwrap();
    store.save("b-second", &sample()).unwrap();
    store.save("a_first", &sample()).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    assert_eq!(store.list().unwrap(), vec!["a_first", "b-second"]);
    assert!(matches!(store.save("../escape", &sample()), Err(StorageError::InvalidName(_))));
    assert!(matches!(store.load("missing"), Err(StorageError::Io { .. })));
}
