//! Importers, one per source shape.
//!
//! Every importer takes the database and one parsed source document. The
//! registry importer is the primary allocator of resources; later importers
//! look entities up by natural key and extend them. Linking is idempotent,
//! and nothing is ever deleted.
//!
//! | importer | allocates | strict |
//! |---|---|---|
//! | `registry` | service, resource, typeDefinition | no |
//! | `legacy` / `sam` | region, legacyTag, missing resources and types | no |
//! | `docs` | nothing | no |
//! | `stateful` | nothing | no |
//! | `identifiers` | nothing | yes |
//! | `oob` | nothing | yes |
//!
//! Strict importers collect every problem in the document and fail once.

pub mod docs;
pub mod identifiers;
pub mod legacy;
pub mod merge;
pub mod oob;
pub mod registry;
pub mod sam;
pub mod stateful;

pub use docs::import_documentation;
pub use identifiers::import_identifier_overrides;
pub use legacy::{import_legacy, merge_regions, MergedLegacySpec};
pub use oob::import_oob_relationships;
pub use registry::import_registry;
pub use sam::import_sam;
pub use stateful::import_stateful_resources;

use specgraph_db::{
    Database, DbError, HasResource, LookupViolation, Operator, PropertyType, Resource, ResourceId,
    Service, ServiceId, TypeDefinition, TypeDefinitionId, TypeUsesType, UsesType,
};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Lookup(#[from] LookupViolation),

    #[error("{0:?} is not a resource type name")]
    InvalidTypeName(String),

    #[error("resource type {0} is described by more than one registry schema")]
    DuplicateResource(String),

    #[error("{resource}: unsupported type at {location}: {detail}")]
    Unsupported {
        resource: String,
        location: String,
        detail: String,
    },

    #[error("{resource}: unresolved type reference {reference:?} at {location}")]
    UnresolvedRef {
        resource: String,
        location: String,
        reference: String,
    },

    #[error("unknown resource type {0}")]
    UnknownResource(String),

    #[error("{resource} has no property {property}")]
    UnknownProperty { resource: String, property: String },
}

// ============================================================================
// Shared lookups
// ============================================================================

/// The resource with this type, if any. More than one is a violation.
pub fn find_resource(db: &Database, cfn_type: &str) -> Result<Option<ResourceId>, ImportError> {
    match db
        .lookup::<Resource>("cloudFormationType", Operator::Equals, cfn_type)
        .only()
    {
        Ok(found) => Ok(Some(found.id())),
        Err(LookupViolation::NotFound { .. }) => Ok(None),
        Err(violation) => Err(violation.into()),
    }
}

/// The resource with this type; absence is a violation.
pub fn require_resource(db: &Database, cfn_type: &str) -> Result<ResourceId, ImportError> {
    Ok(db
        .lookup::<Resource>("cloudFormationType", Operator::Equals, cfn_type)
        .only()?
        .id())
}

/// The service owning `cfn_type`, allocated on first sight.
pub fn ensure_service(db: &mut Database, cfn_type: &str) -> Result<ServiceId, ImportError> {
    let service = Service::from_cloudformation_type(cfn_type)
        .ok_or_else(|| ImportError::InvalidTypeName(cfn_type.to_string()))?;
    let found = db
        .lookup::<Service>("name", Operator::Equals, service.name.as_str())
        .only()
        .map(|found| found.id());
    match found {
        Ok(id) => Ok(id),
        Err(LookupViolation::NotFound { .. }) => Ok(db.allocate(service)),
        Err(violation) => Err(violation.into()),
    }
}

/// Allocate a bare resource and attach it to its service.
pub(crate) fn allocate_resource(db: &mut Database, cfn_type: &str) -> Result<ResourceId, ImportError> {
    let service = ensure_service(db, cfn_type)?;
    let resource = db.allocate(Resource::new(cfn_type));
    db.link::<HasResource>(service, resource)?;
    Ok(resource)
}

/// The type definition `name` declared by `resource`, if any.
pub fn type_definition_of(db: &Database, resource: ResourceId, name: &str) -> Option<TypeDefinitionId> {
    db.follow::<UsesType>(resource)
        .into_iter()
        .find(|hop| hop.entity.name == name)
        .map(|hop| hop.entity.id())
}

/// Record that `definition` references every type definition in `ty`.
pub(crate) fn link_type_refs(
    db: &mut Database,
    definition: TypeDefinitionId,
    ty: &PropertyType,
) -> Result<(), ImportError> {
    for target in ty.refs() {
        db.link::<TypeUsesType>(definition, target)?;
    }
    Ok(())
}

pub(crate) fn new_type_definition(
    db: &mut Database,
    resource: ResourceId,
    definition: TypeDefinition,
) -> Result<TypeDefinitionId, ImportError> {
    let id = db.allocate(definition);
    db.link::<UsesType>(resource, id)?;
    Ok(id)
}
