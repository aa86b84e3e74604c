//! The serverless transform specification, in the legacy format.
//!
//! It describes transform resources that exist in no region of the legacy
//! specification, so no region edges are recorded.

use super::legacy::import_resource_type;
use super::ImportError;
use crate::sources::LegacySpec;
use specgraph_db::Database;

pub fn import_sam(db: &mut Database, spec: &LegacySpec) -> Result<(), ImportError> {
    for (cfn_type, resource_type) in &spec.resource_types {
        import_resource_type(db, &spec.property_types, cfn_type, resource_type)?;
    }
    tracing::info!(resources = spec.resource_types.len(), "imported serverless specification");
    Ok(())
}
