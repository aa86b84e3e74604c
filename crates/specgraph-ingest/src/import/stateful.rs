//! The list of resource types that hold state.

use super::{find_resource, ImportError};
use crate::sources::StatefulResources;
use specgraph_db::Database;

pub fn import_stateful_resources(db: &mut Database, stateful: &StatefulResources) -> Result<(), ImportError> {
    let mut marked = 0usize;
    for cfn_type in stateful.resource_types.keys() {
        match find_resource(db, cfn_type)? {
            Some(resource) => {
                db.update(resource, |r| r.is_stateful = true)?;
                marked += 1;
            }
            None => tracing::debug!(cfn_type = %cfn_type, "stateful marker for unknown resource ignored"),
        }
    }
    tracing::info!(marked, "imported stateful resources");
    Ok(())
}
