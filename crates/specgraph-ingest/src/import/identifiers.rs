//! Hand-maintained `Ref` identifiers for resources whose schema gets them
//! wrong.

use super::{find_resource, ImportError};
use crate::sources::IdentifierOverrides;
use specgraph_db::Database;

/// Apply every valid override, then report every invalid one.
pub fn import_identifier_overrides(
    db: &mut Database,
    overrides: &IdentifierOverrides,
) -> Result<(), Vec<ImportError>> {
    let mut errors = Vec::new();
    for (cfn_type, identifier) in &overrides.0 {
        let resource = match find_resource(db, cfn_type) {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                errors.push(ImportError::UnknownResource(cfn_type.clone()));
                continue;
            }
            Err(err) => {
                errors.push(err);
                continue;
            }
        };

        let unknown: Vec<ImportError> = match db.get(resource) {
            Some(entity) => identifier
                .iter()
                .filter(|name| !entity.has_property_or_attribute(head(name)))
                .map(|name| ImportError::UnknownProperty {
                    resource: cfn_type.clone(),
                    property: name.clone(),
                })
                .collect(),
            None => vec![ImportError::UnknownResource(cfn_type.clone())],
        };
        if !unknown.is_empty() {
            errors.extend(unknown);
            continue;
        }

        if let Err(err) = db.update(resource, |r| r.cfn_ref_identifier = Some(identifier.clone())) {
            errors.push(err.into());
        }
    }

    tracing::info!(overrides = overrides.0.len(), errors = errors.len(), "imported identifier overrides");
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Dotted names (`Endpoint.Address`) are checked by their first segment.
fn head(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
