//! Reconciling property declarations that arrive from more than one source.

use specgraph_db::{reconcile, PropertyDefinition};
use std::collections::BTreeMap;

/// How the incoming declaration relates to the one already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// The incoming source is newer: its type wins.
    Newer,
    /// The incoming source is an older generation of the same data (the
    /// legacy specification relative to the registry): the stored type
    /// stays and the incoming one is kept as history.
    Older,
}

/// Merge `incoming` into `existing`. Returns `true` if anything changed.
pub fn merge_definition(
    existing: &mut PropertyDefinition,
    incoming: PropertyDefinition,
    generation: Generation,
) -> bool {
    let mut changed = false;
    match generation {
        Generation::Newer => {
            if reconcile(&existing.ty, &incoming.ty) {
                let superseded = std::mem::replace(&mut existing.ty, incoming.ty);
                remember(&mut existing.previous_types, superseded);
                changed = true;
            }
            changed |= overwrite(&mut existing.documentation, incoming.documentation);
            changed |= overwrite(&mut existing.required, incoming.required);
            changed |= overwrite(&mut existing.default_value, incoming.default_value);
        }
        Generation::Older => {
            if reconcile(&incoming.ty, &existing.ty) {
                changed |= remember(&mut existing.previous_types, incoming.ty);
            }
            changed |= fill(&mut existing.documentation, incoming.documentation);
            changed |= fill(&mut existing.required, incoming.required);
            changed |= fill(&mut existing.default_value, incoming.default_value);
        }
    }
    for reference in incoming.relationship_refs {
        if !existing.relationship_refs.contains(&reference) {
            existing.relationship_refs.push(reference);
            changed = true;
        }
    }
    changed
}

/// Insert `incoming` under `name`, merging if a declaration already exists.
pub fn merge_into(
    definitions: &mut BTreeMap<String, PropertyDefinition>,
    name: &str,
    incoming: PropertyDefinition,
    generation: Generation,
) -> bool {
    match definitions.get_mut(name) {
        Some(existing) => merge_definition(existing, incoming, generation),
        None => {
            definitions.insert(name.to_string(), incoming);
            true
        }
    }
}

fn remember<T: PartialEq>(history: &mut Vec<T>, value: T) -> bool {
    if history.contains(&value) {
        return false;
    }
    history.push(value);
    true
}

fn overwrite<T: PartialEq>(slot: &mut Option<T>, incoming: Option<T>) -> bool {
    match incoming {
        Some(value) if slot.as_ref() != Some(&value) => {
            *slot = Some(value);
            true
        }
        _ => false,
    }
}

fn fill<T>(slot: &mut Option<T>, incoming: Option<T>) -> bool {
    if slot.is_none() && incoming.is_some() {
        *slot = incoming;
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use specgraph_db::PropertyType;

    #[test]
    fn newer_sources_win_and_keep_history() {
        let mut stored = PropertyDefinition::new(PropertyType::STRING);
        let widened = PropertyType::union([PropertyType::STRING, PropertyType::NUMBER]);
        let changed = merge_definition(
            &mut stored,
            PropertyDefinition::new(widened.clone()).required(true),
            Generation::Newer,
        );
        assert!(changed);
        assert_eq!(stored.ty, widened);
        assert_eq!(stored.previous_types, vec![PropertyType::STRING]);
        assert_eq!(stored.required, Some(true));
    }

    #[test]
    fn older_sources_only_fill_gaps() {
        let mut stored = PropertyDefinition::new(PropertyType::map(PropertyType::STRING))
            .with_documentation("registry docs");
        let changed = merge_definition(
            &mut stored,
            PropertyDefinition::new(PropertyType::JSON)
                .with_documentation("legacy docs")
                .required(false),
            Generation::Older,
        );
        assert!(changed);
        assert_eq!(stored.ty, PropertyType::map(PropertyType::STRING));
        assert_eq!(stored.previous_types, vec![PropertyType::JSON]);
        assert_eq!(stored.documentation.as_deref(), Some("registry docs"));
        assert_eq!(stored.required, Some(false));

        // Merging the same declaration again changes nothing.
        let again = merge_definition(
            &mut stored,
            PropertyDefinition::new(PropertyType::JSON),
            Generation::Older,
        );
        assert!(!again);
    }

    #[test]
    fn unrelated_older_shapes_become_history() {
        let mut defs = BTreeMap::new();
        defs.insert("Port".to_string(), PropertyDefinition::new(PropertyType::STRING));
        let changed = merge_into(
            &mut defs,
            "Port",
            PropertyDefinition::new(PropertyType::NUMBER),
            Generation::Older,
        );
        assert!(changed);
        assert_eq!(defs["Port"].ty, PropertyType::STRING);
        assert_eq!(defs["Port"].previous_types, vec![PropertyType::NUMBER]);
    }

    #[test]
    fn unrelated_newer_shapes_replace() {
        let mut stored = PropertyDefinition::new(PropertyType::NUMBER);
        let list = PropertyType::array(PropertyType::NUMBER);
        assert!(merge_definition(&mut stored, PropertyDefinition::new(list.clone()), Generation::Newer));
        assert_eq!(stored.ty, list);
        assert_eq!(stored.previous_types, vec![PropertyType::NUMBER]);
    }
}
