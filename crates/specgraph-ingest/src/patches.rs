//! Built-in patch sets for known upstream defects.

use serde_json::{json, Value};
use specgraph_patch::{for_each_object, PatchSet, PatchSets};

/// Canonical spelling of legacy primitive type names.
fn canonical_primitive(name: &str) -> Option<&'static str> {
    let canonical = match name.to_ascii_lowercase().as_str() {
        "string" => "String",
        "long" => "Long",
        "integer" => "Integer",
        "double" => "Double",
        "boolean" => "Boolean",
        "timestamp" => "Timestamp",
        "json" => "Json",
        _ => return None,
    };
    (canonical != name).then_some(canonical)
}

const PRIMITIVE_KEYS: &[&str] = &["PrimitiveType", "PrimitiveItemType"];

pub fn registry_patches() -> PatchSet {
    PatchSet::new("registry-schema-hygiene")
        .with(
            "collapse-singleton-type-arrays",
            for_each_object(
                |lens| {
                    lens.value()
                        .get("type")
                        .and_then(Value::as_array)
                        .is_some_and(|types| types.len() == 1)
                },
                "a one-element type list is a plain type",
                |node| {
                    if let Some(only) = node["type"].as_array().and_then(|types| types.first()).cloned() {
                        node["type"] = only;
                    }
                },
            ),
        )
        .with(
            "drop-empty-required",
            for_each_object(
                |lens| lens.value().get("required") == Some(&json!([])),
                "an empty required list carries no information",
                |node| {
                    if let Some(map) = node.as_object_mut() {
                        map.remove("required");
                    }
                },
            ),
        )
        .with(
            "strip-schema-comments",
            for_each_object(
                |lens| lens.value().get("$comment").is_some(),
                "schema comments are not part of the model",
                |node| {
                    if let Some(map) = node.as_object_mut() {
                        map.remove("$comment");
                    }
                },
            ),
        )
}

/// Shared by the legacy and SAM specifications, which use the same format.
pub fn legacy_patches(name: &str) -> PatchSet {
    PatchSet::new(name)
        .with(
            "canonical-primitive-casing",
            for_each_object(
                |lens| {
                    PRIMITIVE_KEYS.iter().any(|key| {
                        lens.value()
                            .get(*key)
                            .and_then(Value::as_str)
                            .and_then(canonical_primitive)
                            .is_some()
                    })
                },
                "primitive type names are case sensitive",
                |node| {
                    for key in PRIMITIVE_KEYS {
                        let fixed = node.get(*key).and_then(Value::as_str).and_then(canonical_primitive);
                        if let Some(fixed) = fixed {
                            node[*key] = json!(fixed);
                        }
                    }
                },
            ),
        )
        .with(
            "json-item-type-is-primitive",
            for_each_object(
                |lens| lens.value().get("ItemType") == Some(&json!("Json")),
                "Json is a primitive item type, not a property type",
                |node| {
                    if let Some(map) = node.as_object_mut() {
                        map.remove("ItemType");
                        map.insert("PrimitiveItemType".into(), json!("Json"));
                    }
                },
            ),
        )
}

/// Every built-in patch set, in application order.
pub fn builtin_patch_sets() -> PatchSets {
    PatchSets::new()
        .with("registry", registry_patches())
        .with("legacy", legacy_patches("legacy-spec-hygiene"))
        .with("sam", legacy_patches("sam-spec-hygiene"))
}
