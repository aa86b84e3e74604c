//! Structural JSON diff.
//!
//! Produces `add`/`remove`/`replace` operations that, applied in order to
//! `old`, yield `new`. Objects are diffed key by key, arrays index by index
//! (trailing surplus removed from the end first so indices stay valid), and
//! anything else that differs is replaced wholesale.

use crate::operation::PatchOperation;
use crate::pointer::JsonPointer;
use serde_json::Value;

pub fn diff(base: &JsonPointer, old: &Value, new: &Value) -> Vec<PatchOperation> {
    let mut out = Vec::new();
    diff_into(base.clone(), old, new, &mut out);
    out
}

fn diff_into(path: JsonPointer, old: &Value, new: &Value, out: &mut Vec<PatchOperation>) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Object(before), Value::Object(after)) => {
            for key in before.keys() {
                if !after.contains_key(key) {
                    out.push(PatchOperation::Remove {
                        path: path.child(key.clone()),
                    });
                }
            }
            for (key, value) in after {
                let child = path.child(key.clone());
                match before.get(key) {
                    Some(previous) => diff_into(child, previous, value, out),
                    None => out.push(PatchOperation::Add {
                        path: child,
                        value: value.clone(),
                    }),
                }
            }
        }
        (Value::Array(before), Value::Array(after)) => {
            let common = before.len().min(after.len());
            for index in 0..common {
                diff_into(path.child(index.to_string()), &before[index], &after[index], out);
            }
            for index in (common..before.len()).rev() {
                out.push(PatchOperation::Remove {
                    path: path.child(index.to_string()),
                });
            }
            for (index, value) in after.iter().enumerate().skip(common) {
                out.push(PatchOperation::Add {
                    path: path.child(index.to_string()),
                    value: value.clone(),
                });
            }
        }
        _ => out.push(PatchOperation::Replace {
            path,
            value: new.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::apply_all;
    use serde_json::json;

    #[test]
    fn identical_documents_produce_nothing() {
        let doc = json!({"a": [1, 2, {"b": null}]});
        assert!(diff(&JsonPointer::root(), &doc, &doc).is_empty());
    }

    #[test]
    fn changed_leaf_is_a_single_replace() {
        let old = json!({"type": "object", "properties": {"Name": {"type": "string"}}});
        let mut new = old.clone();
        new["properties"]["Name"]["type"] = json!("integer");
        let ops = diff(&JsonPointer::root(), &old, &new);
        assert_eq!(
            ops,
            vec![PatchOperation::Replace {
                path: JsonPointer::parse("/properties/Name/type").unwrap(),
                value: json!("integer"),
            }]
        );
    }

    #[test]
    fn shrinking_array_removes_from_the_end() {
        let old = json!([1, 2, 3, 4]);
        let new = json!([1, 9]);
        let ops = diff(&JsonPointer::root(), &old, &new);
        let paths: Vec<String> = ops.iter().map(|op| op.path().to_string()).collect();
        assert_eq!(paths, vec!["/1", "/3", "/2"]);

        let mut replayed = old.clone();
        apply_all(&mut replayed, &ops).unwrap();
        assert_eq!(replayed, new);
    }

    #[test]
    fn base_pointer_prefixes_every_path() {
        let base = JsonPointer::parse("/definitions/Tag").unwrap();
        let ops = diff(&base, &json!({}), &json!({"k": 1}));
        assert_eq!(ops[0].path().to_string(), "/definitions/Tag/k");
    }
}
