//! Lenses: a location in a document plus the chain of ancestors above it.

use crate::diff::diff;
use crate::operation::{apply, PatchOperation, PatchRecord};
use crate::pointer::JsonPointer;
use crate::PatchError;
use serde_json::Value;

/// One ancestor of a lens: where it is and what it holds.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub pointer: &'a JsonPointer,
    pub value: &'a Value,
}

#[derive(Debug, Clone)]
struct OwnedFrame<'a> {
    pointer: JsonPointer,
    value: &'a Value,
}

/// A read-only view of one node of a document.
///
/// Patch rules never touch the document directly. They stage edits through
/// [`Lens::record_patch`] (or the helpers built on it); staged edits are applied
/// to a private working copy so that successive edits in one rule compose, and
/// are handed back to the patch set, which applies exactly those operations to
/// the real document. The lens itself always shows the tree as it was when the
/// rule was invoked.
#[derive(Debug)]
pub struct Lens<'a> {
    root: &'a Value,
    value: &'a Value,
    pointer: JsonPointer,
    ancestors: Vec<OwnedFrame<'a>>,
    working: Option<Value>,
    pending: Vec<PatchRecord>,
}

impl<'a> Lens<'a> {
    /// Lens on the document root.
    pub fn root_of(root: &'a Value) -> Self {
        Self {
            root,
            value: root,
            pointer: JsonPointer::root(),
            ancestors: Vec::new(),
            working: None,
            pending: Vec::new(),
        }
    }

    /// Lens on `pointer`, or `None` when it does not resolve.
    pub fn at(root: &'a Value, pointer: &JsonPointer) -> Option<Self> {
        let mut lens = Self::root_of(root);
        for segment in pointer.segments() {
            lens = lens.descend(segment)?;
        }
        Some(lens)
    }

    /// Lens on a direct child; the current node becomes the last ancestor.
    pub fn descend(&self, segment: &str) -> Option<Lens<'a>> {
        let child = match self.value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(crate::pointer::array_index(segment)?)?,
            _ => return None,
        };
        let mut ancestors = self.ancestors.clone();
        ancestors.push(OwnedFrame {
            pointer: self.pointer.clone(),
            value: self.value,
        });
        Some(Lens {
            root: self.root,
            value: child,
            pointer: self.pointer.child(segment),
            ancestors,
            working: None,
            pending: Vec::new(),
        })
    }

    pub fn root(&self) -> &'a Value {
        self.root
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn pointer(&self) -> &JsonPointer {
        &self.pointer
    }

    /// Ancestors from the root down to (excluding) this node.
    pub fn ancestors(&self) -> impl DoubleEndedIterator<Item = Frame<'_>> + '_ {
        self.ancestors.iter().map(|frame| Frame {
            pointer: &frame.pointer,
            value: frame.value,
        })
    }

    pub fn parent(&self) -> Option<Frame<'_>> {
        self.ancestors().next_back()
    }

    /// The segment under which this node hangs off its parent.
    pub fn key(&self) -> Option<&str> {
        self.pointer.last()
    }

    pub fn depth(&self) -> usize {
        self.pointer.len()
    }

    pub fn is_object(&self) -> bool {
        self.value.is_object()
    }

    pub fn is_array(&self) -> bool {
        self.value.is_array()
    }

    /// The node as it looks with this rule's staged edits applied.
    pub fn current(&self) -> Option<&Value> {
        match &self.working {
            Some(working) => self.pointer.resolve(working),
            None => Some(self.value),
        }
    }

    /// Stage one operation (absolute path) under `reason`.
    ///
    /// Fails if the operation does not apply to the document as staged so far;
    /// nothing is recorded in that case.
    pub fn record_patch(
        &mut self,
        reason: impl Into<String>,
        operation: PatchOperation,
    ) -> Result<(), PatchError> {
        let working = self.working.get_or_insert_with(|| self.root.clone());
        match operation {
            // Two-step operations can fail halfway; stage them on a scratch copy.
            PatchOperation::Move { .. } | PatchOperation::Rename { .. } => {
                let mut scratch = working.clone();
                apply(&mut scratch, &operation)?;
                *working = scratch;
            }
            _ => apply(working, &operation)?,
        }
        self.pending.push(PatchRecord::new(reason, operation));
        Ok(())
    }

    /// Clone the node, let `transform` mutate the clone, and record the diff.
    ///
    /// Returns the number of operations recorded; `0` means the transform
    /// was a no-op.
    pub fn update<F>(&mut self, reason: impl Into<String>, transform: F) -> Result<usize, PatchError>
    where
        F: FnOnce(&mut Value),
    {
        let reason = reason.into();
        let before = self
            .current()
            .cloned()
            .ok_or_else(|| PatchError::rule(format!("{} was removed earlier in this rule", self.pointer)))?;
        let mut after = before.clone();
        transform(&mut after);
        let operations = diff(&self.pointer, &before, &after);
        let count = operations.len();
        for operation in operations {
            self.record_patch(reason.clone(), operation)?;
        }
        Ok(count)
    }

    /// Add or replace `key` on this object node.
    pub fn set_key(
        &mut self,
        reason: impl Into<String>,
        key: &str,
        value: Value,
    ) -> Result<(), PatchError> {
        let path = self.pointer.child(key);
        let exists = self
            .current()
            .and_then(|node| node.as_object())
            .map(|map| map.contains_key(key))
            .unwrap_or(false);
        let operation = if exists {
            PatchOperation::Replace { path, value }
        } else {
            PatchOperation::Add { path, value }
        };
        self.record_patch(reason, operation)
    }

    /// Remove `key` from this object node; `false` if it was not there.
    pub fn remove_key(&mut self, reason: impl Into<String>, key: &str) -> Result<bool, PatchError> {
        if !self.has_key(key) {
            return Ok(false);
        }
        let path = self.pointer.child(key);
        self.record_patch(reason, PatchOperation::Remove { path })?;
        Ok(true)
    }

    /// Rename `from` to `to` on this object node; `false` if `from` is absent.
    pub fn rename_key(
        &mut self,
        reason: impl Into<String>,
        from: &str,
        to: &str,
    ) -> Result<bool, PatchError> {
        if !self.has_key(from) {
            return Ok(false);
        }
        if self.has_key(to) {
            return Err(PatchError::rule(format!(
                "cannot rename {from:?} to {to:?} at {}: target key exists",
                self.pointer
            )));
        }
        let operation = PatchOperation::Rename {
            from: self.pointer.child(from),
            path: self.pointer.child(to),
        };
        self.record_patch(reason, operation)?;
        Ok(true)
    }

    fn has_key(&self, key: &str) -> bool {
        self.current()
            .and_then(|node| node.as_object())
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }

    pub fn pending(&self) -> &[PatchRecord] {
        &self.pending
    }

    pub(crate) fn into_pending(self) -> Vec<PatchRecord> {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ancestors_run_from_root_to_parent() {
        let doc = json!({"definitions": {"Tag": {"type": "object"}}});
        let pointer = JsonPointer::parse("/definitions/Tag/type").unwrap();
        let lens = Lens::at(&doc, &pointer).unwrap();

        let chain: Vec<String> = lens.ancestors().map(|f| f.pointer.to_string()).collect();
        assert_eq!(chain, vec!["", "/definitions", "/definitions/Tag"]);
        assert_eq!(lens.parent().unwrap().value, &json!({"type": "object"}));
        assert_eq!(lens.key(), Some("type"));
        assert_eq!(lens.value(), &json!("object"));
    }

    #[test]
    fn unresolvable_pointer_has_no_lens() {
        let doc = json!({"a": 1});
        assert!(Lens::at(&doc, &JsonPointer::parse("/b").unwrap()).is_none());
        assert!(Lens::at(&doc, &JsonPointer::parse("/a/b").unwrap()).is_none());
    }

    #[test]
    fn staged_edits_compose_within_one_rule() {
        let doc = json!({"obj": {"a": 1}});
        let mut lens = Lens::at(&doc, &JsonPointer::parse("/obj").unwrap()).unwrap();

        lens.rename_key("rename a", "a", "b").unwrap();
        lens.update("bump b", |v| v["b"] = json!(2)).unwrap();

        assert_eq!(lens.value(), &json!({"a": 1}), "lens still shows the original");
        assert_eq!(lens.current(), Some(&json!({"b": 2})));
        let ops: Vec<&str> = lens.pending().iter().map(|r| r.operation.name()).collect();
        assert_eq!(ops, vec!["rename", "replace"]);
    }

    #[test]
    fn rename_onto_existing_key_is_refused() {
        let doc = json!({"a": 1, "b": 2});
        let mut lens = Lens::root_of(&doc);
        assert!(lens.rename_key("clash", "a", "b").is_err());
        assert!(lens.pending().is_empty());
    }

    #[test]
    fn failed_record_leaves_no_trace() {
        let doc = json!({"a": 1});
        let mut lens = Lens::root_of(&doc);
        let err = lens.record_patch(
            "bogus",
            PatchOperation::Remove {
                path: JsonPointer::parse("/missing").unwrap(),
            },
        );
        assert!(err.is_err());
        assert!(lens.pending().is_empty());
    }
}
