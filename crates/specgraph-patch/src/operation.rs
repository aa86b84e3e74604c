//! Patch operations, provenance records and their application.

use crate::pointer::{array_index, JsonPointer};
use crate::PatchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One elementary edit, serialized the JSON-Patch way.
///
/// `rename` is a `move` restricted to a single parent object; it is kept as
/// its own operation so the log says what the rule meant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: JsonPointer, value: Value },
    Remove { path: JsonPointer },
    Replace { path: JsonPointer, value: Value },
    Move { from: JsonPointer, path: JsonPointer },
    Rename { from: JsonPointer, path: JsonPointer },
}

impl PatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            PatchOperation::Add { .. } => "add",
            PatchOperation::Remove { .. } => "remove",
            PatchOperation::Replace { .. } => "replace",
            PatchOperation::Move { .. } => "move",
            PatchOperation::Rename { .. } => "rename",
        }
    }

    /// The location the operation writes to.
    pub fn path(&self) -> &JsonPointer {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::Move { path, .. }
            | PatchOperation::Rename { path, .. } => path,
        }
    }

    /// Re-root the operation under `base` (used when a transform was diffed
    /// against a detached subtree).
    pub fn rebased(self, base: &JsonPointer) -> Self {
        let join = |p: JsonPointer| {
            let mut out = base.clone();
            for segment in p.segments() {
                out.push(segment.clone());
            }
            out
        };
        match self {
            PatchOperation::Add { path, value } => PatchOperation::Add {
                path: join(path),
                value,
            },
            PatchOperation::Remove { path } => PatchOperation::Remove { path: join(path) },
            PatchOperation::Replace { path, value } => PatchOperation::Replace {
                path: join(path),
                value,
            },
            PatchOperation::Move { from, path } => PatchOperation::Move {
                from: join(from),
                path: join(path),
            },
            PatchOperation::Rename { from, path } => PatchOperation::Rename {
                from: join(from),
                path: join(path),
            },
        }
    }
}

/// A patch operation together with the reason it was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchRecord {
    #[serde(flatten)]
    pub operation: PatchOperation,
    pub reason: String,
}

impl PatchRecord {
    pub fn new(reason: impl Into<String>, operation: PatchOperation) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }

    pub fn path(&self) -> &JsonPointer {
        self.operation.path()
    }
}

/// Ordered audit trail of every patch applied to one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchLog {
    records: Vec<PatchRecord>,
}

impl PatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: PatchRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, other: PatchLog) {
        self.records.extend(other.records);
    }

    pub fn records(&self) -> &[PatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct reasons in first-use order.
    pub fn reasons(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for record in &self.records {
            if !out.contains(&record.reason) {
                out.push(record.reason.clone());
            }
        }
        out
    }

    /// Apply every recorded operation, in order, to `doc`.
    pub fn replay(&self, doc: &mut Value) -> Result<(), PatchError> {
        for record in &self.records {
            apply(doc, &record.operation)?;
        }
        Ok(())
    }
}

pub fn apply_all<'a, I>(doc: &mut Value, operations: I) -> Result<(), PatchError>
where
    I: IntoIterator<Item = &'a PatchOperation>,
{
    for op in operations {
        apply(doc, op)?;
    }
    Ok(())
}

pub fn apply(doc: &mut Value, op: &PatchOperation) -> Result<(), PatchError> {
    match op {
        PatchOperation::Add { path, value } => add(doc, op, path, value.clone()),
        PatchOperation::Remove { path } => remove(doc, op, path).map(|_| ()),
        PatchOperation::Replace { path, value } => {
            let slot = path
                .resolve_mut(doc)
                .ok_or_else(|| inapplicable(op, path, "target does not exist"))?;
            *slot = value.clone();
            Ok(())
        }
        PatchOperation::Move { from, path } => {
            if path.starts_with(from) && path != from {
                return Err(inapplicable(op, path, "cannot move a value into itself"));
            }
            let value = remove(doc, op, from)?;
            add(doc, op, path, value)
        }
        PatchOperation::Rename { from, path } => {
            if from.parent() != path.parent() || from.is_root() {
                return Err(inapplicable(op, path, "rename must stay within one object"));
            }
            let view: &Value = doc;
            let parent = from.parent().and_then(|p| p.resolve(view));
            if !matches!(parent, Some(Value::Object(_))) {
                return Err(inapplicable(op, path, "rename parent is not an object"));
            }
            let value = remove(doc, op, from)?;
            add(doc, op, path, value)
        }
    }
}

fn inapplicable(op: &PatchOperation, path: &JsonPointer, message: &str) -> PatchError {
    PatchError::Inapplicable {
        op: op.name(),
        path: path.to_string(),
        message: message.to_string(),
    }
}

fn add(doc: &mut Value, op: &PatchOperation, path: &JsonPointer, value: Value) -> Result<(), PatchError> {
    let (Some(parent), Some(key)) = (path.parent(), path.last()) else {
        *doc = value;
        return Ok(());
    };
    let container = parent
        .resolve_mut(doc)
        .ok_or_else(|| inapplicable(op, path, "parent does not exist"))?;
    match container {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            if key == "-" {
                items.push(value);
                return Ok(());
            }
            let index = array_index(key)
                .filter(|&i| i <= items.len())
                .ok_or_else(|| inapplicable(op, path, "array index out of range"))?;
            items.insert(index, value);
            Ok(())
        }
        _ => Err(inapplicable(op, path, "parent is not a container")),
    }
}

fn remove(doc: &mut Value, op: &PatchOperation, path: &JsonPointer) -> Result<Value, PatchError> {
    let (Some(parent), Some(key)) = (path.parent(), path.last()) else {
        return Err(inapplicable(op, path, "cannot remove the document root"));
    };
    let container = parent
        .resolve_mut(doc)
        .ok_or_else(|| inapplicable(op, path, "parent does not exist"))?;
    match container {
        Value::Object(map) => map
            .remove(key)
            .ok_or_else(|| inapplicable(op, path, "key does not exist")),
        Value::Array(items) => {
            let index = array_index(key)
                .filter(|&i| i < items.len())
                .ok_or_else(|| inapplicable(op, path, "array index out of range"))?;
            Ok(items.remove(index))
        }
        _ => Err(inapplicable(op, path, "parent is not a container")),
    }
}
