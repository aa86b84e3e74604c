//! Patch rules and ordered, named patch sets.

use crate::lens::Lens;
use crate::operation::{apply, PatchLog};
use crate::pointer::JsonPointer;
use crate::PatchError;
use serde_json::Value;

/// A rewrite rule. Invoked once per node; a rule whose precondition does
/// not hold must simply return `Ok(())` without recording anything.
pub trait Patcher: Send + Sync {
    fn patch(&self, lens: &mut Lens<'_>) -> Result<(), PatchError>;
}

impl<F> Patcher for F
where
    F: Fn(&mut Lens<'_>) -> Result<(), PatchError> + Send + Sync,
{
    fn patch(&self, lens: &mut Lens<'_>) -> Result<(), PatchError> {
        self(lens)
    }
}

/// Fires only on the node at exactly `pointer`, and only if it is an object
/// or an array; the transform runs against a clone and the diff is recorded.
pub fn at_pointer<F>(pointer: JsonPointer, reason: &str, transform: F) -> impl Patcher
where
    F: Fn(&mut Value) + Send + Sync,
{
    let reason = reason.to_string();
    move |lens: &mut Lens<'_>| -> Result<(), PatchError> {
        if lens.pointer() != &pointer || !(lens.is_object() || lens.is_array()) {
            return Ok(());
        }
        lens.update(reason.clone(), |value| transform(value))?;
        Ok(())
    }
}

/// Fires on every object node for which `predicate` holds.
pub fn for_each_object<P, F>(predicate: P, reason: &str, transform: F) -> impl Patcher
where
    P: Fn(&Lens<'_>) -> bool + Send + Sync,
    F: Fn(&mut Value) + Send + Sync,
{
    let reason = reason.to_string();
    move |lens: &mut Lens<'_>| -> Result<(), PatchError> {
        if !lens.is_object() || !predicate(lens) {
            return Ok(());
        }
        lens.update(reason.clone(), |value| transform(value))?;
        Ok(())
    }
}

struct NamedPatcher {
    name: String,
    patcher: Box<dyn Patcher>,
}

/// An ordered list of rules applied to one kind of source document.
///
/// Rules run one after another over the whole tree; each rule sees the
/// document as left by the rules before it.
pub struct PatchSet {
    name: String,
    patchers: Vec<NamedPatcher>,
}

impl PatchSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            patchers: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, patcher: impl Patcher + 'static) -> Self {
        self.push(name, patcher);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, patcher: impl Patcher + 'static) {
        self.patchers.push(NamedPatcher {
            name: name.into(),
            patcher: Box::new(patcher),
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.patchers.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.patchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patchers.is_empty()
    }

    /// Run every rule, in order, against `doc`.
    ///
    /// Each rule walks the tree in pre-order. A node's children are listed
    /// only after the rule has run on that node and its edits are applied, so
    /// edits inside the node's own subtree (inserts, removals, renames) never
    /// shift or hide a node still to be visited. Children the rule inserted
    /// are visited too; a rule must not keep matching what it inserts. A rule
    /// error aborts the whole application.
    pub fn apply(&self, doc: &mut Value) -> Result<PatchLog, PatchError> {
        let mut log = PatchLog::new();
        for named in &self.patchers {
            let before = log.len();
            let mut stack = vec![JsonPointer::root()];
            while let Some(pointer) = stack.pop() {
                let Some(mut lens) = Lens::at(doc, &pointer) else {
                    continue;
                };
                if let Err(err) = named.patcher.patch(&mut lens) {
                    return Err(PatchError::Patcher {
                        patch_set: self.name.clone(),
                        patcher: named.name.clone(),
                        pointer: pointer.to_string(),
                        reason_chain: log.reasons(),
                        message: err.to_string(),
                    });
                }
                for record in lens.into_pending() {
                    apply(doc, &record.operation)?;
                    log.push(record);
                }
                if let Some(node) = pointer.resolve(doc) {
                    push_children(&mut stack, &pointer, node);
                }
            }
            tracing::trace!(
                patch_set = %self.name,
                rule = %named.name,
                patches = log.len() - before,
                "applied patch rule"
            );
        }
        Ok(log)
    }
}

impl std::fmt::Debug for PatchSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchSet")
            .field("name", &self.name)
            .field("rules", &self.rule_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Patch sets keyed by the source family they apply to, in application order.
///
/// Built explicitly by the caller; there is no global registration.
#[derive(Debug, Default)]
pub struct PatchSets {
    sets: Vec<(String, PatchSet)>,
}

impl PatchSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl Into<String>, set: PatchSet) -> Self {
        self.register(source, set);
        self
    }

    pub fn register(&mut self, source: impl Into<String>, set: PatchSet) {
        self.sets.push((source.into(), set));
    }

    pub fn for_source<'s>(&'s self, source: &'s str) -> impl Iterator<Item = &'s PatchSet> + 's {
        self.sets
            .iter()
            .filter(move |(family, _)| family == source)
            .map(|(_, set)| set)
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Apply every set registered for `source`, in registration order.
    pub fn apply(&self, source: &str, doc: &mut Value) -> Result<PatchLog, PatchError> {
        let mut log = PatchLog::new();
        for set in self.for_source(source) {
            log.extend(set.apply(doc)?);
        }
        Ok(log)
    }
}

/// Push the children of `node` so that they pop in document order.
fn push_children(stack: &mut Vec<JsonPointer>, pointer: &JsonPointer, node: &Value) {
    match node {
        Value::Object(map) => {
            for key in map.keys().rev() {
                stack.push(pointer.child(key.clone()));
            }
        }
        Value::Array(items) => {
            for index in (0..items.len()).rev() {
                stack.push(pointer.child(index.to_string()));
            }
        }
        _ => {}
    }
}
