//! Structural type algebra for resource properties.
//!
//! `PropertyType` is the canonical representation every source's type
//! vocabulary is converted into. The key relation is [`assignable`]:
//! `assignable(a, b)` answers "may a value of type `b` be used where `a`
//! is expected", and is what lets two sources that describe the same
//! property differently be reconciled.

use crate::entity::TypeDefinitionId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
    Json,
}

impl PrimitiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Json => "json",
        }
    }
}

/// A property type.
///
/// Union members behave as a set: equality ignores member order, and
/// [`PropertyType::union`] drops structural duplicates. A one-member union
/// stays a union until [`PropertyType::collapse`] is called.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "TaggedType", into = "TaggedType")]
pub enum PropertyType {
    Primitive(PrimitiveKind),
    Array(Box<PropertyType>),
    Map(Box<PropertyType>),
    Ref(TypeDefinitionId),
    Union(Vec<PropertyType>),
}

impl PropertyType {
    pub const STRING: PropertyType = PropertyType::Primitive(PrimitiveKind::String);
    pub const NUMBER: PropertyType = PropertyType::Primitive(PrimitiveKind::Number);
    pub const BOOLEAN: PropertyType = PropertyType::Primitive(PrimitiveKind::Boolean);
    pub const JSON: PropertyType = PropertyType::Primitive(PrimitiveKind::Json);

    pub fn array(element: PropertyType) -> Self {
        PropertyType::Array(Box::new(element))
    }

    pub fn map(element: PropertyType) -> Self {
        PropertyType::Map(Box::new(element))
    }

    pub fn reference(target: TypeDefinitionId) -> Self {
        PropertyType::Ref(target)
    }

    /// Build a union, dropping members structurally equal to an earlier one.
    pub fn union(members: impl IntoIterator<Item = PropertyType>) -> Self {
        let mut out: Vec<PropertyType> = Vec::new();
        for member in members {
            if !out.contains(&member) {
                out.push(member);
            }
        }
        PropertyType::Union(out)
    }

    /// Replace a one-member union by its member.
    pub fn collapse(self) -> Self {
        match self {
            PropertyType::Union(mut members) if members.len() == 1 => {
                members.pop().map(PropertyType::collapse).unwrap_or(PropertyType::Union(members))
            }
            other => other,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, PropertyType::Primitive(PrimitiveKind::Json))
    }

    /// Parse the tagged representation (`{"type": "array", "element": ...}`).
    ///
    /// Unknown tags are rejected; nothing is coerced to `json`.
    pub fn from_tagged(value: &Value) -> Result<Self, TypeError> {
        validate_tags(value)?;
        serde_json::from_value(value.clone()).map_err(|e| TypeError::Malformed(e.to_string()))
    }

    /// The tagged representation; the same value serde produces.
    pub fn to_tagged(&self) -> Value {
        match self {
            PropertyType::Primitive(kind) => json!({"type": kind.as_str()}),
            PropertyType::Array(element) => json!({"type": "array", "element": element.to_tagged()}),
            PropertyType::Map(element) => json!({"type": "map", "element": element.to_tagged()}),
            PropertyType::Ref(target) => json!({"type": "ref", "target": target.raw()}),
            PropertyType::Union(members) => {
                let members: Vec<Value> = members.iter().map(PropertyType::to_tagged).collect();
                json!({"type": "union", "members": members})
            }
        }
    }

    /// Every type definition referenced anywhere inside this type.
    pub fn refs(&self) -> Vec<TypeDefinitionId> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs(&self, out: &mut Vec<TypeDefinitionId>) {
        match self {
            PropertyType::Primitive(_) => {}
            PropertyType::Array(element) | PropertyType::Map(element) => element.collect_refs(out),
            PropertyType::Ref(id) => {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            PropertyType::Union(members) => {
                for member in members {
                    member.collect_refs(out);
                }
            }
        }
    }

    /// Identity-free rendering: refs are shown by `name_of`, union members are
    /// sorted. Two types from independent databases render identically iff
    /// they are the same shape over the same named definitions.
    pub fn render_with(&self, name_of: &dyn Fn(TypeDefinitionId) -> String) -> String {
        match self {
            PropertyType::Primitive(kind) => kind.as_str().to_string(),
            PropertyType::Array(element) => format!("Array<{}>", element.render_with(name_of)),
            PropertyType::Map(element) => format!("Map<{}>", element.render_with(name_of)),
            PropertyType::Ref(id) => name_of(*id),
            PropertyType::Union(members) => {
                let mut rendered: Vec<String> =
                    members.iter().map(|m| m.render_with(name_of)).collect();
                rendered.sort();
                format!("({})", rendered.join(" | "))
            }
        }
    }
}

impl PartialEq for PropertyType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyType::Primitive(a), PropertyType::Primitive(b)) => a == b,
            (PropertyType::Array(a), PropertyType::Array(b)) => a == b,
            (PropertyType::Map(a), PropertyType::Map(b)) => a == b,
            (PropertyType::Ref(a), PropertyType::Ref(b)) => a == b,
            (PropertyType::Union(a), PropertyType::Union(b)) => {
                a.iter().all(|m| b.contains(m)) && b.iter().all(|m| a.contains(m))
            }
            _ => false,
        }
    }
}

impl Eq for PropertyType {}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_with(&|id| format!("Ref<{id:?}>")))
    }
}

/// May a value of type `b` be used where `a` is expected?
///
/// 1. identical primitives / identical ref targets are assignable;
/// 2. `json` only accepts `json` (it is not a top type);
/// 3. arrays and 4. maps are covariant in their element and never mix kinds;
/// 5. a union accepts a non-union if any member accepts it;
/// 6. a union accepts a union if every incoming member is accepted by
///    some member;
/// 7. nothing else is assignable.
pub fn assignable(a: &PropertyType, b: &PropertyType) -> bool {
    match (a, b) {
        (PropertyType::Primitive(x), PropertyType::Primitive(y)) => x == y,
        (PropertyType::Ref(x), PropertyType::Ref(y)) => x == y,
        (PropertyType::Array(x), PropertyType::Array(y)) => assignable(x, y),
        (PropertyType::Map(x), PropertyType::Map(y)) => assignable(x, y),
        (PropertyType::Union(slots), PropertyType::Union(incoming)) => incoming
            .iter()
            .all(|t| slots.iter().any(|slot| assignable(slot, t))),
        (PropertyType::Union(slots), t) => slots.iter().any(|slot| assignable(slot, t)),
        _ => false,
    }
}

/// Decide whether `later` supersedes `earlier` for the same property.
///
/// The later declaration wins when the earlier type stays representable in
/// the union of both. That holds for any pair, so a disagreement is never
/// fatal: the caller keeps the losing type as history. Returns `false` only
/// when the types are already equal.
pub fn reconcile(earlier: &PropertyType, later: &PropertyType) -> bool {
    if earlier == later {
        return false;
    }
    let combined = PropertyType::union([earlier.clone(), later.clone()]);
    assignable(&combined, earlier)
}

/// Malformed type values (the algebra's assertion failures).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("unknown property type tag {0:?}")]
    UnknownTag(String),
    #[error("malformed property type: {0}")]
    Malformed(String),
}

const KNOWN_TAGS: &[&str] = &[
    "string", "number", "boolean", "json", "array", "map", "ref", "union",
];

fn validate_tags(value: &Value) -> Result<(), TypeError> {
    let Some(object) = value.as_object() else {
        return Err(TypeError::Malformed(format!("expected an object, got {value}")));
    };
    let tag = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| TypeError::Malformed(format!("missing \"type\" tag in {value}")))?;
    if !KNOWN_TAGS.contains(&tag) {
        return Err(TypeError::UnknownTag(tag.to_string()));
    }
    if let Some(element) = object.get("element") {
        validate_tags(element)?;
    }
    if let Some(Value::Array(members)) = object.get("members") {
        for member in members {
            validate_tags(member)?;
        }
    }
    Ok(())
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
enum TaggedType {
    String,
    Number,
    Boolean,
    Json,
    Array { element: Box<PropertyType> },
    Map { element: Box<PropertyType> },
    Ref { target: TypeDefinitionId },
    Union { members: Vec<PropertyType> },
}

impl From<TaggedType> for PropertyType {
    fn from(tagged: TaggedType) -> Self {
        match tagged {
            TaggedType::String => PropertyType::STRING,
            TaggedType::Number => PropertyType::NUMBER,
            TaggedType::Boolean => PropertyType::BOOLEAN,
            TaggedType::Json => PropertyType::JSON,
            TaggedType::Array { element } => PropertyType::Array(element),
            TaggedType::Map { element } => PropertyType::Map(element),
            TaggedType::Ref { target } => PropertyType::Ref(target),
            TaggedType::Union { members } => PropertyType::union(members),
        }
    }
}

impl From<PropertyType> for TaggedType {
    fn from(ty: PropertyType) -> Self {
        match ty {
            PropertyType::Primitive(PrimitiveKind::String) => TaggedType::String,
            PropertyType::Primitive(PrimitiveKind::Number) => TaggedType::Number,
            PropertyType::Primitive(PrimitiveKind::Boolean) => TaggedType::Boolean,
            PropertyType::Primitive(PrimitiveKind::Json) => TaggedType::Json,
            PropertyType::Array(element) => TaggedType::Array { element },
            PropertyType::Map(element) => TaggedType::Map { element },
            PropertyType::Ref(target) => TaggedType::Ref { target },
            PropertyType::Union(members) => TaggedType::Union { members },
        }
    }
}
