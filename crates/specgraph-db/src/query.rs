//! Lookup results and the `.only()` uniqueness assertion.

use crate::entity::{Entity, EntityKind};
use crate::id::EntityId;
use crate::relation::{RelationKind, Relationship};
use serde_json::Value;
use std::fmt;
use std::ops::Deref;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equals => f.write_str("equals"),
        }
    }
}

/// A borrowed handle on one stored entity.
pub struct Ref<'db, E> {
    id: EntityId<E>,
    entity: &'db E,
}

impl<'db, E> Ref<'db, E> {
    pub(crate) fn new(id: EntityId<E>, entity: &'db E) -> Self {
        Self { id, entity }
    }

    pub fn id(&self) -> EntityId<E> {
        self.id
    }

    pub fn entity(&self) -> &'db E {
        self.entity
    }
}

impl<E> Clone for Ref<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Ref<'_, E> {}

impl<E> Deref for Ref<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.entity
    }
}

impl<E: fmt::Debug> fmt::Debug for Ref<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id)
            .field("entity", self.entity)
            .finish()
    }
}

/// Outcome of asserting that a query matched exactly one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Only<T> {
    NotFound,
    Ambiguous(usize),
    Found(T),
}

impl<T> Only<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Only::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Only::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Only<U> {
        match self {
            Only::NotFound => Only::NotFound,
            Only::Ambiguous(count) => Only::Ambiguous(count),
            Only::Found(value) => Only::Found(f(value)),
        }
    }
}

/// A uniqueness assumption about the data did not hold.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupViolation {
    #[error("expected exactly one {kind} where {query}, found none")]
    NotFound { kind: EntityKind, query: String },

    #[error("expected exactly one {kind} where {query}, found {count}")]
    Ambiguous {
        kind: EntityKind,
        query: String,
        count: usize,
    },
}

/// Matches of one lookup, in allocation order.
pub struct Lookup<'db, E> {
    query: String,
    matches: Vec<Ref<'db, E>>,
}

impl<'db, E: Entity> Lookup<'db, E> {
    pub(crate) fn new(attribute: &str, operator: Operator, value: &Value, matches: Vec<Ref<'db, E>>) -> Self {
        Self {
            query: format!("{attribute} {operator} {value}"),
            matches,
        }
    }

    /// Human-readable form of the query, e.g. `cloudFormationType equals "AWS::S3::Bucket"`.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn first(&self) -> Option<Ref<'db, E>> {
        self.matches.first().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ref<'db, E>> + '_ {
        self.matches.iter().copied()
    }

    pub fn ids(&self) -> Vec<EntityId<E>> {
        self.matches.iter().map(Ref::id).collect()
    }

    pub fn into_vec(self) -> Vec<Ref<'db, E>> {
        self.matches
    }

    pub fn unique(self) -> Only<Ref<'db, E>> {
        let count = self.matches.len();
        match count {
            0 => Only::NotFound,
            1 => self.matches.into_iter().next().map_or(Only::NotFound, Only::Found),
            _ => Only::Ambiguous(count),
        }
    }

    /// Exactly one match, or a [`LookupViolation`] naming the query.
    pub fn only(self) -> Result<Ref<'db, E>, LookupViolation> {
        let query = self.query.clone();
        match self.unique() {
            Only::Found(found) => Ok(found),
            Only::NotFound => Err(LookupViolation::NotFound {
                kind: E::KIND,
                query,
            }),
            Only::Ambiguous(count) => Err(LookupViolation::Ambiguous {
                kind: E::KIND,
                query,
                count,
            }),
        }
    }
}

impl<'db, E> IntoIterator for Lookup<'db, E> {
    type Item = Ref<'db, E>;
    type IntoIter = std::vec::IntoIter<Ref<'db, E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

/// One hop along a relationship.
pub struct Followed<'db, R: Relationship> {
    pub relation: RelationKind,
    pub entity: Ref<'db, R::Target>,
}

impl<R: Relationship> fmt::Debug for Followed<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Followed")
            .field("relation", &self.relation)
            .field("entity", &self.entity)
            .finish()
    }
}
