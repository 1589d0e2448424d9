#![forbid(unsafe_code)]

//! Operation ids and the pending set.
//!
//! An id is in the [`PendingSet`] from the moment its operation is queued
//! until its action has finished running (successfully or not). Membership
//! means "reject any further submission with this id".

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

/// Caller-chosen operation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(String);

impl OpId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for OpId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OpId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OpId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for OpId {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

/// Ids of operations currently queued or executing. Each id appears at most
/// once.
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    ids: HashSet<OpId>,
}

impl PendingSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id`. Returns `false` (and changes nothing) if it is already pending.
    pub fn insert(&mut self, id: OpId) -> bool {
        self.ids.insert(id)
    }

    /// Remove `id`. Returns whether it was pending.
    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
