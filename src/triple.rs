//! The core data model: stored triples, match patterns, and the variable
//! bindings a pattern match produces.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Three non-empty, opaque byte strings. Equality and ordering are
/// componentwise; no interpretation is placed on the bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    subject: Vec<u8>,
    predicate: Vec<u8>,
    object: Vec<u8>,
}

impl Triple {
    /// Builds a triple, rejecting any empty component.
    pub fn new(subject: Vec<u8>, predicate: Vec<u8>, object: Vec<u8>) -> Result<Self> {
        if subject.is_empty() {
            return Err(Error::InvalidTriple("subject must not be empty"));
        }
        if predicate.is_empty() {
            return Err(Error::InvalidTriple("predicate must not be empty"));
        }
        if object.is_empty() {
            return Err(Error::InvalidTriple("object must not be empty"));
        }
        Ok(Self {
            subject,
            predicate,
            object,
        })
    }

    pub fn subject(&self) -> &[u8] {
        &self.subject
    }

    pub fn predicate(&self) -> &[u8] {
        &self.predicate
    }

    pub fn object(&self) -> &[u8] {
        &self.object
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        (self.subject, self.predicate, self.object)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            String::from_utf8_lossy(&self.subject),
            String::from_utf8_lossy(&self.predicate),
            String::from_utf8_lossy(&self.object)
        )
    }
}

/// A variable name used in a pattern or navigator binding.
pub type Variable = String;

/// One slot of a [`Pattern`]: a fixed value, an unconstrained wildcard, or
/// a named binding that captures whatever value matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternValue {
    Wildcard,
    Exact(Vec<u8>),
    Binding(Variable),
}

impl PatternValue {
    pub fn exact(bytes: impl Into<Vec<u8>>) -> Self {
        PatternValue::Exact(bytes.into())
    }

    pub fn binding(name: impl Into<Variable>) -> Self {
        PatternValue::Binding(name.into())
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, PatternValue::Exact(_))
    }
}

/// A mapping from variable name to the bytes it is bound to. Once a
/// variable is bound, rebinding it to a different value is rejected: a
/// pattern match that would disagree with an existing binding simply does
/// not match, it does not silently overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    bindings: BTreeMap<Variable, Vec<u8>>,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.bindings.get(name).map(|v| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Binds `name` to `value`, returning a new `Solution`.
    ///
    /// If `name` is already bound, this succeeds only when the existing
    /// binding is byte-for-byte equal to `value`; otherwise it returns
    /// `None` and the caller must treat the candidate as a non-match rather
    /// than mutate the existing binding.
    pub fn bind(&self, name: &str, value: &[u8]) -> Option<Self> {
        if let Some(existing) = self.bindings.get(name) {
            return if existing.as_slice() == value {
                Some(self.clone())
            } else {
                None
            };
        }
        let mut next = self.clone();
        next.bindings.insert(name.to_string(), value.to_vec());
        Some(next)
    }
}

/// A predicate applied to each matched triple before it is bound into a
/// solution, per the pattern iterator's filter step.
pub type TripleFilter = std::sync::Arc<dyn Fn(&Triple) -> bool + Send + Sync>;

/// A match pattern over stored triples: each slot is a wildcard, an exact
/// value, or a named binding. Patterns are immutable once built.
#[derive(Clone)]
pub struct Pattern {
    subject: PatternValue,
    predicate: PatternValue,
    object: PatternValue,
    filter: Option<TripleFilter>,
    limit: Option<usize>,
    offset: usize,
    reverse: bool,
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("subject", &self.subject)
            .field("predicate", &self.predicate)
            .field("object", &self.object)
            .field("has_filter", &self.filter.is_some())
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("reverse", &self.reverse)
            .finish()
    }
}

impl Pattern {
    pub fn new(subject: PatternValue, predicate: PatternValue, object: PatternValue) -> Self {
        Self {
            subject,
            predicate,
            object,
            filter: None,
            limit: None,
            offset: 0,
            reverse: false,
        }
    }

    pub fn subject(&self) -> &PatternValue {
        &self.subject
    }

    pub fn predicate(&self) -> &PatternValue {
        &self.predicate
    }

    pub fn object(&self) -> &PatternValue {
        &self.object
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn filter(&self) -> Option<&TripleFilter> {
        self.filter.as_ref()
    }

    pub fn with_filter(mut self, filter: impl Fn(&Triple) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(std::sync::Arc::new(filter));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_components() {
        assert!(Triple::new(vec![], b"p".to_vec(), b"o".to_vec()).is_err());
        assert!(Triple::new(b"s".to_vec(), vec![], b"o".to_vec()).is_err());
        assert!(Triple::new(b"s".to_vec(), b"p".to_vec(), vec![]).is_err());
    }

    #[test]
    fn bind_is_monotonic() {
        let solution = Solution::new();
        let bound = solution.bind("x", b"alice").unwrap();
        assert_eq!(bound.get("x"), Some(&b"alice"[..]));

        // Rebinding to the same value succeeds.
        let same = bound.bind("x", b"alice").unwrap();
        assert_eq!(same, bound);

        // Rebinding to a different value fails rather than overwriting.
        assert!(bound.bind("x", b"bob").is_none());
    }

    #[test]
    fn solution_bindings_are_independent() {
        let a = Solution::new().bind("x", b"1").unwrap();
        let b = a.bind("y", b"2").unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
    }
}
