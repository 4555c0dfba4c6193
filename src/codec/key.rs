//! Composite key assembly for the six hexastore orderings.

use crate::codec::escape::escape;

/// The component of a triple a field slot stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Subject,
    Predicate,
    Object,
}

/// One of the six hexastore index orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexTag {
    Spo,
    Sop,
    Pos,
    Pso,
    Ops,
    Osp,
}

impl IndexTag {
    /// All six tags, in alphabetical order by their string form — the order
    /// used to break ties when more than one index matches a pattern.
    pub const ALL_ALPHABETICAL: [IndexTag; 6] = [
        IndexTag::Ops,
        IndexTag::Osp,
        IndexTag::Pos,
        IndexTag::Pso,
        IndexTag::Sop,
        IndexTag::Spo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IndexTag::Spo => "spo",
            IndexTag::Sop => "sop",
            IndexTag::Pos => "pos",
            IndexTag::Pso => "pso",
            IndexTag::Ops => "ops",
            IndexTag::Osp => "osp",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "spo" => IndexTag::Spo,
            "sop" => IndexTag::Sop,
            "pos" => IndexTag::Pos,
            "pso" => IndexTag::Pso,
            "ops" => IndexTag::Ops,
            "osp" => IndexTag::Osp,
            _ => return None,
        })
    }

    /// The component order this tag's key encodes, e.g. `Pos` stores
    /// `(predicate, object, subject)`.
    pub fn field_order(self) -> [Component; 3] {
        use Component::*;
        match self {
            IndexTag::Spo => [Subject, Predicate, Object],
            IndexTag::Sop => [Subject, Object, Predicate],
            IndexTag::Pos => [Predicate, Object, Subject],
            IndexTag::Pso => [Predicate, Subject, Object],
            IndexTag::Ops => [Object, Predicate, Subject],
            IndexTag::Osp => [Object, Subject, Predicate],
        }
    }

    /// Reorders `(s, p, o)` into this tag's storage order.
    pub fn order_fields<'a>(self, s: &'a [u8], p: &'a [u8], o: &'a [u8]) -> [&'a [u8]; 3] {
        self.field_order().map(|c| match c {
            Component::Subject => s,
            Component::Predicate => p,
            Component::Object => o,
        })
    }
}

/// Chooses the index whose defining order begins with exactly the given set
/// of concrete components. `concrete` must name every component that has a
/// fixed value in the pattern (wildcards and bindings are not concrete).
///
/// With no concrete components, `Spo` is the named default. Otherwise the
/// alphabetically-first tag (by [`IndexTag::ALL_ALPHABETICAL`]) whose
/// defining order's leading `concrete.len()` components equal `concrete` as
/// a set is returned.
pub fn find_index(concrete: &[Component]) -> IndexTag {
    if concrete.is_empty() {
        return IndexTag::Spo;
    }
    let k = concrete.len();
    for tag in IndexTag::ALL_ALPHABETICAL {
        let order = tag.field_order();
        let prefix = &order[..k];
        if components_match_as_set(prefix, concrete) {
            return tag;
        }
    }
    unreachable!("every non-empty subset of {{S,P,O}} has a matching hexastore index")
}

fn components_match_as_set(a: &[Component], b: &[Component]) -> bool {
    a.len() == b.len() && a.iter().all(|c| b.contains(c)) && b.iter().all(|c| a.contains(c))
}

/// Assembles the full key for a complete triple under `tag`:
/// `<tag>::<esc(f1)>::<esc(f2)>::<esc(f3)>`.
pub fn assemble_key(tag: IndexTag, s: &[u8], p: &[u8], o: &[u8]) -> Vec<u8> {
    let fields = tag.order_fields(s, p, o);
    let mut out = Vec::from(tag.as_str().as_bytes());
    for field in fields {
        out.extend_from_slice(b"::");
        out.extend_from_slice(&escape(field));
    }
    out
}

/// Assembles a range-scan prefix for a partial pattern:
/// `<tag>::<esc(c1)>::…::<esc(ck)>::` — a trailing separator always follows
/// the last concrete field, which is what lets [`increment_bytes`] compute a
/// correct "starts with this prefix" exclusive upper bound.
pub fn assemble_prefix(tag: IndexTag, concrete_fields: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::from(tag.as_str().as_bytes());
    out.extend_from_slice(b"::");
    for field in concrete_fields {
        out.extend_from_slice(&escape(field));
        out.extend_from_slice(b"::");
    }
    out
}

/// The smallest byte string strictly greater than every string that has
/// `prefix` as a byte prefix. Returns `None` if `prefix` is empty or
/// consists entirely of `0xFF` bytes, in which case there is no finite
/// upper bound and the caller should scan unbounded instead.
pub fn increment_bytes(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    while let Some(&last) = out.last() {
        if last == 0xFF {
            out.pop();
        } else {
            *out.last_mut().unwrap() += 1;
            return Some(out);
        }
    }
    None
}
