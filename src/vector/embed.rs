//! The `Embedder` capability and the auto-embed target policy that decides,
//! for a written triple, which of its components get a vector synthesized.

use std::collections::HashSet;

use crate::error::Result;
use crate::triple::Triple;
use crate::vector::IdKind;

/// Produces float vectors from text. Implementations wrap whatever model a
/// consuming application installs; this crate only invokes the interface.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize;
}

/// Which triple components get an auto-synthesized vector on `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoEmbedTargets {
    #[default]
    None,
    Subjects,
    Predicates,
    Objects,
    All,
}

impl AutoEmbedTargets {
    fn kinds(self) -> &'static [IdKind] {
        match self {
            AutoEmbedTargets::None => &[],
            AutoEmbedTargets::Subjects => &[IdKind::Subject],
            AutoEmbedTargets::Predicates => &[IdKind::Predicate],
            AutoEmbedTargets::Objects => &[IdKind::Object],
            AutoEmbedTargets::All => &[IdKind::Subject, IdKind::Predicate, IdKind::Object],
        }
    }
}

/// Every `(kind, bytes)` pair a single `triple` implies under `targets`.
fn targets_for_triple(targets: AutoEmbedTargets, triple: &Triple) -> Vec<(IdKind, Vec<u8>)> {
    targets
        .kinds()
        .iter()
        .map(|&kind| {
            let bytes = match kind {
                IdKind::Subject => triple.subject(),
                IdKind::Predicate => triple.predicate(),
                IdKind::Object => triple.object(),
                IdKind::Raw => unreachable!("AutoEmbedTargets never produces IdKind::Raw"),
            };
            (kind, bytes.to_vec())
        })
        .collect()
}

/// Every distinct `(kind, bytes)` pair implied across `triples`, deduped so
/// a batch put embeds each component value at most once.
pub fn dedupe_auto_embed_targets(targets: AutoEmbedTargets, triples: &[Triple]) -> Vec<(IdKind, Vec<u8>)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for triple in triples {
        for pair in targets_for_triple(targets, triple) {
            if seen.insert(pair.clone()) {
                out.push(pair);
            }
        }
    }
    out
}
