//! Auto-embed + async embed worker drain, driven end-to-end through
//! `Database::put`.

use std::sync::Arc;

use hexavec::options::VectorIndexKind;
use hexavec::vector::embed::{AutoEmbedTargets, Embedder};
use hexavec::vector::VectorId;
use hexavec::{Context, Database, Options};
use tempfile::tempdir;

struct LengthEmbedder;

impl Embedder for LengthEmbedder {
    fn embed(&self, text: &str) -> hexavec::Result<Vec<f32>> {
        let mut v = vec![0.0; 4];
        v[text.len() % 4] = 1.0;
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        4
    }
}

fn triple(s: &str, p: &str, o: &str) -> hexavec::Triple {
    hexavec::Triple::new(s.as_bytes().to_vec(), p.as_bytes().to_vec(), o.as_bytes().to_vec()).unwrap()
}

#[test]
fn putting_a_triple_eventually_embeds_its_object() {
    let dir = tempdir().unwrap();
    let options = Options::new(dir.path())
        .with_vector_index(VectorIndexKind::Flat, 4)
        .with_embedder(Arc::new(LengthEmbedder))
        .with_auto_embed_targets(AutoEmbedTargets::Objects);
    let db = Database::open(options).unwrap();
    let ctx = Context::background();

    db.put(&ctx, triple("alice", "likes", "tea")).unwrap();
    db.wait_for_embeddings(&ctx).unwrap();

    assert_eq!(db.pending_embeddings(), 0);
    assert!(db.get_vector(&VectorId::object(b"tea")).unwrap().is_some());
    assert!(db.get_vector(&VectorId::subject(b"alice")).unwrap().is_none());
}

#[test]
fn no_auto_embed_targets_means_no_vectors_are_created() {
    let dir = tempdir().unwrap();
    let options = Options::new(dir.path())
        .with_vector_index(VectorIndexKind::Flat, 4)
        .with_embedder(Arc::new(LengthEmbedder));
    let db = Database::open(options).unwrap();
    let ctx = Context::background();

    db.put(&ctx, triple("alice", "likes", "tea")).unwrap();
    db.wait_for_embeddings(&ctx).unwrap();

    assert!(db.get_vector(&VectorId::object(b"tea")).unwrap().is_none());
}
