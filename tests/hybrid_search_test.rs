//! S3: combining a graph join with a vector similarity filter on one of its
//! bound variables.

use hexavec::options::VectorIndexKind;
use hexavec::vector::hybrid::{VectorFilter, VectorQuery};
use hexavec::vector::{IdKind, VectorId};
use hexavec::{Context, Database, Options, Pattern, PatternValue, SearchOptions};
use tempfile::tempdir;

fn triple(s: &str, p: &str, o: &str) -> hexavec::Triple {
    hexavec::Triple::new(s.as_bytes().to_vec(), p.as_bytes().to_vec(), o.as_bytes().to_vec()).unwrap()
}

#[test]
fn s3_hybrid_filter_narrows_a_join_to_one_embedding_cluster() {
    let dir = tempdir().unwrap();
    let options = Options::new(dir.path()).with_vector_index(VectorIndexKind::Flat, 3);
    let db = Database::open(options).unwrap();
    let ctx = Context::background();

    for (person, sport) in [("alice", "tennis"), ("bob", "tennis"), ("dave", "football")] {
        db.put(&ctx, triple(person, "likes", sport)).unwrap();
    }
    db.set_vector(VectorId::object(b"tennis"), vec![1.0, 0.0, 0.0]).unwrap();
    db.set_vector(VectorId::object(b"badminton"), vec![1.0, 0.0, 0.0]).unwrap();
    db.set_vector(VectorId::object(b"football"), vec![0.0, 1.0, 0.0]).unwrap();

    let patterns = vec![Pattern::new(
        PatternValue::binding("p"),
        PatternValue::exact(b"likes".to_vec()),
        PatternValue::binding("sport"),
    )];
    let filter = VectorFilter::new("sport", VectorQuery::Vector(vec![1.0, 0.0, 0.0]), db.vector_store_handle().unwrap())
        .with_min_score(0.7)
        .with_id_type(IdKind::Object);
    let options = SearchOptions::new().with_vector_filter(filter);

    let solutions = db.search(&ctx, patterns, options).unwrap();
    assert_eq!(solutions.len(), 2);
    for s in &solutions {
        assert_eq!(s.get("sport"), Some(&b"tennis"[..]));
    }
}

#[test]
fn hybrid_filter_with_no_vector_configured_returns_vectors_disabled() {
    let dir = tempdir().unwrap();
    let db = Database::open(Options::new(dir.path())).unwrap();
    assert!(matches!(db.vector_store_handle(), Err(hexavec::Error::VectorsDisabled)));
}
