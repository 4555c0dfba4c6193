//! End-to-end scenarios exercising `Database` as an external caller would.

use hexavec::{Context, Database, Error, Options, Pattern, PatternValue, SearchOptions};
use tempfile::tempdir;

fn triple(s: &str, p: &str, o: &str) -> hexavec::Triple {
    hexavec::Triple::new(s.as_bytes().to_vec(), p.as_bytes().to_vec(), o.as_bytes().to_vec()).unwrap()
}

#[test]
fn s1_single_pattern_match() {
    let dir = tempdir().unwrap();
    let db = Database::open(Options::new(dir.path())).unwrap();
    let ctx = Context::background();

    db.put(&ctx, triple("alice", "knows", "bob")).unwrap();
    db.put(&ctx, triple("bob", "knows", "carol")).unwrap();

    let pattern = Pattern::new(
        PatternValue::exact(b"alice".to_vec()),
        PatternValue::exact(b"knows".to_vec()),
        PatternValue::Wildcard,
    );
    let results = db.get(&ctx, &pattern).unwrap();
    assert_eq!(results, vec![triple("alice", "knows", "bob")]);
}

#[test]
fn s2_two_pattern_join() {
    let dir = tempdir().unwrap();
    let db = Database::open(Options::new(dir.path())).unwrap();
    let ctx = Context::background();

    for (s, p, o) in [("a", "k", "b"), ("b", "k", "c"), ("a", "k", "c")] {
        db.put(&ctx, triple(s, p, o)).unwrap();
    }

    let patterns = vec![
        Pattern::new(PatternValue::binding("x"), PatternValue::exact(b"k".to_vec()), PatternValue::binding("y")),
        Pattern::new(PatternValue::binding("y"), PatternValue::exact(b"k".to_vec()), PatternValue::binding("z")),
    ];
    let solutions = db.search(&ctx, patterns, SearchOptions::new()).unwrap();
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("x"), Some(&b"a"[..]));
    assert_eq!(solutions[0].get("y"), Some(&b"b"[..]));
    assert_eq!(solutions[0].get("z"), Some(&b"c"[..]));
}

#[test]
fn s4_reopening_with_mismatched_index_dimensions_fails_on_load() {
    let dir = tempdir().unwrap();
    {
        let options = Options::new(dir.path()).with_vector_index(hexavec::options::VectorIndexKind::Flat, 5);
        let db = Database::open(options).unwrap();
        db.set_vector(hexavec::vector::VectorId::raw(b"x".to_vec()), vec![0.0; 5]).unwrap();
    }

    let options = Options::new(dir.path()).with_vector_index(hexavec::options::VectorIndexKind::Flat, 3);
    let err = Database::open(options).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));
}

#[test]
fn s5_trimming_the_journal_past_now_empties_it() {
    let dir = tempdir().unwrap();
    let db = Database::open(Options::new(dir.path())).unwrap();
    let ctx = Context::background();
    db.put(&ctx, triple("a", "b", "c")).unwrap();

    let cutoff = time::OffsetDateTime::now_utc() + time::Duration::seconds(1);
    db.journal_trim(cutoff).unwrap();

    let entries = db.journal_entries_since(time::OffsetDateTime::UNIX_EPOCH).unwrap();
    assert!(entries.is_empty());
}

#[test]
fn journal_replay_reconstructs_an_equivalent_store() {
    let dir = tempdir().unwrap();
    let db = Database::open(Options::new(dir.path())).unwrap();
    let ctx = Context::background();
    db.put(&ctx, triple("a", "k", "b")).unwrap();
    db.put(&ctx, triple("b", "k", "c")).unwrap();
    db.del(&ctx, &triple("a", "k", "b")).unwrap();

    let target_dir = tempdir().unwrap();
    let target = Database::open(Options::new(target_dir.path())).unwrap();
    let replayed = db.journal().replay(&target).unwrap();
    assert_eq!(replayed, 3);

    let mut expected = db.all(&ctx).unwrap();
    let mut actual = target.all(&ctx).unwrap();
    expected.sort();
    actual.sort();
    assert_eq!(expected, actual);
}

#[test]
fn navigator_traverses_two_hops_and_names_the_root() {
    let dir = tempdir().unwrap();
    let db = Database::open(Options::new(dir.path())).unwrap();
    let ctx = Context::background();
    db.put(&ctx, triple("alice", "knows", "bob")).unwrap();
    db.put(&ctx, triple("bob", "likes", "tea")).unwrap();

    let nav = db.nav(b"alice".to_vec()).as_name("start").arch_out("knows").arch_out("likes");
    let solutions = nav.solutions(&ctx).unwrap();
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("start"), Some(&b"alice"[..]));
}
