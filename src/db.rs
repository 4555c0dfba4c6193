//! The top-level `Database`: owns every subsystem, created at open and
//! torn down at close.

use std::sync::{Arc, Mutex, RwLock};

use tracing::instrument;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::facets::Facets;
use crate::hexastore::Hexastore;
use crate::journal::{Journal, JournalEntry, ReplayTarget};
use crate::kv::redb_store::RedbStore;
use crate::kv::KvStore;
use crate::navigator::Navigator;
use crate::options::{Options, VectorIndexKind};
use crate::search::{Search, SearchOptions};
use crate::triple::{Pattern, Solution, Triple};
use crate::vector::embed::{dedupe_auto_embed_targets, AutoEmbedTargets};
use crate::vector::flat::FlatIndex;
use crate::vector::hnsw::{HNSWIndex, HnswParams};
use crate::vector::worker::EmbedWorker;
use crate::vector::{ScoredId, VectorId, VectorIndex, VectorStore};

/// An open embedded graph database.
pub struct Database {
    kv: Arc<dyn KvStore>,
    hexastore: Arc<Hexastore>,
    journal: Arc<Journal>,
    facets: Facets,
    vector_store: Option<Arc<VectorStore>>,
    embed_worker: Option<Mutex<EmbedWorker>>,
    auto_embed_targets: AutoEmbedTargets,
    default_pattern_limit: Option<usize>,
    closed: RwLock<bool>,
}

impl Database {
    /// Opens (creating if needed) a database at `options.data_path()`.
    ///
    /// Every subsystem is created here: the KV store, the hexastore, the
    /// journal (recovering its sequence counter), the facet table, and —
    /// if configured — a vector index rebuilt from persisted `vec::*`
    /// records and an async embed worker.
    #[instrument(skip(options))]
    pub fn open(options: Options) -> Result<Self> {
        std::fs::create_dir_all(options.data_path())?;
        let kv: Arc<dyn KvStore> = Arc::new(RedbStore::open(options.data_path().join("hexavec.redb"))?);

        let hexastore = Arc::new(Hexastore::new(Arc::clone(&kv)));
        let journal = Arc::new(Journal::open(Arc::clone(&kv))?);
        let facets = Facets::new(Arc::clone(&kv));

        let vector_store = match options.vector() {
            Some(config) => {
                if let Some(embedder) = options.embedder() {
                    if embedder.dimensions() != config.dimensions {
                        return Err(Error::DimensionMismatch {
                            expected: config.dimensions,
                            actual: embedder.dimensions(),
                        });
                    }
                }
                let index: Arc<dyn VectorIndex> = match config.kind {
                    VectorIndexKind::Flat => Arc::new(FlatIndex::new(config.dimensions)),
                    VectorIndexKind::Hnsw {
                        m,
                        ef_construction,
                        ef_search,
                        seed,
                    } => Arc::new(HNSWIndex::new(HnswParams::new(m, ef_construction, ef_search, seed, config.dimensions))),
                };
                let store = Arc::new(VectorStore::new(Arc::clone(&kv), index));
                store.load_vectors()?;
                Some(store)
            }
            None => None,
        };

        let embed_worker = match (&vector_store, options.embedder(), options.auto_embed_targets()) {
            (Some(store), Some(embedder), targets) if targets != AutoEmbedTargets::None => {
                Some(Mutex::new(EmbedWorker::spawn(
                    Arc::clone(store),
                    Arc::clone(embedder),
                    options.embed_queue_capacity(),
                )))
            }
            _ => None,
        };

        Ok(Self {
            kv,
            hexastore,
            journal,
            facets,
            vector_store,
            embed_worker,
            auto_embed_targets: options.auto_embed_targets(),
            default_pattern_limit: options.default_pattern_limit(),
            closed: RwLock::new(false),
        })
    }

    fn check_open(&self) -> Result<()> {
        if *self.closed.read().unwrap() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Inserts `triple`, returning `false` if it was already present.
    /// Journaled atomically with the index write; auto-embeds configured
    /// components (synchronously, or handed to the embed worker if one is
    /// running).
    #[instrument(skip(self, ctx, triple))]
    pub fn put(&self, ctx: &Context, triple: Triple) -> Result<bool> {
        self.check_open()?;
        ctx.check()?;
        let inserted = self.hexastore.insert_with_journal(&self.journal, &triple)?;
        if inserted {
            self.auto_embed(std::slice::from_ref(&triple));
        }
        Ok(inserted)
    }

    /// Inserts every triple in `triples`, deduping auto-embed targets
    /// across the whole batch before dispatching them.
    #[instrument(skip(self, ctx, triples))]
    pub fn put_batch(&self, ctx: &Context, triples: &[Triple]) -> Result<usize> {
        self.check_open()?;
        let mut inserted = Vec::with_capacity(triples.len());
        for triple in triples {
            ctx.check()?;
            if self.hexastore.insert_with_journal(&self.journal, triple)? {
                inserted.push(triple.clone());
            }
        }
        self.auto_embed(&inserted);
        Ok(inserted.len())
    }

    fn auto_embed(&self, triples: &[Triple]) {
        if self.auto_embed_targets == AutoEmbedTargets::None || triples.is_empty() {
            return;
        }
        let targets = dedupe_auto_embed_targets(self.auto_embed_targets, triples);
        if targets.is_empty() {
            return;
        }
        if let Some(worker) = &self.embed_worker {
            worker.lock().unwrap().submit(targets);
        }
        // Without a worker, auto-embed is simply not performed: an
        // `Embedder` is required for both the synchronous and async paths,
        // and `embed_worker` is only `None` when no embedder is configured.
    }

    /// Removes `triple`, returning `false` if it was not present. Cascades
    /// to the triple's own facets; component-level facets are untouched,
    /// since other triples may still reference that component.
    #[instrument(skip(self, ctx, triple))]
    pub fn del(&self, ctx: &Context, triple: &Triple) -> Result<bool> {
        self.check_open()?;
        ctx.check()?;
        let removed = self.hexastore.remove_with_journal(&self.journal, triple)?;
        if removed {
            self.facets.delete_all_for_triple(triple)?;
        }
        Ok(removed)
    }

    /// All triples matching `pattern`.
    #[instrument(skip(self, ctx, pattern))]
    pub fn get(&self, ctx: &Context, pattern: &Pattern) -> Result<Vec<Triple>> {
        self.check_open()?;
        ctx.check()?;
        self.hexastore.query(pattern)
    }

    /// Every stored triple, via a fully-wildcard pattern.
    pub fn all(&self, ctx: &Context) -> Result<Vec<Triple>> {
        self.get(ctx, &Pattern::new(
            crate::triple::PatternValue::Wildcard,
            crate::triple::PatternValue::Wildcard,
            crate::triple::PatternValue::Wildcard,
        ))
    }

    /// Total number of distinct stored triples.
    pub fn len(&self) -> Result<usize> {
        self.hexastore.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.hexastore.is_empty()
    }

    /// Runs a multi-pattern join, applying `self`'s configured default
    /// pattern limit to `options` if it doesn't already set one.
    #[instrument(skip(self, ctx, patterns, options))]
    pub fn search(&self, ctx: &Context, patterns: Vec<Pattern>, mut options: SearchOptions) -> Result<Vec<Solution>> {
        self.check_open()?;
        if options.limit.is_none() {
            options.limit = self.default_pattern_limit;
        }
        Search::new(Arc::clone(&self.hexastore), patterns, options).solutions(ctx)
    }

    /// A fluent traversal builder rooted at `start`.
    pub fn nav(&self, start: impl Into<Vec<u8>>) -> Navigator {
        Navigator::new(Arc::clone(&self.hexastore), start.into())
    }

    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    fn vector_store(&self) -> Result<&Arc<VectorStore>> {
        self.vector_store.as_ref().ok_or(Error::VectorsDisabled)
    }

    /// A handle to the configured vector store, for building a
    /// [`crate::vector::hybrid::VectorFilter`] to attach to a [`SearchOptions`].
    pub fn vector_store_handle(&self) -> Result<Arc<VectorStore>> {
        self.vector_store().map(Arc::clone)
    }

    pub fn set_vector(&self, id: VectorId, vector: Vec<f32>) -> Result<()> {
        self.check_open()?;
        self.vector_store()?.set_vector(id, vector)
    }

    pub fn get_vector(&self, id: &VectorId) -> Result<Option<Vec<f32>>> {
        self.check_open()?;
        self.vector_store()?.get_vector(id)
    }

    pub fn delete_vector(&self, id: &VectorId) -> Result<()> {
        self.check_open()?;
        self.vector_store()?.delete_vector(id)
    }

    pub fn search_vectors(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        self.check_open()?;
        self.vector_store()?.search(query, k)
    }

    /// Blocks until the async embed queue drains, or `ctx` cancels. A
    /// no-op if no embed worker is configured.
    pub fn wait_for_embeddings(&self, ctx: &Context) -> Result<()> {
        match &self.embed_worker {
            Some(worker) => worker.lock().unwrap().wait_for_embeddings(ctx),
            None => Ok(()),
        }
    }

    pub fn pending_embeddings(&self) -> usize {
        match &self.embed_worker {
            Some(worker) => worker.lock().unwrap().pending_embeddings(),
            None => 0,
        }
    }

    /// All journal entries with timestamp `>= since`.
    pub fn journal_entries_since(&self, since: time::OffsetDateTime) -> Result<Vec<JournalEntry>> {
        self.journal.entries_since(since)
    }

    /// Deletes journal entries older than `before`.
    pub fn journal_trim(&self, before: time::OffsetDateTime) -> Result<usize> {
        self.journal.trim(before)
    }

    /// Replays this database's journal onto itself, re-applying every
    /// entry via direct index mutation (bypassing the journal, so replay
    /// never re-journals what it replays).
    pub fn replay_journal(&self) -> Result<usize> {
        self.journal.replay(self)
    }

    /// Closes the database: drains the embed queue (if any) and marks the
    /// instance closed. Further calls fail with `Closed`.
    #[instrument(skip(self))]
    pub fn close(&self, ctx: &Context) -> Result<()> {
        let mut closed = self.closed.write().unwrap();
        if *closed {
            return Ok(());
        }
        if let Some(worker) = &self.embed_worker {
            worker.lock().unwrap().wait_for_embeddings(ctx)?;
        }
        *closed = true;
        Ok(())
    }
}

impl ReplayTarget for Database {
    fn apply_put(&self, triple: &Triple) -> Result<()> {
        self.hexastore.insert(triple).map(|_| ())
    }

    fn apply_del(&self, triple: &Triple) -> Result<()> {
        if self.hexastore.remove(triple)? {
            self.facets.delete_all_for_triple(triple)?;
        }
        Ok(())
    }
}
