//! Bounded async embed queue: `put` hands off auto-embed targets without
//! waiting; one background thread embeds and writes them through the same
//! `set_vector` path a synchronous caller would use.

use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::{instrument, warn};

use crate::context::Context;
use crate::error::Result;
use crate::vector::embed::Embedder;
use crate::vector::{IdKind, VectorStore};

type Target = (IdKind, Vec<u8>);

struct Shared {
    pending: Mutex<usize>,
    drained: Condvar,
}

impl Shared {
    fn increment(&self) {
        *self.pending.lock().unwrap() += 1;
    }

    fn decrement(&self) {
        let mut pending = self.pending.lock().unwrap();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }
}

/// Embeds `target` and writes it through `set_vector`, unless a vector
/// already exists at that id. Failures are logged, never propagated.
fn process_one(store: &VectorStore, embedder: &dyn Embedder, target: Target) {
    let (kind, bytes) = target;
    let id = kind.build(&bytes);
    match store.get_vector(&id) {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(err) => {
            warn!(error = %err, "auto-embed: failed to check existing vector");
            return;
        }
    }
    let text = String::from_utf8_lossy(&bytes);
    let vector = match embedder.embed(&text) {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, "auto-embed: embedder failed");
            return;
        }
    };
    if let Err(err) = store.set_vector(id, vector) {
        warn!(error = %err, "auto-embed: failed to store vector");
    }
}

/// One bounded MPSC channel plus one worker thread, matching the
/// "bounded channel, one worker task, a join handle retained by the
/// database" framing: `close`/`Drop` drop the sender and join the handle.
pub struct EmbedWorker {
    sender: Option<SyncSender<Target>>,
    shared: Arc<Shared>,
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    handle: Option<JoinHandle<()>>,
}

impl EmbedWorker {
    pub fn spawn(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>, capacity: usize) -> Self {
        let (sender, receiver) = sync_channel::<Target>(capacity.max(1));
        let shared = Arc::new(Shared {
            pending: Mutex::new(0),
            drained: Condvar::new(),
        });

        let worker_store = Arc::clone(&store);
        let worker_embedder = Arc::clone(&embedder);
        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::spawn(move || {
            while let Ok(target) = receiver.recv() {
                process_one(&worker_store, worker_embedder.as_ref(), target);
                worker_shared.decrement();
            }
        });

        Self {
            sender: Some(sender),
            shared,
            store,
            embedder,
            handle: Some(handle),
        }
    }

    /// Submits `targets` for background embedding. Falls back to
    /// synchronous embedding, inline, for any target that would overflow
    /// the bounded queue.
    #[instrument(skip(self, targets))]
    pub fn submit(&self, targets: Vec<Target>) {
        let Some(sender) = &self.sender else {
            for target in targets {
                process_one(&self.store, self.embedder.as_ref(), target);
            }
            return;
        };
        for target in targets {
            self.shared.increment();
            match sender.try_send(target) {
                Ok(()) => {}
                Err(TrySendError::Full(target)) => {
                    process_one(&self.store, self.embedder.as_ref(), target);
                    self.shared.decrement();
                }
                Err(TrySendError::Disconnected(target)) => {
                    process_one(&self.store, self.embedder.as_ref(), target);
                    self.shared.decrement();
                }
            }
        }
    }

    pub fn pending_embeddings(&self) -> usize {
        *self.shared.pending.lock().unwrap()
    }

    /// Blocks until the queue drains or `ctx` is cancelled/expired,
    /// polling the context between short waits on the drain condvar.
    pub fn wait_for_embeddings(&self, ctx: &Context) -> Result<()> {
        let mut pending = self.shared.pending.lock().unwrap();
        while *pending > 0 {
            ctx.check()?;
            let (guard, _timeout) = self
                .shared
                .drained
                .wait_timeout(pending, std::time::Duration::from_millis(20))
                .unwrap();
            pending = guard;
        }
        Ok(())
    }

    /// Closes the channel (no further `submit` calls are accepted
    /// asynchronously) and joins the worker thread, draining whatever was
    /// already queued.
    pub fn close(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EmbedWorker {
    fn drop(&mut self) {
        self.close();
    }
}
