//! Cooperative cancellation token passed to every public operation that may
//! perform I/O, per the concurrency model's "context/deadline token" design.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::error::{Error, Result};

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// A cheaply cloneable cancellation/deadline token.
///
/// Every public method on [`crate::Database`], [`crate::Search`] and the
/// vector indexes checks a `Context` at entry and at coarse step boundaries
/// (batch boundary, pattern boundary, HNSW layer boundary).
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// A context that never cancels and has no deadline.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// A context that cancels once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
            }),
        }
    }

    /// Returns a handle that, when called, cancels this context and every
    /// clone of it.
    pub fn cancellable() -> (Self, impl Fn() + Clone) {
        let ctx = Self::background();
        let inner = Arc::clone(&ctx.inner);
        let cancel = move || inner.cancelled.store(true, Ordering::SeqCst);
        (ctx, cancel)
    }

    /// Marks this context (and all clones) as cancelled.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns whether this context is already cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.inner.deadline, Some(d) if Instant::now() >= d)
    }

    /// Returns `Err(Error::Cancelled)` if this context is done, else `Ok(())`.
    pub fn check(&self) -> Result<()> {
        if self.is_done() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn background_never_cancels() {
        let ctx = Context::background();
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn explicit_cancel_propagates_to_clones() {
        let ctx = Context::background();
        let clone = ctx.clone();
        ctx.cancel();
        assert!(clone.check().is_err());
    }

    #[test]
    fn deadline_expires() {
        let ctx = Context::with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(ctx.check().is_err());
    }

    #[test]
    fn cancellable_handle_cancels_context() {
        let (ctx, cancel) = Context::cancellable();
        assert!(ctx.check().is_ok());
        cancel();
        assert!(ctx.check().is_err());
    }
}
