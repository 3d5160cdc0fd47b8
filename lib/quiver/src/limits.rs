use crate::error::StoreError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The evaluation context threaded through every cursor call.
///
/// It carries an externally observable cancellation flag and an optional
/// deadline. Once the context is done, `next`/`contains`/`next_path` return
/// `false` and the cursor records [`StoreError::Cancelled`].
///
/// ```
/// use quiver::EvalContext;
///
/// let (ctx, cancel) = EvalContext::cancelable();
/// assert!(!ctx.done());
/// cancel.cancel();
/// assert!(ctx.done());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    cancelled: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl EvalContext {
    /// A context that is never cancelled.
    #[inline]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context with an externally triggerable cancellation flag.
    pub fn cancelable() -> (Self, CancelSignal) {
        let flag = Arc::new(AtomicBool::new(false));
        (
            Self {
                cancelled: Some(Arc::clone(&flag)),
                deadline: None,
            },
            CancelSignal(flag),
        )
    }

    /// A context that cancels itself after `timeout`.
    ///
    /// A timeout is a cancellation with a deadline: the two are reported the
    /// same way.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: None,
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Derives a context that also cancels after `timeout`, keeping any
    /// cancellation flag already attached.
    pub fn and_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Whether the computation should stop.
    pub fn done(&self) -> bool {
        if let Some(flag) = &self.cancelled {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        false
    }

    /// [`EvalContext::done`] as a result, for `?` propagation.
    pub fn check(&self) -> Result<(), StoreError> {
        if self.done() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Triggers the cancellation of the [`EvalContext`] it was created with.
///
/// Cloneable and sharable across threads; cancelling is idempotent.
#[derive(Debug, Clone)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_never_done() {
        assert!(!EvalContext::background().done());
        assert!(EvalContext::background().check().is_ok());
    }

    #[test]
    fn cancellation_is_observed() {
        let (ctx, cancel) = EvalContext::cancelable();
        assert!(ctx.check().is_ok());
        cancel.cancel();
        assert!(cancel.is_cancelled());
        assert!(ctx.done());
        assert!(matches!(ctx.check(), Err(StoreError::Cancelled)));
    }

    #[test]
    fn expired_deadline_is_done() {
        let ctx = EvalContext::with_timeout(Duration::ZERO);
        assert!(ctx.done());
        let ctx = EvalContext::background().and_timeout(Duration::from_secs(3600));
        assert!(!ctx.done());
    }
}
