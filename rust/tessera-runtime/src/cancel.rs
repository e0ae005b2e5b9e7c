//! Caller-side cancellation scopes.
//!
//! A [`CancelScope`] is handed to every applet call by the caller (a request
//! deadline, a shutdown signal). The execution engine registers a watcher on
//! the scope for the duration of the call; when the scope is cancelled the
//! watcher forwards the cause into the interpreter's execution context, which
//! stops at its next cooperative checkpoint.
//!
//! # Invariants
//!
//! 1. A scope is cancelled at most once; the first cause wins.
//! 2. Each watcher fires at most once and is never re-armed.
//! 3. A watcher registered on an already-cancelled scope fires immediately.
//! 4. Dropping the [`WatchGuard`] of an unfired watcher deregisters it.
//! 5. A child scope is registered on its parent only while it is alive.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::Duration;

/// Cause reported when a scope created with [`CancelScope::with_timeout`]
/// runs out of time.
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

type Watcher = Box<dyn FnOnce(&str) + Send>;

#[derive(Default)]
struct ScopeState {
    cause: Option<String>,
    watchers: Vec<(u64, Watcher)>,
    next_id: u64,
}

#[derive(Default)]
struct ScopeInner {
    state: Mutex<ScopeState>,
    /// Registration on the parent scope; dropped with the child.
    parent_link: Option<WatchGuard>,
}

impl ScopeInner {
    fn lock(&self) -> MutexGuard<'_, ScopeState> {
        // A watcher never runs while the lock is held, so poisoning can only
        // come from a panic in this module; the state stays consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone, Default)]
pub struct CancelScope {
    inner: Arc<ScopeInner>,
}

impl CancelScope {
    /// A scope that is only cancelled by an explicit [`cancel`](Self::cancel).
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope cancelled with [`DEADLINE_EXCEEDED`] after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        let scope = Self::new();
        let weak = Arc::downgrade(&scope.inner);
        thread::spawn(move || {
            thread::sleep(timeout);
            if let Some(inner) = weak.upgrade() {
                CancelScope { inner }.cancel(DEADLINE_EXCEEDED);
            }
        });
        scope
    }

    /// A scope that is cancelled when `self` is, or on its own. The child
    /// stays registered on `self` only while it is alive.
    pub fn child(&self) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<ScopeInner>| {
            let weak = weak.clone();
            let link = self.after_cancel(move |cause| {
                if let Some(inner) = weak.upgrade() {
                    CancelScope { inner }.cancel(cause);
                }
            });
            ScopeInner {
                state: Mutex::default(),
                parent_link: Some(link),
            }
        });
        let child = CancelScope { inner };
        // A cancellation that fired while the child was being built could
        // not reach it yet.
        if let Some(cause) = self.cause() {
            child.cancel(cause);
        }
        child
    }

    /// Cancel the scope. Later causes are ignored.
    pub fn cancel(&self, cause: impl Into<String>) {
        let watchers = {
            let mut state = self.inner.lock();
            if state.cause.is_some() {
                return;
            }
            let cause = cause.into();
            tracing::debug!(cause = %cause, "cancel scope cancelled");
            state.cause = Some(cause);
            std::mem::take(&mut state.watchers)
        };
        let cause = self.cause().unwrap_or_default();
        for (_, watcher) in watchers {
            watcher(&cause);
        }
    }

    pub fn cause(&self) -> Option<String> {
        self.inner.lock().cause.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cause.is_some()
    }

    /// Run `f` with the cause once the scope is cancelled.
    pub fn after_cancel(&self, f: impl FnOnce(&str) + Send + 'static) -> WatchGuard {
        let mut state = self.inner.lock();
        if let Some(cause) = state.cause.clone() {
            drop(state);
            f(&cause);
            return WatchGuard {
                scope: Weak::new(),
                id: 0,
            };
        }
        let id = state.next_id;
        state.next_id += 1;
        state.watchers.push((id, Box::new(f)));
        WatchGuard {
            scope: Arc::downgrade(&self.inner),
            id,
        }
    }
}

impl fmt::Debug for CancelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelScope")
            .field("cause", &self.cause())
            .finish()
    }
}

/// Keeps a watcher registered; dropping it deregisters the watcher if it has
/// not fired yet.
#[must_use = "dropping the guard deregisters the watcher"]
pub struct WatchGuard {
    scope: Weak<ScopeInner>,
    id: u64,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.scope.upgrade() {
            inner.lock().watchers.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn watcher_fires_once_with_first_cause() {
        let scope = CancelScope::new();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&fired);
        let _guard = scope.after_cancel(move |cause| seen.lock().unwrap().push(cause.to_string()));
        scope.cancel("shutdown");
        scope.cancel("again");
        assert_eq!(*fired.lock().unwrap(), vec!["shutdown".to_string()]);
        assert_eq!(scope.cause().as_deref(), Some("shutdown"));
    }

    #[test]
    fn already_cancelled_fires_immediately() {
        let scope = CancelScope::new();
        scope.cancel("early");
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _guard = scope.after_cancel(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_guard_deregisters() {
        let scope = CancelScope::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        drop(scope.after_cancel(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        scope.cancel("late");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn child_follows_parent() {
        let parent = CancelScope::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel("parent gone");
        assert_eq!(child.cause().as_deref(), Some("parent gone"));
    }

    #[test]
    fn child_of_cancelled_parent_starts_cancelled() {
        let parent = CancelScope::new();
        parent.cancel("already gone");
        assert_eq!(parent.child().cause().as_deref(), Some("already gone"));
    }

    #[test]
    fn dropped_children_deregister_from_parent() {
        let parent = CancelScope::new();
        for _ in 0..1000 {
            drop(parent.child());
        }
        assert!(parent.inner.lock().watchers.is_empty());

        let kept = parent.child();
        assert_eq!(parent.inner.lock().watchers.len(), 1);
        drop(kept);
        assert!(parent.inner.lock().watchers.is_empty());
    }

    #[test]
    fn child_cancel_does_not_reach_parent() {
        let parent = CancelScope::new();
        let child = parent.child();
        child.cancel("only me");
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn timeout_cancels_with_deadline_cause() {
        let scope = CancelScope::with_timeout(Duration::from_millis(10));
        let (tx, rx) = mpsc::channel();
        let _guard = scope.after_cancel(move |cause| {
            let _ = tx.send(cause.to_string());
        });
        let cause = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(cause, DEADLINE_EXCEEDED);
    }
}
