#![forbid(unsafe_code)]

//! Lifecycle scopes that run registered teardown callbacks when they end.
//!
//! A [`Scope`] stands for a unit of UI lifetime (a component instance, a
//! screen). Code running inside [`Scope::run`] can register cleanups with
//! [`on_scope_dispose`] without being handed the scope explicitly; this is how
//! [`DelayedSignal`](crate::delayed::DelayedSignal) and
//! [`use_event_listener`](crate::listener::use_event_listener) tie their
//! resources to the enclosing lifetime.
//!
//! # Invariants
//!
//! 1. Cleanups run exactly once, most recently registered first.
//! 2. [`Scope::dispose`] is idempotent; dropping a `Scope` disposes it.
//! 3. A scope created while another one is running is disposed together with
//!    that parent.
//! 4. A cleanup registered on an already-disposed scope runs immediately.
//! 5. The active-scope stack is restored when `run` exits, including by panic.
//! 6. A cancelled [`ScopeCleanup`] is removed from its scope and never runs,
//!    so short-lived registrants do not accumulate in a long-lived scope.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

type Cleanup = Box<dyn FnOnce()>;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE: RefCell<Vec<Rc<ScopeInner>>> = const { RefCell::new(Vec::new()) };
}

struct ScopeInner {
    id: u64,
    cleanups: RefCell<Vec<(u64, Cleanup)>>,
    next_cleanup: Cell<u64>,
    /// Registration with the parent scope, if any.
    parent_link: RefCell<Option<ScopeCleanup>>,
    disposed: Cell<bool>,
}

impl ScopeInner {
    fn register(self: &Rc<Self>, cleanup: Cleanup) -> Option<ScopeCleanup> {
        if self.disposed.get() {
            cleanup();
            return None;
        }
        let id = self.next_cleanup.get();
        self.next_cleanup.set(id + 1);
        self.cleanups.borrow_mut().push((id, cleanup));
        Some(ScopeCleanup {
            scope: Rc::downgrade(self),
            id,
        })
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let link = self.parent_link.borrow_mut().take();
        if let Some(link) = link {
            link.cancel();
        }
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        tracing::debug!(scope_id = self.id, cleanups = cleanups.len(), "scope disposed");
        for (_, cleanup) in cleanups.into_iter().rev() {
            cleanup();
        }
    }
}

/// One cleanup registered with a [`Scope`].
///
/// Dropping the handle leaves the cleanup registered; [`cancel`](Self::cancel)
/// removes it.
#[derive(Debug)]
pub struct ScopeCleanup {
    scope: Weak<ScopeInner>,
    id: u64,
}

impl ScopeCleanup {
    /// Remove the cleanup without running it.
    ///
    /// Returns `false` if it already ran or the scope is gone.
    pub fn cancel(self) -> bool {
        let Some(scope) = self.scope.upgrade() else {
            return false;
        };
        let removed = {
            let mut cleanups = scope.cleanups.borrow_mut();
            cleanups
                .iter()
                .position(|(id, _)| *id == self.id)
                .map(|index| cleanups.remove(index))
        };
        removed.is_some()
    }
}

/// An owned lifecycle scope.
///
/// Not `Clone`: the owner decides when the scope ends, either by calling
/// [`dispose`](Self::dispose) or by dropping it.
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("cleanups", &self.inner.cleanups.borrow().len())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

impl Scope {
    /// Create a scope. When another scope is currently running, the new one
    /// is registered as its child.
    #[must_use]
    pub fn new() -> Self {
        let scope = Self::detached();
        let weak = Rc::downgrade(&scope.inner);
        let link = on_scope_dispose(move || {
            if let Some(child) = weak.upgrade() {
                child.dispose();
            }
        });
        *scope.inner.parent_link.borrow_mut() = link;
        scope
    }

    /// Create a scope with no parent, even inside a running scope.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                cleanups: RefCell::new(Vec::new()),
                next_cleanup: Cell::new(0),
                parent_link: RefCell::new(None),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Unique identifier (for tracing).
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Run `f` with this scope as the current scope.
    ///
    /// Returns `None` without calling `f` if the scope was already disposed.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if self.inner.disposed.get() {
            return None;
        }
        ACTIVE.with(|stack| stack.borrow_mut().push(Rc::clone(&self.inner)));
        let _guard = ActiveGuard;
        Some(f())
    }

    /// Register `cleanup` with this scope.
    ///
    /// Returns `None` if the scope was already disposed, in which case
    /// `cleanup` has run immediately.
    pub fn on_dispose(&self, cleanup: impl FnOnce() + 'static) -> Option<ScopeCleanup> {
        self.inner.register(Box::new(cleanup))
    }

    /// Number of cleanups waiting for disposal.
    #[must_use]
    pub fn cleanup_count(&self) -> usize {
        self.inner.cleanups.borrow().len()
    }

    /// Run every registered cleanup. Later calls do nothing.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

/// Pops the active-scope stack on exit from [`Scope::run`].
struct ActiveGuard;

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Whether a scope is currently running on this thread.
#[must_use]
pub fn has_current_scope() -> bool {
    ACTIVE.with(|stack| !stack.borrow().is_empty())
}

/// Register `cleanup` with the current scope.
///
/// Returns `None` and drops `cleanup` without running it when no scope is
/// running.
pub fn on_scope_dispose(cleanup: impl FnOnce() + 'static) -> Option<ScopeCleanup> {
    let current = ACTIVE.with(|stack| stack.borrow().last().cloned());
    current.and_then(|scope| scope.register(Box::new(cleanup)))
}
