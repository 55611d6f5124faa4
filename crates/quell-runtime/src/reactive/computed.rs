#![forbid(unsafe_code)]

//! Memoized values derived from other signals.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a compute function and its cached result in shared,
//! reference-counted storage. When any dependency changes, the cached value is
//! invalidated (marked dirty).
//!
//! Notification order alone cannot keep the cache honest: a callback that
//! subscribed to a source before this `Computed` did runs first and may read
//! it. Every read therefore also compares the change versions of all
//! dependencies against the ones recorded at the last computation, and
//! recomputes when any of them moved.
//!
//! While nobody watches a `Computed`, it stays lazy: the next call to
//! [`get()`](Computed::get) recomputes and caches. Once a watcher is
//! registered through [`subscribe()`](Computed::subscribe), every dependency
//! change recomputes immediately and watchers are notified if, and only if,
//! the derived value changed. This makes a watched `Computed` a push-based
//! signal that can itself feed further `Computed`s.
//!
//! # Invariants
//!
//! 1. `get()` always returns a value consistent with the current state of all
//!    dependencies (no stale reads after a dependency mutation completes, nor
//!    from callbacks that run while the mutation is still being announced).
//! 2. The compute function is called at most once per dependency change cycle
//!    (memoization).
//! 3. If no dependency has changed, `get()` returns the cached value without
//!    recomputing.
//! 4. Version increments by exactly 1 per recomputation.
//! 5. Watchers never see two consecutive equal values.
//! 6. After [`freeze()`](Computed::freeze) the value never changes again.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: The cached value remains from the last
//!   successful computation. The dirty flag stays set so the next `get()` will
//!   retry.
//! - **Compute function writes to a dependency**: re-entrant borrow panic.
//!   Derived values must be pure functions of their inputs.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::observable::Subscription;
use super::signal::{Signal, Trigger};

type Watcher<T> = dyn Fn(&T);

/// Shared interior for [`Computed<T>`].
struct ComputedInner<T> {
    /// The computation function.
    compute: Box<dyn Fn() -> T>,
    /// Cached result (None only before first computation).
    cached: Option<T>,
    /// Whether the cached value is stale.
    dirty: Cell<bool>,
    /// Monotonically increasing version, bumped on each recomputation.
    version: u64,
    /// Dependencies, polled for their change version on every read.
    deps: Vec<Rc<dyn Trigger>>,
    /// Dependency versions observed by the last computation.
    seen: Vec<u64>,
    /// Last value handed to watchers.
    notified: Option<T>,
    /// Set by `freeze()`: the cache is final.
    frozen: bool,
    /// Callbacks notified when the derived value changes.
    watchers: Vec<Weak<Watcher<T>>>,
    /// Subscription guards keeping dependency callbacks alive.
    subscriptions: Vec<Subscription>,
}

/// A memoized value derived from one or more signals.
///
/// Cloning a `Computed` creates a new handle to the **same** inner state.
///
/// # Invariants
///
/// 1. `dirty` is true after any dependency changes and before the next
///    recomputation.
/// 2. `version` increments by 1 on each recomputation.
/// 3. Without watchers, the compute function only runs from reads.
pub struct Computed<T> {
    inner: Rc<RefCell<ComputedInner<T>>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Computed")
            .field("cached", &inner.cached)
            .field("dirty", &inner.dirty.get())
            .field("version", &inner.version)
            .field("frozen", &inner.frozen)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Create a computed value derived from a single signal.
    ///
    /// The `map` function receives a reference to the source value and
    /// returns the derived value.
    pub fn from_signal<S, V>(source: &S, map: impl Fn(&V) -> T + 'static) -> Self
    where
        S: Signal<V> + Trigger + Clone + 'static,
    {
        let src = source.clone();
        Self::wire(Box::new(move || src.with(|v| map(v))), &[source as &dyn Trigger])
    }

    /// Create a computed value derived from two signals.
    pub fn from2<S1, S2, V1, V2>(
        s1: &S1,
        s2: &S2,
        map: impl Fn(&V1, &V2) -> T + 'static,
    ) -> Self
    where
        S1: Signal<V1> + Trigger + Clone + 'static,
        S2: Signal<V2> + Trigger + Clone + 'static,
    {
        let src1 = s1.clone();
        let src2 = s2.clone();
        Self::wire(
            Box::new(move || src1.with(|v1| src2.with(|v2| map(v1, v2)))),
            &[s1 as &dyn Trigger, s2 as &dyn Trigger],
        )
    }

    /// Create a computed value from a zero-argument getter.
    ///
    /// `deps` lists every signal the getter reads; a change in any of them
    /// invalidates the cache. A getter with no dependencies is computed once.
    pub fn from_getter(compute: impl Fn() -> T + 'static, deps: &[&dyn Trigger]) -> Self {
        Self::wire(Box::new(compute), deps)
    }

    fn wire(compute: Box<dyn Fn() -> T>, deps: &[&dyn Trigger]) -> Self {
        let inner = Rc::new(RefCell::new(ComputedInner {
            compute,
            cached: None,
            dirty: Cell::new(true), // Dirty initially — will compute on first get().
            version: 0,
            deps: deps.iter().map(|dep| dep.share()).collect(),
            seen: Vec::new(),
            notified: None,
            frozen: false,
            watchers: Vec::new(),
            subscriptions: Vec::new(),
        }));

        let subscriptions = deps
            .iter()
            .map(|dep| {
                let weak = Rc::downgrade(&inner);
                dep.on_change(Box::new(move || Self::dependency_changed(&weak)))
            })
            .collect();
        inner.borrow_mut().subscriptions = subscriptions;

        Self { inner }
    }

    fn dependency_changed(weak: &Weak<RefCell<ComputedInner<T>>>) {
        // Inert once every handle is gone.
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let computed = Self { inner };
        if computed.is_current() {
            // An earlier reader already folded this change in; watchers may
            // still need to hear about it.
            if computed.watcher_count() > 0 {
                computed.push_update();
            }
        } else {
            computed.invalidate();
        }
    }

    /// Get the current value, recomputing if any dependency has changed.
    ///
    /// Returns a clone of the cached value. If the value is stale, the
    /// compute function is called first and the result is cached.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Access the current value by reference without cloning.
    ///
    /// Forces recomputation if stale. The closure receives an immutable
    /// reference to the cached value.
    ///
    /// # Panics
    ///
    /// Panics if the closure attempts to call `get()` on the same
    /// `Computed` (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.refresh();
        let inner = self.inner.borrow();
        match inner.cached.as_ref() {
            Some(value) => f(value),
            None => unreachable!("refresh() always fills the cache"),
        }
    }

    /// Recompute if stale. Returns whether a recomputation happened.
    fn refresh(&self) -> bool {
        if self.inner.borrow().frozen {
            return false;
        }
        let versions = self.dependency_versions();
        let mut inner = self.inner.borrow_mut();
        if Self::up_to_date(&inner, &versions) {
            return false;
        }
        let new_value = (inner.compute)();
        inner.cached = Some(new_value);
        inner.seen = versions;
        inner.dirty.set(false);
        inner.version += 1;
        true
    }

    fn is_current(&self) -> bool {
        let versions = self.dependency_versions();
        Self::up_to_date(&self.inner.borrow(), &versions)
    }

    fn up_to_date(inner: &ComputedInner<T>, versions: &[u64]) -> bool {
        !inner.dirty.get() && inner.cached.is_some() && inner.seen == versions
    }

    fn dependency_versions(&self) -> Vec<u64> {
        // Cloned out so dependencies can refresh without our borrow held.
        let deps = self.inner.borrow().deps.clone();
        deps.iter().map(|dep| dep.change_version()).collect()
    }

    /// Whether a dependency has announced a change that is not yet folded
    /// into the cache.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.borrow().dirty.get()
    }

    /// Force invalidation of the cached value.
    ///
    /// Without watchers the next `get()` recomputes. With watchers the value
    /// is recomputed now and watchers are told if it changed. Has no effect
    /// on a frozen value.
    pub fn invalidate(&self) {
        {
            let inner = self.inner.borrow();
            if inner.frozen {
                return;
            }
            inner.dirty.set(true);
        }
        if self.watcher_count() > 0 {
            self.push_update();
        }
    }

    fn push_update(&self) {
        self.refresh();
        let (current, watchers) = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            // A reader may already have refreshed the cache; compare against
            // what watchers were last told instead.
            if inner.notified == inner.cached {
                return;
            }
            inner.notified.clone_from(&inner.cached);
            inner.watchers.retain(|w| w.strong_count() > 0);
            (inner.cached.clone(), inner.watchers.clone())
        };
        let Some(current) = current else {
            return;
        };
        for weak in watchers {
            if let Some(watcher) = weak.upgrade() {
                watcher(&current);
            }
        }
    }

    /// Register `callback` to run whenever the derived value changes.
    ///
    /// Subscribing computes the current value so later changes can be
    /// compared against it.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.refresh();
        let strong: Rc<Watcher<T>> = Rc::new(callback);
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if !inner.watchers.iter().any(|w| w.strong_count() > 0) {
            inner.notified.clone_from(&inner.cached);
        }
        inner.watchers.push(Rc::downgrade(&strong));
        drop(guard);
        Subscription::new(strong)
    }

    /// Pin the current value and detach from every dependency.
    ///
    /// The compute function never runs again and watchers receive no further
    /// notifications. Idempotent.
    pub fn freeze(&self) {
        self.refresh();
        let (subscriptions, deps) = {
            let mut inner = self.inner.borrow_mut();
            if inner.frozen {
                return;
            }
            inner.frozen = true;
            inner.dirty.set(false);
            inner.seen.clear();
            (
                std::mem::take(&mut inner.subscriptions),
                std::mem::take(&mut inner.deps),
            )
        };
        drop(subscriptions);
        drop(deps);
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.inner.borrow().frozen
    }

    /// Number of live watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner
            .borrow()
            .watchers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Current version number. Increments by 1 on each recomputation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Version after bringing the cache up to date.
    pub(crate) fn current_version(&self) -> u64 {
        self.refresh();
        self.version()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observable;
    use std::cell::Cell;

    #[test]
    fn single_dep_computed() {
        let source = Observable::new(10);
        let computed = Computed::from_signal(&source, |v: &i32| v * 2);

        assert_eq!(computed.get(), 20);
        assert_eq!(computed.version(), 1);

        source.set(5);
        assert!(computed.is_dirty());
        assert_eq!(computed.get(), 10);
        assert_eq!(computed.version(), 2);
    }

    #[test]
    fn multi_dep_computed() {
        let width = Observable::new(10);
        let height = Observable::new(20);
        let area = Computed::from2(&width, &height, |w: &i32, h: &i32| w * h);

        assert_eq!(area.get(), 200);

        width.set(5);
        assert_eq!(area.get(), 100);

        height.set(30);
        assert_eq!(area.get(), 150);
    }

    #[test]
    fn getter_with_dependencies() {
        let loading = Observable::new(false);
        let fetching = Observable::new(false);
        let (l, f) = (loading.clone(), fetching.clone());
        let busy = Computed::from_getter(move || l.get() || f.get(), &[&loading, &fetching]);

        assert!(!busy.get());
        fetching.set(true);
        assert!(busy.get());
        fetching.set(false);
        loading.set(true);
        assert!(busy.get());
    }

    #[test]
    fn lazy_evaluation() {
        let compute_count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&compute_count);

        let source = Observable::new(42);
        let source_clone = source.clone();
        let computed = Computed::from_getter(
            move || {
                count_clone.set(count_clone.get() + 1);
                source_clone.get() * 2
            },
            &[],
        );

        // Not computed yet.
        assert_eq!(compute_count.get(), 0);

        // First get triggers computation.
        assert_eq!(computed.get(), 84);
        assert_eq!(compute_count.get(), 1);

        // Second get returns cached (no dependency listed).
        source.set(1);
        assert_eq!(computed.get(), 84);
        assert_eq!(compute_count.get(), 1);
    }

    #[test]
    fn memoization() {
        let compute_count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&compute_count);

        let source = Observable::new(10);
        let computed = Computed::from_signal(&source, move |v: &i32| {
            count_clone.set(count_clone.get() + 1);
            v * 2
        });

        assert_eq!(computed.get(), 20);
        assert_eq!(compute_count.get(), 1);

        // Cached — no recompute.
        assert_eq!(computed.get(), 20);
        assert_eq!(compute_count.get(), 1);

        source.set(20);
        assert_eq!(computed.get(), 40);
        assert_eq!(compute_count.get(), 2);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let compute_count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&compute_count);

        let source = Observable::new(5);
        let computed = Computed::from_signal(&source, move |v: &i32| {
            count_clone.set(count_clone.get() + 1);
            *v
        });

        assert_eq!(computed.get(), 5);
        computed.invalidate();
        assert!(computed.is_dirty());

        assert_eq!(computed.get(), 5);
        assert_eq!(compute_count.get(), 2);
    }

    #[test]
    fn with_access() {
        let source = Observable::new(vec![1, 2, 3]);
        let computed = Computed::from_signal(&source, |v: &Vec<i32>| v.iter().sum::<i32>());

        assert_eq!(computed.with(|sum| *sum), 6);
    }

    #[test]
    fn clone_shares_state() {
        let source = Observable::new(10);
        let c1 = Computed::from_signal(&source, |v: &i32| v + 1);
        let c2 = c1.clone();

        assert_eq!(c1.get(), 11);
        source.set(20);
        assert_eq!(c2.get(), 21);
        assert_eq!(c1.version(), 2);
    }

    #[test]
    fn no_change_same_value() {
        let source = Observable::new(42);
        let computed = Computed::from_signal(&source, |v: &i32| *v);
        let _ = computed.get();

        // Observable won't notify, so computed stays clean.
        source.set(42);
        assert!(!computed.is_dirty());
        assert_eq!(computed.version(), 1);
    }

    #[test]
    fn watchers_are_pushed_changes() {
        let source = Observable::new(1);
        let parity = Computed::from_signal(&source, |v: &i32| v % 2 == 0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = parity.subscribe(move |even| s.borrow_mut().push(*even));

        source.set(2); // odd -> even
        source.set(4); // even -> even: no notification
        source.set(5); // even -> odd

        assert_eq!(*seen.borrow(), vec![true, false]);
        // Pushed eagerly: nothing left to recompute.
        assert!(!parity.is_dirty());
    }

    #[test]
    fn chained_computed_propagates() {
        let source = Observable::new(false);
        let inverted = Computed::from_signal(&source, |v: &bool| !v);
        let doubled = Computed::from_signal(&inverted, |v: &bool| !v);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = doubled.subscribe(move |v| s.borrow_mut().push(*v));

        source.set(true);
        source.set(false);
        assert_eq!(*seen.borrow(), vec![true, false]);
        assert!(!doubled.get());
    }

    #[test]
    fn dropping_watch_subscription_stops_push() {
        let source = Observable::new(0);
        let computed = Computed::from_signal(&source, |v: &i32| *v);
        let calls = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&calls);
        let sub = computed.subscribe(move |_| c.set(c.get() + 1));
        assert_eq!(computed.watcher_count(), 1);

        source.set(1);
        drop(sub);
        source.set(2);

        assert_eq!(calls.get(), 1);
        assert_eq!(computed.watcher_count(), 0);
        // Back to lazy.
        assert!(computed.is_dirty());
        assert_eq!(computed.get(), 2);
    }

    #[test]
    fn debug_format() {
        let source = Observable::new(42);
        let computed = Computed::from_signal(&source, |v: &i32| *v);
        let _ = computed.get();
        let dbg = format!("{:?}", computed);
        assert!(dbg.contains("Computed"));
        assert!(dbg.contains("42"));
    }

    #[test]
    fn string_computed() {
        let first = Observable::new("John".to_string());
        let last = Observable::new("Doe".to_string());
        let full_name =
            Computed::from2(&first, &last, |f: &String, l: &String| format!("{} {}", f, l));

        assert_eq!(full_name.get(), "John Doe");
        first.set("Jane".to_string());
        assert_eq!(full_name.get(), "Jane Doe");
    }

    #[test]
    fn is_dirty_initially_true() {
        let source = Observable::new(1);
        let computed = Computed::from_signal(&source, |v: &i32| *v);
        assert!(computed.is_dirty());
    }

    #[test]
    fn many_updates_version_monotonic() {
        let source = Observable::new(0);
        let computed = Computed::from_signal(&source, |v: &i32| *v);

        for i in 1..=50 {
            source.set(i);
            let _ = computed.get();
        }
        assert_eq!(computed.version(), 50);
    }

    #[test]
    fn earlier_subscriber_reads_fresh_value() {
        let source = Observable::new(1);
        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (sl, s) = (Rc::clone(&slot), Rc::clone(&seen));
        // Registered before the Computed exists, so it is notified first.
        let _early = source.subscribe(move |v| {
            if let Some(doubled) = sl.borrow().as_ref() {
                s.borrow_mut().push((*v, doubled.get()));
            }
        });
        let doubled = Computed::from_signal(&source, |v: &i32| v * 2);
        assert_eq!(doubled.get(), 2);
        *slot.borrow_mut() = Some(doubled.clone());

        source.set(5);
        source.set(7);
        assert_eq!(*seen.borrow(), vec![(5, 10), (7, 14)]);
        assert_eq!(doubled.get(), 14);
    }

    #[test]
    fn early_read_does_not_swallow_watcher_notification() {
        let compute_count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&compute_count);
        let source = Observable::new(false);
        let slot: Rc<RefCell<Option<Computed<bool>>>> = Rc::new(RefCell::new(None));
        let sl = Rc::clone(&slot);
        let _early = source.subscribe(move |_| {
            if let Some(inverted) = sl.borrow().as_ref() {
                let _ = inverted.get();
            }
        });
        let inverted = Computed::from_signal(&source, move |v: &bool| {
            count_clone.set(count_clone.get() + 1);
            !v
        });
        *slot.borrow_mut() = Some(inverted.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = inverted.subscribe(move |v| s.borrow_mut().push(*v));

        source.set(true);
        source.set(false);
        assert_eq!(*seen.borrow(), vec![false, true]);
        // One computation on subscribe, one per change.
        assert_eq!(compute_count.get(), 3);
    }

    #[test]
    fn chained_read_sees_upstream_change() {
        let source = Observable::new(3);
        let plus_one = Computed::from_signal(&source, |v: &i32| v + 1);
        let squared = Computed::from_signal(&plus_one, |v: &i32| v * v);
        assert_eq!(squared.get(), 16);

        source.set(4);
        assert_eq!(squared.get(), 25);
    }

    #[test]
    fn freeze_pins_value_and_detaches() {
        let compute_count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&compute_count);
        let source = Observable::new(2);
        let computed = Computed::from_signal(&source, move |v: &i32| {
            count_clone.set(count_clone.get() + 1);
            v * 10
        });
        let calls = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&calls);
        let _sub = computed.subscribe(move |_| c.set(c.get() + 1));

        computed.freeze();
        computed.freeze();
        assert!(computed.is_frozen());
        assert_eq!(source.subscriber_count(), 0);

        source.set(3);
        computed.invalidate();
        assert_eq!(computed.get(), 20);
        assert_eq!(compute_count.get(), 1);
        assert_eq!(calls.get(), 0);
    }
}
