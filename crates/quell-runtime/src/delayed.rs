#![forbid(unsafe_code)]

//! A boolean signal that turns on late and off immediately.
//!
//! Loading indicators for requests that usually finish quickly flash on and
//! off. [`DelayedSignal`] wraps a source `Signal<bool>` (typically
//! `is_loading`) and derives a value that:
//!
//! - follows the source to `false` in the same synchronous step;
//! - follows it to `true` only after the source has stayed `true` for the
//!   configured delay (300 ms by default).
//!
//! ```
//! use quell_core::{Clock, LabClock};
//! use quell_runtime::delayed::DelayedSignal;
//! use quell_runtime::reactive::Observable;
//! use quell_runtime::timer::Timers;
//! use web_time::Duration;
//!
//! let lab = LabClock::new();
//! let timers = Timers::with_clock(Clock::lab(&lab));
//! let is_loading = Observable::new(false);
//! let show_spinner = DelayedSignal::new(&is_loading, &timers);
//!
//! is_loading.set(true);
//! lab.advance(Duration::from_millis(100));
//! timers.run_due();
//! assert!(!show_spinner.get());
//!
//! lab.advance(Duration::from_millis(200));
//! timers.run_due();
//! assert!(show_spinner.get());
//!
//! is_loading.set(false);
//! assert!(!show_spinner.get());
//! ```
//!
//! # State
//!
//! The derived value is `source && elapsed`, where `elapsed` is an internal
//! flag. Every actual change of the source clears any pending timer and
//! resets `elapsed` to `false`; a change to `true` then arms one timer that
//! sets `elapsed` back to `true`.
//!
//! # Invariants
//!
//! 1. At most one timer is pending per `DelayedSignal`; arming always clears
//!    the previous one first.
//! 2. The derived value is `false` whenever the source is `false`.
//! 3. The derived value becomes `true` no earlier than `delay` after the
//!    source last became `true`.
//! 4. After disposal no timer is pending, the source subscription is
//!    detached, and the derived value keeps its last value for good.
//! 5. Disposal is idempotent. It happens on [`DelayedSignal::dispose`], on
//!    [`Disposer::dispose`], on drop, and when the scope that was running at
//!    construction ends. Disposing early also withdraws the registration
//!    from that scope.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use web_time::Duration;

use crate::config::DelayConfig;
use crate::reactive::{Computed, Observable, Signal, Subscription, Trigger};
use crate::scope::{ScopeCleanup, on_scope_dispose};
use crate::timer::{TimerId, Timers};

/// Delay used by [`DelayedSignal::new`].
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Timer and subscription bookkeeping shared with callbacks.
struct DelayState {
    timers: Timers,
    delay: Duration,
    derived: Computed<bool>,
    pending: Cell<Option<TimerId>>,
    source_sub: RefCell<Option<Subscription>>,
    scope_link: RefCell<Option<ScopeCleanup>>,
    disposed: Cell<bool>,
}

impl DelayState {
    fn cancel_pending(&self) {
        if let Some(id) = self.pending.take() {
            if self.timers.clear_timeout(id) {
                tracing::trace!(timer_id = id.get(), "delayed signal timer cancelled");
            }
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.cancel_pending();
        let sub = self.source_sub.borrow_mut().take();
        drop(sub);
        self.derived.freeze();
        let link = self.scope_link.borrow_mut().take();
        if let Some(link) = link {
            link.cancel();
        }
        tracing::debug!(value = self.derived.get(), "delayed signal disposed");
    }
}

/// Delayed view of a boolean signal.
///
/// Reads reflect the latest state without any polling; watchers registered
/// with [`watch`](Signal::watch) hear about every change of the derived
/// value. Dropping the `DelayedSignal` disposes it.
pub struct DelayedSignal {
    elapsed: Observable<bool>,
    state: Rc<DelayState>,
}

impl std::fmt::Debug for DelayedSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedSignal")
            .field("value", &self.state.derived.get())
            .field("elapsed", &self.elapsed.get())
            .field("delay", &self.state.delay)
            .field("pending", &self.state.pending.get())
            .field("disposed", &self.state.disposed.get())
            .finish()
    }
}

impl DelayedSignal {
    /// Delay `source` by [`DEFAULT_DELAY`].
    pub fn new<S>(source: &S, timers: &Timers) -> Self
    where
        S: Signal<bool> + Trigger + Clone + 'static,
    {
        Self::with_delay(source, DEFAULT_DELAY, timers)
    }

    /// Delay `source` by the delay in `config`.
    pub fn from_config<S>(source: &S, config: &DelayConfig, timers: &Timers) -> Self
    where
        S: Signal<bool> + Trigger + Clone + 'static,
    {
        Self::with_delay(source, config.delay(), timers)
    }

    /// Delay `source` by `delay`.
    ///
    /// If a [`Scope`](crate::scope::Scope) is running, disposal is
    /// registered with it.
    pub fn with_delay<S>(source: &S, delay: Duration, timers: &Timers) -> Self
    where
        S: Signal<bool> + Trigger + Clone + 'static,
    {
        let elapsed = Observable::new(source.get());
        let derived = Computed::from2(source, &elapsed, |s: &bool, e: &bool| *s && *e);
        let state = Rc::new(DelayState {
            timers: timers.clone(),
            delay,
            derived,
            pending: Cell::new(None),
            source_sub: RefCell::new(None),
            scope_link: RefCell::new(None),
            disposed: Cell::new(false),
        });

        let weak = Rc::downgrade(&state);
        let flag = elapsed.clone();
        let sub = source.watch(move |value: &bool| on_source_change(&weak, &flag, *value));
        *state.source_sub.borrow_mut() = Some(sub);

        let weak = Rc::downgrade(&state);
        let link = on_scope_dispose(move || {
            if let Some(state) = weak.upgrade() {
                state.dispose();
            }
        });
        *state.scope_link.borrow_mut() = link;

        tracing::debug!(delay_ms = delay.as_millis() as u64, "delayed signal created");
        Self { elapsed, state }
    }

    /// Current derived value.
    #[must_use]
    pub fn get(&self) -> bool {
        self.state.derived.get()
    }

    /// Alias of [`get`](Self::get) for loading-state call sites.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.get()
    }

    /// The derived value as a plain [`Computed`], for composing with other
    /// signals. After disposal it is frozen at its last value.
    #[must_use]
    pub fn derived(&self) -> Computed<bool> {
        self.state.derived.clone()
    }

    /// Configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.state.delay
    }

    /// Whether a timer is waiting to flip the derived value on.
    #[must_use]
    pub fn has_pending_timer(&self) -> bool {
        self.state.pending.get().is_some()
    }

    /// Cancel the pending timer, detach from the source and freeze the
    /// derived value. Idempotent.
    pub fn dispose(&self) {
        self.state.dispose();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.disposed.get()
    }

    /// Handle that disposes this signal from elsewhere (for example, from a
    /// teardown path that does not own the `DelayedSignal`).
    #[must_use]
    pub fn disposer(&self) -> Disposer {
        Disposer {
            state: Rc::downgrade(&self.state),
        }
    }
}

fn on_source_change(weak: &Weak<DelayState>, elapsed: &Observable<bool>, value: bool) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    if state.disposed.get() {
        return;
    }
    state.cancel_pending();
    elapsed.set(false);
    if !value {
        return;
    }

    let timer_state = Rc::downgrade(&state);
    let flag = elapsed.clone();
    let id = state.timers.set_timeout(state.delay, move || {
        let Some(state) = timer_state.upgrade() else {
            return;
        };
        if state.disposed.get() {
            return;
        }
        state.pending.set(None);
        tracing::trace!("delayed signal elapsed");
        flag.set(true);
    });
    tracing::trace!(timer_id = id.get(), "delayed signal armed");
    state.pending.set(Some(id));
}

impl Drop for DelayedSignal {
    fn drop(&mut self) {
        self.state.dispose();
    }
}

impl Signal<bool> for DelayedSignal {
    fn get(&self) -> bool {
        self.state.derived.get()
    }

    fn with<R>(&self, f: impl FnOnce(&bool) -> R) -> R {
        self.state.derived.with(f)
    }

    fn watch(&self, callback: impl Fn(&bool) + 'static) -> Subscription {
        self.state.derived.subscribe(callback)
    }
}

impl Trigger for DelayedSignal {
    fn on_change(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.state.derived.subscribe(move |_| callback())
    }

    fn change_version(&self) -> u64 {
        self.state.derived.current_version()
    }

    fn share(&self) -> Rc<dyn Trigger> {
        Rc::new(self.state.derived.clone())
    }
}

/// Cloneable handle that disposes a [`DelayedSignal`].
///
/// Does not keep the signal alive; disposing after the signal was dropped is
/// a no-op.
#[derive(Debug, Clone)]
pub struct Disposer {
    state: Weak<DelayState>,
}

impl Disposer {
    pub fn dispose(&self) {
        if let Some(state) = self.state.upgrade() {
            state.dispose();
        }
    }
}

/// Delay `source` by `delay` on `timers`. See [`DelayedSignal`].
pub fn delayed_signal<S>(source: &S, delay: Duration, timers: &Timers) -> DelayedSignal
where
    S: Signal<bool> + Trigger + Clone + 'static,
{
    DelayedSignal::with_delay(source, delay, timers)
}
