#![forbid(unsafe_code)]

//! Single-shot, cancellable timers on a single-threaded event loop.
//!
//! [`Timers`] is a deadline queue: [`set_timeout`](Timers::set_timeout)
//! schedules a callback, [`clear_timeout`](Timers::clear_timeout) cancels it,
//! and the owning loop calls [`run_due`](Timers::run_due) to fire everything
//! whose deadline has passed. [`next_deadline`](Timers::next_deadline) tells
//! the loop how long it may sleep.
//!
//! Time comes from a [`Clock`], so tests drive timers with a
//! [`LabClock`](quell_core::LabClock):
//!
//! ```
//! use quell_core::{Clock, LabClock};
//! use quell_runtime::timer::Timers;
//! use std::{cell::Cell, rc::Rc};
//! use web_time::Duration;
//!
//! let lab = LabClock::new();
//! let timers = Timers::with_clock(Clock::lab(&lab));
//! let fired = Rc::new(Cell::new(false));
//! let f = Rc::clone(&fired);
//! timers.set_timeout(Duration::from_millis(300), move || f.set(true));
//!
//! lab.advance(Duration::from_millis(299));
//! assert_eq!(timers.run_due(), 0);
//! lab.advance(Duration::from_millis(1));
//! assert_eq!(timers.run_due(), 1);
//! assert!(fired.get());
//! ```
//!
//! # Invariants
//!
//! 1. A timer fires at most once, and never before its deadline.
//! 2. Due timers fire in deadline order; equal deadlines fire in scheduling
//!    order.
//! 3. A timer cleared before it fires never fires, even when it is cleared
//!    by another callback of the same `run_due` pass.
//! 4. Callbacks run with no internal borrow held, so they may schedule or
//!    clear timers. A timer scheduled by a callback with a zero delay fires
//!    in the same pass.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use quell_core::Clock;
use web_time::{Duration, Instant};

/// Identifier of a scheduled timer. Never reused within one [`Timers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw sequence number (for tracing).
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

type Callback = Box<dyn FnOnce()>;

struct TimersInner {
    clock: Clock,
    next_seq: u64,
    /// Keyed by (deadline, sequence) so iteration order is firing order.
    queue: BTreeMap<(Instant, u64), Callback>,
    /// Sequence → deadline, for O(log n) cancellation.
    deadlines: HashMap<u64, Instant>,
}

/// Shared handle to a timer queue.
///
/// Cloning creates a new handle to the **same** queue.
#[derive(Clone)]
pub struct Timers {
    inner: Rc<RefCell<TimersInner>>,
}

impl std::fmt::Debug for Timers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Timers")
            .field("clock", &inner.clock)
            .field("pending", &inner.queue.len())
            .finish()
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl Timers {
    /// Timer queue on the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::Real)
    }

    /// Timer queue on an explicit clock.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            inner: Rc::new(RefCell::new(TimersInner {
                clock,
                next_seq: 0,
                queue: BTreeMap::new(),
                deadlines: HashMap::new(),
            })),
        }
    }

    /// Current time on this queue's clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.inner.borrow().clock.now()
    }

    /// Schedule `callback` to run once `delay` has elapsed.
    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let deadline = inner.clock.now() + delay;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.insert((deadline, seq), Box::new(callback));
        inner.deadlines.insert(seq, deadline);
        tracing::trace!(timer_id = seq, delay_us = delay.as_micros() as u64, "timer scheduled");
        TimerId(seq)
    }

    /// Cancel a pending timer.
    ///
    /// Returns `false` if the timer already fired or was already cleared.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            match inner.deadlines.remove(&id.0) {
                Some(deadline) => inner.queue.remove(&(deadline, id.0)),
                None => None,
            }
        };
        // Drop the callback outside the borrow; it may own other handles.
        let cleared = removed.is_some();
        drop(removed);
        if cleared {
            tracing::trace!(timer_id = id.0, "timer cleared");
        }
        cleared
    }

    /// Whether `id` is still waiting to fire.
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.borrow().deadlines.contains_key(&id.0)
    }

    /// Number of timers waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner
            .borrow()
            .queue
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    /// Time left until the earliest pending deadline (zero if overdue).
    #[must_use]
    pub fn time_until_next(&self) -> Option<Duration> {
        let next = self.next_deadline()?;
        Some(next.saturating_duration_since(self.now()))
    }

    /// Fire every timer whose deadline is at or before now.
    ///
    /// Returns the number of callbacks run.
    pub fn run_due(&self) -> usize {
        let now = self.now();
        let mut fired = 0;
        while let Some((seq, callback)) = self.pop_due(now) {
            tracing::trace!(timer_id = seq, "timer fired");
            callback();
            fired += 1;
        }
        fired
    }

    fn pop_due(&self, now: Instant) -> Option<(u64, Callback)> {
        let mut inner = self.inner.borrow_mut();
        let entry = inner.queue.first_entry()?;
        let (deadline, seq) = *entry.key();
        if deadline > now {
            return None;
        }
        let callback = entry.remove();
        inner.deadlines.remove(&seq);
        Some((seq, callback))
    }

    /// Cancel every pending timer. Returns how many were cleared.
    pub fn clear_all(&self) -> usize {
        let drained = {
            let mut inner = self.inner.borrow_mut();
            inner.deadlines.clear();
            std::mem::take(&mut inner.queue)
        };
        drained.len()
    }
}
