#![forbid(unsafe_code)]

//! Reactive values for Quell.
//!
//! This module provides change-tracking primitives:
//!
//! - [`Observable`]: A shared, version-tracked value wrapper with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`Computed`]: A memoized value derived from one or more signals; lazy
//!   until watched, push-based once watched.
//! - [`Signal`] / [`Trigger`]: the read/watch interface shared by both.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Subscribers are stored as `Weak` function pointers and cleaned up lazily
//! during notification.
//!
//! `Computed<T>` subscribes to its sources through [`Trigger::on_change`],
//! marking itself dirty on change, and recomputes on the spot when it has
//! watchers of its own. Reads also compare [`Trigger::change_version`] of
//! every source with the versions seen at the last computation, so a reader
//! notified before the `Computed` still gets a fresh value.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. `Computed::get()` never returns a stale value, whatever the order in
//!    which subscribers of a shared source run.

pub mod computed;
pub mod observable;
pub mod signal;

pub use computed::Computed;
pub use observable::{Observable, Subscription};
pub use signal::{Signal, Trigger};
