#![forbid(unsafe_code)]

//! Runtime: reactive values, lifecycle scopes, timers, and delayed signals.
//!
//! Everything here is single-threaded (`Rc`-based, `!Send`) and meant to be
//! driven from one event loop: signal changes and timer callbacks all run on
//! the same thread, so no locking is involved.
//!
//! The main entry point is [`DelayedSignal`]: a boolean signal that follows
//! its source to `false` immediately and to `true` only after a delay, used
//! to keep loading indicators from flickering.

pub mod config;
pub mod delayed;
pub mod listener;
pub mod reactive;
pub mod scope;
pub mod timer;

pub use config::DelayConfig;
pub use delayed::{DEFAULT_DELAY, DelayedSignal, Disposer, delayed_signal};
pub use listener::{EventTarget, ListenerId, ListenerOptions, use_event_listener};
pub use reactive::{Computed, Observable, Signal, Subscription, Trigger};
pub use scope::{Scope, ScopeCleanup, has_current_scope, on_scope_dispose};
pub use timer::{TimerId, Timers};
