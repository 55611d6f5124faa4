#![forbid(unsafe_code)]

//! Quell public facade crate.
//!
//! Reactive helpers for data-fetching UIs: delayed loading signals, the
//! observable/computed primitives they are built on, lifecycle scopes,
//! timers, and stable query-key stringification.

pub mod prelude {
    pub use quell_core as core;
    #[cfg(feature = "runtime")]
    pub use quell_runtime as runtime;

    pub use quell_core::{
        Clock, FlatInput, FlatObject, FlatValue, LabClock, MaybeArray, stringify_flat_object,
        to_array,
    };

    #[cfg(feature = "runtime")]
    pub use quell_runtime::{
        Computed, DelayConfig, DelayedSignal, Disposer, EventTarget, ListenerOptions, Observable,
        Scope, ScopeCleanup, Signal, Timers, Trigger, delayed_signal, on_scope_dispose,
        use_event_listener,
    };
}
