#![forbid(unsafe_code)]

//! Named-event dispatch with listeners tied to the enclosing scope.
//!
//! [`EventTarget<E>`] is a minimal dispatcher: listeners are registered per
//! event name and receive a `&E` payload. [`use_event_listener`] attaches a
//! listener and, when a [`Scope`](crate::scope::Scope) is running, removes it
//! again when that scope ends.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::scope::on_scope_dispose;

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registration options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation.
    pub once: bool,
}

impl ListenerOptions {
    #[must_use]
    pub const fn once() -> Self {
        Self { once: true }
    }
}

type Listener<E> = Rc<dyn Fn(&E)>;

struct Entry<E> {
    id: ListenerId,
    listener: Listener<E>,
    once: bool,
}

struct TargetInner<E> {
    next_id: u64,
    listeners: HashMap<String, Vec<Entry<E>>>,
}

/// Shared event dispatcher.
///
/// Cloning creates a new handle to the **same** listener table.
pub struct EventTarget<E> {
    inner: Rc<RefCell<TargetInner<E>>>,
}

impl<E> Clone for EventTarget<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> std::fmt::Debug for EventTarget<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        let mut events: Vec<_> = inner.listeners.keys().collect();
        events.sort();
        f.debug_struct("EventTarget").field("events", &events).finish()
    }
}

impl<E: 'static> Default for EventTarget<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> EventTarget<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TargetInner {
                next_id: 0,
                listeners: HashMap::new(),
            })),
        }
    }

    /// Register `listener` for `event`.
    pub fn add_event_listener(
        &self,
        event: &str,
        listener: impl Fn(&E) + 'static,
        options: ListenerOptions,
    ) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner
            .listeners
            .entry(event.to_owned())
            .or_default()
            .push(Entry {
                id,
                listener: Rc::new(listener),
                once: options.once,
            });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered for
    /// `event`.
    pub fn remove_event_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(entries) = inner.listeners.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            inner.listeners.remove(event);
        }
        removed
    }

    /// Deliver `payload` to every listener of `event`, in registration order.
    ///
    /// Listeners added during dispatch are not called for this payload.
    /// Returns the number of listeners called.
    pub fn dispatch_event(&self, event: &str, payload: &E) -> usize {
        let snapshot: Vec<(ListenerId, Listener<E>, bool)> = {
            let inner = self.inner.borrow();
            match inner.listeners.get(event) {
                Some(entries) => entries
                    .iter()
                    .map(|e| (e.id, Rc::clone(&e.listener), e.once))
                    .collect(),
                None => return 0,
            }
        };

        let mut called = 0;
        for (id, listener, once) in snapshot {
            if once && !self.remove_event_listener(event, id) {
                // Already consumed or removed by an earlier listener.
                continue;
            }
            if !once && !self.has_listener(event, id) {
                continue;
            }
            listener(payload);
            called += 1;
        }
        called
    }

    fn has_listener(&self, event: &str, id: ListenerId) -> bool {
        self.inner
            .borrow()
            .listeners
            .get(event)
            .is_some_and(|entries| entries.iter().any(|e| e.id == id))
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }
}

/// Attach `listener` to `target` and detach it when the current scope ends.
///
/// Outside of a scope the listener stays attached until removed by hand.
pub fn use_event_listener<E: 'static>(
    target: &EventTarget<E>,
    event: &str,
    listener: impl Fn(&E) + 'static,
    options: ListenerOptions,
) -> ListenerId {
    let id = target.add_event_listener(event, listener, options);
    let target = target.clone();
    let event = event.to_owned();
    on_scope_dispose(move || {
        target.remove_event_listener(&event, id);
    });
    id
}
