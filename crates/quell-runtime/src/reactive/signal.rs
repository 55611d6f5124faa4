#![forbid(unsafe_code)]

//! Read/watch interface shared by every reactive value.
//!
//! [`Signal<T>`] is what consumers depend on when they only need to read a
//! value and hear about its changes, without caring whether it is a plain
//! [`Observable`] or a derived [`Computed`]. [`Trigger`] is the type-erased
//! "tell me when you change" half, used to list the dependencies of a getter.
//! It also reports a change version, which lets a [`Computed`] notice that an
//! input moved even when its own change callback has not run yet.

use std::rc::Rc;

use super::computed::Computed;
use super::observable::{Observable, Subscription};

/// A readable value whose changes can be observed.
pub trait Signal<T> {
    /// Current value.
    fn get(&self) -> T;

    /// Access the current value by reference.
    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R;

    /// Run `callback` after every change of the value.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    fn watch(&self, callback: impl Fn(&T) + 'static) -> Subscription;
}

/// Object-safe change notification, independent of the value type.
pub trait Trigger {
    /// Run `callback` after every change.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    fn on_change(&self, callback: Box<dyn Fn()>) -> Subscription;

    /// A number that moves whenever the value may have changed.
    ///
    /// Derived values bring themselves up to date before answering.
    fn change_version(&self) -> u64;

    /// A shared, type-erased handle to the same value.
    fn share(&self) -> Rc<dyn Trigger>;
}

impl<T: Clone + PartialEq + 'static> Signal<T> for Observable<T> {
    fn get(&self) -> T {
        Observable::get(self)
    }

    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Observable::with(self, f)
    }

    fn watch(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe(callback)
    }
}

impl<T: Clone + PartialEq + 'static> Trigger for Observable<T> {
    fn on_change(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.subscribe(move |_| callback())
    }

    fn change_version(&self) -> u64 {
        self.version()
    }

    fn share(&self) -> Rc<dyn Trigger> {
        Rc::new(self.clone())
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> for Computed<T> {
    fn get(&self) -> T {
        Computed::get(self)
    }

    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Computed::with(self, f)
    }

    fn watch(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe(callback)
    }
}

impl<T: Clone + PartialEq + 'static> Trigger for Computed<T> {
    fn on_change(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.subscribe(move |_| callback())
    }

    fn change_version(&self) -> u64 {
        self.current_version()
    }

    fn share(&self) -> Rc<dyn Trigger> {
        Rc::new(self.clone())
    }
}
