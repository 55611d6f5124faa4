//! End-to-end scenarios for delayed loading indicators.
//!
//! Each test wires a realistic setup (query loading flags, a component
//! scope, a window-like event target) on a lab clock and walks through it
//! step by step.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use quell_core::{Clock, LabClock};
use quell_runtime::delayed::{DEFAULT_DELAY, DelayedSignal};
use quell_runtime::listener::{EventTarget, ListenerOptions, use_event_listener};
use quell_runtime::reactive::{Computed, Observable, Signal};
use quell_runtime::scope::Scope;
use quell_runtime::timer::Timers;
use web_time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("quell_runtime=trace"))
        .with_test_writer()
        .try_init();
}

struct Env {
    lab: LabClock,
    timers: Timers,
}

impl Env {
    fn new() -> Self {
        init_tracing();
        let lab = LabClock::new();
        let timers = Timers::with_clock(Clock::lab(&lab));
        Self { lab, timers }
    }

    /// Move the clock to `ms` after the previous call and fire due timers.
    fn advance(&self, ms: u64) {
        self.lab.advance(Duration::from_millis(ms));
        self.timers.run_due();
    }
}

#[test]
fn initial_true_then_off_then_delayed_on() {
    let env = Env::new();
    let source = Observable::new(true);
    let delayed = DelayedSignal::new(&source, &env.timers);
    assert_eq!(delayed.delay(), DEFAULT_DELAY);

    assert!(delayed.get());

    source.set(false);
    assert!(!delayed.get());

    // t = 0
    source.set(true);
    env.advance(100);
    assert!(!delayed.get());
    env.advance(200);
    assert!(delayed.get());
}

#[test]
fn cancelled_pulse_stays_off_past_original_deadline() {
    let env = Env::new();
    let source = Observable::new(false);
    let delayed = DelayedSignal::with_delay(&source, Duration::from_millis(300), &env.timers);

    source.set(true); // t = 0
    env.advance(150);
    source.set(false); // t = 150
    assert!(!delayed.get());

    for _ in 0..25 {
        env.advance(10); // through t = 400
        assert!(!delayed.get());
    }
    assert_eq!(env.timers.pending(), 0);
}

#[test]
fn rapid_toggling_keeps_one_timer() {
    let env = Env::new();
    let source = Observable::new(false);
    let delayed = DelayedSignal::new(&source, &env.timers);

    for i in 0..100 {
        source.set(i % 2 == 0);
        assert!(env.timers.pending() <= 1);
        env.advance(7);
    }
    // Last write was `false` (i = 99).
    assert!(!delayed.get());
    assert_eq!(env.timers.pending(), 0);

    source.set(true);
    env.advance(300);
    assert!(delayed.get());
}

#[test]
fn spinner_over_derived_query_state() {
    let env = Env::new();
    let is_loading = Observable::new(false);
    let is_fetching = Observable::new(false);
    let (l, f) = (is_loading.clone(), is_fetching.clone());
    let busy = Computed::from_getter(move || l.get() || f.get(), &[&is_loading, &is_fetching]);
    let spinner = DelayedSignal::new(&busy, &env.timers);

    let frames = Rc::new(RefCell::new(Vec::new()));
    let fr = Rc::clone(&frames);
    let _render = spinner.watch(move |show| fr.borrow_mut().push(*show));

    // Fast request: never shows.
    is_fetching.set(true);
    env.advance(120);
    is_fetching.set(false);
    env.advance(500);

    // Slow request: shows after 300 ms, hides on completion.
    is_loading.set(true);
    env.advance(300);
    // Background refetch while still loading changes nothing.
    is_fetching.set(true);
    env.advance(1_000);
    is_loading.set(false);
    is_fetching.set(false);

    assert_eq!(*frames.borrow(), vec![true, false]);
}

#[test]
fn component_scope_tears_everything_down() {
    let env = Env::new();
    let window: EventTarget<()> = EventTarget::new();
    let source = Observable::new(false);
    let refetches = Rc::new(Cell::new(0u32));

    let component = Scope::new();
    let spinner = component
        .run(|| {
            let r = Rc::clone(&refetches);
            use_event_listener(
                &window,
                "focus",
                move |_| r.set(r.get() + 1),
                ListenerOptions::default(),
            );
            DelayedSignal::new(&source, &env.timers)
        })
        .expect("component scope is live");

    window.dispatch_event("focus", &());
    source.set(true);
    assert_eq!(env.timers.pending(), 1);

    drop(component);

    assert!(spinner.is_disposed());
    assert_eq!(env.timers.pending(), 0);
    assert_eq!(window.listener_count("focus"), 0);

    window.dispatch_event("focus", &());
    env.advance(1_000);
    assert_eq!(refetches.get(), 1);
    assert!(!spinner.get());
}

#[test]
fn event_loop_sleeps_until_next_deadline() {
    let env = Env::new();
    let source = Observable::new(false);
    let delayed = DelayedSignal::new(&source, &env.timers);

    source.set(true);
    let wait = env.timers.time_until_next().expect("a timer is armed");
    assert_eq!(wait, Duration::from_millis(300));

    env.lab.advance(wait);
    assert_eq!(env.timers.run_due(), 1);
    assert!(delayed.get());
    assert_eq!(env.timers.time_until_next(), None);
}
