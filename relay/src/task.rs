//! Task stepping wrapper with a heartbeat side effect.
//!
//! A [`TaskWrapper`] is the thin seam between a scheduler tick and a payload:
//! it forwards `step(now)` to the payload and then records `now` in a
//! caller-owned [`Heartbeat`], so a supervisor on another thread can watch
//! the timestamp of the most recently *completed* step.
//!
//! Lifecycle hooks (`init`, `alarm`, `done`) are optional: a payload that
//! does not override the empty defaults pays nothing at the call site.
//!
//! # Example
//!
//! ```
//! use relay::task::{Heartbeat, Task, TaskWrapper};
//!
//! struct Counter {
//!     count: u32,
//! }
//!
//! impl Task for Counter {
//!     fn step(&mut self, _now: u32) {
//!         self.count += 1;
//!     }
//! }
//!
//! let mut counter = Counter { count: 0 };
//! let heartbeat = Heartbeat::new();
//! let mut task = TaskWrapper::new(&mut counter, &heartbeat);
//!
//! task.step(17);
//! assert_eq!(heartbeat.latest(), 17);
//! ```

use std::sync::atomic::{AtomicU32, Ordering};

/// A payload that can be stepped on a tick.
///
/// `step` is the only required operation. The lifecycle hooks default to
/// nothing, so implementing them is opt-in capability discovery: the wrapper
/// calls them unconditionally, and for payloads that left the defaults in
/// place the calls compile away.
pub trait Task {
    /// Advances the payload by one tick. `now` is the scheduler's tick
    /// counter; it wraps modulo 2³² by design.
    fn step(&mut self, now: u32);

    /// Called once before the first step.
    fn init(&mut self) {}

    /// Called when the scheduler detects a missed deadline.
    fn alarm(&mut self) {}

    /// Called once after the last step.
    fn done(&mut self) {}
}

/// Last-completed-step tick, shared with a supervisor.
///
/// The store is release and the load acquire, so a supervisor that observes
/// tick `n` also observes every memory effect of the step that produced it.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct Heartbeat(AtomicU32);

impl Heartbeat {
    /// A heartbeat that has never beaten (tick 0).
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Records a completed step at tick `now`.
    #[inline]
    pub fn record(&self, now: u32) {
        self.0.store(now, Ordering::Release);
    }

    /// The most recently recorded tick.
    #[inline]
    #[must_use]
    pub fn latest(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

/// Couples a payload with its heartbeat for the duration of a session.
///
/// The wrapper borrows the payload mutably, so the borrow checker already
/// guarantees a single stepper; the wrapper itself adds the heartbeat
/// ordering contract: the payload's step happens-before the tick becomes
/// visible through the heartbeat.
pub struct TaskWrapper<'a, P: Task> {
    payload: &'a mut P,
    heartbeat: &'a Heartbeat,
}

impl<'a, P: Task> TaskWrapper<'a, P> {
    /// Wraps `payload`, reporting completed steps into `heartbeat`.
    pub fn new(payload: &'a mut P, heartbeat: &'a Heartbeat) -> Self {
        Self { payload, heartbeat }
    }

    /// Steps the payload, then records the heartbeat.
    ///
    /// The order matters: the heartbeat is the timestamp of the most recent
    /// *completed* step, so a supervisor never sees a tick whose work is
    /// still in flight.
    #[inline]
    pub fn step(&mut self, now: u32) {
        self.payload.step(now);
        self.heartbeat.record(now);
    }

    /// Forwards the `init` hook.
    pub fn init(&mut self) {
        self.payload.init();
    }

    /// Forwards the `alarm` hook.
    pub fn alarm(&mut self) {
        self.payload.alarm();
    }

    /// Forwards the `done` hook.
    pub fn done(&mut self) {
        self.payload.done();
    }
}
