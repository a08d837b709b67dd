//! Continuation pacing
//!
//! A job that was resumed less than its wait budget ago should not be fed
//! another continuation call in the same tick. Each time a pause is granted
//! the budget grows by a fixed step, which spreads the work of slow pages
//! across more UI ticks instead of starving the event loop.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Default starting wait budget
pub const DEFAULT_INITIAL_WAIT: Duration = Duration::from_millis(10);

/// Default increment added to the budget per granted pause
pub const DEFAULT_WAIT_STEP: Duration = Duration::from_millis(10);

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock for deterministic hosts and tests.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the scheduler.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Rc::new(Cell::new(Instant::now())) }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Additive backoff state for one job
#[derive(Debug, Clone)]
pub struct Pacing {
    initial_wait: Duration,
    step: Duration,
    wait: Duration,
    last_resume: Instant,
}

impl Pacing {
    pub fn new(initial_wait: Duration, step: Duration, now: Instant) -> Self {
        Self { initial_wait, step, wait: initial_wait, last_resume: now }
    }

    /// Current wait budget
    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn last_resume(&self) -> Instant {
        self.last_resume
    }

    /// Record that the engine was just resumed for this job
    pub fn mark_resumed(&mut self, now: Instant) {
        self.last_resume = now;
    }

    /// Whether the caller should hold off on this job.
    ///
    /// Grants a pause when less than the wait budget has elapsed since the
    /// last resume, and grows the budget by one step each time it does.
    pub fn need_pause(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_resume);
        if elapsed < self.wait {
            self.wait += self.step;
            true
        } else {
            false
        }
    }

    /// Back to the initial budget, used once the job completes
    pub fn reset(&mut self, now: Instant) {
        self.wait = self.initial_wait;
        self.last_resume = now;
    }
}
