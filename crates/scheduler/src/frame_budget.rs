//! Per-call time slices for the rendering engine
//!
//! Every start/continue call hands the engine a fresh [`FrameBudget`] as its
//! pause callback. The engine polls it while rasterizing and yields with
//! `NeedsContinuation` once the slice is spent, so a single call never holds
//! the UI thread much longer than one frame.

use crate::engine::PauseCheck;
use std::time::{Duration, Instant};

/// One 60 FPS frame (16.67ms)
pub const FRAME_BUDGET_60FPS: Duration = Duration::from_micros(16_667);

/// Part of the frame left to the host's event processing (5ms)
pub const EVENT_PROCESSING_RESERVE: Duration = Duration::from_millis(5);

/// Time slice for one engine call
///
/// # Example
///
/// ```
/// use pdf_viewer_scheduler::frame_budget::{FrameBudget, FRAME_BUDGET_60FPS};
/// use pdf_viewer_scheduler::PauseCheck;
///
/// let mut budget = FrameBudget::new(FRAME_BUDGET_60FPS);
///
/// // The engine polls between units of work
/// if budget.should_pause() {
///     // report NeedsContinuation
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FrameBudget {
    started: Instant,
    budget: Duration,
    reserved: Duration,
    checks: u32,
}

impl FrameBudget {
    /// Slice of `budget` starting now, with the default event reserve
    pub fn new(budget: Duration) -> Self {
        Self { started: Instant::now(), budget, reserved: EVENT_PROCESSING_RESERVE, checks: 0 }
    }

    pub fn with_reserved(mut self, reserved: Duration) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn reserved(&self) -> Duration {
        self.reserved
    }

    /// Time the engine may actually spend
    pub fn available_budget(&self) -> Duration {
        self.budget.saturating_sub(self.reserved)
    }

    pub fn is_exceeded(&self) -> bool {
        self.started.elapsed() >= self.available_budget()
    }

    /// Number of times the engine polled this slice
    pub fn check_count(&self) -> u32 {
        self.checks
    }
}

impl PauseCheck for FrameBudget {
    fn should_pause(&mut self) -> bool {
        self.checks += 1;
        self.is_exceeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_uses_event_reserve() {
        let budget = FrameBudget::new(FRAME_BUDGET_60FPS);
        assert_eq!(budget.budget(), FRAME_BUDGET_60FPS);
        assert_eq!(budget.reserved(), EVENT_PROCESSING_RESERVE);
        assert_eq!(budget.available_budget(), Duration::from_micros(11_667));
    }

    #[test]
    fn test_slice_exceeded_after_available_budget() {
        let budget = FrameBudget::new(Duration::from_millis(5))
            .with_reserved(Duration::from_millis(2));

        assert!(!budget.is_exceeded());

        thread::sleep(Duration::from_millis(4));
        assert!(budget.is_exceeded());
    }

    #[test]
    fn test_reserve_larger_than_budget_pauses_immediately() {
        let mut budget = FrameBudget::new(Duration::from_millis(2))
            .with_reserved(Duration::from_millis(5));
        assert!(budget.should_pause());
    }

    #[test]
    fn test_should_pause_counts_checks() {
        let mut budget = FrameBudget::new(Duration::from_secs(1)).with_reserved(Duration::ZERO);

        assert!(!budget.should_pause());
        assert!(!budget.should_pause());
        assert_eq!(budget.check_count(), 2);
    }
}
