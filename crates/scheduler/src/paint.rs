//! One host paint cycle over the visible pages

use crate::engine::{PageId, RenderEngine};
use crate::error::SchedulerResult;
use crate::pacing::Clock;
use crate::scheduler::{ProgressiveScheduler, RenderOutcome, RenderRequest};
use tracing::trace;

/// Result of [`ProgressiveScheduler::paint_pages`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaintReport {
    /// Pages whose output can be drawn now, in request order
    pub ready: Vec<PageId>,
    /// Pages that need a placeholder this cycle
    pub pending: Vec<PageId>,
    /// Zero-sized requests
    pub skipped: usize,
    /// Whether the host should schedule another paint
    pub keep_timer: bool,
}

impl PaintReport {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty() && !self.keep_timer
    }
}

impl<E: RenderEngine, C: Clock> ProgressiveScheduler<E, C> {
    /// Advance every visible page by one step.
    ///
    /// Pages are processed in the order given; each gets exactly one
    /// [`render_page`](Self::render_page) call.
    ///
    /// # Errors
    /// Stops at the first allocation failure and returns it.
    pub fn paint_pages<'r, I>(&mut self, requests: I) -> SchedulerResult<PaintReport>
    where
        I: IntoIterator<Item = &'r RenderRequest>,
    {
        let mut report = PaintReport::default();
        for request in requests {
            match self.render_page(request)? {
                RenderOutcome::Ready => report.ready.push(request.page),
                RenderOutcome::Pending => report.pending.push(request.page),
                RenderOutcome::Skipped => report.skipped += 1,
            }
        }
        report.keep_timer = !report.pending.is_empty() || self.is_need_continue_paint();

        trace!(
            ready = report.ready.len(),
            pending = report.pending.len(),
            skipped = report.skipped,
            keep_timer = report.keep_timer,
            "paint cycle"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::config::SchedulerConfig;
    use crate::engine::{
        EngineError, PauseCheck, RenderArea, RenderFlags, RenderStatus, PageRotation,
    };
    use crate::pacing::ManualClock;

    /// Engine that needs `slices` continue calls per page before finishing
    struct SlicedEngine {
        slices: u32,
        progress: std::collections::HashMap<PageId, u32>,
    }

    impl SlicedEngine {
        fn new(slices: u32) -> Self {
            Self { slices, progress: Default::default() }
        }

        fn step(&mut self, page: PageId) -> RenderStatus {
            let done = self.progress.entry(page).or_insert(0);
            if *done >= self.slices {
                RenderStatus::Done
            } else {
                *done += 1;
                RenderStatus::NeedsContinuation
            }
        }
    }

    impl RenderEngine for SlicedEngine {
        fn start_render(
            &mut self,
            page: PageId,
            _target: &mut Bitmap,
            _area: RenderArea,
            _rotation: PageRotation,
            _flags: RenderFlags,
            _pause: &mut dyn PauseCheck,
        ) -> RenderStatus {
            self.progress.insert(page, 0);
            self.step(page)
        }

        fn continue_render(
            &mut self,
            page: PageId,
            _target: &mut Bitmap,
            _pause: &mut dyn PauseCheck,
        ) -> RenderStatus {
            self.step(page)
        }

        fn cancel_render(&mut self, page: PageId) {
            self.progress.remove(&page);
        }

        fn render_full(
            &mut self,
            _page: PageId,
            _target: &mut Bitmap,
            _area: RenderArea,
            _rotation: PageRotation,
            _flags: RenderFlags,
        ) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn requests() -> Vec<RenderRequest> {
        vec![
            RenderRequest::new(PageId::new(1), 40, 60),
            RenderRequest::new(PageId::new(2), 40, 60).at(0, 70),
            RenderRequest::new(PageId::new(3), 0, 60),
        ]
    }

    #[test]
    fn test_paint_cycles_until_all_pages_ready() {
        let mut s = ProgressiveScheduler::with_clock(
            SlicedEngine::new(2),
            SchedulerConfig::default(),
            ManualClock::new(),
        );
        let visible = requests();

        // start, continue, continue (done)
        let first = s.paint_pages(&visible).unwrap();
        assert_eq!(first.pending, vec![PageId::new(1), PageId::new(2)]);
        assert_eq!(first.skipped, 1);
        assert!(first.keep_timer);

        let second = s.paint_pages(&visible).unwrap();
        assert!(second.ready.is_empty());
        assert!(second.keep_timer);

        let third = s.paint_pages(&visible).unwrap();
        assert_eq!(third.ready, vec![PageId::new(1), PageId::new(2)]);
        assert!(!third.keep_timer);
        assert!(third.is_complete());
    }

    #[test]
    fn test_paint_reports_new_pages_joining_midway() {
        let mut s = ProgressiveScheduler::with_clock(
            SlicedEngine::new(0),
            SchedulerConfig::default(),
            ManualClock::new(),
        );
        let one = [RenderRequest::new(PageId::new(1), 10, 10)];
        s.paint_pages(&one).unwrap();
        assert_eq!(s.paint_pages(&one).unwrap().ready, vec![PageId::new(1)]);

        let two = [one[0], RenderRequest::new(PageId::new(2), 10, 10).at(0, 20)];
        let report = s.paint_pages(&two).unwrap();
        assert_eq!(report.ready, vec![PageId::new(1)]);
        assert_eq!(report.pending, vec![PageId::new(2)]);
        assert!(report.keep_timer);
    }
}
