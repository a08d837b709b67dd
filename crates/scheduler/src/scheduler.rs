//! Progressive page render scheduler
//!
//! Owns one [`RenderJob`] per visible page and advances each by at most one
//! bounded engine call per [`render_page`](ProgressiveScheduler::render_page).
//! The host calls it once per page per paint and keeps repainting (usually
//! from a timer) while [`is_need_continue_paint`](ProgressiveScheduler::is_need_continue_paint)
//! reports unfinished work. Nothing here blocks or spawns threads.

use crate::bitmap::{paint_error_placeholder, Bitmap};
use crate::config::{SchedulerConfig, TargetPolicy};
use crate::engine::{PageId, PageRotation, RenderArea, RenderEngine, RenderFlags};
use crate::error::{SchedulerError, SchedulerResult};
use crate::job::{JobGeometry, JobStatus, JobTarget, RenderJob};
use crate::pacing::{Clock, Pacing, SystemClock};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// One page render request from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub page: PageId,
    /// Page rectangle in viewport coordinates
    pub area: RenderArea,
    pub rotation: PageRotation,
    pub flags: RenderFlags,
    /// `false` renders the page in a single synchronous engine call
    pub progressive: bool,
}

impl RenderRequest {
    /// Progressive request for a `width`x`height` page at the viewport origin
    pub fn new(page: PageId, width: u32, height: u32) -> Self {
        Self {
            page,
            area: RenderArea::sized(width, height),
            rotation: PageRotation::Normal,
            flags: RenderFlags::NONE,
            progressive: true,
        }
    }

    /// Place the page at `(x, y)` in the viewport
    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.area.x = x;
        self.area.y = y;
        self
    }

    pub fn with_rotation(mut self, rotation: PageRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_progressive(mut self, progressive: bool) -> Self {
        self.progressive = progressive;
        self
    }
}

/// What a [`render_page`](ProgressiveScheduler::render_page) call produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Not finished; show a placeholder and ask again later
    Pending,
    /// Output is available through [`page_output`](ProgressiveScheduler::page_output)
    Ready,
    /// Zero-sized request, nothing to render
    Skipped,
}

impl RenderOutcome {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

/// Finished raster for one page
#[derive(Debug, Clone, Copy)]
pub struct PageOutput<'a> {
    /// Bitmap holding the page (the shared canvas under that policy)
    pub bitmap: &'a Bitmap,
    /// Region of `bitmap` covered by the page
    pub area: RenderArea,
    /// The region holds the error placeholder
    pub failed: bool,
}

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub jobs_created: u64,
    pub jobs_finalized: u64,
    pub jobs_failed: u64,
    pub jobs_removed: u64,
    /// Every call into the engine, including cancels and form passes
    pub engine_calls: u64,
}

#[derive(Debug, Clone, Copy)]
enum Removal {
    GeometryChanged,
    Replaced,
    PageDisposed,
    CanvasResized,
    Reset,
}

/// Progressive render scheduler
///
/// # Example
///
/// ```ignore
/// let mut scheduler = ProgressiveScheduler::new(engine);
///
/// // In the paint handler:
/// for request in visible_pages {
///     match scheduler.render_page(&request)? {
///         RenderOutcome::Ready => draw(scheduler.page_output(request.page)),
///         _ => draw_placeholder(request.area),
///     }
/// }
/// if scheduler.is_need_continue_paint() {
///     repaint_timer.start();
/// }
/// ```
pub struct ProgressiveScheduler<E: RenderEngine, C: Clock = SystemClock> {
    engine: E,
    clock: C,
    config: SchedulerConfig,
    jobs: HashMap<PageId, RenderJob>,
    canvas: Option<Bitmap>,
    stats: SchedulerStats,
}

impl<E: RenderEngine> ProgressiveScheduler<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, SchedulerConfig::default())
    }

    pub fn with_config(engine: E, config: SchedulerConfig) -> Self {
        Self::with_clock(engine, config, SystemClock)
    }
}

impl<E: RenderEngine, C: Clock> ProgressiveScheduler<E, C> {
    pub fn with_clock(engine: E, config: SchedulerConfig, clock: C) -> Self {
        Self {
            engine,
            clock,
            config,
            jobs: HashMap::new(),
            canvas: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Start or advance rendering of one page.
    ///
    /// Issues at most one start/continue call (plus the stop call when the
    /// render completes). Engine failures are not errors: the page's output
    /// becomes the error placeholder and the outcome is `Ready`.
    ///
    /// # Errors
    /// Returns [`SchedulerError::Allocation`] when the page bitmap or shared
    /// canvas cannot be allocated.
    pub fn render_page(&mut self, request: &RenderRequest) -> SchedulerResult<RenderOutcome> {
        if request.area.is_empty() {
            trace!(page = %request.page, "skipping zero-sized page");
            return Ok(RenderOutcome::Skipped);
        }

        let page = request.page;
        let geometry = self.geometry_for(request);

        if !request.progressive {
            return self.render_non_progressive(page, geometry);
        }

        match self.jobs.get(&page) {
            None => {
                self.create_job(page, geometry)?;
                self.issue_engine_call(page)?;
                Ok(RenderOutcome::Pending)
            }
            Some(job) if job.geometry != geometry => {
                self.remove_job(page, Removal::GeometryChanged);
                self.create_job(page, geometry)?;
                Ok(RenderOutcome::Pending)
            }
            Some(_) => {
                self.issue_engine_call(page)?;
                self.settle(page)
            }
        }
    }

    /// True while any page is waiting on further engine calls.
    ///
    /// Only `Started` and `Continuing` jobs count. A job recreated after a
    /// geometry change sits in `New` until the next request, so a host that
    /// stops its repaint timer on this query alone stalls after a zoom or
    /// rotation. Use [`has_pending_work`](Self::has_pending_work) (or the
    /// `keep_timer` flag from `paint_pages`) to drive the timer.
    pub fn is_need_continue_paint(&self) -> bool {
        self.jobs.values().any(|job| job.status.is_in_flight())
    }

    /// True while any tracked page has not reached its final output.
    ///
    /// Unlike [`is_need_continue_paint`](Self::is_need_continue_paint) this
    /// also counts jobs that were just recreated or whose render completed
    /// on the call that created them.
    pub fn has_pending_work(&self) -> bool {
        self.jobs.values().any(|job| !job.status.is_finalized())
    }

    /// Whether the host should hold off feeding `page` this tick.
    ///
    /// See [`Pacing::need_pause`]. Unknown pages never pause.
    pub fn is_need_pause(&mut self, page: PageId) -> bool {
        let now = self.clock.now();
        self.is_need_pause_at(page, now)
    }

    /// [`is_need_pause`](Self::is_need_pause) evaluated at `now`
    pub fn is_need_pause_at(&mut self, page: PageId, now: Instant) -> bool {
        self.jobs.get_mut(&page).is_some_and(|job| job.pacing.need_pause(now))
    }

    /// Allocate the shared canvas for a `width`x`height` viewport.
    ///
    /// Required before any request under [`TargetPolicy::SharedCanvas`].
    /// A canvas of the same size is kept as is. Otherwise the old canvas is
    /// freed first, along with every job drawing into it; per-page jobs are
    /// untouched.
    pub fn init_canvas(&mut self, width: u32, height: u32) -> SchedulerResult<()> {
        if let Some(canvas) = &self.canvas {
            if canvas.width() == width && canvas.height() == height {
                return Ok(());
            }
        }

        let shared: Vec<PageId> = self
            .jobs
            .iter()
            .filter(|(_, job)| matches!(job.target, JobTarget::SharedCanvas))
            .map(|(page, _)| *page)
            .collect();
        for page in shared {
            self.remove_job(page, Removal::CanvasResized);
        }
        self.canvas = None;

        let mut canvas = Bitmap::try_new(width, height, self.config.max_bitmap_bytes)?;
        canvas.clear(self.config.page_back_color());
        self.canvas = Some(canvas);
        debug!(width, height, "allocated shared canvas");
        Ok(())
    }

    /// Cancel and drop every job, then free the shared canvas.
    pub fn release_canvas(&mut self) {
        let pages: Vec<PageId> = self.jobs.keys().copied().collect();
        for page in pages {
            self.remove_job(page, Removal::Reset);
        }
        if self.canvas.take().is_some() {
            debug!("released shared canvas");
        }
    }

    /// Disposal notification from the page owner.
    ///
    /// Cancels any in-flight render for the page and frees its job before
    /// returning, so the engine never sees the page again. Returns whether a
    /// job existed.
    pub fn page_disposed(&mut self, page: PageId) -> bool {
        self.remove_job(page, Removal::PageDisposed)
    }

    pub fn job_status(&self, page: PageId) -> Option<JobStatus> {
        self.jobs.get(&page).map(|job| job.status)
    }

    pub fn job(&self, page: PageId) -> Option<&RenderJob> {
        self.jobs.get(&page)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the page's cached output is the error placeholder
    pub fn is_failed(&self, page: PageId) -> bool {
        self.jobs.get(&page).is_some_and(|job| job.failed)
    }

    /// Finished output for `page`, `None` until its job is finalized.
    pub fn page_output(&self, page: PageId) -> Option<PageOutput<'_>> {
        let job = self.jobs.get(&page)?;
        if !job.status.is_finalized() {
            return None;
        }
        let bitmap = match &job.target {
            JobTarget::Owned(bitmap) => bitmap,
            JobTarget::SharedCanvas => self.canvas.as_ref()?,
        };
        Some(PageOutput { bitmap, area: job.geometry.area, failed: job.failed })
    }

    pub fn canvas(&self) -> Option<&Bitmap> {
        self.canvas.as_ref()
    }

    /// Bytes held by per-page bitmaps and the shared canvas
    pub fn allocated_bytes(&self) -> usize {
        let jobs: usize = self.jobs.values().map(RenderJob::owned_bytes).sum();
        jobs + self.canvas.as_ref().map_or(0, Bitmap::byte_len)
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn geometry_for(&self, request: &RenderRequest) -> JobGeometry {
        let area = match self.config.target_policy {
            TargetPolicy::PerPage => request.area.at_origin(),
            TargetPolicy::SharedCanvas => request.area,
        };
        JobGeometry { area, rotation: request.rotation, flags: request.flags }
    }

    fn create_job(&mut self, page: PageId, geometry: JobGeometry) -> SchedulerResult<()> {
        let back_color = self.config.page_back_color();
        let target = match self.config.target_policy {
            TargetPolicy::PerPage => {
                let area = geometry.area;
                let mut bitmap =
                    Bitmap::try_new(area.width, area.height, self.config.max_bitmap_bytes)?;
                bitmap.clear(back_color);
                JobTarget::Owned(bitmap)
            }
            TargetPolicy::SharedCanvas => {
                let canvas = self.canvas.as_mut().ok_or(SchedulerError::NoCanvas(page))?;
                // Partial overlap is a page scrolled across the viewport edge
                if !canvas.bounds().intersects(&geometry.area) {
                    return Err(SchedulerError::OutsideCanvas {
                        page,
                        area: geometry.area,
                        width: canvas.width(),
                        height: canvas.height(),
                    });
                }
                canvas.fill_rect(geometry.area, back_color);
                JobTarget::SharedCanvas
            }
        };

        let pacing =
            Pacing::new(self.config.initial_wait(), self.config.wait_step(), self.clock.now());
        self.engine.watch_disposal(page);
        self.jobs.insert(page, RenderJob::new(geometry, target, pacing));
        self.stats.jobs_created += 1;
        debug!(%page, area = ?geometry.area, "created render job");
        Ok(())
    }

    /// Issue the start or continue call a job is waiting for, if any.
    fn issue_engine_call(&mut self, page: PageId) -> SchedulerResult<()> {
        let Self { engine, clock, config, jobs, canvas, stats } = self;
        let Some(job) = jobs.get_mut(&page) else {
            return Ok(());
        };

        let status = job.status;
        if !matches!(status, JobStatus::New | JobStatus::Started | JobStatus::Continuing) {
            return Ok(());
        }

        let target = resolve_target(&mut job.target, canvas, page)?;
        let mut slice = config.slice_budget();
        let geometry = job.geometry;
        let reported = if status == JobStatus::New {
            let reported = engine.start_render(
                page,
                target,
                geometry.area,
                geometry.rotation,
                geometry.flags,
                &mut slice,
            );
            job.status = JobStatus::after_start(reported);
            reported
        } else {
            let reported = engine.continue_render(page, target, &mut slice);
            job.status = JobStatus::after_continue(reported);
            reported
        };
        job.pacing.mark_resumed(clock.now());
        stats.engine_calls += 1;

        trace!(
            %page,
            from = ?status,
            to = ?job.status,
            ?reported,
            pause_checks = slice.check_count(),
            "engine call"
        );
        Ok(())
    }

    /// Finish a job the engine is done with and report its outcome.
    fn settle(&mut self, page: PageId) -> SchedulerResult<RenderOutcome> {
        let Self { engine, clock, config, jobs, canvas, stats } = self;
        let Some(job) = jobs.get_mut(&page) else {
            return Ok(RenderOutcome::Pending);
        };
        let geometry = job.geometry;

        match job.status {
            JobStatus::Done => {
                engine.cancel_render(page);
                stats.engine_calls += 1;
                if config.render_forms {
                    let target = resolve_target(&mut job.target, canvas, page)?;
                    engine.render_forms(page, target, geometry.area, geometry.rotation, geometry.flags);
                    stats.engine_calls += 1;
                }
                job.status = JobStatus::Finalized;
                job.pacing.reset(clock.now());
                stats.jobs_finalized += 1;
                debug!(%page, "page rendered");
                Ok(RenderOutcome::Ready)
            }
            JobStatus::Failed => {
                let target = resolve_target(&mut job.target, canvas, page)?;
                paint_error_placeholder(target, geometry.area, config.error_color(), config.error_margin);
                engine.cancel_render(page);
                stats.engine_calls += 1;
                job.status = JobStatus::Finalized;
                job.failed = true;
                job.pacing.reset(clock.now());
                stats.jobs_failed += 1;
                warn!(%page, "engine failed to render page, showing placeholder");
                Ok(RenderOutcome::Ready)
            }
            JobStatus::Finalized => Ok(RenderOutcome::Ready),
            _ => Ok(RenderOutcome::Pending),
        }
    }

    fn render_non_progressive(
        &mut self,
        page: PageId,
        geometry: JobGeometry,
    ) -> SchedulerResult<RenderOutcome> {
        if let Some(job) = self.jobs.get(&page) {
            if job.geometry == geometry && job.status.is_finalized() {
                return Ok(RenderOutcome::Ready);
            }
            self.remove_job(page, Removal::Replaced);
        }
        self.create_job(page, geometry)?;

        let Self { engine, clock, config, jobs, canvas, stats } = self;
        let Some(job) = jobs.get_mut(&page) else {
            return Ok(RenderOutcome::Pending);
        };
        job.status = JobStatus::NonProgressive;

        let target = resolve_target(&mut job.target, canvas, page)?;
        let result =
            engine.render_full(page, target, geometry.area, geometry.rotation, geometry.flags);
        stats.engine_calls += 1;

        match result {
            Ok(()) => {
                if config.render_forms {
                    engine.render_forms(page, target, geometry.area, geometry.rotation, geometry.flags);
                    stats.engine_calls += 1;
                }
                stats.jobs_finalized += 1;
                debug!(%page, "page rendered synchronously");
            }
            Err(err) => {
                paint_error_placeholder(target, geometry.area, config.error_color(), config.error_margin);
                job.failed = true;
                stats.jobs_failed += 1;
                warn!(%page, error = %err, "synchronous render failed, showing placeholder");
            }
        }
        job.status = JobStatus::Finalized;
        job.pacing.reset(clock.now());
        Ok(RenderOutcome::Ready)
    }

    fn remove_job(&mut self, page: PageId, reason: Removal) -> bool {
        let Some(job) = self.jobs.remove(&page) else {
            return false;
        };
        if job.status.holds_engine_context() {
            self.engine.cancel_render(page);
            self.stats.engine_calls += 1;
        }
        self.engine.unwatch_disposal(page);
        self.stats.jobs_removed += 1;
        debug!(
            %page,
            ?reason,
            status = ?job.status,
            freed_bytes = job.owned_bytes(),
            "removed render job"
        );
        true
    }
}

impl<E: RenderEngine, C: Clock> Drop for ProgressiveScheduler<E, C> {
    fn drop(&mut self) {
        self.release_canvas();
    }
}

fn resolve_target<'a>(
    target: &'a mut JobTarget,
    canvas: &'a mut Option<Bitmap>,
    page: PageId,
) -> SchedulerResult<&'a mut Bitmap> {
    match target {
        JobTarget::Owned(bitmap) => Ok(bitmap),
        JobTarget::SharedCanvas => canvas.as_mut().ok_or(SchedulerError::NoCanvas(page)),
    }
}
