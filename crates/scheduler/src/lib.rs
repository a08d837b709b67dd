//! PDF Viewer Progressive Render Scheduler
//!
//! Drives an external PDF rendering engine incrementally from the host's
//! paint loop, one page at a time.
//!
//! Each visible page gets a render job. Every paint cycle the host asks the
//! scheduler to render the page; the scheduler issues at most one start or
//! continue call per page and reports whether the page's output is ready.
//! While any page is still in flight the host keeps a repaint timer running.
//! Finished pages are cached until their geometry changes or the page is
//! disposed.
//!
//! # Example
//!
//! ```ignore
//! use pdf_viewer_scheduler::{ProgressiveScheduler, RenderOutcome, RenderRequest, PageId};
//!
//! let mut scheduler = ProgressiveScheduler::new(engine);
//! let request = RenderRequest::new(PageId::new(7), 612, 792);
//!
//! // Paint handler
//! match scheduler.render_page(&request)? {
//!     RenderOutcome::Ready => {
//!         let output = scheduler.page_output(request.page).unwrap();
//!         blit(output.bitmap, output.area);
//!     }
//!     RenderOutcome::Pending => draw_placeholder(request.area),
//!     RenderOutcome::Skipped => {}
//! }
//! if scheduler.is_need_continue_paint() {
//!     repaint_timer.start();
//! }
//!
//! // The page owner closed the page
//! scheduler.page_disposed(request.page);
//! ```

mod bitmap;
mod config;
mod engine;
mod error;
pub mod frame_budget;
mod job;
mod pacing;
mod paint;
mod scheduler;

// Re-export public API
pub use bitmap::{paint_error_placeholder, Bitmap, Color, RED, TRANSPARENT, WHITE};
pub use config::{ConfigError, SchedulerConfig, TargetPolicy};
pub use engine::{
    EngineError, PageId, PageRotation, PauseCheck, RenderArea, RenderEngine, RenderFlags,
    RenderStatus,
};
pub use error::{SchedulerError, SchedulerResult};
pub use frame_budget::FrameBudget;
pub use job::{JobGeometry, JobStatus, JobTarget, RenderJob};
pub use pacing::{Clock, ManualClock, Pacing, SystemClock, DEFAULT_INITIAL_WAIT, DEFAULT_WAIT_STEP};
pub use paint::PaintReport;
pub use scheduler::{PageOutput, ProgressiveScheduler, RenderOutcome, RenderRequest, SchedulerStats};
