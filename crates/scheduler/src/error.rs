//! Scheduler error types
//!
//! Engine render failures never surface here: they are recovered inside the
//! scheduler by painting a placeholder. Only conditions that make the current
//! render attempt impossible are reported to the caller.

use crate::engine::{PageId, RenderArea};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to allocate {width}x{height} render target ({bytes} bytes)")]
    Allocation { width: u32, height: u32, bytes: usize },

    #[error("no shared canvas is allocated for {0}")]
    NoCanvas(PageId),

    #[error("{page} at {area:?} lies outside the {width}x{height} shared canvas")]
    OutsideCanvas { page: PageId, area: RenderArea, width: u32, height: u32 },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
