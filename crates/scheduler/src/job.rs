//! Per-page render jobs
//!
//! A job is heap-owned by the scheduler's map and mutated in place through
//! `get_mut`, so status and pacing updates always land on the stored job.

use crate::bitmap::Bitmap;
use crate::engine::{PageRotation, RenderArea, RenderFlags, RenderStatus};
use crate::pacing::Pacing;

/// Progressive rendering state of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Created, target prepared, no engine call issued yet
    New,
    /// Start call issued and the engine asked to be continued
    Started,
    /// At least one continue call issued and more work remains
    Continuing,
    /// Engine finished; the stop call has not been issued yet
    Done,
    /// Engine reported failure; placeholder not painted yet
    Failed,
    /// Synchronous full render in progress
    NonProgressive,
    /// Output is cached and the engine holds nothing for this page
    Finalized,
}

impl JobStatus {
    /// Waiting on further engine calls
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Started | Self::Continuing)
    }

    /// The engine holds a render context that must be closed with a cancel call
    pub fn holds_engine_context(self) -> bool {
        matches!(self, Self::Started | Self::Continuing | Self::Done | Self::Failed)
    }

    pub fn is_finalized(self) -> bool {
        self == Self::Finalized
    }

    /// Status after a start call returned `status`
    pub(crate) fn after_start(status: RenderStatus) -> Self {
        match status {
            RenderStatus::Done => Self::Done,
            RenderStatus::NeedsContinuation => Self::Started,
            RenderStatus::Failed => Self::Failed,
        }
    }

    /// Status after a continue call returned `status`
    pub(crate) fn after_continue(status: RenderStatus) -> Self {
        match status {
            RenderStatus::Done => Self::Done,
            RenderStatus::NeedsContinuation => Self::Continuing,
            RenderStatus::Failed => Self::Failed,
        }
    }
}

/// Geometry a job was created for. A request with a different key replaces
/// the job.
///
/// `area` is where the engine draws inside the job's target: at the origin
/// of an owned bitmap, or at the page's viewport offset on a shared canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobGeometry {
    pub area: RenderArea,
    pub rotation: PageRotation,
    pub flags: RenderFlags,
}

/// Where a job's pixels live
#[derive(Debug)]
pub enum JobTarget {
    /// Exclusively owned bitmap, rendered at the origin
    Owned(Bitmap),
    /// Region of the scheduler's shared canvas
    SharedCanvas,
}

/// Tracked render attempt for one page
#[derive(Debug)]
pub struct RenderJob {
    pub(crate) status: JobStatus,
    pub(crate) geometry: JobGeometry,
    pub(crate) target: JobTarget,
    pub(crate) pacing: Pacing,
    pub(crate) failed: bool,
}

impl RenderJob {
    pub(crate) fn new(geometry: JobGeometry, target: JobTarget, pacing: Pacing) -> Self {
        Self { status: JobStatus::New, geometry, target, pacing, failed: false }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn geometry(&self) -> JobGeometry {
        self.geometry
    }

    /// Whether the cached output is the error placeholder
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Bytes owned by this job (zero for shared-canvas jobs)
    pub fn owned_bytes(&self) -> usize {
        match &self.target {
            JobTarget::Owned(bitmap) => bitmap.byte_len(),
            JobTarget::SharedCanvas => 0,
        }
    }
}
