//! Rendering engine contract
//!
//! The scheduler never rasterizes anything itself. It drives an external
//! engine through [`RenderEngine`], which mirrors the incremental render API
//! of native PDF libraries: start a render, continue it in bounded slices,
//! cancel it, or render a page in one synchronous call.

use crate::bitmap::Bitmap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Stable identity of a page.
///
/// Unlike a page index this does not shift when pages are inserted or
/// deleted, so in-flight jobs stay attached to the right page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(u64);

impl PageId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page#{}", self.0)
    }
}

/// Device-space rectangle a page is rendered into.
///
/// `x`/`y` may be negative when a page is scrolled partly out of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl RenderArea {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Area of the given size anchored at the origin
    pub fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Same size, moved to the origin
    pub fn at_origin(&self) -> Self {
        Self::sized(self.width, self.height)
    }

    /// Whether the two areas share at least one pixel
    pub fn intersects(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && i64::from(self.x) < other.right()
            && i64::from(other.x) < self.right()
            && i64::from(self.y) < other.bottom()
            && i64::from(other.y) < self.bottom()
    }

    /// Exclusive right edge
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }
}

/// Page orientation passed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageRotation {
    #[default]
    Normal,
    /// 90 degrees clockwise
    Rotate90,
    Rotate180,
    /// 90 degrees counter-clockwise
    Rotate270,
}

impl PageRotation {
    /// Build from a number of clockwise quarter turns (wraps modulo 4)
    pub fn from_quarter_turns(turns: u8) -> Self {
        match turns % 4 {
            0 => Self::Normal,
            1 => Self::Rotate90,
            2 => Self::Rotate180,
            _ => Self::Rotate270,
        }
    }

    pub fn quarter_turns(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Rotate90 => 1,
            Self::Rotate180 => 2,
            Self::Rotate270 => 3,
        }
    }
}

/// Engine render flags.
///
/// Bit values follow the PDFium `FPDF_*` render flags so a native adapter can
/// forward them unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderFlags(u32);

impl RenderFlags {
    pub const NONE: Self = Self(0);
    /// Render annotations
    pub const ANNOTATIONS: Self = Self(0x01);
    /// Subpixel text rendering
    pub const LCD_TEXT: Self = Self(0x02);
    pub const NO_NATIVE_TEXT: Self = Self(0x04);
    pub const GRAYSCALE: Self = Self(0x08);
    /// Limit the engine's image cache
    pub const LIMITED_IMAGE_CACHE: Self = Self(0x200);
    pub const FORCE_HALFTONE: Self = Self(0x400);
    pub const PRINTING: Self = Self(0x800);
    pub const NO_SMOOTH_TEXT: Self = Self(0x1000);
    pub const NO_SMOOTH_IMAGE: Self = Self(0x2000);
    pub const NO_SMOOTH_PATH: Self = Self(0x4000);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RenderFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RenderFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Result of one incremental engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The page is fully rendered into the target
    Done,
    /// The engine yielded; call `continue_render` to make more progress
    NeedsContinuation,
    /// The engine gave up on this page
    Failed,
}

/// Callback the engine polls while rendering to decide whether to yield.
pub trait PauseCheck {
    /// Returns `true` when the engine should stop and report
    /// [`RenderStatus::NeedsContinuation`].
    fn should_pause(&mut self) -> bool;
}

impl<F: FnMut() -> bool> PauseCheck for F {
    fn should_pause(&mut self) -> bool {
        self()
    }
}

/// Error from the synchronous render path
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("render failed: {0}")]
    Failed(String),
}

/// External rendering engine driven by the scheduler.
///
/// All calls happen on the thread that owns the scheduler. The engine keeps
/// whatever per-page render context it needs between `start_render` and
/// `cancel_render`; the scheduler guarantees `cancel_render` is issued for
/// every started render before the job is dropped.
pub trait RenderEngine {
    /// Begin an incremental render of `page` into `area` of `target`.
    fn start_render(
        &mut self,
        page: PageId,
        target: &mut Bitmap,
        area: RenderArea,
        rotation: PageRotation,
        flags: RenderFlags,
        pause: &mut dyn PauseCheck,
    ) -> RenderStatus;

    /// Resume a render previously started for `page`.
    fn continue_render(
        &mut self,
        page: PageId,
        target: &mut Bitmap,
        pause: &mut dyn PauseCheck,
    ) -> RenderStatus;

    /// Release the render context for `page`.
    ///
    /// Abandons the render if it is still in progress. Also used as the
    /// stop call once a render has reported [`RenderStatus::Done`].
    fn cancel_render(&mut self, page: PageId);

    /// Render `page` in one blocking call.
    fn render_full(
        &mut self,
        page: PageId,
        target: &mut Bitmap,
        area: RenderArea,
        rotation: PageRotation,
        flags: RenderFlags,
    ) -> Result<(), EngineError>;

    /// Draw interactive form fields over a finished page.
    fn render_forms(
        &mut self,
        _page: PageId,
        _target: &mut Bitmap,
        _area: RenderArea,
        _rotation: PageRotation,
        _flags: RenderFlags,
    ) {
    }

    /// Start delivering disposal notifications for `page`.
    ///
    /// When the page goes away the owner must call
    /// [`ProgressiveScheduler::page_disposed`](crate::ProgressiveScheduler::page_disposed).
    fn watch_disposal(&mut self, _page: PageId) {}

    /// Stop delivering disposal notifications for `page`.
    fn unwatch_disposal(&mut self, _page: PageId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_quarter_turns_wrap() {
        assert_eq!(PageRotation::from_quarter_turns(0), PageRotation::Normal);
        assert_eq!(PageRotation::from_quarter_turns(3), PageRotation::Rotate270);
        assert_eq!(PageRotation::from_quarter_turns(5), PageRotation::Rotate90);
        assert_eq!(PageRotation::Rotate180.quarter_turns(), 2);
    }

    #[test]
    fn test_render_flags_combine() {
        let mut flags = RenderFlags::ANNOTATIONS | RenderFlags::LCD_TEXT;
        assert!(flags.contains(RenderFlags::ANNOTATIONS));
        assert!(!flags.contains(RenderFlags::GRAYSCALE));

        flags |= RenderFlags::GRAYSCALE;
        assert_eq!(flags.bits(), 0x0B);
        assert!(flags.contains(RenderFlags::NONE));
    }

    #[test]
    fn test_render_area_edges() {
        let area = RenderArea::new(-20, 10, 100, 50);
        assert_eq!(area.right(), 80);
        assert_eq!(area.bottom(), 60);
        assert_eq!(area.at_origin(), RenderArea::sized(100, 50));
        assert!(!area.is_empty());
        assert!(RenderArea::sized(0, 10).is_empty());
    }

    #[test]
    fn test_render_area_intersection() {
        let viewport = RenderArea::sized(100, 100);
        assert!(viewport.intersects(&RenderArea::new(0, 90, 100, 100)));
        assert!(viewport.intersects(&RenderArea::new(-50, -50, 51, 51)));
        assert!(!viewport.intersects(&RenderArea::new(0, 100, 100, 100)));
        assert!(!viewport.intersects(&RenderArea::new(-10, 0, 10, 100)));
        assert!(!viewport.intersects(&RenderArea::new(10, 10, 0, 5)));
    }

    #[test]
    fn test_closure_pause_check() {
        let mut calls = 0;
        let mut check = || {
            calls += 1;
            calls > 2
        };
        assert!(!check.should_pause());
        assert!(!check.should_pause());
        assert!(check.should_pause());
    }
}
