//! RGBA raster targets
//!
//! Render targets are plain `image` buffers. Allocation is fallible: a page
//! or canvas that cannot be allocated is reported to the caller instead of
//! aborting the process.

use crate::engine::RenderArea;
use crate::error::SchedulerError;
use image::{ImageBuffer, Rgba, RgbaImage};

/// Pixel color (straight RGBA)
pub type Color = Rgba<u8>;

pub const RED: Color = Rgba([255, 0, 0, 255]);
pub const WHITE: Color = Rgba([255, 255, 255, 255]);
pub const TRANSPARENT: Color = Rgba([0, 0, 0, 0]);

const BYTES_PER_PIXEL: usize = 4;

/// Owned RGBA raster buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pixels: RgbaImage,
}

impl Bitmap {
    /// Allocate a transparent bitmap.
    ///
    /// Fails with [`SchedulerError::Allocation`] when the byte size overflows,
    /// exceeds `max_bytes`, or the allocator refuses the request.
    pub fn try_new(width: u32, height: u32, max_bytes: usize) -> Result<Self, SchedulerError> {
        let alloc_error = |bytes| SchedulerError::Allocation { width, height, bytes };

        let bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| alloc_error(usize::MAX))?;
        if bytes > max_bytes {
            return Err(alloc_error(bytes));
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes).map_err(|_| alloc_error(bytes))?;
        buf.resize(bytes, 0);

        let pixels = ImageBuffer::from_raw(width, height, buf).ok_or_else(|| alloc_error(bytes))?;
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Size in bytes of the pixel data
    pub fn byte_len(&self) -> usize {
        self.pixels.as_raw().len()
    }

    /// Whole-bitmap area at the origin
    pub fn bounds(&self) -> RenderArea {
        RenderArea::sized(self.width(), self.height())
    }

    /// Pixel at `(x, y)`, `None` when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x < self.width() && y < self.height() {
            Some(*self.pixels.get_pixel(x, y))
        } else {
            None
        }
    }

    /// Fill a rectangle, clipped to the bitmap.
    pub fn fill_rect(&mut self, area: RenderArea, color: Color) {
        let Some((x0, y0, x1, y1)) = self.clip(area) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                self.pixels.put_pixel(x, y, color);
            }
        }
    }

    /// Fill the whole bitmap
    pub fn clear(&mut self, color: Color) {
        for px in self.pixels.pixels_mut() {
            *px = color;
        }
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn as_image_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    fn clip(&self, area: RenderArea) -> Option<(u32, u32, u32, u32)> {
        let x0 = i64::from(area.x).max(0);
        let y0 = i64::from(area.y).max(0);
        let x1 = area.right().min(i64::from(self.width()));
        let y1 = area.bottom().min(i64::from(self.height()));
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        // All four bounds now lie within 0..=u32::MAX
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

/// Paint the failed-render placeholder into `area`.
///
/// The region is filled with `border`, then an inner rectangle inset by
/// `margin` on every side is filled with white.
pub fn paint_error_placeholder(target: &mut Bitmap, area: RenderArea, border: Color, margin: u32) {
    target.fill_rect(area, border);

    let inset = margin.saturating_mul(2);
    if area.width <= inset || area.height <= inset {
        return;
    }
    let inner = RenderArea::new(
        area.x.saturating_add_unsigned(margin),
        area.y.saturating_add_unsigned(margin),
        area.width - inset,
        area.height - inset,
    );
    target.fill_rect(inner, WHITE);
}
