// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference CPU surface.
//!
//! This is a deliberately simple implementation of [`Surface`] for tests and
//! headless use: solid source-over fills, nearest-neighbor bitmap blits, and
//! DDA line strokes. It establishes observable behavior (which pixels were
//! touched, cache byte accounting) rather than rendering quality.

use alloc::boxed::Box;
use core::fmt;
use kurbo::{Point, Rect};
use peniko::Color;

use crate::{Bitmap, ImageSampler, MAX_SURFACE_DIM, OffscreenFactory, OffscreenSurface, Surface, SurfaceError, premultiply};

/// Floor toward negative infinity without `std`.
///
/// `as i64` truncates toward zero, which differs from floor for negative
/// non-integer values.
fn floor_i64(v: f64) -> i64 {
    let t = v as i64;
    if v < 0.0 && v != t as f64 { t - 1 } else { t }
}

/// Ceiling toward positive infinity without `std`.
fn ceil_i64(v: f64) -> i64 {
    let t = v as i64;
    if v > 0.0 && v != t as f64 { t + 1 } else { t }
}

/// CPU surface rendering into an owned [`Bitmap`].
pub struct CpuSurface {
    bitmap: Bitmap,
}

impl CpuSurface {
    /// Creates a transparent surface of the given pixel size.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::InvalidSize`] for zero dimensions or
    /// dimensions above [`MAX_SURFACE_DIM`].
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        if width == 0 || height == 0 || width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
            return Err(SurfaceError::InvalidSize { width, height });
        }
        Ok(Self {
            bitmap: Bitmap::new(width, height),
        })
    }

    /// Read access to the pixels rendered so far.
    #[must_use]
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    fn blend_pixel(&mut self, x: i64, y: i64, src: [u8; 4]) {
        if x < 0 || y < 0 || x >= i64::from(self.bitmap.width()) || y >= i64::from(self.bitmap.height())
        {
            return;
        }
        let w = self.bitmap.width() as usize;
        let i = (y as usize * w + x as usize) * 4;
        let data = self.bitmap.data_mut();
        let inv = 255 - src[3] as u16;
        for c in 0..4 {
            let d = data[i + c] as u16;
            data[i + c] = (src[c] as u16 + (d * inv) / 255) as u8;
        }
    }

    fn fill_clipped(&mut self, rect: Rect, src: [u8; 4]) {
        let x0 = floor_i64(rect.x0).max(0);
        let y0 = floor_i64(rect.y0).max(0);
        let x1 = ceil_i64(rect.x1).min(i64::from(self.bitmap.width()));
        let y1 = ceil_i64(rect.y1).min(i64::from(self.bitmap.height()));
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend_pixel(x, y, src);
            }
        }
    }
}

impl fmt::Debug for CpuSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuSurface")
            .field("width", &self.bitmap.width())
            .field("height", &self.bitmap.height())
            .finish_non_exhaustive()
    }
}

impl Surface for CpuSurface {
    fn width(&self) -> u32 {
        self.bitmap.width()
    }

    fn height(&self) -> u32 {
        self.bitmap.height()
    }

    fn clear(&mut self, color: Color) {
        let src = premultiply(color);
        let data = self.bitmap.data_mut();
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&src);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.fill_clipped(rect, premultiply(color));
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64) {
        let w = line_width.max(1.0);
        let src = premultiply(color);
        self.fill_clipped(Rect::new(rect.x0, rect.y0, rect.x1, rect.y0 + w), src);
        self.fill_clipped(Rect::new(rect.x0, rect.y1 - w, rect.x1, rect.y1), src);
        self.fill_clipped(Rect::new(rect.x0, rect.y0 + w, rect.x0 + w, rect.y1 - w), src);
        self.fill_clipped(Rect::new(rect.x1 - w, rect.y0 + w, rect.x1, rect.y1 - w), src);
    }

    fn stroke_line(&mut self, p0: Point, p1: Point, color: Color, line_width: f64) {
        let src = premultiply(color);
        let half = (line_width.max(1.0)) / 2.0;
        let delta = p1 - p0;
        // Axis-aligned lines (the grid) get exact rectangles; everything else
        // is a coarse DDA walk stamping small squares.
        if delta.x == 0.0 || delta.y == 0.0 {
            let rect = Rect::new(
                p0.x.min(p1.x) - half,
                p0.y.min(p1.y) - half,
                p0.x.max(p1.x) + half,
                p0.y.max(p1.y) + half,
            );
            self.fill_clipped(rect, src);
            return;
        }
        let steps = ceil_i64(delta.x.abs().max(delta.y.abs())).max(1) as f64;
        let step = delta * (1.0 / steps);
        let mut pt = p0;
        let mut i = 0.0;
        while i <= steps {
            self.fill_clipped(Rect::new(pt.x - half, pt.y - half, pt.x + half, pt.y + half), src);
            pt += step;
            i += 1.0;
        }
    }

    fn draw_bitmap(
        &mut self,
        bitmap: &Bitmap,
        src: Option<Rect>,
        dst: Rect,
        _sampler: ImageSampler,
    ) {
        let src = src.unwrap_or_else(|| {
            Rect::new(0.0, 0.0, f64::from(bitmap.width()), f64::from(bitmap.height()))
        });
        if src.width() <= 0.0 || src.height() <= 0.0 || dst.width() <= 0.0 || dst.height() <= 0.0 {
            return;
        }

        let x0 = floor_i64(dst.x0).max(0);
        let y0 = floor_i64(dst.y0).max(0);
        let x1 = ceil_i64(dst.x1).min(i64::from(self.bitmap.width()));
        let y1 = ceil_i64(dst.y1).min(i64::from(self.bitmap.height()));

        for y in y0..y1 {
            for x in x0..x1 {
                // Nearest-neighbor: map the destination pixel center back
                // into source pixel space.
                let u = (x as f64 + 0.5 - dst.x0) / dst.width();
                let v = (y as f64 + 0.5 - dst.y0) / dst.height();
                let sx = floor_i64(src.x0 + u * src.width());
                let sy = floor_i64(src.y0 + v * src.height());
                if sx < 0 || sy < 0 {
                    continue;
                }
                if let Some(px) = bitmap.pixel(sx as u32, sy as u32) {
                    self.blend_pixel(x, y, px);
                }
            }
        }
    }
}

impl OffscreenSurface for CpuSurface {
    fn finish(self: Box<Self>) -> Bitmap {
        self.bitmap
    }
}

/// Factory producing [`CpuSurface`] offscreen targets.
#[derive(Copy, Clone, Debug, Default)]
pub struct CpuFactory;

impl OffscreenFactory for CpuFactory {
    fn create_offscreen(
        &self,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn OffscreenSurface>, SurfaceError> {
        Ok(Box::new(CpuSurface::new(width, height)?))
    }
}
