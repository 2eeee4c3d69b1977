// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Imaging: the surface and bitmap seam of the canvas engine.
//!
//! This crate defines the small set of drawing capabilities the rest of the
//! engine is written against:
//!
//! - [`Bitmap`]: an owned, premultiplied RGBA8 pixel buffer. Snapshot and
//!   tile caches store these; their byte size (`width × height × 4`) is what
//!   cache budgets are accounted in.
//! - [`Surface`]: the draw operations a widget may perform. Both the live
//!   screen surface and offscreen snapshot surfaces implement it, so widget
//!   draw code needs no awareness of whether it is being cached.
//! - [`OffscreenSurface`] / [`OffscreenFactory`]: creation of offscreen
//!   build targets that can be finished into a [`Bitmap`].
//! - [`CpuSurface`] / [`CpuFactory`]: a reference CPU implementation (solid
//!   source-over fills, nearest-neighbor blits). It exists to make the
//!   engine testable and to serve as a correctness oracle; it is *not* a
//!   production rasterizer and does not try to be one.
//!
//! Concrete GPU or vector backends implement [`Surface`] on top of their own
//! technology and are out of scope here.
//!
//! Colors are [`peniko::Color`]; sampling parameters are
//! [`peniko::ImageSampler`]. Geometry is `kurbo`.
//!
//! This crate is `no_std`.

#![no_std]

extern crate alloc;

mod cpu;

pub use cpu::{CpuFactory, CpuSurface};

use alloc::boxed::Box;
use alloc::vec;
use core::fmt;
use kurbo::{Point, Rect};
use peniko::Color;
pub use peniko::ImageSampler;

/// An owned bitmap of premultiplied RGBA8 pixels.
///
/// Rows are tightly packed, top to bottom.
#[derive(Clone, Debug)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Box<[u8]>,
}

impl Bitmap {
    /// Creates a transparent bitmap of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            width,
            height,
            data: vec![0; len].into_boxed_slice(),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the pixel buffer in bytes (`width × height × 4`).
    ///
    /// Cache byte budgets are accounted in this value.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Raw premultiplied RGBA8 pixel data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the raw pixel data.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns the premultiplied RGBA value at `(x, y)`, or `None` when out
    /// of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }
}

/// Drawing operations available to widgets and render layers.
///
/// All coordinates are in the surface's own pixel space; callers apply
/// camera transforms before issuing operations. Implementations must clip
/// out-of-bounds geometry rather than fail.
pub trait Surface {
    /// Surface width in pixels.
    fn width(&self) -> u32;

    /// Surface height in pixels.
    fn height(&self) -> u32;

    /// Fills the whole surface with a color, replacing existing content.
    fn clear(&mut self, color: Color);

    /// Fills an axis-aligned rectangle with a solid color (source-over).
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Strokes the outline of an axis-aligned rectangle.
    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64);

    /// Strokes a line segment.
    fn stroke_line(&mut self, p0: Point, p1: Point, color: Color, line_width: f64);

    /// Draws `src` (or the whole bitmap when `None`, in bitmap pixel
    /// coordinates) scaled into the destination rectangle.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, src: Option<Rect>, dst: Rect, sampler: ImageSampler);
}

/// A surface that renders into an offscreen bitmap.
pub trait OffscreenSurface: Surface {
    /// Consumes the surface and returns the rendered bitmap.
    fn finish(self: Box<Self>) -> Bitmap;
}

/// Creation of offscreen build targets.
///
/// Snapshot builds and tile renders go through this seam so cache code never
/// depends on a concrete backend.
pub trait OffscreenFactory {
    /// Creates an offscreen surface of the given pixel size.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::InvalidSize`] for zero or excessive
    /// dimensions, or [`SurfaceError::Unavailable`] when the backend cannot
    /// allocate a target.
    fn create_offscreen(
        &self,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn OffscreenSurface>, SurfaceError>;
}

/// Largest dimension an offscreen surface may have, in pixels.
pub const MAX_SURFACE_DIM: u32 = 16_384;

/// Failure to acquire a drawing surface.
///
/// Surface acquisition failure at construction time is the one fatal error
/// in the engine; everything downstream degrades to vector redraw instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceError {
    /// The requested dimensions were zero or exceeded [`MAX_SURFACE_DIM`].
    InvalidSize {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
    /// The backend could not provide a surface.
    Unavailable,
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize { width, height } => {
                write!(f, "invalid surface size {width}x{height}")
            }
            Self::Unavailable => write!(f, "drawing surface unavailable"),
        }
    }
}

impl core::error::Error for SurfaceError {}

/// Converts a color to premultiplied RGBA8 bytes.
#[must_use]
pub fn premultiply(color: Color) -> [u8; 4] {
    let rgba = color.to_rgba8();
    let a = rgba.a as u16;
    [
        ((rgba.r as u16 * a) / 255) as u8,
        ((rgba.g as u16 * a) / 255) as u8,
        ((rgba.b as u16 * a) / 255) as u8,
        rgba.a,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_byte_size_is_four_bytes_per_pixel() {
        let bitmap = Bitmap::new(10, 7);
        assert_eq!(bitmap.byte_size(), 10 * 7 * 4);
    }

    #[test]
    fn new_bitmap_is_transparent() {
        let bitmap = Bitmap::new(4, 4);
        assert_eq!(bitmap.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(bitmap.pixel(3, 3), Some([0, 0, 0, 0]));
        assert_eq!(bitmap.pixel(4, 0), None);
    }

    #[test]
    fn premultiply_scales_channels_by_alpha() {
        let half = premultiply(Color::from_rgba8(255, 255, 255, 128));
        assert_eq!(half[3], 128);
        assert!(half[0] == 128 && half[1] == 128 && half[2] == 128);

        let opaque = premultiply(Color::from_rgba8(10, 20, 30, 255));
        assert_eq!(opaque, [10, 20, 30, 255]);
    }

    #[test]
    fn surface_error_displays() {
        let err = SurfaceError::InvalidSize { width: 0, height: 5 };
        assert_eq!(alloc::format!("{err}"), "invalid surface size 0x5");
    }
}
