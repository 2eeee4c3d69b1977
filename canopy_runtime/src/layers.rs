// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_imaging::Surface;
use canopy_scene::RenderContext;
use canopy_view2d::Camera;

/// Where a render layer runs relative to the widget pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderPhase {
    /// Between the background grid and the widgets (section frames,
    /// connection lines).
    BeforeWidgets,
    /// After the widgets but before overlays (selection chrome).
    AfterWidgets,
}

/// A full-frame draw pass composited around the widget list.
///
/// Layers draw in screen space and receive the same context as widgets.
/// Overlay layers (registered separately) run last and are intended for
/// transient chrome such as marquee rectangles and cursors; they are never
/// baked into any cache.
pub trait RenderLayer {
    /// Per-frame update with measured delta time in seconds. Layers that
    /// own deferred work (for example a tile drain) advance one unit of it
    /// here.
    fn update(&mut self, dt: f64) {
        let _ = dt;
    }

    /// Draws the layer.
    fn draw(&mut self, surface: &mut dyn Surface, camera: &Camera, ctx: &RenderContext);
}
