// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Scene: the widget capability contract of the canvas engine.
//!
//! An infinite canvas hosts heterogeneous widgets (sticky notes, PDF pages,
//! diagrams, ink layers) whose drawing logic lives outside the core. This
//! crate defines the seam between the two: the [`Widget`] trait every hosted
//! widget implements, and the [`RenderContext`] handed to every draw call.
//!
//! Capabilities that not every widget has (snapshot-specific drawing, custom
//! bounds, content revisions) are provided-default trait methods rather than
//! duck-typed method probing: a widget that does nothing special simply
//! inherits the defaults.
//!
//! ```rust
//! use kurbo::{Point, Rect, Size};
//! use canopy_imaging::Surface;
//! use canopy_scene::{RenderContext, Widget, WidgetId};
//! use canopy_view2d::Camera;
//!
//! struct Sticky { id: WidgetId, at: Point }
//!
//! impl Widget for Sticky {
//!     fn id(&self) -> WidgetId { self.id }
//!     fn kind(&self) -> &'static str { "sticky-note" }
//!     fn position(&self) -> Point { self.at }
//!     fn set_position(&mut self, at: Point) { self.at = at; }
//!     fn size(&self) -> Size { Size::new(200.0, 150.0) }
//!     fn draw(&mut self, surface: &mut dyn Surface, camera: &Camera, ctx: &RenderContext) {
//!         let rect = camera.world_to_screen_rect(self.bounds(camera));
//!         surface.fill_rect(rect, ctx.theme.accent);
//!     }
//! }
//! ```
//!
//! This crate is `no_std`.

#![no_std]

use canopy_imaging::Surface;
use canopy_view2d::Camera;
use kurbo::{Point, Rect, Size};
use peniko::Color;

/// Opaque identifier of a widget within one runtime.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u64);

/// A widget hosted on the canvas.
///
/// Required capabilities are `id`/`kind`/`position`/`size` and a vector
/// [`Widget::draw`]. Everything else has a sensible default. Draw methods
/// are infallible by contract: a widget that cannot render its content is
/// expected to draw a placeholder, never to halt the frame.
pub trait Widget {
    /// Stable identifier of this widget.
    fn id(&self) -> WidgetId;

    /// Short static tag naming the widget type (part of raster cache keys).
    fn kind(&self) -> &'static str;

    /// World-space position of the widget's top-left corner.
    fn position(&self) -> Point;

    /// Moves the widget.
    fn set_position(&mut self, position: Point);

    /// World-space size of the widget.
    fn size(&self) -> Size;

    /// Whether the widget is collapsed to its header/handle.
    fn collapsed(&self) -> bool {
        false
    }

    /// Per-frame update with measured delta time in seconds.
    ///
    /// Culled widgets do not receive `update` calls.
    fn update(&mut self, dt: f64) {
        let _ = dt;
    }

    /// Draws the widget in its live vector form.
    ///
    /// `surface` is in screen pixels; use `camera` to transform world-space
    /// geometry. The same code path runs against offscreen snapshot surfaces
    /// with a synthetic camera, so implementations must not assume they are
    /// drawing to the visible screen.
    fn draw(&mut self, surface: &mut dyn Surface, camera: &Camera, ctx: &RenderContext);

    /// Draws the widget for a cached snapshot.
    ///
    /// Defaults to [`Widget::draw`]. Override to skip transient chrome
    /// (cursors, selection handles) that should not be baked into a cache.
    fn draw_snapshot(&mut self, surface: &mut dyn Surface, camera: &Camera, ctx: &RenderContext) {
        self.draw(surface, camera, ctx);
    }

    /// World-space bounds used for culling and hit testing.
    ///
    /// Defaults to the position/size rectangle. Widgets whose visual extent
    /// depends on zoom (for example fixed-pixel handles) may override.
    fn bounds(&self, camera: &Camera) -> Rect {
        let _ = camera;
        let origin = self.position();
        let size = self.size();
        Rect::from_origin_size(origin, size)
    }

    /// Monotonic revision of the widget's drawable content.
    ///
    /// Bump whenever cached output would become stale. Widgets with static
    /// content can keep the default of `0`; size and collapsed-state changes
    /// are tracked separately by the cache.
    fn content_revision(&self) -> u64 {
        0
    }
}

/// How the workspace is currently being presented.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DisplayMode {
    /// Normal interactive display.
    #[default]
    Full,
    /// Transient reduced overview (e.g. a notebook peek). Snapshot caches
    /// are bypassed and some input handlers opt out.
    Peek,
}

/// Coarse rendering detail tier derived from zoom.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LevelOfDetail {
    /// Full-detail drawing.
    #[default]
    Full,
    /// Simplified drawing for far-out overviews.
    Simplified,
}

impl LevelOfDetail {
    /// Detail tier for a camera zoom factor.
    #[must_use]
    pub fn from_zoom(zoom: f64) -> Self {
        if zoom < 0.3 { Self::Simplified } else { Self::Full }
    }
}

/// The transform interaction currently applied to a widget, if any.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransformMode {
    /// The widget is being moved.
    Move,
    /// The widget is being resized.
    Resize,
}

/// Which widgets are the subject of live interaction this frame.
#[derive(Copy, Clone, Debug, Default)]
pub struct InteractionState {
    /// Currently selected widget.
    pub selected: Option<WidgetId>,
    /// Widget holding keyboard focus.
    pub focused: Option<WidgetId>,
    /// Widget under the pointer.
    pub hovered: Option<WidgetId>,
    /// Whether the primary pointer is a touch (hover is then meaningless).
    pub is_touch_primary: bool,
    /// Widget currently being moved/resized, with the transform mode.
    pub transforming: Option<(WidgetId, TransformMode)>,
}

impl InteractionState {
    /// Whether this widget must be drawn live (vector) because the user is
    /// actively interacting with it: cached bitmaps would visibly lag edits.
    #[must_use]
    pub fn wants_live_drawing(&self, id: WidgetId) -> bool {
        self.selected == Some(id)
            || self.focused == Some(id)
            || self.transforming.map(|(t, _)| t) == Some(id)
            || (self.hovered == Some(id) && !self.is_touch_primary)
    }
}

/// Pixel density quantized to coarse 1×/2×/3× tiers.
///
/// Part of raster cache keys alongside [`canopy_view2d::ZoomBucket`], so
/// fractional-DPI displays do not fragment the cache.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DensityBucket(u8);

impl DensityBucket {
    /// Quantizes a device pixel ratio.
    #[must_use]
    pub fn from_density(density: f64) -> Self {
        if density < 1.5 {
            Self(1)
        } else if density < 2.5 {
            Self(2)
        } else {
            Self(3)
        }
    }

    /// The integer scale tier (1, 2, or 3).
    #[must_use]
    pub fn factor(self) -> u32 {
        u32::from(self.0)
    }
}

/// Theme colors handed to widget draw calls.
#[derive(Copy, Clone, Debug)]
pub struct Theme {
    /// Workspace background.
    pub background: Color,
    /// Background grid lines.
    pub grid_line: Color,
    /// Widget outline/border.
    pub widget_outline: Color,
    /// Loading placeholder fill.
    pub placeholder: Color,
    /// Accent color for selection and highlights.
    pub accent: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::from_rgba8(0xf7, 0xf6, 0xf2, 0xff),
            grid_line: Color::from_rgba8(0xe3, 0xe1, 0xda, 0xff),
            widget_outline: Color::from_rgba8(0x4a, 0x46, 0x3f, 0xff),
            placeholder: Color::from_rgba8(0xdd, 0xdb, 0xd4, 0xff),
            accent: Color::from_rgba8(0x2f, 0x6f, 0xde, 0xff),
        }
    }
}

/// Per-frame context passed to every widget and layer draw call.
#[derive(Clone, Debug)]
pub struct RenderContext {
    /// Viewport width in logical pixels.
    pub view_width: f64,
    /// Viewport height in logical pixels.
    pub view_height: f64,
    /// Device pixel ratio of the hosting surface.
    pub pixel_density: f64,
    /// Current display mode.
    pub display_mode: DisplayMode,
    /// Detail tier derived from zoom.
    pub level_of_detail: LevelOfDetail,
    /// Camera zoom at the time of the draw call.
    pub zoom: f64,
    /// Live interaction state.
    pub interaction: InteractionState,
    /// Theme colors.
    pub theme: Theme,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        id: WidgetId,
        at: Point,
    }

    impl Widget for Probe {
        fn id(&self) -> WidgetId {
            self.id
        }
        fn kind(&self) -> &'static str {
            "probe"
        }
        fn position(&self) -> Point {
            self.at
        }
        fn set_position(&mut self, position: Point) {
            self.at = position;
        }
        fn size(&self) -> Size {
            Size::new(40.0, 30.0)
        }
        fn draw(&mut self, _: &mut dyn Surface, _: &Camera, _: &RenderContext) {}
    }

    #[test]
    fn default_bounds_come_from_position_and_size() {
        let probe = Probe {
            id: WidgetId(1),
            at: Point::new(10.0, 20.0),
        };
        let camera = Camera::new();
        assert_eq!(probe.bounds(&camera), Rect::new(10.0, 20.0, 50.0, 50.0));
        assert_eq!(probe.content_revision(), 0);
        assert!(!probe.collapsed());
    }

    #[test]
    fn hover_wants_live_drawing_only_for_non_touch() {
        let id = WidgetId(7);
        let mut state = InteractionState {
            hovered: Some(id),
            ..InteractionState::default()
        };
        assert!(state.wants_live_drawing(id));
        state.is_touch_primary = true;
        assert!(!state.wants_live_drawing(id));
        state.selected = Some(id);
        assert!(state.wants_live_drawing(id));
        assert!(!state.wants_live_drawing(WidgetId(8)));
    }

    #[test]
    fn density_buckets_are_coarse() {
        assert_eq!(DensityBucket::from_density(1.0).factor(), 1);
        assert_eq!(DensityBucket::from_density(1.25).factor(), 1);
        assert_eq!(DensityBucket::from_density(2.0).factor(), 2);
        assert_eq!(DensityBucket::from_density(3.5).factor(), 3);
    }

    #[test]
    fn level_of_detail_simplifies_far_out() {
        assert_eq!(LevelOfDetail::from_zoom(0.1), LevelOfDetail::Simplified);
        assert_eq!(LevelOfDetail::from_zoom(1.0), LevelOfDetail::Full);
    }
}
