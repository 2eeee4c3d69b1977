// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::{Affine, Point, Rect, Vec2};

/// Smallest permitted zoom factor.
pub const MIN_ZOOM: f64 = 0.1;

/// Largest permitted zoom factor.
///
/// Large enough for the densest snapshot build target (4× zoom bucket at a
/// 3× pixel-density tier).
pub const MAX_ZOOM: f64 = 16.0;

/// Screen-pixel cull margin before zoom compensation.
const CULL_MARGIN_PX: f64 = 140.0;

/// Camera over the infinite world plane.
///
/// `Camera` tracks a screen-space pan offset and a uniform zoom factor and
/// maintains the derived affine pair mapping world coordinates into screen
/// coordinates and back. It can be used to:
/// - Convert points and rectangles between world and screen space.
/// - Pan and zoom around a chosen anchor point.
/// - Compute the visible world rectangle and cull margins for a viewport.
///
/// The zoom factor is always clamped to `[MIN_ZOOM, MAX_ZOOM]`, and for any
/// fixed camera state `world_to_screen` and `screen_to_world` are exact
/// inverses (up to floating-point tolerance).
#[derive(Clone, Debug)]
pub struct Camera {
    offset: Vec2,
    zoom: f64,
    world_to_screen: Affine,
    screen_to_world: Affine,
}

impl Camera {
    /// Creates a camera at the world origin with zoom `1.0`.
    #[must_use]
    pub fn new() -> Self {
        let mut camera = Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            world_to_screen: Affine::IDENTITY,
            screen_to_world: Affine::IDENTITY,
        };
        camera.rebuild_transforms();
        camera
    }

    /// Places the world origin at the center of a `width` × `height` viewport.
    ///
    /// This is one-time initialization performed when the hosting surface is
    /// first sized; it overwrites any previous pan offset.
    pub fn set_centered_viewport(&mut self, width: f64, height: f64) {
        self.offset = Vec2::new(width / 2.0, height / 2.0);
        self.rebuild_transforms();
    }

    /// Returns the current screen-space pan offset.
    #[must_use]
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Returns the current uniform zoom factor.
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Sets the zoom factor, clamping it into `[MIN_ZOOM, MAX_ZOOM]`.
    ///
    /// The pan offset is unchanged, so the world point at the screen origin
    /// stays fixed. Use [`Camera::zoom_about`] for anchor-preserving zoom.
    pub fn set_zoom(&mut self, zoom: f64) {
        let clamped = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if (self.zoom - clamped).abs() < f64::EPSILON {
            return;
        }
        self.zoom = clamped;
        self.rebuild_transforms();
    }

    /// Pans the camera by a delta in screen pixels.
    ///
    /// Pan is zoom-invariant: dragging by one screen pixel always moves the
    /// view by one screen pixel regardless of the current zoom.
    pub fn pan_by(&mut self, delta: Vec2) {
        if delta == Vec2::ZERO {
            return;
        }
        self.offset += delta;
        self.rebuild_transforms();
    }

    /// Moves the camera so that `world_pt` maps to the given screen point.
    pub fn place_world_point(&mut self, world_pt: Point, screen_pt: Point) {
        self.offset = screen_pt.to_vec2() - world_pt.to_vec2() * self.zoom;
        self.rebuild_transforms();
    }

    /// Zooms around an anchor point in screen coordinates.
    ///
    /// The zoom factor is multiplied by `factor` and clamped; the offset is
    /// then recomputed so the world point under the anchor before the zoom
    /// remains under the anchor after it.
    pub fn zoom_about(&mut self, anchor: Point, factor: f64) {
        if factor <= 0.0 {
            return;
        }
        let old_zoom = self.zoom;
        let new_zoom = (old_zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if (new_zoom - old_zoom).abs() < f64::EPSILON {
            return;
        }

        let anchor_world = self.screen_to_world(anchor);
        self.zoom = new_zoom;
        self.rebuild_transforms();
        let moved = self.world_to_screen(anchor_world);
        self.offset += anchor - moved;
        self.rebuild_transforms();
    }

    /// Converts a world-space point into screen coordinates.
    #[must_use]
    pub fn world_to_screen(&self, pt: Point) -> Point {
        self.world_to_screen * pt
    }

    /// Converts a screen-space point into world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, pt: Point) -> Point {
        self.screen_to_world * pt
    }

    /// Converts a world-space rectangle into screen coordinates.
    #[must_use]
    pub fn world_to_screen_rect(&self, rect: Rect) -> Rect {
        transform_rect(self.world_to_screen, rect)
    }

    /// Converts a screen-space rectangle into world coordinates.
    #[must_use]
    pub fn screen_to_world_rect(&self, rect: Rect) -> Rect {
        transform_rect(self.screen_to_world, rect)
    }

    /// Returns the visible world rectangle for a viewport of the given size.
    #[must_use]
    pub fn visible_world_rect(&self, view_width: f64, view_height: f64) -> Rect {
        self.screen_to_world_rect(Rect::new(0.0, 0.0, view_width, view_height))
    }

    /// Returns the per-frame cull margin in world units.
    ///
    /// The margin is `140px / max(0.25, zoom)`, applied symmetrically on all
    /// four sides of the visible rectangle. At low zoom (many widgets on
    /// screen) the margin shrinks in world units so cull cost stays bounded;
    /// at high zoom a widget just outside the screen is still drawn slightly
    /// early to avoid pop-in during pan.
    #[must_use]
    pub fn cull_margin_world(&self) -> f64 {
        CULL_MARGIN_PX / self.zoom.max(0.25)
    }

    /// Suggests a "nice" grid spacing in world units for the current zoom.
    ///
    /// The returned value is chosen so that grid lines appear roughly tens of
    /// pixels apart on screen (using a 1-2-5 ladder), with `base` treated as
    /// a lower bound on the spacing in world units. Grid density therefore
    /// stays roughly constant on screen across the whole zoom range.
    #[must_use]
    pub fn suggest_grid_spacing(&self, base: f64) -> f64 {
        let base = base.abs().max(f64::MIN_POSITIVE);
        let target_px = 64.0_f64;
        let wu_per_px = 1.0 / self.zoom;
        let mut desired = wu_per_px * target_px;
        if desired < base {
            desired = base;
        }

        let mut unit = 1.0_f64;
        while unit * 10.0 <= desired {
            unit *= 10.0;
        }

        loop {
            for m in [1.0_f64, 2.0, 5.0, 10.0] {
                let step = m * unit;
                if step >= desired {
                    return step;
                }
            }
            unit *= 10.0;
        }
    }

    /// Snapshot of the current camera state for debugging and inspection.
    #[must_use]
    pub fn debug_info(&self) -> CameraDebugInfo {
        CameraDebugInfo {
            offset: self.offset,
            zoom: self.zoom,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
        }
    }

    fn rebuild_transforms(&mut self) {
        // World → screen: scale by zoom, then translate by the pan offset.
        self.world_to_screen = Affine::translate(self.offset) * Affine::scale(self.zoom);
        self.screen_to_world = self.world_to_screen.inverse();
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

/// Transform an axis-aligned rect and take the bounding box of its corners.
///
/// Sufficient for the axis-aligned, uniform zoom transforms used here.
fn transform_rect(t: Affine, rect: Rect) -> Rect {
    let q0 = t * rect.origin();
    let q1 = t * Point::new(rect.max_x(), rect.max_y());
    Rect::new(
        q0.x.min(q1.x),
        q0.y.min(q1.y),
        q0.x.max(q1.x),
        q0.y.max(q1.y),
    )
}

/// Snapshot of camera state returned by [`Camera::debug_info`].
#[derive(Copy, Clone, Debug)]
pub struct CameraDebugInfo {
    /// Screen-space pan offset.
    pub offset: Vec2,
    /// Current zoom factor.
    pub zoom: f64,
    /// Lower zoom clamp.
    pub min_zoom: f64,
    /// Upper zoom clamp.
    pub max_zoom: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point, b: Point) {
        assert!(
            (a - b).hypot() < 1e-9,
            "points differ: {a:?} vs {b:?}"
        );
    }

    #[test]
    fn world_and_screen_are_inverses() {
        let mut camera = Camera::new();
        camera.set_centered_viewport(800.0, 600.0);
        camera.pan_by(Vec2::new(-33.5, 17.25));
        camera.zoom_about(Point::new(120.0, 40.0), 1.7);

        for pt in [
            Point::ZERO,
            Point::new(400.0, 300.0),
            Point::new(-250.0, 801.5),
            Point::new(1e6, -1e6),
        ] {
            assert_close(camera.world_to_screen(camera.screen_to_world(pt)), pt);
            assert_close(camera.screen_to_world(camera.world_to_screen(pt)), pt);
        }
    }

    #[test]
    fn zoom_is_always_clamped() {
        let mut camera = Camera::new();
        camera.set_zoom(1e9);
        assert_eq!(camera.zoom(), MAX_ZOOM);
        camera.set_zoom(0.0);
        assert_eq!(camera.zoom(), MIN_ZOOM);

        camera.zoom_about(Point::new(10.0, 10.0), 1e-12);
        assert_eq!(camera.zoom(), MIN_ZOOM);
        camera.zoom_about(Point::new(10.0, 10.0), 1e12);
        assert_eq!(camera.zoom(), MAX_ZOOM);
    }

    #[test]
    fn zoom_about_preserves_anchor() {
        let mut camera = Camera::new();
        camera.pan_by(Vec2::new(50.0, -20.0));

        let anchor = Point::new(321.0, 123.0);
        let before = camera.screen_to_world(anchor);
        camera.zoom_about(anchor, 3.0);
        let after = camera.screen_to_world(anchor);

        assert_close(before, after);
    }

    #[test]
    fn zoom_at_100_100_by_two_scenario() {
        // Camera at {offset: (0, 0), zoom: 1}; zoom_about((100, 100), 2).
        let mut camera = Camera::new();
        let anchor = Point::new(100.0, 100.0);
        let before = camera.screen_to_world(anchor);

        camera.zoom_about(anchor, 2.0);

        assert_eq!(camera.zoom(), 2.0);
        assert_close(camera.screen_to_world(anchor), before);
    }

    #[test]
    fn pan_is_zoom_invariant() {
        let mut camera = Camera::new();
        camera.set_zoom(4.0);
        let origin_before = camera.world_to_screen(Point::ZERO);

        camera.pan_by(Vec2::new(1.0, 0.0));

        let origin_after = camera.world_to_screen(Point::ZERO);
        assert_close(origin_after, origin_before + Vec2::new(1.0, 0.0));
    }

    #[test]
    fn centered_viewport_maps_origin_to_center() {
        let mut camera = Camera::new();
        camera.set_centered_viewport(1024.0, 768.0);
        assert_close(camera.world_to_screen(Point::ZERO), Point::new(512.0, 384.0));
    }

    #[test]
    fn visible_world_rect_shrinks_with_zoom() {
        let mut camera = Camera::new();
        let wide = camera.visible_world_rect(800.0, 600.0);
        camera.set_zoom(2.0);
        let narrow = camera.visible_world_rect(800.0, 600.0);
        assert!(narrow.width() < wide.width());
        assert!((narrow.width() - wide.width() / 2.0).abs() < 1e-9);
    }

    #[test]
    fn cull_margin_is_floored_at_low_zoom() {
        let mut camera = Camera::new();
        camera.set_zoom(MIN_ZOOM);
        assert_eq!(camera.cull_margin_world(), 140.0 / 0.25);
        camera.set_zoom(2.0);
        assert_eq!(camera.cull_margin_world(), 70.0);
    }

    #[test]
    fn grid_spacing_follows_1_2_5_ladder() {
        let mut camera = Camera::new();
        let spacing = camera.suggest_grid_spacing(1.0);
        // At zoom 1 the desired spacing is 64 world units, rounded up to 100.
        assert_eq!(spacing, 100.0);

        camera.set_zoom(10.0);
        let fine = camera.suggest_grid_spacing(1.0);
        // 6.4 world units desired, rounded up on the ladder to 10.
        assert_eq!(fine, 10.0);
        assert!(fine < spacing);
    }
}
