// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use canopy_imaging::{OffscreenFactory, Surface};
use canopy_raster::{
    RasterConfig, RasterManager, RenderedVia, SnapshotContributor, WidgetStore,
};
use canopy_scene::{
    DisplayMode, InteractionState, LevelOfDetail, RenderContext, Theme, Widget, WidgetId,
};
use canopy_view2d::Camera;
use hashbrown::HashSet;
use kurbo::{Point, Rect, Vec2};
use log::debug;

use crate::gesture::{GestureArbiter, GestureEffect};
use crate::input::{InputHandler, InputRegistry};
use crate::layers::{RenderLayer, RenderPhase};
use crate::pointer::{PointerEvent, PointerKind, PointerPhase};

/// Duration of the camera focus animation.
const FOCUS_DURATION_MS: u64 = 320;

/// Zoom clamp for focus fits, tighter than the camera's own clamp so a tiny
/// widget never yanks the view to an extreme magnification.
const FOCUS_MIN_ZOOM: f64 = 0.25;
const FOCUS_MAX_ZOOM: f64 = 4.0;

/// Lower bound on grid spacing in world units.
const GRID_BASE_SPACING: f64 = 8.0;

/// Hard cap on grid lines per axis per frame.
const MAX_GRID_LINES: usize = 512;

/// Why a widget was removed, forwarded to removal listeners.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RemovalReason {
    /// The user deleted the widget.
    User,
    /// A collaborator (persistence, document close) removed it.
    System,
}

/// Observer of widget removals.
pub trait WidgetRemovedListener {
    /// Called after the widget has left the list and its caches are dropped.
    fn widget_removed(&mut self, id: WidgetId, reason: RemovalReason);
}

/// Observer of camera pan/zoom/animation changes.
pub trait CameraListener {
    /// Called after any camera mutation, once per mutation.
    fn camera_changed(&mut self, camera: &Camera);
}

/// Options for [`ViewportRuntime::focus_widget`].
#[derive(Copy, Clone, Debug)]
pub struct FocusOptions {
    /// Fraction of the viewport the widget should fill, in `(0, 1]`.
    pub fit_ratio: f64,
}

impl Default for FocusOptions {
    fn default() -> Self {
        Self { fit_ratio: 0.85 }
    }
}

/// Errors raised synchronously by the runtime.
///
/// These indicate programming errors in the caller, not runtime conditions;
/// nothing here is produced by the frame loop itself.
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeError {
    /// The viewport dimensions were zero, negative, or non-finite.
    InvalidViewport {
        /// Requested width in logical pixels.
        width: f64,
        /// Requested height in logical pixels.
        height: f64,
    },
    /// A focus fit ratio outside `(0, 1]`.
    InvalidFitRatio(f64),
    /// The widget id is not registered.
    UnknownWidget(WidgetId),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidViewport { width, height } => {
                write!(f, "invalid viewport size {width}x{height}")
            }
            Self::InvalidFitRatio(ratio) => {
                write!(f, "focus fit ratio {ratio} out of range (0, 1]")
            }
            Self::UnknownWidget(id) => write!(f, "unknown widget {}", id.0),
        }
    }
}

impl core::error::Error for RuntimeError {}

/// In-flight camera focus animation, sampled per frame.
#[derive(Copy, Clone, Debug)]
struct FocusAnimation {
    from_center: Point,
    to_center: Point,
    from_zoom: f64,
    to_zoom: f64,
    start_ms: u64,
    duration_ms: u64,
}

impl FocusAnimation {
    /// World point under the viewport center, zoom, and completion flag.
    fn sample(&self, now_ms: u64) -> (Point, f64, bool) {
        let elapsed = now_ms.saturating_sub(self.start_ms);
        let t = if self.duration_ms == 0 {
            1.0
        } else {
            (elapsed as f64 / self.duration_ms as f64).min(1.0)
        };
        let eased = ease_in_out_cubic(t);
        let center = self.from_center.lerp(self.to_center, eased);
        let zoom = self.from_zoom + (self.to_zoom - self.from_zoom) * eased;
        (center, zoom, t >= 1.0)
    }
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u * u / 2.0
    }
}

/// Largest multiple of `step` not above `v`, without `std` floor.
fn floor_to_step(v: f64, step: f64) -> f64 {
    let q = v / step;
    let t = q as i64;
    let t = if q < 0.0 && q != t as f64 { t - 1 } else { t };
    t as f64 * step
}

fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// The runtime's owned widget list; z-order is list order, last on top.
struct WidgetList(Vec<Box<dyn Widget>>);

impl WidgetStore for WidgetList {
    fn widget_mut(&mut self, id: WidgetId) -> Option<&mut dyn Widget> {
        self.0
            .iter_mut()
            .find(|w| w.id() == id)
            .map(|w| &mut **w as &mut dyn Widget)
    }
}

/// The infinite-canvas viewport: camera, widget list, input arbitration, and
/// the per-frame render loop.
///
/// The runtime is the only mutator of the camera and widget list. Everything
/// expensive (snapshot builds) is deferred onto queues drained one unit per
/// frame, so a frame's synchronous cost is bounded by blits and vector draws
/// of visible widgets.
pub struct ViewportRuntime {
    camera: Camera,
    view_width: f64,
    view_height: f64,
    pixel_density: f64,
    display_mode: DisplayMode,
    theme: Theme,
    interaction: InteractionState,
    widgets: WidgetList,
    raster: RasterManager,
    factory: Box<dyn OffscreenFactory>,
    input: InputRegistry,
    gesture: GestureArbiter,
    before_layers: Vec<Box<dyn RenderLayer>>,
    after_layers: Vec<Box<dyn RenderLayer>>,
    overlay_layers: Vec<Box<dyn RenderLayer>>,
    removal_listeners: Vec<Box<dyn WidgetRemovedListener>>,
    camera_listeners: Vec<Box<dyn CameraListener>>,
    focus_animation: Option<FocusAnimation>,
    rasterized_this_frame: HashSet<WidgetId>,
}

impl fmt::Debug for ViewportRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportRuntime")
            .field("view_width", &self.view_width)
            .field("view_height", &self.view_height)
            .field("pixel_density", &self.pixel_density)
            .field("display_mode", &self.display_mode)
            .field("camera", &self.camera)
            .field("widgets", &self.widgets.0.len())
            .field("handlers", &self.input.len())
            .field("gesture", &self.gesture)
            .field("raster", &self.raster)
            .finish_non_exhaustive()
    }
}

impl ViewportRuntime {
    /// Creates a runtime for a viewport of the given logical pixel size.
    ///
    /// The camera starts with the world origin at the viewport center.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidViewport`] for non-finite or
    /// non-positive dimensions. This is the construction-time validation
    /// counterpart to the factory's own surface errors; both are fatal.
    pub fn new(
        view_width: f64,
        view_height: f64,
        pixel_density: f64,
        factory: Box<dyn OffscreenFactory>,
    ) -> Result<Self, RuntimeError> {
        if !(view_width.is_finite() && view_height.is_finite())
            || view_width <= 0.0
            || view_height <= 0.0
        {
            return Err(RuntimeError::InvalidViewport {
                width: view_width,
                height: view_height,
            });
        }
        let mut camera = Camera::new();
        camera.set_centered_viewport(view_width, view_height);
        Ok(Self {
            camera,
            view_width,
            view_height,
            pixel_density: pixel_density.max(0.1),
            display_mode: DisplayMode::Full,
            theme: Theme::default(),
            interaction: InteractionState::default(),
            widgets: WidgetList(Vec::new()),
            raster: RasterManager::default(),
            factory,
            input: InputRegistry::default(),
            gesture: GestureArbiter::new(),
            before_layers: Vec::new(),
            after_layers: Vec::new(),
            overlay_layers: Vec::new(),
            removal_listeners: Vec::new(),
            camera_listeners: Vec::new(),
            focus_animation: None,
            rasterized_this_frame: HashSet::new(),
        })
    }

    /// Read access to the camera.
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Pans the camera by a screen-pixel delta and notifies listeners.
    ///
    /// Cancels any in-flight focus animation; explicit navigation wins.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.focus_animation = None;
        self.camera.pan_by(delta);
        self.notify_camera();
    }

    /// Zooms around a screen anchor (wheel zoom) and notifies listeners.
    pub fn zoom_about(&mut self, anchor: Point, factor: f64) {
        self.focus_animation = None;
        self.camera.zoom_about(anchor, factor);
        self.notify_camera();
    }

    /// Resizes the viewport without moving the camera.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidViewport`] for non-finite or
    /// non-positive dimensions.
    pub fn resize_viewport(&mut self, width: f64, height: f64) -> Result<(), RuntimeError> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(RuntimeError::InvalidViewport { width, height });
        }
        self.view_width = width;
        self.view_height = height;
        Ok(())
    }

    /// Updates the device pixel ratio (display migration).
    pub fn set_pixel_density(&mut self, density: f64) {
        self.pixel_density = density.max(0.1);
    }

    /// Current display mode.
    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// Switches display mode (full vs peek overview).
    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.display_mode = mode;
    }

    /// Replaces the theme and invalidates every cached snapshot, since
    /// theme colors are baked into them.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.raster.bump_epoch();
    }

    /// Current interaction state.
    #[must_use]
    pub fn interaction(&self) -> InteractionState {
        self.interaction
    }

    /// Replaces the interaction state (selection, hover, transforms).
    ///
    /// Selection and hover are decided by surrounding tools; the runtime
    /// only consumes this for raster decisions and the render context.
    pub fn set_interaction(&mut self, interaction: InteractionState) {
        self.interaction = interaction;
    }

    /// Adds a widget on top of the z-order and returns its id.
    pub fn add_widget(&mut self, widget: Box<dyn Widget>) -> WidgetId {
        let id = widget.id();
        self.widgets.0.push(widget);
        id
    }

    /// Removes a widget, dropping its raster entries and firing removal
    /// listeners. Returns `false` when the id is unknown.
    pub fn remove_widget_by_id(&mut self, id: WidgetId, reason: RemovalReason) -> bool {
        let Some(index) = self.widgets.0.iter().position(|w| w.id() == id) else {
            debug!("remove_widget_by_id: unknown widget {}", id.0);
            return false;
        };
        self.widgets.0.remove(index);
        self.raster.remove_widget(id);
        // One listener at a time, so one collaborator cannot starve the rest.
        for listener in &mut self.removal_listeners {
            listener.widget_removed(id, reason);
        }
        true
    }

    /// Returns the widget with the given id, if registered.
    #[must_use]
    pub fn widget_by_id(&self, id: WidgetId) -> Option<&dyn Widget> {
        self.widgets.0.iter().find(|w| w.id() == id).map(|w| &**w)
    }

    /// Iterates widgets in z-order, bottom first.
    pub fn widgets(&self) -> impl Iterator<Item = &dyn Widget> {
        self.widgets.0.iter().map(|w| &**w)
    }

    /// Number of registered widgets.
    #[must_use]
    pub fn widget_count(&self) -> usize {
        self.widgets.0.len()
    }

    /// Moves a widget to the top of the z-order. Returns `false` when the
    /// id is unknown.
    pub fn bring_widget_to_front(&mut self, id: WidgetId) -> bool {
        let Some(index) = self.widgets.0.iter().position(|w| w.id() == id) else {
            return false;
        };
        let widget = self.widgets.0.remove(index);
        self.widgets.0.push(widget);
        true
    }

    /// Top-most widget whose bounds contain the given world point.
    #[must_use]
    pub fn pick_widget_at_world_point(&self, point: Point) -> Option<WidgetId> {
        self.widgets
            .0
            .iter()
            .rev()
            .find(|w| w.bounds(&self.camera).contains(point))
            .map(|w| w.id())
    }

    /// Top-most widget under a screen point.
    #[must_use]
    pub fn pick_widget_at_screen_point(&self, point: Point) -> Option<WidgetId> {
        self.pick_widget_at_world_point(self.camera.screen_to_world(point))
    }

    /// The world rectangle currently visible in the viewport.
    #[must_use]
    pub fn visible_world_bounds(&self) -> Rect {
        self.camera.visible_world_rect(self.view_width, self.view_height)
    }

    /// Union of all widget bounds, or `None` for an empty workspace.
    #[must_use]
    pub fn section_world_bounds(&self) -> Option<Rect> {
        let mut iter = self.widgets.0.iter();
        let first = iter.next()?.bounds(&self.camera);
        Some(iter.fold(first, |acc, w| acc.union(w.bounds(&self.camera))))
    }

    /// Starts an animated camera move framing the widget at `fit_ratio` of
    /// the viewport. The target zoom is clamped to `[0.25, 4.0]`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidFitRatio`] for a ratio outside `(0, 1]`,
    /// [`RuntimeError::UnknownWidget`] for an unregistered id.
    pub fn focus_widget(
        &mut self,
        id: WidgetId,
        options: FocusOptions,
        now_ms: u64,
    ) -> Result<(), RuntimeError> {
        if !(options.fit_ratio > 0.0 && options.fit_ratio <= 1.0) {
            return Err(RuntimeError::InvalidFitRatio(options.fit_ratio));
        }
        let bounds = self
            .widgets
            .0
            .iter()
            .find(|w| w.id() == id)
            .map(|w| w.bounds(&self.camera))
            .ok_or(RuntimeError::UnknownWidget(id))?;

        let zoom_w = self.view_width * options.fit_ratio / bounds.width().max(1e-6);
        let zoom_h = self.view_height * options.fit_ratio / bounds.height().max(1e-6);
        let to_zoom = zoom_w.min(zoom_h).clamp(FOCUS_MIN_ZOOM, FOCUS_MAX_ZOOM);
        let view_center = Point::new(self.view_width / 2.0, self.view_height / 2.0);

        self.focus_animation = Some(FocusAnimation {
            from_center: self.camera.screen_to_world(view_center),
            to_center: bounds.center(),
            from_zoom: self.camera.zoom(),
            to_zoom,
            start_ms: now_ms,
            duration_ms: FOCUS_DURATION_MS,
        });
        Ok(())
    }

    /// Registers an input handler at the given priority.
    ///
    /// Dispatch order is priority descending, then registration order
    /// descending; the first handler reporting handled claims the pointer.
    pub fn register_input_handler(&mut self, handler: Box<dyn InputHandler>, priority: i32) {
        self.input.register(handler, priority);
    }

    /// Registers a render layer in the given phase.
    pub fn register_render_layer(&mut self, layer: Box<dyn RenderLayer>, phase: RenderPhase) {
        match phase {
            RenderPhase::BeforeWidgets => self.before_layers.push(layer),
            RenderPhase::AfterWidgets => self.after_layers.push(layer),
        }
    }

    /// Registers an overlay layer, drawn after everything else.
    pub fn register_overlay_layer(&mut self, layer: Box<dyn RenderLayer>) {
        self.overlay_layers.push(layer);
    }

    /// Registers a widget removal observer.
    pub fn register_widget_removed_listener(&mut self, listener: Box<dyn WidgetRemovedListener>) {
        self.removal_listeners.push(listener);
    }

    /// Registers a camera change observer.
    pub fn register_camera_listener(&mut self, listener: Box<dyn CameraListener>) {
        self.camera_listeners.push(listener);
    }

    /// Replaces the raster policy, dropping all cached snapshots.
    pub fn set_raster_config(&mut self, config: RasterConfig) {
        self.raster = RasterManager::new(config);
    }

    /// Read access to the raster manager.
    #[must_use]
    pub fn raster_manager(&self) -> &RasterManager {
        &self.raster
    }

    /// Invalidates every cached snapshot (global epoch bump).
    pub fn bump_widget_raster_epoch(&mut self) {
        self.raster.bump_epoch();
    }

    /// Whether the widget was drawn from a cached snapshot in the most
    /// recent frame.
    #[must_use]
    pub fn is_widget_rasterized_in_frame(&self, id: WidgetId) -> bool {
        self.rasterized_this_frame.contains(&id)
    }

    /// Registers an auxiliary snapshot draw pass (ink overlays and the
    /// like) baked into cached bitmaps.
    pub fn register_snapshot_contributor(&mut self, contributor: Box<dyn SnapshotContributor>) {
        self.raster.register_contributor(contributor);
    }

    /// Routes one pointer event through handler dispatch and gesture
    /// arbitration, applying any resulting camera motion.
    pub fn handle_pointer_event(&mut self, event: PointerEvent) {
        match event.phase {
            PointerPhase::Down => {
                self.interaction.is_touch_primary = event.kind == PointerKind::Touch;
                if self.gesture.offers_downs_to_handlers()
                    && self.input.dispatch(&event, &self.camera, self.display_mode)
                {
                    self.gesture.claim_interaction(event.pointer);
                    return;
                }
                self.gesture.pointer_down(event.pointer, event.position);
            }
            PointerPhase::Move => {
                if self.gesture.is_interaction_pointer(event.pointer) {
                    self.input.dispatch(&event, &self.camera, self.display_mode);
                    return;
                }
                match self.gesture.pointer_move(event.pointer, event.position) {
                    GestureEffect::None => {}
                    GestureEffect::Pan(delta) => {
                        self.focus_animation = None;
                        self.camera.pan_by(delta);
                        self.notify_camera();
                    }
                    GestureEffect::Pinch { center, factor, pan } => {
                        self.focus_animation = None;
                        self.camera.zoom_about(center, factor);
                        self.camera.pan_by(pan);
                        self.notify_camera();
                    }
                }
            }
            PointerPhase::Up | PointerPhase::Cancel => {
                if self.gesture.is_interaction_pointer(event.pointer) {
                    self.input.dispatch(&event, &self.camera, self.display_mode);
                }
                self.gesture.pointer_up(event.pointer);
            }
        }
    }

    /// Renders one frame.
    ///
    /// `now_ms` is the host's monotonic clock; `dt` is the measured delta
    /// since the previous frame in seconds (never assumed). The pass order
    /// is: focus animation, clear, grid, before-layers, culled widgets in
    /// z-order through the raster decision, one snapshot build job,
    /// after-layers, overlays.
    pub fn render_frame(&mut self, surface: &mut dyn Surface, now_ms: u64, dt: f64) {
        self.advance_focus_animation(now_ms);
        let ctx = self.render_context();
        self.rasterized_this_frame.clear();

        surface.clear(self.theme.background);
        self.draw_grid(surface);

        for layer in &mut self.before_layers {
            layer.update(dt);
            layer.draw(surface, &self.camera, &ctx);
        }

        let margin = self.camera.cull_margin_world();
        let cull = self
            .camera
            .visible_world_rect(self.view_width, self.view_height)
            .inflate(margin, margin);

        for widget in &mut self.widgets.0 {
            // Culled widgets receive neither update nor draw this frame.
            if !rects_overlap(cull, widget.bounds(&self.camera)) {
                continue;
            }
            widget.update(dt);
            let via =
                self.raster
                    .render_widget(&mut **widget, surface, &self.camera, &ctx, now_ms);
            if via == RenderedVia::Snapshot {
                self.rasterized_this_frame.insert(widget.id());
            }
        }

        // One build per frame keeps input latency bounded.
        self.raster
            .run_next_build(&mut self.widgets, &*self.factory, &ctx, now_ms);

        for layer in &mut self.after_layers {
            layer.update(dt);
            layer.draw(surface, &self.camera, &ctx);
        }
        for layer in &mut self.overlay_layers {
            layer.update(dt);
            layer.draw(surface, &self.camera, &ctx);
        }
    }

    fn render_context(&self) -> RenderContext {
        RenderContext {
            view_width: self.view_width,
            view_height: self.view_height,
            pixel_density: self.pixel_density,
            display_mode: self.display_mode,
            level_of_detail: LevelOfDetail::from_zoom(self.camera.zoom()),
            zoom: self.camera.zoom(),
            interaction: self.interaction,
            theme: self.theme,
        }
    }

    fn advance_focus_animation(&mut self, now_ms: u64) {
        let Some(animation) = self.focus_animation else {
            return;
        };
        let (center, zoom, done) = animation.sample(now_ms);
        self.camera.set_zoom(zoom);
        self.camera.place_world_point(
            center,
            Point::new(self.view_width / 2.0, self.view_height / 2.0),
        );
        self.notify_camera();
        if done {
            self.focus_animation = None;
        }
    }

    fn draw_grid(&self, surface: &mut dyn Surface) {
        let visible = self
            .camera
            .visible_world_rect(self.view_width, self.view_height);
        let spacing = self.camera.suggest_grid_spacing(GRID_BASE_SPACING);
        let color = self.theme.grid_line;

        let mut x = floor_to_step(visible.x0, spacing);
        let mut lines = 0;
        while x <= visible.x1 && lines < MAX_GRID_LINES {
            let top = self.camera.world_to_screen(Point::new(x, visible.y0));
            let bottom = self.camera.world_to_screen(Point::new(x, visible.y1));
            surface.stroke_line(top, bottom, color, 1.0);
            x += spacing;
            lines += 1;
        }

        let mut y = floor_to_step(visible.y0, spacing);
        let mut lines = 0;
        while y <= visible.y1 && lines < MAX_GRID_LINES {
            let left = self.camera.world_to_screen(Point::new(visible.x0, y));
            let right = self.camera.world_to_screen(Point::new(visible.x1, y));
            surface.stroke_line(left, right, color, 1.0);
            y += spacing;
            lines += 1;
        }
    }

    fn notify_camera(&mut self) {
        // One listener at a time; a slow collaborator delays but never
        // starves the others.
        for listener in &mut self.camera_listeners {
            listener.camera_changed(&self.camera);
        }
    }
}
