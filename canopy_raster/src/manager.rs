// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt;

use canopy_imaging::{ImageSampler, OffscreenFactory, Surface};
use canopy_scene::{DensityBucket, DisplayMode, LevelOfDetail, RenderContext, Widget, WidgetId};
use canopy_view2d::{Camera, ZoomBucket};
use hashbrown::{HashMap, HashSet};
use kurbo::{Point, Rect};
use log::{debug, warn};

use crate::{RasterKey, RevisionKey};

/// Ceiling of a non-negative value as `u32`, at least 1.
fn ceil_px(v: f64) -> u32 {
    let t = v as u64;
    let c = if v > t as f64 { t + 1 } else { t };
    c.max(1) as u32
}

/// Snapshot-cache policy knobs.
///
/// The defaults are the engine's tuned constants; deployments that know
/// their device class may override them at construction.
#[derive(Copy, Clone, Debug)]
pub struct RasterConfig {
    /// Quiet time after the last interaction before snapshots are used.
    pub idle_delay_ms: u64,
    /// Maximum cached resolution buckets per widget.
    pub bucket_cap: usize,
    /// Global byte budget across all widgets' snapshots.
    pub byte_budget: usize,
    /// Maximum queued build jobs; excess jobs are dropped (vector fallback
    /// continues and the next eligible frame re-enqueues).
    pub max_queue: usize,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            idle_delay_ms: 300,
            bucket_cap: 2,
            byte_budget: 96 * 1024 * 1024,
            max_queue: 32,
        }
    }
}

/// How a widget was drawn this frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderedVia {
    /// Live vector draw.
    Vector,
    /// Cached bitmap blit.
    Snapshot,
}

/// Auxiliary draw pass baked into snapshots.
///
/// Contributors run against the same offscreen surface as the widget's own
/// snapshot draw, so overlays (for example an ink/annotation layer) are
/// included in cached bitmaps and stay aligned with them.
pub trait SnapshotContributor {
    /// Draws on top of `widget`'s snapshot using the synthetic camera.
    fn draw(
        &mut self,
        widget: &dyn Widget,
        surface: &mut dyn Surface,
        camera: &Camera,
        ctx: &RenderContext,
    );
}

/// Mutable access to widgets by id, provided by the runtime's widget list.
///
/// Build jobs resolve their widget through this seam at completion time; a
/// widget removed while its job was queued simply resolves to `None` and the
/// job is discarded.
pub trait WidgetStore {
    /// Returns the widget with the given id, if it still exists.
    fn widget_mut(&mut self, id: WidgetId) -> Option<&mut dyn Widget>;
}

struct RasterEntry {
    bitmap: canopy_imaging::Bitmap,
    byte_size: usize,
    revision: RevisionKey,
    last_used_ms: u64,
    created_ms: u64,
}

struct PendingBuild {
    key: RasterKey,
    revision: RevisionKey,
}

/// Decides vector-vs-snapshot per widget per frame and owns the deferred
/// snapshot build queue.
///
/// See the crate docs for the full policy. The manager never blocks a
/// frame: cache hits cost one blit, misses fall back to the widget's own
/// vector draw while a build job waits its turn.
pub struct RasterManager {
    config: RasterConfig,
    epoch: u64,
    entries: HashMap<RasterKey, RasterEntry>,
    total_bytes: usize,
    pending: HashSet<RasterKey>,
    queue: VecDeque<PendingBuild>,
    last_interaction: HashMap<WidgetId, u64>,
    contributors: Vec<Box<dyn SnapshotContributor>>,
}

impl fmt::Debug for RasterManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterManager")
            .field("config", &self.config)
            .field("epoch", &self.epoch)
            .field("entries", &self.entries.len())
            .field("total_bytes", &self.total_bytes)
            .field("queued", &self.queue.len())
            .field("contributors", &self.contributors.len())
            .finish_non_exhaustive()
    }
}

impl Default for RasterManager {
    fn default() -> Self {
        Self::new(RasterConfig::default())
    }
}

impl RasterManager {
    /// Creates a manager with the given policy configuration.
    #[must_use]
    pub fn new(config: RasterConfig) -> Self {
        Self {
            config,
            epoch: 0,
            entries: HashMap::new(),
            total_bytes: 0,
            pending: HashSet::new(),
            queue: VecDeque::new(),
            last_interaction: HashMap::new(),
            contributors: Vec::new(),
        }
    }

    /// Current policy configuration.
    #[must_use]
    pub fn config(&self) -> RasterConfig {
        self.config
    }

    /// Registers an auxiliary snapshot draw pass.
    pub fn register_contributor(&mut self, contributor: Box<dyn SnapshotContributor>) {
        self.contributors.push(contributor);
    }

    /// Bumps the global invalidation epoch.
    ///
    /// Every cached entry becomes stale at once; use for theme changes and
    /// other whole-workspace visual shifts.
    pub fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    /// Current invalidation epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of cached snapshot entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Total bytes held by cached snapshots.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Number of queued build jobs.
    #[must_use]
    pub fn queued_builds(&self) -> usize {
        self.queue.len()
    }

    /// Whether a valid-or-stale entry exists for the given key.
    #[must_use]
    pub fn has_entry(&self, key: RasterKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Draws `widget` either live or from its cached snapshot.
    ///
    /// This is the per-frame decision path; the only work it ever does
    /// beyond the widget's own draw is a single bitmap blit on a cache hit.
    pub fn render_widget(
        &mut self,
        widget: &mut dyn Widget,
        surface: &mut dyn Surface,
        camera: &Camera,
        ctx: &RenderContext,
        now_ms: u64,
    ) -> RenderedVia {
        let id = widget.id();

        // Transient overviews are not worth building snapshots for.
        if ctx.display_mode == DisplayMode::Peek {
            widget.draw(surface, camera, ctx);
            return RenderedVia::Vector;
        }

        // Live interaction must see live drawing.
        if ctx.interaction.wants_live_drawing(id) {
            self.last_interaction.insert(id, now_ms);
            widget.draw(surface, camera, ctx);
            return RenderedVia::Vector;
        }

        // Recently interacted: stay on vector to avoid cache churn while
        // the user is still likely to come back.
        let last = self.last_interaction.get(&id).copied().unwrap_or(0);
        if now_ms.saturating_sub(last) < self.config.idle_delay_ms {
            widget.draw(surface, camera, ctx);
            return RenderedVia::Vector;
        }

        let key = RasterKey {
            widget: id,
            zoom: ZoomBucket::from_zoom(ctx.zoom),
            density: DensityBucket::from_density(ctx.pixel_density),
        };
        let revision = RevisionKey::compute(widget, self.epoch);

        if let Some(entry) = self.entries.get_mut(&key) {
            if entry.revision == revision {
                let world = Rect::from_origin_size(widget.position(), widget.size());
                let dst = camera.world_to_screen_rect(world);
                surface.draw_bitmap(&entry.bitmap, None, dst, ImageSampler::default());
                entry.last_used_ms = now_ms;
                return RenderedVia::Snapshot;
            }
        }

        // Miss: never block the frame. Vector now, build later.
        widget.draw(surface, camera, ctx);
        if !self.pending.contains(&key) {
            if self.queue.len() < self.config.max_queue {
                self.pending.insert(key);
                self.queue.push_back(PendingBuild { key, revision });
            } else {
                debug!("snapshot build queue full, dropping job for {key:?}");
            }
        }
        RenderedVia::Vector
    }

    /// Runs at most one queued snapshot build.
    ///
    /// Intended to be called once per frame (or micro-turn) so builds never
    /// starve input and frame callbacks. Returns `false` when the queue is
    /// empty. A job whose widget is gone or whose revision no longer
    /// matches is discarded silently; a failed offscreen allocation is
    /// logged and dropped, leaving the widget on its vector path.
    pub fn run_next_build(
        &mut self,
        store: &mut dyn WidgetStore,
        factory: &dyn OffscreenFactory,
        ctx: &RenderContext,
        now_ms: u64,
    ) -> bool {
        let Some(job) = self.queue.pop_front() else {
            return false;
        };
        self.pending.remove(&job.key);

        let Some(widget) = store.widget_mut(job.key.widget) else {
            debug!("discarding snapshot build for removed widget {:?}", job.key.widget);
            return true;
        };

        // Re-validate: the widget may have changed since enqueue. The next
        // eligible frame re-enqueues with the fresh revision.
        let revision = RevisionKey::compute(widget, self.epoch);
        if revision != job.revision {
            debug!("discarding stale snapshot build for {:?}", job.key);
            return true;
        }

        let size = widget.size();
        let density = job.key.density.factor();
        let width_px = ceil_px(size.width * job.key.zoom.factor()) * density;
        let height_px = ceil_px(size.height * job.key.zoom.factor()) * density;

        let mut offscreen = match factory.create_offscreen(width_px, height_px) {
            Ok(surface) => surface,
            Err(err) => {
                warn!("snapshot offscreen allocation failed for {:?}: {err}", job.key);
                return true;
            }
        };

        // Synthetic camera local to the widget: its position maps to the
        // offscreen origin, so widget draw code needs no awareness of
        // caching.
        let mut build_camera = Camera::new();
        build_camera.set_zoom(job.key.zoom.factor() * f64::from(density));
        build_camera.place_world_point(widget.position(), Point::ZERO);

        // Normalize the build context to the job, not the live frame: a
        // snapshot is only ever blitted in full mode, and its detail level
        // follows the bucket zoom it was rendered at. The frame the job was
        // enqueued on may have moved on by the time the build runs.
        let build_ctx = RenderContext {
            zoom: job.key.zoom.factor(),
            display_mode: DisplayMode::Full,
            level_of_detail: LevelOfDetail::from_zoom(job.key.zoom.factor()),
            ..ctx.clone()
        };

        let target: &mut dyn Surface = &mut *offscreen;
        widget.draw_snapshot(target, &build_camera, &build_ctx);
        for contributor in &mut self.contributors {
            contributor.draw(&*widget, target, &build_camera, &build_ctx);
        }

        let bitmap = offscreen.finish();
        let byte_size = bitmap.byte_size();
        let entry = RasterEntry {
            bitmap,
            byte_size,
            revision: job.revision,
            last_used_ms: now_ms,
            created_ms: now_ms,
        };
        if let Some(old) = self.entries.insert(job.key, entry) {
            self.total_bytes -= old.byte_size;
        }
        self.total_bytes += byte_size;

        self.enforce_bucket_cap(job.key.widget);
        self.enforce_budget();
        true
    }

    /// Drops all cached entries and queued jobs for a widget.
    ///
    /// Called on widget removal; in-flight conceptual state for the widget
    /// simply ceases to exist.
    pub fn remove_widget(&mut self, id: WidgetId) {
        let stale: Vec<RasterKey> = self
            .entries
            .keys()
            .filter(|key| key.widget == id)
            .copied()
            .collect();
        for key in stale {
            self.remove_entry(key);
        }
        self.pending.retain(|key| key.widget != id);
        self.queue.retain(|job| job.key.widget != id);
        self.last_interaction.remove(&id);
    }

    fn remove_entry(&mut self, key: RasterKey) {
        if let Some(entry) = self.entries.remove(&key) {
            self.total_bytes -= entry.byte_size;
        }
    }

    /// Oldest-by-last-use key among entries passing `filter`.
    fn oldest_key(&self, filter: impl Fn(&RasterKey) -> bool) -> Option<RasterKey> {
        self.entries
            .iter()
            .filter(|(key, _)| filter(key))
            .min_by_key(|(_, entry)| (entry.last_used_ms, entry.created_ms))
            .map(|(key, _)| *key)
    }

    fn enforce_bucket_cap(&mut self, id: WidgetId) {
        loop {
            let count = self.entries.keys().filter(|key| key.widget == id).count();
            if count <= self.config.bucket_cap {
                return;
            }
            match self.oldest_key(|key| key.widget == id) {
                Some(key) => self.remove_entry(key),
                None => return,
            }
        }
    }

    fn enforce_budget(&mut self) {
        while self.total_bytes > self.config.byte_budget {
            match self.oldest_key(|_| true) {
                Some(key) => self.remove_entry(key),
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_imaging::{CpuFactory, CpuSurface};
    use canopy_scene::{InteractionState, LevelOfDetail, Theme};
    use kurbo::Size;
    use peniko::Color;

    struct Note {
        id: WidgetId,
        size: Size,
        content: u64,
        draws: usize,
        snapshot_draws: usize,
        snapshot_ctx: Option<(DisplayMode, LevelOfDetail)>,
    }

    impl Note {
        fn new(id: u64) -> Self {
            Self {
                id: WidgetId(id),
                size: Size::new(100.0, 50.0),
                content: 0,
                draws: 0,
                snapshot_draws: 0,
                snapshot_ctx: None,
            }
        }
    }

    impl Widget for Note {
        fn id(&self) -> WidgetId {
            self.id
        }
        fn kind(&self) -> &'static str {
            "note"
        }
        fn position(&self) -> Point {
            Point::new(10.0, 10.0)
        }
        fn set_position(&mut self, _: Point) {}
        fn size(&self) -> Size {
            self.size
        }
        fn content_revision(&self) -> u64 {
            self.content
        }
        fn draw(&mut self, surface: &mut dyn Surface, camera: &Camera, _: &RenderContext) {
            self.draws += 1;
            let rect = camera.world_to_screen_rect(Rect::from_origin_size(
                self.position(),
                self.size(),
            ));
            surface.fill_rect(rect, Color::from_rgba8(200, 180, 60, 255));
        }
        fn draw_snapshot(
            &mut self,
            surface: &mut dyn Surface,
            camera: &Camera,
            ctx: &RenderContext,
        ) {
            self.snapshot_draws += 1;
            self.snapshot_ctx = Some((ctx.display_mode, ctx.level_of_detail));
            self.draw(surface, camera, ctx);
        }
    }

    struct Store {
        widgets: Vec<Note>,
    }

    impl WidgetStore for Store {
        fn widget_mut(&mut self, id: WidgetId) -> Option<&mut dyn Widget> {
            self.widgets
                .iter_mut()
                .find(|w| w.id() == id)
                .map(|w| w as &mut dyn Widget)
        }
    }

    fn ctx_at_zoom(zoom: f64) -> RenderContext {
        RenderContext {
            view_width: 800.0,
            view_height: 600.0,
            pixel_density: 1.0,
            display_mode: DisplayMode::Full,
            level_of_detail: LevelOfDetail::Full,
            zoom,
            interaction: InteractionState::default(),
            theme: Theme::default(),
        }
    }

    fn screen() -> CpuSurface {
        CpuSurface::new(256, 256).unwrap()
    }

    #[test]
    fn second_render_of_unchanged_widget_is_a_cache_hit() {
        let mut manager = RasterManager::default();
        let mut store = Store { widgets: alloc::vec![Note::new(1)] };
        let camera = Camera::new();
        let ctx = ctx_at_zoom(1.0);
        let mut surface = screen();

        let widget = store.widget_mut(WidgetId(1)).unwrap();
        assert_eq!(
            manager.render_widget(widget, &mut surface, &camera, &ctx, 1_000),
            RenderedVia::Vector
        );
        assert_eq!(manager.queued_builds(), 1);

        // Same state again: still pending, no duplicate job.
        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_016);
        assert_eq!(manager.queued_builds(), 1);

        assert!(manager.run_next_build(&mut store, &CpuFactory, &ctx, 1_020));
        assert_eq!(store.widgets[0].snapshot_draws, 1);

        let draws_before = store.widgets[0].draws;
        let widget = store.widget_mut(WidgetId(1)).unwrap();
        assert_eq!(
            manager.render_widget(widget, &mut surface, &camera, &ctx, 1_032),
            RenderedVia::Snapshot
        );
        assert_eq!(store.widgets[0].draws, draws_before);
        assert_eq!(manager.queued_builds(), 0);
    }

    #[test]
    fn size_change_invalidates_and_rebuilds() {
        let mut manager = RasterManager::default();
        let mut store = Store { widgets: alloc::vec![Note::new(1)] };
        let camera = Camera::new();
        let ctx = ctx_at_zoom(1.0);
        let mut surface = screen();

        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_000);
        manager.run_next_build(&mut store, &CpuFactory, &ctx, 1_010);

        store.widgets[0].size = Size::new(120.0, 50.0);
        let widget = store.widget_mut(WidgetId(1)).unwrap();
        assert_eq!(
            manager.render_widget(widget, &mut surface, &camera, &ctx, 1_050),
            RenderedVia::Vector
        );
        assert_eq!(manager.queued_builds(), 1);
    }

    #[test]
    fn byte_budget_evicts_least_recently_used_first() {
        // Budget fits exactly one 100x50 snapshot (100 * 50 * 4 bytes).
        let mut manager = RasterManager::new(RasterConfig {
            byte_budget: 100 * 50 * 4,
            ..RasterConfig::default()
        });
        let mut store = Store { widgets: alloc::vec![Note::new(1), Note::new(2)] };
        let camera = Camera::new();
        let ctx = ctx_at_zoom(1.0);
        let mut surface = screen();

        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_000);
        manager.run_next_build(&mut store, &CpuFactory, &ctx, 1_010);
        let widget = store.widget_mut(WidgetId(2)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 2_000);
        manager.run_next_build(&mut store, &CpuFactory, &ctx, 2_010);

        assert_eq!(manager.entry_count(), 1);
        assert!(manager.total_bytes() <= manager.config().byte_budget);
        let key = |id: u64| RasterKey {
            widget: WidgetId(id),
            zoom: ZoomBucket::Unit,
            density: DensityBucket::from_density(1.0),
        };
        assert!(!manager.has_entry(key(1)), "older entry should be evicted");
        assert!(manager.has_entry(key(2)));
    }

    #[test]
    fn per_widget_bucket_cap_drops_oldest_bucket() {
        let mut manager = RasterManager::default();
        let mut store = Store { widgets: alloc::vec![Note::new(1)] };
        let camera = Camera::new();
        let mut surface = screen();

        for (i, zoom) in [1.0, 2.0, 4.0].iter().enumerate() {
            let ctx = ctx_at_zoom(*zoom);
            let now = 1_000 + (i as u64) * 500;
            let widget = store.widget_mut(WidgetId(1)).unwrap();
            manager.render_widget(widget, &mut surface, &camera, &ctx, now);
            manager.run_next_build(&mut store, &CpuFactory, &ctx, now + 10);
        }

        assert_eq!(manager.entry_count(), 2);
        let key = |zoom| RasterKey {
            widget: WidgetId(1),
            zoom,
            density: DensityBucket::from_density(1.0),
        };
        assert!(!manager.has_entry(key(ZoomBucket::Unit)));
        assert!(manager.has_entry(key(ZoomBucket::Double)));
        assert!(manager.has_entry(key(ZoomBucket::Quad)));
    }

    #[test]
    fn interaction_keeps_widget_on_vector_path() {
        let mut manager = RasterManager::default();
        let mut store = Store { widgets: alloc::vec![Note::new(1)] };
        let camera = Camera::new();
        let mut surface = screen();

        let mut ctx = ctx_at_zoom(1.0);
        ctx.interaction.selected = Some(WidgetId(1));
        let widget = store.widget_mut(WidgetId(1)).unwrap();
        assert_eq!(
            manager.render_widget(widget, &mut surface, &camera, &ctx, 1_000),
            RenderedVia::Vector
        );
        assert_eq!(manager.queued_builds(), 0);

        // Within the idle window after deselection: still vector, no build.
        ctx.interaction.selected = None;
        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_100);
        assert_eq!(manager.queued_builds(), 0);

        // Past the idle window: the build is scheduled.
        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_400);
        assert_eq!(manager.queued_builds(), 1);
    }

    #[test]
    fn peek_mode_never_builds_snapshots() {
        let mut manager = RasterManager::default();
        let mut store = Store { widgets: alloc::vec![Note::new(1)] };
        let camera = Camera::new();
        let mut surface = screen();

        let mut ctx = ctx_at_zoom(1.0);
        ctx.display_mode = DisplayMode::Peek;
        let widget = store.widget_mut(WidgetId(1)).unwrap();
        assert_eq!(
            manager.render_widget(widget, &mut surface, &camera, &ctx, 5_000),
            RenderedVia::Vector
        );
        assert_eq!(manager.queued_builds(), 0);
    }

    #[test]
    fn build_context_is_normalized_to_the_job() {
        let mut manager = RasterManager::default();
        let mut store = Store { widgets: alloc::vec![Note::new(1)] };
        let camera = Camera::new();
        let mut surface = screen();

        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx_at_zoom(1.0), 1_000);
        assert_eq!(manager.queued_builds(), 1);

        // The workspace flips to peek before the queued build runs. The
        // cached bitmap is only ever blitted in full mode, so the build must
        // not bake the live frame's mode or detail tier into it.
        let mut live = ctx_at_zoom(0.2);
        live.display_mode = DisplayMode::Peek;
        live.level_of_detail = LevelOfDetail::Simplified;
        assert!(manager.run_next_build(&mut store, &CpuFactory, &live, 1_010));
        assert_eq!(
            store.widgets[0].snapshot_ctx,
            Some((DisplayMode::Full, LevelOfDetail::Full))
        );
    }

    #[test]
    fn stale_build_is_discarded_silently() {
        let mut manager = RasterManager::default();
        let mut store = Store { widgets: alloc::vec![Note::new(1)] };
        let camera = Camera::new();
        let ctx = ctx_at_zoom(1.0);
        let mut surface = screen();

        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_000);

        // Content changes between enqueue and build.
        store.widgets[0].content = 1;
        assert!(manager.run_next_build(&mut store, &CpuFactory, &ctx, 1_010));
        assert_eq!(manager.entry_count(), 0);
        assert_eq!(store.widgets[0].snapshot_draws, 0);
    }

    #[test]
    fn epoch_bump_invalidates_all_entries() {
        let mut manager = RasterManager::default();
        let mut store = Store { widgets: alloc::vec![Note::new(1)] };
        let camera = Camera::new();
        let ctx = ctx_at_zoom(1.0);
        let mut surface = screen();

        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_000);
        manager.run_next_build(&mut store, &CpuFactory, &ctx, 1_010);

        manager.bump_epoch();
        let widget = store.widget_mut(WidgetId(1)).unwrap();
        assert_eq!(
            manager.render_widget(widget, &mut surface, &camera, &ctx, 1_050),
            RenderedVia::Vector
        );
        assert_eq!(manager.queued_builds(), 1);
    }

    #[test]
    fn bounded_queue_drops_excess_jobs() {
        let mut manager = RasterManager::new(RasterConfig {
            max_queue: 1,
            ..RasterConfig::default()
        });
        let mut store = Store { widgets: alloc::vec![Note::new(1), Note::new(2)] };
        let camera = Camera::new();
        let ctx = ctx_at_zoom(1.0);
        let mut surface = screen();

        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_000);
        let widget = store.widget_mut(WidgetId(2)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_000);
        assert_eq!(manager.queued_builds(), 1);
    }

    #[test]
    fn widget_removal_forgets_entries_and_jobs() {
        let mut manager = RasterManager::default();
        let mut store = Store { widgets: alloc::vec![Note::new(1)] };
        let camera = Camera::new();
        let ctx = ctx_at_zoom(1.0);
        let mut surface = screen();

        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_000);
        manager.run_next_build(&mut store, &CpuFactory, &ctx, 1_010);
        assert_eq!(manager.entry_count(), 1);

        manager.remove_widget(WidgetId(1));
        assert_eq!(manager.entry_count(), 0);
        assert_eq!(manager.total_bytes(), 0);
        assert_eq!(manager.queued_builds(), 0);
    }

    #[test]
    fn snapshot_includes_contributor_output() {
        struct Marker;
        impl SnapshotContributor for Marker {
            fn draw(
                &mut self,
                widget: &dyn Widget,
                surface: &mut dyn Surface,
                camera: &Camera,
                _: &RenderContext,
            ) {
                let origin = camera.world_to_screen(widget.position());
                surface.fill_rect(
                    Rect::from_origin_size(origin, Size::new(2.0, 2.0)),
                    Color::from_rgba8(255, 0, 255, 255),
                );
            }
        }

        let mut manager = RasterManager::default();
        manager.register_contributor(Box::new(Marker));
        let mut store = Store { widgets: alloc::vec![Note::new(1)] };
        let camera = Camera::new();
        let ctx = ctx_at_zoom(1.0);
        let mut surface = screen();

        let widget = store.widget_mut(WidgetId(1)).unwrap();
        manager.render_widget(widget, &mut surface, &camera, &ctx, 1_000);
        assert!(manager.run_next_build(&mut store, &CpuFactory, &ctx, 1_010));

        // The blit path draws the cached bitmap (with the contributor's
        // magenta marker at the widget origin) instead of calling draw.
        let widget = store.widget_mut(WidgetId(1)).unwrap();
        assert_eq!(
            manager.render_widget(widget, &mut surface, &camera, &ctx, 1_050),
            RenderedVia::Snapshot
        );
        let px = surface.bitmap().pixel(10, 10).unwrap();
        assert_eq!(px, [255, 0, 255, 255]);
    }
}
