// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::collections::VecDeque;
use core::fmt;

use canopy_imaging::{Bitmap, ImageSampler, Surface};
use canopy_view2d::Camera;
use hashbrown::{HashMap, HashSet};
use kurbo::Rect;
use log::{debug, warn};

use crate::{ScaleBucket, TILE_SIZE};

/// Floor toward negative infinity without `std`.
fn floor_i64(v: f64) -> i64 {
    let t = v as i64;
    if v < 0.0 && v != t as f64 { t - 1 } else { t }
}

/// Ceiling toward positive infinity without `std`.
fn ceil_i64(v: f64) -> i64 {
    let t = v as i64;
    if v > 0.0 && v != t as f64 { t + 1 } else { t }
}

/// Identity of one tile within a page's cache.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Render scale the tile was produced at.
    pub bucket: ScaleBucket,
    /// Tile column in scaled page pixels (`x / TILE_SIZE`).
    pub col: i64,
    /// Tile row in scaled page pixels (`y / TILE_SIZE`).
    pub row: i64,
}

impl TileKey {
    /// The square this tile covers, in scaled page pixels.
    #[must_use]
    fn scaled_rect(self) -> Rect {
        let t = f64::from(TILE_SIZE);
        Rect::new(
            self.col as f64 * t,
            self.row as f64 * t,
            (self.col + 1) as f64 * t,
            (self.row + 1) as f64 * t,
        )
    }
}

/// A visible segment of the page and its world-space destination.
///
/// `source` is in page pixel coordinates (scale 1×); `world` is where that
/// segment lands on the canvas. The two rectangles are related by a linear
/// map, which [`TileCache::draw_mapped_regions`] uses to interpolate tile
/// sub-rectangles into world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RegionMapping {
    /// Source rectangle in page pixels.
    pub source: Rect,
    /// Destination rectangle in world units.
    pub world: Rect,
}

/// The page-rendering capability supplied by the document widget.
///
/// Rendering is expected to be slow (PDF rasterization); it is only ever
/// invoked from [`TileCache::drain_jobs`], never on the blit path.
pub trait PageImageSource {
    /// Renders the given page-pixel region at `scale` into a bitmap of
    /// `region × scale` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`PageRenderError`] when the region cannot be produced; the
    /// cache logs and drops the job, leaving the tile absent.
    fn render_region(&mut self, region: Rect, scale: f64) -> Result<Bitmap, PageRenderError>;
}

/// Failure to render a page region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageRenderError {
    /// The backing document or page is gone.
    Unavailable,
    /// The renderer failed on this region.
    RenderFailed,
}

impl fmt::Display for PageRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "page source unavailable"),
            Self::RenderFailed => write!(f, "page region render failed"),
        }
    }
}

impl core::error::Error for PageRenderError {}

/// Configuration for one page's tile cache.
#[derive(Copy, Clone, Debug)]
pub struct TileCacheConfig {
    /// Maximum number of cached tiles before oldest-insertion eviction.
    pub max_tiles: usize,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self { max_tiles: 128 }
    }
}

/// Tile cache for a single paginated page.
///
/// See the crate docs for the request/drain/draw flow.
pub struct TileCache {
    config: TileCacheConfig,
    tiles: HashMap<TileKey, Bitmap>,
    /// Insertion order of cached tiles, oldest first. Drives the FIFO bound.
    insertion_order: VecDeque<TileKey>,
    /// Tiles with a queued render job.
    pending: HashSet<TileKey>,
    queue: VecDeque<TileKey>,
}

impl fmt::Debug for TileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileCache")
            .field("config", &self.config)
            .field("tiles", &self.tiles.len())
            .field("pending", &self.pending.len())
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl TileCache {
    /// Creates an empty cache with the given configuration.
    #[must_use]
    pub fn new(config: TileCacheConfig) -> Self {
        Self {
            config,
            tiles: HashMap::new(),
            insertion_order: VecDeque::new(),
            pending: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    /// Number of cached tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether no tiles are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of queued render jobs.
    #[must_use]
    pub fn queued_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Drops all cached tiles and queued jobs.
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.insertion_order.clear();
        self.pending.clear();
        self.queue.clear();
    }

    /// Enqueues render jobs for every tile overlapped by `mappings` at the
    /// given scale that is neither cached nor already pending.
    pub fn request_mapped_regions(&mut self, mappings: &[RegionMapping], bucket: ScaleBucket) {
        for mapping in mappings {
            for key in tiles_overlapping(mapping.source, bucket) {
                if self.tiles.contains_key(&key) || self.pending.contains(&key) {
                    continue;
                }
                self.pending.insert(key);
                self.queue.push_back(key);
            }
        }
    }

    /// Renders up to `max_jobs` queued tiles from `source`.
    ///
    /// Callers pass `1` to keep the one-unit-of-work-per-turn discipline.
    /// A failed render is logged and dropped; the tile stays absent and a
    /// later [`TileCache::request_mapped_regions`] may re-enqueue it.
    /// Returns the number of jobs taken off the queue.
    pub fn drain_jobs(&mut self, source: &mut dyn PageImageSource, max_jobs: usize) -> usize {
        let mut processed = 0;
        while processed < max_jobs {
            let Some(key) = self.queue.pop_front() else {
                break;
            };
            processed += 1;
            self.pending.remove(&key);
            if self.tiles.contains_key(&key) {
                continue;
            }

            let scale = key.bucket.factor();
            let region = key.scaled_rect().scale_from_origin(1.0 / scale);
            match source.render_region(region, scale) {
                Ok(bitmap) => {
                    self.tiles.insert(key, bitmap);
                    self.insertion_order.push_back(key);
                    // FIFO bound: evict the single oldest-inserted tile.
                    while self.tiles.len() > self.config.max_tiles {
                        if let Some(oldest) = self.insertion_order.pop_front() {
                            self.tiles.remove(&oldest);
                            debug!("tile cache evicted {oldest:?}");
                        }
                    }
                }
                Err(err) => {
                    warn!("tile render failed for {key:?}: {err}");
                }
            }
        }
        processed
    }

    /// Blits every cached tile sub-rectangle covering `mappings` to the
    /// screen via `camera`, returning the number of sub-regions drawn.
    ///
    /// A return of `0` means nothing was available yet; callers show a
    /// loading placeholder.
    pub fn draw_mapped_regions(
        &self,
        surface: &mut dyn Surface,
        camera: &Camera,
        mappings: &[RegionMapping],
        bucket: ScaleBucket,
    ) -> usize {
        let mut drawn = 0;
        for mapping in mappings {
            if mapping.source.width() <= 0.0 || mapping.source.height() <= 0.0 {
                continue;
            }
            let scale = bucket.factor();
            let scaled_source = mapping.source.scale_from_origin(scale);
            for key in tiles_overlapping(mapping.source, bucket) {
                let Some(tile) = self.tiles.get(&key) else {
                    continue;
                };
                let tile_rect = key.scaled_rect();
                let overlap = scaled_source.intersect(tile_rect);
                if overlap.width() <= 0.0 || overlap.height() <= 0.0 {
                    continue;
                }

                // Overlap in tile-local pixels.
                let local = Rect::new(
                    overlap.x0 - tile_rect.x0,
                    overlap.y0 - tile_rect.y0,
                    overlap.x1 - tile_rect.x0,
                    overlap.y1 - tile_rect.y0,
                );

                // Destination: interpolate the overlap's position within the
                // mapping's source extent into its world extent.
                let fx0 = (overlap.x0 / scale - mapping.source.x0) / mapping.source.width();
                let fx1 = (overlap.x1 / scale - mapping.source.x0) / mapping.source.width();
                let fy0 = (overlap.y0 / scale - mapping.source.y0) / mapping.source.height();
                let fy1 = (overlap.y1 / scale - mapping.source.y0) / mapping.source.height();
                let world = Rect::new(
                    mapping.world.x0 + fx0 * mapping.world.width(),
                    mapping.world.y0 + fy0 * mapping.world.height(),
                    mapping.world.x0 + fx1 * mapping.world.width(),
                    mapping.world.y0 + fy1 * mapping.world.height(),
                );

                let dst = camera.world_to_screen_rect(world);
                surface.draw_bitmap(tile, Some(local), dst, ImageSampler::default());
                drawn += 1;
            }
        }
        drawn
    }
}

/// Tile keys overlapped by a page-pixel rectangle at the given scale.
fn tiles_overlapping(source: Rect, bucket: ScaleBucket) -> impl Iterator<Item = TileKey> {
    let t = f64::from(TILE_SIZE);
    let scaled = source.scale_from_origin(bucket.factor());
    let col0 = floor_i64(scaled.x0 / t);
    let col1 = ceil_i64(scaled.x1 / t);
    let row0 = floor_i64(scaled.y0 / t);
    let row1 = ceil_i64(scaled.y1 / t);
    (row0..row1).flat_map(move |row| {
        (col0..col1).map(move |col| TileKey { bucket, col, row })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// Page source producing solid tiles and counting render calls.
    struct SolidPage {
        calls: usize,
        fail: bool,
    }

    impl SolidPage {
        fn new() -> Self {
            Self { calls: 0, fail: false }
        }
    }

    impl PageImageSource for SolidPage {
        fn render_region(&mut self, region: Rect, scale: f64) -> Result<Bitmap, PageRenderError> {
            self.calls += 1;
            if self.fail {
                return Err(PageRenderError::RenderFailed);
            }
            let w = (region.width() * scale) as u32;
            let h = (region.height() * scale) as u32;
            Ok(Bitmap::new(w.max(1), h.max(1)))
        }
    }

    fn mapping(source: Rect, world: Rect) -> RegionMapping {
        RegionMapping { source, world }
    }

    #[test]
    fn overlap_enumeration_covers_the_region() {
        // 600x300 page px at 1x with 256px tiles: 3 columns, 2 rows.
        let keys: Vec<TileKey> =
            tiles_overlapping(Rect::new(0.0, 0.0, 600.0, 300.0), ScaleBucket::Base).collect();
        assert_eq!(keys.len(), 6);

        // The same region at 2x doubles in scaled pixels: 5 columns, 3 rows.
        let keys: Vec<TileKey> =
            tiles_overlapping(Rect::new(0.0, 0.0, 600.0, 300.0), ScaleBucket::Double).collect();
        assert_eq!(keys.len(), 15);
    }

    #[test]
    fn draw_returns_zero_before_any_tile_completes() {
        let mut cache = TileCache::new(TileCacheConfig::default());
        let mappings = [mapping(
            Rect::new(0.0, 0.0, 600.0, 300.0),
            Rect::new(10.0, 10.0, 310.0, 160.0),
        )];
        cache.request_mapped_regions(&mappings, ScaleBucket::Base);

        let mut surface = canopy_imaging::CpuSurface::new(64, 64).unwrap();
        let camera = Camera::new();
        assert_eq!(
            cache.draw_mapped_regions(&mut surface, &camera, &mappings, ScaleBucket::Base),
            0
        );
    }

    #[test]
    fn mapping_round_trip_draws_every_touched_tile() {
        let mut cache = TileCache::new(TileCacheConfig::default());
        let mappings = [mapping(
            Rect::new(0.0, 0.0, 600.0, 300.0),
            Rect::new(0.0, 0.0, 600.0, 300.0),
        )];
        cache.request_mapped_regions(&mappings, ScaleBucket::Base);
        assert_eq!(cache.queued_jobs(), 6);

        let mut page = SolidPage::new();
        // One job per turn until the queue drains.
        let mut turns = 0;
        while cache.drain_jobs(&mut page, 1) == 1 {
            turns += 1;
        }
        assert_eq!(turns, 6);
        assert_eq!(page.calls, 6);

        let mut surface = canopy_imaging::CpuSurface::new(64, 64).unwrap();
        let camera = Camera::new();
        assert_eq!(
            cache.draw_mapped_regions(&mut surface, &camera, &mappings, ScaleBucket::Base),
            6
        );
    }

    #[test]
    fn requests_are_deduplicated_while_pending() {
        let mut cache = TileCache::new(TileCacheConfig::default());
        let mappings = [mapping(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(0.0, 0.0, 100.0, 100.0),
        )];
        cache.request_mapped_regions(&mappings, ScaleBucket::Base);
        cache.request_mapped_regions(&mappings, ScaleBucket::Base);
        assert_eq!(cache.queued_jobs(), 1);

        let mut page = SolidPage::new();
        cache.drain_jobs(&mut page, 8);
        // Cached now; a new request does not re-enqueue.
        cache.request_mapped_regions(&mappings, ScaleBucket::Base);
        assert_eq!(cache.queued_jobs(), 0);
    }

    #[test]
    fn different_scale_buckets_are_distinct_tiles() {
        let mut cache = TileCache::new(TileCacheConfig::default());
        // Small enough that even 3x coverage (240 scaled pixels) stays inside
        // one tile, so each bucket contributes exactly one job.
        let mappings = [mapping(
            Rect::new(0.0, 0.0, 80.0, 80.0),
            Rect::new(0.0, 0.0, 80.0, 80.0),
        )];
        cache.request_mapped_regions(&mappings, ScaleBucket::Base);
        cache.request_mapped_regions(&mappings, ScaleBucket::Triple);
        assert_eq!(cache.queued_jobs(), 2);
    }

    #[test]
    fn larger_scale_buckets_cover_more_tiles() {
        let mut cache = TileCache::new(TileCacheConfig::default());
        let mappings = [mapping(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(0.0, 0.0, 100.0, 100.0),
        )];
        // 100 page pixels at 1x fit one tile; at 3x they span 300 scaled
        // pixels, which crosses the 256 tile boundary in both axes.
        cache.request_mapped_regions(&mappings, ScaleBucket::Base);
        assert_eq!(cache.queued_jobs(), 1);
        cache.request_mapped_regions(&mappings, ScaleBucket::Triple);
        assert_eq!(cache.queued_jobs(), 5);
    }

    #[test]
    fn oldest_inserted_tile_is_evicted_first() {
        let mut cache = TileCache::new(TileCacheConfig { max_tiles: 2 });
        let wide = [mapping(
            Rect::new(0.0, 0.0, 700.0, 100.0),
            Rect::new(0.0, 0.0, 700.0, 100.0),
        )];
        cache.request_mapped_regions(&wide, ScaleBucket::Base);
        assert_eq!(cache.queued_jobs(), 3);

        let mut page = SolidPage::new();
        cache.drain_jobs(&mut page, 3);
        assert_eq!(cache.len(), 2);

        // The first tile (col 0) went in first and must be the one evicted.
        assert!(!cache.tiles.contains_key(&TileKey {
            bucket: ScaleBucket::Base,
            col: 0,
            row: 0
        }));
        assert!(cache.tiles.contains_key(&TileKey {
            bucket: ScaleBucket::Base,
            col: 2,
            row: 0
        }));
    }

    #[test]
    fn failed_renders_are_dropped_and_retryable() {
        let mut cache = TileCache::new(TileCacheConfig::default());
        let mappings = [mapping(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(0.0, 0.0, 100.0, 100.0),
        )];
        cache.request_mapped_regions(&mappings, ScaleBucket::Base);

        let mut page = SolidPage::new();
        page.fail = true;
        assert_eq!(cache.drain_jobs(&mut page, 4), 1);
        assert!(cache.is_empty());

        // No longer pending, so a fresh request re-enqueues and succeeds.
        cache.request_mapped_regions(&mappings, ScaleBucket::Base);
        assert_eq!(cache.queued_jobs(), 1);
        page.fail = false;
        cache.drain_jobs(&mut page, 4);
        assert_eq!(cache.len(), 1);
    }
}
