// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Tiles: per-page tile cache for large paginated documents.
//!
//! Rasterizing a whole PDF page at the current zoom on every camera change
//! is far too slow, so each page gets a [`TileCache`] that renders the page
//! in fixed-size tiles, on demand, at one of a few quantized scale levels
//! ([`ScaleBucket`]). The flow per frame is:
//!
//! 1. The page widget computes which source-pixel regions of the page are
//!    visible (whitespace-collapsed segments) and where they land in world
//!    space, as a list of [`RegionMapping`]s.
//! 2. [`TileCache::request_mapped_regions`] converts those regions to tile
//!    coordinates and enqueues a render job for every tile that is neither
//!    cached nor pending.
//! 3. The host drains the job queue incrementally with
//!    [`TileCache::drain_jobs`], typically one job per turn, so input and
//!    frame callbacks are never starved.
//! 4. [`TileCache::draw_mapped_regions`] blits whatever tiles are already
//!    cached and reports how many sub-regions it drew; `0` tells the caller
//!    to show a loading placeholder.
//!
//! Eviction is a simple insertion-order bound ([`TileCacheConfig::max_tiles`]):
//! tiles are cheap to rebuild, so access-order tracking would add cost
//! disproportionate to benefit at this granularity.
//!
//! This crate is `no_std`.

#![no_std]

extern crate alloc;

mod cache;

pub use cache::{PageImageSource, PageRenderError, RegionMapping, TileCache, TileCacheConfig, TileKey};

/// Edge length of a cached tile, in pixels of the scaled page.
pub const TILE_SIZE: u32 = 256;

/// Render resolution quantized from camera zoom.
///
/// Fixed thresholds keep pinch/drag jitter from thrashing the cache across
/// resolutions: a page stays at one bucket until the camera commits to a
/// clearly different zoom.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScaleBucket {
    /// 1× page pixels.
    Base,
    /// 2× page pixels.
    Double,
    /// 3× page pixels for deep zoom.
    Triple,
}

impl ScaleBucket {
    /// Picks the render scale for a camera zoom factor.
    #[must_use]
    pub fn from_zoom(zoom: f64) -> Self {
        if zoom >= 2.2 {
            Self::Triple
        } else if zoom >= 1.2 {
            Self::Double
        } else {
            Self::Base
        }
    }

    /// Scale factor from page pixels to tile pixels.
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Self::Base => 1.0,
            Self::Double => 2.0,
            Self::Triple => 3.0,
        }
    }
}
