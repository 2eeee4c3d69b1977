// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Raster: per-widget snapshot caching.
//!
//! Redrawing every widget in vector form each frame is too expensive once a
//! workspace holds diagrams and document pages. The [`RasterManager`]
//! decides, per widget per frame, whether to run the widget's live vector
//! draw or to blit a cached bitmap snapshot:
//!
//! - Widgets under active interaction (selected, focused, hovered with a
//!   non-touch pointer) always draw vector, since a cached bitmap would
//!   visibly lag live edits. An idle window (default 300 ms) after the last
//!   interaction keeps them on the vector path while the user is likely to
//!   come back.
//! - Cache keys quantize zoom ([`canopy_view2d::ZoomBucket`]) and pixel
//!   density ([`canopy_scene::DensityBucket`]) so pan/zoom jitter does not
//!   thrash the cache, and carry a structured [`RevisionKey`] derived from
//!   the widget's observable state plus a runtime-wide epoch.
//! - A miss never blocks the frame: the widget draws vector immediately and
//!   an asynchronous build job is enqueued (deduplicated, bounded queue).
//!   Jobs run one per turn via [`RasterManager::run_next_build`] and
//!   re-validate the revision key at completion, so out-of-date builds
//!   silently become no-ops instead of corrupting newer entries.
//! - Memory is bounded by a per-widget bucket cap and a global byte budget,
//!   both evicting oldest-by-last-use first ([`RasterConfig`]).
//!
//! This crate is `no_std`.

#![no_std]

extern crate alloc;

mod key;
mod manager;

pub use key::{RasterKey, RevisionKey};
pub use manager::{RasterConfig, RasterManager, RenderedVia, SnapshotContributor, WidgetStore};
