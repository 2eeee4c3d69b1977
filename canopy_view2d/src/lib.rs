// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy View 2D: camera and viewport primitives for an infinite canvas.
//!
//! This crate provides a small, headless model of a pannable/zoomable view
//! over an unbounded world plane. It focuses on:
//! - Camera state (pan + uniform zoom, clamped to a fixed range).
//! - Coordinate conversion between world space and screen/device space.
//! - Visible-region and cull-margin helpers for per-frame widget culling.
//! - Zoom quantization ([`ZoomBucket`]) used as part of raster cache keys.
//!
//! It does **not** own any widget collection or rendering backend. Callers
//! are expected to:
//! - Maintain their own widget list or scene.
//! - Use [`Camera`] to derive transforms and visible-region bounds.
//! - Wire pointer gestures into pan/zoom operations at a higher layer
//!   (`canopy_runtime` does this for the full engine).
//!
//! ## Minimal example
//!
//! ```rust
//! use kurbo::Point;
//! use canopy_view2d::Camera;
//!
//! let mut camera = Camera::new();
//! camera.set_centered_viewport(800.0, 600.0);
//!
//! // The world origin now sits at the viewport center.
//! let center = camera.world_to_screen(Point::ZERO);
//! assert_eq!(center, Point::new(400.0, 300.0));
//!
//! // Zoom in around the center; the anchored point stays put.
//! camera.zoom_about(center, 2.0);
//! assert_eq!(camera.world_to_screen(Point::ZERO), center);
//! ```
//!
//! ## Design notes
//!
//! - The camera is axis-aligned with a **uniform** zoom factor; rotation is
//!   intentionally left out.
//! - Panning operates in screen space: dragging by one screen pixel always
//!   moves the camera by one screen pixel regardless of zoom.
//! - All inputs are finite numbers by contract of callers; there are no
//!   error states.
//!
//! This crate is `no_std`.

#![no_std]

mod bucket;
mod camera;

pub use bucket::ZoomBucket;
pub use camera::{Camera, CameraDebugInfo, MAX_ZOOM, MIN_ZOOM};
