// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Runtime: the viewport of the infinite-canvas engine.
//!
//! [`ViewportRuntime`] owns the camera, the z-ordered widget list, the
//! snapshot cache ([`canopy_raster::RasterManager`]), and the per-frame
//! loop. The host shell feeds it pointer events and a frame callback; the
//! runtime does the rest:
//!
//! - **Gesture arbitration** ([`GestureArbiter`]): every pointer stream is
//!   exclusively owned by the camera (pan/pinch), by an interaction that
//!   claimed it through a registered [`InputHandler`], or parked as ignored.
//!   Interaction wins claims, pinch is two pointers exactly, and released
//!   sets reconcile to idle rather than back to camera.
//! - **Input dispatch**: handlers are consulted in priority order (ties
//!   broken toward the most recent registration) and the first to report
//!   handled claims the pointer.
//! - **Frame loop** ([`ViewportRuntime::render_frame`]): focus animation,
//!   background grid, render layers, widgets culled against the visible
//!   world rectangle inflated by a zoom-compensated margin, one snapshot
//!   build job per frame, then overlays. A culled widget receives neither
//!   `update` nor `draw`.
//!
//! The runtime is headless: the host supplies the drawing
//! [`canopy_imaging::Surface`], a monotonic clock (`now_ms`), and measured
//! frame deltas.
//!
//! ```rust
//! use canopy_imaging::{CpuFactory, CpuSurface};
//! use canopy_runtime::ViewportRuntime;
//!
//! let mut runtime = ViewportRuntime::new(800.0, 600.0, 1.0, Box::new(CpuFactory))?;
//! let mut surface = CpuSurface::new(800, 600)?;
//! runtime.render_frame(&mut surface, 0, 0.0);
//! # Ok::<(), Box<dyn core::error::Error>>(())
//! ```
//!
//! This crate is `no_std`.

#![no_std]

extern crate alloc;

mod gesture;
mod input;
mod layers;
mod pointer;
mod runtime;

pub use gesture::{GestureArbiter, GestureEffect, PointerRole};
pub use input::{InputHandler, InputResponse};
pub use layers::{RenderLayer, RenderPhase};
pub use pointer::{PointerEvent, PointerId, PointerKind, PointerPhase};
pub use runtime::{
    CameraListener, FocusOptions, RemovalReason, RuntimeError, ViewportRuntime,
    WidgetRemovedListener,
};
