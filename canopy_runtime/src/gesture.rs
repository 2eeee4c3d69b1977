// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Multi-pointer gesture arbitration.
//!
//! Every pointer stream is owned by exactly one of three parties: the
//! *camera* (pan and pinch), an *interaction* (a widget or overlay that
//! claimed the down through an input handler), or *ignored* (overflow
//! pointers that arrived after ownership was decided). Ownership is
//! exclusive and winner-take-all:
//!
//! - A down claimed by an interaction demotes any tracked camera pointers to
//!   ignored and cancels the camera gesture, unless a two-pointer pinch is
//!   already established (the runtime stops offering downs to handlers at
//!   that point).
//! - While an interaction owns input, further downs become ignored so a
//!   second finger cannot hijack pan mid-drag.
//! - Releasing the last pointer of a set returns it to idle. Ownership never
//!   falls back from interaction to camera; a fresh touch decides anew.

use kurbo::{Point, Vec2};
use smallvec::SmallVec;

use crate::pointer::PointerId;

/// Camera motion produced by one pointer move.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GestureEffect {
    /// The pointer is not a camera pointer, or nothing moved.
    None,
    /// Single-pointer pan by a screen-pixel delta.
    Pan(Vec2),
    /// Two-pointer pinch: scale by `factor` about `center`, then pan by the
    /// delta of pinch centers. Pinch-zoom and two-finger pan compose in one
    /// gesture this way.
    Pinch {
        /// Current pinch center in screen pixels.
        center: Point,
        /// Ratio of the new pointer distance to the previous one.
        factor: f64,
        /// Screen-pixel delta of the pinch center since the last move.
        pan: Vec2,
    },
}

/// The role assigned to a pointer on down.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointerRole {
    /// The pointer drives camera pan/pinch.
    Camera,
    /// The pointer is parked until release.
    Ignored,
}

#[derive(Copy, Clone, Debug)]
struct CameraPointer {
    id: PointerId,
    position: Point,
}

/// Decides whether each pointer stream drives the camera or an interaction.
///
/// The arbiter is deliberately independent of the runtime so the ownership
/// rules can be tested in isolation; the runtime feeds it downs that no
/// input handler claimed and applies the returned [`GestureEffect`]s to its
/// camera.
#[derive(Debug, Default)]
pub struct GestureArbiter {
    camera: SmallVec<[CameraPointer; 2]>,
    interaction: SmallVec<[PointerId; 2]>,
    ignored: SmallVec<[PointerId; 4]>,
}

impl GestureArbiter {
    /// Creates an idle arbiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a fresh down may still be offered to input handlers.
    ///
    /// Once an interaction owns input, or a two-pointer pinch is
    /// established, new downs are no longer offered and go straight to
    /// [`GestureArbiter::pointer_down`].
    #[must_use]
    pub fn offers_downs_to_handlers(&self) -> bool {
        self.interaction.is_empty() && self.camera.len() < 2
    }

    /// Records that an input handler claimed this down.
    ///
    /// Any tracked camera pointers are demoted to ignored and the camera
    /// gesture is cancelled; interaction wins if it claims before the camera
    /// accumulates two pointers.
    pub fn claim_interaction(&mut self, pointer: PointerId) {
        for tracked in self.camera.drain(..) {
            self.ignored.push(tracked.id);
        }
        self.interaction.push(pointer);
    }

    /// Assigns a role to a down that no handler claimed.
    pub fn pointer_down(&mut self, pointer: PointerId, position: Point) -> PointerRole {
        if !self.interaction.is_empty() || self.camera.len() >= 2 {
            self.ignored.push(pointer);
            return PointerRole::Ignored;
        }
        self.camera.push(CameraPointer {
            id: pointer,
            position,
        });
        PointerRole::Camera
    }

    /// Updates a camera pointer and returns the resulting camera motion.
    ///
    /// Moves of interaction or ignored pointers return
    /// [`GestureEffect::None`]; the runtime routes interaction moves to the
    /// owning handler instead.
    pub fn pointer_move(&mut self, pointer: PointerId, position: Point) -> GestureEffect {
        let Some(index) = self.camera.iter().position(|c| c.id == pointer) else {
            return GestureEffect::None;
        };

        if self.camera.len() == 1 {
            let delta = position - self.camera[index].position;
            self.camera[index].position = position;
            if delta == Vec2::ZERO {
                return GestureEffect::None;
            }
            return GestureEffect::Pan(delta);
        }

        let other = self.camera[1 - index].position;
        let old = self.camera[index].position;
        let old_center = old.midpoint(other);
        let old_distance = (old - other).hypot();

        self.camera[index].position = position;
        let new_center = position.midpoint(other);
        let new_distance = (position - other).hypot();

        // Coincident pointers have no meaningful distance ratio.
        let factor = if old_distance > 1e-6 {
            new_distance / old_distance
        } else {
            1.0
        };
        GestureEffect::Pinch {
            center: new_center,
            factor,
            pan: new_center - old_center,
        }
    }

    /// Releases a pointer (up or cancel) from whichever set holds it.
    pub fn pointer_up(&mut self, pointer: PointerId) {
        self.camera.retain(|c| c.id != pointer);
        self.interaction.retain(|p| *p != pointer);
        self.ignored.retain(|p| *p != pointer);
    }

    /// Whether this pointer is owned by an interaction.
    #[must_use]
    pub fn is_interaction_pointer(&self, pointer: PointerId) -> bool {
        self.interaction.contains(&pointer)
    }

    /// Number of pointers currently driving the camera.
    #[must_use]
    pub fn camera_pointer_count(&self) -> usize {
        self.camera.len()
    }

    /// Whether no pointer is tracked at all.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.camera.is_empty() && self.interaction.is_empty() && self.ignored.is_empty()
    }
}
