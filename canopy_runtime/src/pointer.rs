// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::Point;

/// Host-assigned identifier of one pointer stream (a mouse, one touch
/// contact, or a pen tip).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(pub u64);

/// The device class behind a pointer stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointerKind {
    /// Mouse or trackpad cursor.
    Mouse,
    /// A touch contact.
    Touch,
    /// A stylus tip.
    Pen,
}

/// Lifecycle phase of a pointer event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    /// Contact began.
    Down,
    /// Position changed while down (or hover move for a mouse).
    Move,
    /// Contact ended normally.
    Up,
    /// Contact was aborted by the host (palm rejection, window loss).
    Cancel,
}

/// One pointer event as delivered by the host shell.
///
/// Positions are in screen pixels of the hosting surface; the runtime
/// converts to world space through its camera where needed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerEvent {
    /// Which pointer stream this event belongs to.
    pub pointer: PointerId,
    /// Device class of the stream.
    pub kind: PointerKind,
    /// Lifecycle phase.
    pub phase: PointerPhase,
    /// Screen-space position.
    pub position: Point,
}
