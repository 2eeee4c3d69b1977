// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Prioritized input handler registry.
//!
//! Handlers are consulted in `(priority desc, registration sequence desc)`
//! order and dispatch stops at the first one that reports
//! [`InputResponse::Handled`]. Later registrations of equal priority win,
//! so an overlay pushed on top of an existing tool shadows it without
//! renumbering.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use canopy_scene::DisplayMode;
use canopy_view2d::Camera;

use crate::pointer::PointerEvent;

/// Outcome of offering a pointer event to one handler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputResponse {
    /// The handler consumed the event; dispatch stops.
    Handled,
    /// The handler is not interested; dispatch continues.
    Ignored,
}

/// A registered consumer of pointer events (a tool, an overlay, a widget
/// interaction controller).
pub trait InputHandler {
    /// Whether this handler stays active while the workspace is in peek
    /// display mode. Defaults to `false`: most tools are meaningless in a
    /// transient overview.
    fn active_in_peek(&self) -> bool {
        false
    }

    /// Offers one pointer event. Return [`InputResponse::Handled`] to claim
    /// the pointer for an interaction.
    fn on_pointer_event(&mut self, event: &PointerEvent, camera: &Camera) -> InputResponse;
}

struct Entry {
    handler: Box<dyn InputHandler>,
    priority: i32,
    sequence: u64,
}

/// Ordered collection of input handlers.
#[derive(Default)]
pub(crate) struct InputRegistry {
    entries: Vec<Entry>,
    next_sequence: u64,
}

impl fmt::Debug for InputRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRegistry")
            .field("handlers", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl InputRegistry {
    pub(crate) fn register(&mut self, handler: Box<dyn InputHandler>, priority: i32) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(Entry {
            handler,
            priority,
            sequence,
        });
        self.entries
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(b.sequence.cmp(&a.sequence)));
    }

    /// Dispatches one event; returns `true` if some handler claimed it.
    pub(crate) fn dispatch(
        &mut self,
        event: &PointerEvent,
        camera: &Camera,
        display_mode: DisplayMode,
    ) -> bool {
        for entry in &mut self.entries {
            if display_mode == DisplayMode::Peek && !entry.handler.active_in_peek() {
                continue;
            }
            if entry.handler.on_pointer_event(event, camera) == InputResponse::Handled {
                return true;
            }
        }
        false
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
