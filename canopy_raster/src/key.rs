// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_scene::{DensityBucket, Widget, WidgetId};
use canopy_view2d::ZoomBucket;

/// Cache slot identity: which widget, at which quantized resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RasterKey {
    /// Owning widget.
    pub widget: WidgetId,
    /// Quantized zoom the snapshot was built for.
    pub zoom: ZoomBucket,
    /// Quantized pixel-density tier.
    pub density: DensityBucket,
}

/// Structured revision of a widget's drawable state.
///
/// A snapshot is valid only while this key matches the widget's freshly
/// computed revision. The fields are compared structurally rather than as a
/// concatenated string, which would admit accidental collisions from
/// ambiguous joins.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RevisionKey {
    kind: &'static str,
    width_bits: u64,
    height_bits: u64,
    collapsed: bool,
    content: u64,
    epoch: u64,
}

impl RevisionKey {
    /// Computes the current revision of a widget under the given epoch.
    ///
    /// The epoch is a runtime-wide counter bumped for global invalidation
    /// (for example a theme change); bumping it makes every cached entry
    /// stale at once.
    #[must_use]
    pub fn compute(widget: &dyn Widget, epoch: u64) -> Self {
        let size = widget.size();
        Self {
            kind: widget.kind(),
            width_bits: size.width.to_bits(),
            height_bits: size.height.to_bits(),
            collapsed: widget.collapsed(),
            content: widget.content_revision(),
            epoch,
        }
    }
}
