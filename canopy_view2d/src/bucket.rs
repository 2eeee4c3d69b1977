// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Zoom quantization for raster cache keys.

/// A zoom factor quantized to a fixed small set of bucket values.
///
/// Continuous pan/zoom jitter must not constantly invalidate raster caches,
/// so cache keys carry one of these bucket values instead of the raw camera
/// zoom. Buckets are chosen by geometric midpoint, so each bucket covers a
/// symmetric range of zoom ratios around its value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ZoomBucket {
    /// 0.25× (far overview).
    Quarter,
    /// 0.5× (zoomed out).
    Half,
    /// 1× (natural size).
    Unit,
    /// 2× (zoomed in).
    Double,
    /// 4× (close inspection).
    Quad,
}

impl ZoomBucket {
    /// Returns the bucket nearest (in ratio) to a continuous zoom factor.
    #[must_use]
    pub fn from_zoom(zoom: f64) -> Self {
        // Geometric midpoints between adjacent bucket values.
        if zoom < 0.354 {
            Self::Quarter
        } else if zoom < 0.707 {
            Self::Half
        } else if zoom < 1.415 {
            Self::Unit
        } else if zoom < 2.829 {
            Self::Double
        } else {
            Self::Quad
        }
    }

    /// The zoom factor this bucket renders at.
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Self::Quarter => 0.25,
            Self::Half => 0.5,
            Self::Unit => 1.0,
            Self::Double => 2.0,
            Self::Quad => 4.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_cover_the_zoom_range() {
        assert_eq!(ZoomBucket::from_zoom(0.1), ZoomBucket::Quarter);
        assert_eq!(ZoomBucket::from_zoom(0.4), ZoomBucket::Half);
        assert_eq!(ZoomBucket::from_zoom(1.0), ZoomBucket::Unit);
        assert_eq!(ZoomBucket::from_zoom(1.3), ZoomBucket::Unit);
        assert_eq!(ZoomBucket::from_zoom(1.6), ZoomBucket::Double);
        assert_eq!(ZoomBucket::from_zoom(3.5), ZoomBucket::Quad);
        assert_eq!(ZoomBucket::from_zoom(10.0), ZoomBucket::Quad);
    }

    #[test]
    fn jitter_around_a_bucket_value_is_stable() {
        for z in [0.93, 0.97, 1.0, 1.05, 1.12] {
            assert_eq!(ZoomBucket::from_zoom(z), ZoomBucket::Unit);
        }
    }

    #[test]
    fn factors_match_variants() {
        assert_eq!(ZoomBucket::Quarter.factor(), 0.25);
        assert_eq!(ZoomBucket::Quad.factor(), 4.0);
    }
}
