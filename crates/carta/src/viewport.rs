//! Viewport fitting.
//!
//! [`fit`] grows the bounding box of the main territory to the aspect ratio of
//! the output, pads it and recenters it on the original center.

use geo::Rect;
use log::{debug, warn};
use thiserror::Error;

use carta_core::geometry::Extent;

/// Side length, in CRS units, substituted for a point-like bounding box.
pub const MIN_EXTENT: f64 = 1.0;

/// Default padding fraction applied to each dimension.
pub const DEFAULT_PADDING: f64 = 0.05;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ViewportError {
    #[error("aspect ratio must be positive and finite, got {0}")]
    InvalidAspectRatio(f64),

    #[error("padding fraction must be non-negative and finite, got {0}")]
    InvalidPadding(f64),

    #[error("bounds are not finite")]
    NonFiniteBounds,
}

/// Fits `bounds` to `aspect_ratio` (width / height) with independent padding
/// fractions per dimension.
///
/// The wider dimension is held fixed and the other grown to match the ratio;
/// each dimension is then multiplied by `1 + padding`. Zero-width or
/// zero-height bounds grow from the non-zero side; bounds of a single point
/// become a [`MIN_EXTENT`] square first.
///
/// # Errors
///
/// Returns [`ViewportError`] for a non-positive aspect ratio, negative padding
/// or non-finite bounds.
///
/// # Examples
///
/// ```
/// use carta::viewport::fit;
/// use geo::{Rect, coord};
///
/// let bounds = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 400.0, y: 100.0 });
/// let extent = fit(bounds, 4.0 / 3.0, 0.0, 0.0).unwrap();
/// assert_eq!(extent.width(), 400.0);
/// assert_eq!(extent.height(), 300.0);
/// ```
pub fn fit(
    bounds: Rect<f64>,
    aspect_ratio: f64,
    padding_x: f64,
    padding_y: f64,
) -> Result<Extent, ViewportError> {
    if !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
        return Err(ViewportError::InvalidAspectRatio(aspect_ratio));
    }
    for padding in [padding_x, padding_y] {
        if !(padding.is_finite() && padding >= 0.0) {
            return Err(ViewportError::InvalidPadding(padding));
        }
    }

    let (min, max) = (bounds.min(), bounds.max());
    if ![min.x, min.y, max.x, max.y].iter().all(|value| value.is_finite()) {
        return Err(ViewportError::NonFiniteBounds);
    }

    let (cx, cy) = ((min.x + max.x) / 2.0, (min.y + max.y) / 2.0);
    let (mut width, mut height) = (bounds.width(), bounds.height());

    if width <= 0.0 || height <= 0.0 {
        warn!(width, height; "Degenerate bounds, substituting a minimal extent");
        if width <= 0.0 && height <= 0.0 {
            width = MIN_EXTENT;
            height = MIN_EXTENT;
        }
    }

    // Compare without dividing so a zero height cannot blow up.
    let (mut new_width, mut new_height) = if width > aspect_ratio * height {
        (width, width / aspect_ratio)
    } else {
        (height * aspect_ratio, height)
    };

    new_width *= 1.0 + padding_x;
    new_height *= 1.0 + padding_y;

    let extent = Extent::from_center(cx, cy, new_width, new_height);
    debug!(extent:? = extent.to_array(); "Fitted viewport");
    Ok(extent)
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_cmp::approx_eq;
    use geo::coord;
    use proptest::prelude::*;

    fn rect(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Rect<f64> {
        Rect::new(coord! { x: xmin, y: ymin }, coord! { x: xmax, y: ymax })
    }

    #[test]
    fn test_tall_bounds_grow_width() {
        let extent = fit(rect(0.0, 0.0, 100.0, 300.0), 4.0 / 3.0, 0.05, 0.05).unwrap();
        assert!(approx_eq!(f64, extent.height(), 315.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, extent.width(), 420.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, extent.center().0, 50.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, extent.center().1, 150.0, epsilon = 1e-9));
    }

    #[test]
    fn test_independent_padding() {
        let extent = fit(rect(0.0, 0.0, 200.0, 100.0), 2.0, 0.1, 0.0).unwrap();
        assert!(approx_eq!(f64, extent.width(), 220.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, extent.height(), 100.0, epsilon = 1e-9));
    }

    #[test]
    fn test_zero_height_line() {
        let extent = fit(rect(0.0, 5.0, 80.0, 5.0), 4.0 / 3.0, 0.0, 0.0).unwrap();
        assert!(approx_eq!(f64, extent.width(), 80.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, extent.height(), 60.0, epsilon = 1e-9));
        assert!(extent.is_valid());
    }

    #[test]
    fn test_single_point() {
        let extent = fit(rect(3.0, 4.0, 3.0, 4.0), 2.0, 0.0, 0.0).unwrap();
        assert!(extent.is_valid());
        assert!(approx_eq!(f64, extent.width(), 2.0 * MIN_EXTENT, epsilon = 1e-9));
        assert!(approx_eq!(f64, extent.height(), MIN_EXTENT, epsilon = 1e-9));
        assert_eq!(extent.center(), (3.0, 4.0));
    }

    #[test]
    fn test_invalid_arguments() {
        let bounds = rect(0.0, 0.0, 1.0, 1.0);
        assert_eq!(
            fit(bounds, 0.0, 0.0, 0.0),
            Err(ViewportError::InvalidAspectRatio(0.0))
        );
        assert!(matches!(
            fit(bounds, 1.0, -0.1, 0.0),
            Err(ViewportError::InvalidPadding(_))
        ));
        assert!(fit(bounds, f64::NAN, 0.0, 0.0).is_err());
    }

    proptest! {
        #[test]
        fn fitted_extent_has_target_ratio_and_contains_bounds(
            x in -1.0e6..1.0e6f64,
            y in -1.0e6..1.0e6f64,
            w in 1.0e-3..1.0e6f64,
            h in 1.0e-3..1.0e6f64,
            aspect in 0.1..10.0f64,
            padding in 0.0..0.5f64,
        ) {
            let bounds = rect(x, y, x + w, y + h);
            let extent = fit(bounds, aspect, padding, padding).unwrap();

            // Limits are stored around the center, so rounding scales with the
            // magnitude of the coordinates.
            let magnitude = x.abs().max(y.abs()) + w + h;
            let mismatch = (extent.width() - aspect * extent.height()).abs();
            prop_assert!(mismatch <= 1e-12 * magnitude * (1.0 + aspect));

            prop_assert!(extent.contains_rect(bounds, 1e-9 * magnitude));
        }
    }
}
