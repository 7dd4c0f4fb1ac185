//! Geometric primitives for map composition.
//!
//! This module provides the small value types the composition pipeline passes
//! between its stages.
//!
//! # Overview
//!
//! - [`Extent`] - Axis limits `(xmin, xmax, ymin, ymax)` in composition CRS units
//! - [`PixelSize`] - Width and height of a render target in device pixels
//! - [`AxisPoint`] - A position in normalized axis coordinates
//!
//! # Coordinate Systems
//!
//! Extents live in map space, where Y increases northward. Axis coordinates
//! are normalized to the drawing area:
//!
//! ```text
//!   (0,1) ────────── (1,1)
//!     │                │
//!     │                │
//!   (0,0) ────────── (1,0)
//! ```
//!
//! Renderers map both onto their own pixel space.

use geo::Rect;

/// Axis limits of a map in composition CRS units.
///
/// Field order follows the plotting convention `(xmin, xmax, ymin, ymax)`.
///
/// # Examples
///
/// ```
/// # use carta_core::geometry::Extent;
/// let extent = Extent::new(0.0, 800.0, 0.0, 600.0);
/// assert_eq!(extent.width(), 800.0);
/// assert_eq!(extent.height(), 600.0);
/// assert_eq!(extent.center(), (400.0, 300.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
}

impl Extent {
    /// Creates an extent from its four limits.
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    /// Creates an extent centered on `(cx, cy)` with the given dimensions.
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(
            cx - width / 2.0,
            cx + width / 2.0,
            cy - height / 2.0,
            cy + height / 2.0,
        )
    }

    /// Creates an extent covering a `geo` rectangle.
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.max().x, rect.min().y, rect.max().y)
    }

    /// Minimum x coordinate.
    pub fn xmin(self) -> f64 {
        self.xmin
    }

    /// Maximum x coordinate.
    pub fn xmax(self) -> f64 {
        self.xmax
    }

    /// Minimum y coordinate.
    pub fn ymin(self) -> f64 {
        self.ymin
    }

    /// Maximum y coordinate.
    pub fn ymax(self) -> f64 {
        self.ymax
    }

    pub fn width(self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(self) -> f64 {
        self.ymax - self.ymin
    }

    /// Center point as `(x, y)`.
    pub fn center(self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    /// Width divided by height. Infinite or NaN for degenerate extents.
    pub fn aspect_ratio(self) -> f64 {
        self.width() / self.height()
    }

    /// Returns `true` if both dimensions are positive and finite.
    pub fn is_valid(self) -> bool {
        let (w, h) = (self.width(), self.height());
        w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0
    }

    /// Returns `true` if `rect` lies inside this extent, within `tolerance`.
    pub fn contains_rect(self, rect: Rect<f64>, tolerance: f64) -> bool {
        rect.min().x >= self.xmin - tolerance
            && rect.max().x <= self.xmax + tolerance
            && rect.min().y >= self.ymin - tolerance
            && rect.max().y <= self.ymax + tolerance
    }

    /// Limits as `[xmin, xmax, ymin, ymax]`.
    pub fn to_array(self) -> [f64; 4] {
        [self.xmin, self.xmax, self.ymin, self.ymax]
    }
}

/// Dimensions of a render target in device pixels.
///
/// # Examples
///
/// ```
/// # use carta_core::geometry::PixelSize;
/// let final_size = PixelSize::new(800.0, 600.0);
/// let preview = final_size.scale(0.5);
/// assert_eq!(preview.width(), 400.0);
/// assert_eq!(final_size.aspect_ratio(), preview.aspect_ratio());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelSize {
    width: f64,
    height: f64,
}

impl PixelSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn width(self) -> f64 {
        self.width
    }

    pub fn height(self) -> f64 {
        self.height
    }

    pub fn aspect_ratio(self) -> f64 {
        self.width / self.height
    }

    /// Scales both dimensions by `factor`.
    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    /// Returns `true` if either dimension is zero or negative.
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A position in normalized axis coordinates, `(0, 0)` bottom-left and
/// `(1, 1)` top-right.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisPoint {
    x: f64,
    y: f64,
}

impl AxisPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    /// Returns a copy with the x coordinate replaced.
    pub fn with_x(mut self, x: f64) -> Self {
        self.x = x;
        self
    }

    /// Returns a copy with the y coordinate replaced.
    pub fn with_y(mut self, y: f64) -> Self {
        self.y = y;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_cmp::approx_eq;
    use geo::coord;

    #[test]
    fn test_extent_dimensions() {
        let extent = Extent::new(-10.0, 30.0, 5.0, 25.0);
        assert_eq!(extent.width(), 40.0);
        assert_eq!(extent.height(), 20.0);
        assert_eq!(extent.center(), (10.0, 15.0));
        assert_eq!(extent.aspect_ratio(), 2.0);
        assert!(extent.is_valid());
    }

    #[test]
    fn test_extent_from_center() {
        let extent = Extent::from_center(10.0, 20.0, 4.0, 2.0);
        assert_eq!(extent.to_array(), [8.0, 12.0, 19.0, 21.0]);
    }

    #[test]
    fn test_extent_from_rect() {
        let rect = Rect::new(coord! { x: 1.0, y: 2.0 }, coord! { x: 3.0, y: 7.0 });
        let extent = Extent::from_rect(rect);
        assert_eq!(extent.to_array(), [1.0, 3.0, 2.0, 7.0]);
    }

    #[test]
    fn test_extent_degenerate_is_invalid() {
        assert!(!Extent::new(1.0, 1.0, 0.0, 5.0).is_valid());
        assert!(!Extent::new(0.0, 5.0, 2.0, 2.0).is_valid());
        assert!(!Extent::new(0.0, f64::NAN, 0.0, 1.0).is_valid());
    }

    #[test]
    fn test_extent_contains_rect() {
        let extent = Extent::new(0.0, 10.0, 0.0, 10.0);
        let inside = Rect::new(coord! { x: 1.0, y: 1.0 }, coord! { x: 9.0, y: 9.0 });
        let touching = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 });
        let outside = Rect::new(coord! { x: -1.0, y: 1.0 }, coord! { x: 9.0, y: 9.0 });

        assert!(extent.contains_rect(inside, 0.0));
        assert!(extent.contains_rect(touching, 0.0));
        assert!(!extent.contains_rect(outside, 0.0));
        assert!(extent.contains_rect(outside, 1.0));
    }

    #[test]
    fn test_pixel_size_scale() {
        let size = PixelSize::new(800.0, 600.0);
        let half = size.scale(0.5);
        assert_eq!(half, PixelSize::new(400.0, 300.0));
        assert!(approx_eq!(f64, size.aspect_ratio(), 800.0 / 600.0, ulps = 2));
        assert!(!size.is_empty());
        assert!(PixelSize::new(0.0, 10.0).is_empty());
    }

    #[test]
    fn test_axis_point_with() {
        let point = AxisPoint::new(0.5, 0.05).with_x(0.2).with_y(0.9);
        assert_eq!(point.x(), 0.2);
        assert_eq!(point.y(), 0.9);
    }
}
