//! Preview geometry simplification.
//!
//! Interactive previews redraw often; thinning vertices that fall below a
//! pixel or two keeps redraws cheap. The tolerance is expressed in preview
//! pixels and depends on how much is drawn: more features and line work
//! tolerate coarser output, points and the coarsest administrative level
//! less. Simplification is topology preserving, so shared borders stay
//! shared and rings stay valid.

use geo::{Geometry, SimplifyVwPreserve};
use log::debug;

use carta_core::{
    feature::{Feature, GeometryKind},
    geometry::Extent,
};

/// Preview tolerance, in pixels, for a set of features.
pub fn tolerance_px(features: &[Feature]) -> f64 {
    let count = features.len();
    let mut tolerance = if count > 10 {
        8.0
    } else if count > 5 {
        3.0
    } else {
        1.0
    };

    let has_kind = |kind: GeometryKind| features.iter().any(|feature| feature.kind() == Some(kind));
    if has_kind(GeometryKind::Line) {
        tolerance *= 1.5;
    }
    if has_kind(GeometryKind::Polygon) {
        tolerance *= 1.2;
    }
    if has_kind(GeometryKind::Point) {
        tolerance *= 0.5;
    }

    let has_layer = |needle: &str| {
        features.iter().any(|feature| {
            feature
                .layer()
                .is_some_and(|layer| layer.to_ascii_lowercase().contains(needle))
        })
    };
    if has_layer("adm_adm_0") {
        tolerance *= 0.5;
    }
    if has_layer("adm_adm_4") {
        tolerance *= 1.2;
    }

    tolerance
}

/// Simplifies `features` in place for a preview `preview_width_px` pixels wide
/// showing `extent`.
pub fn simplify_for_preview(features: &mut [Feature], extent: Extent, preview_width_px: f64) {
    if features.is_empty() || !(preview_width_px > 0.0) || !extent.is_valid() {
        return;
    }

    let units_per_px = extent.width() / preview_width_px;
    let tolerance = tolerance_px(features) * units_per_px;
    // Visvalingam-Whyatt thresholds on triangle area.
    let epsilon = tolerance * tolerance;

    debug!(features = features.len(), tolerance; "Simplifying preview geometry");
    for feature in features.iter_mut() {
        if let Some(geometry) = feature.take_geometry() {
            feature.set_geometry(Some(simplify_geometry(geometry, epsilon)));
        }
    }
}

fn simplify_geometry(geometry: Geometry<f64>, epsilon: f64) -> Geometry<f64> {
    match geometry {
        Geometry::LineString(line) => Geometry::LineString(line.simplify_vw_preserve(&epsilon)),
        Geometry::MultiLineString(lines) => {
            Geometry::MultiLineString(lines.simplify_vw_preserve(&epsilon))
        }
        Geometry::Polygon(polygon) => Geometry::Polygon(polygon.simplify_vw_preserve(&epsilon)),
        Geometry::MultiPolygon(polygons) => {
            Geometry::MultiPolygon(polygons.simplify_vw_preserve(&epsilon))
        }
        Geometry::GeometryCollection(mut collection) => {
            collection.0 = collection
                .0
                .into_iter()
                .map(|part| simplify_geometry(part, epsilon))
                .collect();
            Geometry::GeometryCollection(collection)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_cmp::approx_eq;
    use geo::{LineString, Point, coord};

    fn line_feature(layer: &str) -> Feature {
        Feature::new(Some(Geometry::LineString(LineString::from(vec![
            (0.0, 0.0),
            (1.0, 1.0),
        ]))))
        .with_layer(layer)
    }

    #[test]
    fn test_tolerance_by_count_and_kind() {
        assert!(approx_eq!(f64, tolerance_px(&[]), 1.0, ulps = 2));
        assert!(approx_eq!(f64, tolerance_px(&vec![line_feature("roads"); 6]), 4.5, epsilon = 1e-12));
        assert!(approx_eq!(f64, tolerance_px(&vec![line_feature("roads"); 11]), 12.0, epsilon = 1e-12));

        let point = Feature::new(Some(Geometry::Point(Point::new(0.0, 0.0))));
        assert!(approx_eq!(f64, tolerance_px(&[point]), 0.5, epsilon = 1e-12));
    }

    #[test]
    fn test_tolerance_by_layer() {
        assert!(approx_eq!(f64, tolerance_px(&[line_feature("ADM_ADM_0")]), 0.75, epsilon = 1e-12));
        assert!(approx_eq!(f64, tolerance_px(&[line_feature("adm_adm_4")]), 1.8, epsilon = 1e-12));
    }

    #[test]
    fn test_simplify_removes_sub_pixel_detail() {
        // A 1000 unit wide line with a 0.01 unit wiggle, drawn 100 px wide.
        let wiggly = LineString(vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 500.0, y: 0.01 },
            coord! { x: 1000.0, y: 0.0 },
        ]);
        let mut features = vec![Feature::new(Some(Geometry::LineString(wiggly)))];
        simplify_for_preview(&mut features, Extent::new(0.0, 1000.0, -500.0, 500.0), 100.0);

        let Some(Geometry::LineString(line)) = features[0].geometry() else {
            panic!("expected a line string");
        };
        assert_eq!(line.0.len(), 2);
    }

    #[test]
    fn test_simplify_keeps_points_and_nulls() {
        let mut features = vec![
            Feature::new(Some(Geometry::Point(Point::new(3.0, 4.0)))),
            Feature::new(None),
        ];
        simplify_for_preview(&mut features, Extent::new(0.0, 10.0, 0.0, 10.0), 100.0);

        assert_eq!(
            features[0].geometry(),
            Some(&Geometry::Point(Point::new(3.0, 4.0)))
        );
        assert!(features[1].geometry().is_none());
    }
}
