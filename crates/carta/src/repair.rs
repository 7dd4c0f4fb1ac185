//! Best-effort geometry repair.
//!
//! Sources occasionally deliver geometries that renderers choke on: NaN
//! coordinates, open or collapsed rings, repeated vertices. [`try_repair`]
//! removes what it can and reports [`RepairError`] when nothing drawable
//! remains; callers decide whether to drop the record.
//!
//! Self-intersections are not resolved. Fill rules in the renderers cope
//! with them.

use geo::{
    Coord, CoordsIter, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Polygon,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepairError {
    #[error("{kind} geometry collapsed during repair")]
    Collapsed { kind: &'static str },
}

/// Returns `true` if [`try_repair`] would change the geometry.
pub fn needs_repair(geometry: &Geometry<f64>) -> bool {
    if geometry.coords_iter().any(|coord| !is_finite(coord)) {
        return true;
    }

    match geometry {
        Geometry::LineString(line) => line.0.len() < 2,
        Geometry::Polygon(polygon) => polygon_needs_repair(polygon),
        Geometry::MultiLineString(lines) => lines.0.iter().any(|line| line.0.len() < 2),
        Geometry::MultiPolygon(polygons) => polygons.0.iter().any(polygon_needs_repair),
        Geometry::GeometryCollection(collection) => collection.0.iter().any(needs_repair),
        _ => false,
    }
}

/// Repairs a geometry: drops non-finite and repeated vertices, closes rings,
/// removes rings and parts that collapse.
///
/// # Errors
///
/// Returns [`RepairError::Collapsed`] if nothing drawable remains.
pub fn try_repair(geometry: Geometry<f64>) -> Result<Geometry<f64>, RepairError> {
    let kind = kind_name(&geometry);
    let repaired = match geometry {
        Geometry::Point(point) => is_finite(point.0).then_some(Geometry::Point(point)),
        Geometry::Line(line) => {
            (is_finite(line.start) && is_finite(line.end)).then_some(Geometry::Line(line))
        }
        Geometry::Rect(rect) => {
            (is_finite(rect.min()) && is_finite(rect.max())).then_some(Geometry::Rect(rect))
        }
        Geometry::Triangle(triangle) => triangle
            .to_array()
            .into_iter()
            .all(is_finite)
            .then_some(Geometry::Triangle(triangle)),
        Geometry::LineString(line) => repair_line(line).map(Geometry::LineString),
        Geometry::Polygon(polygon) => repair_polygon(polygon).map(Geometry::Polygon),
        Geometry::MultiPoint(points) => {
            let points: Vec<_> = points.0.into_iter().filter(|point| is_finite(point.0)).collect();
            (!points.is_empty()).then(|| Geometry::MultiPoint(MultiPoint(points)))
        }
        Geometry::MultiLineString(lines) => {
            let lines: Vec<_> = lines.0.into_iter().filter_map(repair_line).collect();
            (!lines.is_empty()).then(|| Geometry::MultiLineString(MultiLineString(lines)))
        }
        Geometry::MultiPolygon(polygons) => {
            let polygons: Vec<_> = polygons.0.into_iter().filter_map(repair_polygon).collect();
            (!polygons.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon(polygons)))
        }
        Geometry::GeometryCollection(collection) => {
            let parts: Vec<_> = collection
                .0
                .into_iter()
                .filter_map(|part| try_repair(part).ok())
                .collect();
            (!parts.is_empty()).then(|| Geometry::GeometryCollection(GeometryCollection(parts)))
        }
    };

    repaired.ok_or(RepairError::Collapsed { kind })
}

fn is_finite(coord: Coord<f64>) -> bool {
    coord.x.is_finite() && coord.y.is_finite()
}

fn polygon_needs_repair(polygon: &Polygon<f64>) -> bool {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .any(|ring| {
            ring.0.len() < 4
                || !ring.is_closed()
                || ring.0.windows(2).any(|pair| pair[0] == pair[1])
        })
}

/// Finite vertices without consecutive duplicates.
fn clean_coords(line: LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords: Vec<Coord<f64>> = line.0.into_iter().filter(|coord| is_finite(*coord)).collect();
    coords.dedup();
    coords
}

fn repair_line(line: LineString<f64>) -> Option<LineString<f64>> {
    let coords = clean_coords(line);
    (coords.len() >= 2).then(|| LineString(coords))
}

fn repair_ring(ring: LineString<f64>) -> Option<LineString<f64>> {
    let mut coords = clean_coords(ring);
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    (coords.len() >= 4).then(|| LineString(coords))
}

fn repair_polygon(polygon: Polygon<f64>) -> Option<Polygon<f64>> {
    let (exterior, interiors) = polygon.into_inner();
    let exterior = repair_ring(exterior)?;
    let interiors = interiors.into_iter().filter_map(repair_ring).collect();
    Some(Polygon::new(exterior, interiors))
}

fn kind_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "point",
        Geometry::Line(_) => "line",
        Geometry::LineString(_) => "line string",
        Geometry::Polygon(_) => "polygon",
        Geometry::MultiPoint(_) => "multi point",
        Geometry::MultiLineString(_) => "multi line string",
        Geometry::MultiPolygon(_) => "multi polygon",
        Geometry::GeometryCollection(_) => "geometry collection",
        Geometry::Rect(_) => "rect",
        Geometry::Triangle(_) => "triangle",
    }
}
