//! SVG rendering of composed scenes.
//!
//! Map coordinates are mapped onto the output pixel grid with the Y axis
//! flipped, so north points up. Every draw pass becomes one path per feature
//! inside the `<g data-layer>` group of its [`RenderLayer`]; the scale bar and
//! the placeholder label go on top.

use std::{fmt::Write as _, fs, path::PathBuf};

use geo::{Coord, Geometry, LineString, Polygon};
use log::{debug, error, info};
use svg::{Document, node::element as svg_element};

use carta_core::{
    apply_stroke,
    draw::{LayeredOutput, RenderLayer, StrokeCap, StrokeDefinition},
    geometry::{AxisPoint, Extent, PixelSize},
};

use crate::{
    export::{self, Exporter},
    scalebar::ScaleBarPlan,
    scene::{DrawPass, Scene},
};

/// Radius of point markers, in points.
const POINT_RADIUS_PT: f64 = 2.0;

/// Placeholder label size, in points.
const PLACEHOLDER_FONT_PT: f64 = 12.0;

/// Writes scenes to an SVG file.
#[derive(Debug, Clone)]
pub struct SvgExporter {
    path: PathBuf,
}

impl SvgExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Exporter for SvgExporter {
    fn export_scene(&mut self, scene: &Scene) -> Result<(), export::Error> {
        let doc = render_document(scene)?;
        debug!("SVG document rendered");

        info!(path = self.path.display().to_string(); "Writing SVG file");
        if let Err(err) = fs::write(&self.path, doc.to_string()) {
            error!(path = self.path.display().to_string(), err:err; "Failed to write SVG file");
            return Err(export::Error::Io(err));
        }
        Ok(())
    }
}

/// Renders a scene to an SVG document.
///
/// # Errors
///
/// Returns [`export::Error::Render`] if the scene has no drawable size, or
/// draw passes without axis limits.
pub fn render_document(scene: &Scene) -> Result<Document, export::Error> {
    let size = scene.output_size();
    if size.is_empty() || !size.width().is_finite() || !size.height().is_finite() {
        return Err(export::Error::Render(format!(
            "output size {}x{} is not drawable",
            size.width(),
            size.height()
        )));
    }

    let mut output = LayeredOutput::new();
    if let Some(background) = scene.background() {
        let rect = svg_element::Rectangle::new()
            .set("x", 0)
            .set("y", 0)
            .set("width", size.width())
            .set("height", size.height())
            .set("fill", background.to_string())
            .set("fill-opacity", background.alpha());
        output.add_to_layer(RenderLayer::Background, Box::new(rect));
    }

    if !scene.passes().is_empty() {
        let Some(extent) = scene.axis_limits() else {
            return Err(export::Error::Render(
                "scene has draw passes but no axis limits".to_string(),
            ));
        };
        let canvas = Canvas::new(extent, size);
        for pass in scene.passes() {
            output.merge(render_pass(&canvas, pass, scene.px_per_pt()));
        }
    }

    if let Some(plan) = scene.scale_bar() {
        output.merge(render_scale_bar(plan, size, scene.px_per_pt()));
    }

    if let Some(text) = scene.placeholder_text() {
        let label = svg_element::Text::new(text)
            .set("x", size.width() / 2.0)
            .set("y", size.height() / 2.0)
            .set("text-anchor", "middle")
            .set("dominant-baseline", "middle")
            .set("font-family", "sans-serif")
            .set("font-size", PLACEHOLDER_FONT_PT * scene.px_per_pt());
        output.add_to_layer(RenderLayer::Label, Box::new(label));
    }

    let mut doc = Document::new()
        .set("viewBox", format!("0 0 {} {}", size.width(), size.height()))
        .set("width", size.width())
        .set("height", size.height());
    for node in output.render() {
        doc = doc.add(node);
    }
    Ok(doc)
}

/// Maps composition CRS coordinates onto output pixels.
struct Canvas {
    extent: Extent,
    size: PixelSize,
}

impl Canvas {
    fn new(extent: Extent, size: PixelSize) -> Self {
        Self { extent, size }
    }

    fn to_px(&self, coord: Coord<f64>) -> (f64, f64) {
        let x = (coord.x - self.extent.xmin()) / self.extent.width() * self.size.width();
        let y = (self.extent.ymax() - coord.y) / self.extent.height() * self.size.height();
        (x, y)
    }
}

fn render_pass(canvas: &Canvas, pass: &DrawPass, px_per_pt: f64) -> LayeredOutput {
    let mut output = LayeredOutput::new();
    let stroke_px = pass.stroke().width() * px_per_pt;

    for feature in pass.features() {
        let Some(geometry) = feature.geometry() else {
            continue;
        };

        let mut areas = String::new();
        let mut lines = String::new();
        let mut points = Vec::new();
        collect_geometry(canvas, geometry, &mut areas, &mut lines, &mut points);

        if !areas.is_empty() {
            let path = svg_element::Path::new()
                .set("d", areas)
                .set("fill", pass.fill().to_string())
                .set("fill-opacity", pass.fill().alpha())
                .set("fill-rule", "evenodd");
            output.add_to_layer(pass.layer(), Box::new(apply_stroke!(path, pass.stroke(), stroke_px)));
        }
        if !lines.is_empty() {
            let path = svg_element::Path::new().set("d", lines).set("fill", "none");
            output.add_to_layer(pass.layer(), Box::new(apply_stroke!(path, pass.stroke(), stroke_px)));
        }
        for (x, y) in points {
            let marker = svg_element::Circle::new()
                .set("cx", x)
                .set("cy", y)
                .set("r", POINT_RADIUS_PT * px_per_pt)
                .set("fill", pass.fill().to_string())
                .set("fill-opacity", pass.fill().alpha());
            output.add_to_layer(pass.layer(), Box::new(apply_stroke!(marker, pass.stroke(), stroke_px)));
        }
    }
    output
}

/// Appends path data for `geometry`: closed rings to `areas`, open lines to
/// `lines` and point positions to `points`.
fn collect_geometry(
    canvas: &Canvas,
    geometry: &Geometry<f64>,
    areas: &mut String,
    lines: &mut String,
    points: &mut Vec<(f64, f64)>,
) {
    match geometry {
        Geometry::Point(point) => points.push(canvas.to_px(point.0)),
        Geometry::MultiPoint(multi) => {
            points.extend(multi.iter().map(|point| canvas.to_px(point.0)));
        }
        Geometry::Line(line) => {
            push_ring(canvas, lines, [line.start, line.end].into_iter(), false);
        }
        Geometry::LineString(line) => push_line_string(canvas, lines, line, false),
        Geometry::MultiLineString(multi) => {
            for line in multi {
                push_line_string(canvas, lines, line, false);
            }
        }
        Geometry::Polygon(polygon) => push_polygon(canvas, areas, polygon),
        Geometry::MultiPolygon(multi) => {
            for polygon in multi {
                push_polygon(canvas, areas, polygon);
            }
        }
        Geometry::Rect(rect) => push_polygon(canvas, areas, &rect.to_polygon()),
        Geometry::Triangle(triangle) => push_polygon(canvas, areas, &triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for part in collection {
                collect_geometry(canvas, part, areas, lines, points);
            }
        }
    }
}

fn push_polygon(canvas: &Canvas, data: &mut String, polygon: &Polygon<f64>) {
    push_line_string(canvas, data, polygon.exterior(), true);
    for interior in polygon.interiors() {
        push_line_string(canvas, data, interior, true);
    }
}

fn push_line_string(canvas: &Canvas, data: &mut String, line: &LineString<f64>, closed: bool) {
    push_ring(canvas, data, line.coords().copied(), closed);
}

fn push_ring(
    canvas: &Canvas,
    data: &mut String,
    coords: impl Iterator<Item = Coord<f64>>,
    closed: bool,
) {
    let mut first = true;
    for coord in coords {
        let (x, y) = canvas.to_px(coord);
        let command = if first { 'M' } else { 'L' };
        // Writing to a String cannot fail.
        let _ = write!(data, "{}{command} {x:.2} {y:.2}", if data.is_empty() { "" } else { " " });
        first = false;
    }
    if closed && !first {
        data.push_str(" Z");
    }
}

/// Maps normalized axis coordinates onto output pixels.
fn axis_to_px(point: AxisPoint, size: PixelSize) -> (f64, f64) {
    (point.x() * size.width(), (1.0 - point.y()) * size.height())
}

fn render_scale_bar(plan: &ScaleBarPlan, size: PixelSize, px_per_pt: f64) -> LayeredOutput {
    let mut output = LayeredOutput::new();
    let color = plan.color();
    // Butt caps keep the drawn bar exactly as long as its ground length.
    let mut stroke = StrokeDefinition::new(color, plan.line_width_pt());
    stroke.set_cap(StrokeCap::Butt);
    let width_px = stroke.width() * px_per_pt;

    for (start, end) in plan.segments() {
        let (x1, y1) = axis_to_px(start, size);
        let (x2, y2) = axis_to_px(end, size);
        let line = svg_element::Line::new()
            .set("x1", x1)
            .set("y1", y1)
            .set("x2", x2)
            .set("y2", y2);
        output.add_to_layer(RenderLayer::ScaleBar, Box::new(apply_stroke!(line, stroke, width_px)));
    }

    let (x, y) = axis_to_px(plan.label_position(), size);
    let label = svg_element::Text::new(plan.label())
        .set("x", x)
        .set("y", y)
        .set("text-anchor", "middle")
        .set("font-family", "sans-serif")
        .set("font-size", plan.font_size_pt() * px_per_pt)
        .set("fill", color.to_string())
        .set("fill-opacity", color.alpha());
    output.add_to_layer(RenderLayer::ScaleBar, Box::new(label));

    output
}
