//! The composed scene handed to a render surface.
//!
//! A [`Scene`] is everything a renderer needs and nothing it has to compute:
//! draw passes in z-order, the axis limits the passes are drawn into, an
//! optional scale-bar plan and, for scenes without data, a placeholder text.

use carta_core::{
    color::Color,
    draw::{RenderLayer, StrokeDefinition},
    feature::Feature,
    geometry::{Extent, PixelSize},
};

use crate::scalebar::ScaleBarPlan;

/// Text shown when the main territory produced no geometry.
pub const PLACEHOLDER_TEXT: &str = "no data";

/// One fill + stroke pass over a set of features.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPass {
    layer: RenderLayer,
    features: Vec<Feature>,
    fill: Color,
    stroke: StrokeDefinition,
}

impl DrawPass {
    pub fn new(layer: RenderLayer, features: Vec<Feature>, fill: Color, stroke: StrokeDefinition) -> Self {
        Self {
            layer,
            features,
            fill,
            stroke,
        }
    }

    /// Z-order of the pass; lower layers are drawn first.
    pub fn layer(&self) -> RenderLayer {
        self.layer
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn fill(&self) -> Color {
        self.fill
    }

    /// Outline pen, width in points.
    pub fn stroke(&self) -> &StrokeDefinition {
        &self.stroke
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A composed map, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    size: PixelSize,
    render_scale: f64,
    dpi: f64,
    background: Option<Color>,
    passes: Vec<DrawPass>,
    axis_limits: Option<Extent>,
    scale_bar: Option<ScaleBarPlan>,
    placeholder: Option<String>,
}

impl Scene {
    /// An empty scene for a render target of `size` final-resolution pixels.
    pub fn new(size: PixelSize, dpi: f64, render_scale: f64, background: Option<Color>) -> Self {
        Self {
            size,
            render_scale,
            dpi,
            background,
            passes: Vec::new(),
            axis_limits: None,
            scale_bar: None,
            placeholder: None,
        }
    }

    /// A scene without geometry that only shows [`PLACEHOLDER_TEXT`].
    pub fn placeholder(size: PixelSize, dpi: f64, render_scale: f64, background: Option<Color>) -> Self {
        let mut scene = Self::new(size, dpi, render_scale, background);
        scene.placeholder = Some(PLACEHOLDER_TEXT.to_string());
        scene
    }

    /// Adds a pass, keeping passes sorted by layer. Empty passes are skipped.
    pub fn push_pass(&mut self, pass: DrawPass) {
        if pass.is_empty() {
            return;
        }
        let index = self.passes.partition_point(|existing| existing.layer() <= pass.layer());
        self.passes.insert(index, pass);
    }

    pub fn set_axis_limits(&mut self, extent: Extent) {
        self.axis_limits = Some(extent);
    }

    pub fn set_scale_bar(&mut self, plan: Option<ScaleBarPlan>) {
        self.scale_bar = plan;
    }

    /// Final-resolution size in pixels.
    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// Pixel size of this render, `size * render_scale`.
    pub fn output_size(&self) -> PixelSize {
        self.size.scale(self.render_scale)
    }

    pub fn render_scale(&self) -> f64 {
        self.render_scale
    }

    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    /// Background color, `None` when transparent.
    pub fn background(&self) -> Option<Color> {
        self.background
    }

    /// Draw passes, bottom to top.
    pub fn passes(&self) -> &[DrawPass] {
        &self.passes
    }

    /// The first pass on `layer`, if any.
    pub fn pass(&self, layer: RenderLayer) -> Option<&DrawPass> {
        self.passes.iter().find(|pass| pass.layer() == layer)
    }

    pub fn axis_limits(&self) -> Option<Extent> {
        self.axis_limits
    }

    pub fn scale_bar(&self) -> Option<&ScaleBarPlan> {
        self.scale_bar.as_ref()
    }

    pub fn placeholder_text(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    /// Returns `true` for placeholder scenes.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    /// Output pixels per typographic point for this render.
    pub fn px_per_pt(&self) -> f64 {
        self.dpi * self.render_scale / 72.0
    }
}
