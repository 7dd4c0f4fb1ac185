//! Z-ordered layer system for SVG map output.
//!
//! Renderers push SVG nodes tagged with a [`RenderLayer`]; [`LayeredOutput`]
//! emits them grouped and sorted so context territories always sit below the
//! main territory, highlights above it, overlays above all territories and the
//! scale bar on top.
//!
//! # Example
//!
//! ```
//! # use carta_core::draw::{RenderLayer, LayeredOutput};
//! # use svg::node::element::{Path, Text};
//!
//! let mut output = LayeredOutput::new();
//!
//! output.add_to_layer(RenderLayer::ScaleBar, Box::new(Text::new("10 km")));
//! output.add_to_layer(RenderLayer::Main, Box::new(Path::new()));
//!
//! // Main renders before the scale bar regardless of insertion order
//! let svg_nodes = output.render();
//! assert_eq!(svg_nodes.len(), 2);
//! ```

use svg::node::element as svg_element;

/// Type alias for boxed SVG nodes.
pub type SvgNode = Box<dyn svg::Node>;

/// Rendering layers of a composed map, bottom to top.
///
/// The `Ord` derive uses declaration order, so the first variant renders first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderLayer {
    /// Background fill of the whole canvas
    Background,
    /// Secondary (context) territories
    Secondary,
    /// Main territory
    Main,
    /// Highlighted regions of the main territory
    Highlight,
    /// User supplied overlay geometry
    Overlay,
    /// Scale bar, ticks and label
    ScaleBar,
    /// Free text such as the "no data" placeholder
    Label,
}

impl RenderLayer {
    /// Returns a human-readable name for this layer.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Secondary => "secondary",
            Self::Main => "main",
            Self::Highlight => "highlight",
            Self::Overlay => "overlay",
            Self::ScaleBar => "scalebar",
            Self::Label => "label",
        }
    }
}

/// SVG nodes grouped by rendering layer.
///
/// When rendered, nodes are emitted in layer order, and in insertion order
/// within a layer.
#[derive(Debug, Default)]
pub struct LayeredOutput {
    items: Vec<(RenderLayer, SvgNode)>,
}

impl LayeredOutput {
    /// Creates a new empty `LayeredOutput`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single node to the specified layer.
    pub fn add_to_layer(&mut self, layer: RenderLayer, node: SvgNode) {
        self.items.push((layer, node));
    }

    /// Appends all nodes of another output.
    pub fn merge(&mut self, other: LayeredOutput) {
        self.items.extend(other.items);
    }

    /// Returns `true` if there are no nodes in any layer.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Renders all layers to SVG groups, consuming the output.
    ///
    /// Each non-empty layer becomes a `<g>` element with a `data-layer`
    /// attribute naming the layer. The sort is stable, so nodes keep their
    /// insertion order inside a layer.
    pub fn render(mut self) -> Vec<SvgNode> {
        if self.is_empty() {
            return Vec::new();
        }

        self.items.sort_by_key(|(layer, _)| *layer);

        let mut result = Vec::new();
        let mut current_layer = self.items[0].0;
        let mut current_group = svg_element::Group::new().set("data-layer", current_layer.name());

        for (layer, node) in self.items {
            if layer != current_layer {
                result.push(Box::new(current_group) as SvgNode);

                current_layer = layer;
                current_group = svg_element::Group::new().set("data-layer", layer.name());
            }

            current_group = current_group.add(node);
        }

        result.push(Box::new(current_group) as SvgNode);

        result
    }
}
