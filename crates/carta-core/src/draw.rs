//! Drawing primitives shared by renderers.
//!
//! - [`RenderLayer`] and [`LayeredOutput`] keep SVG output in map z-order.
//! - [`StrokeDefinition`] describes outline pens, applied with
//!   [`apply_stroke!`](crate::apply_stroke!).

mod layer;
mod stroke;

pub use layer::{LayeredOutput, RenderLayer, SvgNode};
pub use stroke::{StrokeCap, StrokeDefinition, StrokeJoin};
