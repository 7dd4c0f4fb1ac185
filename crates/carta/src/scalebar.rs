//! Scale-bar planning.
//!
//! A scale bar is sized against the *reference* pixel dimensions of the final
//! render, `axis_px / render_scale`. A preview at half resolution therefore
//! plans exactly the same bar as the final export: same nice length, same
//! fraction of the axis, same anchor. Pen and font sizes are physical points
//! derived from the output DPI and are likewise independent of the preview.
//!
//! Planning never fails. A hidden bar, an empty or inverted extent, or an axis
//! too small to hold any bar yields `None` and the caller draws nothing.

use std::{fmt, str::FromStr};

use log::{debug, trace};
use serde::Deserialize;

use carta_core::{
    color::Color,
    geometry::{AxisPoint, Extent, PixelSize},
};

use crate::crs::Crs;

/// Upper bound on fit-guard steps; each step at least halves the bar.
const MAX_FIT_STEPS: usize = 64;

/// Converts device pixels at `dpi` to typographic points.
pub fn pixel_to_pt(px: f64, dpi: f64) -> f64 {
    px * 72.0 / dpi
}

/// Rounds `x` to `m * 10^n` with `m` in {1, 2, 5, 10}.
///
/// The mantissa snaps to 1 below 1.5, to 2 below 3, to 5 below 7 and to 10
/// otherwise. Zero, negative and non-finite input yields 0.
///
/// # Examples
///
/// ```
/// use carta::scalebar::nice_number;
///
/// assert_eq!(nice_number(12.0), 10.0);
/// assert_eq!(nice_number(18.0), 20.0);
/// assert_eq!(nice_number(430.0), 500.0);
/// assert_eq!(nice_number(0.0), 0.0);
/// ```
pub fn nice_number(x: f64) -> f64 {
    if !(x.is_finite() && x > 0.0) {
        return 0.0;
    }

    let exponent = x.log10().floor() as i32;
    let magnitude = 10f64.powi(exponent);
    let mantissa = x / magnitude;

    let nice = if mantissa < 1.5 {
        1.0
    } else if mantissa < 3.0 {
        2.0
    } else if mantissa < 7.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// The next smaller value on the 1-2-5 ladder.
fn step_down(nice: f64) -> f64 {
    let exponent = nice.log10().floor() as i32;
    let magnitude = 10f64.powi(exponent);
    let mantissa = (nice / magnitude).round();

    if mantissa >= 5.0 {
        2.0 * magnitude
    } else if mantissa >= 2.0 {
        magnitude
    } else {
        0.5 * magnitude
    }
}

/// Named anchor positions of the scale bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleBarPosition {
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
    TopLeft,
    TopCenter,
    TopRight,
}

impl ScaleBarPosition {
    /// Initial anchor in normalized axis coordinates, before clamping.
    pub fn anchor(self) -> AxisPoint {
        match self {
            Self::BottomLeft => AxisPoint::new(0.05, 0.05),
            Self::BottomCenter => AxisPoint::new(0.5, 0.05),
            Self::BottomRight => AxisPoint::new(0.95, 0.05),
            Self::TopLeft => AxisPoint::new(0.05, 0.95),
            Self::TopCenter => AxisPoint::new(0.5, 0.95),
            Self::TopRight => AxisPoint::new(0.95, 0.95),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
        }
    }
}

impl fmt::Display for ScaleBarPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScaleBarPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-center" => Ok(Self::BottomCenter),
            "bottom-right" => Ok(Self::BottomRight),
            "top-left" => Ok(Self::TopLeft),
            "top-center" => Ok(Self::TopCenter),
            "top-right" => Ok(Self::TopRight),
            _ => Err(format!(
                "invalid scale bar position `{s}`, valid values: bottom-left, bottom-center, \
                 bottom-right, top-left, top-center, top-right"
            )),
        }
    }
}

/// Scale-bar style block, all lengths in final-render device pixels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScaleBarStyle {
    show: bool,
    position: ScaleBarPosition,
    length_fraction: f64,
    min_length_px: f64,
    max_length_px: f64,
    linewidth_px: f64,
    font_px: f64,
    color: Color,
    tick_fraction: f64,
    padding_px: f64,
}

impl Default for ScaleBarStyle {
    fn default() -> Self {
        Self {
            show: false,
            position: ScaleBarPosition::default(),
            length_fraction: 0.07,
            min_length_px: 50.0,
            max_length_px: 200.0,
            linewidth_px: 1.5,
            font_px: 16.0,
            color: Color::default(),
            tick_fraction: 0.05,
            padding_px: 20.0,
        }
    }
}

impl ScaleBarStyle {
    pub fn show(&self) -> bool {
        self.show
    }

    pub fn position(&self) -> ScaleBarPosition {
        self.position
    }

    pub fn length_fraction(&self) -> f64 {
        self.length_fraction
    }

    pub fn min_length_px(&self) -> f64 {
        self.min_length_px
    }

    pub fn max_length_px(&self) -> f64 {
        self.max_length_px
    }

    pub fn linewidth_px(&self) -> f64 {
        self.linewidth_px
    }

    pub fn font_px(&self) -> f64 {
        self.font_px
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn tick_fraction(&self) -> f64 {
        self.tick_fraction
    }

    pub fn padding_px(&self) -> f64 {
        self.padding_px
    }

    pub fn with_show(mut self, show: bool) -> Self {
        self.show = show;
        self
    }

    pub fn with_position(mut self, position: ScaleBarPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_padding_px(mut self, padding_px: f64) -> Self {
        self.padding_px = padding_px;
        self
    }

    pub fn with_length_px(mut self, length_fraction: f64, min_px: f64, max_px: f64) -> Self {
        self.length_fraction = length_fraction;
        self.min_length_px = min_px;
        self.max_length_px = max_px;
        self
    }
}

/// A planned scale bar in normalized axis coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleBarPlan {
    length_m: f64,
    label: String,
    anchor: AxisPoint,
    bar_fraction: f64,
    tick_height: f64,
    line_width_pt: f64,
    font_size_pt: f64,
    color: Color,
}

impl ScaleBarPlan {
    /// Bar length in ground meters.
    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    /// Human label, `"N m"` or `"N km"`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Left end of the bar.
    pub fn anchor(&self) -> AxisPoint {
        self.anchor
    }

    /// Bar width as a fraction of the axis width.
    pub fn bar_fraction(&self) -> f64 {
        self.bar_fraction
    }

    /// Tick height in axis units.
    pub fn tick_height(&self) -> f64 {
        self.tick_height
    }

    pub fn line_width_pt(&self) -> f64 {
        self.line_width_pt
    }

    pub fn font_size_pt(&self) -> f64 {
        self.font_size_pt
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Bottom-center point of the label, above the ticks.
    pub fn label_position(&self) -> AxisPoint {
        AxisPoint::new(
            self.anchor.x() + self.bar_fraction / 2.0,
            self.anchor.y() + self.tick_height * 1.5,
        )
    }

    /// The bar and its two end ticks as line segments.
    pub fn segments(&self) -> [(AxisPoint, AxisPoint); 3] {
        let (x0, y0) = (self.anchor.x(), self.anchor.y());
        let x1 = x0 + self.bar_fraction;
        let top = y0 + self.tick_height;
        [
            (AxisPoint::new(x0, y0), AxisPoint::new(x1, y0)),
            (AxisPoint::new(x0, y0), AxisPoint::new(x0, top)),
            (AxisPoint::new(x1, y0), AxisPoint::new(x1, top)),
        ]
    }
}

/// Formats a bar length, kilometers from 1000 m on.
fn format_length(length_m: f64) -> String {
    if length_m >= 1000.0 {
        format!("{} km", (length_m / 1000.0).round())
    } else {
        format!("{} m", length_m.round())
    }
}

/// Horizontal span of `extent` in ground meters.
fn map_width_m(extent: Extent, crs: Crs) -> Option<f64> {
    if !crs.is_geographic() {
        return Some(extent.width());
    }

    let (xmin, _) = crs
        .transform_point(Crs::WebMercator, extent.xmin(), extent.ymin())
        .ok()?;
    let (xmax, _) = crs
        .transform_point(Crs::WebMercator, extent.xmax(), extent.ymax())
        .ok()?;
    Some(xmax - xmin)
}

/// Plans a scale bar for `extent` drawn on an axis of `axis_px` pixels.
///
/// `render_scale` is 1.0 for the final render and the preview-to-final pixel
/// ratio for a preview; `dpi` is the output resolution of the final render.
pub fn plan(
    extent: Extent,
    crs: Crs,
    axis_px: PixelSize,
    style: &ScaleBarStyle,
    render_scale: f64,
    dpi: f64,
) -> Option<ScaleBarPlan> {
    if !style.show() {
        return None;
    }
    if axis_px.is_empty() || !(render_scale > 0.0) || !(dpi > 0.0) {
        debug!(render_scale, dpi; "Skipping scale bar for empty render target");
        return None;
    }

    let width_m = map_width_m(extent, crs).filter(|width| width.is_finite() && *width > 0.0)?;

    let reference = axis_px.scale(1.0 / render_scale);
    let (ref_w, ref_h) = (reference.width(), reference.height());

    let target_px = (style.length_fraction() * ref_w)
        .min(style.max_length_px())
        .max(style.min_length_px());
    let target_m = target_px / ref_w * width_m;

    let mut length_m = nice_number(target_m);
    if length_m <= 0.0 {
        return None;
    }

    let pad_x = style.padding_px() / ref_w;
    let pad_y = style.padding_px() / ref_h;
    if 2.0 * pad_x >= 1.0 || 2.0 * pad_y >= 1.0 {
        debug!(pad_x, pad_y; "Scale bar padding leaves no room");
        return None;
    }

    let mut bar_fraction = length_m / width_m;
    let mut steps = 0;
    while bar_fraction + 2.0 * pad_x > 1.0 {
        if steps == MAX_FIT_STEPS {
            return None;
        }
        length_m = step_down(length_m);
        bar_fraction = length_m / width_m;
        steps += 1;
    }

    let initial = style.position().anchor();
    let mut x0 = initial.x();
    if x0 + bar_fraction > 1.0 - pad_x {
        x0 = 1.0 - bar_fraction - pad_x;
    }
    if x0 < pad_x {
        x0 = pad_x;
    }
    let y0 = initial.y().clamp(pad_y, 1.0 - pad_y);

    let plan = ScaleBarPlan {
        length_m,
        label: format_length(length_m),
        anchor: AxisPoint::new(x0, y0),
        bar_fraction,
        tick_height: style.tick_fraction() * bar_fraction,
        line_width_pt: pixel_to_pt(style.linewidth_px(), dpi),
        font_size_pt: pixel_to_pt(style.font_px(), dpi),
        color: style.color(),
    };

    debug!(label = plan.label.as_str(), bar_fraction, fit_steps = steps; "Planned scale bar");
    trace!(plan:?; "Scale bar plan");
    Some(plan)
}
