//! Configuration for Carta maps.
//!
//! [`AppConfig`] mirrors the TOML configuration file; every section and field
//! is optional and falls back to its default. [`RenderConfig`] is the part of
//! it the scene composer reads on every call.
//!
//! ```toml
//! crs = "EPSG:3857"
//!
//! [map]
//! width = 800
//! height = 600
//! dpi = 300
//!
//! [scalebar]
//! show = true
//! position = "bottom-left"
//!
//! [highlight]
//! layer = "ADM_ADM_1"
//! names = ["Berlin"]
//! ```

use serde::Deserialize;
use thiserror::Error;

use carta_core::{color::Color, geometry::PixelSize};

use crate::{
    crs::Crs,
    filter::{HideFilter, HighlightFilter},
    merge::DEFAULT_CACHE_CAPACITY,
    scalebar::ScaleBarStyle,
    viewport::DEFAULT_PADDING,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

fn named(color: &str) -> Color {
    Color::new(color).unwrap_or_default()
}

/// Application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    crs: Crs,
    map: MapConfig,
    background: BackgroundConfig,
    colors: ColorsConfig,
    lines: LinesConfig,
    scalebar: ScaleBarStyle,
    hide: HideFilter,
    highlight: HighlightFilter,
    pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn map(&self) -> &MapConfig {
        &self.map
    }

    pub fn scalebar(&self) -> &ScaleBarStyle {
        &self.scalebar
    }

    pub fn hide(&self) -> &HideFilter {
        &self.hide
    }

    pub fn highlight(&self) -> &HighlightFilter {
        &self.highlight
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    pub fn with_map(mut self, map: MapConfig) -> Self {
        self.map = map;
        self
    }

    pub fn with_scalebar(mut self, scalebar: ScaleBarStyle) -> Self {
        self.scalebar = scalebar;
        self
    }

    pub fn with_hide(mut self, hide: HideFilter) -> Self {
        self.hide = hide;
        self
    }

    pub fn with_highlight(mut self, highlight: HighlightFilter) -> Self {
        self.highlight = highlight;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// The render-facing subset of the configuration.
    pub fn render(&self) -> RenderConfig {
        RenderConfig {
            crs: self.crs,
            map: self.map.clone(),
            background: self.background.clone(),
            colors: self.colors.clone(),
            lines: self.lines.clone(),
            scalebar: self.scalebar.clone(),
        }
    }

    /// Checks value ranges serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Validation(message));

        if !(self.map.width > 0.0 && self.map.height > 0.0) {
            return invalid(format!(
                "map size must be positive, got {}x{}",
                self.map.width, self.map.height
            ));
        }
        if !(self.map.dpi > 0.0) {
            return invalid(format!("map dpi must be positive, got {}", self.map.dpi));
        }
        if !(self.map.padding_x >= 0.0 && self.map.padding_y >= 0.0) {
            return invalid("map padding must not be negative".to_string());
        }
        let scale = self.pipeline.preview_scale;
        if !(scale > 0.0 && scale <= 1.0) {
            return invalid(format!("preview scale must be in (0, 1], got {scale}"));
        }
        if self.scalebar.min_length_px() > self.scalebar.max_length_px() {
            return invalid(format!(
                "scalebar min_length_px ({}) exceeds max_length_px ({})",
                self.scalebar.min_length_px(),
                self.scalebar.max_length_px()
            ));
        }
        Ok(())
    }
}

/// What the scene composer needs to draw one map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderConfig {
    crs: Crs,
    map: MapConfig,
    background: BackgroundConfig,
    colors: ColorsConfig,
    lines: LinesConfig,
    scalebar: ScaleBarStyle,
}

impl RenderConfig {
    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn map(&self) -> &MapConfig {
        &self.map
    }

    pub fn background(&self) -> &BackgroundConfig {
        &self.background
    }

    pub fn colors(&self) -> &ColorsConfig {
        &self.colors
    }

    pub fn lines(&self) -> &LinesConfig {
        &self.lines
    }

    pub fn scalebar(&self) -> &ScaleBarStyle {
        &self.scalebar
    }
}

/// Output size, resolution and viewport padding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    width: f64,
    height: f64,
    dpi: f64,
    padding_x: f64,
    padding_y: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            dpi: 300.0,
            padding_x: DEFAULT_PADDING,
            padding_y: DEFAULT_PADDING,
        }
    }
}

impl MapConfig {
    pub fn new(width: f64, height: f64, dpi: f64) -> Self {
        Self {
            width,
            height,
            dpi,
            ..Self::default()
        }
    }

    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    pub fn padding_x(&self) -> f64 {
        self.padding_x
    }

    pub fn padding_y(&self) -> f64 {
        self.padding_y
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    color: Color,
    transparent: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            color: named("#ffffff"),
            transparent: false,
        }
    }
}

impl BackgroundConfig {
    /// Background fill, `None` when transparent.
    pub fn fill(&self) -> Option<Color> {
        (!self.transparent).then_some(self.color)
    }
}

/// Fill and outline colors per role.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    main: Color,
    secondary: Color,
    border: Color,
    highlight: Color,
    highlight_border: Color,
    overlay_fill: Color,
    overlay_border: Color,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            main: named("white"),
            secondary: named("lightgray"),
            border: named("gray"),
            highlight: named("red"),
            highlight_border: named("darkred"),
            overlay_fill: named("black").with_alpha(0.0),
            overlay_border: named("black"),
        }
    }
}

impl ColorsConfig {
    pub fn main(&self) -> Color {
        self.main
    }

    pub fn secondary(&self) -> Color {
        self.secondary
    }

    pub fn border(&self) -> Color {
        self.border
    }

    pub fn highlight(&self) -> Color {
        self.highlight
    }

    pub fn highlight_border(&self) -> Color {
        self.highlight_border
    }

    pub fn overlay_fill(&self) -> Color {
        self.overlay_fill
    }

    pub fn overlay_border(&self) -> Color {
        self.overlay_border
    }
}

/// Outline widths per role, in final-render pixels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LinesConfig {
    border_px: f64,
    highlight_px: f64,
    overlay_px: f64,
}

impl Default for LinesConfig {
    fn default() -> Self {
        Self {
            border_px: 1.0,
            highlight_px: 1.0,
            overlay_px: 1.0,
        }
    }
}

impl LinesConfig {
    pub fn border_px(&self) -> f64 {
        self.border_px
    }

    pub fn highlight_px(&self) -> f64 {
        self.highlight_px
    }

    pub fn overlay_px(&self) -> f64 {
        self.overlay_px
    }
}

/// Pipeline tuning: preview size, parallelism and caching.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    preview_scale: f64,
    parallel_reads: bool,
    cache_capacity: usize,
    simplify_preview: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preview_scale: 0.5,
            parallel_reads: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            simplify_preview: true,
        }
    }
}

impl PipelineConfig {
    pub fn preview_scale(&self) -> f64 {
        self.preview_scale
    }

    pub fn parallel_reads(&self) -> bool {
        self.parallel_reads
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    pub fn simplify_preview(&self) -> bool {
        self.simplify_preview
    }

    pub fn with_preview_scale(mut self, preview_scale: f64) -> Self {
        self.preview_scale = preview_scale;
        self
    }

    pub fn with_simplify_preview(mut self, simplify: bool) -> Self {
        self.simplify_preview = simplify;
        self
    }
}
