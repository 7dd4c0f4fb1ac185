//! Carta - Composition of administrative-boundary maps.
//!
//! Merges a main territory with optional context territories and an overlay,
//! fits the viewport to the main territory and plans a scale bar that looks
//! the same in a reduced-size preview and in the final export.
//!
//! The pipeline stages are public modules so embedders can drive them one by
//! one; [`MapBuilder`] wires them together with an [`AppConfig`].
//!
//! [`AppConfig`]: config::AppConfig

pub mod compose;
pub mod config;
pub mod crs;
pub mod filter;
pub mod identity;
pub mod merge;
pub mod repair;
pub mod scalebar;
pub mod scene;
pub mod simplify;
pub mod source;
pub mod viewport;

mod error;
mod export;

pub use carta_core::{color, draw, feature, geometry};

pub use compose::{SceneComposer, Sources};
pub use error::CartaError;
pub use scene::{DrawPass, Scene};

use std::{path::Path, sync::Arc};

use log::{debug, info};

use config::AppConfig;
use export::Exporter;
use source::GeoSource;

/// Builder for composing and rendering maps.
///
/// Holds the configuration and the scene composer, including its merge cache,
/// so one builder should serve all redraws of a session.
///
/// # Examples
///
/// ```rust,no_run
/// use carta::{MapBuilder, config::AppConfig, source};
///
/// let builder = MapBuilder::new(AppConfig::default());
///
/// let main = source::open("gadm/DEU").expect("Failed to open source");
/// let sources = builder.sources(main).with_layers(["ADM_ADM_1"]);
///
/// let scene = builder.compose(&sources, false);
/// let svg = builder.render_svg(&scene).expect("Failed to render");
///
/// // Or use default config
/// let builder = MapBuilder::default();
/// ```
#[derive(Debug, Default)]
pub struct MapBuilder {
    config: AppConfig,
    composer: SceneComposer,
}

impl MapBuilder {
    /// Create a new map builder with the given configuration.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use carta::{MapBuilder, config::AppConfig};
    ///
    /// let config = AppConfig::default();
    /// let builder = MapBuilder::new(config);
    /// ```
    pub fn new(config: AppConfig) -> Self {
        let composer = SceneComposer::new(config.pipeline());
        Self { config, composer }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Sources for `main` carrying the configured hide and highlight filters.
    pub fn sources(&self, main: Arc<dyn GeoSource>) -> Sources {
        Sources::new(main)
            .with_hide(self.config.hide().clone())
            .with_highlight(self.config.highlight().clone())
    }

    /// Compose a scene from `sources`.
    ///
    /// Never fails: unreadable sources contribute nothing and a main
    /// territory without geometry yields a placeholder scene.
    ///
    /// # Arguments
    ///
    /// * `sources` - Main, secondary and overlay sources with their filters
    /// * `preview` - Compose at the configured preview scale
    pub fn compose(&self, sources: &Sources, preview: bool) -> Scene {
        self.composer.compose(sources, &self.config.render(), preview)
    }

    /// Render a composed scene to an SVG string.
    ///
    /// # Errors
    ///
    /// Returns [`CartaError::Export`] if the scene cannot be drawn.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use carta::{MapBuilder, source};
    ///
    /// let builder = MapBuilder::default();
    /// let main = source::open("regions.geojson").expect("Failed to open source");
    /// let scene = builder.compose(&builder.sources(main), false);
    ///
    /// let svg = builder.render_svg(&scene).expect("Failed to render map");
    /// println!("{svg}");
    /// ```
    pub fn render_svg(&self, scene: &Scene) -> Result<String, CartaError> {
        let doc = export::svg::render_document(scene)?;
        debug!(passes = scene.passes().len(); "SVG rendered");
        Ok(doc.to_string())
    }

    /// Render a composed scene into an SVG file.
    ///
    /// # Errors
    ///
    /// Returns [`CartaError::Export`] if the scene cannot be drawn or the
    /// file cannot be written.
    pub fn export_svg(&self, scene: &Scene, path: impl AsRef<Path>) -> Result<(), CartaError> {
        let mut exporter = export::svg::SvgExporter::new(path.as_ref());
        exporter.export_scene(scene)?;
        info!(path = path.as_ref().display().to_string(); "Map exported");
        Ok(())
    }

    /// Region names of one layer, as used by hide and highlight filters.
    ///
    /// # Errors
    ///
    /// Returns [`CartaError::Source`] if the layer cannot be read.
    pub fn list_regions(
        &self,
        source: &dyn GeoSource,
        layer: Option<&str>,
    ) -> Result<Vec<String>, CartaError> {
        let names = merge::list_region_names(source, layer, self.composer.merger().resolver())?;
        info!(source = source.id(), regions = names.len(); "Listed regions");
        Ok(names)
    }
}
