//! Scene composition.
//!
//! [`SceneComposer`] runs the full pipeline for one map: merge the main,
//! secondary and overlay sources, drop or repair broken geometry, fit the
//! viewport to the main territory, plan the scale bar and emit the draw passes
//! in z-order.
//!
//! Composition never fails. A source that cannot be read contributes nothing;
//! a main territory without geometry yields a placeholder scene.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError},
};

use geo::HasDimensions;
use log::{debug, error, info, trace, warn};
use lru::LruCache;
use rayon::prelude::*;

use carta_core::{
    draw::{RenderLayer, StrokeDefinition},
    feature::{Feature, FeatureCollection, Role, bounding_rect_of},
};

use crate::{
    config::{PipelineConfig, RenderConfig},
    filter::{HideFilter, HighlightFilter},
    merge::{LayerMerger, MergeError},
    repair::{needs_repair, try_repair},
    scalebar::{self, pixel_to_pt},
    scene::{DrawPass, Scene},
    simplify::simplify_for_preview,
    source::{GeoSource, SourceError, simplest_layer},
    viewport,
};

/// The geodata of one map and the filters applied to it.
#[derive(Debug, Clone)]
pub struct Sources {
    main: Arc<dyn GeoSource>,
    layers: Vec<String>,
    secondary: Vec<Arc<dyn GeoSource>>,
    overlay: Option<Arc<dyn GeoSource>>,
    hide: HideFilter,
    highlight: HighlightFilter,
}

impl Sources {
    /// Sources with only a main territory, read as a whole.
    pub fn new(main: Arc<dyn GeoSource>) -> Self {
        Self {
            main,
            layers: Vec::new(),
            secondary: Vec::new(),
            overlay: None,
            hide: HideFilter::default(),
            highlight: HighlightFilter::default(),
        }
    }

    /// Selects the layers of the main source to merge, in draw order.
    pub fn with_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layers = layers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_secondary(mut self, source: Arc<dyn GeoSource>) -> Self {
        self.secondary.push(source);
        self
    }

    pub fn with_overlay(mut self, source: Arc<dyn GeoSource>) -> Self {
        self.overlay = Some(source);
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

    pub fn main(&self) -> &dyn GeoSource {
        self.main.as_ref()
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn secondary(&self) -> &[Arc<dyn GeoSource>] {
        &self.secondary
    }

    pub fn overlay(&self) -> Option<&dyn GeoSource> {
        self.overlay.as_deref()
    }

    pub fn hide(&self) -> &HideFilter {
        &self.hide
    }

    pub fn highlight(&self) -> &HighlightFilter {
        &self.highlight
    }
}

/// Composes [`Scene`]s from [`Sources`].
///
/// The composer owns the merge cache and remembers the layer chosen for each
/// secondary package, so reuse one instance across redraws.
pub struct SceneComposer {
    merger: LayerMerger,
    preview_scale: f64,
    simplify_preview: bool,
    parallel: bool,
    layer_choices: Option<Mutex<LruCache<String, Option<String>>>>,
}

impl std::fmt::Debug for SceneComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneComposer")
            .field("merger", &self.merger)
            .field("preview_scale", &self.preview_scale)
            .field("simplify_preview", &self.simplify_preview)
            .field("parallel", &self.parallel)
            .finish()
    }
}

impl Default for SceneComposer {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl SceneComposer {
    pub fn new(pipeline: &PipelineConfig) -> Self {
        let merger = LayerMerger::new()
            .with_parallel_reads(pipeline.parallel_reads())
            .with_cache_capacity(pipeline.cache_capacity());
        Self {
            merger,
            preview_scale: pipeline.preview_scale(),
            simplify_preview: pipeline.simplify_preview(),
            parallel: pipeline.parallel_reads(),
            layer_choices: NonZeroUsize::new(pipeline.cache_capacity())
                .map(|capacity| Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn merger(&self) -> &LayerMerger {
        &self.merger
    }

    /// Drops cached layer data and remembered secondary layers.
    pub fn clear_cache(&self) {
        self.merger.clear_cache();
        if let Some(choices) = &self.layer_choices {
            choices.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    /// Composes one map.
    ///
    /// `preview` renders at the configured preview scale; the viewport and
    /// scale bar come out identical to the final render, only the pixel
    /// dimensions shrink.
    pub fn compose(&self, sources: &Sources, config: &RenderConfig, preview: bool) -> Scene {
        let map = config.map();
        let render_scale = if preview { self.preview_scale } else { 1.0 };
        let background = config.background().fill();
        info!(
            main = sources.main().id(),
            secondary = sources.secondary().len(),
            overlay = sources.overlay().is_some(),
            preview;
            "Composing map"
        );

        let mut collection = self.merge_main(sources, config);
        collection.append(self.merge_secondary(sources, config));
        if let Some(overlay) = sources.overlay() {
            collection.append(self.merge_overlay(overlay, config));
        }

        let (mut main, mut secondary, mut overlay) = partition(sanitize(collection));
        if main.is_empty() {
            info!("Main territory has no geometry, composing placeholder");
            return Scene::placeholder(map.size(), map.dpi(), render_scale, background);
        }

        let Some(bounds) = bounding_rect_of(&main) else {
            warn!("Main territory has no bounds, composing placeholder");
            return Scene::placeholder(map.size(), map.dpi(), render_scale, background);
        };
        let extent = match viewport::fit(
            bounds,
            map.aspect_ratio(),
            map.padding_x(),
            map.padding_y(),
        ) {
            Ok(extent) => extent,
            Err(err) => {
                error!(err:err; "Failed to fit viewport");
                return Scene::placeholder(map.size(), map.dpi(), render_scale, background);
            }
        };

        let axis_px = map.size().scale(render_scale);
        let plan = scalebar::plan(
            extent,
            config.crs(),
            axis_px,
            config.scalebar(),
            render_scale,
            map.dpi(),
        );

        if preview && self.simplify_preview {
            for features in [&mut secondary, &mut main, &mut overlay] {
                simplify_for_preview(features, extent, axis_px.width());
            }
        }

        let mut scene = Scene::new(map.size(), map.dpi(), render_scale, background);
        scene.set_axis_limits(extent);
        scene.set_scale_bar(plan);
        self.push_passes(&mut scene, sources, config, main, secondary, overlay);

        debug!(
            passes = scene.passes().len(),
            extent:? = extent.to_array(),
            scale_bar = scene.scale_bar().is_some();
            "Composed map"
        );
        scene
    }

    fn merge_main(&self, sources: &Sources, config: &RenderConfig) -> FeatureCollection {
        let main = sources.main();
        match self.merger.merge(
            main,
            sources.layers(),
            sources.hide(),
            sources.highlight(),
            config.crs(),
        ) {
            Ok(collection) => collection.with_role(Role::Main),
            Err(MergeError::EmptyResult { source_id }) => {
                info!(source = source_id.as_str(); "Main source contributed no features");
                FeatureCollection::new()
            }
            Err(err) => {
                error!(source = main.id(), err:err; "Failed to read main source");
                FeatureCollection::new()
            }
        }
    }

    fn merge_secondary(&self, sources: &Sources, config: &RenderConfig) -> FeatureCollection {
        let merge_one = |source: &Arc<dyn GeoSource>| -> FeatureCollection {
            let layers = match self.secondary_layers(source.as_ref(), sources.layers()) {
                Ok(layers) => layers,
                Err(err) => {
                    warn!(source = source.id(), err:err; "Skipping secondary source");
                    return FeatureCollection::new();
                }
            };
            match self.merger.merge(
                source.as_ref(),
                &layers,
                sources.hide(),
                sources.highlight(),
                config.crs(),
            ) {
                Ok(collection) => collection.with_role(Role::Secondary),
                Err(MergeError::EmptyResult { source_id }) => {
                    debug!(source = source_id.as_str(); "Secondary source contributed no features");
                    FeatureCollection::new()
                }
                Err(err) => {
                    warn!(source = source.id(), err:err; "Skipping secondary source");
                    FeatureCollection::new()
                }
            }
        };

        let merged: Vec<FeatureCollection> = if self.parallel && sources.secondary().len() > 1 {
            sources.secondary().par_iter().map(merge_one).collect()
        } else {
            sources.secondary().iter().map(merge_one).collect()
        };

        merged.into_iter().fold(FeatureCollection::new(), |mut acc, collection| {
            acc.append(collection);
            acc
        })
    }

    fn merge_overlay(&self, overlay: &dyn GeoSource, config: &RenderConfig) -> FeatureCollection {
        let layers = if overlay.is_multi_layer() {
            match overlay.list_layers() {
                Ok(layers) => layers,
                Err(err) => {
                    warn!(source = overlay.id(), err:err; "Skipping overlay");
                    return FeatureCollection::new();
                }
            }
        } else {
            Vec::new()
        };

        // Overlays are shown in full.
        match self.merger.merge(
            overlay,
            &layers,
            &HideFilter::default(),
            &HighlightFilter::default(),
            config.crs(),
        ) {
            Ok(collection) => collection.with_role(Role::Overlay),
            Err(MergeError::EmptyResult { source_id }) => {
                debug!(source = source_id.as_str(); "Overlay contributed no features");
                FeatureCollection::new()
            }
            Err(err) => {
                warn!(source = overlay.id(), err:err; "Skipping overlay");
                FeatureCollection::new()
            }
        }
    }

    /// Layers to read from a secondary source.
    ///
    /// Single-layer sources are read whole. Packages use their simplest layer, or
    /// the first layer selected for the main source if none resolves.
    fn secondary_layers(
        &self,
        source: &dyn GeoSource,
        main_layers: &[String],
    ) -> Result<Vec<String>, SourceError> {
        if !source.is_multi_layer() {
            return Ok(Vec::new());
        }

        let remembered = self.layer_choices.as_ref().and_then(|choices| {
            choices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(source.id())
                .cloned()
        });
        let simplest = match remembered {
            Some(layer) => layer,
            None => {
                let layer = simplest_layer(source)?;
                if let Some(choices) = &self.layer_choices {
                    choices
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .put(source.id().to_string(), layer.clone());
                }
                layer
            }
        };

        let layer = simplest.or_else(|| main_layers.first().cloned());
        debug!(source = source.id(), layer:?; "Secondary layer");
        Ok(layer.into_iter().collect())
    }

    fn push_passes(
        &self,
        scene: &mut Scene,
        sources: &Sources,
        config: &RenderConfig,
        main: Vec<Feature>,
        secondary: Vec<Feature>,
        overlay: Vec<Feature>,
    ) {
        let colors = config.colors();
        let lines = config.lines();
        let dpi = config.map().dpi();
        let pen = |color, px| StrokeDefinition::new(color, pixel_to_pt(px, dpi));

        let highlighted: Vec<Feature> = if sources.highlight().is_active() {
            main.iter().filter(|feature| feature.is_highlighted()).cloned().collect()
        } else {
            Vec::new()
        };
        trace!(highlighted = highlighted.len(); "Highlight pass");

        scene.push_pass(DrawPass::new(
            RenderLayer::Secondary,
            secondary,
            colors.secondary(),
            pen(colors.border(), lines.border_px()),
        ));
        scene.push_pass(DrawPass::new(
            RenderLayer::Main,
            main,
            colors.main(),
            pen(colors.border(), lines.border_px()),
        ));
        scene.push_pass(DrawPass::new(
            RenderLayer::Highlight,
            highlighted,
            colors.highlight(),
            pen(colors.highlight_border(), lines.highlight_px()),
        ));
        scene.push_pass(DrawPass::new(
            RenderLayer::Overlay,
            overlay,
            colors.overlay_fill(),
            pen(colors.overlay_border(), lines.overlay_px()),
        ));
    }
}

/// Drops null and empty geometries and repairs invalid ones.
fn sanitize(collection: FeatureCollection) -> Vec<Feature> {
    let mut kept = Vec::with_capacity(collection.len());
    let mut dropped = 0usize;

    for mut feature in collection {
        let Some(geometry) = feature.take_geometry() else {
            dropped += 1;
            continue;
        };
        if geometry.is_empty() {
            dropped += 1;
            continue;
        }

        let geometry = if needs_repair(&geometry) {
            match try_repair(geometry) {
                Ok(repaired) => {
                    debug!(layer = feature.layer().unwrap_or("<unnamed>"); "Repaired geometry");
                    repaired
                }
                Err(err) => {
                    warn!(
                        layer = feature.layer().unwrap_or("<unnamed>"),
                        role = feature.role().name(),
                        err:err;
                        "Dropping geometry that could not be repaired"
                    );
                    dropped += 1;
                    continue;
                }
            }
        } else {
            geometry
        };

        feature.set_geometry(Some(geometry));
        kept.push(feature);
    }

    if dropped > 0 {
        debug!(dropped, kept = kept.len(); "Dropped features without usable geometry");
    }
    kept
}

/// Splits features into main, secondary and overlay, keeping order.
fn partition(features: Vec<Feature>) -> (Vec<Feature>, Vec<Feature>, Vec<Feature>) {
    let mut main = Vec::new();
    let mut secondary = Vec::new();
    let mut overlay = Vec::new();
    for feature in features {
        match feature.role() {
            Role::Main => main.push(feature),
            Role::Secondary => secondary.push(feature),
            Role::Overlay => overlay.push(feature),
        }
    }
    (main, secondary, overlay)
}
