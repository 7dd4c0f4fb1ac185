//! Layer merging.
//!
//! [`LayerMerger`] reads the selected layers of a container, reprojects them
//! into the composition CRS, applies the hide and highlight filters and
//! concatenates the results in layer order. Every merged record is tagged with
//! its originating layer and carries a definite highlight flag.
//!
//! Reprojected layer data can be memoized in an LRU cache keyed by
//! `(source id, layers, CRS)`. Filters are applied after the cache, so
//! changing filters never invalidates it.

use std::{
    collections::BTreeSet,
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError},
};

use indexmap::IndexSet;
use log::{debug, info, trace};
use lru::LruCache;
use rayon::prelude::*;
use thiserror::Error;

use carta_core::feature::{Feature, FeatureCollection};

use crate::{
    crs::Crs,
    filter::{HideFilter, HighlightFilter},
    identity::{IdentityFieldResolver, NameFieldResolver, identity_value},
    source::{GeoSource, LayerData, SourceError},
};

/// Default number of cached merge inputs.
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum MergeError {
    /// The container or one of its layers could not be read.
    #[error(transparent)]
    DataSource(#[from] SourceError),

    /// The merge produced no records and at least one was required.
    #[error("no features left in `{source_id}` after merging")]
    EmptyResult { source_id: String },
}

type CacheKey = (String, Vec<String>, Crs);

/// Loads, filters and concatenates layers of a geodata container.
pub struct LayerMerger {
    resolver: Arc<dyn IdentityFieldResolver>,
    parallel: bool,
    require_non_empty: bool,
    cache: Option<Mutex<LruCache<CacheKey, Arc<Vec<LayerData>>>>>,
}

impl Default for LayerMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LayerMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerMerger")
            .field("parallel", &self.parallel)
            .field("require_non_empty", &self.require_non_empty)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl LayerMerger {
    /// A merger using the `NAME_<n>` identity convention, sequential reads,
    /// no cache, and an [`MergeError::EmptyResult`] on empty output.
    pub fn new() -> Self {
        Self {
            resolver: Arc::new(NameFieldResolver),
            parallel: false,
            require_non_empty: true,
            cache: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn IdentityFieldResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Reads the layers of one merge on the rayon pool.
    pub fn with_parallel_reads(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Whether an empty merge is an error. Enabled by default.
    pub fn with_require_non_empty(mut self, require: bool) -> Self {
        self.require_non_empty = require;
        self
    }

    /// Memoizes reprojected layer data. A zero capacity disables the cache.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = NonZeroUsize::new(capacity).map(|capacity| Mutex::new(LruCache::new(capacity)));
        self
    }

    pub fn resolver(&self) -> &dyn IdentityFieldResolver {
        self.resolver.as_ref()
    }

    /// Drops all cached layer data.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    /// Merges `layers` of `source` into one collection in `crs`.
    ///
    /// An empty `layers` slice reads the container as a single unnamed layer.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::DataSource`] if the container or a named layer
    /// cannot be read or reprojected, and [`MergeError::EmptyResult`] if
    /// nothing is left and a non-empty result is required.
    pub fn merge(
        &self,
        source: &dyn GeoSource,
        layers: &[String],
        hide: &HideFilter,
        highlight: &HighlightFilter,
        crs: Crs,
    ) -> Result<FeatureCollection, MergeError> {
        info!(source = source.id(), layers:? = layers, crs = crs.to_string(); "Merging layers");

        let datasets = self.load(source, layers, crs)?;
        let names = layer_names(layers);

        let mut merged = FeatureCollection::new();
        for (name, data) in names.iter().zip(datasets.iter()) {
            let before = merged.len();
            self.filter_into(&mut merged, *name, data, hide, highlight);
            debug!(
                layer = name.unwrap_or("<unnamed>"),
                read = data.len(),
                kept = merged.len() - before;
                "Merged layer"
            );
        }

        if merged.is_empty() && self.require_non_empty {
            return Err(MergeError::EmptyResult {
                source_id: source.id().to_string(),
            });
        }

        trace!(features = merged.len(); "Merge complete");
        Ok(merged)
    }

    fn filter_into(
        &self,
        merged: &mut FeatureCollection,
        layer: Option<&str>,
        data: &LayerData,
        hide: &HideFilter,
        highlight: &HighlightFilter,
    ) {
        let fields = schema(data);
        let field = self.resolver.resolve(layer, &fields);

        for feature in data.features() {
            let value = identity_value(feature, field.as_deref());
            if hide.hides(layer, &value) {
                continue;
            }

            let mut feature = feature.clone();
            feature.set_layer(layer.map(str::to_string));
            feature.set_highlight(highlight.marks(layer, &value));
            merged.push(feature);
        }
    }

    /// Reprojected layer data for `layers`, from the cache when possible.
    fn load(
        &self,
        source: &dyn GeoSource,
        layers: &[String],
        crs: Crs,
    ) -> Result<Arc<Vec<LayerData>>, MergeError> {
        let Some(cache) = &self.cache else {
            return self.read_all(source, layers, crs).map(Arc::new);
        };

        let key = (source.id().to_string(), layers.to_vec(), crs);
        let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(datasets) = cache.get(&key) {
            debug!(source = source.id(); "Merge cache hit");
            return Ok(Arc::clone(datasets));
        }

        let datasets = Arc::new(self.read_all(source, layers, crs)?);
        cache.put(key, Arc::clone(&datasets));
        Ok(datasets)
    }

    fn read_all(
        &self,
        source: &dyn GeoSource,
        layers: &[String],
        crs: Crs,
    ) -> Result<Vec<LayerData>, MergeError> {
        let names = layer_names(layers);
        let read = |layer: &Option<&str>| -> Result<LayerData, MergeError> {
            let data = source.read_layer(*layer)?;
            Ok(data.reproject(crs).map_err(SourceError::from)?)
        };

        if self.parallel && names.len() > 1 {
            names.par_iter().map(read).collect()
        } else {
            names.iter().map(read).collect()
        }
    }
}

fn layer_names(layers: &[String]) -> Vec<Option<&str>> {
    if layers.is_empty() {
        vec![None]
    } else {
        layers.iter().map(|layer| Some(layer.as_str())).collect()
    }
}

/// Union of attribute names of a layer, in first-seen order.
fn schema(data: &LayerData) -> Vec<&str> {
    data.features()
        .iter()
        .flat_map(|feature| feature.attributes().keys().map(String::as_str))
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted unique identity values of a layer, skipping empty ones.
///
/// # Errors
///
/// Returns [`SourceError`] if the layer cannot be read.
pub fn list_region_names(
    source: &dyn GeoSource,
    layer: Option<&str>,
    resolver: &dyn IdentityFieldResolver,
) -> Result<Vec<String>, SourceError> {
    let data = source.read_layer(layer)?;
    let fields = schema(&data);
    let Some(field) = resolver.resolve(layer, &fields) else {
        return Ok(Vec::new());
    };

    let names: BTreeSet<String> = data
        .features()
        .iter()
        .map(|feature: &Feature| identity_value(feature, Some(&field)))
        .filter(|name| !name.is_empty())
        .collect();
    Ok(names.into_iter().collect())
}
