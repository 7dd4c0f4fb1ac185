use indexmap::IndexMap;

use carta_core::feature::Feature;

use super::{GeoSource, LayerData, SourceError};
use crate::crs::Crs;

/// Layers held in memory.
///
/// Built either as a named multi-layer package with [`MemorySource::new`] and
/// [`MemorySource::with_layer`], or as a single unnamed layer with
/// [`MemorySource::single`].
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    id: String,
    layers: IndexMap<String, LayerData>,
    multi_layer: bool,
}

impl MemorySource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            layers: IndexMap::new(),
            multi_layer: true,
        }
    }

    /// A single-layer container; the layer is stored under the source id.
    pub fn single(id: impl Into<String>, crs: Crs, features: Vec<Feature>) -> Self {
        let id = id.into();
        let mut layers = IndexMap::new();
        layers.insert(id.clone(), LayerData::new(crs, features));
        Self {
            id,
            layers,
            multi_layer: false,
        }
    }

    pub fn with_layer(mut self, name: impl Into<String>, crs: Crs, features: Vec<Feature>) -> Self {
        self.layers.insert(name.into(), LayerData::new(crs, features));
        self
    }
}

impl GeoSource for MemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_multi_layer(&self) -> bool {
        self.multi_layer
    }

    fn list_layers(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.layers.keys().cloned().collect())
    }

    fn read_layer(&self, layer: Option<&str>) -> Result<LayerData, SourceError> {
        match layer {
            Some(name) => self
                .layers
                .get(name)
                .cloned()
                .ok_or_else(|| SourceError::LayerNotFound {
                    source_id: self.id.clone(),
                    layer: name.to_string(),
                }),
            None if self.layers.len() == 1 => {
                Ok(self.layers.values().next().cloned().unwrap_or_default())
            }
            None => Err(SourceError::LayerRequired {
                source_id: self.id.clone(),
            }),
        }
    }

    fn feature_count(&self, layer: &str) -> Result<usize, SourceError> {
        self.layers
            .get(layer)
            .map(LayerData::len)
            .ok_or_else(|| SourceError::LayerNotFound {
                source_id: self.id.clone(),
                layer: layer.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_layers_in_insertion_order() {
        let source = MemorySource::new("pkg")
            .with_layer("b", Crs::WebMercator, vec![Feature::new(None)])
            .with_layer("a", Crs::WebMercator, vec![]);

        assert!(source.is_multi_layer());
        assert_eq!(source.list_layers().unwrap(), ["b", "a"]);
        assert_eq!(source.feature_count("b").unwrap(), 1);
        assert!(source.feature_count("c").is_err());
        assert!(matches!(
            source.read_layer(None),
            Err(SourceError::LayerRequired { .. })
        ));
    }

    #[test]
    fn test_single_layer_reads_without_name() {
        let source = MemorySource::single("shape", Crs::Geographic, vec![Feature::new(None)]);
        assert!(!source.is_multi_layer());

        let data = source.read_layer(None).unwrap();
        assert_eq!(data.crs(), Crs::Geographic);
        assert_eq!(data.len(), 1);
    }
}
