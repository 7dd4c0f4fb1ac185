//! Geodata source boundary.
//!
//! The composer only needs "give me geometries with attributes". A
//! [`GeoSource`] is a container of one or more layers; multi-layer packages
//! need a layer name to read from, single-layer files do not.
//!
//! Concrete containers:
//! - [`GeoJsonFile`] - one GeoJSON document, a single unnamed layer
//! - [`GeoJsonDirectory`] - a directory of GeoJSON documents, one layer per file
//! - [`GeoPackage`] - an OGC GeoPackage database, one layer per feature table
//! - [`Shapefile`] - an ESRI shapefile with its sidecars, a single layer
//! - [`MemorySource`] - layers held in memory

mod geojson;
mod gpkg;
mod memory;
mod shp;

pub use self::geojson::{GeoJsonDirectory, GeoJsonFile};
pub use gpkg::GeoPackage;
pub use memory::MemorySource;
pub use shp::Shapefile;

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, warn};
use thiserror::Error;

use carta_core::feature::Feature;

use crate::crs::{Crs, CrsError};

/// Failure to read a container or one of its layers.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open `{}`: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse `{}`: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("cannot read database `{}`: {source}", path.display())]
    Database {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("layer `{layer}` not found in `{source_id}`")]
    LayerNotFound { source_id: String, layer: String },

    #[error("`{source_id}` contains several layers, a layer name is required")]
    LayerRequired { source_id: String },

    #[error(transparent)]
    Crs(#[from] CrsError),
}

/// Features of one layer together with the reference system they are in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerData {
    crs: Crs,
    features: Vec<Feature>,
}

impl LayerData {
    pub fn new(crs: Crs, features: Vec<Feature>) -> Self {
        Self { crs, features }
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    /// Reprojects every geometry into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError`] if either system has no projection definition or
    /// a coordinate cannot be projected.
    pub fn reproject(mut self, target: Crs) -> Result<Self, CrsError> {
        if self.crs == target {
            return Ok(self);
        }

        let transformer = self.crs.transformer(target)?;
        for feature in &mut self.features {
            if let Some(geometry) = feature.geometry() {
                let reprojected = transformer.reproject(geometry)?;
                feature.set_geometry(Some(reprojected));
            }
        }
        self.crs = target;
        Ok(self)
    }
}

/// A container of geographic layers.
pub trait GeoSource: Send + Sync {
    /// Stable identifier of the container, used for cache keys and logging.
    fn id(&self) -> &str;

    /// `true` if reading requires a layer name.
    fn is_multi_layer(&self) -> bool;

    /// Names of the layers in the container, in container order.
    fn list_layers(&self) -> Result<Vec<String>, SourceError>;

    /// Reads one layer, or the whole container when `layer` is `None`.
    fn read_layer(&self, layer: Option<&str>) -> Result<LayerData, SourceError>;

    /// Number of features in a layer.
    fn feature_count(&self, layer: &str) -> Result<usize, SourceError> {
        self.read_layer(Some(layer)).map(|data| data.len())
    }
}

impl std::fmt::Debug for dyn GeoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoSource").field("id", &self.id()).finish()
    }
}

/// Opens a path as a geodata source.
///
/// Directories become multi-layer GeoJSON packages, `.gpkg` files GeoPackage
/// databases and `.shp` files shapefiles. Any other file is read as a
/// single-layer GeoJSON document.
///
/// # Errors
///
/// Returns [`SourceError::Open`] if the path does not exist.
pub fn open(path: impl AsRef<Path>) -> Result<Arc<dyn GeoSource>, SourceError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SourceError::Open {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
        });
    }

    if path.is_dir() {
        debug!(path = path.display().to_string(); "Opening layer directory");
        return Ok(Arc::new(GeoJsonDirectory::new(path)));
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("gpkg") => {
            debug!(path = path.display().to_string(); "Opening GeoPackage");
            Ok(Arc::new(GeoPackage::new(path)))
        }
        Some("shp") => {
            debug!(path = path.display().to_string(); "Opening shapefile");
            Ok(Arc::new(Shapefile::new(path)))
        }
        _ => {
            debug!(path = path.display().to_string(); "Opening single-layer file");
            Ok(Arc::new(GeoJsonFile::new(path)))
        }
    }
}

/// Layer name of the coarsest administrative level in GADM style packages.
const COARSEST_LAYER: &str = "ADM_ADM_0";

/// Picks the layer of a container that is cheapest to draw as context.
///
/// Prefers the coarsest administrative level, otherwise the layer with the
/// fewest features (the first one on ties). Layers that cannot be read are
/// skipped. Single-layer containers, empty packages and packages without a
/// readable layer yield `None`.
///
/// # Errors
///
/// Returns [`SourceError`] if the layers cannot be listed.
pub fn simplest_layer(source: &dyn GeoSource) -> Result<Option<String>, SourceError> {
    if !source.is_multi_layer() {
        return Ok(None);
    }

    let layers = source.list_layers()?;
    if let Some(layer) = layers
        .iter()
        .find(|layer| layer.eq_ignore_ascii_case(COARSEST_LAYER))
    {
        return Ok(Some(layer.clone()));
    }

    let mut simplest: Option<(usize, String)> = None;
    for layer in layers {
        let count = match source.feature_count(&layer) {
            Ok(count) => count,
            Err(err) => {
                warn!(source = source.id(), layer = layer.as_str(), err:err; "Skipping unreadable layer");
                continue;
            }
        };
        if simplest.as_ref().is_none_or(|(best, _)| count < *best) {
            simplest = Some((count, layer));
        }
    }

    debug!(source = source.id(), layer:? = simplest; "Resolved simplest layer");
    Ok(simplest.map(|(_, layer)| layer))
}

#[cfg(test)]
mod tests {
    use super::*;

    use geo::{Geometry, Point};

    #[test]
    fn test_open_missing_path() {
        let err = open("/definitely/not/here.geojson").unwrap_err();
        assert!(matches!(err, SourceError::Open { .. }));
        assert!(err.to_string().contains("not/here.geojson"));
    }

    #[test]
    fn test_open_picks_container_kind() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("single.geojson");
        std::fs::write(&file, r#"{"type":"FeatureCollection","features":[]}"#).unwrap();

        assert!(open(dir.path()).unwrap().is_multi_layer());
        assert!(!open(&file).unwrap().is_multi_layer());

        let package = dir.path().join("regions.GPKG");
        gpkg::fixture::write_package(&package, &[("ADM_ADM_1", "NAME_1", &["North"])]);
        let package = open(&package).unwrap();
        assert!(package.is_multi_layer());
        assert_eq!(package.list_layers().unwrap(), ["ADM_ADM_1"]);

        let shapes = dir.path().join("regions.shp");
        std::fs::write(&shapes, b"").unwrap();
        let shapes = open(&shapes).unwrap();
        assert!(!shapes.is_multi_layer());
        assert_eq!(shapes.list_layers().unwrap(), ["regions"]);
    }

    #[test]
    fn test_layer_data_reproject() {
        let data = LayerData::new(
            Crs::Geographic,
            vec![
                Feature::new(Some(Geometry::Point(Point::new(0.0, 0.0)))),
                Feature::new(None),
            ],
        );

        let reprojected = data.reproject(Crs::WebMercator).unwrap();
        assert_eq!(reprojected.crs(), Crs::WebMercator);
        assert_eq!(reprojected.len(), 2);
        assert!(reprojected.features()[1].geometry().is_none());
    }

    #[test]
    fn test_layer_data_reproject_national_system() {
        let data = LayerData::new(
            Crs::Geographic,
            vec![Feature::new(Some(Geometry::Point(Point::new(9.0, 0.0))))],
        );

        let reprojected = data.reproject(Crs::Projected(25832)).unwrap();
        assert_eq!(reprojected.crs(), Crs::Projected(25832));
        let Some(Geometry::Point(point)) = reprojected.features()[0].geometry() else {
            panic!("Expected a point");
        };
        assert!((point.x() - 500_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_layer_data_reproject_unknown_system() {
        let data = LayerData::new(
            Crs::Projected(1),
            vec![Feature::new(Some(Geometry::Point(Point::new(1.0, 1.0))))],
        );
        assert!(data.reproject(Crs::Geographic).is_err());
    }

    #[test]
    fn test_simplest_layer_prefers_coarsest_name() {
        let source = MemorySource::new("pkg")
            .with_layer("adm_adm_1", Crs::WebMercator, vec![Feature::new(None); 3])
            .with_layer("ADM_ADM_0", Crs::WebMercator, vec![Feature::new(None); 5]);
        assert_eq!(simplest_layer(&source).unwrap().as_deref(), Some("ADM_ADM_0"));
    }

    #[test]
    fn test_simplest_layer_fewest_features() {
        let source = MemorySource::new("pkg")
            .with_layer("districts", Crs::WebMercator, vec![Feature::new(None); 12])
            .with_layer("states", Crs::WebMercator, vec![Feature::new(None); 3])
            .with_layer("regions", Crs::WebMercator, vec![Feature::new(None); 3]);
        assert_eq!(simplest_layer(&source).unwrap().as_deref(), Some("states"));
    }

    /// A package whose `broken` layer fails to parse.
    struct PartlyBrokenPackage {
        inner: MemorySource,
    }

    impl GeoSource for PartlyBrokenPackage {
        fn id(&self) -> &str {
            self.inner.id()
        }

        fn is_multi_layer(&self) -> bool {
            true
        }

        fn list_layers(&self) -> Result<Vec<String>, SourceError> {
            let mut layers = vec!["broken".to_string()];
            layers.extend(self.inner.list_layers()?);
            Ok(layers)
        }

        fn read_layer(&self, layer: Option<&str>) -> Result<LayerData, SourceError> {
            if layer == Some("broken") {
                return Err(SourceError::Parse {
                    path: PathBuf::from("broken.geojson"),
                    message: "unexpected end of input".to_string(),
                });
            }
            self.inner.read_layer(layer)
        }
    }

    #[test]
    fn test_simplest_layer_skips_unreadable_layers() {
        let source = PartlyBrokenPackage {
            inner: MemorySource::new("pkg").with_layer(
                "ok",
                Crs::WebMercator,
                vec![Feature::new(None)],
            ),
        };
        assert_eq!(simplest_layer(&source).unwrap().as_deref(), Some("ok"));

        let unreadable = PartlyBrokenPackage {
            inner: MemorySource::new("pkg"),
        };
        assert_eq!(simplest_layer(&unreadable).unwrap(), None);
    }

    #[test]
    fn test_simplest_layer_single_layer_source() {
        let source = MemorySource::single("file", Crs::Geographic, vec![Feature::new(None)]);
        assert_eq!(simplest_layer(&source).unwrap(), None);
    }
}
