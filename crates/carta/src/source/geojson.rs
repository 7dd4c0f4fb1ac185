//! GeoJSON backed sources.

use std::{
    fs,
    path::{Path, PathBuf},
};

use geojson::{GeoJson, JsonObject, JsonValue};
use log::{debug, trace};

use carta_core::feature::{AttributeValue, Attributes, Feature};

use super::{GeoSource, LayerData, SourceError};
use crate::crs::Crs;

const EXTENSIONS: [&str; 2] = ["geojson", "json"];

/// A single GeoJSON document, read as one unnamed layer.
#[derive(Debug, Clone)]
pub struct GeoJsonFile {
    path: PathBuf,
    id: String,
}

impl GeoJsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path.display().to_string();
        Self { path, id }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stem(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    }
}

impl GeoSource for GeoJsonFile {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_multi_layer(&self) -> bool {
        false
    }

    fn list_layers(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.stem().into_iter().collect())
    }

    fn read_layer(&self, layer: Option<&str>) -> Result<LayerData, SourceError> {
        match layer {
            Some(layer) if self.stem().as_deref() != Some(layer) => {
                Err(SourceError::LayerNotFound {
                    source_id: self.id.clone(),
                    layer: layer.to_string(),
                })
            }
            _ => read_document(&self.path),
        }
    }
}

/// A directory of GeoJSON documents, one layer per file named by its stem.
#[derive(Debug, Clone)]
pub struct GeoJsonDirectory {
    root: PathBuf,
    id: String,
}

impl GeoJsonDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let id = root.display().to_string();
        Self { root, id }
    }

    fn layer_path(&self, layer: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{layer}.{ext}")))
            .find(|path| path.is_file())
    }
}

impl GeoSource for GeoJsonDirectory {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_multi_layer(&self) -> bool {
        true
    }

    fn list_layers(&self) -> Result<Vec<String>, SourceError> {
        let entries = fs::read_dir(&self.root).map_err(|source| SourceError::Open {
            path: self.root.clone(),
            source,
        })?;

        let mut layers: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .filter_map(|path| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .collect();
        layers.sort();
        layers.dedup();

        debug!(source = self.id.as_str(), count = layers.len(); "Listed layers");
        Ok(layers)
    }

    fn read_layer(&self, layer: Option<&str>) -> Result<LayerData, SourceError> {
        let layer = match layer {
            Some(layer) => layer.to_string(),
            None => {
                let mut layers = self.list_layers()?;
                if layers.len() != 1 {
                    return Err(SourceError::LayerRequired {
                        source_id: self.id.clone(),
                    });
                }
                layers.remove(0)
            }
        };

        let path = self
            .layer_path(&layer)
            .ok_or_else(|| SourceError::LayerNotFound {
                source_id: self.id.clone(),
                layer: layer.clone(),
            })?;
        read_document(&path)
    }
}

/// Reads one GeoJSON document into layer data.
fn read_document(path: &Path) -> Result<LayerData, SourceError> {
    let text = fs::read_to_string(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |message: String| SourceError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let document: GeoJson = text.parse().map_err(|err: geojson::Error| parse_error(err.to_string()))?;

    let (crs, raw_features) = match document {
        GeoJson::FeatureCollection(collection) => {
            let crs = legacy_crs(collection.foreign_members.as_ref())?;
            (crs, collection.features)
        }
        GeoJson::Feature(feature) => (Crs::Geographic, vec![feature]),
        GeoJson::Geometry(geometry) => (
            Crs::Geographic,
            vec![geojson::Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            }],
        ),
    };

    let features = raw_features
        .into_iter()
        .map(|feature| convert_feature(feature).map_err(|err| parse_error(err.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    trace!(path = path.display().to_string(), features = features.len(), crs = crs.to_string(); "Read document");
    Ok(LayerData::new(crs, features))
}

/// The pre-RFC 7946 `crs` member, `{"type": "name", "properties": {"name": ...}}`.
fn legacy_crs(foreign_members: Option<&JsonObject>) -> Result<Crs, SourceError> {
    let name = foreign_members
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|properties| properties.get("name"))
        .and_then(JsonValue::as_str);

    match name {
        Some(name) => Ok(name.parse()?),
        None => Ok(Crs::Geographic),
    }
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature, geojson::Error> {
    let geometry = feature
        .geometry
        .map(geo::Geometry::<f64>::try_from)
        .transpose()?;

    let attributes: Attributes = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| (name, convert_value(value)))
        .collect();

    Ok(Feature::with_attributes(geometry, attributes))
}

fn convert_value(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(value) => AttributeValue::Bool(value),
        JsonValue::Number(number) => number
            .as_f64()
            .map_or(AttributeValue::Null, AttributeValue::Number),
        JsonValue::String(text) => AttributeValue::Text(text),
        other => AttributeValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use geo::Geometry;

    const REGIONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"NAME_1": "North", "POP": 12},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
            },
            {
                "type": "Feature",
                "properties": {"NAME_1": "South", "POP": null},
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn test_read_feature_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.geojson");
        fs::write(&path, REGIONS).unwrap();

        let source = GeoJsonFile::new(&path);
        let data = source.read_layer(None).unwrap();

        assert_eq!(data.crs(), Crs::Geographic);
        assert_eq!(data.len(), 2);

        let first = &data.features()[0];
        assert!(matches!(first.geometry(), Some(Geometry::Polygon(_))));
        assert_eq!(
            first.attribute("NAME_1").and_then(AttributeValue::as_str),
            Some("North")
        );
        assert_eq!(first.attribute("POP"), Some(&AttributeValue::Number(12.0)));

        let second = &data.features()[1];
        assert!(second.geometry().is_none());
        assert!(second.attribute("POP").unwrap().is_null());

        assert_eq!(source.list_layers().unwrap(), ["regions"]);
        assert!(source.read_layer(Some("regions")).is_ok());
        assert!(matches!(
            source.read_layer(Some("other")),
            Err(SourceError::LayerNotFound { .. })
        ));
    }

    #[test]
    fn test_legacy_crs_member() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projected.geojson");
        fs::write(
            &path,
            r#"{
                "type": "FeatureCollection",
                "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
                "features": []
            }"#,
        )
        .unwrap();

        let data = GeoJsonFile::new(&path).read_layer(None).unwrap();
        assert_eq!(data.crs(), Crs::WebMercator);
        assert!(data.is_empty());
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.geojson");
        fs::write(&path, "{ not json").unwrap();

        let err = GeoJsonFile::new(&path).read_layer(None).unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[test]
    fn test_directory_layers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ADM_ADM_1.geojson"), REGIONS).unwrap();
        fs::write(dir.path().join("ADM_ADM_0.json"), REGIONS).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = GeoJsonDirectory::new(dir.path());
        assert!(source.is_multi_layer());
        assert_eq!(source.list_layers().unwrap(), ["ADM_ADM_0", "ADM_ADM_1"]);
        assert_eq!(source.feature_count("ADM_ADM_0").unwrap(), 2);

        assert!(matches!(
            source.read_layer(Some("ADM_ADM_9")),
            Err(SourceError::LayerNotFound { .. })
        ));
        assert!(matches!(
            source.read_layer(None),
            Err(SourceError::LayerRequired { .. })
        ));
    }
}
