//! ESRI Shapefile backed sources.
//!
//! A shapefile is a single unnamed layer: geometries from the `.shp`, attributes
//! from the `.dbf` sidecar. The reference system comes from the `.prj` sidecar
//! when it carries an EPSG authority, and defaults to WGS 84 otherwise.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, trace, warn};
use shapefile::{
    Shape,
    dbase::{self, FieldValue},
};

use carta_core::feature::{AttributeValue, Attributes, Feature};

use super::{GeoSource, LayerData, SourceError};
use crate::crs::Crs;

/// A single-layer shapefile.
#[derive(Debug, Clone)]
pub struct Shapefile {
    path: PathBuf,
    id: String,
}

impl Shapefile {
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

    fn parse_error(&self, message: impl ToString) -> SourceError {
        SourceError::Parse {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }

    /// Field names of the `.dbf` table in schema order.
    fn field_names(&self) -> Result<Vec<String>, SourceError> {
        let table = dbase::Reader::from_path(self.path.with_extension("dbf"))
            .map_err(|err| self.parse_error(err))?;
        Ok(table
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect())
    }

    fn read_features(&self) -> Result<Vec<Feature>, SourceError> {
        let fields = self.field_names()?;
        let mut reader =
            shapefile::Reader::from_path(&self.path).map_err(|err| self.parse_error(err))?;

        let mut features = Vec::new();
        for shape_record in reader.iter_shapes_and_records() {
            let (shape, record) = shape_record.map_err(|err| self.parse_error(err))?;

            let mut values: Vec<(String, FieldValue)> = record.into_iter().collect();
            values.sort_by_key(|(name, _)| fields.iter().position(|field| field == name));
            let attributes: Attributes = values
                .into_iter()
                .map(|(name, value)| (name, convert_value(value)))
                .collect();

            features.push(Feature::with_attributes(convert_shape(shape), attributes));
        }
        Ok(features)
    }

    fn read_crs(&self) -> Result<Crs, SourceError> {
        let prj = self.path.with_extension("prj");
        match fs::read_to_string(&prj) {
            Ok(wkt) => projection_crs(&wkt).ok_or_else(|| {
                self.parse_error(format!("unrecognised projection in `{}`", prj.display()))
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = self.id.as_str(); "No projection file, assuming WGS 84");
                Ok(Crs::Geographic)
            }
            Err(source) => Err(SourceError::Open { path: prj, source }),
        }
    }
}

impl GeoSource for Shapefile {
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
        if let Some(layer) = layer {
            if self.stem().as_deref() != Some(layer) {
                return Err(SourceError::LayerNotFound {
                    source_id: self.id.clone(),
                    layer: layer.to_string(),
                });
            }
        }

        let crs = self.read_crs()?;
        let features = self.read_features()?;
        trace!(path = self.id.as_str(), features = features.len(), crs = crs.to_string(); "Read shapefile");
        Ok(LayerData::new(crs, features))
    }
}

/// Reference system of a `.prj` WKT string.
///
/// The innermost-last `AUTHORITY["EPSG", n]` names the whole system. Without
/// one, plain geographic WGS 84 and ESRI's Web Mercator names are recognised.
fn projection_crs(wkt: &str) -> Option<Crs> {
    const AUTHORITY: &str = "AUTHORITY[\"EPSG\",";

    let upper = wkt.to_ascii_uppercase();
    if let Some(start) = upper.rfind(AUTHORITY) {
        let code: String = upper[start + AUTHORITY.len()..]
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        return code.parse().ok().map(Crs::from_epsg);
    }

    let geographic = upper.starts_with("GEOGCS")
        && (upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84"));
    if geographic {
        return Some(Crs::Geographic);
    }
    if upper.contains("WEB_MERCATOR") || upper.contains("PSEUDO-MERCATOR") {
        return Some(Crs::WebMercator);
    }
    None
}

fn convert_shape(shape: Shape) -> Option<geo::Geometry<f64>> {
    if matches!(shape, Shape::NullShape) {
        return None;
    }
    match geo::Geometry::<f64>::try_from(shape) {
        Ok(geometry) => Some(geometry),
        Err(err) => {
            warn!(err:?; "Skipping unsupported shape");
            None
        }
    }
}

fn convert_value(value: FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(text)) | FieldValue::Memo(text) => {
            AttributeValue::Text(text.trim_end().to_string())
        }
        FieldValue::Numeric(Some(value)) | FieldValue::Double(value) | FieldValue::Currency(value) => {
            AttributeValue::Number(value)
        }
        FieldValue::Float(Some(value)) => AttributeValue::Number(f64::from(value)),
        FieldValue::Integer(value) => AttributeValue::Number(f64::from(value)),
        FieldValue::Logical(Some(value)) => AttributeValue::Bool(value),
        _ => AttributeValue::Null,
    }
}
