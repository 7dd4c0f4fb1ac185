//! GeoPackage backed sources.
//!
//! A GeoPackage is an SQLite database; every table registered in
//! `gpkg_contents` with `data_type = 'features'` is one layer. Geometries are
//! stored as GeoPackage binary blobs (a small header followed by WKB).

use std::path::{Path, PathBuf};

use geozero::{ToGeo, wkb::GpkgWkb};
use log::{debug, trace};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params, types::ValueRef};

use carta_core::feature::{AttributeValue, Attributes, Feature};

use super::{GeoSource, LayerData, SourceError};
use crate::crs::Crs;

/// A multi-layer GeoPackage file.
#[derive(Debug, Clone)]
pub struct GeoPackage {
    path: PathBuf,
    id: String,
}

impl GeoPackage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path.display().to_string();
        Self { path, id }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, SourceError> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| self.database_error(source))
    }

    fn database_error(&self, source: rusqlite::Error) -> SourceError {
        SourceError::Database {
            path: self.path.clone(),
            source,
        }
    }

    /// Resolves `layer`, or the only layer of the package when `None`.
    fn resolve_layer(&self, conn: &Connection, layer: Option<&str>) -> Result<String, SourceError> {
        let layers = feature_tables(conn).map_err(|err| self.database_error(err))?;
        match layer {
            Some(layer) if layers.iter().any(|name| name == layer) => Ok(layer.to_string()),
            Some(layer) => Err(SourceError::LayerNotFound {
                source_id: self.id.clone(),
                layer: layer.to_string(),
            }),
            None if layers.len() == 1 => Ok(layers.into_iter().next().unwrap_or_default()),
            None => Err(SourceError::LayerRequired {
                source_id: self.id.clone(),
            }),
        }
    }
}

impl GeoSource for GeoPackage {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_multi_layer(&self) -> bool {
        true
    }

    fn list_layers(&self) -> Result<Vec<String>, SourceError> {
        let conn = self.connect()?;
        let layers = feature_tables(&conn).map_err(|err| self.database_error(err))?;
        debug!(source = self.id.as_str(), count = layers.len(); "Listed layers");
        Ok(layers)
    }

    fn read_layer(&self, layer: Option<&str>) -> Result<LayerData, SourceError> {
        let conn = self.connect()?;
        let layer = self.resolve_layer(&conn, layer)?;

        let (geometry_column, srs_id): (String, i64) = conn
            .query_row(
                "SELECT column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
                params![layer],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|err| self.database_error(err))?;
        let crs = layer_crs(&conn, srs_id).map_err(|err| self.database_error(err))?;

        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {}", quote_identifier(&layer)))
            .map_err(|err| self.database_error(err))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([]).map_err(|err| self.database_error(err))?;
        let mut features = Vec::new();
        while let Some(row) = rows.next().map_err(|err| self.database_error(err))? {
            let mut geometry = None;
            let mut attributes = Attributes::new();
            for (index, column) in columns.iter().enumerate() {
                let value = row.get_ref(index).map_err(|err| self.database_error(err))?;
                if column.eq_ignore_ascii_case(&geometry_column) {
                    geometry = decode_geometry(value);
                } else {
                    attributes.insert(column.clone(), convert_value(value));
                }
            }
            features.push(Feature::with_attributes(geometry, attributes));
        }

        trace!(source = self.id.as_str(), layer = layer.as_str(), features = features.len(), crs = crs.to_string(); "Read layer");
        Ok(LayerData::new(crs, features))
    }

    fn feature_count(&self, layer: &str) -> Result<usize, SourceError> {
        let conn = self.connect()?;
        let layer = self.resolve_layer(&conn, Some(layer))?;
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_identifier(&layer)),
                [],
                |row| row.get(0),
            )
            .map_err(|err| self.database_error(err))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn feature_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM gpkg_contents WHERE data_type = 'features' ORDER BY table_name",
    )?;
    let layers = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(layers)
}

/// Reference system of a layer from `gpkg_spatial_ref_sys`. Undefined systems
/// (`srs_id` 0 and -1) are read as geographic.
fn layer_crs(conn: &Connection, srs_id: i64) -> rusqlite::Result<Crs> {
    let definition: Option<(String, i64)> = conn
        .query_row(
            "SELECT organization, organization_coordsys_id FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
            params![srs_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let code = match definition {
        Some((organization, code)) if organization.eq_ignore_ascii_case("EPSG") => code,
        _ => srs_id,
    };
    Ok(u32::try_from(code)
        .ok()
        .filter(|code| *code > 0)
        .map_or(Crs::Geographic, Crs::from_epsg))
}

/// Decodes a GeoPackage geometry blob. Null, empty and malformed blobs yield
/// no geometry.
fn decode_geometry(value: ValueRef<'_>) -> Option<geo::Geometry<f64>> {
    let ValueRef::Blob(blob) = value else {
        return None;
    };
    match GpkgWkb(blob.to_vec()).to_geo() {
        Ok(geometry) => Some(geometry),
        Err(err) => {
            debug!(err:err; "Skipping undecodable geometry");
            None
        }
    }
}

fn convert_value(value: ValueRef<'_>) -> AttributeValue {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => AttributeValue::Null,
        ValueRef::Integer(value) => AttributeValue::Number(value as f64),
        ValueRef::Real(value) => AttributeValue::Number(value),
        ValueRef::Text(text) => AttributeValue::Text(String::from_utf8_lossy(text).into_owned()),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Builds minimal GeoPackages for tests.

    use std::path::Path;

    use rusqlite::{Connection, params};

    /// GeoPackage blob of an axis-aligned square: header without envelope,
    /// then a little-endian WKB polygon.
    pub fn square_blob(srs_id: i32, x: f64, y: f64, size: f64) -> Vec<u8> {
        let mut blob = vec![b'G', b'P', 0, 0b0000_0001];
        blob.extend_from_slice(&srs_id.to_le_bytes());
        blob.push(1);
        blob.extend_from_slice(&3u32.to_le_bytes());
        blob.extend_from_slice(&1u32.to_le_bytes());
        blob.extend_from_slice(&5u32.to_le_bytes());
        for (px, py) in [
            (x, y),
            (x + size, y),
            (x + size, y + size),
            (x, y + size),
            (x, y),
        ] {
            blob.extend_from_slice(&px.to_le_bytes());
            blob.extend_from_slice(&py.to_le_bytes());
        }
        blob
    }

    /// Writes a package with one feature table per `(layer, field, names)`,
    /// each region a unit square in EPSG:4326.
    pub fn write_package(path: &Path, layers: &[(&str, &str, &[&str])]) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE gpkg_spatial_ref_sys (
                srs_name TEXT NOT NULL, srs_id INTEGER PRIMARY KEY,
                organization TEXT NOT NULL, organization_coordsys_id INTEGER NOT NULL,
                definition TEXT NOT NULL, description TEXT);
             INSERT INTO gpkg_spatial_ref_sys VALUES ('WGS 84', 4326, 'EPSG', 4326, 'undefined', NULL);
             CREATE TABLE gpkg_contents (
                table_name TEXT PRIMARY KEY, data_type TEXT NOT NULL, identifier TEXT,
                srs_id INTEGER);
             CREATE TABLE gpkg_geometry_columns (
                table_name TEXT NOT NULL, column_name TEXT NOT NULL,
                geometry_type_name TEXT NOT NULL, srs_id INTEGER NOT NULL,
                z TINYINT NOT NULL, m TINYINT NOT NULL);",
        )
        .unwrap();

        for (layer, field, names) in layers {
            conn.execute_batch(&format!(
                "CREATE TABLE \"{layer}\" (fid INTEGER PRIMARY KEY, geom BLOB, \"{field}\" TEXT);"
            ))
            .unwrap();
            conn.execute(
                "INSERT INTO gpkg_contents VALUES (?1, 'features', ?1, 4326)",
                params![layer],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', 'POLYGON', 4326, 0, 0)",
                params![layer],
            )
            .unwrap();
            for (i, name) in names.iter().enumerate() {
                conn.execute(
                    &format!("INSERT INTO \"{layer}\" (geom, \"{field}\") VALUES (?1, ?2)"),
                    params![square_blob(4326, 5.0 + i as f64, 45.0, 1.0), name],
                )
                .unwrap();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use geo::{BoundingRect, Geometry};

    use super::fixture::write_package;

    #[test]
    fn test_list_and_read_layers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("country.gpkg");
        write_package(
            &path,
            &[
                ("ADM_ADM_1", "NAME_1", &["West", "East"]),
                ("ADM_ADM_0", "NAME_0", &["Country"]),
            ],
        );

        let package = GeoPackage::new(&path);
        assert!(package.is_multi_layer());
        assert_eq!(package.list_layers().unwrap(), ["ADM_ADM_0", "ADM_ADM_1"]);
        assert_eq!(package.feature_count("ADM_ADM_1").unwrap(), 2);

        let data = package.read_layer(Some("ADM_ADM_1")).unwrap();
        assert_eq!(data.crs(), Crs::Geographic);
        assert_eq!(data.len(), 2);

        let west = &data.features()[0];
        assert_eq!(
            west.attribute("NAME_1").and_then(AttributeValue::as_str),
            Some("West")
        );
        assert!(west.attribute("fid").is_some());
        assert!(west.attribute("geom").is_none());
        let geometry = west.geometry().unwrap();
        assert!(matches!(geometry, Geometry::Polygon(_)));
        let rect = geometry.bounding_rect().unwrap();
        assert_eq!((rect.min().x, rect.min().y), (5.0, 45.0));
        assert_eq!((rect.max().x, rect.max().y), (6.0, 46.0));
    }

    #[test]
    fn test_layer_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("country.gpkg");
        write_package(
            &path,
            &[("ADM_ADM_1", "NAME_1", &["West"]), ("ADM_ADM_2", "NAME_2", &["D1"])],
        );

        let package = GeoPackage::new(&path);
        assert!(matches!(
            package.read_layer(Some("ADM_ADM_9")),
            Err(SourceError::LayerNotFound { .. })
        ));
        assert!(matches!(
            package.read_layer(None),
            Err(SourceError::LayerRequired { .. })
        ));
    }

    #[test]
    fn test_single_table_read_without_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.gpkg");
        write_package(&path, &[("regions", "NAME_1", &["Only"])]);

        let data = GeoPackage::new(&path).read_layer(None).unwrap();
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_not_a_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gpkg");
        std::fs::write(&path, "definitely not sqlite").unwrap();

        assert!(matches!(
            GeoPackage::new(&path).list_layers(),
            Err(SourceError::Database { .. })
        ));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("ADM_ADM_1"), "\"ADM_ADM_1\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
