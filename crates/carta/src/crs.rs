//! Coordinate reference systems and reprojection.
//!
//! [`Crs`] names a system by EPSG code, with dedicated variants for
//! geographic WGS 84 and spherical Web Mercator. Reprojection is delegated to
//! `proj4rs`; any EPSG code known to its definition table can be used as a
//! source or target system.

use std::{fmt, str::FromStr};

use geo::{Coord, Geometry, MapCoords};
use proj4rs::{proj::Proj, transform::transform};
use serde::Deserialize;
use thiserror::Error;

/// Latitude beyond which Web Mercator is undefined.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

const WGS84_DEFINITION: &str = "+proj=longlat +datum=WGS84 +no_defs";

const WEB_MERCATOR_DEFINITION: &str =
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CrsError {
    #[error("unrecognised coordinate reference system `{0}`")]
    Unknown(String),

    #[error("no projection definition for {crs}: {message}")]
    Definition { crs: Crs, message: String },

    #[error("cannot reproject from {from} to {to}: {message}")]
    Transform { from: Crs, to: Crs, message: String },
}

/// A coordinate reference system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Crs {
    /// WGS 84 longitude/latitude in degrees (EPSG:4326).
    Geographic,
    /// Spherical Web Mercator in meters (EPSG:3857).
    #[default]
    WebMercator,
    /// Any other EPSG coded system.
    Projected(u32),
}

impl Crs {
    /// Returns `true` for systems measured in degrees.
    pub fn is_geographic(self) -> bool {
        matches!(self, Self::Geographic)
    }

    /// The EPSG code of this system.
    pub fn epsg(self) -> u32 {
        match self {
            Self::Geographic => 4326,
            Self::WebMercator => 3857,
            Self::Projected(code) => code,
        }
    }

    /// The system for an EPSG code; aliases of WGS 84 and Web Mercator map
    /// onto their dedicated variants.
    pub fn from_epsg(code: u32) -> Self {
        match code {
            4326 | 4979 => Self::Geographic,
            3857 | 900913 | 3785 | 102100 => Self::WebMercator,
            other => Self::Projected(other),
        }
    }

    fn proj(self) -> Result<Proj, CrsError> {
        let definition = |message: String| CrsError::Definition { crs: self, message };
        match self {
            Self::Geographic => {
                Proj::from_proj_string(WGS84_DEFINITION).map_err(|err| definition(err.to_string()))
            }
            Self::WebMercator => Proj::from_proj_string(WEB_MERCATOR_DEFINITION)
                .map_err(|err| definition(err.to_string())),
            Self::Projected(code) => {
                let code = u16::try_from(code)
                    .map_err(|_| definition("EPSG code out of range".to_string()))?;
                Proj::from_epsg_code(code).map_err(|err| definition(err.to_string()))
            }
        }
    }

    /// Builds a reusable transformation from `self` into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::Definition`] if either system has no known
    /// projection definition.
    pub fn transformer(self, target: Crs) -> Result<Transformer, CrsError> {
        if self == target {
            return Ok(Transformer {
                from: self,
                to: target,
                projs: None,
            });
        }

        Ok(Transformer {
            from: self,
            to: target,
            projs: Some((self.proj()?, target.proj()?)),
        })
    }

    /// Transforms a single `(x, y)` position from `self` into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError`] if a definition is missing or the position lies
    /// outside the domain of the target projection.
    pub fn transform_point(self, target: Crs, x: f64, y: f64) -> Result<(f64, f64), CrsError> {
        self.transformer(target)?.transform(x, y)
    }

    /// Reprojects a geometry from `self` into `target`.
    pub fn reproject(self, target: Crs, geometry: &Geometry<f64>) -> Result<Geometry<f64>, CrsError> {
        self.transformer(target)?.reproject(geometry)
    }
}

/// A prepared transformation between two reference systems.
pub struct Transformer {
    from: Crs,
    to: Crs,
    projs: Option<(Proj, Proj)>,
}

impl Transformer {
    /// Transforms one position. Geographic coordinates are in degrees.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::Transform`] if the position cannot be projected.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), CrsError> {
        let Some((source, target)) = &self.projs else {
            return Ok((x, y));
        };

        let mut point = if source.is_latlong() {
            let y = if self.to == Crs::WebMercator {
                y.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT)
            } else {
                y
            };
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(source, target, &mut point).map_err(|err| CrsError::Transform {
            from: self.from,
            to: self.to,
            message: err.to_string(),
        })?;

        if target.is_latlong() {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }

    /// Reprojects every coordinate of a geometry.
    ///
    /// # Errors
    ///
    /// Returns the first [`CrsError::Transform`] hit by any coordinate.
    pub fn reproject(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>, CrsError> {
        if self.projs.is_none() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|coord| {
            let (x, y) = self.transform(coord.x, coord.y)?;
            Ok(Coord { x, y })
        })
    }
}

impl FromStr for Crs {
    type Err = CrsError;

    /// Parses `EPSG:n`, `urn:ogc:def:crs:EPSG::n`, `CRS84`, `WGS84` or a bare code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        if matches!(upper.as_str(), "CRS84" | "WGS84" | "OGC:CRS84")
            || upper.ends_with(":CRS84")
        {
            return Ok(Self::Geographic);
        }

        let code = upper
            .rsplit(':')
            .next()
            .filter(|_| upper.contains("EPSG") || !upper.contains(':'))
            .and_then(|code| code.parse::<u32>().ok())
            .ok_or_else(|| CrsError::Unknown(trimmed.to_string()))?;

        Ok(Self::from_epsg(code))
    }
}

impl TryFrom<String> for Crs {
    type Error = CrsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}
