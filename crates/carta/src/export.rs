//! Export of composed scenes.
//!
//! The composition pipeline stops at a [`Scene`]; exporters turn it into an
//! output format. This is the last stage of the pipeline:
//!
//! ```text
//! Geodata sources
//!     ↓ merge
//! Tagged features
//!     ↓ compose
//! Scene (draw passes, axis limits, scale bar)
//!     ↓ export (this module)
//! Output file
//! ```
//!
//! # Available Backends
//!
//! - [`svg`] - SVG output via [`svg::SvgExporter`] and [`svg::render_document`]
//!
//! [`Error`] converts into [`CartaError::Export`] at the crate boundary.
//!
//! [`CartaError::Export`]: crate::CartaError::Export

/// SVG export backend.
pub mod svg;

use crate::scene::Scene;

/// Abstraction for scene export backends.
pub trait Exporter {
    /// Exports a composed scene to the backend's output format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] if the scene cannot be converted to the
    /// target format, or [`Error::Io`] if writing the output fails.
    fn export_scene(&mut self, scene: &Scene) -> Result<(), Error>;
}

/// Errors that can occur during scene export.
#[derive(Debug)]
pub enum Error {
    /// A rendering or conversion failure described by `message`.
    Render(String),
    /// An I/O error encountered while writing output.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render(msg) => write!(f, "Render error: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(_) => None,
            Self::Io(err) => Some(err),
        }
    }
}
