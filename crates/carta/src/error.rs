//! Error types for Carta operations.
//!
//! [`CartaError`] wraps the failures that can reach the facade and the CLI.
//! Composition itself never fails; these come from reading sources for
//! region listings, from configuration and from rendering.

use std::io;

use thiserror::Error;

use crate::{config::ConfigError, merge::MergeError, source::SourceError};

/// The main error type for Carta operations.
#[derive(Debug, Error)]
pub enum CartaError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Export error: {0}")]
    Export(Box<dyn std::error::Error + Send + Sync>),
}

impl From<crate::export::Error> for CartaError {
    fn from(error: crate::export::Error) -> Self {
        Self::Export(Box::new(error))
    }
}
