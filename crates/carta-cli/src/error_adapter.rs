//! Error adapter for converting CartaError to miette diagnostics.
//!
//! Bridges the library's error type and miette's report rendering used by
//! the CLI. Each error kind gets a stable diagnostic code.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan};

use carta::{CartaError, merge::MergeError, source::SourceError};

/// Adapter rendering a [`CartaError`] as a miette diagnostic.
pub struct ErrorAdapter<'a>(pub &'a CartaError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(self.0)
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            CartaError::Io(_) => "carta::io",
            CartaError::Source(_) => "carta::source",
            CartaError::Merge(_) => "carta::merge",
            CartaError::Config(_) => "carta::config",
            CartaError::Export(_) => "carta::export",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.0 {
            CartaError::Source(SourceError::LayerRequired { .. })
            | CartaError::Merge(MergeError::DataSource(SourceError::LayerRequired { .. })) => {
                "select layers with --layer"
            }
            CartaError::Source(SourceError::LayerNotFound { .. }) => {
                "layer names are the file stems of a package directory or the feature tables of a GeoPackage"
            }
            CartaError::Config(_) => "see the [map], [pipeline] and [scalebar] sections",
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        None
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;

    fn code(err: &CartaError) -> Option<String> {
        ErrorAdapter(err).code().map(|code| code.to_string())
    }

    #[test]
    fn test_codes() {
        let io = CartaError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(code(&io).as_deref(), Some("carta::io"));

        let source = CartaError::Source(SourceError::LayerRequired {
            source_id: "pkg".to_string(),
        });
        assert_eq!(code(&source).as_deref(), Some("carta::source"));
        assert!(ErrorAdapter(&source).help().is_some());

        let config = CartaError::Config(carta::config::ConfigError::Validation("bad".to_string()));
        assert_eq!(code(&config).as_deref(), Some("carta::config"));
    }

    #[test]
    fn test_report_renders() {
        let err = CartaError::Source(SourceError::LayerNotFound {
            source_id: "pkg".to_string(),
            layer: "ADM_ADM_9".to_string(),
        });

        let mut writer = String::new();
        miette::GraphicalReportHandler::new()
            .render_report(&mut writer, &ErrorAdapter(&err))
            .unwrap();
        assert!(writer.contains("carta::source"));
        assert!(writer.contains("ADM_ADM_9"));
    }
}
