//! CLI logic for the Carta map tool.
//!
//! Opens the geodata sources named on the command line, composes the map
//! with [`MapBuilder`] and writes it as SVG, or lists region names for
//! building hide and highlight filters.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;
pub use error_adapter::ErrorAdapter;

use std::io::{self, Write};

use log::{info, warn};

use carta::{CartaError, MapBuilder, source};

/// Run the Carta CLI application
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `CartaError` for:
/// - Configuration loading errors
/// - A main source that cannot be opened
/// - Layers that cannot be read when listing regions
/// - Rendering and file I/O errors
pub fn run(args: &Args) -> Result<(), CartaError> {
    info!(
        input_path = args.input,
        output_path = args.output;
        "Processing map"
    );

    let app_config = config::load_config(args.config.as_ref())?;
    let builder = MapBuilder::new(app_config);

    let main = source::open(&args.input)?;

    if args.list_regions {
        return list_regions(&builder, main.as_ref(), &args.layers, &mut io::stdout().lock());
    }

    let mut sources = builder.sources(main).with_layers(args.layers.iter().cloned());
    for path in &args.secondary {
        match source::open(path) {
            Ok(secondary) => sources = sources.with_secondary(secondary),
            Err(err) => warn!(path = path.as_str(), err:err; "Skipping secondary source"),
        }
    }
    if let Some(path) = &args.overlay {
        match source::open(path) {
            Ok(overlay) => sources = sources.with_overlay(overlay),
            Err(err) => warn!(path = path.as_str(), err:err; "Skipping overlay"),
        }
    }

    let scene = builder.compose(&sources, args.preview);
    builder.export_svg(&scene, &args.output)?;

    info!(output_file = args.output; "SVG exported successfully");

    Ok(())
}

/// Writes region names, one per line, under a header per layer.
fn list_regions(
    builder: &MapBuilder,
    main: &dyn source::GeoSource,
    layers: &[String],
    out: &mut impl Write,
) -> Result<(), CartaError> {
    if layers.is_empty() {
        for name in builder.list_regions(main, None)? {
            writeln!(out, "{name}")?;
        }
        return Ok(());
    }

    for layer in layers {
        writeln!(out, "[{layer}]")?;
        for name in builder.list_regions(main, Some(layer))? {
            writeln!(out, "{name}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use carta::{crs::Crs, feature::Feature, source::MemorySource};

    #[test]
    fn test_list_regions_per_layer() {
        let package = MemorySource::new("pkg")
            .with_layer(
                "ADM_ADM_1",
                Crs::Geographic,
                vec![
                    Feature::new(None).with_attribute("NAME_1", "South"),
                    Feature::new(None).with_attribute("NAME_1", "North"),
                ],
            )
            .with_layer(
                "ADM_ADM_2",
                Crs::Geographic,
                vec![Feature::new(None).with_attribute("NAME_2", "Harbour")],
            );

        let mut out = Vec::new();
        list_regions(
            &MapBuilder::default(),
            &package,
            &["ADM_ADM_1".to_string(), "ADM_ADM_2".to_string()],
            &mut out,
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[ADM_ADM_1]\nNorth\nSouth\n[ADM_ADM_2]\nHarbour\n"
        );
    }

    #[test]
    fn test_list_regions_requires_layer_for_package() {
        let package = MemorySource::new("pkg")
            .with_layer("a", Crs::Geographic, Vec::new())
            .with_layer("b", Crs::Geographic, Vec::new());

        let result = list_regions(&MapBuilder::default(), &package, &[], &mut Vec::new());
        assert!(matches!(result, Err(CartaError::Source(_))));
    }
}
