//! Command-line argument definitions for the Carta CLI.
//!
//! [`Args`] is parsed from the command line using [`clap`]. Arguments select
//! the geodata sources, the output path, the configuration file and the
//! logging verbosity.

use clap::Parser;

/// Command-line arguments for the Carta map tool
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Main territory: a GeoJSON file or a directory of GeoJSON layers
    #[arg(help = "Path to the main territory source")]
    pub input: String,

    /// Layer of the main source to draw; repeat for several layers
    #[arg(short, long = "layer")]
    pub layers: Vec<String>,

    /// Context territory drawn below the main territory; repeatable
    #[arg(short, long)]
    pub secondary: Vec<String>,

    /// Geometry drawn above all territories, never filtered
    #[arg(long)]
    pub overlay: Option<String>,

    /// Path to the output SVG file
    #[arg(short, long, default_value = "out.svg")]
    pub output: String,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Render at the configured preview scale
    #[arg(long)]
    pub preview: bool,

    /// Print the region names of the selected layers instead of rendering
    #[arg(long)]
    pub list_regions: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
