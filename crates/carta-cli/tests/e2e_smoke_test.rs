use std::{fs, path::Path};

use tempfile::tempdir;

use carta_cli::{Args, run};

fn square(name_field: &str, name: &str, x: f64, y: f64) -> String {
    format!(
        r#"{{"type":"Feature","properties":{{"{name_field}":"{name}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x},{y}],[{x1},{y}],[{x1},{y1}],[{x},{y1}],[{x},{y}]]]}}}}"#,
        x1 = x + 1.0,
        y1 = y + 1.0,
    )
}

fn write_collection(path: &Path, features: &[String]) {
    let collection = format!(
        r#"{{"type":"FeatureCollection","features":[{}]}}"#,
        features.join(",")
    );
    fs::write(path, collection).expect("Failed to write fixture");
}

/// Writes a two-layer package, a neighbouring country and an overlay line.
fn write_fixtures(dir: &Path) {
    let package = dir.join("country");
    fs::create_dir(&package).expect("Failed to create package directory");
    write_collection(
        &package.join("ADM_ADM_1.geojson"),
        &[
            square("NAME_1", "West", 5.0, 45.0),
            square("NAME_1", "East", 6.0, 45.0),
        ],
    );
    write_collection(
        &package.join("ADM_ADM_2.geojson"),
        &(0..4)
            .map(|i| square("NAME_2", &format!("D{i}"), 5.0 + i as f64 * 0.5, 45.0))
            .collect::<Vec<_>>(),
    );

    write_collection(
        &dir.join("neighbour.geojson"),
        &[square("NAME_0", "Neighbour", 7.0, 45.0)],
    );

    let overlay = r#"{"type":"Feature","properties":{},"geometry":{"type":"LineString","coordinates":[[5.0,45.0],[7.0,46.0]]}}"#;
    fs::write(dir.join("route.geojson"), overlay).expect("Failed to write overlay");
}

fn args(input: &Path, output: &Path) -> Args {
    Args {
        input: input.to_string_lossy().to_string(),
        layers: Vec::new(),
        secondary: Vec::new(),
        overlay: None,
        output: output.to_string_lossy().to_string(),
        config: None,
        preview: false,
        list_regions: false,
        log_level: "off".to_string(),
    }
}

#[test]
fn e2e_smoke_test_full_map() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    write_fixtures(temp_dir.path());

    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
        [scalebar]
        show = true

        [highlight]
        layer = "ADM_ADM_1"
        names = ["East"]
        "#,
    )
    .expect("Failed to write config");

    let output = temp_dir.path().join("map.svg");
    let args = Args {
        layers: vec!["ADM_ADM_1".to_string()],
        secondary: vec![temp_dir.path().join("neighbour.geojson").to_string_lossy().to_string()],
        overlay: Some(temp_dir.path().join("route.geojson").to_string_lossy().to_string()),
        config: Some(config_path.to_string_lossy().to_string()),
        ..args(&temp_dir.path().join("country"), &output)
    };

    run(&args).expect("Map should render");

    let svg = fs::read_to_string(&output).expect("Output should exist");
    for layer in ["background", "secondary", "main", "highlight", "overlay", "scalebar"] {
        assert!(
            svg.contains(&format!(r#"data-layer="{layer}""#)),
            "Missing {layer} layer"
        );
    }
    assert!(svg.contains(" km"), "Scale bar label should be in kilometers");
}

#[test]
fn e2e_smoke_test_preview() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    write_fixtures(temp_dir.path());

    let output = temp_dir.path().join("preview.svg");
    let args = Args {
        layers: vec!["ADM_ADM_2".to_string()],
        preview: true,
        ..args(&temp_dir.path().join("country"), &output)
    };

    run(&args).expect("Preview should render");

    let svg = fs::read_to_string(&output).expect("Output should exist");
    assert!(svg.contains(r#"viewBox="0 0 400 300""#));
}

#[test]
fn e2e_smoke_test_empty_main() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let input = temp_dir.path().join("empty.geojson");
    write_collection(&input, &[]);

    let output = temp_dir.path().join("empty.svg");
    run(&args(&input, &output)).expect("Empty main should still render");

    let svg = fs::read_to_string(&output).expect("Output should exist");
    assert!(svg.contains("no data"));
}

#[test]
fn e2e_smoke_test_errors() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    write_fixtures(temp_dir.path());
    let output = temp_dir.path().join("out.svg");

    let missing = args(&temp_dir.path().join("missing.geojson"), &output);
    assert!(run(&missing).is_err(), "Missing main source should fail");

    let broken_config = temp_dir.path().join("broken.toml");
    fs::write(&broken_config, "[map]\ndpi = 0\n").expect("Failed to write config");
    let invalid = Args {
        config: Some(broken_config.to_string_lossy().to_string()),
        ..args(&temp_dir.path().join("country"), &output)
    };
    assert!(run(&invalid).is_err(), "Invalid config should fail");

    assert!(!output.exists());
}

#[test]
fn e2e_smoke_test_missing_context_sources_are_skipped() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    write_fixtures(temp_dir.path());

    let output = temp_dir.path().join("map.svg");
    let args = Args {
        layers: vec!["ADM_ADM_1".to_string()],
        secondary: vec![
            temp_dir.path().join("nowhere").to_string_lossy().to_string(),
            temp_dir.path().join("neighbour.geojson").to_string_lossy().to_string(),
        ],
        overlay: Some(temp_dir.path().join("no_route.geojson").to_string_lossy().to_string()),
        ..args(&temp_dir.path().join("country"), &output)
    };

    run(&args).expect("Missing secondary and overlay paths should not fail the run");

    let svg = fs::read_to_string(&output).expect("Output should exist");
    assert!(svg.contains(r#"data-layer="main""#));
    assert!(svg.contains(r#"data-layer="secondary""#));
    assert!(!svg.contains(r#"data-layer="overlay""#));
}

#[test]
fn e2e_smoke_test_list_regions() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    write_fixtures(temp_dir.path());

    let output = temp_dir.path().join("unused.svg");
    let args = Args {
        layers: vec!["ADM_ADM_1".to_string()],
        list_regions: true,
        ..args(&temp_dir.path().join("country"), &output)
    };

    run(&args).expect("Listing regions should succeed");
    assert!(!output.exists(), "Listing regions should not render");
}
