use cartograph_core::geom::{pixel_size, world_point};
use cartograph_core::{
    Diagnostic, GeodataPipeline, HtmlInlineRenderer, MapCatalog, PositionDescriptor,
    TileGridCompositor, TileUrlTemplate,
};
use cartograph_core::tiles::YAxis;
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

fn fixtures_root() -> PathBuf {
    workspace_root().join("fixtures")
}

fn list_geojson_fixtures() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(fixtures_root().join("geojson")) else {
        return Vec::new();
    };
    let mut out: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    out.sort();
    out
}

#[test]
fn geojson_fixtures_match_their_expected_outcome() {
    let pipeline = GeodataPipeline::new(&HtmlInlineRenderer);
    let fixtures = list_geojson_fixtures();
    assert!(!fixtures.is_empty(), "no fixtures under {}", fixtures_root().display());

    for path in fixtures {
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
        let text = std::fs::read_to_string(&path).expect("read fixture");
        let outcome = pipeline.process(&text);

        if name.starts_with("valid_") {
            let features = outcome
                .unwrap_or_else(|e| panic!("{name}: refused: {e}"))
                .unwrap_or_else(|d| panic!("{name}: {}", d.composite_message("fixture")));
            assert!(!features.is_empty(), "{name}");
            let serialized = serde_json::to_string(&features).unwrap();
            assert!(!serialized.contains("\"_"), "{name}: private member survived: {serialized}");
        } else if name.starts_with("invalid_") {
            let diagnostics = outcome
                .unwrap_or_else(|e| panic!("{name}: refused: {e}"))
                .expect_err(&name);
            assert_eq!(diagnostics.len(), 1, "{name}");
            let first = diagnostics.iter().next().unwrap();
            match name.as_str() {
                "invalid_syntax" => assert!(matches!(first, Diagnostic::MalformedInput { .. })),
                _ => assert!(matches!(first, Diagnostic::SchemaViolation { .. }), "{name}: {first}"),
            }
        } else if name.starts_with("refused_") {
            assert!(outcome.is_err(), "{name}");
        } else {
            panic!("fixture {name} has no outcome prefix");
        }
    }
}

#[test]
fn lenient_fixture_keeps_language_variants() {
    let text = std::fs::read_to_string(fixtures_root().join("geojson").join("valid_lenient.json5"))
        .expect("read fixture");
    let features = GeodataPipeline::new(&HtmlInlineRenderer)
        .process(&text)
        .unwrap()
        .unwrap();
    assert_eq!(features[0]["properties"]["title"]["de"], "Straße");
}

#[test]
fn basemap_catalogue_drives_fallbacks() {
    let text = std::fs::read_to_string(fixtures_root().join("basemaps").join("basemaps.json"))
        .expect("read catalogue");
    let catalog = MapCatalog::from_json_str(&text).unwrap();
    assert_eq!(catalog.name("28"), "Dungeon");

    let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::new("{mapID}/{p}", YAxis::Same));
    let mut position = PositionDescriptor::new(pixel_size(512.0, 256.0));
    position.map_id = Some("28".to_string());
    // Valid in the world, outside the dungeon.
    position.center = Some(world_point(3200.0, 3200.0));
    let grid = compositor.compose(&position);
    assert_eq!(grid.position.center, [1856.0, 5216.0]);
    assert_eq!(grid.position.zoom, 2);
    assert!(grid.tiles.iter().all(|t| t.url == "28/0"));
    // 512x256 at zoom 2 is 128x64 world units; the grid spans at least 3x2 tiles of 64.
    assert!(grid.tiles.len() >= 6);
}
