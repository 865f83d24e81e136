// Fixture loading utilities for test data
// Provides functions to load JSON test fixtures from files

use serde_json::Value;
use std::fs;

/// Load a JSON fixture from the tests/fixtures/ directory
///
/// # Panics
/// Panics if the fixture file doesn't exist or contains invalid JSON
pub fn load_fixture(name: &str) -> Value {
    let fixture_path = format!("{}/tests/fixtures/{}.json", env!("CARGO_MANIFEST_DIR"), name);
    let content = fs::read_to_string(&fixture_path)
        .unwrap_or_else(|_| panic!("Failed to read fixture file: {}", fixture_path));

    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {} as JSON: {}", fixture_path, e))
}
