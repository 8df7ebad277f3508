//! Config hash stability
//!
//! GREEN when:
//! - Loading the same inputs twice returns the identical config_hash.
//! - Reordering keys within YAML doesn't change the hash.
//! - Different values produce different hashes.
//! - Overlays override the base deterministically.

use strings_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
daemon:
  addr: "127.0.0.1:8080"
db:
  max_connections: 10
  run_migrations: true
log:
  filter: "info"
"#;

const BASE_YAML_REORDERED: &str = r#"
log:
  filter: "info"
db:
  run_migrations: true
  max_connections: 10
daemon:
  addr: "127.0.0.1:8080"
"#;

const OVERLAY_YAML: &str = r#"
db:
  max_connections: 4
log:
  filter: "strings_engine=debug,info"
"#;

#[test]
fn same_input_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex");
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn overlay_changes_hash_and_wins() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);

    assert_eq!(merged.config_json.pointer("/db/max_connections").unwrap(), 4);
    // Untouched sibling survives the deep merge.
    assert_eq!(merged.config_json.pointer("/db/run_migrations").unwrap(), true);
}

#[test]
fn empty_layer_is_ignored() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}
