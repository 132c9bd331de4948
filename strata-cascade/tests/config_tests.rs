//! Integration tests for TOML cascade configuration
//!
//! Tests verify:
//! - A schema loaded from disk drives a cascade end to end
//! - Misconfigured schemas fail at load time, before any engine exists
//! - Types left out of the schema never cascade

use std::sync::Arc;
use strata_test_utils::assertions::{assert_config_error, assert_live_matches_draft};
use strata_test_utils::fixtures::{page_schema, Fixture, PAGE_SCHEMA_TOML};
use strata_test_utils::{
    CascadeConfig, CascadeEngine, ConfigError, ManualClock, MockStorage, RecordType, Relationship,
    StageContext, StrataError, TypeConfig,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Page and Section manage each other.
const CYCLIC_SCHEMA: &str = r#"
[types.Page]
manage = ["Sections"]

[[types.Page.relationships]]
name = "Sections"
child_type = "Section"
kind = { plural = { foreign_key = "page_id" } }

[types.Section]
manage = ["Owner"]

[[types.Section.relationships]]
name = "Owner"
child_type = "Page"
kind = "singular"
"#;

/// Page manages a relationship it never declares.
const UNKNOWN_RELATIONSHIP_SCHEMA: &str = r#"
[types.Page]
manage = ["Slides"]
"#;

/// A stray key inside a relationship.
const UNKNOWN_FIELD_SCHEMA: &str = r#"
[types.Page]
manage = ["Banner"]

[[types.Page.relationships]]
name = "Banner"
child_type = "Image"
kind = "singular"
cascade = true

[types.Image]
"#;

// ============================================================================
// LOADING
// ============================================================================

#[test]
fn test_schema_from_file_drives_publish() {
    let path = std::env::temp_dir().join(format!("strata-schema-{}.toml", uuid_suffix()));
    std::fs::write(&path, PAGE_SCHEMA_TOML).unwrap();
    let config = CascadeConfig::from_path(&path);
    std::fs::remove_file(&path).ok();

    let config = config.unwrap();
    assert_eq!(config, page_schema());

    let fixture = Fixture::with_config(config);
    let page = fixture.page("home");
    let slide = fixture.slide(&page, "cover");
    let photo = fixture.image("photo");
    fixture.set_photo(&slide, Some(&photo));
    fixture.tick();
    fixture.engine.publish(&page).unwrap();

    assert_live_matches_draft(&fixture, &page);
    assert!(fixture.read(&photo, StageContext::Live).is_some());
}

#[test]
fn test_missing_file_is_io_error() {
    let path = std::env::temp_dir().join("strata-schema-does-not-exist.toml");
    let result = CascadeConfig::from_path(&path);
    assert!(matches!(result, Err(StrataError::Config(ConfigError::Io { .. }))));
}

// ============================================================================
// VALIDATION
// ============================================================================

#[test]
fn test_cyclic_schema_is_rejected() {
    let result = CascadeConfig::from_toml_str(CYCLIC_SCHEMA);
    match result {
        Err(StrataError::Config(ConfigError::CyclicRelationships { cycle })) => {
            assert!(cycle.contains(&RecordType::from("Page")));
            assert!(cycle.contains(&RecordType::from("Section")));
        }
        other => panic!("Expected cycle error, got: {:?}", other),
    }
}

#[test]
fn test_unknown_relationship_is_rejected() {
    let result = CascadeConfig::from_toml_str(UNKNOWN_RELATIONSHIP_SCHEMA);
    assert!(matches!(
        result,
        Err(StrataError::Config(ConfigError::UnknownRelationship { .. }))
    ));
}

#[test]
fn test_unknown_field_is_parse_error() {
    let result = CascadeConfig::from_toml_str(UNKNOWN_FIELD_SCHEMA);
    assert!(matches!(
        result,
        Err(StrataError::Config(ConfigError::Parse { .. }))
    ));
}

#[test]
fn test_engine_rejects_unvalidated_config() {
    // Built in code, so it skipped load-time validation.
    let config = CascadeConfig::new()
        .with_type(
            "Page",
            TypeConfig::new().manages(Relationship::plural("Sections", "Section", "page_id")),
        )
        .with_type(
            "Section",
            TypeConfig::new().manages(Relationship::singular("Owner", "Page")),
        );
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let storage = Arc::new(MockStorage::with_clock(clock.clone()));
    let result = CascadeEngine::new(storage, Arc::new(config), clock);
    assert_config_error(&result);
}

#[test]
fn test_undeclared_type_does_not_cascade() {
    let config = CascadeConfig::from_toml_str(PAGE_SCHEMA_TOML).unwrap();
    assert!(config.cascades(&RecordType::from("Page")));
    assert!(config.cascades(&RecordType::from("Slide")));
    assert!(!config.cascades(&RecordType::from("Image")));
    assert!(!config.cascades(&RecordType::from("Footer")));
    assert!(config.is_managed_child(&RecordType::from("Image")));
    assert!(!config.is_managed_child(&RecordType::from("Page")));
}

fn uuid_suffix() -> String {
    strata_core::new_entity_id().simple().to_string()
}
