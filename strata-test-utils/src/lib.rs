//! Strata Test Utilities
//!
//! Shared test infrastructure for the Strata workspace:
//! - Proptest generators for identities, fields and edit scripts
//! - A `Fixture` wiring `MockStorage`, a `ManualClock` and a `CascadeEngine`
//!   over a Page/Slide/Image schema
//! - Assertions for cascade outcomes
//! - A tracing initializer for tests

// Re-export mock storage from its source crate
pub use strata_storage::{MockStorage, VersionedStorage};

// Re-export core types for convenience
pub use strata_core::{
    link_value, CascadeConfig, CascadeError, Clock, ConfigError, EntityId, ManualClock,
    PublishMode, PublishSource, RecordFields, RecordId, RecordKey, RecordType, Relationship,
    RollbackTarget, Stage, StageContext, StorageError, StrataError, StrataResult, Timestamp,
    Tombstone, TypeConfig, VersionNumber, VersionedRecord,
};

pub use strata_cascade::{Cascadable, CascadeEngine};

use chrono::{TimeZone, Utc};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a test-friendly subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `strata=debug` for the Strata crates.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("strata_cascade=debug,strata_storage=debug,warn")
        });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Strata types.

    use super::*;
    use proptest::prelude::*;

    // === Identity Generators ===

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a record type name.
    pub fn arb_record_type() -> impl Strategy<Value = RecordType> {
        "[A-Z][a-zA-Z]{0,11}".prop_map(RecordType::from)
    }

    /// Generate a saved or unsaved record id.
    pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
        prop_oneof![
            arb_uuid().prop_map(RecordId::Saved),
            Just(RecordId::Unsaved(None)),
            "[nN][eE][wW][-_0-9a-z]{0,8}".prop_map(|marker| RecordId::Unsaved(Some(marker))),
        ]
    }

    /// Generate a Timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a small field map with scalar values.
    pub fn arb_fields() -> impl Strategy<Value = RecordFields> {
        prop::collection::btree_map(
            "[a-z][a-z_]{0,7}",
            prop_oneof![
                any::<i64>().prop_map(serde_json::Value::from),
                "[ -~]{0,16}".prop_map(serde_json::Value::from),
                any::<bool>().prop_map(serde_json::Value::from),
                Just(serde_json::Value::Null),
            ],
            0..6,
        )
        .prop_map(|map| map.into_iter().collect())
    }

    // === Enum Generators ===

    /// Generate a Stage.
    pub fn arb_stage() -> impl Strategy<Value = Stage> {
        prop_oneof![Just(Stage::Draft), Just(Stage::Live)]
    }

    /// Generate a StageContext.
    pub fn arb_stage_context() -> impl Strategy<Value = StageContext> {
        prop_oneof![
            Just(StageContext::Draft),
            Just(StageContext::Live),
            arb_timestamp().prop_map(StageContext::Archive),
        ]
    }

    /// Generate a RollbackTarget.
    pub fn arb_rollback_target() -> impl Strategy<Value = RollbackTarget> {
        prop_oneof![
            (1u32..1000).prop_map(RollbackTarget::Version),
            Just(RollbackTarget::Live),
        ]
    }

    // === Edit Scripts ===

    /// Generate one draft edit against a page tree.
    pub fn arb_edit() -> impl Strategy<Value = fixtures::Edit> {
        use fixtures::Edit;
        prop_oneof![
            Just(Edit::AddSlide),
            any::<usize>().prop_map(Edit::EditSlide),
            any::<usize>().prop_map(Edit::DeleteSlide),
            Just(Edit::EditPage),
            Just(Edit::SetBanner),
            Just(Edit::ClearBanner),
            any::<usize>().prop_map(Edit::AddPhoto),
            any::<usize>().prop_map(Edit::EditPhoto),
        ]
    }

    /// Generate a sequence of draft edits.
    pub fn arb_edit_script(max_len: usize) -> impl Strategy<Value = Vec<fixtures::Edit>> {
        prop::collection::vec(arb_edit(), 0..max_len)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built schema and storage fixtures.

    use super::*;
    use chrono::Duration;
    use serde_json::json;

    /// Page manages Slides (plural) and Banner (singular); Slide manages Photo.
    pub fn page_schema() -> CascadeConfig {
        CascadeConfig::new()
            .with_type(
                "Page",
                TypeConfig::new()
                    .manages(Relationship::plural("Slides", "Slide", "page_id"))
                    .manages(Relationship::singular("Banner", "Image")),
            )
            .with_type(
                "Slide",
                TypeConfig::new().manages(Relationship::singular("Photo", "Image")),
            )
            .with_type("Image", TypeConfig::new())
    }

    /// Same schema in its TOML form.
    pub const PAGE_SCHEMA_TOML: &str = r#"
[types.Page]
manage = ["Slides", "Banner"]

[[types.Page.relationships]]
name = "Slides"
child_type = "Slide"
kind = { plural = { foreign_key = "page_id" } }

[[types.Page.relationships]]
name = "Banner"
child_type = "Image"
kind = "singular"

[types.Slide]
manage = ["Photo"]

[[types.Slide.relationships]]
name = "Photo"
child_type = "Image"
kind = "singular"

[types.Image]
"#;

    /// Fixed starting time for fixtures.
    pub fn epoch() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// One draft edit against a page tree. Indices wrap around the current
    /// slide list; edits that need a slide do nothing when there is none.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Edit {
        AddSlide,
        EditSlide(usize),
        DeleteSlide(usize),
        EditPage,
        SetBanner,
        ClearBanner,
        AddPhoto(usize),
        EditPhoto(usize),
    }

    /// Storage, clock and engine over `page_schema`.
    ///
    /// Every write advances the clock one minute first, so each version has
    /// a distinct `last_edited` and archive reads are unambiguous.
    pub struct Fixture {
        pub clock: Arc<ManualClock>,
        pub storage: Arc<MockStorage>,
        pub engine: CascadeEngine,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::with_config(page_schema())
        }

        pub fn with_config(config: CascadeConfig) -> Self {
            let clock = Arc::new(ManualClock::new(epoch()));
            let storage = Arc::new(MockStorage::with_clock(clock.clone()));
            let engine = CascadeEngine::new(storage.clone(), Arc::new(config), clock.clone())
                .expect("fixture config is valid");
            Self {
                clock,
                storage,
                engine,
            }
        }

        /// Override a record type's lifecycle steps.
        pub fn with_behavior(
            mut self,
            record_type: impl Into<RecordType>,
            behavior: Arc<dyn Cascadable>,
        ) -> Self {
            self.engine = self.engine.with_behavior(record_type, behavior);
            self
        }

        /// Advance the clock one minute.
        pub fn tick(&self) -> Timestamp {
            self.clock.advance(Duration::minutes(1))
        }

        pub fn now(&self) -> Timestamp {
            self.clock.now()
        }

        // === Record Builders ===

        fn create(&self, record_type: &str, mut fields: RecordFields, title: &str) -> RecordKey {
            self.tick();
            fields.insert("title".into(), json!(title));
            self.storage
                .create_draft(&RecordType::from(record_type), fields)
                .expect("create draft")
                .key()
                .expect("created record is saved")
        }

        pub fn page(&self, title: &str) -> RecordKey {
            self.create("Page", RecordFields::new(), title)
        }

        pub fn slide(&self, page: &RecordKey, title: &str) -> RecordKey {
            let mut fields = RecordFields::new();
            fields.insert("page_id".into(), link_value(page.id));
            self.create("Slide", fields, title)
        }

        pub fn image(&self, title: &str) -> RecordKey {
            self.create("Image", RecordFields::new(), title)
        }

        // === Draft Edits ===

        /// Write a new draft version with one field changed.
        pub fn set_field(&self, key: &RecordKey, name: &str, value: serde_json::Value) {
            self.tick();
            let mut fields = self.draft(key).fields;
            fields.insert(name.into(), value);
            self.storage.write_draft(key, fields).expect("write draft");
        }

        pub fn set_title(&self, key: &RecordKey, title: &str) {
            self.set_field(key, "title", json!(title));
        }

        pub fn set_banner(&self, page: &RecordKey, image: Option<&RecordKey>) {
            let value = image.map_or(serde_json::Value::Null, |image| link_value(image.id));
            self.set_field(page, "Banner", value);
        }

        pub fn set_photo(&self, slide: &RecordKey, image: Option<&RecordKey>) {
            let value = image.map_or(serde_json::Value::Null, |image| link_value(image.id));
            self.set_field(slide, "Photo", value);
        }

        /// Delete a record from Draft, the way an editor removes a child.
        pub fn remove_from_draft(&self, key: &RecordKey) {
            self.tick();
            self.storage
                .delete_from_stage(key, Stage::Draft)
                .expect("delete from draft");
        }

        /// Apply one generated edit to the tree under `page`.
        pub fn apply(&self, page: &RecordKey, edit: &Edit) {
            let slides = self.slides(page, StageContext::Draft);
            let pick = |index: usize| slides.get(index % slides.len().max(1)).cloned();
            match edit {
                Edit::AddSlide => {
                    let n = slides.len();
                    self.slide(page, &format!("slide {}", n));
                }
                Edit::EditSlide(i) => {
                    if let Some(slide) = pick(*i) {
                        self.set_title(&slide, &format!("edited at {}", self.now()));
                    }
                }
                Edit::DeleteSlide(i) => {
                    if let Some(slide) = pick(*i) {
                        self.remove_from_draft(&slide);
                    }
                }
                Edit::EditPage => self.set_title(page, &format!("edited at {}", self.now())),
                Edit::SetBanner => {
                    let image = self.image("banner");
                    self.set_banner(page, Some(&image));
                }
                Edit::ClearBanner => self.set_banner(page, None),
                Edit::AddPhoto(i) => {
                    if let Some(slide) = pick(*i) {
                        let image = self.image("photo");
                        self.set_photo(&slide, Some(&image));
                    }
                }
                Edit::EditPhoto(i) => {
                    let photo = pick(*i).and_then(|slide| self.draft(&slide).linked_id("Photo"));
                    if let Some(id) = photo {
                        let key = RecordKey::new("Image", id);
                        if self.storage.read(&key, StageContext::Draft).ok().flatten().is_some() {
                            self.set_title(&key, &format!("edited at {}", self.now()));
                        }
                    }
                }
            }
        }

        // === Reads ===

        pub fn draft(&self, key: &RecordKey) -> VersionedRecord {
            self.storage
                .read(key, StageContext::Draft)
                .expect("read draft")
                .expect("record exists on draft")
        }

        pub fn read(&self, key: &RecordKey, context: StageContext) -> Option<VersionedRecord> {
            self.storage.read(key, context).expect("read")
        }

        pub fn title(&self, key: &RecordKey, context: StageContext) -> Option<String> {
            self.read(key, context)
                .and_then(|row| row.field("title").and_then(|v| v.as_str()).map(String::from))
        }

        pub fn version(&self, key: &RecordKey, stage: Stage) -> Option<VersionNumber> {
            self.storage
                .version_on_stage(key, stage)
                .expect("version on stage")
        }

        /// Managed children of `parent` in `context`, deduplicated.
        pub fn children(&self, parent: &RecordKey, context: StageContext) -> Vec<RecordKey> {
            self.engine
                .resolver()
                .child_keys(parent, context)
                .expect("resolve children")
        }

        /// Slide children only.
        pub fn slides(&self, page: &RecordKey, context: StageContext) -> Vec<RecordKey> {
            self.children(page, context)
                .into_iter()
                .filter(|key| key.record_type.as_str() == "Slide")
                .collect()
        }

        /// Every record below `parent` in `context`, depth first.
        pub fn descendants(&self, parent: &RecordKey, context: StageContext) -> Vec<RecordKey> {
            let mut out = Vec::new();
            for child in self.children(parent, context) {
                out.extend(self.descendants(&child, context));
                out.push(child);
            }
            out
        }
    }

    impl Default for Fixture {
        fn default() -> Self {
            Self::new()
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cascade outcomes.

    use super::fixtures::Fixture;
    use super::*;

    /// Assert that a StrataResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &StrataResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a StrataResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &StrataResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a StrataResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &StrataResult<T>) {
        match result {
            Err(StrataError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that a StrataResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &StrataResult<T>) {
        match result {
            Err(StrataError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a StrataResult is a Cascade error.
    #[track_caller]
    pub fn assert_cascade_error<T: std::fmt::Debug>(result: &StrataResult<T>) {
        match result {
            Err(StrataError::Cascade(_)) => {}
            other => panic!("Expected Cascade error, got: {:?}", other),
        }
    }

    /// Assert the Live subtree of `parent` mirrors its Draft subtree: same
    /// children, each live at its draft version.
    #[track_caller]
    pub fn assert_live_matches_draft(fixture: &Fixture, parent: &RecordKey) {
        let draft = fixture.children(parent, StageContext::Draft);
        let live = fixture.children(parent, StageContext::Live);
        assert_eq!(draft, live, "child sets differ for {}", parent);

        for child in &draft {
            assert_eq!(
                fixture.version(child, Stage::Draft),
                fixture.version(child, Stage::Live),
                "{} is not live at its draft version",
                child
            );
            assert_live_matches_draft(fixture, child);
        }
    }

    /// Assert `key` carries exactly one tombstone, written at `at`.
    #[track_caller]
    pub fn assert_tombstoned_at(fixture: &Fixture, key: &RecordKey, at: Timestamp) {
        let tombstones = fixture.storage.tombstones(key).expect("read tombstones");
        assert_eq!(tombstones.len(), 1, "expected one tombstone on {}", key);
        assert_eq!(tombstones[0].deleted_at, at, "wrong deletion time on {}", key);
    }

    /// Assert nothing in `key`'s current draft row hides it from the archive.
    #[track_caller]
    pub fn assert_not_tombstoned(fixture: &Fixture, key: &RecordKey) {
        let draft = fixture.draft(key);
        assert!(
            draft.deleted_at.is_none(),
            "{} still carries a tombstone on its draft",
            key
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
