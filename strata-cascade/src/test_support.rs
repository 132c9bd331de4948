//! Shared setup for unit tests: a Page/Slide/Image schema over `MockStorage`.

use crate::behavior::Cascadable;
use crate::engine::CascadeEngine;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use strata_core::{
    link_value, CascadeConfig, CascadeError, ManualClock, PublishMode, RecordFields, RecordKey,
    RecordType, Relationship, StageContext, StrataResult, Timestamp, TypeConfig, VersionNumber,
};
use strata_storage::{MockStorage, VersionedStorage};

pub(crate) fn page_schema() -> CascadeConfig {
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

struct RefusePublish;

impl Cascadable for RefusePublish {
    fn publish(
        &self,
        _storage: &dyn VersionedStorage,
        key: &RecordKey,
        _mode: PublishMode,
    ) -> StrataResult<VersionNumber> {
        Err(CascadeError::Override {
            record_type: key.record_type.clone(),
            operation: "publish".to_string(),
            reason: "refused".to_string(),
        }
        .into())
    }
}

pub(crate) struct Harness {
    pub clock: Arc<ManualClock>,
    pub storage: Arc<MockStorage>,
    pub engine: CascadeEngine,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        ));
        let storage = Arc::new(MockStorage::with_clock(clock.clone()));
        let engine = CascadeEngine::new(storage.clone(), Arc::new(page_schema()), clock.clone())
            .unwrap();
        Self {
            clock,
            storage,
            engine,
        }
    }

    pub fn with_failing_photo_publish() -> Self {
        let mut harness = Self::new();
        harness.engine = harness.engine.with_behavior("Image", Arc::new(RefusePublish));
        harness
    }

    /// Advance one minute.
    pub fn tick(&self) -> Timestamp {
        self.clock.advance(Duration::minutes(1))
    }

    fn create(&self, record_type: &str, mut fields: RecordFields) -> RecordKey {
        self.tick();
        fields.insert("revision".into(), json!(0));
        self.storage
            .create_draft(&RecordType::from(record_type), fields)
            .unwrap()
            .key()
            .unwrap()
    }

    pub fn page(&self) -> RecordKey {
        self.create("Page", RecordFields::new())
    }

    pub fn slide(&self, page: &RecordKey) -> RecordKey {
        let mut fields = RecordFields::new();
        fields.insert("page_id".into(), link_value(page.id));
        self.create("Slide", fields)
    }

    /// New image linked as the slide's photo.
    pub fn photo(&self, slide: &RecordKey) -> RecordKey {
        let image = self.create("Image", RecordFields::new());
        self.set_field(slide, "Photo", link_value(image.id));
        image
    }

    /// Write a new draft version with `revision` bumped.
    pub fn edit(&self, key: &RecordKey) {
        let next = self.revision(key, StageContext::Draft).unwrap_or(0) + 1;
        self.set_field(key, "revision", json!(next));
    }

    fn set_field(&self, key: &RecordKey, name: &str, value: serde_json::Value) {
        self.tick();
        let mut fields = self
            .storage
            .read(key, StageContext::Draft)
            .unwrap()
            .unwrap()
            .fields;
        fields.insert(name.into(), value);
        self.storage.write_draft(key, fields).unwrap();
    }

    pub fn revision(&self, key: &RecordKey, context: StageContext) -> Option<u64> {
        self.storage
            .read(key, context)
            .unwrap()
            .and_then(|row| row.field("revision").and_then(|v| v.as_u64()))
    }

    pub fn draft_children(&self, parent: &RecordKey) -> Vec<RecordKey> {
        self.engine
            .resolver()
            .child_keys(parent, StageContext::Draft)
            .unwrap()
    }

    pub fn live_children(&self, parent: &RecordKey) -> Vec<RecordKey> {
        self.engine
            .resolver()
            .child_keys(parent, StageContext::Live)
            .unwrap()
    }
}
