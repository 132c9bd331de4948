//! Scenario Tests for Cascading Publish, Unpublish and Rollback
//!
//! Each test walks a Page/Slide/Image tree through one documented lifecycle
//! story against `MockStorage` and a manual clock.

use chrono::Duration;
use strata_cascade::LifecycleHooks;
use strata_test_utils::assertions::{assert_live_matches_draft, assert_tombstoned_at};
use strata_test_utils::fixtures::Fixture;
use strata_test_utils::{
    init_test_tracing, PublishMode, PublishSource, RecordKey, RollbackTarget, Stage, StageContext,
    VersionedStorage,
};

/// Page with two published slides.
fn published_page() -> (Fixture, RecordKey, RecordKey, RecordKey) {
    init_test_tracing();
    let fixture = Fixture::new();
    let page = fixture.page("home");
    let a = fixture.slide(&page, "A");
    let b = fixture.slide(&page, "B");
    fixture.tick();
    fixture.engine.publish(&page).expect("publish");
    (fixture, page, a, b)
}

// ============================================================================
// PUBLISH
// ============================================================================

#[test]
fn test_first_publish_puts_children_live() {
    let (fixture, page, a, b) = published_page();

    assert_eq!(fixture.children(&page, StageContext::Live), vec![a.clone(), b.clone()]);
    assert_eq!(fixture.version(&a, Stage::Live), Some(1));
    assert_eq!(fixture.version(&b, Stage::Live), Some(1));
    assert_live_matches_draft(&fixture, &page);
    assert!(!fixture.engine.is_modified(&page).unwrap());
}

#[test]
fn test_deleted_child_is_tombstoned_and_hidden_from_later_archive() {
    let (fixture, page, a, b) = published_page();

    fixture.remove_from_draft(&b);
    assert!(fixture.engine.is_modified(&page).unwrap());

    let published_at = fixture.tick();
    let report = fixture.engine.publish(&page).unwrap();

    assert_eq!(report.removed, vec![b.clone()]);
    assert_eq!(fixture.children(&page, StageContext::Live), vec![a.clone()]);
    assert_tombstoned_at(&fixture, &b, published_at);

    let before = StageContext::Archive(published_at - Duration::seconds(1));
    let after = StageContext::Archive(published_at);
    assert_eq!(fixture.children(&page, before), vec![a.clone(), b]);
    assert_eq!(fixture.children(&page, after), vec![a]);
    assert!(!fixture.engine.is_modified(&page).unwrap());
}

#[test]
fn test_child_edited_then_deleted_stays_out_of_archive_and_rollback() {
    let (fixture, page, a, b) = published_page();
    fixture.set_title(&b, "B, revised");
    fixture.remove_from_draft(&b);

    let published_at = fixture.tick();
    let report = fixture.engine.publish(&page).unwrap();
    assert_eq!(report.removed, vec![b.clone()]);
    assert_tombstoned_at(&fixture, &b, published_at);

    let later = StageContext::Archive(published_at + Duration::hours(1));
    assert_eq!(fixture.children(&page, StageContext::Archive(published_at)), vec![a.clone()]);
    assert_eq!(fixture.children(&page, later), vec![a.clone()]);
    assert!(fixture.read(&b, later).is_none());

    let live = fixture.version(&page, Stage::Live).unwrap();
    fixture.tick();
    let report = fixture.engine.rollback(&page, RollbackTarget::Version(live)).unwrap();

    assert_eq!(report.restored, vec![a.clone()]);
    assert_eq!(fixture.children(&page, StageContext::Draft), vec![a]);
    assert!(fixture.read(&b, StageContext::Draft).is_none());
    assert_tombstoned_at(&fixture, &b, published_at);
}

#[test]
fn test_child_edit_forces_new_parent_version() {
    let (fixture, page, a, _) = published_page();
    fixture.set_title(&a, "A, revised");
    assert_eq!(fixture.version(&a, Stage::Draft), Some(2));

    let record = fixture.draft(&page);
    let mode = fixture
        .engine
        .before_publish(&record, PublishSource::Stage(Stage::Draft), Stage::Live)
        .unwrap();
    assert_eq!(mode, PublishMode::NewVersion);

    fixture.tick();
    let report = fixture.engine.publish(&page).unwrap();
    assert!(report.forced_new_version);
    assert_eq!(report.version, 2);
    assert_eq!(fixture.version(&page, Stage::Draft), Some(2));
    assert_eq!(fixture.version(&page, Stage::Live), Some(2));
    assert_eq!(fixture.version(&a, Stage::Live), Some(2));
    assert_eq!(
        fixture.title(&a, StageContext::Live).as_deref(),
        Some("A, revised")
    );
    assert!(!fixture.engine.is_modified(&page).unwrap());
}

#[test]
fn test_republish_without_changes_is_a_no_op() {
    let (fixture, page, a, b) = published_page();
    let live_before = fixture.read(&page, StageContext::Live);

    fixture.tick();
    let report = fixture.engine.publish(&page).unwrap();

    assert!(!report.forced_new_version);
    assert!(report.removed.is_empty());
    assert_eq!(report.published, vec![a.clone(), b.clone()]);
    assert_eq!(fixture.read(&page, StageContext::Live), live_before);
    assert_eq!(fixture.version(&a, Stage::Live), Some(1));
}

#[test]
fn test_nested_photo_follows_its_slide() {
    init_test_tracing();
    let fixture = Fixture::new();
    let page = fixture.page("home");
    let slide = fixture.slide(&page, "cover");
    let first = fixture.image("first");
    fixture.set_photo(&slide, Some(&first));
    fixture.tick();
    fixture.engine.publish(&page).unwrap();
    assert!(fixture.read(&first, StageContext::Live).is_some());

    let second = fixture.image("second");
    fixture.set_photo(&slide, Some(&second));
    assert!(fixture.engine.is_modified(&page).unwrap());

    let published_at = fixture.tick();
    let report = fixture.engine.publish(&page).unwrap();
    assert_eq!(report.removed, vec![first.clone()]);
    assert_tombstoned_at(&fixture, &first, published_at);
    assert_live_matches_draft(&fixture, &page);
}

#[test]
fn test_host_driven_publish_retires_replaced_banner() {
    init_test_tracing();
    let fixture = Fixture::new();
    let page = fixture.page("home");
    let old = fixture.image("old");
    fixture.set_banner(&page, Some(&old));
    fixture.tick();
    fixture.engine.publish(&page).unwrap();

    let new = fixture.image("new");
    fixture.set_banner(&page, Some(&new));

    let published_at = fixture.tick();
    let record = fixture.draft(&page);
    let mode = fixture
        .engine
        .before_publish(&record, PublishSource::Stage(Stage::Draft), Stage::Live)
        .unwrap();
    let previous = fixture.read(&page, StageContext::Live);
    fixture.storage.publish(&page, mode).unwrap();
    let report = fixture
        .engine
        .after_publish(&record, previous.as_ref(), mode)
        .unwrap();

    assert_eq!(report.published, vec![new.clone()]);
    assert_eq!(report.removed, vec![old.clone()]);
    assert!(fixture.read(&old, StageContext::Live).is_none());
    assert_tombstoned_at(&fixture, &old, published_at);
    assert_eq!(fixture.children(&page, StageContext::Live), vec![new]);
    assert_live_matches_draft(&fixture, &page);
}

// ============================================================================
// UNPUBLISH
// ============================================================================

#[test]
fn test_unpublish_takes_whole_tree_off_live() {
    let (fixture, page, a, b) = published_page();
    let banner = fixture.image("banner");
    fixture.set_banner(&page, Some(&banner));
    fixture.tick();
    fixture.engine.publish(&page).unwrap();

    let at = fixture.tick();
    let report = fixture.engine.unpublish(&page).unwrap();

    assert_eq!(report.removed, vec![a.clone(), b.clone(), banner.clone()]);
    assert!(fixture.read(&page, StageContext::Live).is_none());
    assert!(fixture.children(&page, StageContext::Live).is_empty());
    assert_eq!(fixture.children(&page, StageContext::Draft), vec![a.clone(), b, banner]);
    assert_tombstoned_at(&fixture, &a, at);
    assert!(fixture.storage.tombstones(&page).unwrap().is_empty());
}

// ============================================================================
// ROLLBACK
// ============================================================================

#[test]
fn test_rollback_restores_child_set_of_older_version() {
    init_test_tracing();
    let fixture = Fixture::new();
    let page = fixture.page("home");
    fixture.set_title(&page, "home v2");
    let a = fixture.slide(&page, "A");
    let b = fixture.slide(&page, "B");
    fixture.tick();
    fixture.engine.publish(&page).unwrap();
    assert_eq!(fixture.version(&page, Stage::Live), Some(2));

    fixture.remove_from_draft(&b);
    let c = fixture.slide(&page, "C");
    fixture.set_title(&a, "A, revised");
    for title in ["home v3", "home v4", "home v5"] {
        fixture.set_title(&page, title);
    }
    fixture.tick();
    fixture.engine.publish(&page).unwrap();
    assert_eq!(fixture.version(&page, Stage::Draft), Some(5));
    assert_eq!(fixture.children(&page, StageContext::Draft), vec![a.clone(), c.clone()]);

    fixture.tick();
    let report = fixture.engine.rollback(&page, RollbackTarget::Version(2)).unwrap();

    assert_eq!(report.restored, vec![a.clone(), b.clone()]);
    assert_eq!(report.removed, vec![c.clone()]);
    assert_eq!(fixture.children(&page, StageContext::Draft), vec![a.clone(), b.clone()]);
    assert!(fixture.read(&c, StageContext::Draft).is_none());
    assert!(fixture.storage.tombstones(&c).unwrap().is_empty());

    assert_eq!(fixture.title(&page, StageContext::Draft).as_deref(), Some("home v2"));
    assert_eq!(fixture.title(&a, StageContext::Draft).as_deref(), Some("A"));
    assert_eq!(fixture.title(&b, StageContext::Draft).as_deref(), Some("B"));
    assert!(fixture.draft(&b).deleted_at.is_none());
    assert!(fixture.engine.is_modified(&page).unwrap());
}

#[test]
fn test_rollback_after_republish_keeps_banner() {
    init_test_tracing();
    let fixture = Fixture::new();
    let page = fixture.page("home");
    let banner = fixture.image("banner");
    fixture.set_banner(&page, Some(&banner));
    fixture.tick();
    fixture.engine.publish(&page).unwrap();

    let unpublished_at = fixture.tick();
    fixture.engine.unpublish(&page).unwrap();
    assert_tombstoned_at(&fixture, &banner, unpublished_at);

    let republished_at = fixture.tick();
    fixture.engine.publish(&page).unwrap();
    let archived = StageContext::Archive(republished_at);
    assert_eq!(fixture.children(&page, archived), vec![banner.clone()]);
    assert!(fixture
        .children(&page, StageContext::Archive(unpublished_at))
        .is_empty());

    let live = fixture.version(&page, Stage::Live).unwrap();
    fixture.tick();
    let report = fixture.engine.rollback(&page, RollbackTarget::Version(live)).unwrap();
    assert_eq!(report.restored, vec![banner.clone()]);
    assert!(report.removed.is_empty());
    assert_eq!(fixture.children(&page, StageContext::Draft), vec![banner]);
}

#[test]
fn test_rollback_to_live_discards_draft_edits() {
    let (fixture, page, a, b) = published_page();
    fixture.set_title(&a, "scratch");
    fixture.remove_from_draft(&b);
    let extra = fixture.slide(&page, "extra");

    let report = fixture.engine.rollback(&page, RollbackTarget::Live).unwrap();

    assert_eq!(report.restored, vec![a.clone(), b.clone()]);
    assert_eq!(report.removed, vec![extra]);
    assert_eq!(fixture.title(&a, StageContext::Draft).as_deref(), Some("A"));
    assert_eq!(fixture.children(&page, StageContext::Draft), vec![a, b]);
}

#[test]
fn test_failed_rollback_leaves_draft_untouched() {
    init_test_tracing();
    let fixture = Fixture::new();
    let page = fixture.page("home");
    let a = fixture.slide(&page, "A");

    let result = fixture.engine.rollback(&page, RollbackTarget::Version(9));
    assert!(result.is_err());
    assert_eq!(fixture.storage.transaction_depth(), 0);
    assert_eq!(fixture.children(&page, StageContext::Draft), vec![a]);
    assert_eq!(fixture.version(&page, Stage::Draft), Some(1));
}
