//! Closure engine tests: transitive closure maintenance over the tag DAG.
//!
//! Uses the abridged Directgov taxonomy:
//!
//! ```text
//! Directgov Taxonomy
//! └── Health and care
//!     ├── Travel health
//!     └── NHS and health services
//!         └── NHS Direct
//! ```

use std::collections::BTreeSet;

use taxa_core::{Error, Tag};
use taxa_db::test_fixtures::{import_directgov_abridged, TestDatabase};
use taxa_db::{TagClosureRepository, TagRepository};

async fn tag_named(db: &taxa_db::Database, name: &str) -> Tag {
    db.tags
        .named("dg_topics", name)
        .await
        .expect("lookup")
        .unwrap_or_else(|| panic!("tag '{}' not found", name))
}

fn names(tags: &[Tag]) -> BTreeSet<String> {
    tags.iter().map(|t| t.name.clone()).collect()
}

#[tokio::test]
async fn test_refresh_builds_transitive_closure() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");
    db.closure.refresh_closure().await.expect("refresh");

    let taxonomy = tag_named(db, "Directgov Taxonomy").await;
    let health = tag_named(db, "Health and care").await;
    let travel = tag_named(db, "Travel health").await;
    let nhs_direct = tag_named(db, "NHS Direct").await;

    assert_eq!(
        db.closure
            .distance_between(taxonomy.id, travel.id)
            .await
            .expect("distance"),
        Some(2)
    );
    assert_eq!(
        db.closure
            .distance_between(taxonomy.id, nhs_direct.id)
            .await
            .expect("distance"),
        Some(3)
    );
    assert_eq!(
        db.closure
            .distance_between(health.id, nhs_direct.id)
            .await
            .expect("distance"),
        Some(2)
    );

    // Not reachable in the child→parent direction.
    assert_eq!(
        db.closure
            .distance_between(nhs_direct.id, taxonomy.id)
            .await
            .expect("distance"),
        None
    );
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");

    db.closure.refresh_closure().await.expect("first refresh");
    let first: BTreeSet<_> = db
        .closure
        .edges()
        .await
        .expect("edges")
        .into_iter()
        .map(|e| (e.ancestor_tag_id, e.descendant_tag_id, e.distance))
        .collect();

    db.closure.refresh_closure().await.expect("second refresh");
    let second: BTreeSet<_> = db
        .closure
        .edges()
        .await
        .expect("edges")
        .into_iter()
        .map(|e| (e.ancestor_tag_id, e.descendant_tag_id, e.distance))
        .collect();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_reflexive_edges_cover_polyhierarchical_scheme() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");
    db.closure.refresh_closure().await.expect("refresh");

    let edges = db.closure.edges().await.expect("edges");

    // Every tag of the polyhierarchical scheme carries exactly one
    // reflexive row: ancestors from the first insert, leaves from the
    // second.
    for name in [
        "Directgov Taxonomy",
        "Health and care",
        "Travel health",
        "NHS and health services",
        "NHS Direct",
    ] {
        let tag = tag_named(db, name).await;
        let reflexive = edges
            .iter()
            .filter(|e| {
                e.ancestor_tag_id == tag.id && e.descendant_tag_id == tag.id && e.distance == 0
            })
            .count();
        assert_eq!(reflexive, 1, "expected one reflexive row for '{}'", name);
    }
}

#[tokio::test]
async fn test_ancestors_and_descendants() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");
    db.closure.refresh_closure().await.expect("refresh");

    let health = tag_named(db, "Health and care").await;
    let nhs_direct = tag_named(db, "NHS Direct").await;

    let descendants = db.closure.descendants_of(health.id).await.expect("descendants");
    assert_eq!(
        names(&descendants),
        BTreeSet::from([
            "Travel health".to_string(),
            "NHS and health services".to_string(),
            "NHS Direct".to_string(),
        ])
    );

    let ancestors = db.closure.ancestors_of(nhs_direct.id).await.expect("ancestors");
    assert_eq!(
        names(&ancestors),
        BTreeSet::from([
            "NHS and health services".to_string(),
            "Health and care".to_string(),
            "Directgov Taxonomy".to_string(),
        ])
    );
}

#[tokio::test]
async fn test_direct_relations() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");

    let health = tag_named(db, "Health and care").await;
    let narrower = db.closure.narrower_tags(health.id).await.expect("narrower");
    assert_eq!(
        names(&narrower),
        BTreeSet::from([
            "Travel health".to_string(),
            "NHS and health services".to_string(),
        ])
    );

    let broader = db.closure.broader_tags(health.id).await.expect("broader");
    assert_eq!(names(&broader), BTreeSet::from(["Directgov Taxonomy".to_string()]));
}

#[tokio::test]
async fn test_root_tag() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");

    let root = db.closure.root_tag("dg_topics").await.expect("root");
    assert_eq!(root.name, "Directgov Taxonomy");
}

#[tokio::test]
async fn test_root_tag_without_hierarchy_is_no_root() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let err = db.closure.root_tag("dg_topics").await.unwrap_err();
    assert!(matches!(err, Error::NoRoot(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_duplicate_parentage_is_noop() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");

    let taxonomy = tag_named(db, "Directgov Taxonomy").await;
    let health = tag_named(db, "Health and care").await;

    let before = db.closure.edges().await.expect("edges").len();
    db.closure
        .add_parentage(taxonomy.id, health.id)
        .await
        .expect("re-add");
    let after = db.closure.edges().await.expect("edges").len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_self_parentage_is_rejected() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");

    let health = tag_named(db, "Health and care").await;
    let err = db
        .closure
        .add_parentage(health.id, health.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_remove_parentage_then_refresh_drops_reachability() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");
    db.closure.refresh_closure().await.expect("refresh");

    let health = tag_named(db, "Health and care").await;
    let nhs_services = tag_named(db, "NHS and health services").await;
    let nhs_direct = tag_named(db, "NHS Direct").await;

    db.closure
        .remove_parentage(health.id, nhs_services.id)
        .await
        .expect("remove");
    db.closure.refresh_closure().await.expect("refresh");

    assert_eq!(
        db.closure
            .distance_between(health.id, nhs_direct.id)
            .await
            .expect("distance"),
        None
    );
    // The subtree below the detached node is still intact.
    assert_eq!(
        db.closure
            .distance_between(nhs_services.id, nhs_direct.id)
            .await
            .expect("distance"),
        Some(1)
    );
}
