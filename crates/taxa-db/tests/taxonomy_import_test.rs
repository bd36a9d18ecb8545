//! Importer tests: hierarchical concept-graph ingestion.

use std::collections::BTreeSet;

use taxa_core::{Concept, ConceptGraph, Error, TagList, TagMatch, TaggableRef, new_v7};
use taxa_db::test_fixtures::{directgov_abridged, import_directgov_abridged, TestDatabase};
use taxa_db::{EntityTagQuery, TagClosureRepository, TagRepository, TaggingRepository};

#[tokio::test]
async fn test_import_creates_tags_edges_and_synonyms() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let summary = import_directgov_abridged(db).await.expect("import");
    assert_eq!(summary.tags_created, 5);
    assert_eq!(summary.synonyms_created, 1);
    assert!(summary.edges_created > 0);
    assert_eq!(summary.related_links, 1);

    // External identifiers are preserved on the created tags.
    let nhs_direct = db
        .tags
        .named("dg_topics", "NHS Direct")
        .await
        .expect("named")
        .expect("tag");
    assert_eq!(nhs_direct.original_id.as_deref(), Some("dg:nhs-direct"));

    let synonyms = db.tags.synonyms(nhs_direct.id).await.expect("synonyms");
    assert_eq!(synonyms.len(), 1);
    assert_eq!(synonyms[0].name, "NHS Direct helpline");
}

#[tokio::test]
async fn test_import_requires_polyhierarchical_scheme() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let err = db
        .importer()
        .import(&directgov_abridged(), "keywords")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_import_with_two_roots_fails_before_any_write() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let graph = ConceptGraph::from_iter([
        Concept::new("c:one", "One").narrower("c:child"),
        Concept::new("c:two", "Two"),
        Concept::new("c:child", "Child").broader("c:one"),
    ]);

    let err = db.importer().import(&graph, "dg_topics").await.unwrap_err();
    assert!(
        matches!(err, Error::MultipleRoots { count: 2, .. }),
        "got {:?}",
        err
    );

    // Nothing was created: no tags, no edges.
    assert!(db
        .tags
        .named("dg_topics", "One")
        .await
        .expect("named")
        .is_none());
    assert!(db.closure.edges().await.expect("edges").is_empty());
}

#[tokio::test]
async fn test_import_with_no_root_fails() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let graph = ConceptGraph::from_iter([
        Concept::new("c:a", "A").broader("c:b"),
        Concept::new("c:b", "B").broader("c:a"),
    ]);

    let err = db.importer().import(&graph, "dg_topics").await.unwrap_err();
    assert!(matches!(err, Error::NoRoot(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_import_dangling_reference_fails() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let graph = ConceptGraph::from_iter([
        Concept::new("c:root", "Root").narrower("c:ghost"),
        Concept::new("c:leaf", "Leaf").broader("c:root"),
    ]);

    let err = db.importer().import(&graph, "dg_topics").await.unwrap_err();
    match err {
        Error::DanglingReference(reference) => assert_eq!(reference, "c:ghost"),
        other => panic!("expected DanglingReference, got {:?}", other),
    }

    // Import is not atomic across phases: phase 1 tags persist.
    assert!(db
        .tags
        .named("dg_topics", "Root")
        .await
        .expect("named")
        .is_some());
}

#[tokio::test]
async fn test_import_callback_sees_every_created_tag() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let mut seen = Vec::new();
    db.importer()
        .import_with(&directgov_abridged(), "dg_topics", |tag, concept| {
            seen.push((tag.name.clone(), concept.reference.clone()));
        })
        .await
        .expect("import");

    assert_eq!(seen.len(), 5);
    assert!(seen.contains(&("NHS Direct".to_string(), "dg:nhs-direct".to_string())));
}

#[tokio::test]
async fn test_related_links_are_symmetric() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");

    let travel = db
        .tags
        .named("dg_topics", "Travel health")
        .await
        .expect("named")
        .expect("tag");
    let nhs_services = db
        .tags
        .named("dg_topics", "NHS and health services")
        .await
        .expect("named")
        .expect("tag");

    let from_travel: BTreeSet<String> = db
        .tags
        .related_tags(travel.id)
        .await
        .expect("related")
        .into_iter()
        .map(|t| t.name)
        .collect();
    let from_services: BTreeSet<String> = db
        .tags
        .related_tags(nhs_services.id)
        .await
        .expect("related")
        .into_iter()
        .map(|t| t.name)
        .collect();

    assert_eq!(
        from_travel,
        BTreeSet::from(["NHS and health services".to_string()])
    );
    assert_eq!(from_services, BTreeSet::from(["Travel health".to_string()]));
}

#[tokio::test]
async fn test_import_does_not_refresh_the_closure() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");

    let taxonomy = db
        .tags
        .named("dg_topics", "Directgov Taxonomy")
        .await
        .expect("named")
        .expect("tag");
    let nhs_direct = db
        .tags
        .named("dg_topics", "NHS Direct")
        .await
        .expect("named")
        .expect("tag");

    // Only direct edges exist until refresh_closure runs.
    assert_eq!(
        db.closure
            .distance_between(taxonomy.id, nhs_direct.id)
            .await
            .expect("distance"),
        None
    );
}

#[tokio::test]
async fn test_descendant_tagged_entity_found_via_closure_composition() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    import_directgov_abridged(db).await.expect("import");
    db.closure.refresh_closure().await.expect("refresh");

    let article = new_v7();
    db.taggings
        .set_tag_list(
            &TaggableRef::new("Article", article),
            "dg_topics",
            &TagList::from_names(["NHS Direct"]),
        )
        .await
        .expect("tag");

    // The direct-only join does not see the descendant-tagged entity.
    let direct = EntityTagQuery::new("Article")
        .tagged_with(
            TagList::from_names(["Health and care"]),
            "dg_topics",
            TagMatch::All,
        )
        .fetch(db.pool())
        .await
        .expect("fetch");
    assert!(direct.is_empty());

    // Closure-aware matching composes the descendant set into an Any query.
    let health = db
        .tags
        .named("dg_topics", "Health and care")
        .await
        .expect("named")
        .expect("tag");
    let mut names: Vec<String> = db
        .closure
        .descendants_of(health.id)
        .await
        .expect("descendants")
        .into_iter()
        .map(|t| t.name)
        .collect();
    names.push(health.name.clone());

    let closure_aware = EntityTagQuery::new("Article")
        .tagged_with(TagList::from_names(names), "dg_topics", TagMatch::Any)
        .fetch(db.pool())
        .await
        .expect("fetch");
    assert_eq!(closure_aware, vec![article]);
}
