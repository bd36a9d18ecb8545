//! Tag store tests: find-or-create, the lookup family, synonyms, and
//! related-tag links.

use std::collections::BTreeSet;

use taxa_core::{Error, TagList};
use taxa_db::test_fixtures::TestDatabase;
use taxa_db::{SchemeRepository, TagRepository};

async fn seed_keywords(db: &taxa_db::Database, names: &[&str]) {
    let scheme = db.schemes.by_name("keywords").await.expect("scheme");
    for name in names {
        db.tags.create(scheme.id, name, None).await.expect("create");
    }
}

fn names(tags: &[taxa_core::Tag]) -> BTreeSet<String> {
    tags.iter().map(|t| t.name.clone()).collect()
}

#[tokio::test]
async fn test_find_or_create_creates_missing_and_reuses_existing() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed_keywords(db, &["ruby"]).await;

    let tags = db
        .tags
        .find_or_create_all(&TagList::from_names(["Ruby", "rails"]), "keywords")
        .await
        .expect("find_or_create_all");

    assert_eq!(tags.len(), 2);
    // The existing row is reused; spelling of the stored tag wins.
    assert!(tags.iter().any(|t| t.name == "ruby"));
    assert!(tags.iter().any(|t| t.name == "rails"));
}

#[tokio::test]
async fn test_find_or_create_unknown_scheme_fails() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let err = db
        .tags
        .find_or_create_all(&TagList::from_names(["1", "2"]), "somescheme")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchemeNotFound(_)));
}

#[tokio::test]
async fn test_find_or_create_empty_list_is_empty() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let tags = db
        .tags
        .find_or_create_all(&TagList::new(), "keywords")
        .await
        .expect("find_or_create_all");
    assert!(tags.is_empty());
}

#[tokio::test]
async fn test_named_is_case_insensitive_exact() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed_keywords(db, &["Health and care"]).await;

    let hit = db
        .tags
        .named("keywords", "health AND CARE")
        .await
        .expect("named");
    assert!(hit.is_some());

    // Substrings are not exact matches.
    let miss = db.tags.named("keywords", "Health").await.expect("named");
    assert!(miss.is_none());
}

#[tokio::test]
async fn test_named_like_matches_substrings() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed_keywords(db, &["Health and care", "Healthcare IT", "Travel"]).await;

    let hits = db
        .tags
        .named_like("keywords", "health")
        .await
        .expect("named_like");
    assert_eq!(
        names(&hits),
        BTreeSet::from(["Health and care".to_string(), "Healthcare IT".to_string()])
    );
}

#[tokio::test]
async fn test_named_like_escapes_wildcards() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed_keywords(db, &["100% cotton", "100x cotton"]).await;

    let hits = db
        .tags
        .named_like("keywords", "100%")
        .await
        .expect("named_like");
    assert_eq!(names(&hits), BTreeSet::from(["100% cotton".to_string()]));
}

#[tokio::test]
async fn test_named_like_any() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    seed_keywords(db, &["ruby", "rails", "css", "java"]).await;

    let hits = db
        .tags
        .named_like_any(
            "keywords",
            &["rub".to_string(), "rail".to_string()],
        )
        .await
        .expect("named_like_any");
    assert_eq!(
        names(&hits),
        BTreeSet::from(["ruby".to_string(), "rails".to_string()])
    );
}

#[tokio::test]
async fn test_create_synonyms_collapses_duplicates() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let scheme = db.schemes.by_name("keywords").await.expect("scheme");
    let tag = db.tags.create(scheme.id, "tax", None).await.expect("create");

    db.tags
        .create_synonyms(
            tag.id,
            &[
                "taxation".to_string(),
                "taxation".to_string(),
                "levies".to_string(),
            ],
        )
        .await
        .expect("create_synonyms");

    let synonyms = db.tags.synonyms(tag.id).await.expect("synonyms");
    let synonym_names: BTreeSet<String> = synonyms.into_iter().map(|s| s.name).collect();
    assert_eq!(
        synonym_names,
        BTreeSet::from(["taxation".to_string(), "levies".to_string()])
    );
}

#[tokio::test]
async fn test_related_links_add_and_remove_both_directions() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let scheme = db.schemes.by_name("keywords").await.expect("scheme");
    let a = db.tags.create(scheme.id, "alpha", None).await.expect("create");
    let b = db.tags.create(scheme.id, "beta", None).await.expect("create");

    db.tags.add_related(a.id, b.id).await.expect("add_related");
    // Re-linking from the other side is a no-op, not a duplicate.
    db.tags.add_related(b.id, a.id).await.expect("re-add");

    assert_eq!(names(&db.tags.related_tags(a.id).await.expect("related")),
               BTreeSet::from(["beta".to_string()]));
    assert_eq!(names(&db.tags.related_tags(b.id).await.expect("related")),
               BTreeSet::from(["alpha".to_string()]));

    db.tags.remove_related(b.id, a.id).await.expect("remove");
    assert!(db.tags.related_tags(a.id).await.expect("related").is_empty());
    assert!(db.tags.related_tags(b.id).await.expect("related").is_empty());
}

#[tokio::test]
async fn test_self_relation_is_rejected() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let scheme = db.schemes.by_name("keywords").await.expect("scheme");
    let tag = db.tags.create(scheme.id, "loner", None).await.expect("create");

    let err = db.tags.add_related(tag.id, tag.id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_deleting_a_tag_cascades_to_synonyms() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let scheme = db.schemes.by_name("keywords").await.expect("scheme");
    let tag = db.tags.create(scheme.id, "doomed", None).await.expect("create");
    db.tags
        .create_synonyms(tag.id, &["condemned".to_string()])
        .await
        .expect("synonyms");

    db.tags.delete(tag.id).await.expect("delete");
    assert!(db.tags.get(tag.id).await.expect("get").is_none());
    assert!(db.tags.synonyms(tag.id).await.expect("synonyms").is_empty());
}

#[tokio::test]
async fn test_blank_tag_name_is_rejected() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let scheme = db.schemes.by_name("keywords").await.expect("scheme");

    let err = db.tags.create(scheme.id, "   ", None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
