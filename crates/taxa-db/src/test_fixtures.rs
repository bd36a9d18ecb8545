//! Test fixtures for database integration tests.
//!
//! Provides an in-memory, migrated, seeded database plus the abridged
//! Directgov taxonomy used by the hierarchy tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use taxa_db::test_fixtures::TestDatabase;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let test_db = TestDatabase::new().await;
//!     let db = &test_db.db;
//!     // Run your tests...
//! }
//! ```

use std::sync::Once;

use taxa_core::{Concept, ConceptGraph, CreateSchemeRequest, Result};

use crate::import::ImportSummary;
use crate::pool::create_pool;
use crate::schemes::SchemeRepository;
use crate::Database;

static INIT_LOGGING: Once = Once::new();

/// Install a test tracing subscriber honoring `RUST_LOG`, once per process.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An in-memory database, migrated and seeded with the standard schemes.
pub struct TestDatabase {
    /// The database under test.
    pub db: Database,
}

impl TestDatabase {
    /// Create a fresh in-memory database with migrations and seed schemes
    /// applied.
    pub async fn new() -> Self {
        init_test_logging();

        let pool = create_pool("sqlite::memory:")
            .await
            .expect("Failed to create test pool");
        let db = Database::new(pool);
        db.migrate().await.expect("Failed to run migrations");
        seed_schemes(&db).await.expect("Failed to seed schemes");

        Self { db }
    }

    /// Create a fresh in-memory database with migrations only (no seed
    /// schemes).
    pub async fn unseeded() -> Self {
        init_test_logging();

        let pool = create_pool("sqlite::memory:")
            .await
            .expect("Failed to create test pool");
        let db = Database::new(pool);
        db.migrate().await.expect("Failed to run migrations");

        Self { db }
    }
}

/// Seed the standard scheme set: a polyhierarchical taxonomy, a folksonomy,
/// and two curated subject lists.
pub async fn seed_schemes(db: &Database) -> Result<()> {
    db.schemes
        .create(CreateSchemeRequest {
            name: "dg_topics".to_string(),
            meta_name: Some("DC.subject".to_string()),
            meta_scheme: Some("Directgov.Topic".to_string()),
            description: Some("Directgov taxonomy concept ID taggings".to_string()),
            delimiter: Some(";".to_string()),
            polyhierarchical: true,
            restrict_to_known_tags: false,
        })
        .await?;

    db.schemes
        .create(CreateSchemeRequest {
            name: "keywords".to_string(),
            meta_name: Some("keywords".to_string()),
            meta_scheme: None,
            description: Some("Folksonomic keyword taggings".to_string()),
            delimiter: None,
            polyhierarchical: false,
            restrict_to_known_tags: false,
        })
        .await?;

    db.schemes
        .create(CreateSchemeRequest {
            name: "ipsv_subjects".to_string(),
            meta_name: Some("DC.subject".to_string()),
            meta_scheme: Some("eGMS.IPSV".to_string()),
            description: Some("IPSV tags".to_string()),
            delimiter: Some(";".to_string()),
            polyhierarchical: false,
            restrict_to_known_tags: false,
        })
        .await?;

    db.schemes
        .create(CreateSchemeRequest {
            name: "life_events".to_string(),
            meta_name: Some("DC.subject".to_string()),
            meta_scheme: Some("Directgov.LifeEvent".to_string()),
            description: Some("Life events".to_string()),
            delimiter: None,
            polyhierarchical: false,
            restrict_to_known_tags: false,
        })
        .await?;

    Ok(())
}

/// The abridged Directgov taxonomy:
///
/// ```text
/// Directgov Taxonomy
/// └── Health and care
///     ├── Travel health
///     └── NHS and health services
///         └── NHS Direct
/// ```
///
/// "Travel health" and "NHS and health services" are related; "NHS Direct"
/// carries one alternate label.
pub fn directgov_abridged() -> ConceptGraph {
    ConceptGraph::from_iter([
        Concept::new("dg:taxonomy", "Directgov Taxonomy").narrower("dg:health"),
        Concept::new("dg:health", "Health and care")
            .broader("dg:taxonomy")
            .narrower("dg:travel-health")
            .narrower("dg:nhs-services"),
        Concept::new("dg:travel-health", "Travel health")
            .broader("dg:health")
            .related("dg:nhs-services"),
        Concept::new("dg:nhs-services", "NHS and health services")
            .broader("dg:health")
            .narrower("dg:nhs-direct"),
        Concept::new("dg:nhs-direct", "NHS Direct")
            .broader("dg:nhs-services")
            .alt_label("NHS Direct helpline"),
    ])
}

/// Import the abridged Directgov taxonomy into `dg_topics`.
pub async fn import_directgov_abridged(db: &Database) -> Result<ImportSummary> {
    db.importer().import(&directgov_abridged(), "dg_topics").await
}
