//! # taxa-db
//!
//! SQLite storage layer for the taxa tagging engine.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for schemes, tags, and assignments
//! - Closure-table maintenance over the tag hierarchy
//! - Tag-list reconciliation for external taggable entities
//! - The chainable "tagged with" query compiler
//! - Closure-aware count aggregation
//! - The taxonomy importer for external concept graphs
//!
//! ## Example
//!
//! ```rust,ignore
//! use taxa_db::{Database, TaggingRepository};
//! use taxa_core::{TagList, TaggableRef};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite://taxa.db").await?;
//!     db.migrate().await?;
//!
//!     let article = TaggableRef::new("Article", taxa_core::new_v7());
//!     let list = TagList::parse("ruby, rails, css", ",");
//!     db.taggings.set_tag_list(&article, "keywords", &list).await?;
//!     Ok(())
//! }
//! ```

pub mod closure;
pub mod counts;
pub mod import;
pub mod pool;
pub mod query;
pub mod schemes;
pub mod taggable;
pub mod taggings;
pub mod tags;

// Test fixtures for integration tests
// Note: always compiled so integration tests (in tests/) can use them.
pub mod test_fixtures;

// Re-export core types
pub use taxa_core::*;

/// Escape LIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// Re-export repository implementations
pub use closure::{SqliteClosureRepository, TagClosureRepository};
pub use counts::{SqliteTagCountRepository, TagCountRepository};
pub use import::{ImportSummary, TaxonomyImporter};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use query::EntityTagQuery;
pub use schemes::{SchemeCache, SchemeRepository, SqliteSchemeRepository};
pub use taggable::TaggedEntity;
pub use taggings::{SqliteTaggingRepository, TagListDiff, TaggingRepository};
pub use tags::{SqliteTagRepository, TagRepository};

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Sqlite>,
    /// Scheme registry.
    pub schemes: SqliteSchemeRepository,
    /// Invalidatable name→scheme lookup cache.
    pub scheme_cache: SchemeCache,
    /// Tag store.
    pub tags: SqliteTagRepository,
    /// Closure engine for the tag hierarchy.
    pub closure: SqliteClosureRepository,
    /// Assignment reads and tag-list reconciliation.
    pub taggings: SqliteTaggingRepository,
    /// Count aggregation.
    pub counts: SqliteTagCountRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Sqlite>) -> Self {
        Self {
            schemes: SqliteSchemeRepository::new(pool.clone()),
            scheme_cache: SchemeCache::new(pool.clone()),
            tags: SqliteTagRepository::new(pool.clone()),
            closure: SqliteClosureRepository::new(pool.clone()),
            taggings: SqliteTaggingRepository::new(pool.clone()),
            counts: SqliteTagCountRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Build a taxonomy importer over this database.
    pub fn importer(&self) -> TaxonomyImporter {
        TaxonomyImporter::new(self.pool.clone())
    }

    /// Start a chainable tagged-with query for entities of one type.
    pub fn tagged_with_query(&self, taggable_type: impl Into<String>) -> EntityTagQuery {
        EntityTagQuery::new(taggable_type)
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        // The scheme cache is per-instance; a clone starts cold.
        Self::new(self.pool.clone())
    }
}
