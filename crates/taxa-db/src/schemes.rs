//! Scheme registry: named tag vocabularies with per-scheme policy.
//!
//! Schemes are reference data, created administratively (typically from
//! seed data) and rarely mutated. Lookup by name is the hot path, so a
//! small invalidatable cache ([`SchemeCache`]) is provided for callers
//! that resolve scheme names on every request.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use taxa_core::{
    new_v7, CreateSchemeRequest, Error, Result, Scheme, UpdateSchemeRequest, DEFAULT_DELIMITER,
};

/// Standard SELECT columns for the schemes table.
pub(crate) const SCHEME_COLUMNS: &str = "id, name, meta_name, meta_scheme, description, \
     delimiter, polyhierarchical, restrict_to_known_tags, created_at, updated_at";

/// Repository trait for scheme registry operations.
#[async_trait]
pub trait SchemeRepository: Send + Sync {
    /// Register a new scheme.
    async fn create(&self, req: CreateSchemeRequest) -> Result<Uuid>;

    /// Get a scheme by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Scheme>>;

    /// Resolve a scheme by name, failing with `SchemeNotFound` on a miss.
    async fn by_name(&self, name: &str) -> Result<Scheme>;

    /// List all registered schemes, ordered by name.
    async fn list(&self) -> Result<Vec<Scheme>>;

    /// Update a scheme's mutable attributes.
    async fn update(&self, id: Uuid, req: UpdateSchemeRequest) -> Result<()>;

    /// Delete a scheme, cascading to its tags, edges, and assignments.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// SQLite scheme repository.
#[derive(Clone)]
pub struct SqliteSchemeRepository {
    pool: Pool<Sqlite>,
}

impl SqliteSchemeRepository {
    /// Create a new repository over the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub(crate) fn row_to_scheme(row: &sqlx::sqlite::SqliteRow) -> Scheme {
        Scheme {
            id: row.get("id"),
            name: row.get("name"),
            meta_name: row.get("meta_name"),
            meta_scheme: row.get("meta_scheme"),
            description: row.get("description"),
            delimiter: row.get("delimiter"),
            polyhierarchical: row.get("polyhierarchical"),
            restrict_to_known_tags: row.get("restrict_to_known_tags"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl SchemeRepository for SqliteSchemeRepository {
    async fn create(&self, req: CreateSchemeRequest) -> Result<Uuid> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("Scheme must have a name".to_string()));
        }

        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO schemes (
                id, name, meta_name, meta_scheme, description, delimiter,
                polyhierarchical, restrict_to_known_tags, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.meta_name)
        .bind(&req.meta_scheme)
        .bind(&req.description)
        .bind(req.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER))
        .bind(req.polyhierarchical)
        .bind(req.restrict_to_known_tags)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Scheme>> {
        let query = format!("SELECT {} FROM schemes WHERE id = ?", SCHEME_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::row_to_scheme))
    }

    async fn by_name(&self, name: &str) -> Result<Scheme> {
        let query = format!("SELECT {} FROM schemes WHERE name = ?", SCHEME_COLUMNS);
        let row = sqlx::query(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref()
            .map(Self::row_to_scheme)
            .ok_or_else(|| Error::SchemeNotFound(name.to_string()))
    }

    async fn list(&self) -> Result<Vec<Scheme>> {
        let query = format!("SELECT {} FROM schemes ORDER BY name", SCHEME_COLUMNS);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::row_to_scheme).collect())
    }

    async fn update(&self, id: Uuid, req: UpdateSchemeRequest) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE schemes SET
                meta_name = COALESCE(?, meta_name),
                meta_scheme = COALESCE(?, meta_scheme),
                description = COALESCE(?, description),
                delimiter = COALESCE(?, delimiter),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&req.meta_name)
        .bind(&req.meta_scheme)
        .bind(&req.description)
        .bind(&req.delimiter)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM schemes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(())
    }
}

// =============================================================================
// SCHEME NAME CACHE
// =============================================================================

/// Default time-to-live for cached scheme lookups.
pub const DEFAULT_SCHEME_CACHE_TTL: Duration = Duration::from_secs(30);

/// An explicit, invalidatable name→scheme lookup cache with a bounded TTL.
///
/// Administrative scheme edits are rare but real; entries expire after the
/// TTL and can be dropped eagerly with [`SchemeCache::invalidate`] or
/// [`SchemeCache::clear`] after an edit.
pub struct SchemeCache {
    repo: SqliteSchemeRepository,
    ttl: Duration,
    entries: RwLock<HashMap<String, (Scheme, Instant)>>,
}

impl SchemeCache {
    /// Create a cache over the given pool with the default TTL.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self::with_ttl(pool, DEFAULT_SCHEME_CACHE_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(pool: Pool<Sqlite>, ttl: Duration) -> Self {
        Self {
            repo: SqliteSchemeRepository::new(pool),
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a scheme by name, serving from cache while fresh.
    pub async fn by_name(&self, name: &str) -> Result<Scheme> {
        {
            let entries = self.entries.read().expect("scheme cache lock");
            if let Some((scheme, cached_at)) = entries.get(name) {
                if cached_at.elapsed() < self.ttl {
                    return Ok(scheme.clone());
                }
            }
        }

        let scheme = self.repo.by_name(name).await?;

        let mut entries = self.entries.write().expect("scheme cache lock");
        entries.insert(name.to_string(), (scheme.clone(), Instant::now()));
        Ok(scheme)
    }

    /// Drop a single cached entry.
    pub fn invalidate(&self, name: &str) {
        self.entries
            .write()
            .expect("scheme cache lock")
            .remove(name);
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries.write().expect("scheme cache lock").clear();
    }
}
