//! Tag store: identity and lookup of tags within a scheme.
//!
//! Tags are unique per (scheme, name) and matched case-insensitively during
//! lookup and creation. `find_or_create_all` implements the assignment-time
//! resolution policy: unknown names are created for open vocabularies and
//! silently dropped for schemes with `restrict_to_known_tags`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;
use uuid::Uuid;

use taxa_core::{new_v7, Error, Result, Synonym, Tag, TagList};

use crate::escape_like;
use crate::schemes::{SchemeRepository, SqliteSchemeRepository};

/// Standard SELECT columns for the tags table, qualified so joins against
/// taggings (which also has id/created_at) stay unambiguous.
pub(crate) const TAG_COLUMNS: &str =
    "tags.id, tags.scheme_id, tags.name, tags.original_id, tags.created_at";

/// Repository trait for tag store operations.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a tag in a scheme. Fails on an exact duplicate name.
    async fn create(&self, scheme_id: Uuid, name: &str, original_id: Option<&str>) -> Result<Tag>;

    /// Get a tag by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Tag>>;

    /// Case-insensitive exact-name lookup within a scheme.
    async fn named(&self, scheme_name: &str, name: &str) -> Result<Option<Tag>>;

    /// Case-insensitive exact-name lookup for several names at once.
    async fn named_any(&self, scheme_name: &str, names: &[String]) -> Result<Vec<Tag>>;

    /// Substring (wildcard) lookup within a scheme.
    async fn named_like(&self, scheme_name: &str, fragment: &str) -> Result<Vec<Tag>>;

    /// Substring lookup matching any of several fragments.
    async fn named_like_any(&self, scheme_name: &str, fragments: &[String]) -> Result<Vec<Tag>>;

    /// Resolve a list of names to tags within a scheme, creating the
    /// missing ones unless the scheme restricts to known tags (then they
    /// are silently dropped). Fails with `SchemeNotFound` when the scheme
    /// name does not resolve.
    async fn find_or_create_all(&self, names: &TagList, scheme_name: &str) -> Result<Vec<Tag>>;

    /// Delete a tag, cascading to its assignments, edges, and synonyms.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Attach synonyms to a tag, collapsing duplicates.
    async fn create_synonyms(&self, tag_id: Uuid, names: &[String]) -> Result<()>;

    /// List a tag's synonyms.
    async fn synonyms(&self, tag_id: Uuid) -> Result<Vec<Synonym>>;

    /// Create a symmetric related-tag link. Both directed rows are written
    /// in one transaction; re-linking is a no-op.
    async fn add_related(&self, tag_id: Uuid, related_tag_id: Uuid) -> Result<()>;

    /// Remove a symmetric related-tag link, both directions at once.
    async fn remove_related(&self, tag_id: Uuid, related_tag_id: Uuid) -> Result<()>;

    /// Tags related to the given tag.
    async fn related_tags(&self, tag_id: Uuid) -> Result<Vec<Tag>>;
}

/// SQLite tag repository.
#[derive(Clone)]
pub struct SqliteTagRepository {
    pool: Pool<Sqlite>,
    schemes: SqliteSchemeRepository,
}

impl SqliteTagRepository {
    /// Create a new repository over the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        let schemes = SqliteSchemeRepository::new(pool.clone());
        Self { pool, schemes }
    }

    pub(crate) fn row_to_tag(row: &sqlx::sqlite::SqliteRow) -> Tag {
        Tag {
            id: row.get("id"),
            scheme_id: row.get("scheme_id"),
            name: row.get("name"),
            original_id: row.get("original_id"),
            created_at: row.get("created_at"),
        }
    }

    /// Build a `LOWER(name) IN (…)` placeholder list for n names.
    fn lowered_placeholders(n: usize) -> String {
        vec!["LOWER(?)"; n].join(", ")
    }
}

#[async_trait]
impl TagRepository for SqliteTagRepository {
    async fn create(&self, scheme_id: Uuid, name: &str, original_id: Option<&str>) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Tag must have a name".to_string()));
        }

        let tag = Tag {
            id: new_v7(),
            scheme_id,
            name: name.to_string(),
            original_id: original_id.map(|s| s.to_string()),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO tags (id, scheme_id, name, original_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(tag.id)
        .bind(tag.scheme_id)
        .bind(&tag.name)
        .bind(&tag.original_id)
        .bind(tag.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(tag)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tag>> {
        let query = format!("SELECT {} FROM tags WHERE id = ?", TAG_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::row_to_tag))
    }

    async fn named(&self, scheme_name: &str, name: &str) -> Result<Option<Tag>> {
        let query = format!(
            r#"
            SELECT {} FROM tags
            WHERE scheme_id = (SELECT id FROM schemes WHERE name = ?)
              AND LOWER(name) = LOWER(?)
            "#,
            TAG_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(scheme_name)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::row_to_tag))
    }

    async fn named_any(&self, scheme_name: &str, names: &[String]) -> Result<Vec<Tag>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            r#"
            SELECT {} FROM tags
            WHERE scheme_id = (SELECT id FROM schemes WHERE name = ?)
              AND LOWER(name) IN ({})
            "#,
            TAG_COLUMNS,
            Self::lowered_placeholders(names.len())
        );

        let mut q = sqlx::query(&query).bind(scheme_name);
        for name in names {
            q = q.bind(name);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        Ok(rows.iter().map(Self::row_to_tag).collect())
    }

    async fn named_like(&self, scheme_name: &str, fragment: &str) -> Result<Vec<Tag>> {
        self.named_like_any(scheme_name, std::slice::from_ref(&fragment.to_string()))
            .await
    }

    async fn named_like_any(&self, scheme_name: &str, fragments: &[String]) -> Result<Vec<Tag>> {
        if fragments.is_empty() {
            return Ok(Vec::new());
        }

        // SQLite's LIKE is case-insensitive for ASCII, so no ILIKE-style
        // operator switch is needed here.
        let like_clauses = vec![r"name LIKE ? ESCAPE '\'"; fragments.len()].join(" OR ");
        let query = format!(
            r#"
            SELECT {} FROM tags
            WHERE scheme_id = (SELECT id FROM schemes WHERE name = ?)
              AND ({})
            ORDER BY name
            "#,
            TAG_COLUMNS, like_clauses
        );

        let mut q = sqlx::query(&query).bind(scheme_name);
        for fragment in fragments {
            q = q.bind(format!("%{}%", escape_like(fragment)));
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        Ok(rows.iter().map(Self::row_to_tag).collect())
    }

    async fn find_or_create_all(&self, names: &TagList, scheme_name: &str) -> Result<Vec<Tag>> {
        let scheme = self.schemes.by_name(scheme_name).await?;

        if names.is_empty() {
            return Ok(Vec::new());
        }

        let existing = self.named_any(scheme_name, names.names()).await?;

        if scheme.restrict_to_known_tags {
            debug!(
                subsystem = "db",
                component = "tag_store",
                op = "find_or_create_all",
                scheme = %scheme_name,
                requested = names.len(),
                matched = existing.len(),
                "Unknown names dropped by restricted scheme"
            );
            return Ok(existing);
        }

        let mut tags = existing;
        for name in names.iter() {
            let already_known = tags
                .iter()
                .any(|tag| tag.name.to_lowercase() == name.to_lowercase());
            if !already_known {
                let tag = self.create(scheme.id, name, None).await?;
                tags.push(tag);
            }
        }

        Ok(tags)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(())
    }

    async fn create_synonyms(&self, tag_id: Uuid, names: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO synonyms (id, tag_id, name)
                VALUES (?, ?, ?)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(new_v7())
            .bind(tag_id)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn synonyms(&self, tag_id: Uuid) -> Result<Vec<Synonym>> {
        let rows = sqlx::query("SELECT id, tag_id, name FROM synonyms WHERE tag_id = ? ORDER BY name")
            .bind(tag_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| Synonym {
                id: r.get("id"),
                tag_id: r.get("tag_id"),
                name: r.get("name"),
            })
            .collect())
    }

    async fn add_related(&self, tag_id: Uuid, related_tag_id: Uuid) -> Result<()> {
        if tag_id == related_tag_id {
            return Err(Error::InvalidInput(
                "Tag cannot be related to itself".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        for (a, b) in [(tag_id, related_tag_id), (related_tag_id, tag_id)] {
            sqlx::query(
                r#"
                INSERT INTO related_tags (tag_id, related_tag_id)
                VALUES (?, ?)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(a)
            .bind(b)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn remove_related(&self, tag_id: Uuid, related_tag_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            r#"
            DELETE FROM related_tags
            WHERE (tag_id = ? AND related_tag_id = ?)
               OR (tag_id = ? AND related_tag_id = ?)
            "#,
        )
        .bind(tag_id)
        .bind(related_tag_id)
        .bind(related_tag_id)
        .bind(tag_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn related_tags(&self, tag_id: Uuid) -> Result<Vec<Tag>> {
        let query = format!(
            r#"
            SELECT {} FROM tags
            WHERE id IN (SELECT related_tag_id FROM related_tags WHERE tag_id = ?)
            ORDER BY name
            "#,
            TAG_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(tag_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::row_to_tag).collect())
    }
}
