//! Tag-list reconciliation: synchronizing an entity's live assignments.
//!
//! Given a desired list of tag names for one (entity, scheme) pair, the
//! reconciler resolves names through the tag store, diffs against the
//! currently assigned tags, and applies the minimal change set in one
//! transaction. Re-saving an unchanged list performs zero writes.
//!
//! Assignments optionally carry an owner dimension; owner-scoped
//! reconciliation never touches another owner's rows, and unowned
//! reconciliation never touches owned rows.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;
use uuid::Uuid;

use taxa_core::{
    new_v7, Error, Result, Tag, TagList, TaggableRef, TaggerRef, Tagging,
};

use crate::schemes::{SchemeRepository, SqliteSchemeRepository};
use crate::tags::{SqliteTagRepository, TagRepository, TAG_COLUMNS};

/// The change set applied by one reconciliation.
#[derive(Debug, Clone, Default)]
pub struct TagListDiff {
    /// Tags newly assigned to the entity.
    pub added: Vec<Tag>,
    /// Tags whose assignments were removed from the entity.
    pub removed: Vec<Tag>,
}

impl TagListDiff {
    /// Whether the reconciliation changed anything.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Repository trait for assignment reads and tag-list reconciliation.
#[async_trait]
pub trait TaggingRepository: Send + Sync {
    /// Unowned tags assigned to the entity within a scheme.
    async fn tags_on(&self, taggable: &TaggableRef, scheme_name: &str) -> Result<Vec<Tag>>;

    /// All tags assigned to the entity within a scheme, across every
    /// owner, each tag once.
    async fn all_tags_on(&self, taggable: &TaggableRef, scheme_name: &str) -> Result<Vec<Tag>>;

    /// Tags assigned to the entity by one owner within a scheme.
    async fn owner_tags_on(
        &self,
        taggable: &TaggableRef,
        owner: &TaggerRef,
        scheme_name: &str,
    ) -> Result<Vec<Tag>>;

    /// The entity's unowned tag list for a scheme.
    async fn tag_list(&self, taggable: &TaggableRef, scheme_name: &str) -> Result<TagList>;

    /// The entity's tag list for a scheme across every owner.
    async fn all_tags_list(&self, taggable: &TaggableRef, scheme_name: &str) -> Result<TagList>;

    /// One owner's tag list for the entity and scheme.
    async fn owner_tag_list(
        &self,
        taggable: &TaggableRef,
        owner: &TaggerRef,
        scheme_name: &str,
    ) -> Result<TagList>;

    /// Reconcile the entity's unowned assignments in a scheme against the
    /// desired list. Returns the applied diff.
    async fn set_tag_list(
        &self,
        taggable: &TaggableRef,
        scheme_name: &str,
        list: &TagList,
    ) -> Result<TagListDiff>;

    /// Reconcile one owner's assignments in a scheme against the desired
    /// list, leaving other owners' rows untouched.
    async fn set_owner_tag_list(
        &self,
        taggable: &TaggableRef,
        owner: &TaggerRef,
        scheme_name: &str,
        list: &TagList,
    ) -> Result<TagListDiff>;

    /// Every assignment row for the entity, across schemes and owners.
    async fn taggings_for(&self, taggable: &TaggableRef) -> Result<Vec<Tagging>>;

    /// Remove every assignment for the entity (host-side entity deletion).
    async fn remove_all(&self, taggable: &TaggableRef) -> Result<u64>;
}

/// SQLite tagging repository.
#[derive(Clone)]
pub struct SqliteTaggingRepository {
    pool: Pool<Sqlite>,
    schemes: SqliteSchemeRepository,
    tags: SqliteTagRepository,
}

impl SqliteTaggingRepository {
    /// Create a new repository over the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        let schemes = SqliteSchemeRepository::new(pool.clone());
        let tags = SqliteTagRepository::new(pool.clone());
        Self {
            pool,
            schemes,
            tags,
        }
    }

    /// Current tags for one (entity, scheme, owner) slice. `owner: None`
    /// selects only owner-less rows.
    async fn current_tags(
        &self,
        taggable: &TaggableRef,
        owner: Option<&TaggerRef>,
        scheme_name: &str,
    ) -> Result<Vec<Tag>> {
        let owner_clause = match owner {
            Some(_) => "tg.tagger_type = ? AND tg.tagger_id = ?",
            None => "tg.tagger_type IS NULL AND tg.tagger_id IS NULL",
        };
        let sql = format!(
            r#"
            SELECT {} FROM tags
            JOIN taggings tg ON tg.tag_id = tags.id
            JOIN schemes s ON s.id = tags.scheme_id
            WHERE tg.taggable_type = ? AND tg.taggable_id = ?
              AND s.name = ?
              AND {}
            ORDER BY tg.created_at, tags.name
            "#,
            TAG_COLUMNS, owner_clause
        );

        let mut q = sqlx::query(&sql)
            .bind(&taggable.taggable_type)
            .bind(taggable.taggable_id)
            .bind(scheme_name);
        if let Some(owner) = owner {
            q = q.bind(&owner.tagger_type).bind(owner.tagger_id);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        Ok(rows.iter().map(SqliteTagRepository::row_to_tag).collect())
    }

    /// Shared reconcile path for owned and unowned lists.
    async fn reconcile(
        &self,
        taggable: &TaggableRef,
        owner: Option<&TaggerRef>,
        scheme_name: &str,
        list: &TagList,
    ) -> Result<TagListDiff> {
        // Resolving the scheme up front also surfaces SchemeNotFound before
        // any write happens.
        self.schemes.by_name(scheme_name).await?;

        let desired = self.tags.find_or_create_all(list, scheme_name).await?;
        let current = self.current_tags(taggable, owner, scheme_name).await?;

        let removed: Vec<Tag> = current
            .iter()
            .filter(|tag| !desired.iter().any(|d| d.id == tag.id))
            .cloned()
            .collect();
        let added: Vec<Tag> = desired
            .iter()
            .filter(|tag| !current.iter().any(|c| c.id == tag.id))
            .cloned()
            .collect();

        if removed.is_empty() && added.is_empty() {
            return Ok(TagListDiff::default());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let owner_clause = match owner {
            Some(_) => "tagger_type = ? AND tagger_id = ?",
            None => "tagger_type IS NULL AND tagger_id IS NULL",
        };
        for tag in &removed {
            let sql = format!(
                r#"
                DELETE FROM taggings
                WHERE tag_id = ? AND taggable_type = ? AND taggable_id = ? AND {}
                "#,
                owner_clause
            );
            let mut q = sqlx::query(&sql)
                .bind(tag.id)
                .bind(&taggable.taggable_type)
                .bind(taggable.taggable_id);
            if let Some(owner) = owner {
                q = q.bind(&owner.tagger_type).bind(owner.tagger_id);
            }
            q.execute(&mut *tx).await.map_err(Error::Database)?;
        }

        for tag in &added {
            // The conflict path is only reachable through a concurrent
            // writer; the uniqueness constraint turns it into a no-op.
            sqlx::query(
                r#"
                INSERT INTO taggings (
                    id, tag_id, taggable_type, taggable_id,
                    tagger_type, tagger_id, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(new_v7())
            .bind(tag.id)
            .bind(&taggable.taggable_type)
            .bind(taggable.taggable_id)
            .bind(owner.map(|o| o.tagger_type.clone()))
            .bind(owner.map(|o| o.tagger_id))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "reconciler",
            op = "set_tag_list",
            scheme = %scheme_name,
            taggable_type = %taggable.taggable_type,
            added_count = added.len(),
            removed_count = removed.len(),
            "Tag list reconciled"
        );

        Ok(TagListDiff { added, removed })
    }
}

#[async_trait]
impl TaggingRepository for SqliteTaggingRepository {
    async fn tags_on(&self, taggable: &TaggableRef, scheme_name: &str) -> Result<Vec<Tag>> {
        self.current_tags(taggable, None, scheme_name).await
    }

    async fn all_tags_on(&self, taggable: &TaggableRef, scheme_name: &str) -> Result<Vec<Tag>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {} FROM tags
            JOIN taggings tg ON tg.tag_id = tags.id
            JOIN schemes s ON s.id = tags.scheme_id
            WHERE tg.taggable_type = ? AND tg.taggable_id = ?
              AND s.name = ?
            ORDER BY tags.name
            "#,
            TAG_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&taggable.taggable_type)
            .bind(taggable.taggable_id)
            .bind(scheme_name)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(SqliteTagRepository::row_to_tag).collect())
    }

    async fn owner_tags_on(
        &self,
        taggable: &TaggableRef,
        owner: &TaggerRef,
        scheme_name: &str,
    ) -> Result<Vec<Tag>> {
        self.current_tags(taggable, Some(owner), scheme_name).await
    }

    async fn tag_list(&self, taggable: &TaggableRef, scheme_name: &str) -> Result<TagList> {
        let tags = self.tags_on(taggable, scheme_name).await?;
        Ok(TagList::from_names(tags.into_iter().map(|t| t.name)))
    }

    async fn all_tags_list(&self, taggable: &TaggableRef, scheme_name: &str) -> Result<TagList> {
        let tags = self.all_tags_on(taggable, scheme_name).await?;
        Ok(TagList::from_names(tags.into_iter().map(|t| t.name)))
    }

    async fn owner_tag_list(
        &self,
        taggable: &TaggableRef,
        owner: &TaggerRef,
        scheme_name: &str,
    ) -> Result<TagList> {
        let tags = self.owner_tags_on(taggable, owner, scheme_name).await?;
        Ok(TagList::from_names(tags.into_iter().map(|t| t.name)))
    }

    async fn set_tag_list(
        &self,
        taggable: &TaggableRef,
        scheme_name: &str,
        list: &TagList,
    ) -> Result<TagListDiff> {
        self.reconcile(taggable, None, scheme_name, list).await
    }

    async fn set_owner_tag_list(
        &self,
        taggable: &TaggableRef,
        owner: &TaggerRef,
        scheme_name: &str,
        list: &TagList,
    ) -> Result<TagListDiff> {
        self.reconcile(taggable, Some(owner), scheme_name, list).await
    }

    async fn taggings_for(&self, taggable: &TaggableRef) -> Result<Vec<Tagging>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tag_id, taggable_type, taggable_id, tagger_type, tagger_id, created_at
            FROM taggings
            WHERE taggable_type = ? AND taggable_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(&taggable.taggable_type)
        .bind(taggable.taggable_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| Tagging {
                id: r.get("id"),
                tag_id: r.get("tag_id"),
                taggable_type: r.get("taggable_type"),
                taggable_id: r.get("taggable_id"),
                tagger_type: r.get("tagger_type"),
                tagger_id: r.get("tagger_id"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn remove_all(&self, taggable: &TaggableRef) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM taggings WHERE taggable_type = ? AND taggable_id = ?",
        )
        .bind(&taggable.taggable_type)
        .bind(taggable.taggable_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }
}
