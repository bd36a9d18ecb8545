//! Closure-aware count aggregation.
//!
//! `tag_counts` reports per-tag frequencies over direct assignments, with
//! time bounds, frequency thresholds, ordering, and an optional upstream
//! entity scope. The `model_counts` family walks the closure table so an
//! entity tagged with a descendant counts toward the ancestor's total;
//! reachability is tested over `distance <> 0` edges with the tag's own
//! direct assignments added alongside, and totals are deduplicated by
//! (entity-type, entity-id) since an entity may reach the ancestor via
//! more than one path.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use taxa_core::{Error, Result, TagCount, TagCountOptions, TagCountOrder};

use crate::schemes::{SchemeRepository, SqliteSchemeRepository};
use crate::tags::{SqliteTagRepository, TagRepository};

/// Repository trait for count aggregation.
#[async_trait]
pub trait TagCountRepository: Send + Sync {
    /// Per-tag distinct-entity counts for one entity type and scheme,
    /// direct assignments only. Tags with no qualifying assignment are
    /// excluded.
    async fn tag_counts(
        &self,
        taggable_type: &str,
        scheme_name: &str,
        options: &TagCountOptions,
    ) -> Result<Vec<TagCount>>;

    /// Distinct entity count per taggable type for one tag, including
    /// entities tagged with any closure descendant when the tag's scheme
    /// is polyhierarchical.
    async fn model_counts(&self, tag_id: Uuid) -> Result<HashMap<String, i64>>;

    /// Total distinct (type, id) pairs tagged with the tag or any closure
    /// descendant.
    async fn all_models_total(&self, tag_id: Uuid) -> Result<i64>;

    /// Bulk `model_counts` for a list of tag names in one pass. The result
    /// is sparse: names that do not resolve, or match zero entities, are
    /// absent rather than mapped to zero.
    async fn model_counts_for(
        &self,
        scheme_name: &str,
        names: &[String],
    ) -> Result<HashMap<String, HashMap<String, i64>>>;
}

/// SQLite count repository.
#[derive(Clone)]
pub struct SqliteTagCountRepository {
    pool: Pool<Sqlite>,
    schemes: SqliteSchemeRepository,
    tags: SqliteTagRepository,
}

impl SqliteTagCountRepository {
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

    /// Assignment filter for "tag or any closure descendant", deduped by
    /// design: the direct disjunct and the closure disjunct may both hit,
    /// and distinct-counting collapses them.
    fn reachable_filter(closure_aware: bool) -> &'static str {
        if closure_aware {
            "(tg.tag_id = ? OR tg.tag_id IN (
                SELECT e.descendant_tag_id FROM tag_edges e
                WHERE e.ancestor_tag_id = ? AND e.distance <> 0
             ))"
        } else {
            "tg.tag_id = ?"
        }
    }

    /// Whether counts for this tag should walk the closure table.
    async fn is_closure_aware(&self, tag_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT s.polyhierarchical AS polyhierarchical
            FROM tags JOIN schemes s ON s.id = tags.scheme_id
            WHERE tags.id = ?
            "#,
        )
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(|r| r.get("polyhierarchical"))
            .ok_or_else(|| Error::TagNotFound(tag_id.to_string()))
    }
}

#[async_trait]
impl TagCountRepository for SqliteTagCountRepository {
    async fn tag_counts(
        &self,
        taggable_type: &str,
        scheme_name: &str,
        options: &TagCountOptions,
    ) -> Result<Vec<TagCount>> {
        // Surfaces SchemeNotFound before compiling the statement.
        self.schemes.by_name(scheme_name).await?;

        let mut conditions =
            String::from("tg.taggable_type = ? AND s.name = ?");
        if options.for_taggable.is_some() {
            conditions.push_str(" AND tg.taggable_id = ?");
        }
        if let Some(among) = &options.among {
            if among.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; among.len()].join(", ");
            conditions.push_str(&format!(" AND tg.taggable_id IN ({})", placeholders));
        }
        if options.start_at.is_some() {
            conditions.push_str(" AND tg.created_at >= ?");
        }
        if options.end_at.is_some() {
            conditions.push_str(" AND tg.created_at <= ?");
        }

        let mut having = String::from("COUNT(DISTINCT tg.taggable_id) > 0");
        if options.at_least.is_some() {
            having.push_str(" AND COUNT(DISTINCT tg.taggable_id) >= ?");
        }
        if options.at_most.is_some() {
            having.push_str(" AND COUNT(DISTINCT tg.taggable_id) <= ?");
        }

        let order = match options.order {
            Some(TagCountOrder::CountDesc) => "counts.tags_count DESC, tags.name ASC",
            Some(TagCountOrder::CountAsc) => "counts.tags_count ASC, tags.name ASC",
            Some(TagCountOrder::NameAsc) => "tags.name ASC",
            Some(TagCountOrder::NameDesc) => "tags.name DESC",
            None => "tags.name ASC",
        };

        let mut sql = format!(
            r#"
            SELECT tags.id, tags.scheme_id, tags.name, tags.original_id, tags.created_at,
                   counts.tags_count
            FROM tags
            JOIN (
                SELECT tg.tag_id, COUNT(DISTINCT tg.taggable_id) AS tags_count
                FROM taggings tg
                JOIN tags t ON t.id = tg.tag_id
                JOIN schemes s ON s.id = t.scheme_id
                WHERE {}
                GROUP BY tg.tag_id
                HAVING {}
            ) counts ON counts.tag_id = tags.id
            ORDER BY {}
            "#,
            conditions, having, order
        );
        if options.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query(&sql).bind(taggable_type).bind(scheme_name);
        if let Some(id) = options.for_taggable {
            q = q.bind(id);
        }
        if let Some(among) = &options.among {
            for id in among {
                q = q.bind(*id);
            }
        }
        if let Some(start_at) = options.start_at {
            q = q.bind(start_at);
        }
        if let Some(end_at) = options.end_at {
            q = q.bind(end_at);
        }
        if let Some(at_least) = options.at_least {
            q = q.bind(at_least);
        }
        if let Some(at_most) = options.at_most {
            q = q.bind(at_most);
        }
        if let Some(limit) = options.limit {
            q = q.bind(limit);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|row| TagCount {
                tag: SqliteTagRepository::row_to_tag(row),
                count: row.get("tags_count"),
            })
            .collect())
    }

    async fn model_counts(&self, tag_id: Uuid) -> Result<HashMap<String, i64>> {
        let closure_aware = self.is_closure_aware(tag_id).await?;
        let sql = format!(
            r#"
            SELECT tg.taggable_type, COUNT(DISTINCT tg.taggable_id) AS model_count
            FROM taggings tg
            WHERE {}
            GROUP BY tg.taggable_type
            "#,
            Self::reachable_filter(closure_aware)
        );

        let mut q = sqlx::query(&sql).bind(tag_id);
        if closure_aware {
            q = q.bind(tag_id);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("taggable_type"), r.get("model_count")))
            .collect())
    }

    async fn all_models_total(&self, tag_id: Uuid) -> Result<i64> {
        let closure_aware = self.is_closure_aware(tag_id).await?;
        let sql = format!(
            r#"
            SELECT COUNT(*) AS total FROM (
                SELECT DISTINCT tg.taggable_type, tg.taggable_id
                FROM taggings tg
                WHERE {}
            )
            "#,
            Self::reachable_filter(closure_aware)
        );

        let mut q = sqlx::query(&sql).bind(tag_id);
        if closure_aware {
            q = q.bind(tag_id);
        }

        let row = q.fetch_one(&self.pool).await.map_err(Error::Database)?;
        Ok(row.get("total"))
    }

    async fn model_counts_for(
        &self,
        scheme_name: &str,
        names: &[String],
    ) -> Result<HashMap<String, HashMap<String, i64>>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let scheme = self.schemes.by_name(scheme_name).await?;
        let resolved = self.tags.named_any(scheme_name, names).await?;
        if resolved.is_empty() {
            return Ok(HashMap::new());
        }

        let reachable = if scheme.polyhierarchical {
            "(tg.tag_id = qt.id OR tg.tag_id IN (
                SELECT e.descendant_tag_id FROM tag_edges e
                WHERE e.ancestor_tag_id = qt.id AND e.distance <> 0
             ))"
        } else {
            "tg.tag_id = qt.id"
        };

        let placeholders = vec!["?"; resolved.len()].join(", ");
        let sql = format!(
            r#"
            SELECT qt.name AS tag_name, tg.taggable_type,
                   COUNT(DISTINCT tg.taggable_id) AS model_count
            FROM tags qt
            JOIN taggings tg ON {}
            WHERE qt.id IN ({})
            GROUP BY qt.id, qt.name, tg.taggable_type
            "#,
            reachable, placeholders
        );

        let mut q = sqlx::query(&sql);
        for tag in &resolved {
            q = q.bind(tag.id);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;

        let mut result: HashMap<String, HashMap<String, i64>> = HashMap::new();
        for row in rows {
            let tag_name: String = row.get("tag_name");
            let taggable_type: String = row.get("taggable_type");
            let count: i64 = row.get("model_count");
            result
                .entry(tag_name)
                .or_default()
                .insert(taggable_type, count);
        }

        Ok(result)
    }
}
