//! Closure engine: materialized transitive reachability over the tag DAG.
//!
//! Direct parent→child edges (distance 1) are authoritative and
//! hand-maintained; every other row is derived. `refresh_closure` discards
//! all derived rows and recomputes the full reachability relation by
//! semi-naive composition, then inserts the reflexive zero-distance rows
//! that let "tag or descendant" queries stay a single join.
//!
//! Refresh is a batch/administrative operation, not on the request path;
//! its cost is bounded by the square of the per-scheme tag count.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};
use tracing::info;
use uuid::Uuid;

use taxa_core::{Error, Result, Tag, TagEdge};

use crate::tags::{SqliteTagRepository, TAG_COLUMNS};

/// One composition step: chain any two adjoining edges into a new
/// (ancestor, descendant) pair not yet present, keeping the shortest
/// composed distance. Pairs already represented are skipped, so repeated
/// runs never create redundant rows.
const COMPOSE_EDGES: &str = r#"
    INSERT INTO tag_edges (ancestor_tag_id, descendant_tag_id, distance)
    SELECT p1.ancestor_tag_id, p2.descendant_tag_id, MIN(p1.distance + p2.distance)
    FROM tag_edges p1
    JOIN tag_edges p2 ON p1.descendant_tag_id = p2.ancestor_tag_id
    WHERE NOT EXISTS (
        SELECT 1 FROM tag_edges e
        WHERE e.ancestor_tag_id = p1.ancestor_tag_id
          AND e.descendant_tag_id = p2.descendant_tag_id
    )
    GROUP BY p1.ancestor_tag_id, p2.descendant_tag_id
"#;

/// Reflexive self-edge for every tag that is an ancestor in a non-zero
/// edge, inserted only if absent.
const REFLEXIVE_ANCESTORS: &str = r#"
    INSERT INTO tag_edges (ancestor_tag_id, descendant_tag_id, distance)
    SELECT DISTINCT p.ancestor_tag_id, p.ancestor_tag_id, 0
    FROM tag_edges p
    WHERE p.distance <> 0
      AND NOT EXISTS (
        SELECT 1 FROM tag_edges e
        WHERE e.ancestor_tag_id = p.ancestor_tag_id
          AND e.descendant_tag_id = p.ancestor_tag_id
          AND e.distance = 0
      )
"#;

/// Reflexive self-edge for the remaining tags of polyhierarchical schemes
/// (leaves and isolated tags), so closure-aware joins cover their direct
/// assignments too.
const REFLEXIVE_POLYHIERARCHICAL: &str = r#"
    INSERT INTO tag_edges (ancestor_tag_id, descendant_tag_id, distance)
    SELECT tags.id, tags.id, 0
    FROM tags
    LEFT JOIN tag_edges ON tags.id = tag_edges.ancestor_tag_id
    WHERE tag_edges.ancestor_tag_id IS NULL
      AND tags.scheme_id IN (SELECT id FROM schemes WHERE polyhierarchical = 1)
"#;

/// Repository trait for closure-table maintenance and hierarchy reads.
#[async_trait]
pub trait TagClosureRepository: Send + Sync {
    /// Record a direct parent→child edge. Re-adding an existing edge is a
    /// no-op.
    async fn add_parentage(&self, parent_tag_id: Uuid, child_tag_id: Uuid) -> Result<()>;

    /// Remove a direct parent→child edge. Derived rows are left stale
    /// until the next `refresh_closure`.
    async fn remove_parentage(&self, parent_tag_id: Uuid, child_tag_id: Uuid) -> Result<()>;

    /// Rebuild every derived edge from the current distance-1 rows.
    /// Idempotent; returns the number of rows inserted.
    async fn refresh_closure(&self) -> Result<u64>;

    /// Direct parents of a tag (distance 1).
    async fn broader_tags(&self, tag_id: Uuid) -> Result<Vec<Tag>>;

    /// Direct children of a tag (distance 1).
    async fn narrower_tags(&self, tag_id: Uuid) -> Result<Vec<Tag>>;

    /// All closure ancestors of a tag (any non-zero distance).
    async fn ancestors_of(&self, tag_id: Uuid) -> Result<Vec<Tag>>;

    /// All closure descendants of a tag (any non-zero distance).
    async fn descendants_of(&self, tag_id: Uuid) -> Result<Vec<Tag>>;

    /// Shortest recorded non-zero distance between two tags, if the
    /// descendant is reachable from the ancestor.
    async fn distance_between(&self, ancestor_tag_id: Uuid, descendant_tag_id: Uuid)
        -> Result<Option<i64>>;

    /// The single root of a polyhierarchical scheme: an ancestor in at
    /// least one non-zero edge that is never a descendant. Fails with
    /// `NoRoot`/`MultipleRoots` when the scheme does not have exactly one.
    async fn root_tag(&self, scheme_name: &str) -> Result<Tag>;

    /// Every closure row, for inspection.
    async fn edges(&self) -> Result<Vec<TagEdge>>;
}

/// SQLite closure repository.
#[derive(Clone)]
pub struct SqliteClosureRepository {
    pool: Pool<Sqlite>,
}

impl SqliteClosureRepository {
    /// Create a new repository over the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn tags_by_edge(&self, sql: &str, tag_id: Uuid) -> Result<Vec<Tag>> {
        let rows = sqlx::query(sql)
            .bind(tag_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(SqliteTagRepository::row_to_tag).collect())
    }
}

#[async_trait]
impl TagClosureRepository for SqliteClosureRepository {
    async fn add_parentage(&self, parent_tag_id: Uuid, child_tag_id: Uuid) -> Result<()> {
        if parent_tag_id == child_tag_id {
            return Err(Error::InvalidInput(
                "Tag cannot be its own parent".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO tag_edges (ancestor_tag_id, descendant_tag_id, distance)
            VALUES (?, ?, 1)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(parent_tag_id)
        .bind(child_tag_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn remove_parentage(&self, parent_tag_id: Uuid, child_tag_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM tag_edges
            WHERE ancestor_tag_id = ? AND descendant_tag_id = ? AND distance = 1
            "#,
        )
        .bind(parent_tag_id)
        .bind(child_tag_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn refresh_closure(&self) -> Result<u64> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM tag_edges WHERE distance <> 1")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        // Semi-naive iteration: each pass composes existing edges into new
        // reachable pairs. The pair count is finite and monotonically
        // non-decreasing, so a pass inserting zero rows ends the loop.
        let mut total_inserts: u64 = 0;
        loop {
            let inserted = sqlx::query(COMPOSE_EDGES)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?
                .rows_affected();
            if inserted == 0 {
                break;
            }
            total_inserts += inserted;
        }

        total_inserts += sqlx::query(REFLEXIVE_ANCESTORS)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        total_inserts += sqlx::query(REFLEXIVE_POLYHIERARCHICAL)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "closure",
            op = "refresh_closure",
            edge_count = total_inserts,
            duration_ms = start.elapsed().as_millis() as u64,
            "Closure refreshed"
        );

        Ok(total_inserts)
    }

    async fn broader_tags(&self, tag_id: Uuid) -> Result<Vec<Tag>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {} FROM tags
            JOIN tag_edges e ON e.ancestor_tag_id = tags.id
            WHERE e.descendant_tag_id = ? AND e.distance = 1
            ORDER BY name
            "#,
            TAG_COLUMNS
        );
        self.tags_by_edge(&sql, tag_id).await
    }

    async fn narrower_tags(&self, tag_id: Uuid) -> Result<Vec<Tag>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {} FROM tags
            JOIN tag_edges e ON e.descendant_tag_id = tags.id
            WHERE e.ancestor_tag_id = ? AND e.distance = 1
            ORDER BY name
            "#,
            TAG_COLUMNS
        );
        self.tags_by_edge(&sql, tag_id).await
    }

    async fn ancestors_of(&self, tag_id: Uuid) -> Result<Vec<Tag>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {} FROM tags
            JOIN tag_edges e ON e.ancestor_tag_id = tags.id
            WHERE e.descendant_tag_id = ? AND e.distance <> 0
            ORDER BY name
            "#,
            TAG_COLUMNS
        );
        self.tags_by_edge(&sql, tag_id).await
    }

    async fn descendants_of(&self, tag_id: Uuid) -> Result<Vec<Tag>> {
        let sql = format!(
            r#"
            SELECT DISTINCT {} FROM tags
            JOIN tag_edges e ON e.descendant_tag_id = tags.id
            WHERE e.ancestor_tag_id = ? AND e.distance <> 0
            ORDER BY name
            "#,
            TAG_COLUMNS
        );
        self.tags_by_edge(&sql, tag_id).await
    }

    async fn distance_between(
        &self,
        ancestor_tag_id: Uuid,
        descendant_tag_id: Uuid,
    ) -> Result<Option<i64>> {
        let row = sqlx::query(
            r#"
            SELECT MIN(distance) AS distance FROM tag_edges
            WHERE ancestor_tag_id = ? AND descendant_tag_id = ? AND distance <> 0
            "#,
        )
        .bind(ancestor_tag_id)
        .bind(descendant_tag_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.get("distance"))
    }

    async fn root_tag(&self, scheme_name: &str) -> Result<Tag> {
        let sql = format!(
            r#"
            SELECT {} FROM tags
            WHERE scheme_id = (SELECT id FROM schemes WHERE name = ?)
              AND EXISTS (
                SELECT 1 FROM tag_edges e
                WHERE e.ancestor_tag_id = tags.id AND e.distance <> 0
              )
              AND NOT EXISTS (
                SELECT 1 FROM tag_edges e
                WHERE e.descendant_tag_id = tags.id AND e.distance <> 0
              )
            "#,
            TAG_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(scheme_name)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        match rows.len() {
            0 => Err(Error::NoRoot(scheme_name.to_string())),
            1 => Ok(SqliteTagRepository::row_to_tag(&rows[0])),
            count => Err(Error::MultipleRoots {
                scheme: scheme_name.to_string(),
                count,
            }),
        }
    }

    async fn edges(&self) -> Result<Vec<TagEdge>> {
        let rows = sqlx::query(
            "SELECT ancestor_tag_id, descendant_tag_id, distance FROM tag_edges",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| TagEdge {
                ancestor_tag_id: r.get("ancestor_tag_id"),
                descendant_tag_id: r.get("descendant_tag_id"),
                distance: r.get("distance"),
            })
            .collect())
    }
}
