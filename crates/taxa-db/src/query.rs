//! The "tagged with" query compiler.
//!
//! [`EntityTagQuery`] compiles one or more tag-set conditions into a single
//! SQL statement over the assignment relation and returns matching entity
//! ids. Conditions AND-compose across calls, so
//! "tagged X in scheme A and Y in scheme B" is two `tagged_with` calls on
//! the same query. All matching is case-insensitive, scheme-scoped, and
//! operates on direct assignments only; closure-aware descendant matching
//! is built by composing with `descendants_of` or the aggregation engine.
//!
//! The core owns no entity table, so without an upstream `among` scope the
//! candidate universe is the set of entities of the type that carry at
//! least one assignment. Callers wanting true complement semantics for
//! `Exclude` pass their own id scope.

use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use taxa_core::{EntityOrder, Error, Result, TagList, TagMatch};

use crate::tags::{SqliteTagRepository, TagRepository};

/// Type-safe parameter binding for the compiled statement.
#[derive(Debug, Clone)]
enum QueryParam {
    Uuid(Uuid),
    Int(i64),
    Text(String),
}

/// One tag-set condition against one scheme.
#[derive(Debug, Clone)]
struct TagCondition {
    names: TagList,
    scheme: String,
    mode: TagMatch,
}

/// A chainable entity query over tag assignments.
#[derive(Debug, Clone)]
pub struct EntityTagQuery {
    taggable_type: String,
    conditions: Vec<TagCondition>,
    among: Option<Vec<Uuid>>,
    order: Option<EntityOrder>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl EntityTagQuery {
    /// Start a query over entities of the given type.
    pub fn new(taggable_type: impl Into<String>) -> Self {
        Self {
            taggable_type: taggable_type.into(),
            conditions: Vec::new(),
            among: None,
            order: None,
            limit: None,
            offset: None,
        }
    }

    /// Add a tag-set condition scoped to a scheme. Conditions AND-compose.
    pub fn tagged_with(
        mut self,
        names: impl Into<TagList>,
        scheme_name: impl Into<String>,
        mode: TagMatch,
    ) -> Self {
        self.conditions.push(TagCondition {
            names: names.into(),
            scheme: scheme_name.into(),
            mode,
        });
        self
    }

    /// Restrict candidates to an externally supplied entity id scope.
    pub fn among(mut self, ids: Vec<Uuid>) -> Self {
        self.among = Some(ids);
        self
    }

    /// Order results by their earliest qualifying assignment.
    pub fn order_by(mut self, order: EntityOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Cap the number of returned ids.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first n ids.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Execute the query, returning matching entity ids.
    pub async fn fetch(&self, pool: &Pool<Sqlite>) -> Result<Vec<Uuid>> {
        let tags = SqliteTagRepository::new(pool.clone());

        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<QueryParam> = Vec::new();

        for condition in &self.conditions {
            // An empty name list never narrows anything.
            if condition.names.is_empty() {
                continue;
            }

            let resolved = tags
                .named_any(&condition.scheme, condition.names.names())
                .await?;

            match condition.mode {
                TagMatch::All | TagMatch::AllOnly => {
                    // Every name must resolve within the scheme, or the
                    // result is defined as empty (no partial match).
                    if resolved.len() != condition.names.len() {
                        return Ok(Vec::new());
                    }
                    for tag in &resolved {
                        clauses.push(
                            "EXISTS (SELECT 1 FROM taggings x \
                             WHERE x.taggable_type = base.taggable_type \
                               AND x.taggable_id = base.taggable_id \
                               AND x.tag_id = ?)"
                                .to_string(),
                        );
                        params.push(QueryParam::Uuid(tag.id));
                    }
                    if condition.mode == TagMatch::AllOnly {
                        let scheme_id = resolved[0].scheme_id;
                        clauses.push(format!(
                            "(SELECT COUNT(DISTINCT x.tag_id) FROM taggings x \
                             JOIN tags xt ON xt.id = x.tag_id \
                             WHERE x.taggable_type = base.taggable_type \
                               AND x.taggable_id = base.taggable_id \
                               AND xt.scheme_id = ?) = {}",
                            resolved.len()
                        ));
                        params.push(QueryParam::Uuid(scheme_id));
                    }
                }
                TagMatch::Any => {
                    if resolved.is_empty() {
                        return Ok(Vec::new());
                    }
                    let placeholders = vec!["?"; resolved.len()].join(", ");
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM taggings x \
                         WHERE x.taggable_type = base.taggable_type \
                           AND x.taggable_id = base.taggable_id \
                           AND x.tag_id IN ({}))",
                        placeholders
                    ));
                    for tag in &resolved {
                        params.push(QueryParam::Uuid(tag.id));
                    }
                }
                TagMatch::Exclude => {
                    // Names that resolve to nothing exclude nothing.
                    if resolved.is_empty() {
                        continue;
                    }
                    let placeholders = vec!["?"; resolved.len()].join(", ");
                    clauses.push(format!(
                        "NOT EXISTS (SELECT 1 FROM taggings x \
                         WHERE x.taggable_type = base.taggable_type \
                           AND x.taggable_id = base.taggable_id \
                           AND x.tag_id IN ({}))",
                        placeholders
                    ));
                    for tag in &resolved {
                        params.push(QueryParam::Uuid(tag.id));
                    }
                }
            }
        }

        let mut sql = String::from(
            "SELECT base.taggable_id FROM taggings base WHERE base.taggable_type = ?",
        );
        let mut all_params = vec![QueryParam::Text(self.taggable_type.clone())];

        if let Some(ids) = &self.among {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND base.taggable_id IN ({})", placeholders));
            for id in ids {
                all_params.push(QueryParam::Uuid(*id));
            }
        }

        for clause in &clauses {
            sql.push_str(" AND ");
            sql.push_str(clause);
        }
        all_params.extend(params);

        sql.push_str(" GROUP BY base.taggable_id");

        match self.order {
            Some(EntityOrder::TaggedAtAsc) => sql.push_str(" ORDER BY MIN(base.created_at) ASC"),
            Some(EntityOrder::TaggedAtDesc) => sql.push_str(" ORDER BY MIN(base.created_at) DESC"),
            None => {}
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            all_params.push(QueryParam::Int(limit));
        }
        if let Some(offset) = self.offset {
            if self.limit.is_none() {
                // SQLite requires a LIMIT before OFFSET; -1 means unbounded.
                sql.push_str(" LIMIT -1");
            }
            sql.push_str(" OFFSET ?");
            all_params.push(QueryParam::Int(offset));
        }

        let mut query = sqlx::query_scalar::<_, Uuid>(&sql);
        for param in &all_params {
            query = match param {
                QueryParam::Uuid(v) => query.bind(*v),
                QueryParam::Int(v) => query.bind(*v),
                QueryParam::Text(v) => query.bind(v.clone()),
            };
        }

        query.fetch_all(pool).await.map_err(Error::Database)
    }
}
