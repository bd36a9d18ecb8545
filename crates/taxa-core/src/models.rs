//! Data model for the taxa tagging engine.
//!
//! Schemes are named tag vocabularies carrying per-scheme policy; tags belong
//! to exactly one scheme; closure edges materialize the transitive
//! reachability of the tag hierarchy; taggings link tags to external
//! entities identified by a stable (type, id) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default list delimiter when a scheme does not configure one.
pub const DEFAULT_DELIMITER: &str = ",";

// =============================================================================
// SCHEMES
// =============================================================================

/// A tagging scheme: a named vocabulary in which tags exist.
///
/// Holds the per-scheme policy: whether the scheme forms a polyhierarchy,
/// whether unknown tag names may be created on assignment, what delimiter
/// its tag lists are parsed with, and which metadata labels to use when the
/// scheme is rendered by a host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheme {
    /// Row identity.
    pub id: Uuid,
    /// Unique scheme name, e.g. `dg_topics`.
    pub name: String,
    /// Source-metadata label, e.g. `DC.subject`.
    pub meta_name: Option<String>,
    /// Source-metadata scheme identifier, e.g. `eGMS.IPSV`.
    pub meta_scheme: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Delimiter used when parsing tag lists for this scheme.
    pub delimiter: String,
    /// Whether the scheme's tags form a polyhierarchical taxonomy (DAG).
    pub polyhierarchical: bool,
    /// Whether assignment may only use tags that already exist.
    pub restrict_to_known_tags: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Request to register a new scheme.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSchemeRequest {
    /// Unique scheme name.
    pub name: String,
    /// Source-metadata label.
    pub meta_name: Option<String>,
    /// Source-metadata scheme identifier.
    pub meta_scheme: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// List delimiter (defaults to `,`).
    pub delimiter: Option<String>,
    /// Polyhierarchy flag.
    pub polyhierarchical: bool,
    /// Closed-vocabulary flag.
    pub restrict_to_known_tags: bool,
}

impl CreateSchemeRequest {
    /// Convenience constructor for a flat, open-vocabulary scheme.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Request to update a scheme's mutable attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSchemeRequest {
    /// New source-metadata label, if changing.
    pub meta_name: Option<String>,
    /// New source-metadata scheme identifier, if changing.
    pub meta_scheme: Option<String>,
    /// New description, if changing.
    pub description: Option<String>,
    /// New list delimiter, if changing.
    pub delimiter: Option<String>,
}

// =============================================================================
// TAGS
// =============================================================================

/// A controlled-vocabulary tag within a scheme.
///
/// Identity is the (name, scheme) pair: unique and case-sensitive at the
/// identity level, matched case-insensitively during lookup and creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Row identity.
    pub id: Uuid,
    /// Owning scheme.
    pub scheme_id: Uuid,
    /// Tag name.
    pub name: String,
    /// External identifier preserved from an imported taxonomy.
    pub original_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A synonym attached to a tag, unique within its owning tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synonym {
    /// Row identity.
    pub id: Uuid,
    /// Owning tag.
    pub tag_id: Uuid,
    /// Synonym text.
    pub name: String,
}

/// A row of the materialized closure table.
///
/// `distance = 1` is an authoritative direct parent→child edge,
/// `distance = 0` a reflexive self-edge, `distance > 1` a derived
/// transitive edge rebuilt by `refresh_closure()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEdge {
    /// Ancestor (parent side) tag.
    pub ancestor_tag_id: Uuid,
    /// Descendant (child side) tag.
    pub descendant_tag_id: Uuid,
    /// Path length in direct edges; 0 for the reflexive self-edge.
    pub distance: i64,
}

/// A tag together with its assignment frequency, as returned by
/// `tag_counts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCount {
    /// The counted tag.
    pub tag: Tag,
    /// Number of distinct qualifying entities assigned the tag.
    pub count: i64,
}

// =============================================================================
// TAGGINGS
// =============================================================================

/// An assignment linking one tag to one tagged entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tagging {
    /// Row identity.
    pub id: Uuid,
    /// Assigned tag.
    pub tag_id: Uuid,
    /// Entity type of the tagged entity.
    pub taggable_type: String,
    /// Entity id of the tagged entity.
    pub taggable_id: Uuid,
    /// Owner type for owner-scoped assignments.
    pub tagger_type: Option<String>,
    /// Owner id for owner-scoped assignments.
    pub tagger_id: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A stable reference to an external taggable entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggableRef {
    /// Entity type, e.g. `Article`.
    pub taggable_type: String,
    /// Entity id.
    pub taggable_id: Uuid,
}

impl TaggableRef {
    /// Create a reference to an entity of the given type.
    pub fn new(taggable_type: impl Into<String>, taggable_id: Uuid) -> Self {
        Self {
            taggable_type: taggable_type.into(),
            taggable_id,
        }
    }
}

/// A stable reference to an assignment owner (the "tagger").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggerRef {
    /// Owner type, e.g. `User`.
    pub tagger_type: String,
    /// Owner id.
    pub tagger_id: Uuid,
}

impl TaggerRef {
    /// Create a reference to an owner of the given type.
    pub fn new(tagger_type: impl Into<String>, tagger_id: Uuid) -> Self {
        Self {
            tagger_type: tagger_type.into(),
            tagger_id,
        }
    }
}

// =============================================================================
// QUERY OPTIONS
// =============================================================================

/// Tag-set matching mode for `tagged_with` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMatch {
    /// Entity must be linked to every named tag (default). An unresolved
    /// name makes the result empty.
    #[default]
    All,
    /// Entity must be linked to at least one of the named tags.
    Any,
    /// Entity must be linked to none of the named tags.
    Exclude,
    /// Entity's assignment set within the scheme must equal exactly the
    /// named tag set.
    AllOnly,
}

/// Result ordering for entity queries.
///
/// Entities are ordered by the timestamp of their earliest qualifying
/// assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOrder {
    /// Oldest first.
    TaggedAtAsc,
    /// Newest first.
    TaggedAtDesc,
}

/// Result ordering for `tag_counts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCountOrder {
    /// Most frequent first.
    CountDesc,
    /// Least frequent first.
    CountAsc,
    /// Tag name, ascending.
    NameAsc,
    /// Tag name, descending.
    NameDesc,
}

/// Options for `tag_counts` aggregation.
#[derive(Debug, Clone, Default)]
pub struct TagCountOptions {
    /// Only count assignments created at or after this instant.
    pub start_at: Option<DateTime<Utc>>,
    /// Only count assignments created at or before this instant.
    pub end_at: Option<DateTime<Utc>>,
    /// Exclude tags with a frequency below this value.
    pub at_least: Option<i64>,
    /// Exclude tags with a frequency above this value.
    pub at_most: Option<i64>,
    /// Result ordering.
    pub order: Option<TagCountOrder>,
    /// Maximum number of tags returned.
    pub limit: Option<i64>,
    /// Narrow the count to a single entity's assignments.
    pub for_taggable: Option<Uuid>,
    /// Narrow the count to entities already matched by an upstream filter.
    pub among: Option<Vec<Uuid>>,
}
