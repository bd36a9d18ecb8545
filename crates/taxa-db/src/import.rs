//! Taxonomy importer: builds a scheme's tag graph from a concept graph.
//!
//! Import runs in three phases: create one tag per concept, resolve
//! narrower/broader/related relations into direct edges and symmetric
//! links, then attach alternate labels as synonyms. The phases are not
//! atomic with respect to each other; a failure in a later phase leaves
//! the earlier phases' writes in place. The importer never runs the
//! closure engine; callers refresh the closure as a separate step.

use std::collections::HashMap;
use std::time::Instant;

use sqlx::{Pool, Sqlite};
use tracing::info;

use taxa_core::{Concept, ConceptGraph, ConceptRelation, Error, Result, Tag};

use crate::closure::{SqliteClosureRepository, TagClosureRepository};
use crate::schemes::{SchemeRepository, SqliteSchemeRepository};
use crate::tags::{SqliteTagRepository, TagRepository};

/// What an import wrote, per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Tags created in phase 1.
    pub tags_created: usize,
    /// Direct hierarchy edges recorded in phase 2.
    pub edges_created: usize,
    /// Symmetric related links recorded in phase 2.
    pub related_links: usize,
    /// Synonyms attached in phase 3.
    pub synonyms_created: usize,
}

/// Imports a hierarchical concept graph into a polyhierarchical scheme.
pub struct TaxonomyImporter {
    schemes: SqliteSchemeRepository,
    tags: SqliteTagRepository,
    closure: SqliteClosureRepository,
}

impl TaxonomyImporter {
    /// Create an importer over the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            schemes: SqliteSchemeRepository::new(pool.clone()),
            tags: SqliteTagRepository::new(pool.clone()),
            closure: SqliteClosureRepository::new(pool),
        }
    }

    /// Import a concept graph into the named scheme.
    pub async fn import(&self, graph: &ConceptGraph, scheme_name: &str) -> Result<ImportSummary> {
        self.import_with(graph, scheme_name, |_, _| {}).await
    }

    /// Import with a per-created-tag hook, invoked once per concept after
    /// its tag row exists (for preserving external identifiers or other
    /// caller-side bookkeeping).
    pub async fn import_with<F>(
        &self,
        graph: &ConceptGraph,
        scheme_name: &str,
        mut on_tag: F,
    ) -> Result<ImportSummary>
    where
        F: FnMut(&Tag, &Concept),
    {
        let start = Instant::now();
        let scheme = self.schemes.by_name(scheme_name).await?;

        if !scheme.polyhierarchical {
            return Err(Error::InvalidInput(format!(
                "Cannot import a hierarchy into non-polyhierarchical scheme '{}'",
                scheme_name
            )));
        }

        match graph.roots().len() {
            0 => return Err(Error::NoRoot(scheme_name.to_string())),
            1 => {}
            count => {
                return Err(Error::MultipleRoots {
                    scheme: scheme_name.to_string(),
                    count,
                })
            }
        }

        let mut summary = ImportSummary::default();

        // Phase 1: one tag per concept, keyed by reference for the
        // relation pass.
        let mut tags_by_reference: HashMap<&str, Tag> = HashMap::new();
        for concept in &graph.concepts {
            let tag = self
                .tags
                .create(scheme.id, &concept.pref_label, Some(&concept.reference))
                .await?;
            on_tag(&tag, concept);
            tags_by_reference.insert(concept.reference.as_str(), tag);
            summary.tags_created += 1;
        }

        // Phase 2: hierarchy edges and related links. A reference that
        // does not resolve within the graph aborts the remaining relation
        // processing.
        for concept in &graph.concepts {
            let subject = &tags_by_reference[concept.reference.as_str()];
            for (relation, target_reference) in &concept.relations {
                let target = tags_by_reference
                    .get(target_reference.as_str())
                    .ok_or_else(|| Error::DanglingReference(target_reference.clone()))?;

                match relation {
                    ConceptRelation::Broader => {
                        self.closure.add_parentage(target.id, subject.id).await?;
                        summary.edges_created += 1;
                    }
                    ConceptRelation::Narrower => {
                        self.closure.add_parentage(subject.id, target.id).await?;
                        summary.edges_created += 1;
                    }
                    ConceptRelation::Related => {
                        self.tags.add_related(subject.id, target.id).await?;
                        summary.related_links += 1;
                    }
                }
            }
        }

        // Phase 3: alternate labels become synonyms.
        for concept in &graph.concepts {
            if concept.alt_labels.is_empty() {
                continue;
            }
            let tag = &tags_by_reference[concept.reference.as_str()];
            self.tags.create_synonyms(tag.id, &concept.alt_labels).await?;
            summary.synonyms_created += concept.alt_labels.len();
        }

        info!(
            subsystem = "import",
            component = "taxonomy_importer",
            op = "import",
            scheme = %scheme_name,
            tags = summary.tags_created,
            edges = summary.edges_created,
            duration_ms = start.elapsed().as_millis() as u64,
            "Concept graph imported"
        );

        Ok(summary)
    }
}
