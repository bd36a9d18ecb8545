//! Abstract concept graph consumed by the taxonomy importer.
//!
//! The importer does not parse any serialization format itself; callers
//! build a [`ConceptGraph`] from whatever source they ingest (SKOS/RDF,
//! CSV, a remote API) and hand it over. Each concept carries a primary
//! label, alternate labels, and labeled outgoing relations to other
//! concepts by reference.

use serde::{Deserialize, Serialize};

/// Relation kinds between concepts in a source hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptRelation {
    /// The target concept has a more general meaning (parent side).
    Broader,
    /// The target concept has a more specific meaning (child side).
    Narrower,
    /// The concepts are associatively related (symmetric).
    Related,
}

impl std::fmt::Display for ConceptRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Broader => write!(f, "broader"),
            Self::Narrower => write!(f, "narrower"),
            Self::Related => write!(f, "related"),
        }
    }
}

impl std::str::FromStr for ConceptRelation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "broader" => Ok(Self::Broader),
            "narrower" => Ok(Self::Narrower),
            "related" => Ok(Self::Related),
            _ => Err(format!("Invalid concept relation: {}", s)),
        }
    }
}

/// One concept of a source hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Stable reference identifying the concept within its graph
    /// (typically the source URI). Preserved as the created tag's
    /// `original_id`.
    pub reference: String,
    /// Primary label; becomes the tag name.
    pub pref_label: String,
    /// Alternate labels; become synonyms of the tag.
    pub alt_labels: Vec<String>,
    /// Outgoing relations to other concepts, by reference.
    pub relations: Vec<(ConceptRelation, String)>,
}

impl Concept {
    /// Create a concept with the given reference and primary label.
    pub fn new(reference: impl Into<String>, pref_label: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            pref_label: pref_label.into(),
            alt_labels: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Attach an alternate label.
    pub fn alt_label(mut self, label: impl Into<String>) -> Self {
        self.alt_labels.push(label.into());
        self
    }

    /// Point at a broader (parent) concept.
    pub fn broader(mut self, reference: impl Into<String>) -> Self {
        self.relations
            .push((ConceptRelation::Broader, reference.into()));
        self
    }

    /// Point at a narrower (child) concept.
    pub fn narrower(mut self, reference: impl Into<String>) -> Self {
        self.relations
            .push((ConceptRelation::Narrower, reference.into()));
        self
    }

    /// Point at an associatively related concept.
    pub fn related(mut self, reference: impl Into<String>) -> Self {
        self.relations
            .push((ConceptRelation::Related, reference.into()));
        self
    }

    /// Whether the concept has no broader relation (root candidate).
    pub fn is_root(&self) -> bool {
        !self
            .relations
            .iter()
            .any(|(kind, _)| *kind == ConceptRelation::Broader)
    }
}

/// A source hierarchy: the full set of concepts to import into a scheme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptGraph {
    /// All concepts of the graph.
    pub concepts: Vec<Concept>,
}

impl ConceptGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a concept to the graph.
    pub fn push(&mut self, concept: Concept) {
        self.concepts.push(concept);
    }

    /// Look up a concept by its reference.
    pub fn concept_by_reference(&self, reference: &str) -> Option<&Concept> {
        self.concepts.iter().find(|c| c.reference == reference)
    }

    /// Concepts with no broader relation.
    pub fn roots(&self) -> Vec<&Concept> {
        self.concepts.iter().filter(|c| c.is_root()).collect()
    }
}

impl FromIterator<Concept> for ConceptGraph {
    fn from_iter<I: IntoIterator<Item = Concept>>(iter: I) -> Self {
        Self {
            concepts: iter.into_iter().collect(),
        }
    }
}
