//! # taxa-core
//!
//! Core types, traits, and abstractions for the taxa tagging engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the storage layer (`taxa-db`) and downstream consumers depend on:
//! schemes, tags, closure edges, assignments, the delimiter-aware tag list
//! parser, and the abstract concept graph consumed by the taxonomy importer.

pub mod concept_graph;
pub mod error;
pub mod logging;
pub mod models;
pub mod tag_list;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use concept_graph::{Concept, ConceptGraph, ConceptRelation};
pub use error::{Error, Result};
pub use models::*;
pub use tag_list::TagList;
pub use uuid_utils::{extract_timestamp, new_v7};
