//! Delimiter-aware tag list parsing and formatting.
//!
//! Tag lists arrive as raw strings ("ruby; rails; css") whose delimiter is
//! configured per scheme. Parsing honors quoted substrings so a tag name may
//! contain the delimiter itself: `"'I love the ,comma,'"` is one tag.
//! Names are trimmed and deduplicated case-insensitively, preserving the
//! first spelling seen.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static DOUBLE_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]*)""#).expect("static regex"));
static SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^']*)'").expect("static regex"));

/// An ordered, case-insensitively unique list of tag names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagList {
    names: Vec<String>,
}

impl TagList {
    /// Create an empty tag list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from individual names, trimming and collapsing
    /// case-insensitive duplicates.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new();
        for name in names {
            list.add(name.into());
        }
        list
    }

    /// Parse a raw delimited string using the given delimiter.
    ///
    /// Quoted substrings (single or double quotes) become whole tag names
    /// even when they contain the delimiter.
    pub fn parse(raw: &str, delimiter: &str) -> Self {
        let mut quoted = Vec::new();
        let mut rest = raw.to_string();

        for re in [&*DOUBLE_QUOTED, &*SINGLE_QUOTED] {
            rest = re
                .replace_all(&rest, |caps: &regex::Captures<'_>| {
                    quoted.push(caps[1].to_string());
                    // Stand in a delimiter so the remainder still splits
                    // cleanly around the extracted segment.
                    delimiter.to_string()
                })
                .into_owned();
        }

        let mut list = Self::new();
        for name in quoted {
            list.add(name);
        }
        for piece in rest.split(delimiter) {
            list.add(piece.to_string());
        }
        list
    }

    /// Add a name unless a case-insensitive duplicate is already present.
    /// Empty (after trimming) names are ignored.
    pub fn add(&mut self, name: impl Into<String>) {
        let name = name.into().trim().to_string();
        if name.is_empty() || self.contains(&name) {
            return;
        }
        self.names.push(name);
    }

    /// Remove a name by case-insensitive match.
    pub fn remove(&mut self, name: &str) {
        let lowered = name.trim().to_lowercase();
        self.names.retain(|n| n.to_lowercase() != lowered);
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, name: &str) -> bool {
        let lowered = name.trim().to_lowercase();
        self.names.iter().any(|n| n.to_lowercase() == lowered)
    }

    /// The names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of names in the list.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the list holds no names.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over the names.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.names.iter()
    }

    /// Render the list back to a delimited string, quoting names that
    /// contain the delimiter.
    pub fn to_delimited_string(&self, delimiter: &str) -> String {
        self.names
            .iter()
            .map(|name| {
                if name.contains(delimiter) {
                    format!("\"{}\"", name)
                } else {
                    name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(&format!("{} ", delimiter.trim_end()))
    }
}

impl IntoIterator for TagList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}

impl From<Vec<String>> for TagList {
    fn from(names: Vec<String>) -> Self {
        Self::from_names(names)
    }
}

impl From<&[&str]> for TagList {
    fn from(names: &[&str]) -> Self {
        Self::from_names(names.iter().map(|s| s.to_string()))
    }
}
