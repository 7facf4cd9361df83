//! Flattened list of leaf property paths.
//!
//! The catalog is a load-time snapshot of the namespace's shape: it is built
//! wholesale by walking the tree depth-first and recording every leaf. It is
//! never updated incrementally.

use crate::tree::PropertyNode;

/// Reply of [`PropertyCatalog::query`] when nothing matches.
pub const NO_MATCHES: &str = "No matches found\n";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyCatalog {
    entries: Vec<String>,
}

impl PropertyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `root` depth-first and collect every leaf path.
    ///
    /// Sibling indices are appended as `[n]` only when nonzero. When an
    /// entry begins with `strip_prefix` followed by `/`, that prefix is
    /// removed, so an executive's own properties appear relative to its
    /// instance node while foreign properties keep their absolute path.
    pub fn build(root: &PropertyNode, strip_prefix: &str) -> Self {
        let prefix = format!("{}/", strip_prefix.trim_end_matches('/'));
        let mut entries = Vec::new();
        for leaf in root.leaves() {
            if leaf == *root {
                continue;
            }
            let path = leaf.fully_qualified_name();
            let entry = match path.strip_prefix(prefix.as_str()) {
                Some(rest) if !strip_prefix.is_empty() => rest.to_string(),
                _ => path,
            };
            entries.push(entry);
        }
        Self { entries }
    }

    /// Matching entries, one per line, or [`NO_MATCHES`].
    pub fn query(&self, substring: &str) -> String {
        let mut out = String::new();
        for entry in self.entries.iter().filter(|e| e.contains(substring)) {
            out.push_str(entry);
            out.push('\n');
        }
        if out.is_empty() {
            out.push_str(NO_MATCHES);
        }
        out
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
