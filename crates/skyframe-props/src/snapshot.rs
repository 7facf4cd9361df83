//! Leaf-value snapshots of a property namespace.
//!
//! A [`PropertySnapshot`] records the current value of every leaf below a
//! node, keyed by its path relative to that node, together with a blake3
//! digest of the sorted contents. Two runs that end in the same state produce
//! the same digest bit-for-bit, which makes snapshots a convenient
//! determinism check.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tree::PropertyNode;
use crate::PropertyError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    /// Leaf values keyed by relative path. `BTreeMap` keeps ordering stable.
    pub values: BTreeMap<String, f64>,
    /// Hex-encoded blake3 digest of `values`.
    pub hash: String,
}

impl PropertySnapshot {
    /// Record every leaf below `base`. Write-only triggers hold no state
    /// and are left out.
    pub fn capture(base: &PropertyNode) -> Self {
        let mut values = BTreeMap::new();
        for leaf in base.leaves() {
            if leaf == *base || !leaf.is_readable() {
                continue;
            }
            values.insert(leaf.relative_name(base), leaf.get_double());
        }
        let hash = compute_hash(&values);
        Self { values, hash }
    }

    /// Write the recorded values back below `base`.
    ///
    /// Read-only leaves are skipped. Returns the number of leaves written.
    pub fn restore(&self, base: &PropertyNode) -> Result<usize, PropertyError> {
        let mut written = 0;
        for (path, value) in &self.values {
            let node = base.get_or_create(path)?;
            match node.set_double(*value) {
                Ok(()) => written += 1,
                Err(PropertyError::ReadOnly { .. }) => {
                    tracing::trace!(path = %path, "skipping read-only property on restore");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    /// Verify the stored digest against the stored values.
    pub fn verify(&self) -> bool {
        compute_hash(&self.values) == self.hash
    }
}

fn compute_hash(values: &BTreeMap<String, f64>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (path, value) in values {
        hasher.update(path.as_bytes());
        hasher.update(&[0]);
        hasher.update(&value.to_bits().to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
