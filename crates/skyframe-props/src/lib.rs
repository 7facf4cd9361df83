//! Skyframe Props -- hierarchical property namespace with live ties.
//!
//! Every simulated subsystem publishes its inputs and outputs as numeric
//! properties addressed by `/`-separated paths such as
//! `propulsion/engine[1]/thrust-lbs`. A property either owns its value or is
//! *tied* to a variable or accessor pair held by the subsystem that defined
//! it, in which case reads and writes go straight through to the binding.
//!
//! # Quick Start
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use skyframe_props::prelude::*;
//!
//! let manager = PropertyManager::new();
//! let root = manager.root();
//!
//! let altitude = Rc::new(Cell::new(1500.0));
//! let mut ties = TieSet::new();
//! ties.tie_value(&root, "position/h-sl-ft", &altitude).unwrap();
//!
//! assert_eq!(root.get_double_at("position/h-sl-ft"), Some(1500.0));
//! root.set_double_at("position/h-sl-ft", 2000.0).unwrap();
//! assert_eq!(altitude.get(), 2000.0);
//!
//! // Dropping the tie set removes the ties it created.
//! drop(ties);
//! assert!(!root.find("position/h-sl-ft").unwrap().is_tied());
//! ```

#![deny(unsafe_code)]

pub mod catalog;
pub mod snapshot;
pub mod tie;
pub mod tree;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by property store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyError {
    /// No node exists at the given path.
    #[error("property '{path}' does not exist")]
    NotFound { path: String },

    /// The path could not be parsed.
    #[error("invalid property path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The node already carries a tie; ties are exclusive.
    #[error("property '{path}' is already tied")]
    AlreadyTied { path: String },

    /// Untie was requested on a node with no tie.
    #[error("property '{path}' is not tied")]
    NotTied { path: String },

    /// The node is tied to a getter without a setter.
    #[error("property '{path}' is read-only")]
    ReadOnly { path: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::catalog::PropertyCatalog;
    pub use crate::snapshot::PropertySnapshot;
    pub use crate::tie::TieSet;
    pub use crate::tree::{Binding, NodeId, PropertyManager, PropertyNode, TieId};
    pub use crate::PropertyError;
}
