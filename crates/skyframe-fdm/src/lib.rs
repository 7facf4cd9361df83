//! Skyframe FDM -- deterministic flight-dynamics executive.
//!
//! The [`Executive`](executive::Executive) owns an ordered schedule of physics
//! models (atmosphere, flight controls, propulsion, mass balance,
//! aerodynamics, inertial, ground and external reactions, buoyancy, aircraft
//! totals, propagation, auxiliary quantities, input and any number of output
//! sinks). Each frame it runs every scheduled model in insertion order, then
//! advances the frame counter and, unless holding, the simulation clock.
//! Models never call each other; they communicate only through the shared
//! property namespace provided by `skyframe-props`.
//!
//! # Quick Start
//!
//! ```
//! use skyframe_fdm::prelude::*;
//!
//! let mut exec = Executive::new(ExecConfig::default()).unwrap();
//! assert_eq!(exec.frame(), 0);
//! assert!(exec.run());
//! assert_eq!(exec.frame(), 1);
//!
//! // Termination is requested through the property namespace.
//! exec.set_property_value("simulation/terminate", 1.0).unwrap();
//! assert!(!exec.run());
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod debug;
pub mod executive;
pub mod ground;
pub mod ic;
pub mod model;
pub mod models;
pub mod script;
pub mod slave;
pub mod state;
pub mod trim;
pub mod units;

use skyframe_props::PropertyError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while reading configuration documents.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a well-formed document.
    #[error("could not parse '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A required child element is absent.
    #[error("element <{parent}> is missing required <{name}>")]
    MissingElement { parent: String, name: String },

    /// A required attribute is absent.
    #[error("element <{element}> is missing required attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    /// Text or attribute content that should be numeric is not.
    #[error("element <{element}> has non-numeric value '{value}'")]
    InvalidNumber { element: String, value: String },
}

/// Configuration errors. A failed load leaves the executive allocated but
/// only partially configured.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// One of the aircraft, engine or systems paths is empty.
    #[error("aircraft, engine and systems paths must all be defined before loading a model")]
    UndefinedPaths,

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The document root is not an aircraft description.
    #[error("document root <{found}> is not <fdm_config>")]
    NotAnAircraft { found: String },

    /// A top-level section tag the executive does not know how to dispatch.
    #[error("found unexpected subsystem <{tag}>")]
    UnexpectedSection { tag: String },

    /// A section failed inside its owning model.
    #[error("section <{section}> failed to load: {source}")]
    Section {
        section: String,
        #[source]
        source: Box<LoadError>,
    },

    /// A `min`/`max` pair that is not finite or is inverted.
    #[error("element <{element}> has invalid range [{min}, {max}]")]
    InvalidRange { element: String, min: f64, max: f64 },

    /// An enumerated value (engine type, output type, axis name ...) is unknown.
    #[error("unknown {kind} '{value}'")]
    UnknownType { kind: String, value: String },

    #[error(transparent)]
    Property(#[from] PropertyError),

    /// A model created during loading could not be initialized.
    #[error(transparent)]
    Init(#[from] ModelError),

    /// Rebuilding the model set before a reload failed.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// A slave section names an aircraft that is already being loaded.
    #[error("slave chain {chain} is cyclic")]
    SlaveCycle { chain: String },

    /// A slave executive could not be constructed or loaded.
    #[error("slave '{name}' failed to load: {source}")]
    Slave {
        name: String,
        #[source]
        source: Box<LoadError>,
    },
}

/// Fatal construction errors. A half-bound property tree is unsafe to
/// operate on, so callers are expected to abandon the executive.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// A model could not tie its properties.
    #[error("model '{model}' could not bind its properties: {source}")]
    Bind {
        model: String,
        #[source]
        source: PropertyError,
    },

    /// A model failed its first initialization.
    #[error("model '{model}' failed to initialize: {source}")]
    Init {
        model: String,
        #[source]
        source: ModelError,
    },

    /// State construction requires a property no model published.
    #[error("state property '{path}' was not published by any model")]
    MissingStateProperty { path: String },
}

/// Failure of [`Model::init_model`](model::Model::init_model).
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("{model}: {reason}")]
    Init { model: String, reason: String },

    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// Errors from the trim entry points.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrimError {
    #[error("illegal trimming mode {mode}")]
    InvalidMode { mode: i32 },

    #[error("trim requested on an executive with no scheduled models")]
    NotAllocated,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::Element;
    pub use crate::debug::DebugLevel;
    pub use crate::executive::{ExecConfig, Executive, SlaveStepping};
    pub use crate::ground::{FlatGround, GroundCallback};
    pub use crate::ic::InitialCondition;
    pub use crate::model::{FrameContext, LoadContext, Model, ModelBase, Step};
    pub use crate::models::atmosphere::{AtmosphereProfile, MarsAtmosphere, StandardAtmosphere};
    pub use crate::models::input::InputHandle;
    pub use crate::slave::{RelativePose, SlaveFdm};
    pub use crate::trim::{Trim, TrimMode, TrimReport};
    pub use crate::{AllocationError, ConfigError, LoadError, ModelError, TrimError};
    pub use skyframe_props::prelude::*;
}
