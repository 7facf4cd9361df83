//! Concrete physics and I/O models, in schedule order.

pub mod atmosphere;
pub mod components;
pub mod fcs;
pub mod propulsion;
pub mod piston;
pub mod thruster;
pub mod mass_balance;
pub mod aerodynamics;
pub mod inertial;
pub mod ground_reactions;
pub mod external_reactions;
pub mod buoyant_forces;
pub mod aircraft;
pub mod propagate;
pub mod auxiliary;
pub mod input;
pub mod output;
