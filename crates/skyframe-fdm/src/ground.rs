//! Ground-contact callback: terrain elevation below the vehicle.

use crate::units::EARTH_RADIUS_FT;

/// Supplies terrain information to ground reactions.
pub trait GroundCallback {
    /// Reference radius used by the inertial model, ft.
    fn sea_level_radius(&self) -> f64;

    /// Terrain elevation above sea level at the given along-track distance, ft.
    fn terrain_elevation(&self, distance_ft: f64) -> f64;

    /// Height above the terrain of a point at `h_sl_ft`.
    fn agl_altitude(&self, h_sl_ft: f64, distance_ft: f64) -> f64 {
        h_sl_ft - self.terrain_elevation(distance_ft)
    }
}

/// Flat terrain at a constant elevation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatGround {
    radius_ft: f64,
    elevation_ft: f64,
}

impl FlatGround {
    pub const fn new(radius_ft: f64, elevation_ft: f64) -> Self {
        Self {
            radius_ft,
            elevation_ft,
        }
    }

    pub fn with_elevation(mut self, elevation_ft: f64) -> Self {
        self.elevation_ft = elevation_ft;
        self
    }
}

impl Default for FlatGround {
    fn default() -> Self {
        Self::new(EARTH_RADIUS_FT, 0.0)
    }
}

impl GroundCallback for FlatGround {
    fn sea_level_radius(&self) -> f64 {
        self.radius_ft
    }

    fn terrain_elevation(&self, _distance_ft: f64) -> f64 {
        self.elevation_ft
    }
}
