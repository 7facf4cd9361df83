//! Atmosphere model with an interchangeable profile.
//!
//! One [`Atmosphere`] model is scheduled; the actual pressure/temperature
//! math lives behind [`AtmosphereProfile`]. Swapping between the standard
//! atmosphere and another profile is done by the executive replacing the
//! model, not by subclassing.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::debug::DebugLevel;
use crate::model::{FrameContext, Model, ModelBase, Step};
use crate::units::{GAMMA_AIR, R_AIR_ENGLISH};
use crate::ModelError;

/// Ambient conditions at one altitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphereSample {
    /// Temperature, Rankine.
    pub temperature_r: f64,
    /// Static pressure, lbs/ft^2.
    pub pressure_psf: f64,
    /// Density, slugs/ft^3.
    pub density: f64,
    /// Speed of sound, ft/s.
    pub sound_speed_fps: f64,
}

/// Pressure/temperature/density as a function of altitude.
pub trait AtmosphereProfile {
    fn name(&self) -> &str;

    /// Conditions at `h_ft` with a temperature bias of `delta_t_r` Rankine.
    fn sample(&self, h_ft: f64, delta_t_r: f64) -> AtmosphereSample;

    /// Validate or prepare the profile. Called from `init_model`.
    fn init(&mut self) -> Result<(), String> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// 1976 standard atmosphere, troposphere and lower stratosphere.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAtmosphere;

const T_SL_R: f64 = 518.67;
const P_SL_PSF: f64 = 2116.22;
const LAPSE_R_PER_FT: f64 = -0.003_566_16;
const TROPOPAUSE_FT: f64 = 36_089.24;
const STRATOSPHERE_SCALE_FT: f64 = 20_806.7;

impl AtmosphereProfile for StandardAtmosphere {
    fn name(&self) -> &str {
        "standard"
    }

    fn sample(&self, h_ft: f64, delta_t_r: f64) -> AtmosphereSample {
        let h = h_ft.max(-5000.0);
        let (t_std, pressure) = if h <= TROPOPAUSE_FT {
            let t = T_SL_R + LAPSE_R_PER_FT * h;
            let exponent = -crate::units::G0_FPS2 / (LAPSE_R_PER_FT * R_AIR_ENGLISH);
            (t, P_SL_PSF * (t / T_SL_R).powf(exponent))
        } else {
            let t11 = T_SL_R + LAPSE_R_PER_FT * TROPOPAUSE_FT;
            let exponent = -crate::units::G0_FPS2 / (LAPSE_R_PER_FT * R_AIR_ENGLISH);
            let p11 = P_SL_PSF * (t11 / T_SL_R).powf(exponent);
            (t11, p11 * (-(h - TROPOPAUSE_FT) / STRATOSPHERE_SCALE_FT).exp())
        };
        let temperature = t_std + delta_t_r;
        AtmosphereSample {
            temperature_r: temperature,
            pressure_psf: pressure,
            density: pressure / (R_AIR_ENGLISH * temperature),
            sound_speed_fps: (GAMMA_AIR * R_AIR_ENGLISH * temperature).sqrt(),
        }
    }
}

/// Thin, cold, CO2 atmosphere fit for low Martian altitudes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarsAtmosphere;

const R_MARS_ENGLISH: f64 = 1149.0;
const GAMMA_MARS: f64 = 1.29;

impl AtmosphereProfile for MarsAtmosphere {
    fn name(&self) -> &str {
        "mars"
    }

    fn sample(&self, h_ft: f64, delta_t_r: f64) -> AtmosphereSample {
        let t_f = if h_ft < 22_960.0 {
            -25.68 - 0.002_178 * h_ft
        } else {
            -10.34 - 0.001_217 * h_ft
        };
        let temperature = t_f + 459.67 + delta_t_r;
        let pressure = 14.62 * (-0.000_03 * h_ft).exp();
        AtmosphereSample {
            temperature_r: temperature,
            pressure_psf: pressure,
            density: pressure / (R_MARS_ENGLISH * temperature),
            sound_speed_fps: (GAMMA_MARS * R_MARS_ENGLISH * temperature.max(1.0)).sqrt(),
        }
    }
}

// ---------------------------------------------------------------------------
// Atmosphere model
// ---------------------------------------------------------------------------

/// Publishes `atmosphere/*` from `position/h-sl-ft`.
pub struct Atmosphere {
    base: ModelBase,
    profile: Box<dyn AtmosphereProfile>,
    altitude: PropertyNode,
    temperature: Rc<Cell<f64>>,
    pressure: Rc<Cell<f64>>,
    density: Rc<Cell<f64>>,
    sound_speed: Rc<Cell<f64>>,
    temperature_sl: Rc<Cell<f64>>,
    pressure_sl: Rc<Cell<f64>>,
    density_sl: Rc<Cell<f64>>,
    delta_t: Rc<Cell<f64>>,
}

impl Atmosphere {
    pub fn new(
        props: &PropertyNode,
        profile: Box<dyn AtmosphereProfile>,
        debug: DebugLevel,
    ) -> Result<Self, PropertyError> {
        let mut atmosphere = Self {
            base: ModelBase::new("atmosphere", debug),
            profile,
            altitude: props.get_or_create("position/h-sl-ft")?,
            temperature: Rc::new(Cell::new(0.0)),
            pressure: Rc::new(Cell::new(0.0)),
            density: Rc::new(Cell::new(0.0)),
            sound_speed: Rc::new(Cell::new(0.0)),
            temperature_sl: Rc::new(Cell::new(0.0)),
            pressure_sl: Rc::new(Cell::new(0.0)),
            density_sl: Rc::new(Cell::new(0.0)),
            delta_t: Rc::new(Cell::new(0.0)),
        };
        atmosphere.bind(props)?;
        atmosphere.update();
        Ok(atmosphere)
    }

    fn bind(&mut self, props: &PropertyNode) -> Result<(), PropertyError> {
        let ties = &mut self.base.ties;
        for (path, cell) in [
            ("atmosphere/T-R", &self.temperature),
            ("atmosphere/P-psf", &self.pressure),
            ("atmosphere/rho-slugs_ft3", &self.density),
            ("atmosphere/a-fps", &self.sound_speed),
            ("atmosphere/T-sl-R", &self.temperature_sl),
            ("atmosphere/P-sl-psf", &self.pressure_sl),
            ("atmosphere/rho-sl-slugs_ft3", &self.density_sl),
        ] {
            let c = Rc::clone(cell);
            ties.tie_read_only(props, path, move || c.get())?;
        }
        ties.tie_value(props, "atmosphere/delta-T", &self.delta_t)?;
        let (rho, rho_sl) = (Rc::clone(&self.density), Rc::clone(&self.density_sl));
        ties.tie_read_only(props, "atmosphere/sigma", move || {
            let sl = rho_sl.get();
            if sl > 0.0 {
                rho.get() / sl
            } else {
                0.0
            }
        })?;
        Ok(())
    }

    /// Re-tie `atmosphere/*` after a [`release`](Model::release).
    pub(crate) fn rebind(&mut self, props: &PropertyNode) -> Result<(), PropertyError> {
        self.bind(props)
    }

    pub fn profile_name(&self) -> &str {
        self.profile.name()
    }

    fn update(&self) {
        let bias = self.delta_t.get();
        let sl = self.profile.sample(0.0, bias);
        self.temperature_sl.set(sl.temperature_r);
        self.pressure_sl.set(sl.pressure_psf);
        self.density_sl.set(sl.density);

        let here = self.profile.sample(self.altitude.get_double(), bias);
        self.temperature.set(here.temperature_r);
        self.pressure.set(here.pressure_psf);
        self.density.set(here.density);
        self.sound_speed.set(here.sound_speed_fps);
    }

    pub fn density(&self) -> f64 {
        self.density.get()
    }

    pub fn pressure_psf(&self) -> f64 {
        self.pressure.get()
    }
}

impl Model for Atmosphere {
    crate::model_accessors!();

    fn init_model(&mut self, _props: &PropertyNode) -> Result<(), ModelError> {
        self.base.reset_counter();
        self.delta_t.set(0.0);
        self.profile.init().map_err(|reason| ModelError::Init {
            model: format!("atmosphere ({})", self.profile.name()),
            reason,
        })?;
        self.update();
        Ok(())
    }

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        self.update();
        Step::Computed
    }
}
