//! Derived air data: true and calibrated airspeed, angle of attack, dynamic
//! pressure, Mach number, flight path angle and height above terrain.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::debug::DebugLevel;
use crate::model::{FrameContext, Model, ModelBase, Step};
use crate::units::FPS_TO_KTS;

/// Airspeeds below this are treated as zero for angle computations.
const MIN_AIRSPEED_FPS: f64 = 0.1;

pub struct Auxiliary {
    base: ModelBase,
    vt: Rc<Cell<f64>>,
    alpha: Rc<Cell<f64>>,
    qbar: Rc<Cell<f64>>,
    mach: Rc<Cell<f64>>,
    ve_kts: Rc<Cell<f64>>,
    vc_kts: Rc<Cell<f64>>,
    gamma: Rc<Cell<f64>>,
    h_agl: Rc<Cell<f64>>,
}

/// Calibrated airspeed from static pressure and Mach, subsonic, ft/s.
pub fn calibrated_airspeed(mach: f64, pressure: f64, pressure_sl: f64, density_sl: f64) -> f64 {
    if pressure <= 0.0 || pressure_sl <= 0.0 || density_sl <= 0.0 {
        return 0.0;
    }
    let impact = pressure * ((1.0 + 0.2 * mach * mach).powf(3.5) - 1.0);
    (7.0 * pressure_sl / density_sl * ((impact / pressure_sl + 1.0).powf(2.0 / 7.0) - 1.0))
        .max(0.0)
        .sqrt()
}

impl Auxiliary {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let cell = || Rc::new(Cell::new(0.0));
        let mut aux = Self {
            base: ModelBase::new("auxiliary", debug),
            vt: cell(),
            alpha: cell(),
            qbar: cell(),
            mach: cell(),
            ve_kts: cell(),
            vc_kts: cell(),
            gamma: cell(),
            h_agl: cell(),
        };
        let alpha_deg = Rc::clone(&aux.alpha);
        aux.base
            .ties
            .tie_read_only(props, "aero/alpha-deg", move || alpha_deg.get().to_degrees())?;
        for (path, c) in [
            ("velocities/vt-fps", &aux.vt),
            ("aero/alpha-rad", &aux.alpha),
            ("aero/qbar-psf", &aux.qbar),
            ("velocities/mach", &aux.mach),
            ("velocities/ve-kts", &aux.ve_kts),
            ("velocities/vc-kts", &aux.vc_kts),
            ("flight-path/gamma-rad", &aux.gamma),
            ("position/h-agl-ft", &aux.h_agl),
        ] {
            let c = Rc::clone(c);
            aux.base.ties.tie_read_only(props, path, move || c.get())?;
        }
        Ok(aux)
    }
}

impl Model for Auxiliary {
    crate::model_accessors!();

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        let read = |path: &str| ctx.props.get_double_at(path).unwrap_or(0.0);
        let (u, w, theta) = (
            read("velocities/u-fps"),
            read("velocities/w-fps"),
            read("attitude/theta-rad"),
        );
        let rho = read("atmosphere/rho-slugs_ft3");
        let sound_speed = read("atmosphere/a-fps");

        let vt = (u * u + w * w).sqrt();
        let alpha = if vt > MIN_AIRSPEED_FPS { w.atan2(u) } else { 0.0 };
        let mach = if sound_speed > 0.0 { vt / sound_speed } else { 0.0 };
        self.vt.set(vt);
        self.alpha.set(alpha);
        self.qbar.set(0.5 * rho * vt * vt);
        self.mach.set(mach);
        self.ve_kts
            .set(vt * read("atmosphere/sigma").max(0.0).sqrt() * FPS_TO_KTS);
        let vc = calibrated_airspeed(
            mach,
            read("atmosphere/P-psf"),
            read("atmosphere/P-sl-psf"),
            read("atmosphere/rho-sl-slugs_ft3"),
        );
        self.vc_kts.set(vc * FPS_TO_KTS);
        self.gamma.set(theta - alpha);
        self.h_agl.set(
            ctx.ground
                .agl_altitude(read("position/h-sl-ft"), read("position/distance-ft")),
        );
        Step::Computed
    }
}
