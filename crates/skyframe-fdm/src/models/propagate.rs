//! Longitudinal equations of motion.
//!
//! Owns the propagated state (body velocities `u`/`w`, pitch rate, pitch
//! attitude, altitude and along-track distance) and integrates it with a
//! forward Euler step of the frame's effective `dt`. While integration is
//! suspended `dt` is zero, so accelerations are still computed and published
//! but the state does not move.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::debug::DebugLevel;
use crate::model::{FrameContext, Model, ModelBase, Step};
use crate::units::G0_FPS2;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Accelerations {
    pub udot: f64,
    pub wdot: f64,
    pub qdot: f64,
}

pub struct Propagate {
    base: ModelBase,
    u: Rc<Cell<f64>>,
    w: Rc<Cell<f64>>,
    q: Rc<Cell<f64>>,
    theta: Rc<Cell<f64>>,
    h: Rc<Cell<f64>>,
    distance: Rc<Cell<f64>>,
    udot: Rc<Cell<f64>>,
    wdot: Rc<Cell<f64>>,
    qdot: Rc<Cell<f64>>,
    hdot: Rc<Cell<f64>>,
}

impl Propagate {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let cell = || Rc::new(Cell::new(0.0));
        let mut propagate = Self {
            base: ModelBase::new("propagate", debug),
            u: cell(),
            w: cell(),
            q: cell(),
            theta: cell(),
            h: cell(),
            distance: cell(),
            udot: cell(),
            wdot: cell(),
            qdot: cell(),
            hdot: cell(),
        };
        let ties = &mut propagate.base.ties;
        ties.tie_value(props, "velocities/u-fps", &propagate.u)?;
        ties.tie_value(props, "velocities/w-fps", &propagate.w)?;
        ties.tie_value(props, "velocities/q-rad_sec", &propagate.q)?;
        ties.tie_value(props, "attitude/theta-rad", &propagate.theta)?;
        ties.tie_value(props, "position/h-sl-ft", &propagate.h)?;
        ties.tie_value(props, "position/distance-ft", &propagate.distance)?;
        for (path, c) in [
            ("accelerations/udot-ft_sec2", &propagate.udot),
            ("accelerations/wdot-ft_sec2", &propagate.wdot),
            ("accelerations/qdot-rad_sec2", &propagate.qdot),
            ("velocities/h-dot-fps", &propagate.hdot),
        ] {
            let c = Rc::clone(c);
            ties.tie_read_only(props, path, move || c.get())?;
        }
        Ok(propagate)
    }

    /// Last computed body accelerations.
    pub fn accelerations(&self) -> Accelerations {
        Accelerations {
            udot: self.udot.get(),
            wdot: self.wdot.get(),
            qdot: self.qdot.get(),
        }
    }

    fn compute(&self, props: &PropertyNode) -> Accelerations {
        let read = |path: &str| props.get_double_at(path).unwrap_or(0.0);
        let mass = read("inertia/mass-slugs");
        let iyy = read("inertia/iyy-slugs_ft2");
        if mass <= 0.0 || iyy <= 0.0 {
            return Accelerations::default();
        }
        let g = props
            .get_double_at("accelerations/gravity-ft_sec2")
            .unwrap_or(G0_FPS2);
        let (u, w, q, theta) = (self.u.get(), self.w.get(), self.q.get(), self.theta.get());
        Accelerations {
            udot: read("forces/fbx-total-lbs") / mass - q * w - g * theta.sin(),
            wdot: read("forces/fbz-total-lbs") / mass + q * u + g * theta.cos(),
            qdot: read("moments/m-total-lbsft") / iyy,
        }
    }
}

impl Model for Propagate {
    crate::model_accessors!();

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        let acc = self.compute(ctx.props);
        self.udot.set(acc.udot);
        self.wdot.set(acc.wdot);
        self.qdot.set(acc.qdot);

        let dt = ctx.dt;
        let (u, w, theta) = (self.u.get(), self.w.get(), self.theta.get());
        let hdot = u * theta.sin() - w * theta.cos();
        let xdot = u * theta.cos() + w * theta.sin();
        self.hdot.set(hdot);
        if dt > 0.0 {
            self.u.set(u + acc.udot * dt);
            self.w.set(w + acc.wdot * dt);
            self.q.set(self.q.get() + acc.qdot * dt);
            self.theta.set(theta + self.q.get() * dt);
            self.h.set(self.h.get() + hdot * dt);
            self.distance.set(self.distance.get() + xdot * dt);
        }
        Step::Computed
    }
}
