//! Gravity as a function of altitude.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::debug::DebugLevel;
use crate::model::{FrameContext, Model, ModelBase, Step};
use crate::units::{EARTH_RADIUS_FT, G0_FPS2};
use crate::ModelError;

pub struct Inertial {
    base: ModelBase,
    radius: Rc<Cell<f64>>,
    gravity: Rc<Cell<f64>>,
    altitude: PropertyNode,
}

impl Inertial {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let mut inertial = Self {
            base: ModelBase::new("inertial", debug),
            radius: Rc::new(Cell::new(EARTH_RADIUS_FT)),
            gravity: Rc::new(Cell::new(G0_FPS2)),
            altitude: props.get_or_create("position/h-sl-ft")?,
        };
        let r = Rc::clone(&inertial.radius);
        inertial
            .base
            .ties
            .tie_read_only(props, "inertial/sea-level-radius-ft", move || r.get())?;
        let g = Rc::clone(&inertial.gravity);
        inertial
            .base
            .ties
            .tie_read_only(props, "accelerations/gravity-ft_sec2", move || g.get())?;
        Ok(inertial)
    }

    /// Reference radius handed to the default ground callback.
    pub fn sea_level_radius(&self) -> f64 {
        self.radius.get()
    }

    pub fn gravity(&self) -> f64 {
        self.gravity.get()
    }

    fn update(&self, radius: f64) {
        self.radius.set(radius);
        let ratio = radius / (radius + self.altitude.get_double());
        self.gravity.set(G0_FPS2 * ratio * ratio);
    }
}

impl Model for Inertial {
    crate::model_accessors!();

    fn init_model(&mut self, _props: &PropertyNode) -> Result<(), ModelError> {
        self.base.reset_counter();
        self.update(self.radius.get());
        Ok(())
    }

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        self.update(ctx.ground.sea_level_radius());
        Step::Computed
    }
}
