//! Aircraft metrics and force/moment totals.
//!
//! Sums the body-axis contributions every force model publishes under
//! `forces/fb{x,z}-<source>-lbs` and `moments/m-<source>-lbsft` into the
//! totals read by propagation.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::Element;
use crate::debug::DebugLevel;
use crate::model::{FrameContext, LoadContext, Model, ModelBase, Step};
use crate::LoadError;

/// Force sources summed into the totals.
pub const FORCE_SOURCES: [&str; 5] = ["aero", "prop", "gear", "external", "buoyancy"];

struct Source {
    fx: PropertyNode,
    fz: PropertyNode,
    moment: PropertyNode,
}

pub struct Aircraft {
    base: ModelBase,
    name: String,
    sources: Vec<Source>,
    wing_area: Rc<Cell<f64>>,
    wing_span: Rc<Cell<f64>>,
    chord: Rc<Cell<f64>>,
    force_x: Rc<Cell<f64>>,
    force_z: Rc<Cell<f64>>,
    moment: Rc<Cell<f64>>,
}

impl Aircraft {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let mut sources = Vec::with_capacity(FORCE_SOURCES.len());
        for name in FORCE_SOURCES {
            sources.push(Source {
                fx: props.get_or_create(&format!("forces/fbx-{name}-lbs"))?,
                fz: props.get_or_create(&format!("forces/fbz-{name}-lbs"))?,
                moment: props.get_or_create(&format!("moments/m-{name}-lbsft"))?,
            });
        }
        let cell = || Rc::new(Cell::new(0.0));
        let mut aircraft = Self {
            base: ModelBase::new("aircraft", debug),
            name: String::new(),
            sources,
            wing_area: cell(),
            wing_span: cell(),
            chord: cell(),
            force_x: cell(),
            force_z: cell(),
            moment: cell(),
        };
        for (path, c) in [
            ("metrics/Sw-sqft", &aircraft.wing_area),
            ("metrics/bw-ft", &aircraft.wing_span),
            ("metrics/cbar-ft", &aircraft.chord),
            ("forces/fbx-total-lbs", &aircraft.force_x),
            ("forces/fbz-total-lbs", &aircraft.force_z),
            ("moments/m-total-lbsft", &aircraft.moment),
        ] {
            let c = Rc::clone(c);
            aircraft.base.ties.tie_read_only(props, path, move || c.get())?;
        }
        Ok(aircraft)
    }

    pub fn aircraft_name(&self) -> &str {
        &self.name
    }

    pub fn set_aircraft_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn wing_area(&self) -> f64 {
        self.wing_area.get()
    }
}

impl Model for Aircraft {
    crate::model_accessors!();

    fn load(&mut self, el: &Element, _ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        self.wing_area.set(el.number_or("wingarea", 0.0)?);
        self.wing_span.set(el.number_or("wingspan", 0.0)?);
        self.chord.set(el.number_or("chord", 0.0)?);
        Ok(())
    }

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        let (mut fx, mut fz, mut my) = (0.0, 0.0, 0.0);
        for s in &self.sources {
            fx += s.fx.get_double();
            fz += s.fz.get_double();
            my += s.moment.get_double();
        }
        self.force_x.set(fx);
        self.force_z.set(fz);
        self.moment.set(my);
        Step::Computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground::FlatGround;

    #[test]
    fn totals_sum_every_source() {
        let root = PropertyManager::new().root();
        let ground = FlatGround::default();
        let mut aircraft = Aircraft::new(&root, DebugLevel::SILENT).unwrap();
        root.set_double_at("forces/fbx-aero-lbs", -30.0).unwrap();
        root.set_double_at("forces/fbx-prop-lbs", 250.0).unwrap();
        root.set_double_at("forces/fbz-gear-lbs", -10.0).unwrap();
        root.set_double_at("moments/m-external-lbsft", 4.0).unwrap();
        let mut frame = FrameContext {
            props: &root,
            ground: &ground,
            dt: 0.01,
            sim_time: 0.0,
            frame: 0,
            holding: false,
            integration_suspended: false,
            requests: Vec::new(),
        };
        aircraft.run(&mut frame);
        assert_eq!(root.get_double_at("forces/fbx-total-lbs"), Some(220.0));
        assert_eq!(root.get_double_at("forces/fbz-total-lbs"), Some(-10.0));
        assert_eq!(root.get_double_at("moments/m-total-lbsft"), Some(4.0));
    }
}
