//! Propulsion: engines, their thrusters and the fuel tanks feeding them.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::{load_document, Element};
use crate::debug::DebugLevel;
use crate::model::{FrameContext, LoadContext, Model, ModelBase, Step};
use crate::models::piston::{Piston, PistonInputs};
use crate::models::thruster::Thruster;
use crate::units::HP_TO_FTLBS_PER_SEC;
use crate::{ConfigError, LoadError, ModelError};

/// RPM a propeller is set to when an engine is started in the running state.
const RUNNING_START_RPM: f64 = 1000.0;

struct Engine {
    name: String,
    piston: Piston,
    thruster: Thruster,
    /// Thrust line position `(x, z)`, ft.
    location: (f64, f64),
    throttle: PropertyNode,
    mixture: PropertyNode,
    thrust: Rc<Cell<f64>>,
    engine_rpm: Rc<Cell<f64>>,
    thruster_rpm: Rc<Cell<f64>>,
    advance_ratio: Rc<Cell<f64>>,
}

#[derive(Debug)]
struct Tank {
    capacity: f64,
    initial: f64,
    contents: Rc<Cell<f64>>,
}

pub struct Propulsion {
    base: ModelBase,
    engines: Vec<Engine>,
    tanks: Vec<Tank>,
    starter: Rc<Cell<bool>>,
    magnetos: Rc<Cell<i32>>,
    /// Pending "start running" request: engine index, or -1 for all.
    set_running: Rc<Cell<Option<i32>>>,
    total_fuel: Rc<Cell<f64>>,
    force_x: Rc<Cell<f64>>,
    force_z: Rc<Cell<f64>>,
    moment: Rc<Cell<f64>>,
}

impl Propulsion {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let mut propulsion = Self {
            base: ModelBase::new("propulsion", debug),
            engines: Vec::new(),
            tanks: Vec::new(),
            starter: Rc::new(Cell::new(false)),
            magnetos: Rc::new(Cell::new(0)),
            set_running: Rc::new(Cell::new(None)),
            total_fuel: Rc::new(Cell::new(0.0)),
            force_x: Rc::new(Cell::new(0.0)),
            force_z: Rc::new(Cell::new(0.0)),
            moment: Rc::new(Cell::new(0.0)),
        };
        let ties = &mut propulsion.base.ties;
        ties.tie_flag(props, "propulsion/starter_cmd", &propulsion.starter)?;
        ties.tie_int(props, "propulsion/magneto_cmd", &propulsion.magnetos)?;
        let request = Rc::clone(&propulsion.set_running);
        ties.tie_write_only(props, "propulsion/set-running", move |v| request.set(Some(v as i32)))?;
        for (path, cell) in [
            ("propulsion/total-fuel-lbs", &propulsion.total_fuel),
            ("forces/fbx-prop-lbs", &propulsion.force_x),
            ("forces/fbz-prop-lbs", &propulsion.force_z),
            ("moments/m-prop-lbsft", &propulsion.moment),
        ] {
            let c = Rc::clone(cell);
            ties.tie_read_only(props, path, move || c.get())?;
        }
        Ok(propulsion)
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    pub fn tank_count(&self) -> usize {
        self.tanks.len()
    }

    pub fn engine_running(&self, index: usize) -> Option<bool> {
        self.engines.get(index).map(|e| e.piston.running())
    }

    pub fn thruster_kind(&self, index: usize) -> Option<&'static str> {
        self.engines.get(index).map(|e| e.thruster.kind())
    }

    pub fn total_fuel_lbs(&self) -> f64 {
        self.total_fuel.get()
    }

    /// Start engine `index` (or every engine when negative) already running.
    pub fn init_running(&mut self, index: i32) {
        self.magnetos.set(3);
        for (i, engine) in self.engines.iter_mut().enumerate() {
            if index < 0 || i as i32 == index {
                engine.piston.init_running();
                engine.thruster.set_rpm(RUNNING_START_RPM);
                engine.thruster_rpm.set(engine.thruster.rpm());
                engine.engine_rpm.set(engine.thruster.engine_rpm());
            }
        }
    }

    fn load_tank(&mut self, el: &Element, props: &PropertyNode) -> Result<(), LoadError> {
        let kind = el.attribute("type").unwrap_or_else(|| "FUEL".into());
        if kind != "FUEL" && kind != "OXIDIZER" {
            return Err(LoadError::UnknownType {
                kind: "tank".into(),
                value: kind,
            });
        }
        let capacity = el.number_or("capacity", 0.0)?.max(0.0);
        let initial = el.number_or("contents", 0.0)?.clamp(0.0, capacity);
        let tank = Tank {
            capacity,
            initial,
            contents: Rc::new(Cell::new(initial)),
        };
        let index = self.tanks.len();
        self.base
            .ties
            .tie_value(props, &format!("propulsion/tank[{index}]/contents-lbs"), &tank.contents)?;
        self.base
            .ties
            .tie_read_only(props, &format!("propulsion/tank[{index}]/capacity-lbs"), move || capacity)?;
        self.tanks.push(tank);
        self.update_total_fuel();
        Ok(())
    }

    fn load_engine(&mut self, el: &Element, ctx: &LoadContext<'_>) -> Result<(), LoadError> {
        let file = el.require_attribute("file")?;
        let engine_doc = load_document(&ctx.paths.engine.join(format!("{file}.json")))?;
        let piston = Piston::from_element(&engine_doc)?;

        let thruster_el = el.find_element("thruster").ok_or_else(|| ConfigError::MissingElement {
            parent: "engine".into(),
            name: "thruster".into(),
        })?;
        let thruster = match thruster_el.attribute("file") {
            Some(file) => {
                Thruster::from_element(&load_document(&ctx.paths.engine.join(format!("{file}.json")))?)?
            }
            None => {
                let inline = thruster_el.children.first().ok_or_else(|| ConfigError::MissingElement {
                    parent: "thruster".into(),
                    name: "propeller".into(),
                })?;
                Thruster::from_element(inline)?
            }
        };

        let index = self.engines.len();
        let props = ctx.props;
        let suffix = if index == 0 { String::new() } else { format!("[{index}]") };
        props.set_double_at(&format!("fcs/throttle-cmd-norm{suffix}"), 0.0)?;
        props.set_double_at(&format!("fcs/mixture-cmd-norm{suffix}"), 1.0)?;
        let engine = Engine {
            name: engine_doc.attribute("name").unwrap_or(file),
            piston,
            thruster,
            location: el.find_xz("location")?,
            throttle: props.get_or_create(&format!("fcs/throttle-pos-norm{suffix}"))?,
            mixture: props.get_or_create(&format!("fcs/mixture-pos-norm{suffix}"))?,
            thrust: Rc::new(Cell::new(0.0)),
            engine_rpm: Rc::new(Cell::new(0.0)),
            thruster_rpm: Rc::new(Cell::new(0.0)),
            advance_ratio: Rc::new(Cell::new(0.0)),
        };
        // mixture positions default to rich until the flight controls run
        engine.mixture.set_double(1.0)?;

        let prefix = format!("propulsion/engine[{index}]");
        engine.piston.bind(&mut self.base.ties, props, &prefix)?;
        for (name, cell) in [
            ("thrust-lbs", &engine.thrust),
            ("engine-rpm", &engine.engine_rpm),
            ("thruster-rpm", &engine.thruster_rpm),
            ("advance-ratio", &engine.advance_ratio),
        ] {
            let c = Rc::clone(cell);
            self.base
                .ties
                .tie_read_only(props, &format!("{prefix}/{name}"), move || c.get())?;
        }
        if ctx.debug.startup() {
            tracing::info!(
                index,
                engine = %engine.name,
                thruster = engine.thruster.kind(),
                "engine loaded"
            );
        }
        self.engines.push(engine);
        Ok(())
    }

    fn update_total_fuel(&self) {
        self.total_fuel
            .set(self.tanks.iter().map(|t| t.contents.get()).sum());
    }

    fn drain(&self, mut burned: f64) {
        for tank in &self.tanks {
            if burned <= 0.0 {
                break;
            }
            let take = burned.min(tank.contents.get());
            tank.contents.set(tank.contents.get() - take);
            burned -= take;
        }
    }

    /// One engine/thruster update at the current ambient conditions.
    /// Returns body x force, pitching moment and fuel burned.
    fn step_engines(&mut self, props: &PropertyNode, dt: f64) -> (f64, f64, f64) {
        let ambient = |path: &str, default: f64| props.get_double_at(path).unwrap_or(default);
        let pressure = ambient("atmosphere/P-psf", 2116.22);
        let temperature = ambient("atmosphere/T-R", 518.67);
        let density = ambient("atmosphere/rho-slugs_ft3", 0.002_377);
        let ias = ambient("velocities/vc-kts", 0.0);
        let airspeed = ambient("velocities/u-fps", 0.0);
        let starved = !self.tanks.is_empty() && self.total_fuel.get() <= 0.0;

        let mut fx = 0.0;
        let mut my = 0.0;
        let mut burned = 0.0;
        for engine in &mut self.engines {
            let inputs = PistonInputs {
                pressure_psf: pressure,
                temperature_r: temperature,
                ias_kts: ias,
                throttle: engine.throttle.get_double(),
                mixture: engine.mixture.get_double(),
                magnetos: self.magnetos.get(),
                starter: self.starter.get(),
                starved,
                dt,
            };
            let hp = engine.piston.calculate(&inputs, engine.thruster.engine_rpm());
            let required = engine.thruster.power_required(density, airspeed);
            let available = hp * HP_TO_FTLBS_PER_SEC - required;
            let thrust = engine.thruster.calculate(available, density, airspeed, dt);

            engine.thrust.set(thrust);
            engine.thruster_rpm.set(engine.thruster.rpm());
            engine.engine_rpm.set(engine.thruster.engine_rpm());
            engine.advance_ratio.set(engine.thruster.advance_ratio());
            fx += thrust;
            my += thrust * engine.location.1;
            burned += engine.piston.fuel_flow_pps() * dt;
        }
        (fx, my, burned)
    }

    /// Run the engines with a fixed internal step, without burning fuel,
    /// until every thruster's RPM settles. Returns `true` when it did.
    pub fn steady_state(&mut self, props: &PropertyNode) -> bool {
        const STEP: f64 = 0.05;
        const MAX_STEPS: usize = 2000;
        if self.engines.is_empty() {
            return true;
        }
        let mut settled = false;
        let (mut fx, mut my) = (0.0, 0.0);
        for _ in 0..MAX_STEPS {
            let before: Vec<f64> = self.engines.iter().map(|e| e.thruster.rpm()).collect();
            (fx, my, _) = self.step_engines(props, STEP);
            settled = self
                .engines
                .iter()
                .zip(&before)
                .all(|(e, rpm)| (e.thruster.rpm() - rpm).abs() < 0.01);
            if settled {
                break;
            }
        }
        self.force_x.set(fx);
        self.moment.set(my);
        if !settled && self.base.debug().sanity() {
            tracing::warn!("engines did not reach a steady state");
        }
        settled
    }
}

impl Model for Propulsion {
    crate::model_accessors!();

    fn load(&mut self, el: &Element, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        for child in &el.children {
            match child.name.as_str() {
                "engine" => self.load_engine(child, ctx)?,
                "tank" => self.load_tank(child, ctx.props)?,
                other => {
                    tracing::warn!(element = %other, "ignoring unknown propulsion element");
                }
            }
        }
        Ok(())
    }

    fn init_model(&mut self, props: &PropertyNode) -> Result<(), ModelError> {
        self.base.reset_counter();
        let ambient_r = props.get_double_at("atmosphere/T-R").unwrap_or(518.67);
        for engine in &mut self.engines {
            engine.piston.reset(ambient_r);
            engine.thruster.set_rpm(0.0);
            engine.thrust.set(0.0);
            engine.engine_rpm.set(0.0);
            engine.thruster_rpm.set(0.0);
        }
        for tank in &self.tanks {
            tank.contents.set(tank.initial.min(tank.capacity));
        }
        self.starter.set(false);
        self.update_total_fuel();
        self.force_x.set(0.0);
        self.force_z.set(0.0);
        self.moment.set(0.0);
        Ok(())
    }

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(index) = self.set_running.take() {
            self.init_running(index);
        }
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        if self.engines.is_empty() {
            return Step::Idle;
        }

        let (fx, my, burned) = self.step_engines(ctx.props, ctx.dt);
        self.drain(burned);
        self.update_total_fuel();
        self.force_x.set(fx);
        self.force_z.set(0.0);
        self.moment.set(my);
        Step::Computed
    }
}
