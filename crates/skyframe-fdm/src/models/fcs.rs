//! Flight control system.
//!
//! Commands (`fcs/*-cmd-norm`) are mapped to positions (`fcs/*-pos-norm`)
//! directly, then the loaded channels run in the order systems, autopilot,
//! flight control. A channel component may overwrite any position through
//! its `output` property.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::{load_document, Element};
use crate::debug::DebugLevel;
use crate::model::{FrameContext, LoadContext, Model, ModelBase, Step, SystemKind};
use crate::models::components::Component;
use crate::{LoadError, ModelError};

/// Full elevator travel, radians per unit of normalized position.
pub const ELEVATOR_TRAVEL_RAD: f64 = 0.28;

#[derive(Debug)]
struct Channel {
    name: String,
    components: Vec<Component>,
}

pub struct FlightControl {
    base: ModelBase,
    props: PropertyNode,
    elevator_cmd: Rc<Cell<f64>>,
    pitch_trim_cmd: Rc<Cell<f64>>,
    elevator_pos_norm: Rc<Cell<f64>>,
    elevator_pos_rad: Rc<Cell<f64>>,
    throttles: Vec<(PropertyNode, PropertyNode)>,
    mixtures: Vec<(PropertyNode, PropertyNode)>,
    systems: Vec<Channel>,
    autopilot: Vec<Channel>,
    flight_control: Vec<Channel>,
    component_count: u64,
}

impl FlightControl {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let mut fcs = Self {
            base: ModelBase::new("fcs", debug),
            props: props.clone(),
            elevator_cmd: Rc::new(Cell::new(0.0)),
            pitch_trim_cmd: Rc::new(Cell::new(0.0)),
            elevator_pos_norm: Rc::new(Cell::new(0.0)),
            elevator_pos_rad: Rc::new(Cell::new(0.0)),
            throttles: Vec::new(),
            mixtures: Vec::new(),
            systems: Vec::new(),
            autopilot: Vec::new(),
            flight_control: Vec::new(),
            component_count: 0,
        };
        let ties = &mut fcs.base.ties;
        ties.tie_value(props, "fcs/elevator-cmd-norm", &fcs.elevator_cmd)?;
        ties.tie_value(props, "fcs/pitch-trim-cmd-norm", &fcs.pitch_trim_cmd)?;
        ties.tie_value(props, "fcs/elevator-pos-norm", &fcs.elevator_pos_norm)?;
        let rad = Rc::clone(&fcs.elevator_pos_rad);
        ties.tie_read_only(props, "fcs/elevator-pos-rad", move || rad.get())?;
        Ok(fcs)
    }

    /// Number of loaded channels across all three lists.
    pub fn channel_count(&self) -> usize {
        self.systems.len() + self.autopilot.len() + self.flight_control.len()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.systems
            .iter()
            .chain(&self.autopilot)
            .chain(&self.flight_control)
            .map(|c| c.name.as_str())
            .collect()
    }

    fn discover(props: &PropertyNode, list: &mut Vec<(PropertyNode, PropertyNode)>, stem: &str) {
        while let Some(cmd) = props.find(&format!("fcs/{stem}-cmd-norm[{}]", list.len())) {
            match props.get_or_create(&format!("fcs/{stem}-pos-norm[{}]", list.len())) {
                Ok(pos) => list.push((cmd, pos)),
                Err(_) => break,
            }
        }
    }

    fn map_direct(list: &[(PropertyNode, PropertyNode)]) {
        for (cmd, pos) in list {
            let _ = pos.set_double(cmd.get_double().clamp(0.0, 1.0));
        }
    }
}

impl Model for FlightControl {
    crate::model_accessors!();

    fn load(&mut self, el: &Element, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        let external;
        let document = match el.attribute("file") {
            Some(file) => {
                let path = ctx.paths.systems.join(format!("{file}.json"));
                external = load_document(&path)?;
                &external
            }
            None => el,
        };
        let system_name = document.attribute("name").unwrap_or_default();
        if ctx.debug.startup() {
            tracing::info!(kind = ?ctx.system_kind, name = %system_name, "loading flight control system");
        }

        let mut channels = Vec::new();
        for channel_el in document.find_elements("channel") {
            let mut channel = Channel {
                name: channel_el.attribute("name").unwrap_or_default(),
                components: Vec::new(),
            };
            for component_el in &channel_el.children {
                let seed = 0x5eed_0000 + self.component_count;
                self.component_count += 1;
                let component =
                    Component::from_element(component_el, ctx.props, &mut self.base.ties, ctx.dt, seed)?;
                channel.components.push(component);
            }
            channels.push(channel);
        }

        match ctx.system_kind {
            SystemKind::System => self.systems.extend(channels),
            SystemKind::Autopilot => self.autopilot.extend(channels),
            SystemKind::FlightControl => self.flight_control.extend(channels),
        }
        Ok(())
    }

    fn init_model(&mut self, _props: &PropertyNode) -> Result<(), ModelError> {
        self.base.reset_counter();
        self.elevator_cmd.set(0.0);
        self.pitch_trim_cmd.set(0.0);
        self.elevator_pos_norm.set(0.0);
        self.elevator_pos_rad.set(0.0);
        for channel in self
            .systems
            .iter_mut()
            .chain(self.autopilot.iter_mut())
            .chain(self.flight_control.iter_mut())
        {
            channel.components.iter_mut().for_each(Component::reset);
        }
        Ok(())
    }

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        Self::discover(&self.props, &mut self.throttles, "throttle");
        Self::discover(&self.props, &mut self.mixtures, "mixture");

        let elevator = (self.elevator_cmd.get() + self.pitch_trim_cmd.get()).clamp(-1.0, 1.0);
        self.elevator_pos_norm.set(elevator);
        Self::map_direct(&self.throttles);
        Self::map_direct(&self.mixtures);

        for channel in self
            .systems
            .iter_mut()
            .chain(self.autopilot.iter_mut())
            .chain(self.flight_control.iter_mut())
        {
            channel.components.iter_mut().for_each(Component::run);
        }

        self.elevator_pos_rad
            .set(self.elevator_pos_norm.get() * ELEVATOR_TRAVEL_RAD);
        Step::Computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground::FlatGround;
    use crate::model::ModelPaths;

    fn frame<'a>(props: &'a PropertyNode, ground: &'a FlatGround) -> FrameContext<'a> {
        FrameContext {
            props,
            ground,
            dt: 0.01,
            sim_time: 0.0,
            frame: 0,
            holding: false,
            integration_suspended: false,
            requests: Vec::new(),
        }
    }

    #[test]
    fn commands_map_to_positions() {
        let root = PropertyManager::new().root();
        let ground = FlatGround::default();
        let mut fcs = FlightControl::new(&root, DebugLevel::SILENT).unwrap();
        root.set_double_at("fcs/throttle-cmd-norm", 1.4).unwrap();
        root.set_double_at("fcs/throttle-cmd-norm[1]", 0.5).unwrap();
        root.set_double_at("fcs/elevator-cmd-norm", -0.5).unwrap();
        root.set_double_at("fcs/pitch-trim-cmd-norm", 0.1).unwrap();
        fcs.run(&mut frame(&root, &ground));
        assert_eq!(root.get_double_at("fcs/throttle-pos-norm"), Some(1.0));
        assert_eq!(root.get_double_at("fcs/throttle-pos-norm[1]"), Some(0.5));
        let pos = root.get_double_at("fcs/elevator-pos-norm").unwrap();
        assert!((pos + 0.4).abs() < 1e-12);
        let rad = root.get_double_at("fcs/elevator-pos-rad").unwrap();
        assert!((rad + 0.4 * ELEVATOR_TRAVEL_RAD).abs() < 1e-12);
    }

    #[test]
    fn channels_run_after_direct_mapping() {
        let root = PropertyManager::new().root();
        let ground = FlatGround::default();
        let mut fcs = FlightControl::new(&root, DebugLevel::SILENT).unwrap();
        let section = Element::new("flight_control").with_child(
            Element::new("channel").with_attribute("name", "Pitch").with_child(
                Element::new("pure_gain")
                    .with_attribute("name", "elevator-limiter")
                    .with_child(Element::new("input").with_text("fcs/elevator-pos-norm"))
                    .with_child(Element::new("gain").with_text(0.5))
                    .with_child(Element::new("output").with_text("fcs/elevator-pos-norm")),
            ),
        );
        let paths = ModelPaths::default();
        let mut ctx = LoadContext {
            props: &root,
            paths: &paths,
            system_kind: SystemKind::FlightControl,
            dt: 0.01,
            debug: DebugLevel::SILENT,
        };
        fcs.load(&section, &mut ctx).unwrap();
        assert_eq!(fcs.channel_names(), vec!["Pitch"]);

        root.set_double_at("fcs/elevator-cmd-norm", 0.8).unwrap();
        fcs.run(&mut frame(&root, &ground));
        assert_eq!(root.get_double_at("fcs/elevator-pos-norm"), Some(0.4));
    }
}
