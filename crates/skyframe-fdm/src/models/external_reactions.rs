//! Externally commanded forces (tow lines, rocket assists, test rigs).
//!
//! A section declares interface properties that other subsystems or the
//! user may write, plus named forces with a fixed direction and a writable
//! magnitude at `external_reactions/<name>/magnitude`.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::Element;
use crate::debug::DebugLevel;
use crate::model::{FrameContext, LoadContext, Model, ModelBase, Step};
use crate::models::components::property_name;
use crate::LoadError;

/// Reference frame a force direction is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceFrame {
    Body,
    /// Horizontal forward / down.
    Local,
    /// Along / normal to the relative wind.
    Wind,
}

impl ForceFrame {
    fn parse(raw: &str) -> Result<Self, LoadError> {
        match raw {
            "BODY" => Ok(ForceFrame::Body),
            "LOCAL" => Ok(ForceFrame::Local),
            "WIND" => Ok(ForceFrame::Wind),
            other => Err(LoadError::UnknownType {
                kind: "force frame".into(),
                value: other.into(),
            }),
        }
    }
}

#[derive(Debug)]
struct Force {
    name: String,
    frame: ForceFrame,
    location: (f64, f64),
    /// Unit direction `(x, z)` in `frame`.
    direction: (f64, f64),
    magnitude: Rc<Cell<f64>>,
}

impl Force {
    /// Body-axis components.
    fn body(&self, theta: f64, alpha: f64) -> (f64, f64) {
        let m = self.magnitude.get();
        let (dx, dz) = (self.direction.0 * m, self.direction.1 * m);
        match self.frame {
            ForceFrame::Body => (dx, dz),
            ForceFrame::Local => {
                let (s, c) = theta.sin_cos();
                (dx * c - dz * s, dx * s + dz * c)
            }
            ForceFrame::Wind => {
                let (s, c) = alpha.sin_cos();
                (dx * c - dz * s, dx * s + dz * c)
            }
        }
    }
}

pub struct ExternalReactions {
    base: ModelBase,
    interface: Vec<PropertyNode>,
    forces: Vec<Force>,
    force_x: Rc<Cell<f64>>,
    force_z: Rc<Cell<f64>>,
    moment: Rc<Cell<f64>>,
}

impl ExternalReactions {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let mut er = Self {
            base: ModelBase::new("external_reactions", debug),
            interface: Vec::new(),
            forces: Vec::new(),
            force_x: Rc::new(Cell::new(0.0)),
            force_z: Rc::new(Cell::new(0.0)),
            moment: Rc::new(Cell::new(0.0)),
        };
        for (path, c) in [
            ("forces/fbx-external-lbs", &er.force_x),
            ("forces/fbz-external-lbs", &er.force_z),
            ("moments/m-external-lbsft", &er.moment),
        ] {
            let c = Rc::clone(c);
            er.base.ties.tie_read_only(props, path, move || c.get())?;
        }
        Ok(er)
    }

    pub fn force_names(&self) -> Vec<&str> {
        self.forces.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn interface_count(&self) -> usize {
        self.interface.len()
    }
}

impl Model for ExternalReactions {
    crate::model_accessors!();

    fn load(&mut self, el: &Element, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        for prop in el.find_elements("property") {
            let Some(path) = prop.text() else { continue };
            let node = ctx.props.get_or_create(&path)?;
            if let Some(value) = prop.attribute_as_number("value")? {
                node.set_double(value)?;
            }
            self.interface.push(node);
        }
        for force_el in el.find_elements("force") {
            let name = property_name(&force_el.require_attribute("name")?);
            let frame = ForceFrame::parse(
                force_el.attribute("frame").as_deref().unwrap_or("BODY"),
            )?;
            let (dx, dz) = force_el.find_xz("direction")?;
            let norm = (dx * dx + dz * dz).sqrt();
            let direction = if norm > 0.0 { (dx / norm, dz / norm) } else { (0.0, 0.0) };
            let force = Force {
                name: name.clone(),
                frame,
                location: force_el.find_xz("location")?,
                direction,
                magnitude: Rc::new(Cell::new(0.0)),
            };
            self.base.ties.tie_value(
                ctx.props,
                &format!("external_reactions/{name}/magnitude"),
                &force.magnitude,
            )?;
            self.forces.push(force);
        }
        Ok(())
    }

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        if self.forces.is_empty() {
            return Step::Idle;
        }
        let theta = ctx.props.get_double_at("attitude/theta-rad").unwrap_or(0.0);
        let alpha = ctx.props.get_double_at("aero/alpha-rad").unwrap_or(0.0);
        let (mut fx, mut fz, mut my) = (0.0, 0.0, 0.0);
        for force in &self.forces {
            let (x, z) = force.body(theta, alpha);
            let (lx, lz) = force.location;
            fx += x;
            fz += z;
            my += lz * x - lx * z;
        }
        self.force_x.set(fx);
        self.force_z.set(fz);
        self.moment.set(my);
        Step::Computed
    }
}
