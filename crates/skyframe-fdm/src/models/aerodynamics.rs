//! Aerodynamic forces built from coefficient products.
//!
//! Each axis (`DRAG`, `LIFT`, `PITCH`) sums its coefficients; a coefficient
//! is a constant `value` times the current value of every listed property.
//! Drag and lift are wind-axis forces and are rotated into body axes through
//! the angle of attack.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::Element;
use crate::debug::DebugLevel;
use crate::model::{FrameContext, LoadContext, Model, ModelBase, Step};
use crate::models::components::property_name;
use crate::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Drag,
    Lift,
    Pitch,
}

impl Axis {
    fn parse(raw: &str) -> Result<Self, LoadError> {
        match raw {
            "DRAG" => Ok(Axis::Drag),
            "LIFT" => Ok(Axis::Lift),
            "PITCH" => Ok(Axis::Pitch),
            other => Err(LoadError::UnknownType {
                kind: "axis".into(),
                value: other.into(),
            }),
        }
    }
}

struct Coefficient {
    axis: Axis,
    value: f64,
    factors: Vec<PropertyNode>,
    output: Rc<Cell<f64>>,
}

impl Coefficient {
    fn evaluate(&self) -> f64 {
        let v = self
            .factors
            .iter()
            .fold(self.value, |acc, node| acc * node.get_double());
        self.output.set(v);
        v
    }
}

pub struct Aerodynamics {
    base: ModelBase,
    coefficients: Vec<Coefficient>,
    alpha: PropertyNode,
    drag: Rc<Cell<f64>>,
    lift: Rc<Cell<f64>>,
    force_x: Rc<Cell<f64>>,
    force_z: Rc<Cell<f64>>,
    moment: Rc<Cell<f64>>,
}

impl Aerodynamics {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let cell = || Rc::new(Cell::new(0.0));
        let mut aero = Self {
            base: ModelBase::new("aerodynamics", debug),
            coefficients: Vec::new(),
            alpha: props.get_or_create("aero/alpha-rad")?,
            drag: cell(),
            lift: cell(),
            force_x: cell(),
            force_z: cell(),
            moment: cell(),
        };
        for (path, c) in [
            ("forces/fwx-aero-lbs", &aero.drag),
            ("forces/fwz-aero-lbs", &aero.lift),
            ("forces/fbx-aero-lbs", &aero.force_x),
            ("forces/fbz-aero-lbs", &aero.force_z),
            ("moments/m-aero-lbsft", &aero.moment),
        ] {
            let c = Rc::clone(c);
            aero.base.ties.tie_read_only(props, path, move || c.get())?;
        }
        Ok(aero)
    }

    pub fn coefficient_count(&self) -> usize {
        self.coefficients.len()
    }
}

impl Model for Aerodynamics {
    crate::model_accessors!();

    fn load(&mut self, el: &Element, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        for axis_el in el.find_elements("axis") {
            let axis = Axis::parse(&axis_el.require_attribute("name")?)?;
            for coeff_el in axis_el.find_elements("coefficient") {
                let name = property_name(&coeff_el.require_attribute("name")?);
                let mut factors = Vec::new();
                for factor in coeff_el.find_elements("property") {
                    if let Some(path) = factor.text() {
                        factors.push(ctx.props.get_or_create(&path)?);
                    }
                }
                let coefficient = Coefficient {
                    axis,
                    value: coeff_el.number_or("value", 1.0)?,
                    factors,
                    output: Rc::new(Cell::new(0.0)),
                };
                let out = Rc::clone(&coefficient.output);
                self.base.ties.tie_read_only(
                    ctx.props,
                    &format!("aero/coefficient/{name}"),
                    move || out.get(),
                )?;
                self.coefficients.push(coefficient);
            }
        }
        Ok(())
    }

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        if self.coefficients.is_empty() {
            return Step::Idle;
        }
        let (mut drag, mut lift, mut pitch) = (0.0, 0.0, 0.0);
        for c in &self.coefficients {
            let v = c.evaluate();
            match c.axis {
                Axis::Drag => drag += v,
                Axis::Lift => lift += v,
                Axis::Pitch => pitch += v,
            }
        }
        let alpha = self.alpha.get_double();
        let (sin_a, cos_a) = alpha.sin_cos();
        self.drag.set(drag);
        self.lift.set(lift);
        self.force_x.set(-drag * cos_a + lift * sin_a);
        self.force_z.set(-drag * sin_a - lift * cos_a);
        self.moment.set(pitch);
        Step::Computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground::FlatGround;
    use crate::model::{ModelPaths, SystemKind};

    fn section() -> Element {
        Element::new("aerodynamics")
            .with_child(
                Element::new("axis").with_attribute("name", "LIFT").with_child(
                    Element::new("coefficient")
                        .with_attribute("name", "CLalpha")
                        .with_child(Element::new("value").with_text(4.0))
                        .with_child(Element::new("property").with_text("aero/qbar-psf"))
                        .with_child(Element::new("property").with_text("aero/alpha-rad")),
                ),
            )
            .with_child(
                Element::new("axis").with_attribute("name", "DRAG").with_child(
                    Element::new("coefficient")
                        .with_attribute("name", "CD0")
                        .with_child(Element::new("value").with_text(0.5))
                        .with_child(Element::new("property").with_text("aero/qbar-psf")),
                ),
            )
    }

    #[test]
    fn coefficients_rotate_into_body_axes() {
        let root = PropertyManager::new().root();
        let ground = FlatGround::default();
        let mut aero = Aerodynamics::new(&root, DebugLevel::SILENT).unwrap();
        let paths = ModelPaths::default();
        let mut ctx = LoadContext {
            props: &root,
            paths: &paths,
            system_kind: SystemKind::System,
            dt: 0.01,
            debug: DebugLevel::SILENT,
        };
        aero.load(&section(), &mut ctx).unwrap();
        assert_eq!(aero.coefficient_count(), 2);

        root.set_double_at("aero/qbar-psf", 10.0).unwrap();
        root.set_double_at("aero/alpha-rad", 0.0).unwrap();
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
        assert_eq!(aero.run(&mut frame), Step::Computed);
        assert_eq!(root.get_double_at("forces/fbx-aero-lbs"), Some(-5.0));
        assert_eq!(root.get_double_at("aero/coefficient/clalpha"), Some(0.0));

        root.set_double_at("aero/alpha-rad", 0.1).unwrap();
        aero.run(&mut frame);
        let lift = root.get_double_at("forces/fwz-aero-lbs").unwrap();
        assert!((lift - 4.0).abs() < 1e-12);
        assert!(root.get_double_at("forces/fbz-aero-lbs").unwrap() < 0.0);
    }

    #[test]
    fn unknown_axis_is_rejected() {
        let root = PropertyManager::new().root();
        let mut aero = Aerodynamics::new(&root, DebugLevel::SILENT).unwrap();
        let paths = ModelPaths::default();
        let mut ctx = LoadContext {
            props: &root,
            paths: &paths,
            system_kind: SystemKind::System,
            dt: 0.01,
            debug: DebugLevel::SILENT,
        };
        let bad = Element::new("aerodynamics").with_child(Element::new("axis").with_attribute("name", "SIDE"));
        assert!(matches!(
            aero.load(&bad, &mut ctx),
            Err(LoadError::UnknownType { .. })
        ));
    }
}
