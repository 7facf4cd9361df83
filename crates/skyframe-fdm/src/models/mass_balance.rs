//! Weight, mass and pitch inertia from the empty airframe, point masses
//! and the fuel on board.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::Element;
use crate::debug::DebugLevel;
use crate::model::{FrameContext, LoadContext, Model, ModelBase, Step};
use crate::units::G0_FPS2;
use crate::LoadError;

#[derive(Debug)]
struct PointMass {
    name: String,
    weight: Rc<Cell<f64>>,
    /// `(x, z)` relative to the reference center of gravity, ft.
    location: (f64, f64),
}

pub struct MassBalance {
    base: ModelBase,
    empty_weight: Rc<Cell<f64>>,
    base_iyy: f64,
    point_masses: Vec<PointMass>,
    fuel: PropertyNode,
    weight: Rc<Cell<f64>>,
    mass: Rc<Cell<f64>>,
    iyy: Rc<Cell<f64>>,
}

impl MassBalance {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let mut mb = Self {
            base: ModelBase::new("mass_balance", debug),
            empty_weight: Rc::new(Cell::new(0.0)),
            base_iyy: 0.0,
            point_masses: Vec::new(),
            fuel: props.get_or_create("propulsion/total-fuel-lbs")?,
            weight: Rc::new(Cell::new(0.0)),
            mass: Rc::new(Cell::new(0.0)),
            iyy: Rc::new(Cell::new(0.0)),
        };
        mb.base
            .ties
            .tie_value(props, "inertia/empty-weight-lbs", &mb.empty_weight)?;
        for (path, c) in [
            ("inertia/weight-lbs", &mb.weight),
            ("inertia/mass-slugs", &mb.mass),
            ("inertia/iyy-slugs_ft2", &mb.iyy),
        ] {
            let c = Rc::clone(c);
            mb.base.ties.tie_read_only(props, path, move || c.get())?;
        }
        Ok(mb)
    }

    pub fn point_mass_names(&self) -> Vec<&str> {
        self.point_masses.iter().map(|p| p.name.as_str()).collect()
    }

    fn update(&self) {
        let point_weight: f64 = self.point_masses.iter().map(|p| p.weight.get()).sum();
        let weight = self.empty_weight.get() + point_weight + self.fuel.get_double();
        let point_iyy: f64 = self
            .point_masses
            .iter()
            .map(|p| {
                let (x, z) = p.location;
                p.weight.get() / G0_FPS2 * (x * x + z * z)
            })
            .sum();
        self.weight.set(weight);
        self.mass.set(weight / G0_FPS2);
        self.iyy.set(self.base_iyy + point_iyy);
    }
}

impl Model for MassBalance {
    crate::model_accessors!();

    fn load(&mut self, el: &Element, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        self.empty_weight.set(el.require_number("emptywt")?);
        self.base_iyy = el.require_number("iyy")?;
        for pm in el.find_elements("pointmass") {
            let index = self.point_masses.len();
            let point = PointMass {
                name: pm.attribute("name").unwrap_or_else(|| format!("pointmass-{index}")),
                weight: Rc::new(Cell::new(pm.require_number("weight")?)),
                location: pm.find_xz("location")?,
            };
            self.base.ties.tie_value(
                ctx.props,
                &format!("inertia/pointmass-weight-lbs[{index}]"),
                &point.weight,
            )?;
            self.point_masses.push(point);
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelPaths, SystemKind};

    #[test]
    fn weight_includes_fuel_and_point_masses() {
        let root = PropertyManager::new().root();
        let mut mb = MassBalance::new(&root, DebugLevel::SILENT).unwrap();
        let section = Element::new("mass_balance")
            .with_child(Element::new("emptywt").with_text(1500))
            .with_child(Element::new("iyy").with_text(1300))
            .with_child(
                Element::new("pointmass")
                    .with_attribute("name", "pilot")
                    .with_child(Element::new("weight").with_text(180))
                    .with_child(
                        Element::new("location")
                            .with_child(Element::new("x").with_text(2.0))
                            .with_child(Element::new("z").with_text(0.0)),
                    ),
            );
        let paths = ModelPaths::default();
        let mut ctx = LoadContext {
            props: &root,
            paths: &paths,
            system_kind: SystemKind::System,
            dt: 0.01,
            debug: DebugLevel::SILENT,
        };
        root.set_double_at("propulsion/total-fuel-lbs", 120.0).unwrap();
        mb.load(&section, &mut ctx).unwrap();
        assert_eq!(root.get_double_at("inertia/weight-lbs"), Some(1800.0));
        let iyy = root.get_double_at("inertia/iyy-slugs_ft2").unwrap();
        assert!((iyy - (1300.0 + 180.0 / G0_FPS2 * 4.0)).abs() < 1e-9);

        root.set_double_at("inertia/pointmass-weight-lbs[0]", 0.0).unwrap();
        mb.update();
        assert_eq!(root.get_double_at("inertia/weight-lbs"), Some(1620.0));
        assert_eq!(mb.point_mass_names(), vec!["pilot"]);
    }

    #[test]
    fn missing_empty_weight_fails() {
        let root = PropertyManager::new().root();
        let mut mb = MassBalance::new(&root, DebugLevel::SILENT).unwrap();
        let paths = ModelPaths::default();
        let mut ctx = LoadContext {
            props: &root,
            paths: &paths,
            system_kind: SystemKind::System,
            dt: 0.01,
            debug: DebugLevel::SILENT,
        };
        assert!(mb.load(&Element::new("mass_balance"), &mut ctx).is_err());
    }
}
