//! Lift from lighter-than-air gas cells.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::Element;
use crate::debug::DebugLevel;
use crate::model::{FrameContext, LoadContext, Model, ModelBase, Step};
use crate::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gas {
    Helium,
    Hydrogen,
    Air,
}

impl Gas {
    fn parse(raw: &str) -> Result<Self, LoadError> {
        match raw {
            "HELIUM" => Ok(Gas::Helium),
            "HYDROGEN" => Ok(Gas::Hydrogen),
            "AIR" => Ok(Gas::Air),
            other => Err(LoadError::UnknownType {
                kind: "gas".into(),
                value: other.into(),
            }),
        }
    }

    /// Density relative to air at the same pressure and temperature.
    pub fn relative_density(self) -> f64 {
        match self {
            Gas::Helium => 0.138,
            Gas::Hydrogen => 0.0695,
            Gas::Air => 1.0,
        }
    }
}

#[derive(Debug)]
struct GasCell {
    gas: Gas,
    location: (f64, f64),
    max_volume: f64,
    fullness: Rc<Cell<f64>>,
    volume: Rc<Cell<f64>>,
}

pub struct BuoyantForces {
    base: ModelBase,
    cells: Vec<GasCell>,
    force_x: Rc<Cell<f64>>,
    force_z: Rc<Cell<f64>>,
    moment: Rc<Cell<f64>>,
}

impl BuoyantForces {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let mut bf = Self {
            base: ModelBase::new("buoyant_forces", debug),
            cells: Vec::new(),
            force_x: Rc::new(Cell::new(0.0)),
            force_z: Rc::new(Cell::new(0.0)),
            moment: Rc::new(Cell::new(0.0)),
        };
        for (path, c) in [
            ("forces/fbx-buoyancy-lbs", &bf.force_x),
            ("forces/fbz-buoyancy-lbs", &bf.force_z),
            ("moments/m-buoyancy-lbsft", &bf.moment),
        ] {
            let c = Rc::clone(c);
            bf.base.ties.tie_read_only(props, path, move || c.get())?;
        }
        Ok(bf)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

impl Model for BuoyantForces {
    crate::model_accessors!();

    fn load(&mut self, el: &Element, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        for cell_el in el.find_elements("gas_cell") {
            let gas = Gas::parse(cell_el.attribute("type").as_deref().unwrap_or("HELIUM"))?;
            let max_volume = cell_el.require_number("max_volume")?.max(0.0);
            let fullness = cell_el.number_or("fullness", 1.0)?.clamp(0.0, 1.0);
            let gas_cell = GasCell {
                gas,
                location: cell_el.find_xz("location")?,
                max_volume,
                fullness: Rc::new(Cell::new(fullness)),
                volume: Rc::new(Cell::new(max_volume * fullness)),
            };
            let index = self.cells.len();
            let prefix = format!("buoyant_forces/gas-cell[{index}]");
            self.base
                .ties
                .tie_value(ctx.props, &format!("{prefix}/fullness"), &gas_cell.fullness)?;
            let volume = Rc::clone(&gas_cell.volume);
            self.base
                .ties
                .tie_read_only(ctx.props, &format!("{prefix}/volume-ft3"), move || volume.get())?;
            self.cells.push(gas_cell);
        }
        Ok(())
    }

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        if self.cells.is_empty() {
            return Step::Idle;
        }
        let read = |path: &str| ctx.props.get_double_at(path).unwrap_or(0.0);
        let rho = read("atmosphere/rho-slugs_ft3");
        let g = read("accelerations/gravity-ft_sec2");
        let (sin_t, cos_t) = read("attitude/theta-rad").sin_cos();

        let (mut fx, mut fz, mut my) = (0.0, 0.0, 0.0);
        for cell in &self.cells {
            let volume = cell.max_volume * cell.fullness.get().clamp(0.0, 1.0);
            cell.volume.set(volume);
            let lift = rho * (1.0 - cell.gas.relative_density()) * volume * g;
            let (x, z) = (lift * sin_t, -lift * cos_t);
            let (lx, lz) = cell.location;
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
