//! Thrusters driven by an engine's shaft power.

use std::f64::consts::PI;

use crate::config::Element;
use crate::LoadError;

/// Fixed-pitch propeller with linear thrust and quadratic power roll-off
/// against advance ratio.
#[derive(Debug, Clone)]
pub struct Propeller {
    diameter_ft: f64,
    ixx: f64,
    gear_ratio: f64,
    ct_static: f64,
    cp_static: f64,
    j_max: f64,
    rpm: f64,
    advance_ratio: f64,
    power_required: f64,
}

impl Propeller {
    pub fn from_element(el: &Element) -> Result<Self, LoadError> {
        Ok(Self {
            diameter_ft: el.require_number("diameter")?,
            ixx: el.number_or("ixx", 1.67)?.max(1e-3),
            gear_ratio: el.number_or("gearratio", 1.0)?.max(1e-3),
            ct_static: el.number_or("ct_static", 0.09)?,
            cp_static: el.number_or("cp_static", 0.04)?,
            j_max: el.number_or("j_max", 1.0)?.max(1e-3),
            rpm: 0.0,
            advance_ratio: 0.0,
            power_required: 0.0,
        })
    }

    fn revs_per_sec(&self) -> f64 {
        self.rpm / 60.0
    }

    fn advance(&self, velocity_fps: f64) -> f64 {
        let n = self.revs_per_sec();
        if n > 0.1 {
            (velocity_fps / (n * self.diameter_ft)).max(0.0)
        } else {
            0.0
        }
    }

    fn coefficients(&self, j: f64) -> (f64, f64) {
        let ratio = j / self.j_max;
        let ct = self.ct_static * (1.0 - ratio).max(0.0);
        let cp = self.cp_static * (1.0 - 0.5 * ratio * ratio).max(0.0);
        (ct, cp)
    }
}

/// A rotor thruster. Produces no thrust and absorbs no power.
#[derive(Debug, Clone, Default)]
pub struct Rotor {
    rpm: f64,
}

#[derive(Debug, Clone)]
pub enum Thruster {
    Propeller(Propeller),
    Rotor(Rotor),
}

impl Thruster {
    /// Build from a thruster document; the root tag selects the kind.
    pub fn from_element(el: &Element) -> Result<Self, LoadError> {
        match el.name.as_str() {
            "propeller" => Ok(Thruster::Propeller(Propeller::from_element(el)?)),
            "rotor" => Ok(Thruster::Rotor(Rotor::default())),
            other => Err(LoadError::UnknownType {
                kind: "thruster".into(),
                value: other.into(),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Thruster::Propeller(_) => "propeller",
            Thruster::Rotor(_) => "rotor",
        }
    }

    /// Engine-side RPM (thruster RPM times gear ratio).
    pub fn engine_rpm(&self) -> f64 {
        match self {
            Thruster::Propeller(p) => p.rpm * p.gear_ratio,
            Thruster::Rotor(r) => r.rpm,
        }
    }

    pub fn rpm(&self) -> f64 {
        match self {
            Thruster::Propeller(p) => p.rpm,
            Thruster::Rotor(r) => r.rpm,
        }
    }

    pub fn set_rpm(&mut self, rpm: f64) {
        match self {
            Thruster::Propeller(p) => p.rpm = rpm,
            Thruster::Rotor(r) => r.rpm = rpm,
        }
    }

    pub fn advance_ratio(&self) -> f64 {
        match self {
            Thruster::Propeller(p) => p.advance_ratio,
            Thruster::Rotor(_) => 0.0,
        }
    }

    /// Shaft power absorbed at the current RPM, ft*lbs/s.
    pub fn power_required(&mut self, density: f64, velocity_fps: f64) -> f64 {
        match self {
            Thruster::Propeller(p) => {
                let j = p.advance(velocity_fps);
                let (_, cp) = p.coefficients(j);
                let n = p.revs_per_sec();
                p.power_required = cp * density * n.powi(3) * p.diameter_ft.powi(5);
                p.power_required
            }
            Thruster::Rotor(_) => 0.0,
        }
    }

    /// Apply the net shaft power for one step and return thrust in lbs.
    pub fn calculate(&mut self, power_available: f64, density: f64, velocity_fps: f64, dt: f64) -> f64 {
        match self {
            Thruster::Propeller(p) => {
                let j = p.advance(velocity_fps);
                p.advance_ratio = j;
                let (ct, _) = p.coefficients(j);
                let n = p.revs_per_sec();
                let thrust = ct * density * n * n * p.diameter_ft.powi(4);

                let mut omega = p.rpm / 60.0 * 2.0 * PI;
                if omega <= 5.0 {
                    omega = 1.0;
                }
                let excess_torque = power_available / omega;
                let rpm = (p.rpm / 60.0 * 2.0 * PI + excess_torque / p.ixx * dt) * 60.0 / (2.0 * PI);
                p.rpm = if rpm < 1.0 { 0.0 } else { rpm };
                thrust
            }
            Thruster::Rotor(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn propeller() -> Thruster {
        let el = Element::new("propeller")
            .with_child(Element::new("diameter").with_text(6.25))
            .with_child(Element::new("ixx").with_text(1.67));
        Thruster::from_element(&el).unwrap()
    }

    #[test]
    fn static_thrust_is_positive_when_spinning() {
        let mut prop = propeller();
        prop.set_rpm(2400.0);
        let thrust = prop.calculate(0.0, 0.002377, 0.0, 0.0);
        assert!(thrust > 100.0, "thrust was {thrust}");
        assert_eq!(prop.rpm(), 2400.0);
    }

    #[test]
    fn excess_power_spins_up() {
        let mut prop = propeller();
        prop.set_rpm(1000.0);
        prop.calculate(20_000.0, 0.002377, 0.0, 0.1);
        assert!(prop.rpm() > 1000.0);
    }

    #[test]
    fn power_deficit_spins_down_to_zero() {
        let mut prop = propeller();
        prop.set_rpm(10.0);
        prop.calculate(-50_000.0, 0.002377, 0.0, 0.1);
        assert_eq!(prop.rpm(), 0.0);
    }

    #[test]
    fn rotor_never_produces_thrust() {
        let mut rotor = Thruster::from_element(&Element::new("rotor")).unwrap();
        rotor.set_rpm(3000.0);
        assert_eq!(rotor.calculate(1e6, 0.002377, 50.0, 0.01), 0.0);
        assert_eq!(rotor.power_required(0.002377, 50.0), 0.0);
        assert_eq!(rotor.kind(), "rotor");
    }

    #[test]
    fn unknown_thruster_is_rejected() {
        assert!(Thruster::from_element(&Element::new("nozzle")).is_err());
    }
}
