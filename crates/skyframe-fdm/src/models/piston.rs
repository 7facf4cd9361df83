//! Normally aspirated piston engine.
//!
//! Manifold pressure follows throttle and RPM, air mass flow follows swept
//! volume, and fuel flow follows mixture and ambient pressure. Shaft power
//! comes from fuel flow through a brake specific fuel consumption and a
//! mixture efficiency correlation. Exhaust, cylinder head and oil
//! temperatures are integrated each step. All internal math is SI; the
//! published properties use the customary cockpit units.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::Element;
use crate::units::{
    interpolate, kelvin_to_fahrenheit, rankine_to_kelvin, INHG_TO_PA, IN3_TO_M3, KTS_TO_MPS,
    PSF_TO_PA, R_AIR_SI,
};
use crate::LoadError;

const SEA_LEVEL_PA: f64 = 101_325.0;
const STOICHIOMETRIC_AFR: f64 = 14.7;
const CALORIFIC_VALUE_FUEL: f64 = 47.3e6;
const CP_AIR: f64 = 1005.0;
const CP_FUEL: f64 = 1700.0;
const KG_TO_LBS: f64 = 2.2046;
const FUEL_LBS_PER_GAL: f64 = 6.02;
const CRANK_FRAMES_TO_START: u32 = 175;

/// Fuel/air ratio against fraction of best power.
const MIXTURE_EFFICIENCY: [(f64, f64); 15] = [
    (0.05000, 0.00000),
    (0.05137, 0.00862),
    (0.05179, 0.21552),
    (0.05430, 0.48276),
    (0.05842, 0.70690),
    (0.06312, 0.83621),
    (0.06942, 0.93103),
    (0.07786, 1.00000),
    (0.08845, 1.00000),
    (0.09270, 0.98276),
    (0.10120, 0.93103),
    (0.11455, 0.72414),
    (0.12158, 0.45690),
    (0.12435, 0.23276),
    (0.12545, 0.00000),
];

/// Equivalence ratio against combustion efficiency.
const COMBUSTION_EFFICIENCY: [(f64, f64); 12] = [
    (0.00, 0.980),
    (0.90, 0.980),
    (1.00, 0.970),
    (1.05, 0.950),
    (1.10, 0.900),
    (1.15, 0.850),
    (1.20, 0.790),
    (1.30, 0.700),
    (1.40, 0.630),
    (1.50, 0.570),
    (1.60, 0.525),
    (2.00, 0.345),
];

/// Below this equivalence ratio the mixture no longer burns.
pub const LEAN_CUTOUT_EQUIVALENCE: f64 = 0.668;

/// Ambient and cockpit inputs for one step.
#[derive(Debug, Clone, Copy)]
pub struct PistonInputs {
    pub pressure_psf: f64,
    pub temperature_r: f64,
    pub ias_kts: f64,
    pub throttle: f64,
    pub mixture: f64,
    pub magnetos: i32,
    pub starter: bool,
    pub starved: bool,
    pub dt: f64,
}

#[derive(Debug)]
pub struct Piston {
    // configuration
    min_map_pa: f64,
    max_map_pa: f64,
    displacement_m3: f64,
    max_hp: f64,
    cycles: f64,
    idle_rpm: f64,
    max_rpm: f64,
    spark_fail_drop: f64,
    min_throttle: f64,
    max_throttle: f64,
    starter_hp: f64,
    cylinder_head_mass: f64,

    // state
    crank_counter: u32,
    map_pa: f64,
    m_dot_air: f64,
    m_dot_fuel: f64,
    combustion_efficiency: f64,
    egt_k: f64,
    cht_k: f64,
    oil_temp_k: f64,

    // published
    running: Rc<Cell<bool>>,
    cranking: Rc<Cell<bool>>,
    hp: Rc<Cell<f64>>,
    map_inhg: Rc<Cell<f64>>,
    fuel_flow_gph: Rc<Cell<f64>>,
    fuel_flow_pps: Rc<Cell<f64>>,
    equivalence: Rc<Cell<f64>>,
    egt_degf: Rc<Cell<f64>>,
    cht_degf: Rc<Cell<f64>>,
    oil_temp_degf: Rc<Cell<f64>>,
    oil_pressure_psi: Rc<Cell<f64>>,
    bsfc: Rc<Cell<f64>>,
    volumetric_efficiency: Rc<Cell<f64>>,
}

impl Piston {
    /// Build from a `piston_engine` document.
    pub fn from_element(el: &Element) -> Result<Self, LoadError> {
        if el.name != "piston_engine" {
            return Err(LoadError::UnknownType {
                kind: "engine".into(),
                value: el.name.clone(),
            });
        }
        let max_hp = el.number_or("maxhp", 200.0)?.max(1.0);
        let displacement_m3 = el.number_or("displacement", 360.0)? * IN3_TO_M3;
        let cycles = el.number_or("cycles", 4.0)?.max(2.0);
        let max_rpm = el.number_or("maxrpm", 2800.0)?.max(1.0);
        let volumetric_efficiency = el.number_or("volumetric-efficiency", 0.85)?;
        let cylinders = el.number_or("cylinders", 4.0)?.max(1.0);

        let bsfc = match el.find_element_value_as_number("bsfc")? {
            Some(b) if b > 0.0 => b,
            // Fuel burn at full rich, full throttle and max RPM at sea level
            // is taken to produce max power.
            _ => {
                let swept = displacement_m3 * max_rpm / 60.0 / (cycles / 2.0);
                let m_dot_air = swept * volumetric_efficiency * 1.225;
                let m_dot_fuel = m_dot_air * 1.3 / STOICHIOMETRIC_AFR;
                m_dot_fuel * KG_TO_LBS * 3600.0 / max_hp
            }
        };

        Ok(Self {
            min_map_pa: el.number_or("minmp", 10.0)? * INHG_TO_PA,
            max_map_pa: el.number_or("maxmp", 28.5)? * INHG_TO_PA,
            displacement_m3,
            max_hp,
            cycles,
            idle_rpm: el.number_or("idlerpm", 600.0)?,
            max_rpm,
            spark_fail_drop: el.number_or("sparkfaildrop", 0.0)?.clamp(0.0, 1.0),
            min_throttle: el.number_or("minthrottle", 0.1)?.max(0.12),
            max_throttle: el.number_or("maxthrottle", 1.0)?,
            starter_hp: max_hp.sqrt() * 0.4,
            cylinder_head_mass: 2.0 * cylinders,
            crank_counter: 0,
            map_pa: SEA_LEVEL_PA,
            m_dot_air: 0.0,
            m_dot_fuel: 0.0,
            combustion_efficiency: 0.0,
            egt_k: 288.0,
            cht_k: 288.0,
            oil_temp_k: 288.0,
            running: Rc::new(Cell::new(false)),
            cranking: Rc::new(Cell::new(false)),
            hp: Rc::new(Cell::new(0.0)),
            map_inhg: Rc::new(Cell::new(0.0)),
            fuel_flow_gph: Rc::new(Cell::new(0.0)),
            fuel_flow_pps: Rc::new(Cell::new(0.0)),
            equivalence: Rc::new(Cell::new(0.0)),
            egt_degf: Rc::new(Cell::new(0.0)),
            cht_degf: Rc::new(Cell::new(0.0)),
            oil_temp_degf: Rc::new(Cell::new(0.0)),
            oil_pressure_psi: Rc::new(Cell::new(0.0)),
            bsfc: Rc::new(Cell::new(bsfc)),
            volumetric_efficiency: Rc::new(Cell::new(volumetric_efficiency)),
        })
    }

    /// Tie the engine's outputs under `prefix` (e.g. `propulsion/engine[0]`).
    pub fn bind(&self, ties: &mut TieSet, props: &PropertyNode, prefix: &str) -> Result<(), PropertyError> {
        ties.tie_flag(props, &format!("{prefix}/running"), &self.running)?;
        let cranking = Rc::clone(&self.cranking);
        ties.tie_read_only(props, &format!("{prefix}/cranking"), move || {
            if cranking.get() {
                1.0
            } else {
                0.0
            }
        })?;
        for (name, cell) in [
            ("power-hp", &self.hp),
            ("map-inhg", &self.map_inhg),
            ("fuel-flow-rate-gph", &self.fuel_flow_gph),
            ("fuel-flow-rate-pps", &self.fuel_flow_pps),
            ("equivalence-ratio", &self.equivalence),
            ("egt-degF", &self.egt_degf),
            ("cht-degF", &self.cht_degf),
            ("oil-temperature-degF", &self.oil_temp_degf),
            ("oil-pressure-psi", &self.oil_pressure_psi),
        ] {
            let c = Rc::clone(cell);
            ties.tie_read_only(props, &format!("{prefix}/{name}"), move || c.get())?;
        }
        ties.tie_value(props, &format!("{prefix}/bsfc-lbs_hphr"), &self.bsfc)?;
        ties.tie_value(
            props,
            &format!("{prefix}/volumetric-efficiency"),
            &self.volumetric_efficiency,
        )?;
        Ok(())
    }

    pub fn running(&self) -> bool {
        self.running.get()
    }

    pub fn cranking(&self) -> bool {
        self.cranking.get()
    }

    pub fn power_hp(&self) -> f64 {
        self.hp.get()
    }

    pub fn idle_rpm(&self) -> f64 {
        self.idle_rpm
    }

    /// Fuel burned per second at the last step, lbs/s.
    pub fn fuel_flow_pps(&self) -> f64 {
        self.fuel_flow_pps.get()
    }

    /// Return to the stopped, cold state at the given ambient temperature.
    pub fn reset(&mut self, ambient_r: f64) {
        let ambient_k = rankine_to_kelvin(ambient_r);
        self.running.set(false);
        self.cranking.set(false);
        self.crank_counter = 0;
        self.map_pa = SEA_LEVEL_PA;
        self.m_dot_air = 0.0;
        self.m_dot_fuel = 0.0;
        self.combustion_efficiency = 0.0;
        self.egt_k = ambient_k;
        self.cht_k = ambient_k;
        self.oil_temp_k = ambient_k;
        self.hp.set(0.0);
        self.fuel_flow_gph.set(0.0);
        self.fuel_flow_pps.set(0.0);
        self.oil_pressure_psi.set(0.0);
        self.publish_temperatures();
    }

    /// Put the engine in the running state without cranking.
    pub fn init_running(&mut self) {
        self.running.set(true);
        self.cranking.set(false);
        self.crank_counter = 0;
    }

    /// Advance one step at the given engine RPM. Returns brake horsepower,
    /// negative when the engine is absorbing power.
    pub fn calculate(&mut self, inp: &PistonInputs, rpm: f64) -> f64 {
        let p_amb = inp.pressure_psf * PSF_TO_PA;
        let t_amb = rankine_to_kelvin(inp.temperature_r);
        let throttle_angle =
            self.min_throttle + (self.max_throttle - self.min_throttle) * inp.throttle.clamp(0.0, 1.0);

        self.engine_startup(inp, rpm);
        self.manifold_pressure(p_amb, throttle_angle, rpm);
        self.air_flow(t_amb, rpm);
        self.fuel_flow(p_amb, inp);
        if self.running.get() && self.equivalence.get() < LEAN_CUTOUT_EQUIVALENCE {
            self.running.set(false);
        }
        let hp = self.engine_power(inp, rpm);
        self.exhaust_gas_temp(t_amb, inp.dt);
        self.cylinder_head_temp(t_amb, p_amb, inp, rpm);
        self.oil_temperature(t_amb, hp, inp.dt);
        self.oil_pressure(rpm);
        self.publish_temperatures();
        self.hp.set(hp);
        hp
    }

    fn engine_startup(&mut self, inp: &PistonInputs, rpm: f64) {
        let spark = inp.magnetos != 0;
        let fuel = !inp.starved;

        if inp.starter {
            if !self.cranking.get() {
                self.cranking.set(true);
                self.crank_counter = 0;
            }
        } else {
            self.cranking.set(false);
        }
        if self.cranking.get() {
            self.crank_counter += 1;
        }

        if !self.running.get() && spark && fuel {
            let fast_enough = rpm > self.idle_rpm * 0.8;
            if self.cranking.get() {
                if fast_enough && self.crank_counter > CRANK_FRAMES_TO_START {
                    self.running.set(true);
                }
            } else if fast_enough {
                // windmill start
                self.running.set(true);
            }
        }
        if self.running.get() && (!spark || !fuel) {
            self.running.set(false);
        }
    }

    fn manifold_pressure(&mut self, p_amb: f64, throttle_angle: f64, rpm: f64) {
        self.map_pa = if rpm > 10.0 {
            let max_map_percent = self.max_map_pa / SEA_LEVEL_PA;
            let throttle_area = (throttle_angle * 1.125 - 0.125).max(0.0);
            let coefficient = (throttle_area * max_map_percent).powf(rpm / self.max_rpm);
            (p_amb * coefficient).clamp(self.min_map_pa.min(p_amb), p_amb)
        } else {
            p_amb
        };
        self.map_inhg.set(self.map_pa / INHG_TO_PA);
    }

    fn air_flow(&mut self, t_amb: f64, rpm: f64) {
        let rho_manifold = self.map_pa / (R_AIR_SI * t_amb.max(1.0));
        let swept = self.displacement_m3 * rpm / 60.0 / (self.cycles / 2.0);
        self.m_dot_air = swept * self.volumetric_efficiency.get() * rho_manifold;
    }

    fn fuel_flow(&mut self, p_amb: f64, inp: &PistonInputs) {
        let equivalence = 1.3 * inp.mixture.clamp(0.0, 1.0) * SEA_LEVEL_PA / p_amb.max(1.0);
        self.equivalence.set(equivalence);
        self.m_dot_fuel = if inp.starved {
            0.0
        } else {
            self.m_dot_air * equivalence / STOICHIOMETRIC_AFR
        };
        let pps = self.m_dot_fuel * KG_TO_LBS;
        self.fuel_flow_pps.set(pps);
        self.fuel_flow_gph.set(pps * 3600.0 / FUEL_LBS_PER_GAL);
    }

    fn engine_power(&mut self, inp: &PistonInputs, rpm: f64) -> f64 {
        if self.running.get() {
            let fuel_air = if self.m_dot_air > 0.0 {
                self.m_dot_fuel / self.m_dot_air
            } else {
                0.0
            };
            let mixture_efficiency = interpolate(&MIXTURE_EFFICIENCY, fuel_air);
            let percent_rpm = rpm / self.max_rpm;
            let friction = 1.0 - percent_rpm.powi(3) / 10.0;
            let fuel_lbs_hr = self.m_dot_fuel * KG_TO_LBS * 3600.0;
            let mut hp = fuel_lbs_hr / self.bsfc.get().max(1e-6) * mixture_efficiency * friction;
            if inp.magnetos != 3 {
                hp *= 1.0 - self.spark_fail_drop;
            }
            if hp < 0.125 {
                self.running.set(false);
            }
            hp
        } else if self.cranking.get() {
            let taper = (1.0 - rpm / (self.idle_rpm * 1.5).max(1.0)).max(0.0);
            self.starter_hp * taper
        } else if rpm > 0.0 {
            -1.5
        } else {
            0.0
        }
    }

    fn exhaust_gas_temp(&mut self, t_amb: f64, dt: f64) {
        if self.running.get() && self.m_dot_air > 0.0 {
            self.combustion_efficiency = interpolate(&COMBUSTION_EFFICIENCY, self.equivalence.get());
            let enthalpy = self.m_dot_fuel * CALORIFIC_VALUE_FUEL * self.combustion_efficiency * 0.30;
            let heat_capacity = CP_AIR * self.m_dot_air + CP_FUEL * self.m_dot_fuel;
            self.egt_k = t_amb + enthalpy / heat_capacity;
        } else {
            self.combustion_efficiency = 0.0;
            self.egt_k += (298.0 - self.egt_k) / 100.0 * dt;
        }
    }

    fn cylinder_head_temp(&mut self, t_amb: f64, p_amb: f64, inp: &PistonInputs, rpm: f64) {
        const H1: f64 = -95.0;
        const H2: f64 = -3.95;
        const H3: f64 = -140.0;
        const CP_CYLINDER_HEAD: f64 = 800.0;

        let rho_air = p_amb / (R_AIR_SI * t_amb.max(1.0));
        let difference = self.cht_k - t_amb;
        let m_dot_cooling = inp.ias_kts.max(0.0) * KTS_TO_MPS * rho_air;
        let combustion = self.m_dot_fuel * CALORIFIC_VALUE_FUEL * self.combustion_efficiency * 0.33;
        let forced = H2 * m_dot_cooling * difference + H3 * rpm * difference / self.max_rpm;
        let free = H1 * difference;
        let heat_capacity = CP_CYLINDER_HEAD * self.cylinder_head_mass;
        self.cht_k += (combustion + forced + free) / heat_capacity * inp.dt;
    }

    fn oil_temperature(&mut self, t_amb: f64, hp: f64, dt: f64) {
        const IDLE_PERCENT_POWER: f64 = 0.023;
        let percent_power = hp / self.max_hp;
        let (target, time_constant) = if self.running.get() {
            let mut tc = 500.0;
            if percent_power > IDLE_PERCENT_POWER {
                tc /= (percent_power / IDLE_PERCENT_POWER) / 10.0;
            }
            (363.0, tc)
        } else {
            (t_amb, 1000.0)
        };
        self.oil_temp_k += (target - self.oil_temp_k) / time_constant * dt;
    }

    fn oil_pressure(&mut self, rpm: f64) {
        const RELIEF_VALVE_PSI: f64 = 60.0;
        const DESIGN_OIL_TEMP_K: f64 = 358.0;
        const VISCOSITY_INDEX: f64 = 0.25;
        let rpm_max = self.max_rpm * 0.75;
        let mut psi = (RELIEF_VALVE_PSI / rpm_max * rpm).min(RELIEF_VALVE_PSI);
        psi += (DESIGN_OIL_TEMP_K - self.oil_temp_k) * VISCOSITY_INDEX * psi / RELIEF_VALVE_PSI;
        self.oil_pressure_psi.set(psi);
    }

    fn publish_temperatures(&self) {
        self.egt_degf.set(kelvin_to_fahrenheit(self.egt_k));
        self.cht_degf.set(kelvin_to_fahrenheit(self.cht_k));
        self.oil_temp_degf.set(kelvin_to_fahrenheit(self.oil_temp_k));
    }
}
