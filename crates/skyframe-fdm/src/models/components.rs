//! Flight-control components: gains, summers, lag filters and sensors.
//!
//! Each component reads one or more input properties, produces one value
//! published read-only at `fcs/<name>`, optionally clips it, and optionally
//! writes it to an explicit `output` property.

use std::cell::Cell;
use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use skyframe_props::prelude::*;

use crate::config::Element;
use crate::LoadError;

/// Accept a `min`/`max` pair only when both bounds are finite and ordered.
fn checked_range(element: &str, min: f64, max: f64) -> Result<(f64, f64), LoadError> {
    if min.is_finite() && max.is_finite() && min <= max {
        Ok((min, max))
    } else {
        Err(LoadError::InvalidRange {
            element: element.into(),
            min,
            max,
        })
    }
}

/// Property-friendly form of a component name.
pub fn property_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseKind {
    Percent,
    Absolute,
}

// ---------------------------------------------------------------------------
// Sensor
// ---------------------------------------------------------------------------

/// Degrades a perfect measurement: lag, noise, drift, quantization, bias
/// and failure modes.
#[derive(Debug)]
pub struct Sensor {
    ca: f64,
    cb: f64,
    lag: f64,
    noise_variance: f64,
    noise_kind: NoiseKind,
    drift_rate: f64,
    drift: f64,
    bias: f64,
    bits: u32,
    min: f64,
    max: f64,
    granularity: f64,
    quantized: Rc<Cell<f64>>,
    fail_low: Rc<Cell<bool>>,
    fail_high: Rc<Cell<bool>>,
    fail_stuck: Rc<Cell<bool>>,
    previous_input: f64,
    previous_output: f64,
    rng: Pcg64,
    seed: u64,
    dt: f64,
}

impl Sensor {
    fn from_element(el: &Element, dt: f64, seed: u64) -> Result<Self, LoadError> {
        let lag = el.number_or("lag", 0.0)?;
        let denom = 2.0 + dt * lag;
        let (noise_variance, noise_kind) = match el.find_element("noise") {
            None => (0.0, NoiseKind::Absolute),
            Some(noise) => {
                let kind = match noise.attribute("variation").as_deref() {
                    Some("PERCENT") => NoiseKind::Percent,
                    Some("ABSOLUTE") | None => NoiseKind::Absolute,
                    Some(other) => {
                        return Err(LoadError::UnknownType {
                            kind: "noise variation".into(),
                            value: other.into(),
                        })
                    }
                };
                (noise.value_as_number()?, kind)
            }
        };
        let (bits, min, max) = match el.find_element("quantization") {
            None => (0, 0.0, 0.0),
            Some(q) => {
                let (min, max) =
                    checked_range("quantization", q.number_or("min", 0.0)?, q.number_or("max", 0.0)?)?;
                (q.number_or("bits", 0.0)? as u32, min, max)
            }
        };
        let divisions = if bits > 0 { (1u64 << bits.min(52)) as f64 } else { 1.0 };
        Ok(Self {
            ca: dt * lag / denom,
            cb: (2.0 - dt * lag) / denom,
            lag,
            noise_variance,
            noise_kind,
            drift_rate: el.number_or("drift_rate", 0.0)?,
            drift: 0.0,
            bias: el.number_or("bias", 0.0)?,
            bits,
            min,
            max,
            granularity: (max - min) / divisions,
            quantized: Rc::new(Cell::new(0.0)),
            fail_low: Rc::new(Cell::new(false)),
            fail_high: Rc::new(Cell::new(false)),
            fail_stuck: Rc::new(Cell::new(false)),
            previous_input: 0.0,
            previous_output: 0.0,
            rng: Pcg64::seed_from_u64(seed),
            seed,
            dt,
        })
    }

    fn bind(&self, ties: &mut TieSet, props: &PropertyNode, prefix: &str) -> Result<(), PropertyError> {
        ties.tie_flag(props, &format!("{prefix}/malfunction/fail_low"), &self.fail_low)?;
        ties.tie_flag(props, &format!("{prefix}/malfunction/fail_high"), &self.fail_high)?;
        ties.tie_flag(props, &format!("{prefix}/malfunction/fail_stuck"), &self.fail_stuck)?;
        if self.bits > 0 {
            let q = Rc::clone(&self.quantized);
            ties.tie_read_only(props, &format!("{prefix}/quantized"), move || q.get())?;
        }
        Ok(())
    }

    fn process(&mut self, input: f64) -> f64 {
        if self.fail_stuck.get() {
            return self.previous_output;
        }
        let mut out = input;
        if self.lag != 0.0 {
            out = self.ca * (input + self.previous_input) + self.cb * self.previous_output;
        }
        self.previous_input = input;
        if self.noise_variance != 0.0 {
            let r: f64 = self.rng.gen_range(-0.5..0.5);
            match self.noise_kind {
                NoiseKind::Percent => out *= 1.0 + self.noise_variance * r,
                NoiseKind::Absolute => out += self.noise_variance * r,
            }
        }
        if self.drift_rate != 0.0 {
            self.drift += self.drift_rate * self.dt;
            out += self.drift;
        }
        if self.bits > 0 && self.granularity > 0.0 {
            let clamped = out.clamp(self.min, self.max);
            let steps = ((clamped - self.min) / self.granularity).floor();
            self.quantized.set(steps);
            out = self.min + steps * self.granularity;
        }
        out += self.bias;
        if self.fail_low.get() {
            out = f64::NEG_INFINITY;
        }
        if self.fail_high.get() {
            out = f64::INFINITY;
        }
        self.previous_output = out;
        out
    }

    fn reset(&mut self) {
        self.drift = 0.0;
        self.previous_input = 0.0;
        self.previous_output = 0.0;
        self.rng = Pcg64::seed_from_u64(self.seed);
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Kind {
    PureGain { gain: f64 },
    Summer { bias: f64 },
    LagFilter { ca: f64, cb: f64, prev_in: f64, prev_out: f64 },
    Sensor(Box<Sensor>),
}

#[derive(Debug)]
pub struct Component {
    name: String,
    inputs: Vec<(PropertyNode, f64)>,
    output: Rc<Cell<f64>>,
    output_node: Option<PropertyNode>,
    clip: Option<(f64, f64)>,
    kind: Kind,
}

impl Component {
    /// Build from a component element. Ties are recorded in `ties`.
    pub fn from_element(
        el: &Element,
        props: &PropertyNode,
        ties: &mut TieSet,
        dt: f64,
        seed: u64,
    ) -> Result<Self, LoadError> {
        let name = el.require_attribute("name")?;
        let kind = match el.name.as_str() {
            "pure_gain" => Kind::PureGain {
                gain: el.number_or("gain", 1.0)?,
            },
            "summer" => Kind::Summer {
                bias: el.number_or("bias", 0.0)?,
            },
            "lag_filter" => {
                let c1 = el.require_number("c1")?;
                let denom = 2.0 + dt * c1;
                Kind::LagFilter {
                    ca: dt * c1 / denom,
                    cb: (2.0 - dt * c1) / denom,
                    prev_in: 0.0,
                    prev_out: 0.0,
                }
            }
            "sensor" => Kind::Sensor(Box::new(Sensor::from_element(el, dt, seed)?)),
            other => {
                return Err(LoadError::UnknownType {
                    kind: "flight control component".into(),
                    value: other.into(),
                })
            }
        };

        let mut inputs = Vec::new();
        for input in el.find_elements("input") {
            let raw = input.text().unwrap_or_default();
            let (path, sign) = match raw.strip_prefix('-') {
                Some(rest) => (rest.trim().to_string(), -1.0),
                None => (raw, 1.0),
            };
            inputs.push((props.get_or_create(&path)?, sign));
        }
        if inputs.is_empty() {
            return Err(crate::ConfigError::MissingElement {
                parent: name,
                name: "input".into(),
            }
            .into());
        }

        let clip = match el.find_element("clipto") {
            None => None,
            Some(c) => Some(checked_range("clipto", c.require_number("min")?, c.require_number("max")?)?),
        };
        let output_node = match el.find_element("output").and_then(Element::text) {
            None => None,
            Some(path) => Some(props.get_or_create(&path)?),
        };

        let component = Self {
            name,
            inputs,
            output: Rc::new(Cell::new(0.0)),
            output_node,
            clip,
            kind,
        };
        let prefix = format!("fcs/{}", property_name(&component.name));
        let out = Rc::clone(&component.output);
        ties.tie_read_only(props, &prefix, move || out.get())?;
        if let Kind::Sensor(sensor) = &component.kind {
            sensor.bind(ties, props, &prefix)?;
        }
        Ok(component)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> f64 {
        self.output.get()
    }

    pub fn run(&mut self) {
        let input = match self.kind {
            Kind::Summer { .. } => self.inputs.iter().map(|(n, s)| n.get_double() * s).sum(),
            _ => self.inputs[0].0.get_double() * self.inputs[0].1,
        };
        let mut out = match &mut self.kind {
            Kind::PureGain { gain } => input * *gain,
            Kind::Summer { bias } => input + *bias,
            Kind::LagFilter {
                ca,
                cb,
                prev_in,
                prev_out,
            } => {
                let y = *ca * (input + *prev_in) + *cb * *prev_out;
                *prev_in = input;
                *prev_out = y;
                y
            }
            Kind::Sensor(sensor) => sensor.process(input),
        };
        if let Some((lo, hi)) = self.clip {
            out = out.clamp(lo, hi);
        }
        self.output.set(out);
        if let Some(node) = &self.output_node {
            if let Err(e) = node.set_double(out) {
                tracing::warn!(component = %self.name, error = %e, "component output not written");
            }
        }
    }

    pub fn reset(&mut self) {
        self.output.set(0.0);
        match &mut self.kind {
            Kind::LagFilter {
                prev_in, prev_out, ..
            } => {
                *prev_in = 0.0;
                *prev_out = 0.0;
            }
            Kind::Sensor(sensor) => sensor.reset(),
            _ => {}
        }
    }
}
