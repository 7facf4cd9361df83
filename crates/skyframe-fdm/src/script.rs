//! Scripted runs: a time window plus condition-triggered events.
//!
//! A script document looks like:
//!
//! ```json
//! {
//!   "name": "engine start",
//!   "run": { "start": 0.0, "end": 5.0, "dt": 0.008333 },
//!   "events": [
//!     {
//!       "name": "start",
//!       "conditions": [{ "property": "simulation/sim-time-sec", "op": "ge", "value": 0.25 }],
//!       "set": [{ "property": "propulsion/set-running", "value": -1 }],
//!       "notify": ["propulsion/engine[0]/running"]
//!     }
//!   ]
//! }
//! ```
//!
//! Events fire on the frame their conditions first all hold. A persistent
//! event re-arms once its conditions stop holding; any other event fires at
//! most once per run.

use std::path::Path;

use serde::{Deserialize, Serialize};
use skyframe_props::prelude::PropertyNode;

use crate::config::read_json;
use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub property: String,
    pub op: Comparison,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetAction {
    #[default]
    Set,
    Increment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub property: String,
    pub value: f64,
    #[serde(default)]
    pub action: SetAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    pub name: String,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub set: Vec<Assignment>,
    #[serde(default)]
    pub notify: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunWindow {
    #[serde(default)]
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub dt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptFile {
    #[serde(default)]
    pub name: Option<String>,
    pub run: RunWindow,
    #[serde(default)]
    pub events: Vec<EventSpec>,
}

#[derive(Debug)]
struct Event {
    spec: EventSpec,
    triggered: bool,
    fire_count: u32,
}

#[derive(Debug)]
pub struct Script {
    name: String,
    window: RunWindow,
    events: Vec<Event>,
}

impl Script {
    pub fn from_file(file: ScriptFile) -> Result<Self, ConfigError> {
        if !(file.run.end >= file.run.start) {
            return Err(ConfigError::InvalidNumber {
                element: "run".into(),
                value: format!("end {} before start {}", file.run.end, file.run.start),
            });
        }
        if let Some(dt) = file.run.dt {
            if !(dt > 0.0) {
                return Err(ConfigError::InvalidNumber {
                    element: "dt".into(),
                    value: dt.to_string(),
                });
            }
        }
        Ok(Self {
            name: file.name.unwrap_or_else(|| "unnamed".into()),
            window: file.run,
            events: file
                .events
                .into_iter()
                .map(|spec| Event {
                    spec,
                    triggered: false,
                    fire_count: 0,
                })
                .collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_file(read_json(path)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time step requested by the script, if any.
    pub fn dt(&self) -> Option<f64> {
        self.window.dt
    }

    pub fn end_time(&self) -> f64 {
        self.window.end
    }

    /// How many times the named event has fired since the last reset.
    pub fn fire_count(&self, event: &str) -> Option<u32> {
        self.events
            .iter()
            .find(|e| e.spec.name == event)
            .map(|e| e.fire_count)
    }

    /// Evaluate every event at `sim_time`. Returns `false` once the run
    /// window has ended.
    pub fn run_script(&mut self, props: &PropertyNode, sim_time: f64) -> bool {
        if sim_time > self.window.end {
            return false;
        }
        if sim_time < self.window.start {
            return true;
        }
        for event in &mut self.events {
            let holds = event.spec.conditions.iter().all(|c| match props.get_double_at(&c.property) {
                Some(v) => c.op.holds(v, c.value),
                None => false,
            });
            if holds && !event.triggered {
                fire(&event.spec, props, sim_time);
                event.triggered = true;
                event.fire_count += 1;
            } else if !holds && event.spec.persistent {
                event.triggered = false;
            }
        }
        true
    }

    /// Re-arm every event.
    pub fn reset_events(&mut self) {
        for event in &mut self.events {
            event.triggered = false;
            event.fire_count = 0;
        }
    }
}

fn fire(spec: &EventSpec, props: &PropertyNode, sim_time: f64) {
    for a in &spec.set {
        let Some(node) = props.find(&a.property) else {
            tracing::warn!(event = %spec.name, property = %a.property, "event target does not exist");
            continue;
        };
        let value = match a.action {
            SetAction::Set => a.value,
            SetAction::Increment => node.get_double() + a.value,
        };
        if let Err(e) = node.set_double(value) {
            tracing::warn!(event = %spec.name, property = %a.property, error = %e, "event assignment failed");
        }
    }
    tracing::info!(event = %spec.name, sim_time, "event fired");
    for path in &spec.notify {
        match props.get_double_at(path) {
            Some(value) => tracing::info!(event = %spec.name, property = %path, value, "notify"),
            None => tracing::warn!(event = %spec.name, property = %path, "notify property does not exist"),
        }
    }
}
