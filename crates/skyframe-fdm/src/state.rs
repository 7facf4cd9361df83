//! Simulation clock and integration suspension.
//!
//! `State` is constructed after every model exists because it resolves the
//! propagated state properties the models published. Suspending integration
//! sets the effective time step to zero; it is idempotent, so suspending twice
//! and resuming once restores the original step.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::ic::InitialCondition;
use crate::AllocationError;

/// Propagated state written by [`State::initialize`].
pub const STATE_PROPERTIES: [&str; 6] = [
    "velocities/u-fps",
    "velocities/w-fps",
    "velocities/q-rad_sec",
    "attitude/theta-rad",
    "position/h-sl-ft",
    "position/distance-ft",
];

#[derive(Debug)]
pub struct State {
    sim_time: Rc<Cell<f64>>,
    dt: Rc<Cell<f64>>,
    saved_dt: f64,
    suspended: bool,
    targets: Vec<PropertyNode>,
    ties: TieSet,
}

impl State {
    pub fn new(props: &PropertyNode, dt: f64) -> Result<Self, AllocationError> {
        let mut targets = Vec::with_capacity(STATE_PROPERTIES.len());
        for path in STATE_PROPERTIES {
            let node = props
                .find(path)
                .filter(PropertyNode::is_tied)
                .ok_or_else(|| AllocationError::MissingStateProperty {
                    path: path.to_string(),
                })?;
            targets.push(node);
        }

        let sim_time = Rc::new(Cell::new(0.0));
        let dt_cell = Rc::new(Cell::new(dt));
        let mut ties = TieSet::new();
        let bind = |e| AllocationError::Bind {
            model: "state".to_string(),
            source: e,
        };
        let t = Rc::clone(&sim_time);
        ties.tie_read_only(props, "simulation/sim-time-sec", move || t.get())
            .map_err(bind)?;
        let d = Rc::clone(&dt_cell);
        ties.tie_read_only(props, "simulation/dt", move || d.get())
            .map_err(bind)?;

        Ok(Self {
            sim_time,
            dt: dt_cell,
            saved_dt: dt,
            suspended: false,
            targets,
            ties,
        })
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time.get()
    }

    pub fn set_sim_time(&self, t: f64) {
        self.sim_time.set(t);
    }

    /// Effective step: zero while suspended.
    pub fn dt(&self) -> f64 {
        self.dt.get()
    }

    /// Step that resumes after suspension.
    pub fn nominal_dt(&self) -> f64 {
        if self.suspended {
            self.saved_dt
        } else {
            self.dt.get()
        }
    }

    pub fn set_dt(&mut self, dt: f64) {
        if self.suspended {
            self.saved_dt = dt;
        } else {
            self.dt.set(dt);
        }
    }

    /// Advance the clock by the effective step and return the new time.
    pub fn incr_time(&self) -> f64 {
        let t = self.sim_time.get() + self.dt.get();
        self.sim_time.set(t);
        t
    }

    pub fn suspend_integration(&mut self) {
        if !self.suspended {
            self.saved_dt = self.dt.get();
            self.dt.set(0.0);
            self.suspended = true;
        }
    }

    pub fn resume_integration(&mut self) {
        if self.suspended {
            self.dt.set(self.saved_dt);
            self.suspended = false;
        }
    }

    pub fn integration_suspended(&self) -> bool {
        self.suspended
    }

    /// Reset the clock to zero and copy the initial condition into the
    /// propagated state.
    pub fn initialize(&self, ic: &InitialCondition) -> Result<(), PropertyError> {
        self.sim_time.set(0.0);
        let values = [
            ic.u_fps(),
            ic.w_fps(),
            ic.q_rad_sec(),
            ic.theta_rad(),
            ic.h_sl_ft(),
            ic.distance_ft(),
        ];
        for (node, value) in self.targets.iter().zip(values) {
            node.set_double(value)?;
        }
        Ok(())
    }

    pub fn tie_count(&self) -> usize {
        self.ties.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_state(root: &PropertyNode, ties: &mut TieSet) -> Vec<Rc<Cell<f64>>> {
        STATE_PROPERTIES
            .iter()
            .map(|p| {
                let cell = Rc::new(Cell::new(-1.0));
                ties.tie_value(root, p, &cell).unwrap();
                cell
            })
            .collect()
    }

    #[test]
    fn missing_state_property_is_fatal() {
        let root = PropertyManager::new().root();
        assert!(matches!(
            State::new(&root, 0.01),
            Err(AllocationError::MissingStateProperty { .. })
        ));
    }

    #[test]
    fn suspension_is_idempotent() {
        let root = PropertyManager::new().root();
        let mut ties = TieSet::new();
        publish_state(&root, &mut ties);
        let mut state = State::new(&root, 0.5).unwrap();
        state.suspend_integration();
        state.suspend_integration();
        assert_eq!(state.dt(), 0.0);
        assert_eq!(state.incr_time(), 0.0);
        state.resume_integration();
        assert_eq!(state.dt(), 0.5);
        assert!(!state.integration_suspended());
        assert_eq!(state.incr_time(), 0.5);
        assert_eq!(root.get_double_at("simulation/sim-time-sec"), Some(0.5));
    }

    #[test]
    fn initialize_writes_state_and_resets_clock() {
        let root = PropertyManager::new().root();
        let mut ties = TieSet::new();
        let cells = publish_state(&root, &mut ties);
        let state = State::new(&root, 0.1).unwrap();
        state.set_sim_time(12.0);
        let ic = InitialCondition::new(&root).unwrap();
        ic.set_h_sl_ft(2500.0);
        ic.set_vt_alpha(120.0, 0.0);
        state.initialize(&ic).unwrap();
        assert_eq!(state.sim_time(), 0.0);
        assert_eq!(cells[0].get(), 120.0);
        assert_eq!(cells[4].get(), 2500.0);
    }
}
