//! The model contract.
//!
//! A [`Model`] is one physics subsystem in the executive's schedule. Models
//! are constructed (and tie their properties) during allocation, initialized
//! once every sibling exists, optionally configured from a document section,
//! and then run once per frame in schedule order.
//!
//! Every model embeds a [`ModelBase`] holding its name, execution rate,
//! enabled flag and the [`TieSet`] of properties it published. Rate gating
//! lives in [`ModelBase::gate`]: the executive calls every model every frame
//! and each model decides whether this call computes.

use std::any::Any;
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::Element;
use crate::debug::DebugLevel;
use crate::ground::GroundCallback;
use crate::{LoadError, ModelError};

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// What a model did with one `run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The model computed this frame.
    Computed,
    /// Not this model's turn under its execution rate.
    RateSkipped,
    /// The simulation is holding; nothing was mutated.
    Held,
    /// The model's enabled flag is off.
    Disabled,
    /// Nothing is configured for this model to do.
    Idle,
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Requests a model may raise toward the executive during a frame. They are
/// applied after the whole schedule has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Hold,
    Resume,
    /// Resume for exactly this many frames, then hold again.
    Iterate(u32),
}

/// Per-frame inputs handed to [`Model::run`].
pub struct FrameContext<'a> {
    /// The executive's instance node; all model paths resolve against it.
    pub props: &'a PropertyNode,
    pub ground: &'a dyn GroundCallback,
    /// Effective time step. Zero while integration is suspended.
    pub dt: f64,
    pub sim_time: f64,
    pub frame: u64,
    pub holding: bool,
    pub integration_suspended: bool,
    pub requests: Vec<ControlRequest>,
}

/// Which flight-control list a `system`-like section feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKind {
    System,
    Autopilot,
    FlightControl,
}

/// Directories used to resolve auxiliary documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelPaths {
    pub aircraft: PathBuf,
    pub engine: PathBuf,
    pub systems: PathBuf,
    /// Aircraft directory with the model name appended when requested.
    pub full_aircraft: PathBuf,
}

/// Inputs handed to [`Model::load`].
pub struct LoadContext<'a> {
    pub props: &'a PropertyNode,
    pub paths: &'a ModelPaths,
    pub system_kind: SystemKind,
    /// Nominal frame time step.
    pub dt: f64,
    pub debug: DebugLevel,
}

// ---------------------------------------------------------------------------
// ModelBase
// ---------------------------------------------------------------------------

/// State shared by every model.
#[derive(Debug)]
pub struct ModelBase {
    name: String,
    rate: u32,
    exe_ctr: u32,
    enabled: Rc<Cell<bool>>,
    debug: DebugLevel,
    /// Ties this model published; released when the model is dropped.
    pub ties: TieSet,
}

impl ModelBase {
    pub fn new(name: impl Into<String>, debug: DebugLevel) -> Self {
        let base = Self {
            name: name.into(),
            rate: 1,
            exe_ctr: 1,
            enabled: Rc::new(Cell::new(true)),
            debug,
            ties: TieSet::new(),
        };
        if debug.instantiation() {
            tracing::debug!(model = %base.name, "Instantiated");
        }
        base
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Run every `rate` frames. Zero is treated as one.
    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate.max(1);
        self.exe_ctr = 1;
    }

    pub fn debug(&self) -> DebugLevel {
        self.debug
    }

    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, on: bool) {
        self.enabled.set(on);
    }

    /// Shared handle to the enabled flag, for tying.
    pub fn enabled_cell(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.enabled)
    }

    /// Restart the rate cycle.
    pub fn reset_counter(&mut self) {
        self.exe_ctr = 1;
    }

    /// Advance the rate cycle. Returns `true` on the call that computes.
    pub fn rate_gate(&mut self) -> bool {
        let compute = self.exe_ctr == 1;
        self.exe_ctr = if self.exe_ctr >= self.rate { 1 } else { self.exe_ctr + 1 };
        compute
    }

    /// Base dispatch shared by all models: rate gating, then the enabled
    /// flag, then the holding short-circuit. `None` means "compute now".
    pub fn gate(&mut self, ctx: &FrameContext<'_>) -> Option<Step> {
        if !self.rate_gate() {
            return Some(Step::RateSkipped);
        }
        if !self.enabled() {
            return Some(Step::Disabled);
        }
        if ctx.holding {
            return Some(Step::Held);
        }
        None
    }
}

impl Drop for ModelBase {
    fn drop(&mut self) {
        self.ties.untie_all();
        if self.debug.instantiation() {
            tracing::debug!(model = %self.name, "Destroyed");
        }
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Capability interface of a physics subsystem.
pub trait Model: Any {
    fn base(&self) -> &ModelBase;

    fn base_mut(&mut self) -> &mut ModelBase;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Configure from a document section. Models without configurable
    /// content accept any section.
    fn load(&mut self, _el: &Element, _ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        Ok(())
    }

    /// Reset internal state to defaults. Safe to call repeatedly; called once
    /// after every sibling exists and again on every full reset.
    fn init_model(&mut self, _props: &PropertyNode) -> Result<(), ModelError> {
        self.base_mut().reset_counter();
        Ok(())
    }

    /// Execute one frame.
    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step;

    fn name(&self) -> &str {
        self.base().name()
    }

    /// Remove every tie this model made. Used before a replacement binds
    /// the same paths.
    fn release(&mut self) -> usize {
        self.base_mut().ties.untie_all()
    }
}

/// Implements the boilerplate accessors of [`Model`] for a struct with a
/// `base: ModelBase` field.
#[macro_export]
macro_rules! model_accessors {
    () => {
        fn base(&self) -> &$crate::model::ModelBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::model::ModelBase {
            &mut self.base
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground::FlatGround;

    fn ctx<'a>(props: &'a PropertyNode, ground: &'a FlatGround, holding: bool) -> FrameContext<'a> {
        FrameContext {
            props,
            ground,
            dt: 0.01,
            sim_time: 0.0,
            frame: 0,
            holding,
            integration_suspended: false,
            requests: Vec::new(),
        }
    }

    #[test]
    fn rate_gate_computes_first_call_of_each_cycle() {
        let mut base = ModelBase::new("m", DebugLevel::SILENT);
        base.set_rate(3);
        let pattern: Vec<bool> = (0..7).map(|_| base.rate_gate()).collect();
        assert_eq!(pattern, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn gate_order_is_rate_enabled_holding() {
        let root = PropertyManager::new().root();
        let ground = FlatGround::default();
        let mut base = ModelBase::new("m", DebugLevel::SILENT);
        assert_eq!(base.gate(&ctx(&root, &ground, false)), None);
        assert_eq!(base.gate(&ctx(&root, &ground, true)), Some(Step::Held));
        base.set_enabled(false);
        assert_eq!(base.gate(&ctx(&root, &ground, false)), Some(Step::Disabled));
        base.set_enabled(true);
        base.set_rate(2);
        assert_eq!(base.gate(&ctx(&root, &ground, false)), None);
        assert_eq!(base.gate(&ctx(&root, &ground, false)), Some(Step::RateSkipped));
    }

    #[test]
    fn dropping_the_base_releases_its_ties() {
        let root = PropertyManager::new().root();
        {
            let mut base = ModelBase::new("m", DebugLevel::SILENT);
            base.ties.tie_read_only(&root, "m/out", || 1.0).unwrap();
            assert!(root.find("m/out").unwrap().is_tied());
        }
        assert!(!root.find("m/out").unwrap().is_tied());
    }
}
