//! The executive: owns the model schedule, the instance property node, the
//! simulation clock and any slave executives, and drives the frame loop.
//!
//! # Frame order
//!
//! One call to [`Executive::run`]:
//!
//! 1. returns `false` at once when nothing is scheduled,
//! 2. services a pending trim request written straight into the store,
//! 3. runs slave executives when stepping is [`SlaveStepping::Lockstep`],
//! 4. evaluates the script unless integration is suspended,
//! 5. runs every scheduled model in insertion order,
//! 6. increments the frame counter and applies hold/resume requests,
//! 7. advances simulation time unless holding,
//! 8. returns `false` when termination has been requested.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::{load_document, Element, NEEDED_CFG_VERSION};
use crate::debug::DebugLevel;
use crate::ground::{FlatGround, GroundCallback};
use crate::ic::InitialCondition;
use crate::model::{ControlRequest, FrameContext, LoadContext, Model, ModelPaths, SystemKind};
use crate::models::aerodynamics::Aerodynamics;
use crate::models::aircraft::Aircraft;
use crate::models::atmosphere::{Atmosphere, AtmosphereProfile, StandardAtmosphere};
use crate::models::auxiliary::Auxiliary;
use crate::models::buoyant_forces::BuoyantForces;
use crate::models::external_reactions::ExternalReactions;
use crate::models::fcs::FlightControl;
use crate::models::ground_reactions::GroundReactions;
use crate::models::inertial::Inertial;
use crate::models::input::{Input, InputHandle};
use crate::models::mass_balance::MassBalance;
use crate::models::output::Output;
use crate::models::propagate::Propagate;
use crate::models::propulsion::Propulsion;
use crate::script::Script;
use crate::slave::SlaveFdm;
use crate::state::State;
use crate::trim::{Trim, TrimMode, TrimReport};
use crate::units::EARTH_RADIUS_FT;
use crate::{AllocationError, ConfigError, LoadError, ModelError, TrimError};

/// Terrain used when no ground callback is installed.
static FALLBACK_GROUND: FlatGround = FlatGround::new(EARTH_RADIUS_FT, 0.0);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Whether slave executives are advanced by their parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlaveStepping {
    /// Slaves are stepped by the caller through [`Executive::slaves_mut`].
    #[default]
    Detached,
    /// Every real slave runs once at the start of each parent frame.
    Lockstep,
}

/// Construction parameters for an [`Executive`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecConfig {
    /// Fixed frame time step, seconds.
    pub dt: f64,
    /// Explicit verbosity. `None` reads `SKYFRAME_DEBUG`.
    pub debug: Option<DebugLevel>,
    /// How slave executives are advanced.
    pub slave_stepping: SlaveStepping,
    /// Where the first executive on a root publishes its properties. Later
    /// executives sharing the root get `[n]` appended.
    pub instance_path: String,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 120.0,
            debug: None,
            slave_stepping: SlaveStepping::Detached,
            instance_path: "/fdm/skyframe".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Executive
// ---------------------------------------------------------------------------

/// Owns the model schedule, the instance property node, the clock and any
/// slave executives.
///
/// Every built-in model is allocated at construction, so a freshly created
/// executive already runs. [`load_model`](Self::load_model) configures the
/// models from an aircraft document.
pub struct Executive {
    config: ExecConfig,
    debug: DebugLevel,
    manager: Rc<PropertyManager>,
    instance_index: usize,
    instance: PropertyNode,

    models: Vec<Box<dyn Model>>,
    /// Schedule slots holding output sinks, in load order.
    outputs: Vec<usize>,
    state: Option<State>,
    ic: Option<InitialCondition>,
    ground: Option<Box<dyn GroundCallback>>,
    script: Option<Script>,
    trim: Option<Trim>,
    input: Option<InputHandle>,
    slaves: Vec<SlaveFdm>,
    catalog: PropertyCatalog,

    frame: Rc<Cell<u64>>,
    terminate: Rc<Cell<bool>>,
    trim_request: Rc<Cell<Option<i32>>>,
    holding: bool,
    iterations_left: Option<u32>,

    model_loaded: bool,
    load_attempted: bool,
    add_model_to_path: bool,
    paths: ModelPaths,
    aircraft_name: String,
    /// Aircraft being loaded by the executives above this one, outermost first.
    ancestry: Vec<String>,
    error_count: u32,
    ties: TieSet,
}

impl Executive {
    /// Create an executive with its own private property namespace.
    pub fn new(config: ExecConfig) -> Result<Self, AllocationError> {
        Self::with_root(config, PropertyManager::new())
    }

    /// Create an executive publishing into a shared namespace.
    pub fn with_root(config: ExecConfig, manager: Rc<PropertyManager>) -> Result<Self, AllocationError> {
        let debug = config.debug.unwrap_or_else(DebugLevel::from_env);
        let instance_index = manager.acquire_instance();
        let path = if instance_index == 0 {
            config.instance_path.clone()
        } else {
            format!("{}[{instance_index}]", config.instance_path)
        };
        let bind = |source| AllocationError::Bind {
            model: "executive".into(),
            source,
        };
        let instance = match manager.root().get_or_create(&path) {
            Ok(node) => node,
            Err(e) => {
                manager.release_instance(instance_index);
                return Err(bind(e));
            }
        };

        let mut exec = Self {
            config,
            debug,
            manager,
            instance_index,
            instance,
            models: Vec::new(),
            outputs: Vec::new(),
            state: None,
            ic: None,
            ground: None,
            script: None,
            trim: None,
            input: None,
            slaves: vec![SlaveFdm::identity()],
            catalog: PropertyCatalog::new(),
            frame: Rc::new(Cell::new(0)),
            terminate: Rc::new(Cell::new(false)),
            trim_request: Rc::new(Cell::new(None)),
            holding: false,
            iterations_left: None,
            model_loaded: false,
            load_attempted: false,
            add_model_to_path: true,
            paths: ModelPaths::default(),
            aircraft_name: String::new(),
            ancestry: Vec::new(),
            error_count: 0,
            ties: TieSet::new(),
        };
        exec.bind().map_err(bind)?;
        exec.allocate()?;
        if debug.startup() {
            tracing::info!(instance = %path, dt = exec.config.dt, "flight dynamics executive created");
        }
        Ok(exec)
    }

    fn bind(&mut self) -> Result<(), PropertyError> {
        let props = &self.instance;
        self.ties.tie_flag(props, "simulation/terminate", &self.terminate)?;
        let request = Rc::clone(&self.trim_request);
        self.ties
            .tie_write_only(props, "simulation/do_simple_trim", move |v| request.set(Some(v as i32)))?;
        let frame = Rc::clone(&self.frame);
        self.ties
            .tie_read_only(props, "simulation/frame", move || frame.get() as f64)?;
        Ok(())
    }

    // -- lifecycle ----------------------------------------------------------

    /// Construct, initialize and schedule every built-in model.
    pub fn allocate(&mut self) -> Result<(), AllocationError> {
        let props = self.instance.clone();
        let debug = self.debug;
        let bind = |model: &'static str| {
            move |source| AllocationError::Bind {
                model: model.into(),
                source,
            }
        };

        let input = Input::new(debug);
        let handle = input.handle();
        let mut built: Vec<Box<dyn Model>> = Vec::with_capacity(13);
        built.push(Box::new(
            Atmosphere::new(&props, Box::new(StandardAtmosphere), debug).map_err(bind("atmosphere"))?,
        ));
        built.push(Box::new(FlightControl::new(&props, debug).map_err(bind("fcs"))?));
        built.push(Box::new(Propulsion::new(&props, debug).map_err(bind("propulsion"))?));
        built.push(Box::new(MassBalance::new(&props, debug).map_err(bind("mass_balance"))?));
        built.push(Box::new(Aerodynamics::new(&props, debug).map_err(bind("aerodynamics"))?));
        built.push(Box::new(Inertial::new(&props, debug).map_err(bind("inertial"))?));
        built.push(Box::new(GroundReactions::new(&props, debug).map_err(bind("ground_reactions"))?));
        built.push(Box::new(ExternalReactions::new(&props, debug).map_err(bind("external_reactions"))?));
        built.push(Box::new(BuoyantForces::new(&props, debug).map_err(bind("buoyant_forces"))?));
        built.push(Box::new(Aircraft::new(&props, debug).map_err(bind("aircraft"))?));
        built.push(Box::new(Propagate::new(&props, debug).map_err(bind("propagate"))?));
        built.push(Box::new(Auxiliary::new(&props, debug).map_err(bind("auxiliary"))?));
        built.push(Box::new(input));

        let radius = built
            .iter()
            .find_map(|m| m.as_any().downcast_ref::<Inertial>())
            .map_or(EARTH_RADIUS_FT, Inertial::sea_level_radius);
        self.ground = Some(Box::new(FlatGround::new(radius, 0.0)));

        for model in built.iter_mut() {
            model.init_model(&props).map_err(|source| AllocationError::Init {
                model: model.name().to_string(),
                source,
            })?;
        }

        self.state = Some(State::new(&props, self.config.dt)?);
        self.ic = Some(InitialCondition::new(&props).map_err(bind("initial_condition"))?);
        for model in built {
            self.schedule(model, 1);
        }
        self.input = Some(handle);
        if debug.startup() {
            tracing::info!(models = self.models.len(), "executive allocated");
        }
        Ok(())
    }

    /// Destroy every model and output sink, newest first, and drop the
    /// state, initial condition, trim, script, ground callback and slaves.
    /// The property catalog survives so a failed reload leaves it intact.
    pub fn deallocate(&mut self) {
        while let Some(model) = self.models.pop() {
            drop(model);
        }
        self.outputs.clear();
        self.ic = None;
        self.state = None;
        self.trim = None;
        self.script = None;
        self.ground = None;
        self.input = None;
        self.slaves.truncate(1);
        self.model_loaded = false;
        if self.debug.instantiation() {
            tracing::debug!("executive deallocated");
        }
    }

    /// Append a model to the schedule and return its slot.
    pub fn schedule(&mut self, mut model: Box<dyn Model>, rate: u32) -> usize {
        model.base_mut().set_rate(rate);
        if self.debug.instantiation() {
            tracing::debug!(model = model.name(), rate = model.base().rate(), "scheduled");
        }
        self.models.push(model);
        self.models.len() - 1
    }

    // -- frame loop ---------------------------------------------------------

    /// Advance one frame. `true` means continue.
    pub fn run(&mut self) -> bool {
        if self.models.is_empty() {
            return false;
        }
        self.service_trim_request();

        if self.config.slave_stepping == SlaveStepping::Lockstep {
            for slave in self.slaves.iter_mut().skip(1) {
                slave.run();
            }
        }

        let mut success = true;
        if let (Some(script), Some(state)) = (self.script.as_mut(), self.state.as_ref()) {
            if !state.integration_suspended() {
                success = script.run_script(&self.instance, state.sim_time());
            }
        }

        let requests = self.run_models(self.holding);
        let frame = self.frame.get() + 1;
        self.frame.set(frame);

        if !self.holding {
            if let Some(state) = self.state.as_ref() {
                state.incr_time();
            }
            if let Some(left) = self.iterations_left {
                if left <= 1 {
                    self.iterations_left = None;
                    self.holding = true;
                } else {
                    self.iterations_left = Some(left - 1);
                }
            }
        }
        self.apply_requests(&requests);

        if self.debug.frame_trace() {
            tracing::trace!(frame, sim_time = self.sim_time(), dt = self.delta_t(), "frame");
        }
        if self.terminate.get() {
            return false;
        }
        success
    }

    fn run_models(&mut self, holding: bool) -> Vec<ControlRequest> {
        let Some(state) = self.state.as_ref() else {
            return Vec::new();
        };
        let ground: &dyn GroundCallback = match &self.ground {
            Some(g) => &**g,
            None => &FALLBACK_GROUND,
        };
        let mut ctx = FrameContext {
            props: &self.instance,
            ground,
            dt: state.dt(),
            sim_time: state.sim_time(),
            frame: self.frame.get(),
            holding,
            integration_suspended: state.integration_suspended(),
            requests: Vec::new(),
        };
        for model in self.models.iter_mut() {
            model.run(&mut ctx);
        }
        ctx.requests
    }

    fn apply_requests(&mut self, requests: &[ControlRequest]) {
        for request in requests {
            match *request {
                ControlRequest::Hold => self.hold(),
                ControlRequest::Resume => self.resume(),
                ControlRequest::Iterate(frames) => {
                    self.holding = false;
                    self.iterations_left = Some(frames);
                }
            }
        }
    }

    /// Reset the propagated state from the initial condition and run one
    /// settling frame without advancing time. Integration is always resumed
    /// afterwards.
    pub fn run_ic(&mut self) -> bool {
        if self.models.is_empty() {
            return false;
        }
        self.suspend_integration();
        if let (Some(state), Some(ic)) = (self.state.as_ref(), self.ic.as_ref()) {
            if let Err(e) = state.initialize(ic) {
                self.error_count += 1;
                tracing::error!(error = %e, "could not apply initial conditions");
            }
        }
        let ok = self.run();
        self.resume_integration();
        ok
    }

    /// Re-initialize every model, apply the initial condition and re-arm the
    /// script's events.
    pub fn reset_to_initial_conditions(&mut self) -> Result<bool, ModelError> {
        for model in self.models.iter_mut() {
            model.init_model(&self.instance)?;
        }
        let ok = self.run_ic();
        if let Some(script) = self.script.as_mut() {
            script.reset_events();
        }
        Ok(ok)
    }

    /// Run the schedule once with the current effective step, outside the
    /// frame counter and script. Used by trimming.
    pub(crate) fn trim_settle(&mut self) {
        self.run_models(false);
        let props = self.instance.clone();
        if let Some(propulsion) = self.model_mut::<Propulsion>() {
            propulsion.steady_state(&props);
        }
        self.run_models(false);
        self.run_models(false);
    }

    // -- loading ------------------------------------------------------------

    /// Load `<model>.json` from the aircraft directory (or from
    /// `<aircraft>/<model>/` when `add_model_to_path` is set).
    pub fn load_model(
        &mut self,
        aircraft: impl AsRef<Path>,
        engine: impl AsRef<Path>,
        systems: impl AsRef<Path>,
        model: &str,
        add_model_to_path: bool,
    ) -> Result<(), LoadError> {
        let (aircraft, engine, systems) = (aircraft.as_ref(), engine.as_ref(), systems.as_ref());
        let defined = |p: &Path| !p.as_os_str().is_empty();
        if !defined(aircraft) || !defined(engine) || !defined(systems) {
            tracing::error!("aircraft, engine and systems paths must be defined before loading a model");
            return Err(LoadError::UndefinedPaths);
        }
        let full_aircraft = if add_model_to_path {
            aircraft.join(model)
        } else {
            aircraft.to_path_buf()
        };
        let paths = ModelPaths {
            aircraft: aircraft.to_path_buf(),
            engine: engine.to_path_buf(),
            systems: systems.to_path_buf(),
            full_aircraft,
        };
        self.load_model_with_paths(paths, model, add_model_to_path)
    }

    fn load_model_with_paths(
        &mut self,
        paths: ModelPaths,
        model: &str,
        add_model_to_path: bool,
    ) -> Result<(), LoadError> {
        if self.load_attempted {
            self.deallocate();
            self.allocate()?;
        }
        self.load_attempted = true;
        let file = paths.full_aircraft.join(format!("{model}.json"));
        self.paths = paths;
        self.add_model_to_path = add_model_to_path;

        match self.read_aircraft(&file, model) {
            Ok(()) => {
                self.model_loaded = true;
                let prefix = self.instance.fully_qualified_name();
                self.catalog = PropertyCatalog::build(&self.manager.root(), &prefix);
                if self.debug.startup() {
                    tracing::info!(
                        aircraft = %self.aircraft_name,
                        file = %file.display(),
                        properties = self.catalog.len(),
                        "aircraft model loaded"
                    );
                }
                if self.debug.runtime_state() {
                    for model in &self.models {
                        tracing::debug!(model = model.name(), rate = model.base().rate(), "scheduled model");
                    }
                }
                Ok(())
            }
            Err(e) => {
                self.error_count += 1;
                tracing::error!(file = %file.display(), error = %e, "aircraft model failed to load");
                Err(e)
            }
        }
    }

    fn read_aircraft(&mut self, file: &Path, model: &str) -> Result<(), LoadError> {
        let doc = load_document(file)?;
        if doc.name != "fdm_config" {
            return Err(LoadError::NotAnAircraft { found: doc.name });
        }
        self.read_prologue(&doc, model);

        for section in &doc.children {
            let tag = section.name.as_str();
            let result = match tag {
                "fileheader" => {
                    self.read_file_header(section);
                    Ok(())
                }
                "slave" => self.read_slave(section, model),
                "metrics" => self.load_section::<Aircraft>(section, SystemKind::System),
                "mass_balance" => self.load_section::<MassBalance>(section, SystemKind::System),
                "ground_reactions" => self.load_section::<GroundReactions>(section, SystemKind::System),
                "external_reactions" => self.load_section::<ExternalReactions>(section, SystemKind::System),
                "buoyant_forces" => self.load_section::<BuoyantForces>(section, SystemKind::System),
                "propulsion" => self.load_section::<Propulsion>(section, SystemKind::System),
                "system" => self.load_section::<FlightControl>(section, SystemKind::System),
                "autopilot" => self.load_section::<FlightControl>(section, SystemKind::Autopilot),
                "flight_control" => self.load_section::<FlightControl>(section, SystemKind::FlightControl),
                "aerodynamics" => self.load_section::<Aerodynamics>(section, SystemKind::System),
                "input" => self.load_section::<Input>(section, SystemKind::System),
                "output" => self.add_output(section),
                _ => return Err(LoadError::UnexpectedSection { tag: tag.to_string() }),
            };
            result.map_err(|source| LoadError::Section {
                section: tag.to_string(),
                source: Box::new(source),
            })?;
        }
        Ok(())
    }

    fn read_prologue(&mut self, doc: &Element, model: &str) {
        self.aircraft_name = doc.attribute("name").unwrap_or_else(|| model.to_string());
        let name = self.aircraft_name.clone();
        if let Some(aircraft) = self.model_mut::<Aircraft>() {
            aircraft.set_aircraft_name(name);
        }
        match doc.attribute("version") {
            None => tracing::error!("no configuration version specified, results are unpredictable"),
            Some(v) if v != NEEDED_CFG_VERSION => tracing::error!(
                found = %v,
                needed = NEEDED_CFG_VERSION,
                "unsupported configuration version, results are unpredictable"
            ),
            Some(_) => {}
        }
        if self.debug.startup() {
            match doc.attribute("release").as_deref() {
                Some("ALPHA") => tracing::warn!(aircraft = %self.aircraft_name, "model is an ALPHA release"),
                Some("BETA") => tracing::info!(aircraft = %self.aircraft_name, "model is a BETA release"),
                _ => {}
            }
        }
    }

    fn read_file_header(&self, el: &Element) {
        if !self.debug.startup() {
            return;
        }
        for field in ["author", "description", "filecreationdate"] {
            if let Some(value) = el.find_element(field).and_then(Element::text) {
                tracing::info!(field, value = %value, "file header");
            }
        }
    }

    fn read_slave(&mut self, el: &Element, model: &str) -> Result<(), LoadError> {
        let mut ancestry = self.ancestry.clone();
        ancestry.push(model.to_string());
        let slave = SlaveFdm::load(el, &self.paths, self.add_model_to_path, ancestry, self.config.dt, self.debug)?;
        self.slaves.push(slave);
        Ok(())
    }

    fn load_section<T: Model>(&mut self, el: &Element, system_kind: SystemKind) -> Result<(), LoadError> {
        let mut ctx = LoadContext {
            props: &self.instance,
            paths: &self.paths,
            system_kind,
            dt: self.config.dt,
            debug: self.debug,
        };
        let model = self
            .models
            .iter_mut()
            .find_map(|m| m.as_any_mut().downcast_mut::<T>())
            .ok_or_else(|| LoadError::UnexpectedSection { tag: el.name.clone() })?;
        model.load(el, &mut ctx)
    }

    /// Build, initialize and schedule a new output sink from `el`.
    fn add_output(&mut self, el: &Element) -> Result<(), LoadError> {
        let index = self.outputs.len();
        let mut output = Output::new(&self.instance, index, self.config.dt, self.debug)?;
        output.init_model(&self.instance)?;
        let slot = self.schedule(Box::new(output), 1);
        self.outputs.push(slot);
        let mut ctx = LoadContext {
            props: &self.instance,
            paths: &self.paths,
            system_kind: SystemKind::System,
            dt: self.config.dt,
            debug: self.debug,
        };
        self.models[slot].load(el, &mut ctx)
    }

    /// Attach another output sink described by a standalone `output` document.
    pub fn set_output_directives(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let doc = load_document(path.as_ref())?;
        if doc.name != "output" {
            return Err(LoadError::UnexpectedSection { tag: doc.name });
        }
        self.add_output(&doc)
    }

    /// Attach a script. Its `dt`, when given, replaces the frame time step.
    pub fn load_script(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let script = Script::load(path.as_ref())?;
        if let Some(dt) = script.dt() {
            self.set_dt(dt);
        }
        if self.debug.startup() {
            tracing::info!(script = script.name(), end = script.end_time(), "script loaded");
        }
        self.script = Some(script);
        Ok(())
    }

    /// Apply an initial-condition file to the `ic/*` properties. Takes
    /// effect on the next [`run_ic`](Self::run_ic).
    pub fn load_initial_conditions(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        match self.ic.as_ref() {
            Some(ic) => ic.load(path.as_ref()),
            None => {
                tracing::warn!("initial conditions ignored: executive is not allocated");
                Ok(())
            }
        }
    }

    // -- models -------------------------------------------------------------

    /// The first scheduled model of type `T`.
    pub fn model<T: Model>(&self) -> Option<&T> {
        self.models.iter().find_map(|m| m.as_any().downcast_ref::<T>())
    }

    pub fn model_mut<T: Model>(&mut self) -> Option<&mut T> {
        self.models.iter_mut().find_map(|m| m.as_any_mut().downcast_mut::<T>())
    }

    /// Names of scheduled models in run order.
    pub fn scheduled_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name()).collect()
    }

    /// Output sinks in load order.
    pub fn outputs(&self) -> impl Iterator<Item = &Output> + '_ {
        self.outputs
            .iter()
            .filter_map(|&slot| self.models.get(slot)?.as_any().downcast_ref::<Output>())
    }

    /// Enable every attached output sink.
    pub fn enable_output(&self) {
        for output in self.outputs() {
            output.base().set_enabled(true);
        }
    }

    /// Disable every attached output sink.
    pub fn disable_output(&self) {
        for output in self.outputs() {
            output.base().set_enabled(false);
        }
    }

    /// Replace the atmosphere profile in place. The new model takes the old
    /// one's schedule slot and rate. An initialization failure is counted
    /// and logged but the new model stays installed. When the new model
    /// cannot bind its properties the old one is re-bound and kept.
    pub fn use_atmosphere(&mut self, profile: Box<dyn AtmosphereProfile>) -> Result<(), AllocationError> {
        let debug = self.debug;
        self.swap_atmosphere(move |props| Atmosphere::new(props, profile, debug))
    }

    fn swap_atmosphere(
        &mut self,
        build: impl FnOnce(&PropertyNode) -> Result<Atmosphere, PropertyError>,
    ) -> Result<(), AllocationError> {
        let Some(slot) = self.models.iter().position(|m| m.as_any().is::<Atmosphere>()) else {
            tracing::warn!("no atmosphere model is scheduled");
            return Ok(());
        };
        let rate = self.models[slot].base().rate();
        // ties are exclusive, so the old model lets go of atmosphere/* first
        self.models[slot].release();
        let mut replacement = match build(&self.instance) {
            Ok(atmosphere) => atmosphere,
            Err(source) => {
                self.error_count += 1;
                tracing::error!(error = %source, "replacement atmosphere could not bind, keeping the old one");
                if let Some(old) = self.models[slot].as_any_mut().downcast_mut::<Atmosphere>() {
                    old.rebind(&self.instance).map_err(|source| AllocationError::Bind {
                        model: "atmosphere".into(),
                        source,
                    })?;
                }
                return Err(AllocationError::Bind {
                    model: "atmosphere".into(),
                    source,
                });
            }
        };
        if let Err(e) = replacement.init_model(&self.instance) {
            self.error_count += 1;
            tracing::error!(error = %e, "replacement atmosphere failed to initialize");
        }
        replacement.base_mut().set_rate(rate);
        let name = replacement.profile_name().to_string();
        let old = std::mem::replace(&mut self.models[slot], Box::new(replacement));
        drop(old);
        if self.debug.startup() {
            tracing::info!(profile = %name, "atmosphere replaced");
        }
        Ok(())
    }

    /// Replace the terrain model.
    pub fn set_ground_callback(&mut self, ground: Box<dyn GroundCallback>) {
        self.ground = Some(ground);
    }

    // -- trim ---------------------------------------------------------------

    /// Trim with the numeric mode code. Simulation time is restored
    /// afterwards.
    pub fn do_trim(&mut self, mode: i32) -> Result<TrimReport, TrimError> {
        if self.models.is_empty() {
            return Err(TrimError::NotAllocated);
        }
        let mode = TrimMode::from_code(mode)?;
        let saved_time = self.sim_time();
        let mut trim = self.trim.take().unwrap_or_else(|| Trim::new(mode));
        trim.set_mode(mode);
        let report = trim.run(self);
        if let Some(state) = self.state.as_ref() {
            state.set_sim_time(saved_time);
        }
        self.trim = Some(trim);
        if self.debug.startup() || !report.converged {
            report.log();
        }
        Ok(report)
    }

    /// The trim holder, created on first use.
    pub fn get_trim(&mut self) -> &mut Trim {
        self.trim.get_or_insert_with(|| Trim::new(TrimMode::Longitudinal))
    }

    fn service_trim_request(&mut self) {
        if let Some(mode) = self.trim_request.take() {
            if let Err(e) = self.do_trim(mode) {
                self.error_count += 1;
                tracing::error!(mode, error = %e, "trim request rejected");
            }
        }
    }

    // -- simulation control -------------------------------------------------

    /// Pause the clock. Frames still run.
    pub fn hold(&mut self) {
        self.holding = true;
        self.iterations_left = None;
    }

    pub fn resume(&mut self) {
        self.holding = false;
        self.iterations_left = None;
    }

    pub fn holding(&self) -> bool {
        self.holding
    }

    /// Whether `simulation/terminate` is set.
    pub fn terminated(&self) -> bool {
        self.terminate.get()
    }

    /// Frames run since construction or the last reset.
    pub fn frame(&self) -> u64 {
        self.frame.get()
    }

    /// Simulation time, seconds.
    pub fn sim_time(&self) -> f64 {
        self.state.as_ref().map_or(0.0, State::sim_time)
    }

    /// Effective step: zero while integration is suspended.
    pub fn delta_t(&self) -> f64 {
        self.state.as_ref().map_or(0.0, State::dt)
    }

    /// Change the frame time step.
    pub fn set_dt(&mut self, dt: f64) {
        self.config.dt = dt;
        if let Some(state) = self.state.as_mut() {
            state.set_dt(dt);
        }
    }

    /// Stop advancing the clock and the integrated state. Idempotent.
    pub fn suspend_integration(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.suspend_integration();
        }
    }

    pub fn resume_integration(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.resume_integration();
        }
    }

    pub fn integration_suspended(&self) -> bool {
        self.state.as_ref().is_some_and(State::integration_suspended)
    }

    // -- properties ---------------------------------------------------------

    /// This executive's instance node.
    pub fn properties(&self) -> &PropertyNode {
        &self.instance
    }

    pub fn property_manager(&self) -> &Rc<PropertyManager> {
        &self.manager
    }

    /// Read a property relative to the instance node.
    pub fn get_property_value(&self, path: &str) -> Option<f64> {
        self.instance.get_double_at(path)
    }

    /// Write a property. A write to `simulation/do_simple_trim` trims
    /// before returning.
    pub fn set_property_value(&mut self, path: &str, value: f64) -> Result<(), PropertyError> {
        self.instance.set_double_at(path, value)?;
        self.service_trim_request();
        Ok(())
    }

    pub fn property_catalog(&self) -> &PropertyCatalog {
        &self.catalog
    }

    /// Catalog entries containing `substring`, one per line, or
    /// `"No matches found\n"`.
    pub fn query_property_catalog(&self, substring: &str) -> String {
        self.catalog.query(substring)
    }

    pub fn print_property_catalog(&self) {
        for entry in self.catalog.iter() {
            tracing::info!(property = %entry, "catalog");
        }
    }

    /// blake3 digest of every leaf value below the instance node.
    pub fn state_hash(&self) -> String {
        PropertySnapshot::capture(&self.instance).hash
    }

    /// Record every readable leaf below the instance node.
    pub fn capture_snapshot(&self) -> PropertySnapshot {
        PropertySnapshot::capture(&self.instance)
    }

    /// Write a captured snapshot back into the instance node. Read-only
    /// leaves such as the clock and frame counter are not rewound. Returns
    /// the number of leaves written.
    pub fn restore_snapshot(&mut self, snapshot: &PropertySnapshot) -> Result<usize, PropertyError> {
        let written = snapshot.restore(&self.instance)?;
        if self.debug.runtime_state() {
            tracing::debug!(written, hash = %snapshot.hash, "property snapshot restored");
        }
        Ok(written)
    }

    // -- misc ---------------------------------------------------------------

    pub fn model_loaded(&self) -> bool {
        self.model_loaded
    }

    /// Name from the loaded aircraft document.
    pub fn aircraft_name(&self) -> &str {
        &self.aircraft_name
    }

    /// Non-fatal errors seen so far.
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Handle for queueing input commands.
    pub fn input_queue(&self) -> Option<InputHandle> {
        self.input.clone()
    }

    /// Slave records; slot 0 describes this executive.
    pub fn slaves(&self) -> &[SlaveFdm] {
        &self.slaves
    }

    pub(crate) fn set_ancestry(&mut self, ancestry: Vec<String>) {
        self.ancestry = ancestry;
    }

    /// Slave records. Index 0 is this executive.
    pub fn slaves_mut(&mut self) -> &mut [SlaveFdm] {
        &mut self.slaves
    }

    /// This aircraft's name followed by each slave's.
    pub fn enumerate_fdms(&self) -> Vec<String> {
        let mut names = vec![self.aircraft_name.clone()];
        names.extend(self.slaves.iter().skip(1).map(|s| s.name().to_string()));
        names
    }
}

impl Drop for Executive {
    fn drop(&mut self) {
        let untied = self.instance.untie_all_leaves();
        if self.debug.instantiation() {
            tracing::debug!(untied, "untied instance properties");
        }
        self.deallocate();
        self.ties.untie_all();
        self.manager.release_instance(self.instance_index);
    }
}
