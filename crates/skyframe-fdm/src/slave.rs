//! Slave executives: further aircraft loaded alongside the primary one.
//!
//! Slot 0 of an executive's slave list always describes the executive
//! itself and owns nothing. Every `slave` section adds a record that owns a
//! complete child executive in its own property namespace, positioned
//! relative to the parent.

use crate::config::Element;
use crate::debug::DebugLevel;
use crate::executive::{ExecConfig, Executive};
use crate::model::ModelPaths;
use crate::LoadError;

/// Offset of a slave relative to its parent, ft and rad.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RelativePose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl RelativePose {
    fn from_element(el: &Element) -> Result<Self, LoadError> {
        Ok(Self {
            x: el.number_or("xloc", 0.0)?,
            y: el.number_or("yloc", 0.0)?,
            z: el.number_or("zloc", 0.0)?,
            pitch: el.number_or("pitch", 0.0)?,
            yaw: el.number_or("yaw", 0.0)?,
            roll: el.number_or("roll", 0.0)?,
        })
    }
}

/// One entry of an executive's slave list.
pub struct SlaveFdm {
    name: String,
    pose: RelativePose,
    exec: Option<Box<Executive>>,
}

impl SlaveFdm {
    /// The record describing the owning executive.
    pub fn identity() -> Self {
        Self {
            name: String::new(),
            pose: RelativePose::default(),
            exec: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset from the parent.
    pub fn pose(&self) -> RelativePose {
        self.pose
    }

    pub fn is_identity(&self) -> bool {
        self.exec.is_none()
    }

    pub fn executive(&self) -> Option<&Executive> {
        self.exec.as_deref()
    }

    pub fn executive_mut(&mut self) -> Option<&mut Executive> {
        self.exec.as_deref_mut()
    }

    /// Advance the child one frame. The identity record has nothing to run.
    pub fn run(&mut self) -> bool {
        match self.exec.as_mut() {
            Some(exec) => exec.run(),
            None => true,
        }
    }

    /// Build and load a slave from its section. `ancestry` lists the
    /// aircraft already being loaded above it, ending with its parent; a
    /// slave naming any of them is rejected before anything is built.
    pub(crate) fn load(
        el: &Element,
        paths: &ModelPaths,
        add_model_to_path: bool,
        ancestry: Vec<String>,
        dt: f64,
        debug: DebugLevel,
    ) -> Result<Self, LoadError> {
        let name = el.require_attribute("file")?;
        let wrap = |source: LoadError| LoadError::Slave {
            name: name.clone(),
            source: Box::new(source),
        };
        if ancestry.contains(&name) {
            let chain = format!("{} -> {name}", ancestry.join(" -> "));
            return Err(wrap(LoadError::SlaveCycle { chain }));
        }
        let pose = RelativePose::from_element(el).map_err(wrap)?;
        let config = ExecConfig {
            dt,
            debug: Some(debug),
            ..ExecConfig::default()
        };
        let mut exec = Executive::new(config).map_err(|e| wrap(e.into()))?;
        exec.set_ancestry(ancestry);
        exec.load_model(&paths.aircraft, &paths.engine, &paths.systems, &name, add_model_to_path)
            .map_err(wrap)?;
        if debug.startup() {
            tracing::info!(slave = %name, x = pose.x, y = pose.y, z = pose.z, "slave loaded");
        }
        Ok(Self {
            name,
            pose,
            exec: Some(Box::new(exec)),
        })
    }
}
