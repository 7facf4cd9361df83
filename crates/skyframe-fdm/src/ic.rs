//! Initial-condition holder.
//!
//! Published under `ic/`. The body velocities are stored directly; true
//! airspeed, angle of attack and flight-path angle are accessor properties
//! that rewrite the stored values consistently.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use skyframe_props::prelude::*;

use crate::config::read_json;
use crate::ConfigError;

/// On-disk initial condition. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConditionFile {
    pub h_sl_ft: Option<f64>,
    pub distance_ft: Option<f64>,
    pub u_fps: Option<f64>,
    pub w_fps: Option<f64>,
    pub vt_fps: Option<f64>,
    pub alpha_deg: Option<f64>,
    pub gamma_deg: Option<f64>,
    pub theta_deg: Option<f64>,
    pub q_rad_sec: Option<f64>,
}

#[derive(Debug)]
pub struct InitialCondition {
    h: Rc<Cell<f64>>,
    x: Rc<Cell<f64>>,
    u: Rc<Cell<f64>>,
    w: Rc<Cell<f64>>,
    q: Rc<Cell<f64>>,
    theta: Rc<Cell<f64>>,
    gamma: Rc<Cell<f64>>,
    ties: TieSet,
}

impl InitialCondition {
    pub fn new(props: &PropertyNode) -> Result<Self, PropertyError> {
        let ic = Self {
            h: Rc::new(Cell::new(0.0)),
            x: Rc::new(Cell::new(0.0)),
            u: Rc::new(Cell::new(0.0)),
            w: Rc::new(Cell::new(0.0)),
            q: Rc::new(Cell::new(0.0)),
            theta: Rc::new(Cell::new(0.0)),
            gamma: Rc::new(Cell::new(0.0)),
            ties: TieSet::new(),
        };
        ic.bind(props)
    }

    fn bind(mut self, props: &PropertyNode) -> Result<Self, PropertyError> {
        self.ties.tie_value(props, "ic/h-sl-ft", &self.h)?;
        self.ties.tie_value(props, "ic/distance-ft", &self.x)?;
        self.ties.tie_value(props, "ic/u-fps", &self.u)?;
        self.ties.tie_value(props, "ic/w-fps", &self.w)?;
        self.ties.tie_value(props, "ic/q-rad_sec", &self.q)?;
        self.ties.tie_value(props, "ic/theta-rad", &self.theta)?;

        let (u, w) = (Rc::clone(&self.u), Rc::clone(&self.w));
        let (su, sw) = (Rc::clone(&self.u), Rc::clone(&self.w));
        self.ties.tie_accessors(
            props,
            "ic/vt-fps",
            move || u.get().hypot(w.get()),
            move |vt| {
                let alpha = sw.get().atan2(su.get());
                su.set(vt * alpha.cos());
                sw.set(vt * alpha.sin());
            },
        )?;

        let (u, w) = (Rc::clone(&self.u), Rc::clone(&self.w));
        let (su, sw) = (Rc::clone(&self.u), Rc::clone(&self.w));
        let (theta, gamma) = (Rc::clone(&self.theta), Rc::clone(&self.gamma));
        self.ties.tie_accessors(
            props,
            "ic/alpha-rad",
            move || w.get().atan2(u.get()),
            move |alpha| {
                let vt = su.get().hypot(sw.get());
                su.set(vt * alpha.cos());
                sw.set(vt * alpha.sin());
                theta.set(alpha + gamma.get());
            },
        )?;

        let gamma = Rc::clone(&self.gamma);
        let (sg, theta) = (Rc::clone(&self.gamma), Rc::clone(&self.theta));
        let (u, w) = (Rc::clone(&self.u), Rc::clone(&self.w));
        self.ties.tie_accessors(
            props,
            "ic/gamma-rad",
            move || gamma.get(),
            move |g| {
                sg.set(g);
                theta.set(w.get().atan2(u.get()) + g);
            },
        )?;
        Ok(self)
    }

    pub fn h_sl_ft(&self) -> f64 {
        self.h.get()
    }

    pub fn distance_ft(&self) -> f64 {
        self.x.get()
    }

    pub fn u_fps(&self) -> f64 {
        self.u.get()
    }

    pub fn w_fps(&self) -> f64 {
        self.w.get()
    }

    pub fn q_rad_sec(&self) -> f64 {
        self.q.get()
    }

    pub fn theta_rad(&self) -> f64 {
        self.theta.get()
    }

    pub fn vt_fps(&self) -> f64 {
        self.u.get().hypot(self.w.get())
    }

    pub fn alpha_rad(&self) -> f64 {
        self.w.get().atan2(self.u.get())
    }

    pub fn set_h_sl_ft(&self, h: f64) {
        self.h.set(h);
    }

    /// Set airspeed and angle of attack together, keeping the flight-path angle.
    pub fn set_vt_alpha(&self, vt: f64, alpha: f64) {
        self.u.set(vt * alpha.cos());
        self.w.set(vt * alpha.sin());
        self.theta.set(alpha + self.gamma.get());
    }

    /// Apply every field present in `file`.
    pub fn apply(&self, file: &InitialConditionFile) {
        if let Some(h) = file.h_sl_ft {
            self.h.set(h);
        }
        if let Some(x) = file.distance_ft {
            self.x.set(x);
        }
        if let Some(u) = file.u_fps {
            self.u.set(u);
        }
        if let Some(w) = file.w_fps {
            self.w.set(w);
        }
        if let Some(q) = file.q_rad_sec {
            self.q.set(q);
        }
        if let Some(g) = file.gamma_deg {
            self.gamma.set(g.to_radians());
        }
        let vt = file.vt_fps.unwrap_or_else(|| self.vt_fps());
        let alpha = file.alpha_deg.map(f64::to_radians).unwrap_or_else(|| self.alpha_rad());
        if file.vt_fps.is_some() || file.alpha_deg.is_some() {
            self.set_vt_alpha(vt, alpha);
        }
        if let Some(theta) = file.theta_deg {
            self.theta.set(theta.to_radians());
        }
    }

    /// Read and apply an initial-condition file.
    pub fn load(&self, path: &Path) -> Result<(), ConfigError> {
        let file: InitialConditionFile = read_json(path)?;
        self.apply(&file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vt_and_alpha_rewrite_body_velocities() {
        let root = PropertyManager::new().root();
        let ic = InitialCondition::new(&root).unwrap();
        root.set_double_at("ic/u-fps", 100.0).unwrap();
        root.set_double_at("ic/alpha-rad", 0.1).unwrap();
        assert!((ic.vt_fps() - 100.0).abs() < 1e-9);
        assert!((ic.w_fps() - 100.0 * 0.1f64.sin()).abs() < 1e-9);
        assert!((ic.theta_rad() - 0.1).abs() < 1e-12);

        root.set_double_at("ic/vt-fps", 200.0).unwrap();
        assert!((ic.alpha_rad() - 0.1).abs() < 1e-12);
        assert!((root.get_double_at("ic/vt-fps").unwrap() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn file_fields_are_optional() {
        let root = PropertyManager::new().root();
        let ic = InitialCondition::new(&root).unwrap();
        let file: InitialConditionFile =
            serde_json::from_str(r#"{ "h_sl_ft": 3000, "vt_fps": 150, "alpha_deg": 4 }"#).unwrap();
        ic.apply(&file);
        assert_eq!(ic.h_sl_ft(), 3000.0);
        assert!((ic.vt_fps() - 150.0).abs() < 1e-9);
        assert!((ic.alpha_rad() - 4f64.to_radians()).abs() < 1e-12);
        assert_eq!(ic.distance_ft(), 0.0);
    }

    #[test]
    fn second_holder_on_same_node_cannot_bind() {
        let root = PropertyManager::new().root();
        let _first = InitialCondition::new(&root).unwrap();
        assert!(InitialCondition::new(&root).is_err());
    }
}
