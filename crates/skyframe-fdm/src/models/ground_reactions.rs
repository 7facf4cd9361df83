//! Spring/damper contact points against the terrain supplied by the
//! ground callback.

use std::cell::Cell;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::Element;
use crate::debug::DebugLevel;
use crate::model::{FrameContext, LoadContext, Model, ModelBase, Step};
use crate::{LoadError, ModelError};

/// Below this horizontal speed friction is scaled down linearly.
const FRICTION_FADE_FPS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// Landing gear: rolling friction.
    Bogey,
    /// Airframe structure: static friction.
    Structure,
}

#[derive(Debug)]
struct Contact {
    name: String,
    kind: ContactKind,
    /// `(x, z)` body position relative to the center of gravity, ft.
    location: (f64, f64),
    spring: f64,
    damping: f64,
    static_friction: f64,
    rolling_friction: f64,
    wow: Rc<Cell<bool>>,
    compression: Rc<Cell<f64>>,
}

/// Body-axis force and pitching moment from one contact.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ContactForce {
    pub fx: f64,
    pub fz: f64,
    pub moment: f64,
}

/// Kinematic state the contact forces depend on.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContactState {
    pub agl_ft: f64,
    pub u: f64,
    pub w: f64,
    pub q: f64,
    pub theta: f64,
}

impl Contact {
    fn force(&self, s: &ContactState) -> ContactForce {
        let (x, z) = self.location;
        let (sin_t, cos_t) = s.theta.sin_cos();
        let height = s.agl_ft + x * sin_t - z * cos_t;
        if height >= 0.0 {
            self.wow.set(false);
            self.compression.set(0.0);
            return ContactForce::default();
        }
        let compression = -height;
        let hdot = s.u * sin_t - s.w * cos_t + s.q * (x * cos_t + z * sin_t);
        let normal = (self.spring * compression - self.damping * hdot).max(0.0);
        self.wow.set(true);
        self.compression.set(compression);

        let horizontal = s.u * cos_t + s.w * sin_t;
        let mu = match self.kind {
            ContactKind::Bogey => self.rolling_friction,
            ContactKind::Structure => self.static_friction,
        };
        let fade = (horizontal.abs() / FRICTION_FADE_FPS).min(1.0);
        let friction = -horizontal.signum() * mu * normal * fade;

        let fx = friction * cos_t + normal * sin_t;
        let fz = friction * sin_t - normal * cos_t;
        ContactForce {
            fx,
            fz,
            moment: z * fx - x * fz,
        }
    }
}

pub struct GroundReactions {
    base: ModelBase,
    contacts: Vec<Contact>,
    any_wow: Rc<Cell<bool>>,
    force_x: Rc<Cell<f64>>,
    force_z: Rc<Cell<f64>>,
    moment: Rc<Cell<f64>>,
}

impl GroundReactions {
    pub fn new(props: &PropertyNode, debug: DebugLevel) -> Result<Self, PropertyError> {
        let mut gr = Self {
            base: ModelBase::new("ground_reactions", debug),
            contacts: Vec::new(),
            any_wow: Rc::new(Cell::new(false)),
            force_x: Rc::new(Cell::new(0.0)),
            force_z: Rc::new(Cell::new(0.0)),
            moment: Rc::new(Cell::new(0.0)),
        };
        let wow = Rc::clone(&gr.any_wow);
        gr.base
            .ties
            .tie_read_only(props, "gear/wow", move || if wow.get() { 1.0 } else { 0.0 })?;
        for (path, c) in [
            ("forces/fbx-gear-lbs", &gr.force_x),
            ("forces/fbz-gear-lbs", &gr.force_z),
            ("moments/m-gear-lbsft", &gr.moment),
        ] {
            let c = Rc::clone(c);
            gr.base.ties.tie_read_only(props, path, move || c.get())?;
        }
        Ok(gr)
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn contact_names(&self) -> Vec<&str> {
        self.contacts.iter().map(|c| c.name.as_str()).collect()
    }

    fn load_contact(&mut self, el: &Element, props: &PropertyNode) -> Result<(), LoadError> {
        let kind = match el.attribute("type").as_deref().unwrap_or("BOGEY") {
            "BOGEY" => ContactKind::Bogey,
            "STRUCTURE" => ContactKind::Structure,
            other => {
                return Err(LoadError::UnknownType {
                    kind: "contact".into(),
                    value: other.into(),
                })
            }
        };
        let index = self.contacts.len();
        let contact = Contact {
            name: el.attribute("name").unwrap_or_else(|| format!("contact-{index}")),
            kind,
            location: el.find_xz("location")?,
            spring: el.require_number("spring_coeff")?,
            damping: el.number_or("damping_coeff", 0.0)?,
            static_friction: el.number_or("static_friction", 0.8)?,
            rolling_friction: el.number_or("rolling_friction", 0.02)?,
            wow: Rc::new(Cell::new(false)),
            compression: Rc::new(Cell::new(0.0)),
        };
        let wow = Rc::clone(&contact.wow);
        self.base.ties.tie_read_only(props, &format!("gear/unit[{index}]/WOW"), move || {
            if wow.get() {
                1.0
            } else {
                0.0
            }
        })?;
        let comp = Rc::clone(&contact.compression);
        self.base.ties.tie_read_only(
            props,
            &format!("gear/unit[{index}]/compression-ft"),
            move || comp.get(),
        )?;
        self.contacts.push(contact);
        Ok(())
    }
}

impl Model for GroundReactions {
    crate::model_accessors!();

    fn load(&mut self, el: &Element, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        for contact in el.find_elements("contact") {
            self.load_contact(contact, ctx.props)?;
        }
        Ok(())
    }

    fn init_model(&mut self, _props: &PropertyNode) -> Result<(), ModelError> {
        self.base.reset_counter();
        for c in &self.contacts {
            c.wow.set(false);
            c.compression.set(0.0);
        }
        self.any_wow.set(false);
        Ok(())
    }

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        if self.contacts.is_empty() {
            return Step::Idle;
        }
        let read = |path: &str| ctx.props.get_double_at(path).unwrap_or(0.0);
        let state = ContactState {
            agl_ft: ctx
                .ground
                .agl_altitude(read("position/h-sl-ft"), read("position/distance-ft")),
            u: read("velocities/u-fps"),
            w: read("velocities/w-fps"),
            q: read("velocities/q-rad_sec"),
            theta: read("attitude/theta-rad"),
        };
        let mut total = ContactForce::default();
        for contact in &self.contacts {
            let f = contact.force(&state);
            total.fx += f.fx;
            total.fz += f.fz;
            total.moment += f.moment;
        }
        self.any_wow.set(self.contacts.iter().any(|c| c.wow.get()));
        self.force_x.set(total.fx);
        self.force_z.set(total.fz);
        self.moment.set(total.moment);
        Step::Computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(x: f64, z: f64) -> Contact {
        Contact {
            name: "nose".into(),
            kind: ContactKind::Bogey,
            location: (x, z),
            spring: 1000.0,
            damping: 100.0,
            static_friction: 0.8,
            rolling_friction: 0.02,
            wow: Rc::new(Cell::new(false)),
            compression: Rc::new(Cell::new(0.0)),
        }
    }

    #[test]
    fn airborne_contact_has_no_force() {
        let c = contact(0.0, 3.0);
        let f = c.force(&ContactState {
            agl_ft: 10.0,
            ..Default::default()
        });
        assert_eq!(f, ContactForce::default());
        assert!(!c.wow.get());
    }

    #[test]
    fn compressed_contact_pushes_up() {
        let c = contact(0.0, 3.0);
        let f = c.force(&ContactState {
            agl_ft: 2.5,
            ..Default::default()
        });
        assert!(c.wow.get());
        assert!((c.compression.get() - 0.5).abs() < 1e-12);
        assert!((f.fz + 500.0).abs() < 1e-9);
        assert_eq!(f.fx, 0.0);
    }

    #[test]
    fn forward_contact_pitches_nose_up() {
        let c = contact(5.0, 3.0);
        let f = c.force(&ContactState {
            agl_ft: 2.5,
            ..Default::default()
        });
        assert!(f.moment > 0.0);
    }

    #[test]
    fn rolling_friction_opposes_motion() {
        let c = contact(0.0, 3.0);
        let f = c.force(&ContactState {
            agl_ft: 2.5,
            u: 30.0,
            ..Default::default()
        });
        assert!(f.fx < 0.0);
    }
}
