//! Steady-state trimming.
//!
//! Each trim axis pairs a state acceleration with the control that drives it
//! to zero. Axes are solved one after another by a bracketed secant search
//! with integration suspended, and the sweep repeats until every residual
//! is inside its tolerance or the sweep limit is reached.

use crate::executive::Executive;
use crate::TrimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrimMode {
    Longitudinal,
    Full,
    Ground,
    Pullup,
    Custom,
    Turn,
    None,
}

impl TrimMode {
    /// Map the numeric code written to `simulation/do_simple_trim`.
    pub fn from_code(code: i32) -> Result<Self, TrimError> {
        Ok(match code {
            0 => TrimMode::Longitudinal,
            1 => TrimMode::Full,
            2 => TrimMode::Ground,
            3 => TrimMode::Pullup,
            4 => TrimMode::Custom,
            5 => TrimMode::Turn,
            6 => TrimMode::None,
            mode => return Err(TrimError::InvalidMode { mode }),
        })
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    fn axes(self) -> &'static [(TrimState, TrimControl)] {
        const AIRBORNE: [(TrimState, TrimControl); 3] = [
            (TrimState::Wdot, TrimControl::Alpha),
            (TrimState::Udot, TrimControl::Throttle),
            (TrimState::Qdot, TrimControl::Elevator),
        ];
        const GROUND: [(TrimState, TrimControl); 2] = [
            (TrimState::Wdot, TrimControl::Altitude),
            (TrimState::Qdot, TrimControl::Theta),
        ];
        match self {
            TrimMode::Longitudinal | TrimMode::Full | TrimMode::Pullup | TrimMode::Turn => &AIRBORNE,
            TrimMode::Ground => &GROUND,
            TrimMode::Custom | TrimMode::None => &[],
        }
    }
}

/// Acceleration driven to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrimState {
    Udot,
    Wdot,
    Qdot,
}

impl TrimState {
    fn property(self) -> &'static str {
        match self {
            TrimState::Udot => "accelerations/udot-ft_sec2",
            TrimState::Wdot => "accelerations/wdot-ft_sec2",
            TrimState::Qdot => "accelerations/qdot-rad_sec2",
        }
    }

    fn tolerance(self) -> f64 {
        match self {
            TrimState::Udot | TrimState::Wdot => 1e-3,
            TrimState::Qdot => 1e-4,
        }
    }
}

/// Control adjusted to null a [`TrimState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrimControl {
    /// Angle of attack at constant true airspeed and flight-path angle.
    Alpha,
    Throttle,
    Elevator,
    Altitude,
    Theta,
}

impl TrimControl {
    fn get(self, exec: &Executive) -> f64 {
        let read = |path: &str| exec.get_property_value(path).unwrap_or(0.0);
        match self {
            TrimControl::Alpha => read("velocities/w-fps").atan2(read("velocities/u-fps")),
            TrimControl::Throttle => read("fcs/throttle-cmd-norm"),
            TrimControl::Elevator => read("fcs/elevator-cmd-norm"),
            TrimControl::Altitude => read("position/h-sl-ft"),
            TrimControl::Theta => read("attitude/theta-rad"),
        }
    }

    fn set(self, exec: &Executive, value: f64) {
        let props = exec.properties();
        let write = |path: &str, v: f64| {
            if let Err(e) = props.set_double_at(path, v) {
                tracing::warn!(property = %path, error = %e, "trim could not set control");
            }
        };
        match self {
            TrimControl::Alpha => {
                let u = props.get_double_at("velocities/u-fps").unwrap_or(0.0);
                let w = props.get_double_at("velocities/w-fps").unwrap_or(0.0);
                let theta = props.get_double_at("attitude/theta-rad").unwrap_or(0.0);
                let vt = u.hypot(w);
                let gamma = theta - w.atan2(u);
                write("velocities/u-fps", vt * value.cos());
                write("velocities/w-fps", vt * value.sin());
                write("attitude/theta-rad", value + gamma);
            }
            TrimControl::Throttle => {
                write("fcs/throttle-cmd-norm", value);
                let mut index = 1;
                while props.has(&format!("fcs/throttle-cmd-norm[{index}]")) {
                    write(&format!("fcs/throttle-cmd-norm[{index}]"), value);
                    index += 1;
                }
            }
            TrimControl::Elevator => write("fcs/elevator-cmd-norm", value),
            TrimControl::Altitude => write("position/h-sl-ft", value),
            TrimControl::Theta => write("attitude/theta-rad", value),
        }
    }

    fn range(self, current: f64) -> (f64, f64) {
        match self {
            TrimControl::Alpha => (-0.1, 0.35),
            TrimControl::Throttle => (0.0, 1.0),
            TrimControl::Elevator => (-1.0, 1.0),
            TrimControl::Altitude => (current - 20.0, current + 20.0),
            TrimControl::Theta => (-0.35, 0.35),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisReport {
    pub state: TrimState,
    pub control: TrimControl,
    pub control_value: f64,
    pub residual: f64,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrimReport {
    pub mode: TrimMode,
    pub converged: bool,
    /// Completed sweeps over all axes.
    pub sweeps: u32,
    pub axes: Vec<AxisReport>,
}

impl TrimReport {
    pub fn log(&self) {
        tracing::info!(mode = ?self.mode, converged = self.converged, sweeps = self.sweeps, "trim finished");
        for axis in &self.axes {
            tracing::info!(
                state = ?axis.state,
                control = ?axis.control,
                value = axis.control_value,
                residual = axis.residual,
                converged = axis.converged,
                "trim axis"
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct Trim {
    mode: TrimMode,
    max_sweeps: u32,
    max_iterations: u32,
    last_report: Option<TrimReport>,
}

impl Trim {
    pub fn new(mode: TrimMode) -> Self {
        Self {
            mode,
            max_sweeps: 20,
            max_iterations: 60,
            last_report: None,
        }
    }

    pub fn mode(&self) -> TrimMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TrimMode) {
        self.mode = mode;
    }

    pub fn last_report(&self) -> Option<&TrimReport> {
        self.last_report.as_ref()
    }

    /// Trim `exec` in place. Integration is suspended for the duration and
    /// restored to its prior state afterwards.
    pub fn run(&mut self, exec: &mut Executive) -> TrimReport {
        let was_suspended = exec.integration_suspended();
        exec.suspend_integration();

        let axes = self.mode.axes();
        let mut reports: Vec<AxisReport> = axes
            .iter()
            .map(|&(state, control)| AxisReport {
                state,
                control,
                control_value: control.get(exec),
                residual: f64::INFINITY,
                converged: false,
            })
            .collect();

        let mut sweeps = 0;
        let mut converged = axes.is_empty();
        while !converged && sweeps < self.max_sweeps {
            for report in reports.iter_mut() {
                self.solve_axis(exec, report);
            }
            sweeps += 1;
            // later axes disturb earlier ones; re-check all of them
            for report in reports.iter_mut() {
                report.residual = evaluate_current(exec, report.state);
                report.converged = report.residual.abs() <= report.state.tolerance();
            }
            converged = reports.iter().all(|r| r.converged);
        }

        if !was_suspended {
            exec.resume_integration();
        }
        let report = TrimReport {
            mode: self.mode,
            converged,
            sweeps,
            axes: reports,
        };
        self.last_report = Some(report.clone());
        report
    }

    fn solve_axis(&self, exec: &mut Executive, axis: &mut AxisReport) {
        let state = axis.state;
        let control = axis.control;
        let tol = state.tolerance();
        let mut eval = |exec: &mut Executive, c: f64| {
            control.set(exec, c);
            exec.trim_settle();
            exec.get_property_value(state.property()).unwrap_or(0.0)
        };

        let start = control.get(exec);
        let f_start = eval(exec, start);
        if f_start.abs() <= tol {
            axis.control_value = start;
            axis.residual = f_start;
            return;
        }
        let (mut lo, mut hi) = control.range(start);
        let mut f_lo = eval(exec, lo);
        let mut f_hi = eval(exec, hi);
        if f_lo.signum() == f_hi.signum() {
            // not bracketed; settle on the best point seen
            let (c, f) = [(start, f_start), (lo, f_lo), (hi, f_hi)]
                .into_iter()
                .fold((start, f_start), |best, p| if p.1.abs() < best.1.abs() { p } else { best });
            axis.control_value = c;
            axis.residual = eval(exec, c);
            return;
        }

        // Illinois variant of regula falsi
        let mut c = start;
        let mut f = f_start;
        let mut side = 0i8;
        for _ in 0..self.max_iterations {
            c = (lo * f_hi - hi * f_lo) / (f_hi - f_lo);
            f = eval(exec, c);
            if f.abs() <= tol {
                break;
            }
            if f.signum() == f_hi.signum() {
                hi = c;
                f_hi = f;
                if side == 1 {
                    f_lo *= 0.5;
                }
                side = 1;
            } else {
                lo = c;
                f_lo = f;
                if side == -1 {
                    f_hi *= 0.5;
                }
                side = -1;
            }
        }
        axis.control_value = c;
        axis.residual = f;
    }
}

fn evaluate_current(exec: &mut Executive, state: TrimState) -> f64 {
    exec.trim_settle();
    exec.get_property_value(state.property()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_codes_round_trip() {
        for code in 0..=6 {
            assert_eq!(TrimMode::from_code(code).unwrap().code(), code);
        }
        assert_eq!(TrimMode::from_code(7), Err(TrimError::InvalidMode { mode: 7 }));
        assert_eq!(TrimMode::from_code(-1), Err(TrimError::InvalidMode { mode: -1 }));
    }

    #[test]
    fn ground_mode_uses_altitude_and_pitch() {
        let controls: Vec<_> = TrimMode::Ground.axes().iter().map(|a| a.1).collect();
        assert_eq!(controls, vec![TrimControl::Altitude, TrimControl::Theta]);
        assert!(TrimMode::None.axes().is_empty());
    }
}
