//! Output sinks: periodic CSV, tab-separated or terminal logging of a set of
//! properties.
//!
//! Each sink is its own scheduled model with a rate derived from the
//! requested logging frequency: `max(1, floor(1 / (dt * hz) + 0.5))`.
//! Nothing is written while the executive is holding or integration is
//! suspended, so trimming and initial-condition runs never appear in a log.

use std::cell::Cell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::config::Element;
use crate::debug::DebugLevel;
use crate::model::{FrameContext, LoadContext, Model, ModelBase, Step};
use crate::{LoadError, ModelError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Csv,
    Tabular,
    Terminal,
    None,
}

impl SinkKind {
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        match raw {
            "CSV" => Ok(SinkKind::Csv),
            "TABULAR" => Ok(SinkKind::Tabular),
            "TERMINAL" => Ok(SinkKind::Terminal),
            "NONE" => Ok(SinkKind::None),
            other => Err(LoadError::UnknownType {
                kind: "output type".into(),
                value: other.into(),
            }),
        }
    }

    fn delimiter(self) -> &'static str {
        match self {
            SinkKind::Tabular => "\t",
            _ => ",",
        }
    }
}

/// Property groups that can be switched on by name.
fn group(name: &str) -> &'static [&'static str] {
    match name {
        "simulation" => &["simulation/dt"],
        "atmosphere" => &[
            "atmosphere/T-R",
            "atmosphere/P-psf",
            "atmosphere/rho-slugs_ft3",
            "atmosphere/a-fps",
        ],
        "velocities" => &[
            "velocities/vt-fps",
            "velocities/u-fps",
            "velocities/w-fps",
            "velocities/q-rad_sec",
            "velocities/mach",
            "velocities/vc-kts",
        ],
        "position" => &[
            "position/h-sl-ft",
            "position/distance-ft",
            "position/h-agl-ft",
            "attitude/theta-rad",
        ],
        "aerodynamics" => &["aero/alpha-deg", "aero/qbar-psf"],
        "forces" => &[
            "forces/fbx-total-lbs",
            "forces/fbz-total-lbs",
            "forces/fbx-aero-lbs",
            "forces/fbz-aero-lbs",
            "forces/fbx-prop-lbs",
            "forces/fbz-gear-lbs",
        ],
        "moments" => &["moments/m-total-lbsft", "moments/m-aero-lbsft"],
        "massprops" => &[
            "inertia/weight-lbs",
            "inertia/mass-slugs",
            "inertia/iyy-slugs_ft2",
        ],
        "propulsion" => &[
            "propulsion/total-fuel-lbs",
            "propulsion/engine[0]/thrust-lbs",
            "propulsion/engine[0]/engine-rpm",
        ],
        _ => &[],
    }
}

/// Frames between writes for a logging frequency.
pub fn rate_for(dt: f64, hz: f64) -> u32 {
    if dt <= 0.0 || hz <= 0.0 {
        return 1;
    }
    ((1.0 / (dt * hz) + 0.5).floor() as u32).max(1)
}

pub struct Output {
    base: ModelBase,
    index: usize,
    kind: SinkKind,
    path: Option<PathBuf>,
    columns: Vec<(String, PropertyNode)>,
    sim_time: Option<PropertyNode>,
    hz: Rc<Cell<f64>>,
    applied_hz: f64,
    dt: f64,
    writer: Option<BufWriter<File>>,
    runs: u32,
    lines: u64,
}

impl Output {
    pub fn new(props: &PropertyNode, index: usize, dt: f64, debug: DebugLevel) -> Result<Self, PropertyError> {
        let mut output = Self {
            base: ModelBase::new("output", debug),
            index,
            kind: SinkKind::None,
            path: None,
            columns: Vec::new(),
            sim_time: None,
            hz: Rc::new(Cell::new(0.0)),
            applied_hz: 0.0,
            dt,
            writer: None,
            runs: 0,
            lines: 0,
        };
        let prefix = format!("simulation/output[{index}]");
        let hz = Rc::clone(&output.hz);
        let hz_set = Rc::clone(&output.hz);
        output.base.ties.tie_accessors(
            props,
            &format!("{prefix}/log_rate_hz"),
            move || hz.get(),
            move |v| {
                if v > 0.0 {
                    hz_set.set(v);
                }
            },
        )?;
        let enabled = output.base.enabled_cell();
        output
            .base
            .ties
            .tie_flag(props, &format!("{prefix}/enabled"), &enabled)?;
        Ok(output)
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Column labels after the leading time column.
    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|(l, _)| l.as_str()).collect()
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    /// File currently written to; later runs get a `_<n>` suffix.
    pub fn current_path(&self) -> Option<PathBuf> {
        let base = self.path.as_ref()?;
        if self.runs == 0 {
            return Some(base.clone());
        }
        let stem = base.file_stem()?.to_string_lossy().into_owned();
        let name = match base.extension() {
            Some(ext) => format!("{stem}_{}.{}", self.runs, ext.to_string_lossy()),
            None => format!("{stem}_{}", self.runs),
        };
        Some(base.with_file_name(name))
    }

    fn add_column(&mut self, props: &PropertyNode, path: &str) {
        match props.find(path) {
            Some(node) => self.columns.push((path.to_string(), node)),
            None => tracing::warn!(property = %path, "output property not found, column skipped"),
        }
    }

    fn line(&self, time: f64) -> String {
        let delimiter = self.kind.delimiter();
        let mut line = time.to_string();
        for (_, node) in &self.columns {
            line.push_str(delimiter);
            line.push_str(&node.get_double().to_string());
        }
        line
    }

    fn header(&self) -> String {
        let mut header = String::from("Time");
        for (label, _) in &self.columns {
            header.push_str(self.kind.delimiter());
            header.push_str(label);
        }
        header
    }

    fn open(path: &Path) -> std::io::Result<BufWriter<File>> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        File::create(path).map(BufWriter::new)
    }

    fn write_line(&mut self, time: f64) -> std::io::Result<()> {
        match self.kind {
            SinkKind::None => Ok(()),
            SinkKind::Terminal => {
                let mut out = std::io::stdout().lock();
                if self.lines == 0 {
                    writeln!(out, "{}", self.header())?;
                }
                writeln!(out, "{}", self.line(time))
            }
            SinkKind::Csv | SinkKind::Tabular => {
                if self.writer.is_none() {
                    let Some(path) = self.current_path() else {
                        return Ok(());
                    };
                    let mut writer = Self::open(&path)?;
                    writeln!(writer, "{}", self.header())?;
                    self.writer = Some(writer);
                }
                let line = self.line(time);
                if let Some(writer) = self.writer.as_mut() {
                    writeln!(writer, "{line}")?;
                    writer.flush()?;
                }
                Ok(())
            }
        }
    }
}

impl Model for Output {
    crate::model_accessors!();

    fn load(&mut self, el: &Element, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        self.kind = SinkKind::parse(el.attribute("type").as_deref().unwrap_or("CSV"))?;
        self.dt = ctx.dt;
        if matches!(self.kind, SinkKind::Csv | SinkKind::Tabular) {
            self.path = Some(PathBuf::from(el.require_attribute("name")?));
        }
        if let Some(hz) = el.attribute_as_number("rate")? {
            self.hz.set(hz);
        }
        self.sim_time = ctx.props.find("simulation/sim-time-sec");
        for child in &el.children {
            if child.name == "property" {
                if let Some(path) = child.text() {
                    self.add_column(ctx.props, &path);
                }
            } else if child.text().as_deref() == Some("ON") {
                for path in group(&child.name) {
                    self.add_column(ctx.props, path);
                }
            }
        }
        if ctx.debug.startup() {
            tracing::info!(
                index = self.index,
                kind = ?self.kind,
                path = ?self.path,
                rate_hz = self.hz.get(),
                columns = self.columns.len(),
                "output sink configured"
            );
        }
        Ok(())
    }

    fn init_model(&mut self, _props: &PropertyNode) -> Result<(), ModelError> {
        self.base.reset_counter();
        if self.writer.take().is_some() {
            self.runs += 1;
        }
        self.lines = 0;
        Ok(())
    }

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        let hz = self.hz.get();
        if hz != self.applied_hz {
            self.applied_hz = hz;
            self.base.set_rate(rate_for(self.dt, hz));
        }
        if let Some(step) = self.base.gate(ctx) {
            return step;
        }
        if ctx.integration_suspended {
            return Step::Held;
        }
        if self.kind == SinkKind::None {
            return Step::Idle;
        }
        let time = self
            .sim_time
            .as_ref()
            .map(PropertyNode::get_double)
            .unwrap_or(ctx.sim_time);
        match self.write_line(time) {
            Ok(()) => self.lines += 1,
            Err(e) => {
                tracing::warn!(index = self.index, error = %e, "output write failed, sink disabled");
                self.base.set_enabled(false);
            }
        }
        Step::Computed
    }
}
