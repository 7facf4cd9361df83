//! Line-oriented command input.
//!
//! Commands are queued through an [`InputHandle`] and executed by the
//! `input` model at the start of its turn in the schedule. Unlike the
//! physics models it keeps running while the executive is holding, so a
//! held simulation can still be inspected and resumed.
//!
//! Supported commands:
//!
//! | command            | effect                                    |
//! |--------------------|-------------------------------------------|
//! | `set <path> <v>`   | write an existing property                |
//! | `get <path>`       | read a property                           |
//! | `hold` / `resume`  | pause or continue time                    |
//! | `iterate <n>`      | run `n` frames, then hold                 |
//! | `info`             | time, frame and hold state                |
//! | `quit`             | request termination                       |
//! | `help`             | list commands                             |

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use skyframe_props::prelude::*;

use crate::debug::DebugLevel;
use crate::model::{ControlRequest, FrameContext, Model, ModelBase, Step};

const HELP: &str = "commands: set <path> <value>, get <path>, hold, resume, iterate <frames>, info, quit, help";

#[derive(Debug, Default)]
struct Channel {
    commands: VecDeque<String>,
    replies: Vec<String>,
}

/// Shared endpoint for feeding commands to a running executive.
#[derive(Debug, Clone, Default)]
pub struct InputHandle {
    channel: Rc<RefCell<Channel>>,
}

impl InputHandle {
    /// Queue one command line.
    pub fn send(&self, command: impl Into<String>) {
        self.channel.borrow_mut().commands.push_back(command.into());
    }

    pub fn pending(&self) -> usize {
        self.channel.borrow().commands.len()
    }

    /// Drain the replies produced so far, oldest first.
    pub fn take_replies(&self) -> Vec<String> {
        std::mem::take(&mut self.channel.borrow_mut().replies)
    }

    fn next(&self) -> Option<String> {
        self.channel.borrow_mut().commands.pop_front()
    }

    fn reply(&self, line: String) {
        self.channel.borrow_mut().replies.push(line);
    }
}

pub struct Input {
    base: ModelBase,
    handle: InputHandle,
}

impl Input {
    pub fn new(debug: DebugLevel) -> Self {
        Self {
            base: ModelBase::new("input", debug),
            handle: InputHandle::default(),
        }
    }

    pub fn handle(&self) -> InputHandle {
        self.handle.clone()
    }

    fn execute(&self, line: &str, ctx: &mut FrameContext<'_>) -> String {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return String::new();
        };
        match command.to_ascii_lowercase().as_str() {
            "set" => {
                let (Some(path), Some(raw)) = (words.next(), words.next()) else {
                    return "usage: set <path> <value>".into();
                };
                let Ok(value) = raw.parse::<f64>() else {
                    return format!("invalid value '{raw}'");
                };
                match ctx.props.find(path) {
                    None => format!("unknown property '{path}'"),
                    Some(node) => match node.set_double(value) {
                        Ok(()) => format!("set {path} = {value}"),
                        Err(e) => e.to_string(),
                    },
                }
            }
            "get" => {
                let Some(path) = words.next() else {
                    return "usage: get <path>".into();
                };
                match ctx.props.find(path) {
                    None => format!("unknown property '{path}'"),
                    Some(node) => format!("{path} = {}", node.get_double()),
                }
            }
            "hold" => {
                ctx.requests.push(ControlRequest::Hold);
                "holding".into()
            }
            "resume" => {
                ctx.requests.push(ControlRequest::Resume);
                "resuming".into()
            }
            "iterate" => match words.next().map(str::parse::<u32>) {
                Some(Ok(frames)) if frames > 0 => {
                    ctx.requests.push(ControlRequest::Iterate(frames));
                    format!("iterating {frames} frames")
                }
                _ => "usage: iterate <frames>".into(),
            },
            "info" => format!(
                "sim time: {:.4}, frame: {}, holding: {}",
                ctx.sim_time, ctx.frame, ctx.holding
            ),
            "quit" => match ctx.props.find("simulation/terminate") {
                Some(node) if node.set_double(1.0).is_ok() => "terminating".into(),
                _ => "termination is not available".into(),
            },
            "help" => HELP.into(),
            other => format!("unknown command '{other}'"),
        }
    }
}

impl Model for Input {
    crate::model_accessors!();

    fn run(&mut self, ctx: &mut FrameContext<'_>) -> Step {
        if !self.base.rate_gate() {
            return Step::RateSkipped;
        }
        if !self.base.enabled() {
            return Step::Disabled;
        }
        if self.handle.pending() == 0 {
            return Step::Idle;
        }
        while let Some(line) = self.handle.next() {
            let reply = self.execute(&line, ctx);
            if self.base.debug().runtime_state() {
                tracing::debug!(command = %line, reply = %reply, "input command");
            }
            if !reply.is_empty() {
                self.handle.reply(reply);
            }
        }
        Step::Computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground::FlatGround;

    #[test]
    fn commands_execute_while_holding() {
        let root = PropertyManager::new().root();
        root.set_double_at("fcs/elevator-cmd-norm", 0.0).unwrap();
        let ground = FlatGround::default();
        let mut input = Input::new(DebugLevel::SILENT);
        let handle = input.handle();
        handle.send("set fcs/elevator-cmd-norm 0.25");
        handle.send("get fcs/elevator-cmd-norm");
        handle.send("get nope/nothing");
        handle.send("resume");
        handle.send("bogus");

        let mut frame = FrameContext {
            props: &root,
            ground: &ground,
            dt: 0.01,
            sim_time: 1.5,
            frame: 150,
            holding: true,
            integration_suspended: false,
            requests: Vec::new(),
        };
        assert_eq!(input.run(&mut frame), Step::Computed);
        assert_eq!(frame.requests, vec![ControlRequest::Resume]);
        let replies = handle.take_replies();
        assert_eq!(replies[0], "set fcs/elevator-cmd-norm = 0.25");
        assert_eq!(replies[1], "fcs/elevator-cmd-norm = 0.25");
        assert!(replies[2].starts_with("unknown property"));
        assert!(replies[4].starts_with("unknown command"));
        assert_eq!(handle.pending(), 0);
        assert_eq!(input.run(&mut frame), Step::Idle);
    }

    #[test]
    fn iterate_requires_a_positive_count() {
        let root = PropertyManager::new().root();
        let ground = FlatGround::default();
        let mut input = Input::new(DebugLevel::SILENT);
        let handle = input.handle();
        handle.send("iterate 0");
        handle.send("iterate 5");
        let mut frame = FrameContext {
            props: &root,
            ground: &ground,
            dt: 0.01,
            sim_time: 0.0,
            frame: 0,
            holding: true,
            integration_suspended: false,
            requests: Vec::new(),
        };
        input.run(&mut frame);
        assert_eq!(frame.requests, vec![ControlRequest::Iterate(5)]);
        assert_eq!(handle.take_replies()[0], "usage: iterate <frames>");
    }
}
