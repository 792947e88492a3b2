//! Runtime commands driving the tracker's state machine.
//!
//! The loop never reads a device directly; it polls an abstract
//! [`CommandSource`] once per cycle. Interactive runs wire up
//! [`StdinCommands`]; tests and scripted runs use [`ScriptedCommands`],
//! which makes every transition of the state machine deterministic.

use std::collections::VecDeque;
use std::io::BufRead;

use crossbeam_channel::{unbounded, Receiver};
use tracing::debug;

/// One of the single-character runtime commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Detect,
    Track,
    Stop,
    Quit,
}

impl Command {
    /// Map a key to a command: `d`/`x` detect, `t` track, `s` stop, `q` quit.
    pub fn from_key(key: char) -> Option<Command> {
        match key.to_ascii_lowercase() {
            'd' | 'x' => Some(Command::Detect),
            't' => Some(Command::Track),
            's' => Some(Command::Stop),
            'q' => Some(Command::Quit),
            _ => None,
        }
    }

    /// Human-readable summary printed before entering the loop.
    pub const HELP: &'static str = "d/x: detect, t: track, s: stop, q: quit";
}

/// Source of runtime commands, polled once per cycle.
pub trait CommandSource {
    /// The command to apply at this cycle boundary, if any.
    fn poll(&mut self) -> Option<Command>;
}

/// Fixed per-cycle command schedule. Each `poll` consumes one slot (`None`
/// meaning "no command this cycle"); an exhausted schedule yields `Quit` so
/// scripted runs always terminate.
pub struct ScriptedCommands {
    schedule: VecDeque<Option<Command>>,
}

impl ScriptedCommands {
    pub fn new(schedule: impl IntoIterator<Item = Option<Command>>) -> Self {
        Self {
            schedule: schedule.into_iter().collect(),
        }
    }
}

impl CommandSource for ScriptedCommands {
    fn poll(&mut self) -> Option<Command> {
        match self.schedule.pop_front() {
            Some(slot) => slot,
            None => Some(Command::Quit),
        }
    }
}

/// Interactive command source reading lines from stdin on a helper thread.
/// The first character of each line is interpreted; unknown keys are logged
/// and dropped.
pub struct StdinCommands {
    receiver: Receiver<Command>,
}

impl StdinCommands {
    pub fn spawn() -> Self {
        let (sender, receiver) = unbounded();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let Some(key) = line.trim().chars().next() else {
                    continue;
                };
                match Command::from_key(key) {
                    Some(command) => {
                        if sender.send(command).is_err() {
                            break;
                        }
                    }
                    None => debug!(key = %key, "unknown command key"),
                }
            }
        });
        Self { receiver }
    }
}

impl CommandSource for StdinCommands {
    fn poll(&mut self) -> Option<Command> {
        self.receiver.try_recv().ok()
    }
}
