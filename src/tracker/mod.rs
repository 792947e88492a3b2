//! Pipeline orchestration: registries, aggregate setup, and the cycle loop.

pub mod command;
pub mod state;
#[allow(clippy::module_inception)]
pub mod tracker;

pub use command::{Command, CommandSource, ScriptedCommands, StdinCommands};
pub use state::TrackerMode;
pub use tracker::Tracker;
