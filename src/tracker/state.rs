//! Tracker mode: the per-cycle state machine.

/// Mode of the tracker loop. `Waiting` is the initial mode, `Quit` is
/// terminal. In `Waiting` and `Stopped`, cameras still refresh and viewers
/// still render; only the pose logic is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerMode {
    #[default]
    Waiting,
    /// Detectors (re)initialize body poses each cycle.
    Detecting,
    /// Optimizers refine body poses each cycle.
    Tracking,
    Stopped,
    Quit,
}
