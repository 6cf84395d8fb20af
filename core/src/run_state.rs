/// # Run State
/// Lifecycle of a machine.
///
/// ```text
/// Ready --load--> Playing <--toggle--> Paused
///   \               |                    /
///    `-----------> Quit <---------------'
/// ```
///
/// Only `Playing` advances the CPU and timers. `Quit` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Ready,
    Playing,
    Paused,
    Quit,
}

impl RunState {
    /// Playing <-> Paused; anything else is left alone
    pub fn toggled(self) -> Self {
        match self {
            RunState::Playing => RunState::Paused,
            RunState::Paused => RunState::Playing,
            other => other,
        }
    }

    pub fn is_running(self) -> bool {
        self == RunState::Playing
    }
}
