//! Run-state machine for the capture loop.
//!
//! [`RunState`] is the single piece of state shared between the worker and
//! the command issuers.  [`RunState::apply`] is a pure transition function —
//! the [`ControllerHandle`](crate::controller::ControllerHandle) folds
//! commands through it under a lock, so any command sequence can be checked
//! against the table below without spinning up a worker.
//!
//! ```text
//! Idle ────start───▶ Listening ──pause──▶ Paused
//!                        ▲                  │
//!                        └─────resume───────┘
//! Listening | Paused ──stop──▶ Stopped ──start──▶ Listening  (new run)
//! ```
//!
//! Any command not in the table is rejected with
//! [`StateError::InvalidTransition`] and leaves the state unchanged.

use thiserror::Error;

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// States of the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Created but never started; no cycles run.
    Idle,

    /// The worker is running capture → recognize cycles.
    Listening,

    /// Cycles are suspended; the in-flight cycle (if any) completes first.
    Paused,

    /// The current run has ended.  `start` begins a new run.
    Stopped,
}

impl RunState {
    /// Apply a command, returning the successor state.
    ///
    /// Pure function — no side effects, so sequences of commands can be
    /// folded through it directly:
    ///
    /// ```
    /// use live_transcribe::controller::{LoopCommand, RunState};
    ///
    /// let state = RunState::Idle
    ///     .apply(LoopCommand::Start)
    ///     .and_then(|s| s.apply(LoopCommand::Pause))
    ///     .and_then(|s| s.apply(LoopCommand::Resume))
    ///     .unwrap();
    /// assert_eq!(state, RunState::Listening);
    /// ```
    pub fn apply(self, command: LoopCommand) -> Result<RunState, StateError> {
        use LoopCommand::*;
        use RunState::*;

        match (self, command) {
            (Idle | Stopped, Start) => Ok(Listening),
            (Listening, Pause) => Ok(Paused),
            (Paused, Resume) => Ok(Listening),
            (Listening | Paused, Stop) => Ok(Stopped),
            (from, command) => Err(StateError::InvalidTransition { from, command }),
        }
    }

    /// Returns `true` when `command` is valid in this state.
    ///
    /// The GUI uses this to enable/disable the command buttons.
    pub fn accepts(self, command: LoopCommand) -> bool {
        self.apply(command).is_ok()
    }

    /// A short human-readable label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Listening => "Listening",
            RunState::Paused => "Paused",
            RunState::Stopped => "Stopped",
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Idle
    }
}

// ---------------------------------------------------------------------------
// LoopCommand
// ---------------------------------------------------------------------------

/// Commands accepted by the capture loop controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    /// Begin a run (from Idle or Stopped).
    Start,
    /// Suspend cycles after the current one completes.
    Pause,
    /// Resume cycles after a pause.
    Resume,
    /// End the run after the current cycle completes.
    Stop,
}

// ---------------------------------------------------------------------------
// StateError
// ---------------------------------------------------------------------------

/// A command was issued in a state that does not permit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("cannot {command:?} while {from:?}")]
    InvalidTransition {
        /// State at the time the command was issued (unchanged).
        from: RunState,
        /// The rejected command.
        command: LoopCommand,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
