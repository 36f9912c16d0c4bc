// THEORY:
// The `tracker` module adds the concept of "memory" to the follower. The detector is
// stateless; the `TargetTracker` is the single stateful object that turns a sequence
// of per-frame observations into a coherent answer to "do we currently have a
// target?". Exactly one tracker instance exists per control loop, and only the loop
// mutates it.
//
// The state machine is deliberately small:
//   Idle      - loop not started, no commands flow.
//   Searching - loop active, no recent qualifying observation.
//   Tracking  - loop active, observation present this frame.
//   Stopping  - terminal; the loop is shutting down and the dispatcher still owes the
//               robot one explicit zero-velocity command.
//
// A single missed frame drops Tracking back to Searching. That matches the deployed
// behavior: the planner's answer to Searching is the zero command, so one flickered
// frame costs one held tick.

use crate::core_modules::observation::BlobObservation;

/// Temporal state of the target follower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    /// Loop not started.
    #[default]
    Idle,
    /// Loop active, no qualifying observation.
    Searching,
    /// Loop active, target in sight.
    Tracking,
    /// Shutting down; a terminal zero command is still owed.
    Stopping,
}

/// The single stateful tracker instance owned by a control loop.
#[derive(Debug, Default)]
pub struct TargetTracker {
    state: TrackerState,
}

impl TargetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Loop start: Idle -> Searching. No effect in any other state.
    pub fn begin(&mut self) {
        if self.state == TrackerState::Idle {
            self.state = TrackerState::Searching;
        }
    }

    /// Advances the state machine with this frame's observation (or its absence)
    /// and returns the new state.
    pub fn advance(&mut self, observation: Option<&BlobObservation>) -> TrackerState {
        self.state = match self.state {
            // Frames cannot move the tracker out of Idle or Stopping; those
            // transitions belong to begin() and confirm_stopped().
            TrackerState::Idle | TrackerState::Stopping => self.state,
            TrackerState::Searching | TrackerState::Tracking => {
                if observation.is_some() {
                    TrackerState::Tracking
                } else {
                    TrackerState::Searching
                }
            }
        };
        self.state
    }

    /// Explicit stop request: any state -> Stopping.
    pub fn request_stop(&mut self) {
        self.state = TrackerState::Stopping;
    }

    /// Called once the dispatcher has made its terminal zero-velocity attempt.
    /// Stopping -> Idle; no effect otherwise.
    pub fn confirm_stopped(&mut self) {
        if self.state == TrackerState::Stopping {
            self.state = TrackerState::Idle;
        }
    }
}
