// THEORY:
// The `dispatcher` is the only component that talks to the robot transport. It has
// three jobs:
//
// 1.  **Serialization**: wrap a velocity command (or a discrete sport action) into
//     the sport-mode request envelope the robot's receiver expects. The `parameter`
//     field is a JSON string inside the JSON envelope; that double encoding is the
//     observed wire convention and is preserved for receiver compatibility.
// 2.  **Throttling**: at most one command per tick, and bit-identical repeats of the
//     previous command are skipped entirely. The exception is the transition into
//     Searching or Stopping: the first command after that transition is always
//     transmitted, even if an identical zero was the last thing on the wire, so the
//     robot receives an explicit stop instead of relying on its own command timeout.
// 3.  **Identity**: every envelope carries a unique, monotonically increasing id,
//     seeded from the wall clock the same way the deployed web client seeds its ids.
//
// A send that fails, or a link that is not ready, surfaces as
// `DispatchError::Unavailable`. The loop logs it and moves on; the next iteration's
// freshly computed command supersedes the lost one. Nothing is queued or replayed.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::core_modules::planner::VelocityCommand;
use crate::core_modules::tracker::TrackerState;

/// Topic every sport-mode request is published on.
pub const SPORT_TOPIC: &str = "rt/api/sport/request";

/// Api id of the continuous movement request.
pub const SPORT_API_MOVE: u32 = 1008;

/// Discrete sport-mode actions the follower can issue besides movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SportAction {
    Damp = 1001,
    BalanceStand = 1002,
    StandUp = 1004,
    StandDown = 1005,
    Hello = 1016,
}

impl SportAction {
    pub fn api_id(self) -> u32 {
        self as u32
    }
}

/// The robot transport as the core sees it. Session negotiation, reconnection and
/// the actual data channel all live behind this seam.
///
/// `send` must not block the control loop indefinitely; implementations are expected
/// to fail fast (short internal timeout) rather than stall a tick.
pub trait RobotLink: Send + Sync {
    fn is_ready(&self) -> bool;
    fn send(&self, payload: &str) -> anyhow::Result<()>;
}

/// Shared, replaceable reference to the current robot link.
///
/// The link is set up by an external surface (session negotiation) while the control
/// loop is running; the loop takes one consistent snapshot per iteration so a single
/// send never straddles a link swap.
#[derive(Clone, Default)]
pub struct LinkSlot {
    inner: Arc<RwLock<Option<Arc<dyn RobotLink>>>>,
}

impl LinkSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current link. One writer at a time; readers keep whatever
    /// snapshot they already took.
    pub fn install(&self, link: Arc<dyn RobotLink>) {
        *self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(link);
    }

    pub fn clear(&self) {
        *self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// A consistent snapshot of the current link, or `None` when disconnected.
    pub fn snapshot(&self) -> Option<Arc<dyn RobotLink>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Link missing, not ready, or the send failed. Non-fatal; the next iteration
    /// supersedes the lost command.
    #[error("robot link unavailable")]
    Unavailable,
    #[error("failed to encode command envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What `dispatch` did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    /// Identical to the previous command; nothing was transmitted.
    Deduplicated,
}

#[derive(Serialize)]
struct Identity {
    id: u64,
    api_id: u32,
}

#[derive(Serialize)]
struct Header {
    identity: Identity,
}

#[derive(Serialize)]
struct RequestData {
    header: Header,
    parameter: String,
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    topic: &'a str,
    data: RequestData,
}

/// Serializes commands onto the robot link with dedup and identity bookkeeping.
pub struct CommandDispatcher {
    next_id: u64,
    last_sent: Option<VelocityCommand>,
    /// Last tracker state a dispatch call was accepted under, including dedup
    /// skips. Drives the forced send on entry into Searching/Stopping.
    accepted_state: TrackerState,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self {
            // Same seed scheme as the web client: epoch millis folded into i32 range.
            next_id: epoch_millis() % 2_147_483_648,
            last_sent: None,
            accepted_state: TrackerState::Idle,
        }
    }

    /// Sends one velocity command for this tick, respecting dedup and the forced
    /// zero on transitions into Searching/Stopping.
    ///
    /// A failed send leaves the transition unconfirmed: the exact same command is
    /// eligible to transmit again on the next tick instead of being deduplicated.
    pub fn dispatch(
        &mut self,
        command: VelocityCommand,
        state: TrackerState,
        link: &dyn RobotLink,
    ) -> Result<DispatchOutcome, DispatchError> {
        let entering_hold = matches!(state, TrackerState::Searching | TrackerState::Stopping)
            && self.accepted_state != state;

        if !entering_hold && self.last_sent == Some(command) {
            self.accepted_state = state;
            return Ok(DispatchOutcome::Deduplicated);
        }

        let payload = self.encode_move(command)?;
        self.transmit(link, &payload)?;

        self.last_sent = Some(command);
        self.accepted_state = state;
        Ok(DispatchOutcome::Sent)
    }

    /// Sends a manual command immediately, bypassing dedup. Used for operator nudge
    /// events; the next tick's planned command supersedes it.
    pub fn dispatch_manual(
        &mut self,
        command: VelocityCommand,
        link: &dyn RobotLink,
    ) -> Result<(), DispatchError> {
        let payload = self.encode_move(command)?;
        self.transmit(link, &payload)?;
        self.last_sent = Some(command);
        Ok(())
    }

    /// Sends a discrete sport action. Actions are edge-triggered, so they are never
    /// deduplicated.
    pub fn dispatch_action(
        &mut self,
        action: SportAction,
        link: &dyn RobotLink,
    ) -> Result<(), DispatchError> {
        let api_id = action.api_id();
        // The receiver expects the action id JSON-encoded into the parameter string.
        let parameter = serde_json::to_string(&api_id)?;
        let payload = self.encode_envelope(api_id, parameter)?;
        self.transmit(link, &payload)
    }

    fn encode_move(&mut self, command: VelocityCommand) -> Result<String, DispatchError> {
        let parameter = serde_json::to_string(&command)?;
        self.encode_envelope(SPORT_API_MOVE, parameter)
    }

    fn encode_envelope(&mut self, api_id: u32, parameter: String) -> Result<String, DispatchError> {
        let id = self.next_id;
        self.next_id += 1;

        let envelope = Envelope {
            kind: "msg",
            topic: SPORT_TOPIC,
            data: RequestData {
                header: Header {
                    identity: Identity { id, api_id },
                },
                parameter,
            },
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    fn transmit(&self, link: &dyn RobotLink, payload: &str) -> Result<(), DispatchError> {
        if !link.is_ready() {
            return Err(DispatchError::Unavailable);
        }
        link.send(payload).map_err(|err| {
            warn!("robot link send failed: {err:#}");
            DispatchError::Unavailable
        })
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
