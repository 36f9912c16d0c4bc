// THEORY:
// External inputs reach the control loop exclusively as discrete events over a
// channel. Earlier revisions of this system let an input thread write shared mutable
// velocity variables that the loop polled; the channel form gives the loop exclusive
// ownership of all mutable state with no global locks.

use crate::core_modules::dispatcher::SportAction;

/// Messages accepted by a running control loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    /// Shut the loop down. Takes effect within one loop period; the loop still
    /// flushes a terminal zero-velocity command before releasing the camera.
    Stop,
    /// A momentary operator movement command (scroll/click bridge). Sent
    /// immediately and superseded by the next tick's planned command.
    Nudge { x: f64, y: f64, z: f64 },
    /// A discrete sport action such as standing up.
    Action(SportAction),
}
