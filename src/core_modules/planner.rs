// THEORY:
// The `planner` maps one observation (or its absence) into a 3-axis velocity command.
// It is a bang-bang/threshold controller, not a PID: the whole policy fits in four
// scalars and is trivially field-tunable.
//
// - Horizontal: the pixel offset of the blob center from the frame's vertical
//   midline drives the turn rate `z`. Inside `center_threshold` pixels of center is
//   a deadband producing z = 0, which is what stops the robot twitching when the
//   target is near-centered. Target right of center turns with negative z (the
//   robot-frame convention inherited from the deployed tracker).
// - Depth: blob area stands in for distance. Below `too_far_area` advance, above
//   `too_close_area` retreat, in between hold. `x` is the forward rate.
// - `y` (strafe) is always zero; the follower never sidesteps.
//
// Whenever the tracker is not in Tracking, or there is no observation, the planner
// answers with the zero command: no target, hold position.

use serde::Serialize;

use crate::core_modules::observation::BlobObservation;
use crate::core_modules::tracker::TrackerState;
use crate::pipeline::FollowConfig;

/// A 3-axis velocity command: `x` forward, `y` strafe, `z` turn.
/// Immutable once created; ownership passes to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VelocityCommand {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl VelocityCommand {
    pub const ZERO: VelocityCommand = VelocityCommand {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Clamps every axis into the symmetric range `[-limit, limit]`.
    pub fn clamped(self, limit: f64) -> Self {
        Self {
            x: self.x.clamp(-limit, limit),
            y: self.y.clamp(-limit, limit),
            z: self.z.clamp(-limit, limit),
        }
    }
}

/// Threshold controller turning observations into velocity commands.
#[derive(Debug, Clone)]
pub struct VelocityPlanner {
    center_threshold: u32,
    too_far_area: usize,
    too_close_area: usize,
    turn_speed: f64,
    move_speed: f64,
}

impl VelocityPlanner {
    pub fn new(config: &FollowConfig) -> Self {
        Self {
            center_threshold: config.center_threshold,
            too_far_area: config.too_far_area,
            too_close_area: config.too_close_area,
            turn_speed: config.turn_speed,
            move_speed: config.move_speed,
        }
    }

    /// Computes this iteration's command. Only the Tracking state with a live
    /// observation produces motion; everything else holds position.
    pub fn plan(
        &self,
        observation: Option<&BlobObservation>,
        frame_width: u32,
        state: TrackerState,
    ) -> VelocityCommand {
        let observation = match (state, observation) {
            (TrackerState::Tracking, Some(obs)) => obs,
            _ => return VelocityCommand::ZERO,
        };

        let offset_x = observation.center.x as i64 - frame_width as i64 / 2;

        let z = if offset_x.unsigned_abs() > self.center_threshold as u64 {
            if offset_x > 0 {
                // Target right of center: turn right.
                -self.turn_speed
            } else {
                self.turn_speed
            }
        } else {
            0.0
        };

        let x = if observation.area < self.too_far_area {
            self.move_speed
        } else if observation.area > self.too_close_area {
            -self.move_speed
        } else {
            0.0
        };

        VelocityCommand { x, y: 0.0, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::observation::{BoundingBox, Point};

    fn planner() -> VelocityPlanner {
        let config = FollowConfig {
            center_threshold: 80,
            too_far_area: 3000,
            too_close_area: 12000,
            turn_speed: 0.8,
            move_speed: 0.3,
            ..FollowConfig::default()
        };
        VelocityPlanner::new(&config)
    }

    fn observation_at(x: u32, area: usize) -> BlobObservation {
        BlobObservation {
            center: Point { x, y: 240 },
            area,
            bounding_box: BoundingBox {
                x: x.saturating_sub(10),
                y: 230,
                width: 20,
                height: 20,
            },
        }
    }

    #[test]
    fn centered_in_band_target_holds_position() {
        let obs = observation_at(320, 5000);
        let cmd = planner().plan(Some(&obs), 640, TrackerState::Tracking);
        assert_eq!(cmd, VelocityCommand::ZERO);
    }

    #[test]
    fn deadband_edge_is_inclusive() {
        // Offset exactly at the threshold stays inside the deadband.
        let cmd = planner().plan(Some(&observation_at(400, 5000)), 640, TrackerState::Tracking);
        assert_eq!(cmd.z, 0.0);
        // One pixel past it turns.
        let cmd = planner().plan(Some(&observation_at(401, 5000)), 640, TrackerState::Tracking);
        assert_eq!(cmd.z, -0.8);
    }

    #[test]
    fn target_left_of_center_turns_left() {
        let cmd = planner().plan(Some(&observation_at(100, 5000)), 640, TrackerState::Tracking);
        assert_eq!(cmd.z, 0.8);
        assert_eq!(cmd.y, 0.0);
    }

    #[test]
    fn small_blob_advances_and_large_blob_retreats() {
        let far = planner().plan(Some(&observation_at(320, 2000)), 640, TrackerState::Tracking);
        assert_eq!(far, VelocityCommand::new(0.3, 0.0, 0.0));

        let close = planner().plan(Some(&observation_at(320, 20000)), 640, TrackerState::Tracking);
        assert_eq!(close, VelocityCommand::new(-0.3, 0.0, 0.0));
    }

    #[test]
    fn non_tracking_states_always_hold() {
        let obs = observation_at(500, 2000);
        for state in [
            TrackerState::Idle,
            TrackerState::Searching,
            TrackerState::Stopping,
        ] {
            assert_eq!(
                planner().plan(Some(&obs), 640, state),
                VelocityCommand::ZERO
            );
        }
    }

    #[test]
    fn tracking_without_observation_holds() {
        assert_eq!(
            planner().plan(None, 640, TrackerState::Tracking),
            VelocityCommand::ZERO
        );
    }

    #[test]
    fn clamp_bounds_every_axis() {
        let cmd = VelocityCommand::new(3.0, -0.2, -9.0).clamped(1.5);
        assert_eq!(cmd, VelocityCommand::new(1.5, -0.2, -1.5));
    }
}
