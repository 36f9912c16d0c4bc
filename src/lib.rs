// THEORY:
// This file is the entry point for the `go2_follow` library crate. The public
// surface is the closed-loop follower: `FollowPipeline` for per-frame processing,
// `ControlLoop` for lifecycle and cadence, and the collaborator traits (`Camera`,
// `CameraSource`, `RobotLink`) that keep hardware out of the core. The internal
// `core_modules` remain visible for tooling and tests, but ordinary consumers only
// need the top-level modules.

pub mod camera;
pub mod control_loop;
pub mod core_modules;
pub mod pipeline;
