// THEORY:
// The `pipeline` module is the per-frame API of the follower. It encapsulates the
// full stack behind a single entry point: give it a frame and the current link
// snapshot, get back a report of what was seen, decided, and transmitted. The
// pipeline itself has no notion of time or cadence; `control_loop` owns that.

use tracing::{debug, warn};

use crate::core_modules::blob_detector::blob_detector;
use crate::core_modules::dispatcher::{
    CommandDispatcher, DispatchOutcome, RobotLink, SportAction,
};
use crate::core_modules::frame::{ColorRange, Frame};
use crate::core_modules::observation::BlobObservation;
use crate::core_modules::planner::{VelocityCommand, VelocityPlanner};
use crate::core_modules::tracker::{TargetTracker, TrackerState};
use std::time::Duration;

// Re-export the types a consumer needs alongside the pipeline.
pub use crate::core_modules::dispatcher::LinkSlot;
pub use crate::core_modules::events::ControlEvent;

/// Symmetric per-axis bound applied to operator nudge commands.
const MANUAL_COMMAND_LIMIT: f64 = 1.5;

/// The scalar configuration surface of the follower. All thresholds were tuned on
/// the deployed robot; see `ColorRange::red_pair` for the stock target color.
#[derive(Debug, Clone)]
pub struct FollowConfig {
    /// Target color, 1..N HSV ranges unioned at mask time.
    pub color_ranges: Vec<ColorRange>,
    /// Smallest blob (in pixels) that counts as a target.
    pub min_area: usize,
    /// Horizontal deadband around frame center, in pixels.
    pub center_threshold: u32,
    /// Blob area below which the robot advances.
    pub too_far_area: usize,
    /// Blob area above which the robot retreats.
    pub too_close_area: usize,
    /// Magnitude of the turn rate `z` when outside the deadband.
    pub turn_speed: f64,
    /// Magnitude of the forward rate `x` when outside the distance band.
    pub move_speed: f64,
    /// Target loop cadence.
    pub loop_period: Duration,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            color_ranges: ColorRange::red_pair(),
            min_area: 1000,
            center_threshold: 80,
            too_far_area: 2000,
            too_close_area: 15000,
            turn_speed: 0.8,
            move_speed: 0.3,
            loop_period: Duration::from_millis(100),
        }
    }
}

/// The primary output of one pipeline iteration.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub state: TrackerState,
    pub observation: Option<BlobObservation>,
    pub command: VelocityCommand,
    /// What the dispatcher did; `None` when no link was available or the send
    /// failed (both recovered locally).
    pub delivery: Option<DispatchOutcome>,
}

/// The full detect -> track -> plan -> dispatch stack for one control loop.
pub struct FollowPipeline {
    config: FollowConfig,
    tracker: TargetTracker,
    planner: VelocityPlanner,
    dispatcher: CommandDispatcher,
}

impl FollowPipeline {
    pub fn new(config: FollowConfig) -> Self {
        let planner = VelocityPlanner::new(&config);
        Self {
            config,
            tracker: TargetTracker::new(),
            planner,
            dispatcher: CommandDispatcher::new(),
        }
    }

    pub fn config(&self) -> &FollowConfig {
        &self.config
    }

    pub fn state(&self) -> TrackerState {
        self.tracker.state()
    }

    /// Loop start: moves the tracker out of Idle.
    pub fn begin(&mut self) {
        self.tracker.begin();
    }

    /// Runs one full iteration over a captured frame.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        link: Option<&dyn RobotLink>,
    ) -> FrameReport {
        // Stage 1: spatial detection.
        let observation =
            blob_detector::detect(frame, &self.config.color_ranges, self.config.min_area);

        // Stage 2: temporal state.
        let state = self.tracker.advance(observation.as_ref());

        // Stage 3: velocity planning.
        let command = self.planner.plan(observation.as_ref(), frame.width, state);

        // Stage 4: delivery.
        let delivery = match link {
            Some(link) => match self.dispatcher.dispatch(command, state, link) {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    warn!("command dropped: {err}");
                    None
                }
            },
            None => {
                debug!("no robot link installed; command dropped");
                None
            }
        };

        FrameReport {
            state,
            observation,
            command,
            delivery,
        }
    }

    /// Sends an operator nudge immediately, clamped to the manual limit.
    pub fn nudge(&mut self, x: f64, y: f64, z: f64, link: Option<&dyn RobotLink>) {
        let Some(link) = link else {
            debug!("nudge dropped; no robot link installed");
            return;
        };
        let command = VelocityCommand::new(x, y, z).clamped(MANUAL_COMMAND_LIMIT);
        if let Err(err) = self.dispatcher.dispatch_manual(command, link) {
            warn!("nudge dropped: {err}");
        }
    }

    /// Sends a discrete sport action.
    pub fn action(&mut self, action: SportAction, link: Option<&dyn RobotLink>) {
        let Some(link) = link else {
            debug!("action dropped; no robot link installed");
            return;
        };
        if let Err(err) = self.dispatcher.dispatch_action(action, link) {
            warn!("action dropped: {err}");
        }
    }

    /// Shutdown flush: requests stop, makes the best-effort terminal zero send,
    /// and settles the tracker back to Idle. A failed final send is logged and
    /// swallowed; shutdown is never blocked by the transport.
    pub fn shutdown(&mut self, link: Option<&dyn RobotLink>) {
        self.tracker.request_stop();

        if let Some(link) = link {
            if let Err(err) =
                self.dispatcher
                    .dispatch(VelocityCommand::ZERO, TrackerState::Stopping, link)
            {
                warn!("final stop send failed ({err}); continuing shutdown");
            }
        } else {
            debug!("no robot link at shutdown; terminal stop skipped");
        }

        self.tracker.confirm_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::FRAME_CHANNELS;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingLink {
        ready: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingLink {
        fn new() -> Self {
            Self {
                ready: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().expect("lock").len()
        }

        fn last_params(&self) -> serde_json::Value {
            let sent = self.sent.lock().expect("lock");
            let envelope: serde_json::Value =
                serde_json::from_str(sent.last().expect("payload")).expect("json");
            let parameter = envelope["data"]["parameter"].as_str().expect("string");
            serde_json::from_str(parameter).expect("inner json")
        }
    }

    impl RobotLink for RecordingLink {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn send(&self, payload: &str) -> anyhow::Result<()> {
            self.sent.lock().expect("lock").push(payload.to_string());
            Ok(())
        }
    }

    fn frame_with_red_rect(
        width: u32,
        height: u32,
        rx: u32,
        ry: u32,
        rw: u32,
        rh: u32,
    ) -> Frame {
        let mut data = vec![0u8; width as usize * height as usize * FRAME_CHANNELS];
        for y in ry..ry + rh {
            for x in rx..rx + rw {
                let i = (y as usize * width as usize + x as usize) * FRAME_CHANNELS;
                data[i] = 255;
                data[i + 3] = 255;
            }
        }
        Frame::new(width, height, data)
    }

    fn blank_frame(width: u32, height: u32) -> Frame {
        Frame::new(
            width,
            height,
            vec![0u8; width as usize * height as usize * FRAME_CHANNELS],
        )
    }

    fn test_config() -> FollowConfig {
        FollowConfig {
            min_area: 1000,
            center_threshold: 80,
            too_far_area: 3000,
            too_close_area: 12000,
            ..FollowConfig::default()
        }
    }

    #[test]
    fn off_center_in_band_target_turns_right() {
        // 640x480 frame, 80x50 = 4000px rectangle centered at (500, 240).
        let frame = frame_with_red_rect(640, 480, 460, 215, 80, 50);
        let mut pipeline = FollowPipeline::new(test_config());
        let link = RecordingLink::new();
        pipeline.begin();

        let report = pipeline.process_frame(&frame, Some(&link));

        assert_eq!(report.state, TrackerState::Tracking);
        let obs = report.observation.expect("blob present");
        assert_eq!(obs.center.x, 500);
        assert_eq!(obs.area, 4000);
        assert_eq!(report.command, VelocityCommand::new(0.0, 0.0, -0.8));

        let params = link.last_params();
        assert_eq!(params["z"], -0.8);
    }

    #[test]
    fn centered_far_target_advances() {
        // 2000px rectangle (50x40) centered at (320, 240): below too_far_area.
        let frame = frame_with_red_rect(640, 480, 295, 220, 50, 40);
        let mut pipeline = FollowPipeline::new(test_config());
        let link = RecordingLink::new();
        pipeline.begin();

        let report = pipeline.process_frame(&frame, Some(&link));

        assert_eq!(report.state, TrackerState::Tracking);
        assert_eq!(report.command, VelocityCommand::new(0.3, 0.0, 0.0));
    }

    #[test]
    fn losing_the_target_sends_one_zero_then_holds() {
        let tracked = frame_with_red_rect(640, 480, 100, 100, 80, 50);
        let empty = blank_frame(640, 480);
        let mut pipeline = FollowPipeline::new(test_config());
        let link = RecordingLink::new();
        pipeline.begin();

        pipeline.process_frame(&tracked, Some(&link));
        let after_movement = link.sent_count();
        assert!(after_movement >= 1);

        let miss1 = pipeline.process_frame(&empty, Some(&link));
        assert_eq!(miss1.state, TrackerState::Searching);
        assert_eq!(miss1.delivery, Some(DispatchOutcome::Sent));
        assert_eq!(link.sent_count(), after_movement + 1);

        // Frames 2 and 3 of the miss: no identical re-sends.
        let miss2 = pipeline.process_frame(&empty, Some(&link));
        let miss3 = pipeline.process_frame(&empty, Some(&link));
        assert_eq!(miss2.delivery, Some(DispatchOutcome::Deduplicated));
        assert_eq!(miss3.delivery, Some(DispatchOutcome::Deduplicated));
        assert_eq!(link.sent_count(), after_movement + 1);

        let params = link.last_params();
        assert_eq!(params["x"], 0.0);
        assert_eq!(params["z"], 0.0);
    }

    #[test]
    fn shutdown_while_tracking_always_flushes_a_zero() {
        let tracked = frame_with_red_rect(640, 480, 100, 100, 80, 50);
        let mut pipeline = FollowPipeline::new(test_config());
        let link = RecordingLink::new();
        pipeline.begin();

        pipeline.process_frame(&tracked, Some(&link));
        let before = link.sent_count();

        pipeline.shutdown(Some(&link));
        assert_eq!(pipeline.state(), TrackerState::Idle);
        assert_eq!(link.sent_count(), before + 1);
        let params = link.last_params();
        assert_eq!(params["x"], 0.0);
        assert_eq!(params["y"], 0.0);
        assert_eq!(params["z"], 0.0);
    }

    #[test]
    fn shutdown_with_dead_link_still_reaches_idle() {
        let mut pipeline = FollowPipeline::new(test_config());
        let link = RecordingLink::new();
        link.ready.store(false, Ordering::SeqCst);
        pipeline.begin();

        pipeline.shutdown(Some(&link));
        assert_eq!(pipeline.state(), TrackerState::Idle);
        assert_eq!(link.sent_count(), 0);
    }

    #[test]
    fn missing_link_never_fails_the_iteration() {
        let frame = frame_with_red_rect(640, 480, 100, 100, 80, 50);
        let mut pipeline = FollowPipeline::new(test_config());
        pipeline.begin();

        let report = pipeline.process_frame(&frame, None);
        assert_eq!(report.state, TrackerState::Tracking);
        assert!(report.delivery.is_none());
    }

    #[test]
    fn nudge_is_clamped_and_sent() {
        let mut pipeline = FollowPipeline::new(test_config());
        let link = RecordingLink::new();

        pipeline.nudge(4.0, 0.0, -0.5, Some(&link));
        assert_eq!(link.sent_count(), 1);
        let params = link.last_params();
        assert_eq!(params["x"], 1.5);
        assert_eq!(params["z"], -0.5);
    }
}
