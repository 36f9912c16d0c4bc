// THEORY:
// The `control_loop` module owns lifecycle and cadence, the two things the pipeline
// deliberately does not know about. It is the only component that touches the
// external collaborators: it acquires the camera at start, takes one link snapshot
// per iteration, and releases the camera on every exit path.
//
// The loop runs as its own tokio task at a fixed period. The cadence sleep is the
// sole suspension point and it is interruptible: the `select!` races the ticker
// against the event channel, so a stop request takes effect within one period plus
// the final flush iteration. Commands are never queued across iterations; a failed
// send is simply superseded by the next tick's freshly computed command.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::camera::{Camera, CameraError, CameraSource};
use crate::core_modules::dispatcher::LinkSlot;
use crate::core_modules::events::ControlEvent;
use crate::pipeline::{FollowConfig, FollowPipeline};

const EVENT_QUEUE_DEPTH: usize = 16;

/// Lifecycle of a [`ControlLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    NotStarted,
    Running,
    Stopped,
}

/// Owns the camera source and the running follower task.
pub struct ControlLoop<S: CameraSource> {
    source: S,
    link: LinkSlot,
    config: FollowConfig,
    state: LoopState,
    events_tx: Option<mpsc::Sender<ControlEvent>>,
    task: Option<JoinHandle<()>>,
}

impl<S: CameraSource> ControlLoop<S> {
    pub fn new(source: S, link: LinkSlot, config: FollowConfig) -> Self {
        Self {
            source,
            link,
            config,
            state: LoopState::NotStarted,
            events_tx: None,
            task: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Handle for injecting operator events into a running loop. `None` unless
    /// Running.
    pub fn events(&self) -> Option<mpsc::Sender<ControlEvent>> {
        self.events_tx.clone()
    }

    /// Acquires the camera and starts the follower task.
    ///
    /// Camera acquisition failure is fatal: the error is returned, the loop stays
    /// in its prior state, and nothing retries in the background. Calling `start`
    /// while already Running is a no-op.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.state == LoopState::Running {
            return Ok(());
        }

        let camera = self.source.open()?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let pipeline = FollowPipeline::new(self.config.clone());
        let link = self.link.clone();
        let period = self.config.loop_period;

        self.task = Some(tokio::spawn(run_loop(
            camera, pipeline, events_rx, link, period,
        )));
        self.events_tx = Some(events_tx);
        self.state = LoopState::Running;
        info!("control loop started (period {:?})", period);
        Ok(())
    }

    /// Requests stop and waits for the task to flush its terminal zero command
    /// and release the camera. Idempotent: a no-op when not Running.
    pub async fn stop(&mut self) {
        if self.state != LoopState::Running {
            return;
        }

        if let Some(events_tx) = self.events_tx.take() {
            // A full queue or an already-exited task both mean the loop is
            // finishing anyway; joining below is what matters.
            let _ = events_tx.send(ControlEvent::Stop).await;
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("control loop task ended abnormally: {err}");
            }
        }
        self.state = LoopState::Stopped;
        info!("control loop stopped");
    }
}

/// The fixed-cadence follower loop. Exits on a Stop event or a closed event
/// channel, then flushes the terminal zero command. The camera is dropped, and
/// thereby released, when this function returns.
async fn run_loop<C: Camera + 'static>(
    mut camera: C,
    mut pipeline: FollowPipeline,
    mut events: mpsc::Receiver<ControlEvent>,
    link: LinkSlot,
    period: Duration,
) {
    pipeline.begin();

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'ticks: loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = match camera.read_frame() {
                    Ok(frame) => frame,
                    Err(err) => {
                        // Transient: skip this iteration, keep the loop alive.
                        warn!("frame dropped: {err}");
                        continue;
                    }
                };

                let snapshot = link.snapshot();
                let report = pipeline.process_frame(&frame, snapshot.as_deref());
                debug!(
                    "tick: state {:?}, command ({:.2}, {:.2}, {:.2}), delivery {:?}",
                    report.state,
                    report.command.x,
                    report.command.y,
                    report.command.z,
                    report.delivery,
                );
            }
            event = events.recv() => {
                match event {
                    Some(ControlEvent::Stop) | None => break 'ticks,
                    Some(ControlEvent::Nudge { x, y, z }) => {
                        let snapshot = link.snapshot();
                        pipeline.nudge(x, y, z, snapshot.as_deref());
                    }
                    Some(ControlEvent::Action(action)) => {
                        let snapshot = link.snapshot();
                        pipeline.action(action, snapshot.as_deref());
                    }
                }
            }
        }
    }

    let snapshot = link.snapshot();
    pipeline.shutdown(snapshot.as_deref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::{FRAME_CHANNELS, Frame};

    struct ScriptedCamera {
        frames: Vec<Frame>,
        cursor: usize,
    }

    impl Camera for ScriptedCamera {
        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            let frame = self.frames[self.cursor % self.frames.len()].clone();
            self.cursor += 1;
            Ok(frame)
        }
    }

    struct ScriptedSource {
        frames: Vec<Frame>,
        fail_open: bool,
    }

    impl CameraSource for ScriptedSource {
        type Cam = ScriptedCamera;

        fn open(&mut self) -> Result<ScriptedCamera, CameraError> {
            if self.fail_open {
                return Err(CameraError::Acquisition("device busy".into()));
            }
            Ok(ScriptedCamera {
                frames: self.frames.clone(),
                cursor: 0,
            })
        }
    }

    fn blank_frame() -> Frame {
        Frame::new(64, 48, vec![0u8; 64 * 48 * FRAME_CHANNELS])
    }

    #[tokio::test]
    async fn acquisition_failure_is_fatal_and_keeps_state() {
        let source = ScriptedSource {
            frames: vec![],
            fail_open: true,
        };
        let mut control = ControlLoop::new(source, LinkSlot::new(), FollowConfig::default());

        let err = control.start();
        assert!(matches!(err, Err(CameraError::Acquisition(_))));
        assert_eq!(control.state(), LoopState::NotStarted);
        assert!(control.events().is_none());
    }

    #[tokio::test]
    async fn start_then_stop_is_clean_and_idempotent() {
        let source = ScriptedSource {
            frames: vec![blank_frame()],
            fail_open: false,
        };
        let config = FollowConfig {
            loop_period: Duration::from_millis(5),
            ..FollowConfig::default()
        };
        let mut control = ControlLoop::new(source, LinkSlot::new(), config);

        control.start().expect("camera opens");
        assert_eq!(control.state(), LoopState::Running);
        // Starting again while running is a no-op.
        control.start().expect("no-op");

        tokio::time::sleep(Duration::from_millis(30)).await;

        control.stop().await;
        assert_eq!(control.state(), LoopState::Stopped);
        // Stopping again is a no-op.
        control.stop().await;
        assert_eq!(control.state(), LoopState::Stopped);
    }
}
