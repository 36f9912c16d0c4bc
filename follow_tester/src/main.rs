use std::env;
use std::sync::Arc;
use std::time::Duration;

use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::info;

use go2_follow::camera::{Camera, CameraError, CameraSource};
use go2_follow::control_loop::ControlLoop;
use go2_follow::core_modules::dispatcher::{LinkSlot, RobotLink};
use go2_follow::core_modules::frame::Frame;
use go2_follow::pipeline::FollowConfig;

const CAPTURE_WIDTH: f64 = 640.0;
const CAPTURE_HEIGHT: f64 = 480.0;
const CAPTURE_FPS: f64 = 15.0;

/// Either a V4L device index ("0") or a video file path.
enum Input {
    Device(i32),
    File(String),
}

/// A camera backed by an OpenCV `VideoCapture`. Frames come out of OpenCV as
/// BGR; the follower wants RGBA, so every read converts.
struct OpenCvCamera {
    capture: VideoCapture,
    frame: Mat,
    rgba: Mat,
}

impl Camera for OpenCvCamera {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let grabbed = self
            .capture
            .read(&mut self.frame)
            .map_err(|e| CameraError::TransientFrame(e.to_string()))?;
        if !grabbed || self.frame.empty() {
            return Err(CameraError::TransientFrame("no frame from device".into()));
        }

        imgproc::cvt_color(&self.frame, &mut self.rgba, imgproc::COLOR_BGR2RGBA, 0)
            .map_err(|e| CameraError::TransientFrame(e.to_string()))?;

        let width = self.rgba.cols() as u32;
        let height = self.rgba.rows() as u32;
        let data = self
            .rgba
            .data_bytes()
            .map_err(|e| CameraError::TransientFrame(e.to_string()))?
            .to_vec();
        Ok(Frame::new(width, height, data))
    }
}

struct OpenCvSource {
    input: Input,
}

impl CameraSource for OpenCvSource {
    type Cam = OpenCvCamera;

    fn open(&mut self) -> Result<OpenCvCamera, CameraError> {
        let mut capture = match &self.input {
            Input::Device(index) => VideoCapture::new(*index, videoio::CAP_ANY),
            Input::File(path) => VideoCapture::from_file(path, videoio::CAP_ANY),
        }
        .map_err(|e| CameraError::Acquisition(e.to_string()))?;

        if !capture
            .is_opened()
            .map_err(|e| CameraError::Acquisition(e.to_string()))?
        {
            return Err(CameraError::Acquisition("device did not open".into()));
        }

        // Hints only; the device keeps whatever it actually supports.
        let _ = capture.set(videoio::CAP_PROP_FRAME_WIDTH, CAPTURE_WIDTH);
        let _ = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, CAPTURE_HEIGHT);
        let _ = capture.set(videoio::CAP_PROP_FPS, CAPTURE_FPS);

        Ok(OpenCvCamera {
            capture,
            frame: Mat::default(),
            rgba: Mat::default(),
        })
    }
}

/// A stand-in robot link that logs every envelope instead of transmitting it.
/// Lets the whole follower run against a webcam with no robot on the bench.
struct ConsoleLink;

impl RobotLink for ConsoleLink {
    fn is_ready(&self) -> bool {
        true
    }

    fn send(&self, payload: &str) -> anyhow::Result<()> {
        info!(payload, "would transmit");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: follow_tester <device_index | video_path> [period_ms]");
        return Ok(());
    }
    let input = match args[1].parse::<i32>() {
        Ok(index) => Input::Device(index),
        Err(_) => Input::File(args[1].clone()),
    };
    let mut config = FollowConfig::default();
    if let Some(period_ms) = args.get(2) {
        config.loop_period = Duration::from_millis(period_ms.parse()?);
    }

    let link = LinkSlot::new();
    link.install(Arc::new(ConsoleLink));

    let mut control = ControlLoop::new(OpenCvSource { input }, link, config);
    control.start()?;
    info!("follower running; ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    control.stop().await;
    Ok(())
}
