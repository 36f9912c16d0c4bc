// THEORY:
// The camera is an external collaborator with a fixed interface: open, read frames,
// release. The core only knows these traits; the concrete device (an OpenCV
// `VideoCapture` in `follow_tester`, a scripted source in tests) lives outside.
//
// `CameraSource` is a capability-checked factory: construction is attempted when the
// loop starts, and an absent or busy device surfaces as a typed error with no hidden
// partial state. The error taxonomy separates the one fatal failure (acquisition)
// from the recoverable one (a single bad frame).

use thiserror::Error;

use crate::core_modules::frame::Frame;

#[derive(Debug, Error)]
pub enum CameraError {
    /// The device could not be opened. Fatal to starting the loop; surfaced to the
    /// caller and never silently retried.
    #[error("failed to acquire camera: {0}")]
    Acquisition(String),
    /// One frame read failed. The loop skips the iteration and continues.
    #[error("failed to read frame: {0}")]
    TransientFrame(String),
}

/// An open camera. Dropped (and thereby released) when the loop exits, on every
/// exit path.
pub trait Camera: Send {
    fn read_frame(&mut self) -> Result<Frame, CameraError>;
}

/// Factory for cameras. Resolution and frame-rate preferences are hints the
/// implementation may apply at open time, not guarantees.
pub trait CameraSource: Send {
    type Cam: Camera + 'static;

    fn open(&mut self) -> Result<Self::Cam, CameraError>;
}
