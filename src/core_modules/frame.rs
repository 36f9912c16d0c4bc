// THEORY:
// The `frame` module defines the data that flows into the vision side of the control
// loop. A `Frame` is owned transiently by the loop for exactly one iteration: it is
// captured, analyzed, and discarded. Nothing downstream retains frame buffers, which
// keeps the loop's memory footprint flat regardless of how long it runs.
//
// `ColorRange` is the immutable target-color configuration. A target may need more
// than one range: red straddles the hue wrap-around at 0/180, so the stock red preset
// is a pair of ranges that are unioned at mask time.

use std::time::Instant;

use crate::core_modules::pixel::pixel::{Hsv, Pixel};

/// Bytes per pixel in a frame buffer (RGBA).
pub const FRAME_CHANNELS: usize = 4;

/// One captured RGBA frame plus its dimensions and capture instant.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA bytes, row-major, `width * height * 4` long.
    pub data: Vec<u8>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            captured_at: Instant::now(),
        }
    }

    /// A frame is well formed when it has non-zero dimensions and its buffer length
    /// matches them exactly. The detector treats anything else as "no observation".
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == (self.width as usize) * (self.height as usize) * FRAME_CHANNELS
    }

    /// Reads the pixel at `(x, y)`. Callers must stay in bounds; the mask layer
    /// iterates only over `0..width` x `0..height`.
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        let index = (y as usize * self.width as usize + x as usize) * FRAME_CHANNELS;
        Pixel::new(
            self.data[index],
            self.data[index + 1],
            self.data[index + 2],
            self.data[index + 3],
        )
    }
}

/// An inclusive `(lower, upper)` box in HSV space. Immutable configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl ColorRange {
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, color: Hsv) -> bool {
        self.lower.h <= color.h
            && color.h <= self.upper.h
            && self.lower.s <= color.s
            && color.s <= self.upper.s
            && self.lower.v <= color.v
            && color.v <= self.upper.v
    }

    /// The stock red target: two ranges covering both sides of the hue wrap-around,
    /// with the saturation/value floors tuned on the deployed robot.
    pub fn red_pair() -> Vec<ColorRange> {
        vec![
            ColorRange::new(Hsv::new(0, 120, 70), Hsv::new(10, 255, 255)),
            ColorRange::new(Hsv::new(170, 120, 70), Hsv::new(180, 255, 255)),
        ]
    }
}
