// THEORY:
// The `mask` module is the first spatial stage of detection. It reduces an RGBA frame
// to a binary map of "pixels inside any configured color range", then cleans that map
// with one erosion pass followed by one dilation pass (a morphological opening). The
// erosion removes isolated speckle that would otherwise seed phantom blobs; the
// dilation restores the surviving shapes to their original extent. Solid regions at
// least 5 pixels across round-trip through the opening unchanged.
//
// The kernel is the fixed 3x3 square and the iteration count is fixed at 2, matching
// the deployed tracker. Out-of-frame neighbors count as background, so foreground
// touching the frame border erodes inward like any other edge.

use std::path::Path;

use image::ImageEncoder;

use crate::core_modules::frame::{ColorRange, Frame};

/// Erosion and dilation passes applied by [`ColorMask::clean`].
pub const MORPH_ITERATIONS: usize = 2;

/// A binary per-pixel mask over one frame.
pub struct ColorMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl ColorMask {
    /// Thresholds the frame against the union of `ranges`.
    ///
    /// The frame must be well formed; the detector checks that before building a mask.
    pub fn from_frame(frame: &Frame, ranges: &[ColorRange]) -> Self {
        let width = frame.width;
        let height = frame.height;
        let mut bits = vec![false; width as usize * height as usize];

        for y in 0..height {
            for x in 0..width {
                let hsv = frame.pixel(x, y).hsv();
                if ranges.iter().any(|range| range.contains(hsv)) {
                    bits[(y * width + x) as usize] = true;
                }
            }
        }

        Self {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[(y * self.width + x) as usize]
    }

    /// Morphological opening: `MORPH_ITERATIONS` erosions then the same number of
    /// dilations. Suppresses speckle while preserving blob shape.
    pub fn clean(&mut self) {
        for _ in 0..MORPH_ITERATIONS {
            self.erode();
        }
        for _ in 0..MORPH_ITERATIONS {
            self.dilate();
        }
    }

    /// One erosion pass: a pixel survives only if its full 3x3 neighborhood is
    /// foreground. Neighbors outside the frame count as background.
    fn erode(&mut self) {
        self.morph_pass(|all_neighbors_set, _| all_neighbors_set);
    }

    /// One dilation pass: a pixel becomes foreground if any pixel in its 3x3
    /// neighborhood is foreground.
    fn dilate(&mut self) {
        self.morph_pass(|_, any_neighbor_set| any_neighbor_set);
    }

    fn morph_pass(&mut self, keep: impl Fn(bool, bool) -> bool) {
        let width = self.width as i64;
        let height = self.height as i64;
        let mut out = vec![false; self.bits.len()];

        for y in 0..height {
            for x in 0..width {
                let mut all = true;
                let mut any = false;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let nx = x + dx;
                        let ny = y + dy;
                        let set = nx >= 0
                            && nx < width
                            && ny >= 0
                            && ny < height
                            && self.bits[(ny * width + nx) as usize];
                        all &= set;
                        any |= set;
                    }
                }
                out[(y * width + x) as usize] = keep(all, any);
            }
        }

        self.bits = out;
    }

    /// Number of foreground pixels. Handy for tests and for eyeballing thresholds.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }

    /// Dumps the mask as a grayscale PNG (white foreground on black), the same
    /// debugging aid the on-screen mask window used to provide.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), image::ImageError> {
        let buffer: Vec<u8> = self
            .bits
            .iter()
            .map(|&bit| if bit { 255u8 } else { 0u8 })
            .collect();
        let output = std::fs::File::create(path.as_ref())?;
        let encoder = image::codecs::png::PngEncoder::new(output);
        encoder.write_image(
            &buffer,
            self.width,
            self.height,
            image::ExtendedColorType::L8,
        )?;
        Ok(())
    }
}
