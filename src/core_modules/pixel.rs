// THEORY:
// The `Pixel` module is the most fundamental unit of the follower's vision path. It is
// a "dumb" data container for a single RGBA pixel plus the one single-pixel heuristic
// the detector needs: conversion into hue-saturation-value space. HSV separates the
// chromatic angle from brightness and saturation, which keeps color-range thresholding
// stable when ambient lighting changes.
//
// Key principles:
// 1.  **Single-pixel scope**: nothing here reads neighbors or history. Spatial logic
//     lives in `mask` and `blob_detector`.
// 2.  **8-bit HSV convention**: hue is halved into 0..=180 and saturation/value are
//     scaled to 0..=255, so the field-tuned threshold constants for the red target
//     carry over byte-for-byte from the deployed tracker configs.

pub mod pixel {
    pub type Channel = u8;

    /// A color in hue-saturation-value space using the 8-bit convention:
    /// `h` in 0..=180 (degrees halved), `s` and `v` in 0..=255.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Hsv {
        pub h: Channel,
        pub s: Channel,
        pub v: Channel,
    }

    impl Hsv {
        pub const fn new(h: Channel, s: Channel, v: Channel) -> Self {
            Self { h, s, v }
        }
    }

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255). Ignored by the detector.
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Self {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// Converts the pixel into 8-bit HSV.
        ///
        /// An achromatic pixel (zero chroma) reports hue 0; a black pixel also
        /// reports zero saturation.
        pub fn hsv(&self) -> Hsv {
            let r = self.red as f32 / 255.0;
            let g = self.green as f32 / 255.0;
            let b = self.blue as f32 / 255.0;

            let max = r.max(g).max(b);
            let min = r.min(g).min(b);
            let chroma = max - min;

            let hue_degrees = if chroma == 0.0 {
                0.0
            } else if max == r {
                60.0 * ((g - b) / chroma).rem_euclid(6.0)
            } else if max == g {
                60.0 * ((b - r) / chroma + 2.0)
            } else {
                60.0 * ((r - g) / chroma + 4.0)
            };

            let saturation = if max == 0.0 { 0.0 } else { chroma / max };

            Hsv {
                h: (hue_degrees / 2.0).round() as Channel,
                s: (saturation * 255.0).round() as Channel,
                v: (max * 255.0).round() as Channel,
            }
        }
    }
}
