// THEORY:
// The `BlobDetector` is the engine of the spatial layer. It turns one frame into at
// most one target observation:
//
// 1.  **Masking**: threshold the frame against the configured color ranges and clean
//     the result with a morphological opening (see `mask`).
// 2.  **Component extraction**: walk the cleaned mask and grow each unvisited
//     foreground pixel into its full 4-connected component with a breadth-first
//     flood, aggregating area and bounding box as the region grows.
// 3.  **Selection**: keep only the largest component. A follower has exactly one
//     target; everything else is clutter by definition.
// 4.  **Gating**: if the largest component is smaller than `min_area`, report no
//     observation at all. Sub-threshold observations are never constructed, so the
//     rest of the pipeline can trust every observation it sees.
//
// The detector is a stateless utility: a pure function of the frame and the
// configured thresholds, with no memory of previous frames. Temporal judgment
// belongs to the `tracker`.

use crate::core_modules::frame::{ColorRange, Frame};
use crate::core_modules::mask::ColorMask;
use crate::core_modules::observation::{BlobObservation, BoundingBox, Point};

pub mod blob_detector {
    use super::*;

    /// Finds the largest color blob in `frame` that clears `min_area`.
    ///
    /// Returns `None` for malformed frames (zero dimension or mismatched buffer),
    /// for frames with no matching pixels, and for blobs below the area gate. The
    /// control loop never fails because of a bad frame.
    pub fn detect(
        frame: &Frame,
        ranges: &[ColorRange],
        min_area: usize,
    ) -> Option<BlobObservation> {
        if !frame.is_well_formed() || ranges.is_empty() {
            return None;
        }

        let mut mask = ColorMask::from_frame(frame, ranges);
        mask.clean();

        let best = largest_component(&mask)?;
        if best.area < min_area {
            return None;
        }

        Some(BlobObservation {
            center: best.bounding_box.center(),
            area: best.area,
            bounding_box: best.bounding_box,
        })
    }

    struct Component {
        area: usize,
        bounding_box: BoundingBox,
    }

    /// Scans the mask and returns the largest 4-connected foreground component.
    fn largest_component(mask: &ColorMask) -> Option<Component> {
        let width = mask.width() as usize;
        let height = mask.height() as usize;
        let mut visited = vec![false; width * height];
        let mut best: Option<Component> = None;

        for y in 0..height {
            for x in 0..width {
                if visited[y * width + x] || !mask.get(x as u32, y as u32) {
                    continue;
                }

                let component = grow_component(mask, &mut visited, x, y);
                let replace = match &best {
                    Some(current) => component.area > current.area,
                    None => true,
                };
                if replace {
                    best = Some(component);
                }
            }
        }

        best
    }

    /// Breadth-first flood from a seed pixel, aggregating the component's area and
    /// bounding box as it grows. A `visited` grid guarantees each pixel is counted
    /// exactly once across all components.
    fn grow_component(
        mask: &ColorMask,
        visited: &mut [bool],
        seed_x: usize,
        seed_y: usize,
    ) -> Component {
        let width = mask.width() as usize;
        let height = mask.height() as usize;

        let mut queue: Vec<(usize, usize)> = vec![(seed_x, seed_y)];
        visited[seed_y * width + seed_x] = true;

        let mut area = 0usize;
        let mut min_x = seed_x;
        let mut min_y = seed_y;
        let mut max_x = seed_x;
        let mut max_y = seed_y;

        while let Some((x, y)) = queue.pop() {
            area += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            // 4-connectivity: direct neighbors only, no diagonals.
            for (dx, dy) in &[(0i64, 1i64), (0, -1), (1, 0), (-1, 0)] {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                if !visited[ny * width + nx] && mask.get(nx as u32, ny as u32) {
                    visited[ny * width + nx] = true;
                    queue.push((nx, ny));
                }
            }
        }

        Component {
            area,
            bounding_box: BoundingBox {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            },
        }
    }
}
