// THEORY:
// The `observation` module holds the "dumb" data containers produced by the spatial
// layer. A `BlobObservation` is a snapshot of the best target candidate in a single
// frame; it has no memory of previous frames and is discarded after the tracker and
// planner consume it within the same loop iteration.

/// A 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// An axis-aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// The box center, matching the deployed tracker's `x + w / 2` convention.
    /// For a solid axis-aligned component this point always lies inside the blob.
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2,
            y: self.y + self.height / 2,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }
}

/// The single qualifying target detection for one frame.
///
/// Invariant: `area` is always at or above the detector's configured minimum; the
/// detector returns `None` instead of constructing a sub-threshold observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobObservation {
    pub center: Point,
    /// Pixel count of the connected component.
    pub area: usize,
    pub bounding_box: BoundingBox,
}
