//! Landmark geometry.

use serde::{Deserialize, Serialize};

/// A 2D landmark position in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Point at `(x, y)`.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Six contour points around one eye.
///
/// Ordered `p1..p6`: outer corner, two upper-lid points, inner corner, two
/// lower-lid points, so that `p2/p6` and `p3/p5` are vertical pairs and
/// `p1/p4` is the horizontal span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EyeContour(pub [Point; 6]);

impl EyeContour {
    /// Returns point `pN` using the 1-based names from the EAR formula.
    #[inline]
    pub fn p(&self, n: usize) -> Point {
        self.0[n - 1]
    }
}

/// Eye landmarks for the primary face in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    /// Subject's left eye.
    pub left_eye: EyeContour,
    /// Subject's right eye.
    pub right_eye: EyeContour,
    /// Detection confidence reported by the backend, 0.0-1.0.
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

/// Dense face-mesh layouts that eye contours can be lifted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshLayout {
    /// MediaPipe Face Mesh, 468 points (478 with refined irises).
    MediaPipe468,
    /// dlib / iBUG 68-point layout.
    Dlib68,
}

impl MeshLayout {
    fn eye_indices(self) -> ([usize; 6], [usize; 6]) {
        match self {
            MeshLayout::MediaPipe468 => (
                [33, 160, 158, 133, 153, 144],
                [362, 385, 387, 263, 373, 380],
            ),
            MeshLayout::Dlib68 => ([42, 43, 44, 45, 46, 47], [36, 37, 38, 39, 40, 41]),
        }
    }

    /// Minimum number of points a mesh of this layout must carry.
    pub fn point_count(self) -> usize {
        match self {
            MeshLayout::MediaPipe468 => 468,
            MeshLayout::Dlib68 => 68,
        }
    }
}

impl LandmarkSet {
    /// Eye contours with the backend's detection confidence.
    pub fn new(left_eye: EyeContour, right_eye: EyeContour, confidence: f32) -> Self {
        Self {
            left_eye,
            right_eye,
            confidence,
        }
    }

    /// Picks the eye contours out of a full face mesh.
    ///
    /// Returns `None` when the mesh has fewer points than the layout needs.
    pub fn from_mesh(points: &[Point], layout: MeshLayout, confidence: f32) -> Option<Self> {
        if points.len() < layout.point_count() {
            return None;
        }
        let (left, right) = layout.eye_indices();
        let pick = |idx: [usize; 6]| EyeContour(idx.map(|i| points[i]));

        Some(Self::new(pick(left), pick(right), confidence))
    }
}
