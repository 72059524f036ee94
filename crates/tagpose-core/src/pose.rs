//! Camera model, pose hypotheses and the pose-solver seam.

use nalgebra::{Matrix3, Vector3};

use crate::error::{Result, TagPoseError};

/// Camera intrinsics parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraIntrinsics {
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Create new intrinsics.
    #[must_use]
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Unit focal lengths, principal point at the origin.
    #[must_use]
    pub fn identity() -> Self {
        Self::new(1.0, 1.0, 0.0, 0.0)
    }

    /// Read intrinsics from a 3x3 camera matrix.
    ///
    /// Only `(0,0)`, `(1,1)`, `(0,2)` and `(1,2)` are read; skew and the bottom row are ignored.
    pub fn from_matrix(k: &Matrix3<f64>) -> Result<Self> {
        let intrinsics = Self::new(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)]);
        intrinsics.validate()?;
        Ok(intrinsics)
    }

    /// Check that focal lengths are finite and non-zero and the center is finite.
    pub fn validate(&self) -> Result<()> {
        for (name, f) in [("fx", self.fx), ("fy", self.fy)] {
            if !f.is_finite() || f == 0.0 {
                return Err(TagPoseError::InvalidIntrinsics {
                    reason: format!("{name} must be finite and non-zero, got {f}"),
                });
            }
        }
        if !self.cx.is_finite() || !self.cy.is_finite() {
            return Err(TagPoseError::InvalidIntrinsics {
                reason: format!("principal point ({}, {}) is not finite", self.cx, self.cy),
            });
        }
        Ok(())
    }
}

/// A 3D pose representing rotation and translation, in the solver's camera convention
/// (x right, y down, z into the scene).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// 3x3 Rotation matrix.
    pub rotation: Matrix3<f64>,
    /// 3x1 Translation vector.
    pub translation: Vector3<f64>,
}

impl Pose {
    /// Create a new pose.
    #[must_use]
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Project a 3D point into the image using this pose and intrinsics.
    #[must_use]
    pub fn project(&self, point: &Vector3<f64>, intrinsics: &CameraIntrinsics) -> [f64; 2] {
        let p_cam = self.rotation * point + self.translation;
        let x = (p_cam.x / p_cam.z) * intrinsics.fx + intrinsics.cx;
        let y = (p_cam.y / p_cam.z) * intrinsics.fy + intrinsics.cy;
        [x, y]
    }
}

/// One candidate pose with its reprojection error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseHypothesis {
    /// Candidate pose.
    pub pose: Pose,
    /// Residual between observed and reprojected corners under `pose`.
    pub reprojection_error: f64,
}

/// The two locally optimal poses of a planar tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSolution {
    /// First hypothesis as returned by the solver.
    pub first: PoseHypothesis,
    /// Second hypothesis as returned by the solver.
    pub second: PoseHypothesis,
}

impl PoseSolution {
    /// Pick the hypothesis with the lower reprojection error.
    ///
    /// Ties go to `first` (`first <= second`). This tie-break only makes the choice
    /// deterministic; it says nothing about which of two equally good poses is physically
    /// correct. If `first`'s error is NaN, `second` is chosen.
    #[must_use]
    pub fn select(self) -> PoseHypothesis {
        if self.first.reprojection_error <= self.second.reprojection_error {
            self.first
        } else {
            self.second
        }
    }
}

/// Everything the solver needs to pose one detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionInfo {
    /// Tag id being posed.
    pub tag_id: i32,
    /// Physical side length of the tag.
    pub tag_size: f64,
    /// Camera intrinsics.
    pub intrinsics: CameraIntrinsics,
    /// Image corners, already reflected if reflection is enabled.
    pub corners: [[f64; 2]; 4],
}

impl DetectionInfo {
    /// Tag corners in object space: centered at the origin on the z = 0 plane, in the same
    /// winding as the image corners.
    #[must_use]
    pub fn object_points(&self) -> [Vector3<f64>; 4] {
        tag_object_points(self.tag_size)
    }
}

/// Corners of a square tag of side `tag_size`, centered on the z = 0 plane.
#[must_use]
pub fn tag_object_points(tag_size: f64) -> [Vector3<f64>; 4] {
    let s = tag_size * 0.5;
    [
        Vector3::new(-s, s, 0.0),
        Vector3::new(s, s, 0.0),
        Vector3::new(s, -s, 0.0),
        Vector3::new(-s, -s, 0.0),
    ]
}

/// External planar pose solver (e.g. orthogonal iteration).
///
/// Implementations return both hypotheses of the planar ambiguity, or
/// [`TagPoseError::PoseEstimationFailed`] when no pose can be computed.
pub trait PoseSolver {
    /// Estimate the two pose hypotheses for one detection.
    fn estimate(&self, info: &DetectionInfo, max_iterations: usize) -> Result<PoseSolution>;
}

impl<F> PoseSolver for F
where
    F: Fn(&DetectionInfo, usize) -> Result<PoseSolution>,
{
    fn estimate(&self, info: &DetectionInfo, max_iterations: usize) -> Result<PoseSolution> {
        self(info, max_iterations)
    }
}
