//! Scripted engines and solvers for exercising the pipeline without native libraries.
//!
//! [`ScriptedEngine`] plays back canned raw detections and counts every native object it hands
//! out, so tests can check that sessions release what they acquire. [`ScriptedSolver`] returns
//! fixed hypotheses; [`ProjectiveSolver`] derives them from known ground-truth poses.

use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use nalgebra::{Matrix3, Rotation3, Vector3};

use crate::config::TagFamily;
use crate::engine::{DetectionEngine, EngineParams, RawDetection};
use crate::error::{Result, TagPoseError};
use crate::family::FamilyDescriptor;
use crate::image::ImageView;
use crate::pose::{
    tag_object_points, CameraIntrinsics, DetectionInfo, Pose, PoseHypothesis, PoseSolution,
    PoseSolver,
};

mod scene;

pub use scene::{Scene, SceneBuilder, TagPlacement};

// ============================================================================
// NATIVE OBJECT COUNTERS
// ============================================================================

#[derive(Debug, Default)]
struct CounterState {
    live_families: AtomicUsize,
    live_detectors: AtomicUsize,
    live_buffers: AtomicUsize,
    buffers_allocated: AtomicUsize,
    destroyed_families: Mutex<Vec<TagFamily>>,
    teardown_log: Mutex<Vec<String>>,
}

/// Shared counters of the native objects a [`ScriptedEngine`] has handed out.
///
/// Clones share state, so a test can keep a handle after the engine moves into a session.
#[derive(Clone, Debug, Default)]
pub struct NativeCounters {
    inner: Arc<CounterState>,
}

impl NativeCounters {
    /// Family descriptors created and not yet destroyed.
    #[must_use]
    pub fn live_families(&self) -> usize {
        self.inner.live_families.load(Ordering::SeqCst)
    }

    /// Detectors created and not yet destroyed.
    #[must_use]
    pub fn live_detectors(&self) -> usize {
        self.inner.live_detectors.load(Ordering::SeqCst)
    }

    /// Detection buffers currently alive.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.inner.live_buffers.load(Ordering::SeqCst)
    }

    /// Detection buffers allocated so far.
    #[must_use]
    pub fn buffers_allocated(&self) -> usize {
        self.inner.buffers_allocated.load(Ordering::SeqCst)
    }

    /// Families in the order their descriptors were destroyed.
    #[must_use]
    pub fn destroyed_families(&self) -> Vec<TagFamily> {
        self.inner
            .destroyed_families
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Destruction order: `"detector"` or a family name per entry.
    #[must_use]
    pub fn teardown_log(&self) -> Vec<String> {
        self.inner
            .teardown_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn log_teardown(&self, what: &str) {
        self.inner
            .teardown_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(what.to_string());
    }
}

// ============================================================================
// SCRIPTED ENGINE
// ============================================================================

/// Family handle issued by [`ScriptedEngine`].
#[derive(Debug)]
pub struct ScriptedFamily {
    family: TagFamily,
    handle: u64,
}

impl ScriptedFamily {
    /// Variant the handle was created for.
    #[must_use]
    pub fn family(&self) -> TagFamily {
        self.family
    }

    /// Engine-unique handle number.
    #[must_use]
    pub fn handle(&self) -> u64 {
        self.handle
    }
}

/// Detector handle issued by [`ScriptedEngine`].
#[derive(Debug)]
pub struct ScriptedDetector {
    params: EngineParams,
    families: Vec<(TagFamily, u64)>,
}

impl ScriptedDetector {
    /// Parameters applied at creation.
    #[must_use]
    pub fn params(&self) -> EngineParams {
        self.params
    }
}

/// Detection buffer; dropping it returns the storage to the engine.
#[derive(Debug)]
pub struct DetectionBuffer {
    detections: Vec<RawDetection>,
    counters: NativeCounters,
}

impl Deref for DetectionBuffer {
    type Target = [RawDetection];

    fn deref(&self) -> &[RawDetection] {
        &self.detections
    }
}

impl Drop for DetectionBuffer {
    fn drop(&mut self) {
        self.counters.inner.live_buffers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A [`DetectionEngine`] that plays back a fixed list of raw detections on every call.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    detections: Vec<RawDetection>,
    failing_family: Option<TagFamily>,
    counters: NativeCounters,
    last_params: Option<EngineParams>,
    capture_frames: bool,
    last_frame: Option<Vec<u8>>,
    next_handle: u64,
}

impl ScriptedEngine {
    /// An engine that detects nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `detections` from every `detect` call, in this order.
    #[must_use]
    pub fn with_detections(mut self, detections: Vec<RawDetection>) -> Self {
        self.detections = detections;
        self
    }

    /// Refuse to create descriptors for `family`.
    #[must_use]
    pub fn failing_family(mut self, family: TagFamily) -> Self {
        self.failing_family = Some(family);
        self
    }

    /// Replace the scripted detections.
    pub fn set_detections(&mut self, detections: Vec<RawDetection>) {
        self.detections = detections;
    }

    /// Shared native object counters.
    #[must_use]
    pub fn counters(&self) -> &NativeCounters {
        &self.counters
    }

    /// Parameters applied to the most recently created detector.
    #[must_use]
    pub fn last_params(&self) -> Option<EngineParams> {
        self.last_params
    }

    /// Keep a packed copy of every frame handed to `detect`.
    #[must_use]
    pub fn with_frame_capture(mut self) -> Self {
        self.capture_frames = true;
        self
    }

    /// Visible pixels of the last frame seen, row padding removed.
    #[must_use]
    pub fn last_frame(&self) -> Option<&[u8]> {
        self.last_frame.as_deref()
    }
}

impl DetectionEngine for ScriptedEngine {
    type Family = ScriptedFamily;
    type Detector = ScriptedDetector;
    type Detections = DetectionBuffer;

    fn create_family(&mut self, descriptor: &'static FamilyDescriptor) -> Option<ScriptedFamily> {
        if self.failing_family == Some(descriptor.family) {
            return None;
        }
        self.next_handle += 1;
        self.counters.inner.live_families.fetch_add(1, Ordering::SeqCst);
        Some(ScriptedFamily {
            family: descriptor.family,
            handle: self.next_handle,
        })
    }

    fn destroy_family(&mut self, descriptor: &'static FamilyDescriptor, family: ScriptedFamily) {
        assert_eq!(
            descriptor.family, family.family,
            "family handle destroyed with the wrong destructor"
        );
        self.counters.inner.live_families.fetch_sub(1, Ordering::SeqCst);
        self.counters
            .inner
            .destroyed_families
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(family.family);
        self.counters.log_teardown(descriptor.name);
    }

    fn create_detector(&mut self, params: &EngineParams) -> ScriptedDetector {
        self.last_params = Some(*params);
        self.counters.inner.live_detectors.fetch_add(1, Ordering::SeqCst);
        ScriptedDetector {
            params: *params,
            families: Vec::new(),
        }
    }

    fn add_family(
        &mut self,
        detector: &mut ScriptedDetector,
        descriptor: &'static FamilyDescriptor,
        family: &ScriptedFamily,
    ) {
        detector.families.push((descriptor.family, family.handle));
    }

    fn detect(&mut self, detector: &mut ScriptedDetector, image: &ImageView<'_>) -> DetectionBuffer {
        if self.capture_frames {
            self.last_frame = Some(image.to_packed());
        }
        self.counters.inner.live_buffers.fetch_add(1, Ordering::SeqCst);
        self.counters
            .inner
            .buffers_allocated
            .fetch_add(1, Ordering::SeqCst);
        let detections = if detector.families.is_empty() {
            Vec::new()
        } else {
            self.detections.clone()
        };
        DetectionBuffer {
            detections,
            counters: self.counters.clone(),
        }
    }

    fn destroy_detector(&mut self, _detector: ScriptedDetector) {
        self.counters.inner.live_detectors.fetch_sub(1, Ordering::SeqCst);
        self.counters.log_teardown("detector");
    }
}

// ============================================================================
// SCRIPTED SOLVER
// ============================================================================

/// A [`PoseSolver`] that returns the same solution for every detection.
#[derive(Debug)]
pub struct ScriptedSolver {
    solution: PoseSolution,
    failing: HashSet<i32>,
    calls: Mutex<Vec<(DetectionInfo, usize)>>,
}

impl Default for ScriptedSolver {
    fn default() -> Self {
        // Second hypothesis is the first flipped about the tag's x axis.
        let flipped = Matrix3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0);
        Self {
            solution: PoseSolution {
                first: PoseHypothesis {
                    pose: Pose::new(Matrix3::identity(), Vector3::new(0.0, 0.0, 1.0)),
                    reprojection_error: 0.01,
                },
                second: PoseHypothesis {
                    pose: Pose::new(flipped, Vector3::new(0.0, 0.0, 1.0)),
                    reprojection_error: 0.02,
                },
            },
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedSolver {
    /// Solver returning an identity pose one unit in front of the camera.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `solution` for every detection.
    #[must_use]
    pub fn with_solution(mut self, solution: PoseSolution) -> Self {
        self.solution = solution;
        self
    }

    /// Fail with [`TagPoseError::PoseEstimationFailed`] for `tag_id`.
    #[must_use]
    pub fn failing_for(mut self, tag_id: i32) -> Self {
        self.failing.insert(tag_id);
        self
    }

    /// Every `(info, max_iterations)` the solver was called with, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(DetectionInfo, usize)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PoseSolver for ScriptedSolver {
    fn estimate(&self, info: &DetectionInfo, max_iterations: usize) -> Result<PoseSolution> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((*info, max_iterations));
        if self.failing.contains(&info.tag_id) {
            return Err(TagPoseError::PoseEstimationFailed {
                tag_id: info.tag_id,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(self.solution)
    }
}

// ============================================================================
// PROJECTIVE SOLVER
// ============================================================================

/// A [`PoseSolver`] that knows the true pose of each tag id.
///
/// It returns the true pose and a tilted alternative, each scored by its actual reprojection
/// error against the observed corners.
#[derive(Debug, Clone, Default)]
pub struct ProjectiveSolver {
    poses: HashMap<i32, Pose>,
    alternative_first: bool,
    alternative_tilt: f64,
}

impl ProjectiveSolver {
    /// Solver with the given ground-truth poses.
    #[must_use]
    pub fn new(poses: HashMap<i32, Pose>) -> Self {
        Self {
            poses,
            alternative_first: false,
            alternative_tilt: 0.4,
        }
    }

    /// Report the alternative hypothesis before the true one.
    #[must_use]
    pub fn alternative_first(mut self, enable: bool) -> Self {
        self.alternative_first = enable;
        self
    }

    /// Tilt (radians, about the tag's y axis) of the alternative hypothesis.
    #[must_use]
    pub fn alternative_tilt(mut self, radians: f64) -> Self {
        self.alternative_tilt = radians;
        self
    }
}

impl PoseSolver for ProjectiveSolver {
    fn estimate(&self, info: &DetectionInfo, _max_iterations: usize) -> Result<PoseSolution> {
        let truth = self
            .poses
            .get(&info.tag_id)
            .copied()
            .ok_or_else(|| TagPoseError::PoseEstimationFailed {
                tag_id: info.tag_id,
                reason: "no ground-truth pose".to_string(),
            })?;

        let tilt = Rotation3::from_euler_angles(0.0, self.alternative_tilt, 0.0);
        let alternative = Pose::new(truth.rotation * tilt.matrix(), truth.translation);

        let truth = PoseHypothesis {
            pose: truth,
            reprojection_error: reprojection_error(&truth, info),
        };
        let alternative = PoseHypothesis {
            pose: alternative,
            reprojection_error: reprojection_error(&alternative, info),
        };

        Ok(if self.alternative_first {
            PoseSolution {
                first: alternative,
                second: truth,
            }
        } else {
            PoseSolution {
                first: truth,
                second: alternative,
            }
        })
    }
}

// ============================================================================
// GEOMETRY HELPERS
// ============================================================================

/// Project the four corners of a square tag under `pose`.
#[must_use]
pub fn project_tag_corners(
    pose: &Pose,
    tag_size: f64,
    intrinsics: &CameraIntrinsics,
) -> [[f64; 2]; 4] {
    let obj_pts = tag_object_points(tag_size);
    let mut corners = [[0.0; 2]; 4];
    for (corner, p) in corners.iter_mut().zip(obj_pts.iter()) {
        *corner = pose.project(p, intrinsics);
    }
    corners
}

/// Mean squared pixel distance between `info.corners` and the corners projected by `pose`.
#[must_use]
pub fn reprojection_error(pose: &Pose, info: &DetectionInfo) -> f64 {
    let projected = project_tag_corners(pose, info.tag_size, &info.intrinsics);
    projected
        .iter()
        .zip(info.corners.iter())
        .map(|(p, o)| {
            let dx = p[0] - o[0];
            let dy = p[1] - o[1];
            dx * dx + dy * dy
        })
        .sum::<f64>()
        / 4.0
}

/// Sort corners by x (then y) so corner sets can be compared regardless of winding start.
#[must_use]
pub fn sort_corners_by_x(corners: &[[f64; 2]; 4]) -> [[f64; 2]; 4] {
    let mut sorted = *corners;
    sorted.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projective_solver_prefers_truth() {
        let intrinsics = CameraIntrinsics::new(800.0, 800.0, 400.0, 300.0);
        let truth = Pose::new(
            Rotation3::from_euler_angles(0.2, -0.1, 0.3).into_inner(),
            Vector3::new(0.1, -0.2, 1.5),
        );
        let info = DetectionInfo {
            tag_id: 4,
            tag_size: 0.16,
            intrinsics,
            corners: project_tag_corners(&truth, 0.16, &intrinsics),
        };
        let solver = ProjectiveSolver::new(HashMap::from([(4, truth)])).alternative_first(true);
        let solution = solver.estimate(&info, 50).unwrap();
        assert!(solution.second.reprojection_error < 1e-12);
        assert!(solution.first.reprojection_error > solution.second.reprojection_error);
        assert_eq!(solution.select().pose, truth);
    }

    #[test]
    fn test_projective_solver_unknown_id() {
        let solver = ProjectiveSolver::new(HashMap::new());
        let info = DetectionInfo {
            tag_id: 1,
            tag_size: 0.1,
            intrinsics: CameraIntrinsics::identity(),
            corners: [[0.0; 2]; 4],
        };
        assert!(matches!(
            solver.estimate(&info, 50),
            Err(TagPoseError::PoseEstimationFailed { tag_id: 1, .. })
        ));
    }

    #[test]
    fn test_sort_corners_by_x() {
        let sorted = sort_corners_by_x(&[[3.0, 0.0], [1.0, 5.0], [1.0, 2.0], [2.0, 0.0]]);
        assert_eq!(sorted, [[1.0, 2.0], [1.0, 5.0], [2.0, 0.0], [3.0, 0.0]]);
    }
}
