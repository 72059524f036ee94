//! Detection filtering and pose resolution.
//!
//! Each raw detection goes through, in engine order:
//! 1. margin filter (`decision_margin` must be strictly greater than the threshold),
//! 2. size lookup (ids without a registered physical size are dropped),
//! 3. optional horizontal reflection of the corners (`x -> width - x`),
//! 4. pose estimation through the [`PoseSolver`],
//! 5. hypothesis selection (lower reprojection error, ties to the first),
//! 6. transform construction in the output convention.
//!
//! Rejections are silent to the caller; they are only counted in [`FilterStats`] and traced.

use crate::config::{PoseOptions, DEFAULT_MAX_ITERATIONS};
use crate::engine::RawDetection;
use crate::pose::{DetectionInfo, PoseSolver};
use crate::transform::pose_to_transform;
use crate::TagDetection;

/// Per-call counts of what happened to the raw detections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Raw detections returned by the engine.
    pub num_raw: usize,
    /// Dropped because the decision margin was at or below the threshold.
    pub num_rejected_by_margin: usize,
    /// Dropped because the tag id has no registered size.
    pub num_rejected_by_size: usize,
    /// Dropped because the pose solver failed.
    pub num_rejected_by_pose: usize,
    /// Emitted detections.
    pub num_accepted: usize,
}

/// Mirror corner x-coordinates about the image width, in place.
pub fn reflect_corners(corners: &mut [[f64; 2]; 4], image_width: usize) {
    let width = image_width as f64;
    for corner in corners.iter_mut() {
        corner[0] = width - corner[0];
    }
}

/// Filter `raw` and pose every surviving detection.
///
/// Output order follows input order; nothing is sorted or deduplicated.
pub fn resolve_detections<S>(
    raw: &[RawDetection],
    image_width: usize,
    options: &PoseOptions,
    solver: &S,
    stats: &mut FilterStats,
) -> Vec<TagDetection>
where
    S: PoseSolver + ?Sized,
{
    stats.num_raw += raw.len();
    let mut detections = Vec::with_capacity(raw.len());

    for det in raw {
        // NaN on either side fails the comparison and drops the detection.
        let above_margin = det.decision_margin > options.decision_margin;
        if !above_margin {
            tracing::debug!(
                tag_id = det.tag_id,
                margin = det.decision_margin,
                threshold = options.decision_margin,
                "dropping detection below decision margin"
            );
            stats.num_rejected_by_margin += 1;
            continue;
        }

        let Some(tag_size) = options.tag_size(det.tag_id) else {
            tracing::debug!(tag_id = det.tag_id, "dropping detection with unknown tag size");
            stats.num_rejected_by_size += 1;
            continue;
        };

        let mut corners = det.corners;
        if options.reflect_horizontally {
            reflect_corners(&mut corners, image_width);
        }

        let info = DetectionInfo {
            tag_id: det.tag_id,
            tag_size,
            intrinsics: options.intrinsics,
            corners,
        };
        let solution = match solver.estimate(&info, DEFAULT_MAX_ITERATIONS) {
            Ok(solution) => solution,
            Err(err) => {
                tracing::debug!(tag_id = det.tag_id, error = %err, "skipping detection");
                stats.num_rejected_by_pose += 1;
                continue;
            }
        };

        let selected = solution.select();
        tracing::trace!(
            tag_id = det.tag_id,
            err_first = solution.first.reprojection_error,
            err_second = solution.second.reprojection_error,
            chosen = selected.reprojection_error,
            "selected pose hypothesis"
        );

        detections.push(TagDetection {
            tag_id: det.tag_id,
            transform: pose_to_transform(&selected.pose.rotation, &selected.pose.translation),
            corners,
        });
        stats.num_accepted += 1;
    }

    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TagPoseError;
    use crate::pose::{Pose, PoseHypothesis, PoseSolution};
    use crate::test_utils::ScriptedSolver;
    use nalgebra::{Matrix3, Vector3, Vector4};
    use proptest::prelude::*;

    fn raw(tag_id: i32, margin: f32) -> RawDetection {
        RawDetection {
            tag_id,
            decision_margin: margin,
            corners: [[10.0, 20.0], [30.0, 20.0], [30.0, 40.0], [10.0, 40.0]],
        }
    }

    fn options() -> PoseOptions {
        PoseOptions::builder()
            .tag_size(1, 0.1)
            .tag_size(2, 0.2)
            .decision_margin(10.0)
            .build()
    }

    #[test]
    fn test_margin_is_strict() {
        let solver = ScriptedSolver::new();
        let mut stats = FilterStats::default();
        let out = resolve_detections(
            &[raw(1, 10.0), raw(1, 10.001), raw(2, 9.0)],
            100,
            &options(),
            &solver,
            &mut stats,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tag_id, 1);
        assert_eq!(stats.num_rejected_by_margin, 2);
        assert_eq!(stats.num_accepted, 1);
    }

    #[test]
    fn test_nan_margin_is_dropped() {
        let solver = ScriptedSolver::new();
        let mut stats = FilterStats::default();
        let out = resolve_detections(&[raw(1, f32::NAN)], 100, &options(), &solver, &mut stats);
        assert!(out.is_empty());
        assert_eq!(stats.num_rejected_by_margin, 1);

        let nan_threshold = PoseOptions::builder()
            .tag_size(1, 0.1)
            .decision_margin(f32::NAN)
            .build();
        let mut stats = FilterStats::default();
        let out = resolve_detections(
            &[raw(1, 50.0), raw(1, f32::INFINITY)],
            100,
            &nan_threshold,
            &solver,
            &mut stats,
        );
        assert!(out.is_empty());
        assert_eq!(stats.num_rejected_by_margin, 2);
        assert!(solver.calls().is_empty());
    }

    #[test]
    fn test_solver_gets_fixed_iteration_cap() {
        let solver = ScriptedSolver::new();
        let mut stats = FilterStats::default();
        resolve_detections(&[raw(1, 50.0)], 100, &options(), &solver, &mut stats);
        assert_eq!(solver.calls()[0].1, 50);
    }

    #[test]
    fn test_unknown_id_dropped_regardless_of_margin() {
        let solver = ScriptedSolver::new();
        let mut stats = FilterStats::default();
        let out = resolve_detections(&[raw(9, 1e6)], 100, &options(), &solver, &mut stats);
        assert!(out.is_empty());
        assert_eq!(stats.num_rejected_by_size, 1);
        assert!(solver.calls().is_empty(), "solver must not see unknown ids");
    }

    #[test]
    fn test_reflection_happens_before_solver() {
        let solver = ScriptedSolver::new();
        let mut stats = FilterStats::default();
        let mut opts = options();
        opts.reflect_horizontally = true;
        let out = resolve_detections(&[raw(2, 50.0)], 100, &opts, &solver, &mut stats);

        let expected = [[90.0, 20.0], [70.0, 20.0], [70.0, 40.0], [90.0, 40.0]];
        assert_eq!(out[0].corners, expected);
        let calls = solver.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.corners, expected);
        assert_eq!(calls[0].0.tag_size, 0.2);
        assert_eq!(calls[0].1, 50);
    }

    #[test]
    fn test_solver_failure_skips_only_that_detection() {
        let solver = ScriptedSolver::new().failing_for(1);
        let mut stats = FilterStats::default();
        let out = resolve_detections(
            &[raw(1, 50.0), raw(2, 50.0)],
            100,
            &options(),
            &solver,
            &mut stats,
        );
        assert_eq!(out.iter().map(|d| d.tag_id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(stats.num_rejected_by_pose, 1);
    }

    #[test]
    fn test_equal_errors_select_first() {
        let first = PoseHypothesis {
            pose: Pose::new(Matrix3::identity(), Vector3::new(0.0, 0.0, 1.0)),
            reprojection_error: 0.3,
        };
        let second = PoseHypothesis {
            pose: Pose::new(-Matrix3::identity(), Vector3::new(0.0, 0.0, 5.0)),
            reprojection_error: 0.3,
        };
        let solver = |_: &DetectionInfo, _: usize| -> crate::error::Result<PoseSolution> {
            Ok(PoseSolution { first, second })
        };
        let mut stats = FilterStats::default();
        let out = resolve_detections(&[raw(1, 50.0)], 100, &options(), &solver, &mut stats);
        assert_eq!(
            out[0].transform.column(3).into_owned(),
            Vector4::new(0.0, 0.0, -1.0, 1.0)
        );
    }

    #[test]
    fn test_closure_solver_error_variant() {
        let solver = |info: &DetectionInfo, _: usize| -> crate::error::Result<PoseSolution> {
            Err(TagPoseError::PoseEstimationFailed {
                tag_id: info.tag_id,
                reason: "degenerate quad".into(),
            })
        };
        let mut stats = FilterStats::default();
        let out = resolve_detections(&[raw(1, 50.0)], 100, &options(), &solver, &mut stats);
        assert!(out.is_empty());
        assert_eq!(stats.num_raw, 1);
    }

    proptest! {
        #[test]
        fn prop_order_preserved(ids in proptest::collection::vec(0i32..4, 0..20)) {
            let solver = ScriptedSolver::new();
            let opts = PoseOptions::builder()
                .tag_size(0, 0.1)
                .tag_size(1, 0.1)
                .tag_size(2, 0.1)
                .tag_size(3, 0.1)
                .build();
            let input: Vec<RawDetection> = ids.iter().map(|&id| raw(id, 50.0)).collect();
            let mut stats = FilterStats::default();
            let out = resolve_detections(&input, 100, &opts, &solver, &mut stats);
            prop_assert_eq!(out.iter().map(|d| d.tag_id).collect::<Vec<_>>(), ids);
        }

        #[test]
        fn prop_low_margin_never_emitted(
            margins in proptest::collection::vec(0.0f32..20.0, 1..20),
            threshold in 0.0f32..20.0
        ) {
            let solver = ScriptedSolver::new();
            let opts = PoseOptions::builder().tag_size(1, 0.1).decision_margin(threshold).build();
            let input: Vec<RawDetection> = margins.iter().map(|&m| raw(1, m)).collect();
            let mut stats = FilterStats::default();
            let out = resolve_detections(&input, 100, &opts, &solver, &mut stats);
            let expected = margins.iter().filter(|&&m| m > threshold).count();
            prop_assert_eq!(out.len(), expected);
            prop_assert_eq!(stats.num_rejected_by_margin + stats.num_accepted, margins.len());
        }
    }
}
