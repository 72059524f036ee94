//! Detection-to-pose pipeline for AprilTag fiducials.
//!
//! Tagpose sits between an external quad-detection engine and the application: it takes the
//! raw `{id, decision margin, corners}` detections an engine produces, filters them, asks an
//! external planar pose solver for the two candidate poses of each tag, picks one, and returns
//! a homogeneous transform in a y-up, z-out camera convention.
//!
//! # Architecture Overview
//!
//! 1. **Family registry** ([`family`]): one native descriptor per requested
//!    [`TagFamily`], created once and destroyed exactly once with the matching destructor.
//! 2. **Detector session** ([`session`]): owns the native detector, applies
//!    [`DetectorConfig`] once, and exposes `process_image`.
//! 3. **Filter and pose resolver** ([`filter`]): margin cut, size lookup, optional
//!    horizontal reflection, pose estimation and hypothesis selection.
//! 4. **Coordinate converter** ([`transform`]): `diag(1, -1, -1, 1) * [R | t]`.
//!
//! The engine and solver are traits ([`engine::DetectionEngine`], [`pose::PoseSolver`]);
//! [`test_utils`] provides scripted implementations of both.
//!
//! # Configuration
//!
//! - [`config::DetectorConfig`]: Engine-level settings (fixed after construction)
//! - [`config::PoseOptions`]: Per-call filtering and pose options
//!
//! # Example
//!
//! ```
//! # use tagpose_core::{DetectorSession, ImageView};
//! # use tagpose_core::config::{DetectorConfig, PoseOptions, TagFamily};
//! # use tagpose_core::engine::RawDetection;
//! # use tagpose_core::test_utils::{ScriptedEngine, ScriptedSolver};
//! let engine = ScriptedEngine::new().with_detections(vec![RawDetection {
//!     tag_id: 5,
//!     decision_margin: 42.0,
//!     corners: [[10.0, 30.0], [30.0, 30.0], [30.0, 10.0], [10.0, 10.0]],
//! }]);
//! let options = PoseOptions::builder()
//!     .intrinsics(600.0, 600.0, 32.0, 24.0)
//!     .tag_size(5, 0.16)
//!     .build();
//! let mut session = DetectorSession::new(
//!     engine,
//!     ScriptedSolver::new(),
//!     DetectorConfig::default(),
//!     &[TagFamily::Tag36h11],
//!     options,
//! )?;
//!
//! # let pixels = vec![0u8; 64 * 48];
//! let image = ImageView::packed(&pixels, 64, 48)?;
//! let detections = session.process_image(&image)?;
//! assert_eq!(detections.len(), 1);
//! assert_eq!(detections[0].tag_id, 5);
//! # Ok::<(), tagpose_core::TagPoseError>(())
//! ```

/// Configuration types for the pipeline.
pub mod config;
/// Quad-detection engine interface.
pub mod engine;
/// Error type.
pub mod error;
/// Tag family descriptors and registry.
pub mod family;
/// Detection filtering and pose resolution.
pub mod filter;
/// Image buffer abstractions.
pub mod image;
/// Camera model and pose solver interface.
pub mod pose;
/// Detector session lifecycle.
pub mod session;
/// Scripted engines, solvers and synthetic scenes for tests and benchmarks.
pub mod test_utils;
/// Solver-to-output coordinate conversion.
pub mod transform;

use nalgebra::{Matrix3, Matrix4, Vector3};

pub use crate::config::{DetectorConfig, PoseOptions, TagFamily};
pub use crate::error::{Result, TagPoseError};
pub use crate::filter::FilterStats;
pub use crate::image::ImageView;
pub use crate::session::DetectorSession;

/// A filtered, posed tag detection.
#[derive(Clone, Debug, PartialEq)]
pub struct TagDetection {
    /// The decoded ID of the tag.
    pub tag_id: i32,
    /// Tag-to-camera transform in the y-up, z-out convention.
    pub transform: Matrix4<f64>,
    /// The 4 corners in image pixels, reflected if reflection was enabled.
    pub corners: [[f64; 2]; 4],
}

impl TagDetection {
    /// Rotation block of the transform.
    #[must_use]
    pub fn rotation(&self) -> Matrix3<f64> {
        self.transform.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Translation column of the transform.
    #[must_use]
    pub fn translation(&self) -> Vector3<f64> {
        self.transform.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Mean of the four corners.
    #[must_use]
    pub fn center(&self) -> [f64; 2] {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), c| (sx + c[0], sy + c[1]));
        [sx / 4.0, sy / 4.0]
    }
}

/// Returns version and build information for the core library.
#[must_use]
pub fn core_info() -> String {
    format!("Tagpose Core v{}", env!("CARGO_PKG_VERSION"))
}
