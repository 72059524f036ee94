//! Error type shared by every stage of the pipeline.

use crate::config::TagFamily;
use thiserror::Error;

/// Errors reported by the detection-to-pose pipeline.
///
/// Per-detection filtering (low decision margin, unknown tag id) is not an error and never
/// shows up here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TagPoseError {
    /// The pixel buffer does not match the declared image geometry.
    #[error(
        "invalid image buffer: {width}x{height} with stride {stride} needs {required} bytes, got {len}"
    )]
    InvalidImageBuffer {
        /// Declared width in pixels.
        width: usize,
        /// Declared height in pixels.
        height: usize,
        /// Declared row pitch in bytes.
        stride: usize,
        /// Actual buffer length.
        len: usize,
        /// Length the geometry requires.
        required: usize,
    },

    /// The detection engine could not create a descriptor for a tag family.
    #[error("failed to create tag family descriptor for {family}")]
    FamilyCreationFailed {
        /// Family whose descriptor could not be created.
        family: TagFamily,
    },

    /// A family name did not match any supported tag family.
    #[error("unknown tag family: {name:?}")]
    UnknownFamily {
        /// The name that failed to parse.
        name: String,
    },

    /// The pose solver could not produce hypotheses for a detection.
    #[error("pose estimation failed for tag {tag_id}: {reason}")]
    PoseEstimationFailed {
        /// Tag id of the detection being posed.
        tag_id: i32,
        /// Solver-provided explanation.
        reason: String,
    },

    /// Camera intrinsics are unusable (zero or non-finite focal length, non-finite center).
    #[error("invalid camera intrinsics: {reason}")]
    InvalidIntrinsics {
        /// What was wrong with them.
        reason: String,
    },

    /// The session was already closed.
    #[error("detector session is closed")]
    SessionClosed,
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, TagPoseError>;
