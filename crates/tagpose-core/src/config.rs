//! Configuration types for the detection-to-pose pipeline.
//!
//! This module provides two configuration types:
//! - [`DetectorConfig`]: Engine-level configuration (fixed once the session is constructed)
//! - [`PoseOptions`]: Per-call filtering and pose options (snapshotted at the start of each call)

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TagPoseError;
use crate::pose::CameraIntrinsics;

// ============================================================================
// TagFamily
// ============================================================================

/// Tag family variants understood by the detection engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TagFamily {
    /// AprilTag 16h5 (30 codes, minimum hamming distance 5).
    Tag16h5,
    /// AprilTag 25h9 (35 codes, minimum hamming distance 9).
    Tag25h9,
    /// AprilTag 36h11 (587 codes, minimum hamming distance 11).
    Tag36h11,
    /// AprilTag circular 21h7.
    TagCircle21h7,
    /// AprilTag circular 49h12.
    TagCircle49h12,
    /// AprilTag custom 48h12 (recursive layout).
    TagCustom48h12,
    /// AprilTag standard 41h12.
    TagStandard41h12,
    /// AprilTag standard 52h13.
    TagStandard52h13,
}

impl TagFamily {
    /// Returns all available tag families.
    #[must_use]
    pub const fn all() -> &'static [TagFamily] {
        &[
            TagFamily::Tag16h5,
            TagFamily::Tag25h9,
            TagFamily::Tag36h11,
            TagFamily::TagCircle21h7,
            TagFamily::TagCircle49h12,
            TagFamily::TagCustom48h12,
            TagFamily::TagStandard41h12,
            TagFamily::TagStandard52h13,
        ]
    }

    /// Canonical family name as used by the AprilTag library (e.g. `tag36h11`).
    #[must_use]
    pub fn name(self) -> &'static str {
        crate::family::descriptor(self).name
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TagFamily {
    type Err = TagPoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::family::lookup_by_name(s)
            .map(|d| d.family)
            .ok_or_else(|| TagPoseError::UnknownFamily { name: s.to_string() })
    }
}

// ============================================================================
// DetectorConfig: engine-level configuration
// ============================================================================

/// Engine-level configuration for a [`DetectorSession`](crate::DetectorSession).
///
/// The native detector is configured exactly once, so these knobs cannot change after the
/// session has been constructed. Thread count and debug output are not configurable: the
/// engine always runs on a single worker with debug output disabled.
///
/// # Example
/// ```
/// use tagpose_core::config::DetectorConfig;
///
/// let config = DetectorConfig::builder()
///     .quad_decimate(2.0)
///     .refine_edges(true)
///     .build();
/// assert_eq!(config.quad_decimate, 2.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectorConfig {
    /// Image decimation applied before quad search (default: 1.0, no decimation).
    /// Larger values are faster but lose small tags.
    pub quad_decimate: f32,
    /// Snap quad edges to strong gradients after decimation (default: false).
    pub refine_edges: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            quad_decimate: 1.0,
            refine_edges: false,
        }
    }
}

impl DetectorConfig {
    /// Create a new builder for `DetectorConfig`.
    #[must_use]
    pub fn builder() -> DetectorConfigBuilder {
        DetectorConfigBuilder::default()
    }
}

/// Builder for [`DetectorConfig`].
#[derive(Default)]
pub struct DetectorConfigBuilder {
    quad_decimate: Option<f32>,
    refine_edges: Option<bool>,
}

impl DetectorConfigBuilder {
    /// Set the quad decimation factor.
    #[must_use]
    pub fn quad_decimate(mut self, factor: f32) -> Self {
        self.quad_decimate = Some(factor);
        self
    }

    /// Enable or disable edge refinement.
    #[must_use]
    pub fn refine_edges(mut self, enable: bool) -> Self {
        self.refine_edges = Some(enable);
        self
    }

    /// Build the configuration, using defaults for unset fields.
    #[must_use]
    pub fn build(self) -> DetectorConfig {
        let d = DetectorConfig::default();
        DetectorConfig {
            quad_decimate: self.quad_decimate.unwrap_or(d.quad_decimate),
            refine_edges: self.refine_edges.unwrap_or(d.refine_edges),
        }
    }
}

// ============================================================================
// PoseOptions: per-call options
// ============================================================================

/// Default decision margin threshold; detections must score strictly above it.
pub const DEFAULT_DECISION_MARGIN: f32 = 10.0;

/// Iteration cap handed to the pose solver on every call.
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Per-call filtering and pose options.
///
/// A session keeps one snapshot of these and reads it once at the start of every
/// `process_image` call, so a change never takes effect halfway through a frame.
///
/// # Example
/// ```
/// use tagpose_core::config::PoseOptions;
///
/// let options = PoseOptions::builder()
///     .intrinsics(600.0, 600.0, 320.0, 240.0)
///     .tag_size(0, 0.16)
///     .tag_size(7, 0.08)
///     .decision_margin(25.0)
///     .build();
/// assert_eq!(options.tag_sizes.len(), 2);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoseOptions {
    /// Camera intrinsics used for pose estimation.
    pub intrinsics: CameraIntrinsics,
    /// Physical side length per tag id. Ids missing here are dropped.
    pub tag_sizes: HashMap<i32, f64>,
    /// Detections with a decision margin at or below this value are dropped (default: 10.0).
    pub decision_margin: f32,
    /// Mirror corner x-coordinates (`width - x`) before pose estimation (default: false).
    pub reflect_horizontally: bool,
}

impl Default for PoseOptions {
    fn default() -> Self {
        Self {
            intrinsics: CameraIntrinsics::identity(),
            tag_sizes: HashMap::new(),
            decision_margin: DEFAULT_DECISION_MARGIN,
            reflect_horizontally: false,
        }
    }
}

impl PoseOptions {
    /// Create a new builder for `PoseOptions`.
    #[must_use]
    pub fn builder() -> PoseOptionsBuilder {
        PoseOptionsBuilder::default()
    }

    /// Physical size registered for `tag_id`, if any.
    #[must_use]
    pub fn tag_size(&self, tag_id: i32) -> Option<f64> {
        self.tag_sizes.get(&tag_id).copied()
    }
}

/// Builder for [`PoseOptions`].
#[derive(Default)]
pub struct PoseOptionsBuilder {
    intrinsics: Option<CameraIntrinsics>,
    tag_sizes: HashMap<i32, f64>,
    decision_margin: Option<f32>,
    reflect_horizontally: Option<bool>,
}

impl PoseOptionsBuilder {
    /// Set camera intrinsics from focal lengths and principal point.
    #[must_use]
    pub fn intrinsics(mut self, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        self.intrinsics = Some(CameraIntrinsics::new(fx, fy, cx, cy));
        self
    }

    /// Set camera intrinsics from an existing value.
    #[must_use]
    pub fn camera(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }

    /// Register the physical side length of one tag id.
    #[must_use]
    pub fn tag_size(mut self, tag_id: i32, size: f64) -> Self {
        self.tag_sizes.insert(tag_id, size);
        self
    }

    /// Replace the whole id-to-size table.
    #[must_use]
    pub fn tag_sizes(mut self, sizes: HashMap<i32, f64>) -> Self {
        self.tag_sizes = sizes;
        self
    }

    /// Set the decision margin threshold.
    #[must_use]
    pub fn decision_margin(mut self, margin: f32) -> Self {
        self.decision_margin = Some(margin);
        self
    }

    /// Enable or disable horizontal reflection of corners.
    #[must_use]
    pub fn reflect_horizontally(mut self, reflect: bool) -> Self {
        self.reflect_horizontally = Some(reflect);
        self
    }

    /// Build the options, using defaults for unset fields.
    #[must_use]
    pub fn build(self) -> PoseOptions {
        let d = PoseOptions::default();
        PoseOptions {
            intrinsics: self.intrinsics.unwrap_or(d.intrinsics),
            tag_sizes: self.tag_sizes,
            decision_margin: self.decision_margin.unwrap_or(d.decision_margin),
            reflect_horizontally: self.reflect_horizontally.unwrap_or(d.reflect_horizontally),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_config_builder() {
        let config = DetectorConfig::builder().quad_decimate(3.0).build();
        assert_eq!(config.quad_decimate, 3.0);
        // Check defaults
        assert!(!config.refine_edges);
    }

    #[test]
    fn test_detector_config_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.quad_decimate, 1.0);
        assert!(!config.refine_edges);
    }

    #[test]
    fn test_pose_options_defaults() {
        let opt = PoseOptions::default();
        assert_eq!(opt.decision_margin, 10.0);
        assert!(!opt.reflect_horizontally);
        assert!(opt.tag_sizes.is_empty());
        assert_eq!(opt.intrinsics, CameraIntrinsics::identity());
    }

    #[test]
    fn test_pose_options_builder_sizes() {
        let opt = PoseOptions::builder()
            .tag_size(3, 0.1)
            .tag_size(3, 0.2)
            .tag_size(4, 0.05)
            .build();
        assert_eq!(opt.tag_size(3), Some(0.2));
        assert_eq!(opt.tag_size(4), Some(0.05));
        assert_eq!(opt.tag_size(5), None);
    }

    #[test]
    fn test_family_names_round_trip() {
        for &family in TagFamily::all() {
            let parsed: TagFamily = family.name().parse().expect("canonical name parses");
            assert_eq!(parsed, family);
        }
        assert_eq!(TagFamily::Tag36h11.to_string(), "tag36h11");
        assert_eq!(TagFamily::TagStandard41h12.to_string(), "tagStandard41h12");
    }

    #[test]
    fn test_unknown_family_name() {
        let err = "tag99h1".parse::<TagFamily>().unwrap_err();
        assert!(matches!(err, TagPoseError::UnknownFamily { ref name } if name == "tag99h1"));
    }
}
