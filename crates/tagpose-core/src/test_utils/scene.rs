use std::collections::HashMap;

use nalgebra::{Rotation3, Vector3};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{project_tag_corners, ProjectiveSolver};
use crate::config::PoseOptions;
use crate::engine::RawDetection;
use crate::pose::{CameraIntrinsics, Pose};

/// A placement of a tag in a scene.
#[derive(Debug, Clone, Copy)]
pub struct TagPlacement {
    /// The tag id.
    pub id: i32,
    /// Physical side length.
    pub size: f64,
    /// Tag-to-camera pose in the solver convention.
    pub pose: Pose,
    /// Decision margin the engine reports for this tag.
    pub decision_margin: f32,
}

/// The raw detections of a synthetic scene plus the ground truth behind them.
#[derive(Debug, Clone)]
pub struct Scene {
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Camera used to project the tags.
    pub intrinsics: CameraIntrinsics,
    /// Placements in engine order.
    pub placements: Vec<TagPlacement>,
    /// Raw detections in engine order.
    pub detections: Vec<RawDetection>,
}

impl Scene {
    /// Ground-truth pose per tag id (the last placement wins for duplicate ids).
    #[must_use]
    pub fn poses(&self) -> HashMap<i32, Pose> {
        self.placements.iter().map(|p| (p.id, p.pose)).collect()
    }

    /// A solver that knows every placement's pose.
    #[must_use]
    pub fn solver(&self) -> ProjectiveSolver {
        ProjectiveSolver::new(self.poses())
    }

    /// Options with this scene's intrinsics and every tag size registered.
    #[must_use]
    pub fn options(&self) -> PoseOptions {
        let sizes = self.placements.iter().map(|p| (p.id, p.size)).collect();
        PoseOptions::builder()
            .camera(self.intrinsics)
            .tag_sizes(sizes)
            .build()
    }
}

/// A builder for multi-tag scenes.
pub struct SceneBuilder {
    width: usize,
    height: usize,
    intrinsics: CameraIntrinsics,
    placements: Vec<TagPlacement>,
    rng: ChaCha8Rng,
}

impl SceneBuilder {
    /// Create a scene builder with a pinhole camera centered on the image.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        let f = width as f64;
        Self {
            width,
            height,
            intrinsics: CameraIntrinsics::new(f, f, width as f64 / 2.0, height as f64 / 2.0),
            placements: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    /// Seed the generator used by [`add_random_tags`](Self::add_random_tags).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    /// Use explicit intrinsics.
    #[must_use]
    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    /// Add one tag.
    #[must_use]
    pub fn add_tag(mut self, placement: TagPlacement) -> Self {
        self.placements.push(placement);
        self
    }

    /// Add `count` tags with random ids in `ids`, sizes, margins and poses facing the camera.
    #[must_use]
    pub fn add_random_tags(mut self, count: usize, ids: std::ops::Range<i32>) -> Self {
        for _ in 0..count {
            let rotation =
                Rotation3::from_euler_angles(
                    self.rng.gen_range(-0.5..0.5),
                    self.rng.gen_range(-0.5..0.5),
                    self.rng.gen_range(-3.1..3.1),
                )
                .into_inner();
            let translation = Vector3::new(
                self.rng.gen_range(-0.4..0.4),
                self.rng.gen_range(-0.3..0.3),
                self.rng.gen_range(1.0..4.0),
            );
            self.placements.push(TagPlacement {
                id: self.rng.gen_range(ids.clone()),
                size: self.rng.gen_range(0.05..0.25),
                pose: Pose::new(rotation, translation),
                decision_margin: self.rng.gen_range(0.0..120.0),
            });
        }
        self
    }

    /// Project every placement into raw detections.
    #[must_use]
    pub fn build(self) -> Scene {
        let detections = self
            .placements
            .iter()
            .map(|p| RawDetection {
                tag_id: p.id,
                decision_margin: p.decision_margin,
                corners: project_tag_corners(&p.pose, p.size, &self.intrinsics),
            })
            .collect();
        Scene {
            width: self.width,
            height: self.height,
            intrinsics: self.intrinsics,
            placements: self.placements,
            detections,
        }
    }
}
