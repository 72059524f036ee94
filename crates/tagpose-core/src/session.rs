//! Detector session: owns the native detector and family handles for their whole lifetime.

use crate::config::{DetectorConfig, PoseOptions, TagFamily};
use crate::engine::{DetectionEngine, EngineParams};
use crate::error::{Result, TagPoseError};
use crate::family::FamilyRegistry;
use crate::filter::{resolve_detections, FilterStats};
use crate::image::ImageView;
use crate::pose::PoseSolver;
use crate::TagDetection;

/// Native resources of an open session.
struct Resources<E: DetectionEngine> {
    detector: E::Detector,
    families: FamilyRegistry<E::Family>,
}

/// One configured detector plus the pose pipeline behind it.
///
/// The session is single-threaded: `process_image` takes `&mut self`, so concurrent calls on
/// one session are ruled out at compile time. Native resources are released by
/// [`close`](Self::close) or, failing that, on drop; either way exactly once.
///
/// # Example
/// ```
/// use tagpose_core::{DetectorSession, ImageView};
/// use tagpose_core::config::{DetectorConfig, PoseOptions, TagFamily};
/// use tagpose_core::test_utils::{ScriptedEngine, ScriptedSolver};
///
/// let options = PoseOptions::builder().tag_size(0, 0.16).build();
/// let mut session = DetectorSession::new(
///     ScriptedEngine::new(),
///     ScriptedSolver::new(),
///     DetectorConfig::default(),
///     &[TagFamily::Tag36h11],
///     options,
/// )
/// .unwrap();
///
/// let pixels = vec![0u8; 64 * 48];
/// let image = ImageView::packed(&pixels, 64, 48).unwrap();
/// let detections = session.process_image(&image).unwrap();
/// assert!(detections.is_empty());
/// session.close();
/// ```
pub struct DetectorSession<E: DetectionEngine, S: PoseSolver> {
    engine: E,
    solver: S,
    config: DetectorConfig,
    options: PoseOptions,
    resources: Option<Resources<E>>,
}

impl<E: DetectionEngine, S: PoseSolver> DetectorSession<E, S> {
    /// Allocate the detector, configure it and register `families`.
    ///
    /// If a family descriptor cannot be created, everything acquired so far is released and
    /// [`TagPoseError::FamilyCreationFailed`] is returned.
    pub fn new(
        mut engine: E,
        solver: S,
        config: DetectorConfig,
        families: &[TagFamily],
        options: PoseOptions,
    ) -> Result<Self> {
        let params = EngineParams::from(&config);
        let mut detector = engine.create_detector(&params);

        let registry = match FamilyRegistry::create(&mut engine, families) {
            Ok(registry) => registry,
            Err(err) => {
                engine.destroy_detector(detector);
                return Err(err);
            }
        };
        registry.register_with(&mut engine, &mut detector);

        tracing::debug!(
            families = registry.len(),
            quad_decimate = config.quad_decimate,
            refine_edges = config.refine_edges,
            "detector session ready"
        );

        Ok(Self {
            engine,
            solver,
            config,
            options,
            resources: Some(Resources {
                detector,
                families: registry,
            }),
        })
    }

    /// Detect, filter and pose tags using the session's current options.
    pub fn process_image(&mut self, image: &ImageView<'_>) -> Result<Vec<TagDetection>> {
        self.process_image_with_stats(image).map(|(detections, _)| detections)
    }

    /// Like [`process_image`](Self::process_image), also reporting what was filtered out.
    pub fn process_image_with_stats(
        &mut self,
        image: &ImageView<'_>,
    ) -> Result<(Vec<TagDetection>, FilterStats)> {
        let Self {
            engine,
            solver,
            options,
            resources,
            ..
        } = self;
        let resources = resources.as_mut().ok_or(TagPoseError::SessionClosed)?;
        Ok(run_pipeline(engine, &mut resources.detector, solver, image, options))
    }

    /// Run one call with an explicit options snapshot instead of the session's own.
    pub fn process_image_with_options(
        &mut self,
        image: &ImageView<'_>,
        options: &PoseOptions,
    ) -> Result<Vec<TagDetection>> {
        let resources = self
            .resources
            .as_mut()
            .ok_or(TagPoseError::SessionClosed)?;
        let (detections, _) = run_pipeline(
            &mut self.engine,
            &mut resources.detector,
            &self.solver,
            image,
            options,
        );
        Ok(detections)
    }

    /// Engine-level configuration fixed at construction.
    #[must_use]
    pub fn config(&self) -> DetectorConfig {
        self.config
    }

    /// Current per-call options.
    #[must_use]
    pub fn options(&self) -> &PoseOptions {
        &self.options
    }

    /// Replace the per-call options; takes effect on the next call.
    pub fn set_options(&mut self, options: PoseOptions) {
        self.options = options;
    }

    /// Registered families in request order; empty once closed.
    #[must_use]
    pub fn families(&self) -> Vec<TagFamily> {
        self.resources
            .as_ref()
            .map(|r| r.families.families())
            .unwrap_or_default()
    }

    /// The detection engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The pose solver.
    #[must_use]
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Whether [`close`](Self::close) has already run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.resources.is_none()
    }

    /// Destroy the detector, then every family. Later calls are no-ops.
    pub fn close(&mut self) {
        if let Some(Resources { detector, families }) = self.resources.take() {
            tracing::debug!(families = families.len(), "closing detector session");
            self.engine.destroy_detector(detector);
            families.destroy(&mut self.engine);
        }
    }
}

impl<E: DetectionEngine, S: PoseSolver> Drop for DetectorSession<E, S> {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_pipeline<E, S>(
    engine: &mut E,
    detector: &mut E::Detector,
    solver: &S,
    image: &ImageView<'_>,
    options: &PoseOptions,
) -> (Vec<TagDetection>, FilterStats)
where
    E: DetectionEngine,
    S: PoseSolver,
{
    let _span = tracing::info_span!("process_image", width = image.width, height = image.height)
        .entered();
    let mut stats = FilterStats::default();

    let raw = {
        let _span = tracing::info_span!("engine_detect").entered();
        engine.detect(detector, image)
    };
    if raw.is_empty() {
        return (Vec::new(), stats);
    }

    let detections = {
        let _span = tracing::info_span!("resolve_detections", num_raw = raw.len()).entered();
        resolve_detections(&raw, image.width, options, solver, &mut stats)
    };
    drop(raw);

    tracing::debug!(
        raw = stats.num_raw,
        accepted = stats.num_accepted,
        rejected_margin = stats.num_rejected_by_margin,
        rejected_size = stats.num_rejected_by_size,
        rejected_pose = stats.num_rejected_by_pose,
        "processed image"
    );
    (detections, stats)
}
