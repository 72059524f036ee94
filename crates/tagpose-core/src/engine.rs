//! Seam to the external quad-detection engine.
//!
//! The engine owns segmentation, quad fitting and code decoding. This crate only drives its
//! lifecycle (families, detector) and consumes the raw detections it yields.

use std::ops::Deref;

use crate::config::DetectorConfig;
use crate::family::FamilyDescriptor;
use crate::image::ImageView;

/// Parameters applied once to a freshly created native detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineParams {
    /// Worker thread count. Always 1: the pipeline is single-threaded.
    pub nthreads: usize,
    /// Decimation factor before quad search.
    pub quad_decimate: f32,
    /// Edge refinement toggle.
    pub refine_edges: bool,
    /// Engine debug output. Always off.
    pub debug: bool,
}

impl From<&DetectorConfig> for EngineParams {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            nthreads: 1,
            quad_decimate: config.quad_decimate,
            refine_edges: config.refine_edges,
            debug: false,
        }
    }
}

/// A decoded quad as reported by the engine, before filtering and pose estimation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    /// Decoded tag id.
    pub tag_id: i32,
    /// Decoder confidence (higher is better).
    pub decision_margin: f32,
    /// The 4 corners in image pixels, in the engine's winding order.
    pub corners: [[f64; 2]; 4],
}

/// The external quad-detection and decoding engine.
///
/// Handles are associated types owned by value: destroying one consumes it, so a family or
/// detector can only ever be released once.
pub trait DetectionEngine {
    /// Opaque family descriptor handle.
    type Family;
    /// Opaque detector handle.
    type Detector;
    /// Per-call detection buffer. Dropping it releases the engine-side storage.
    type Detections: Deref<Target = [RawDetection]>;

    /// Create the descriptor for one family. `None` means the engine could not allocate it.
    fn create_family(&mut self, descriptor: &'static FamilyDescriptor) -> Option<Self::Family>;

    /// Destroy a family descriptor with the destructor matching its variant.
    fn destroy_family(&mut self, descriptor: &'static FamilyDescriptor, family: Self::Family);

    /// Allocate and configure a detector.
    fn create_detector(&mut self, params: &EngineParams) -> Self::Detector;

    /// Register a family with a detector. The family must outlive the detector.
    fn add_family(
        &mut self,
        detector: &mut Self::Detector,
        descriptor: &'static FamilyDescriptor,
        family: &Self::Family,
    );

    /// Run detection on one image. A detector without families yields nothing.
    fn detect(&mut self, detector: &mut Self::Detector, image: &ImageView<'_>) -> Self::Detections;

    /// Destroy a detector.
    fn destroy_detector(&mut self, detector: Self::Detector);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_params_pin_single_thread() {
        let config = DetectorConfig::builder()
            .quad_decimate(2.0)
            .refine_edges(true)
            .build();
        let params = EngineParams::from(&config);
        assert_eq!(params.nthreads, 1);
        assert!(!params.debug);
        assert_eq!(params.quad_decimate, 2.0);
        assert!(params.refine_edges);
    }
}
