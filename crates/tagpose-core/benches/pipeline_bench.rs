#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unwrap_used)]

use divan::bench;
use nalgebra::{Matrix3, Vector3};
use tagpose_core::config::{DetectorConfig, TagFamily};
use tagpose_core::test_utils::{SceneBuilder, ScriptedEngine};
use tagpose_core::transform::pose_to_transform;
use tagpose_core::{DetectorSession, ImageView};

fn main() {
    divan::main();
}

#[bench(args = [1, 8, 64])]
fn bench_process_image(bencher: divan::Bencher, num_tags: usize) {
    let scene = SceneBuilder::new(1280, 720)
        .with_seed(42)
        .add_random_tags(num_tags, 0..587)
        .build();
    let mut options = scene.options();
    options.decision_margin = 0.0;

    let mut session = DetectorSession::new(
        ScriptedEngine::new().with_detections(scene.detections.clone()),
        scene.solver(),
        DetectorConfig::default(),
        &[TagFamily::Tag36h11],
        options,
    )
    .unwrap();
    let pixels = vec![0u8; 1280 * 720];
    let image = ImageView::packed(&pixels, 1280, 720).unwrap();

    bencher.bench_local(move || divan::black_box(session.process_image(divan::black_box(&image))));
}

#[bench]
fn bench_pose_to_transform(bencher: divan::Bencher) {
    let r = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
    let t = Vector3::new(0.1, -0.1, 2.0);
    bencher.bench_local(move || {
        divan::black_box(pose_to_transform(divan::black_box(&r), divan::black_box(&t)))
    });
}
