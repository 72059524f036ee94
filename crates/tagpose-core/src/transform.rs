//! Conversion from solver poses to homogeneous transforms in the output convention.
//!
//! The solver reports poses with y down and z into the scene. Output transforms use y up and
//! z out of the scene, obtained by left-multiplying with `diag(1, -1, -1, 1)`.

use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};

/// The fixed axis flip between the solver's camera frame and the output frame.
#[must_use]
pub fn camera_flip() -> Matrix4<f64> {
    Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, -1.0, 1.0))
}

/// Build `flip * [R | t; 0 0 0 1]`.
///
/// `rotation` is used with the row/column layout the solver returned; it is not transposed.
#[must_use]
pub fn pose_to_transform(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Matrix4<f64> {
    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    camera_flip() * m
}
