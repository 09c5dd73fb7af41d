//! Math utilities and types
//!
//! Provides the vector, matrix and quaternion aliases used by the scene graph,
//! plus the TRS [`Transform`] whose composition order every other module relies on.

use serde::{Deserialize, Serialize};

pub use nalgebra::{
    Matrix3, Matrix4,
    Quaternion,
    Unit, UnitQuaternion,
    Vector2, Vector3, Vector4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Unit quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Compose a local matrix as `T · R · S`.
///
/// Applied right-to-left to a column vector: scale first, then rotate, then
/// translate. Animation baking and world-matrix propagation both assume this order.
pub fn compose(rotation: &Quat, translation: &Vec3, scale: &Vec3) -> Mat4 {
    Mat4::new_translation(translation)
        * rotation.to_homogeneous()
        * Mat4::new_nonuniform_scaling(scale)
}

/// Spherical interpolation along the shortest arc.
///
/// If the quaternions lie in opposite hemispheres (negative dot product) the
/// target is negated first so the blend never takes the long way around.
/// Nearly identical rotations fall back to a normalized linear blend.
pub fn slerp_shortest(from: &Quat, to: &Quat, t: f32) -> Quat {
    let mut target = *to.quaternion();
    if from.quaternion().dot(&target) < 0.0 {
        target = -target;
    }
    let target = Quat::new_unchecked(target);

    from.try_slerp(&target, t, 1.0e-6)
        .unwrap_or_else(|| Quat::new_normalize(from.quaternion().lerp(target.quaternion(), t)))
}

/// Transform representing scale, rotation, and translation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Scale factors
    pub scale: Vec3,

    /// Rotation quaternion, always unit length
    pub rotation: Quat,

    /// Translation in parent space
    pub translation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: Vec3::new(1.0, 1.0, 1.0),
            rotation: Quat::identity(),
            translation: Vec3::zeros(),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform from all three components
    pub fn new(scale: Vec3, rotation: Quat, translation: Vec3) -> Self {
        Self { scale, rotation, translation }
    }

    /// Create a transform with only a translation
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Create a transform with only a rotation
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    /// Bake into a `T · R · S` matrix
    pub fn to_matrix(&self) -> Mat4 {
        compose(&self.rotation, &self.translation, &self.scale)
    }

    /// Decompose a `T · R · S` matrix.
    ///
    /// Assumes positive scale and no shear; authored node matrices satisfy both.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let translation = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
        let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
        let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();
        let scale = Vec3::new(scale_x, scale_y, scale_z);

        let rotation_matrix = Mat3::new(
            matrix.m11 / scale_x, matrix.m12 / scale_y, matrix.m13 / scale_z,
            matrix.m21 / scale_x, matrix.m22 / scale_y, matrix.m23 / scale_z,
            matrix.m31 / scale_x, matrix.m32 / scale_y, matrix.m33 / scale_z,
        );
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self { scale, rotation, translation }
    }

    /// Interpolate toward `other`.
    ///
    /// Translation and scale blend linearly, rotation via [`slerp_shortest`].
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            scale: self.scale.lerp(&other.scale, t),
            rotation: slerp_shortest(&self.rotation, &other.rotation, t),
            translation: self.translation.lerp(&other.translation, t),
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = std::f32::consts::TAU;

    /// Pi / 2
    pub const HALF_PI: f32 = std::f32::consts::FRAC_PI_2;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

/// Extension trait for Mat4 with uniform-upload helpers
pub trait Mat4Ext {
    /// Rotation of `angle` radians about an arbitrary axis.
    ///
    /// A zero-length axis yields the identity.
    fn axis_rotation(angle: f32, axis: &Vec3) -> Mat4;

    /// Column-major float array, the layout shader uniforms expect
    fn to_cols_array(&self) -> [f32; 16];
}

impl Mat4Ext for Mat4 {
    fn axis_rotation(angle: f32, axis: &Vec3) -> Mat4 {
        Unit::try_new(*axis, f32::EPSILON)
            .map_or_else(Mat4::identity, |axis| Mat4::from_axis_angle(&axis, angle))
    }

    fn to_cols_array(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(self.as_slice());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_compose_order_is_translate_rotate_scale() {
        let rotation = Quat::from_axis_angle(&Vec3::z_axis(), constants::HALF_PI);
        let matrix = compose(&rotation, &Vec3::new(10.0, 0.0, 0.0), &Vec3::new(2.0, 2.0, 2.0));

        // Scale (1,0,0) to (2,0,0), rotate to (0,2,0), translate to (10,2,0)
        let p = matrix.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(10.0, 2.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_transform_matrix_round_trip() {
        let transform = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_euler_angles(0.3, -0.7, 1.1),
            Vec3::new(-4.0, 5.0, 6.0),
        );
        let recovered = Transform::from_matrix(&transform.to_matrix());

        assert_relative_eq!(recovered.translation, transform.translation, epsilon = EPSILON);
        assert_relative_eq!(recovered.scale, transform.scale, epsilon = EPSILON);
        assert!(recovered.rotation.angle_to(&transform.rotation) < 1e-3);
    }

    #[test]
    fn test_slerp_takes_shortest_arc() {
        let from = Quat::identity();
        // 270 degrees about Y is the same orientation as -90 degrees
        let to = Quat::from_axis_angle(&Vec3::y_axis(), 1.5 * constants::PI);
        assert!(from.quaternion().dot(to.quaternion()) < 0.0);

        let mid = slerp_shortest(&from, &to, 0.5);
        let expected = Quat::from_axis_angle(&Vec3::y_axis(), -0.25 * constants::PI);
        assert!(mid.angle_to(&expected) < 1e-4);
        assert_relative_eq!(mid.angle(), 0.25 * constants::PI, epsilon = 1e-4);
    }

    #[test]
    fn test_slerp_endpoints_and_unit_length() {
        let from = Quat::from_axis_angle(&Vec3::x_axis(), 0.2);
        let to = Quat::from_axis_angle(&Vec3::y_axis(), 1.3);

        assert!(slerp_shortest(&from, &to, 0.0).angle_to(&from) < 1e-4);
        assert!(slerp_shortest(&from, &to, 1.0).angle_to(&to) < 1e-4);
        for step in 0..=10 {
            let q = slerp_shortest(&from, &to, step as f32 / 10.0);
            assert_relative_eq!(q.quaternion().norm(), 1.0, epsilon = EPSILON);
        }
    }

    #[test]
    fn test_slerp_identical_rotations_falls_back() {
        let q = Quat::from_axis_angle(&Vec3::z_axis(), 0.4);
        let blended = slerp_shortest(&q, &q, 0.5);
        assert!(blended.angle_to(&q) < 1e-5);
    }

    #[test]
    fn test_transform_lerp_blends_components() {
        let a = Transform::identity();
        let b = Transform::new(
            Vec3::new(3.0, 3.0, 3.0),
            Quat::from_axis_angle(&Vec3::y_axis(), constants::HALF_PI),
            Vec3::new(0.0, 4.0, 0.0),
        );
        let mid = a.lerp(&b, 0.5);

        assert_relative_eq!(mid.translation, Vec3::new(0.0, 2.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(mid.scale, Vec3::new(2.0, 2.0, 2.0), epsilon = EPSILON);
        assert_relative_eq!(mid.rotation.angle(), constants::HALF_PI * 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_axis_rotation_zero_axis_is_identity() {
        assert_eq!(Mat4::axis_rotation(1.0, &Vec3::zeros()), Mat4::identity());
    }
}
