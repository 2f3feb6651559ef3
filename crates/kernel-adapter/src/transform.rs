use nalgebra::{Matrix3, Matrix4, Point3 as NPoint, Unit, Vector3 as NVector};
use serde::{Deserialize, Serialize};
use shape_types::{Axis, Frame, Point3, Vector3};

use crate::types::KernelError;

/// A 4x4 affine transformation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub matrix: Matrix4<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    pub fn translation(v: Vector3) -> Self {
        Self {
            matrix: Matrix4::new_translation(&NVector::from(v)),
        }
    }

    pub fn scaling(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&NVector::new(sx, sy, sz)),
        }
    }

    /// Non-uniform scale that keeps `center` fixed.
    pub fn scaling_about(factors: Vector3, center: Point3) -> Self {
        Self::about(center, Self::scaling(factors[0], factors[1], factors[2]))
    }

    /// Rotation around an axis through the origin by `angle` radians.
    pub fn rotation_axis_angle(axis: Vector3, angle: f64) -> Result<Self, KernelError> {
        let axis = unit(axis, "rotation axis")?;
        Ok(Self {
            matrix: Matrix4::from_axis_angle(&axis, angle),
        })
    }

    /// Rotation around the axis through `center` along `axis`.
    pub fn rotation_about(axis: Vector3, angle: f64, center: Point3) -> Result<Self, KernelError> {
        Ok(Self::about(center, Self::rotation_axis_angle(axis, angle)?))
    }

    /// Reflection through the plane at `origin` with normal `normal`.
    pub fn mirror(origin: Point3, normal: Vector3) -> Result<Self, KernelError> {
        let n = unit(normal, "mirror normal")?.into_inner();
        let linear = Matrix3::identity() - 2.0 * n * n.transpose();
        let mut matrix = linear.to_homogeneous();
        let o = NVector::from(origin);
        let shift = o - linear * o;
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&shift);
        Ok(Self { matrix })
    }

    /// Maps coordinates expressed in `from` onto the same coordinates in `to`.
    pub fn frame_to_frame(from: &Frame, to: &Frame) -> Result<Self, KernelError> {
        let a = frame_matrix(from)?;
        let b = frame_matrix(to)?;
        let a_inv = a.try_inverse().ok_or_else(|| KernelError::InvalidGeometry {
            reason: "degenerate source frame".into(),
        })?;
        Ok(Self { matrix: b * a_inv })
    }

    /// Places the world frame on `axis`: local +Z runs along the axis
    /// direction from its origin.
    pub fn placement(axis: &Axis) -> Result<Self, KernelError> {
        let z = unit(axis.direction, "axis direction")?.into_inner();
        let helper = if z.x.abs() < 0.9 {
            NVector::x()
        } else {
            NVector::y()
        };
        let to = Frame {
            origin: axis.origin,
            z_dir: axis.direction,
            x_dir: helper.into(),
        };
        Self::frame_to_frame(&Frame::world(), &to)
    }

    /// Applies `self` first, then `next`.
    pub fn then(&self, next: &Transform) -> Transform {
        Transform {
            matrix: next.matrix * self.matrix,
        }
    }

    pub fn inverse(&self) -> Option<Transform> {
        self.matrix.try_inverse().map(|matrix| Transform { matrix })
    }

    pub fn determinant(&self) -> f64 {
        self.linear().determinant()
    }

    /// Whether the transform flips handedness.
    pub fn is_mirroring(&self) -> bool {
        self.determinant() < 0.0
    }

    pub fn transform_point(&self, p: &Point3) -> Point3 {
        let q = self
            .matrix
            .transform_point(&NPoint::new(p[0], p[1], p[2]));
        [q.x, q.y, q.z]
    }

    pub fn transform_vector(&self, v: &Vector3) -> Vector3 {
        let w = self.matrix.transform_vector(&NVector::from(*v));
        [w.x, w.y, w.z]
    }

    /// Transforms a surface normal with the inverse transpose and
    /// renormalizes it.
    pub fn transform_normal(&self, n: &Vector3) -> Vector3 {
        let linear = self.linear();
        let normal_matrix = linear
            .try_inverse()
            .map(|inv| inv.transpose())
            .unwrap_or(linear);
        let w = normal_matrix * NVector::from(*n);
        let len = w.norm();
        if len <= f64::EPSILON {
            return *n;
        }
        let w = w / len;
        [w.x, w.y, w.z]
    }

    /// Column-major entries, the layout GPU and cgmath consumers expect.
    pub fn to_cols_array(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(self.matrix.as_slice());
        out
    }

    pub fn approx_eq(&self, other: &Transform, tol: f64) -> bool {
        self.matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }

    fn linear(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Conjugates `inner` so that it acts around `center`.
    fn about(center: Point3, inner: Transform) -> Transform {
        let to_origin = Transform::translation([-center[0], -center[1], -center[2]]);
        let back = Transform::translation(center);
        to_origin.then(&inner).then(&back)
    }
}

fn unit(v: Vector3, what: &str) -> Result<Unit<NVector<f64>>, KernelError> {
    Unit::try_new(NVector::from(v), 1e-12).ok_or_else(|| KernelError::InvalidGeometry {
        reason: format!("{what} has zero length"),
    })
}

/// Local-to-world matrix of a frame.
fn frame_matrix(frame: &Frame) -> Result<Matrix4<f64>, KernelError> {
    let z = unit(frame.z_dir, "frame z direction")?.into_inner();
    let x_raw = NVector::from(frame.x_dir);
    let x = Unit::try_new(x_raw - z * z.dot(&x_raw), 1e-9)
        .ok_or_else(|| KernelError::InvalidGeometry {
            reason: "frame x direction is parallel to z".into(),
        })?
        .into_inner();
    let y = z.cross(&x);
    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 1>(0, 0).copy_from(&x);
    m.fixed_view_mut::<3, 1>(0, 1).copy_from(&y);
    m.fixed_view_mut::<3, 1>(0, 2).copy_from(&z);
    m.fixed_view_mut::<3, 1>(0, 3)
        .copy_from(&NVector::from(frame.origin));
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn assert_point(a: Point3, b: Point3) {
        for i in 0..3 {
            assert_relative_eq!(a[i], b[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn translation_moves_points_not_vectors() {
        let t = Transform::translation([1.0, 2.0, 3.0]);
        assert_point(t.transform_point(&[0.0; 3]), [1.0, 2.0, 3.0]);
        assert_point(t.transform_vector(&[1.0, 0.0, 0.0]), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn quarter_turn_about_z() {
        let r = Transform::rotation_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2).unwrap();
        assert_point(r.transform_point(&[1.0, 0.0, 0.0]), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn rotation_about_center_keeps_center_fixed() {
        let c = [2.0, 3.0, 0.0];
        let r = Transform::rotation_about([0.0, 0.0, 1.0], 1.234, c).unwrap();
        assert_point(r.transform_point(&c), c);
    }

    #[test]
    fn zero_axis_is_rejected() {
        assert!(Transform::rotation_axis_angle([0.0; 3], 1.0).is_err());
        assert!(Transform::mirror([0.0; 3], [0.0; 3]).is_err());
    }

    #[test]
    fn mirror_is_an_involution() {
        let m = Transform::mirror([1.0, 0.0, 0.0], [1.0, 1.0, 0.0]).unwrap();
        let twice = m.then(&m);
        assert!(twice.approx_eq(&Transform::identity(), 1e-12));
        assert!(m.is_mirroring());
    }

    #[test]
    fn mirror_through_offset_plane() {
        let m = Transform::mirror([0.0, 0.0, 1.0], [0.0, 0.0, 1.0]).unwrap();
        assert_point(m.transform_point(&[5.0, 5.0, 3.0]), [5.0, 5.0, -1.0]);
    }

    #[test]
    fn then_applies_left_first() {
        let s = Transform::scaling(2.0, 2.0, 2.0);
        let t = Transform::translation([1.0, 0.0, 0.0]);
        assert_point(s.then(&t).transform_point(&[1.0, 0.0, 0.0]), [3.0, 0.0, 0.0]);
        assert_point(t.then(&s).transform_point(&[1.0, 0.0, 0.0]), [4.0, 0.0, 0.0]);
    }

    #[test]
    fn scaling_about_center() {
        let s = Transform::scaling_about([2.0, 1.0, 1.0], [1.0, 0.0, 0.0]);
        assert_point(s.transform_point(&[2.0, 1.0, 1.0]), [3.0, 1.0, 1.0]);
    }

    #[test]
    fn frame_to_frame_maps_origin_and_axes() {
        let from = Frame::world();
        let to = Frame {
            origin: [1.0, 2.0, 3.0],
            z_dir: [1.0, 0.0, 0.0],
            x_dir: [0.0, 1.0, 0.0],
        };
        let t = Transform::frame_to_frame(&from, &to).unwrap();
        assert_point(t.transform_point(&[0.0; 3]), [1.0, 2.0, 3.0]);
        assert_point(t.transform_vector(&[0.0, 0.0, 1.0]), [1.0, 0.0, 0.0]);
        assert_point(t.transform_vector(&[1.0, 0.0, 0.0]), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn normals_follow_nonuniform_scale() {
        let s = Transform::scaling(2.0, 1.0, 1.0);
        let n = s.transform_normal(&[1.0, 1.0, 0.0]);
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        assert_relative_eq!(len, 1.0, epsilon = 1e-12);
        assert!(n[1] > n[0]);
    }

    #[test]
    fn placement_maps_local_z_onto_axis() {
        let axis = Axis::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let t = Transform::placement(&axis).unwrap();
        assert_point(t.transform_point(&[0.0; 3]), [1.0, 0.0, 0.0]);
        assert_point(t.transform_point(&[0.0, 0.0, 2.0]), [1.0, 2.0, 0.0]);
        assert!(!t.is_mirroring());
    }
}
