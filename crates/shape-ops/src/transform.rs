//! Rigid, scaling and mirroring moves. Every operation returns a new shape
//! and leaves its input untouched.

use kernel_adapter::Transform;
use shape_types::{Frame, Point3, Vector3};

use crate::context::KernelContext;
use crate::error::OpError;
use crate::handle::{ShapeHandle, ShapeRef};

pub struct TransformEngine<'c> {
    ctx: &'c mut KernelContext,
}

fn nonzero(value: f64, what: &str) -> Result<(), OpError> {
    if !value.is_finite() || value == 0.0 {
        return Err(OpError::invalid(format!("{what} must be finite and non-zero, got {value}")));
    }
    Ok(())
}

fn rotation(axis: Vector3, degrees: f64, center: Option<Point3>) -> Result<Transform, OpError> {
    let radians = degrees.to_radians();
    let t = match center {
        Some(c) => Transform::rotation_about(axis, radians, c),
        None => Transform::rotation_axis_angle(axis, radians),
    };
    t.map_err(|e| OpError::invalid(e.to_string()))
}

fn scaling(factors: Vector3, center: Option<Point3>) -> Result<Transform, OpError> {
    for f in factors {
        nonzero(f, "scale factor")?;
    }
    Ok(Transform::scaling_about(factors, center.unwrap_or([0.0; 3])))
}

fn mirroring(origin: Point3, normal: Vector3) -> Result<Transform, OpError> {
    Transform::mirror(origin, normal).map_err(|e| OpError::invalid(e.to_string()))
}

/// Scale, then rotate, then translate, all about the origin.
pub fn composed(translation: Vector3, axis: Vector3, degrees: f64, factor: f64) -> Result<Transform, OpError> {
    let scale = scaling([factor; 3], None)?;
    let rotate = if degrees == 0.0 {
        Transform::identity()
    } else {
        rotation(axis, degrees, None)?
    };
    Ok(scale.then(&rotate).then(&Transform::translation(translation)))
}

impl<'c> TransformEngine<'c> {
    pub fn new(ctx: &'c mut KernelContext) -> Self {
        Self { ctx }
    }

    /// Copy of `shape` moved by `trsf`.
    pub fn apply(&mut self, shape: &impl ShapeRef, trsf: &Transform) -> Result<ShapeHandle, OpError> {
        if trsf.determinant().abs() <= f64::EPSILON {
            return Err(OpError::invalid("transform is singular"));
        }
        let id = self
            .ctx
            .kernel_mut()
            .transform(shape.shape_id(), trsf)
            .map_err(OpError::kernel("transform"))?;
        self.ctx.adopt(id)
    }

    pub fn translate(&mut self, shape: &impl ShapeRef, offset: Vector3) -> Result<ShapeHandle, OpError> {
        self.apply(shape, &Transform::translation(offset))
    }

    /// Rotates by `degrees` around `axis`, through `center` or the origin.
    pub fn rotate(
        &mut self,
        shape: &impl ShapeRef,
        axis: Vector3,
        degrees: f64,
        center: Option<Point3>,
    ) -> Result<ShapeHandle, OpError> {
        let trsf = rotation(axis, degrees, center)?;
        self.apply(shape, &trsf)
    }

    /// Uniform scale about `center`, or the origin.
    pub fn scale(&mut self, shape: &impl ShapeRef, factor: f64, center: Option<Point3>) -> Result<ShapeHandle, OpError> {
        let trsf = scaling([factor; 3], center)?;
        self.apply(shape, &trsf)
    }

    pub fn scale3d(
        &mut self,
        shape: &impl ShapeRef,
        factors: Vector3,
        center: Option<Point3>,
    ) -> Result<ShapeHandle, OpError> {
        let trsf = scaling(factors, center)?;
        self.apply(shape, &trsf)
    }

    /// Reflects through the plane at `origin` with `normal`.
    pub fn mirror(&mut self, shape: &impl ShapeRef, origin: Point3, normal: Vector3) -> Result<ShapeHandle, OpError> {
        let trsf = mirroring(origin, normal)?;
        self.apply(shape, &trsf)
    }

    /// Moves `shape` so that what sat in `from` sits the same way in `to`.
    pub fn align(&mut self, shape: &impl ShapeRef, from: &Frame, to: &Frame) -> Result<ShapeHandle, OpError> {
        let trsf = Transform::frame_to_frame(from, to).map_err(|e| OpError::invalid(e.to_string()))?;
        self.apply(shape, &trsf)
    }

    /// Scale by `factor`, rotate by `degrees` around `axis`, then translate.
    /// The order never depends on which arguments are given.
    pub fn transform(
        &mut self,
        shape: &impl ShapeRef,
        translation: Vector3,
        axis: Vector3,
        degrees: f64,
        factor: f64,
    ) -> Result<ShapeHandle, OpError> {
        let trsf = composed(translation, axis, degrees, factor)?;
        self.apply(shape, &trsf)
    }

    pub fn translate_shapes<S: ShapeRef>(
        &mut self,
        shapes: &[S],
        offsets: &[Vector3],
    ) -> Result<Vec<ShapeHandle>, OpError> {
        OpError::check_len("translate_shapes", shapes.len(), offsets.len())?;
        let trsfs = offsets.iter().map(|o| Ok(Transform::translation(*o)));
        self.apply_each(shapes, trsfs)
    }

    pub fn rotate_shapes<S: ShapeRef>(
        &mut self,
        shapes: &[S],
        axes: &[Vector3],
        degrees: &[f64],
    ) -> Result<Vec<ShapeHandle>, OpError> {
        OpError::check_len("rotate_shapes", shapes.len(), axes.len())?;
        OpError::check_len("rotate_shapes", shapes.len(), degrees.len())?;
        let trsfs = axes.iter().zip(degrees).map(|(a, d)| rotation(*a, *d, None));
        self.apply_each(shapes, trsfs)
    }

    pub fn scale_shapes<S: ShapeRef>(&mut self, shapes: &[S], factors: &[f64]) -> Result<Vec<ShapeHandle>, OpError> {
        OpError::check_len("scale_shapes", shapes.len(), factors.len())?;
        let trsfs = factors.iter().map(|f| scaling([*f; 3], None));
        self.apply_each(shapes, trsfs)
    }

    pub fn mirror_shapes<S: ShapeRef>(
        &mut self,
        shapes: &[S],
        origins: &[Point3],
        normals: &[Vector3],
    ) -> Result<Vec<ShapeHandle>, OpError> {
        OpError::check_len("mirror_shapes", shapes.len(), origins.len())?;
        OpError::check_len("mirror_shapes", shapes.len(), normals.len())?;
        let trsfs = origins.iter().zip(normals).map(|(o, n)| mirroring(*o, *n));
        self.apply_each(shapes, trsfs)
    }

    /// Runs the batch in order and stops at the first failure. Shapes
    /// already produced by the batch are released before the error returns.
    fn apply_each<S: ShapeRef>(
        &mut self,
        shapes: &[S],
        trsfs: impl Iterator<Item = Result<Transform, OpError>>,
    ) -> Result<Vec<ShapeHandle>, OpError> {
        let mut out = Vec::with_capacity(shapes.len());
        for (shape, trsf) in shapes.iter().zip(trsfs) {
            match trsf.and_then(|t| self.apply(shape, &t)) {
                Ok(h) => out.push(h),
                Err(e) => {
                    tracing::debug!(done = out.len(), error = %e, "batch transform aborted");
                    for h in out {
                        self.ctx.discard(h.id());
                    }
                    return Err(e);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_point(a: Point3, b: Point3) {
        for i in 0..3 {
            assert_relative_eq!(a[i], b[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_composed_order_is_scale_rotate_translate() {
        let t = composed([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], 90.0, 2.0).unwrap();
        // (1,0,0) -> scale (2,0,0) -> rotate (0,2,0) -> translate (1,2,0)
        assert_point(t.transform_point(&[1.0, 0.0, 0.0]), [1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_zero_angle_ignores_axis() {
        let t = composed([0.0; 3], [0.0; 3], 0.0, 1.0).unwrap();
        assert!(t.approx_eq(&Transform::identity(), 1e-12));
    }

    #[test]
    fn test_translate_leaves_input() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(2.0, 2.0, 2.0, [0.0; 3]).unwrap();
        let moved = ctx.transforms().translate(&cube, [10.0, 0.0, 0.0]).unwrap();
        let before = ctx.kernel().bounding_box(cube.id()).unwrap();
        let after = ctx.kernel().bounding_box(moved.id()).unwrap();
        assert_point(before.min, [-1.0; 3]);
        assert_point(after.min, [9.0, -1.0, -1.0]);
        ctx.release_all([cube, moved]).unwrap();
    }

    #[test]
    fn test_zero_scale_is_rejected() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(1.0, 1.0, 1.0, [0.0; 3]).unwrap();
        assert!(matches!(
            ctx.transforms().scale3d(&cube, [1.0, 0.0, 1.0], None),
            Err(OpError::InvalidInputShape { .. })
        ));
        ctx.release(cube).unwrap();
    }

    #[test]
    fn test_batch_length_checked_before_work() {
        let mut ctx = KernelContext::mock();
        let a = ctx.primitives().make_box(1.0, 1.0, 1.0, [0.0; 3]).unwrap();
        let b = ctx.primitives().make_box(1.0, 1.0, 1.0, [5.0; 3]).unwrap();
        let shapes = [a, b];
        let err = ctx
            .transforms()
            .rotate_shapes(&shapes, &[[0.0, 0.0, 1.0]; 2], &[45.0])
            .unwrap_err();
        assert!(matches!(err, OpError::ListLengthMismatch { expected: 2, actual: 1, .. }));
        assert_eq!(ctx.live_shapes(), 2);
        ctx.release_all(shapes).unwrap();
    }

    #[test]
    fn test_failed_batch_releases_partial_results() {
        let mut ctx = KernelContext::mock();
        let a = ctx.primitives().make_box(1.0, 1.0, 1.0, [0.0; 3]).unwrap();
        let b = ctx.primitives().make_box(1.0, 1.0, 1.0, [5.0; 3]).unwrap();
        let shapes = [a, b];
        let result = ctx
            .transforms()
            .mirror_shapes(&shapes, &[[0.0; 3]; 2], &[[1.0, 0.0, 0.0], [0.0; 3]]);
        assert!(result.is_err());
        assert_eq!(ctx.live_shapes(), 2);
        ctx.release_all(shapes).unwrap();
    }
}
