//! Elementary geometry: points, axes, curves and solids.

use kernel_adapter::{CurveDef, ShapeId};
use shape_types::{Axis, Plane, Point3, ShapeKind, Vector3};
use tracing::{debug, info, instrument};

use crate::context::KernelContext;
use crate::error::OpError;
use crate::handle::{ShapeHandle, ShapeRef};

const MIN_LENGTH: f64 = 1e-12;

/// How far a curve definition is materialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Specificity {
    Curve,
    Edge,
    Wire,
    Face,
}

/// A curve definition, or the shape built from it.
#[derive(Debug)]
pub enum Primitive {
    Curves(Vec<CurveDef>),
    Shape(ShapeHandle),
}

impl Primitive {
    pub fn into_shape(self) -> Result<ShapeHandle, OpError> {
        match self {
            Primitive::Shape(h) => Ok(h),
            Primitive::Curves(_) => Err(OpError::invalid("primitive was not materialised")),
        }
    }

    pub fn curves(&self) -> Option<&[CurveDef]> {
        match self {
            Primitive::Curves(c) => Some(c),
            Primitive::Shape(_) => None,
        }
    }
}

fn normalized(v: Vector3, what: &str) -> Result<Vector3, OpError> {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len.is_nan() || len <= MIN_LENGTH {
        return Err(OpError::invalid(format!("{what} has zero length")));
    }
    Ok([v[0] / len, v[1] / len, v[2] / len])
}

fn positive(value: f64, what: &str) -> Result<(), OpError> {
    if value.is_nan() || value <= 0.0 {
        return Err(OpError::invalid(format!("{what} must be positive, got {value}")));
    }
    Ok(())
}

/// Builds primitives in one kernel session.
pub struct PrimitiveBuilder<'c> {
    ctx: &'c mut KernelContext,
}

impl<'c> PrimitiveBuilder<'c> {
    pub fn new(ctx: &'c mut KernelContext) -> Self {
        Self { ctx }
    }

    // ── Plain geometry ──

    pub fn point(&self, x: f64, y: f64, z: f64) -> Point3 {
        [x, y, z]
    }

    /// Unit vector along `v`.
    pub fn direction(&self, v: Vector3) -> Result<Vector3, OpError> {
        normalized(v, "direction")
    }

    pub fn axis(&self, origin: Point3, direction: Vector3) -> Result<Axis, OpError> {
        Ok(Axis::new(origin, normalized(direction, "axis direction")?))
    }

    pub fn plane(&self, origin: Point3, normal: Vector3) -> Result<Plane, OpError> {
        Ok(Plane {
            origin,
            normal: normalized(normal, "plane normal")?,
        })
    }

    // ── Curves ──

    pub fn circle(
        &mut self,
        center: Point3,
        normal: Vector3,
        radius: f64,
        specificity: Specificity,
    ) -> Result<Primitive, OpError> {
        positive(radius, "circle radius")?;
        let curve = CurveDef::Circle {
            center,
            normal: normalized(normal, "circle normal")?,
            radius,
        };
        self.materialize(vec![curve], specificity)
    }

    pub fn ellipse(
        &mut self,
        center: Point3,
        normal: Vector3,
        x_dir: Vector3,
        major_radius: f64,
        minor_radius: f64,
        specificity: Specificity,
    ) -> Result<Primitive, OpError> {
        positive(minor_radius, "ellipse minor radius")?;
        if major_radius < minor_radius {
            return Err(OpError::invalid(format!(
                "ellipse major radius {major_radius} is smaller than minor radius {minor_radius}"
            )));
        }
        let curve = CurveDef::Ellipse {
            center,
            normal: normalized(normal, "ellipse normal")?,
            x_dir: normalized(x_dir, "ellipse major axis")?,
            major_radius,
            minor_radius,
        };
        self.materialize(vec![curve], specificity)
    }

    /// Closed polygon through `points`; the last point connects back to the
    /// first.
    pub fn polygon(&mut self, points: &[Point3], specificity: Specificity) -> Result<Primitive, OpError> {
        if points.len() < 3 {
            return Err(OpError::invalid(format!(
                "a polygon needs at least 3 points, got {}",
                points.len()
            )));
        }
        let mut curves = Vec::with_capacity(points.len());
        for (i, start) in points.iter().enumerate() {
            let end = points[(i + 1) % points.len()];
            let d = [end[0] - start[0], end[1] - start[1], end[2] - start[2]];
            if normalized(d, "polygon side").is_err() {
                return Err(OpError::invalid(format!("polygon points {i} and {} coincide", (i + 1) % points.len())));
            }
            curves.push(CurveDef::Line { start: *start, end });
        }
        self.materialize(curves, specificity)
    }

    pub fn bspline(
        &mut self,
        points: &[Point3],
        closed: bool,
        specificity: Specificity,
    ) -> Result<Primitive, OpError> {
        if points.len() < 2 {
            return Err(OpError::invalid("a B-spline needs at least 2 control points"));
        }
        let curve = CurveDef::BSpline {
            points: points.to_vec(),
            closed,
        };
        self.materialize(vec![curve], specificity)
    }

    /// Wraps curves step by step: curve, edge, wire, face.
    fn materialize(&mut self, curves: Vec<CurveDef>, specificity: Specificity) -> Result<Primitive, OpError> {
        if specificity == Specificity::Curve {
            return Ok(Primitive::Curves(curves));
        }
        let edges = self.edge_ids(&curves)?;
        if specificity == Specificity::Edge {
            if let [edge] = edges.as_slice() {
                return Ok(Primitive::Shape(self.ctx.adopt(*edge)?));
            }
            // A curve the kernel had to split comes back as a compound.
            debug!(count = edges.len(), "curve needs several edges");
            let compound = self.ctx.kernel_mut().make_compound(&edges);
            self.discard_all(&edges);
            let compound = compound.map_err(OpError::kernel("make_compound"))?;
            return Ok(Primitive::Shape(self.ctx.adopt(compound)?));
        }
        let wire = self.ctx.kernel_mut().make_wire(&edges);
        self.discard_all(&edges);
        let wire = wire.map_err(OpError::kernel("make_wire"))?;
        if specificity == Specificity::Wire {
            return Ok(Primitive::Shape(self.ctx.adopt(wire)?));
        }
        let face = self.ctx.kernel_mut().make_face(wire, true);
        self.ctx.discard(wire);
        let face = face.map_err(OpError::kernel("make_face"))?;
        Ok(Primitive::Shape(self.ctx.adopt(face)?))
    }

    fn edge_ids(&mut self, curves: &[CurveDef]) -> Result<Vec<ShapeId>, OpError> {
        let mut edges = Vec::new();
        for curve in curves {
            match self.ctx.kernel_mut().make_edges(curve) {
                Ok(made) => edges.extend(made),
                Err(e) => {
                    self.discard_all(&edges);
                    return Err(OpError::kernel("make_edge")(e));
                }
            }
        }
        Ok(edges)
    }

    fn discard_all(&mut self, ids: &[ShapeId]) {
        for &id in ids {
            self.ctx.discard(id);
        }
    }

    // ── Topology from parts ──

    /// Edge for a single curve definition.
    pub fn make_edge(&mut self, curve: &CurveDef) -> Result<ShapeHandle, OpError> {
        self.materialize(vec![curve.clone()], Specificity::Edge)?.into_shape()
    }

    pub fn make_wire<S: ShapeRef>(&mut self, edges: &[S]) -> Result<ShapeHandle, OpError> {
        if edges.is_empty() {
            return Err(OpError::invalid("a wire needs at least one edge"));
        }
        let mut ids = Vec::new();
        for e in edges {
            match e.shape_kind() {
                ShapeKind::Edge => ids.push(e.shape_id()),
                ShapeKind::Wire | ShapeKind::Compound => {
                    let parts = self
                        .ctx
                        .kernel_mut()
                        .explore(e.shape_id(), ShapeKind::Edge)
                        .map_err(OpError::kernel("make_wire"))?;
                    ids.extend(parts);
                }
                other => return Err(OpError::invalid(format!("cannot build a wire from a {other}"))),
            }
        }
        let wire = self
            .ctx
            .kernel_mut()
            .make_wire(&ids)
            .map_err(OpError::kernel("make_wire"))?;
        self.ctx.adopt(wire)
    }

    pub fn make_face(&mut self, wire: &impl ShapeRef, planar_only: bool) -> Result<ShapeHandle, OpError> {
        match wire.shape_kind() {
            ShapeKind::Wire | ShapeKind::Edge => {}
            other => return Err(OpError::invalid(format!("a face needs a wire, got a {other}"))),
        }
        self.ctx.require_shape(wire, "wire")?;
        let face = self
            .ctx
            .kernel_mut()
            .make_face(wire.shape_id(), planar_only)
            .map_err(OpError::kernel("make_face"))?;
        self.ctx.adopt(face)
    }

    // ── Solids ──

    /// Axis-aligned box of `width` (x), `length` (y) and `height` (z)
    /// centred on `center`.
    #[instrument(skip(self))]
    pub fn make_box(
        &mut self,
        width: f64,
        length: f64,
        height: f64,
        center: Point3,
    ) -> Result<ShapeHandle, OpError> {
        positive(width, "box width")?;
        positive(length, "box length")?;
        positive(height, "box height")?;
        info!("creating box primitive");
        let corner = [
            center[0] - width / 2.0,
            center[1] - length / 2.0,
            center[2] - height / 2.0,
        ];
        let id = self
            .ctx
            .kernel_mut()
            .make_box(corner, [width, length, height])
            .map_err(OpError::kernel("make_box"))?;
        self.ctx.adopt(id)
    }

    #[instrument(skip(self))]
    pub fn make_sphere(&mut self, center: Point3, radius: f64) -> Result<ShapeHandle, OpError> {
        positive(radius, "sphere radius")?;
        info!("creating sphere primitive");
        let id = self
            .ctx
            .kernel_mut()
            .make_sphere(center, radius)
            .map_err(OpError::kernel("make_sphere"))?;
        self.ctx.adopt(id)
    }

    /// Cylinder standing on +Z with its base disc centred on `center`.
    pub fn make_cylinder(&mut self, center: Point3, radius: f64, height: f64) -> Result<ShapeHandle, OpError> {
        self.make_cylinder_on(&Axis::new(center, [0.0, 0.0, 1.0]), radius, height)
    }

    #[instrument(skip(self))]
    pub fn make_cylinder_on(&mut self, axis: &Axis, radius: f64, height: f64) -> Result<ShapeHandle, OpError> {
        positive(radius, "cylinder radius")?;
        positive(height, "cylinder height")?;
        info!("creating cylinder primitive");
        normalized(axis.direction, "cylinder axis")?;
        let id = self
            .ctx
            .kernel_mut()
            .make_cylinder(axis, radius, height)
            .map_err(OpError::kernel("make_cylinder"))?;
        self.ctx.adopt(id)
    }

    /// Cone standing on +Z; a zero `top_radius` gives a pointed cone.
    #[instrument(skip(self))]
    pub fn make_cone(
        &mut self,
        center: Point3,
        bottom_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> Result<ShapeHandle, OpError> {
        positive(height, "cone height")?;
        if bottom_radius.is_nan() || top_radius.is_nan() || bottom_radius < 0.0 || top_radius < 0.0 {
            return Err(OpError::invalid("cone radii must not be negative"));
        }
        if bottom_radius == 0.0 && top_radius == 0.0 {
            return Err(OpError::invalid("cone radii cannot both be zero"));
        }
        info!("creating cone primitive");
        let id = self
            .ctx
            .kernel_mut()
            .make_cone(&Axis::new(center, [0.0, 0.0, 1.0]), bottom_radius, top_radius, height)
            .map_err(OpError::kernel("make_cone"))?;
        self.ctx.adopt(id)
    }

    pub fn make_compound<S: ShapeRef>(&mut self, parts: &[S]) -> Result<ShapeHandle, OpError> {
        let ids: Vec<ShapeId> = parts.iter().map(|p| p.shape_id()).collect();
        let id = self
            .ctx
            .kernel_mut()
            .make_compound(&ids)
            .map_err(OpError::kernel("make_compound"))?;
        self.ctx.adopt(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_is_normalised() {
        let mut ctx = KernelContext::mock();
        let d = ctx.primitives().direction([0.0, 3.0, 4.0]).unwrap();
        assert_eq!(d, [0.0, 0.6, 0.8]);
        assert!(ctx.primitives().direction([0.0; 3]).is_err());
    }

    #[test]
    fn test_circle_curve_is_not_materialised() {
        let mut ctx = KernelContext::mock();
        let p = ctx
            .primitives()
            .circle([0.0; 3], [0.0, 0.0, 1.0], 1.0, Specificity::Curve)
            .unwrap();
        assert_eq!(p.curves().map(|c| c.len()), Some(1));
        assert_eq!(ctx.live_shapes(), 0);
    }

    #[test]
    fn test_polygon_specificity_ladder() {
        let mut ctx = KernelContext::mock();
        let pts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let wire = ctx.primitives().polygon(&pts, Specificity::Wire).unwrap().into_shape().unwrap();
        assert_eq!(wire.kind(), ShapeKind::Wire);
        let face = ctx.primitives().polygon(&pts, Specificity::Face).unwrap().into_shape().unwrap();
        assert_eq!(face.kind(), ShapeKind::Face);
        // Temporary edges and wires were released along the way.
        assert_eq!(ctx.live_shapes(), 2);
        ctx.release_all([wire, face]).unwrap();
    }

    #[test]
    fn test_box_rejects_zero_size() {
        let mut ctx = KernelContext::mock();
        assert!(matches!(
            ctx.primitives().make_box(0.0, 1.0, 1.0, [0.0; 3]),
            Err(OpError::InvalidInputShape { .. })
        ));
    }

    #[test]
    fn test_non_planar_polygon_face_fails() {
        let mut ctx = KernelContext::mock();
        let pts = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 0.0],
        ];
        let err = ctx.primitives().polygon(&pts, Specificity::Face).unwrap_err();
        assert!(matches!(err, OpError::KernelOperationFailed { .. }));
        assert_eq!(ctx.live_shapes(), 0);
    }
}
