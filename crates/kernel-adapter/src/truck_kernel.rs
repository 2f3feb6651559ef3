//! TruckKernel: real geometry kernel wrapping truck's API.
//!
//! truck covers primitives, booleans, meshing and STEP output. It has no 3D
//! fillet or chamfer and cannot read STEP into modeling types, so those
//! return `NotSupported`.

use std::collections::HashMap;
use std::f64::consts::PI;

use shape_types::{Point3, ShapeKind};
use truck_meshalgo::prelude::*;
use truck_meshalgo::tessellation::{MeshableShape, MeshedShape};
use truck_modeling::builder;
use truck_modeling::geometry::{BSplineCurve, Curve, KnotVec};
use truck_modeling::topology::{Edge, Solid, Vertex, Wire};
use truck_modeling::{
    BoundedCurve, Cut, EuclideanSpace, InnerSpace, Invertible, Matrix4, MetricSpace,
    ParameterDivision1D, ParametricCurve, Point3 as TPoint, Rad, Vector3 as TVector,
};
use truck_stepio::out::{CompleteStepDisplay, StepHeaderDescriptor, StepModel};

use crate::arena::ShapeArena;
use crate::corner::fillet_corner;
use crate::traits::Kernel;
use crate::transform::Transform;
use crate::truck_shape::TruckShape;
use crate::types::*;
use crate::types::BoundingBox;

/// Tolerance of the throwaway meshes used for extents and volume.
const MEASURE_TOLERANCE: f64 = 0.01;
/// Distance below which two points are the same vertex.
const POINT_TOL: f64 = 1e-7;

/// Real geometry kernel backed by the truck BREP library.
pub struct TruckKernel {
    shapes: ShapeArena<TruckShape>,
    /// Face hash -> cached face mesh.
    meshes: HashMap<u64, PolygonMesh>,
    boolean_tolerance: f64,
}

impl TruckKernel {
    pub fn new() -> Self {
        Self {
            shapes: ShapeArena::new(),
            meshes: HashMap::new(),
            boolean_tolerance: 0.05,
        }
    }

    pub fn with_boolean_tolerance(mut self, tolerance: f64) -> Self {
        self.boolean_tolerance = tolerance;
        self
    }

    fn shape(&self, id: ShapeId) -> Result<TruckShape, KernelError> {
        self.shapes.get(id).cloned()
    }

    fn store(&mut self, shape: TruckShape) -> ShapeId {
        self.shapes.insert(shape)
    }

    fn store_solid(&mut self, solid: Solid) -> ShapeId {
        self.store(TruckShape::Solid(solid))
    }

    fn edge(&self, id: ShapeId) -> Result<Edge, KernelError> {
        match self.shape(id)? {
            TruckShape::Edge(e) => Ok(e),
            other => Err(KernelError::wrong_kind(ShapeKind::Edge, other.kind())),
        }
    }

    fn vertex(&self, id: ShapeId) -> Result<Vertex, KernelError> {
        match self.shape(id)? {
            TruckShape::Vertex(v) => Ok(v),
            other => Err(KernelError::wrong_kind(ShapeKind::Vertex, other.kind())),
        }
    }

    /// A wire, or a closed chain of edges wrapped into one.
    fn wire(&self, id: ShapeId) -> Result<Wire, KernelError> {
        match self.shape(id)? {
            TruckShape::Wire(w) => Ok(w),
            TruckShape::Edge(e) => Ok(Wire::from_iter([e])),
            other => Err(KernelError::wrong_kind(ShapeKind::Wire, other.kind())),
        }
    }

    fn measure_points(shape: &TruckShape) -> Vec<Point3> {
        let mut points: Vec<Point3> = shape
            .sub_shapes(ShapeKind::Vertex)
            .into_iter()
            .filter_map(|v| match v {
                TruckShape::Vertex(v) => Some(arr(v.point())),
                _ => None,
            })
            .collect();
        for e in shape.sub_shapes(ShapeKind::Edge) {
            if let TruckShape::Edge(e) = e {
                points.extend(sample_edge(&e, MEASURE_TOLERANCE));
            }
        }
        for shell in shape.meshable_shells() {
            let mesh = shell.triangulation(MEASURE_TOLERANCE).to_polygon();
            points.extend(mesh.positions().iter().map(|p| arr(*p)));
        }
        points
    }

    fn bbox_of(shape: &TruckShape) -> BoundingBox {
        BoundingBox::from_points(&Self::measure_points(shape))
    }

    fn disjoint(&self, a: &TruckShape, b: &TruckShape) -> bool {
        !Self::bbox_of(a).intersects(&Self::bbox_of(b), self.boolean_tolerance)
    }

    fn boolean_failed(op: &str) -> KernelError {
        KernelError::BooleanFailed {
            reason: format!("truck {op} returned no solid"),
        }
    }
}

impl Default for TruckKernel {
    fn default() -> Self {
        Self::new()
    }
}

// ── Conversions ──

fn tp(p: &Point3) -> TPoint {
    TPoint::new(p[0], p[1], p[2])
}

fn arr(p: TPoint) -> Point3 {
    [p.x, p.y, p.z]
}

fn truck_matrix(t: &Transform) -> Matrix4 {
    let c = t.to_cols_array();
    Matrix4::new(
        c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7], c[8], c[9], c[10], c[11], c[12], c[13],
        c[14], c[15],
    )
}

fn sample_edge(edge: &Edge, tolerance: f64) -> Vec<Point3> {
    let curve = edge.oriented_curve();
    let range = curve.range_tuple();
    let (_params, points) = curve.parameter_division(range, tolerance);
    points.into_iter().map(arr).collect()
}

fn transformed(shape: &TruckShape, m: Matrix4, mirroring: bool) -> TruckShape {
    match shape {
        TruckShape::Vertex(v) => TruckShape::Vertex(builder::transformed(v, m)),
        TruckShape::Edge(e) => TruckShape::Edge(builder::transformed(e, m)),
        TruckShape::Wire(w) => TruckShape::Wire(builder::transformed(w, m)),
        TruckShape::Face(f) => TruckShape::Face(builder::transformed(f, m)),
        TruckShape::Shell(s) => TruckShape::Shell(builder::transformed(s, m)),
        TruckShape::Solid(s) => {
            let mut moved = builder::transformed(s, m);
            if mirroring {
                moved.not();
            }
            TruckShape::Solid(moved)
        }
        TruckShape::Compound(items) => TruckShape::Compound(
            items.iter().map(|i| transformed(i, m, mirroring)).collect(),
        ),
    }
}

// ── Curve construction ──

/// Three arcs of the ellipse with semi-axes `a` and `b` moved by `placement`.
/// truck edges cannot start and end on the same vertex, so a closed conic
/// needs more than one.
fn conic_edges(placement: &Transform, a: f64, b: f64) -> Result<Vec<Edge>, KernelError> {
    if a.is_nan() || b.is_nan() || a <= 0.0 || b <= 0.0 {
        return Err(KernelError::InvalidGeometry {
            reason: format!("radii must be positive, got {a} and {b}"),
        });
    }
    let on_circle = |t: f64| TPoint::new(t.cos(), t.sin(), 0.0);
    let verts: Vec<Vertex> = (0..3)
        .map(|k| builder::vertex(on_circle(2.0 * PI * k as f64 / 3.0)))
        .collect();
    let arcs: Vec<Edge> = (0..3)
        .map(|k| {
            let mid = on_circle(2.0 * PI * (k as f64 + 0.5) / 3.0);
            builder::circle_arc(&verts[k], &verts[(k + 1) % 3], mid)
        })
        .collect();
    let unit_circle = Wire::from_iter(arcs);
    let m = truck_matrix(&Transform::scaling(a, b, 1.0).then(placement));
    let placed: Wire = builder::transformed(&unit_circle, m);
    Ok(placed.edge_iter().cloned().collect())
}

/// Clamped uniform B-spline edges through the control points. A closed
/// curve is cut in two at its parameter midpoint.
fn bspline_edges(points: &[Point3], closed: bool) -> Result<Vec<Edge>, KernelError> {
    if points.len() < 2 {
        return Err(KernelError::InvalidGeometry {
            reason: "a B-spline needs at least two points".into(),
        });
    }
    let mut ctrl: Vec<TPoint> = points.iter().map(tp).collect();
    if closed && ctrl[0].distance(ctrl[ctrl.len() - 1]) > POINT_TOL {
        ctrl.push(ctrl[0]);
    }
    let n = ctrl.len();
    let degree = (n - 1).min(3);
    let curve = BSplineCurve::try_new(KnotVec::uniform_knot(degree, n - degree), ctrl.clone())
        .map_err(|e| KernelError::InvalidGeometry {
            reason: format!("invalid B-spline: {e}"),
        })?;
    let start = builder::vertex(ctrl[0]);
    if !closed {
        let end = builder::vertex(ctrl[n - 1]);
        let edge = Edge::try_new(&start, &end, Curve::BSplineCurve(curve)).map_err(|e| {
            KernelError::InvalidGeometry {
                reason: format!("{e}"),
            }
        })?;
        return Ok(vec![edge]);
    }
    let (t0, t1) = curve.range_tuple();
    let t_mid = 0.5 * (t0 + t1);
    let mid = builder::vertex(curve.subs(t_mid));
    let mut first = curve;
    let second = first.cut(t_mid);
    let to_edge = |v0: &Vertex, v1: &Vertex, c: BSplineCurve<TPoint>| {
        Edge::try_new(v0, v1, Curve::BSplineCurve(c)).map_err(|e| KernelError::InvalidGeometry {
            reason: format!("{e}"),
        })
    };
    Ok(vec![to_edge(&start, &mid, first)?, to_edge(&mid, &start, second)?])
}

// ── Primitives ──

fn make_box_solid(corner: Point3, size: [f64; 3]) -> Solid {
    let v = builder::vertex(tp(&corner));
    let edge = builder::tsweep(&v, TVector::new(size[0], 0.0, 0.0));
    let face = builder::tsweep(&edge, TVector::new(0.0, size[1], 0.0));
    builder::tsweep(&face, TVector::new(0.0, 0.0, size[2]))
}

/// Cylinder on the world Z axis: circle wire, face, translational sweep.
fn make_cylinder_solid(radius: f64, height: f64) -> Result<Solid, KernelError> {
    let v = builder::vertex(TPoint::new(radius, 0.0, 0.0));
    let wire = builder::rsweep(&v, TPoint::origin(), TVector::unit_z(), Rad(2.0 * PI));
    let face = builder::try_attach_plane(&[wire]).map_err(|e| KernelError::InvalidGeometry {
        reason: format!("failed to create circular face: {e}"),
    })?;
    Ok(builder::tsweep(&face, TVector::new(0.0, 0.0, height)))
}

/// Sphere at the origin: half disc in the XZ plane revolved about Z.
fn make_sphere_solid(radius: f64) -> Result<Solid, KernelError> {
    let v_right = builder::vertex(TPoint::new(radius, 0.0, 0.0));
    let arc_wire = builder::rsweep(&v_right, TPoint::origin(), TVector::unit_y(), Rad(PI));
    let mut edges: Vec<Edge> = arc_wire.edge_iter().cloned().collect();
    let (Some(first), Some(last)) = (edges.first(), edges.last()) else {
        return Err(KernelError::InvalidGeometry {
            reason: "sphere profile has no arc".into(),
        });
    };
    let closing = builder::line(last.back(), first.front());
    edges.push(closing);
    let face = builder::try_attach_plane(&[Wire::from_iter(edges)]).map_err(|e| {
        KernelError::InvalidGeometry {
            reason: format!("failed to create half disc: {e}"),
        }
    })?;
    Ok(builder::rsweep(&face, TPoint::origin(), TVector::unit_z(), Rad(2.0 * PI)))
}

/// Cone frustum on the world Z axis: profile in the XZ plane revolved
/// about Z. A zero radius puts the profile corner on the axis.
fn make_cone_solid(r1: f64, r2: f64, height: f64) -> Result<Solid, KernelError> {
    let mut corners = vec![TPoint::origin()];
    if r1 > 0.0 {
        corners.push(TPoint::new(r1, 0.0, 0.0));
    }
    if r2 > 0.0 {
        corners.push(TPoint::new(r2, 0.0, height));
    }
    corners.push(TPoint::new(0.0, 0.0, height));
    let verts: Vec<Vertex> = corners.iter().map(|p| builder::vertex(*p)).collect();
    let n = verts.len();
    let profile: Wire = (0..n)
        .map(|i| builder::line(&verts[i], &verts[(i + 1) % n]))
        .collect();
    let face = builder::try_attach_plane(&[profile]).map_err(|e| KernelError::InvalidGeometry {
        reason: format!("failed to create cone profile: {e}"),
    })?;
    Ok(builder::rsweep(&face, TPoint::origin(), TVector::unit_z(), Rad(2.0 * PI)))
}

// ── Planar corner rounding ──

/// Corner vertices of a wire made of straight edges.
fn polyline(wire: &Wire) -> Result<(Vec<Vertex>, bool), KernelError> {
    let mut verts = Vec::new();
    for e in wire.edge_iter() {
        if !matches!(e.oriented_curve(), Curve::Line(_)) {
            return Err(KernelError::not_supported("corner fillet on curved edges"));
        }
        verts.push(e.front().clone());
    }
    let closed = wire.is_closed();
    match wire.back_vertex() {
        Some(v) if !closed => verts.push(v.clone()),
        None => return Err(KernelError::EmptyWire),
        _ => {}
    }
    Ok((verts, closed))
}

fn round_corners(wire: &Wire, corners: &[(Vertex, f64)]) -> Result<Wire, KernelError> {
    let (verts, closed) = polyline(wire)?;
    let n = verts.len();
    let pts: Vec<Point3> = verts.iter().map(|v| arr(v.point())).collect();

    // per corner: vertex leaving the previous segment, vertex entering the
    // next one, and the arc between them
    let mut ends: Vec<(Vertex, Vertex, Option<Edge>)> =
        verts.iter().map(|v| (v.clone(), v.clone(), None)).collect();
    let mut setbacks = vec![0.0; n];
    for (corner, radius) in corners {
        let i = verts
            .iter()
            .position(|v| v.id() == corner.id())
            .ok_or_else(|| KernelError::FilletFailed {
                reason: "vertex is not on the wire".into(),
            })?;
        if !closed && (i == 0 || i == n - 1) {
            return Err(KernelError::FilletFailed {
                reason: "cannot round the end of an open wire".into(),
            });
        }
        let arc = fillet_corner(&pts[(i + n - 1) % n], &pts[i], &pts[(i + 1) % n], *radius)?;
        let start = builder::vertex(tp(&arc.start));
        let end = builder::vertex(tp(&arc.end));
        let edge = builder::circle_arc(&start, &end, tp(&arc.mid));
        setbacks[i] = arc.setback;
        ends[i] = (start, end, Some(edge));
    }

    let segments = if closed { n } else { n - 1 };
    let mut edges = Vec::new();
    for i in 0..segments {
        let j = (i + 1) % n;
        let length = tp(&pts[i]).distance(tp(&pts[j]));
        if setbacks[i] + setbacks[j] > length + POINT_TOL {
            return Err(KernelError::FilletFailed {
                reason: "neighbouring corner arcs overlap".into(),
            });
        }
        if let Some(arc) = &ends[i].2 {
            edges.push(arc.clone());
        }
        if length - setbacks[i] - setbacks[j] > POINT_TOL {
            edges.push(builder::line(&ends[i].1, &ends[j].0));
        }
    }
    if !closed {
        if let Some(arc) = &ends[n - 1].2 {
            edges.push(arc.clone());
        }
    }
    Ok(Wire::from_iter(edges))
}

// ── Meshing ──

fn triangulation_of(mesh: &PolygonMesh, reversed: bool) -> Triangulation {
    let positions = mesh.positions();
    let normals = mesh.normals();
    let mut node_normals: Vec<Option<TVector>> = vec![None; positions.len()];
    let mut triangles = Vec::new();
    let mut visit = |tri: [&StandardVertex; 3]| {
        for v in tri {
            if node_normals[v.pos].is_none() {
                node_normals[v.pos] = v.nor.and_then(|i| normals.as_slice().get(i)).copied();
            }
        }
        triangles.push([tri[0].pos as u32, tri[1].pos as u32, tri[2].pos as u32]);
    };
    for [a, b, c] in mesh.tri_faces() {
        visit([a, b, c]);
    }
    for [a, b, c, d] in mesh.quad_faces() {
        visit([a, b, c]);
        visit([a, c, d]);
    }
    let sign = if reversed { -1.0 } else { 1.0 };
    Triangulation {
        nodes: positions.iter().map(|p| arr(*p)).collect(),
        normals: node_normals
            .into_iter()
            .map(|n| {
                let n = n.unwrap_or_else(TVector::unit_z) * sign;
                [n.x, n.y, n.z]
            })
            .collect(),
        triangles,
        location: Transform::identity(),
    }
}

fn signed_volume(mesh: &PolygonMesh) -> f64 {
    let p = mesh.positions();
    let tet = |a: usize, b: usize, c: usize| p[a].to_vec().dot(p[b].to_vec().cross(p[c].to_vec())) / 6.0;
    let tris: f64 = mesh.tri_faces().iter().map(|[a, b, c]| tet(a.pos, b.pos, c.pos)).sum();
    let quads: f64 = mesh
        .quad_faces()
        .iter()
        .map(|[a, b, c, d]| tet(a.pos, b.pos, c.pos) + tet(a.pos, c.pos, d.pos))
        .sum();
    tris + quads
}

impl Kernel for TruckKernel {
    fn name(&self) -> &str {
        "truck"
    }

    fn kind(&self, shape: ShapeId) -> Result<ShapeKind, KernelError> {
        Ok(self.shapes.get(shape)?.kind())
    }

    fn is_null(&self, shape: ShapeId) -> Result<bool, KernelError> {
        Ok(self.shapes.get(shape)?.is_null())
    }

    fn release(&mut self, shape: ShapeId) -> Result<(), KernelError> {
        self.shapes.release(shape)
    }

    fn detach(&mut self, shape: ShapeId) -> Result<ShapeId, KernelError> {
        self.shapes.detach(shape)
    }

    fn live_shapes(&self) -> usize {
        self.shapes.live_owners()
    }

    fn stored_shapes(&self) -> usize {
        self.shapes.len()
    }

    fn explore(&mut self, shape: ShapeId, kind: ShapeKind) -> Result<Vec<ShapeId>, KernelError> {
        let root = self.shape(shape)?;
        root.sub_shapes(kind)
            .into_iter()
            .map(|sub| {
                let key = sub.view_key();
                self.shapes.insert_view(shape, key, sub)
            })
            .collect()
    }

    fn hash_code(&self, shape: ShapeId) -> Result<u64, KernelError> {
        Ok(self.shapes.get(shape)?.hash_code())
    }

    fn orientation(&self, shape: ShapeId) -> Result<Orientation, KernelError> {
        Ok(self.shapes.get(shape)?.orientation())
    }

    fn is_closed(&self, shape: ShapeId) -> Result<bool, KernelError> {
        Ok(self.shapes.get(shape)?.is_closed())
    }

    fn vertex_point(&self, vertex: ShapeId) -> Result<Point3, KernelError> {
        Ok(arr(self.vertex(vertex)?.point()))
    }

    fn make_vertex(&mut self, point: Point3) -> Result<ShapeId, KernelError> {
        Ok(self.store(TruckShape::Vertex(builder::vertex(tp(&point)))))
    }

    fn make_edges(&mut self, curve: &CurveDef) -> Result<Vec<ShapeId>, KernelError> {
        let edges = match curve {
            CurveDef::Line { start, end } => {
                if tp(start).distance(tp(end)) <= POINT_TOL {
                    return Err(KernelError::InvalidGeometry {
                        reason: "line end points coincide".into(),
                    });
                }
                let (v0, v1) = (builder::vertex(tp(start)), builder::vertex(tp(end)));
                vec![builder::line(&v0, &v1)]
            }
            CurveDef::Circle {
                center,
                normal,
                radius,
            } => conic_edges(&Transform::placement(&Axis::new(*center, *normal))?, *radius, *radius)?,
            CurveDef::Ellipse {
                center,
                normal,
                x_dir,
                major_radius,
                minor_radius,
            } => {
                let frame = shape_types::Frame {
                    origin: *center,
                    z_dir: *normal,
                    x_dir: *x_dir,
                };
                let placement = Transform::frame_to_frame(&shape_types::Frame::world(), &frame)?;
                conic_edges(&placement, *major_radius, *minor_radius)?
            }
            CurveDef::BSpline { points, closed } => bspline_edges(points, *closed)?,
        };
        Ok(edges
            .into_iter()
            .map(|e| self.store(TruckShape::Edge(e)))
            .collect())
    }

    fn make_wire(&mut self, edges: &[ShapeId]) -> Result<ShapeId, KernelError> {
        let input = edges
            .iter()
            .map(|&e| self.edge(e))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(first) = input.first() else {
            return Err(KernelError::EmptyWire);
        };

        // Rebuild every edge on shared vertices so the wire is connected.
        let start = builder::vertex(first.front().point());
        let mut cursor = start.clone();
        let mut chained: Vec<Edge> = Vec::with_capacity(input.len());
        for (i, edge) in input.iter().enumerate() {
            let (a, b) = (edge.front().point(), edge.back().point());
            let here = cursor.point();
            let curve = if a.distance(here) <= POINT_TOL {
                edge.oriented_curve()
            } else if b.distance(here) <= POINT_TOL {
                edge.oriented_curve().inverse()
            } else {
                return Err(KernelError::DisconnectedWire {
                    reason: format!("edge {i} does not touch the end of edge {}", i.saturating_sub(1)),
                });
            };
            let far = curve.back();
            let next = if i + 1 == input.len() && far.distance(start.point()) <= POINT_TOL {
                start.clone()
            } else {
                builder::vertex(far)
            };
            let rebuilt = Edge::try_new(&cursor, &next, curve).map_err(|e| {
                KernelError::InvalidGeometry {
                    reason: format!("{e}"),
                }
            })?;
            chained.push(rebuilt);
            cursor = next;
        }
        Ok(self.store(TruckShape::Wire(Wire::from_iter(chained))))
    }

    fn make_face(&mut self, wire: ShapeId, planar_only: bool) -> Result<ShapeId, KernelError> {
        let wire = self.wire(wire)?;
        if !wire.is_closed() {
            return Err(KernelError::NotClosed);
        }
        // truck only fills planar boundaries.
        tracing::trace!(planar_only, "attaching plane");
        let face = builder::try_attach_plane(&[wire]).map_err(|_| KernelError::NotPlanar)?;
        Ok(self.store(TruckShape::Face(face)))
    }

    fn make_box(&mut self, corner: Point3, size: [f64; 3]) -> Result<ShapeId, KernelError> {
        if size.iter().any(|s| s.is_nan() || *s <= 0.0) {
            return Err(KernelError::InvalidGeometry {
                reason: format!("box dimensions must be positive, got {size:?}"),
            });
        }
        Ok(self.store_solid(make_box_solid(corner, size)))
    }

    fn make_sphere(&mut self, center: Point3, radius: f64) -> Result<ShapeId, KernelError> {
        if radius.is_nan() || radius <= 0.0 {
            return Err(KernelError::InvalidGeometry {
                reason: format!("sphere radius must be positive, got {radius}"),
            });
        }
        let sphere = make_sphere_solid(radius)?;
        let moved = builder::translated(&sphere, TVector::new(center[0], center[1], center[2]));
        Ok(self.store_solid(moved))
    }

    fn make_cylinder(
        &mut self,
        axis: &Axis,
        radius: f64,
        height: f64,
    ) -> Result<ShapeId, KernelError> {
        if radius.is_nan() || height.is_nan() || radius <= 0.0 || height <= 0.0 {
            return Err(KernelError::InvalidGeometry {
                reason: format!("invalid cylinder: radius {radius}, height {height}"),
            });
        }
        let placement = truck_matrix(&Transform::placement(axis)?);
        let solid = builder::transformed(&make_cylinder_solid(radius, height)?, placement);
        Ok(self.store_solid(solid))
    }

    fn make_cone(
        &mut self,
        axis: &Axis,
        bottom_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> Result<ShapeId, KernelError> {
        let invalid = [bottom_radius, top_radius, height].iter().any(|x| x.is_nan())
            || bottom_radius < 0.0
            || top_radius < 0.0
            || bottom_radius + top_radius <= 0.0
            || height <= 0.0;
        if invalid {
            return Err(KernelError::InvalidGeometry {
                reason: format!(
                    "invalid cone: radii {bottom_radius}, {top_radius}, height {height}"
                ),
            });
        }
        let placement = truck_matrix(&Transform::placement(axis)?);
        let solid = builder::transformed(
            &make_cone_solid(bottom_radius, top_radius, height)?,
            placement,
        );
        Ok(self.store_solid(solid))
    }

    fn make_compound(&mut self, parts: &[ShapeId]) -> Result<ShapeId, KernelError> {
        let items = parts
            .iter()
            .map(|&p| self.shape(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.store(TruckShape::Compound(items)))
    }

    fn transform(&mut self, shape: ShapeId, trsf: &Transform) -> Result<ShapeId, KernelError> {
        let source = self.shape(shape)?;
        let moved = transformed(&source, truck_matrix(trsf), trsf.is_mirroring());
        Ok(self.store(moved))
    }

    fn fuse(&mut self, a: ShapeId, b: ShapeId) -> Result<ShapeId, KernelError> {
        let (sa, sb) = (self.shape(a)?, self.shape(b)?);
        if sa.is_null() || sb.is_null() || self.disjoint(&sa, &sb) {
            // truck's `or` fails on operands that never touch.
            let items = [sa, sb]
                .into_iter()
                .filter(|s| !s.is_null())
                .flat_map(|s| match s {
                    TruckShape::Compound(items) => items,
                    other => vec![other],
                })
                .collect();
            return Ok(self.store(TruckShape::Compound(items)));
        }
        let result = truck_shapeops::or(&sa.single_solid()?, &sb.single_solid()?, self.boolean_tolerance)
            .ok_or_else(|| Self::boolean_failed("or"))?;
        Ok(self.store_solid(result))
    }

    fn cut(&mut self, a: ShapeId, b: ShapeId) -> Result<ShapeId, KernelError> {
        let (sa, sb) = (self.shape(a)?, self.shape(b)?);
        if sa.is_null() || sb.is_null() || self.disjoint(&sa, &sb) {
            let items = if sa.is_null() { Vec::new() } else { vec![sa] };
            return Ok(self.store(TruckShape::Compound(items)));
        }
        // Subtraction = A ∩ ¬B. not() mutates in place.
        let mut tool = sb.single_solid()?;
        tool.not();
        let result = truck_shapeops::and(&sa.single_solid()?, &tool, self.boolean_tolerance)
            .ok_or_else(|| Self::boolean_failed("and"))?;
        Ok(self.store_solid(result))
    }

    fn common(&mut self, a: ShapeId, b: ShapeId) -> Result<ShapeId, KernelError> {
        let (sa, sb) = (self.shape(a)?, self.shape(b)?);
        if sa.is_null() || sb.is_null() || self.disjoint(&sa, &sb) {
            return Ok(self.store(TruckShape::Compound(Vec::new())));
        }
        let result = truck_shapeops::and(&sa.single_solid()?, &sb.single_solid()?, self.boolean_tolerance)
            .ok_or_else(|| Self::boolean_failed("and"))?;
        Ok(self.store_solid(result))
    }

    fn unify_same_domain(&mut self, shape: ShapeId) -> Result<ShapeId, KernelError> {
        // truck_shapeops already merges faces lying on one surface.
        tracing::debug!("unify same domain: nothing to merge");
        self.shapes.detach(shape)
    }

    fn fillet(&mut self, _shape: ShapeId, _edges: &[(ShapeId, f64)]) -> Result<ShapeId, KernelError> {
        Err(KernelError::not_supported("fillet"))
    }

    fn chamfer(
        &mut self,
        _shape: ShapeId,
        _edges: &[(ShapeId, f64)],
    ) -> Result<ShapeId, KernelError> {
        Err(KernelError::not_supported("chamfer"))
    }

    fn fillet_2d(
        &mut self,
        shape: ShapeId,
        corners: &[(ShapeId, f64)],
    ) -> Result<ShapeId, KernelError> {
        let corners = corners
            .iter()
            .map(|&(v, r)| Ok((self.vertex(v)?, r)))
            .collect::<Result<Vec<_>, KernelError>>()?;
        let rounded = match self.shape(shape)? {
            TruckShape::Wire(w) => TruckShape::Wire(round_corners(&w, &corners)?),
            TruckShape::Face(f) => {
                let boundaries = f.boundaries();
                let [outer] = boundaries.as_slice() else {
                    return Err(KernelError::not_supported("corner fillet on faces with holes"));
                };
                let wire = round_corners(outer, &corners)?;
                let face = builder::try_attach_plane(&[wire]).map_err(|_| KernelError::NotPlanar)?;
                TruckShape::Face(face)
            }
            other => return Err(KernelError::wrong_kind(ShapeKind::Wire, other.kind())),
        };
        Ok(self.store(rounded))
    }

    fn clean_mesh(&mut self, shape: ShapeId) -> Result<(), KernelError> {
        for face in self.shape(shape)?.sub_shapes(ShapeKind::Face) {
            self.meshes.remove(&face.hash_code());
        }
        Ok(())
    }

    fn incremental_mesh(
        &mut self,
        shape: ShapeId,
        params: &MeshParams,
    ) -> Result<(), KernelError> {
        if params.linear_deflection.is_nan() || params.linear_deflection <= 0.0 {
            return Err(KernelError::TessellationFailed {
                reason: format!("deflection must be positive, got {}", params.linear_deflection),
            });
        }
        // truck bounds only the chordal deviation and always meshes in parallel.
        tracing::trace!(
            angular = params.angular_deflection,
            parallel = params.parallel,
            "ignored mesh parameters"
        );
        for shell in self.shape(shape)?.meshable_shells() {
            let pending = shell
                .face_iter()
                .any(|f| !self.meshes.contains_key(&TruckShape::Face(f.clone()).hash_code()));
            if !pending {
                continue;
            }
            let meshed = shell.triangulation(params.linear_deflection);
            for (face, meshed_face) in shell.face_iter().zip(meshed.face_iter()) {
                let key = TruckShape::Face(face.clone()).hash_code();
                let maybe_mesh: Option<PolygonMesh> = meshed_face.surface();
                match maybe_mesh {
                    Some(mesh) => {
                        self.meshes.entry(key).or_insert(mesh);
                    }
                    None => tracing::debug!(face = key, "truck produced no mesh for face"),
                }
            }
        }
        Ok(())
    }

    fn face_triangulation(&self, face: ShapeId) -> Result<Option<Triangulation>, KernelError> {
        let shape = self.shapes.get(face)?;
        let TruckShape::Face(f) = shape else {
            return Err(KernelError::wrong_kind(ShapeKind::Face, shape.kind()));
        };
        Ok(self
            .meshes
            .get(&shape.hash_code())
            .map(|mesh| triangulation_of(mesh, !f.orientation())))
    }

    fn discretize_edge(&self, edge: ShapeId, deflection: f64) -> Result<Vec<Point3>, KernelError> {
        if deflection.is_nan() || deflection <= 0.0 {
            return Err(KernelError::TessellationFailed {
                reason: format!("deflection must be positive, got {deflection}"),
            });
        }
        Ok(sample_edge(&self.edge(edge)?, deflection))
    }

    fn bounding_box(&self, shape: ShapeId) -> Result<BoundingBox, KernelError> {
        Ok(Self::bbox_of(self.shapes.get(shape)?))
    }

    fn volume(&self, shape: ShapeId) -> Result<f64, KernelError> {
        Ok(self
            .shapes
            .get(shape)?
            .solids()
            .iter()
            .map(|s| signed_volume(&s.triangulation(MEASURE_TOLERANCE).to_polygon()))
            .sum())
    }

    fn read_step(&mut self, _text: &str) -> Result<ShapeId, KernelError> {
        Err(KernelError::not_supported("STEP import"))
    }

    fn read_iges(&mut self, _text: &str) -> Result<ShapeId, KernelError> {
        Err(KernelError::not_supported("IGES import"))
    }

    fn write_step(&self, shape: ShapeId, file_name: &str) -> Result<String, KernelError> {
        let solid = self.shapes.get(shape)?.single_solid()?;
        let compressed = solid.compress();
        let header = StepHeaderDescriptor {
            file_name: file_name.to_owned(),
            ..Default::default()
        };
        Ok(CompleteStepDisplay::new(StepModel::from(&compressed), header).to_string())
    }
}
