//! In-memory B-rep graph behind `MockKernel`.
//!
//! Sub-shapes are shared through `Arc`, so an edge bounding two faces is one
//! node reached along two paths. Geometry is stored as polylines sampled at a
//! fixed resolution and every face carries a precomputed mesh. Curved edges
//! also keep their exact conic or B-spline form, so edge discretization
//! follows the requested deflection.

use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;
use std::sync::Arc;

use nalgebra::{Unit, Vector3 as NVector};
use shape_types::{Point3, ShapeKind, Vector3};
use spade::handles::FixedVertexHandle;
use spade::{ConstrainedDelaunayTriangulation, Point2 as SpadePoint2, Triangulation as _};

use crate::transform::Transform;
use crate::types::{Axis, CurveDef, KernelError, Orientation};

/// Segments per full turn for circles, ellipses and revolved surfaces.
pub(crate) const SEGMENTS: usize = 32;
/// Latitude bands of a sphere.
const SPHERE_BANDS: usize = 16;
/// Samples per B-spline control segment.
const BSPLINE_SAMPLES_PER_SPAN: usize = 8;
/// Distance below which two points are the same vertex.
pub(crate) const POINT_TOL: f64 = 1e-7;

#[derive(Debug, Default)]
pub(crate) struct IdGen(u64);

impl IdGen {
    pub fn fresh(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}

/// Triangles of a face in the winding of its underlying surface, with the
/// surface normal at each node.
#[derive(Debug, Clone, Default)]
pub(crate) struct FaceMesh {
    pub nodes: Vec<Point3>,
    pub normals: Vec<Vector3>,
    pub triangles: Vec<[u32; 3]>,
}

impl FaceMesh {
    fn transformed(&self, t: &Transform) -> FaceMesh {
        let flip = t.is_mirroring();
        FaceMesh {
            nodes: self.nodes.iter().map(|p| t.transform_point(p)).collect(),
            normals: self.normals.iter().map(|n| t.transform_normal(n)).collect(),
            triangles: self
                .triangles
                .iter()
                .map(|&[a, b, c]| if flip { [a, c, b] } else { [a, b, c] })
                .collect(),
        }
    }

    /// Triangles with `orientation` applied to the winding.
    pub fn oriented_triangles(&self, orientation: Orientation) -> impl Iterator<Item = [u32; 3]> + '_ {
        let flip = orientation == Orientation::Reversed;
        self.triangles
            .iter()
            .map(move |&[a, b, c]| if flip { [b, a, c] } else { [a, b, c] })
    }

    fn average_normal(&self) -> NVector<f64> {
        let sum: NVector<f64> = self.normals.iter().map(|n| v(n)).sum();
        sum.try_normalize(1e-12).unwrap_or_else(NVector::z)
    }
}

#[derive(Debug)]
pub(crate) enum NodeData {
    Vertex {
        point: Point3,
    },
    /// `points` run from `start` to `end`; a closed edge starts and ends on
    /// the same vertex node. `curve` keeps the exact geometry of conic and
    /// B-spline edges for deflection-driven sampling.
    Edge {
        points: Vec<Point3>,
        start: MockShape,
        end: MockShape,
        curve: Option<EdgeCurve>,
    },
    Wire {
        edges: Vec<MockShape>,
    },
    Face {
        wires: Vec<MockShape>,
        mesh: FaceMesh,
    },
    Shell {
        faces: Vec<MockShape>,
    },
    Solid {
        shells: Vec<MockShape>,
    },
    CompSolid {
        solids: Vec<MockShape>,
    },
    Compound {
        items: Vec<MockShape>,
    },
}

#[derive(Debug)]
pub(crate) struct Node {
    pub id: u64,
    pub data: NodeData,
}

/// An oriented reference to a node.
#[derive(Debug, Clone)]
pub(crate) struct MockShape {
    pub node: Arc<Node>,
    pub orientation: Orientation,
}

impl MockShape {
    pub fn new(ids: &mut IdGen, data: NodeData) -> Self {
        Self {
            node: Arc::new(Node {
                id: ids.fresh(),
                data,
            }),
            orientation: Orientation::Forward,
        }
    }

    pub fn id(&self) -> u64 {
        self.node.id
    }

    pub fn with_orientation(&self, orientation: Orientation) -> Self {
        Self {
            node: self.node.clone(),
            orientation,
        }
    }

    pub fn reversed(&self) -> Self {
        self.with_orientation(self.orientation.reversed())
    }

    pub fn kind(&self) -> ShapeKind {
        match &self.node.data {
            NodeData::Vertex { .. } => ShapeKind::Vertex,
            NodeData::Edge { .. } => ShapeKind::Edge,
            NodeData::Wire { .. } => ShapeKind::Wire,
            NodeData::Face { .. } => ShapeKind::Face,
            NodeData::Shell { .. } => ShapeKind::Shell,
            NodeData::Solid { .. } => ShapeKind::Solid,
            NodeData::CompSolid { .. } => ShapeKind::CompSolid,
            NodeData::Compound { .. } => ShapeKind::Compound,
        }
    }

    pub fn is_null(&self) -> bool {
        match &self.node.data {
            NodeData::Vertex { .. } | NodeData::Edge { .. } | NodeData::Face { .. } => false,
            NodeData::Wire { edges } => edges.is_empty(),
            NodeData::Shell { faces } => faces.is_empty(),
            NodeData::Solid { shells } => shells.is_empty(),
            NodeData::CompSolid { solids } => solids.is_empty(),
            NodeData::Compound { items } => items.is_empty(),
        }
    }

    /// Direct sub-shapes with this shape's orientation composed in. Edge
    /// vertices come in traversal order.
    pub fn children(&self) -> Vec<MockShape> {
        let compose = |list: &[MockShape]| -> Vec<MockShape> {
            list.iter()
                .map(|c| c.with_orientation(c.orientation.compose(self.orientation)))
                .collect()
        };
        match &self.node.data {
            NodeData::Vertex { .. } => Vec::new(),
            NodeData::Edge { start, end, .. } => {
                if self.orientation == Orientation::Reversed {
                    vec![end.clone(), start.clone()]
                } else {
                    vec![start.clone(), end.clone()]
                }
            }
            NodeData::Wire { edges } => compose(edges),
            NodeData::Face { wires, .. } => compose(wires),
            NodeData::Shell { faces } => compose(faces),
            NodeData::Solid { shells } => compose(shells),
            NodeData::CompSolid { solids } => compose(solids),
            NodeData::Compound { items } => compose(items),
        }
    }

    /// Depth-first collection of sub-shapes of `kind`, repeats included.
    pub fn collect(&self, kind: ShapeKind, out: &mut Vec<MockShape>) {
        if self.kind() == kind {
            out.push(self.clone());
            return;
        }
        for child in self.children() {
            child.collect(kind, out);
        }
    }

    pub fn sub_shapes(&self, kind: ShapeKind) -> Vec<MockShape> {
        let mut out = Vec::new();
        self.collect(kind, &mut out);
        out
    }

    pub fn vertex_point(&self) -> Option<Point3> {
        match &self.node.data {
            NodeData::Vertex { point } => Some(*point),
            _ => None,
        }
    }

    /// Edge samples in traversal direction.
    pub fn edge_points(&self) -> Option<Vec<Point3>> {
        match &self.node.data {
            NodeData::Edge { points, .. } => {
                let mut pts = points.clone();
                if self.orientation == Orientation::Reversed {
                    pts.reverse();
                }
                Some(pts)
            }
            _ => None,
        }
    }

    /// Exact edge geometry in traversal direction, if the edge has any.
    pub fn edge_curve(&self) -> Option<EdgeCurve> {
        match &self.node.data {
            NodeData::Edge { curve: Some(c), .. } => Some(if self.orientation == Orientation::Reversed {
                c.reversed()
            } else {
                c.clone()
            }),
            _ => None,
        }
    }

    /// First and last vertex of an edge in traversal direction.
    fn edge_ends(&self) -> Option<(MockShape, MockShape)> {
        let children = self.children();
        match (self.kind(), children.as_slice()) {
            (ShapeKind::Edge, [a, b]) => Some((a.clone(), b.clone())),
            _ => None,
        }
    }

    pub fn face_mesh(&self) -> Option<&FaceMesh> {
        match &self.node.data {
            NodeData::Face { mesh, .. } => Some(mesh),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        match &self.node.data {
            NodeData::Edge { start, end, .. } => start.id() == end.id(),
            NodeData::Wire { edges } => {
                let (Some(first), Some(last)) = (edges.first(), edges.last()) else {
                    return false;
                };
                match (first.edge_ends(), last.edge_ends()) {
                    (Some((a, _)), Some((_, b))) => a.id() == b.id(),
                    _ => false,
                }
            }
            NodeData::Shell { .. } => {
                let mut uses: HashMap<u64, usize> = HashMap::new();
                for e in self.sub_shapes(ShapeKind::Edge) {
                    *uses.entry(e.id()).or_default() += 1;
                }
                !uses.is_empty() && uses.values().all(|&n| n >= 2)
            }
            NodeData::Solid { .. } => true,
            _ => false,
        }
    }

    /// Every sampled point of the shape, for extents.
    pub fn sample_points(&self) -> Vec<Point3> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.gather_points(&mut seen, &mut out);
        out
    }

    fn gather_points(&self, seen: &mut HashSet<u64>, out: &mut Vec<Point3>) {
        if !seen.insert(self.id()) {
            return;
        }
        match &self.node.data {
            NodeData::Vertex { point } => out.push(*point),
            NodeData::Edge { points, .. } => out.extend_from_slice(points),
            NodeData::Face { mesh, .. } => out.extend_from_slice(&mesh.nodes),
            _ => {}
        }
        for child in self.children() {
            child.gather_points(seen, out);
        }
    }

    /// Signed volume enclosed by the oriented faces of every solid.
    pub fn volume(&self) -> f64 {
        let mut total = 0.0;
        for solid in self.sub_shapes(ShapeKind::Solid) {
            for face in solid.sub_shapes(ShapeKind::Face) {
                let Some(mesh) = face.face_mesh() else { continue };
                for [a, b, c] in mesh.oriented_triangles(face.orientation) {
                    let (p0, p1, p2) = (
                        v(&mesh.nodes[a as usize]),
                        v(&mesh.nodes[b as usize]),
                        v(&mesh.nodes[c as usize]),
                    );
                    total += p0.dot(&p1.cross(&p2)) / 6.0;
                }
            }
        }
        total
    }

    /// Deep copy with `t` applied. Shared nodes stay shared.
    pub fn transformed(
        &self,
        t: &Transform,
        ids: &mut IdGen,
        memo: &mut HashMap<u64, Arc<Node>>,
    ) -> MockShape {
        if let Some(node) = memo.get(&self.id()) {
            return self.with_node(node.clone());
        }
        let map = |list: &[MockShape], ids: &mut IdGen, memo: &mut HashMap<u64, Arc<Node>>| {
            list.iter()
                .map(|c| c.transformed(t, ids, memo))
                .collect::<Vec<_>>()
        };
        let data = match &self.node.data {
            NodeData::Vertex { point } => NodeData::Vertex {
                point: t.transform_point(point),
            },
            NodeData::Edge {
                points,
                start,
                end,
                curve,
            } => NodeData::Edge {
                points: points.iter().map(|p| t.transform_point(p)).collect(),
                start: start.transformed(t, ids, memo),
                end: end.transformed(t, ids, memo),
                curve: curve.as_ref().map(|c| c.transformed(t)),
            },
            NodeData::Wire { edges } => NodeData::Wire {
                edges: map(edges, ids, memo),
            },
            NodeData::Face { wires, mesh } => NodeData::Face {
                wires: map(wires, ids, memo),
                mesh: mesh.transformed(t),
            },
            NodeData::Shell { faces } => NodeData::Shell {
                faces: map(faces, ids, memo),
            },
            NodeData::Solid { shells } => NodeData::Solid {
                shells: map(shells, ids, memo),
            },
            NodeData::CompSolid { solids } => NodeData::CompSolid {
                solids: map(solids, ids, memo),
            },
            NodeData::Compound { items } => NodeData::Compound {
                items: map(items, ids, memo),
            },
        };
        let node = Arc::new(Node {
            id: ids.fresh(),
            data,
        });
        memo.insert(self.id(), node.clone());
        self.with_node(node)
    }

    fn with_node(&self, node: Arc<Node>) -> MockShape {
        MockShape {
            node,
            orientation: self.orientation,
        }
    }
}

// ── Vector helpers ──

pub(crate) fn v(p: &Point3) -> NVector<f64> {
    NVector::new(p[0], p[1], p[2])
}

pub(crate) fn arr(w: NVector<f64>) -> Point3 {
    [w.x, w.y, w.z]
}

pub(crate) fn same_point(a: &Point3, b: &Point3) -> bool {
    (v(a) - v(b)).norm() <= POINT_TOL
}

fn unit(w: Vector3, what: &str) -> Result<NVector<f64>, KernelError> {
    Unit::try_new(v(&w), 1e-12)
        .map(Unit::into_inner)
        .ok_or_else(|| KernelError::InvalidGeometry {
            reason: format!("{what} has zero length"),
        })
}

/// Unit x and y axes completing `z` to a right-handed frame.
fn plane_basis(z: &NVector<f64>) -> (NVector<f64>, NVector<f64>) {
    let helper = if z.x.abs() < 0.9 {
        NVector::x()
    } else {
        NVector::y()
    };
    let x = (helper - z * z.dot(&helper)).normalize();
    let y = z.cross(&x);
    (x, y)
}

// ── Builders ──

pub(crate) fn vertex(ids: &mut IdGen, point: Point3) -> MockShape {
    MockShape::new(ids, NodeData::Vertex { point })
}

fn edge(ids: &mut IdGen, points: Vec<Point3>, start: &MockShape, end: &MockShape) -> MockShape {
    curved_edge(ids, points, start, end, None)
}

fn curved_edge(
    ids: &mut IdGen,
    points: Vec<Point3>,
    start: &MockShape,
    end: &MockShape,
    curve: Option<EdgeCurve>,
) -> MockShape {
    MockShape::new(
        ids,
        NodeData::Edge {
            points,
            start: start.clone(),
            end: end.clone(),
            curve,
        },
    )
}

fn wire(ids: &mut IdGen, edges: Vec<MockShape>) -> MockShape {
    MockShape::new(ids, NodeData::Wire { edges })
}

fn face(ids: &mut IdGen, wires: Vec<MockShape>, mesh: FaceMesh) -> MockShape {
    MockShape::new(ids, NodeData::Face { wires, mesh })
}

fn solid_from_faces(ids: &mut IdGen, faces: Vec<MockShape>) -> MockShape {
    let shell = MockShape::new(ids, NodeData::Shell { faces });
    MockShape::new(
        ids,
        NodeData::Solid {
            shells: vec![shell],
        },
    )
}

pub(crate) fn compound(ids: &mut IdGen, items: Vec<MockShape>) -> MockShape {
    MockShape::new(ids, NodeData::Compound { items })
}

/// Fixed-resolution samples of a curve definition, whether it closes, and its
/// exact geometry when it is not a straight line.
pub(crate) fn curve_points(curve: &CurveDef) -> Result<(Vec<Point3>, bool, Option<EdgeCurve>), KernelError> {
    match curve {
        CurveDef::Line { start, end } => {
            if same_point(start, end) {
                return Err(KernelError::InvalidGeometry {
                    reason: "line end points coincide".into(),
                });
            }
            Ok((vec![*start, *end], false, None))
        }
        CurveDef::Circle {
            center,
            normal,
            radius,
        } => {
            let z = unit(*normal, "circle normal")?;
            let (x, _) = plane_basis(&z);
            ellipse_curve(center, &z, &x, *radius, *radius).map(|c| (c.uniform(SEGMENTS), true, Some(c)))
        }
        CurveDef::Ellipse {
            center,
            normal,
            x_dir,
            major_radius,
            minor_radius,
        } => {
            let z = unit(*normal, "ellipse normal")?;
            let x_raw = v(x_dir);
            let x = Unit::try_new(x_raw - z * z.dot(&x_raw), 1e-9)
                .map(Unit::into_inner)
                .ok_or_else(|| KernelError::InvalidGeometry {
                    reason: "ellipse major axis is parallel to its normal".into(),
                })?;
            ellipse_curve(center, &z, &x, *major_radius, *minor_radius)
                .map(|c| (c.uniform(SEGMENTS), true, Some(c)))
        }
        CurveDef::BSpline { points, closed } => {
            if points.len() < 2 {
                return Err(KernelError::InvalidGeometry {
                    reason: "a B-spline needs at least two points".into(),
                });
            }
            let mut ctrl = points.clone();
            if *closed && !same_point(&ctrl[0], &ctrl[ctrl.len() - 1]) {
                ctrl.push(ctrl[0]);
            }
            let samples = (ctrl.len() - 1) * BSPLINE_SAMPLES_PER_SPAN;
            let curve = EdgeCurve::full(CurveForm::BSpline { ctrl });
            let mut pts = curve.uniform(samples);
            if *closed {
                let first = pts[0];
                if let Some(last) = pts.last_mut() {
                    *last = first;
                }
            }
            Ok((pts, *closed, Some(curve)))
        }
    }
}

fn ellipse_curve(
    center: &Point3,
    z: &NVector<f64>,
    x: &NVector<f64>,
    a: f64,
    b: f64,
) -> Result<EdgeCurve, KernelError> {
    if !(a > 0.0 && b > 0.0) {
        return Err(KernelError::InvalidGeometry {
            reason: format!("radii must be positive, got {a} and {b}"),
        });
    }
    let y = z.cross(x);
    Ok(EdgeCurve::full(CurveForm::Conic {
        center: *center,
        x_axis: arr(x * a),
        y_axis: arr(y * b),
    }))
}

/// Clamped uniform B-spline of degree `min(3, n - 1)` at `t` in 0..1,
/// evaluated with de Boor.
fn bspline_at(ctrl: &[Point3], t: f64) -> Point3 {
    let n = ctrl.len();
    let p = (n - 1).min(3);
    let inner = n - p - 1;
    let mut knots = vec![0.0; p + 1];
    knots.extend((1..=inner).map(|i| i as f64 / (inner + 1) as f64));
    knots.extend(std::iter::repeat(1.0).take(p + 1));

    let k = if t >= 1.0 {
        n - 1
    } else {
        (p..n).rev().find(|&k| knots[k] <= t).unwrap_or(p)
    };
    let mut d: Vec<NVector<f64>> = (0..=p).map(|j| v(&ctrl[j + k - p])).collect();
    for r in 1..=p {
        for j in (r..=p).rev() {
            let lo = knots[j + k - p];
            let hi = knots[j + 1 + k - r];
            let alpha = if (hi - lo).abs() < 1e-15 {
                0.0
            } else {
                (t - lo) / (hi - lo)
            };
            d[j] = d[j - 1] * (1.0 - alpha) + d[j] * alpha;
        }
    }
    arr(d[p])
}

#[derive(Debug, Clone)]
enum CurveForm {
    /// `center + x_axis cos(2πt) + y_axis sin(2πt)`. Affine maps keep the form.
    Conic {
        center: Point3,
        x_axis: Vector3,
        y_axis: Vector3,
    },
    /// Clamped uniform B-spline over `t` in 0..1.
    BSpline { ctrl: Vec<Point3> },
}

/// Exact geometry of an edge, walked from `t0` to `t1`.
#[derive(Debug, Clone)]
pub(crate) struct EdgeCurve {
    form: CurveForm,
    t0: f64,
    t1: f64,
}

/// Refinement depth cap for deflection sampling.
const MAX_REFINE_DEPTH: u32 = 20;

impl EdgeCurve {
    fn full(form: CurveForm) -> Self {
        Self { form, t0: 0.0, t1: 1.0 }
    }

    pub fn reversed(&self) -> Self {
        Self {
            form: self.form.clone(),
            t0: self.t1,
            t1: self.t0,
        }
    }

    fn transformed(&self, t: &Transform) -> Self {
        let form = match &self.form {
            CurveForm::Conic { center, x_axis, y_axis } => CurveForm::Conic {
                center: t.transform_point(center),
                x_axis: t.transform_vector(x_axis),
                y_axis: t.transform_vector(y_axis),
            },
            CurveForm::BSpline { ctrl } => CurveForm::BSpline {
                ctrl: ctrl.iter().map(|p| t.transform_point(p)).collect(),
            },
        };
        Self { form, ..*self }
    }

    /// Point at `s` in 0..1 along the walking direction.
    fn at(&self, s: f64) -> Point3 {
        let t = self.t0 + (self.t1 - self.t0) * s;
        match &self.form {
            CurveForm::Conic { center, x_axis, y_axis } => {
                let a = TAU * t;
                arr(v(center) + v(x_axis) * a.cos() + v(y_axis) * a.sin())
            }
            CurveForm::BSpline { ctrl } => bspline_at(ctrl, t),
        }
    }

    /// `spans + 1` evenly spaced samples.
    fn uniform(&self, spans: usize) -> Vec<Point3> {
        let mut pts: Vec<Point3> = (0..=spans).map(|k| self.at(k as f64 / spans as f64)).collect();
        self.snap_closure(&mut pts);
        pts
    }

    /// Samples whose chords stay within `deflection` of the curve.
    pub fn sample(&self, deflection: f64) -> Vec<Point3> {
        let spans = match &self.form {
            CurveForm::Conic { .. } => 4,
            CurveForm::BSpline { ctrl } => 2 * ctrl.len().saturating_sub(1).max(2),
        };
        let mut pts = vec![self.at(0.0)];
        for k in 0..spans {
            let a = k as f64 / spans as f64;
            let b = (k + 1) as f64 / spans as f64;
            self.refine((a, self.at(a)), (b, self.at(b)), deflection, MAX_REFINE_DEPTH, &mut pts);
        }
        self.snap_closure(&mut pts);
        pts
    }

    fn refine(&self, a: (f64, Point3), b: (f64, Point3), deflection: f64, depth: u32, out: &mut Vec<Point3>) {
        let m = 0.5 * (a.0 + b.0);
        let pm = self.at(m);
        if depth > 0 && segment_distance(&pm, &a.1, &b.1) > deflection {
            self.refine(a, (m, pm), deflection, depth - 1, out);
            self.refine((m, pm), b, deflection, depth - 1, out);
        } else {
            out.push(b.1);
        }
    }

    fn snap_closure(&self, pts: &mut [Point3]) {
        if let [first, .., last] = pts {
            if same_point(first, last) {
                *last = *first;
            }
        }
    }
}

fn segment_distance(p: &Point3, a: &Point3, b: &Point3) -> f64 {
    let (p, a, b) = (v(p), v(a), v(b));
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < 1e-24 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// A single edge realising `curve`.
pub(crate) fn curve_edge(ids: &mut IdGen, curve: &CurveDef) -> Result<MockShape, KernelError> {
    let (points, closed, exact) = curve_points(curve)?;
    let start = vertex(ids, points[0]);
    let end = if closed {
        start.clone()
    } else {
        vertex(ids, points[points.len() - 1])
    };
    Ok(curved_edge(ids, points, &start, &end, exact))
}

/// Chains edges end to start into a wire whose joints share vertices.
pub(crate) fn chain_wire(ids: &mut IdGen, edges: &[MockShape]) -> Result<MockShape, KernelError> {
    if edges.is_empty() {
        return Err(KernelError::EmptyWire);
    }
    let mut chains: Vec<Vec<Point3>> = Vec::with_capacity(edges.len());
    let mut curves: Vec<Option<EdgeCurve>> = Vec::with_capacity(edges.len());
    for (i, e) in edges.iter().enumerate() {
        let pts = e.edge_points().ok_or(KernelError::WrongKind {
            expected: ShapeKind::Edge,
            found: e.kind(),
        })?;
        let curve = e.edge_curve();
        if i == 0 {
            chains.push(pts);
            curves.push(curve);
            continue;
        }
        let backwards = |pts: Vec<Point3>| -> (Vec<Point3>, Option<EdgeCurve>) {
            (pts.into_iter().rev().collect(), curve.as_ref().map(EdgeCurve::reversed))
        };
        let tail = chains[i - 1][chains[i - 1].len() - 1];
        let (pts, curve) = if same_point(&pts[0], &tail) {
            (pts, curve.clone())
        } else if same_point(&pts[pts.len() - 1], &tail) {
            backwards(pts)
        } else if i == 1 && touches_head(&chains[0], &pts) {
            chains[0].reverse();
            curves[0] = curves[0].as_ref().map(EdgeCurve::reversed);
            let tail = chains[0][chains[0].len() - 1];
            if same_point(&pts[0], &tail) {
                (pts, curve.clone())
            } else {
                backwards(pts)
            }
        } else {
            return Err(KernelError::DisconnectedWire {
                reason: format!("edge {i} does not touch edge {}", i - 1),
            });
        };
        chains.push(pts);
        curves.push(curve);
    }

    let head = chains[0][0];
    let last = &chains[chains.len() - 1];
    let closed = same_point(&last[last.len() - 1], &head) && !(edges.len() == 1 && last.len() < 3);

    let mut joints: Vec<Point3> = Vec::with_capacity(chains.len() + 1);
    joints.push(head);
    for c in &chains {
        joints.push(c[c.len() - 1]);
    }
    let distinct = if closed { joints.len() - 1 } else { joints.len() };
    for i in 0..distinct {
        for j in (i + 1)..distinct {
            if same_point(&joints[i], &joints[j]) {
                return Err(KernelError::NonManifoldWire {
                    reason: format!("vertex at {:?} is visited twice", joints[i]),
                });
            }
        }
    }

    let verts: Vec<MockShape> = joints[..distinct].iter().map(|p| vertex(ids, *p)).collect();
    let mut out = Vec::with_capacity(chains.len());
    for (i, (pts, curve)) in chains.into_iter().zip(curves).enumerate() {
        let a = &verts[i];
        let b = if closed && i + 1 == distinct {
            &verts[0]
        } else {
            &verts[i + 1]
        };
        out.push(curved_edge(ids, pts, a, b, curve));
    }
    Ok(wire(ids, out))
}

fn touches_head(first: &[Point3], pts: &[Point3]) -> bool {
    let head = first[0];
    same_point(&pts[0], &head) || same_point(&pts[pts.len() - 1], &head)
}

/// Ordered boundary points of a wire without the closing repeat.
pub(crate) fn wire_loop(wire: &MockShape) -> Vec<Point3> {
    let mut out: Vec<Point3> = Vec::new();
    for e in wire.sub_shapes(ShapeKind::Edge) {
        let Some(pts) = e.edge_points() else { continue };
        for p in pts {
            if out.last().map_or(true, |last| !same_point(last, &p)) {
                out.push(p);
            }
        }
    }
    if out.len() > 1 && same_point(&out[0], &out[out.len() - 1]) {
        out.pop();
    }
    out
}

/// Fills a closed planar wire with a constrained Delaunay triangulation.
pub(crate) fn fill_planar(ids: &mut IdGen, wire_shape: &MockShape) -> Result<MockShape, KernelError> {
    if !wire_shape.is_closed() {
        return Err(KernelError::NotClosed);
    }
    let pts = wire_loop(wire_shape);
    if pts.len() < 3 {
        return Err(KernelError::InvalidGeometry {
            reason: "a face needs at least three boundary points".into(),
        });
    }

    let mut newell: NVector<f64> = NVector::zeros();
    for i in 0..pts.len() {
        let (a, b) = (v(&pts[i]), v(&pts[(i + 1) % pts.len()]));
        newell.x += (a.y - b.y) * (a.z + b.z);
        newell.y += (a.z - b.z) * (a.x + b.x);
        newell.z += (a.x - b.x) * (a.y + b.y);
    }
    let normal = newell
        .try_normalize(1e-12)
        .ok_or_else(|| KernelError::InvalidGeometry {
            reason: "boundary encloses no area".into(),
        })?;
    let origin = v(&pts[0]);
    let extent = pts
        .iter()
        .map(|p| (v(p) - origin).norm())
        .fold(0.0, f64::max);
    let tol = 1e-6 * (1.0 + extent);
    if pts.iter().any(|p| (v(p) - origin).dot(&normal).abs() > tol) {
        return Err(KernelError::NotPlanar);
    }

    let (u_dir, w_dir) = plane_basis(&normal);
    let flat: Vec<[f64; 2]> = pts
        .iter()
        .map(|p| {
            let d = v(p) - origin;
            [d.dot(&u_dir), d.dot(&w_dir)]
        })
        .collect();
    if self_intersects(&flat) {
        return Err(KernelError::SelfIntersecting);
    }

    let mut cdt = ConstrainedDelaunayTriangulation::<SpadePoint2<f64>>::new();
    let mut handles: Vec<FixedVertexHandle> = Vec::with_capacity(flat.len());
    for q in &flat {
        let h = cdt
            .insert(SpadePoint2::new(q[0], q[1]))
            .map_err(|e| KernelError::TessellationFailed {
                reason: format!("constrained triangulation: {e}"),
            })?;
        handles.push(h);
    }
    for i in 0..handles.len() {
        let (a, b) = (handles[i], handles[(i + 1) % handles.len()]);
        if a != b {
            cdt.add_constraint(a, b);
        }
    }
    let index_of: HashMap<FixedVertexHandle, u32> = handles
        .iter()
        .enumerate()
        .map(|(i, h)| (*h, i as u32))
        .collect();

    let mut triangles = Vec::new();
    for tri in cdt.inner_faces() {
        let vs = tri.vertices();
        let cx = vs.iter().map(|h| h.position().x).sum::<f64>() / 3.0;
        let cy = vs.iter().map(|h| h.position().y).sum::<f64>() / 3.0;
        if !point_in_polygon(&flat, cx, cy) {
            continue;
        }
        let mut idx = [0u32; 3];
        for (slot, h) in idx.iter_mut().zip(vs.iter()) {
            *slot = *index_of
                .get(&h.fix())
                .ok_or_else(|| KernelError::TessellationFailed {
                    reason: "triangulation introduced an unknown vertex".into(),
                })?;
        }
        triangles.push(idx);
    }

    let mesh = FaceMesh {
        normals: vec![arr(normal); pts.len()],
        nodes: pts,
        triangles,
    };
    Ok(face(ids, vec![wire_shape.clone()], mesh))
}

fn cross2(o: &[f64; 2], a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn self_intersects(poly: &[[f64; 2]]) -> bool {
    let n = poly.len();
    for i in 0..n {
        let (a, b) = (&poly[i], &poly[(i + 1) % n]);
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (c, d) = (&poly[j], &poly[(j + 1) % n]);
            let d1 = cross2(a, b, c);
            let d2 = cross2(a, b, d);
            let d3 = cross2(c, d, a);
            let d4 = cross2(c, d, b);
            if d1 * d2 < 0.0 && d3 * d4 < 0.0 {
                return true;
            }
        }
    }
    false
}

fn point_in_polygon(poly: &[[f64; 2]], x: f64, y: f64) -> bool {
    let mut inside = false;
    let n = poly.len();
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (&poly[i], &poly[j]);
        if (pi[1] > y) != (pj[1] > y) && x < (pj[0] - pi[0]) * (y - pi[1]) / (pj[1] - pi[1]) + pi[0] {
            inside = !inside;
        }
        j = i;
    }
    inside
}

// ── Primitive solids ──

/// Axis-aligned box. Faces on the low side of each axis are reversed
/// against a +axis surface normal, the way analytic kernels build them.
pub(crate) fn make_box(ids: &mut IdGen, corner: Point3, size: [f64; 3]) -> Result<MockShape, KernelError> {
    if size.iter().any(|s| !(*s > 0.0)) {
        return Err(KernelError::InvalidGeometry {
            reason: format!("box dimensions must be positive, got {size:?}"),
        });
    }
    let point = |i: usize, j: usize, k: usize| {
        [
            corner[0] + size[0] * i as f64,
            corner[1] + size[1] * j as f64,
            corner[2] + size[2] * k as f64,
        ]
    };
    let key = |i: usize, j: usize, k: usize| i * 4 + j * 2 + k;
    let verts: Vec<MockShape> = (0..8)
        .map(|n| vertex(ids, point(n / 4, (n / 2) % 2, n % 2)))
        .collect();

    let mut edges: HashMap<(usize, usize), MockShape> = HashMap::new();
    let mut add_edge = |ids: &mut IdGen, a: usize, b: usize| {
        let e = edge(
            ids,
            vec![verts[a].vertex_point().unwrap_or_default(), verts[b].vertex_point().unwrap_or_default()],
            &verts[a],
            &verts[b],
        );
        edges.insert((a, b), e);
    };
    for a in 0..2 {
        for b in 0..2 {
            add_edge(ids, key(0, a, b), key(1, a, b));
            add_edge(ids, key(a, 0, b), key(a, 1, b));
            add_edge(ids, key(a, b, 0), key(a, b, 1));
        }
    }

    // (axis, side, loop counter-clockwise about +axis)
    let quads: [(usize, usize, [(usize, usize, usize); 4]); 6] = [
        (0, 0, [(0, 0, 0), (0, 1, 0), (0, 1, 1), (0, 0, 1)]),
        (0, 1, [(1, 0, 0), (1, 1, 0), (1, 1, 1), (1, 0, 1)]),
        (1, 0, [(0, 0, 0), (0, 0, 1), (1, 0, 1), (1, 0, 0)]),
        (1, 1, [(0, 1, 0), (0, 1, 1), (1, 1, 1), (1, 1, 0)]),
        (2, 0, [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)]),
        (2, 1, [(0, 0, 1), (1, 0, 1), (1, 1, 1), (0, 1, 1)]),
    ];
    let mut faces = Vec::with_capacity(6);
    for (axis, side, corners) in quads {
        let idx: Vec<usize> = corners.iter().map(|&(i, j, k)| key(i, j, k)).collect();
        let mut loop_edges = Vec::with_capacity(4);
        for n in 0..4 {
            let (a, b) = (idx[n], idx[(n + 1) % 4]);
            let e = match (edges.get(&(a, b)), edges.get(&(b, a))) {
                (Some(e), _) => e.clone(),
                (None, Some(e)) => e.reversed(),
                (None, None) => {
                    return Err(KernelError::InvalidGeometry {
                        reason: "box corner loop is not connected".into(),
                    })
                }
            };
            loop_edges.push(e);
        }
        let mut normal = [0.0; 3];
        normal[axis] = 1.0;
        let mesh = FaceMesh {
            nodes: corners.iter().map(|&(i, j, k)| point(i, j, k)).collect(),
            normals: vec![normal; 4],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
        };
        let w = wire(ids, loop_edges);
        let f = face(ids, vec![w], mesh);
        faces.push(if side == 0 { f.reversed() } else { f });
    }
    Ok(solid_from_faces(ids, faces))
}

/// Solid of revolution between two parallel circles. A zero radius at
/// either end collapses that end to an apex.
pub(crate) fn make_revolved(
    ids: &mut IdGen,
    axis: &Axis,
    bottom_radius: f64,
    top_radius: f64,
    height: f64,
) -> Result<MockShape, KernelError> {
    if !(height > 0.0) || bottom_radius < 0.0 || top_radius < 0.0 {
        return Err(KernelError::InvalidGeometry {
            reason: format!(
                "invalid revolved solid: radii {bottom_radius}, {top_radius}, height {height}"
            ),
        });
    }
    if bottom_radius <= POINT_TOL && top_radius <= POINT_TOL {
        return Err(KernelError::InvalidGeometry {
            reason: "both radii are zero".into(),
        });
    }
    let dir = unit(axis.direction, "axis direction")?;
    if bottom_radius <= POINT_TOL {
        let top = v(&axis.origin) + dir * height;
        let flipped = Axis::new(arr(top), arr(-dir));
        return make_revolved(ids, &flipped, top_radius, 0.0, height);
    }

    let (x, y) = plane_basis(&dir);
    let base = v(&axis.origin);
    let top_center = base + dir * height;
    let ring = |center: NVector<f64>, r: f64| -> Vec<Point3> {
        let mut pts: Vec<Point3> = (0..SEGMENTS)
            .map(|k| {
                let t = TAU * k as f64 / SEGMENTS as f64;
                arr(center + x * (r * t.cos()) + y * (r * t.sin()))
            })
            .collect();
        pts.push(pts[0]);
        pts
    };
    let pointed = top_radius <= POINT_TOL;
    let bottom_pts = ring(base, bottom_radius);
    let top_pts = if pointed {
        vec![arr(top_center)]
    } else {
        ring(top_center, top_radius)
    };

    let vb = vertex(ids, bottom_pts[0]);
    let vt = vertex(ids, top_pts[0]);
    let rim = |center: NVector<f64>, r: f64| ellipse_curve(&arr(center), &dir, &x, r, r).ok();
    let bottom_edge = curved_edge(ids, bottom_pts.clone(), &vb, &vb, rim(base, bottom_radius));
    let seam = edge(ids, vec![bottom_pts[0], top_pts[0]], &vb, &vt);

    // Surface normal of the lateral face at angle t.
    let slope = bottom_radius - top_radius;
    let lateral_normal = |t: f64| -> Vector3 {
        let radial = x * t.cos() + y * t.sin();
        arr((radial * height + dir * slope).normalize())
    };

    let mut lateral = FaceMesh::default();
    for k in 0..SEGMENTS {
        let t = TAU * k as f64 / SEGMENTS as f64;
        lateral.nodes.push(bottom_pts[k]);
        lateral.normals.push(lateral_normal(t));
    }
    if pointed {
        for k in 0..SEGMENTS {
            let t = TAU * (k as f64 + 0.5) / SEGMENTS as f64;
            lateral.nodes.push(top_pts[0]);
            lateral.normals.push(lateral_normal(t));
        }
    } else {
        for k in 0..SEGMENTS {
            let t = TAU * k as f64 / SEGMENTS as f64;
            lateral.nodes.push(top_pts[k]);
            lateral.normals.push(lateral_normal(t));
        }
    }
    let n = SEGMENTS as u32;
    for k in 0..n {
        let k1 = (k + 1) % n;
        if pointed {
            lateral.triangles.push([k, k1, n + k]);
        } else {
            lateral.triangles.push([k, k1, n + k1]);
            lateral.triangles.push([k, n + k1, n + k]);
        }
    }

    let disc = |pts: &[Point3], center: NVector<f64>| -> FaceMesh {
        let mut mesh = FaceMesh::default();
        mesh.nodes.push(arr(center));
        mesh.nodes.extend_from_slice(&pts[..SEGMENTS]);
        mesh.normals = vec![arr(dir); SEGMENTS + 1];
        for k in 0..n {
            mesh.triangles.push([0, 1 + k, 1 + (k + 1) % n]);
        }
        mesh
    };

    let mut faces = Vec::with_capacity(3);
    if pointed {
        let lateral_wire = wire(ids, vec![bottom_edge.clone(), seam.clone(), seam.reversed()]);
        faces.push(face(ids, vec![lateral_wire], lateral));
    } else {
        let top_edge = curved_edge(ids, top_pts.clone(), &vt, &vt, rim(top_center, top_radius));
        let lateral_wire = wire(
            ids,
            vec![
                bottom_edge.clone(),
                seam.clone(),
                top_edge.reversed(),
                seam.reversed(),
            ],
        );
        faces.push(face(ids, vec![lateral_wire], lateral));
        let top_wire = wire(ids, vec![top_edge]);
        let top_mesh = disc(&top_pts, top_center);
        faces.push(face(ids, vec![top_wire], top_mesh));
    }
    let bottom_wire = wire(ids, vec![bottom_edge]);
    let bottom_mesh = disc(&bottom_pts, base);
    faces.push(face(ids, vec![bottom_wire], bottom_mesh).reversed());

    Ok(solid_from_faces(ids, faces))
}

/// UV sphere with a single face bounded by a meridian seam.
pub(crate) fn make_sphere(ids: &mut IdGen, center: Point3, radius: f64) -> Result<MockShape, KernelError> {
    if !(radius > 0.0) {
        return Err(KernelError::InvalidGeometry {
            reason: format!("sphere radius must be positive, got {radius}"),
        });
    }
    let c = v(&center);
    let at = |lat: f64, lon: f64| -> NVector<f64> {
        NVector::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
    };
    let lat_of = |i: usize| -std::f64::consts::FRAC_PI_2 + std::f64::consts::PI * i as f64 / SPHERE_BANDS as f64;

    let meridian: Vec<Point3> = (0..=SPHERE_BANDS)
        .map(|i| arr(c + at(lat_of(i), 0.0) * radius))
        .collect();
    let south = vertex(ids, meridian[0]);
    let north = vertex(ids, meridian[SPHERE_BANDS]);
    let seam = edge(ids, meridian, &south, &north);

    let mut mesh = FaceMesh::default();
    for i in 0..=SPHERE_BANDS {
        for j in 0..SEGMENTS {
            let dir = at(lat_of(i), TAU * j as f64 / SEGMENTS as f64);
            mesh.nodes.push(arr(c + dir * radius));
            mesh.normals.push(arr(dir));
        }
    }
    let cols = SEGMENTS as u32;
    let idx = |i: usize, j: u32| i as u32 * cols + j % cols;
    for i in 0..SPHERE_BANDS {
        for j in 0..cols {
            if i != 0 {
                mesh.triangles.push([idx(i, j), idx(i, j + 1), idx(i + 1, j + 1)]);
            }
            if i + 1 != SPHERE_BANDS {
                mesh.triangles.push([idx(i, j), idx(i + 1, j + 1), idx(i + 1, j)]);
            }
        }
    }

    let w = wire(ids, vec![seam.clone(), seam.reversed()]);
    let f = face(ids, vec![w], mesh);
    Ok(solid_from_faces(ids, vec![f]))
}

// ── Edge blending ──

/// How a blended edge is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlendKind {
    Round,
    Flat,
}

/// Replaces every blendable edge by two boundary edges and a blend face
/// between them. The adjacent faces keep their geometry; the blend is
/// topological.
pub(crate) fn blend_edges(
    ids: &mut IdGen,
    shape: &MockShape,
    edges: &[(u64, f64)],
    kind: BlendKind,
) -> Result<MockShape, KernelError> {
    // edge id -> (face id, shell id, oriented face) for each face using it
    let mut uses: HashMap<u64, Vec<(u64, u64, MockShape)>> = HashMap::new();
    for shell in shape.sub_shapes(ShapeKind::Shell) {
        for f in shell.sub_shapes(ShapeKind::Face) {
            for e in f.sub_shapes(ShapeKind::Edge) {
                uses.entry(e.id())
                    .or_default()
                    .push((f.id(), shell.id(), f.clone()));
            }
        }
    }

    let mut replacements: HashMap<(u64, u64), MockShape> = HashMap::new();
    let mut blends: HashMap<u64, Vec<MockShape>> = HashMap::new();
    let all_edges: HashMap<u64, MockShape> = shape
        .sub_shapes(ShapeKind::Edge)
        .into_iter()
        .map(|e| (e.id(), e))
        .collect();

    for &(edge_id, size) in edges {
        if !(size > 0.0) {
            return Err(KernelError::FilletFailed {
                reason: format!("blend size must be positive, got {size}"),
            });
        }
        let original = all_edges.get(&edge_id).ok_or_else(|| KernelError::FilletFailed {
            reason: "edge is not part of the shape".into(),
        })?;
        let occurrences = uses.get(&edge_id).map(Vec::as_slice).unwrap_or(&[]);
        let mut faces: Vec<&(u64, u64, MockShape)> = Vec::new();
        for occ in occurrences {
            if !faces.iter().any(|f| f.0 == occ.0) {
                faces.push(occ);
            }
        }
        match faces.len() {
            0 | 1 if occurrences.len() >= 2 => {
                tracing::debug!(edge = edge_id, "skipping seam edge");
                continue;
            }
            2 => {}
            n => {
                return Err(KernelError::FilletFailed {
                    reason: format!("edge is shared by {n} faces"),
                })
            }
        }

        let NodeData::Edge {
            points,
            start,
            end,
            curve,
        } = &original.node.data
        else {
            continue;
        };
        let first = curved_edge(ids, points.clone(), start, end, curve.clone());
        let second = curved_edge(ids, points.clone(), start, end, curve.clone());
        replacements.insert((faces[0].0, edge_id), first.clone());
        replacements.insert((faces[1].0, edge_id), second.clone());

        let n0 = faces[0].2.face_mesh().map(FaceMesh::average_normal).unwrap_or_else(NVector::z);
        let n1 = faces[1].2.face_mesh().map(FaceMesh::average_normal).unwrap_or_else(NVector::z);
        let sign = |f: &MockShape| if f.orientation == Orientation::Reversed { -1.0 } else { 1.0 };
        let outward = (n0 * sign(&faces[0].2) + n1 * sign(&faces[1].2))
            .try_normalize(1e-12)
            .unwrap_or_else(NVector::z);
        let mut mesh = FaceMesh::default();
        let count = points.len() as u32;
        mesh.nodes.extend_from_slice(points);
        mesh.nodes.extend_from_slice(points);
        mesh.normals = vec![arr(outward); points.len() * 2];
        for k in 0..count.saturating_sub(1) {
            mesh.triangles.push([k, k + 1, count + k + 1]);
            mesh.triangles.push([k, count + k + 1, count + k]);
        }
        let w = wire(ids, vec![first, second.reversed()]);
        let blend = face(ids, vec![w], mesh);
        tracing::debug!(edge = edge_id, ?kind, size, "blended edge");
        blends.entry(faces[0].1).or_default().push(blend);
    }

    if replacements.is_empty() {
        return Err(KernelError::FilletFailed {
            reason: "none of the selected edges can be blended".into(),
        });
    }
    Ok(rebuild(ids, shape, None, &replacements, &blends).unwrap_or_else(|| shape.clone()))
}

/// Rebuilds the parts of `shape` touched by the replacements. Returns `None`
/// when nothing below `shape` changed.
fn rebuild(
    ids: &mut IdGen,
    shape: &MockShape,
    face_id: Option<u64>,
    replacements: &HashMap<(u64, u64), MockShape>,
    blends: &HashMap<u64, Vec<MockShape>>,
) -> Option<MockShape> {
    let walk = |list: &[MockShape], face_id: Option<u64>, ids: &mut IdGen| -> Option<Vec<MockShape>> {
        let mut changed = false;
        let out: Vec<MockShape> = list
            .iter()
            .map(|c| match rebuild(ids, c, face_id, replacements, blends) {
                Some(n) => {
                    changed = true;
                    n
                }
                None => c.clone(),
            })
            .collect();
        changed.then_some(out)
    };
    let data = match &shape.node.data {
        NodeData::Vertex { .. } => return None,
        NodeData::Edge { .. } => {
            let fid = face_id?;
            let replacement = replacements.get(&(fid, shape.id()))?;
            return Some(replacement.with_orientation(shape.orientation));
        }
        NodeData::Wire { edges } => NodeData::Wire {
            edges: walk(edges, face_id, ids)?,
        },
        NodeData::Face { wires, mesh } => NodeData::Face {
            wires: walk(wires, Some(shape.id()), ids)?,
            mesh: mesh.clone(),
        },
        NodeData::Shell { faces } => {
            let extra = blends.get(&shape.id());
            let rebuilt = walk(faces, None, ids);
            if rebuilt.is_none() && extra.is_none() {
                return None;
            }
            let mut faces = rebuilt.unwrap_or_else(|| faces.clone());
            faces.extend(extra.into_iter().flatten().cloned());
            NodeData::Shell { faces }
        }
        NodeData::Solid { shells } => NodeData::Solid {
            shells: walk(shells, None, ids)?,
        },
        NodeData::CompSolid { solids } => NodeData::CompSolid {
            solids: walk(solids, None, ids)?,
        },
        NodeData::Compound { items } => NodeData::Compound {
            items: walk(items, None, ids)?,
        },
    };
    Some(MockShape::new(ids, data).with_orientation(shape.orientation))
}

// ── Planar corner rounding ──

/// Boundary of a polyline wire: its vertices in order and whether it closes.
fn polyline(wire_shape: &MockShape) -> Result<(Vec<MockShape>, bool), KernelError> {
    let edges = wire_shape.sub_shapes(ShapeKind::Edge);
    let mut verts: Vec<MockShape> = Vec::with_capacity(edges.len() + 1);
    for e in &edges {
        if e.edge_points().map_or(0, |p| p.len()) != 2 {
            return Err(KernelError::not_supported("corner fillet on curved edges"));
        }
        let (a, b) = e.edge_ends().ok_or(KernelError::EmptyWire)?;
        if verts.is_empty() {
            verts.push(a);
        }
        verts.push(b);
    }
    if verts.is_empty() {
        return Err(KernelError::EmptyWire);
    }
    let closed = wire_shape.is_closed();
    if closed {
        verts.pop();
    }
    Ok((verts, closed))
}

/// Rounds the selected corners of a planar polyline wire or face.
pub(crate) fn fillet_corners(
    ids: &mut IdGen,
    shape: &MockShape,
    corners: &[(u64, f64)],
) -> Result<MockShape, KernelError> {
    let boundary = match shape.kind() {
        ShapeKind::Wire => shape.clone(),
        ShapeKind::Face => {
            let wires = shape.sub_shapes(ShapeKind::Wire);
            match wires.as_slice() {
                [w] => w.clone(),
                _ => return Err(KernelError::not_supported("corner fillet on faces with holes")),
            }
        }
        other => return Err(KernelError::wrong_kind(ShapeKind::Wire, other)),
    };
    let (verts, closed) = polyline(&boundary)?;
    let pts: Vec<Point3> = verts
        .iter()
        .map(|v| v.vertex_point().unwrap_or_default())
        .collect();
    let n = pts.len();

    let mut radii: Vec<Option<f64>> = vec![None; n];
    for &(vid, r) in corners {
        let pos = verts
            .iter()
            .position(|v| v.id() == vid)
            .ok_or_else(|| KernelError::FilletFailed {
                reason: "vertex is not on the boundary".into(),
            })?;
        if !closed && (pos == 0 || pos == n - 1) {
            return Err(KernelError::FilletFailed {
                reason: "an end vertex of an open wire is not a corner".into(),
            });
        }
        radii[pos] = Some(r);
    }

    let mut arcs = Vec::with_capacity(n);
    for i in 0..n {
        let arc = match radii[i] {
            Some(r) => {
                let prev = &pts[(i + n - 1) % n];
                let next = &pts[(i + 1) % n];
                Some(crate::corner::fillet_corner(prev, &pts[i], next, r)?)
            }
            None => None,
        };
        arcs.push(arc);
    }
    let segments = if closed { n } else { n - 1 };
    for i in 0..segments {
        let j = (i + 1) % n;
        let length = (v(&pts[j]) - v(&pts[i])).norm();
        let used = arcs[i].as_ref().map_or(0.0, |a| a.setback)
            + arcs[j].as_ref().map_or(0.0, |a| a.setback);
        if used > length + POINT_TOL {
            return Err(KernelError::FilletFailed {
                reason: format!("fillets overlap on segment {i}"),
            });
        }
    }

    // Straight runs and arcs as point chains, in boundary order.
    let mut chains: Vec<Vec<Point3>> = Vec::new();
    for i in 0..segments {
        let j = (i + 1) % n;
        let from = arcs[i].as_ref().map_or(pts[i], |a| a.end);
        let to = arcs[j].as_ref().map_or(pts[j], |a| a.start);
        if !same_point(&from, &to) {
            chains.push(vec![from, to]);
        }
        if let Some(arc) = &arcs[j] {
            if closed || j != 0 {
                chains.push(arc.points.clone());
            }
        }
    }
    let mut new_edges = Vec::with_capacity(chains.len());
    for chain in chains {
        let a = vertex(ids, chain[0]);
        let b = vertex(ids, chain[chain.len() - 1]);
        new_edges.push(edge(ids, chain, &a, &b));
    }
    let rounded = chain_wire(ids, &new_edges)?;
    match shape.kind() {
        ShapeKind::Face => Ok(fill_planar(ids, &rounded)?.with_orientation(shape.orientation)),
        _ => Ok(rounded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn distinct(shape: &MockShape, kind: ShapeKind) -> usize {
        let ids: HashSet<u64> = shape.sub_shapes(kind).iter().map(MockShape::id).collect();
        ids.len()
    }

    #[test]
    fn box_topology_and_volume() {
        let mut ids = IdGen::default();
        let b = make_box(&mut ids, [0.0; 3], [1.0, 2.0, 3.0]).unwrap();
        assert_eq!(distinct(&b, ShapeKind::Face), 6);
        assert_eq!(distinct(&b, ShapeKind::Edge), 12);
        assert_eq!(distinct(&b, ShapeKind::Vertex), 8);
        assert_eq!(b.sub_shapes(ShapeKind::Edge).len(), 24);
        assert_relative_eq!(b.volume(), 6.0, epsilon = 1e-9);
        let shell = &b.sub_shapes(ShapeKind::Shell)[0];
        assert!(shell.is_closed());
    }

    #[test]
    fn box_wires_are_closed() {
        let mut ids = IdGen::default();
        let b = make_box(&mut ids, [0.0; 3], [1.0; 3]).unwrap();
        for w in b.sub_shapes(ShapeKind::Wire) {
            assert!(w.is_closed());
            assert_eq!(wire_loop(&w).len(), 4);
        }
    }

    #[test]
    fn cylinder_topology() {
        let mut ids = IdGen::default();
        let c = make_revolved(&mut ids, &Axis::z(), 1.0, 1.0, 2.0).unwrap();
        assert_eq!(distinct(&c, ShapeKind::Face), 3);
        assert_eq!(distinct(&c, ShapeKind::Edge), 3);
        assert_eq!(distinct(&c, ShapeKind::Vertex), 2);
        let exact = std::f64::consts::PI * 2.0;
        let polygon = 0.5 * SEGMENTS as f64 * (TAU / SEGMENTS as f64).sin() * 2.0;
        assert_relative_eq!(c.volume(), polygon, epsilon = 1e-9);
        assert!(c.volume() < exact);
    }

    #[test]
    fn pointed_cone_has_two_faces() {
        let mut ids = IdGen::default();
        let c = make_revolved(&mut ids, &Axis::z(), 1.0, 0.0, 3.0).unwrap();
        assert_eq!(distinct(&c, ShapeKind::Face), 2);
        assert_eq!(distinct(&c, ShapeKind::Edge), 2);
        assert!(c.volume() > 0.0);
    }

    #[test]
    fn sphere_volume_is_positive() {
        let mut ids = IdGen::default();
        let s = make_sphere(&mut ids, [1.0, 1.0, 1.0], 2.0).unwrap();
        let exact = 4.0 / 3.0 * std::f64::consts::PI * 8.0;
        assert!(s.volume() > 0.9 * exact && s.volume() < exact);
    }

    #[test]
    fn mirrored_box_keeps_positive_volume() {
        let mut ids = IdGen::default();
        let b = make_box(&mut ids, [0.0; 3], [1.0, 2.0, 3.0]).unwrap();
        let m = Transform::mirror([0.0; 3], [1.0, 0.0, 0.0]).unwrap();
        let mirrored = b.transformed(&m, &mut ids, &mut HashMap::new());
        assert_relative_eq!(mirrored.volume(), 6.0, epsilon = 1e-9);
        assert_eq!(distinct(&mirrored, ShapeKind::Vertex), 8);
    }

    #[test]
    fn chain_wire_merges_coincident_points() {
        let mut ids = IdGen::default();
        let pts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
        let edges: Vec<MockShape> = (0..3)
            .map(|i| {
                curve_edge(
                    &mut ids,
                    &CurveDef::Line {
                        start: pts[i],
                        end: pts[(i + 1) % 3],
                    },
                )
                .unwrap()
            })
            .collect();
        let w = chain_wire(&mut ids, &edges).unwrap();
        assert!(w.is_closed());
        assert_eq!(distinct(&w, ShapeKind::Vertex), 3);
    }

    #[test]
    fn chain_wire_reports_gaps() {
        let mut ids = IdGen::default();
        let a = curve_edge(
            &mut ids,
            &CurveDef::Line {
                start: [0.0; 3],
                end: [1.0, 0.0, 0.0],
            },
        )
        .unwrap();
        let b = curve_edge(
            &mut ids,
            &CurveDef::Line {
                start: [5.0, 0.0, 0.0],
                end: [6.0, 0.0, 0.0],
            },
        )
        .unwrap();
        assert!(matches!(
            chain_wire(&mut ids, &[a, b]),
            Err(KernelError::DisconnectedWire { .. })
        ));
        assert!(matches!(chain_wire(&mut ids, &[]), Err(KernelError::EmptyWire)));
    }

    #[test]
    fn concave_face_is_triangulated_inside_only() {
        let mut ids = IdGen::default();
        let outline = [
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 2.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 2.0, 0.0],
        ];
        let edges: Vec<MockShape> = (0..outline.len())
            .map(|i| {
                curve_edge(
                    &mut ids,
                    &CurveDef::Line {
                        start: outline[i],
                        end: outline[(i + 1) % outline.len()],
                    },
                )
                .unwrap()
            })
            .collect();
        let w = chain_wire(&mut ids, &edges).unwrap();
        let f = fill_planar(&mut ids, &w).unwrap();
        let mesh = f.face_mesh().unwrap();
        assert_eq!(mesh.triangles.len(), 3);
        let area: f64 = mesh
            .triangles
            .iter()
            .map(|&[a, b, c]| {
                let (p0, p1, p2) = (
                    v(&mesh.nodes[a as usize]),
                    v(&mesh.nodes[b as usize]),
                    v(&mesh.nodes[c as usize]),
                );
                0.5 * (p1 - p0).cross(&(p2 - p0)).z
            })
            .sum();
        assert_relative_eq!(area, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn bowtie_is_self_intersecting() {
        let mut ids = IdGen::default();
        let outline = [
            [0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let edges: Vec<MockShape> = (0..4)
            .map(|i| {
                curve_edge(
                    &mut ids,
                    &CurveDef::Line {
                        start: outline[i],
                        end: outline[(i + 1) % 4],
                    },
                )
                .unwrap()
            })
            .collect();
        let w = chain_wire(&mut ids, &edges).unwrap();
        assert!(matches!(
            fill_planar(&mut ids, &w),
            Err(KernelError::SelfIntersecting)
        ));
    }

    #[test]
    fn bspline_interpolates_end_points() {
        let ctrl = vec![[0.0, 0.0, 0.0], [1.0, 2.0, 0.0], [3.0, 2.0, 0.0], [4.0, 0.0, 0.0], [5.0, 1.0, 0.0]];
        let (pts, closed, _) = curve_points(&CurveDef::BSpline {
            points: ctrl.clone(),
            closed: false,
        })
        .unwrap();
        assert!(!closed);
        assert!(same_point(&pts[0], &ctrl[0]));
        assert!(same_point(&pts[pts.len() - 1], &ctrl[4]));
    }

    #[test]
    fn cylinder_blend_skips_seam() {
        let mut ids = IdGen::default();
        let c = make_revolved(&mut ids, &Axis::z(), 1.0, 1.0, 2.0).unwrap();
        let edges: Vec<(u64, f64)> = c
            .sub_shapes(ShapeKind::Edge)
            .iter()
            .map(MockShape::id)
            .collect::<HashSet<_>>()
            .into_iter()
            .map(|id| (id, 0.2))
            .collect();
        let blended = blend_edges(&mut ids, &c, &edges, BlendKind::Round).unwrap();
        assert_eq!(distinct(&blended, ShapeKind::Face), 5);
        assert_eq!(distinct(&blended, ShapeKind::Edge), 5);
        let shell = &blended.sub_shapes(ShapeKind::Shell)[0];
        assert!(shell.is_closed());
    }

    #[test]
    fn rounding_a_square_adds_arcs() {
        let mut ids = IdGen::default();
        let b = make_box(&mut ids, [0.0; 3], [2.0; 3]).unwrap();
        let top = b.sub_shapes(ShapeKind::Face)[5].clone();
        let corners: Vec<(u64, f64)> = polyline(&top.sub_shapes(ShapeKind::Wire)[0])
            .unwrap()
            .0
            .iter()
            .map(|v| (v.id(), 0.5))
            .collect();
        let rounded = fillet_corners(&mut ids, &top, &corners).unwrap();
        assert_eq!(rounded.kind(), ShapeKind::Face);
        assert_eq!(distinct(&rounded, ShapeKind::Edge), 8);
    }
}
