use shape_types::{Point3, ShapeKind};

use crate::transform::Transform;
use crate::types::*;

/// A B-rep modeling kernel session.
///
/// Implemented by `TruckKernel` (wraps real truck) and `MockKernel`
/// (deterministic test double). Every `ShapeId` returned by a constructor or
/// an operation is an owner the caller must `release`; ids returned by
/// `explore` are views that die with their owner.
pub trait Kernel {
    /// Short backend name for diagnostics.
    fn name(&self) -> &str;

    // ── Handle bookkeeping ──

    fn kind(&self, shape: ShapeId) -> Result<ShapeKind, KernelError>;

    /// A shape is null when it has no content, e.g. an empty compound.
    fn is_null(&self, shape: ShapeId) -> Result<bool, KernelError>;

    /// Releases an owner and every view derived from it.
    fn release(&mut self, shape: ShapeId) -> Result<(), KernelError>;

    /// Creates a new owner sharing the geometry of `shape`.
    fn detach(&mut self, shape: ShapeId) -> Result<ShapeId, KernelError>;

    /// Number of owners currently alive in the session.
    fn live_shapes(&self) -> usize;

    /// Number of arena entries, owners and traversal views together.
    fn stored_shapes(&self) -> usize;

    // ── Topology ──

    /// Sub-shapes of `kind` in traversal order. Shared sub-shapes appear
    /// once per occurrence; a shape of exactly `kind` yields itself.
    fn explore(&mut self, shape: ShapeId, kind: ShapeKind) -> Result<Vec<ShapeId>, KernelError>;

    /// Identity hash of the underlying topological entity, ignoring
    /// orientation. Only meaningful within one session.
    fn hash_code(&self, shape: ShapeId) -> Result<u64, KernelError>;

    fn orientation(&self, shape: ShapeId) -> Result<Orientation, KernelError>;

    /// Whether a wire or edge closes on itself, or a shell bounds a volume.
    fn is_closed(&self, shape: ShapeId) -> Result<bool, KernelError>;

    fn vertex_point(&self, vertex: ShapeId) -> Result<Point3, KernelError>;

    // ── Construction ──

    fn make_vertex(&mut self, point: Point3) -> Result<ShapeId, KernelError>;

    /// Edges realising `curve`, in order. One edge unless the backend
    /// cannot represent the curve with a single edge.
    fn make_edges(&mut self, curve: &CurveDef) -> Result<Vec<ShapeId>, KernelError>;

    /// Chains edges into a wire, merging coincident end points.
    fn make_wire(&mut self, edges: &[ShapeId]) -> Result<ShapeId, KernelError>;

    /// Fills a closed wire. With `planar_only` the face must lie in a plane.
    fn make_face(&mut self, wire: ShapeId, planar_only: bool) -> Result<ShapeId, KernelError>;

    /// Axis-aligned box spanning `corner` to `corner + size`.
    fn make_box(&mut self, corner: Point3, size: [f64; 3]) -> Result<ShapeId, KernelError>;

    fn make_sphere(&mut self, center: Point3, radius: f64) -> Result<ShapeId, KernelError>;

    /// Cylinder whose base disc is centred on `axis.origin`.
    fn make_cylinder(&mut self, axis: &Axis, radius: f64, height: f64)
        -> Result<ShapeId, KernelError>;

    /// Truncated cone from `bottom_radius` at `axis.origin` to `top_radius`
    /// at `height`. A zero top radius gives a pointed cone.
    fn make_cone(
        &mut self,
        axis: &Axis,
        bottom_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> Result<ShapeId, KernelError>;

    fn make_compound(&mut self, parts: &[ShapeId]) -> Result<ShapeId, KernelError>;

    // ── Modification ──

    /// Copy of `shape` moved by `trsf`; the input is untouched.
    fn transform(&mut self, shape: ShapeId, trsf: &Transform) -> Result<ShapeId, KernelError>;

    fn fuse(&mut self, a: ShapeId, b: ShapeId) -> Result<ShapeId, KernelError>;

    /// `a` minus `b`.
    fn cut(&mut self, a: ShapeId, b: ShapeId) -> Result<ShapeId, KernelError>;

    fn common(&mut self, a: ShapeId, b: ShapeId) -> Result<ShapeId, KernelError>;

    /// Merges adjacent faces sharing one surface and edges sharing one curve.
    fn unify_same_domain(&mut self, shape: ShapeId) -> Result<ShapeId, KernelError>;

    /// Rounds each edge with its own radius.
    fn fillet(&mut self, shape: ShapeId, edges: &[(ShapeId, f64)]) -> Result<ShapeId, KernelError>;

    /// Bevels each edge with its own distance.
    fn chamfer(&mut self, shape: ShapeId, edges: &[(ShapeId, f64)])
        -> Result<ShapeId, KernelError>;

    /// Rounds corners of a planar face or wire. Each corner is a vertex of
    /// `shape` joining two edges. Returns a shape of the same kind.
    fn fillet_2d(
        &mut self,
        shape: ShapeId,
        corners: &[(ShapeId, f64)],
    ) -> Result<ShapeId, KernelError>;

    // ── Meshing ──

    /// Drops any triangulation cached on the faces of `shape`.
    fn clean_mesh(&mut self, shape: ShapeId) -> Result<(), KernelError>;

    /// Triangulates every face of `shape` that has no triangulation yet.
    fn incremental_mesh(&mut self, shape: ShapeId, params: &MeshParams)
        -> Result<(), KernelError>;

    /// Cached triangulation of a face, `None` when the face was not meshed.
    fn face_triangulation(&self, face: ShapeId) -> Result<Option<Triangulation>, KernelError>;

    /// Points along an edge, in edge orientation, no farther than
    /// `deflection` from the curve.
    fn discretize_edge(&self, edge: ShapeId, deflection: f64) -> Result<Vec<Point3>, KernelError>;

    // ── Measurement ──

    fn bounding_box(&self, shape: ShapeId) -> Result<BoundingBox, KernelError>;

    /// Enclosed volume of the solids in `shape`; zero for anything else.
    fn volume(&self, shape: ShapeId) -> Result<f64, KernelError>;

    // ── Data exchange ──

    fn read_step(&mut self, text: &str) -> Result<ShapeId, KernelError>;

    fn read_iges(&mut self, text: &str) -> Result<ShapeId, KernelError>;

    fn write_step(&self, shape: ShapeId, file_name: &str) -> Result<String, KernelError>;
}
