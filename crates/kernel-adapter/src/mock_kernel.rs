//! MockKernel: deterministic in-memory kernel implementing `Kernel`.
//!
//! Builds real topology (shared vertices and edges, oriented faces) over
//! polyline geometry with precomputed face meshes. Booleans only handle
//! disjoint or coincident operands and 3D fillets are topological, which is
//! enough to drive the facade and pipeline end to end in tests.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use shape_types::{Point3, ShapeKind};

use crate::arena::ShapeArena;
use crate::mock_shape::{self as topo, BlendKind, IdGen, MockShape};
use crate::traits::Kernel;
use crate::transform::Transform;
use crate::types::*;

/// How two boolean operands relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overlap {
    Disjoint,
    Coincident,
    Partial,
}

/// Deterministic test double for the geometry kernel.
#[derive(Debug)]
pub struct MockKernel {
    shapes: ShapeArena<MockShape>,
    ids: IdGen,
    /// Face node id -> deflection it was meshed at.
    meshed: HashMap<u64, f64>,
    /// Faces that refuse to mesh, to reproduce kernel anomalies.
    unmeshable: HashSet<u64>,
    boolean_tolerance: f64,
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            shapes: ShapeArena::new(),
            ids: IdGen::default(),
            meshed: HashMap::new(),
            unmeshable: HashSet::new(),
            boolean_tolerance: 0.05,
        }
    }

    pub fn with_boolean_tolerance(mut self, tolerance: f64) -> Self {
        self.boolean_tolerance = tolerance;
        self
    }

    /// Makes `face` come back without a triangulation from every later
    /// meshing run.
    pub fn suppress_triangulation(&mut self, face: ShapeId) -> Result<(), KernelError> {
        let shape = self.face(face)?;
        self.unmeshable.insert(shape.id());
        Ok(())
    }

    /// Number of faces currently holding a cached triangulation.
    pub fn cached_triangulations(&self) -> usize {
        self.meshed.len()
    }

    fn shape(&self, id: ShapeId) -> Result<MockShape, KernelError> {
        self.shapes.get(id).cloned()
    }

    fn of_kind(&self, id: ShapeId, kind: ShapeKind) -> Result<MockShape, KernelError> {
        let shape = self.shape(id)?;
        if shape.kind() != kind {
            return Err(KernelError::wrong_kind(kind, shape.kind()));
        }
        Ok(shape)
    }

    fn face(&self, id: ShapeId) -> Result<MockShape, KernelError> {
        self.of_kind(id, ShapeKind::Face)
    }

    fn store(&mut self, shape: MockShape) -> ShapeId {
        self.shapes.insert(shape)
    }

    fn bbox_of(shape: &MockShape) -> BoundingBox {
        BoundingBox::from_points(&shape.sample_points())
    }

    fn classify(&self, a: &MockShape, b: &MockShape) -> Overlap {
        if a.is_null() || b.is_null() {
            return Overlap::Disjoint;
        }
        if a.id() == b.id() {
            return Overlap::Coincident;
        }
        let (ba, bb) = (Self::bbox_of(a), Self::bbox_of(b));
        if !ba.intersects(&bb, self.boolean_tolerance) {
            return Overlap::Disjoint;
        }
        let (va, vb) = (a.volume(), b.volume());
        let same_volume = (va - vb).abs() <= 1e-9 * va.abs().max(vb.abs()).max(1.0);
        let same_faces = a.sub_shapes(ShapeKind::Face).len() == b.sub_shapes(ShapeKind::Face).len();
        if ba.approx_eq(&bb, self.boolean_tolerance) && same_volume && same_faces {
            Overlap::Coincident
        } else {
            Overlap::Partial
        }
    }

    /// Null operands have an empty extent and classify as disjoint.
    fn boolean_operands(&self, a: ShapeId, b: ShapeId) -> Result<(MockShape, MockShape), KernelError> {
        Ok((self.shape(a)?, self.shape(b)?))
    }

    fn partial_overlap(op: &str) -> KernelError {
        KernelError::not_supported(format!("{op} of partially overlapping shapes"))
    }

    /// Compound members, or the shape itself.
    fn members(shape: &MockShape) -> Vec<MockShape> {
        if shape.kind() == ShapeKind::Compound {
            shape.children()
        } else {
            vec![shape.clone()]
        }
    }

    fn node_ids(&self, pairs: &[(ShapeId, f64)]) -> Result<Vec<(u64, f64)>, KernelError> {
        pairs
            .iter()
            .map(|&(id, value)| Ok((self.shape(id)?.id(), value)))
            .collect()
    }

    fn blend(
        &mut self,
        shape: ShapeId,
        edges: &[(ShapeId, f64)],
        kind: BlendKind,
    ) -> Result<ShapeId, KernelError> {
        let source = self.shape(shape)?;
        for &(edge, _) in edges {
            self.of_kind(edge, ShapeKind::Edge)?;
        }
        let targets = self.node_ids(edges)?;
        let result = topo::blend_edges(&mut self.ids, &source, &targets, kind)?;
        Ok(self.store(result))
    }

    /// Identity of an oriented sub-shape within one owner.
    fn view_key(shape: &MockShape) -> u64 {
        let mut hasher = DefaultHasher::new();
        shape.id().hash(&mut hasher);
        shape.orientation.hash(&mut hasher);
        hasher.finish()
    }

    fn hash_u64(value: u64) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }
}

impl Kernel for MockKernel {
    fn name(&self) -> &str {
        "mock"
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
                let key = Self::view_key(&sub);
                self.shapes.insert_view(shape, key, sub)
            })
            .collect()
    }

    fn hash_code(&self, shape: ShapeId) -> Result<u64, KernelError> {
        Ok(Self::hash_u64(self.shapes.get(shape)?.id()))
    }

    fn orientation(&self, shape: ShapeId) -> Result<Orientation, KernelError> {
        Ok(self.shapes.get(shape)?.orientation)
    }

    fn is_closed(&self, shape: ShapeId) -> Result<bool, KernelError> {
        Ok(self.shapes.get(shape)?.is_closed())
    }

    fn vertex_point(&self, vertex: ShapeId) -> Result<Point3, KernelError> {
        let shape = self.shapes.get(vertex)?;
        shape
            .vertex_point()
            .ok_or_else(|| KernelError::wrong_kind(ShapeKind::Vertex, shape.kind()))
    }

    fn make_vertex(&mut self, point: Point3) -> Result<ShapeId, KernelError> {
        let v = topo::vertex(&mut self.ids, point);
        Ok(self.store(v))
    }

    fn make_edges(&mut self, curve: &CurveDef) -> Result<Vec<ShapeId>, KernelError> {
        let edge = topo::curve_edge(&mut self.ids, curve)?;
        Ok(vec![self.store(edge)])
    }

    fn make_wire(&mut self, edges: &[ShapeId]) -> Result<ShapeId, KernelError> {
        let parts = edges
            .iter()
            .map(|&e| self.of_kind(e, ShapeKind::Edge))
            .collect::<Result<Vec<_>, _>>()?;
        let wire = topo::chain_wire(&mut self.ids, &parts)?;
        Ok(self.store(wire))
    }

    fn make_face(&mut self, wire: ShapeId, planar_only: bool) -> Result<ShapeId, KernelError> {
        let boundary = self.shape(wire)?;
        let boundary = match boundary.kind() {
            ShapeKind::Wire => boundary,
            ShapeKind::Edge => topo::chain_wire(&mut self.ids, &[boundary])?,
            other => return Err(KernelError::wrong_kind(ShapeKind::Wire, other)),
        };
        // Only planar boundaries can be filled here, with or without the flag.
        tracing::trace!(planar_only, "filling wire");
        let face = topo::fill_planar(&mut self.ids, &boundary)?;
        Ok(self.store(face))
    }

    fn make_box(&mut self, corner: Point3, size: [f64; 3]) -> Result<ShapeId, KernelError> {
        let solid = topo::make_box(&mut self.ids, corner, size)?;
        Ok(self.store(solid))
    }

    fn make_sphere(&mut self, center: Point3, radius: f64) -> Result<ShapeId, KernelError> {
        let solid = topo::make_sphere(&mut self.ids, center, radius)?;
        Ok(self.store(solid))
    }

    fn make_cylinder(
        &mut self,
        axis: &Axis,
        radius: f64,
        height: f64,
    ) -> Result<ShapeId, KernelError> {
        if radius.is_nan() || radius <= 0.0 {
            return Err(KernelError::InvalidGeometry {
                reason: format!("cylinder radius must be positive, got {radius}"),
            });
        }
        let solid = topo::make_revolved(&mut self.ids, axis, radius, radius, height)?;
        Ok(self.store(solid))
    }

    fn make_cone(
        &mut self,
        axis: &Axis,
        bottom_radius: f64,
        top_radius: f64,
        height: f64,
    ) -> Result<ShapeId, KernelError> {
        let solid = topo::make_revolved(&mut self.ids, axis, bottom_radius, top_radius, height)?;
        Ok(self.store(solid))
    }

    fn make_compound(&mut self, parts: &[ShapeId]) -> Result<ShapeId, KernelError> {
        let items = parts
            .iter()
            .map(|&p| self.shape(p))
            .collect::<Result<Vec<_>, _>>()?;
        let compound = topo::compound(&mut self.ids, items);
        Ok(self.store(compound))
    }

    fn transform(&mut self, shape: ShapeId, trsf: &Transform) -> Result<ShapeId, KernelError> {
        let source = self.shape(shape)?;
        let moved = source.transformed(trsf, &mut self.ids, &mut HashMap::new());
        Ok(self.store(moved))
    }

    fn fuse(&mut self, a: ShapeId, b: ShapeId) -> Result<ShapeId, KernelError> {
        let (sa, sb) = self.boolean_operands(a, b)?;
        let result = match self.classify(&sa, &sb) {
            Overlap::Coincident => sa,
            Overlap::Disjoint => {
                let mut items = Self::members(&sa);
                items.extend(Self::members(&sb));
                topo::compound(&mut self.ids, items)
            }
            Overlap::Partial => return Err(Self::partial_overlap("fuse")),
        };
        Ok(self.store(result))
    }

    fn cut(&mut self, a: ShapeId, b: ShapeId) -> Result<ShapeId, KernelError> {
        let (sa, sb) = self.boolean_operands(a, b)?;
        let items = match self.classify(&sa, &sb) {
            Overlap::Coincident => Vec::new(),
            Overlap::Disjoint => Self::members(&sa),
            Overlap::Partial => return Err(Self::partial_overlap("cut")),
        };
        let result = topo::compound(&mut self.ids, items);
        Ok(self.store(result))
    }

    fn common(&mut self, a: ShapeId, b: ShapeId) -> Result<ShapeId, KernelError> {
        let (sa, sb) = self.boolean_operands(a, b)?;
        let items = match self.classify(&sa, &sb) {
            Overlap::Coincident => Self::members(&sa),
            Overlap::Disjoint => Vec::new(),
            Overlap::Partial => return Err(Self::partial_overlap("common")),
        };
        let result = topo::compound(&mut self.ids, items);
        Ok(self.store(result))
    }

    fn unify_same_domain(&mut self, shape: ShapeId) -> Result<ShapeId, KernelError> {
        // Mock faces never share a surface with a neighbour, so there is
        // nothing to merge.
        tracing::debug!("unify same domain: nothing to merge");
        self.shapes.detach(shape)
    }

    fn fillet(&mut self, shape: ShapeId, edges: &[(ShapeId, f64)]) -> Result<ShapeId, KernelError> {
        self.blend(shape, edges, BlendKind::Round)
    }

    fn chamfer(
        &mut self,
        shape: ShapeId,
        edges: &[(ShapeId, f64)],
    ) -> Result<ShapeId, KernelError> {
        self.blend(shape, edges, BlendKind::Flat)
    }

    fn fillet_2d(
        &mut self,
        shape: ShapeId,
        corners: &[(ShapeId, f64)],
    ) -> Result<ShapeId, KernelError> {
        let source = self.shape(shape)?;
        for &(corner, _) in corners {
            self.of_kind(corner, ShapeKind::Vertex)?;
        }
        let targets = self.node_ids(corners)?;
        let rounded = topo::fillet_corners(&mut self.ids, &source, &targets)?;
        Ok(self.store(rounded))
    }

    fn clean_mesh(&mut self, shape: ShapeId) -> Result<(), KernelError> {
        for face in self.shape(shape)?.sub_shapes(ShapeKind::Face) {
            self.meshed.remove(&face.id());
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
        for face in self.shape(shape)?.sub_shapes(ShapeKind::Face) {
            if self.unmeshable.contains(&face.id()) {
                tracing::debug!(face = face.id(), "face refuses to mesh");
                continue;
            }
            self.meshed
                .entry(face.id())
                .or_insert(params.linear_deflection);
        }
        Ok(())
    }

    fn face_triangulation(&self, face: ShapeId) -> Result<Option<Triangulation>, KernelError> {
        let face = self.face(face)?;
        if !self.meshed.contains_key(&face.id()) {
            return Ok(None);
        }
        let Some(mesh) = face.face_mesh() else {
            return Ok(None);
        };
        let sign = if face.orientation == Orientation::Reversed {
            -1.0
        } else {
            1.0
        };
        Ok(Some(Triangulation {
            nodes: mesh.nodes.clone(),
            normals: mesh
                .normals
                .iter()
                .map(|n| [n[0] * sign, n[1] * sign, n[2] * sign])
                .collect(),
            triangles: mesh.triangles.clone(),
            location: Transform::identity(),
        }))
    }

    fn discretize_edge(&self, edge: ShapeId, deflection: f64) -> Result<Vec<Point3>, KernelError> {
        let edge = self.of_kind(edge, ShapeKind::Edge)?;
        if deflection.is_nan() || deflection <= 0.0 {
            return Err(KernelError::TessellationFailed {
                reason: format!("deflection must be positive, got {deflection}"),
            });
        }
        match edge.edge_curve() {
            Some(curve) => Ok(curve.sample(deflection)),
            None => edge.edge_points().ok_or(KernelError::NullShape),
        }
    }

    fn bounding_box(&self, shape: ShapeId) -> Result<BoundingBox, KernelError> {
        Ok(Self::bbox_of(self.shapes.get(shape)?))
    }

    fn volume(&self, shape: ShapeId) -> Result<f64, KernelError> {
        Ok(self.shapes.get(shape)?.volume())
    }

    fn read_step(&mut self, _text: &str) -> Result<ShapeId, KernelError> {
        Err(KernelError::not_supported("STEP import"))
    }

    fn read_iges(&mut self, _text: &str) -> Result<ShapeId, KernelError> {
        Err(KernelError::not_supported("IGES import"))
    }

    fn write_step(&self, shape: ShapeId, file_name: &str) -> Result<String, KernelError> {
        let shape = self.shapes.get(shape)?;
        let mut seen = HashSet::new();
        let mut out = String::new();
        out.push_str("ISO-10303-21;\nHEADER;\n");
        out.push_str("FILE_DESCRIPTION(('mock kernel export'),'2;1');\n");
        out.push_str(&format!(
            "FILE_NAME('{}','',(''),(''),'','','');\n",
            file_name.replace('\'', "''")
        ));
        out.push_str("FILE_SCHEMA(('CONFIG_CONTROL_DESIGN'));\nENDSEC;\nDATA;\n");
        let mut n = 0;
        for v in shape.sub_shapes(ShapeKind::Vertex) {
            if !seen.insert(v.id()) {
                continue;
            }
            if let Some([x, y, z]) = v.vertex_point() {
                n += 1;
                out.push_str(&format!("#{n}=CARTESIAN_POINT('',({x:?},{y:?},{z:?}));\n"));
            }
        }
        out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
        Ok(out)
    }
}
