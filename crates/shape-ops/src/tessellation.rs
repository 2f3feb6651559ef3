//! Shape to render mesh: per-face buffers plus the edges no face owns.

use std::collections::HashSet;

use kernel_adapter::{MeshParams, Orientation, Transform};
use shape_types::{FaceTessellation, FreeEdgePolyline, MeshResult, ShapeKind};
use tracing::{debug, instrument, warn};

use crate::context::KernelContext;
use crate::error::OpError;
use crate::handle::{ShapeHandle, ShapeRef, ShapeView};

/// Turns the kernel's Y-up frame into the renderer's Z-up frame: a quarter
/// turn back about X followed by a reflection through the XY plane.
pub fn y_to_z() -> Result<Transform, OpError> {
    let rotate = Transform::rotation_axis_angle([1.0, 0.0, 0.0], (-90.0f64).to_radians())
        .map_err(OpError::kernel("y_to_z"))?;
    let mirror = Transform::mirror([0.0; 3], [0.0, 0.0, 1.0]).map_err(OpError::kernel("y_to_z"))?;
    Ok(rotate.then(&mirror))
}

pub struct TessellationPipeline<'c> {
    ctx: &'c mut KernelContext,
}

impl<'c> TessellationPipeline<'c> {
    pub fn new(ctx: &'c mut KernelContext) -> Self {
        Self { ctx }
    }

    /// Meshes `shape` for rendering.
    ///
    /// A missing or non-positive `max_deviation` falls back to the session's
    /// default tolerance. Each call re-meshes from scratch and leaves no
    /// triangulation or temporary shape behind.
    #[instrument(skip(self, shape))]
    pub fn shape_to_mesh(
        &mut self,
        shape: &impl ShapeRef,
        max_deviation: Option<f64>,
        adjust_y_to_z: bool,
    ) -> Result<MeshResult, OpError> {
        self.ctx.require_shape(shape, "shape to mesh")?;
        let deviation = max_deviation
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(self.ctx.config().default_tolerance);

        let work = if adjust_y_to_z {
            let trsf = y_to_z()?;
            self.ctx.transforms().apply(shape, &trsf)?
        } else {
            self.ctx.detach(shape)?
        };
        let mesh = self.mesh(&work, deviation);
        if let Err(e) = self.ctx.kernel_mut().clean_mesh(work.id()) {
            warn!(error = %e, "failed to drop triangulations");
        }
        let released = self.ctx.release(work);
        let mesh = mesh?;
        released?;
        debug!(
            faces = mesh.face_list.len(),
            free_edges = mesh.edge_list.len(),
            triangles = mesh.triangle_count(),
            "shape meshed"
        );
        Ok(mesh)
    }

    fn mesh(&mut self, work: &ShapeHandle, deviation: f64) -> Result<MeshResult, OpError> {
        let config = self.ctx.config();
        let params = MeshParams {
            linear_deflection: deviation,
            angular_deflection: config.angular_deflection,
            parallel: config.parallel_meshing,
        };
        let kernel = self.ctx.kernel_mut();
        kernel.clean_mesh(work.id()).map_err(OpError::kernel("clean_mesh"))?;
        kernel
            .incremental_mesh(work.id(), &params)
            .map_err(OpError::kernel("incremental_mesh"))?;

        let mut result = MeshResult::default();
        let mut seen = HashSet::new();
        let faces = self.ctx.explorer().sub_shapes(work, ShapeKind::Face)?;
        for face in faces {
            if let Some(tess) = self.face_buffers(face, &mut seen)? {
                result.face_list.push(tess);
            }
        }

        for edge in self.ctx.explorer().edges(work)? {
            let hash = self
                .ctx
                .kernel()
                .hash_code(edge.id())
                .map_err(OpError::kernel("hash_code"))?;
            if seen.contains(&hash) {
                continue;
            }
            let points = self
                .ctx
                .kernel()
                .discretize_edge(edge.id(), deviation)
                .map_err(OpError::kernel("discretize_edge"))?;
            result.edge_list.push(FreeEdgePolyline {
                edge_index: edge.index(),
                vertex_coord: points,
            });
        }
        Ok(result)
    }

    /// Buffers for one face, recording the hashes of its boundary edges in
    /// `seen`. `None` when the kernel left the face without a triangulation.
    fn face_buffers(
        &mut self,
        face: ShapeView<'_>,
        seen: &mut HashSet<u64>,
    ) -> Result<Option<FaceTessellation>, OpError> {
        let kernel = self.ctx.kernel();
        let Some(tri) = kernel
            .face_triangulation(face.id())
            .map_err(OpError::kernel("face_triangulation"))?
        else {
            warn!(face = face.index(), "face has no triangulation, skipping");
            return Ok(None);
        };
        let reversed = kernel
            .orientation(face.id())
            .map_err(OpError::kernel("orientation"))?
            == Orientation::Reversed;

        let mut tess = FaceTessellation {
            face_index: face.index(),
            number_of_triangles: tri.triangles.len(),
            ..Default::default()
        };
        tess.vertex_coord.reserve(tri.nodes.len() * 3);
        for node in &tri.nodes {
            let p = tri.location.transform_point(node);
            tess.vertex_coord.extend(p.iter().map(|c| *c as f32));
        }
        tess.normal_coord.reserve(tri.normals.len() * 3);
        for normal in &tri.normals {
            let n = tri.location.transform_normal(normal);
            tess.normal_coord.extend(n.iter().map(|c| *c as f32));
        }
        tess.tri_indexes.reserve(tri.triangles.len() * 3);
        for &[a, b, c] in &tri.triangles {
            if reversed {
                tess.tri_indexes.extend([b, a, c]);
            } else {
                tess.tri_indexes.extend([a, b, c]);
            }
        }

        for edge in self.ctx.explorer().sub_shapes(&face, ShapeKind::Edge)? {
            let hash = self
                .ctx
                .kernel()
                .hash_code(edge.id())
                .map_err(OpError::kernel("hash_code"))?;
            seen.insert(hash);
        }
        Ok(Some(tess))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Specificity;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_mesh_has_no_free_edges() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(2.0, 2.0, 2.0, [0.0; 3]).unwrap();
        let mesh = ctx.tessellator().shape_to_mesh(&cube, Some(0.1), false).unwrap();
        assert_eq!(mesh.face_list.len(), 6);
        assert!(mesh.edge_list.is_empty());
        assert_eq!(mesh.triangle_count(), 12);
        for face in &mesh.face_list {
            assert_eq!(face.tri_indexes.len(), face.number_of_triangles * 3);
            assert_eq!(face.vertex_coord.len(), face.normal_coord.len());
        }
        ctx.release(cube).unwrap();
        assert_eq!(ctx.live_shapes(), 0);
    }

    #[test]
    fn test_wire_is_all_free_edges() {
        let mut ctx = KernelContext::mock();
        let pts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
        let wire = ctx
            .primitives()
            .polygon(&pts, Specificity::Wire)
            .unwrap()
            .into_shape()
            .unwrap();
        let mesh = ctx.tessellator().shape_to_mesh(&wire, None, false).unwrap();
        assert!(mesh.face_list.is_empty());
        let indexes: Vec<usize> = mesh.edge_list.iter().map(|e| e.edge_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(mesh.edge_list[0].vertex_coord.len(), 2);
        ctx.release(wire).unwrap();
    }

    #[test]
    fn test_reversed_faces_wind_outward() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(2.0, 2.0, 2.0, [0.0; 3]).unwrap();
        let mesh = ctx.tessellator().shape_to_mesh(&cube, Some(0.1), false).unwrap();
        for face in &mesh.face_list {
            let v = |i: u32| {
                let i = i as usize * 3;
                [
                    face.vertex_coord[i] as f64,
                    face.vertex_coord[i + 1] as f64,
                    face.vertex_coord[i + 2] as f64,
                ]
            };
            let [a, b, c] = [v(face.tri_indexes[0]), v(face.tri_indexes[1]), v(face.tri_indexes[2])];
            let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let w = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let cross = [u[1] * w[2] - u[2] * w[1], u[2] * w[0] - u[0] * w[2], u[0] * w[1] - u[1] * w[0]];
            let n = &face.normal_coord[face.tri_indexes[0] as usize * 3..][..3];
            let dot = cross[0] * n[0] as f64 + cross[1] * n[1] as f64 + cross[2] * n[2] as f64;
            assert!(dot > 0.0, "face {} winds inward", face.face_index);
        }
        ctx.release(cube).unwrap();
    }

    #[test]
    fn test_y_to_z_maps_axes() {
        let t = y_to_z().unwrap();
        let p = t.transform_point(&[0.0, 1.0, 0.0]);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(p[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_null_shape_is_a_precondition_error() {
        let mut ctx = KernelContext::mock();
        let empty = ctx.primitives().make_compound::<&ShapeHandle>(&[]).unwrap();
        assert!(matches!(
            ctx.tessellator().shape_to_mesh(&empty, None, false),
            Err(OpError::InvalidInputShape { .. })
        ));
        ctx.release(empty).unwrap();
    }
}
