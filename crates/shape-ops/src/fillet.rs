//! Edge blends on solids and corner fillets on planar wires and faces.

use kernel_adapter::ShapeId;
use shape_types::ShapeKind;
use tracing::{debug, instrument};

use crate::context::KernelContext;
use crate::error::OpError;
use crate::handle::{ShapeHandle, ShapeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Blend {
    Fillet,
    Chamfer,
}

impl Blend {
    fn operation(self) -> &'static str {
        match self {
            Blend::Fillet => "fillet",
            Blend::Chamfer => "chamfer",
        }
    }
}

fn positive(value: f64, what: &str) -> Result<(), OpError> {
    if value.is_nan() || value <= 0.0 {
        return Err(OpError::invalid(format!("{what} must be positive, got {value}")));
    }
    Ok(())
}

/// Pairs `ids` with a size each: the matching entry of `list` when given,
/// else `uniform`.
fn sized(ids: Vec<ShapeId>, uniform: f64, list: Option<&[f64]>) -> Vec<(ShapeId, f64)> {
    ids.into_iter()
        .enumerate()
        .map(|(i, id)| (id, list.and_then(|l| l.get(i).copied()).unwrap_or(uniform)))
        .collect()
}

pub struct FilletChamferEngine<'c> {
    ctx: &'c mut KernelContext,
}

impl<'c> FilletChamferEngine<'c> {
    pub fn new(ctx: &'c mut KernelContext) -> Self {
        Self { ctx }
    }

    /// Rounds edges of `shape`.
    ///
    /// Without `edge_indexes` every edge is rounded. Indexes follow
    /// `TopologyExplorer::edges`. A `radius_list` gives one radius per
    /// matched edge in encounter order and overrides `radius`.
    #[instrument(skip(self, shape, edge_indexes, radius_list))]
    pub fn fillet_edges(
        &mut self,
        shape: &impl ShapeRef,
        radius: f64,
        edge_indexes: Option<&[usize]>,
        radius_list: Option<&[f64]>,
    ) -> Result<ShapeHandle, OpError> {
        self.blend(shape, Blend::Fillet, radius, edge_indexes, radius_list)
    }

    /// Bevels edges of `shape`; arguments as for `fillet_edges`.
    #[instrument(skip(self, shape, edge_indexes, distance_list))]
    pub fn chamfer_edges(
        &mut self,
        shape: &impl ShapeRef,
        distance: f64,
        edge_indexes: Option<&[usize]>,
        distance_list: Option<&[f64]>,
    ) -> Result<ShapeHandle, OpError> {
        self.blend(shape, Blend::Chamfer, distance, edge_indexes, distance_list)
    }

    fn blend(
        &mut self,
        shape: &impl ShapeRef,
        kind: Blend,
        uniform: f64,
        edge_indexes: Option<&[usize]>,
        list: Option<&[f64]>,
    ) -> Result<ShapeHandle, OpError> {
        let operation = kind.operation();
        self.ctx.require_shape(shape, &format!("{operation} target"))?;
        match list {
            Some(values) => {
                if let Some(indexes) = edge_indexes {
                    OpError::check_len(operation, indexes.len(), values.len())?;
                }
                for v in values {
                    positive(*v, "blend size")?;
                }
            }
            None => positive(uniform, "blend size")?,
        }

        let edges = self.ctx.explorer().edges(shape)?;
        if let (Some(values), None) = (list, edge_indexes) {
            OpError::check_len(operation, edges.len(), values.len())?;
        }
        let matched: Vec<ShapeId> = edges
            .iter()
            .filter(|e| edge_indexes.map_or(true, |idx| idx.contains(&e.index())))
            .map(|e| e.id())
            .collect();
        if matched.is_empty() {
            return Err(OpError::invalid(format!("{operation} edges not found")));
        }
        debug!(edges = matched.len(), "blending edges");

        let pairs = sized(matched, uniform, list);
        let kernel = self.ctx.kernel_mut();
        let result = match kind {
            Blend::Fillet => kernel.fillet(shape.shape_id(), &pairs),
            Blend::Chamfer => kernel.chamfer(shape.shape_id(), &pairs),
        }
        .map_err(OpError::kernel(operation))?;
        self.ctx.adopt(result)
    }

    /// Rounds corners of a planar wire or face.
    ///
    /// Corners are every second vertex met while walking the boundary; an
    /// open wire drops its final end vertex, leaving one corner per interior
    /// vertex (E - 1 for E edges). `corner_indexes` picks among
    /// those corners and `radius_list` gives one radius per picked corner.
    /// A face comes back as a face, a wire as a single wire.
    #[instrument(skip(self, shape, radius_list, corner_indexes))]
    pub fn fillet2d(
        &mut self,
        shape: &impl ShapeRef,
        radius: f64,
        radius_list: Option<&[f64]>,
        corner_indexes: Option<&[usize]>,
    ) -> Result<ShapeHandle, OpError> {
        let kind = shape.shape_kind();
        if !matches!(kind, ShapeKind::Wire | ShapeKind::Face) {
            return Err(OpError::invalid(format!("fillet2d needs a wire or a face, got a {kind}")));
        }
        self.ctx.require_shape(shape, "fillet2d target")?;

        let closed = kind == ShapeKind::Face
            || self
                .ctx
                .kernel()
                .is_closed(shape.shape_id())
                .map_err(OpError::kernel("is_closed"))?;
        let mut corners: Vec<ShapeId> = self
            .ctx
            .explorer()
            .sub_shapes(shape, ShapeKind::Vertex)?
            .into_iter()
            .filter(|v| v.index() % 2 == 1)
            .map(|v| v.id())
            .collect();
        if !closed {
            corners.pop();
        }
        if let Some(indexes) = corner_indexes {
            let all = corners;
            corners = Vec::with_capacity(indexes.len());
            for &i in indexes {
                let corner = all.get(i).copied().ok_or_else(|| {
                    OpError::invalid(format!("corner index {i} out of range, shape has {}", all.len()))
                })?;
                corners.push(corner);
            }
        }
        match radius_list {
            Some(values) => {
                OpError::check_len("fillet2d", corners.len(), values.len())?;
                for v in values {
                    positive(*v, "fillet radius")?;
                }
            }
            None => positive(radius, "fillet radius")?,
        }
        if corners.is_empty() {
            return Err(OpError::invalid("fillet2d found no corners"));
        }
        debug!(corners = corners.len(), closed, "rounding corners");
        let pairs = sized(corners, radius, radius_list);

        if kind == ShapeKind::Face || !closed {
            let id = self
                .ctx
                .kernel_mut()
                .fillet_2d(shape.shape_id(), &pairs)
                .map_err(OpError::kernel("fillet2d"))?;
            return self.ctx.adopt(id);
        }
        self.fillet_closed_wire(shape.shape_id(), &pairs)
    }

    /// Closes the wire into a face, rounds it and takes the boundary back
    /// out.
    fn fillet_closed_wire(&mut self, wire: ShapeId, pairs: &[(ShapeId, f64)]) -> Result<ShapeHandle, OpError> {
        let face = self
            .ctx
            .kernel_mut()
            .make_face(wire, true)
            .map_err(OpError::kernel("make_face"))?;
        let rounded = self.ctx.kernel_mut().fillet_2d(face, pairs);
        self.ctx.discard(face);
        let rounded = rounded.map_err(OpError::kernel("fillet2d"))?;

        let wires = self.ctx.kernel_mut().explore(rounded, ShapeKind::Wire);
        let result = match wires {
            Ok(ws) => match ws.as_slice() {
                [w] => self.ctx.kernel_mut().detach(*w).map_err(OpError::kernel("detach")),
                _ => Err(OpError::invalid(format!(
                    "fillet2d result has {} wires, expected 1",
                    ws.len()
                ))),
            },
            Err(e) => Err(OpError::kernel("explore")(e)),
        };
        self.ctx.discard(rounded);
        self.ctx.adopt(result?)
    }
}
