//! Topology traversal with per-run edge identity.
//!
//! Every view returned here stays registered with the owner of the explored
//! shape until that owner is released.

use std::collections::HashSet;

use kernel_adapter::ShapeId;
use shape_types::ShapeKind;

use crate::context::KernelContext;
use crate::error::OpError;
use crate::handle::{ShapeRef, ShapeView};

pub struct TopologyExplorer<'c> {
    ctx: &'c mut KernelContext,
}

impl<'c> TopologyExplorer<'c> {
    pub fn new(ctx: &'c mut KernelContext) -> Self {
        Self { ctx }
    }

    /// Visits sub-shapes of `kind` in kernel order with a running index.
    ///
    /// Edges are deduplicated by their hash, so an edge shared by two faces
    /// is visited once and keeps the same index on every call. Other kinds
    /// are visited once per occurrence.
    pub fn for_each<'a, S: ShapeRef>(
        &mut self,
        shape: &'a S,
        kind: ShapeKind,
        mut f: impl FnMut(usize, ShapeView<'a>),
    ) -> Result<(), OpError> {
        let views = if kind == ShapeKind::Edge {
            self.edges(shape)?
        } else {
            self.sub_shapes(shape, kind)?
        };
        for view in views {
            f(view.index(), view);
        }
        Ok(())
    }

    pub fn for_each_vertex<'a, S: ShapeRef>(
        &mut self,
        shape: &'a S,
        f: impl FnMut(usize, ShapeView<'a>),
    ) -> Result<(), OpError> {
        self.for_each(shape, ShapeKind::Vertex, f)
    }

    pub fn for_each_edge<'a, S: ShapeRef>(
        &mut self,
        shape: &'a S,
        f: impl FnMut(usize, ShapeView<'a>),
    ) -> Result<(), OpError> {
        self.for_each(shape, ShapeKind::Edge, f)
    }

    pub fn for_each_wire<'a, S: ShapeRef>(
        &mut self,
        shape: &'a S,
        f: impl FnMut(usize, ShapeView<'a>),
    ) -> Result<(), OpError> {
        self.for_each(shape, ShapeKind::Wire, f)
    }

    pub fn for_each_face<'a, S: ShapeRef>(
        &mut self,
        shape: &'a S,
        f: impl FnMut(usize, ShapeView<'a>),
    ) -> Result<(), OpError> {
        self.for_each(shape, ShapeKind::Face, f)
    }

    pub fn for_each_shell<'a, S: ShapeRef>(
        &mut self,
        shape: &'a S,
        f: impl FnMut(usize, ShapeView<'a>),
    ) -> Result<(), OpError> {
        self.for_each(shape, ShapeKind::Shell, f)
    }

    pub fn for_each_solid<'a, S: ShapeRef>(
        &mut self,
        shape: &'a S,
        f: impl FnMut(usize, ShapeView<'a>),
    ) -> Result<(), OpError> {
        self.for_each(shape, ShapeKind::Solid, f)
    }

    /// Every occurrence of `kind` below `shape`, in kernel order.
    pub fn sub_shapes<'a, S: ShapeRef>(
        &mut self,
        shape: &'a S,
        kind: ShapeKind,
    ) -> Result<Vec<ShapeView<'a>>, OpError> {
        let ids = self.explore(shape, kind)?;
        Ok(ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| ShapeView::new(id, shape.shape_id(), kind, i))
            .collect())
    }

    /// Distinct edges of `shape`, indexed in order of first occurrence.
    pub fn edges<'a, S: ShapeRef>(&mut self, shape: &'a S) -> Result<Vec<ShapeView<'a>>, OpError> {
        self.distinct(shape, ShapeKind::Edge)
    }

    /// The `index`-th distinct face of `shape`, 0-based.
    pub fn get_face<'a, S: ShapeRef>(&mut self, shape: &'a S, index: usize) -> Result<ShapeView<'a>, OpError> {
        self.nth(shape, ShapeKind::Face, index)
    }

    /// The `index`-th distinct edge of `shape`, 0-based.
    pub fn get_edge<'a, S: ShapeRef>(&mut self, shape: &'a S, index: usize) -> Result<ShapeView<'a>, OpError> {
        self.nth(shape, ShapeKind::Edge, index)
    }

    fn nth<'a, S: ShapeRef>(
        &mut self,
        shape: &'a S,
        kind: ShapeKind,
        index: usize,
    ) -> Result<ShapeView<'a>, OpError> {
        self.ctx.require_shape(shape, "explored shape")?;
        if shape.shape_kind().is_below(kind) {
            return Err(OpError::invalid(format!(
                "a {} has no {kind} sub-shapes",
                shape.shape_kind()
            )));
        }
        let found = self.distinct(shape, kind)?;
        let count = found.len();
        found
            .into_iter()
            .nth(index)
            .ok_or_else(|| OpError::invalid(format!("{kind} index {index} out of range, shape has {count}")))
    }

    fn distinct<'a, S: ShapeRef>(
        &mut self,
        shape: &'a S,
        kind: ShapeKind,
    ) -> Result<Vec<ShapeView<'a>>, OpError> {
        let ids = self.explore(shape, kind)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for id in ids {
            let hash = self
                .ctx
                .kernel()
                .hash_code(id)
                .map_err(OpError::kernel("hash_code"))?;
            if seen.insert(hash) {
                out.push(ShapeView::new(id, shape.shape_id(), kind, out.len()));
            }
        }
        Ok(out)
    }

    fn explore(&mut self, shape: &impl ShapeRef, kind: ShapeKind) -> Result<Vec<ShapeId>, OpError> {
        self.ctx
            .kernel_mut()
            .explore(shape.shape_id(), kind)
            .map_err(OpError::kernel("explore"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Specificity;

    #[test]
    fn test_box_edges_are_deduplicated() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(1.0, 1.0, 1.0, [0.0; 3]).unwrap();
        let mut indexes = Vec::new();
        ctx.explorer()
            .for_each_edge(&cube, |i, view| {
                assert_eq!(view.kind(), ShapeKind::Edge);
                indexes.push(i);
            })
            .unwrap();
        assert_eq!(indexes, (0..12).collect::<Vec<_>>());
        let occurrences = ctx.explorer().sub_shapes(&cube, ShapeKind::Edge).unwrap();
        assert_eq!(occurrences.len(), 24);
        ctx.release(cube).unwrap();
    }

    #[test]
    fn test_edge_index_is_stable() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(1.0, 1.0, 1.0, [0.0; 3]).unwrap();
        let first = ctx.explorer().get_edge(&cube, 5).unwrap();
        let again = ctx.explorer().get_edge(&cube, 5).unwrap();
        let h1 = ctx.kernel().hash_code(first.id()).unwrap();
        let h2 = ctx.kernel().hash_code(again.id()).unwrap();
        assert_eq!(h1, h2);
        ctx.release(cube).unwrap();
    }

    #[test]
    fn test_faces_of_a_wire_is_an_error() {
        let mut ctx = KernelContext::mock();
        let pts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let wire = ctx
            .primitives()
            .polygon(&pts, Specificity::Wire)
            .unwrap()
            .into_shape()
            .unwrap();
        assert!(matches!(
            ctx.explorer().get_face(&wire, 0),
            Err(OpError::InvalidInputShape { .. })
        ));
        assert!(ctx.explorer().get_edge(&wire, 2).is_ok());
        assert!(ctx.explorer().get_edge(&wire, 3).is_err());
        ctx.release(wire).unwrap();
    }

    #[test]
    fn test_null_shape_is_rejected() {
        let mut ctx = KernelContext::mock();
        let empty = ctx.primitives().make_compound::<ShapeView>(&[]).unwrap();
        assert!(matches!(
            ctx.explorer().get_face(&empty, 0),
            Err(OpError::InvalidInputShape { .. })
        ));
        ctx.release(empty).unwrap();
    }

    #[test]
    fn test_views_die_with_their_owner() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(1.0, 1.0, 1.0, [0.0; 3]).unwrap();
        let face_id = ctx.explorer().get_face(&cube, 0).unwrap().id();
        ctx.release(cube).unwrap();
        assert!(ctx.kernel().kind(face_id).is_err());
    }
}
