use kernel_adapter::{KernelError, ShapeId};
use shape_types::ShapeKind;
use tracing::{debug, instrument};

use crate::context::KernelContext;
use crate::error::OpError;
use crate::handle::{ShapeHandle, ShapeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BooleanOp {
    Fuse,
    Cut,
    Common,
}

impl BooleanOp {
    fn name(self) -> &'static str {
        match self {
            BooleanOp::Fuse => "fuse",
            BooleanOp::Cut => "cut",
            BooleanOp::Common => "common",
        }
    }
}

/// Union, difference and intersection of shape lists.
pub struct BooleanEngine<'c> {
    ctx: &'c mut KernelContext,
}

impl<'c> BooleanEngine<'c> {
    pub fn new(ctx: &'c mut KernelContext) -> Self {
        Self { ctx }
    }

    /// Fuses every shape in order. Without `keep_edges` faces sharing a
    /// surface are merged afterwards.
    #[instrument(skip(self, shapes), fields(count = shapes.len()))]
    pub fn union<S: ShapeRef>(&mut self, shapes: &[S], keep_edges: bool) -> Result<ShapeHandle, OpError> {
        let ids = self.operands(shapes, "union")?;
        let fused = self.fold(&ids, BooleanOp::Fuse)?;
        let result = if keep_edges { fused } else { self.unify(fused)? };
        self.ctx.adopt(result)
    }

    /// Cuts each of `subtract` from `base` in order. A result holding a
    /// single solid comes back as that solid.
    #[instrument(skip(self, base, subtract), fields(count = subtract.len()))]
    pub fn difference<S: ShapeRef>(
        &mut self,
        base: &impl ShapeRef,
        subtract: &[S],
        keep_edges: bool,
    ) -> Result<ShapeHandle, OpError> {
        self.ctx.require_shape(base, "difference base")?;
        let mut ids = vec![base.shape_id()];
        ids.extend(self.operands(subtract, "difference")?);
        let cut = self.fold(&ids, BooleanOp::Cut)?;
        let result = if keep_edges { cut } else { self.unify(cut)? };
        let result = self.collapse_single_solid(result)?;
        self.ctx.adopt(result)
    }

    /// Region common to every shape.
    #[instrument(skip(self, shapes), fields(count = shapes.len()))]
    pub fn intersection<S: ShapeRef>(&mut self, shapes: &[S], keep_edges: bool) -> Result<ShapeHandle, OpError> {
        let ids = self.operands(shapes, "intersection")?;
        let result = self.fold(&ids, BooleanOp::Common)?;
        let result = if keep_edges { result } else { self.unify(result)? };
        self.ctx.adopt(result)
    }

    fn operands<S: ShapeRef>(&self, shapes: &[S], operation: &str) -> Result<Vec<ShapeId>, OpError> {
        if shapes.is_empty() {
            return Err(OpError::invalid(format!("{operation} needs at least one shape")));
        }
        for (i, shape) in shapes.iter().enumerate() {
            self.ctx.require_shape(shape, &format!("{operation} operand {i}"))?;
        }
        Ok(shapes.iter().map(|s| s.shape_id()).collect())
    }

    /// Left fold of `op` over `ids`. Intermediate results are released as
    /// soon as the next step has consumed them.
    fn fold(&mut self, ids: &[ShapeId], op: BooleanOp) -> Result<ShapeId, OpError> {
        let Some((&first, rest)) = ids.split_first() else {
            return Err(OpError::invalid("no operands"));
        };
        let mut acc = self
            .ctx
            .kernel_mut()
            .detach(first)
            .map_err(OpError::kernel(op.name()))?;
        for (step, &next) in rest.iter().enumerate() {
            let kernel = self.ctx.kernel_mut();
            let out = match op {
                BooleanOp::Fuse => kernel.fuse(acc, next),
                BooleanOp::Cut => kernel.cut(acc, next),
                BooleanOp::Common => kernel.common(acc, next),
            };
            self.ctx.discard(acc);
            acc = out.map_err(OpError::kernel(op.name()))?;
            debug!(op = op.name(), step, "boolean step done");
        }
        Ok(acc)
    }

    fn unify(&mut self, shape: ShapeId) -> Result<ShapeId, OpError> {
        let unified = self.ctx.kernel_mut().unify_same_domain(shape);
        self.ctx.discard(shape);
        unified.map_err(OpError::kernel("unify_same_domain"))
    }

    fn collapse_single_solid(&mut self, shape: ShapeId) -> Result<ShapeId, OpError> {
        let kernel = self.ctx.kernel_mut();
        if kernel.kind(shape).map_err(OpError::kernel("kind"))? != ShapeKind::Compound {
            return Ok(shape);
        }
        let solids = kernel
            .explore(shape, ShapeKind::Solid)
            .map_err(OpError::kernel("explore"))?;
        let [solid] = solids.as_slice() else {
            return Ok(shape);
        };
        let detached: Result<ShapeId, KernelError> = kernel.detach(*solid);
        self.ctx.discard(shape);
        debug!("collapsed single-solid compound");
        detached.map_err(OpError::kernel("detach"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_union_of_one_is_a_copy() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(1.0, 1.0, 1.0, [0.0; 3]).unwrap();
        let u = ctx.booleans().union(&[&cube], true).unwrap();
        assert_eq!(u.kind(), ShapeKind::Solid);
        assert_ne!(u.id(), cube.id());
        ctx.release_all([cube, u]).unwrap();
        assert_eq!(ctx.live_shapes(), 0);
    }

    #[test]
    fn test_difference_collapses_to_solid() {
        let mut ctx = KernelContext::mock();
        let a = ctx.primitives().make_box(2.0, 2.0, 2.0, [0.0; 3]).unwrap();
        let far = ctx.primitives().make_box(1.0, 1.0, 1.0, [9.0; 3]).unwrap();
        let d = ctx.booleans().difference(&a, &[&far], false).unwrap();
        assert_eq!(d.kind(), ShapeKind::Solid);
        assert_relative_eq!(ctx.query().volume(&d).unwrap(), 8.0, epsilon = 1e-9);
        ctx.release_all([a, far, d]).unwrap();
        assert_eq!(ctx.live_shapes(), 0);
    }

    #[test]
    fn test_empty_operand_list_is_rejected() {
        let mut ctx = KernelContext::mock();
        let none: [&ShapeHandle; 0] = [];
        assert!(matches!(
            ctx.booleans().union(&none, true),
            Err(OpError::InvalidInputShape { .. })
        ));
    }

    #[test]
    fn test_null_operand_fails_before_kernel() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(1.0, 1.0, 1.0, [0.0; 3]).unwrap();
        let empty = ctx.primitives().make_compound::<&ShapeHandle>(&[]).unwrap();
        let err = ctx.booleans().union(&[&cube, &empty], true).unwrap_err();
        assert!(err.to_string().contains("operand 1"));
        assert_eq!(ctx.live_shapes(), 2);
        ctx.release_all([cube, empty]).unwrap();
    }

    #[test]
    fn test_partial_overlap_surfaces_kernel_failure() {
        let mut ctx = KernelContext::mock();
        let a = ctx.primitives().make_box(2.0, 2.0, 2.0, [0.0; 3]).unwrap();
        let b = ctx.primitives().make_box(2.0, 2.0, 2.0, [1.0, 0.0, 0.0]).unwrap();
        let err = ctx.booleans().union(&[&a, &b], true).unwrap_err();
        assert_eq!(err.operation(), Some("fuse"));
        assert_eq!(ctx.live_shapes(), 2);
        ctx.release_all([a, b]).unwrap();
    }
}
