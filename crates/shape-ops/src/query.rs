use kernel_adapter::BoundingBox;
use shape_types::ShapeKind;

use crate::context::KernelContext;
use crate::error::OpError;
use crate::handle::ShapeRef;

/// Read-only measurements of a shape.
pub struct ShapeQuery<'c> {
    ctx: &'c mut KernelContext,
}

impl<'c> ShapeQuery<'c> {
    pub fn new(ctx: &'c mut KernelContext) -> Self {
        Self { ctx }
    }

    pub fn bounding_box(&self, shape: &impl ShapeRef) -> Result<BoundingBox, OpError> {
        self.ctx
            .kernel()
            .bounding_box(shape.shape_id())
            .map_err(OpError::kernel("bounding_box"))
    }

    /// Enclosed volume; zero for shapes without solids.
    pub fn volume(&self, shape: &impl ShapeRef) -> Result<f64, OpError> {
        self.ctx
            .kernel()
            .volume(shape.shape_id())
            .map_err(OpError::kernel("volume"))
    }

    pub fn solid_count(&mut self, shape: &impl ShapeRef) -> Result<usize, OpError> {
        self.count(shape, ShapeKind::Solid)
    }

    /// Number of distinct sub-shapes of `kind`.
    pub fn count(&mut self, shape: &impl ShapeRef, kind: ShapeKind) -> Result<usize, OpError> {
        let ids = self
            .ctx
            .kernel_mut()
            .explore(shape.shape_id(), kind)
            .map_err(OpError::kernel("explore"))?;
        let kernel = self.ctx.kernel();
        let mut hashes = ids
            .into_iter()
            .map(|id| kernel.hash_code(id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(OpError::kernel("hash_code"))?;
        hashes.sort_unstable();
        hashes.dedup();
        Ok(hashes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_measurements() {
        let mut ctx = KernelContext::mock();
        let cube = ctx.primitives().make_box(1.0, 2.0, 3.0, [1.0, 1.0, 1.0]).unwrap();
        let mut q = ctx.query();
        assert_relative_eq!(q.volume(&cube).unwrap(), 6.0, epsilon = 1e-9);
        let bbox = q.bounding_box(&cube).unwrap();
        assert_relative_eq!(bbox.min[2], -0.5, epsilon = 1e-9);
        assert_relative_eq!(bbox.max[1], 2.0, epsilon = 1e-9);
        assert_eq!(q.solid_count(&cube).unwrap(), 1);
        assert_eq!(q.count(&cube, ShapeKind::Vertex).unwrap(), 8);
        ctx.release(cube).unwrap();
    }
}
