use kernel_adapter::{Kernel, MockKernel, ShapeId};
use serde::{Deserialize, Serialize};

use crate::boolean::BooleanEngine;
use crate::error::OpError;
use crate::explorer::TopologyExplorer;
use crate::fillet::FilletChamferEngine;
use crate::handle::{ShapeHandle, ShapeRef};
use crate::io::IoAdapter;
use crate::primitives::PrimitiveBuilder;
use crate::query::ShapeQuery;
use crate::tessellation::TessellationPipeline;
use crate::transform::TransformEngine;

/// Tunables shared by every component of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KernelConfig {
    /// Linear deflection used when a caller gives none.
    pub default_tolerance: f64,
    /// Angular deflection for meshing, radians.
    pub angular_deflection: f64,
    /// Fuzzy tolerance for booleans.
    pub boolean_tolerance: f64,
    pub parallel_meshing: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_tolerance: 0.1,
            angular_deflection: 0.5,
            boolean_tolerance: 0.05,
            parallel_meshing: true,
        }
    }
}

/// One kernel session. Every component borrows it explicitly.
pub struct KernelContext {
    kernel: Box<dyn Kernel>,
    config: KernelConfig,
}

impl KernelContext {
    pub fn new(kernel: Box<dyn Kernel>, config: KernelConfig) -> Self {
        tracing::debug!(backend = kernel.name(), "kernel context created");
        Self { kernel, config }
    }

    /// Session over the deterministic in-memory kernel.
    pub fn mock() -> Self {
        Self::mock_with(KernelConfig::default())
    }

    pub fn mock_with(config: KernelConfig) -> Self {
        let kernel = MockKernel::new().with_boolean_tolerance(config.boolean_tolerance);
        Self::new(Box::new(kernel), config)
    }

    /// Session over the truck B-rep kernel.
    #[cfg(feature = "truck")]
    pub fn truck() -> Self {
        Self::truck_with(KernelConfig::default())
    }

    #[cfg(feature = "truck")]
    pub fn truck_with(config: KernelConfig) -> Self {
        let kernel =
            kernel_adapter::TruckKernel::new().with_boolean_tolerance(config.boolean_tolerance);
        Self::new(Box::new(kernel), config)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    pub fn kernel_mut(&mut self) -> &mut dyn Kernel {
        self.kernel.as_mut()
    }

    /// Number of owned shapes still alive in the kernel.
    pub fn live_shapes(&self) -> usize {
        self.kernel.live_shapes()
    }

    /// Gives an owned shape back to the kernel, together with every view
    /// explored from it.
    pub fn release(&mut self, handle: ShapeHandle) -> Result<(), OpError> {
        self.kernel
            .release(handle.id())
            .map_err(OpError::kernel("release"))
    }

    /// Releases a batch, stopping at the first failure.
    pub fn release_all(&mut self, handles: impl IntoIterator<Item = ShapeHandle>) -> Result<(), OpError> {
        handles.into_iter().try_for_each(|h| self.release(h))
    }

    /// New owned shape sharing the geometry of `shape`.
    pub fn detach(&mut self, shape: &impl ShapeRef) -> Result<ShapeHandle, OpError> {
        let id = self
            .kernel
            .detach(shape.shape_id())
            .map_err(OpError::kernel("detach"))?;
        Ok(ShapeHandle::new(id, shape.shape_kind()))
    }

    pub fn is_null(&self, shape: &impl ShapeRef) -> Result<bool, OpError> {
        self.kernel
            .is_null(shape.shape_id())
            .map_err(OpError::kernel("is_null"))
    }

    /// Fails unless `shape` is live and has content.
    pub(crate) fn require_shape(&self, shape: &impl ShapeRef, what: &str) -> Result<(), OpError> {
        if self.is_null(shape)? {
            return Err(OpError::invalid(format!("{what} is null")));
        }
        Ok(())
    }

    /// Wraps a freshly created kernel id in an owning handle.
    pub(crate) fn adopt(&self, id: ShapeId) -> Result<ShapeHandle, OpError> {
        let kind = self.kernel.kind(id).map_err(OpError::kernel("kind"))?;
        Ok(ShapeHandle::new(id, kind))
    }

    /// Releases a kernel id that never left the facade.
    pub(crate) fn discard(&mut self, id: ShapeId) {
        if let Err(e) = self.kernel.release(id) {
            tracing::warn!(error = %e, "failed to release temporary shape");
        }
    }

    pub fn primitives(&mut self) -> PrimitiveBuilder<'_> {
        PrimitiveBuilder::new(self)
    }

    pub fn explorer(&mut self) -> TopologyExplorer<'_> {
        TopologyExplorer::new(self)
    }

    pub fn transforms(&mut self) -> TransformEngine<'_> {
        TransformEngine::new(self)
    }

    pub fn booleans(&mut self) -> BooleanEngine<'_> {
        BooleanEngine::new(self)
    }

    pub fn fillets(&mut self) -> FilletChamferEngine<'_> {
        FilletChamferEngine::new(self)
    }

    pub fn tessellator(&mut self) -> TessellationPipeline<'_> {
        TessellationPipeline::new(self)
    }

    pub fn io(&mut self) -> IoAdapter<'_> {
        IoAdapter::new(self)
    }

    pub fn query(&mut self) -> ShapeQuery<'_> {
        ShapeQuery::new(self)
    }
}

impl std::fmt::Debug for KernelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelContext")
            .field("backend", &self.kernel.name())
            .field("live_shapes", &self.kernel.live_shapes())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.default_tolerance, 0.1);
        assert_eq!(config.angular_deflection, 0.5);
        assert!(config.parallel_meshing);
    }

    #[test]
    fn config_fills_missing_fields() {
        let config: KernelConfig = serde_json::from_str(r#"{"defaultTolerance": 0.02}"#).unwrap();
        assert_eq!(config.default_tolerance, 0.02);
        assert_eq!(config.boolean_tolerance, 0.05);
    }

    #[test]
    fn sessions_are_independent() {
        let mut a = KernelContext::mock();
        let b = KernelContext::mock();
        let cube = a.primitives().make_box(1.0, 1.0, 1.0, [0.0; 3]).unwrap();
        assert_eq!(a.live_shapes(), 1);
        assert_eq!(b.live_shapes(), 0);
        a.release(cube).unwrap();
        assert_eq!(a.live_shapes(), 0);
    }
}
