use std::collections::HashMap;

use shape_ops::{KernelContext, OpError, ShapeHandle};
use tracing::{info, warn};
use uuid::Uuid;

/// Owned shapes of one session, addressed by opaque ids.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    shapes: HashMap<Uuid, ShapeHandle>,
}

impl ShapeRegistry {
    pub fn insert(&mut self, handle: ShapeHandle) -> Uuid {
        let id = Uuid::new_v4();
        self.shapes.insert(id, handle);
        id
    }

    pub fn get(&self, id: &Uuid) -> Result<&ShapeHandle, BridgeError> {
        self.shapes.get(id).ok_or(BridgeError::UnknownShape { id: *id })
    }

    /// Looks up every id, in order.
    pub fn get_all(&self, ids: &[Uuid]) -> Result<Vec<&ShapeHandle>, BridgeError> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    pub fn remove(&mut self, id: &Uuid) -> Result<ShapeHandle, BridgeError> {
        self.shapes.remove(id).ok_or(BridgeError::UnknownShape { id: *id })
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn drain(&mut self) -> impl Iterator<Item = ShapeHandle> + '_ {
        self.shapes.drain().map(|(_, h)| h)
    }
}

/// A kernel session plus the shapes the UI can name.
pub struct Session {
    pub ctx: KernelContext,
    pub shapes: ShapeRegistry,
}

impl Session {
    pub fn new(ctx: KernelContext) -> Self {
        info!(?ctx, "shape session started");
        Self {
            ctx,
            shapes: ShapeRegistry::default(),
        }
    }

    /// Session over the in-memory test kernel.
    pub fn mock() -> Self {
        Self::new(KernelContext::mock())
    }

    /// Session over the default production kernel.
    #[cfg(feature = "truck")]
    pub fn truck() -> Self {
        Self::new(KernelContext::truck())
    }

    /// Gives the shape behind `id` back to the kernel.
    pub fn release(&mut self, id: &Uuid) -> Result<(), BridgeError> {
        let handle = self.shapes.remove(id)?;
        self.ctx.release(handle)?;
        Ok(())
    }

    /// Releases every shape; returns how many there were.
    pub fn reset(&mut self) -> usize {
        let mut released = 0;
        for handle in self.shapes.drain() {
            match self.ctx.release(handle) {
                Ok(()) => released += 1,
                Err(e) => warn!(error = %e, "failed to release shape on reset"),
            }
        }
        info!(released, "shape session reset");
        released
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.shapes.is_empty() {
            self.reset();
        }
    }
}

/// Errors from the worker bridge layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("unknown shape id {id}")]
    UnknownShape { id: Uuid },

    #[error(transparent)]
    Op(#[from] OpError),

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("failed to parse message: {reason}")]
    Parse { reason: String },
}
