pub mod arena;
pub mod corner;
pub mod mock_kernel;
mod mock_shape;
pub mod traits;
pub mod transform;
#[cfg(feature = "truck")]
pub mod truck_kernel;
#[cfg(feature = "truck")]
pub mod truck_shape;
pub mod types;

pub use arena::ShapeArena;
pub use mock_kernel::MockKernel;
pub use traits::*;
pub use transform::Transform;
#[cfg(feature = "truck")]
pub use truck_kernel::TruckKernel;
pub use types::*;
