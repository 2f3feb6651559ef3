//! Typed, fail-fast facade over a B-rep kernel session, plus the
//! tessellation pipeline that turns shapes into render meshes.

pub mod boolean;
pub mod context;
pub mod error;
pub mod explorer;
pub mod fillet;
pub mod handle;
pub mod io;
pub mod primitives;
pub mod query;
pub mod tessellation;
pub mod transform;

pub use boolean::BooleanEngine;
pub use context::{KernelConfig, KernelContext};
pub use error::OpError;
pub use explorer::TopologyExplorer;
pub use fillet::FilletChamferEngine;
pub use handle::{ShapeHandle, ShapeRef, ShapeView};
pub use io::{FileFormat, IoAdapter};
pub use primitives::{Primitive, PrimitiveBuilder, Specificity};
pub use query::ShapeQuery;
pub use tessellation::TessellationPipeline;
pub use transform::TransformEngine;

pub use kernel_adapter::{BoundingBox, CurveDef, KernelError, Transform};
pub use shape_types::{Axis, Frame, MeshResult, Plane, Point3, ShapeKind, Vector3};
