pub mod geom;
pub mod kind;
pub mod mesh;

pub use geom::*;
pub use kind::*;
pub use mesh::*;
