//! Plain-data boundary between a UI thread and the shape facade.
//!
//! Shapes never cross the boundary: the session keeps every handle and hands
//! out opaque ids. Requests and responses are tagged JSON.

pub mod dispatch;
pub mod messages;
pub mod session;

#[cfg(target_arch = "wasm32")]
pub mod wasm_api;

pub use dispatch::{dispatch, dispatch_json};
pub use messages::{Request, Response};
pub use session::{BridgeError, Session, ShapeRegistry};
