//! WASM entry points for the shape worker.
//!
//! Only compiled for the `wasm32` target. JavaScript calls `init` once and
//! then hands every message to `process_message`.

use std::cell::RefCell;

use tracing::debug;
use wasm_bindgen::prelude::*;

use crate::dispatch::{dispatch_json, to_json};
use crate::messages::Response;
use crate::session::Session;

// One session per worker; the worker is single-threaded.
thread_local! {
    static SESSION: RefCell<Option<Session>> = const { RefCell::new(None) };
}

fn new_session() -> Session {
    #[cfg(feature = "truck")]
    {
        Session::truck()
    }
    #[cfg(not(feature = "truck"))]
    {
        Session::mock()
    }
}

/// Initialize the worker. Calling it again drops the previous session and
/// every shape it held.
#[wasm_bindgen]
pub fn init() {
    console_error_panic_hook::set_once();

    let session = new_session();
    let kernel = session.ctx.kernel().name().to_string();
    SESSION.with(|cell| {
        *cell.borrow_mut() = Some(session);
    });
    web_sys::console::log_1(&JsValue::from_str(&format!("shape worker ready ({kernel} kernel)")));
}

/// Process a JSON `Request` and return a JSON `Response`.
#[wasm_bindgen]
pub fn process_message(json_input: &str) -> String {
    let started = js_sys::Date::now();
    let output = SESSION.with(|cell| match cell.borrow_mut().as_mut() {
        Some(session) => dispatch_json(session, json_input),
        None => to_json(&Response::Error {
            message: "worker not initialized, call init() first".to_string(),
            operation: None,
        }),
    });
    debug!(elapsed_ms = js_sys::Date::now() - started, "message processed");
    output
}

/// Number of shapes the current session holds.
#[wasm_bindgen]
pub fn shape_count() -> usize {
    SESSION.with(|cell| cell.borrow().as_ref().map_or(0, |s| s.shapes.len()))
}
