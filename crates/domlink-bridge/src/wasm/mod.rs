//! wasmtime host for bridge modules.
//!
//! Links the six import groups a module may use, instantiates it with a
//! deny-by-default WASI preview1 context, and runs its `launch` export.
//! The resulting [`Session`] owns the store and the session's
//! [`HostEnv`](crate::HostEnv).
//!
//! ## Import Modules
//!
//! ```wat
//! (import "document" "query_selector" (func (param i32 i32) (result i32)))
//! (import "element" "get_attribute" (func (param i32 i32 i32 i32 i32) (result i32)))
//! (import "lifecycle" "release_object" (func (param i32)))
//! ```
//!
//! ## Required Exports
//!
//! - `memory`
//! - `allocate(len) -> ptr`, `0` when out of memory
//! - `launch() -> bool`
//! - `dispatchEvent(dispatch_id)`
//!
//! Export names other than `memory` are configurable through
//! [`ExportNames`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use domlink_bridge::wasm::{Bridge, BridgeConfig};
//!
//! let bridge = Bridge::new(BridgeConfig::minimal())?;
//! let module = bridge.load_module("app.wasm")?;
//! module.check_exports(&bridge.config().exports)?;
//! let mut session = bridge.launch(&module, document, Box::new(LogWindow))?;
//! session.send_text("compile", "mov r1, 5")?;
//! ```

mod config;
mod host_functions;
mod runtime;

pub use config::{BridgeConfig, ExportNames, WasiCapabilities};
pub use host_functions::DomHostFunctions;
pub use runtime::{Bridge, BridgeModule, BridgeState, Session};
