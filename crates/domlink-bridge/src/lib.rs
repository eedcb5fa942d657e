//! # Domlink Bridge
//!
//! Lets a sandboxed WebAssembly module drive a host document tree and
//! receive host events.
//!
//! The module never sees host objects. It works with:
//!
//! | Piece | Module |
//! |-------|--------|
//! | Opaque integer handles | [`objects`] |
//! | `(ptr, len)` regions in its own linear memory | [`memory`], [`codec`] |
//! | Imported host operations | [`shims`] |
//! | Dispatch ids handed back to one exported entry point | [`relay`] |
//!
//! All per-session state lives in a [`HostEnv`]; sessions never share
//! anything.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use domlink_bridge::wasm::{Bridge, BridgeConfig};
//! use domlink_core::{Document, LogWindow};
//!
//! let bridge = Bridge::new(BridgeConfig::default())?;
//! let module = bridge.load_module("counter.wasm")?;
//! let mut session = bridge.launch(&module, Document::new(), Box::new(LogWindow))?;
//!
//! let button = session.document().query_selector("button")?.unwrap();
//! session.dispatch_event(button, "click")?;
//! ```
//!
//! ## Features
//!
//! - `wasm` (default) - wasmtime runtime, import linking and sessions

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod codec;
pub mod env;
pub mod error;
pub mod memory;
pub mod objects;
pub mod relay;
pub mod shims;

#[cfg(feature = "wasm")]
pub mod wasm;

#[cfg(test)]
mod test_utils;

pub use codec::{GuestMemory, Region};
pub use env::HostEnv;
pub use error::{BridgeError, Result};
pub use memory::{MemoryView, MemoryViewMut};
pub use objects::{Handle, ObjectTable};
pub use relay::{EventRelay, PendingDispatch, Registration};
pub use shims::ShimContext;
