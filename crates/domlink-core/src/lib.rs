//! # Domlink Core
//!
//! The host environment a sandboxed WebAssembly module drives through the
//! bridge: a mutable document tree, a selector engine for lookups, the
//! allow-list of properties a module may touch, and the window sink for
//! alerts and console output.
//!
//! Nothing here knows about WebAssembly. The bridge crate maps guest
//! handles onto [`NodeId`]s and calls into this crate.
//!
//! ## Example
//!
//! ```rust
//! use domlink_core::{Document, Property};
//!
//! let mut doc = Document::new();
//! let button = doc.create_element("button").unwrap();
//! doc.set_attribute(button, "id", "run").unwrap();
//! doc.append_child(doc.body(), button).unwrap();
//!
//! let text: Property = "innerText".parse().unwrap();
//! doc.set_property(button, &text, "Run").unwrap();
//!
//! assert_eq!(doc.query_selector("#run").unwrap(), Some(button));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod document;
pub mod error;
pub mod property;
pub mod selector;
pub mod template;
pub mod window;

pub use document::{Document, Element, NodeId, NodeKind};
pub use error::{DocumentError, Result};
pub use property::Property;
pub use selector::SelectorList;
pub use template::{NodeTemplate, PageTemplate};
pub use window::{LogWindow, RecordingWindow, Window, WindowMessage};
