//! Host functions linked into bridge modules.
//!
//! Each import is a thin wrapper that hands the `Caller` to the matching
//! function in [`crate::shims`]. A shim error becomes a trap, which aborts
//! the guest call that made the import and nothing else.
//!
//! ## Calling Convention
//!
//! - Handles, pointers, lengths and dispatch ids are `i32` on the wire and
//!   read as unsigned
//! - Strings are `(ptr, len)` UTF-8 regions, never null-terminated
//! - Booleans come back as `0` / `1`
//!
//! ## Import Modules
//!
//! | Module | Functions |
//! |--------|-----------|
//! | `document` | `query_selector`, `create_element`, `create_text_node` |
//! | `element` | `set_attribute`, `get_attribute` |
//! | `event_target` | `add_event_listener` |
//! | `node` | `append_child` |
//! | `window` | `alert`, `console_log` |
//! | `lifecycle` | `release_object` |

use wasmtime::{Caller, Linker};

use super::runtime::BridgeState;
use crate::error::{BridgeError, Result};
use crate::objects::Handle;
use crate::shims;

/// Registers the bridge imports on a linker.
pub struct DomHostFunctions;

impl DomHostFunctions {
    /// Register every import group with the wasmtime linker.
    pub fn register(linker: &mut Linker<BridgeState>) -> Result<()> {
        // document
        Self::register_query_selector(linker)?;
        Self::register_create_element(linker)?;
        Self::register_create_text_node(linker)?;

        // element
        Self::register_set_attribute(linker)?;
        Self::register_get_attribute(linker)?;

        // event_target, node
        Self::register_add_event_listener(linker)?;
        Self::register_append_child(linker)?;

        // window
        Self::register_alert(linker)?;
        Self::register_console_log(linker)?;

        // lifecycle
        Self::register_release_object(linker)?;

        Ok(())
    }

    fn register_query_selector(linker: &mut Linker<BridgeState>) -> Result<()> {
        linker
            .func_wrap(
                "document",
                "query_selector",
                |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| -> wasmtime::Result<u32> {
                    Ok(shims::query_selector(&mut caller, ptr, len)?.raw())
                },
            )
            .map_err(|e| registration_failed("query_selector", e))?;
        Ok(())
    }

    fn register_create_element(linker: &mut Linker<BridgeState>) -> Result<()> {
        linker
            .func_wrap(
                "document",
                "create_element",
                |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| -> wasmtime::Result<u32> {
                    Ok(shims::create_element(&mut caller, ptr, len)?.raw())
                },
            )
            .map_err(|e| registration_failed("create_element", e))?;
        Ok(())
    }

    fn register_create_text_node(linker: &mut Linker<BridgeState>) -> Result<()> {
        linker
            .func_wrap(
                "document",
                "create_text_node",
                |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| -> wasmtime::Result<u32> {
                    Ok(shims::create_text_node(&mut caller, ptr, len)?.raw())
                },
            )
            .map_err(|e| registration_failed("create_text_node", e))?;
        Ok(())
    }

    fn register_set_attribute(linker: &mut Linker<BridgeState>) -> Result<()> {
        linker
            .func_wrap(
                "element",
                "set_attribute",
                |mut caller: Caller<'_, BridgeState>,
                 handle: u32,
                 name_ptr: u32,
                 name_len: u32,
                 value_ptr: u32,
                 value_len: u32|
                 -> wasmtime::Result<()> {
                    shims::set_attribute(
                        &mut caller,
                        Handle::from_raw(handle),
                        name_ptr,
                        name_len,
                        value_ptr,
                        value_len,
                    )?;
                    Ok(())
                },
            )
            .map_err(|e| registration_failed("set_attribute", e))?;
        Ok(())
    }

    fn register_get_attribute(linker: &mut Linker<BridgeState>) -> Result<()> {
        linker
            .func_wrap(
                "element",
                "get_attribute",
                |mut caller: Caller<'_, BridgeState>,
                 handle: u32,
                 name_ptr: u32,
                 name_len: u32,
                 out_ptr_addr: u32,
                 out_len_addr: u32|
                 -> wasmtime::Result<u32> {
                    let found = shims::get_attribute(
                        &mut caller,
                        Handle::from_raw(handle),
                        name_ptr,
                        name_len,
                        out_ptr_addr,
                        out_len_addr,
                    )?;
                    Ok(u32::from(found))
                },
            )
            .map_err(|e| registration_failed("get_attribute", e))?;
        Ok(())
    }

    fn register_add_event_listener(linker: &mut Linker<BridgeState>) -> Result<()> {
        linker
            .func_wrap(
                "event_target",
                "add_event_listener",
                |mut caller: Caller<'_, BridgeState>,
                 handle: u32,
                 name_ptr: u32,
                 name_len: u32,
                 dispatch_id: u32|
                 -> wasmtime::Result<()> {
                    shims::add_event_listener(
                        &mut caller,
                        Handle::from_raw(handle),
                        name_ptr,
                        name_len,
                        dispatch_id,
                    )?;
                    Ok(())
                },
            )
            .map_err(|e| registration_failed("add_event_listener", e))?;
        Ok(())
    }

    fn register_append_child(linker: &mut Linker<BridgeState>) -> Result<()> {
        linker
            .func_wrap(
                "node",
                "append_child",
                |mut caller: Caller<'_, BridgeState>, parent: u32, child: u32| -> wasmtime::Result<u32> {
                    let appended =
                        shims::append_child(&mut caller, Handle::from_raw(parent), Handle::from_raw(child))?;
                    Ok(appended.raw())
                },
            )
            .map_err(|e| registration_failed("append_child", e))?;
        Ok(())
    }

    fn register_alert(linker: &mut Linker<BridgeState>) -> Result<()> {
        linker
            .func_wrap(
                "window",
                "alert",
                |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| -> wasmtime::Result<()> {
                    shims::alert(&mut caller, ptr, len)?;
                    Ok(())
                },
            )
            .map_err(|e| registration_failed("alert", e))?;
        Ok(())
    }

    fn register_console_log(linker: &mut Linker<BridgeState>) -> Result<()> {
        linker
            .func_wrap(
                "window",
                "console_log",
                |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| -> wasmtime::Result<()> {
                    shims::console_log(&mut caller, ptr, len)?;
                    Ok(())
                },
            )
            .map_err(|e| registration_failed("console_log", e))?;
        Ok(())
    }

    fn register_release_object(linker: &mut Linker<BridgeState>) -> Result<()> {
        linker
            .func_wrap(
                "lifecycle",
                "release_object",
                |mut caller: Caller<'_, BridgeState>, handle: u32| -> wasmtime::Result<()> {
                    shims::release_object(&mut caller, Handle::from_raw(handle))?;
                    Ok(())
                },
            )
            .map_err(|e| registration_failed("release_object", e))?;
        Ok(())
    }
}

fn registration_failed(name: &str, error: wasmtime::Error) -> BridgeError {
    BridgeError::WasmError(format!("failed to register {}: {}", name, error))
}
