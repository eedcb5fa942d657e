//! Counter page driven through the domlink bridge.
//!
//! Build with `cargo build --release --target wasm32-unknown-unknown` and
//! run against `page.json`:
//!
//! ```text
//! domlink run domlink_guest_demo.wasm --page page.json \
//!     --step send:load_program:"mov r1, 5" --step fire:#compile:click --dump
//! ```
//!
//! On launch the module appends a counter button to the page and listens
//! for clicks on it and on `#compile`. Handles are wrapped in [`Node`],
//! which releases them on drop.

use std::alloc::{alloc as std_alloc, dealloc as std_dealloc, Layout};
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// Bridge Imports
// =============================================================================

#[link(wasm_import_module = "document")]
extern "C" {
    fn query_selector(ptr: *const u8, len: usize) -> u32;
    fn create_element(ptr: *const u8, len: usize) -> u32;
    fn create_text_node(ptr: *const u8, len: usize) -> u32;
}

#[link(wasm_import_module = "element")]
extern "C" {
    fn set_attribute(handle: u32, name_ptr: *const u8, name_len: usize, value_ptr: *const u8, value_len: usize);
    fn get_attribute(
        handle: u32,
        name_ptr: *const u8,
        name_len: usize,
        out_ptr_addr: *mut u32,
        out_len_addr: *mut u32,
    ) -> u32;
}

#[link(wasm_import_module = "event_target")]
extern "C" {
    fn add_event_listener(handle: u32, name_ptr: *const u8, name_len: usize, dispatch_id: u32);
}

#[link(wasm_import_module = "node")]
extern "C" {
    fn append_child(parent: u32, child: u32) -> u32;
}

#[link(wasm_import_module = "window")]
extern "C" {
    fn alert(ptr: *const u8, len: usize);
    fn console_log(ptr: *const u8, len: usize);
}

#[link(wasm_import_module = "lifecycle")]
extern "C" {
    fn release_object(handle: u32);
}

// =============================================================================
// Safe Wrappers
// =============================================================================

const COUNTER_CLICKED: u32 = 1;
const COMPILE_CLICKED: u32 = 2;

static CLICKS: AtomicU32 = AtomicU32::new(0);
static COUNTER: AtomicU32 = AtomicU32::new(0);

/// An owned handle; released when dropped.
struct Node(u32);

impl Node {
    fn query(selector: &str) -> Option<Node> {
        let handle = unsafe { query_selector(selector.as_ptr(), selector.len()) };
        (handle != 0).then_some(Node(handle))
    }

    fn create(tag: &str) -> Node {
        Node(unsafe { create_element(tag.as_ptr(), tag.len()) })
    }

    fn text(data: &str) -> Node {
        Node(unsafe { create_text_node(data.as_ptr(), data.len()) })
    }

    fn set(&self, name: &str, value: &str) {
        unsafe { set_attribute(self.0, name.as_ptr(), name.len(), value.as_ptr(), value.len()) }
    }

    fn get(&self, name: &str) -> Option<String> {
        let mut ptr = 0u32;
        let mut len = 0u32;
        let found = unsafe { get_attribute(self.0, name.as_ptr(), name.len(), &mut ptr, &mut len) };
        if found == 0 {
            return None;
        }
        // the host filled memory obtained from `allocate` with align 1
        let bytes = unsafe { Vec::from_raw_parts(ptr as *mut u8, len as usize, len as usize) };
        String::from_utf8(bytes).ok()
    }

    fn append(&self, child: &Node) -> Option<Node> {
        let handle = unsafe { append_child(self.0, child.0) };
        (handle != 0).then_some(Node(handle))
    }

    fn on(&self, event: &str, dispatch_id: u32) {
        unsafe { add_event_listener(self.0, event.as_ptr(), event.len(), dispatch_id) }
    }

    /// Hand the raw handle over without releasing it.
    fn leak(self) -> u32 {
        let handle = self.0;
        std::mem::forget(self);
        handle
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        unsafe { release_object(self.0) }
    }
}

fn log(message: &str) {
    unsafe { console_log(message.as_ptr(), message.len()) }
}

fn show_alert(message: &str) {
    unsafe { alert(message.as_ptr(), message.len()) }
}

fn counter_label(clicks: u32) -> String {
    format!("Clicked {} times", clicks)
}

// =============================================================================
// Exports
// =============================================================================

/// Allocate memory for the host to write into. Returns 0 when out of memory.
#[no_mangle]
pub extern "C" fn allocate(len: usize) -> *mut u8 {
    match Layout::from_size_align(len, 1) {
        Ok(layout) if len > 0 => unsafe { std_alloc(layout) },
        _ => std::ptr::null_mut(),
    }
}

/// Free memory obtained from [`allocate`].
#[no_mangle]
pub extern "C" fn release(ptr: *mut u8, len: usize) {
    if let Ok(layout) = Layout::from_size_align(len, 1) {
        if !ptr.is_null() && len > 0 {
            unsafe { std_dealloc(ptr, layout) };
        }
    }
}

/// Build the counter and wire up listeners. Returns 0 if the page lacks a body.
#[no_mangle]
pub extern "C" fn launch() -> u32 {
    let Some(body) = Node::query("body") else {
        return 0;
    };

    let counter = Node::create("button");
    counter.set("id", "counter");
    counter.set("textContent", &counter_label(0));
    counter.on("click", COUNTER_CLICKED);
    drop(body.append(&counter));
    COUNTER.store(counter.leak(), Ordering::Relaxed);

    if let Some(compile) = Node::query("#compile") {
        compile.on("click", COMPILE_CLICKED);
    }

    log("counter ready");
    1
}

/// Route a host event to its handler.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn dispatchEvent(dispatch_id: u32) {
    match dispatch_id {
        COUNTER_CLICKED => {
            let clicks = CLICKS.fetch_add(1, Ordering::Relaxed) + 1;
            let counter = Node(COUNTER.load(Ordering::Relaxed));
            counter.set("textContent", &counter_label(clicks));
            counter.leak();
        }
        COMPILE_CLICKED => compile(),
        other => log(&format!("unknown dispatch id {}", other)),
    }
}

/// Put program text into `#code`, as if typed by the user.
#[no_mangle]
pub extern "C" fn load_program(ptr: *const u8, len: usize) {
    let bytes = unsafe { std::slice::from_raw_parts(ptr, len) };
    let text = String::from_utf8_lossy(bytes);
    if let Some(code) = Node::query("#code") {
        code.set("value", &text);
    }
    release(ptr as *mut u8, len);
}

fn compile() {
    let Some(code) = Node::query("#code") else {
        show_alert("No #code element");
        return;
    };
    let Some(program) = code.get("value") else {
        show_alert("Nothing to compile");
        return;
    };

    let lines = program.lines().filter(|l| !l.trim().is_empty()).count();
    if let Some(status) = Node::query("#status") {
        status.set("textContent", "");
        let text = Node::text(&format!("{} line(s) loaded", lines));
        drop(status.append(&text));
    }
}
