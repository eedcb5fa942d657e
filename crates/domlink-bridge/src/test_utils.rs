//! In-memory guests for unit tests that do not need wasmtime.

use domlink_core::{Document, LogWindow, RecordingWindow, Window};

use crate::codec::GuestMemory;
use crate::env::HostEnv;
use crate::error::Result;
use crate::memory::{MemoryView, MemoryViewMut};
use crate::shims::ShimContext;

/// First address the bump allocator hands out; keeps 0 free as null.
const HEAP_BASE: u32 = 16;

/// A growable byte buffer with a bump allocator, standing in for a module.
///
/// Growth replaces the whole buffer, like a real memory grow does.
pub(crate) struct VecGuest {
    memory: Vec<u8>,
    next: u32,
    allocations: u32,
    fail_at: Option<u32>,
}

impl VecGuest {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            memory: vec![0; size],
            next: HEAP_BASE,
            allocations: 0,
            fail_at: None,
        }
    }

    /// Make allocator call number `n` (1-based) return null.
    pub(crate) fn fail_allocation(mut self, n: u32) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub(crate) fn set_failing_allocation(&mut self, n: u32) {
        self.fail_at = Some(n);
    }

    /// Allocator calls so far, failed ones included.
    pub(crate) fn allocations(&self) -> u32 {
        self.allocations
    }

    pub(crate) fn size(&self) -> usize {
        self.memory.len()
    }

    pub(crate) fn snapshot(&self) -> Vec<u8> {
        self.memory.clone()
    }

    /// Carve out `len` bytes without going through the counted allocator.
    pub(crate) fn reserve(&mut self, len: u32) -> u32 {
        let ptr = self.next;
        let end = ptr + len.max(1);
        if end as usize > self.memory.len() {
            let grown = (end as usize).next_multiple_of(16);
            let mut memory = vec![0; grown];
            memory[..self.memory.len()].copy_from_slice(&self.memory);
            self.memory = memory;
        }
        self.next = end;
        ptr
    }

    pub(crate) fn write_u32(&mut self, addr: u32, value: u32) {
        let addr = addr as usize;
        self.memory[addr..addr + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn read_u32(&self, addr: u32) -> u32 {
        MemoryView::new(&self.memory).read_u32(addr).unwrap()
    }
}

impl GuestMemory for VecGuest {
    fn allocate(&mut self, len: u32) -> Result<u32> {
        self.allocations += 1;
        if self.fail_at == Some(self.allocations) {
            return Ok(0);
        }
        Ok(self.reserve(len))
    }

    fn view(&mut self) -> Result<MemoryView<'_>> {
        Ok(MemoryView::new(&self.memory))
    }

    fn view_mut(&mut self) -> Result<MemoryViewMut<'_>> {
        Ok(MemoryViewMut::new(&mut self.memory))
    }
}

/// A [`VecGuest`] paired with a host context, enough to drive the shims.
pub(crate) struct FakeHost {
    pub(crate) guest: VecGuest,
    pub(crate) env: HostEnv,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self::build(Document::new(), Box::new(LogWindow))
    }

    pub(crate) fn with_document(document: Document) -> Self {
        Self::build(document, Box::new(LogWindow))
    }

    pub(crate) fn with_window(document: Document, window: RecordingWindow) -> Self {
        Self::build(document, Box::new(window))
    }

    fn build(document: Document, window: Box<dyn Window>) -> Self {
        Self {
            guest: VecGuest::new(256),
            env: HostEnv::new(document, window, 4096),
        }
    }

    /// Place `text` in guest memory as if the module had written it.
    pub(crate) fn put_str(&mut self, text: &str) -> (u32, u32) {
        let len = text.len() as u32;
        let ptr = self.guest.reserve(len);
        self.guest
            .view_mut()
            .and_then(|mut view| view.write_bytes(ptr, text.as_bytes()))
            .unwrap();
        (ptr, len)
    }
}

impl GuestMemory for FakeHost {
    fn allocate(&mut self, len: u32) -> Result<u32> {
        self.guest.allocate(len)
    }

    fn view(&mut self) -> Result<MemoryView<'_>> {
        self.guest.view()
    }

    fn view_mut(&mut self) -> Result<MemoryViewMut<'_>> {
        self.guest.view_mut()
    }
}

impl ShimContext for FakeHost {
    fn env(&mut self) -> &mut HostEnv {
        &mut self.env
    }
}
