//! Views onto a guest's linear memory.
//!
//! A view borrows the memory for as long as it lives. Anything that can
//! grow memory (the guest allocator) needs the guest mutably, so the
//! borrow checker refuses to keep a view alive across such a call and a
//! fresh view must be taken afterwards.
//!
//! Every access is an explicit `(ptr, len)` range. Out-of-range access is a
//! hard [`BridgeError::MemoryAccess`]; nothing tries to recover from it.

use crate::error::{BridgeError, Result};

/// Read-only view.
#[derive(Debug, Clone, Copy)]
pub struct MemoryView<'a> {
    bytes: &'a [u8],
}

/// Read-write view.
#[derive(Debug)]
pub struct MemoryViewMut<'a> {
    bytes: &'a mut [u8],
}

fn range(ptr: u32, len: u32, memory_size: usize) -> Result<std::ops::Range<usize>> {
    let start = ptr as usize;
    start
        .checked_add(len as usize)
        .filter(|&end| end <= memory_size)
        .map(|end| start..end)
        .ok_or(BridgeError::MemoryAccess {
            ptr,
            len,
            memory_size,
        })
}

impl<'a> MemoryView<'a> {
    /// Wrap the current memory contents.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Memory size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Borrow `len` bytes at `ptr`.
    pub fn read_bytes(&self, ptr: u32, len: u32) -> Result<&'a [u8]> {
        let range = range(ptr, len, self.bytes.len())?;
        Ok(&self.bytes[range])
    }

    /// Decode `len` bytes at `ptr` as UTF-8, replacing invalid sequences.
    pub fn read_string(&self, ptr: u32, len: u32) -> Result<String> {
        Ok(String::from_utf8_lossy(self.read_bytes(ptr, len)?).into_owned())
    }

    /// Little-endian `u32` at `ptr`.
    pub fn read_u32(&self, ptr: u32) -> Result<u32> {
        let bytes = self.read_bytes(ptr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl<'a> MemoryViewMut<'a> {
    /// Wrap the current memory contents for writing.
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Memory size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Read-only reborrow.
    pub fn as_view(&self) -> MemoryView<'_> {
        MemoryView::new(&*self.bytes)
    }

    /// Copy `data` to `[ptr, ptr + data.len())`.
    pub fn write_bytes(&mut self, ptr: u32, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| BridgeError::MemoryAccess {
            ptr,
            len: u32::MAX,
            memory_size: self.bytes.len(),
        })?;
        let range = range(ptr, len, self.bytes.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Store `value` little-endian in 4 bytes at `ptr`.
    pub fn write_u32(&mut self, ptr: u32, value: u32) -> Result<()> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }
}
