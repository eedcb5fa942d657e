//! Moving strings and byte buffers across the guest boundary.
//!
//! Outgoing data is copied into memory obtained from the guest's
//! allocator export. Empty payloads never touch the allocator: they are
//! reported as `None` so callers can short-circuit.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::memory::{MemoryView, MemoryViewMut};

/// A `[ptr, ptr + len)` range in guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Start offset
    pub ptr: u32,
    /// Length in bytes
    pub len: u32,
}

impl Region {
    /// Build a region from a raw guest pair.
    pub fn new(ptr: u32, len: u32) -> Self {
        Self { ptr, len }
    }
}

/// Access to a guest's linear memory and allocator.
///
/// Implementations must hand out a view of the memory as it is *now*;
/// views are never cached across [`GuestMemory::allocate`].
pub trait GuestMemory {
    /// Call the guest allocator. `0` means the guest is out of memory.
    fn allocate(&mut self, len: u32) -> Result<u32>;

    /// Fresh read-only view.
    fn view(&mut self) -> Result<MemoryView<'_>>;

    /// Fresh read-write view.
    fn view_mut(&mut self) -> Result<MemoryViewMut<'_>>;
}

/// UTF-8 encode `text` into freshly allocated guest memory.
pub fn encode_and_store<G>(guest: &mut G, text: &str) -> Result<Option<Region>>
where
    G: GuestMemory + ?Sized,
{
    store_bytes(guest, text.as_bytes())
}

/// Copy raw bytes into freshly allocated guest memory.
///
/// Returns `None` for an empty payload without calling the allocator.
/// A null pointer from the allocator is [`BridgeError::AllocationFailed`].
pub fn store_bytes<G>(guest: &mut G, bytes: &[u8]) -> Result<Option<Region>>
where
    G: GuestMemory + ?Sized,
{
    if bytes.is_empty() {
        return Ok(None);
    }
    let len = u32::try_from(bytes.len()).map_err(|_| {
        BridgeError::ResourceExhausted(format!("{} byte payload exceeds guest address space", bytes.len()))
    })?;
    let ptr = guest.allocate(len)?;
    if ptr == 0 {
        tracing::error!(len, "guest allocator returned null");
        return Err(BridgeError::AllocationFailed { len });
    }
    // the allocator may have grown memory; take the view only now
    guest.view_mut()?.write_bytes(ptr, bytes)?;
    Ok(Some(Region { ptr, len }))
}

/// Decode a UTF-8 region. Pure read, no allocation.
pub fn decode<G>(guest: &mut G, region: Region) -> Result<String>
where
    G: GuestMemory + ?Sized,
{
    guest.view()?.read_string(region.ptr, region.len)
}

/// Copy a region out as raw bytes.
pub fn read_bytes<G>(guest: &mut G, region: Region) -> Result<Vec<u8>>
where
    G: GuestMemory + ?Sized,
{
    Ok(guest.view()?.read_bytes(region.ptr, region.len)?.to_vec())
}

/// Report `region` through a result slot pair: its address goes to
/// `ptr_addr` and its length to `len_addr`, both little-endian `u32`.
pub fn write_result_slots<G>(guest: &mut G, region: Region, ptr_addr: u32, len_addr: u32) -> Result<()>
where
    G: GuestMemory + ?Sized,
{
    let mut view = guest.view_mut()?;
    view.write_u32(ptr_addr, region.ptr)?;
    view.write_u32(len_addr, region.len)
}
