//! Handle table mapping small integers to host objects.
//!
//! Slots are append-only. Releasing a handle leaves a tombstone in its slot
//! forever, so a handle value is never handed out twice during a session.
//! Handle `0` is reserved as [`Handle::NULL`] and never names an object.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Opaque reference to a host object, as seen by the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u32);

impl Handle {
    /// The reserved "no object" handle.
    pub const NULL: Handle = Handle(0);

    /// Reinterpret a raw value received from the guest.
    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    /// Raw value passed to the guest.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is [`Handle::NULL`].
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Live(T),
    Released,
}

/// Append-only handle table.
#[derive(Debug, Clone)]
pub struct ObjectTable<T> {
    slots: Vec<Slot<T>>,
    live: usize,
    capacity: usize,
}

impl<T> Default for ObjectTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectTable<T> {
    /// Table with room for `u32::MAX - 1` handles.
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    /// Table that refuses to issue more than `capacity` handles in total.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            capacity: capacity.min(u32::MAX as usize - 1),
        }
    }

    /// Store `object` and return its new handle.
    ///
    /// Handles are 1-based and strictly increasing. Released slots count
    /// against the capacity since they are never reused.
    pub fn push(&mut self, object: T) -> Result<Handle> {
        if self.slots.len() >= self.capacity {
            return Err(BridgeError::ResourceExhausted(format!(
                "object table full ({} handles issued)",
                self.slots.len()
            )));
        }
        self.slots.push(Slot::Live(object));
        self.live += 1;
        // capacity < u32::MAX keeps this in range
        Ok(Handle(self.slots.len() as u32))
    }

    /// The live object behind `handle`.
    ///
    /// `None` for [`Handle::NULL`], released handles, and handles never issued.
    pub fn resolve(&self, handle: Handle) -> Option<&T> {
        let index = (handle.0 as usize).checked_sub(1)?;
        match self.slots.get(index)? {
            Slot::Live(object) => Some(object),
            Slot::Released => None,
        }
    }

    /// Tombstone `handle`. Releasing twice or releasing an unknown handle
    /// does nothing. Returns whether a live object was dropped.
    pub fn release(&mut self, handle: Handle) -> bool {
        let Some(slot) = (handle.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i))
        else {
            return false;
        };
        match std::mem::replace(slot, Slot::Released) {
            Slot::Live(_) => {
                self.live -= 1;
                true
            }
            Slot::Released => false,
        }
    }

    /// Handles issued so far, live or released.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no handle has been issued yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Handles still resolvable.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Iterate live `(handle, object)` pairs in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Live(object) => Some((Handle(i as u32 + 1), object)),
            Slot::Released => None,
        })
    }
}
