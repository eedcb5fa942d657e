//! Per-session host context.

use domlink_core::{Document, NodeId, Window};

use crate::objects::ObjectTable;
use crate::relay::EventRelay;

/// Everything the host side of one session owns.
///
/// Created when a session starts and dropped with it. Nothing here is
/// global, so independent sessions never observe each other.
pub struct HostEnv {
    /// The live document the guest mutates
    pub document: Document,
    /// Handles the guest holds onto document nodes
    pub objects: ObjectTable<NodeId>,
    /// Listeners installed by the guest
    pub relay: EventRelay,
    /// Sink for alerts and console output
    pub window: Box<dyn Window>,
}

impl HostEnv {
    /// Fresh context around `document`.
    pub fn new(document: Document, window: Box<dyn Window>, max_objects: usize) -> Self {
        Self {
            document,
            objects: ObjectTable::with_capacity(max_objects),
            relay: EventRelay::new(),
            window,
        }
    }
}

impl std::fmt::Debug for HostEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostEnv")
            .field("nodes", &self.document.len())
            .field("handles", &self.objects.len())
            .field("live_handles", &self.objects.live())
            .field("listeners", &self.relay.len())
            .finish_non_exhaustive()
    }
}
