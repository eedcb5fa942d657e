//! Event registrations and routing back into the guest.
//!
//! A registration ties a host node and an event name to a guest-chosen
//! dispatch id. When the host fires an event, [`EventRelay::route`] turns it
//! into an explicit list of [`PendingDispatch`] records; the runtime then
//! delivers each one through the guest's single dispatch export. The guest
//! alone maps dispatch ids back to its handlers.
//!
//! Registrations are keyed on the node, not on the handle used to create
//! them, and live until the session ends.

use std::collections::HashMap;

use domlink_core::{Document, NodeId};
use serde::{Deserialize, Serialize};

use crate::objects::Handle;

/// A listener installed by the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Node the listener is attached to
    pub target: NodeId,
    /// Handle the guest used when registering
    pub handle: Handle,
    /// Event name, e.g. `click`
    pub event: String,
    /// Token passed back to the guest's dispatch export
    pub dispatch_id: u32,
}

/// One guest callback about to be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDispatch {
    /// Token for the guest
    pub dispatch_id: u32,
    /// Node the event was fired on
    pub target: NodeId,
    /// Node whose listener matched (target or an ancestor)
    pub current_target: NodeId,
    /// Event name
    pub event: String,
}

/// All registrations of one session.
#[derive(Debug, Clone, Default)]
pub struct EventRelay {
    registrations: Vec<Registration>,
    index: HashMap<(NodeId, String), Vec<usize>>,
}

impl EventRelay {
    /// Empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a listener. Registering the same triple twice yields two
    /// deliveries per event, one per registration.
    pub fn register(&mut self, target: NodeId, handle: Handle, event: &str, dispatch_id: u32) {
        let position = self.registrations.len();
        self.registrations.push(Registration {
            target,
            handle,
            event: event.to_string(),
            dispatch_id,
        });
        self.index
            .entry((target, event.to_string()))
            .or_default()
            .push(position);
        tracing::debug!(?target, %handle, %event, dispatch_id, "listener registered");
    }

    /// Plan delivery of `event` fired on `target`.
    ///
    /// The target's listeners come first, then each ancestor's up to the
    /// document, each group in registration order.
    pub fn route(&self, document: &Document, target: NodeId, event: &str) -> Vec<PendingDispatch> {
        std::iter::once(target)
            .chain(document.ancestors(target))
            .flat_map(|node| {
                self.index
                    .get(&(node, event.to_string()))
                    .into_iter()
                    .flatten()
                    .map(move |&i| (node, &self.registrations[i]))
            })
            .map(|(node, registration)| PendingDispatch {
                dispatch_id: registration.dispatch_id,
                target,
                current_target: node,
                event: event.to_string(),
            })
            .collect()
    }

    /// Every registration, oldest first.
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
