//! Change notifier: pushes invalidation events to connected clients when a
//! mutation can change a resolved permission set.
//!
//! Delivery is fire-and-forget message passing. The mutation's result is
//! finalized independently of delivery; a dropped event is harmless because
//! clients re-resolve their permissions lazily on their next check. No
//! ordering is guaranteed across affected users, and delivery is at-most-once
//! per emission.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::store::Store;

const ROOM_CAPACITY: usize = 16;

/// Events pushed over the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A specific user's resolved permission set may have changed.
    PermissionsUpdated,
    /// The role/permission catalog changed (relevant to UI lists, not to a
    /// specific identity's authorization outcome).
    CatalogUpdated,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::PermissionsUpdated => "permissions_updated",
            Event::CatalogUpdated => "catalog_updated",
        }
    }
}

/// Publish/subscribe hub keyed by user id, plus a global broadcast channel.
pub struct RealtimeHub {
    rooms: RwLock<HashMap<Uuid, broadcast::Sender<Event>>>,
    lobby: broadcast::Sender<Event>,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        let (lobby, _) = broadcast::channel(ROOM_CAPACITY);
        Self { rooms: RwLock::new(HashMap::new()), lobby }
    }

    /// Join the per-user room, creating it on first subscribe.
    pub fn subscribe_user(&self, user_id: Uuid) -> broadcast::Receiver<Event> {
        let mut rooms = self.rooms.write();
        rooms
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.lobby.subscribe()
    }

    /// Send to one user's room. Errors mean nobody is listening; the idle
    /// room is dropped and the event is discarded.
    pub fn emit_to_user(&self, user_id: &Uuid, event: Event) {
        let tx = self.rooms.read().get(user_id).cloned();
        if let Some(tx) = tx {
            if tx.send(event).is_err() {
                self.rooms.write().remove(user_id);
            }
        }
    }

    pub fn emit_broadcast(&self, event: Event) {
        let _ = self.lobby.send(event);
    }
}

/// Emit a `permissions_updated` invalidation to every user currently assigned
/// to the role. The affected set is looked up at emit time, not from cached
/// membership, so a reassignment between mutation and emission at worst
/// produces one extra or one missed (harmless) signal.
pub fn notify_role_members(store: &Store, hub: &RealtimeHub, role_id: &Uuid) {
    let affected = store.find_users_by_role(role_id);
    debug!(role = %role_id, affected = affected.len(), "emitting permission invalidations");
    for user in &affected {
        hub.emit_to_user(&user.id, Event::PermissionsUpdated);
    }
}

/// Broadcast that the role/permission catalog changed.
pub fn notify_catalog_changed(hub: &RealtimeHub) {
    hub.emit_broadcast(Event::CatalogUpdated);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_user_rooms_are_isolated() {
        let hub = RealtimeHub::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = hub.subscribe_user(a);
        let mut rx_b = hub.subscribe_user(b);

        hub.emit_to_user(&a, Event::PermissionsUpdated);
        assert_eq!(rx_a.try_recv().unwrap(), Event::PermissionsUpdated);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn emit_without_subscriber_is_a_no_op() {
        let hub = RealtimeHub::new();
        // Never panics or errors; delivery is fire-and-forget
        hub.emit_to_user(&Uuid::new_v4(), Event::PermissionsUpdated);
        hub.emit_broadcast(Event::CatalogUpdated);
    }

    #[test]
    fn broadcast_reaches_all_lobby_subscribers() {
        let hub = RealtimeHub::new();
        let mut rx1 = hub.subscribe_all();
        let mut rx2 = hub.subscribe_all();
        hub.emit_broadcast(Event::CatalogUpdated);
        assert_eq!(rx1.try_recv().unwrap(), Event::CatalogUpdated);
        assert_eq!(rx2.try_recv().unwrap(), Event::CatalogUpdated);
    }
}
