//! Presence registry: the live mapping from authenticated identity to
//! connection(s), plus named broadcast rooms.
//!
//! Three addressing primitives: direct (`emit_to_user`), topic rooms
//! (`drivers` / `riders`) and per-booking rooms (`booking:{id}`). Delivery is
//! fire-and-forget; a send to a user with no live connection is dropped, the
//! database remains the durable source of truth and clients reconcile by
//! refetching on reconnect.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::events::ServerEvent;

pub const DRIVERS_ROOM: &str = "drivers";
pub const RIDERS_ROOM: &str = "riders";

pub fn booking_room(booking_id: Uuid) -> String {
    format!("booking:{}", booking_id)
}

struct Connection {
    user_id: Uuid,
    tx: UnboundedSender<ServerEvent>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<Uuid, Connection>,
    /// user id -> connection ids (a user may hold several tabs/devices)
    users: HashMap<Uuid, HashSet<Uuid>>,
    rooms: HashMap<String, HashSet<Uuid>>,
}

#[derive(Default)]
pub struct SocketRegistry {
    inner: RwLock<Inner>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and auto-join the identity-scoped direct address.
    pub async fn register(&self, conn_id: Uuid, user_id: Uuid, tx: UnboundedSender<ServerEvent>) {
        let mut inner = self.inner.write().await;
        inner.connections.insert(conn_id, Connection { user_id, tx });
        inner.users.entry(user_id).or_default().insert(conn_id);
    }

    /// Remove one connection; other connections of the same user stay registered.
    pub async fn remove(&self, conn_id: Uuid) {
        let mut inner = self.inner.write().await;
        if let Some(conn) = inner.connections.remove(&conn_id) {
            if let Some(conns) = inner.users.get_mut(&conn.user_id) {
                conns.remove(&conn_id);
                if conns.is_empty() {
                    inner.users.remove(&conn.user_id);
                }
            }
        }
        for members in inner.rooms.values_mut() {
            members.remove(&conn_id);
        }
        inner.rooms.retain(|_, members| !members.is_empty());
    }

    pub async fn join_room(&self, conn_id: Uuid, room: &str) {
        let mut inner = self.inner.write().await;
        if inner.connections.contains_key(&conn_id) {
            inner.rooms.entry(room.to_string()).or_default().insert(conn_id);
        }
    }

    pub async fn leave_room(&self, conn_id: Uuid, room: &str) {
        let mut inner = self.inner.write().await;
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(&conn_id);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
    }

    /// Join every live connection of a user to a room. Used when the engine
    /// links rider and driver into a booking room on acceptance.
    pub async fn join_user_to_room(&self, user_id: Uuid, room: &str) {
        let mut inner = self.inner.write().await;
        let conns: Vec<Uuid> = inner
            .users
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        if conns.is_empty() {
            return;
        }
        let members = inner.rooms.entry(room.to_string()).or_default();
        for conn_id in conns {
            members.insert(conn_id);
        }
    }

    pub async fn is_connected(&self, user_id: Uuid) -> bool {
        self.inner.read().await.users.contains_key(&user_id)
    }

    /// Deliver to every connection of one user. Dropped silently if offline.
    pub async fn emit_to_user(&self, user_id: Uuid, event: &ServerEvent) {
        let inner = self.inner.read().await;
        let Some(conns) = inner.users.get(&user_id) else {
            return;
        };
        for conn_id in conns {
            if let Some(conn) = inner.connections.get(conn_id) {
                let _ = conn.tx.send(event.clone());
            }
        }
    }

    pub async fn emit_to_room(&self, room: &str, event: &ServerEvent) {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(room) else {
            return;
        };
        for conn_id in members {
            if let Some(conn) = inner.connections.get(conn_id) {
                let _ = conn.tx.send(event.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn event() -> ServerEvent {
        ServerEvent::RideCompleted {
            booking_id: Uuid::nil(),
        }
    }

    #[tokio::test]
    async fn direct_delivery_reaches_all_connections_of_a_user() {
        let registry = SocketRegistry::new();
        let user = Uuid::new_v4();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(Uuid::new_v4(), user, tx1).await;
        registry.register(Uuid::new_v4(), user, tx2).await;

        registry.emit_to_user(user, &event()).await;
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn send_to_offline_user_is_dropped() {
        let registry = SocketRegistry::new();
        // no panic, no queueing
        registry.emit_to_user(Uuid::new_v4(), &event()).await;
    }

    #[tokio::test]
    async fn room_broadcast_skips_non_members() {
        let registry = SocketRegistry::new();
        let (tx_in, mut rx_in) = mpsc::unbounded_channel();
        let (tx_out, mut rx_out) = mpsc::unbounded_channel();
        let conn_in = Uuid::new_v4();
        let conn_out = Uuid::new_v4();
        registry.register(conn_in, Uuid::new_v4(), tx_in).await;
        registry.register(conn_out, Uuid::new_v4(), tx_out).await;
        registry.join_room(conn_in, DRIVERS_ROOM).await;

        registry.emit_to_room(DRIVERS_ROOM, &event()).await;
        assert!(rx_in.try_recv().is_ok());
        assert!(rx_out.try_recv().is_err());
    }

    #[tokio::test]
    async fn leaving_a_booking_room_stops_delivery() {
        let registry = SocketRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();
        let room = booking_room(Uuid::new_v4());
        registry.register(conn, Uuid::new_v4(), tx).await;
        registry.join_room(conn, &room).await;
        registry.emit_to_room(&room, &event()).await;
        assert!(rx.try_recv().is_ok());

        registry.leave_room(conn, &room).await;
        registry.emit_to_room(&room, &event()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn remove_purges_presence_and_rooms() {
        let registry = SocketRegistry::new();
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(conn, user, tx).await;
        registry.join_room(conn, DRIVERS_ROOM).await;
        assert!(registry.is_connected(user).await);

        registry.remove(conn).await;
        assert!(!registry.is_connected(user).await);
        registry.emit_to_room(DRIVERS_ROOM, &event()).await;
        registry.emit_to_user(user, &event()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn removing_one_connection_keeps_the_other() {
        let registry = SocketRegistry::new();
        let user = Uuid::new_v4();
        let conn1 = Uuid::new_v4();
        let conn2 = Uuid::new_v4();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(conn1, user, tx1).await;
        registry.register(conn2, user, tx2).await;

        registry.remove(conn1).await;
        assert!(registry.is_connected(user).await);
        registry.emit_to_user(user, &event()).await;
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn join_user_to_room_covers_all_connections() {
        let registry = SocketRegistry::new();
        let user = Uuid::new_v4();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(Uuid::new_v4(), user, tx1).await;
        registry.register(Uuid::new_v4(), user, tx2).await;

        let room = booking_room(Uuid::new_v4());
        registry.join_user_to_room(user, &room).await;
        registry.emit_to_room(&room, &event()).await;
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
