//! NotificationBus: room-based fan-out of lifecycle events
//!
//! ```text
//! OrderLifecycle ──publish(room, event)──▶ NotificationBus
//!                                           ├── rooms: RoomKey → {ConnectionId}
//!                                           └── connections: ConnectionId → (mpsc::Sender, {RoomKey})
//!                                                   │ try_send
//!                                                   ▼
//!                                           gateway session (one per socket)
//! ```
//!
//! The bus is a stateless relay: an event reaches the connections joined to
//! the room at the moment of publish, at most once each, and is never queued
//! for later joiners.
//!
//! Membership lives behind a single mutex. `publish` enqueues to every member
//! while holding it, so a concurrent `leave` or `disconnect` is ordered
//! entirely before or entirely after a publish. Enqueueing is `try_send` on a
//! bounded per-connection channel and never blocks inside the lock; a full or
//! closed channel counts as a dropped delivery.

use parking_lot::Mutex;
use shared::message::{RoomKey, ServerEvent};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Default per-connection outbound queue capacity
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Identity of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Receiving half handed to the transport for one connection
pub type EventReceiver = mpsc::Receiver<Arc<ServerEvent>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("No subscribers in room {0}")]
    NoSubscribers(RoomKey),
}

/// Outcome of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Members the event was enqueued for
    pub delivered: usize,
    /// Members whose queue was full or closed
    pub dropped: usize,
}

struct Subscriber {
    tx: mpsc::Sender<Arc<ServerEvent>>,
    rooms: HashSet<RoomKey>,
}

#[derive(Default)]
struct Membership {
    connections: HashMap<ConnectionId, Subscriber>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
}

impl Membership {
    fn remove_from_room(&mut self, room: &RoomKey, conn: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&conn);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

/// Process-wide room membership and event relay
///
/// Cheap to clone; clones share the same membership.
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<Mutex<Membership>>,
    next_id: Arc<AtomicU64>,
    buffer: usize,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl NotificationBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Membership::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            buffer: buffer.max(1),
        }
    }

    /// Register a connection; it starts with no rooms
    pub fn connect(&self) -> (ConnectionId, EventReceiver) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);

        self.inner.lock().connections.insert(
            id,
            Subscriber {
                tx,
                rooms: HashSet::new(),
            },
        );
        tracing::debug!(connection_id = %id, "Bus connection registered");
        (id, rx)
    }

    /// Add a connection to a room. Returns `false` if it was already a member.
    pub fn join(&self, conn: ConnectionId, room: RoomKey) -> Result<bool, BusError> {
        let mut guard = self.inner.lock();
        let membership = &mut *guard;

        let subscriber = membership
            .connections
            .get_mut(&conn)
            .ok_or(BusError::UnknownConnection(conn))?;
        if !subscriber.rooms.insert(room.clone()) {
            return Ok(false);
        }
        membership.rooms.entry(room.clone()).or_default().insert(conn);

        tracing::debug!(connection_id = %conn, room = %room, "Joined room");
        Ok(true)
    }

    /// Remove a connection from a room. Returns `false` if it was not a member.
    pub fn leave(&self, conn: ConnectionId, room: &RoomKey) -> Result<bool, BusError> {
        let mut guard = self.inner.lock();

        let subscriber = guard
            .connections
            .get_mut(&conn)
            .ok_or(BusError::UnknownConnection(conn))?;
        if !subscriber.rooms.remove(room) {
            return Ok(false);
        }
        guard.remove_from_room(room, conn);

        tracing::debug!(connection_id = %conn, room = %room, "Left room");
        Ok(true)
    }

    /// Deliver an event to every current member of `room`
    ///
    /// An empty room yields `BusError::NoSubscribers`; callers treat every
    /// publish outcome as best-effort.
    pub fn publish(&self, room: &RoomKey, event: ServerEvent) -> Result<Delivery, BusError> {
        let kind = event.kind();
        let event = Arc::new(event);
        let guard = self.inner.lock();

        let Some(members) = guard.rooms.get(room) else {
            return Err(BusError::NoSubscribers(room.clone()));
        };

        let mut delivery = Delivery::default();
        for conn in members {
            let Some(subscriber) = guard.connections.get(conn) else {
                delivery.dropped += 1;
                continue;
            };
            match subscriber.tx.try_send(Arc::clone(&event)) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    delivery.dropped += 1;
                    tracing::warn!(connection_id = %conn, room = %room, event = kind, "Subscriber queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    delivery.dropped += 1;
                    tracing::debug!(connection_id = %conn, room = %room, event = kind, "Subscriber closed, event dropped");
                }
            }
        }

        tracing::debug!(
            room = %room,
            event = kind,
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            "Event published"
        );
        Ok(delivery)
    }

    /// Drop a connection and every room membership it holds
    ///
    /// Returns the number of rooms it was removed from. Unknown ids are a no-op.
    pub fn disconnect(&self, conn: ConnectionId) -> usize {
        let mut guard = self.inner.lock();

        let Some(subscriber) = guard.connections.remove(&conn) else {
            return 0;
        };
        for room in &subscriber.rooms {
            guard.remove_from_room(room, conn);
        }

        tracing::debug!(connection_id = %conn, rooms = subscriber.rooms.len(), "Bus connection removed");
        subscriber.rooms.len()
    }

    /// Members currently joined to `room`
    pub fn room_size(&self, room: &RoomKey) -> usize {
        self.inner.lock().rooms.get(room).map_or(0, HashSet::len)
    }

    /// Total number of (room, connection) memberships
    pub fn membership_size(&self) -> usize {
        self.inner.lock().rooms.values().map(HashSet::len).sum()
    }

    pub fn room_count(&self) -> usize {
        self.inner.lock().rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    pub fn is_member(&self, conn: ConnectionId, room: &RoomKey) -> bool {
        self.inner
            .lock()
            .rooms
            .get(room)
            .is_some_and(|members| members.contains(&conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderStatus, OrderStatusPayload, PaymentStatus};

    fn status_event(status: OrderStatus) -> ServerEvent {
        ServerEvent::OrderStatus(OrderStatusPayload {
            status,
            payment_status: PaymentStatus::Pending,
        })
    }

    #[test]
    fn test_only_joined_connection_receives() {
        let bus = NotificationBus::default();
        let room = RoomKey::restaurant("r1");

        let (joined, mut joined_rx) = bus.connect();
        let (_other, mut other_rx) = bus.connect();
        bus.join(joined, room.clone()).unwrap();

        let delivery = bus.publish(&room, status_event(OrderStatus::Ready)).unwrap();
        assert_eq!(delivery, Delivery { delivered: 1, dropped: 0 });

        let event = joined_rx.try_recv().unwrap();
        assert_eq!(*event, status_event(OrderStatus::Ready));
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn test_room_kinds_are_isolated() {
        let bus = NotificationBus::default();
        let (conn, mut rx) = bus.connect();
        bus.join(conn, RoomKey::order("x")).unwrap();

        assert_eq!(
            bus.publish(&RoomKey::restaurant("x"), status_event(OrderStatus::Pending)),
            Err(BusError::NoSubscribers(RoomKey::restaurant("x")))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_late_joiner_gets_nothing_retroactively() {
        let bus = NotificationBus::default();
        let room = RoomKey::order("o1");
        let (early, mut early_rx) = bus.connect();
        bus.join(early, room.clone()).unwrap();

        bus.publish(&room, status_event(OrderStatus::Preparing)).unwrap();

        let (late, mut late_rx) = bus.connect();
        bus.join(late, room.clone()).unwrap();
        assert!(late_rx.try_recv().is_err());
        assert!(early_rx.try_recv().is_ok());
    }

    #[test]
    fn test_join_is_idempotent_and_leave_is_explicit() {
        let bus = NotificationBus::default();
        let room = RoomKey::restaurant("r1");
        let (conn, _rx) = bus.connect();

        assert_eq!(bus.join(conn, room.clone()), Ok(true));
        assert_eq!(bus.join(conn, room.clone()), Ok(false));
        assert_eq!(bus.room_size(&room), 1);

        assert_eq!(bus.leave(conn, &room), Ok(true));
        assert_eq!(bus.leave(conn, &room), Ok(false));
        assert_eq!(bus.room_size(&room), 0);
        assert_eq!(bus.room_count(), 0);
    }

    #[test]
    fn test_disconnect_removes_all_memberships() {
        let bus = NotificationBus::default();
        let (conn, _rx) = bus.connect();
        bus.join(conn, RoomKey::restaurant("r1")).unwrap();
        bus.join(conn, RoomKey::order("o1")).unwrap();

        assert_eq!(bus.disconnect(conn), 2);
        assert!(!bus.is_member(conn, &RoomKey::restaurant("r1")));
        assert_eq!(bus.membership_size(), 0);
        assert_eq!(bus.connection_count(), 0);
        assert_eq!(bus.disconnect(conn), 0);
        assert_eq!(
            bus.join(conn, RoomKey::order("o1")),
            Err(BusError::UnknownConnection(conn))
        );
    }

    #[test]
    fn test_hundred_cycles_leave_no_residue() {
        let bus = NotificationBus::default();
        let room = RoomKey::restaurant("r1");
        let (resident, _resident_rx) = bus.connect();
        bus.join(resident, room.clone()).unwrap();

        let baseline = bus.membership_size();
        let baseline_connections = bus.connection_count();

        for i in 0..100 {
            let (conn, _rx) = bus.connect();
            bus.join(conn, room.clone()).unwrap();
            bus.join(conn, RoomKey::order(&format!("o{i}"))).unwrap();
            bus.leave(conn, &room).unwrap();
            bus.join(conn, room.clone()).unwrap();
            bus.disconnect(conn);
        }

        assert_eq!(bus.membership_size(), baseline);
        assert_eq!(bus.connection_count(), baseline_connections);
        assert_eq!(bus.room_count(), 1);
    }

    #[test]
    fn test_full_queue_counts_as_dropped() {
        let bus = NotificationBus::new(1);
        let room = RoomKey::order("o1");
        let (conn, mut rx) = bus.connect();
        bus.join(conn, room.clone()).unwrap();

        let first = bus.publish(&room, status_event(OrderStatus::Preparing)).unwrap();
        let second = bus.publish(&room, status_event(OrderStatus::Ready)).unwrap();
        assert_eq!(first.delivered, 1);
        assert_eq!(second, Delivery { delivered: 0, dropped: 1 });

        assert_eq!(*rx.try_recv().unwrap(), status_event(OrderStatus::Preparing));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_counts_as_dropped() {
        let bus = NotificationBus::default();
        let room = RoomKey::order("o1");
        let (conn, rx) = bus.connect();
        bus.join(conn, room.clone()).unwrap();
        drop(rx);

        let delivery = bus.publish(&room, status_event(OrderStatus::Ready)).unwrap();
        assert_eq!(delivery, Delivery { delivered: 0, dropped: 1 });
    }

    #[test]
    fn test_leave_during_publish_is_never_partial() {
        const MEMBERS: usize = 8;
        const ROUNDS: usize = 2000;

        let bus = NotificationBus::new(ROUNDS * 2);
        let room = RoomKey::restaurant("r1");

        let mut receivers = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..MEMBERS {
            let (conn, rx) = bus.connect();
            bus.join(conn, room.clone()).unwrap();
            ids.push(conn);
            receivers.push(rx);
        }
        let churner = ids[0];

        let churn_bus = bus.clone();
        let churn_room = room.clone();
        let churn = std::thread::spawn(move || {
            for _ in 0..ROUNDS {
                churn_bus.leave(churner, &churn_room).unwrap();
                churn_bus.join(churner, churn_room.clone()).unwrap();
            }
        });

        let publish_bus = bus.clone();
        let publish_room = room.clone();
        let publisher = std::thread::spawn(move || {
            (0..ROUNDS)
                .map(|_| {
                    publish_bus
                        .publish(&publish_room, status_event(OrderStatus::Preparing))
                        .unwrap()
                })
                .collect::<Vec<_>>()
        });

        churn.join().unwrap();
        let deliveries = publisher.join().unwrap();

        for delivery in &deliveries {
            assert_eq!(delivery.dropped, 0);
            assert!(
                delivery.delivered == MEMBERS || delivery.delivered == MEMBERS - 1,
                "torn publish: {delivery:?}"
            );
        }

        // Every steady member saw every event exactly once
        for rx in receivers.iter_mut().skip(1) {
            let mut count = 0;
            while rx.try_recv().is_ok() {
                count += 1;
            }
            assert_eq!(count, ROUNDS);
        }
        assert_eq!(bus.room_size(&room), MEMBERS);
    }
}
