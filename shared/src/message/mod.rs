//! Realtime channel message types
//!
//! Frames are JSON objects of the form `{"event": <name>, "data": <payload>}`
//! in both directions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::order::{OrderStatusPayload, ResolvedOrder};

/// Name of a subscription room
///
/// Keys are namespaced by room kind so a restaurant id can never collide with
/// an order id. The bus treats them as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomKey(String);

impl RoomKey {
    /// Room receiving `new_order` events for one restaurant
    pub fn restaurant(restaurant_id: &str) -> Self {
        Self(format!("restaurant:{restaurant_id}"))
    }

    /// Room receiving `order_status` events for one order
    pub fn order(order_id: &str) -> Self {
        Self(format!("order:{order_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target of a join/leave request: a bare id or an id with a capability token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomTarget {
    Id(String),
    WithToken {
        id: String,
        #[serde(default)]
        token: Option<String>,
    },
}

impl RoomTarget {
    pub fn id(&self) -> &str {
        match self {
            RoomTarget::Id(id) | RoomTarget::WithToken { id, .. } => id,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            RoomTarget::Id(_) => None,
            RoomTarget::WithToken { token, .. } => token.as_deref(),
        }
    }
}

/// Client → server events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRestaurant(RoomTarget),
    JoinOrder(RoomTarget),
    LeaveRestaurant(RoomTarget),
    LeaveOrder(RoomTarget),
}

impl ClientEvent {
    /// Room addressed by this event
    pub fn room(&self) -> RoomKey {
        match self {
            ClientEvent::JoinRestaurant(t) | ClientEvent::LeaveRestaurant(t) => {
                RoomKey::restaurant(t.id())
            }
            ClientEvent::JoinOrder(t) | ClientEvent::LeaveOrder(t) => RoomKey::order(t.id()),
        }
    }

    pub fn target(&self) -> &RoomTarget {
        match self {
            ClientEvent::JoinRestaurant(t)
            | ClientEvent::JoinOrder(t)
            | ClientEvent::LeaveRestaurant(t)
            | ClientEvent::LeaveOrder(t) => t,
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(
            self,
            ClientEvent::JoinRestaurant(_) | ClientEvent::JoinOrder(_)
        )
    }
}

/// Server → client events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Published to a restaurant room when an order is placed
    NewOrder(Box<ResolvedOrder>),
    /// Published to an order room after a transition
    OrderStatus(OrderStatusPayload),
    /// Sent only to the offending connection
    Error { message: String },
}

impl ServerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::NewOrder(_) => "new_order",
            ServerEvent::OrderStatus(_) => "order_status",
            ServerEvent::Error { .. } => "error",
        }
    }
}
