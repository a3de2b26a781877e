//! Real-time notification
//!
//! - [`bus`] - room membership and fan-out, transport independent
//! - [`access`] - pluggable room join policy
//! - [`gateway`] - WebSocket endpoint bridging sockets to the bus

pub mod access;
pub mod bus;
pub mod gateway;

pub use access::{AccessDenied, OpenRoomAccess, RoomAccess, RoomAccessMode, StaffTokenAccess};
pub use bus::{BusError, ConnectionId, Delivery, EventReceiver, NotificationBus};
