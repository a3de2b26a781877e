//! Shared types for the ordering server
//!
//! Wire types used by the server and its clients: the unified error system,
//! the order model, the bill view, and realtime message frames.

pub mod error;
pub mod message;
pub mod order;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use message::{ClientEvent, RoomKey, ServerEvent};
