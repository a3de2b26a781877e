//! Health routes
//!
//! | Path | Method | Description | Auth |
//! |------|--------|-------------|------|
//! | / | GET | plain-text banner | none |
//! | /health | GET | status with realtime counters | none |
//!
//! ```json
//! { "status": "ok", "version": "0.1.0", "connections": 3, "rooms": 2 }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;

pub const BANNER: &str = "Restaurant QR ordering server running";

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Open realtime connections
    connections: usize,
    /// Rooms with at least one member
    rooms: usize,
}

async fn banner() -> &'static str {
    BANNER
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connections: state.bus.connection_count(),
        rooms: state.bus.room_count(),
    })
}
