//! Order Server - QR restaurant ordering backend
//!
//! Diners scan a table code and place orders over REST; staff dashboards
//! follow them in real time over a WebSocket channel.
//!
//! # Module layout
//!
//! ```text
//! order-server/src/
//! ├── core/          # config, state, errors, HTTP server
//! ├── auth/          # JWT, staff checks, extractors
//! ├── directory/     # restaurants, tables, menu items
//! ├── orders/        # store, money, transitions, lifecycle engine
//! ├── realtime/      # notification bus, room access, WebSocket gateway
//! ├── bill/          # bill projection and PDF rendering
//! ├── api/           # HTTP routes and handlers
//! └── utils/         # logging, validation
//! ```

pub mod api;
pub mod auth;
pub mod bill;
pub mod core;
pub mod directory;
pub mod orders;
pub mod realtime;
pub mod utils;

// Re-export public types
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState, build_app};
pub use orders::{OrderLifecycle, OrderStore, RedbOrderStore};
pub use realtime::NotificationBus;
pub use utils::{AppError, AppResult};

// Re-export unified error types from shared
pub use utils::{ApiResponse, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_from_env, init_logger_with_file};

// Security logging macro
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

pub fn print_banner() {
    println!(
        r#"
  ___          _           ___
 / _ \ _ _ __| |___ _ _  / __| ___ _ ___ _____ _ _
| (_) | '_/ _` / -_) '_| \__ \/ -_) '_\ V / -_) '_|
 \___/|_| \__,_\___|_|   |___/\___|_|  \_/\___|_|
    "#
    );
}
