//! API routes
//!
//! - [`health`] - banner and health check
//! - [`orders`] - order placement, transitions and bills

pub mod health;
pub mod orders;
