//! Authentication and staff authorization
//!
//! - [`jwt`] - token validation and claims
//! - [`extractor`] - axum extractors for the caller
//! - [`authorizer`] - restaurant staff checks

pub mod authorizer;
pub mod extractor;
pub mod jwt;

pub use authorizer::{DirectoryAuthorizer, StaffAuthorizer};
pub use extractor::MaybeUser;
pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
