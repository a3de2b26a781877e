//! Order lifecycle
//!
//! - [`storage`] - redb-backed Order Store
//! - [`engine`] - creation and transitions, with notification
//! - [`transitions`] - configurable transition policy
//! - [`money`] - Decimal arithmetic and line-item validation

pub mod engine;
pub mod error;
pub mod money;
pub mod storage;
pub mod transitions;

pub use engine::{LifecycleResult, OrderLifecycle};
pub use error::LifecycleError;
pub use storage::{OrderStore, RedbOrderStore, StorageError, StorageResult};
pub use transitions::{PaymentRule, StatusRule, TransitionPolicy, TransitionTable};
