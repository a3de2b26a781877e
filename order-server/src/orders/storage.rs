//! redb-based Order Store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` (JSON) | Order records |
//! | `restaurant_orders` | `(restaurant_id, created_at, order_id)` | `()` | Per-restaurant index, ordered by creation time |
//!
//! Both tables are always written in the same write transaction, so the index
//! never points at a missing order.
//!
//! # Blocking
//!
//! redb calls are synchronous. The [`OrderStore`] implementation runs them on
//! the blocking pool and bounds each call with the configured timeout.
//!
//! Writes pass a [`CommitGate`] before committing. When the caller's deadline
//! elapses first, the gate is closed and the write aborts instead of landing
//! late, so [`StorageError::Timeout`] always means nothing was written. When
//! the commit is already under way at the deadline, the caller waits for it
//! and gets the real result.

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use shared::order::{Order, OrderStatus, PaymentStatus};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Orders: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Index: key = (restaurant_id, created_at, order_id), value = empty
const RESTAURANT_ORDERS_TABLE: TableDefinition<(&str, i64, &str), ()> =
    TableDefinition::new("restaurant_orders");

/// Default bound on a single store call
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order already exists: {0}")]
    OrderExists(String),

    #[error("Storage call timed out after {0}ms")]
    Timeout(u128),

    #[error("Storage task failed: {0}")]
    Task(String),

    #[error("Storage write abandoned after its deadline")]
    Abandoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence collaborator of the lifecycle engine
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order. Fails with `OrderExists` on id collision.
    async fn insert(&self, order: &Order) -> StorageResult<()>;

    async fn get(&self, order_id: &str) -> StorageResult<Option<Order>>;

    /// Orders of one restaurant, newest first
    async fn list_for_restaurant(&self, restaurant_id: &str) -> StorageResult<Vec<Order>>;

    /// Overwrite status fields and return the stored result.
    /// Fails with `OrderNotFound` when the order does not exist.
    async fn update_state(
        &self,
        order_id: &str,
        status: OrderStatus,
        payment_status: PaymentStatus,
        updated_at: i64,
    ) -> StorageResult<Order>;

    /// Remove an order. Returns `false` when it did not exist.
    async fn delete(&self, order_id: &str) -> StorageResult<bool>;
}

/// Hand-off between a blocking write and the caller waiting on it
///
/// Exactly one side wins: the writer enters the commit, or the caller
/// abandons the write.
#[derive(Debug, Clone, Default)]
pub struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
    const OPEN: u8 = 0;
    const COMMITTING: u8 = 1;
    const ABANDONED: u8 = 2;

    /// Writer side. `false` means the caller already gave up.
    pub fn enter_commit(&self) -> bool {
        self.0
            .compare_exchange(
                Self::OPEN,
                Self::COMMITTING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Caller side. `false` means the commit is already under way.
    pub fn abandon(&self) -> bool {
        self.0
            .compare_exchange(
                Self::OPEN,
                Self::ABANDONED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Commit unless the gate was closed; an abandoned transaction is aborted
fn commit_gated(write_txn: WriteTransaction, gate: &CommitGate) -> StorageResult<()> {
    if !gate.enter_commit() {
        write_txn.abort()?;
        return Err(StorageError::Abandoned);
    }
    write_txn.commit()?;
    Ok(())
}

/// Order store backed by redb
#[derive(Clone)]
pub struct RedbOrderStore {
    db: Arc<Database>,
    timeout: Duration,
}

impl RedbOrderStore {
    /// Open or create the database at the given path
    ///
    /// redb commits are durable once `commit()` returns (copy-on-write with an
    /// atomic root swap), so a crash never leaves a half-written order.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests and ephemeral runs)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(RESTAURANT_ORDERS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            timeout: DEFAULT_STORAGE_TIMEOUT,
        })
    }

    /// Set the bound applied to each async store call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // ========== Synchronous Operations ==========

    pub fn insert_order(&self, order: &Order) -> StorageResult<()> {
        self.insert_order_gated(order, &CommitGate::default())
    }

    fn insert_order_gated(&self, order: &Order, gate: &CommitGate) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut orders = write_txn.open_table(ORDERS_TABLE)?;
            if orders.get(order.id.as_str())?.is_some() {
                return Err(StorageError::OrderExists(order.id.clone()));
            }
            let value = serde_json::to_vec(order)?;
            orders.insert(order.id.as_str(), value.as_slice())?;

            let mut index = write_txn.open_table(RESTAURANT_ORDERS_TABLE)?;
            index.insert(
                (
                    order.restaurant_id.as_str(),
                    order.created_at,
                    order.id.as_str(),
                ),
                (),
            )?;
        }
        commit_gated(write_txn, gate)
    }

    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => {
                let order: Order = serde_json::from_slice(value.value())?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    pub fn orders_for_restaurant(&self, restaurant_id: &str) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(RESTAURANT_ORDERS_TABLE)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;

        let mut ids = Vec::new();
        for entry in index.range((restaurant_id, i64::MIN, "")..)? {
            let (key, _) = entry?;
            let (rid, _, order_id) = key.value();
            if rid != restaurant_id {
                break;
            }
            ids.push(order_id.to_string());
        }

        let mut result = Vec::with_capacity(ids.len());
        for order_id in ids.iter().rev() {
            match orders.get(order_id.as_str())? {
                Some(value) => result.push(serde_json::from_slice(value.value())?),
                None => {
                    tracing::warn!(order_id = %order_id, "Index entry without order record");
                }
            }
        }
        Ok(result)
    }

    pub fn update_order_state(
        &self,
        order_id: &str,
        status: OrderStatus,
        payment_status: PaymentStatus,
        updated_at: i64,
    ) -> StorageResult<Order> {
        self.update_order_state_gated(
            order_id,
            status,
            payment_status,
            updated_at,
            &CommitGate::default(),
        )
    }

    fn update_order_state_gated(
        &self,
        order_id: &str,
        status: OrderStatus,
        payment_status: PaymentStatus,
        updated_at: i64,
        gate: &CommitGate,
    ) -> StorageResult<Order> {
        let write_txn = self.db.begin_write()?;
        let order = {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            let mut order: Order = match table.get(order_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::OrderNotFound(order_id.to_string())),
            };
            order.status = status;
            order.payment_status = payment_status;
            order.updated_at = updated_at;

            let value = serde_json::to_vec(&order)?;
            table.insert(order_id, value.as_slice())?;
            order
        };
        commit_gated(write_txn, gate)?;
        Ok(order)
    }

    pub fn delete_order(&self, order_id: &str) -> StorageResult<bool> {
        self.delete_order_gated(order_id, &CommitGate::default())
    }

    fn delete_order_gated(&self, order_id: &str, gate: &CommitGate) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            let existing: Option<Order> = match table.remove(order_id)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            match existing {
                Some(order) => {
                    let mut index = write_txn.open_table(RESTAURANT_ORDERS_TABLE)?;
                    index.remove((
                        order.restaurant_id.as_str(),
                        order.created_at,
                        order.id.as_str(),
                    ))?;
                    true
                }
                None => false,
            }
        };
        commit_gated(write_txn, gate)?;
        Ok(removed)
    }

    /// Number of stored orders
    pub fn order_count(&self) -> StorageResult<u64> {
        use redb::ReadableTableMetadata;

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        Ok(table.len()?)
    }

    /// Run a synchronous operation on the blocking pool, bounded by the timeout
    async fn run_blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&RedbOrderStore) -> StorageResult<T> + Send + 'static,
    {
        let store = self.clone();
        let task = tokio::task::spawn_blocking(move || op(&store));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(StorageError::Task(join_err.to_string())),
            Err(_) => Err(StorageError::Timeout(self.timeout.as_millis())),
        }
    }

    /// Run a write on the blocking pool; past the deadline it either never
    /// commits or is awaited to completion
    async fn run_write<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&RedbOrderStore, &CommitGate) -> StorageResult<T> + Send + 'static,
    {
        let store = self.clone();
        let gate = CommitGate::default();
        let writer_gate = gate.clone();
        let mut task = tokio::task::spawn_blocking(move || op(&store, &writer_gate));

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(joined) => joined.map_err(|e| StorageError::Task(e.to_string()))?,
            Err(_) if gate.abandon() => Err(StorageError::Timeout(self.timeout.as_millis())),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Storage write passed its deadline while committing"
                );
                task.await.map_err(|e| StorageError::Task(e.to_string()))?
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl OrderStore for RedbOrderStore {
    async fn insert(&self, order: &Order) -> StorageResult<()> {
        let order = order.clone();
        self.run_write(move |s, gate| s.insert_order_gated(&order, gate))
            .await
    }

    async fn get(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let order_id = order_id.to_string();
        self.run_blocking(move |s| s.get_order(&order_id)).await
    }

    async fn list_for_restaurant(&self, restaurant_id: &str) -> StorageResult<Vec<Order>> {
        let restaurant_id = restaurant_id.to_string();
        self.run_blocking(move |s| s.orders_for_restaurant(&restaurant_id))
            .await
    }

    async fn update_state(
        &self,
        order_id: &str,
        status: OrderStatus,
        payment_status: PaymentStatus,
        updated_at: i64,
    ) -> StorageResult<Order> {
        let order_id = order_id.to_string();
        self.run_write(move |s, gate| {
            s.update_order_state_gated(&order_id, status, payment_status, updated_at, gate)
        })
        .await
    }

    async fn delete(&self, order_id: &str) -> StorageResult<bool> {
        let order_id = order_id.to_string();
        self.run_write(move |s, gate| s.delete_order_gated(&order_id, gate))
            .await
    }
}
