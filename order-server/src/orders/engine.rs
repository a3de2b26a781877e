//! OrderLifecycle - order creation and status/payment transitions
//!
//! # Flow
//!
//! ```text
//! create_order(restaurant, table, items)
//!     ├─ 1. Validate line items (nothing persisted on failure)
//!     ├─ 2. Compute total with Decimal arithmetic
//!     ├─ 3. Persist pending/pending order
//!     ├─ 4. Publish new_order to the restaurant room (best-effort)
//!     └─ 5. Return the stored order
//!
//! apply_transition(caller, id, status?, payment_status?)
//!     ├─ 1. Require a caller and at least one field; parse values
//!     ├─ 2. Take the per-order lock
//!     ├─ 3. Load, authorize as restaurant staff, check policy
//!     ├─ 4. Persist new state
//!     ├─ 5. Publish order_status to the order room (best-effort)
//!     └─ 6. Release the lock, return the stored order
//! ```
//!
//! Reads of a single order take the same lock, so they never observe a
//! transition that is persisted but not yet published. A store call that
//! times out has written nothing (see [`super::storage`]), so the lock is
//! never released with a write still in flight.
//!
//! `list_for_restaurant` takes no order locks. A listing may include a
//! transition whose `order_status` event is still being enqueued; the event
//! follows within the same critical section that persisted it.

use dashmap::DashMap;
use shared::message::{RoomKey, ServerEvent};
use shared::order::{
    LineItem, Order, OrderStatus, OrderStatusPayload, PaymentStatus, ResolvedOrder,
};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::error::LifecycleError;
use super::money;
use super::storage::OrderStore;
use super::transitions::TransitionPolicy;
use crate::auth::{CurrentUser, StaffAuthorizer};
use crate::directory::Directory;
use crate::realtime::{BusError, NotificationBus};
use crate::security_log;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Holds one order's lock; prunes the lock entry once nobody else waits on it
struct OrderGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    order_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OrderGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.order_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Validates and applies order changes, then notifies subscribers
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    bus: NotificationBus,
    directory: Arc<dyn Directory>,
    authorizer: Arc<dyn StaffAuthorizer>,
    policy: TransitionPolicy,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for OrderLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLifecycle")
            .field("store", &"<OrderStore>")
            .field("policy", &self.policy)
            .field("locks", &self.locks.len())
            .finish()
    }
}

impl OrderLifecycle {
    pub fn new(
        store: Arc<dyn OrderStore>,
        bus: NotificationBus,
        directory: Arc<dyn Directory>,
        authorizer: Arc<dyn StaffAuthorizer>,
        policy: TransitionPolicy,
    ) -> Self {
        Self {
            store,
            bus,
            directory,
            authorizer,
            policy,
            locks: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &TransitionPolicy {
        &self.policy
    }

    /// Place a new order
    ///
    /// `client_total` is informational: the stored total is always computed
    /// from the line items.
    pub async fn create_order(
        &self,
        restaurant_id: &str,
        table_id: &str,
        items: Vec<LineItem>,
        client_total: Option<f64>,
    ) -> LifecycleResult<Order> {
        if restaurant_id.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "restaurantId must not be empty".to_string(),
            ));
        }
        if table_id.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "tableId must not be empty".to_string(),
            ));
        }
        if items.is_empty() {
            return Err(LifecycleError::EmptyOrder);
        }
        for item in &items {
            money::validate_line_item(item)?;
        }

        let total = money::to_f64(money::order_total(&items));
        if let Some(claimed) = client_total
            && !money::money_eq(claimed, total)
        {
            tracing::warn!(
                restaurant_id = %restaurant_id,
                claimed,
                computed = total,
                "Client total differs from computed total, using computed"
            );
        }

        let now = shared::util::now_millis();
        let order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            restaurant_id: restaurant_id.to_string(),
            table_id: table_id.to_string(),
            items,
            total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(&order).await?;
        tracing::info!(
            order_id = %order.id,
            restaurant_id = %order.restaurant_id,
            table_id = %order.table_id,
            total = order.total,
            "Order created"
        );

        let resolved = self.resolve(order.clone());
        self.notify(
            &RoomKey::restaurant(&order.restaurant_id),
            ServerEvent::NewOrder(Box::new(resolved)),
        );

        Ok(order)
    }

    /// Change status and/or payment status of an existing order
    pub async fn apply_transition(
        &self,
        caller: Option<&CurrentUser>,
        order_id: &str,
        status: Option<&str>,
        payment_status: Option<&str>,
    ) -> LifecycleResult<Order> {
        let caller = caller.ok_or(LifecycleError::Unauthenticated)?;
        if status.is_none() && payment_status.is_none() {
            return Err(LifecycleError::NothingToUpdate);
        }
        let status = status
            .map(|s| s.parse::<OrderStatus>())
            .transpose()
            .map_err(|e| LifecycleError::InvalidStatus(e.0))?;
        let payment_status = payment_status
            .map(|s| s.parse::<PaymentStatus>())
            .transpose()
            .map_err(|e| LifecycleError::InvalidPaymentStatus(e.0))?;

        let _guard = self.lock_order(order_id).await;

        let current = self.load(order_id).await?;
        self.authorize(Some(caller), &current.restaurant_id).await?;

        let next_status = status.unwrap_or(current.status);
        let next_payment = payment_status.unwrap_or(current.payment_status);
        self.policy.check_status(current.status, next_status)?;
        self.policy
            .check_payment(current.payment_status, next_payment)?;

        let updated = self
            .store
            .update_state(
                order_id,
                next_status,
                next_payment,
                shared::util::now_millis(),
            )
            .await?;

        tracing::info!(
            order_id = %order_id,
            user_id = %caller.id,
            from_status = %current.status,
            to_status = %updated.status,
            from_payment = %current.payment_status,
            to_payment = %updated.payment_status,
            "Order transition applied"
        );

        self.notify(
            &RoomKey::order(order_id),
            ServerEvent::OrderStatus(OrderStatusPayload::from(&updated)),
        );

        Ok(updated)
    }

    /// Load one order under its lock
    pub async fn get_order(&self, order_id: &str) -> LifecycleResult<Order> {
        let _guard = self.lock_order(order_id).await;
        self.load(order_id).await
    }

    /// Staff listing of a restaurant's orders, newest first, references resolved
    pub async fn list_for_restaurant(
        &self,
        caller: Option<&CurrentUser>,
        restaurant_id: &str,
    ) -> LifecycleResult<Vec<ResolvedOrder>> {
        self.authorize(caller, restaurant_id).await?;

        let orders = self.store.list_for_restaurant(restaurant_id).await?;
        Ok(orders.into_iter().map(|o| self.resolve(o)).collect())
    }

    /// Remove an order. No event is published.
    pub async fn delete_order(
        &self,
        caller: Option<&CurrentUser>,
        order_id: &str,
    ) -> LifecycleResult<()> {
        let caller = caller.ok_or(LifecycleError::Unauthenticated)?;
        let _guard = self.lock_order(order_id).await;

        let current = self.load(order_id).await?;
        self.authorize(Some(caller), &current.restaurant_id).await?;

        if !self.store.delete(order_id).await? {
            return Err(LifecycleError::OrderNotFound(order_id.to_string()));
        }
        tracing::info!(order_id = %order_id, user_id = %caller.id, "Order deleted");
        Ok(())
    }

    /// Attach table number and item names from the directory
    pub fn resolve(&self, order: Order) -> ResolvedOrder {
        let table_number = self.directory.table_number(&order.table_id);
        ResolvedOrder::resolve(order, table_number, |id| {
            self.directory.menu_item_name(id)
        })
    }

    /// Number of live per-order locks
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    async fn lock_order(&self, order_id: &str) -> OrderGuard<'_> {
        let lock = self
            .locks
            .entry(order_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;

        OrderGuard {
            locks: &self.locks,
            order_id: order_id.to_string(),
            guard: Some(guard),
        }
    }

    async fn load(&self, order_id: &str) -> LifecycleResult<Order> {
        self.store
            .get(order_id)
            .await?
            .ok_or_else(|| LifecycleError::OrderNotFound(order_id.to_string()))
    }

    async fn authorize(
        &self,
        caller: Option<&CurrentUser>,
        restaurant_id: &str,
    ) -> LifecycleResult<()> {
        let Some(user) = caller else {
            security_log!(
                "WARN",
                "staff_check_unauthenticated",
                restaurant_id = restaurant_id
            );
            return Err(LifecycleError::Unauthenticated);
        };

        if self.authorizer.is_staff(user, restaurant_id).await {
            Ok(())
        } else {
            security_log!(
                "WARN",
                "staff_check_denied",
                user_id = user.id.as_str(),
                restaurant_id = restaurant_id
            );
            Err(LifecycleError::Forbidden)
        }
    }

    /// Publish after a successful write; outcomes are logged, never returned
    fn notify(&self, room: &RoomKey, event: ServerEvent) {
        let kind = event.kind();
        match self.bus.publish(room, event) {
            Ok(delivery) if delivery.dropped > 0 => {
                tracing::warn!(
                    room = %room,
                    event = kind,
                    delivered = delivery.delivered,
                    dropped = delivery.dropped,
                    "Event partially delivered"
                );
            }
            Ok(_) => {}
            Err(BusError::NoSubscribers(_)) => {
                tracing::debug!(room = %room, event = kind, "No subscribers for event");
            }
            Err(e) => {
                tracing::warn!(room = %room, event = kind, error = %e, "Event publish failed");
            }
        }
    }
}
