//! Status transition policy
//!
//! The server gates transitions on authorization only: by default any known
//! status may overwrite any other. Deployments that want graph validation
//! configure an explicit allowed-transitions table instead.
//!
//! `ORDER_TRANSITIONS` accepts:
//! - `permissive` (default)
//! - `forward_only`: `pending → preparing → ready → completed`, `cancelled`
//!   from any non-terminal status
//! - a custom edge list such as `pending:preparing,preparing:ready`
//!
//! Re-applying the current status is always accepted as a no-op.

use shared::order::{OrderStatus, PaymentStatus};
use std::collections::HashSet;
use std::str::FromStr;

use super::error::LifecycleError;

/// Allowed `(from, to)` status edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    edges: HashSet<(OrderStatus, OrderStatus)>,
}

impl TransitionTable {
    pub fn new(edges: impl IntoIterator<Item = (OrderStatus, OrderStatus)>) -> Self {
        Self {
            edges: edges.into_iter().collect(),
        }
    }

    /// Forward fulfillment chain plus cancellation from non-terminal states
    pub fn forward_only() -> Self {
        use OrderStatus::*;

        let mut edges = vec![(Pending, Preparing), (Preparing, Ready), (Ready, Completed)];
        edges.extend(
            OrderStatus::ALL
                .into_iter()
                .filter(|s| !s.is_terminal())
                .map(|s| (s, Cancelled)),
        );
        Self::new(edges)
    }

    pub fn allows(&self, from: OrderStatus, to: OrderStatus) -> bool {
        from == to || self.edges.contains(&(from, to))
    }
}

/// How status changes are validated
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusRule {
    /// Any known status overwrites the current one
    #[default]
    Permissive,
    /// Only edges listed in the table are accepted
    Table(TransitionTable),
}

/// How payment status changes are validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentRule {
    /// Any known payment status is accepted
    #[default]
    Lenient,
    /// `paid` is final
    Strict,
}

/// Combined transition policy applied by the lifecycle engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionPolicy {
    pub status: StatusRule,
    pub payment: PaymentRule,
}

impl TransitionPolicy {
    pub fn forward_only() -> Self {
        Self {
            status: StatusRule::Table(TransitionTable::forward_only()),
            payment: PaymentRule::Strict,
        }
    }

    pub fn check_status(&self, from: OrderStatus, to: OrderStatus) -> Result<(), LifecycleError> {
        match &self.status {
            StatusRule::Permissive => Ok(()),
            StatusRule::Table(table) if table.allows(from, to) => Ok(()),
            StatusRule::Table(_) => Err(LifecycleError::TransitionNotAllowed {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    /// Payment changes are valid at any order status, terminal ones included
    pub fn check_payment(
        &self,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<(), LifecycleError> {
        match (self.payment, from, to) {
            (PaymentRule::Strict, PaymentStatus::Paid, PaymentStatus::Pending) => {
                Err(LifecycleError::TransitionNotAllowed {
                    from: from.to_string(),
                    to: to.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Error parsing a transition rule from configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition rule: {0}")]
pub struct InvalidRule(pub String);

impl FromStr for StatusRule {
    type Err = InvalidRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "permissive" => Ok(StatusRule::Permissive),
            "forward_only" => Ok(StatusRule::Table(TransitionTable::forward_only())),
            list => {
                let mut edges = Vec::new();
                for pair in list.split(',') {
                    let (from, to) = pair
                        .trim()
                        .split_once(':')
                        .ok_or_else(|| InvalidRule(pair.to_string()))?;
                    let invalid = |_| InvalidRule(pair.to_string());
                    let from: OrderStatus = from.trim().parse().map_err(invalid)?;
                    let to: OrderStatus = to.trim().parse().map_err(invalid)?;
                    edges.push((from, to));
                }
                Ok(StatusRule::Table(TransitionTable::new(edges)))
            }
        }
    }
}

impl FromStr for PaymentRule {
    type Err = InvalidRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "lenient" => Ok(PaymentRule::Lenient),
            "strict" => Ok(PaymentRule::Strict),
            other => Err(InvalidRule(other.to_string())),
        }
    }
}
