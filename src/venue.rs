//! Venue port.
//!
//! The exchange client sits behind this trait: authenticated placement and
//! cancellation plus the two push feeds. Timeouts belong to the implementation;
//! a call that gives up returns [`VenueError::Timeout`] instead of hanging.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::conditional::{PlaceOrderRequest, TpslKind};
use crate::notify::NotificationKind;
use crate::order_book::BookTop;
use crate::position::Position;
use crate::snapshot::TriggerLevels;
use crate::types::{AccountId, OrderId, Symbol};

/// Acknowledgment after a leg is accepted and resting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub kind: TpslKind,
}

/// Acknowledgment of a cancel batch. Ids the venue no longer knows are
/// reported separately; they need no further action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAck {
    pub cancelled: Vec<OrderId>,
    pub not_found: Vec<OrderId>,
}

/// Push on the account feed.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountEvent {
    /// Full position state. Size 0 means closed.
    Position(Position),
    /// TP/SL levels the venue currently holds for a symbol.
    TriggerLevels { symbol: Symbol, levels: TriggerLevels },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VenueError {
    /// Already filled, triggered or cancelled on the venue side.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("order rejected: {reason}")]
    Rejected { reason: String },

    #[error("insufficient margin")]
    InsufficientMargin,

    #[error("rate limited by venue")]
    RateLimited,

    #[error("venue connection error: {message}")]
    Network { message: String },

    #[error("venue call timed out")]
    Timeout,
}

impl VenueError {
    /// Cancel of an order that no longer exists: the goal state is already reached.
    pub fn is_already_resolved(&self) -> bool {
        matches!(self, VenueError::OrderNotFound(_))
    }

    pub fn notification_kind(&self) -> NotificationKind {
        match self {
            VenueError::RateLimited => NotificationKind::RateLimited,
            VenueError::Rejected { .. }
            | VenueError::InsufficientMargin
            | VenueError::OrderNotFound(_) => NotificationKind::HardFailure,
            VenueError::Network { .. } | VenueError::Timeout => NotificationKind::Generic,
        }
    }
}

#[async_trait]
pub trait Venue: Send + Sync {
    /// Place one trigger leg.
    async fn place_order(&self, request: PlaceOrderRequest) -> Result<OrderAck, VenueError>;

    /// Cancel a batch of resting legs for one symbol.
    async fn cancel_orders(
        &self,
        symbol: &Symbol,
        order_ids: &[OrderId],
    ) -> Result<CancelAck, VenueError>;

    /// Top-of-book stream for an instrument. Ends when the venue drops the feed.
    async fn subscribe_market(&self, symbol: &Symbol) -> Result<mpsc::Receiver<BookTop>, VenueError>;

    /// Position and TP/SL level pushes for an account.
    async fn subscribe_positions(
        &self,
        account: AccountId,
    ) -> Result<mpsc::Receiver<AccountEvent>, VenueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_already_resolved() {
        assert!(VenueError::OrderNotFound(OrderId(7)).is_already_resolved());
        assert!(!VenueError::RateLimited.is_already_resolved());
        assert!(!VenueError::Timeout.is_already_resolved());
    }

    #[test]
    fn error_categories() {
        assert_eq!(VenueError::RateLimited.notification_kind(), NotificationKind::RateLimited);
        assert_eq!(
            VenueError::InsufficientMargin.notification_kind(),
            NotificationKind::HardFailure
        );
        assert_eq!(
            VenueError::Network { message: "reset".into() }.notification_kind(),
            NotificationKind::Generic
        );
        assert_eq!(VenueError::Timeout.notification_kind(), NotificationKind::Generic);
    }
}
