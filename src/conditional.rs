//! Trigger orders: take-profit and stop-loss legs attached to a position.
//!
//! A leg rests on the venue until mark (or last) price crosses its trigger,
//! then closes the whole position at market. The request types here are what
//! the submission coordinator hands to the venue.

use crate::position::Position;
use crate::types::{OrderId, Price, Side, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which leg of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TpslKind {
    /// Triggers when price rises above threshold (for longs) or falls below (for shorts).
    TakeProfit,
    /// Triggers when price falls below threshold (for longs) or rises above (for shorts).
    StopLoss,
}

impl TpslKind {
    pub fn label(&self) -> &'static str {
        match self {
            TpslKind::TakeProfit => "take-profit",
            TpslKind::StopLoss => "stop-loss",
        }
    }
}

impl fmt::Display for TpslKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Price the venue compares the trigger against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Mark,
    Last,
}

/// How the trigger price should be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerCondition {
    /// Triggers when price crosses above the trigger.
    Above,
    /// Triggers when price crosses below the trigger.
    Below,
}

impl TriggerCondition {
    pub fn for_leg(kind: TpslKind, position_side: Side) -> Self {
        match (kind, position_side) {
            (TpslKind::TakeProfit, Side::Long) | (TpslKind::StopLoss, Side::Short) => {
                TriggerCondition::Above
            }
            (TpslKind::TakeProfit, Side::Short) | (TpslKind::StopLoss, Side::Long) => {
                TriggerCondition::Below
            }
        }
    }

    pub fn is_met(&self, reference: Price, trigger: Price) -> bool {
        match self {
            TriggerCondition::Above => reference.value() >= trigger.value(),
            TriggerCondition::Below => reference.value() <= trigger.value(),
        }
    }
}

/// Order placement request for one TP/SL leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: Symbol,
    /// Closing side: opposite of the position.
    pub side: Side,
    pub kind: TpslKind,
    pub trigger_type: TriggerType,
    pub trigger_price: Price,
    pub trigger_condition: TriggerCondition,
    pub size: Decimal,
    /// Always true for TP/SL: the leg may only shrink the position.
    pub reduce_only: bool,
    pub created_at: Timestamp,
}

impl PlaceOrderRequest {
    pub fn for_leg(
        position: &Position,
        kind: TpslKind,
        trigger_price: Price,
        trigger_type: TriggerType,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            symbol: position.symbol.clone(),
            side: position.side.opposite(),
            kind,
            trigger_type,
            trigger_price,
            trigger_condition: TriggerCondition::for_leg(kind, position.side),
            size: position.size,
            reduce_only: true,
            created_at: timestamp,
        }
    }

    pub fn take_profit(
        position: &Position,
        trigger_price: Price,
        trigger_type: TriggerType,
        timestamp: Timestamp,
    ) -> Self {
        Self::for_leg(position, TpslKind::TakeProfit, trigger_price, trigger_type, timestamp)
    }

    pub fn stop_loss(
        position: &Position,
        trigger_price: Price,
        trigger_type: TriggerType,
        timestamp: Timestamp,
    ) -> Self {
        Self::for_leg(position, TpslKind::StopLoss, trigger_price, trigger_type, timestamp)
    }
}

/// A leg the venue has acknowledged and is holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerOrder {
    pub id: OrderId,
    pub request: PlaceOrderRequest,
}

impl TriggerOrder {
    pub fn new(id: OrderId, request: PlaceOrderRequest) -> Self {
        Self { id, request }
    }

    /// Check if this order should trigger at the given reference price.
    pub fn should_trigger(&self, reference: Price) -> bool {
        self.request
            .trigger_condition
            .is_met(reference, self.request.trigger_price)
    }
}
