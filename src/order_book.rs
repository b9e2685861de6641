//! Order book store: best bid/ask per instrument.
//!
//! Written only by the market feed consumer. The TP/SL path reads it for
//! sanity checks, never for the trigger math itself.

use crate::conditional::{TpslKind, TriggerCondition};
use crate::types::{Price, Side, Symbol, Timestamp};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top of book as pushed by the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookTop {
    pub symbol: Symbol,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub timestamp: Timestamp,
}

impl BookTop {
    pub fn new(
        symbol: Symbol,
        best_bid: Option<Price>,
        best_ask: Option<Price>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            symbol,
            best_bid,
            best_ask,
            timestamp,
        }
    }

    /// Get the mid price (average of best bid and ask)
    pub fn mid(&self) -> Option<Price> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => bid
                .value()
                .checked_add(ask.value())
                .and_then(|sum| sum.checked_div(dec!(2)))
                .and_then(Price::new),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(ask.value() - bid.value()),
            _ => None,
        }
    }

    // crossed or locked books come from a stale side during reconnects
    pub fn is_crossed(&self) -> bool {
        self.spread().is_some_and(|s| s <= Decimal::ZERO)
    }
}

#[derive(Debug, Default)]
pub struct OrderBookStore {
    tops: RwLock<HashMap<Symbol, BookTop>>,
}

impl OrderBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a feed update. Older timestamps than what is held are dropped.
    pub fn apply(&self, top: BookTop) -> bool {
        let mut tops = self.tops.write();
        match tops.get(&top.symbol) {
            Some(current) if current.timestamp > top.timestamp => false,
            _ => {
                tops.insert(top.symbol.clone(), top);
                true
            }
        }
    }

    pub fn top(&self, symbol: &Symbol) -> Option<BookTop> {
        self.tops.read().get(symbol).cloned()
    }

    pub fn mid(&self, symbol: &Symbol) -> Option<Price> {
        self.tops.read().get(symbol).and_then(BookTop::mid)
    }

    pub fn spread(&self, symbol: &Symbol) -> Option<Decimal> {
        self.tops.read().get(symbol).and_then(BookTop::spread)
    }

    pub fn clear(&self, symbol: &Symbol) {
        self.tops.write().remove(symbol);
    }

    /// Whether a trigger is already through the current mid, meaning the venue
    /// would fire it on arrival. `None` without a usable book.
    pub fn would_trigger_immediately(
        &self,
        symbol: &Symbol,
        position_side: Side,
        kind: TpslKind,
        trigger: Price,
    ) -> Option<bool> {
        let top = self.top(symbol)?;
        if top.is_crossed() {
            return None;
        }
        let mid = top.mid()?;
        Some(TriggerCondition::for_leg(kind, position_side).is_met(mid, trigger))
    }
}
