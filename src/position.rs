// 4.0: open position as last reported by the venue. pnl = size * (trigger - entry) * sign.
// positions are replaced wholesale on every push, never edited in place.

use crate::margin::initial_margin;
use crate::types::{Leverage, Price, Quote, Side, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginMode {
    Isolated,
    Cross,
}

impl Default for MarginMode {
    fn default() -> Self {
        Self::Cross
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: Price,
    // absolute size in base units. the sign lives in `side`.
    pub size: Decimal,
    pub leverage: Leverage,
    pub margin_mode: MarginMode,
    pub updated_at: Timestamp,
}

impl Position {
    pub fn new(
        symbol: Symbol,
        side: Side,
        entry_price: Price,
        size: Decimal,
        leverage: Leverage,
        margin_mode: MarginMode,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            symbol,
            side,
            entry_price,
            size: size.abs(),
            leverage,
            margin_mode,
            updated_at: timestamp,
        }
    }

    // flat = venue still reports the row but nothing is open
    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    // 4.1: what the position would make or lose if closed at `price`. None on overflow.
    pub fn pnl_at(&self, price: Price) -> Option<Quote> {
        calculate_pnl(self.side, self.size, self.entry_price, price)
    }

    // 4.2: margin posted at open. percent-of-margin is always relative to this, never to mark.
    pub fn initial_margin(&self) -> Option<Quote> {
        initial_margin(self.entry_price, self.size, self.leverage)
    }
}

// 4.3: the pnl formula. (exit - entry) * size * sign
pub fn calculate_pnl(side: Side, size: Decimal, entry_price: Price, exit_price: Price) -> Option<Quote> {
    (exit_price.value() - entry_price.value())
        .checked_mul(size)?
        .checked_mul(side.sign())
        .map(Quote::new)
}
