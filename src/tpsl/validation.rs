//! Side checks for trigger prices.
//!
//! Long: stop-loss < entry < take-profit. Short: take-profit < entry < stop-loss.
//! Each leg is judged on its own, so one bad field never flags the other.

use crate::conditional::TpslKind;
use crate::types::{Price, Side};
use rust_decimal::Decimal;

/// Why a single TP/SL field is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LegError {
    #[error("no open position")]
    NoPosition,

    #[error("position is flat")]
    FlatPosition,

    #[error("trigger price must be positive")]
    NonPositivePrice,

    #[error("trigger price is on the wrong side of entry")]
    WrongSide,

    #[error("value out of range")]
    OutOfRange,

    #[error("position leverage exceeds the instrument maximum")]
    LeverageAboveMax,
}

/// Field-scoped validation flags. Submission is blocked while either is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TpslValidationError {
    pub take_profit: Option<LegError>,
    pub stop_loss: Option<LegError>,
}

impl TpslValidationError {
    pub fn take_profit_error(&self) -> bool {
        self.take_profit.is_some()
    }

    pub fn stop_loss_error(&self) -> bool {
        self.stop_loss.is_some()
    }

    pub fn get(&self, kind: TpslKind) -> Option<LegError> {
        match kind {
            TpslKind::TakeProfit => self.take_profit,
            TpslKind::StopLoss => self.stop_loss,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.take_profit.is_none() && self.stop_loss.is_none()
    }
}

/// Check one trigger against entry for the position's side.
pub fn validate_leg(
    kind: TpslKind,
    trigger: Price,
    side: Side,
    entry_price: Price,
) -> Result<(), LegError> {
    let directed_move = (trigger.value() - entry_price.value()) * side.sign();
    let ok = match kind {
        TpslKind::TakeProfit => directed_move > Decimal::ZERO,
        TpslKind::StopLoss => directed_move < Decimal::ZERO,
    };
    if ok {
        Ok(())
    } else {
        Err(LegError::WrongSide)
    }
}

/// Cross-check both triggers. Once both sit on their correct side of entry
/// they are also correctly ordered against each other.
pub fn validate_pair(
    take_profit: Option<Price>,
    stop_loss: Option<Price>,
    side: Side,
    entry_price: Price,
) -> TpslValidationError {
    TpslValidationError {
        take_profit: take_profit
            .and_then(|tp| validate_leg(TpslKind::TakeProfit, tp, side, entry_price).err()),
        stop_loss: stop_loss
            .and_then(|sl| validate_leg(TpslKind::StopLoss, sl, side, entry_price).err()),
    }
}
