//! Panel input and derived result types.

use super::validation::{LegError, TpslValidationError};
use crate::conditional::TpslKind;
use crate::types::{Price, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether the typed values are trigger prices or PnL targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorField {
    Price,
    Pnl,
}

/// How a PnL-anchored value is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PnlVariant {
    /// Percent of initial margin, e.g. 50 means half the posted margin.
    Percent,
    /// Absolute quote currency.
    Dollar,
}

/// What the user has typed into the TP/SL modal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpslInput {
    pub anchor: AnchorField,
    pub variant: PnlVariant,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
}

impl Default for TpslInput {
    fn default() -> Self {
        Self::new()
    }
}

impl TpslInput {
    /// Empty input, as the modal opens.
    pub fn new() -> Self {
        Self {
            anchor: AnchorField::Price,
            variant: PnlVariant::Dollar,
            take_profit: None,
            stop_loss: None,
        }
    }

    pub fn prices(take_profit: Option<Decimal>, stop_loss: Option<Decimal>) -> Self {
        Self {
            anchor: AnchorField::Price,
            variant: PnlVariant::Dollar,
            take_profit,
            stop_loss,
        }
    }

    pub fn pnl(
        variant: PnlVariant,
        take_profit: Option<Decimal>,
        stop_loss: Option<Decimal>,
    ) -> Self {
        Self {
            anchor: AnchorField::Pnl,
            variant,
            take_profit,
            stop_loss,
        }
    }

    pub fn get(&self, kind: TpslKind) -> Option<Decimal> {
        match kind {
            TpslKind::TakeProfit => self.take_profit,
            TpslKind::StopLoss => self.stop_loss,
        }
    }

    /// Field edit. `None` clears the field.
    pub fn set(&mut self, kind: TpslKind, value: Option<Decimal>) {
        match kind {
            TpslKind::TakeProfit => self.take_profit = value,
            TpslKind::StopLoss => self.stop_loss = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.take_profit.is_none() && self.stop_loss.is_none()
    }
}

/// One leg's derived values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegResult {
    pub price: Option<Price>,
    pub pnl: Option<Quote>,
    pub percent: Option<Decimal>,
    pub error: Option<LegError>,
}

impl LegResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rejected(error: LegError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// Derived TP/SL values for a position. Never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TpslResult {
    pub take_profit_price: Option<Price>,
    pub stop_loss_price: Option<Price>,
    pub take_profit_pnl: Option<Quote>,
    pub stop_loss_pnl: Option<Quote>,
    pub take_profit_percent: Option<Decimal>,
    pub stop_loss_percent: Option<Decimal>,
    pub errors: TpslValidationError,
}

impl TpslResult {
    pub(crate) fn from_legs(take_profit: LegResult, stop_loss: LegResult) -> Self {
        Self {
            take_profit_price: take_profit.price,
            stop_loss_price: stop_loss.price,
            take_profit_pnl: take_profit.pnl,
            stop_loss_pnl: stop_loss.pnl,
            take_profit_percent: take_profit.percent,
            stop_loss_percent: stop_loss.percent,
            errors: TpslValidationError {
                take_profit: take_profit.error,
                stop_loss: stop_loss.error,
            },
        }
    }

    /// Both fields flagged, nothing derived.
    pub fn rejected(error: LegError) -> Self {
        Self {
            errors: TpslValidationError {
                take_profit: Some(error),
                stop_loss: Some(error),
            },
            ..Self::default()
        }
    }

    pub fn trigger(&self, kind: TpslKind) -> Option<Price> {
        match kind {
            TpslKind::TakeProfit => self.take_profit_price,
            TpslKind::StopLoss => self.stop_loss_price,
        }
    }

    pub fn pnl(&self, kind: TpslKind) -> Option<Quote> {
        match kind {
            TpslKind::TakeProfit => self.take_profit_pnl,
            TpslKind::StopLoss => self.stop_loss_pnl,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_valid()
    }

    /// Feed the derived trigger prices back as a price-anchored input.
    pub fn to_price_input(&self) -> TpslInput {
        TpslInput::prices(
            self.take_profit_price.map(|p| p.value()),
            self.stop_loss_price.map(|p| p.value()),
        )
    }
}
