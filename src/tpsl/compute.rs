// 2.1: price <-> pnl conversions for one leg, then the combined entry point.
// pnl = size * (trigger - entry) * sign, percent = pnl / (entry * size / leverage) * 100.
// all arithmetic is checked decimal so absurd inputs become field errors, not panics.

use super::input::{AnchorField, LegResult, PnlVariant, TpslInput, TpslResult};
use super::validation::{validate_leg, validate_pair, LegError};
use crate::conditional::TpslKind;
use crate::config::InstrumentConfig;
use crate::margin::{percent_to_pnl, pnl_to_percent};
use crate::position::Position;
use crate::types::{Price, Quote};
use rust_decimal::Decimal;

/// Derive PnL and percent-of-margin from an absolute trigger price.
pub fn compute_from_price(
    position: &Position,
    kind: TpslKind,
    price: Decimal,
    instrument: &InstrumentConfig,
) -> LegResult {
    if position.is_flat() {
        return LegResult::rejected(LegError::FlatPosition);
    }
    let Some(rounded) = instrument.round_price(price) else {
        return LegResult::rejected(LegError::OutOfRange);
    };
    let Some(trigger) = Price::new(rounded) else {
        return LegResult::rejected(LegError::NonPositivePrice);
    };
    derive_leg(position, kind, trigger)
}

/// Solve the trigger price for a PnL target.
///
/// Stop-loss values are loss magnitudes: 50 and -50 both mean "lose 50".
/// Take-profit values are used as typed, so a non-positive target lands on
/// the wrong side of entry and is flagged.
pub fn compute_from_pnl(
    position: &Position,
    kind: TpslKind,
    value: Decimal,
    variant: PnlVariant,
    instrument: &InstrumentConfig,
) -> LegResult {
    if position.is_flat() {
        return LegResult::rejected(LegError::FlatPosition);
    }

    let target = match variant {
        PnlVariant::Dollar => Some(value),
        PnlVariant::Percent => nonzero_margin(position)
            .and_then(|margin| percent_to_pnl(value, margin))
            .map(|pnl| pnl.value()),
    };
    let Some(target) = target else {
        return LegResult::rejected(LegError::OutOfRange);
    };
    let target = match kind {
        TpslKind::TakeProfit => target,
        TpslKind::StopLoss => -target.abs(),
    };

    // trigger = entry + pnl / (size * sign)
    let raw_trigger = position
        .size
        .checked_mul(position.side.sign())
        .and_then(|directed_size| target.checked_div(directed_size))
        .and_then(|delta| position.entry_price.value().checked_add(delta));
    let Some(raw_trigger) = raw_trigger else {
        return LegResult::rejected(LegError::OutOfRange);
    };

    let Some(rounded) = instrument.round_price(raw_trigger) else {
        return LegResult::rejected(LegError::OutOfRange);
    };
    match Price::new(rounded) {
        // pnl is re-derived from the rounded price so the display matches what will rest on the venue
        Some(trigger) => derive_leg(position, kind, trigger),
        None => LegResult {
            pnl: Some(Quote::new(target)),
            ..LegResult::rejected(LegError::NonPositivePrice)
        },
    }
}

/// Recompute both legs from the panel input. Missing or flat positions flag
/// both fields and skip the math entirely.
pub fn compute_tpsl(
    input: &TpslInput,
    position: Option<&Position>,
    instrument: &InstrumentConfig,
) -> TpslResult {
    let Some(position) = position else {
        return TpslResult::rejected(LegError::NoPosition);
    };
    if position.is_flat() {
        return TpslResult::rejected(LegError::FlatPosition);
    }
    if position.leverage.value() > instrument.max_leverage {
        return TpslResult::rejected(LegError::LeverageAboveMax);
    }

    let compute_leg = |kind: TpslKind| match input.get(kind) {
        None => LegResult::empty(),
        Some(value) => match input.anchor {
            AnchorField::Price => compute_from_price(position, kind, value, instrument),
            AnchorField::Pnl => compute_from_pnl(position, kind, value, input.variant, instrument),
        },
    };
    let mut take_profit = compute_leg(TpslKind::TakeProfit);
    let mut stop_loss = compute_leg(TpslKind::StopLoss);

    let pair = validate_pair(
        take_profit.price,
        stop_loss.price,
        position.side,
        position.entry_price,
    );
    take_profit.error = take_profit.error.or(pair.take_profit);
    stop_loss.error = stop_loss.error.or(pair.stop_loss);

    TpslResult::from_legs(take_profit, stop_loss)
}

fn derive_leg(position: &Position, kind: TpslKind, trigger: Price) -> LegResult {
    let Some(pnl) = position.pnl_at(trigger) else {
        return LegResult::rejected(LegError::OutOfRange);
    };
    let percent = nonzero_margin(position).and_then(|margin| pnl_to_percent(pnl, margin));

    LegResult {
        price: Some(trigger),
        pnl: Some(pnl),
        percent,
        error: validate_leg(kind, trigger, position.side, position.entry_price).err(),
    }
}

// None if it overflows or the position is flat
fn nonzero_margin(position: &Position) -> Option<Quote> {
    position
        .initial_margin()
        .filter(|margin| !margin.value().is_zero())
}
