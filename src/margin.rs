//! Margin conversions used by the TP/SL math.
//!
//! Initial margin (IM) is the notional at entry divided by leverage. Percent
//! inputs are a share of IM, so a 50% take-profit on a 5x position means the
//! trigger earns half of what was posted, regardless of where mark is now.
//!
//! Everything is checked: `None` means the inputs overflow a `Decimal`.

use crate::types::{Leverage, Price, Quote};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn notional_value(price: Price, size: Decimal) -> Option<Quote> {
    price.value().checked_mul(size.abs()).map(Quote::new)
}

/// `entry × size / leverage`.
pub fn initial_margin(entry_price: Price, size: Decimal, leverage: Leverage) -> Option<Quote> {
    let notional = notional_value(entry_price, size)?;
    notional.value().checked_div(leverage.value()).map(Quote::new)
}

/// PnL as a percentage of margin. `None` when margin is zero (flat position).
pub fn pnl_to_percent(pnl: Quote, margin: Quote) -> Option<Decimal> {
    if margin.value().is_zero() {
        return None;
    }
    pnl.value()
        .checked_div(margin.value())?
        .checked_mul(dec!(100))
}

/// Inverse of [`pnl_to_percent`].
pub fn percent_to_pnl(percent: Decimal, margin: Quote) -> Option<Quote> {
    percent
        .checked_div(dec!(100))?
        .checked_mul(margin.value())
        .map(Quote::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_margin_basic() {
        let im = initial_margin(
            Price::new_unchecked(dec!(100)),
            dec!(10),
            Leverage::new(dec!(5)).unwrap(),
        );
        assert_eq!(im, Some(Quote::new(dec!(200))));
    }

    #[test]
    fn initial_margin_divides_by_leverage() {
        // 1000 / 3 directly, not 1000 * (1/3)
        let im = initial_margin(
            Price::new_unchecked(dec!(100)),
            dec!(10),
            Leverage::new(dec!(3)).unwrap(),
        )
        .unwrap();
        assert_eq!(im.value(), dec!(1000) / dec!(3));
    }

    #[test]
    fn percent_conversions() {
        let margin = Quote::new(dec!(200));
        assert_eq!(pnl_to_percent(Quote::new(dec!(100)), margin), Some(dec!(50)));
        assert_eq!(percent_to_pnl(dec!(50), margin), Some(Quote::new(dec!(100))));
        assert_eq!(percent_to_pnl(dec!(-25), margin), Some(Quote::new(dec!(-50))));
    }

    #[test]
    fn zero_margin_has_no_percent() {
        assert_eq!(pnl_to_percent(Quote::new(dec!(10)), Quote::new(Decimal::ZERO)), None);
    }

    #[test]
    fn overflow_is_none() {
        assert_eq!(notional_value(Price::new_unchecked(Decimal::MAX), dec!(2)), None);
        assert_eq!(percent_to_pnl(Decimal::MAX, Quote::new(dec!(1000))), None);
    }
}
