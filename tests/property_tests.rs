//! Property-based tests for the trigger math.
//!
//! These tests verify invariants hold under random inputs.

use perps_tpsl::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $0.01 to $100,000
}

fn size_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 4)) // 0.0001 to 100
}

fn leverage_strategy() -> impl Strategy<Value = Decimal> {
    (1u32..=100u32).prop_map(Decimal::from) // 1x to 100x
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

fn kind_strategy() -> impl Strategy<Value = TpslKind> {
    prop_oneof![Just(TpslKind::TakeProfit), Just(TpslKind::StopLoss)]
}

// -90% to +90% of entry
fn move_strategy() -> impl Strategy<Value = Decimal> {
    (-9_000i64..=9_000i64)
        .prop_filter("non-zero move", |x| *x != 0)
        .prop_map(|x| Decimal::new(x, 4))
}

fn position(side: Side, entry: Decimal, size: Decimal, leverage: Decimal) -> Position {
    Position::new(
        Symbol::new("TEST-PERP"),
        side,
        Price::new_unchecked(entry),
        size,
        Leverage::new(leverage).unwrap(),
        MarginMode::Isolated,
        Timestamp::from_millis(1),
    )
}

fn any_tick() -> InstrumentConfig {
    InstrumentConfig::unconstrained(Symbol::new("TEST-PERP"))
}

fn close_enough(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= dec!(0.000001)
}

proptest! {
    /// Price -> dollar PnL -> price lands back on the same trigger
    #[test]
    fn dollar_round_trip(
        side in side_strategy(),
        kind in kind_strategy(),
        entry in price_strategy(),
        size in size_strategy(),
        leverage in leverage_strategy(),
        pct_move in move_strategy(),
    ) {
        let pos = position(side, entry, size, leverage);
        let trigger = entry + entry * pct_move;

        let from_price = compute_from_price(&pos, kind, trigger, &any_tick());
        let pnl = from_price.pnl.unwrap().value();
        let from_pnl = compute_from_pnl(&pos, kind, pnl, PnlVariant::Dollar, &any_tick());

        if from_price.error.is_none() {
            prop_assert!(from_pnl.error.is_none());
            prop_assert!(close_enough(from_pnl.price.unwrap().value(), trigger));
        }
    }

    /// Percent of margin agrees with pnl / (entry * size / leverage) * 100
    #[test]
    fn percent_matches_margin(
        side in side_strategy(),
        entry in price_strategy(),
        size in size_strategy(),
        leverage in leverage_strategy(),
        pct_move in move_strategy(),
    ) {
        let pos = position(side, entry, size, leverage);
        let leg = compute_from_price(&pos, TpslKind::TakeProfit, entry + entry * pct_move, &any_tick());

        let margin = entry * size / leverage;
        let expected = leg.pnl.unwrap().value() / margin * dec!(100);
        prop_assert!(close_enough(leg.percent.unwrap(), expected));
    }

    /// A take-profit that validates is always a gain, a stop-loss always a loss
    #[test]
    fn valid_legs_sit_on_their_side(
        side in side_strategy(),
        kind in kind_strategy(),
        entry in price_strategy(),
        trigger in price_strategy(),
        size in size_strategy(),
    ) {
        let pos = position(side, entry, size, dec!(5));
        let leg = compute_from_price(&pos, kind, trigger, &any_tick());
        let pnl = leg.pnl.unwrap().value();

        match (kind, leg.error) {
            (TpslKind::TakeProfit, None) => prop_assert!(pnl > Decimal::ZERO),
            (TpslKind::StopLoss, None) => prop_assert!(pnl < Decimal::ZERO),
            (_, Some(err)) => prop_assert_eq!(err, LegError::WrongSide),
        }
    }

    /// Stop-loss PnL input is a magnitude: sign of what was typed never matters
    #[test]
    fn stop_loss_sign_insensitive(
        side in side_strategy(),
        entry in price_strategy(),
        size in size_strategy(),
        loss in (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)),
    ) {
        let pos = position(side, entry, size, dec!(10));
        let a = compute_from_pnl(&pos, TpslKind::StopLoss, loss, PnlVariant::Dollar, &any_tick());
        let b = compute_from_pnl(&pos, TpslKind::StopLoss, -loss, PnlVariant::Dollar, &any_tick());
        prop_assert_eq!(a, b);
    }

    /// Derived triggers always land on the instrument tick
    #[test]
    fn derived_trigger_on_tick(
        side in side_strategy(),
        entry in (100_000i64..10_000_000i64).prop_map(|x| Decimal::new(x, 1)),
        size in size_strategy(),
        target in (1i64..100_000i64).prop_map(|x| Decimal::new(x, 2)),
    ) {
        let btc = InstrumentConfig::btc_perp();
        let pos = position(side, entry, size, dec!(10));
        let leg = compute_from_pnl(&pos, TpslKind::TakeProfit, target, PnlVariant::Dollar, &btc);

        if let Some(price) = leg.price {
            prop_assert_eq!((price.value() / btc.tick_size).fract(), Decimal::ZERO);
        }
    }

    /// Flat positions flag both fields and never panic
    #[test]
    fn flat_position_never_panics(
        side in side_strategy(),
        entry in price_strategy(),
        tp in price_strategy(),
        sl in price_strategy(),
    ) {
        let pos = position(side, entry, Decimal::ZERO, dec!(5));
        let result = compute_tpsl(&TpslInput::prices(Some(tp), Some(sl)), Some(&pos), &any_tick());

        prop_assert_eq!(result.errors.take_profit, Some(LegError::FlatPosition));
        prop_assert_eq!(result.errors.stop_loss, Some(LegError::FlatPosition));
        prop_assert!(result.take_profit_price.is_none());
    }

    /// Recomputing from derived prices changes nothing
    #[test]
    fn recompute_is_idempotent(
        side in side_strategy(),
        entry in price_strategy(),
        size in size_strategy(),
        tp_pct in 1i64..400i64,
        sl_pct in 1i64..90i64,
    ) {
        let pos = position(side, entry, size, dec!(5));
        let input = TpslInput::pnl(
            PnlVariant::Percent,
            Some(Decimal::from(tp_pct)),
            Some(Decimal::from(sl_pct)),
        );
        let first = compute_tpsl(&input, Some(&pos), &any_tick());
        let second = compute_tpsl(&first.to_price_input(), Some(&pos), &any_tick());

        prop_assert_eq!(first.take_profit_price, second.take_profit_price);
        prop_assert_eq!(first.stop_loss_price, second.stop_loss_price);
        prop_assert_eq!(first.errors, second.errors);
    }
}
