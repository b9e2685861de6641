//! TP/SL engine simulation.
//!
//! Runs the panel math and the submission coordinator against the in-memory
//! venue: deriving triggers, replacing legs, partial rejections, cancel races
//! and a stop-loss firing off a mark move.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use perps_tpsl::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

type SimResult = Result<(), Box<dyn Error>>;

#[tokio::main]
async fn main() -> SimResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config = Environment::Development.config();
    config.validate()?;

    println!("Perps TP/SL Engine Simulation");
    println!("Trigger type: {:?}, feed buffer: {}\n", config.trigger_type, config.feed_buffer);

    scenario_1_compute_table(&config)?;
    scenario_2_submit_and_replace(&config).await?;
    scenario_3_partial_rejection(&config).await?;
    scenario_4_cancel_race(&config).await?;
    scenario_5_single_flight(&config).await?;
    scenario_6_stop_loss_fires(&config).await?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

struct Sim {
    venue: Arc<SimVenue>,
    snapshot: Arc<SnapshotStore>,
    notifications: Arc<NotificationCollector>,
    coordinator: SubmissionCoordinator<SimVenue>,
}

impl Sim {
    fn new(config: &TpslConfig) -> Self {
        let venue = Arc::new(SimVenue::new(config.feed_buffer));
        let snapshot = Arc::new(SnapshotStore::new());
        let notifications = Arc::new(NotificationCollector::new());
        let coordinator = SubmissionCoordinator::new(
            Arc::clone(&venue),
            Arc::clone(&snapshot),
            notifications.clone(),
            config.trigger_type,
        );
        Self {
            venue,
            snapshot,
            notifications,
            coordinator,
        }
    }

    // venue and snapshot both see the position, as after a feed push
    fn open(&self, position: &Position) {
        self.venue.push_position(position.clone());
        self.snapshot.apply_position(position.clone());
        self.snapshot.select_instrument(position.symbol.clone());
    }

    fn print_notifications(&self) {
        for n in self.notifications.notifications() {
            println!("  [{:?}] {}", n.kind, n.message);
        }
        self.notifications.clear();
    }
}

fn btc_long(entry: Decimal, size: Decimal, leverage: Decimal) -> Result<Position, Box<dyn Error>> {
    Ok(Position::new(
        Symbol::new("BTC-PERP"),
        Side::Long,
        Price::new(entry).ok_or("entry must be positive")?,
        size,
        Leverage::new(leverage).ok_or("leverage must be at least 1")?,
        MarginMode::Cross,
        Timestamp::now(),
    ))
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Same targets entered as price, dollar PnL and percent of margin.
fn scenario_1_compute_table(config: &TpslConfig) -> SimResult {
    println!("Scenario 1: Trigger Derivation\n");

    let position = btc_long(dec!(50000), dec!(0.5), dec!(10))?;
    let instrument = config.instrument_or_default(&position.symbol);
    println!(
        "  Long {} BTC @ ${}, {}x, margin ${}",
        position.size,
        position.entry_price,
        position.leverage.value(),
        fmt_opt(position.initial_margin())
    );

    let inputs = [
        ("price", TpslInput::prices(Some(dec!(52000)), Some(dec!(49000)))),
        ("dollar", TpslInput::pnl(PnlVariant::Dollar, Some(dec!(1000)), Some(dec!(500)))),
        ("percent", TpslInput::pnl(PnlVariant::Percent, Some(dec!(33.33)), Some(dec!(20)))),
        ("wrong side", TpslInput::prices(Some(dec!(48000)), Some(dec!(51000)))),
    ];

    let dp = config.display_decimals;
    for (label, input) in inputs {
        let result = compute_tpsl(&input, Some(&position), &instrument);
        println!(
            "  {:<10} TP {:>9} pnl {:>9} ({:>6}%) | SL {:>9} pnl {:>9} ({:>6}%) | errors {:?}",
            label,
            fmt_opt(result.take_profit_price),
            fmt_opt(result.take_profit_pnl.map(|q| q.value().round_dp(dp))),
            fmt_opt(result.take_profit_percent.map(|p| p.round_dp(dp))),
            fmt_opt(result.stop_loss_price),
            fmt_opt(result.stop_loss_pnl.map(|q| q.value().round_dp(dp))),
            fmt_opt(result.stop_loss_percent.map(|p| p.round_dp(dp))),
            result.errors,
        );
    }

    let missing = compute_tpsl(&TpslInput::prices(Some(dec!(52000)), None), None, &instrument);
    println!("  no position: {:?}", missing.errors);

    // advisory only: a trigger already through the book fires on placement
    let book = OrderBookStore::new();
    book.apply(BookTop::new(
        position.symbol.clone(),
        Price::new(dec!(52040)),
        Price::new(dec!(52060)),
        Timestamp::now(),
    ));
    for trigger in [dec!(52000), dec!(52100)] {
        let through = book.would_trigger_immediately(
            &position.symbol,
            position.side,
            TpslKind::TakeProfit,
            Price::new(trigger).ok_or("trigger must be positive")?,
        );
        println!("  TP {trigger} with mid {}: fires immediately = {}", fmt_opt(book.mid(&position.symbol)), fmt_opt(through));
    }
    println!();
    Ok(())
}

/// Place both legs, then replace them with new levels.
async fn scenario_2_submit_and_replace(config: &TpslConfig) -> SimResult {
    println!("Scenario 2: Submit and Replace\n");

    let sim = Sim::new(config);
    let position = btc_long(dec!(50000), dec!(0.5), dec!(10))?;
    let instrument = config.instrument_or_default(&position.symbol);
    sim.open(&position);

    let first = compute_tpsl(
        &TpslInput::prices(Some(dec!(52000)), Some(dec!(49000))),
        Some(&position),
        &instrument,
    );
    let outcome = sim.coordinator.submit_tpsl(&position, &first).await?;
    println!("  First submit: {:?}, pending {:?}", outcome.state(), sim.coordinator.pending_orders(&position.symbol));

    let second = compute_tpsl(
        &TpslInput::pnl(PnlVariant::Dollar, Some(dec!(2000)), None),
        Some(&position),
        &instrument,
    );
    let outcome = sim.coordinator.submit_tpsl(&position, &second).await?;
    println!("  Replace with TP only: {:?}, pending {:?}", outcome.state(), sim.coordinator.pending_orders(&position.symbol));
    println!("  Shown levels: {:?}", sim.snapshot.trigger_levels(&position.symbol));
    println!("  Resting on venue: {}", sim.venue.resting_orders(&position.symbol).len());
    sim.print_notifications();
    println!();
    Ok(())
}

/// Venue rejects the stop-loss; the take-profit stays.
async fn scenario_3_partial_rejection(config: &TpslConfig) -> SimResult {
    println!("Scenario 3: Partial Rejection\n");

    let sim = Sim::new(config);
    let position = btc_long(dec!(50000), dec!(0.5), dec!(10))?;
    let instrument = config.instrument_or_default(&position.symbol);
    sim.open(&position);
    sim.venue.reject_next_place(TpslKind::StopLoss, VenueError::InsufficientMargin);

    let result = compute_tpsl(
        &TpslInput::prices(Some(dec!(52000)), Some(dec!(49000))),
        Some(&position),
        &instrument,
    );
    let outcome = sim.coordinator.submit_tpsl(&position, &result).await?;
    println!("  Outcome: {:?}", outcome.state());
    println!("  Pending: {:?}", sim.coordinator.pending_orders(&position.symbol));
    sim.print_notifications();

    sim.venue.reject_next_place(TpslKind::TakeProfit, VenueError::RateLimited);
    let tp_only = compute_tpsl(&TpslInput::prices(Some(dec!(53000)), None), Some(&position), &instrument);
    match sim.coordinator.submit_tpsl(&position, &tp_only).await {
        Ok(outcome) => println!("  Unexpected success: {:?}", outcome.state()),
        Err(e) => println!("  Retry failed: {e}"),
    }
    sim.print_notifications();
    println!();
    Ok(())
}

/// The old stop-loss fills on the venue before the cancel lands.
async fn scenario_4_cancel_race(config: &TpslConfig) -> SimResult {
    println!("Scenario 4: Cancel Race\n");

    let sim = Sim::new(config);
    let position = btc_long(dec!(50000), dec!(0.5), dec!(10))?;
    let instrument = config.instrument_or_default(&position.symbol);
    sim.open(&position);

    let result = compute_tpsl(&TpslInput::prices(None, Some(dec!(49000))), Some(&position), &instrument);
    sim.coordinator.submit_tpsl(&position, &result).await?;
    if let Some(stale) = sim.coordinator.pending_orders(&position.symbol).stop_loss {
        sim.venue.resolve_order(stale);
        println!("  Stop-loss {stale} resolved on the venue side");
    }

    let result = compute_tpsl(&TpslInput::prices(None, Some(dec!(48500))), Some(&position), &instrument);
    let outcome = sim.coordinator.submit_tpsl(&position, &result).await?;
    println!("  Replacement: {:?}, pending {:?}", outcome.state(), sim.coordinator.pending_orders(&position.symbol));
    sim.print_notifications();
    println!();
    Ok(())
}

/// A second submit while the first is on the wire is refused.
async fn scenario_5_single_flight(config: &TpslConfig) -> SimResult {
    println!("Scenario 5: Single Flight\n");

    let sim = Sim::new(config);
    let position = btc_long(dec!(50000), dec!(0.5), dec!(10))?;
    let instrument = config.instrument_or_default(&position.symbol);
    sim.open(&position);
    sim.venue.set_latency(Duration::from_millis(50));

    let result = compute_tpsl(
        &TpslInput::prices(Some(dec!(52000)), Some(dec!(49000))),
        Some(&position),
        &instrument,
    );
    let (first, second) = tokio::join!(
        sim.coordinator.submit_tpsl(&position, &result),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sim.coordinator.submit_tpsl(&position, &result).await
        }
    );
    println!("  First: {:?}", first.map(|o| o.state()));
    println!("  Second: {:?}", second.map(|o| o.state()));
    println!("  Place calls on venue: {}", sim.venue.place_calls().len());
    sim.print_notifications();
    println!();
    Ok(())
}

/// Mark crosses the stop-loss; the position feed closes everything out.
async fn scenario_6_stop_loss_fires(config: &TpslConfig) -> SimResult {
    println!("Scenario 6: Stop-Loss Fires\n");

    let sim = Sim::new(config);
    let position = btc_long(dec!(50000), dec!(0.5), dec!(10))?;
    let instrument = config.instrument_or_default(&position.symbol);
    sim.venue.push_position(position.clone());

    let feed = {
        let venue = Arc::clone(&sim.venue);
        let snapshot = Arc::clone(&sim.snapshot);
        let coordinator = sim.coordinator.clone();
        tokio::spawn(async move { run_position_feed(venue.as_ref(), AccountId(1), snapshot, &coordinator).await })
    };
    while sim.snapshot.position(&position.symbol).is_none() {
        tokio::task::yield_now().await;
    }

    let result = compute_tpsl(
        &TpslInput::prices(Some(dec!(52000)), Some(dec!(49000))),
        Some(&position),
        &instrument,
    );
    sim.coordinator.submit_tpsl(&position, &result).await?;
    println!("  Legs resting: {}", sim.venue.resting_orders(&position.symbol).len());

    for mark in [dec!(49800), dec!(49400), dec!(48950)] {
        let fired = sim.venue.set_mark_price(&position.symbol, Price::new_unchecked(mark));
        println!("  Mark ${mark}: {} leg(s) fired", fired.len());
    }

    sim.venue.close_feeds();
    let stats = feed.await??;
    println!("  Feed applied {} updates, ignored {}", stats.applied, stats.ignored);
    println!("  Position open: {}", sim.snapshot.position(&position.symbol).is_some());
    println!("  Pending after close: {:?}", sim.coordinator.pending_orders(&position.symbol));
    sim.print_notifications();
    Ok(())
}
