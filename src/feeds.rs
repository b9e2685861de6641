// 10.0 feeds.rs: push feed consumers.
// market feed -> order book store, account feed -> snapshot store.
// each loop runs until the venue closes its channel.

use std::sync::Arc;

use crate::coordinator::SubmissionCoordinator;
use crate::order_book::OrderBookStore;
use crate::snapshot::{PositionChange, SnapshotStore};
use crate::types::{AccountId, Symbol};
use crate::venue::{AccountEvent, Venue, VenueError};

/// Counts for one feed run, logged when the feed ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedStats {
    pub applied: u64,
    pub ignored: u64,
}

/// Apply top-of-book pushes for `symbol` until the feed closes.
pub async fn run_market_feed<V: Venue>(
    venue: &V,
    symbol: Symbol,
    book: Arc<OrderBookStore>,
) -> Result<FeedStats, VenueError> {
    let mut rx = venue.subscribe_market(&symbol).await?;
    tracing::info!(%symbol, "market feed subscribed");

    let mut stats = FeedStats::default();
    while let Some(top) = rx.recv().await {
        if top.is_crossed() {
            tracing::debug!(%symbol, bid = ?top.best_bid, ask = ?top.best_ask, "crossed book top");
        }
        if book.apply(top) {
            stats.applied += 1;
        } else {
            stats.ignored += 1;
        }
    }

    tracing::info!(%symbol, applied = stats.applied, ignored = stats.ignored, "market feed closed");
    Ok(stats)
}

/// Apply position and trigger-level pushes until the feed closes.
///
/// A position going flat also drops the coordinator's pending legs for it:
/// the venue removes resting TP/SL with the position.
pub async fn run_position_feed<V>(
    venue: &V,
    account: AccountId,
    snapshot: Arc<SnapshotStore>,
    coordinator: &SubmissionCoordinator<V>,
) -> Result<FeedStats, VenueError>
where
    V: Venue + 'static,
{
    let mut rx = venue.subscribe_positions(account).await?;
    tracing::info!(account = account.0, "position feed subscribed");

    let mut stats = FeedStats::default();
    while let Some(event) = rx.recv().await {
        match event {
            AccountEvent::Position(position) => {
                let symbol = position.symbol.clone();
                match snapshot.apply_position(position) {
                    PositionChange::Ignored => {
                        stats.ignored += 1;
                        continue;
                    }
                    PositionChange::Closed => {
                        tracing::info!(%symbol, "position closed");
                        coordinator.on_position_closed(&symbol);
                    }
                    change => tracing::debug!(%symbol, ?change, "position update"),
                }
            }
            AccountEvent::TriggerLevels { symbol, levels } => {
                snapshot.apply_trigger_levels(&symbol, levels);
            }
        }
        stats.applied += 1;
    }

    tracing::info!(account = account.0, applied = stats.applied, ignored = stats.ignored, "position feed closed");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditional::TriggerType;
    use crate::notify::NotificationCollector;
    use crate::order_book::BookTop;
    use crate::position::{MarginMode, Position};
    use crate::sim_venue::SimVenue;
    use crate::types::{Leverage, Price, Side, Timestamp};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn market_feed_applies_until_closed() {
        let venue = Arc::new(SimVenue::default());
        let book = Arc::new(OrderBookStore::new());
        let sym = Symbol::new("BTC-PERP");

        let task = {
            let venue = Arc::clone(&venue);
            let book = Arc::clone(&book);
            let sym = sym.clone();
            tokio::spawn(async move { run_market_feed(venue.as_ref(), sym, book).await })
        };
        // wait for the subscription to land
        while venue.market_subscribers(&sym) == 0 {
            tokio::task::yield_now().await;
        }

        venue.push_book(BookTop::new(
            sym.clone(),
            Price::new(dec!(99)),
            Price::new(dec!(101)),
            Timestamp::from_millis(2),
        ));
        venue.push_book(BookTop::new(
            sym.clone(),
            Price::new(dec!(90)),
            Price::new(dec!(91)),
            Timestamp::from_millis(1),
        ));
        venue.close_feeds();

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats, FeedStats { applied: 1, ignored: 1 });
        assert_eq!(book.mid(&sym), Some(Price::new_unchecked(dec!(100))));
    }

    #[tokio::test]
    async fn position_feed_tracks_open_and_close() {
        let venue = Arc::new(SimVenue::default());
        let snapshot = Arc::new(SnapshotStore::new());
        let coordinator = SubmissionCoordinator::new(
            Arc::clone(&venue),
            Arc::clone(&snapshot),
            Arc::new(NotificationCollector::new()),
            TriggerType::Mark,
        );
        let sym = Symbol::new("ETH-PERP");
        let mut position = Position::new(
            sym.clone(),
            Side::Short,
            Price::new_unchecked(dec!(2000)),
            dec!(1),
            Leverage::new(dec!(10)).unwrap(),
            MarginMode::Isolated,
            Timestamp::from_millis(1),
        );
        venue.push_position(position.clone());

        let task = {
            let venue = Arc::clone(&venue);
            let snapshot = Arc::clone(&snapshot);
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                run_position_feed(venue.as_ref(), AccountId(1), snapshot, &coordinator).await
            })
        };
        while snapshot.position(&sym).is_none() {
            tokio::task::yield_now().await;
        }

        position.size = dec!(0);
        position.updated_at = Timestamp::from_millis(2);
        venue.push_position(position);
        venue.close_feeds();

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.applied, 2);
        assert!(snapshot.position(&sym).is_none());
    }
}
