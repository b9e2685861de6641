//! Submission coordinator.
//!
//! Replaces a position's TP/SL legs on the venue: cancel whatever is resting,
//! then place the new legs. Only one submission per symbol runs at a time, and
//! the venue work runs on its own task so a caller that goes away mid-flight
//! never leaves the pending-order set out of sync with the venue.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::conditional::{PlaceOrderRequest, TpslKind, TriggerType};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::position::Position;
use crate::snapshot::SnapshotStore;
use crate::tpsl::{validate_pair, TpslResult, TpslValidationError};
use crate::types::{OrderId, Price, Symbol, Timestamp};
use crate::venue::{OrderAck, Venue, VenueError};

/// TP/SL order ids resting on the venue for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingOrders {
    pub take_profit: Option<OrderId>,
    pub stop_loss: Option<OrderId>,
}

impl PendingOrders {
    pub fn get(&self, kind: TpslKind) -> Option<OrderId> {
        match kind {
            TpslKind::TakeProfit => self.take_profit,
            TpslKind::StopLoss => self.stop_loss,
        }
    }

    fn set(&mut self, kind: TpslKind, order_id: Option<OrderId>) {
        match kind {
            TpslKind::TakeProfit => self.take_profit = order_id,
            TpslKind::StopLoss => self.stop_loss = order_id,
        }
    }

    pub fn ids(&self) -> Vec<OrderId> {
        self.take_profit.into_iter().chain(self.stop_loss).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.take_profit.is_none() && self.stop_loss.is_none()
    }
}

/// Pending legs per symbol. Changed only by venue confirmations.
#[derive(Debug, Default)]
pub struct PendingOrderSet {
    by_symbol: HashMap<Symbol, PendingOrders>,
}

impl PendingOrderSet {
    pub fn get(&self, symbol: &Symbol) -> PendingOrders {
        self.by_symbol.get(symbol).copied().unwrap_or_default()
    }

    fn record(&mut self, symbol: &Symbol, kind: TpslKind, order_id: OrderId) {
        self.by_symbol
            .entry(symbol.clone())
            .or_default()
            .set(kind, Some(order_id));
    }

    // returns the kinds whose ids were dropped
    fn forget(&mut self, symbol: &Symbol, order_ids: &[OrderId]) -> Vec<TpslKind> {
        let Some(pending) = self.by_symbol.get_mut(symbol) else {
            return Vec::new();
        };
        let mut dropped = Vec::new();
        for kind in [TpslKind::TakeProfit, TpslKind::StopLoss] {
            if pending.get(kind).is_some_and(|id| order_ids.contains(&id)) {
                pending.set(kind, None);
                dropped.push(kind);
            }
        }
        if pending.is_empty() {
            self.by_symbol.remove(symbol);
        }
        dropped
    }

    fn clear(&mut self, symbol: &Symbol) {
        self.by_symbol.remove(symbol);
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

/// Where a symbol's latest submission stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Cancelling,
    Placing,
    Confirmed,
    PartiallyConfirmed,
    Failed,
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Confirmed | SubmissionState::PartiallyConfirmed | SubmissionState::Failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLeg {
    pub kind: TpslKind,
    pub order_id: OrderId,
    pub trigger_price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLeg {
    pub kind: TpslKind,
    pub error: VenueError,
}

/// Successful outcomes. Failures come back as [`SubmitError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Every requested leg is resting. With no legs requested this is a plain removal.
    Confirmed {
        placed: Vec<PlacedLeg>,
        cancelled: Vec<OrderId>,
    },
    /// One leg resting, the other rejected. The placed leg is kept.
    PartiallyConfirmed {
        placed: Vec<PlacedLeg>,
        rejected: Vec<RejectedLeg>,
        cancelled: Vec<OrderId>,
    },
}

impl SubmissionOutcome {
    pub fn state(&self) -> SubmissionState {
        match self {
            SubmissionOutcome::Confirmed { .. } => SubmissionState::Confirmed,
            SubmissionOutcome::PartiallyConfirmed { .. } => SubmissionState::PartiallyConfirmed,
        }
    }

    pub fn placed(&self) -> &[PlacedLeg] {
        match self {
            SubmissionOutcome::Confirmed { placed, .. }
            | SubmissionOutcome::PartiallyConfirmed { placed, .. } => placed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("tp/sl input has validation errors: {0:?}")]
    Validation(TpslValidationError),

    #[error("no open position on {0}")]
    NoPosition(Symbol),

    #[error("a tp/sl submission for {0} is already in flight")]
    AlreadyInFlight(Symbol),

    #[error("could not cancel existing tp/sl orders: {0}")]
    CancelFailed(#[source] VenueError),

    #[error("every tp/sl leg was rejected")]
    Rejected(Vec<RejectedLeg>),

    #[error("submission task ended without a result")]
    Aborted,
}

// releases the symbol when the submission task finishes, however it finishes
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<Symbol>>>,
    symbol: Symbol,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<Symbol>>>, symbol: &Symbol) -> Option<Self> {
        if !in_flight.lock().insert(symbol.clone()) {
            return None;
        }
        Some(Self {
            in_flight: Arc::clone(in_flight),
            symbol: symbol.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.symbol);
    }
}

struct Inner<V> {
    venue: Arc<V>,
    snapshot: Arc<SnapshotStore>,
    notifier: Arc<dyn Notifier>,
    trigger_type: TriggerType,
    pending: RwLock<PendingOrderSet>,
    states: Mutex<HashMap<Symbol, SubmissionState>>,
    in_flight: Arc<Mutex<HashSet<Symbol>>>,
    open_panels: Mutex<HashSet<Symbol>>,
}

pub struct SubmissionCoordinator<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for SubmissionCoordinator<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> SubmissionCoordinator<V>
where
    V: Venue + 'static,
{
    pub fn new(
        venue: Arc<V>,
        snapshot: Arc<SnapshotStore>,
        notifier: Arc<dyn Notifier>,
        trigger_type: TriggerType,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                venue,
                snapshot,
                notifier,
                trigger_type,
                pending: RwLock::new(PendingOrderSet::default()),
                states: Mutex::new(HashMap::new()),
                in_flight: Arc::new(Mutex::new(HashSet::new())),
                open_panels: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn venue(&self) -> &Arc<V> {
        &self.inner.venue
    }

    /// Replace the position's TP/SL legs with the ones in `result`.
    ///
    /// Legs left empty in `result` are not placed; submitting with both empty
    /// just removes what is resting. The returned future may be dropped at any
    /// time: the venue calls keep running and their results are still applied.
    pub async fn submit_tpsl(
        &self,
        position: &Position,
        result: &TpslResult,
    ) -> Result<SubmissionOutcome, SubmitError> {
        if !result.is_valid() {
            return Err(SubmitError::Validation(result.errors));
        }
        if position.is_flat() {
            return Err(SubmitError::NoPosition(position.symbol.clone()));
        }
        // the result may have been computed for a different side or entry
        let errors = validate_pair(
            result.take_profit_price,
            result.stop_loss_price,
            position.side,
            position.entry_price,
        );
        if !errors.is_valid() {
            return Err(SubmitError::Validation(errors));
        }

        let symbol = position.symbol.clone();
        let Some(guard) = InFlightGuard::acquire(&self.inner.in_flight, &symbol) else {
            tracing::debug!(%symbol, "tp/sl submission rejected, one already in flight");
            return Err(SubmitError::AlreadyInFlight(symbol));
        };
        self.open_panel(&symbol);

        let now = Timestamp::now();
        let request_for = |kind: TpslKind| {
            result.trigger(kind).map(|price| {
                PlaceOrderRequest::for_leg(position, kind, price, self.inner.trigger_type, now)
            })
        };
        let take_profit = request_for(TpslKind::TakeProfit);
        let stop_loss = request_for(TpslKind::StopLoss);

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _guard = guard;
            inner.run(symbol, take_profit, stop_loss).await
        });
        task.await.map_err(|e| {
            tracing::error!(error = %e, "tp/sl submission task failed");
            SubmitError::Aborted
        })?
    }

    pub fn state(&self, symbol: &Symbol) -> SubmissionState {
        self.inner
            .states
            .lock()
            .get(symbol)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_in_flight(&self, symbol: &Symbol) -> bool {
        self.inner.in_flight.lock().contains(symbol)
    }

    pub fn pending_orders(&self, symbol: &Symbol) -> PendingOrders {
        self.inner.pending.read().get(symbol)
    }

    /// Panel for `symbol` is showing; outcomes will be notified.
    pub fn open_panel(&self, symbol: &Symbol) {
        self.inner.open_panels.lock().insert(symbol.clone());
    }

    /// Panel closed. In-flight work still completes, silently.
    pub fn close_panel(&self, symbol: &Symbol) {
        self.inner.open_panels.lock().remove(symbol);
        if !self.is_in_flight(symbol) {
            self.inner.states.lock().remove(symbol);
        }
    }

    /// Position is gone; its legs went with it.
    pub fn on_position_closed(&self, symbol: &Symbol) {
        self.inner.pending.write().clear(symbol);
        tracing::debug!(%symbol, "position closed, pending tp/sl cleared");
    }
}

impl<V: Venue> Inner<V> {
    async fn run(
        &self,
        symbol: Symbol,
        take_profit: Option<PlaceOrderRequest>,
        stop_loss: Option<PlaceOrderRequest>,
    ) -> Result<SubmissionOutcome, SubmitError> {
        let cancelled = match self.cancel_stale(&symbol).await {
            Ok(cancelled) => cancelled,
            Err(error) => {
                self.set_state(&symbol, SubmissionState::Failed);
                self.notify(
                    &symbol,
                    error.notification_kind(),
                    format!("Could not replace TP/SL on {symbol}: {error}"),
                );
                return Err(SubmitError::CancelFailed(error));
            }
        };

        self.set_state(&symbol, SubmissionState::Placing);
        let (tp, sl) = tokio::join!(self.place_leg(take_profit), self.place_leg(stop_loss));

        let mut placed = Vec::new();
        let mut rejected = Vec::new();
        for (request, outcome) in [tp, sl].into_iter().flatten() {
            match outcome {
                Ok(ack) => {
                    self.confirm_placed(&ack, request.trigger_price);
                    placed.push(PlacedLeg {
                        kind: request.kind,
                        order_id: ack.order_id,
                        trigger_price: request.trigger_price,
                    });
                }
                Err(error) => {
                    tracing::warn!(%symbol, kind = %request.kind, %error, "tp/sl leg rejected");
                    rejected.push(RejectedLeg {
                        kind: request.kind,
                        error,
                    });
                }
            }
        }

        if rejected.is_empty() {
            self.set_state(&symbol, SubmissionState::Confirmed);
            let message = if placed.is_empty() {
                format!("TP/SL removed on {symbol}")
            } else {
                format!("TP/SL set on {symbol}: {}", describe_placed(&placed))
            };
            tracing::info!(%symbol, placed = placed.len(), cancelled = cancelled.len(), "tp/sl confirmed");
            self.notify(&symbol, NotificationKind::Success, message);
            return Ok(SubmissionOutcome::Confirmed { placed, cancelled });
        }

        if placed.is_empty() {
            self.set_state(&symbol, SubmissionState::Failed);
            let kind = rejected
                .iter()
                .map(|leg| leg.error.notification_kind())
                .max_by_key(NotificationKind::severity)
                .unwrap_or(NotificationKind::Generic);
            self.notify(
                &symbol,
                kind,
                format!("TP/SL rejected on {symbol}: {}", describe_rejected(&rejected)),
            );
            return Err(SubmitError::Rejected(rejected));
        }

        self.set_state(&symbol, SubmissionState::PartiallyConfirmed);
        tracing::info!(%symbol, placed = placed.len(), rejected = rejected.len(), "tp/sl partially confirmed");
        self.notify(
            &symbol,
            NotificationKind::PartialSuccess,
            format!(
                "TP/SL partially set on {symbol}: {}; {}",
                describe_placed(&placed),
                describe_rejected(&rejected)
            ),
        );
        Ok(SubmissionOutcome::PartiallyConfirmed {
            placed,
            rejected,
            cancelled,
        })
    }

    // cancel everything pending for the symbol. not-found counts as cancelled.
    async fn cancel_stale(&self, symbol: &Symbol) -> Result<Vec<OrderId>, VenueError> {
        self.set_state(symbol, SubmissionState::Cancelling);
        let stale = self.pending.read().get(symbol).ids();
        if stale.is_empty() {
            return Ok(stale);
        }

        match self.venue.cancel_orders(symbol, &stale).await {
            Ok(ack) => {
                if !ack.not_found.is_empty() {
                    tracing::debug!(%symbol, not_found = ?ack.not_found, "stale tp/sl already resolved on venue");
                }
            }
            Err(error) if error.is_already_resolved() => {
                tracing::debug!(%symbol, %error, "stale tp/sl already resolved on venue");
            }
            Err(error) => {
                tracing::warn!(%symbol, %error, "cancel of stale tp/sl failed");
                return Err(error);
            }
        }

        let dropped = self.pending.write().forget(symbol, &stale);
        for kind in dropped {
            self.snapshot.set_trigger_level(symbol, kind, None);
        }
        Ok(stale)
    }

    async fn place_leg(
        &self,
        request: Option<PlaceOrderRequest>,
    ) -> Option<(PlaceOrderRequest, Result<OrderAck, VenueError>)> {
        let request = request?;
        let outcome = self.venue.place_order(request.clone()).await;
        Some((request, outcome))
    }

    fn confirm_placed(&self, ack: &OrderAck, trigger_price: Price) {
        self.pending.write().record(&ack.symbol, ack.kind, ack.order_id);
        self.snapshot
            .set_trigger_level(&ack.symbol, ack.kind, Some(trigger_price));
    }

    fn set_state(&self, symbol: &Symbol, state: SubmissionState) {
        tracing::debug!(%symbol, ?state, "tp/sl submission state");
        self.states.lock().insert(symbol.clone(), state);
    }

    // one notification per terminal outcome, only while the panel is open
    fn notify(&self, symbol: &Symbol, kind: NotificationKind, message: String) {
        if !self.open_panels.lock().contains(symbol) {
            tracing::debug!(%symbol, ?kind, "panel closed, notification suppressed");
            return;
        }
        self.notifier
            .notify(Notification::new(symbol.clone(), kind, message));
    }
}

fn describe_placed(placed: &[PlacedLeg]) -> String {
    placed
        .iter()
        .map(|leg| format!("{} @ {}", leg.kind, leg.trigger_price))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_rejected(rejected: &[RejectedLeg]) -> String {
    rejected
        .iter()
        .map(|leg| format!("{} rejected ({})", leg.kind, leg.error))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_set_forget_reports_kinds() {
        let mut set = PendingOrderSet::default();
        let sym = Symbol::new("BTC-PERP");
        set.record(&sym, TpslKind::TakeProfit, OrderId(1));
        set.record(&sym, TpslKind::StopLoss, OrderId(2));
        assert_eq!(set.get(&sym).ids(), vec![OrderId(1), OrderId(2)]);

        let dropped = set.forget(&sym, &[OrderId(2), OrderId(99)]);
        assert_eq!(dropped, vec![TpslKind::StopLoss]);
        assert_eq!(set.get(&sym).take_profit, Some(OrderId(1)));

        set.forget(&sym, &[OrderId(1)]);
        assert!(set.is_empty());
    }

    #[test]
    fn recording_replaces_same_kind() {
        let mut set = PendingOrderSet::default();
        let sym = Symbol::new("ETH-PERP");
        set.record(&sym, TpslKind::TakeProfit, OrderId(1));
        set.record(&sym, TpslKind::TakeProfit, OrderId(5));
        assert_eq!(set.get(&sym).take_profit, Some(OrderId(5)));
        assert_eq!(set.len(), 1);

        set.clear(&sym);
        assert!(set.get(&sym).is_empty());
    }

    #[test]
    fn terminal_states() {
        assert!(!SubmissionState::Idle.is_terminal());
        assert!(!SubmissionState::Placing.is_terminal());
        assert!(SubmissionState::PartiallyConfirmed.is_terminal());
        assert!(SubmissionState::Failed.is_terminal());
    }
}
