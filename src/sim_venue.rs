// 9.0 sim_venue.rs: in-memory venue (mocked).
// holds resting legs, fires them on mark updates, and lets callers script
// rejections, cancel races and latency. the sim binary and the tests run on it.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::conditional::{PlaceOrderRequest, TpslKind, TriggerOrder};
use crate::order_book::BookTop;
use crate::position::Position;
use crate::snapshot::TriggerLevels;
use crate::types::{AccountId, OrderId, Price, Symbol, Timestamp};
use crate::venue::{AccountEvent, CancelAck, OrderAck, Venue, VenueError};

#[derive(Debug, Default)]
struct SimState {
    next_order_id: u64,
    resting: HashMap<OrderId, TriggerOrder>,
    positions: HashMap<Symbol, Position>,
    place_failures: HashMap<TpslKind, VecDeque<VenueError>>,
    cancel_failures: VecDeque<VenueError>,
    place_calls: Vec<PlaceOrderRequest>,
    cancel_calls: Vec<Vec<OrderId>>,
    market_subs: HashMap<Symbol, Vec<mpsc::Sender<BookTop>>>,
    account_subs: Vec<mpsc::Sender<AccountEvent>>,
}

#[derive(Debug)]
pub struct SimVenue {
    state: Mutex<SimState>,
    latency: Mutex<Duration>,
    feed_buffer: usize,
}

impl Default for SimVenue {
    fn default() -> Self {
        Self::new(256)
    }
}

impl SimVenue {
    pub fn new(feed_buffer: usize) -> Self {
        Self {
            state: Mutex::new(SimState {
                next_order_id: 1,
                ..SimState::default()
            }),
            latency: Mutex::new(Duration::ZERO),
            feed_buffer: feed_buffer.max(1),
        }
    }

    /// Delay applied before every place / cancel call is answered.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Next placement of `kind` fails with `error`.
    pub fn reject_next_place(&self, kind: TpslKind, error: VenueError) {
        self.state
            .lock()
            .place_failures
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    /// Next cancel call fails with `error`.
    pub fn fail_next_cancel(&self, error: VenueError) {
        self.state.lock().cancel_failures.push_back(error);
    }

    /// Drop a resting order as if it filled on the venue side.
    pub fn resolve_order(&self, order_id: OrderId) -> Option<TriggerOrder> {
        self.state.lock().resting.remove(&order_id)
    }

    pub fn resting_orders(&self, symbol: &Symbol) -> Vec<TriggerOrder> {
        let mut orders: Vec<TriggerOrder> = self
            .state
            .lock()
            .resting
            .values()
            .filter(|o| &o.request.symbol == symbol)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);
        orders
    }

    pub fn place_calls(&self) -> Vec<PlaceOrderRequest> {
        self.state.lock().place_calls.clone()
    }

    pub fn cancel_calls(&self) -> Vec<Vec<OrderId>> {
        self.state.lock().cancel_calls.clone()
    }

    /// Open or replace a position and push it to account subscribers.
    /// A flat push closes the position and drops its resting legs.
    pub fn push_position(&self, position: Position) {
        let mut state = self.state.lock();
        let symbol = position.symbol.clone();
        let mut legs_dropped = false;
        if position.is_flat() {
            state.positions.remove(&symbol);
            let before = state.resting.len();
            state.resting.retain(|_, o| o.request.symbol != symbol);
            legs_dropped = state.resting.len() != before;
        } else {
            state.positions.insert(symbol.clone(), position.clone());
        }
        broadcast(&mut state.account_subs, AccountEvent::Position(position));
        if legs_dropped {
            broadcast(
                &mut state.account_subs,
                AccountEvent::TriggerLevels {
                    symbol,
                    levels: TriggerLevels::default(),
                },
            );
        }
    }

    /// Push the venue's view of resting TP/SL levels for a symbol.
    pub fn push_trigger_levels(&self, symbol: &Symbol) {
        let mut state = self.state.lock();
        let levels = levels_for(&state.resting, symbol);
        broadcast(
            &mut state.account_subs,
            AccountEvent::TriggerLevels {
                symbol: symbol.clone(),
                levels,
            },
        );
    }

    pub fn push_book(&self, top: BookTop) {
        let mut state = self.state.lock();
        if let Some(subs) = state.market_subs.get_mut(&top.symbol) {
            broadcast(subs, top);
        }
    }

    /// Move mark price. Any leg whose trigger is crossed fires and closes the
    /// whole position; the sibling leg goes with it.
    pub fn set_mark_price(&self, symbol: &Symbol, mark: Price) -> Vec<TriggerOrder> {
        let mut state = self.state.lock();
        let fired: Vec<TriggerOrder> = state
            .resting
            .values()
            .filter(|o| &o.request.symbol == symbol && o.should_trigger(mark))
            .cloned()
            .collect();
        if fired.is_empty() {
            return fired;
        }

        state.resting.retain(|_, o| &o.request.symbol != symbol);
        if let Some(mut position) = state.positions.remove(symbol) {
            tracing::info!(%symbol, %mark, legs = fired.len(), "sim venue fired trigger");
            position.size = Decimal::ZERO;
            position.updated_at = Timestamp::now();
            broadcast(&mut state.account_subs, AccountEvent::Position(position));
        }
        broadcast(
            &mut state.account_subs,
            AccountEvent::TriggerLevels {
                symbol: symbol.clone(),
                levels: TriggerLevels::default(),
            },
        );
        fired
    }

    pub fn market_subscribers(&self, symbol: &Symbol) -> usize {
        self.state
            .lock()
            .market_subs
            .get(symbol)
            .map_or(0, Vec::len)
    }

    /// Drop every subscriber; their feeds end once drained.
    pub fn close_feeds(&self) {
        let mut state = self.state.lock();
        state.market_subs.clear();
        state.account_subs.clear();
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Venue for SimVenue {
    async fn place_order(&self, request: PlaceOrderRequest) -> Result<OrderAck, VenueError> {
        self.simulate_latency().await;

        let mut state = self.state.lock();
        state.place_calls.push(request.clone());

        if let Some(error) = state
            .place_failures
            .get_mut(&request.kind)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if !state.positions.contains_key(&request.symbol) {
            return Err(VenueError::Rejected {
                reason: format!("no open position on {}", request.symbol),
            });
        }

        let order_id = OrderId(state.next_order_id);
        state.next_order_id += 1;
        let ack = OrderAck {
            order_id,
            symbol: request.symbol.clone(),
            kind: request.kind,
        };
        state.resting.insert(order_id, TriggerOrder::new(order_id, request));
        Ok(ack)
    }

    async fn cancel_orders(
        &self,
        _symbol: &Symbol,
        order_ids: &[OrderId],
    ) -> Result<CancelAck, VenueError> {
        self.simulate_latency().await;

        let mut state = self.state.lock();
        state.cancel_calls.push(order_ids.to_vec());

        if let Some(error) = state.cancel_failures.pop_front() {
            return Err(error);
        }

        let mut ack = CancelAck::default();
        for id in order_ids {
            match state.resting.remove(id) {
                Some(_) => ack.cancelled.push(*id),
                None => ack.not_found.push(*id),
            }
        }
        Ok(ack)
    }

    async fn subscribe_market(&self, symbol: &Symbol) -> Result<mpsc::Receiver<BookTop>, VenueError> {
        let (tx, rx) = mpsc::channel(self.feed_buffer);
        self.state
            .lock()
            .market_subs
            .entry(symbol.clone())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn subscribe_positions(
        &self,
        _account: AccountId,
    ) -> Result<mpsc::Receiver<AccountEvent>, VenueError> {
        let (tx, rx) = mpsc::channel(self.feed_buffer);
        let mut state = self.state.lock();
        // snapshot first so a late subscriber starts from current state
        for position in state.positions.values() {
            let _ = tx.try_send(AccountEvent::Position(position.clone()));
        }
        state.account_subs.push(tx);
        Ok(rx)
    }
}

fn levels_for(resting: &HashMap<OrderId, TriggerOrder>, symbol: &Symbol) -> TriggerLevels {
    let mut levels = TriggerLevels::default();
    for order in resting.values().filter(|o| &o.request.symbol == symbol) {
        levels.set(order.request.kind, Some(order.request.trigger_price));
    }
    levels
}

// closed receivers are pruned, full ones drop the update
fn broadcast<T: Clone>(subs: &mut Vec<mpsc::Sender<T>>, item: T) {
    subs.retain(|tx| match tx.try_send(item.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("sim venue subscriber lagging, update dropped");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}
