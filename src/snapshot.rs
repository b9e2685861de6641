//! Snapshot store: selected instrument, open positions, displayed TP/SL levels.
//!
//! Positions are written only by the position feed consumer. Trigger levels
//! are written optimistically by the submission coordinator and overwritten
//! by whatever the venue pushes next.

use crate::conditional::TpslKind;
use crate::position::Position;
use crate::types::{Price, Symbol};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Trigger prices shown next to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerLevels {
    pub take_profit: Option<Price>,
    pub stop_loss: Option<Price>,
}

impl TriggerLevels {
    pub fn get(&self, kind: TpslKind) -> Option<Price> {
        match kind {
            TpslKind::TakeProfit => self.take_profit,
            TpslKind::StopLoss => self.stop_loss,
        }
    }

    pub fn set(&mut self, kind: TpslKind, price: Option<Price>) {
        match kind {
            TpslKind::TakeProfit => self.take_profit = price,
            TpslKind::StopLoss => self.stop_loss = price,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.take_profit.is_none() && self.stop_loss.is_none()
    }
}

/// What a position push did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionChange {
    Opened,
    Updated,
    Closed,
    /// Flat push for an unknown symbol, or older than what is held.
    Ignored,
}

#[derive(Debug, Default)]
struct SnapshotState {
    selected: Option<Symbol>,
    positions: HashMap<Symbol, Position>,
    levels: HashMap<Symbol, TriggerLevels>,
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    state: RwLock<SnapshotState>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_instrument(&self, symbol: Symbol) {
        self.state.write().selected = Some(symbol);
    }

    pub fn selected_instrument(&self) -> Option<Symbol> {
        self.state.read().selected.clone()
    }

    pub fn selected_position(&self) -> Option<Position> {
        let state = self.state.read();
        state
            .selected
            .as_ref()
            .and_then(|symbol| state.positions.get(symbol))
            .cloned()
    }

    /// Replace the held position wholesale. A flat push closes it.
    pub fn apply_position(&self, position: Position) -> PositionChange {
        let mut state = self.state.write();
        let symbol = position.symbol.clone();

        if let Some(current) = state.positions.get(&symbol) {
            if current.updated_at > position.updated_at {
                return PositionChange::Ignored;
            }
        }

        if position.is_flat() {
            state.levels.remove(&symbol);
            return match state.positions.remove(&symbol) {
                Some(_) => PositionChange::Closed,
                None => PositionChange::Ignored,
            };
        }

        match state.positions.insert(symbol, position) {
            Some(_) => PositionChange::Updated,
            None => PositionChange::Opened,
        }
    }

    pub fn position(&self, symbol: &Symbol) -> Option<Position> {
        self.state.read().positions.get(symbol).cloned()
    }

    /// All open positions, ordered by symbol.
    pub fn positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.state.read().positions.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        positions
    }

    pub fn trigger_levels(&self, symbol: &Symbol) -> TriggerLevels {
        self.state
            .read()
            .levels
            .get(symbol)
            .copied()
            .unwrap_or_default()
    }

    /// Optimistic write after a venue ack, ahead of the next push.
    pub fn set_trigger_level(&self, symbol: &Symbol, kind: TpslKind, price: Option<Price>) {
        let mut state = self.state.write();
        if !state.positions.contains_key(symbol) {
            return;
        }
        let levels = state.levels.entry(symbol.clone()).or_default();
        levels.set(kind, price);
        if levels.is_empty() {
            state.levels.remove(symbol);
        }
    }

    /// Venue push of the resting TP/SL levels. Replaces any optimistic value.
    pub fn apply_trigger_levels(&self, symbol: &Symbol, levels: TriggerLevels) {
        let mut state = self.state.write();
        if levels.is_empty() {
            state.levels.remove(symbol);
        } else {
            state.levels.insert(symbol.clone(), levels);
        }
    }
}
