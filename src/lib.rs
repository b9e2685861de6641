// perps-tpsl: take-profit / stop-loss engine for a perpetual futures panel.
// pure trigger math on one side, venue submission on the other.
// the math never touches I/O; only the coordinator and feeds talk to a venue.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Symbol, Side, Price, Quote, Leverage, ids
//   2.x  conditional.rs: trigger legs, trigger conditions, place requests
//   3.x  margin.rs: notional, initial margin, pnl <-> percent
//   4.x  position.rs: position struct, pnl at a price
//   5.x  tpsl/: panel input, price <-> pnl derivation, leg validation
//   6.x  order_book.rs: best bid/ask store, immediate trigger check
//   7.x  config.rs: instruments, tick sizes, env presets
//   8.x  snapshot.rs: selected instrument, positions, shown trigger levels
//   9.x  venue.rs: venue port; sim_venue.rs: in-memory venue (mocked)
//   10.x feeds.rs: market and account feed consumers
//   11.x notify.rs: outcome notifications
//   12.x coordinator.rs: cancel-then-place submission, single flight per symbol

// trigger math
pub mod conditional;
pub mod margin;
pub mod position;
pub mod tpsl;
pub mod types;

// state
pub mod order_book;
pub mod snapshot;

// venue side
pub mod coordinator;
pub mod feeds;
pub mod notify;
pub mod sim_venue;
pub mod venue;

pub mod config;

// re exports for convenience
pub use conditional::*;
pub use coordinator::*;
pub use margin::*;
pub use notify::*;
pub use order_book::*;
pub use position::*;
pub use snapshot::*;
pub use tpsl::*;
pub use types::*;
pub use venue::*;
pub use config::{ConfigError, Environment, InstrumentConfig, TpslConfig};
pub use feeds::{run_market_feed, run_position_feed, FeedStats};
pub use sim_venue::SimVenue;
