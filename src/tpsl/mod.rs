// 2.0: tpsl computation. pure and synchronous, re-run on every input edit.
// input.rs holds what the panel feeds in, compute.rs the price <-> pnl math,
// validation.rs the side checks against entry.

mod compute;
mod input;
mod validation;

pub use compute::{compute_from_pnl, compute_from_price, compute_tpsl};
pub use input::{AnchorField, LegResult, PnlVariant, TpslInput, TpslResult};
pub use validation::{validate_leg, validate_pair, LegError, TpslValidationError};
