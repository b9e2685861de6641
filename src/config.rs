// 7.0 config.rs: all settings in one place. instrument precision, trigger defaults, feed sizing.
// 7.1 Environment presets pick a full TpslConfig.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::conditional::TriggerType;
use crate::types::Symbol;

// Per-instrument precision as the venue enforces it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    // Venue symbol (e.g. "BTC-PERP")
    pub symbol: Symbol,
    // Price tick size. zero means the venue accepts any precision
    pub tick_size: Decimal,
    // Maximum leverage the venue allows on this instrument. compute_tpsl flags positions above it
    pub max_leverage: Decimal,
}

impl InstrumentConfig {
    pub fn btc_perp() -> Self {
        Self {
            symbol: Symbol::new("BTC-PERP"),
            tick_size: Decimal::new(1, 1),  // $0.1
            max_leverage: Decimal::new(50, 0),
        }
    }

    pub fn eth_perp() -> Self {
        Self {
            symbol: Symbol::new("ETH-PERP"),
            tick_size: Decimal::new(1, 2),  // $0.01
            max_leverage: Decimal::new(25, 0),
        }
    }

    // no rounding and no leverage cap, for symbols the config does not know
    pub fn unconstrained(symbol: Symbol) -> Self {
        Self {
            symbol,
            tick_size: Decimal::ZERO,
            max_leverage: Decimal::MAX,
        }
    }

    /// Round a price to the nearest tick, midpoint away from zero.
    /// None if the price is too large to express in ticks.
    pub fn round_price(&self, price: Decimal) -> Option<Decimal> {
        if self.tick_size.is_zero() {
            return Some(price);
        }
        let ticks = price
            .checked_div(self.tick_size)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Some(ticks.checked_mul(self.tick_size)?.normalize())
    }
}

// The complete tpsl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpslConfig {
    pub instruments: Vec<InstrumentConfig>,
    // Which price the venue compares triggers against
    pub trigger_type: TriggerType,
    // Buffered updates per feed subscription
    pub feed_buffer: usize,
    // Decimal places shown for pnl and percent in notifications
    pub display_decimals: u32,
}

impl Default for TpslConfig {
    fn default() -> Self {
        Self {
            instruments: vec![InstrumentConfig::btc_perp(), InstrumentConfig::eth_perp()],
            trigger_type: TriggerType::Mark,
            feed_buffer: 256,
            display_decimals: 2,
        }
    }
}

impl TpslConfig {
    // testnet trades on last price so triggers fire on thin books during testing
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.trigger_type = TriggerType::Last;
        config.feed_buffer = 64;
        config
    }

    pub fn mainnet() -> Self {
        let mut config = Self::default();
        config.trigger_type = TriggerType::Mark;
        config.feed_buffer = 1024;
        config
    }

    pub fn instrument(&self, symbol: &Symbol) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|i| &i.symbol == symbol)
    }

    pub fn instrument_or_default(&self, symbol: &Symbol) -> InstrumentConfig {
        self.instrument(symbol)
            .cloned()
            .unwrap_or_else(|| InstrumentConfig::unconstrained(symbol.clone()))
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        for instrument in &self.instruments {
            if instrument.tick_size < Decimal::ZERO {
                return Err(ConfigError::InvalidInstrument {
                    symbol: instrument.symbol.clone(),
                    reason: "tick size must not be negative".to_string(),
                });
            }
            if instrument.max_leverage < Decimal::ONE {
                return Err(ConfigError::InvalidInstrument {
                    symbol: instrument.symbol.clone(),
                    reason: "max leverage must be at least 1x".to_string(),
                });
            }
        }

        let mut symbols: Vec<&Symbol> = self.instruments.iter().map(|i| &i.symbol).collect();
        symbols.sort();
        if let Some(pair) = symbols.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::DuplicateInstrument(pair[0].clone()));
        }

        if self.feed_buffer == 0 {
            return Err(ConfigError::InvalidFeed {
                reason: "feed buffer must hold at least one update".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("instrument {symbol}: {reason}")]
    InvalidInstrument { symbol: Symbol, reason: String },

    #[error("instrument {0} configured twice")]
    DuplicateInstrument(Symbol),

    #[error("feed: {reason}")]
    InvalidFeed { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> TpslConfig {
        match self {
            Environment::Development => TpslConfig::default(),
            Environment::Testnet => TpslConfig::testnet(),
            Environment::Mainnet => TpslConfig::mainnet(),
        }
    }
}
