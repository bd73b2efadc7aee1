//! Trading Strategies Module
//!
//! Strategies are fed one candle at a time through [`Strategy::on_bar`] and
//! answer entry/exit questions about the latest bar. They keep their own
//! bounded history and never place orders themselves.

pub mod enhanced;
pub mod price_change;
pub mod sma_cross;

pub use enhanced::{EnhancedConfig, EnhancedStrategy};
pub use price_change::PriceChangeStrategy;
pub use sma_cross::{SmaCrossConfig, SmaCrossStrategy};

use anyhow::Result;

use crate::types::{Candle, Signal};

/// Strategy parameters as a JSON object; missing keys take their defaults
pub type StrategyParams = serde_json::Value;

// =============================================================================
// Strategy Trait
// =============================================================================

/// Trading strategy trait
pub trait Strategy: Send {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Feed the next bar
    fn on_bar(&mut self, candle: &Candle);

    fn should_enter_long(&self) -> bool;

    fn should_exit_long(&self) -> bool;

    fn should_enter_short(&self) -> bool {
        false
    }

    fn should_exit_short(&self) -> bool {
        false
    }

    /// Called when a position is opened at `price`
    fn notify_entry(&mut self, _price: f64) {}

    /// Called when the position is closed
    fn notify_exit(&mut self) {}

    /// Long-side view of the latest bar; an exit wins over an entry
    fn signal(&self) -> Signal {
        if self.should_exit_long() {
            Signal::Flat
        } else if self.should_enter_long() {
            Signal::Long
        } else {
            Signal::Hold
        }
    }
}

// =============================================================================
// Strategy Registry
// =============================================================================

/// Factory function type for creating strategies from parameters
pub type StrategyFactory = fn(&StrategyParams) -> Result<Box<dyn Strategy>>;

const REGISTRY: &[(&str, StrategyFactory)] = &[
    ("price-change", price_change::create),
    ("sma-cross", sma_cross::create),
    ("enhanced", enhanced::create),
];

/// Create a strategy by name
pub fn create(name: &str, params: &StrategyParams) -> Result<Box<dyn Strategy>> {
    let (_, factory) = REGISTRY
        .iter()
        .find(|(registered, _)| *registered == name)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown strategy: '{}'. Available: {}",
                name,
                available_strategies().join(", ")
            )
        })?;

    factory(params)
}

/// Get list of available strategy names
pub fn available_strategies() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

/// Parse a strategy config, treating `null` as "all defaults"
pub(crate) fn parse_params<T>(name: &str, params: &StrategyParams) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone())
        .map_err(|e| anyhow::anyhow!("Failed to parse {} config: {}", name, e))
}
