//! Close-to-close momentum
//!
//! Buy when the close rises over the previous bar, sell when it falls.

use anyhow::Result;

use super::{Strategy, StrategyParams};
use crate::types::Candle;

#[derive(Debug, Clone, Default)]
pub struct PriceChangeStrategy {
    previous_close: Option<f64>,
    close: Option<f64>,
}

impl PriceChangeStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn closes(&self) -> Option<(f64, f64)> {
        Some((self.previous_close?, self.close?))
    }
}

impl Strategy for PriceChangeStrategy {
    fn name(&self) -> &'static str {
        "price-change"
    }

    fn on_bar(&mut self, candle: &Candle) {
        self.previous_close = self.close.replace(candle.close);
    }

    fn should_enter_long(&self) -> bool {
        self.closes().is_some_and(|(prev, cur)| cur > prev)
    }

    fn should_exit_long(&self) -> bool {
        self.closes().is_some_and(|(prev, cur)| cur < prev)
    }
}

/// Create strategy (called by registry); takes no parameters
pub fn create(_params: &StrategyParams) -> Result<Box<dyn Strategy>> {
    Ok(Box::new(PriceChangeStrategy::new()))
}
