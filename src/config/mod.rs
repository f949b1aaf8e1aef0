//! Configuration management for the entry desk.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Channel, bracket and sizing parameters
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Paper execution and replay settings
    #[serde(default)]
    pub paper: PaperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Lookback of the Donchian channel in bars
    #[serde(default = "default_donchian_period")]
    pub donchian_period: usize,
    /// Lookback of the ATR in bars
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// ATR multiple for the profit target (0.1-10.0)
    #[serde(default = "default_target_multiplier")]
    pub target_multiplier: Decimal,
    /// ATR multiple for the stop loss (0.1-10.0)
    #[serde(default = "default_stop_multiplier")]
    pub stop_multiplier: Decimal,
    /// Fixed order quantity in contracts
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    /// Market updates ignored at startup while indicators warm up
    #[serde(default = "default_bars_required_to_trade")]
    pub bars_required_to_trade: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Paper gateway cancels OCO siblings itself
    #[serde(default = "default_supports_oco")]
    pub supports_oco: bool,
    /// Leading feed rows replayed in historical mode
    #[serde(default)]
    pub history_bars: usize,
    /// Delay between replayed bars in milliseconds
    #[serde(default)]
    pub bar_interval_ms: u64,
}

// Default value functions
fn default_donchian_period() -> usize {
    14
}

fn default_atr_period() -> usize {
    9
}

fn default_target_multiplier() -> Decimal {
    Decimal::new(13, 1) // 1.3
}

fn default_stop_multiplier() -> Decimal {
    Decimal::new(7, 1) // 0.7
}

fn default_quantity() -> Decimal {
    Decimal::new(3, 0)
}

fn default_bars_required_to_trade() -> u64 {
    14
}

fn default_supports_oco() -> bool {
    true
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("DDESK"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let s = &self.strategy;
        let multiplier_range = Decimal::new(1, 1)..=Decimal::new(10, 0);

        anyhow::ensure!(s.donchian_period >= 1, "donchian_period must be >= 1");
        anyhow::ensure!(s.atr_period >= 1, "atr_period must be >= 1");
        anyhow::ensure!(
            multiplier_range.contains(&s.target_multiplier),
            "target_multiplier must be between 0.1 and 10.0"
        );
        anyhow::ensure!(
            multiplier_range.contains(&s.stop_multiplier),
            "stop_multiplier must be between 0.1 and 10.0"
        );
        anyhow::ensure!(s.quantity >= Decimal::ONE, "quantity must be >= 1");
        anyhow::ensure!(
            s.quantity.fract().is_zero(),
            "quantity must be a whole number of contracts"
        );

        Ok(())
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            donchian_period: default_donchian_period(),
            atr_period: default_atr_period(),
            target_multiplier: default_target_multiplier(),
            stop_multiplier: default_stop_multiplier(),
            quantity: default_quantity(),
            bars_required_to_trade: default_bars_required_to_trade(),
        }
    }
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            supports_oco: default_supports_oco(),
            history_bars: 0,
            bar_interval_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy.target_multiplier, dec!(1.3));
        assert_eq!(config.strategy.stop_multiplier, dec!(0.7));
        assert_eq!(config.strategy.quantity, dec!(3));
        assert!(config.paper.supports_oco);
    }

    #[test]
    fn test_multiplier_bounds() {
        let mut config = Config::default();
        config.strategy.target_multiplier = dec!(0.1);
        config.strategy.stop_multiplier = dec!(10.0);
        assert!(config.validate().is_ok());

        config.strategy.target_multiplier = dec!(0.05);
        assert!(config.validate().is_err());

        config.strategy.target_multiplier = dec!(1.3);
        config.strategy.stop_multiplier = dec!(10.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_periods_and_quantity() {
        let mut config = Config::default();
        config.strategy.donchian_period = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.strategy.atr_period = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.strategy.quantity = dec!(0.5);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.strategy.quantity = dec!(1.5);
        assert!(config.validate().is_err());

        config.strategy.quantity = dec!(2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_section() {
        let config: Config =
            serde_json::from_str(r#"{"strategy": {"quantity": "2"}, "paper": {"history_bars": 50}}"#)
                .unwrap();
        assert_eq!(config.strategy.quantity, dec!(2));
        assert_eq!(config.strategy.donchian_period, 14);
        assert_eq!(config.paper.history_bars, 50);
        assert!(config.paper.supports_oco);
    }
}
