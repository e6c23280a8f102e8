//! Invocation-time configuration.
//!
//! Stored as TOML. Every field has a default, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! pair = "BTC/USDT"
//! timeframe = "5m"
//! candle_limit = 50
//! risk_fraction = 0.05
//! margin_mode = "isolated"
//! leverage = 1
//!
//! [indicators]
//! fast = 8
//! slow = 21
//! momentum = 14
//! volatility = 14
//!
//! [signal]
//! momentum_floor = 50.0
//! momentum_ceiling = 70.0
//! stop_atr_multiple = 0.4
//! target_atr_multiple = 1.1
//!
//! [venue]
//! trigger_price_type = "mark"
//! ```
//!
//! Credentials never live here.

use crate::domain::{MarginMode, Pair, Timeframe};
use crate::exchange::VenueConfig;
use crate::indicators::IndicatorWindows;
use crate::signal::SignalRule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    pub pair: Pair,
    pub timeframe: Timeframe,
    /// Candles requested per invocation, forming bar included.
    pub candle_limit: usize,
    pub risk_fraction: f64,
    pub margin_mode: MarginMode,
    pub leverage: u32,
    pub indicators: IndicatorWindows,
    pub signal: SignalRule,
    pub venue: VenueConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            pair: Pair::default(),
            timeframe: Timeframe::M5,
            candle_limit: 50,
            risk_fraction: 0.05,
            margin_mode: MarginMode::Isolated,
            leverage: 1,
            indicators: IndicatorWindows::default(),
            signal: SignalRule::default(),
            venue: VenueConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg))
        };

        if !(self.risk_fraction > 0.0 && self.risk_fraction <= 1.0) {
            return invalid(format!(
                "risk_fraction must be in (0, 1], got {}",
                self.risk_fraction
            ));
        }
        if self.leverage == 0 {
            return invalid("leverage must be at least 1".into());
        }

        let w = &self.indicators;
        if w.fast == 0 || w.slow == 0 || w.momentum == 0 || w.volatility == 0 {
            return invalid(format!("indicator windows must be non-zero, got {w:?}"));
        }
        if w.fast >= w.slow {
            return invalid(format!(
                "fast window ({}) must be shorter than slow window ({})",
                w.fast, w.slow
            ));
        }

        let s = &self.signal;
        if !(s.stop_atr_multiple > 0.0 && s.stop_atr_multiple.is_finite()) {
            return invalid(format!(
                "stop_atr_multiple must be positive, got {}",
                s.stop_atr_multiple
            ));
        }
        if !(s.target_atr_multiple > 0.0 && s.target_atr_multiple.is_finite()) {
            return invalid(format!(
                "target_atr_multiple must be positive, got {}",
                s.target_atr_multiple
            ));
        }
        if !(s.momentum_floor < s.momentum_ceiling) {
            return invalid(format!(
                "momentum band ({}, {}) is empty",
                s.momentum_floor, s.momentum_ceiling
            ));
        }

        let needed = w.min_closed_candles();
        if self.candle_limit < needed {
            return invalid(format!(
                "candle_limit {} is below the {needed} closed candles the indicators need",
                self.candle_limit
            ));
        }
        if self.venue.timeout_secs == 0 {
            return invalid("venue.timeout_secs must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::bitget::TriggerPriceType;
    use std::io::Write;

    #[test]
    fn empty_file_is_default() {
        let config = BotConfig::from_toml("").unwrap();
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.pair.as_str(), "BTC/USDT");
        assert_eq!(config.timeframe, Timeframe::M5);
        assert_eq!(config.candle_limit, 50);
        assert_eq!(config.risk_fraction, 0.05);
        assert_eq!(config.margin_mode, MarginMode::Isolated);
        assert_eq!(config.leverage, 1);
        assert_eq!(config.venue.trigger_price_type, TriggerPriceType::Mark);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
pair = "eth/usdt"
timeframe = "15m"
margin_mode = "cross"
leverage = 3

[indicators]
fast = 5

[venue]
trigger_price_type = "fill"
"#
        )
        .unwrap();
        let config = BotConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pair.as_str(), "ETH/USDT");
        assert_eq!(config.timeframe, Timeframe::M15);
        assert_eq!(config.margin_mode, MarginMode::Cross);
        assert_eq!(config.leverage, 3);
        assert_eq!(config.indicators.fast, 5);
        assert_eq!(config.indicators.slow, 21);
        assert_eq!(config.venue.trigger_price_type, TriggerPriceType::Fill);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BotConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn unknown_key_is_parse_error() {
        assert!(matches!(
            BotConfig::from_toml("risk = 0.1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            BotConfig::from_toml(r#"timeframe = "7m""#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for bad in [
            "risk_fraction = 0.0",
            "risk_fraction = 1.5",
            "leverage = 0",
            "[indicators]\nfast = 0",
            "[indicators]\nfast = 21",
            "[signal]\nstop_atr_multiple = 0.0",
            "[signal]\ntarget_atr_multiple = -1.0",
            "[signal]\nmomentum_floor = 70.0",
            "candle_limit = 21",
        ] {
            assert!(
                matches!(BotConfig::from_toml(bad), Err(ConfigError::Invalid(_))),
                "accepted: {bad}"
            );
        }
    }

    #[test]
    fn candle_limit_at_warm_up_boundary_is_accepted() {
        assert!(BotConfig::from_toml("candle_limit = 22").is_ok());
    }

    #[test]
    fn effective_config_round_trips_through_toml() {
        let config = BotConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(BotConfig::from_toml(&text).unwrap(), config);
    }
}
