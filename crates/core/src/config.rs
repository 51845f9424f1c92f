//! Configuration structures for the daybook pipeline.

use crate::error::{Error, Result};
use crate::fields::SourceKind;
use serde::{Deserialize, Serialize};

/// Main pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which upstream datasets to collect.
    pub sources: SourceConfig,
    /// Merge behaviour.
    pub merge: MergeConfig,
    /// Price indicator configuration.
    pub indicators: IndicatorConfig,
    /// Volume analytics configuration.
    pub volume: VolumeConfig,
    /// Output projection configuration.
    pub output: OutputConfig,
}

impl Config {
    /// Parse a JSON document. Missing sections take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.sources.sources.is_empty() {
            return Err(Error::config("at least one source must be requested"));
        }
        if self.indicators.ma_periods.iter().any(|&p| p == 0) {
            return Err(Error::config("moving average periods must be positive"));
        }
        if self.volume.ratio_window == 0 {
            return Err(Error::config("volume ratio window must be positive"));
        }
        if !(self.volume.scale_divisor.is_finite() && self.volume.scale_divisor > 0.0) {
            return Err(Error::config(format!(
                "volume scale divisor must be positive, got {}",
                self.volume.scale_divisor
            )));
        }
        if self.output.decimals > 10 {
            return Err(Error::config("output decimals must be at most 10"));
        }
        Ok(())
    }
}

/// Upstream dataset selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Requested sources, in merge order.
    pub sources: Vec<SourceKind>,
    /// Fetch sources concurrently. Merging stays on one thread.
    pub parallel_fetch: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sources: SourceKind::ALL.to_vec(),
            parallel_fetch: false,
        }
    }
}

/// What to do when two sources write the same field for one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the later value, log and record the conflict.
    #[default]
    Report,
    /// Reject the partial record with a field conflict error.
    Strict,
}

/// Merge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub policy: ConflictPolicy,
}

/// Price indicator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Compute change percent and moving averages.
    pub enabled: bool,
    /// Moving average periods, in positions.
    pub ma_periods: Vec<u32>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ma_periods: vec![5, 10, 20],
        }
    }
}

/// Volume analytics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Compute volume change, ratio and scaled volume.
    pub enabled: bool,
    /// Positions in the volume ratio window (current included).
    pub ratio_window: usize,
    /// Divisor for the scaled volume figure.
    pub scale_divisor: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ratio_window: 5,
            scale_divisor: 1e8,
        }
    }
}

/// Naming scheme for output field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldNaming {
    /// English snake-case keys (`close`, `ma5`).
    #[default]
    Key,
    /// Exchange labels (`收盤價`, `MA5`).
    Label,
}

/// Output projection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub naming: FieldNaming,
    /// Decimal places for derived values.
    pub decimals: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            naming: FieldNaming::Key,
            decimals: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.indicators.ma_periods, vec![5, 10, 20]);
        assert_eq!(config.volume.ratio_window, 5);
        assert_eq!(config.output.decimals, 2);
        assert_eq!(config.merge.policy, ConflictPolicy::Report);
        assert_eq!(config.sources.sources.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json(
            r#"{ "merge": { "policy": "strict" }, "output": { "naming": "label" } }"#,
        )
        .unwrap();
        assert_eq!(config.merge.policy, ConflictPolicy::Strict);
        assert_eq!(config.output.naming, FieldNaming::Label);
        assert_eq!(config.output.decimals, 2);
        assert!(config.indicators.enabled);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.indicators.ma_periods = vec![5, 0];
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.volume.scale_divisor = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sources.sources.clear();
        assert!(config.validate().is_err());

        assert!(Config::from_json(r#"{ "volume": { "ratio_window": 0 } }"#).is_err());
    }
}
