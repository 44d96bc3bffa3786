//! Segmentation thresholds and the sources they are read from.
//!
//! Thresholds resolve in three layers: explicit call-time overrides win over
//! configured values (environment over JSON file), which win over the
//! built-in defaults. Resolution happens once, before any classifier runs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::DataSource;
use crate::error::SegmentError;

/// Prefix for threshold environment variables, e.g. `SEGMENTATION_ENGAGEMENT_HIGH`.
pub const ENV_PREFIX: &str = "SEGMENTATION_";

/// Named numeric thresholds used by the three classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub recency_active_days: f64,
    pub recency_risk_days: f64,
    pub rfm_recency_threshold: f64,
    pub rfm_frequency_threshold: f64,
    pub rfm_monetary_threshold: f64,
    pub engagement_high: f64,
    pub engagement_medium: f64,
    /// Documents the engagement floor; no bucket is gated on it.
    pub engagement_low: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            recency_active_days: 30.0,
            recency_risk_days: 90.0,
            rfm_recency_threshold: 30.0,
            rfm_frequency_threshold: 5.0,
            rfm_monetary_threshold: 1000.0,
            engagement_high: 15.0,
            engagement_medium: 6.0,
            engagement_low: 0.0,
        }
    }
}

impl ThresholdConfig {
    /// Configuration keys, as they appear in the JSON file.
    pub const KEYS: [&'static str; 8] = [
        "recency_active_days",
        "recency_risk_days",
        "rfm_recency_threshold",
        "rfm_frequency_threshold",
        "rfm_monetary_threshold",
        "engagement_high",
        "engagement_medium",
        "engagement_low",
    ];

    /// Look up a threshold by configuration key.
    pub fn get(&self, key: &str) -> Option<f64> {
        let value = match key {
            "recency_active_days" => self.recency_active_days,
            "recency_risk_days" => self.recency_risk_days,
            "rfm_recency_threshold" => self.rfm_recency_threshold,
            "rfm_frequency_threshold" => self.rfm_frequency_threshold,
            "rfm_monetary_threshold" => self.rfm_monetary_threshold,
            "engagement_high" => self.engagement_high,
            "engagement_medium" => self.engagement_medium,
            "engagement_low" => self.engagement_low,
            _ => return None,
        };
        Some(value)
    }

    /// Set a threshold by configuration key. Returns `false` for unknown keys.
    pub fn set(&mut self, key: &str, value: f64) -> bool {
        let slot = match key {
            "recency_active_days" => &mut self.recency_active_days,
            "recency_risk_days" => &mut self.recency_risk_days,
            "rfm_recency_threshold" => &mut self.rfm_recency_threshold,
            "rfm_frequency_threshold" => &mut self.rfm_frequency_threshold,
            "rfm_monetary_threshold" => &mut self.rfm_monetary_threshold,
            "engagement_high" => &mut self.engagement_high,
            "engagement_medium" => &mut self.engagement_medium,
            "engagement_low" => &mut self.engagement_low,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Apply `SEGMENTATION_<KEY>` variables on top of the current values.
    ///
    /// Variables without the prefix or naming an unknown key are skipped;
    /// values that do not parse as numbers are ignored with a warning.
    pub fn overlay_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, raw) in vars {
            let Some(key) = name.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let key = key.to_ascii_lowercase();
            if !Self::KEYS.contains(&key.as_str()) {
                continue;
            }

            match raw.as_ref().trim().parse::<f64>() {
                Ok(value) => {
                    self.set(&key, value);
                    debug!(key = %key, value, "threshold set from environment");
                }
                Err(_) => warn!(
                    variable = name.as_ref(),
                    value = raw.as_ref(),
                    "ignoring non-numeric threshold"
                ),
            }
        }
    }

    /// Combine call-time overrides with these values; overrides take precedence.
    pub fn resolve(&self, overrides: &ThresholdOverrides) -> ThresholdConfig {
        ThresholdConfig {
            recency_active_days: overrides
                .recency_active_days
                .unwrap_or(self.recency_active_days),
            recency_risk_days: overrides.recency_risk_days.unwrap_or(self.recency_risk_days),
            rfm_recency_threshold: overrides
                .rfm_recency_threshold
                .unwrap_or(self.rfm_recency_threshold),
            rfm_frequency_threshold: overrides
                .rfm_frequency_threshold
                .unwrap_or(self.rfm_frequency_threshold),
            rfm_monetary_threshold: overrides
                .rfm_monetary_threshold
                .unwrap_or(self.rfm_monetary_threshold),
            engagement_high: overrides.engagement_high.unwrap_or(self.engagement_high),
            engagement_medium: overrides.engagement_medium.unwrap_or(self.engagement_medium),
            engagement_low: overrides.engagement_low.unwrap_or(self.engagement_low),
        }
    }
}

/// Call-time threshold values. `None` defers to the configured value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdOverrides {
    pub recency_active_days: Option<f64>,
    pub recency_risk_days: Option<f64>,
    pub rfm_recency_threshold: Option<f64>,
    pub rfm_frequency_threshold: Option<f64>,
    pub rfm_monetary_threshold: Option<f64>,
    pub engagement_high: Option<f64>,
    pub engagement_medium: Option<f64>,
    pub engagement_low: Option<f64>,
}

/// Contents of the project configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    #[serde(flatten)]
    pub thresholds: ThresholdConfig,
    #[serde(deserialize_with = "deserialize_data_source")]
    pub data_source: DataSource,
    pub hubspot_api_key: Option<String>,
}

/// Lenient `data_source` reader: anything other than `remote`/`api` means a
/// file source, so a typo here never discards the configured thresholds.
fn deserialize_data_source<'de, D>(deserializer: D) -> Result<DataSource, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let source = match raw.as_str().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("remote") | Some("api") => DataSource::Remote,
        Some("file") | Some("csv") => DataSource::File,
        _ if raw.is_null() => DataSource::File,
        _ => {
            warn!(value = %raw, "unknown data_source; reading customers from file");
            DataSource::File
        }
    };
    Ok(source)
}

/// Read and parse a JSON configuration file.
pub fn try_load_config(path: &Path) -> crate::Result<SegmentationConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| SegmentError::ConfigLoad(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&contents)
        .map_err(|e| SegmentError::ConfigLoad(format!("{}: {}", path.display(), e)))
}

/// Load configuration, falling back to defaults if the file is missing or malformed.
pub fn load_config(path: &Path) -> SegmentationConfig {
    match try_load_config(path) {
        Ok(config) => {
            info!(path = %path.display(), "loaded segmentation config");
            config
        }
        Err(e) => {
            warn!("{e}; using default thresholds");
            SegmentationConfig::default()
        }
    }
}

/// Load configuration from `path`, then apply `SEGMENTATION_*` environment variables.
pub fn load_config_with_env(path: &Path) -> SegmentationConfig {
    let mut config = load_config(path);
    config.thresholds.overlay_env(std::env::vars());
    config
}
