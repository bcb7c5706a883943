//! Configuration file support for Vitals.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/vitals/config.toml`.

use crate::engine::DEFAULT_MAX_ADVISORIES;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub hydration: HydrationConfig,

    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Staged advisory delivery configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_inter_delay_ms")]
    pub inter_delay_ms: u64,

    /// Upper bound of the random offset added to each reveal (0 disables)
    #[serde(default)]
    pub jitter_ms: u64,

    #[serde(default = "default_max_advisories")]
    pub max_advisories: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            inter_delay_ms: default_inter_delay_ms(),
            jitter_ms: 0,
            max_advisories: default_max_advisories(),
        }
    }
}

/// Hydration target parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HydrationConfig {
    #[serde(default = "default_litres_per_kg")]
    pub litres_per_kg: f64,

    #[serde(default = "default_fallback_target_l")]
    pub fallback_target_l: f64,

    #[serde(default = "default_glass_ml")]
    pub glass_ml: f64,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            litres_per_kg: default_litres_per_kg(),
            fallback_target_l: default_fallback_target_l(),
            glass_ml: default_glass_ml(),
        }
    }
}

/// Cut-offs used by the advisory rule families
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_sleep_short_hours")]
    pub sleep_short_hours: f64,

    #[serde(default = "default_sleep_min_hours")]
    pub sleep_min_hours: f64,

    #[serde(default = "default_sleep_max_hours")]
    pub sleep_max_hours: f64,

    #[serde(default = "default_activity_low_kcal")]
    pub activity_low_kcal: f64,

    #[serde(default = "default_activity_goal_kcal")]
    pub activity_goal_kcal: f64,

    #[serde(default = "default_bmi_underweight")]
    pub bmi_underweight: f64,

    #[serde(default = "default_bmi_healthy_max")]
    pub bmi_healthy_max: f64,

    #[serde(default = "default_bmi_obese")]
    pub bmi_obese: f64,

    #[serde(default = "default_nutrition_low_kcal")]
    pub nutrition_low_kcal: f64,

    #[serde(default = "default_nutrition_high_kcal")]
    pub nutrition_high_kcal: f64,

    #[serde(default = "default_balance_margin_kcal")]
    pub balance_margin_kcal: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            sleep_short_hours: default_sleep_short_hours(),
            sleep_min_hours: default_sleep_min_hours(),
            sleep_max_hours: default_sleep_max_hours(),
            activity_low_kcal: default_activity_low_kcal(),
            activity_goal_kcal: default_activity_goal_kcal(),
            bmi_underweight: default_bmi_underweight(),
            bmi_healthy_max: default_bmi_healthy_max(),
            bmi_obese: default_bmi_obese(),
            nutrition_low_kcal: default_nutrition_low_kcal(),
            nutrition_high_kcal: default_nutrition_high_kcal(),
            balance_margin_kcal: default_balance_margin_kcal(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local/share")
    });
    base.join("vitals")
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_inter_delay_ms() -> u64 {
    800
}

fn default_max_advisories() -> usize {
    DEFAULT_MAX_ADVISORIES
}

fn default_litres_per_kg() -> f64 {
    0.033
}

fn default_fallback_target_l() -> f64 {
    2.5
}

fn default_glass_ml() -> f64 {
    250.0
}

fn default_sleep_short_hours() -> f64 {
    6.0
}

fn default_sleep_min_hours() -> f64 {
    7.0
}

fn default_sleep_max_hours() -> f64 {
    9.0
}

fn default_activity_low_kcal() -> f64 {
    200.0
}

fn default_activity_goal_kcal() -> f64 {
    500.0
}

fn default_bmi_underweight() -> f64 {
    18.5
}

fn default_bmi_healthy_max() -> f64 {
    24.9
}

fn default_bmi_obese() -> f64 {
    30.0
}

fn default_nutrition_low_kcal() -> f64 {
    1200.0
}

fn default_nutrition_high_kcal() -> f64 {
    3000.0
}

fn default_balance_margin_kcal() -> f64 {
    500.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values that would make the engine meaningless
    pub fn validate(&self) -> Result<()> {
        if self.delivery.max_advisories == 0
            || self.delivery.max_advisories > DEFAULT_MAX_ADVISORIES
        {
            return Err(Error::Config(format!(
                "delivery.max_advisories must be between 1 and {}",
                DEFAULT_MAX_ADVISORIES
            )));
        }
        if !(self.hydration.glass_ml > 0.0) {
            return Err(Error::Config("hydration.glass_ml must be > 0".into()));
        }
        if !(self.hydration.fallback_target_l > 0.0) {
            return Err(Error::Config(
                "hydration.fallback_target_l must be > 0".into(),
            ));
        }
        let t = &self.thresholds;
        if t.sleep_short_hours > t.sleep_min_hours || t.sleep_min_hours > t.sleep_max_hours {
            return Err(Error::Config(
                "sleep thresholds must satisfy short <= min <= max".into(),
            ));
        }
        if t.bmi_underweight > t.bmi_healthy_max || t.bmi_healthy_max > t.bmi_obese {
            return Err(Error::Config(
                "BMI thresholds must satisfy underweight <= healthy_max <= obese".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
        base.join("vitals").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.delivery.initial_delay_ms, 500);
        assert_eq!(config.delivery.inter_delay_ms, 800);
        assert_eq!(config.delivery.max_advisories, 6);
        assert_eq!(config.hydration.fallback_target_l, 2.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.delivery.inter_delay_ms,
            parsed.delivery.inter_delay_ms
        );
        assert_eq!(
            config.thresholds.bmi_healthy_max,
            parsed.thresholds.bmi_healthy_max
        );
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[delivery]
inter_delay_ms = 1200
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.delivery.inter_delay_ms, 1200);
        assert_eq!(config.delivery.initial_delay_ms, 500); // default
        assert_eq!(config.hydration.litres_per_kg, 0.033); // default
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[thresholds]\nsleep_min_hours = 10.0\nsleep_max_hours = 8.0\n",
        )
        .unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_max_advisories_bounds() {
        let mut config = Config::default();
        config.delivery.max_advisories = 7;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.delivery.max_advisories = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.delivery.max_advisories = 3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_from_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.delivery.jitter_ms = 150;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.delivery.jitter_ms, 150);
    }
}
