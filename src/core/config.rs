//! Tactical configuration loaded from TOML
//!
//! One `TacticsConfig` value is built per engagement and handed to the
//! brain, the decision policy and the executor. Nothing here is global.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::battle::ai::faction_tactics::FactionTacticTable;
use crate::core::error::{Result, TacticsError};

/// Evaluation cadence and order-stabilization timing (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Seconds between re-evaluations of one faction
    pub update_interval: f32,
    /// Minimum seconds between applied bundles; doubled for similar bundles
    pub min_change_interval: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            update_interval: 5.0,
            min_change_interval: 10.0,
        }
    }
}

/// Detection radii (world units)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub max_threat_range: f32,
    pub max_opportunity_range: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_threat_range: 200.0,
            max_opportunity_range: 150.0,
        }
    }
}

/// Commander quality modifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommanderConfig {
    /// Scales each faction's base skill (result clamped to 0..=1)
    pub skill_multiplier: f32,
    /// How strongly threats and opportunities swing the overall situation
    pub adaptability: f32,
}

impl Default for CommanderConfig {
    fn default() -> Self {
        Self {
            skill_multiplier: 1.0,
            adaptability: 1.0,
        }
    }
}

/// Feature switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    /// Envelopment, coordinated strike and flank exploitation
    pub advanced_maneuvers: bool,
    /// Consult the faction tactic table
    pub faction_tactics: bool,
    /// Allow the random "unexpected" maneuver
    pub unexpected_maneuvers: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            advanced_maneuvers: true,
            faction_tactics: true,
            unexpected_maneuvers: true,
        }
    }
}

/// Stabilization gate thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// A threat response above this priority bypasses the interval check
    pub critical_priority: f32,
    /// Maneuver overlap ratio at which two bundles count as similar
    pub similarity_threshold: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            critical_priority: 0.9,
            similarity_threshold: 0.7,
        }
    }
}

/// Complete tactical configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Log posture, counts and target tables every cycle at INFO
    pub debug_mode: bool,
    /// Base seed for per-faction random generators
    pub seed: u64,
    /// Bundles kept in each faction's decision history
    pub history_len: usize,
    /// Total own units required before envelopment is proposed
    pub envelopment_min_strength: u32,
    pub timing: TimingConfig,
    pub detection: DetectionConfig,
    pub commander: CommanderConfig,
    pub features: FeatureToggles,
    pub gate: GateConfig,
    pub faction_table: FactionTacticTable,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            debug_mode: false,
            seed: 42,
            history_len: 10,
            envelopment_min_strength: 50,
            timing: TimingConfig::default(),
            detection: DetectionConfig::default(),
            commander: CommanderConfig::default(),
            features: FeatureToggles::default(),
            gate: GateConfig::default(),
            faction_table: FactionTacticTable::default(),
        }
    }
}

impl TacticsConfig {
    /// Load and validate a config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a config from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: TacticsConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !non_negative(self.timing.update_interval) || !non_negative(self.timing.min_change_interval) {
            return Err(TacticsError::InvalidConfig(
                "intervals must be finite and not negative".to_string(),
            ));
        }
        if !non_negative(self.detection.max_threat_range)
            || !non_negative(self.detection.max_opportunity_range)
        {
            return Err(TacticsError::InvalidConfig(
                "detection ranges must be finite and not negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.gate.critical_priority)
            || !(0.0..=1.0).contains(&self.gate.similarity_threshold)
        {
            return Err(TacticsError::InvalidConfig(
                "gate thresholds must lie in 0..=1".to_string(),
            ));
        }
        if !non_negative(self.commander.skill_multiplier) {
            return Err(TacticsError::InvalidConfig(
                "skill_multiplier must be finite and not negative".to_string(),
            ));
        }
        if !self.commander.adaptability.is_finite() {
            return Err(TacticsError::InvalidConfig(
                "adaptability must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_negative(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = TacticsConfig::default();
        assert_eq!(config.timing.update_interval, 5.0);
        assert_eq!(config.timing.min_change_interval, 10.0);
        assert_eq!(config.detection.max_threat_range, 200.0);
        assert_eq!(config.detection.max_opportunity_range, 150.0);
        assert_eq!(config.history_len, 10);
        assert!(config.features.unexpected_maneuvers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TacticsConfig::from_toml_str(
            r#"
            debug_mode = true
            [timing]
            update_interval = 3.0
            "#,
        )
        .expect("partial config should parse");
        assert!(config.debug_mode);
        assert_eq!(config.timing.update_interval, 3.0);
        assert_eq!(config.timing.min_change_interval, 10.0);
        assert_eq!(config.gate.critical_priority, 0.9);
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let result = TacticsConfig::from_toml_str("[gate]\nsimilarity_threshold = 1.5\n");
        assert!(matches!(result, Err(TacticsError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_non_finite() {
        for contents in [
            "[timing]\nupdate_interval = nan\nmin_change_interval = nan\n",
            "[timing]\nmin_change_interval = inf\n",
            "[detection]\nmax_threat_range = inf\n",
            "[detection]\nmax_opportunity_range = nan\n",
            "[commander]\nskill_multiplier = inf\n",
            "[commander]\nadaptability = nan\n",
            "[gate]\ncritical_priority = nan\n",
        ] {
            let result = TacticsConfig::from_toml_str(contents);
            assert!(
                matches!(result, Err(TacticsError::InvalidConfig(_))),
                "accepted {contents:?}"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let result = TacticsConfig::from_toml_str("timing = [");
        assert!(matches!(result, Err(TacticsError::ConfigParse(_))));
    }

    #[test]
    fn test_load_shipped_default_file() {
        let config = TacticsConfig::load("data/tactics/default.toml")
            .expect("shipped config should load");
        assert!(!config.faction_table.entries.is_empty());
    }
}
