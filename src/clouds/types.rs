//! Cloud archetypes and their parameter table

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// The 14 discrete cloud archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudType {
    Clear,
    FewClouds,
    ScatteredClouds,
    BrokenClouds,
    Overcast,
    LightRain,
    ModerateRain,
    HeavyRain,
    LightSnow,
    ModerateSnow,
    HeavySnow,
    Thunderstorm,
    Fog,
    Mist,
}

impl CloudType {
    pub const COUNT: usize = 14;

    pub const ALL: [CloudType; Self::COUNT] = [
        CloudType::Clear,
        CloudType::FewClouds,
        CloudType::ScatteredClouds,
        CloudType::BrokenClouds,
        CloudType::Overcast,
        CloudType::LightRain,
        CloudType::ModerateRain,
        CloudType::HeavyRain,
        CloudType::LightSnow,
        CloudType::ModerateSnow,
        CloudType::HeavySnow,
        CloudType::Thunderstorm,
        CloudType::Fog,
        CloudType::Mist,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// snake_case name, matching the JSON table keys
    pub fn name(self) -> &'static str {
        match self {
            CloudType::Clear => "clear",
            CloudType::FewClouds => "few_clouds",
            CloudType::ScatteredClouds => "scattered_clouds",
            CloudType::BrokenClouds => "broken_clouds",
            CloudType::Overcast => "overcast",
            CloudType::LightRain => "light_rain",
            CloudType::ModerateRain => "moderate_rain",
            CloudType::HeavyRain => "heavy_rain",
            CloudType::LightSnow => "light_snow",
            CloudType::ModerateSnow => "moderate_snow",
            CloudType::HeavySnow => "heavy_snow",
            CloudType::Thunderstorm => "thunderstorm",
            CloudType::Fog => "fog",
            CloudType::Mist => "mist",
        }
    }
}

impl std::fmt::Display for CloudType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape and grading parameters for one archetype
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudTypeConfig {
    /// Horizontal noise frequency; larger = smaller cloud cells
    pub size_scale: f32,
    /// Vertical frequency relative to `size_scale`
    pub shape_scale: f32,
    /// Peak density
    pub density_scale: f32,
    /// Turbulence displacement frequency
    pub detail_scale: f32,
    /// Positive thins the field, negative fills it in
    pub coverage_bias: f32,
    pub wind_speed_multiplier: f32,
    /// Turbulence displacement amplitude
    pub turbulence: f32,
    pub brightness_multiplier: f32,
    pub contrast_multiplier: f32,
    pub saturation_multiplier: f32,
    #[serde(default)]
    pub anvil_clouds: bool,
    #[serde(default)]
    pub wispy_edges: bool,
    #[serde(default)]
    pub layered_effect: bool,
}

#[allow(clippy::too_many_arguments)]
const fn cfg(
    size_scale: f32,
    shape_scale: f32,
    density_scale: f32,
    detail_scale: f32,
    coverage_bias: f32,
    wind_speed_multiplier: f32,
    turbulence: f32,
    brightness_multiplier: f32,
    contrast_multiplier: f32,
    saturation_multiplier: f32,
    flags: (bool, bool, bool),
) -> CloudTypeConfig {
    CloudTypeConfig {
        size_scale,
        shape_scale,
        density_scale,
        detail_scale,
        coverage_bias,
        wind_speed_multiplier,
        turbulence,
        brightness_multiplier,
        contrast_multiplier,
        saturation_multiplier,
        anvil_clouds: flags.0,
        wispy_edges: flags.1,
        layered_effect: flags.2,
    }
}

const NONE: (bool, bool, bool) = (false, false, false);
const ANVIL: (bool, bool, bool) = (true, false, false);
const WISPY: (bool, bool, bool) = (false, true, false);
const LAYERED: (bool, bool, bool) = (false, false, true);
const WISPY_LAYERED: (bool, bool, bool) = (false, true, true);

/// Built-in table, indexed by `CloudType::index()`
#[rustfmt::skip]
const DEFAULT_CONFIGS: [CloudTypeConfig; CloudType::COUNT] = [
    //   size shape dens  detail cover  wind  turb  bright contr sat
    cfg(1.6, 0.6, 0.30, 1.0,  1.5, 0.6, 0.05, 1.10, 1.00, 1.00, WISPY),         // clear
    cfg(1.8, 0.7, 0.55, 1.2,  0.8, 0.8, 0.10, 1.10, 1.05, 1.00, NONE),          // few_clouds
    cfg(2.0, 0.8, 0.70, 1.5,  0.3, 1.0, 0.15, 1.05, 1.10, 1.00, NONE),          // scattered_clouds
    cfg(2.2, 0.9, 0.80, 1.8, -0.3, 1.0, 0.20, 0.95, 1.10, 0.95, NONE),          // broken_clouds
    cfg(2.6, 0.6, 0.90, 2.0, -1.2, 0.8, 0.15, 0.80, 0.90, 0.70, LAYERED),       // overcast
    cfg(2.4, 0.8, 0.85, 2.2, -0.8, 1.2, 0.25, 0.80, 1.00, 0.80, NONE),          // light_rain
    cfg(2.6, 0.9, 0.95, 2.4, -1.0, 1.4, 0.30, 0.70, 1.05, 0.70, NONE),          // moderate_rain
    cfg(2.8, 1.0, 1.00, 2.6, -1.4, 1.6, 0.40, 0.60, 1.15, 0.60, NONE),          // heavy_rain
    cfg(2.2, 0.7, 0.80, 2.0, -0.7, 0.8, 0.15, 1.05, 0.90, 0.60, NONE),          // light_snow
    cfg(2.4, 0.7, 0.90, 2.2, -0.9, 0.9, 0.20, 1.00, 0.90, 0.55, NONE),          // moderate_snow
    cfg(2.6, 0.7, 1.00, 2.4, -1.3, 1.0, 0.25, 0.95, 0.85, 0.50, LAYERED),       // heavy_snow
    cfg(3.0, 1.4, 1.00, 2.8, -1.2, 1.8, 0.50, 0.55, 1.30, 0.70, ANVIL),         // thunderstorm
    cfg(1.4, 0.4, 0.60, 1.2, -2.0, 0.4, 0.05, 0.95, 0.70, 0.40, WISPY_LAYERED), // fog
    cfg(1.6, 0.5, 0.50, 1.4, -1.5, 0.5, 0.08, 1.00, 0.75, 0.50, WISPY),         // mist
];

/// Process-wide archetype table. Built-in defaults, optionally overridden
/// per archetype from a JSON asset.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudTypeTable {
    configs: [CloudTypeConfig; CloudType::COUNT],
}

impl CloudTypeTable {
    #[inline]
    pub fn get(&self, cloud_type: CloudType) -> &CloudTypeConfig {
        &self.configs[cloud_type.index()]
    }

    /// Parse overrides from JSON: an object keyed by snake_case archetype
    /// name. Archetypes missing from the object keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let overrides: BTreeMap<CloudType, CloudTypeConfig> = serde_json::from_str(text)?;
        let mut table = Self::default();
        for (cloud_type, config) in overrides {
            table.configs[cloud_type.index()] = config;
        }
        Ok(table)
    }

    /// Load overrides from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the full table as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let map: BTreeMap<CloudType, CloudTypeConfig> = CloudType::ALL
            .iter()
            .map(|&t| (t, *self.get(t)))
            .collect();
        let json = serde_json::to_string_pretty(&map)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for CloudTypeTable {
    fn default() -> Self {
        Self {
            configs: DEFAULT_CONFIGS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_index_order() {
        for (i, t) in CloudType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn test_names_match_serde() {
        for t in CloudType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.name()));
        }
    }

    #[test]
    fn test_coverage_bias_orders_clear_to_overcast() {
        let table = CloudTypeTable::default();
        let bias = |t| table.get(t).coverage_bias;
        assert!(bias(CloudType::Clear) > bias(CloudType::FewClouds));
        assert!(bias(CloudType::FewClouds) > bias(CloudType::ScatteredClouds));
        assert!(bias(CloudType::ScatteredClouds) > bias(CloudType::BrokenClouds));
        assert!(bias(CloudType::BrokenClouds) > bias(CloudType::Overcast));
    }

    #[test]
    fn test_json_override_keeps_other_defaults() {
        let json = r#"{
            "fog": {
                "sizeScale": 9.0, "shapeScale": 1.0, "densityScale": 0.2,
                "detailScale": 1.0, "coverageBias": 0.0, "windSpeedMultiplier": 1.0,
                "turbulence": 0.0, "brightnessMultiplier": 1.0,
                "contrastMultiplier": 1.0, "saturationMultiplier": 1.0
            }
        }"#;
        let table = CloudTypeTable::from_json(json).unwrap();
        assert_eq!(table.get(CloudType::Fog).size_scale, 9.0);
        assert!(!table.get(CloudType::Fog).wispy_edges);
        assert_eq!(
            table.get(CloudType::Thunderstorm),
            CloudTypeTable::default().get(CloudType::Thunderstorm)
        );
    }

    #[test]
    fn test_unknown_archetype_rejected() {
        assert!(CloudTypeTable::from_json(r#"{"cirrus": {}}"#).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clouds.json");
        let table = CloudTypeTable::default();
        table.save(&path).unwrap();
        assert_eq!(CloudTypeTable::load(&path).unwrap(), table);
    }
}
