//! Precipitation physics table and the observation → request mapping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::clouds::{RAIN_HEAVY, RAIN_MODERATE, SNOW_HEAVY, SNOW_MODERATE};
use crate::error::Result;
use crate::weather::{PrecipitationKind, WeatherObservation};

/// What a particle is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecipitationType {
    Rain,
    Snow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityTier {
    Light,
    Moderate,
    Heavy,
}

impl IntensityTier {
    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Physics for one (type, tier). Ranges are `[min, max]`; pixels and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierParams {
    /// Particles per second
    pub spawn_rate: f32,
    /// Seconds
    pub lifetime: f32,
    /// Initial fall speed, px/s
    pub velocity_y: [f32; 2],
    /// Streak length (rain) or flake diameter (snow), px
    pub size: [f32; 2],
    pub opacity: [f32; 2],
    /// Peak noise-driven sideways speed, px/s. Snow only.
    #[serde(default)]
    pub drift: f32,
}

impl TierParams {
    /// Expected live population once spawning and expiry balance
    #[inline]
    pub fn steady_state_count(&self) -> f32 {
        self.spawn_rate * self.lifetime
    }
}

const fn tier(
    spawn_rate: f32,
    lifetime: f32,
    velocity_y: [f32; 2],
    size: [f32; 2],
    opacity: [f32; 2],
    drift: f32,
) -> TierParams {
    TierParams {
        spawn_rate,
        lifetime,
        velocity_y,
        size,
        opacity,
        drift,
    }
}

#[rustfmt::skip]
const RAIN: [TierParams; 3] = [
    tier(80.0,  1.2, [900.0, 1300.0],  [10.0, 18.0], [0.25, 0.45], 0.0),
    tier(160.0, 1.0, [1300.0, 1800.0], [14.0, 24.0], [0.30, 0.55], 0.0),
    tier(300.0, 0.8, [1800.0, 2400.0], [18.0, 30.0], [0.35, 0.65], 0.0),
];

#[rustfmt::skip]
const SNOW: [TierParams; 3] = [
    tier(40.0,  8.0, [40.0, 80.0],   [2.0, 4.0], [0.50, 0.80], 20.0),
    tier(90.0,  7.0, [60.0, 110.0],  [2.0, 5.0], [0.55, 0.85], 35.0),
    tier(180.0, 6.0, [80.0, 140.0],  [2.0, 6.0], [0.60, 0.90], 50.0),
];

/// Static physics table, loadable from JSON
#[derive(Debug, Clone, PartialEq)]
pub struct PrecipitationTable {
    rain: [TierParams; 3],
    snow: [TierParams; 3],
}

impl PrecipitationTable {
    #[inline]
    pub fn get(&self, kind: PrecipitationType, tier: IntensityTier) -> &TierParams {
        match kind {
            PrecipitationType::Rain => &self.rain[tier.index()],
            PrecipitationType::Snow => &self.snow[tier.index()],
        }
    }

    /// Parse overrides shaped `{"rain": {"heavy": {...}}, "snow": {...}}`.
    /// Missing entries keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let overrides: BTreeMap<PrecipitationType, BTreeMap<IntensityTier, TierParams>> =
            serde_json::from_str(text)?;
        let mut table = Self::default();
        for (kind, tiers) in overrides {
            for (tier, params) in tiers {
                let slot = match kind {
                    PrecipitationType::Rain => &mut table.rain[tier.index()],
                    PrecipitationType::Snow => &mut table.snow[tier.index()],
                };
                *slot = params;
            }
        }
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl Default for PrecipitationTable {
    fn default() -> Self {
        Self {
            rain: RAIN,
            snow: SNOW,
        }
    }
}

/// The precipitation an observation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrecipitationRequest {
    pub kind: PrecipitationType,
    pub tier: IntensityTier,
}

impl PrecipitationRequest {
    pub fn new(kind: PrecipitationType, tier: IntensityTier) -> Self {
        Self { kind, tier }
    }

    /// `None` when nothing should fall
    pub fn from_observation(weather: &WeatherObservation) -> Option<Self> {
        let amount = weather.amount();
        match weather.precipitation {
            PrecipitationKind::Storm => {
                Some(Self::new(PrecipitationType::Rain, IntensityTier::Heavy))
            },
            PrecipitationKind::Rain => {
                let tier = if amount > RAIN_HEAVY {
                    IntensityTier::Heavy
                } else if amount > RAIN_MODERATE {
                    IntensityTier::Moderate
                } else {
                    IntensityTier::Light
                };
                Some(Self::new(PrecipitationType::Rain, tier))
            },
            PrecipitationKind::Snow => {
                let tier = if amount > SNOW_HEAVY {
                    IntensityTier::Heavy
                } else if amount > SNOW_MODERATE {
                    IntensityTier::Moderate
                } else {
                    IntensityTier::Light
                };
                Some(Self::new(PrecipitationType::Snow, tier))
            },
            PrecipitationKind::None => match weather.weather_code {
                Some(80..=82) => Some(Self::new(PrecipitationType::Rain, IntensityTier::Light)),
                Some(85..=86) => Some(Self::new(PrecipitationType::Snow, IntensityTier::Light)),
                _ => None,
            },
        }
    }
}
