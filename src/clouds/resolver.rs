//! Observation → cloud archetype

use super::CloudType;
use crate::weather::{PrecipitationKind, WeatherObservation};

/// Heavier-than thresholds in mm/h
pub const RAIN_HEAVY: f32 = 7.0;
pub const RAIN_MODERATE: f32 = 2.5;
pub const SNOW_HEAVY: f32 = 5.0;
pub const SNOW_MODERATE: f32 = 1.0;

/// Pick the archetype for an observation. Total; first matching rule wins:
/// obscuration, storm, rain, snow, weather code, then cloud cover.
pub fn determine_cloud_type(weather: &WeatherObservation) -> CloudType {
    let code = weather.weather_code;

    if weather.fog_density > 0.6 || weather.visibility < 2.0 {
        return if weather.visibility >= 1.0 {
            CloudType::Mist
        } else {
            CloudType::Fog
        };
    }

    if weather.precipitation == PrecipitationKind::Storm || code.is_some_and(|c| c >= 95) {
        return CloudType::Thunderstorm;
    }

    let amount = weather.amount();
    match weather.precipitation {
        PrecipitationKind::Rain => {
            return if amount > RAIN_HEAVY {
                CloudType::HeavyRain
            } else if amount > RAIN_MODERATE {
                CloudType::ModerateRain
            } else {
                CloudType::LightRain
            };
        },
        PrecipitationKind::Snow => {
            return if amount > SNOW_HEAVY {
                CloudType::HeavySnow
            } else if amount > SNOW_MODERATE {
                CloudType::ModerateSnow
            } else {
                CloudType::LightSnow
            };
        },
        PrecipitationKind::None | PrecipitationKind::Storm => {},
    }

    match code {
        Some(3) => return CloudType::Overcast,
        Some(80..=82) => return CloudType::LightRain,
        Some(85..=86) => return CloudType::LightSnow,
        _ => {},
    }

    let cover = weather.cloud_cover;
    if cover < 0.2 {
        CloudType::Clear
    } else if cover < 0.4 {
        CloudType::FewClouds
    } else if cover < 0.6 {
        CloudType::ScatteredClouds
    } else if cover < 0.8 {
        CloudType::BrokenClouds
    } else {
        CloudType::Overcast
    }
}
