//! Built-in weather snapshots for the demo host

use super::{PrecipitationKind, WeatherObservation, DEFAULT_VISIBILITY_KM};

/// A named observation selectable from the keyboard
#[derive(Debug, Clone)]
pub struct WeatherPreset {
    pub name: &'static str,
    pub observation: WeatherObservation,
}

#[allow(clippy::too_many_arguments)]
fn obs(
    code: Option<u32>,
    cloud_cover: f32,
    precipitation: PrecipitationKind,
    amount: f32,
    fog_density: f32,
    visibility: f32,
    wind_speed: f32,
    sun_elevation: f32,
) -> WeatherObservation {
    WeatherObservation {
        weather_code: code,
        cloud_cover,
        precipitation,
        precipitation_amount: (amount > 0.0).then_some(amount),
        fog_density,
        visibility,
        wind_speed,
        wind_direction: 250.0,
        sun_elevation,
        lightning: None,
    }
}

/// All presets in keyboard order
pub fn presets() -> Vec<WeatherPreset> {
    use PrecipitationKind::*;
    let v = DEFAULT_VISIBILITY_KM;
    vec![
        WeatherPreset {
            name: "clear noon",
            observation: obs(Some(0), 0.05, None, 0.0, 0.0, v, 2.0, 55.0),
        },
        WeatherPreset {
            name: "fair weather cumulus",
            observation: obs(Some(1), 0.3, None, 0.0, 0.0, v, 4.0, 35.0),
        },
        WeatherPreset {
            name: "broken clouds",
            observation: obs(Some(2), 0.7, None, 0.0, 0.05, v, 6.0, 25.0),
        },
        WeatherPreset {
            name: "overcast",
            observation: obs(Some(3), 0.95, None, 0.0, 0.1, 8.0, 5.0, 20.0),
        },
        WeatherPreset {
            name: "heavy rain",
            observation: obs(Some(65), 0.9, Rain, 8.0, 0.1, v, 8.0, 15.0),
        },
        WeatherPreset {
            name: "thunderstorm",
            observation: obs(Some(95), 1.0, Storm, 12.0, 0.15, 6.0, 14.0, 10.0),
        },
        WeatherPreset {
            name: "snowfall",
            observation: obs(Some(73), 0.85, Snow, 2.0, 0.2, 4.0, 3.0, 12.0),
        },
        WeatherPreset {
            name: "fog",
            observation: obs(Some(45), 0.6, None, 0.0, 0.8, 0.5, 1.0, 18.0),
        },
        WeatherPreset {
            name: "sunset",
            observation: obs(Some(1), 0.35, None, 0.0, 0.05, v, 3.0, 2.0),
        },
        WeatherPreset {
            name: "clear night",
            observation: obs(Some(0), 0.15, None, 0.0, 0.0, v, 1.0, -12.0),
        },
    ]
}
