//! Weather observations
//!
//! The single input that drives every sky layer. Observations arrive as
//! camelCase JSON (from the MQTT feed or a preset) and are sanitised before
//! the renderers see them.

mod feed;
mod presets;

pub use feed::{WeatherFeed, DEFAULT_PORT, DEFAULT_TOPIC};
pub use presets::{presets, WeatherPreset};

use serde::{Deserialize, Serialize};

/// Visibility assumed when an observation omits it, in km
pub const DEFAULT_VISIBILITY_KM: f32 = 10.0;

/// Kind of precipitation currently falling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationKind {
    #[default]
    None,
    Rain,
    Snow,
    Storm,
}

/// A flash center in normalised screen coordinates (x right, y down)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlashCenter {
    pub x: f32,
    pub y: f32,
}

/// Lightning state for the current frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightningEffect {
    /// 0 = dark, 1 = full flash
    pub intensity: f32,
    pub flashes: Vec<FlashCenter>,
}

/// One weather snapshot. Immutable for the duration of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeatherObservation {
    /// WMO-style weather code, when the source provides one
    pub weather_code: Option<u32>,
    /// Fraction of sky covered, 0..1
    pub cloud_cover: f32,
    pub precipitation: PrecipitationKind,
    /// mm/h
    pub precipitation_amount: Option<f32>,
    /// 0..1
    pub fog_density: f32,
    /// km
    pub visibility: f32,
    /// m/s
    pub wind_speed: f32,
    /// Meteorological degrees, 0..360
    pub wind_direction: f32,
    /// Degrees above the horizon; negative below
    pub sun_elevation: f32,
    pub lightning: Option<LightningEffect>,
}

impl Default for WeatherObservation {
    fn default() -> Self {
        Self {
            weather_code: None,
            cloud_cover: 0.0,
            precipitation: PrecipitationKind::None,
            precipitation_amount: None,
            fog_density: 0.0,
            visibility: DEFAULT_VISIBILITY_KM,
            wind_speed: 0.0,
            wind_direction: 0.0,
            sun_elevation: 0.0,
            lightning: None,
        }
    }
}

/// NaN and negative values collapse to zero
#[inline]
fn non_negative(v: f32) -> f32 {
    if v.is_nan() || v < 0.0 {
        0.0
    } else {
        v
    }
}

#[inline]
fn unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

impl WeatherObservation {
    /// Parse an observation from JSON
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Precipitation amount with the absent case treated as zero
    #[inline]
    pub fn amount(&self) -> f32 {
        self.precipitation_amount.map(non_negative).unwrap_or(0.0)
    }

    /// Lightning intensity, 0 when there is no lightning
    #[inline]
    pub fn lightning_intensity(&self) -> f32 {
        self.lightning.as_ref().map(|l| l.intensity).unwrap_or(0.0)
    }

    /// Copy with every field forced into its valid range
    pub fn sanitized(&self) -> Self {
        let wind_direction = if self.wind_direction.is_finite() {
            self.wind_direction.rem_euclid(360.0)
        } else {
            0.0
        };
        // rem_euclid can round up to exactly 360 for tiny negatives
        let wind_direction = if wind_direction >= 360.0 {
            0.0
        } else {
            wind_direction
        };
        let visibility = if self.visibility.is_nan() {
            DEFAULT_VISIBILITY_KM
        } else {
            non_negative(self.visibility)
        };
        let sun_elevation = if self.sun_elevation.is_finite() {
            self.sun_elevation.clamp(-90.0, 90.0)
        } else {
            0.0
        };

        Self {
            weather_code: self.weather_code,
            cloud_cover: unit(self.cloud_cover),
            precipitation: self.precipitation,
            precipitation_amount: self.precipitation_amount.map(non_negative),
            fog_density: unit(self.fog_density),
            visibility,
            wind_speed: non_negative(self.wind_speed),
            wind_direction,
            sun_elevation,
            lightning: self.lightning.as_ref().map(|l| LightningEffect {
                intensity: unit(l.intensity),
                flashes: l
                    .flashes
                    .iter()
                    .map(|f| FlashCenter {
                        x: unit(f.x),
                        y: unit(f.y),
                    })
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let obs = WeatherObservation::from_json("{}").unwrap();
        assert_eq!(obs.cloud_cover, 0.0);
        assert_eq!(obs.visibility, DEFAULT_VISIBILITY_KM);
        assert_eq!(obs.precipitation, PrecipitationKind::None);
        assert!(obs.lightning.is_none());
    }

    #[test]
    fn test_camel_case_fields() {
        let obs = WeatherObservation::from_json(
            r#"{"cloudCover":0.9,"precipitation":"rain","precipitationAmount":8,
                "fogDensity":0.1,"visibility":10,"windSpeed":4.5,"windDirection":270,
                "sunElevation":35,"weatherCode":63}"#,
        )
        .unwrap();
        assert_eq!(obs.cloud_cover, 0.9);
        assert_eq!(obs.precipitation, PrecipitationKind::Rain);
        assert_eq!(obs.amount(), 8.0);
        assert_eq!(obs.weather_code, Some(63));
        assert_eq!(obs.wind_direction, 270.0);
    }

    #[test]
    fn test_lightning_json() {
        let obs = WeatherObservation::from_json(
            r#"{"precipitation":"storm","lightning":{"intensity":0.8,"flashes":[{"x":0.3,"y":0.2}]}}"#,
        )
        .unwrap();
        assert_eq!(obs.lightning_intensity(), 0.8);
        assert_eq!(obs.lightning.unwrap().flashes.len(), 1);
    }

    #[test]
    fn test_sanitize_clamps_ranges() {
        let obs = WeatherObservation {
            cloud_cover: 1.7,
            fog_density: -0.2,
            precipitation_amount: Some(f32::NAN),
            wind_speed: -3.0,
            wind_direction: -90.0,
            visibility: f32::NAN,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(obs.cloud_cover, 1.0);
        assert_eq!(obs.fog_density, 0.0);
        assert_eq!(obs.amount(), 0.0);
        assert_eq!(obs.wind_speed, 0.0);
        assert_eq!(obs.wind_direction, 270.0);
        assert_eq!(obs.visibility, DEFAULT_VISIBILITY_KM);
    }

    #[test]
    fn test_sanitize_wraps_large_wind_direction() {
        let obs = WeatherObservation {
            wind_direction: 725.0,
            ..Default::default()
        }
        .sanitized();
        assert!((obs.wind_direction - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_bad_kind_is_an_error() {
        assert!(WeatherObservation::from_json(r#"{"precipitation":"hail"}"#).is_err());
    }
}
