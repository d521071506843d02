//! Sun color and geometry
//!
//! Pure functions from (elevation, atmosphere, sky brightness) to the
//! quantities the sprite baker and the sun layer consume.

use crate::math3d::{lerp, mix, smoothstep, Vec2, Vec3};
use crate::sky::SkyColorSampler;
use crate::weather::WeatherObservation;

/// Horizon color of the sun
pub const WARM_SUN: Vec3 = Vec3::new(1.0, 0.55, 0.25);
/// High-sun color
pub const NEUTRAL_SUN: Vec3 = Vec3::new(1.0, 0.97, 0.92);
/// Relative optical depth per channel; blue scatters most
pub const EXTINCTION_K: Vec3 = Vec3::new(0.25, 0.6, 1.3);
const EXTINCTION_TINT_MIX: f32 = 0.38;

/// Disc radius as a fraction of screen height at full extinction
const DISC_FRACTION: f32 = 0.028;
/// Horizontal position of the sun, as a fraction of screen width
pub const SUN_AZIMUTH_X: f32 = 0.68;
/// Where elevation 0° lands, as a fraction of screen height
pub const HORIZON_Y: f32 = 0.85;
/// Elevation that maps to the top of the usable sky
const TOP_ELEVATION: f32 = 60.0;

/// Everything derived per frame for drawing the sun
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunRenderState {
    pub elev_t: f32,
    pub extinction: f32,
    pub disc_radius: f32,
    pub halo_radius: f32,
    /// Vertical scale of the disc; < 1 near the horizon
    pub squash: f32,
    pub color: Vec3,
    pub sky_luminance: f32,
    pub disc_tone_scale: f32,
    pub disc_base_alpha: f32,
    pub position: Vec2,
    pub visibility: f32,
}

/// Inputs to [`compute_render_state`]
#[derive(Debug, Clone, Copy)]
pub struct SunInputs {
    pub width: f32,
    pub height: f32,
    pub sun_elevation: f32,
    pub extinction: f32,
    pub cloud_cover: f32,
    pub fog_density: f32,
    pub visibility: f32,
    pub position: Vec2,
}

impl SunInputs {
    /// Derive every input from the observation and the viewport
    pub fn from_weather(weather: &WeatherObservation, width: u32, height: u32) -> Self {
        let elev = weather.sun_elevation;
        Self {
            width: width as f32,
            height: height as f32,
            sun_elevation: elev,
            extinction: atmospheric_extinction(elev),
            cloud_cover: weather.cloud_cover,
            fog_density: weather.fog_density,
            visibility: sun_visibility(weather),
            position: sun_screen_position(width, height, elev),
        }
    }
}

/// 0 at or below -2°, 1 at or above 10°, smooth in between
#[inline]
pub fn elevation_t(elevation: f32) -> f32 {
    smoothstep(-2.0, 10.0, elevation)
}

/// Relative direct-beam transmittance from Kasten-Young air mass.
/// ~0.9 at 30°, ~0.6 at 10°, near 0 on the horizon.
pub fn atmospheric_extinction(elevation: f32) -> f32 {
    let h = elevation.clamp(-1.0, 90.0);
    let air_mass = 1.0 / (h.to_radians().sin() + 0.50572 * (h + 6.07995).powf(-1.6364));
    (-0.1 * (air_mass - 1.0)).exp().clamp(0.0, 1.0)
}

/// How much of the sun gets through cloud and fog, 0..1
pub fn sun_visibility(weather: &WeatherObservation) -> f32 {
    let cloud = 1.0 - weather.cloud_cover.clamp(0.0, 1.0).powf(1.5) * 0.85;
    let fog = 1.0 - weather.fog_density.clamp(0.0, 1.0) * 0.8;
    let haze = 0.5 + 0.5 * smoothstep(0.5, 5.0, weather.visibility);
    let above = smoothstep(-3.0, 1.0, weather.sun_elevation);
    (cloud * fog * haze * above).clamp(0.0, 1.0)
}

/// Screen position of the sun center in pixels. The sun moves along a
/// fixed vertical column; 0° sits on the horizon line.
pub fn sun_screen_position(width: u32, height: u32, elevation: f32) -> Vec2 {
    let t = (elevation / TOP_ELEVATION).clamp(-0.2, 1.0);
    Vec2::new(
        width as f32 * SUN_AZIMUTH_X,
        height as f32 * (HORIZON_Y - 0.75 * t),
    )
}

/// Per-channel transmittance tint, normalised so the brightest channel is 1
pub fn extinction_tint(extinction: f32) -> Vec3 {
    let depth = (1.0 - extinction.clamp(0.0, 1.0)) * 2.0;
    let t = Vec3::new(
        (-EXTINCTION_K.x * depth).exp(),
        (-EXTINCTION_K.y * depth).exp(),
        (-EXTINCTION_K.z * depth).exp(),
    );
    let max = t.x.max(t.y).max(t.z).max(1e-6);
    t * (1.0 / max)
}

/// Disc brightness compression against a bright sky
#[inline]
pub fn tone_scale(sky_luminance: f32) -> f32 {
    (1.0 / (1.0 + sky_luminance * 1.6)).clamp(0.35, 1.0)
}

pub fn compute_render_state(inputs: &SunInputs, sky: &dyn SkyColorSampler) -> SunRenderState {
    let elev_t = elevation_t(inputs.sun_elevation);
    let ext = inputs.extinction.clamp(0.0, 1.0);
    let squash = lerp(0.5, 1.0, ext.powf(1.7));

    let base = mix(WARM_SUN, NEUTRAL_SUN, elev_t);
    let color = mix(base, extinction_tint(ext), EXTINCTION_TINT_MIX).clamp01();

    let disc_radius = inputs.height * DISC_FRACTION * lerp(0.6, 1.0, ext);
    let halo_radius = disc_radius * (3.5 + inputs.cloud_cover * 3.0 + inputs.fog_density * 4.0);

    let (nx, ny) = if inputs.width > 0.0 && inputs.height > 0.0 {
        (
            (inputs.position.x / inputs.width).clamp(0.0, 1.0),
            (inputs.position.y / inputs.height).clamp(0.0, 1.0),
        )
    } else {
        (0.5, 0.5)
    };
    let sky_luminance = sky.sample(nx, ny).luminance().clamp(0.0, 1.0);
    let disc_tone_scale = tone_scale(sky_luminance);
    let disc_base_alpha = (inputs.visibility * (0.35 + 0.65 * ext.sqrt())).clamp(0.0, 1.0);

    SunRenderState {
        elev_t,
        extinction: ext,
        disc_radius,
        halo_radius,
        squash,
        color,
        sky_luminance,
        disc_tone_scale,
        disc_base_alpha,
        position: inputs.position,
        visibility: inputs.visibility,
    }
}
