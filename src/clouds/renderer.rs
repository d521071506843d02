//! Volumetric cloud renderer
//!
//! A per-pixel fragment program run on the CPU: each pixel of a
//! reduced-resolution surface marches a ray through the density field,
//! lights it, and composites front to back. The surface is upscaled
//! bilinearly onto the cloud layer.

use tracing::{debug, info, warn};

use super::density::cloud_density;
use super::{CloudType, CloudTypeConfig, CloudTypeTable};
use crate::display::{BlendMode, PixelBuffer};
use crate::error::{Result, SkyError};
use crate::math3d::{mix, smoothstep, Vec3};
use crate::noise::gradient_noise;
use crate::sky::{FrameContext, SkyLayer};
use crate::sun::{sun_screen_position, HORIZON_Y};
use crate::weather::WeatherObservation;

pub const MIN_RENDER_SCALE: u32 = 1;
pub const MAX_RENDER_SCALE: u32 = 8;
pub const DEFAULT_RENDER_SCALE: u32 = 4;

const MARCH_STEPS: usize = 16;
const STEP_SIZE: f32 = 0.12;
const SHADOW_STEPS: usize = 4;
const SHADOW_STEP: f32 = 0.1;
const NORMAL_EPS: f32 = 0.04;
/// Opacity gained per unit density per unit distance
const ABSORPTION: f32 = 6.0;
const DISTANCE_FADE: f32 = 0.6;
const ALPHA_CUTOFF: f32 = 0.95;
/// Density below this contributes nothing worth lighting
const MIN_STEP_DENSITY: f32 = 0.01;
/// m/s → field units per second
const WIND_ADVECTION: f32 = 0.02;
const TURBULENCE_SEED: u32 = 0x7B1D;
/// Camera focal length; larger = narrower field of view
const FOCAL: f32 = 1.5;
/// Tilts the view upward so the horizon sits low on screen
const VIEW_TILT: f32 = 0.15;
/// Clouds fade out over this band of screen height (fractions, y down),
/// reaching zero exactly at the horizon line
const HORIZON_FADE: (f32, f32) = (HORIZON_Y - 0.13, HORIZON_Y);

const DAY_LIT: Vec3 = Vec3::new(1.0, 0.98, 0.95);
const DAY_SHADE: Vec3 = Vec3::new(0.55, 0.6, 0.68);
const DUSK_LIT: Vec3 = Vec3::new(1.0, 0.62, 0.38);
const DUSK_SHADE: Vec3 = Vec3::new(0.38, 0.3, 0.38);
const NIGHT_LIT: Vec3 = Vec3::new(0.22, 0.24, 0.3);
const NIGHT_SHADE: Vec3 = Vec3::new(0.06, 0.07, 0.1);
const FLASH_COLOR: Vec3 = Vec3::new(0.75, 0.8, 1.0);

/// Construction options for [`CloudRenderer`]
#[derive(Debug, Clone)]
pub struct CloudOptions {
    /// Internal resolution divisor, 1..=8
    pub render_scale: u32,
    pub table: CloudTypeTable,
}

impl Default for CloudOptions {
    fn default() -> Self {
        Self {
            render_scale: DEFAULT_RENDER_SCALE,
            table: CloudTypeTable::default(),
        }
    }
}

/// Everything the per-pixel program needs that is constant over a frame
struct MarchParams<'a> {
    config: &'a CloudTypeConfig,
    time: f32,
    wind_offset: f32,
    sun_dir: Vec3,
    /// Day/dusk blend of the lit cloud color
    warmth: f32,
    /// 0 at night, 1 once the sun is well up
    sun_up: f32,
    sun_elevation: f32,
    lightning: f32,
    flashes: Vec<(f32, f32)>,
}

impl<'a> MarchParams<'a> {
    fn new(
        time: f32,
        weather: &WeatherObservation,
        config: &'a CloudTypeConfig,
        sun_dir: Vec3,
    ) -> Self {
        let elev = weather.sun_elevation;
        let dir_rad = weather.wind_direction.to_radians();
        let wind_speed = weather.wind_speed * config.wind_speed_multiplier * WIND_ADVECTION;
        let lightning = weather.lightning.as_ref();

        Self {
            config,
            time,
            wind_offset: -time * wind_speed * dir_rad.cos(),
            sun_dir,
            warmth: 1.0 - smoothstep(2.0, 18.0, elev),
            sun_up: smoothstep(-4.0, 6.0, elev),
            sun_elevation: elev,
            lightning: lightning.map(|l| l.intensity).unwrap_or(0.0),
            flashes: lightning
                .map(|l| l.flashes.iter().map(|f| (f.x, f.y)).collect())
                .unwrap_or_default(),
        }
    }

    /// Density with wind advection and turbulence applied
    fn sample(&self, p: Vec3) -> f32 {
        let c = self.config;
        let mut q = Vec3::new(p.x + self.wind_offset, p.y, p.z);
        if c.turbulence > 0.0 {
            let f = c.detail_scale;
            let n = gradient_noise(q.x * f, q.y * f, q.z * f + self.time * 0.05, TURBULENCE_SEED);
            q += Vec3::new(n, n * 0.3, -n * 0.5) * (c.turbulence * 0.15);
        }
        cloud_density(q, c)
    }

    fn normal(&self, p: Vec3) -> Vec3 {
        let ex = Vec3::new(NORMAL_EPS, 0.0, 0.0);
        let ey = Vec3::new(0.0, NORMAL_EPS, 0.0);
        let ez = Vec3::new(0.0, 0.0, NORMAL_EPS);
        let grad = Vec3::new(
            self.sample(p + ex) - self.sample(p - ex),
            self.sample(p + ey) - self.sample(p - ey),
            self.sample(p + ez) - self.sample(p - ez),
        );
        if grad.length() < 1e-5 {
            Vec3::new(0.0, 1.0, 0.0)
        } else {
            (-grad).normalize()
        }
    }

    fn transmittance_to_sun(&self, p: Vec3) -> f32 {
        let mut acc = 0.0;
        for k in 1..=SHADOW_STEPS {
            acc += self.sample(p + self.sun_dir * (SHADOW_STEP * k as f32));
        }
        (-acc * 2.0).exp()
    }

    /// Lightning contribution at a screen position (fractions, y down)
    fn flash(&self, sx: f32, sy: f32) -> f32 {
        if self.lightning <= 0.01 {
            return 0.0;
        }
        let falloff = self
            .flashes
            .iter()
            .map(|&(fx, fy)| {
                let dx = sx - fx;
                let dy = sy - fy;
                (-(dx * dx + dy * dy) * 6.0).exp()
            })
            .fold(0.0, f32::max);
        self.lightning * (0.25 + 0.75 * falloff)
    }

    /// Lit, graded color of one march sample
    fn shade(&self, p: Vec3, rd: Vec3, density: f32, flash: f32) -> Vec3 {
        let c = self.config;
        let norm_density = if c.density_scale > 0.0 {
            (density / c.density_scale).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let diffuse = self.normal(p).dot(&self.sun_dir).max(0.0);
        let lighting = (diffuse * 0.6 + 0.4) * self.transmittance_to_sun(p);

        let day = mix(DAY_SHADE, DAY_LIT, lighting);
        let dusk = mix(DUSK_SHADE, DUSK_LIT, lighting);
        let sun_lit = mix(day, dusk, self.warmth);
        let night = mix(NIGHT_SHADE, NIGHT_LIT, lighting);

        // Thin wisps take the ambient tint, dense cores respond to the sun
        let ambient = mix(night, mix(DAY_LIT, DUSK_LIT, self.warmth) * 0.9, self.sun_up);
        let sun_response =
            smoothstep(-6.0, 4.0, self.sun_elevation) * smoothstep(0.2, 0.8, norm_density);
        let mut col = mix(ambient, sun_lit, sun_response);

        col = col * c.brightness_multiplier;
        col = (col - Vec3::splat(0.5)) * c.contrast_multiplier + Vec3::splat(0.5);
        col = mix(Vec3::splat(col.luminance()), col, c.saturation_multiplier);

        if flash > 0.0 {
            col += FLASH_COLOR * (flash * (0.4 + norm_density * 0.6));
        }

        let mu = rd.dot(&self.sun_dir).max(0.0);
        let scatter = mu.powf(6.0) * 0.4 * (1.0 - norm_density) * self.sun_up;
        col += mix(DAY_LIT, DUSK_LIT, self.warmth) * scatter;

        col.clamp01()
    }

    /// March one ray; returns premultiplied (rgb, alpha)
    fn march(&self, rd: Vec3, flash: f32) -> (Vec3, f32) {
        let mut acc_rgb = Vec3::zero();
        let mut acc_a = 0.0;

        for i in 0..MARCH_STEPS {
            let t = STEP_SIZE * (i as f32 + 0.5);
            let p = rd * t;
            let density = self.sample(p);
            if density < MIN_STEP_DENSITY {
                continue;
            }

            let col = self.shade(p, rd, density, flash);
            let fade = (-t * DISTANCE_FADE).exp();
            let a = (1.0 - (-density * ABSORPTION * STEP_SIZE).exp()) * fade;

            let w = a * (1.0 - acc_a);
            acc_rgb += col * w;
            acc_a += w;
            if acc_a > ALPHA_CUTOFF {
                break;
            }
        }

        (acc_rgb, acc_a)
    }
}

/// Screen-space mask keeping clouds above the horizon
#[inline]
pub fn horizon_mask(screen_y: f32) -> f32 {
    1.0 - smoothstep(HORIZON_FADE.0, HORIZON_FADE.1, screen_y)
}

/// Camera ray through a screen position (fractions, y down)
#[inline]
fn view_ray(sx: f32, sy: f32, aspect: f32) -> Vec3 {
    let u = (sx * 2.0 - 1.0) * aspect;
    let v = 1.0 - sy * 2.0 + VIEW_TILT;
    Vec3::new(u, v, FOCAL).normalize()
}

/// Light direction for shading: the camera ray through the point where the
/// sun sprite is drawn, so silver linings sit around the visible sun
pub fn sun_direction(width: u32, height: u32, elevation: f32) -> Vec3 {
    let w = width.max(1);
    let h = height.max(1);
    let pos = sun_screen_position(w, h, elevation);
    view_ray(pos.x / w as f32, pos.y / h as f32, w as f32 / h as f32)
}

/// Owns the reduced-resolution cloud surface and the archetype table
pub struct CloudRenderer {
    width: u32,
    height: u32,
    render_scale: u32,
    surface: PixelBuffer,
    table: CloudTypeTable,
    disposed: bool,
}

impl CloudRenderer {
    /// One-time setup: validate the configuration and allocate the surface
    pub fn new(width: u32, height: u32, options: CloudOptions) -> Result<Self> {
        let scale = options.render_scale;
        if !(MIN_RENDER_SCALE..=MAX_RENDER_SCALE).contains(&scale) {
            return Err(SkyError::Unsupported(format!(
                "cloud render scale {} outside {}..={}",
                scale, MIN_RENDER_SCALE, MAX_RENDER_SCALE
            )));
        }
        if width == 0 || height == 0 {
            return Err(SkyError::Unsupported(format!(
                "cloud viewport {}x{} is empty",
                width, height
            )));
        }

        let (sw, sh) = Self::surface_dims(width, height, scale);
        info!(width, height, scale, sw, sh, "cloud renderer ready");
        Ok(Self {
            width,
            height,
            render_scale: scale,
            surface: PixelBuffer::with_size(sw, sh),
            table: options.table,
            disposed: false,
        })
    }

    fn surface_dims(width: u32, height: u32, scale: u32) -> (u32, u32) {
        (width.div_ceil(scale).max(1), height.div_ceil(scale).max(1))
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Size of the internal surface
    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface.width(), self.surface.height())
    }

    pub fn surface(&self) -> &PixelBuffer {
        &self.surface
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Reallocate for a new viewport. Zero dimensions are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || self.disposed {
            return;
        }
        self.width = width;
        self.height = height;
        let (sw, sh) = Self::surface_dims(width, height, self.render_scale);
        self.surface.resize(sw, sh);
        debug!(width, height, sw, sh, "cloud surface resized");
    }

    /// Release the surface. A disposed renderer draws nothing.
    pub fn dispose(&mut self) {
        self.surface.release();
        self.disposed = true;
    }

    /// Run the per-pixel program over the internal surface
    pub fn draw(&mut self, time: f32, weather: &WeatherObservation, cloud_type: CloudType) {
        if self.disposed {
            return;
        }
        let sun_dir = sun_direction(self.width, self.height, weather.sun_elevation);
        let params = MarchParams::new(time, weather, self.table.get(cloud_type), sun_dir);
        let sw = self.surface.width();
        let sh = self.surface.height();
        let aspect = self.width as f32 / self.height as f32;

        self.surface.clear_transparent();
        for y in 0..sh {
            let sy = (y as f32 + 0.5) / sh as f32;
            let band = horizon_mask(sy);
            if band <= 0.0 {
                continue;
            }

            for x in 0..sw {
                let sx = (x as f32 + 0.5) / sw as f32;
                let rd = view_ray(sx, sy, aspect);

                let (rgb, alpha) = params.march(rd, params.flash(sx, sy));
                let alpha = alpha * band;
                if alpha <= 0.0 {
                    continue;
                }
                let rgb = rgb * band;
                let to8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
                self.surface.set_pixel_rgba(
                    x as i32,
                    y as i32,
                    to8(rgb.x),
                    to8(rgb.y),
                    to8(rgb.z),
                    to8(alpha),
                );
            }
        }
    }

    /// Upscale the internal surface onto a full-size layer
    pub fn composite_onto(&self, out: &mut PixelBuffer) {
        if self.disposed {
            return;
        }
        out.composite_upscaled(&self.surface, BlendMode::Over);
    }
}

/// The cloud layer as the compositor sees it
pub enum CloudLayer {
    Active(CloudRenderer),
    /// Initialisation failed; the host omits the layer
    Unsupported { reason: String },
}

impl CloudLayer {
    pub fn new(width: u32, height: u32, options: CloudOptions) -> Self {
        match CloudRenderer::new(width, height, options) {
            Ok(renderer) => CloudLayer::Active(renderer),
            Err(e) => {
                warn!("cloud layer disabled: {}", e);
                CloudLayer::Unsupported {
                    reason: e.to_string(),
                }
            },
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, CloudLayer::Active(_))
    }
}

impl SkyLayer for CloudLayer {
    fn name(&self) -> &str {
        "clouds"
    }

    fn render(&mut self, frame: &FrameContext, buffer: &mut PixelBuffer) {
        if let CloudLayer::Active(renderer) = self {
            renderer.draw(frame.time, frame.weather, frame.cloud_type);
            renderer.composite_onto(buffer);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let CloudLayer::Active(renderer) = self {
            renderer.resize(width, height);
        }
    }

    fn dispose(&mut self) {
        if let CloudLayer::Active(renderer) = self {
            renderer.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky::GradientSky;
    use crate::weather::{FlashCenter, LightningEffect, PrecipitationKind};

    fn options(render_scale: u32) -> CloudOptions {
        CloudOptions {
            render_scale,
            ..Default::default()
        }
    }

    fn alpha_sum(buf: &PixelBuffer) -> u64 {
        buf.as_bytes().chunks_exact(4).map(|p| p[0] as u64).sum()
    }

    fn rgb_sum(buf: &PixelBuffer) -> u64 {
        buf.as_bytes()
            .chunks_exact(4)
            .map(|p| p[1] as u64 + p[2] as u64 + p[3] as u64)
            .sum()
    }

    fn overcast_day() -> WeatherObservation {
        WeatherObservation {
            cloud_cover: 1.0,
            sun_elevation: 30.0,
            wind_speed: 5.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_out_of_range_scale() {
        for scale in [0, 9, 64] {
            let err = CloudRenderer::new(64, 36, options(scale)).err().unwrap();
            assert!(matches!(err, SkyError::Unsupported(_)));
        }
    }

    #[test]
    fn test_unsupported_layer_renders_nothing() {
        let mut layer = CloudLayer::new(64, 36, options(0));
        assert!(!layer.is_supported());
        match &layer {
            CloudLayer::Unsupported { reason } => assert!(reason.contains("render scale")),
            CloudLayer::Active(_) => panic!("expected unsupported"),
        }
        let weather = overcast_day();
        let sky = GradientSky::for_weather(&weather);
        let frame = FrameContext {
            dt: 0.016,
            time: 1.0,
            weather: &weather,
            cloud_type: CloudType::Overcast,
            width: 64,
            height: 36,
            sky: &sky,
        };
        let mut out = PixelBuffer::with_size(64, 36);
        layer.render(&frame, &mut out);
        assert_eq!(alpha_sum(&out), 0);
    }

    #[test]
    fn test_surface_is_divided_by_scale() {
        let r = CloudRenderer::new(100, 50, options(4)).unwrap();
        assert_eq!(r.surface_size(), (25, 13));
        let r = CloudRenderer::new(100, 50, options(1)).unwrap();
        assert_eq!(r.surface_size(), (100, 50));
    }

    #[test]
    fn test_resize_zero_is_noop() {
        let mut r = CloudRenderer::new(64, 36, options(2)).unwrap();
        r.resize(0, 100);
        assert_eq!(r.viewport(), (64, 36));
        assert_eq!(r.surface_size(), (32, 18));
        r.resize(128, 72);
        assert_eq!(r.surface_size(), (64, 36));
    }

    #[test]
    fn test_overcast_covers_more_than_clear() {
        let weather = overcast_day();
        let mut r = CloudRenderer::new(64, 36, options(2)).unwrap();
        r.draw(3.0, &weather, CloudType::Clear);
        let clear = alpha_sum(r.surface());
        r.draw(3.0, &weather, CloudType::Overcast);
        let overcast = alpha_sum(r.surface());
        assert!(overcast > clear, "overcast {overcast} <= clear {clear}");
        assert!(overcast > 0);
    }

    #[test]
    fn test_nothing_below_horizon() {
        let weather = overcast_day();
        let mut r = CloudRenderer::new(64, 100, options(1)).unwrap();
        r.draw(0.0, &weather, CloudType::HeavyRain);
        let h = r.surface().height();
        let mut checked = 0;
        for y in 0..h {
            if (y as f32 + 0.5) / h as f32 <= HORIZON_Y {
                continue;
            }
            for x in 0..64 {
                let a = r.surface().get_pixel_rgba(x, y as i32).map(|p| p.3);
                assert_eq!(a, Some(0), "row {y} col {x}");
            }
            checked += 1;
        }
        assert!(checked >= 14);
        assert!(alpha_sum(r.surface()) > 0);
    }

    #[test]
    fn test_sun_direction_points_at_sprite() {
        let (w, h) = (64_u32, 36_u32);
        let aspect = w as f32 / h as f32;
        for elev in [2.0, 10.0, 30.0, 50.0] {
            let dir = sun_direction(w, h, elev);
            let sun = sun_screen_position(w, h, elev);
            // Brightest forward-scatter pixel is the one whose ray best
            // lines up with the light direction
            let mut best = (0, 0, f32::MIN);
            for y in 0..h {
                for x in 0..w {
                    let sx = (x as f32 + 0.5) / w as f32;
                    let sy = (y as f32 + 0.5) / h as f32;
                    let mu = view_ray(sx, sy, aspect).dot(&dir);
                    if mu > best.2 {
                        best = (x, y, mu);
                    }
                }
            }
            let dx = (best.0 as f32 + 0.5 - sun.x).abs();
            let dy = (best.1 as f32 + 0.5 - sun.y).abs();
            assert!(dx <= 1.0 && dy <= 1.0, "elev {elev}: peak {best:?} sun {sun:?}");
            assert!(best.2 > 0.999);
        }
    }

    #[test]
    fn test_wind_moves_clouds() {
        let calm = WeatherObservation {
            wind_speed: 0.0,
            ..overcast_day()
        };
        let east = WeatherObservation {
            wind_speed: 8.0,
            wind_direction: 0.0,
            ..overcast_day()
        };
        let west = WeatherObservation {
            wind_direction: 180.0,
            ..east.clone()
        };
        let mut r = CloudRenderer::new(48, 27, options(2)).unwrap();
        let mut frame = |w: &WeatherObservation| {
            r.draw(10.0, w, CloudType::BrokenClouds);
            r.surface().as_bytes().to_vec()
        };
        let still = frame(&calm);
        let blown = frame(&east);
        let back = frame(&west);
        assert_ne!(still, blown);
        assert_ne!(blown, back);
    }

    #[test]
    fn test_advection_offset() {
        let table = CloudTypeTable::default();
        let config = table.get(CloudType::BrokenClouds);
        let dir = sun_direction(64, 36, 30.0);
        let calm = WeatherObservation {
            wind_speed: 0.0,
            ..overcast_day()
        };
        let offset = |t: f32, w: &WeatherObservation| MarchParams::new(t, w, config, dir).wind_offset;
        assert_eq!(offset(1.0, &calm), 0.0);
        assert_eq!(offset(50.0, &calm), 0.0);

        let windy = WeatherObservation {
            wind_speed: 6.0,
            wind_direction: 0.0,
            ..overcast_day()
        };
        let o10 = offset(10.0, &windy);
        assert!(o10 < 0.0);
        assert!((offset(20.0, &windy) - 2.0 * o10).abs() < 1e-5);
        // Wind from 90 degrees has no x component
        let crosswind = WeatherObservation {
            wind_direction: 90.0,
            ..windy
        };
        assert!(offset(10.0, &crosswind).abs() < 1e-5);
    }

    #[test]
    fn test_lightning_brightens_clouds() {
        let dark = WeatherObservation {
            precipitation: PrecipitationKind::Storm,
            sun_elevation: 5.0,
            ..overcast_day()
        };
        let lit = WeatherObservation {
            lightning: Some(LightningEffect {
                intensity: 1.0,
                flashes: vec![FlashCenter { x: 0.5, y: 0.3 }],
            }),
            ..dark.clone()
        };
        let mut r = CloudRenderer::new(48, 27, options(2)).unwrap();
        r.draw(1.0, &dark, CloudType::Thunderstorm);
        let before = rgb_sum(r.surface());
        r.draw(1.0, &lit, CloudType::Thunderstorm);
        let after = rgb_sum(r.surface());
        assert!(after > before);
    }

    #[test]
    fn test_draw_is_deterministic() {
        let weather = overcast_day();
        let mut a = CloudRenderer::new(40, 24, options(2)).unwrap();
        let mut b = CloudRenderer::new(40, 24, options(2)).unwrap();
        a.draw(7.5, &weather, CloudType::BrokenClouds);
        b.draw(7.5, &weather, CloudType::BrokenClouds);
        assert_eq!(a.surface().as_bytes(), b.surface().as_bytes());
    }

    #[test]
    fn test_dispose_stops_drawing() {
        let weather = overcast_day();
        let mut r = CloudRenderer::new(32, 18, options(2)).unwrap();
        r.dispose();
        assert!(r.is_disposed());
        r.draw(1.0, &weather, CloudType::Overcast);
        let mut out = PixelBuffer::with_size(32, 18);
        r.composite_onto(&mut out);
        assert_eq!(alpha_sum(&out), 0);
    }

    #[test]
    fn test_horizon_mask_band() {
        assert_eq!(horizon_mask(0.1), 1.0);
        assert_eq!(horizon_mask(HORIZON_Y), 0.0);
        assert_eq!(horizon_mask(0.95), 0.0);
        assert!(horizon_mask(HORIZON_Y - 0.05) > 0.0);
    }
}
