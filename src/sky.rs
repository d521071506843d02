//! Sky compositor
//!
//! Owns the layers and their surfaces. Each frame: clamp the clock, resolve
//! the cloud archetype, paint the backdrop, then let every layer update and
//! draw onto its own transparent surface before compositing it.
//!
//! Layer order, back to front: backdrop, clouds (over), sun (screen),
//! precipitation (over).

use tracing::{debug, info, warn};

use crate::clouds::{determine_cloud_type, CloudLayer, CloudOptions, CloudType};
use crate::display::{BlendMode, PixelBuffer};
use crate::math3d::{mix, smoothstep, Vec3};
use crate::precipitation::{PrecipitationSystem, PrecipitationTable, DEFAULT_SEED};
use crate::sun::{SunLayer, SunSpriteCache, HORIZON_Y};
use crate::util::FrameClock;
use crate::weather::WeatherObservation;

// ============================================================================
// Sky color
// ============================================================================

/// Source of background sky color. Coordinates are screen fractions,
/// x right and y down.
pub trait SkyColorSampler {
    fn sample(&self, x: f32, y: f32) -> Vec3;
}

const DAY_ZENITH: Vec3 = Vec3::new(0.23, 0.45, 0.8);
const DAY_HORIZON: Vec3 = Vec3::new(0.7, 0.82, 0.95);
const DUSK_ZENITH: Vec3 = Vec3::new(0.2, 0.25, 0.45);
const DUSK_HORIZON: Vec3 = Vec3::new(0.98, 0.6, 0.4);
const NIGHT_ZENITH: Vec3 = Vec3::new(0.01, 0.02, 0.06);
const NIGHT_HORIZON: Vec3 = Vec3::new(0.05, 0.07, 0.14);
const OVERCAST: Vec3 = Vec3::new(0.6, 0.63, 0.67);
const FOG: Vec3 = Vec3::new(0.75, 0.77, 0.8);

/// Vertical two-stop sky gradient graded by sun elevation, cloud and fog
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientSky {
    pub zenith: Vec3,
    pub horizon: Vec3,
}

impl GradientSky {
    pub fn for_weather(weather: &WeatherObservation) -> Self {
        let elev = weather.sun_elevation;
        let day = smoothstep(-6.0, 4.0, elev);
        let dusk = smoothstep(-8.0, 0.0, elev) * (1.0 - smoothstep(4.0, 20.0, elev));

        let mut zenith = mix(NIGHT_ZENITH, DAY_ZENITH, day);
        let mut horizon = mix(NIGHT_HORIZON, DAY_HORIZON, day);
        zenith = mix(zenith, DUSK_ZENITH, dusk * 0.6);
        horizon = mix(horizon, DUSK_HORIZON, dusk * 0.8);

        // Grey out under cloud, lighter or darker depending on daylight
        let grey = OVERCAST * (0.25 + 0.75 * day);
        let cover = weather.cloud_cover.clamp(0.0, 1.0) * 0.7;
        zenith = mix(zenith, grey, cover);
        horizon = mix(horizon, grey, cover);

        let fog = FOG * (0.2 + 0.8 * day);
        let fog_t = weather.fog_density.clamp(0.0, 1.0);
        zenith = mix(zenith, fog, fog_t * 0.6);
        horizon = mix(horizon, fog, fog_t);

        Self { zenith, horizon }
    }

    /// Paint the opaque backdrop
    pub fn fill(&self, buffer: &mut PixelBuffer) {
        let w = buffer.width() as i32;
        let h = buffer.height().max(1);
        for y in 0..h {
            let (r, g, b) = self.sample(0.5, (y as f32 + 0.5) / h as f32).to_rgb8();
            buffer.hline(0, w - 1, y as i32, r, g, b);
        }
    }
}

impl SkyColorSampler for GradientSky {
    fn sample(&self, _x: f32, y: f32) -> Vec3 {
        let t = (y / HORIZON_Y).clamp(0.0, 1.0).powf(1.5);
        let c = mix(self.zenith, self.horizon, t);
        if y > HORIZON_Y {
            // Ground haze below the horizon line
            c * 0.85
        } else {
            c
        }
    }
}

// ============================================================================
// Layers
// ============================================================================

/// Per-frame inputs shared by every layer
pub struct FrameContext<'a> {
    /// Clamped delta, seconds
    pub dt: f32,
    /// Animation time, seconds
    pub time: f32,
    pub weather: &'a WeatherObservation,
    pub cloud_type: CloudType,
    pub width: u32,
    pub height: u32,
    pub sky: &'a dyn SkyColorSampler,
}

/// A full-frame layer of the sky
pub trait SkyLayer {
    /// Layer name for logging
    fn name(&self) -> &str;

    /// Advance simulation state (called each frame before `render`)
    fn update(&mut self, _frame: &FrameContext) {}

    /// Draw onto a cleared, transparent surface
    fn render(&mut self, frame: &FrameContext, buffer: &mut PixelBuffer);

    /// How the layer surface is composited onto the frame
    fn blend_mode(&self) -> BlendMode {
        BlendMode::Over
    }

    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Release surfaces and caches
    fn dispose(&mut self) {}
}

/// A layer and the surface it draws on
struct Slot<L> {
    layer: L,
    surface: PixelBuffer,
}

impl<L: SkyLayer> Slot<L> {
    fn new(layer: L, width: u32, height: u32) -> Self {
        Self {
            layer,
            surface: PixelBuffer::with_size(width, height),
        }
    }

    fn draw(&mut self, frame: &FrameContext, out: &mut PixelBuffer) {
        self.layer.update(frame);
        self.surface.clear_transparent();
        self.layer.render(frame, &mut self.surface);
        out.composite(&self.surface, 0, 0, self.layer.blend_mode(), 1.0);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.layer.resize(width, height);
        self.surface.resize(width, height);
    }

    fn dispose(&mut self) {
        self.layer.dispose();
        self.surface.release();
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Construction options for [`SkyRenderer`]
#[derive(Debug, Clone)]
pub struct SkyOptions {
    pub clouds: CloudOptions,
    pub precipitation: PrecipitationTable,
    pub seed: u64,
    pub sprite_capacity: usize,
    pub granule_capacity: usize,
}

impl Default for SkyOptions {
    fn default() -> Self {
        Self {
            clouds: CloudOptions::default(),
            precipitation: PrecipitationTable::default(),
            seed: DEFAULT_SEED,
            sprite_capacity: crate::sun::DEFAULT_SPRITE_CAPACITY,
            granule_capacity: crate::sun::DEFAULT_GRANULE_CAPACITY,
        }
    }
}

pub struct SkyRenderer {
    width: u32,
    height: u32,
    clock: FrameClock,
    clouds: Option<Slot<CloudLayer>>,
    cloud_error: Option<String>,
    sun: Slot<SunLayer>,
    precipitation: Slot<PrecipitationSystem>,
    cloud_type: Option<CloudType>,
    disposed: bool,
}

impl SkyRenderer {
    /// An empty viewport leaves the cloud layer unsupported for the
    /// renderer's lifetime; the other layers pick up the first real resize.
    pub fn new(width: u32, height: u32, options: SkyOptions) -> Self {
        let cloud_layer = CloudLayer::new(width, height, options.clouds);
        let (clouds, cloud_error) = match cloud_layer {
            CloudLayer::Unsupported { reason } => (None, Some(reason)),
            active => (Some(Slot::new(active, width, height)), None),
        };

        let sun = SunLayer::with_cache(SunSpriteCache::with_capacity(
            options.sprite_capacity,
            options.granule_capacity,
        ));
        let precipitation =
            PrecipitationSystem::with_seed(width, height, options.precipitation, options.seed);

        info!(width, height, clouds = clouds.is_some(), "sky renderer created");
        Self {
            width,
            height,
            clock: FrameClock::new(),
            clouds,
            cloud_error,
            sun: Slot::new(sun, width, height),
            precipitation: Slot::new(precipitation, width, height),
            cloud_type: None,
            disposed: false,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Archetype chosen on the last frame
    pub fn cloud_type(&self) -> Option<CloudType> {
        self.cloud_type
    }

    /// Why the cloud layer was omitted, if it was
    pub fn cloud_error(&self) -> Option<&str> {
        self.cloud_error.as_deref()
    }

    pub fn has_clouds(&self) -> bool {
        self.clouds.is_some()
    }

    pub fn sun(&self) -> &SunLayer {
        &self.sun.layer
    }

    pub fn precipitation(&self) -> &PrecipitationSystem {
        &self.precipitation.layer
    }

    /// Animation time in seconds
    pub fn time(&self) -> f32 {
        self.clock.elapsed()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Names of the active layers, back to front
    pub fn layer_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(3);
        if let Some(c) = &self.clouds {
            names.push(c.layer.name());
        }
        names.push(self.sun.layer.name());
        names.push(self.precipitation.layer.name());
        names
    }

    /// Render one frame at monotonic time `now_ms` into `out`.
    /// `out` is resized to the renderer size if it differs.
    pub fn render_frame(&mut self, now_ms: f64, weather: &WeatherObservation, out: &mut PixelBuffer) {
        if self.disposed {
            return;
        }
        let dt = self.clock.tick(now_ms);
        if self.width == 0 || self.height == 0 {
            return;
        }
        let time = self.clock.elapsed();
        let weather = weather.sanitized();

        let cloud_type = determine_cloud_type(&weather);
        if self.cloud_type != Some(cloud_type) {
            debug!(from = ?self.cloud_type, to = %cloud_type, "cloud archetype changed");
            self.cloud_type = Some(cloud_type);
        }

        if out.width() != self.width || out.height() != self.height {
            out.resize(self.width, self.height);
        }

        let sky = GradientSky::for_weather(&weather);
        sky.fill(out);

        let frame = FrameContext {
            dt,
            time,
            weather: &weather,
            cloud_type,
            width: self.width,
            height: self.height,
            sky: &sky,
        };

        if let Some(clouds) = &mut self.clouds {
            clouds.draw(&frame, out);
        }
        self.sun.draw(&frame, out);
        self.precipitation.draw(&frame, out);
    }

    /// Reallocate surfaces. Zero dimensions are a no-op; particles survive.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            warn!(width, height, "ignoring resize to empty viewport");
            return;
        }
        if self.disposed || (width == self.width && height == self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        if let Some(clouds) = &mut self.clouds {
            clouds.resize(width, height);
        }
        self.sun.resize(width, height);
        self.precipitation.resize(width, height);
        info!(width, height, "sky resized");
    }

    /// Free every surface and cache. Later frames draw nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(clouds) = &mut self.clouds {
            clouds.dispose();
        }
        self.sun.dispose();
        self.precipitation.dispose();
        self.disposed = true;
        info!("sky renderer disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precipitation::PrecipitationType;
    use crate::weather::PrecipitationKind;

    fn small_options() -> SkyOptions {
        SkyOptions {
            clouds: CloudOptions {
                render_scale: 8,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn rainy() -> WeatherObservation {
        WeatherObservation {
            cloud_cover: 0.9,
            precipitation: PrecipitationKind::Rain,
            precipitation_amount: Some(8.0),
            fog_density: 0.1,
            visibility: 10.0,
            sun_elevation: 20.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_frame_is_opaque_and_sized() {
        let mut sky = SkyRenderer::new(96, 54, small_options());
        let mut out = PixelBuffer::with_size(1, 1);
        sky.render_frame(0.0, &rainy(), &mut out);
        assert_eq!((out.width(), out.height()), (96, 54));
        assert!(out.as_bytes().chunks_exact(4).all(|p| p[0] == 255));
        assert_eq!(sky.cloud_type(), Some(CloudType::HeavyRain));
    }

    #[test]
    fn test_layer_order() {
        let sky = SkyRenderer::new(64, 36, small_options());
        assert_eq!(sky.layer_names(), vec!["clouds", "sun", "precipitation"]);
    }

    #[test]
    fn test_unsupported_clouds_are_omitted() {
        let options = SkyOptions {
            clouds: CloudOptions {
                render_scale: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut sky = SkyRenderer::new(64, 36, options);
        assert!(!sky.has_clouds());
        assert!(sky.cloud_error().is_some());
        assert_eq!(sky.layer_names(), vec!["sun", "precipitation"]);
        let mut out = PixelBuffer::with_size(64, 36);
        sky.render_frame(0.0, &rainy(), &mut out);
    }

    #[test]
    fn test_empty_viewport_omits_clouds() {
        let mut sky = SkyRenderer::new(0, 36, small_options());
        assert!(!sky.has_clouds());
        assert!(sky.cloud_error().is_some_and(|r| r.contains("empty")));
        assert_eq!(sky.layer_names(), vec!["sun", "precipitation"]);

        let mut out = PixelBuffer::with_size(8, 8);
        sky.render_frame(0.0, &rainy(), &mut out);
        assert!(out.as_bytes().iter().all(|&b| b == 0));

        sky.resize(64, 36);
        sky.render_frame(16.0, &rainy(), &mut out);
        assert_eq!((out.width(), out.height()), (64, 36));
        assert!(out.as_bytes().chunks_exact(4).all(|p| p[0] == 255));
        assert!(!sky.has_clouds());
    }

    #[test]
    fn test_long_gap_is_clamped() {
        let mut sky = SkyRenderer::new(64, 36, small_options());
        let mut out = PixelBuffer::with_size(64, 36);
        let weather = WeatherObservation::default();
        sky.render_frame(1000.0, &weather, &mut out);
        sky.render_frame(9000.0, &weather, &mut out);
        assert!((sky.time() - crate::util::MAX_FRAME_DT).abs() < 1e-6);
    }

    #[test]
    fn test_rain_spawns_through_renderer() {
        let mut sky = SkyRenderer::new(64, 36, small_options());
        let mut out = PixelBuffer::with_size(64, 36);
        let weather = rainy();
        for i in 0..10 {
            sky.render_frame(i as f64 * 16.0, &weather, &mut out);
        }
        assert!(sky.precipitation().count_of(PrecipitationType::Rain) > 0);
    }

    #[test]
    fn test_resize_zero_is_noop_and_keeps_particles() {
        let mut sky = SkyRenderer::new(64, 36, small_options());
        let mut out = PixelBuffer::with_size(64, 36);
        let weather = rainy();
        for i in 0..5 {
            sky.render_frame(i as f64 * 16.0, &weather, &mut out);
        }
        let n = sky.precipitation().len();
        sky.resize(0, 36);
        assert_eq!(sky.size(), (64, 36));
        sky.resize(128, 72);
        assert_eq!(sky.size(), (128, 72));
        assert_eq!(sky.precipitation().len(), n);
        sky.render_frame(100.0, &weather, &mut out);
        assert_eq!((out.width(), out.height()), (128, 72));
    }

    #[test]
    fn test_dispose_stops_rendering() {
        let mut sky = SkyRenderer::new(64, 36, small_options());
        let mut out = PixelBuffer::with_size(64, 36);
        sky.render_frame(0.0, &rainy(), &mut out);
        sky.dispose();
        assert!(sky.is_disposed());
        assert!(sky.precipitation().is_empty());
        assert!(sky.sun().cache().is_empty());

        let mut fresh = PixelBuffer::with_size(64, 36);
        sky.render_frame(16.0, &rainy(), &mut fresh);
        assert!(fresh.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_gradient_sky_night_is_darker() {
        let day = GradientSky::for_weather(&WeatherObservation {
            sun_elevation: 40.0,
            ..Default::default()
        });
        let night = GradientSky::for_weather(&WeatherObservation {
            sun_elevation: -20.0,
            ..Default::default()
        });
        assert!(night.sample(0.5, 0.2).luminance() < day.sample(0.5, 0.2).luminance());
    }

    #[test]
    fn test_gradient_sky_dusk_horizon_is_warm() {
        let dusk = GradientSky::for_weather(&WeatherObservation {
            sun_elevation: 1.0,
            ..Default::default()
        });
        let c = dusk.sample(0.5, HORIZON_Y);
        assert!(c.x > c.z);
    }
}
