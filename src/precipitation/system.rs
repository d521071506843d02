//! Precipitation particle system
//!
//! Spawns, advances and recycles particles for the requested (type, tier).
//! Changing the request never touches live particles: the old population
//! runs out its lifetime while the new one spawns in.

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use super::params::{PrecipitationRequest, PrecipitationTable, PrecipitationType};
use super::particle::Particle;
use crate::display::{BlendMode, PixelBuffer};
use crate::math3d::smoothstep;
use crate::noise::{gradient_noise_2d, hash_unit};
use crate::sky::{FrameContext, SkyLayer};
use crate::util::Rng;
use crate::weather::WeatherObservation;

pub const DEFAULT_SEED: u64 = 0x5EED_CAFE;
/// Hard ceiling regardless of table values
pub const MAX_PARTICLES: usize = 6000;
/// Particles are dropped this far below the bottom edge
const DESPAWN_MARGIN: f32 = 40.0;
/// Horizontal spawn band, as fractions of width
const SPAWN_X: (f32, f32) = (-0.1, 1.1);
/// Wind response, px/s per m/s
const RAIN_WIND_PX: f32 = 25.0;
const SNOW_WIND_PX: f32 = 12.0;
/// Drift field time scale
const NOISE_SPEED: f32 = 0.5;
const NOISE_SEED: u32 = 0xD21F;

const RAIN_COLOR: (u8, u8, u8) = (200, 210, 230);
const SNOW_COLOR: (u8, u8, u8) = (250, 250, 255);

pub struct PrecipitationSystem {
    particles: Vec<Particle>,
    table: PrecipitationTable,
    request: Option<PrecipitationRequest>,
    rng: Rng,
    /// Monotonic clock for the drift field, seconds
    time: f32,
    wind_speed: f32,
    wind_direction: f32,
    spawn_accum: f32,
    next_id: u32,
    width: u32,
    height: u32,
    /// Flake sprites keyed by round(diameter * 2)
    snow_sprites: FxHashMap<u8, PixelBuffer>,
}

impl PrecipitationSystem {
    pub fn new(width: u32, height: u32, table: PrecipitationTable) -> Self {
        Self::with_seed(width, height, table, DEFAULT_SEED)
    }

    pub fn with_seed(width: u32, height: u32, table: PrecipitationTable, seed: u64) -> Self {
        Self {
            particles: Vec::with_capacity(1024),
            table,
            request: None,
            rng: Rng::new(seed),
            time: 0.0,
            wind_speed: 0.0,
            wind_direction: 0.0,
            spawn_accum: 0.0,
            next_id: 0,
            width,
            height,
            snow_sprites: FxHashMap::default(),
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn count_of(&self, kind: PrecipitationType) -> usize {
        self.particles.iter().filter(|p| p.kind == kind).count()
    }

    pub fn request(&self) -> Option<PrecipitationRequest> {
        self.request
    }

    pub fn table(&self) -> &PrecipitationTable {
        &self.table
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Change what spawns from now on. Live particles keep their own kind.
    pub fn set_request(&mut self, request: Option<PrecipitationRequest>) {
        if request != self.request {
            debug!(from = ?self.request, to = ?request, "precipitation request changed");
            self.request = request;
            self.spawn_accum = 0.0;
        }
    }

    pub fn set_wind(&mut self, speed: f32, direction_deg: f32) {
        self.wind_speed = speed;
        self.wind_direction = direction_deg;
    }

    /// Take request and wind from an observation
    pub fn apply_weather(&mut self, weather: &WeatherObservation) {
        self.set_request(PrecipitationRequest::from_observation(weather));
        self.set_wind(weather.wind_speed, weather.wind_direction);
    }

    /// Horizontal wind in px/s before per-type scaling; from the west is +x
    fn wind_x(&self) -> f32 {
        -self.wind_speed * self.wind_direction.to_radians().sin()
    }

    /// Advance every particle, drop expired ones, then spawn
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.time += dt;
        let wind = self.wind_x();
        let despawn_y = self.height as f32 + DESPAWN_MARGIN;

        for p in &mut self.particles {
            let target = gradient_noise_2d(p.noise_offset, self.time * NOISE_SPEED, NOISE_SEED);
            p.smooth_drift(target);
            let params = self.table.get(p.kind, p.tier);
            let wind_x = match p.kind {
                PrecipitationType::Rain => wind * RAIN_WIND_PX,
                PrecipitationType::Snow => wind * SNOW_WIND_PX,
            };
            p.advance(dt, wind_x, params);
        }

        // swap_remove: order is irrelevant and nothing shifts
        let mut i = 0;
        while i < self.particles.len() {
            if self.particles[i].is_expired(despawn_y) {
                self.particles.swap_remove(i);
            } else {
                i += 1;
            }
        }

        if let Some(request) = self.request {
            let rate = self.table.get(request.kind, request.tier).spawn_rate.max(0.0);
            self.spawn_accum += rate * dt;
            while self.spawn_accum >= 1.0 {
                self.spawn_accum -= 1.0;
                if self.particles.len() >= MAX_PARTICLES {
                    continue;
                }
                self.spawn(request);
            }
        }
    }

    fn spawn(&mut self, request: PrecipitationRequest) {
        let params = *self.table.get(request.kind, request.tier);
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let w = self.width as f32;
        let size = self.rng.range_f32(params.size[0], params.size[1]);
        let x = self.rng.range_f32(w * SPAWN_X.0, w * SPAWN_X.1);
        let y = -self.rng.range_f32(0.0, size + 10.0);
        let vy = self.rng.range_f32(params.velocity_y[0], params.velocity_y[1]);
        let opacity = self.rng.range_f32(params.opacity[0], params.opacity[1]);
        let (rotation, rotation_speed) = match request.kind {
            PrecipitationType::Rain => (0.0, 0.0),
            PrecipitationType::Snow => (
                self.rng.range_f32(0.0, std::f32::consts::TAU),
                self.rng.range_f32(-1.5, 1.5),
            ),
        };

        self.particles.push(Particle {
            x,
            y,
            vx: 0.0,
            vy,
            size,
            opacity,
            rotation,
            rotation_speed,
            age: 0.0,
            lifetime: params.lifetime,
            kind: request.kind,
            tier: request.tier,
            noise_offset: hash_unit(id, 0, NOISE_SEED) * 1000.0,
            drift: 0.0,
        });
    }

    /// Draw all particles onto a transparent layer
    pub fn draw(&mut self, buffer: &mut PixelBuffer) {
        for p in &self.particles {
            let alpha = p.alpha();
            if alpha <= 0.0 {
                continue;
            }
            match p.kind {
                PrecipitationType::Rain => {
                    let speed = (p.vx * p.vx + p.vy * p.vy).sqrt().max(1e-3);
                    let (dx, dy) = (p.vx / speed, p.vy / speed);
                    buffer.line_aa(
                        p.x - dx * p.size,
                        p.y - dy * p.size,
                        p.x,
                        p.y,
                        RAIN_COLOR,
                        alpha,
                        BlendMode::Over,
                    );
                },
                PrecipitationType::Snow => {
                    let bucket = (p.size * 2.0).round().clamp(1.0, 255.0) as u8;
                    let sprite = self
                        .snow_sprites
                        .entry(bucket)
                        .or_insert_with(|| bake_flake(bucket as f32 * 0.5));
                    buffer.draw_sprite_rotated(sprite, p.x, p.y, p.rotation, alpha, BlendMode::Over);
                },
            }
        }
    }

    pub fn snow_sprite_count(&self) -> usize {
        self.snow_sprites.len()
    }

    /// New viewport. Particles keep their pixel positions.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
    }

    /// Drop particles and sprite textures
    pub fn dispose(&mut self) {
        self.particles = Vec::new();
        self.snow_sprites.clear();
        self.request = None;
        info!("precipitation disposed");
    }
}

/// Soft round flake with six faint arms
fn bake_flake(diameter: f32) -> PixelBuffer {
    let radius = (diameter * 0.5).max(0.5);
    let size = (diameter.ceil() as u32 + 4).max(4);
    let c = size as f32 * 0.5;
    let mut sprite = PixelBuffer::with_size(size, size);
    let (r, g, b) = SNOW_COLOR;

    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 + 0.5 - c;
            let dy = y as f32 + 0.5 - c;
            let d = (dx * dx + dy * dy).sqrt();
            let body = 1.0 - smoothstep(radius * 0.4, radius + 0.75, d);

            // Arms: brightest along six spokes, fading past the body
            let angle = dy.atan2(dx);
            let spoke = (angle * 3.0).cos().abs().powf(8.0);
            let arms = spoke * (1.0 - smoothstep(radius * 0.5, radius * 1.6, d)) * 0.35;

            let a = body.max(arms).clamp(0.0, 1.0);
            if a > 0.0 {
                sprite.blend_pixel(x as i32, y as i32, r, g, b, (a * 255.0) as u8, BlendMode::Over);
            }
        }
    }
    sprite
}

impl SkyLayer for PrecipitationSystem {
    fn name(&self) -> &str {
        "precipitation"
    }

    fn update(&mut self, frame: &FrameContext) {
        self.apply_weather(frame.weather);
        self.step(frame.dt);
    }

    fn render(&mut self, _frame: &FrameContext, buffer: &mut PixelBuffer) {
        self.draw(buffer);
    }

    fn resize(&mut self, width: u32, height: u32) {
        PrecipitationSystem::resize(self, width, height);
    }

    fn dispose(&mut self) {
        PrecipitationSystem::dispose(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precipitation::IntensityTier;

    const DT: f32 = 1.0 / 60.0;

    fn run(system: &mut PrecipitationSystem, seconds: f32) {
        let steps = (seconds / DT).round() as usize;
        for _ in 0..steps {
            system.step(DT);
        }
    }

    fn heavy_rain() -> Option<PrecipitationRequest> {
        Some(PrecipitationRequest::new(PrecipitationType::Rain, IntensityTier::Heavy))
    }

    #[test]
    fn test_steady_state_count_heavy_rain() {
        // Tall enough that lifetime, not the bottom edge, removes drops
        let mut system = PrecipitationSystem::with_seed(800, 4000, PrecipitationTable::default(), 7);
        system.set_request(heavy_rain());
        run(&mut system, 4.0);
        let expected = 300.0 * 0.8;
        let n = system.len() as f32;
        assert!((n - expected).abs() <= expected * 0.05, "count {n}, expected ~{expected}");
    }

    #[test]
    fn test_steady_state_count_light_snow() {
        let mut system = PrecipitationSystem::with_seed(800, 4000, PrecipitationTable::default(), 9);
        system.set_request(Some(PrecipitationRequest::new(
            PrecipitationType::Snow,
            IntensityTier::Light,
        )));
        run(&mut system, 20.0);
        let expected = 40.0 * 8.0;
        let n = system.len() as f32;
        assert!((n - expected).abs() <= expected * 0.05, "count {n}, expected ~{expected}");
    }

    #[test]
    fn test_fractional_spawn_carry() {
        let mut system = PrecipitationSystem::with_seed(800, 4000, PrecipitationTable::default(), 1);
        system.set_request(Some(PrecipitationRequest::new(
            PrecipitationType::Snow,
            IntensityTier::Light,
        )));
        // 40/s at 1/60 s is 0.67 per tick; 60 ticks spawn 40 in total
        run(&mut system, 1.0);
        assert!((39..=40).contains(&system.len()));
    }

    #[test]
    fn test_type_transition_crossfades() {
        let mut system = PrecipitationSystem::with_seed(800, 4000, PrecipitationTable::default(), 3);
        system.set_request(heavy_rain());
        run(&mut system, 1.0);
        let rain_before = system.count_of(PrecipitationType::Rain);
        assert!(rain_before > 0);

        system.set_request(Some(PrecipitationRequest::new(
            PrecipitationType::Snow,
            IntensityTier::Moderate,
        )));
        system.step(DT);
        assert!(system.count_of(PrecipitationType::Rain) > 0);
        run(&mut system, 0.2);
        assert!(system.count_of(PrecipitationType::Snow) > 0);

        // Rain lives 0.8 s; after that only snow remains
        run(&mut system, 1.0);
        assert_eq!(system.count_of(PrecipitationType::Rain), 0);
    }

    #[test]
    fn test_stop_request_drains() {
        let mut system = PrecipitationSystem::with_seed(800, 600, PrecipitationTable::default(), 5);
        system.set_request(heavy_rain());
        run(&mut system, 1.0);
        system.set_request(None);
        run(&mut system, 1.0);
        assert!(system.is_empty());
    }

    #[test]
    fn test_drops_leave_below_screen() {
        // Short canvas: drops exit long before their lifetime
        let mut system = PrecipitationSystem::with_seed(200, 100, PrecipitationTable::default(), 11);
        system.set_request(heavy_rain());
        run(&mut system, 2.0);
        for p in system.particles() {
            assert!(p.y <= 100.0 + DESPAWN_MARGIN);
        }
        assert!((system.len() as f32) < 300.0 * 0.8 * 0.5);
    }

    #[test]
    fn test_wind_pushes_rain_east_from_west() {
        let mut system = PrecipitationSystem::with_seed(400, 4000, PrecipitationTable::default(), 2);
        system.set_request(heavy_rain());
        system.set_wind(10.0, 270.0);
        run(&mut system, 0.5);
        let mean_vx: f32 =
            system.particles().iter().map(|p| p.vx).sum::<f32>() / system.len().max(1) as f32;
        assert!(mean_vx > 0.0);
    }

    #[test]
    fn test_seeded_runs_match() {
        let mut a = PrecipitationSystem::with_seed(300, 300, PrecipitationTable::default(), 42);
        let mut b = PrecipitationSystem::with_seed(300, 300, PrecipitationTable::default(), 42);
        for s in [&mut a, &mut b] {
            s.set_request(heavy_rain());
            run(s, 0.5);
        }
        assert_eq!(a.len(), b.len());
        for (pa, pb) in a.particles().iter().zip(b.particles()) {
            assert_eq!((pa.x, pa.y), (pb.x, pb.y));
        }
    }

    #[test]
    fn test_resize_keeps_particles() {
        let mut system = PrecipitationSystem::with_seed(400, 4000, PrecipitationTable::default(), 8);
        system.set_request(heavy_rain());
        run(&mut system, 0.3);
        let before: Vec<(f32, f32)> = system.particles().iter().map(|p| (p.x, p.y)).collect();
        system.resize(0, 0);
        assert_eq!(system.size(), (400, 4000));
        system.resize(1200, 800);
        assert_eq!(system.size(), (1200, 800));
        let after: Vec<(f32, f32)> = system.particles().iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_snow_sprites_cached_per_bucket() {
        let mut system = PrecipitationSystem::with_seed(200, 200, PrecipitationTable::default(), 4);
        system.set_request(Some(PrecipitationRequest::new(
            PrecipitationType::Snow,
            IntensityTier::Heavy,
        )));
        run(&mut system, 2.0);
        let mut buf = PixelBuffer::with_size(200, 200);
        system.draw(&mut buf);
        // Diameters 2..6 give at most 9 half-pixel buckets
        let n = system.snow_sprite_count();
        assert!(n > 0 && n <= 9);
        assert!(buf.as_bytes().chunks_exact(4).any(|p| p[0] > 0));
    }

    #[test]
    fn test_dispose_clears_everything() {
        let mut system = PrecipitationSystem::with_seed(200, 200, PrecipitationTable::default(), 4);
        system.set_request(heavy_rain());
        run(&mut system, 0.5);
        system.dispose();
        assert!(system.is_empty());
        assert_eq!(system.snow_sprite_count(), 0);
        assert_eq!(system.request(), None);
    }
}
