//! Sun sprite baking and the bounded sprite cache
//!
//! Baking a soft sun (disc, limb darkening, granulation, bloom, halo) costs
//! several full-surface blurs, so sprites are keyed by a quantised copy of
//! their parameters and reused until the parameters leave the bucket.

use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use tracing::{debug, trace};

use super::model::SunRenderState;
use crate::display::{BlendMode, ClipCircle, GradientStop, PixelBuffer};
use crate::math3d::{lerp, mix, smoothstep, Vec3};
use crate::noise::{gradient_noise_2d, hash_unit};

pub const DEFAULT_SPRITE_CAPACITY: usize = 256;
pub const DEFAULT_GRANULE_CAPACITY: usize = 64;

const DISC_BUCKET_PX: f32 = 2.0;
const HALO_BUCKET_PX: f32 = 8.0;
const UNIT_BUCKET: f32 = 0.05;
const COLOR_LEVELS: f32 = 20.0;

/// Extra pixels around the halo so blur never clips
const PADDING: f32 = 6.0;
/// Granulation is invisible on tiny or low suns
const MIN_GRANULE_DISC: f32 = 10.0;
const MIN_GRANULE_ELEV_T: f32 = 0.25;
/// Edge wobble amplitude, as a fraction of the disc radius
const EDGE_NOISE: f32 = 0.035;

/// Continuous sprite parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteParams {
    pub disc_radius: f32,
    pub halo_radius: f32,
    pub extinction: f32,
    pub elev_t: f32,
    pub fog_density: f32,
    pub cloud_cover: f32,
    pub sky_luminance: f32,
    pub color: Vec3,
    pub tone_scale: f32,
}

impl SpriteParams {
    pub fn from_state(state: &SunRenderState, fog_density: f32, cloud_cover: f32) -> Self {
        Self {
            disc_radius: state.disc_radius,
            halo_radius: state.halo_radius,
            extinction: state.extinction,
            elev_t: state.elev_t,
            fog_density,
            cloud_cover,
            sky_luminance: state.sky_luminance,
            color: state.color,
            tone_scale: state.disc_tone_scale,
        }
    }

    pub fn key(&self) -> SpriteKey {
        let unit = |v: f32| (v.clamp(0.0, 1.0) / UNIT_BUCKET).round() as u8;
        let level = |v: f32| (v.clamp(0.0, 1.0) * (COLOR_LEVELS - 1.0)).round() as u8;
        SpriteKey {
            disc: (self.disc_radius.max(0.0) / DISC_BUCKET_PX).round() as u16,
            halo: (self.halo_radius.max(0.0) / HALO_BUCKET_PX).round() as u16,
            extinction: unit(self.extinction),
            elev_t: unit(self.elev_t),
            fog: unit(self.fog_density),
            cloud: unit(self.cloud_cover),
            sky_lum: unit(self.sky_luminance),
            color: [level(self.color.x), level(self.color.y), level(self.color.z)],
            tone: unit(self.tone_scale),
        }
    }
}

/// Quantised sprite parameters; the cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpriteKey {
    pub disc: u16,
    pub halo: u16,
    pub extinction: u8,
    pub elev_t: u8,
    pub fog: u8,
    pub cloud: u8,
    pub sky_lum: u8,
    pub color: [u8; 3],
    pub tone: u8,
}

impl SpriteKey {
    /// Bucket centers. Baking from these makes a sprite a pure function of its key.
    pub fn params(&self) -> SpriteParams {
        let unit = |v: u8| v as f32 * UNIT_BUCKET;
        let level = |v: u8| v as f32 / (COLOR_LEVELS - 1.0);
        SpriteParams {
            disc_radius: self.disc as f32 * DISC_BUCKET_PX,
            halo_radius: self.halo as f32 * HALO_BUCKET_PX,
            extinction: unit(self.extinction),
            elev_t: unit(self.elev_t),
            fog_density: unit(self.fog),
            cloud_cover: unit(self.cloud),
            sky_luminance: unit(self.sky_lum),
            color: Vec3::new(level(self.color[0]), level(self.color[1]), level(self.color[2])),
            tone_scale: unit(self.tone),
        }
    }

    /// Seed for the edge noise, stable across runs
    pub fn seed(&self) -> u32 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        let h = hasher.finish();
        (h ^ (h >> 32)) as u32
    }
}

/// A baked sun: surface plus the geometry it was baked with
#[derive(Debug)]
pub struct SunSprite {
    pub surface: PixelBuffer,
    /// Distance from the surface center to its edge
    pub half_extent: u32,
    pub disc_radius: f32,
    pub halo_radius: f32,
}

struct Entry<T> {
    value: Rc<T>,
    last_used: u64,
}

/// Minimal LRU over an FxHashMap: eviction scans for the oldest stamp.
/// Capacities are small, so the scan is cheaper than a linked list.
struct LruMap<K, T> {
    entries: FxHashMap<K, Entry<T>>,
    capacity: usize,
}

impl<K: Copy + Eq + Hash, T> LruMap<K, T> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity: capacity.max(1),
        }
    }

    fn get(&mut self, key: &K, tick: u64) -> Option<Rc<T>> {
        self.entries.get_mut(key).map(|e| {
            e.last_used = tick;
            Rc::clone(&e.value)
        })
    }

    fn insert(&mut self, key: K, value: Rc<T>, tick: u64) -> bool {
        let mut evicted = false;
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k)
            {
                self.entries.remove(&oldest);
                evicted = true;
            }
        }
        self.entries.insert(
            key,
            Entry {
                value,
                last_used: tick,
            },
        );
        evicted
    }

    fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Bounded cache of baked sun sprites and granulation textures
pub struct SunSpriteCache {
    sprites: LruMap<SpriteKey, SunSprite>,
    granules: LruMap<u16, PixelBuffer>,
    tick: u64,
    bakes: u64,
}

impl SunSpriteCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SPRITE_CAPACITY, DEFAULT_GRANULE_CAPACITY)
    }

    pub fn with_capacity(sprites: usize, granules: usize) -> Self {
        Self {
            sprites: LruMap::new(sprites),
            granules: LruMap::new(granules),
            tick: 0,
            bakes: 0,
        }
    }

    /// Sprite for these parameters, baking it on a miss. Never fails.
    pub fn get(&mut self, params: &SpriteParams) -> Rc<SunSprite> {
        self.tick += 1;
        let key = params.key();
        if let Some(sprite) = self.sprites.get(&key, self.tick) {
            trace!(?key, "sun sprite hit");
            return sprite;
        }

        let sprite = Rc::new(self.bake(&key));
        self.bakes += 1;
        let evicted = self.sprites.insert(key, Rc::clone(&sprite), self.tick);
        debug!(
            disc = key.disc,
            halo = key.halo,
            size = sprite.surface.width(),
            evicted,
            "baked sun sprite"
        );
        sprite
    }

    pub fn contains(&self, params: &SpriteParams) -> bool {
        self.sprites.contains(&params.key())
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.len() == 0
    }

    pub fn granule_count(&self) -> usize {
        self.granules.len()
    }

    /// Number of surfaces baked since construction
    pub fn bakes(&self) -> u64 {
        self.bakes
    }

    /// Drop every retained surface
    pub fn clear(&mut self) {
        self.sprites.clear();
        self.granules.clear();
    }

    fn granule_texture(&mut self, disc_bucket: u16, radius: f32) -> Rc<PixelBuffer> {
        if let Some(tex) = self.granules.get(&disc_bucket, self.tick) {
            return tex;
        }
        let tex = Rc::new(bake_granules(radius, disc_bucket as u32));
        self.granules.insert(disc_bucket, Rc::clone(&tex), self.tick);
        tex
    }

    fn bake(&mut self, key: &SpriteKey) -> SunSprite {
        let p = key.params();
        let disc = p.disc_radius.max(1.0);
        let halo = p.halo_radius.max(disc);
        let half = (halo + PADDING).ceil() as u32;
        let size = half * 2;
        let c = half as f32;
        let squash = lerp(0.5, 1.0, p.extinction.powf(1.7));
        let mut surface = PixelBuffer::with_size(size, size);

        let tone = p.tone_scale.max(0.05);
        let disc_color = p.color * tone;

        // 1. Soft disc with a noisy rim
        draw_disc(&mut surface, c, disc, squash, disc_color, key.seed());

        // 2. Limb darkening: stacked rings brighten toward the center
        for k in 0..3 {
            let r = disc * (0.92 - k as f32 * 0.2);
            let stops = [
                GradientStop::new(0.0, disc_color.to_rgb8(), 0.12),
                GradientStop::new(1.0, disc_color.to_rgb8(), 0.0),
            ];
            surface.fill_radial_gradient(c, c, r, r * squash, &stops, BlendMode::Additive, None);
        }

        // 3. Bright core
        let core = mix(p.color, Vec3::splat(1.0), 0.6).to_rgb8();
        let stops = [
            GradientStop::new(0.0, core, 0.5 * tone),
            GradientStop::new(1.0, core, 0.0),
        ];
        surface.fill_radial_gradient(c, c, disc * 0.55, disc * 0.55 * squash, &stops, BlendMode::Screen, None);

        // 4. Granulation, clipped to the disc
        if disc >= MIN_GRANULE_DISC && p.elev_t > MIN_GRANULE_ELEV_T {
            let tex = self.granule_texture(key.disc, disc);
            let clip = ClipCircle {
                cx: c,
                cy: c,
                radius: disc * squash.min(1.0) * 0.96,
            };
            let offset = (c - tex.width() as f32 * 0.5).round() as i32;
            surface.composite_clipped(
                &tex,
                offset,
                offset,
                BlendMode::Additive,
                0.5 * p.elev_t,
                Some(clip),
            );
        }

        // 5. Bloom: blurred ellipses, widest and faintest last
        let bloom_color = mix(p.color, Vec3::splat(1.0), 0.25).to_rgb8();
        let mut pass = PixelBuffer::with_size(size, size);
        for (scale, alpha, blur) in [(1.4, 0.35, 0.15), (2.2, 0.2, 0.3), (3.2, 0.12, 0.5)] {
            pass.clear_transparent();
            let rx = disc * scale;
            let stops = [
                GradientStop::new(0.0, bloom_color, alpha * tone),
                GradientStop::new(1.0, bloom_color, 0.0),
            ];
            pass.fill_radial_gradient(c, c, rx, rx * squash, &stops, BlendMode::Over, None);
            pass.box_blur((disc * blur).round().max(1.0) as u32);
            surface.composite(&pass, 0, 0, BlendMode::Screen, 1.0);
        }

        // 6. Warm outer halo, then a cool inner one
        let haze = 0.5 + 0.5 * p.fog_density.max(p.cloud_cover);
        let warm = mix(p.color, Vec3::new(1.0, 0.7, 0.45), 0.5).to_rgb8();
        let warm_alpha = 0.3 * haze * (1.0 - p.sky_luminance * 0.4);
        let stops = [
            GradientStop::new(0.0, warm, warm_alpha),
            GradientStop::new(0.35, warm, warm_alpha * 0.4),
            GradientStop::new(1.0, warm, 0.0),
        ];
        surface.fill_radial_gradient(c, c, halo, halo, &stops, BlendMode::Screen, None);

        let cool = Vec3::new(0.75, 0.85, 1.0).to_rgb8();
        let cool_alpha = 0.12 * p.elev_t;
        if cool_alpha > 0.0 {
            let stops = [
                GradientStop::new(0.0, cool, cool_alpha),
                GradientStop::new(1.0, cool, 0.0),
            ];
            surface.fill_radial_gradient(c, c, halo * 0.7, halo * 0.7, &stops, BlendMode::Screen, None);
        }

        SunSprite {
            surface,
            half_extent: half,
            disc_radius: disc,
            halo_radius: halo,
        }
    }
}

impl Default for SunSpriteCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Disc with limb falloff and an angularly noisy soft edge
fn draw_disc(surface: &mut PixelBuffer, c: f32, radius: f32, squash: f32, color: Vec3, seed: u32) {
    let (r8, g8, b8) = color.to_rgb8();
    let soft = (radius * 0.08).max(1.0);
    let reach = radius * (1.0 + EDGE_NOISE) + soft;
    let x0 = (c - reach).floor() as i32;
    let x1 = (c + reach).ceil() as i32;

    for y in x0..=x1 {
        let dy = (y as f32 + 0.5 - c) / squash;
        for x in x0..=x1 {
            let dx = x as f32 + 0.5 - c;
            let d = (dx * dx + dy * dy).sqrt();
            if d > reach {
                continue;
            }
            let angle = dy.atan2(dx);
            let wobble = gradient_noise_2d(angle.cos() * 3.0 + 7.0, angle.sin() * 3.0 + 7.0, seed);
            let edge = radius * (1.0 + EDGE_NOISE * wobble);
            let coverage = 1.0 - smoothstep(edge - soft, edge + soft, d);
            if coverage <= 0.0 {
                continue;
            }
            let a = (coverage * 255.0 + 0.5) as u8;
            surface.blend_pixel(x, y, r8, g8, b8, a, BlendMode::Screen);
        }
    }
}

/// Square speckle texture covering a disc of `radius`
fn bake_granules(radius: f32, seed: u32) -> PixelBuffer {
    let size = (radius * 2.0).ceil().max(2.0) as u32;
    let mut tex = PixelBuffer::with_size(size, size);
    let cell = (radius / 10.0).max(1.5);
    for y in 0..size {
        for x in 0..size {
            let gx = (x as f32 / cell) as u32;
            let gy = (y as f32 / cell) as u32;
            let v = hash_unit(gx.wrapping_mul(7919) ^ gy, seed, 0x6A41);
            if v < 0.55 {
                continue;
            }
            let a = ((v - 0.55) / 0.45 * 0.22 * 255.0) as u8;
            tex.blend_pixel(x as i32, y as i32, 255, 240, 210, a, BlendMode::Over);
        }
    }
    trace!(radius, size, "baked granulation texture");
    tex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(disc: f32) -> SpriteParams {
        SpriteParams {
            disc_radius: disc,
            halo_radius: disc * 4.0,
            extinction: 0.9,
            elev_t: 1.0,
            fog_density: 0.1,
            cloud_cover: 0.2,
            sky_luminance: 0.4,
            color: Vec3::new(1.0, 0.95, 0.9),
            tone_scale: 0.7,
        }
    }

    #[test]
    fn test_same_bucket_returns_same_rc() {
        let mut cache = SunSpriteCache::new();
        let a = cache.get(&params(14.0));
        // Nudges inside every bucket
        let mut p = params(14.3);
        p.halo_radius = 57.0;
        p.extinction = 0.91;
        p.color.y = 0.951;
        let b = cache.get(&p);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(cache.bakes(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_different_bucket_bakes_again() {
        let mut cache = SunSpriteCache::new();
        let a = cache.get(&params(14.0));
        let b = cache.get(&params(20.0));
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(cache.bakes(), 2);
    }

    #[test]
    fn test_lru_evicts_least_recent() {
        let mut cache = SunSpriteCache::with_capacity(2, 2);
        let a = params(4.0);
        let b = params(8.0);
        let c = params(12.0);
        cache.get(&a);
        cache.get(&b);
        cache.get(&a); // a is now most recent
        cache.get(&c); // evicts b
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_sprite_geometry() {
        let mut cache = SunSpriteCache::new();
        let s = cache.get(&params(16.0));
        assert_eq!(s.surface.width(), s.half_extent * 2);
        assert!(s.half_extent as f32 >= s.halo_radius);
        // Center is lit, corner is empty
        let h = s.half_extent as i32;
        assert!(s.surface.get_pixel_rgba(h, h).unwrap().3 > 200);
        assert_eq!(s.surface.get_pixel_rgba(0, 0).unwrap().3, 0);
    }

    #[test]
    fn test_granules_only_for_large_high_sun() {
        let mut cache = SunSpriteCache::new();
        cache.get(&params(6.0));
        assert_eq!(cache.granule_count(), 0);
        let mut low = params(20.0);
        low.elev_t = 0.1;
        cache.get(&low);
        assert_eq!(cache.granule_count(), 0);
        cache.get(&params(20.0));
        assert_eq!(cache.granule_count(), 1);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut cache = SunSpriteCache::new();
        cache.get(&params(20.0));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.granule_count(), 0);
    }

    #[test]
    fn test_key_seed_is_stable() {
        let k = params(14.0).key();
        assert_eq!(k.seed(), params(14.2).key().seed());
        assert_ne!(k.seed(), params(30.0).key().seed());
    }

    #[test]
    fn test_separate_caches_bake_identical_bytes() {
        let mut a = SunSpriteCache::new();
        let mut b = SunSpriteCache::new();
        for disc in [6.0, 14.0, 30.0] {
            let sa = a.get(&params(disc));
            let sb = b.get(&params(disc));
            assert!(!Rc::ptr_eq(&sa, &sb));
            assert_eq!(sa.half_extent, sb.half_extent);
            assert_eq!(sa.surface.as_bytes(), sb.surface.as_bytes(), "disc {disc}");
        }
    }

    #[test]
    fn test_sprite_debug_format() {
        let mut cache = SunSpriteCache::new();
        let sprite = cache.get(&params(14.0));
        let text = format!("{:?}", sprite);
        assert!(text.starts_with("SunSprite"));
        assert!(text.contains("PixelBuffer"));
    }
}
