//! The sun as a sky layer: cached sprite plus per-frame effects

use tracing::trace;

use super::effects::{draw_ghosts, draw_occlusion, lens_ghosts, occlusion_blobs, GhostInputs};
use super::model::{compute_render_state, SunInputs, SunRenderState};
use super::sprite::{SpriteParams, SunSpriteCache};
use crate::display::{BlendMode, PixelBuffer};
use crate::sky::{FrameContext, SkyLayer};

/// Below this the sun is not drawn at all
const MIN_DISC_ALPHA: f32 = 0.005;

pub struct SunLayer {
    cache: SunSpriteCache,
    last_state: Option<SunRenderState>,
    last_blobs: usize,
    last_ghosts: usize,
}

impl SunLayer {
    pub fn new() -> Self {
        Self::with_cache(SunSpriteCache::new())
    }

    pub fn with_cache(cache: SunSpriteCache) -> Self {
        Self {
            cache,
            last_state: None,
            last_blobs: 0,
            last_ghosts: 0,
        }
    }

    pub fn cache(&self) -> &SunSpriteCache {
        &self.cache
    }

    /// Render state computed on the last frame
    pub fn last_state(&self) -> Option<&SunRenderState> {
        self.last_state.as_ref()
    }

    /// (occlusion blobs, lens ghosts) drawn on the last frame
    pub fn last_effect_counts(&self) -> (usize, usize) {
        (self.last_blobs, self.last_ghosts)
    }
}

impl Default for SunLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SkyLayer for SunLayer {
    fn name(&self) -> &str {
        "sun"
    }

    fn blend_mode(&self) -> BlendMode {
        BlendMode::Screen
    }

    fn render(&mut self, frame: &FrameContext, buffer: &mut PixelBuffer) {
        let weather = frame.weather;
        let inputs = SunInputs::from_weather(weather, frame.width, frame.height);
        let state = compute_render_state(&inputs, frame.sky);
        self.last_state = Some(state);
        self.last_blobs = 0;
        self.last_ghosts = 0;

        if state.disc_base_alpha <= MIN_DISC_ALPHA {
            return;
        }

        let params = SpriteParams::from_state(&state, weather.fog_density, weather.cloud_cover);
        let sprite = self.cache.get(&params);
        let half = sprite.half_extent as f32;
        buffer.composite(
            &sprite.surface,
            (state.position.x - half).round() as i32,
            (state.position.y - half).round() as i32,
            BlendMode::Screen,
            state.disc_base_alpha,
        );

        let blobs = occlusion_blobs(
            state.position,
            state.disc_radius,
            weather.cloud_cover,
            weather.wind_speed,
            frame.time,
        );
        if !blobs.is_empty() {
            let w = frame.width.max(1) as f32;
            let h = frame.height.max(1) as f32;
            let sky = frame.sky.sample(state.position.x / w, state.position.y / h);
            draw_occlusion(buffer, &blobs, state.position, state.disc_radius, sky);
        }

        let ghosts = lens_ghosts(&GhostInputs {
            sun: state.position,
            width: frame.width as f32,
            height: frame.height as f32,
            visibility: state.visibility,
            cloud_cover: weather.cloud_cover,
            fog_density: weather.fog_density,
            elev_t: state.elev_t,
        });
        draw_ghosts(buffer, &ghosts);

        self.last_blobs = blobs.len();
        self.last_ghosts = ghosts.len();
        trace!(blobs = self.last_blobs, ghosts = self.last_ghosts, "sun drawn");
    }

    fn dispose(&mut self) {
        self.cache.clear();
        self.last_state = None;
    }
}
